//! Command line interface for the bloomd-client example binary.
//!
//! Provides a tiny CLI that connects to a bloomd server and prints its
//! filter listing.

use clap::Parser;

/// Command line arguments for the `bloomd-client` binary.
#[derive(Debug, Parser)]
#[command(name = "bloomd-client", version, about = "List filters on a bloomd server")]
pub struct Cli {
    /// Server host name or address.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Server TCP port.
    #[arg(long, default_value_t = 8673)]
    pub port: u16,

    /// Only list filters whose name starts with this prefix.
    #[arg(short, long)]
    pub prefix: Option<String>,
}
