//! Minimal binary demonstrating `bloomd-client` usage.
//!
//! Connects to a bloomd server, prints its filter listing, and exits.

mod cli;

use bloomd_client::BloomClient;
use clap::Parser;

#[tokio::main]
async fn main() {
    // Enable structured logging for examples and ad-hoc runs. Applications
    // embedding the library should install their own subscriber.
    tracing_subscriber::fmt::init();

    let cli = cli::Cli::parse();
    let client = BloomClient::builder()
        .host(cli.host)
        .port(cli.port)
        .max_connection_attempts(3)
        .build();

    match client.list(cli.prefix.as_deref()).await {
        Ok(filters) if filters.is_empty() => println!("no filters"),
        Ok(filters) => {
            for filter in filters {
                println!(
                    "{}\tprob={}\tcapacity={}\tsize={}",
                    filter.name, filter.probability, filter.capacity, filter.size
                );
            }
        }
        Err(error) => {
            eprintln!("bloomd-client: {error}");
            std::process::exit(1);
        }
    }
    client.dispose();
}
