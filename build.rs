//! Build script rendering a manual page for the client binary.
//!
//! The CLI definition is included by path because a build script cannot
//! depend on the crate it builds.

use std::{fs, io::Write as _, path::PathBuf};

use clap::CommandFactory;

#[path = "src/cli.rs"]
mod cli;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=src/cli.rs");

    let man_dir = PathBuf::from("target/generated-man");
    fs::create_dir_all(&man_dir)?;
    let page = man_dir.join(concat!(env!("CARGO_PKG_NAME"), ".1"));

    let mut rendered = Vec::new();
    clap_mangen::Man::new(cli::Cli::command()).render(&mut rendered)?;
    fs::File::create(page)?.write_all(&rendered)?;

    Ok(())
}
