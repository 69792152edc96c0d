// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use oem_handler::config::DEFAULT_CONFIG_PATH;
use oem_handler::{process_request, Config, Handler, HandlerInterface};

#[derive(Debug, Parser)]
#[clap(
    max_term_width = 80,
    about = "answer OEM IPMI requests from the command line"
)]
struct Args {
    /// Path to the handler configuration file, in TOML.
    #[clap(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log at debug level (`RUST_LOG` takes precedence).
    #[clap(short)]
    verbose: bool,

    #[clap(subcommand)]
    cmd: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Prints the lane counts of the PCIe slot on the given I2C bus.
    Bifurcation { index: u8 },

    /// Runs a raw request and prints the reply as hex. The first byte is the
    /// OEM subcommand; any remaining bytes are its payload.
    Request {
        #[clap(min_values = 1)]
        bytes: Vec<String>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(level),
    )
    .init();

    let config = Config::from_file_or_default(&args.config)?;
    let handler = Handler::from_config(&config)?;

    match args.cmd {
        Cmd::Bifurcation { index } => {
            let lanes = handler.pcie_bifurcation(index);
            println!("{lanes:?}");
        }
        Cmd::Request { bytes } => {
            let bytes = bytes
                .iter()
                .map(|s| parse_byte(s))
                .collect::<Result<Vec<_>>>()?;
            let (command, data) = bytes
                .split_first()
                .context("request needs at least a command byte")?;
            match process_request(&handler, *command, data) {
                Ok(reply) => println!("cc=0x00 {}", hex(&reply)),
                Err(cc) => println!("cc={:#04x}", u8::from(cc)),
            }
        }
    }

    Ok(())
}

fn parse_byte(s: &str) -> Result<u8> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    u8::from_str_radix(digits, 16)
        .with_context(|| format!("'{s}' is not a hex byte"))
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}
