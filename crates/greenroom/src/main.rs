// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Greenroom - a messaging session gateway.
//!
//! Bridges one authenticated device session on an external chat network to
//! an AMQP broker topology, with an HTTP/WebSocket surface for commands and
//! realtime dashboards.

use clap::{Parser, Subcommand};

mod serve;
mod status;

/// Greenroom - a messaging session gateway.
#[derive(Parser, Debug)]
#[command(name = "greenroom", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the gateway: broker, device bridge, relays, HTTP surface.
    Serve,
    /// Query a running gateway for session state and uptime.
    Status {
        /// Emit structured JSON for scripting.
        #[arg(long)]
        json: bool,
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
    /// Print the effective configuration as TOML.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match greenroom_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            greenroom_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Status { json, plain }) => status::run_status(&config, json, plain).await,
        Some(Commands::Config) => {
            match toml::to_string_pretty(&config) {
                Ok(rendered) => {
                    print!("{rendered}");
                    Ok(())
                }
                Err(e) => Err(greenroom_core::GreenroomError::Internal(format!(
                    "config serialization: {e}"
                ))),
            }
        }
        None => {
            println!("greenroom: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
