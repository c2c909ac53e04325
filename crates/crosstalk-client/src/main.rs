//! Crosstalk client binary.
//!
//! # Usage
//!
//! ```bash
//! crosstalk-client --server 127.0.0.1:8080 --name alice
//! crosstalk-client --server 127.0.0.1:8080 --name bob --transport udp
//! ```
//!
//! Incoming chat prints to stdout; stdin lines are sent as chat. `/quit`,
//! end of input, or Ctrl-C leaves the chat cleanly.

// Terminal front-end: chat output goes straight to stdout
#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::time::Duration;

use clap::{Parser, ValueEnum};
use crosstalk_client::{Transport, transport};
use crosstalk_proto::NAME_PREFIX;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Crosstalk chat client
#[derive(Parser, Debug)]
#[command(name = "crosstalk-client")]
#[command(about = "Terminal client for the Crosstalk chat relay")]
#[command(version)]
struct Args {
    /// Server address (host:port)
    #[arg(short, long)]
    server: String,

    /// Display name to register with
    #[arg(short, long)]
    name: String,

    /// Transport the server is serving
    #[arg(short, long, value_enum, default_value = "tcp")]
    transport: TransportArg,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TransportArg {
    Tcp,
    Udp,
}

impl From<TransportArg> for Transport {
    fn from(arg: TransportArg) -> Self {
        match arg {
            TransportArg::Tcp => Transport::Tcp,
            TransportArg::Udp => Transport::Udp,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let mut client = transport::connect(&args.server, args.transport.into()).await?;

    client.to_server.send(format!("{NAME_PREFIX}{}", args.name)).await?;
    println!("Connected to {} as {}. Type /quit to exit.", args.server, args.name);

    let stdin = BufReader::new(tokio::io::stdin());
    let mut input = stdin.lines();

    loop {
        tokio::select! {
            incoming = client.from_server.recv() => match incoming {
                Some(line) => println!("{line}"),
                None => {
                    eprintln!("Disconnected from server");
                    break;
                },
            },

            typed = input.next_line() => match typed? {
                Some(line) => {
                    let quitting = line.trim() == "/quit";
                    if client.to_server.send(line).await.is_err() {
                        eprintln!("Disconnected from server");
                        break;
                    }
                    if quitting {
                        break;
                    }
                },
                // End of input: leave cleanly
                None => {
                    let _ = client.to_server.send("/quit".to_string()).await;
                    break;
                },
            },

            _ = tokio::signal::ctrl_c() => {
                let _ = client.to_server.send("/quit".to_string()).await;
                break;
            },
        }
    }

    // Give the connection task a beat to flush the farewell
    tokio::time::sleep(Duration::from_millis(100)).await;
    client.stop();

    Ok(())
}
