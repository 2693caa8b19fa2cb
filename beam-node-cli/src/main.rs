#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode;

use beam_node_lib::{load_from_path, rpc, Node, NodeConfig, Term};
use clap::{Parser, Subcommand};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Distributed-Erlang node client")]
struct Cli {
    /// Path to this node's configuration TOML file (name, cookie, timeouts).
    #[arg(short, long, value_name = "FILE", default_value = "beam-node.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Call `module:function()` on a remote node and print the reply.
    Rpc {
        /// Remote node's distribution address, e.g. `127.0.0.1:9000`.
        remote: String,
        module: String,
        function: String,
        #[arg(long)]
        register_as: Option<String>,
        #[arg(long, value_parser = clap::value_parser!(u64))]
        timeout_ms: Option<u64>,
    },
    /// Connect and print every inbound message until the connection closes.
    Listen {
        remote: String,
        #[arg(long)]
        register_as: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = beam_node_lib::telemetry::init_tracing("info", false) {
        eprintln!("failed to initialise tracing: {e}");
    }

    let cli = Cli::parse();
    let config = match load_from_path(&cli.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            error!(%err, "failed to load node configuration");
            return ExitCode::FAILURE;
        }
    };

    match run(config, cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "command failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: NodeConfig, command: Command) -> Result<(), Box<dyn std::error::Error>> {
    let node = Node::from_config(&config);

    match command {
        Command::Rpc {
            remote,
            module,
            function,
            register_as,
            timeout_ms,
        } => {
            let conn = node.connect(&remote, register_as.as_deref(), &config).await?;
            info!(self_pid = %conn.self_pid(), "connected");
            let deadline = timeout_ms.map(std::time::Duration::from_millis);
            let reply = rpc::call(&conn, &module, &function, Vec::<Term>::new(), deadline).await?;
            println!("{reply}");
            Ok(())
        }
        Command::Listen { remote, register_as } => {
            let conn = node.connect(&remote, register_as.as_deref(), &config).await?;
            info!(self_pid = %conn.self_pid(), "connected, listening for messages");
            let mut messages = conn.messages().await;
            loop {
                match messages.recv().await {
                    Ok(term) => println!("{term}"),
                    Err(err) => {
                        error!(%err, "connection closed");
                        return Ok(());
                    }
                }
            }
        }
    }
}
