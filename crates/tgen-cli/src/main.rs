//! tgen console - drive a traffic-generation server from the shell.
//!
//! This is the entry point for the `tgenctl` binary.

mod console;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::json;
use tgen_control::{
    ClientConfig, CmdResult, LinkConfig, PortId, PortSelector, Reporter, StatelessClient,
    StreamPack,
};

use console::ConsoleReporter;

/// Console for a traffic-generation server.
#[derive(Parser, Debug)]
#[command(name = "tgenctl")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server host name or address.
    #[arg(long, env = "TGEN_SERVER", default_value = "localhost")]
    server: String,

    /// Port of the synchronous RPC channel.
    #[arg(long, env = "TGEN_SYNC_PORT", default_value = "5050")]
    sync_port: u16,

    /// User name the ports are acquired under.
    #[arg(long, env = "TGEN_USER", default_value = "tgen")]
    user: String,

    /// Print wire messages instead of sending them.
    #[arg(long = "virtual", default_value = "false")]
    virtual_mode: bool,

    /// Echo wire traffic.
    #[arg(long, default_value = "false")]
    verbose: bool,

    /// Enable debug logging.
    #[arg(long, default_value = "false")]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the server answers.
    Ping,

    #[command(flatten)]
    Session(SessionCommand),
}

/// Commands that run inside a connected session.
#[derive(Subcommand, Debug)]
enum SessionCommand {
    /// Connect and show every port.
    Status,

    /// Force-acquire, stop and clear all ports.
    Reset,

    /// Load streams onto ports and start traffic.
    Start {
        /// Ports to use (all when omitted).
        #[arg(long, value_delimiter = ',')]
        ports: Vec<u32>,

        /// JSON file with an array of `{stream_id, stream}` objects.
        #[arg(long)]
        streams: PathBuf,

        /// Rate multiplier.
        #[arg(long, default_value = "1.0")]
        mult: f64,

        /// Stop active ports instead of refusing them.
        #[arg(long, default_value = "false")]
        force: bool,
    },

    /// Stop traffic.
    Stop {
        /// Ports to stop (all when omitted).
        #[arg(long, value_delimiter = ',')]
        ports: Vec<u32>,
    },
}

fn selector(ports: Vec<u32>) -> PortSelector {
    if ports.is_empty() {
        PortSelector::All
    } else {
        ports.into()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.debug {
        tracing_subscriber::fmt()
            .with_env_filter("tgen_cli=debug,tgen_control=debug,tgen_rpc=debug,warn")
            .with_writer(std::io::stderr)
            .init();
    }

    let mut link = LinkConfig::new(&args.server, args.sync_port);
    link.virtual_mode = args.virtual_mode;
    link.verbose = args.verbose;

    let command = match args.command {
        Command::Ping => return ping(&link).await,
        Command::Session(command) => command,
    };

    let reporter: Arc<dyn Reporter> = Arc::new(ConsoleReporter);
    let config = ClientConfig::new(&args.user).with_link(link);
    let mut client = StatelessClient::new(config).with_reporter(Arc::clone(&reporter));

    let rc = client.connect().await?;
    rc.annotate(
        &format!("Connecting to {}", client.connection_endpoint()),
        &*reporter,
    );
    if rc.bad() {
        bail!("unable to connect to {}", client.connection_endpoint());
    }

    let outcome = run(&mut client, command).await;
    client.disconnect().await;

    let rc = outcome?;
    if let Some(stage) = rc.failed_stage() {
        bail!("'{stage}' failed");
    }
    if rc.bad() {
        bail!("command failed");
    }
    Ok(())
}

async fn ping(link: &LinkConfig) -> anyhow::Result<()> {
    let link = tgen_rpc::build_link(link);
    link.connect()
        .await
        .with_context(|| format!("connecting to {}", link.endpoint()))?;

    let reply = link.transmit("ping", json!({})).await;
    link.disconnect().await;

    let rc = CmdResult::from_reply(&reply);
    println!("{}", console::render(&format!("Pinging {}", link.endpoint()), &rc));
    if rc.bad() {
        bail!("server did not answer");
    }
    Ok(())
}

async fn run(client: &mut StatelessClient, command: SessionCommand) -> anyhow::Result<CmdResult> {
    match command {
        SessionCommand::Status => {
            status(client);
            Ok(CmdResult::ok())
        }
        SessionCommand::Reset => Ok(client.reset().await?),
        SessionCommand::Start {
            ports,
            streams,
            mult,
            force,
        } => {
            let packs = StreamPack::load_json(&streams)
                .with_context(|| format!("loading streams from {}", streams.display()))?;
            tracing::debug!(count = packs.len(), path = %streams.display(), "Loaded streams");
            Ok(client.start(selector(ports), &packs, mult, force).await?)
        }
        SessionCommand::Stop { ports } => Ok(client.stop(selector(ports)).await?),
    }
}

fn status(client: &StatelessClient) {
    println!(
        "server {} (version {}), {} ports",
        client.connection_endpoint(),
        client.server_version().unwrap_or("unknown"),
        client.port_count()
    );
    for (id, state) in client.port_states() {
        let owned = client
            .port(id)
            .is_some_and(tgen_control::Port::is_acquired);
        let streams = client.get_stream_id_list(id).len();
        println!(
            "  port {:<3} {:<13} {:<9} {streams} stream(s)",
            id.get(),
            console::state_label(state),
            if owned { "owned" } else { "not owned" },
        );
    }
    if client.active_ports().is_empty() {
        return;
    }
    let active: Vec<String> = client
        .active_ports()
        .iter()
        .map(PortId::to_string)
        .collect();
    println!("active: {}", active.join(", "));
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn ping_stays_outside_the_session() {
        let args = Args::try_parse_from(["tgenctl", "--server", "trex-01", "ping"]).unwrap();
        assert!(matches!(args.command, Command::Ping));
        assert_eq!(args.server, "trex-01");
    }

    #[test]
    fn session_commands_are_flattened() {
        let args = Args::try_parse_from(["tgenctl", "stop", "--ports", "0,2"]).unwrap();
        match args.command {
            Command::Session(SessionCommand::Stop { ports }) => assert_eq!(ports, vec![0, 2]),
            other => panic!("unexpected command {other:?}"),
        }

        let args = Args::try_parse_from([
            "tgenctl", "start", "--streams", "s.json", "--mult", "2.5", "--force",
        ])
        .unwrap();
        match args.command {
            Command::Session(SessionCommand::Start {
                ports, mult, force, ..
            }) => {
                assert!(ports.is_empty());
                assert!((mult - 2.5).abs() < f64::EPSILON);
                assert!(force);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn empty_port_list_selects_all() {
        assert!(matches!(selector(Vec::new()), PortSelector::All));
        assert!(matches!(selector(vec![1]), PortSelector::Many(_)));
    }
}
