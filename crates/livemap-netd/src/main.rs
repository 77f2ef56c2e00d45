use std::net::SocketAddr;

use clap::Parser;
use livemap_editor::{MemoryEditor, MemoryMap, TracingObserver};
use livemap_netd::{ServerCommand, ServerConfig, run_server};
use livemap_netproto::constants::{DEFAULT_CLIENT_VERSION, DEFAULT_MAX_CLIENTS};
use livemap_netproto::frame::ReadPolicy;
use tokio::sync::mpsc;
use tracing::level_filters::LevelFilter;
use tracing::{Level, error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Live map server
#[derive(Parser, Debug)]
#[command(name = "livemap-netd")]
#[command(about = "Hosts a shared map for live collaborative editing", long_about = None)]
struct Args {
    /// TCP bind address
    #[arg(short, long, default_value = "0.0.0.0:31313")]
    bind: String,

    /// Password clients must supply (empty for none)
    #[arg(short, long, default_value = "")]
    password: String,

    /// Maximum number of simultaneously connected clients
    #[arg(long, default_value_t = DEFAULT_MAX_CLIENTS)]
    max_clients: u32,

    /// Asset version clients must run
    #[arg(long, default_value_t = DEFAULT_CLIENT_VERSION)]
    client_version: u32,

    /// Name announced to joining clients
    #[arg(long, default_value = "Untitled")]
    map_name: String,

    #[arg(long, default_value_t = 2048)]
    map_width: u16,

    #[arg(long, default_value_t = 2048)]
    map_height: u16,

    /// Transient read failures tolerated per frame section
    #[arg(long, default_value_t = 3)]
    read_retries: u32,

    /// Log level (trace, debug, info, warn, error); `RUST_LOG` overrides it
    #[arg(short, long, default_value = "info")]
    log_level: Level,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(args.log_level).into())
        .from_env_lossy();
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config = ServerConfig {
        password: args.password,
        max_clients: args.max_clients,
        client_version: args.client_version,
        read_policy: ReadPolicy {
            max_retries: args.read_retries,
        },
    };
    let editor = MemoryEditor::new(MemoryMap::new(
        args.map_name,
        args.map_width,
        args.map_height,
    ));

    // Network layer -> server loop events.
    let (tx, rx) = mpsc::channel(1024);
    let (cmd_tx, cmd_rx) = mpsc::channel(64);

    let bind_addr: SocketAddr = args.bind.parse()?;
    let policy = config.read_policy;
    tokio::spawn(async move {
        if let Err(e) = livemap_netd::net::tcp::run_tcp_listener(bind_addr, tx, policy).await {
            error!("Listener stopped: {e}");
        }
    });

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cmd_tx.send(ServerCommand::Shutdown).await;
        }
    });

    info!("Live server started on {}", args.bind);
    info!("Log level: {}", args.log_level);

    let (editor, _) = run_server(rx, cmd_rx, config, editor, TracingObserver).await?;
    info!(
        leaves = editor.memory_map().leaf_count(),
        tiles = editor.memory_map().tile_count(),
        "Session ended"
    );
    Ok(())
}
