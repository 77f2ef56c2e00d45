use std::str::FromStr;
use std::time::Duration;

use clap::Parser;
use livemap_editor::{AssetLoadError, AssetLoader, MemoryEditor, MemoryMap, TracingObserver};
use livemap_netclient::{ClientConfig, TransportService, connect};
use livemap_netproto::constants::{DEFAULT_CLIENT_VERSION, DEFAULT_PORT, LEAF_SIZE};
use tracing::level_filters::LevelFilter;
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Tile rectangle `x,y,width,height`.
#[derive(Debug, Clone, Copy)]
struct Area {
    x: u16,
    y: u16,
    width: u16,
    height: u16,
}

impl FromStr for Area {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<u16> = s
            .split(',')
            .map(|p| p.trim().parse::<u16>().map_err(|e| format!("{p:?}: {e}")))
            .collect::<Result<_, _>>()?;
        let [x, y, width, height] = parts[..] else {
            return Err("expected x,y,width,height".to_string());
        };
        Ok(Self {
            x,
            y,
            width,
            height,
        })
    }
}

/// Live map probe client
#[derive(Parser, Debug)]
#[command(name = "livemap-probe")]
#[command(about = "Joins a live map session and mirrors part of the map", long_about = None)]
struct Args {
    #[arg(long, default_value = "localhost")]
    host: String,

    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Name shown to other clients
    #[arg(short, long, default_value = "probe")]
    name: String,

    #[arg(short, long, default_value = "")]
    password: String,

    /// Asset version to announce first
    #[arg(long, default_value_t = DEFAULT_CLIENT_VERSION)]
    client_version: u32,

    /// Tiles to request once logged in, as x,y,width,height
    #[arg(long)]
    area: Option<Area>,

    /// Log level (trace, debug, info, warn, error); `RUST_LOG` overrides it
    #[arg(short, long, default_value = "info")]
    log_level: Level,
}

/// Accepts any asset version; the probe renders nothing.
struct AnyVersion(u32);

impl AssetLoader for AnyVersion {
    fn current_version(&self) -> u32 {
        self.0
    }

    fn load_version(&mut self, version: u32) -> Result<(), AssetLoadError> {
        info!(from = self.0, to = version, "Switching asset version");
        self.0 = version;
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(args.log_level).into())
        .from_env_lossy();
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let transport = TransportService::new()?;
    let config = ClientConfig {
        host: args.host,
        port: args.port,
        name: args.name,
        password: args.password,
        client_version: args.client_version,
        ..Default::default()
    };
    let (handle, mut pump) = connect(&transport, config)?;

    let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
    transport.handle().spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = stop_tx.send(());
        }
    });

    let mut editor = MemoryEditor::new(MemoryMap::default());
    let mut observer = TracingObserver;
    let mut loader = AnyVersion(args.client_version);
    let mut area = args.area;
    let mut tiles = 0;

    while !pump.is_closed() {
        pump.pump_timeout(
            Duration::from_millis(100),
            &mut editor,
            &mut observer,
            &mut loader,
        );

        if stop_rx.try_recv().is_ok() {
            handle.close();
        }

        if handle.is_active()
            && let Some(a) = area.take()
        {
            for y in (a.y..a.y.saturating_add(a.height)).step_by(LEAF_SIZE as usize) {
                for x in (a.x..a.x.saturating_add(a.width)).step_by(LEAF_SIZE as usize) {
                    handle.query_node(x, y, false);
                    handle.query_node(x, y, true);
                }
            }
            let count = handle.flush_node_requests()?;
            info!(count, "Requested nodes");
        }

        let now = editor.memory_map().tile_count();
        if now != tiles {
            tiles = now;
            info!(tiles, leaves = editor.memory_map().leaf_count(), "Mirror updated");
        }
    }

    info!(tiles, "Probe finished");
    Ok(())
}
