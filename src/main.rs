//! # anchor-demo
//!
//! Drives an anchor coordinator against the simulated host from stdin.
//!
//! ```bash
//! # Defaults, state kept in the platform data directory
//! anchor-demo
//!
//! # Explicit config and state directory
//! anchor-demo --config anchors.toml --data-dir ./anchor-state
//! ```
//!
//! Saved anchors survive a restart: run `create --persist 0 0 1`, `quit`,
//! start again and `reload`.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use xr_anchors::cli::{Command, Session, HELP};
use xr_anchors::config::{self, AppConfig};
use xr_anchors::sim::{HostVault, SimConfig, SimulatedHost};
use xr_anchors::{
    AnchorCoordinator, ContentPlacer, CoordinatorConfig, FileIdentifierStore, Point3D, Pose,
};

const VAULT_FILE_NAME: &str = "host_vault.json";
const STORE_FILE_NAME: &str = "anchors.json";

#[derive(Parser, Debug)]
#[command(name = "anchor-demo")]
#[command(about = "Create, persist, reload and erase spatial anchors against a simulated host")]
#[command(version)]
struct Args {
    /// Configuration file (defaults to $XR_ANCHORS_CONFIG or the platform config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for the identifier store and the simulated host's storage
    #[arg(short, long)]
    data_dir: Option<PathBuf>,
}

fn init_logging(level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(level))
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let app_config = match &args.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::load()?,
    };
    init_logging(&app_config.logging.level);

    let data_dir = args.data_dir.clone().unwrap_or_else(config::data_dir);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

    let store_path = match &args.data_dir {
        Some(dir) if app_config.store.path.is_none() => dir.join(STORE_FILE_NAME),
        _ => app_config.store_path(),
    };
    let vault_path = data_dir.join(VAULT_FILE_NAME);
    let vault = Arc::new(HostVault::open(&vault_path)?);
    info!(
        "Using identifier store {} and host vault {}",
        store_path.display(),
        vault_path.display()
    );

    let host = Arc::new(SimulatedHost::with_vault(SimConfig::default(), vault));
    let coordinator = AnchorCoordinator::new(
        host,
        Arc::new(FileIdentifierStore::new(store_path)),
        CoordinatorConfig::from(&app_config.coordinator),
    )?;
    let placer = ContentPlacer::new(
        Point3D::from_array(app_config.placement.base_point),
        Pose::from_position(Point3D::from_array(app_config.placement.content_position)),
    );
    let mut session = Session::new(coordinator, placer);

    println!("{}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = std::io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{:#}", e);
                continue;
            }
        };
        if !session.execute(command, &mut stdout).await? {
            break;
        }
    }

    let torn_down = session.coordinator().teardown_active_anchors().await;
    info!("Session ended, released {} anchor(s)", torn_down);
    Ok(())
}
