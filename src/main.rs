//! bifrost - dual-layer (L4/L7) reverse proxy and load balancer
//!
//! Accepts TCP connections on a single listener, classifies each as raw
//! TCP or HTTP by peeking its first bytes, selects a healthy backend from
//! the appropriate pool via one of four interchangeable balancing
//! algorithms, and splices bytes bidirectionally between client and
//! backend. A background health checker drives backend liveness
//! independently of the request path.

use anyhow::Result;

use bifrost::cli::{Cli, EffectiveCommand};
use bifrost::{config, logging, supervisor};

async fn run(cli: Cli) -> Result<()> {
    let log_level = match cli.effective_command() {
        EffectiveCommand::Run => {
            match config::Config::resolve_config_path(cli.config.as_deref()) {
                Ok(path) => match config::Config::load_from_file(&path).await {
                    Ok(loaded) => loaded.log_level,
                    Err(_) => "info".to_string(),
                },
                Err(_) => "info".to_string(),
            }
        }
        EffectiveCommand::Check => "info".to_string(),
    };
    let log_level = if cli.verbose { "debug".to_string() } else { log_level };

    logging::init_logging(&log_level)?;

    log::info!("bifrost v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.effective_command() {
        EffectiveCommand::Run => {
            supervisor::run_foreground(cli.config.as_deref()).await?;
        }
        EffectiveCommand::Check => {
            config::validate_config_file(cli.config).await?;
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(cli))
}
