#[cfg(feature = "server")]
use std::path::PathBuf;

#[cfg(feature = "server")]
use clap::Parser;

#[cfg(feature = "server")]
const DEFAULT_LISTEN: &str = "127.0.0.1:8080";

/// Serves viewer tokens and model upload/translation routes backed by APS.
#[cfg(feature = "server")]
#[derive(Debug, Parser)]
#[command(name = "aps-bridge", version)]
struct Args {
    /// TOML file with credentials and endpoint settings.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Dotenv file layered over the process environment.
    #[arg(long)]
    dotenv: Option<PathBuf>,
    /// Listen address; falls back to `PORT` from the environment.
    #[arg(long, alias = "addr")]
    listen: Option<String>,
    #[arg(long)]
    json_logs: bool,
}

#[cfg(feature = "server")]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use aps_bridge::server::{BridgeHttpState, logging, router};
    use aps_bridge::{Aps, BridgeConfig, Env};

    let args = Args::parse();
    logging::init_tracing(args.json_logs)?;

    let env = match args.dotenv.as_deref() {
        Some(path) => Env::load_dotenv(path)?,
        None => {
            let default_path = std::path::Path::new(".env");
            if default_path.is_file() {
                Env::load_dotenv(default_path)?
            } else {
                Env::default()
            }
        }
    };
    let config = match args.config.as_deref() {
        Some(path) => BridgeConfig::load(path)?.resolve(&env)?,
        None => BridgeConfig::from_env(&env)?,
    };
    tracing::debug!(?config, "configuration resolved");

    let listen = match args.listen {
        Some(listen) => listen,
        None => match env.get("PORT") {
            Some(port) => format!("0.0.0.0:{}", port.trim()),
            None => DEFAULT_LISTEN.to_string(),
        },
    };

    let aps = Aps::new(&config)?;
    tracing::info!(bucket = aps.bucket_key(), region = ?config.region, "aps client ready");

    let app = router(BridgeHttpState::new(aps));
    let listener = tokio::net::TcpListener::bind(&listen).await?;
    tracing::info!(%listen, "aps-bridge listening");
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(not(feature = "server"))]
fn main() {
    eprintln!("server feature disabled; rebuild with --features server");
}
