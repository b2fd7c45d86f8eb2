use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use satproc::api::create_router;
use satproc::{Config, Processor};

#[derive(Parser, Debug)]
#[command(name = "api-server")]
#[command(about = "HTTP API for satellite raster processing")]
struct Args {
    #[command(flatten)]
    config: Config,

    /// Log level when RUST_LOG is unset
    #[arg(long, default_value = "info", env = "SATPROC_LOG_LEVEL")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = args.config;
    config.ensure_dirs()?;

    let listener = tokio::net::TcpListener::bind(config.listen.as_str()).await?;
    info!(
        listen = %config.listen,
        prefix = %config.api_prefix,
        output_dir = %config.output_dir.display(),
        "starting {}",
        config.project_name
    );

    let app = create_router(Processor::new(config));
    axum::serve(listener, app).await?;
    Ok(())
}
