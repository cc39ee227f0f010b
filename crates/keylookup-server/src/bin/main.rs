//! keylookup-server binary
//!
//! Run with:
//! ```bash
//! cargo run -p keylookup-server -- --base-dir ./key-data --port 11371
//! ```

use clap::Parser;
use keylookup_core::ServiceConfig;
use keylookup_server::ServerBuilder;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "keylookup-server")]
#[command(about = "Serve public key lookups over HTTP")]
struct Args {
    /// JSON configuration file; overrides --base-dir
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding records.json and keys/
    #[arg(long, default_value = "./key-data")]
    base_dir: PathBuf,

    /// Listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Page size for store queries (0 for unbounded)
    #[arg(long)]
    page_limit: Option<u32>,

    /// Serve Prometheus metrics on /metrics
    #[arg(long)]
    metrics: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("keylookup_server=info".parse()?)
                .add_directive("keylookup_core=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ServiceConfig::load(path)?,
        None => ServiceConfig::from_base_dir(&args.base_dir),
    };
    if args.page_limit.is_some() {
        config = config.with_page_limit(args.page_limit);
    }
    if let Some(port) = args.port {
        config = config.with_port(port);
    }

    let mut builder = ServerBuilder::new(config);
    if args.metrics {
        builder = builder.with_metrics();
    }
    let server = builder.build()?;

    tracing::info!("Server ready on {}", server.addr());
    server.run().await?;

    Ok(())
}
