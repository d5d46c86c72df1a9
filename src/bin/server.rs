use clap::Parser;
use intake::{DiskSink, UploadService, ValidationPolicy};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "intake-server", about = "Streaming multipart upload service")]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:3000")]
    addr: SocketAddr,

    /// Storage root; overrides UPLOAD_STORAGE_ROOT.
    #[arg(long)]
    storage_root: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut policy = ValidationPolicy::from_env();
    if let Some(root) = args.storage_root {
        policy = policy.storage_root(root);
    }

    let sink = Arc::new(DiskSink::new(policy.storage_root_path()));
    let service = Arc::new(UploadService::new(policy, sink));

    let listener = TcpListener::bind(args.addr).await?;
    log::info!("listening on {}", args.addr);

    service.serve(listener).await?;

    Ok(())
}
