use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use axum::Router;
use clap::Parser;
use minisites::{app::build, state::AppState};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version)]
struct Cli {
    #[arg(long, default_value = "./minisites.sqlite")]
    sqlite_path: String,

    #[arg(long, default_value = "./static/uploads")]
    upload_dir: String,

    #[arg(long, default_value_t = 8000)]
    port: u16,

    #[arg(long, default_value = "127.0.0.1")]
    bind_address: String,

    /// Largest multipart body accepted by the admin API, in MiB
    #[arg(long, default_value_t = 64)]
    max_upload_mib: usize,
}

#[tokio::main]
async fn main() -> Result<(), axum::BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    tracing::info!("Uploads stored at {}", cli.upload_dir);
    tokio::fs::create_dir_all(&cli.upload_dir).await?;

    tokio::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&cli.sqlite_path)
        .await?;

    let max_upload_bytes = cli.max_upload_mib.saturating_mul(1024 * 1024);
    let state = AppState::new(&cli.sqlite_path, &cli.upload_dir, max_upload_bytes).await?;
    state.db.migrate().await?;

    let addr = IpAddr::from_str(&cli.bind_address)?;
    let addr = SocketAddr::from((addr, cli.port));
    let app = build(state.clone());

    webserver(addr, app).await?;
    state.db.close().await;
    Ok(())
}

async fn webserver(addr: SocketAddr, app: Router) -> Result<(), axum::BoxError> {
    tracing::info!("Listening on {}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for ctrl-c: {err:?}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
