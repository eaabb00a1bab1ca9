use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use file_storage_server::{
    backend::create_admin_client, config::Config, create_app, handlers::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "file_storage_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let backend = create_admin_client(&config.backend)?;
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let app = create_app(AppState::new(config, backend));

    tracing::info!("++ Starting file storage server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
