use anyhow::Result;
use bucket_browser::{
    config::{AppConfig, Credentials},
    routes,
    services::s3_store::S3ObjectStore,
    state::AppState,
};
use std::{io::ErrorKind, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config ---
    let cfg = AppConfig::from_env_and_args()?;

    tracing::info!("Starting bucket-browser with config: {:?}", cfg);

    // --- Load credentials; refuse to start without them ---
    let credentials = Credentials::load(&cfg.credentials_path)?;
    tracing::info!(
        "Configuring S3 client with endpoint: {}, access key: {}",
        credentials.endpoint(),
        credentials.masked_access_key()
    );

    // --- Initialize object store client ---
    let store = S3ObjectStore::connect(&credentials).await;
    let mut state = AppState::new(Arc::new(store));
    if let Some(dir) = &cfg.spool_dir {
        state = state.with_spool_dir(dir);
    }

    // --- Build router ---
    let app = routes::routes::app(state, cfg.max_upload_bytes);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
