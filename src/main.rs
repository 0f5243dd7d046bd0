// Geosocial Server

use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use geosocial::{app_state::AppState, config::Config, create_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("geosocial=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;
    let app_state = AppState::new(config.clone()).await?;

    let app = create_router(app_state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    let addr = config.server_address();
    let listener = TcpListener::bind(&addr).await?;
    info!("Geosocial server listening on http://{}", addr);
    info!(
        "Nearby queries default to {} km; co-location radius {} m",
        config.proximity.default_radius_km, config.proximity.co_location_radius_m
    );

    axum::serve(listener, app).await?;
    Ok(())
}
