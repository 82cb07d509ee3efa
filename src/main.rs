use std::sync::Arc;

use gatehouse::config::GateConfig;
use gatehouse::identity::HttpIdentityClient;
use gatehouse::routes;
use gatehouse::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = GateConfig::from_env();
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()
        .expect("invalid PORT");

    tracing::info!(identity = %config.identity_base_url, "identity service configured");

    let identity = Arc::new(HttpIdentityClient::new(&config.identity_base_url));
    let state = AppState::new(config, identity);

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "gatehouse listening");
    axum::serve(listener, app).await.expect("server failed");
}
