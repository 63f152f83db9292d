use course_forge::{app, config::Settings, AppState};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let settings = Settings::from_env();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&settings.log_filter))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if settings.openai_api_key.is_empty() {
        tracing::warn!("OPENAI_API_KEY is not set; generation requests will be rejected upstream");
    }
    tracing::info!(model=%settings.openai_model, base_url=%settings.openai_base_url, "generation client configured");

    let app = app(AppState::from_settings(&settings));

    let addr = format!("0.0.0.0:{}", settings.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
