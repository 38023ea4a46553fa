// diagnosis-service-rs/src/main.rs
// Main entry point for the diagnosis service

use std::sync::Arc;

use dotenv::dotenv;

use diagnosis_service::{app, AppState, LLMClient, ServiceSettings};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = ServiceSettings::from_env();
    log::info!("Loaded settings: {:?}", settings);

    let client = LLMClient::new(&settings)?;
    let state = AppState::new(Arc::new(client), settings.policy.clone());

    let addr = config_rs::get_bind_address("DIAGNOSIS", config_rs::get_default_port("DIAGNOSIS"));
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    log::info!(
        "{} listening on {}",
        config_rs::get_formatted_service_name("DIAGNOSIS"),
        addr
    );

    axum::serve(listener, app(state)).await?;

    Ok(())
}
