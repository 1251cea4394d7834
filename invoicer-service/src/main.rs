use invoicer_core::observability::init_tracing;
use invoicer_service::config::ServiceConfig;
use invoicer_service::startup::Application;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServiceConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );

    let app = Application::build(config).await?;
    app.run_until_stopped().await?;

    Ok(())
}
