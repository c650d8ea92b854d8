use clap::Parser;
use fantasy_gateway::{
    config::GatewayConfig,
    observability::{logging::init_logging, metrics::start_prometheus},
    server,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GatewayConfig::parse();
    init_logging(&config.log_level, config.log_json);
    config.validate()?;

    if let Some(addr) = config.prometheus_addr() {
        start_prometheus(addr)?;
    }

    server::run(config).await
}
