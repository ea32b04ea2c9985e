use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use judger::config::{CliArgs, Config, StagingConfig};
use judger::executor::SandboxExecutor;
use judger::judge::VerdictAggregator;
use judger::sandbox::DockerRuntime;
use judger::web_server::build_server;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = CliArgs::parse();
    let config = cli.to_config().context("Failed to load configuration")?;
    let staging = StagingConfig::from_env();
    let languages = Arc::new(config.language_registry());

    let Config {
        server: server_config,
        sandbox: sandbox_settings,
        ..
    } = config;

    let runtime = DockerRuntime::connect()
        .await
        .context("Failed to initialize the sandbox runtime")?;

    log::info!("Staging artifacts under {}", staging.root.display());
    let mut language_ids: Vec<_> = languages.ids().collect();
    language_ids.sort_unstable();
    log::info!("Supported languages: {}", language_ids.join(", "));

    let executor = SandboxExecutor::new(Arc::new(runtime), languages, sandbox_settings, staging);
    let aggregator = VerdictAggregator::new(Arc::new(executor));

    let (address, port) = server_config.address();
    let server = build_server(&server_config, aggregator).context("Failed to build server")?;
    log::info!("Judge service listening on {address}:{port}");

    let server_handle = server.handle();
    let server_task = actix_web::rt::spawn(server);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            log::info!("Ctrl-c received, shutting down...");
        }
        res_server = server_task => {
            log::error!("Server terminated unexpectedly: {:?}", res_server);
        }
    }

    server_handle.stop(true).await;
    log::info!("Shutdown complete");
    Ok(())
}
