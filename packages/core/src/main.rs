use std::sync::Arc;

use clap::Parser;
use dotenvy::dotenv;
use tokio::sync::watch;

use bolus_monitor::cli::Cli;
use bolus_monitor::config::Config;
use bolus_monitor::error::AppError;
use bolus_monitor::logging::init_logging;
use bolus_monitor::monitor::BolusMonitor;
use bolus_monitor::scheduler::{forward_shutdown, run_monitor};
use bolus_monitor::services::{NightscoutClient, PushoverClient};

#[tokio::main]
async fn main() {
    dotenv().ok();
    init_logging();

    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        tracing::error!("{}", err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let config = Config::from_env()?.with_cli(&cli)?;

    tracing::info!(
        "Monitoring {} (bolus window {}s, lookback {}s, loop {}s{})",
        config.nightscout.base_url,
        config.monitor.bolus_window.num_seconds(),
        config.monitor.lookback_limit.num_seconds(),
        config.monitor.loop_time.as_secs(),
        if config.monitor.dry_run { ", dry run" } else { "" },
    );

    let nightscout = Arc::new(NightscoutClient::new(&config.nightscout, config.http_timeout)?);
    let pushover = Arc::new(PushoverClient::new(&config.pushover, config.http_timeout)?);

    let monitor = BolusMonitor::new(
        &config.monitor,
        config.nightscout.device.clone(),
        nightscout,
        pushover,
    );

    if cli.once {
        let report = monitor.poll_once().await;
        tracing::info!("Single cycle finished: {:?}", report.alert);
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(forward_shutdown(tokio::signal::ctrl_c(), shutdown_tx));

    run_monitor(monitor, config.monitor.loop_time, shutdown_rx).await;
    Ok(())
}
