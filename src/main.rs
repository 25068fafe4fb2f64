use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::Parser;
use tokio::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::mpsc;

use hubsync::config;
use hubsync::engine::Engine;
use hubsync::error::HubResult;
use hubsync::host::adapter::HostAdapter;
use hubsync::host::logging::LogHost;
use hubsync::hub::client::HubClient;
use hubsync::hub::listener::HubListener;

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: Utf8PathBuf,
}

/*
 * Formatter function to output in syslog format. This makes sense when running
 * as a service (where output might go to a log file, or the system journal)
 */
#[allow(clippy::match_same_arms)]
fn syslog_format(
    buf: &mut pretty_env_logger::env_logger::fmt::Formatter,
    record: &log::Record,
) -> std::io::Result<()> {
    writeln!(
        buf,
        "<{}>{}: {}",
        match record.level() {
            log::Level::Error => 3,
            log::Level::Warn => 4,
            log::Level::Info => 6,
            log::Level::Debug => 7,
            log::Level::Trace => 7,
        },
        record.target(),
        record.args()
    )
}

fn init_logging() -> HubResult<()> {
    /* Try to provide reasonable default filters, when RUST_LOG is not specified */
    const DEFAULT_LOG_FILTERS: &[&str] = &["debug", "tungstenite=info", "tokio_tungstenite=info"];

    let log_filters = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTERS.join(","));

    /* Detect if we need syslog or human-readable formatting */
    if std::env::var("SYSTEMD_EXEC_PID").is_ok_and(|pid| pid == std::process::id().to_string()) {
        Ok(pretty_env_logger::env_logger::builder()
            .format(syslog_format)
            .parse_filters(&log_filters)
            .try_init()?)
    } else {
        Ok(pretty_env_logger::formatted_timed_builder()
            .parse_filters(&log_filters)
            .try_init()?)
    }
}

async fn wait_for_shutdown() -> HubResult<()> {
    let mut sigterm = signal::unix::signal(SignalKind::terminate())?;

    tokio::select! {
        res = signal::ctrl_c() => {
            res?;
            log::warn!("Ctrl-C pressed, exiting..");
        }
        _ = sigterm.recv() => log::warn!("SIGTERM received, exiting.."),
    }
    let _ = std::io::stderr().flush();

    Ok(())
}

async fn run() -> HubResult<()> {
    init_logging()?;

    let args = Args::parse();

    let config = config::parse(&args.config)?;
    log::debug!("Configuration loaded successfully");

    let (tx, rx) = mpsc::unbounded_channel();
    let engine = Arc::new(Engine::new(tx).with_discovery(config.listener.discovery));

    let host = Arc::new(LogHost);
    let mut adapter = HostAdapter::new(host.clone(), host.clone(), host.clone());
    if config.listener.discovery {
        adapter = adapter.with_discovery(host);
    }
    let adapter_task = tokio::spawn(adapter.run(rx));

    let client = HubClient::new("hub", &config.hub)?;
    log::info!("Connecting to hub at {}", client.url());

    let delay = Duration::from_secs(config.listener.reconnect_delay_secs.get().into());
    let handle = HubListener::new(client, engine.clone())
        .with_reconnect_delay(delay)
        .spawn();

    if config.listener.area_sync_on_start {
        let count = engine.sync_all_device_areas();
        log::info!("Requested area sync for {count} devices");
    }

    wait_for_shutdown().await?;

    handle.stop().await?;

    /* the engine holds the last intent sender */
    drop(engine);
    adapter_task.await?;

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        log::error!("Hubsync error: {err}");
        log::error!("Fatal error encountered, cannot continue.");
    }
}
