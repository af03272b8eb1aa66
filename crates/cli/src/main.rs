mod config_commands;

use std::{path::PathBuf, sync::Arc, time::Duration};

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    tracing::{error, info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use {
    relay_channels::{MediaFetcher, SessionOutbound, SessionStatus, inbound_channel},
    relay_config::{RelayConfig, Severity},
    relay_delivery::{DeliveryQueue, HttpWebhookSender, Relay, RetryPolicy},
    relay_gateway::AppState,
    relay_whatsapp::WhatsAppSession,
};

/// How long shutdown waits for queued events to reach the webhook.
const DRAIN_GRACE: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(
    name = "wa-relay",
    version,
    about = "Relay WhatsApp messages to an n8n webhook"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (default: discover relay.{toml,yaml,yml,json}).
    #[arg(long, global = true, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind to (overrides config value).
    #[arg(long, global = true)]
    bind: Option<String>,
    /// Port to listen on (overrides config value).
    #[arg(long, global = true)]
    port: Option<u16>,
    /// Webhook that receives inbound events (overrides config value).
    #[arg(long, global = true)]
    webhook_url: Option<String>,
    /// Connect to an already running sidecar instead of spawning one.
    #[arg(long, global = true, default_value_t = false)]
    no_sidecar: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay (default when no subcommand is provided).
    Serve,
    /// Validate the configuration and report errors/warnings.
    CheckConfig {
        /// Show informational diagnostics in addition to errors and warnings.
        #[arg(long)]
        verbose: bool,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

/// File (or defaults), then environment, then flags.
fn effective_config(cli: &Cli) -> anyhow::Result<RelayConfig> {
    let mut config = match &cli.config {
        Some(path) => relay_config::load_config(path)?,
        None => relay_config::discover_and_load(),
    };
    relay_config::apply_env_overrides(&mut config)?;

    if let Some(bind) = &cli.bind {
        config.server.bind = bind.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(url) = &cli.webhook_url {
        config.webhook.url = Some(url.clone());
    }
    if cli.no_sidecar {
        config.session.auto_start_sidecar = false;
    }
    Ok(config)
}

/// Log every diagnostic; refuse to start on errors.
fn ensure_valid(config: &RelayConfig) -> anyhow::Result<()> {
    let result = relay_config::validate::validate_config(config);
    for d in &result.diagnostics {
        match d.severity {
            Severity::Error => error!(path = %d.path, "{}", d.message),
            Severity::Warning => warn!(path = %d.path, "{}", d.message),
            Severity::Info => info!(path = %d.path, "{}", d.message),
        }
    }
    if result.has_errors() {
        anyhow::bail!(
            "invalid configuration ({} error(s)); run `wa-relay check-config` for details",
            result.count(Severity::Error)
        );
    }
    Ok(())
}

async fn serve(config: RelayConfig) -> anyhow::Result<()> {
    ensure_valid(&config)?;

    #[cfg(feature = "metrics")]
    let metrics_handle = relay_metrics::init_metrics(relay_metrics::MetricsRecorderConfig {
        enabled: config.metrics.enabled,
        global_labels: vec![("session".into(), config.session.name.clone())],
    })?;

    let sender = HttpWebhookSender::from_config(&config.webhook)?;
    info!(
        url = %sender.url(),
        timeout_secs = config.webhook.request_timeout_secs,
        "delivering inbound events"
    );
    let queue = DeliveryQueue::new(Arc::new(sender), RetryPolicy::from(&config.delivery));

    let (inbound_tx, inbound_rx) = inbound_channel();
    let session = Arc::new(WhatsAppSession::new(config.session.clone(), inbound_tx));
    let relay = Relay::new(
        Arc::clone(&session) as Arc<dyn MediaFetcher>,
        Arc::clone(&queue),
    );
    let pump = relay.spawn(inbound_rx);

    session
        .start()
        .await
        .context("failed to start the WhatsApp session")?;

    let state = AppState::new(
        Arc::clone(&session) as Arc<dyn SessionOutbound>,
        Arc::clone(&session) as Arc<dyn SessionStatus>,
        Arc::clone(&queue) as Arc<dyn relay_delivery::StatusReporter>,
    );
    #[cfg(feature = "metrics")]
    let state = state.with_metrics_handle(metrics_handle);

    let served = relay_gateway::start_server(
        &config.server.bind,
        config.server.port,
        state,
        shutdown_signal(),
    )
    .await;

    info!(pending = queue.len(), "shutting down, draining delivery queue");
    if tokio::time::timeout(DRAIN_GRACE, queue.wait_idle())
        .await
        .is_err()
    {
        warn!(
            pending = queue.len(),
            grace_secs = DRAIN_GRACE.as_secs(),
            "delivery queue not drained, dropping remaining events"
        );
    }

    if let Err(e) = session.stop().await {
        warn!(error = %e, "failed to stop WhatsApp session cleanly");
    }
    pump.abort();
    served
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    let config = effective_config(&cli)?;

    match cli.command {
        None | Some(Commands::Serve) => {
            info!(version = env!("CARGO_PKG_VERSION"), "wa-relay starting");
            serve(config).await
        },
        Some(Commands::CheckConfig { verbose }) => {
            config_commands::check(cli.config.as_deref(), &config, verbose)
        },
    }
}
