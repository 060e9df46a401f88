use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use prometheus::Registry;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use x509watch::config::Config;
use x509watch::metrics::prom::PromPublisher;
use x509watch::scan::ScanOrchestrator;
use x509watch::source::{source_for, CertificateSource};
use x509watch::{logging, server, ExporterError};

/// Exports the validity windows of X.509 certificates on disk as Prometheus metrics.
#[derive(Parser, Debug)]
#[command(name = "x509watch", version, about, long_about = None)]
#[command(after_help = "Examples:\n  \
    x509watch --cert-file=/path/to/cert.pem\n  \
    x509watch --cert-dir=/etc/vault/certs --interval=1m --log-level=debug")]
struct Cli {
    /// HTTP listen address (host:port or :port) [default: 0.0.0.0:9101]
    #[arg(long, env = "X509WATCH_LISTEN")]
    listen: Option<String>,

    /// Path to a certificate file (PEM/DER)
    #[arg(long, env = "X509WATCH_CERT_FILE", conflicts_with = "cert_dir")]
    cert_file: Option<PathBuf>,

    /// Path to a directory containing certificates
    #[arg(long, env = "X509WATCH_CERT_DIR")]
    cert_dir: Option<PathBuf>,

    /// Scan interval, e.g. 30s or 5m (0s = only once at startup) [default: 0s]
    #[arg(long, env = "X509WATCH_INTERVAL")]
    interval: Option<String>,

    /// Log level: debug, info, warn, error [default: info]
    #[arg(long, env = "X509WATCH_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: text, json [default: text]
    #[arg(long, env = "X509WATCH_LOG_FORMAT")]
    log_format: Option<String>,

    /// Only export aggregate series, no per-certificate labels
    #[arg(long, env = "X509WATCH_NO_PER_CERT_METRICS")]
    no_per_cert_metrics: bool,

    /// Path to a TOML configuration file
    #[arg(short, long, env = "X509WATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Print an example configuration file and exit
    #[arg(long)]
    print_example_config: bool,
}

impl Cli {
    fn to_config(&self) -> Config {
        Config::from_cli_args(
            self.listen.clone(),
            self.cert_file.clone(),
            self.cert_dir.clone(),
            self.interval.clone(),
            self.log_level.clone(),
            self.log_format.clone(),
            self.no_per_cert_metrics.then_some(false),
        )
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.print_example_config {
        println!("{}", Config::example_toml());
        return Ok(());
    }

    let mut config = Config::defaults();
    if let Some(path) = &cli.config {
        let file = Config::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?;
        config = config.merge_with(file);
    }
    let settings = config
        .merge_with(cli.to_config())
        .validate()
        .map_err(ExporterError::from)?;

    logging::init_tracing(settings.log_level, settings.log_format)?;

    let registry = Registry::new();
    #[cfg(target_os = "linux")]
    registry.register(Box::new(
        prometheus::process_collector::ProcessCollector::for_self(),
    ))?;

    let publisher = Arc::new(
        PromPublisher::new(registry)?.per_certificate_metrics(settings.per_certificate_metrics),
    );
    publisher.set_build_info(
        env!("CARGO_PKG_VERSION"),
        option_env!("X509WATCH_REVISION").unwrap_or("unknown"),
        &format!("{}/{}", std::env::consts::OS, std::env::consts::ARCH),
    );

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    let source: Arc<dyn CertificateSource> = Arc::from(source_for(settings.location.clone()));
    info!(location = %source.location().display(), "certificate source configured");

    let orchestrator = ScanOrchestrator::new(
        source,
        publisher.clone(),
        settings.interval,
        cancel.clone(),
    );
    let scans = tokio::spawn(async move { orchestrator.run().await });

    let served = server::serve(settings.listen, publisher, cancel.clone()).await;
    cancel.cancel();
    if let Err(e) = scans.await {
        warn!(error = %e, "scan task ended abnormally");
    }

    served?;
    info!("x509watch shut down");
    Ok(())
}

async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received");
    cancel.cancel();
}
