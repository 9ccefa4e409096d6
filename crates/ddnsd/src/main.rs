// # ddnsd - DDNS Daemon
//
// Thin integration layer. All record logic lives in ddns-core; the DNS and
// HTTP crates adapt their wire formats. This binary is responsible for:
//
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Opening the record store and building the control plane
// 4. Running the DNS and control listeners until a shutdown signal
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Listeners
// - `DDNS_BIND_ADDR`: Address both listeners bind to (default 0.0.0.0)
// - `DDNS_DNS_PORT`: DNS UDP port (default 53)
// - `DDNS_CONTROL_PORT`: Control API TCP port (default 8080)
// - `DDNS_USE_HTTPS`: Serve the control API over TLS
// - `DDNS_TLS_CERT` / `DDNS_TLS_KEY`: PEM files (default cert.pem / key.pem)
//
// ### Access
// - `DDNS_UPDATE_API_KEY`: Key allowed to call /UPDATE
// - `DDNS_DELETE_API_KEY`: Key allowed to call /DELETE
//
// ### Callback
// - `DDNS_CALLBACK_ENABLED`: Notify a webhook when an address changes
// - `DDNS_CALLBACK_URL`: Webhook URL (required when enabled)
// - `DDNS_CALLBACK_API_KEY`: Value sent as `ApiKey` in the payload
//
// ### Record Store
// - `DDNS_RECORD_STORE_TYPE`: file or memory (default file)
// - `DDNS_RECORD_FILE`: Record file path (default ddns.dat)
// - `DDNS_DURABLE`: Fail mutations whose snapshot write fails
//
// ## Example
//
// ```bash
// export DDNS_UPDATE_API_KEY=$(openssl rand -hex 16)
// export DDNS_DELETE_API_KEY=$(openssl rand -hex 16)
// export DDNS_RECORD_FILE=/var/lib/ddns/ddns.dat
// export DDNS_USE_HTTPS=1
// export DDNS_TLS_CERT=/etc/ddns/cert.pem
// export DDNS_TLS_KEY=/etc/ddns/key.pem
//
// ddnsd
// ```

use anyhow::{Context, Result};
use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::net::{TcpListener, UdpSocket};
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use ddns_control_http::{TlsAcceptor, WebhookNotifier, serve_http, serve_https, tls_acceptor};
use ddns_core::persist::file::DEFAULT_RECORD_FILE;
use ddns_core::{
    ApiKeyTable, CallbackConfig, ControlConfig, ControlPlane, FileRecordLog, MemoryRecordLog,
    Permission, RecordLog, RecordStore, StoreConfig,
};
use ddns_dns_server::DnsResponder;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DdnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DdnsExitCode> for ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    bind_addr: IpAddr,
    dns_port: u16,
    control_port: u16,
    use_https: bool,
    tls_cert: PathBuf,
    tls_key: PathBuf,
    update_api_key: String,
    delete_api_key: String,
    callback_enabled: bool,
    callback_url: Option<String>,
    callback_api_key: String,
    record_store_type: String,
    record_file: PathBuf,
    durable: bool,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to
    /// its value
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|value| !value.is_empty());
        let flag = |name: &str| var(name).is_some_and(|value| parse_flag(&value));

        let port = |name: &str, default: u16| -> Result<u16> {
            match var(name) {
                Some(value) => value
                    .parse()
                    .with_context(|| format!("{} must be a port number. Got: {}", name, value)),
                None => Ok(default),
            }
        };

        let bind_addr: IpAddr = match var("DDNS_BIND_ADDR") {
            Some(value) => value
                .parse()
                .with_context(|| format!("DDNS_BIND_ADDR must be an IP address. Got: {}", value))?,
            None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };

        Ok(Self {
            bind_addr,
            dns_port: port("DDNS_DNS_PORT", 53)?,
            control_port: port("DDNS_CONTROL_PORT", 8080)?,
            use_https: flag("DDNS_USE_HTTPS"),
            tls_cert: var("DDNS_TLS_CERT")
                .unwrap_or_else(|| "cert.pem".to_string())
                .into(),
            tls_key: var("DDNS_TLS_KEY")
                .unwrap_or_else(|| "key.pem".to_string())
                .into(),
            update_api_key: var("DDNS_UPDATE_API_KEY").unwrap_or_default(),
            delete_api_key: var("DDNS_DELETE_API_KEY").unwrap_or_default(),
            callback_enabled: flag("DDNS_CALLBACK_ENABLED"),
            callback_url: var("DDNS_CALLBACK_URL"),
            callback_api_key: var("DDNS_CALLBACK_API_KEY").unwrap_or_default(),
            record_store_type: var("DDNS_RECORD_STORE_TYPE")
                .unwrap_or_else(|| "file".to_string()),
            record_file: var("DDNS_RECORD_FILE")
                .unwrap_or_else(|| DEFAULT_RECORD_FILE.to_string())
                .into(),
            durable: flag("DDNS_DURABLE"),
            log_level: var("DDNS_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// Checks everything that can be checked before binding sockets:
    /// ports, store type, file locations, TLS material presence, callback
    /// URL and API key sanity.
    fn validate(&self) -> Result<()> {
        if self.dns_port == 0 {
            anyhow::bail!("DDNS_DNS_PORT must be between 1 and 65535");
        }

        if self.control_port == 0 {
            anyhow::bail!("DDNS_CONTROL_PORT must be between 1 and 65535");
        }

        // Validate record store type
        match self.record_store_type.as_str() {
            "file" | "memory" => {}
            _ => anyhow::bail!(
                "DDNS_RECORD_STORE_TYPE '{}' is not supported. \
                Supported types: file, memory",
                self.record_store_type
            ),
        }

        // Check parent directory exists for the record file
        if self.record_store_type == "file"
            && let Some(parent) = self.record_file.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            anyhow::bail!(
                "DDNS_RECORD_FILE parent directory does not exist: {}. \
                    Create it first: sudo mkdir -p {}",
                parent.display(),
                parent.display()
            );
        }

        // TLS material is required up front under HTTPS
        if self.use_https {
            for (name, path) in [("DDNS_TLS_CERT", &self.tls_cert), ("DDNS_TLS_KEY", &self.tls_key)] {
                if !path.is_file() {
                    anyhow::bail!(
                        "{} does not point to a readable file: {}. \
                        HTTPS mode needs both a certificate and a key.",
                        name,
                        path.display()
                    );
                }
            }
        }

        if !self.update_api_key.is_empty() && self.update_api_key == self.delete_api_key {
            anyhow::bail!(
                "DDNS_UPDATE_API_KEY and DDNS_DELETE_API_KEY must differ; \
                one key can not carry both permissions"
            );
        }

        // Validate callback URL when callbacks are enabled
        if self.callback_enabled {
            let Some(url) = self.callback_url.as_deref() else {
                anyhow::bail!("DDNS_CALLBACK_URL is required when DDNS_CALLBACK_ENABLED is set");
            };

            if !url.starts_with("https://") && !url.starts_with("http://") {
                anyhow::bail!(
                    "DDNS_CALLBACK_URL must use HTTP or HTTPS scheme. Got: {}",
                    url
                );
            }

            // Warn if using HTTP (not HTTPS)
            if url.starts_with("http://") {
                eprintln!(
                    "WARNING: DDNS_CALLBACK_URL uses HTTP (not HTTPS). \
                    The callback API key will travel in clear text."
                );
            }
        }

        // Validate log level
        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "DDNS_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    fn dns_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.dns_port)
    }

    fn control_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.control_port)
    }

    fn store_config(&self) -> StoreConfig {
        StoreConfig {
            durable: self.durable,
        }
    }

    /// Core control configuration: API keys plus optional callback
    fn control_config(&self) -> Result<ControlConfig> {
        let keys = ApiKeyTable::new()
            .with_key(self.update_api_key.clone(), Permission::Update)?
            .with_key(self.delete_api_key.clone(), Permission::Delete)?;

        let mut config = ControlConfig::new(keys);
        if self.callback_enabled
            && let Some(url) = &self.callback_url
        {
            config = config.with_callback(CallbackConfig::new(
                url.clone(),
                self.callback_api_key.clone(),
            ));
        }

        Ok(config)
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return DdnsExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DdnsExitCode::ConfigError.into();
    }

    info!("Starting ddnsd daemon");

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdnsExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        let daemon = match Daemon::start(config).await {
            Ok(daemon) => daemon,
            Err(e) => {
                error!("Startup failed: {:#}", e);
                return DdnsExitCode::ConfigError;
            }
        };

        if let Err(e) = daemon.run().await {
            error!("Daemon error: {:#}", e);
            DdnsExitCode::RuntimeError
        } else {
            DdnsExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Everything bound and built, ready to serve
struct Daemon {
    store: Arc<RecordStore>,
    plane: Arc<ControlPlane>,
    dns_socket: UdpSocket,
    control_listener: TcpListener,
    tls: Option<TlsAcceptor>,
}

impl Daemon {
    /// Open the store, build the control plane and bind both listeners
    ///
    /// Any failure here is a startup failure.
    async fn start(config: Config) -> Result<Self> {
        let log: Box<dyn RecordLog> = match config.record_store_type.as_str() {
            "memory" => Box::new(MemoryRecordLog::new()),
            _ => Box::new(FileRecordLog::new(&config.record_file)),
        };
        let store = Arc::new(
            RecordStore::open(log, config.store_config())
                .await
                .context("Failed to load the record store")?,
        );

        let control_config = config.control_config()?;
        info!("Control configuration: {:?}", control_config);

        let mut plane = ControlPlane::new(store.clone(), control_config.clone())?;
        if let Some(callback) = &control_config.callback {
            let notifier = WebhookNotifier::from_config(callback)?;
            info!("Address-change callbacks enabled: {}", callback.url);
            plane = plane.with_notifier(Arc::new(notifier));
        }

        let tls = if config.use_https {
            Some(
                tls_acceptor(&config.tls_cert, &config.tls_key)
                    .context("HTTPS requested but TLS material is unusable")?,
            )
        } else {
            None
        };

        let dns_addr = config.dns_addr();
        let dns_socket = ddns_dns_server::bind(dns_addr)
            .await
            .with_context(|| format!("Failed to bind DNS listener at udp://{}", dns_addr))?;

        let control_addr = config.control_addr();
        let control_listener = TcpListener::bind(control_addr)
            .await
            .with_context(|| format!("Failed to bind control listener at {}", control_addr))?;

        Ok(Self {
            store,
            plane: Arc::new(plane),
            dns_socket,
            control_listener,
            tls,
        })
    }

    /// Run both listeners until SIGINT/SIGTERM
    ///
    /// A listener that ends is reported and does not stop the other one.
    async fn run(self) -> Result<()> {
        let responder = DnsResponder::new(self.store.clone());
        let dns_socket = self.dns_socket;
        tokio::spawn(async move {
            match responder.serve(dns_socket).await {
                Ok(()) => warn!("DNS listener stopped"),
                Err(e) => error!("DNS listener failed: {}", e),
            }
        });

        let plane = self.plane.clone();
        let listener = self.control_listener;
        let tls = self.tls;
        tokio::spawn(async move {
            let result = match tls {
                Some(acceptor) => serve_https(listener, acceptor, plane).await,
                None => serve_http(listener, plane).await,
            };
            match result {
                Ok(()) => warn!("Control listener stopped"),
                Err(e) => error!("Control listener failed: {}", e),
            }
        });

        info!("Daemon initialized successfully");

        let signal = wait_for_shutdown().await?;
        info!("Received shutdown signal: {}", signal);
        info!(
            "Shutting down daemon ({} records in store)",
            self.store.len().await
        );

        Ok(())
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    // Set up signal handlers for SIGTERM and SIGINT
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let signal = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };

    Ok(signal)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
