use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::info;

use parkslot::engine::EngineConfig;
use parkslot::tenant::TenantManager;
use parkslot::wire;

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let metrics_port: Option<u16> = std::env::var("PARKSLOT_METRICS_PORT")
        .ok()
        .and_then(|s| s.parse().ok());
    parkslot::observability::init(metrics_port)?;

    let port = std::env::var("PARKSLOT_PORT").unwrap_or_else(|_| "5433".into());
    let bind = std::env::var("PARKSLOT_BIND").unwrap_or_else(|_| "0.0.0.0".into());
    let data_dir = std::env::var("PARKSLOT_DATA_DIR").unwrap_or_else(|_| "./data".into());
    let password = std::env::var("PARKSLOT_PASSWORD").unwrap_or_else(|_| "parkslot".into());
    let max_connections: usize = env_or("PARKSLOT_MAX_CONNECTIONS", 256);
    let compact_threshold: u64 = env_or("PARKSLOT_COMPACT_THRESHOLD", 1000);

    let defaults = EngineConfig::default();
    let hold_ttl_secs: i64 = env_or("PARKSLOT_HOLD_TTL_SECS", defaults.hold_ttl_ms / 1000);
    let external_timeout_ms: u64 = env_or(
        "PARKSLOT_EXTERNAL_TIMEOUT_MS",
        defaults.external_timeout.as_millis() as u64,
    );
    let engine_config = EngineConfig {
        hold_ttl_ms: hold_ttl_secs * 1000,
        external_timeout: Duration::from_millis(external_timeout_ms),
    };

    let tls_cert = std::env::var("PARKSLOT_TLS_CERT").ok();
    let tls_key = std::env::var("PARKSLOT_TLS_KEY").ok();
    let tls_acceptor =
        parkslot::tls::load_tls_acceptor(tls_cert.as_deref(), tls_key.as_deref())?;

    std::fs::create_dir_all(&data_dir)?;

    let tenant_manager = Arc::new(TenantManager::new(
        PathBuf::from(&data_dir),
        compact_threshold,
        engine_config,
    ));
    let semaphore = Arc::new(Semaphore::new(max_connections));

    let addr = format!("{bind}:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!("parkslot listening on {addr}");
    info!("  data_dir: {data_dir}");
    info!("  max_connections: {max_connections}");
    info!("  hold_ttl: {hold_ttl_secs}s, external_timeout: {external_timeout_ms}ms");
    info!("  tls: {}", if tls_acceptor.is_some() { "enabled" } else { "disabled" });
    info!("  metrics: {}", metrics_port.map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics")));

    // Graceful shutdown: stop accepting on SIGTERM/ctrl-c, drain in-flight connections
    #[cfg(unix)]
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
        }
    };
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (socket, peer) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::error!("accept error: {e}");
                        continue;
                    }
                };

                let permit = match semaphore.clone().try_acquire_owned() {
                    Ok(permit) => permit,
                    Err(_) => {
                        tracing::warn!("connection limit reached, rejecting {peer}");
                        metrics::counter!(parkslot::observability::CONNECTIONS_REJECTED_TOTAL).increment(1);
                        drop(socket);
                        continue;
                    }
                };

                info!("connection from {peer}");
                metrics::counter!(parkslot::observability::CONNECTIONS_TOTAL).increment(1);
                metrics::gauge!(parkslot::observability::CONNECTIONS_ACTIVE).increment(1.0);
                let tm = tenant_manager.clone();
                let pw = password.clone();
                let tls = tls_acceptor.clone();

                tokio::spawn(async move {
                    let _permit = permit; // held until connection closes
                    if let Err(e) = wire::process_connection(socket, tm, pw, tls).await {
                        tracing::error!("connection error from {peer}: {e}");
                    }
                    metrics::gauge!(parkslot::observability::CONNECTIONS_ACTIVE).decrement(1.0);
                });
            }
            _ = &mut shutdown => {
                info!("shutdown signal received, stopping accept loop");
                break;
            }
        }
    }

    // Wait for in-flight connections to finish (up to 10s)
    info!("draining connections...");
    let drain_deadline = tokio::time::sleep(Duration::from_secs(10));
    tokio::pin!(drain_deadline);

    loop {
        if semaphore.available_permits() == max_connections {
            info!("all connections drained");
            break;
        }
        tokio::select! {
            _ = &mut drain_deadline => {
                let remaining = max_connections - semaphore.available_permits();
                tracing::warn!("drain timeout, {remaining} connections still open");
                break;
            }
            _ = tokio::time::sleep(Duration::from_millis(100)) => {}
        }
    }

    info!("parkslot stopped");
    Ok(())
}
