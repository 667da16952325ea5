// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `greenroom serve` command implementation.
//!
//! Wires the full gateway together: AMQP broker with the standard topology,
//! device-bridge transport, session manager with reconnect supervision,
//! inbound/outbound relays, and the HTTP/WebSocket surface. The server runs
//! in the foreground; everything else is spawned on the same cancellation
//! token and winds down together on SIGINT/SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use greenroom_broker::AmqpBroker;
use greenroom_bridge::BridgeTransport;
use greenroom_config::GreenroomConfig;
use greenroom_core::GreenroomError;
use greenroom_core::traits::broker::{Broker, TopologyDescriptor};
use greenroom_core::traits::transport::ChatTransport;
use greenroom_gateway::{
    Broadcaster, GatewayState, run_event_pump, spawn_snapshot_refresher, start_server,
};
use greenroom_relay::{InboundRelay, OutboundRelay, spawn_chat_update_forwarder};
use greenroom_resilience::{DedupCache, Throttle, UpdateCoalescer};
use greenroom_session::{ReconnectPolicy, SessionManager};

/// Runs the `greenroom serve` command.
pub async fn run_serve(config: GreenroomConfig) -> Result<(), GreenroomError> {
    init_tracing(&config.log.level);

    info!("starting greenroom serve");

    // Broker connection and the standard exchange/queue topology.
    let broker: Arc<dyn Broker> = Arc::new(AmqpBroker::connect(&config.broker.url).await?);
    broker
        .declare_topology(&TopologyDescriptor::standard())
        .await?;
    info!(url = config.broker.url.as_str(), "broker topology declared");

    // Device-bridge transport.
    let transport: Arc<dyn ChatTransport> = Arc::new(BridgeTransport::new(
        config.bridge.url.clone(),
        config.session.credential_dir.clone(),
    ));

    // Session manager.
    let policy = ReconnectPolicy::new(
        Duration::from_secs(config.session.reconnect_base_secs),
        Duration::from_secs(config.session.reconnect_max_secs),
    );
    let (session_events_tx, session_events_rx) = mpsc::unbounded_channel();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (manager, session) = SessionManager::new(
        transport.clone(),
        broker.clone(),
        session_events_tx,
        inbound_tx,
        policy,
    );

    let cancel = install_signal_handler();
    tokio::spawn(manager.run(cancel.clone()));

    // Realtime fanout: broadcaster, event pump, throttled snapshot refresher.
    let (realtime_tx, realtime_rx) = mpsc::unbounded_channel();
    let broadcaster = Arc::new(Broadcaster::new(session.clone()));
    let (refresh, refresh_rx) =
        Throttle::spawn(Duration::from_millis(config.throttle.min_interval_ms));
    spawn_snapshot_refresher(
        broadcaster.clone(),
        session.clone(),
        refresh_rx,
        cancel.clone(),
    );
    tokio::spawn(run_event_pump(
        broadcaster.clone(),
        session_events_rx,
        realtime_rx,
        refresh,
        cancel.clone(),
    ));

    // Inbound relay: session traffic into the broker and dashboards.
    let dedup = Arc::new(Mutex::new(DedupCache::new(
        config.dedup.capacity,
        config.dedup.retain,
    )));
    let (coalescer, batches) =
        UpdateCoalescer::spawn(Duration::from_millis(config.coalesce.window_ms));
    let inbound_relay = InboundRelay::new(broker.clone(), dedup, coalescer, realtime_tx.clone());
    tokio::spawn(inbound_relay.run(inbound_rx, cancel.clone()));
    spawn_chat_update_forwarder(batches, realtime_tx.clone(), cancel.clone());

    // Outbound relay: broker queue into the device session.
    let outbound_relay = OutboundRelay::new(
        broker.clone(),
        transport.clone(),
        session.clone(),
        realtime_tx,
    );
    let outbound_cancel = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = outbound_relay.run(outbound_cancel).await {
            error!(error = %e, "outbound relay stopped");
        }
    });

    // Restore the device session automatically when credentials are cached;
    // otherwise wait for an explicit connect command.
    if transport.has_credentials() {
        info!("cached credentials found, restoring device session");
        session.connect()?;
    } else {
        info!("no cached credentials, waiting for connect command");
    }

    // HTTP/WebSocket surface runs in the foreground.
    let server_config = greenroom_gateway::ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
        allowed_origin: config.server.allowed_origin.clone(),
    };
    let state = GatewayState {
        session,
        broker,
        broadcaster,
        start_time: std::time::Instant::now(),
    };
    start_server(&server_config, state, cancel.clone()).await?;

    info!("greenroom serve shutdown complete");
    Ok(())
}

/// Install SIGINT/SIGTERM handlers that cancel the returned token.
fn install_signal_handler() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();

    tokio::spawn(async move {
        #[cfg(unix)]
        {
            let mut sigterm = match tokio::signal::unix::signal(
                tokio::signal::unix::SignalKind::terminate(),
            ) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    error!(error = %e, "failed to install SIGTERM handler");
                    return;
                }
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("SIGINT received, shutting down"),
                _ = sigterm.recv() => info!("SIGTERM received, shutting down"),
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            info!("ctrl-c received, shutting down");
        }
        trigger.cancel();
    });

    cancel
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("greenroom={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
