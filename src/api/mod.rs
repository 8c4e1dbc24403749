pub mod routes;

use crate::access::AdminPolicy;
use crate::config::Config;
use crate::dashboard::Dashboard;
use crate::events::LeadEvents;
use crate::store;
use anyhow::{Context, Result};
use axum::Router;
use axum::http::HeaderName;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

pub async fn run_server(config: Arc<Config>) -> Result<()> {
    let port = config.api_port;
    let store = store::open(&config)?;
    let events = LeadEvents::new();
    let dashboard = Dashboard::new(Arc::clone(&store));
    let _dashboard_subscription = dashboard.mount(&events);

    let policy = AdminPolicy::new(&config.admin_emails);
    if policy.is_open() {
        warn!("admin_emails is empty; dashboard endpoints are open to every caller");
    }

    let identity_header = HeaderName::from_bytes(config.identity_header.as_bytes())
        .with_context(|| format!("Invalid identity header: {}", config.identity_header))?;

    let state = routes::ApiState {
        config,
        store,
        events,
        dashboard,
        policy: Arc::new(policy),
        identity_header,
    };
    let app: Router = routes::router(state);

    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind API server: {addr}"))?;

    info!(address = %addr, "VisaPal API server started");

    axum::serve(listener, app)
        .await
        .context("API server failed")?;

    Ok(())
}
