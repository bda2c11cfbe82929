use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use log::info;

use rds_bridge_core::client::HttpQueryClient;
use rds_bridge_core::collector::ScrapeStats;
use rds_bridge_core::exposition::build_registry;

use crate::configuration::ServiceConfiguration;
use crate::web_service::{configure, BridgeService};

pub mod configuration;
pub mod web_service;

/// Builds the upstream client and registers the enabled collectors.
///
/// The blocking HTTP client must not be created on an async executor, so this
/// runs before the actix system is started.
pub fn build_service(conf: &ServiceConfiguration) -> Result<BridgeService> {
    let client = HttpQueryClient::new(&conf.upstream.url, conf.upstream.timeout)
        .context("Failed to create the upstream query client")?;
    info!("Upstream query endpoint: {}", client.endpoint());
    let collectors = conf.enabled_collectors();
    let stats = ScrapeStats::default();
    let registry = build_registry(Arc::new(client), &conf.target, &collectors, &stats);
    info!(
        "Registered collectors: {}",
        collectors
            .iter()
            .map(|c| c.key())
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(BridgeService::new(
        registry,
        conf.target.instance_name.clone(),
        collectors,
    ))
}

pub async fn run_web_service(port: u16, service: web::Data<BridgeService>) -> Result<()> {
    let http_service = service.clone();
    let server = HttpServer::new(move || {
        App::new()
            .app_data(http_service.clone())
            .configure(configure)
    })
    .bind(("0.0.0.0", port))
    .with_context(|| format!("Failed to bind to port {}", port))?
    .run();

    info!(
        "HTTP server started on port {}, metrics are available under '/metrics', API under the '/api/v1/' prefix.",
        port
    );
    server.await?;
    Ok(())
}
