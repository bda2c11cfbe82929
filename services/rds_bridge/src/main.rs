use std::env::args;

use actix_web::web;
use anyhow::{anyhow, Result};
use log::{debug, info};

use rds_bridge::configuration::ServiceConfiguration;
use rds_bridge::{build_service, run_web_service};

fn main() -> Result<()> {
    env_logger::init();

    info!("┌───────────────────────────────────────────────────────┐");
    info!("│                  RDS Metrics Bridge                   │");
    info!("│ This program is licensed under the APACHE 2.0 license │");
    info!("│      For more information, see the LICENSE file       │");
    info!("│            (c) 2025 BwSoft Management, LLC            │");
    info!("└───────────────────────────────────────────────────────┘");
    let conf_arg = args()
        .nth(1)
        .ok_or_else(|| anyhow!("missing configuration argument"))?;
    info!("Configuration: {}", conf_arg);
    let conf = ServiceConfiguration::new(&conf_arg)?;
    debug!("Configuration: {:?}", conf);

    let service = web::Data::new(build_service(&conf)?);
    let port = conf.telemetry.port;
    actix_web::rt::System::new().block_on(run_web_service(port, service.clone()))?;
    info!("HTTP server stopped");
    Ok(())
}
