use actix_web::body::BoxBody;
use actix_web::http::header::ContentType;
use actix_web::{get, web, HttpResponse, Responder};
use log::error;
use prometheus_client::registry::Registry;
use serde::{Deserialize, Serialize};

use rds_bridge_core::exposition::{encode_registry, OPENMETRICS_CONTENT_TYPE};
use rds_bridge_core::rds::RdsMetric;

pub struct BridgeService {
    pub registry: Registry,
    pub instance_name: String,
    pub collectors: Vec<RdsMetric>,
}

impl BridgeService {
    pub fn new(registry: Registry, instance_name: String, collectors: Vec<RdsMetric>) -> Self {
        Self {
            registry,
            instance_name,
            collectors,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub version: String,
    pub instance_name: String,
    pub collectors: Vec<String>,
}

impl Responder for StatusResponse {
    type Body = BoxBody;
    fn respond_to(self, _req: &actix_web::HttpRequest) -> HttpResponse<Self::Body> {
        match serde_json::to_string(&self) {
            Ok(body) => HttpResponse::Ok()
                .content_type(ContentType::json())
                .body(body),
            Err(e) => {
                error!("Failed to serialize status: {}", e);
                HttpResponse::InternalServerError().finish()
            }
        }
    }
}

#[get("/status")]
async fn status(service: web::Data<BridgeService>) -> impl Responder {
    StatusResponse {
        status: "running".to_string(),
        version: rds_bridge_core::version(),
        instance_name: service.instance_name.clone(),
        collectors: service
            .collectors
            .iter()
            .map(|c| c.key().to_string())
            .collect(),
    }
}

#[get("/metrics")]
async fn metrics(service: web::Data<BridgeService>) -> HttpResponse {
    let service = service.into_inner();
    // Collectors issue blocking upstream requests.
    let encoded = web::block(move || encode_registry(&service.registry)).await;
    match encoded {
        Ok(Ok(body)) => HttpResponse::Ok()
            .content_type(OPENMETRICS_CONTENT_TYPE)
            .body(body),
        Ok(Err(e)) => {
            error!("Failed to encode metrics: {}", e);
            HttpResponse::InternalServerError()
                .content_type(OPENMETRICS_CONTENT_TYPE)
                .finish()
        }
        Err(e) => {
            error!("Metrics encoding task failed: {}", e);
            HttpResponse::InternalServerError()
                .content_type(OPENMETRICS_CONTENT_TYPE)
                .finish()
        }
    }
}

/// Mounts `/metrics` and the `/api/v1` scope. Expects `web::Data<BridgeService>`
/// in the application data.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(metrics)
        .service(web::scope("/api/v1").service(status));
}
