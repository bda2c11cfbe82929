use std::sync::Arc;

use actix_web::http::header;
use actix_web::{test, web, App};

use rds_bridge::web_service::{configure, BridgeService, StatusResponse};
use rds_bridge_core::collector::ScrapeStats;
use rds_bridge_core::exposition::{build_registry, OPENMETRICS_CONTENT_TYPE};
use rds_bridge_core::query::{QueryClient, QueryError, QueryResponse};
use rds_bridge_core::rds::{RdsMetric, TargetIdentity};

/// Answers CPU queries with a single sample and everything else with an
/// empty vector.
#[derive(Debug)]
struct CpuOnlyClient;

impl QueryClient for CpuOnlyClient {
    fn query(&self, promql: &str) -> Result<QueryResponse, QueryError> {
        let body = if promql.starts_with("container_cpu_usage_seconds_total") {
            r#"{"status":"success","data":{"resultType":"vector","result":[{"metric":{"instance":"db-1"},"value":[1700000000,"42.5"]}]}}"#
        } else {
            r#"{"status":"success","data":{"resultType":"vector","result":[]}}"#
        };
        QueryResponse::from_slice(body.as_bytes())
    }
}

fn service(collectors: Vec<RdsMetric>) -> web::Data<BridgeService> {
    let target = TargetIdentity {
        instance_name: "orders-db".to_string(),
        namespace: "dbaas".to_string(),
        pod_name: "orders-db-0".to_string(),
        resource_id: "7f3c".to_string(),
    };
    let stats = ScrapeStats::default();
    let registry = build_registry(Arc::new(CpuOnlyClient), &target, &collectors, &stats);
    web::Data::new(BridgeService::new(
        registry,
        target.instance_name.clone(),
        collectors,
    ))
}

#[actix_web::test]
async fn metrics_endpoint_serves_openmetrics() {
    let app = test::init_service(
        App::new()
            .app_data(service(RdsMetric::ALL.to_vec()))
            .configure(configure),
    )
    .await;
    let req = test::TestRequest::get().uri("/metrics").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let content_type = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    assert_eq!(content_type.as_deref(), Some(OPENMETRICS_CONTENT_TYPE));

    let body = test::read_body(resp).await;
    let body = std::str::from_utf8(&body).expect("utf-8 body");
    assert!(body.contains(
        r#"aws_rds_cpuutilization_average{dbinstance_identifier="orders-db",exported_job="aws_rds",instance="db-1",job="rds"} 42.5"#
    ));
    assert!(!body.contains("aws_rds_write_iops_average{"));
    assert!(body.contains(
        r#"rds_bridge_scrapes_total{metric="aws_rds_write_iops_average",outcome="no_data"} 1"#
    ));
    assert!(body.ends_with("# EOF\n"));
}

#[actix_web::test]
async fn status_endpoint_reports_collectors() {
    let app = test::init_service(
        App::new()
            .app_data(service(vec![
                RdsMetric::FreeableMemory,
                RdsMetric::DatabaseConnections,
            ]))
            .configure(configure),
    )
    .await;
    let req = test::TestRequest::get().uri("/api/v1/status").to_request();
    let status: StatusResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(status.status, "running");
    assert_eq!(status.version, rds_bridge_core::version());
    assert_eq!(status.instance_name, "orders-db");
    assert_eq!(
        status.collectors,
        vec!["freeable_memory".to_string(), "database_connections".to_string()]
    );
}

#[actix_web::test]
async fn unknown_path_is_not_found() {
    let app = test::init_service(
        App::new()
            .app_data(service(vec![RdsMetric::CpuUtilization]))
            .configure(configure),
    )
    .await;
    let req = test::TestRequest::get().uri("/api/v1/metrics").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);
}
