use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::sync::Arc;

use super::Metrics;

// ============================================================================
// Metrics Server - /metrics for Prometheus, /health for probes
// ============================================================================
//
// Health is derived from the saga's own gauges: any event parked in the dead
// letter queue means the router is stuck behind it, so the service reports
// `degraded` (still HTTP 200; the process itself is fine).
//
// ============================================================================

#[derive(Debug, Serialize, PartialEq)]
struct HealthReport {
    status: &'static str,
    service: &'static str,
    parked_events: i64,
    pending_compensations: i64,
}

impl HealthReport {
    fn from_metrics(metrics: &Metrics) -> Self {
        let parked_events = metrics.dlq_parked.get();
        Self {
            status: if parked_events > 0 { "degraded" } else { "healthy" },
            service: "user-registry",
            parked_events,
            pending_compensations: metrics.timers_pending.get(),
        }
    }
}

/// Start the metrics HTTP server
/// This should be called in a separate thread/runtime to avoid conflicts
pub async fn start_metrics_server(metrics: Arc<Metrics>, port: u16) -> std::io::Result<()> {
    tracing::info!("📊 Starting metrics server on http://0.0.0.0:{}/metrics", port);

    HttpServer::new(move || App::new().configure(routes(metrics.clone())))
        .bind(("0.0.0.0", port))?
        .run()
        .await
}

fn routes(metrics: Arc<Metrics>) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.app_data(web::Data::new(metrics))
            .route("/metrics", web::get().to(metrics_handler))
            .route("/health", web::get().to(health_handler));
    }
}

async fn metrics_handler(metrics: web::Data<Arc<Metrics>>) -> impl Responder {
    let encoder = TextEncoder::new();
    let metric_families = metrics.registry().gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return HttpResponse::InternalServerError().finish();
    }

    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(buffer)
}

async fn health_handler(metrics: web::Data<Arc<Metrics>>) -> impl Responder {
    HttpResponse::Ok().json(HealthReport::from_metrics(&metrics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test;

    #[actix_web::test]
    async fn test_health_degrades_while_events_are_parked() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let app = test::init_service(App::new().configure(routes(metrics.clone()))).await;

        let report: serde_json::Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri("/health").to_request()).await;
        assert_eq!(report["status"], "healthy");

        metrics.record_dlq_message("EmailAssigned");
        metrics.record_timer_scheduled();

        let report: serde_json::Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri("/health").to_request()).await;
        assert_eq!(report["status"], "degraded");
        assert_eq!(report["parked_events"], 1);
        assert_eq!(report["pending_compensations"], 1);

        metrics.record_dlq_removed();
        let report: serde_json::Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri("/health").to_request()).await;
        assert_eq!(report["status"], "healthy");
    }

    #[actix_web::test]
    async fn test_metrics_endpoint_exposes_saga_metrics() {
        let metrics = Arc::new(Metrics::new().unwrap());
        metrics.record_router_event("UserCreated", 0.01, true);
        let app = test::init_service(App::new().configure(routes(metrics))).await;

        let body = test::call_and_read_body(&app, test::TestRequest::get().uri("/metrics").to_request()).await;
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("saga_router_events_processed_total"));
        assert!(text.contains("compensation_timers_pending"));
    }
}
