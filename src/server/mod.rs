use std::sync::Arc;

use actix_web::dev::Server;
use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use prometheus::{Encoder, TextEncoder};

use crate::metrics::Metrics;
use crate::service::{OrderService, ServiceError};

// ============================================================================
// HTTP Edge
// ============================================================================
//
// Thin translation layer: one lookup route plus health and metrics. All
// domain decisions live in the service; this module only maps outcomes to
// status codes and tallies them.
//
// ============================================================================

pub struct AppState {
    pub service: Arc<OrderService>,
    pub metrics: Arc<Metrics>,
}

pub fn build_server(
    service: Arc<OrderService>,
    metrics: Arc<Metrics>,
    port: u16,
) -> std::io::Result<Server> {
    let state = web::Data::new(AppState { service, metrics });

    let server = HttpServer::new(move || App::new().app_data(state.clone()).configure(routes))
        .bind(("0.0.0.0", port))?
        .run();

    Ok(server)
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/order/{order_uid}", web::get().to(get_order))
        .route("/health", web::get().to(health))
        .route("/metrics", web::get().to(metrics_handler));
}

async fn get_order(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    state.metrics.http_requests_total.inc();

    let order_uid = path.into_inner();
    if order_uid.trim().is_empty() {
        state.metrics.http_requests_bad_request.inc();
        return HttpResponse::BadRequest().body("empty order_uid");
    }

    match state.service.get_order(&order_uid).await {
        Ok(order) => {
            state.metrics.http_requests_success.inc();
            HttpResponse::Ok().json(order)
        }
        Err(ServiceError::NotFound) => {
            state.metrics.http_requests_not_found.inc();
            HttpResponse::NotFound().body("not found")
        }
        Err(err) => {
            tracing::error!(order_uid = %order_uid, error = %err, "order lookup failed");
            state.metrics.http_requests_server_error.inc();
            HttpResponse::InternalServerError().body("server error")
        }
    }
}

async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "orders",
    }))
}

async fn metrics_handler(state: web::Data<AppState>) -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = state.metrics.registry().gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %err, "failed to encode metrics");
        return HttpResponse::InternalServerError().finish();
    }

    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(buffer)
}
