use actix_web::{get, post, web, HttpResponse, Responder};
use chrono::Utc;
use log::debug;

use super::models::AppState;
use crate::network::NodeAddress;

/// Every peer this node currently knows.
#[get("/get-nodes")]
pub async fn get_nodes(state: web::Data<AppState>) -> impl Responder {
    let registry = state.peers.lock().expect("mutex poisoned");
    HttpResponse::Ok().json(registry.nodes.clone())
}

/// A node announcing itself. Stamped as seen now and deduplicated.
#[post("/register-node")]
pub async fn register_node(
    state: web::Data<AppState>,
    address: web::Json<NodeAddress>,
) -> impl Responder {
    let mut address = address.into_inner();
    address.last_seen = Utc::now().timestamp();
    debug!("peer {}:{} registered", address.ip, address.port);
    let mut registry = state.peers.lock().expect("mutex poisoned");
    registry.register(address);
    HttpResponse::Ok().finish()
}

/// Liveness probe; peers stamp our `last_seen` off this answer.
#[get("/node-status")]
pub async fn node_status() -> impl Responder {
    HttpResponse::Ok().finish()
}
