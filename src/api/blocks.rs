use actix_web::{get, post, web, HttpResponse, Responder};
use log::warn;

use super::models::AppState;
use crate::blockchain::Block;

/// Receive a block another miner found. 200 when it extends our chain,
/// 406 when validation turns it away.
#[post("/add-block")]
pub async fn add_block(state: web::Data<AppState>, block: web::Json<Block>) -> impl Responder {
    let mut bc = state.chain.lock().expect("mutex poisoned");
    match bc.append_remote(block.into_inner()) {
        Ok(()) => HttpResponse::Ok().finish(),
        Err(reason) => {
            warn!("rejected remote block: {}", reason);
            HttpResponse::NotAcceptable().finish()
        }
    }
}

/// Current chain length.
#[get("/get-height")]
pub async fn get_height(state: web::Data<AppState>) -> impl Responder {
    let bc = state.chain.lock().expect("mutex poisoned");
    HttpResponse::Ok().json(bc.len())
}

/// Look up a block by index; absent indices answer with the -1 sentinel.
#[post("/get-block")]
pub async fn get_block(state: web::Data<AppState>, index: web::Json<i64>) -> impl Responder {
    let bc = state.chain.lock().expect("mutex poisoned");
    HttpResponse::Ok().json(bc.block_at(index.into_inner()))
}
