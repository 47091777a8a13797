mod blocks;
pub mod models;
mod nodes;

use actix_web::web::ServiceConfig;

pub use models::AppState;

/// Register the gossip endpoints at the server root.
pub fn init_routes(cfg: &mut ServiceConfig) {
    cfg.service(blocks::add_block)
        .service(blocks::get_height)
        .service(blocks::get_block)
        .service(nodes::get_nodes)
        .service(nodes::register_node)
        .service(nodes::node_status);
}
