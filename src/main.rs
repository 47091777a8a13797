mod api;
mod blockchain;
mod miner;
mod network;
mod storage;

use actix_web::{web, App, HttpServer};
use chrono::Utc;
use dotenvy::dotenv;
use log::info;
use std::env;
use std::thread;
use std::time::Duration;

use api::AppState;
use blockchain::Blockchain;
use miner::DEFAULT_TARGET_HEIGHT;
use network::{GossipClient, NodeAddress, NodeRegistry, PEER_SYNC_INTERVAL_SECS};

fn main() -> std::io::Result<()> {
    let _ = dotenv();
    env_logger::init();

    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8080);
    let target_height: usize = env::var("TARGET_HEIGHT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_TARGET_HEIGHT);

    let chain = match storage::load_chain() {
        Some(blocks) => {
            info!("loaded chain of {} blocks from disk", blocks.len());
            Blockchain::from_blocks(blocks)
        }
        None => {
            info!("no chain on disk, starting from genesis");
            Blockchain::new()
        }
    };
    let nodes = storage::load_nodes().unwrap_or_else(network::bootstrap_nodes);

    let client = GossipClient::new();
    let my_address = NodeAddress {
        ip: client.detect_public_ip(),
        port,
        last_seen: Utc::now().timestamp(),
    };
    println!("⛏️ Starting node {} on port {port}", my_address.ip);

    let state = web::Data::new(AppState::new(chain, NodeRegistry::new(my_address, nodes)));

    // one peer cycle, then catch the chain up before serving or mining
    network::sync_peers(&state, &client);
    network::sync_chain(&state, &client);

    let miner_state = state.clone();
    thread::spawn(move || miner::run(miner_state, target_height));

    let sync_state = state.clone();
    thread::spawn(move || {
        let client = GossipClient::new();
        loop {
            network::sync_peers(&sync_state, &client);
            thread::sleep(Duration::from_secs(PEER_SYNC_INTERVAL_SECS));
        }
    });

    // a bind failure is the only fatal error this process recognizes
    actix_web::rt::System::new().block_on(async move {
        HttpServer::new(move || {
            App::new()
                .app_data(state.clone())
                .configure(api::init_routes)
        })
        .bind(("0.0.0.0", port))?
        .run()
        .await
    })
}
