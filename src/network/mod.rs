pub mod client;
pub mod peers;

pub use client::GossipClient;
pub use peers::{NodeAddress, NodeRegistry};

use chrono::Utc;
use log::info;

use crate::api::AppState;
use crate::storage;

/// Per-request deadline for every peer call, in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Peers unseen for this long are dropped from the registry.
pub const PEER_EXPIRY_SECS: i64 = 36000;

/// How often the peer-sync cycle runs.
pub const PEER_SYNC_INTERVAL_SECS: u64 = 5;

/// Seed addresses used when no peer list is found on disk.
pub const BOOTSTRAP_PEERS: [(&str, u16); 2] =
    [("192.168.0.251", 8080), ("192.168.0.129", 8080)];

/// The peer list seeded from the compile-time bootstrap addresses.
pub fn bootstrap_nodes() -> Vec<NodeAddress> {
    let now = Utc::now().timestamp();
    BOOTSTRAP_PEERS
        .iter()
        .map(|&(ip, port)| NodeAddress {
            ip: ip.to_string(),
            port,
            last_seen: now,
        })
        .collect()
}

/// One full peer maintenance cycle, run under the registry lock from start
/// to finish: announce ourselves, merge the peer lists the network knows,
/// ping everyone, drop the stale and ourselves, persist what remains.
pub fn sync_peers(state: &AppState, client: &GossipClient) {
    let mut registry = state.peers.lock().expect("mutex poisoned");

    client.announce_self(&registry.my_address, &registry.nodes);

    let discovered = client.fetch_peers(&registry.nodes);
    registry.merge(discovered);

    let now = Utc::now().timestamp();
    for (ip, port) in client.ping_all(&registry.nodes) {
        registry.mark_seen(&ip, port, now);
    }

    registry.prune_stale(now);
    registry.remove_self();
    storage::save_nodes(&registry.nodes);
}

/// Catch the local chain up to the tallest peer. Fetched blocks are adopted
/// without validation; regular appends re-validate the whole chain from the
/// first block onward.
pub fn sync_chain(state: &AppState, client: &GossipClient) {
    let peers = {
        let registry = state.peers.lock().expect("mutex poisoned");
        registry.nodes.clone()
    };
    let target = client.fetch_max_height(&peers);

    loop {
        let local = {
            let bc = state.chain.lock().expect("mutex poisoned");
            bc.len() as i64
        };
        if local >= target {
            break;
        }
        info!("syncing block {}", local);
        match client.fetch_block(local, &peers) {
            Some(block) => {
                let mut bc = state.chain.lock().expect("mutex poisoned");
                bc.adopt_block(block);
            }
            None => break,
        }
    }
}
