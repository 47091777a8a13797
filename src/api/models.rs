use std::sync::Mutex;

use crate::blockchain::Blockchain;
use crate::network::NodeRegistry;

/// Shared application state: the chain and the peer registry, each behind
/// its own lock. The gossip server, the miner thread and the peer-sync
/// thread all hold handles to this.
pub struct AppState {
    pub chain: Mutex<Blockchain>,
    pub peers: Mutex<NodeRegistry>,
}

impl AppState {
    pub fn new(chain: Blockchain, peers: NodeRegistry) -> Self {
        Self {
            chain: Mutex::new(chain),
            peers: Mutex::new(peers),
        }
    }
}
