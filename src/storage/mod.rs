//! Whole-file JSON persistence for the chain and the peer list. Disk
//! failures are logged and swallowed; the in-memory state stays
//! authoritative either way.

use log::warn;
use std::fs;

use crate::blockchain::Block;
use crate::network::NodeAddress;

const CHAIN_FILE: &str = "chain_storage.json";
const NODES_FILE: &str = "known_nodes.json";

/// Read the persisted chain, if a well-formed file exists.
pub fn load_chain() -> Option<Vec<Block>> {
    let data = fs::read_to_string(CHAIN_FILE).ok()?;
    match serde_json::from_str(&data) {
        Ok(chain) => Some(chain),
        Err(e) => {
            warn!("ignoring malformed {}: {}", CHAIN_FILE, e);
            None
        }
    }
}

/// Replace the chain file with the current sequence.
pub fn save_chain(chain: &[Block]) {
    write_json(CHAIN_FILE, chain);
}

/// Read the persisted peer list, if a well-formed file exists.
pub fn load_nodes() -> Option<Vec<NodeAddress>> {
    let data = fs::read_to_string(NODES_FILE).ok()?;
    match serde_json::from_str(&data) {
        Ok(nodes) => Some(nodes),
        Err(e) => {
            warn!("ignoring malformed {}: {}", NODES_FILE, e);
            None
        }
    }
}

/// Replace the peer file with the current registry contents.
pub fn save_nodes(nodes: &[NodeAddress]) {
    write_json(NODES_FILE, nodes);
}

fn write_json<T: serde::Serialize + ?Sized>(path: &str, value: &T) {
    match serde_json::to_vec(value) {
        Ok(bytes) => {
            if let Err(e) = fs::write(path, bytes) {
                warn!("could not persist {}: {}", path, e);
            }
        }
        Err(e) => warn!("could not serialize {}: {}", path, e),
    }
}
