use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

use super::PEER_EXPIRY_SECS;

/// Another node on the network. Two addresses are the same peer when their
/// `(ip, port)` match; `last_seen` is advisory bookkeeping and takes no
/// part in equality.
#[derive(Debug, Clone, Serialize, Deserialize, Eq)]
pub struct NodeAddress {
    pub ip: String,
    pub port: u16,
    pub last_seen: i64,
}

impl PartialEq for NodeAddress {
    fn eq(&self, other: &Self) -> bool {
        self.ip == other.ip && self.port == other.port
    }
}

impl Hash for NodeAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ip.hash(state);
        self.port.hash(state);
    }
}

/// The set of known peers plus this node's own address. Unique by
/// `(ip, port)`, never containing the node itself.
#[derive(Debug)]
pub struct NodeRegistry {
    pub my_address: NodeAddress,
    pub nodes: Vec<NodeAddress>,
}

impl NodeRegistry {
    pub fn new(my_address: NodeAddress, nodes: Vec<NodeAddress>) -> Self {
        let mut registry = Self {
            my_address,
            nodes: Vec::new(),
        };
        registry.merge(nodes);
        registry
    }

    /// Add one address. An already-known `(ip, port)` keeps its existing
    /// entry: only the local ping cycle updates `last_seen` authoritatively.
    pub fn register(&mut self, address: NodeAddress) {
        if address == self.my_address || self.nodes.contains(&address) {
            return;
        }
        self.nodes.push(address);
    }

    /// Union in a remote peer list, deduplicated by `(ip, port)`; first
    /// occurrence wins.
    pub fn merge(&mut self, addresses: Vec<NodeAddress>) {
        for address in addresses {
            self.register(address);
        }
    }

    /// Record that a peer answered a ping just now.
    pub fn mark_seen(&mut self, ip: &str, port: u16, now: i64) {
        for node in &mut self.nodes {
            if node.ip == ip && node.port == port {
                node.last_seen = now;
            }
        }
    }

    /// Drop peers that have been silent past the expiry horizon.
    pub fn prune_stale(&mut self, now: i64) {
        self.nodes
            .retain(|node| now - node.last_seen <= PEER_EXPIRY_SECS);
    }

    /// Drop this node's own address if a peer list handed it back to us.
    pub fn remove_self(&mut self) {
        let me = self.my_address.clone();
        self.nodes.retain(|node| *node != me);
    }
}
