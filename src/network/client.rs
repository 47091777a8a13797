use log::{debug, warn};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use std::time::Duration;

use super::{NodeAddress, REQUEST_TIMEOUT_SECS};
use crate::blockchain::Block;

/// Fan-out HTTP client for the gossip endpoints. Every operation issues a
/// request to each peer in the snapshot it is given; unreachable peers are
/// skipped and never abort the fan-out.
pub struct GossipClient {
    http: Client,
}

impl GossipClient {
    pub fn new() -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("http client");
        Self { http }
    }

    fn url(peer: &NodeAddress, path: &str) -> String {
        format!("http://{}:{}{}", peer.ip, peer.port, path)
    }

    /// Announce a freshly mined block to every peer. Returns `false` when
    /// more than half of the peer set rejected it, in which case the caller
    /// must retract the block and re-sync.
    pub fn broadcast_block(&self, block: &Block, peers: &[NodeAddress]) -> bool {
        let mut rejects = 0;
        for peer in peers {
            let response = self
                .http
                .post(Self::url(peer, "/add-block"))
                .json(block)
                .send();
            match response {
                Ok(resp) if resp.status() == StatusCode::NOT_ACCEPTABLE => rejects += 1,
                Ok(_) => {}
                Err(e) => debug!("peer {}:{} unreachable: {}", peer.ip, peer.port, e),
            }
        }
        !majority_rejected(rejects, peers.len())
    }

    /// The tallest chain height any peer reports. Unreachable peers count
    /// as -1 and undecodable answers as -2, so a network of silent peers
    /// yields -1 and leaves the local chain authoritative.
    pub fn fetch_max_height(&self, peers: &[NodeAddress]) -> i64 {
        let mut max = -1;
        for peer in peers {
            let height = match self.http.get(Self::url(peer, "/get-height")).send() {
                Ok(resp) => resp.json::<i64>().unwrap_or(-2),
                Err(_) => -1,
            };
            if height > max {
                max = height;
            }
        }
        max
    }

    /// Ask every peer for the block at `index` and keep the most frequent
    /// answer. The network may hold forks while nodes catch up; the mode is
    /// a cheap majority heuristic. Ties break toward the first response.
    pub fn fetch_block(&self, index: i64, peers: &[NodeAddress]) -> Option<Block> {
        let mut responses = Vec::new();
        for peer in peers {
            let response = self
                .http
                .post(Self::url(peer, "/get-block"))
                .json(&index)
                .send();
            let resp = match response {
                Ok(resp) if resp.status() == StatusCode::OK => resp,
                _ => continue,
            };
            match resp.json::<Block>() {
                Ok(block) if block.index >= 0 => responses.push(block),
                _ => continue,
            }
        }
        modal_block(&responses)
    }

    /// Tell every peer this node exists.
    pub fn announce_self(&self, me: &NodeAddress, peers: &[NodeAddress]) {
        for peer in peers {
            if let Err(e) = self
                .http
                .post(Self::url(peer, "/register-node"))
                .json(me)
                .send()
            {
                debug!("could not register with {}:{}: {}", peer.ip, peer.port, e);
            }
        }
    }

    /// Collect the peer lists everyone else holds.
    pub fn fetch_peers(&self, peers: &[NodeAddress]) -> Vec<NodeAddress> {
        let mut discovered = Vec::new();
        for peer in peers {
            let response = match self.http.get(Self::url(peer, "/get-nodes")).send() {
                Ok(resp) => resp,
                Err(_) => continue,
            };
            match response.json::<Vec<NodeAddress>>() {
                Ok(mut list) => discovered.append(&mut list),
                Err(e) => debug!("bad peer list from {}:{}: {}", peer.ip, peer.port, e),
            }
        }
        discovered
    }

    /// Ping every peer; returns the `(ip, port)` of each one that answered.
    pub fn ping_all(&self, peers: &[NodeAddress]) -> Vec<(String, u16)> {
        let mut alive = Vec::new();
        for peer in peers {
            match self.http.get(Self::url(peer, "/node-status")).send() {
                Ok(resp) if resp.status() == StatusCode::OK => {
                    alive.push((peer.ip.clone(), peer.port));
                }
                _ => {}
            }
        }
        alive
    }

    /// Ask a public resolver for this node's address so peers can reach us.
    pub fn detect_public_ip(&self) -> String {
        let ip = self
            .http
            .get("https://api.ipify.org?format=text")
            .send()
            .and_then(|resp| resp.text());
        match ip {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!("public IP discovery failed, falling back to loopback: {}", e);
                "127.0.0.1".to_string()
            }
        }
    }
}

/// More than half of the peer set said no.
fn majority_rejected(rejects: usize, peer_count: usize) -> bool {
    rejects > peer_count / 2
}

/// The block appearing most often in a fan-out, compared by every field.
/// Ties break toward the first occurrence.
fn modal_block(blocks: &[Block]) -> Option<Block> {
    let mut winner: Option<&Block> = None;
    let mut winner_count = 0;
    for candidate in blocks {
        let count = blocks.iter().filter(|other| *other == candidate).count();
        if count > winner_count {
            winner = Some(candidate);
            winner_count = count;
        }
    }
    winner.cloned()
}
