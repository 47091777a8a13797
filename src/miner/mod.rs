use actix_web::web;
use chrono::Utc;
use log::{info, warn};
use rand::Rng;

use crate::api::AppState;
use crate::blockchain::{pow_hash, Block};
use crate::network::{self, GossipClient};
use crate::storage;

/// How tall the chain grows before this node stops mining.
pub const DEFAULT_TARGET_HEIGHT: usize = 300;

/// Brute-force a nonce whose PoW hash falls below `target`. Starts from a
/// random 31-bit seed and walks upward, restamping the timestamp on every
/// attempt. Never takes a lock; the caller deals with the chain having
/// moved underneath the search.
pub fn proof_of_work(prev_proof: i64, target: &str) -> (i64, i64) {
    let mut proof: i64 = rand::thread_rng().gen_range(0..=i32::MAX as i64);
    loop {
        let timestamp = Utc::now().timestamp();
        if pow_hash(proof, prev_proof, timestamp).as_str() < target {
            return (proof, timestamp);
        }
        proof = proof.wrapping_add(1);
    }
}

/// The mining loop. Runs on its own OS thread until the chain reaches
/// `target_height`, competing with remote announcements for every index
/// slot: whichever append takes the chain lock first wins, and the loser
/// re-syncs from the network.
pub fn run(state: web::Data<AppState>, target_height: usize) {
    let client = GossipClient::new();

    loop {
        // snapshot the tip; the search itself runs unlocked
        let prev = {
            let bc = state.chain.lock().expect("mutex poisoned");
            if bc.len() >= target_height {
                break;
            }
            bc.last_block().clone()
        };

        let (proof, timestamp) = proof_of_work(prev.proof, &prev.difficulty);

        // build and append under one lock so the index and difficulty are
        // consistent with whatever the chain looks like now
        let appended = {
            let mut bc = state.chain.lock().expect("mutex poisoned");
            let candidate = Block {
                index: bc.len() as i64,
                timestamp,
                proof,
                previous_hash: prev.compute_hash(),
                difficulty: bc.adjust_difficulty(),
            };
            match bc.append_local(candidate.clone()) {
                Ok(()) => Some(candidate),
                Err(reason) => {
                    warn!("dropping mined candidate: {}", reason);
                    None
                }
            }
        };

        let block = match appended {
            Some(block) => block,
            None => {
                // a remote block took our slot while we were searching
                network::sync_chain(&state, &client);
                continue;
            }
        };
        info!("found {}", block);

        let peers = {
            let registry = state.peers.lock().expect("mutex poisoned");
            registry.nodes.clone()
        };
        if !client.broadcast_block(&block, &peers) {
            warn!("majority of peers rejected block {}, re-syncing", block.index);
            {
                let mut bc = state.chain.lock().expect("mutex poisoned");
                if bc.last_block() == &block {
                    bc.retract_tip();
                }
            }
            network::sync_chain(&state, &client);
        }
    }

    let bc = state.chain.lock().expect("mutex poisoned");
    storage::save_chain(&bc.chain);
    info!("mining finished at height {}", bc.len());
}
