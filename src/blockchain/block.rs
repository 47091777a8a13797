use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use super::{GENESIS_PREVIOUS_HASH, GENESIS_PROOF, STARTING_DIFFICULTY};

/// A single block in the chain. Blocks are plain values; the chain owns the
/// only long-lived sequence of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Position in the chain; `-1` marks the not-found sentinel.
    pub index: i64,
    /// Unix timestamp (UTC), non-decreasing along the chain.
    pub timestamp: i64,
    /// Proof-of-Work nonce found by the miner.
    pub proof: i64,
    /// Hex SHA-256 of the preceding block (placeholder text on genesis).
    pub previous_hash: String,
    /// 16-char lowercase hex upper bound for the PoW hash, compared
    /// lexicographically.
    pub difficulty: String,
}

impl Block {
    /// Create the genesis block (first block in the chain).
    pub fn genesis() -> Self {
        Self {
            index: 0,
            timestamp: Utc::now().timestamp(),
            proof: GENESIS_PROOF,
            previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
            difficulty: STARTING_DIFFICULTY.to_string(),
        }
    }

    /// The block returned when a requested index does not exist.
    pub fn sentinel() -> Self {
        Self {
            index: -1,
            timestamp: 0,
            proof: 0,
            previous_hash: String::new(),
            difficulty: String::new(),
        }
    }

    /// Compute the SHA-256 hash of this block: decimal index, rendered
    /// timestamp, decimal proof, previous hash and difficulty concatenated
    /// with no separators. All peers must agree on this preimage.
    pub fn compute_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.index.to_string().as_bytes());
        hasher.update(render_timestamp(self.timestamp).as_bytes());
        hasher.update(self.proof.to_string().as_bytes());
        hasher.update(self.previous_hash.as_bytes());
        hasher.update(self.difficulty.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "block {} mined {} proof={} prev={} hash={} difficulty={}",
            self.index,
            render_timestamp(self.timestamp),
            self.proof,
            self.previous_hash,
            self.compute_hash(),
            self.difficulty
        )
    }
}

/// Proof-of-Work hash: SHA-256 over the decimal text of
/// `proof^2 - prev_proof^2 - timestamp` in wrapping 64-bit arithmetic.
/// Wraparound must be deterministic across peers, hence the explicit width.
pub fn pow_hash(proof: i64, prev_proof: i64, timestamp: i64) -> String {
    let result = proof
        .wrapping_mul(proof)
        .wrapping_sub(prev_proof.wrapping_mul(prev_proof))
        .wrapping_sub(timestamp);
    let mut hasher = Sha256::new();
    hasher.update(result.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// UnixDate-style UTC rendering used inside the block hash preimage.
fn render_timestamp(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .unwrap_or(DateTime::UNIX_EPOCH)
        .format("%a %b %e %H:%M:%S UTC %Y")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_hash_is_hex_sha256() {
        let h = Block::genesis().compute_hash();
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn block_hash_covers_every_field() {
        let base = Block {
            index: 4,
            timestamp: 1_700_000_000,
            proof: 1234,
            previous_hash: "aa".into(),
            difficulty: STARTING_DIFFICULTY.into(),
        };
        let reference = base.compute_hash();

        let mut changed = base.clone();
        changed.index = 5;
        assert_ne!(changed.compute_hash(), reference);

        let mut changed = base.clone();
        changed.timestamp += 1;
        assert_ne!(changed.compute_hash(), reference);

        let mut changed = base.clone();
        changed.proof += 1;
        assert_ne!(changed.compute_hash(), reference);

        let mut changed = base.clone();
        changed.previous_hash = "bb".into();
        assert_ne!(changed.compute_hash(), reference);

        let mut changed = base;
        changed.difficulty = "ffffffffffffffff".into();
        assert_ne!(changed.compute_hash(), reference);
    }

    #[test]
    fn pow_hash_is_deterministic() {
        assert_eq!(pow_hash(42, 69, 1_700_000_000), pow_hash(42, 69, 1_700_000_000));
        assert_ne!(pow_hash(42, 69, 1_700_000_000), pow_hash(43, 69, 1_700_000_000));
    }

    #[test]
    fn pow_hash_survives_overflow() {
        // proof^2 overflows an i64; wrapping keeps the result well defined.
        let h = pow_hash(i64::MAX, 1, 0);
        assert_eq!(h.len(), 64);
    }

    #[test]
    fn sentinel_is_marked_not_found() {
        assert_eq!(Block::sentinel().index, -1);
    }

    #[test]
    fn timestamp_rendering_is_stable() {
        // A fixed instant must render identically on every node.
        assert_eq!(render_timestamp(0), "Thu Jan  1 00:00:00 UTC 1970");
    }
}
