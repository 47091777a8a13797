use log::{debug, info};
use std::cmp::Reverse;

use super::difficulty::{hex_dec, hex_inc};
use super::{pow_hash, Block, BLOCK_TIME_SECS, DIFF_ADJUST_WINDOW, DIFF_NUM_OUTLIERS};

/// The append-only block sequence with validation and dynamic difficulty.
/// One instance lives behind a mutex for the process lifetime; the miner,
/// the gossip server and startup sync all mutate it through the methods
/// here and never touch the sequence directly.
#[derive(Debug)]
pub struct Blockchain {
    pub chain: Vec<Block>,
}

impl Blockchain {
    /// Initialize a fresh chain containing only the genesis block.
    pub fn new() -> Self {
        Self {
            chain: vec![Block::genesis()],
        }
    }

    /// Rebuild a chain from blocks loaded off disk or synced from peers.
    pub fn from_blocks(chain: Vec<Block>) -> Self {
        Self { chain }
    }

    /// Current chain length.
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Return the last block in the chain.
    pub fn last_block(&self) -> &Block {
        self.chain
            .last()
            .expect("chain always holds at least the genesis block")
    }

    /// Return the block at `index`, or the `-1` sentinel when out of range.
    pub fn block_at(&self, index: i64) -> Block {
        if index >= 0 && (index as usize) < self.chain.len() {
            self.chain[index as usize].clone()
        } else {
            Block::sentinel()
        }
    }

    /// Append a block produced by the local miner. The block is pushed,
    /// the chain is validated, and on failure the push is rolled back.
    pub fn append_local(&mut self, candidate: Block) -> Result<(), &'static str> {
        self.try_append(candidate)
    }

    /// Append a block announced by another node; same protocol as the
    /// local path, the accept/reject result flows back to the wire.
    pub fn append_remote(&mut self, candidate: Block) -> Result<(), &'static str> {
        info!("another miner found block {}", candidate.index);
        self.try_append(candidate)
    }

    fn try_append(&mut self, candidate: Block) -> Result<(), &'static str> {
        self.chain.push(candidate);
        if let Err(reason) = self.validate() {
            self.chain.pop();
            return Err(reason);
        }
        Ok(())
    }

    /// Push a block fetched during startup catch-up without validating.
    /// The next regular append re-validates the whole chain.
    pub fn adopt_block(&mut self, block: Block) {
        self.chain.push(block);
    }

    /// Drop the tip. Used when the network majority rejects a block this
    /// node mined and already appended.
    pub fn retract_tip(&mut self) {
        if self.chain.len() > 1 {
            self.chain.pop();
        }
    }

    /// Check the chain invariants over every consecutive pair: indices
    /// increase by one, timestamps never regress, each block links to the
    /// hash of its predecessor, and each proof reaches the predecessor's
    /// difficulty target under strict lexicographic comparison.
    pub fn validate(&self) -> Result<(), &'static str> {
        let first = self.chain.first().ok_or("chain is empty")?;
        if first.index != 0 {
            return Err("genesis block must carry index 0");
        }
        for pair in self.chain.windows(2) {
            let (prev, cur) = (&pair[0], &pair[1]);
            if cur.index != prev.index + 1 {
                return Err("block index does not follow its predecessor");
            }
            if cur.timestamp < prev.timestamp {
                return Err("block timestamp regressed");
            }
            if cur.previous_hash != prev.compute_hash() {
                return Err("previous-hash link is broken");
            }
            if pow_hash(cur.proof, prev.proof, cur.timestamp).as_str() >= prev.difficulty.as_str()
            {
                return Err("proof does not reach the difficulty target");
            }
        }
        Ok(())
    }

    /// Difficulty the next block must carry. Until the chain exceeds the
    /// adjustment window this is the genesis difficulty. Past that, the
    /// last 720 inter-block gaps are taken, the 60 largest and 60 smallest
    /// dropped, and the remaining 600 averaged: a slow network loosens the
    /// target one lexicographic step, a fast one tightens it. Steps that
    /// would cross a boundary clamp to the current target.
    pub fn adjust_difficulty(&self) -> String {
        if self.chain.len() <= DIFF_ADJUST_WINDOW {
            return self.chain[0].difficulty.clone();
        }

        let len = self.chain.len();
        let gaps: Vec<i64> = (len - DIFF_ADJUST_WINDOW..len)
            .map(|i| self.chain[i].timestamp - self.chain[i - 1].timestamp)
            .collect();

        // drop the 60 smallest first, then the 60 largest of what is left;
        // ties go to the earliest gap
        let mut dropped = vec![false; gaps.len()];
        let mut ascending: Vec<usize> = (0..gaps.len()).collect();
        ascending.sort_by_key(|&i| (gaps[i], i));
        for &i in ascending.iter().take(DIFF_NUM_OUTLIERS) {
            dropped[i] = true;
        }
        let mut descending: Vec<usize> = (0..gaps.len()).collect();
        descending.sort_by_key(|&i| (Reverse(gaps[i]), i));
        let mut trimmed = 0;
        for &i in &descending {
            if trimmed == DIFF_NUM_OUTLIERS {
                break;
            }
            if !dropped[i] {
                dropped[i] = true;
                trimmed += 1;
            }
        }

        let kept: Vec<i64> = gaps
            .iter()
            .zip(&dropped)
            .filter(|(_, &out)| !out)
            .map(|(&gap, _)| gap)
            .collect();
        let average = kept.iter().sum::<i64>() / kept.len() as i64;

        let tip = &self.last_block().difficulty;
        debug!("retarget: average gap {}s over {} blocks", average, kept.len());
        if average > BLOCK_TIME_SECS {
            hex_inc(tip).unwrap_or_else(|| tip.clone())
        } else {
            hex_dec(tip).unwrap_or_else(|| tip.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::{GENESIS_PROOF, STARTING_DIFFICULTY};

    /// A genesis with a wide-open target so tests can mine instantly.
    fn easy_genesis() -> Block {
        Block {
            index: 0,
            timestamp: 1_700_000_000,
            proof: GENESIS_PROOF,
            previous_hash: "test chain".into(),
            difficulty: "ffffffffffffffff".into(),
        }
    }

    /// Brute-force a valid successor for the current tip.
    fn mine_next(bc: &Blockchain) -> Block {
        let prev = bc.last_block();
        let timestamp = prev.timestamp + 1;
        let mut proof = 0;
        while pow_hash(proof, prev.proof, timestamp).as_str() >= prev.difficulty.as_str() {
            proof += 1;
        }
        Block {
            index: bc.len() as i64,
            timestamp,
            proof,
            previous_hash: prev.compute_hash(),
            difficulty: bc.adjust_difficulty(),
        }
    }

    /// A chain whose consecutive timestamps differ by the given gaps.
    /// Only timestamps matter for retargeting, so the link fields are left
    /// blank.
    fn chain_with_gaps(gaps: &[i64]) -> Blockchain {
        let mut blocks = vec![easy_genesis()];
        blocks[0].difficulty = STARTING_DIFFICULTY.into();
        for (i, gap) in gaps.iter().enumerate() {
            let timestamp = blocks[i].timestamp + gap;
            blocks.push(Block {
                index: (i + 1) as i64,
                timestamp,
                proof: 0,
                previous_hash: String::new(),
                difficulty: STARTING_DIFFICULTY.into(),
            });
        }
        Blockchain::from_blocks(blocks)
    }

    #[test]
    fn fresh_chain_is_valid() {
        assert!(Blockchain::new().validate().is_ok());
    }

    #[test]
    fn mined_blocks_append_and_validate() {
        let mut bc = Blockchain::from_blocks(vec![easy_genesis()]);
        for _ in 0..3 {
            let block = mine_next(&bc);
            assert!(bc.append_local(block).is_ok());
        }
        assert_eq!(bc.len(), 4);
        assert!(bc.validate().is_ok());
    }

    #[test]
    fn rejected_append_leaves_the_chain_unchanged() {
        let mut bc = Blockchain::from_blocks(vec![easy_genesis()]);
        let mut stale = mine_next(&bc);
        stale.previous_hash = "not the tip hash".into();
        assert!(bc.append_local(stale).is_err());
        assert_eq!(bc.len(), 1);
        assert!(bc.validate().is_ok());
    }

    #[test]
    fn wrong_index_is_rejected() {
        let mut bc = Blockchain::from_blocks(vec![easy_genesis()]);
        let mut block = mine_next(&bc);
        block.index = 7;
        assert_eq!(
            bc.append_local(block),
            Err("block index does not follow its predecessor")
        );
    }

    #[test]
    fn regressed_timestamp_is_rejected() {
        let mut bc = Blockchain::from_blocks(vec![easy_genesis()]);
        let prev = bc.last_block().clone();
        let timestamp = prev.timestamp - 10;
        let mut proof = 0;
        while pow_hash(proof, prev.proof, timestamp).as_str() >= prev.difficulty.as_str() {
            proof += 1;
        }
        let block = Block {
            index: 1,
            timestamp,
            proof,
            previous_hash: prev.compute_hash(),
            difficulty: bc.adjust_difficulty(),
        };
        assert_eq!(bc.append_local(block), Err("block timestamp regressed"));
    }

    #[test]
    fn insufficient_proof_is_rejected() {
        let mut bc = Blockchain::from_blocks(vec![{
            let mut g = easy_genesis();
            // a target nothing reaches
            g.difficulty = "0000000000000000".into();
            g
        }]);
        let prev = bc.last_block().clone();
        let block = Block {
            index: 1,
            timestamp: prev.timestamp + 1,
            proof: 12345,
            previous_hash: prev.compute_hash(),
            difficulty: prev.difficulty.clone(),
        };
        assert_eq!(
            bc.append_local(block),
            Err("proof does not reach the difficulty target")
        );
    }

    #[test]
    fn remote_block_wins_the_index_race() {
        // the miner snapshots the tip, then a remote block lands first
        let mut bc = Blockchain::from_blocks(vec![easy_genesis()]);
        let snapshot = bc.last_block().clone();

        let remote = mine_next(&bc);
        assert!(bc.append_remote(remote).is_ok());

        // the local candidate still links to the old tip
        let timestamp = snapshot.timestamp + 2;
        let mut proof = 0;
        while pow_hash(proof, snapshot.proof, timestamp).as_str()
            >= snapshot.difficulty.as_str()
        {
            proof += 1;
        }
        let stale = Block {
            index: bc.len() as i64,
            timestamp,
            proof,
            previous_hash: snapshot.compute_hash(),
            difficulty: bc.adjust_difficulty(),
        };
        assert!(bc.append_local(stale).is_err());
        assert_eq!(bc.len(), 2);
    }

    #[test]
    fn block_at_returns_sentinel_out_of_range() {
        let bc = Blockchain::new();
        assert_eq!(bc.block_at(0).index, 0);
        assert_eq!(bc.block_at(5).index, -1);
        assert_eq!(bc.block_at(-3).index, -1);
    }

    #[test]
    fn retract_tip_never_drops_genesis() {
        let mut bc = Blockchain::from_blocks(vec![easy_genesis()]);
        let block = mine_next(&bc);
        bc.append_local(block).unwrap();
        bc.retract_tip();
        assert_eq!(bc.len(), 1);
        bc.retract_tip();
        assert_eq!(bc.len(), 1);
    }

    #[test]
    fn short_chain_keeps_the_genesis_difficulty() {
        let bc = chain_with_gaps(&[10; 300]);
        assert_eq!(bc.adjust_difficulty(), STARTING_DIFFICULTY);
        // exactly at the window boundary the genesis difficulty still holds
        let bc = chain_with_gaps(&[10; DIFF_ADJUST_WINDOW - 1]);
        assert_eq!(bc.adjust_difficulty(), STARTING_DIFFICULTY);
    }

    #[test]
    fn fast_blocks_tighten_the_target() {
        // 721 blocks, every gap 10s: the average is far below target
        let bc = chain_with_gaps(&[10; DIFF_ADJUST_WINDOW]);
        assert_eq!(bc.adjust_difficulty(), hex_dec(STARTING_DIFFICULTY).unwrap());
    }

    #[test]
    fn slow_blocks_loosen_the_target() {
        let bc = chain_with_gaps(&[500; DIFF_ADJUST_WINDOW]);
        assert_eq!(bc.adjust_difficulty(), hex_inc(STARTING_DIFFICULTY).unwrap());
    }

    #[test]
    fn outliers_are_trimmed_before_averaging() {
        // 60 huge gaps and 60 zero gaps are dropped; the 600 on-target gaps
        // average to exactly the block time, which does not loosen
        let mut gaps = vec![1_000_000; DIFF_NUM_OUTLIERS];
        gaps.extend(vec![0; DIFF_NUM_OUTLIERS]);
        gaps.extend(vec![BLOCK_TIME_SECS; DIFF_ADJUST_WINDOW - 2 * DIFF_NUM_OUTLIERS]);
        let bc = chain_with_gaps(&gaps);
        assert_eq!(bc.adjust_difficulty(), hex_dec(STARTING_DIFFICULTY).unwrap());
    }
}
