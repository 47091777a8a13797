pub mod block;
pub mod difficulty;
pub mod model;

pub use block::{pow_hash, Block};
pub use model::Blockchain;

/// Target time between blocks, in seconds.
pub const BLOCK_TIME_SECS: i64 = 120;

/// Number of inter-block gaps examined when retargeting.
pub const DIFF_ADJUST_WINDOW: usize = 720;

/// How many gaps are dropped from each end of the window before averaging.
pub const DIFF_NUM_OUTLIERS: usize = 60;

/// Difficulty carried by the genesis block and by every block until the
/// chain is long enough to retarget.
pub const STARTING_DIFFICULTY: &str = "0000007fffffffff";

/// Proof recorded in the hard-coded genesis block.
pub const GENESIS_PROOF: i64 = 69;

/// The genesis block links to nothing; it carries this placeholder instead.
pub const GENESIS_PREVIOUS_HASH: &str = "this is just a test";
