mod candidate;
mod pool;

pub use candidate::{display_path, profit_ratio, ArbitrageCandidate};
pub use pool::{Pool, PoolKind};
