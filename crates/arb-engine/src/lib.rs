mod engine;
mod paths;
mod quote;
mod submit;

pub use engine::ArbEngine;
pub use paths::find_paths;
pub use quote::{best_probe, probe_amounts, sweep_path};
pub use submit::{parse_malicious_pool, TxSubmitter};
