mod registry;
mod snapshot;

pub use registry::PoolRegistry;
pub use snapshot::SnapshotFile;
