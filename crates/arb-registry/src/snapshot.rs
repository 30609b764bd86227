//! On-disk form of the registry: one JSON document holding every pool plus
//! the replay watermark. Writes go through a temp file and a rename so a
//! crash mid-write never leaves a torn snapshot behind.

use alloy_primitives::Address;
use arb_core::types::Pool;
use arb_core::{BotError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotFile {
    pub pools: HashMap<Address, Pool>,
    #[serde(rename = "lastSeenBlock")]
    pub last_seen_block: u64,
}

/// Read a snapshot if one exists. A missing file is not an error; a present
/// but unparseable file is.
pub fn read(path: &Path) -> Result<Option<SnapshotFile>> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let file = serde_json::from_slice(&raw)
        .map_err(|e| BotError::Persistence(format!("corrupt snapshot {}: {e}", path.display())))?;
    Ok(Some(file))
}

/// Serialize and atomically replace the snapshot at `path`.
pub fn write_atomic(path: &Path, file: &SnapshotFile) -> Result<()> {
    let encoded = serde_json::to_vec_pretty(file)
        .map_err(|e| BotError::Persistence(format!("serialize snapshot: {e}")))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, &encoded)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, U256};

    fn sample() -> SnapshotFile {
        let addr = address!("0000000000000000000000000000000000000001");
        let mut pool = Pool::new_v3(
            addr,
            address!("00000000000000000000000000000000000000aa"),
            address!("00000000000000000000000000000000000000bb"),
            500,
        );
        pool.reserve0 = U256::from(123u64);
        pool.reserve1 = U256::from(456u64);
        pool.recompute_enabled();

        let mut pools = HashMap::new();
        pools.insert(addr, pool);
        SnapshotFile { pools, last_seen_block: 18_000_000 }
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = std::env::temp_dir().join("arb-registry-snapshot-roundtrip");
        let path = dir.join("pools.json");
        let _ = fs::remove_file(&path);

        write_atomic(&path, &sample()).unwrap();
        let restored = read(&path).unwrap().unwrap();
        assert_eq!(restored.last_seen_block, 18_000_000);
        assert_eq!(restored.pools.len(), 1);
        let pool = restored.pools.values().next().unwrap();
        assert_eq!(pool.fee, Some(500));
        assert_eq!(pool.reserve0, U256::from(123u64));

        // No temp file left behind.
        assert!(!path.with_extension("json.tmp").exists());
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_file_is_empty_state() {
        let path = std::env::temp_dir().join("arb-registry-snapshot-missing/none.json");
        assert!(read(&path).unwrap().is_none());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = std::env::temp_dir().join("arb-registry-snapshot-corrupt");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("pools.json");
        fs::write(&path, b"{ not json").unwrap();
        assert!(read(&path).is_err());
        fs::remove_file(&path).unwrap();
    }
}
