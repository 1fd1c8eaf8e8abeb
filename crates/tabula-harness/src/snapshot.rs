#![forbid(unsafe_code)]

//! Text snapshots.
//!
//! Snapshots live in `tests/snapshots/<name>.snap` of this crate. A mismatch
//! reports both BLAKE3 digests plus the expected and actual text.

use std::fs;
use std::path::PathBuf;

/// Directory holding the `.snap` files.
#[must_use]
pub fn snapshot_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("snapshots")
}

/// Hex BLAKE3 digest of `text`.
#[must_use]
pub fn digest(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

fn bless_requested() -> bool {
    std::env::var("BLESS").is_ok_and(|v| !v.is_empty() && v != "0")
}

/// Check `actual` against snapshot `name`. With `BLESS` set the snapshot is
/// written instead; without it a missing snapshot is an error.
pub fn check_snapshot(name: &str, actual: &str) -> Result<(), String> {
    let path = snapshot_dir().join(format!("{name}.snap"));
    let actual = format!("{}\n", actual.trim_end());

    if bless_requested() {
        fs::create_dir_all(snapshot_dir()).map_err(|e| format!("create snapshot dir: {e}"))?;
        fs::write(&path, &actual).map_err(|e| format!("write {}: {e}", path.display()))?;
        tracing::info!(snapshot = name, digest = %digest(&actual), "snapshot recorded");
        return Ok(());
    }

    if !path.exists() {
        return Err(format!(
            "snapshot '{name}' missing at {}; run with BLESS=1 to record it\n--- actual\n{actual}",
            path.display()
        ));
    }
    let expected = fs::read_to_string(&path).map_err(|e| format!("read {}: {e}", path.display()))?;
    if expected == actual {
        return Ok(());
    }
    Err(format!(
        "snapshot '{name}' mismatch\n  expected {}\n  actual   {}\n--- expected\n{expected}--- actual\n{actual}",
        digest(&expected),
        digest(&actual),
    ))
}
