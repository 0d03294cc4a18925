use std::path::{Path, PathBuf};

use anyhow::Context;
use serde_json::Value;

/// Rerun key namespacing one run's cache entries.
///
/// Local wall-clock at one-second resolution; two keys requested within the
/// same second are equal. Human-legible rather than unique.
pub fn new_rerun_key() -> String {
    chrono::Local::now().format("%Y%m%d%H%M%S").to_string()
}

/// Cache entry path for a cell:
/// `{cache_dir}/{rerun_key_}{identity}_{region}_{capability}[_{item}].json`.
pub fn entry_path(
    cache_dir: &Path,
    rerun_key: Option<&str>,
    identity: &str,
    region: &str,
    capability: &str,
    item: Option<&str>,
) -> PathBuf {
    let mut name = String::new();
    if let Some(key) = rerun_key {
        name.push_str(key);
        name.push('_');
    }
    name.push_str(identity);
    name.push('_');
    name.push_str(region);
    name.push('_');
    name.push_str(capability);
    if let Some(item) = item {
        name.push('_');
        name.push_str(item);
    }
    name.push_str(".json");
    cache_dir.join(name)
}

pub async fn read_entry(path: &Path) -> Result<Value, anyhow::Error> {
    let raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading cache entry {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("decoding cache entry {}", path.display()))
}

pub async fn write_entry(path: &Path, response: &Value) -> Result<(), anyhow::Error> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating cache directory {}", parent.display()))?;
    }
    let raw = serde_json::to_vec_pretty(response)?;
    tokio::fs::write(path, raw)
        .await
        .with_context(|| format!("writing cache entry {}", path.display()))
}
