use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use log::{debug, info};
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::cache;
use crate::capability::{CallArgs, Capability, CapabilityHandle, CellResult, KeyedCellResult, TargetMatrix};

pub const DEFAULT_CACHE_DIR: &str = "cache";

/// Per-item parameter sets for a keyed pass: identity -> region -> item name.
pub type KeyedParams = HashMap<String, HashMap<String, HashMap<String, CallArgs>>>;

#[derive(Debug, Clone)]
pub struct InvokeOptions {
    /// Replay an existing cache entry instead of calling the live capability.
    /// A miss falls through to a live call.
    pub read: bool,
    /// Persist live responses to the cache. Cache hits are not re-written.
    pub write: bool,
    pub rerun_key: Option<String>,
    pub cache_dir: PathBuf,
    /// Cap on concurrently running cells. `None` spawns every cell at once.
    pub max_concurrency: Option<usize>,
}

impl Default for InvokeOptions {
    fn default() -> Self {
        Self {
            read: false,
            write: false,
            rerun_key: None,
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            max_concurrency: None,
        }
    }
}

/// Invokes `operation` once per (identity, region, capability) cell of the
/// matrix, all cells concurrently, and returns one record per cell in
/// first-completed order.
///
/// Any cell error aborts the whole invocation: every spawned cell is still
/// joined, then the first error observed is returned and no partial result
/// list escapes.
pub async fn invoke(
    matrix: &TargetMatrix,
    operation: &str,
    parameters: CallArgs,
    opts: &InvokeOptions,
) -> Result<Vec<CellResult>, anyhow::Error> {
    let parameters = parameters.normalize();
    let limit = opts.max_concurrency.map(|n| Arc::new(Semaphore::new(n)));
    let mut cells: JoinSet<Result<CellResult, anyhow::Error>> = JoinSet::new();

    for (identity, region, capability, handle) in matrix.iter() {
        let handle = Arc::clone(handle);
        let operation = operation.to_owned();
        let args = parameters.clone();
        let opts = opts.clone();
        let limit = limit.clone();
        let identity = identity.to_owned();
        let region = region.to_owned();
        let capability = capability.to_owned();

        cells.spawn(async move {
            let _permit = match limit.as_ref() {
                Some(semaphore) => Some(semaphore.acquire().await?),
                None => None,
            };
            let entry = cache::entry_path(
                &opts.cache_dir,
                opts.rerun_key.as_deref(),
                &identity,
                &region,
                &capability,
                None,
            );
            let response = call_with_cache(handle.as_ref(), &operation, &args, &entry, &opts).await?;
            Ok(CellResult {
                identity,
                region,
                capability,
                response,
            })
        });
    }

    info!("Invoking {operation} across {} cells", cells.len());
    join_all(cells).await
}

/// Keyed variant: one call per (identity, region, capability, item), where the
/// items and their parameter sets come from a prior pass. The concurrency unit
/// is one (identity, region) pair; capabilities and items within it run
/// sequentially. An absent keyed-parameter leaf means zero calls for that pair.
pub async fn invoke_keyed(
    matrix: &TargetMatrix,
    operation: &str,
    keyed_parameters: &KeyedParams,
    opts: &InvokeOptions,
) -> Result<Vec<KeyedCellResult>, anyhow::Error> {
    let limit = opts.max_concurrency.map(|n| Arc::new(Semaphore::new(n)));
    let mut groups: JoinSet<Result<Vec<KeyedCellResult>, anyhow::Error>> = JoinSet::new();

    for (identity, region, capabilities) in matrix.groups() {
        let capabilities: Vec<(String, CapabilityHandle)> = capabilities
            .iter()
            .map(|(name, handle)| (name.clone(), Arc::clone(handle)))
            .collect();
        let items: HashMap<String, CallArgs> = keyed_parameters
            .get(identity)
            .and_then(|regions| regions.get(region))
            .cloned()
            .unwrap_or_default();
        let operation = operation.to_owned();
        let opts = opts.clone();
        let limit = limit.clone();
        let identity = identity.to_owned();
        let region = region.to_owned();

        groups.spawn(async move {
            let _permit = match limit.as_ref() {
                Some(semaphore) => Some(semaphore.acquire().await?),
                None => None,
            };
            let mut records = Vec::with_capacity(capabilities.len() * items.len());
            for (capability, handle) in &capabilities {
                for (item, args) in &items {
                    let args = args.clone().normalize();
                    let entry = cache::entry_path(
                        &opts.cache_dir,
                        opts.rerun_key.as_deref(),
                        &identity,
                        &region,
                        capability,
                        Some(item),
                    );
                    let response =
                        call_with_cache(handle.as_ref(), &operation, &args, &entry, &opts).await?;
                    records.push(KeyedCellResult {
                        identity: identity.clone(),
                        region: region.clone(),
                        capability: capability.clone(),
                        item: item.clone(),
                        response,
                    });
                }
            }
            Ok(records)
        });
    }

    info!("Invoking {operation} across {} identity/region pairs", groups.len());
    let nested = join_all(groups).await?;
    Ok(nested.into_iter().flatten().collect())
}

async fn call_with_cache(
    handle: &dyn Capability,
    operation: &str,
    args: &CallArgs,
    entry: &Path,
    opts: &InvokeOptions,
) -> Result<Value, anyhow::Error> {
    if opts.read && tokio::fs::try_exists(entry).await? {
        debug!("Replaying cache entry {}", entry.display());
        return cache::read_entry(entry).await;
    }
    let response = handle.call(operation, args).await?;
    if opts.write {
        cache::write_entry(entry, &response).await?;
    }
    Ok(response)
}

async fn join_all<T>(mut tasks: JoinSet<Result<T, anyhow::Error>>) -> Result<Vec<T>, anyhow::Error> {
    let mut records = Vec::with_capacity(tasks.len());
    let mut first_error = None;
    while let Some(joined) = tasks.join_next().await {
        match joined.context("invocation task panicked")? {
            Ok(record) => records.push(record),
            Err(err) => first_error = first_error.or(Some(err)),
        }
    }
    match first_error {
        Some(err) => Err(err),
        None => Ok(records),
    }
}
