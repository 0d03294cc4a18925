use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

/// Parameters for one capability call.
///
/// An empty positional sequence is indistinguishable from no parameters at the
/// call site, so [`CallArgs::normalize`] collapses it to `None` before dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum CallArgs {
    None,
    Positional(Vec<Value>),
    Named(serde_json::Map<String, Value>),
}

impl CallArgs {
    pub fn normalize(self) -> CallArgs {
        match self {
            CallArgs::Positional(args) if args.is_empty() => CallArgs::None,
            other => other,
        }
    }
}

/// An opaque handle exposing named operations that return a structured value.
///
/// Operation names are free-form strings; a handle errors on names it does not
/// support. The invocation engine never inspects the returned value.
#[async_trait]
pub trait Capability: Send + Sync {
    async fn call(&self, operation: &str, args: &CallArgs) -> Result<Value, anyhow::Error>;
}

pub type CapabilityHandle = Arc<dyn Capability>;

/// identity -> region -> capability name -> handle.
///
/// Built once per command by the client factory and read-only afterwards.
#[derive(Default, Clone)]
pub struct TargetMatrix {
    cells: HashMap<String, HashMap<String, HashMap<String, CapabilityHandle>>>,
}

impl TargetMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, identity: &str, region: &str, capability: &str, handle: CapabilityHandle) {
        self.cells
            .entry(identity.to_owned())
            .or_default()
            .entry(region.to_owned())
            .or_default()
            .insert(capability.to_owned(), handle);
    }

    /// Every (identity, region, capability) cell, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &str, &CapabilityHandle)> {
        self.cells.iter().flat_map(|(identity, regions)| {
            regions.iter().flat_map(move |(region, capabilities)| {
                capabilities.iter().map(move |(capability, handle)| {
                    (identity.as_str(), region.as_str(), capability.as_str(), handle)
                })
            })
        })
    }

    /// Every (identity, region) pair with its registered capabilities.
    pub fn groups(&self) -> impl Iterator<Item = (&str, &str, &HashMap<String, CapabilityHandle>)> {
        self.cells.iter().flat_map(|(identity, regions)| {
            regions
                .iter()
                .map(move |(region, capabilities)| (identity.as_str(), region.as_str(), capabilities))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// One response per (identity, region, capability) cell.
#[derive(Debug, Clone)]
pub struct CellResult {
    pub identity: String,
    pub region: String,
    pub capability: String,
    pub response: Value,
}

/// One response per (identity, region, capability, item) call of a keyed pass.
#[derive(Debug, Clone)]
pub struct KeyedCellResult {
    pub identity: String,
    pub region: String,
    pub capability: String,
    pub item: String,
    pub response: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_positional_normalizes_to_none() {
        assert_eq!(CallArgs::Positional(Vec::new()).normalize(), CallArgs::None);
    }

    #[test]
    fn non_empty_positional_survives_normalization() {
        let args = CallArgs::Positional(vec![json!("bucket-a")]);
        assert_eq!(args.clone().normalize(), args);
    }

    #[test]
    fn matrix_iter_visits_every_cell() {
        struct Noop;
        #[async_trait]
        impl Capability for Noop {
            async fn call(&self, _: &str, _: &CallArgs) -> Result<Value, anyhow::Error> {
                Ok(Value::Null)
            }
        }

        let mut matrix = TargetMatrix::new();
        for identity in ["a", "b"] {
            for region in ["us-east-1", "eu-west-1"] {
                matrix.insert(identity, region, "sts", Arc::new(Noop));
            }
        }

        let mut cells: Vec<_> = matrix
            .iter()
            .map(|(identity, region, capability, _)| format!("{identity}/{region}/{capability}"))
            .collect();
        cells.sort();
        assert_eq!(
            cells,
            vec!["a/eu-west-1/sts", "a/us-east-1/sts", "b/eu-west-1/sts", "b/us-east-1/sts"]
        );
        assert_eq!(matrix.groups().count(), 4);
    }
}
