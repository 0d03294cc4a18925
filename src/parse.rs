//! Flattens raw per-cell responses into string tables for the output layer.
//! Each parser knows the wire shape of one operation; missing fields render as
//! empty strings.

use std::collections::HashMap;

use serde_json::Value;

use crate::capability::{CellResult, KeyedCellResult};

pub type ResultTable = (Vec<String>, Vec<Vec<String>>);

fn headers(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| (*name).to_owned()).collect()
}

fn field(value: &Value, key: &str) -> String {
    match value.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        // Numbers and booleans stringify rather than blanking out.
        Some(other) => other.to_string(),
    }
}

fn array<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

pub fn parse_caller_identity(results: &[CellResult]) -> ResultTable {
    let rows = results
        .iter()
        .map(|record| {
            vec![
                record.identity.clone(),
                record.region.clone(),
                field(&record.response, "UserId"),
                field(&record.response, "Account"),
                field(&record.response, "Arn"),
            ]
        })
        .collect();
    (headers(&["profile", "region", "userID", "account", "ARN"]), rows)
}

pub fn parse_instances(results: &[CellResult]) -> ResultTable {
    let mut rows = Vec::new();
    for record in results {
        for reservation in array(&record.response, "Reservations") {
            for instance in array(reservation, "Instances") {
                let status = instance
                    .get("State")
                    .map(|state| field(state, "Name"))
                    .unwrap_or_default();
                rows.push(vec![
                    record.identity.clone(),
                    record.region.clone(),
                    field(instance, "InstanceId"),
                    status,
                    field(instance, "InstanceType"),
                ]);
            }
        }
    }
    (headers(&["profile", "region", "instance_id", "status", "instance_type"]), rows)
}

/// Joins a `describe_db_instances` pass with a `describe_db_clusters` pass
/// into one row per database, instances first.
pub fn parse_databases(instances: &[CellResult], clusters: &[CellResult]) -> ResultTable {
    let mut rows = Vec::new();
    for record in instances {
        for instance in array(&record.response, "DBInstances") {
            rows.push(vec![
                record.identity.clone(),
                record.region.clone(),
                field(instance, "DBInstanceIdentifier"),
            ]);
        }
    }
    for record in clusters {
        for cluster in array(&record.response, "DBClusters") {
            rows.push(vec![
                record.identity.clone(),
                record.region.clone(),
                field(cluster, "DBClusterIdentifier"),
            ]);
        }
    }
    (headers(&["profile", "region", "name"]), rows)
}

/// Names of the buckets in one `list_buckets` response, for the keyed
/// per-bucket pass.
pub fn bucket_names(response: &Value) -> Vec<String> {
    array(response, "Buckets")
        .iter()
        .map(|bucket| field(bucket, "Name"))
        .filter(|name| !name.is_empty())
        .collect()
}

/// Joins a `list_buckets` pass with the keyed `get_bucket_location` pass into
/// one row per bucket. An empty location constraint is the S3 legacy encoding
/// for us-east-1.
pub fn parse_buckets(buckets: &[CellResult], locations: &[KeyedCellResult]) -> ResultTable {
    let located: HashMap<(&str, &str, &str), String> = locations
        .iter()
        .map(|record| {
            let mut location = field(&record.response, "LocationConstraint");
            if location.is_empty() {
                location = "us-east-1".to_owned();
            }
            (
                (record.identity.as_str(), record.region.as_str(), record.item.as_str()),
                location,
            )
        })
        .collect();

    let mut rows = Vec::new();
    for record in buckets {
        for bucket in array(&record.response, "Buckets") {
            let name = field(bucket, "Name");
            let location = located
                .get(&(record.identity.as_str(), record.region.as_str(), name.as_str()))
                .cloned()
                .unwrap_or_default();
            rows.push(vec![
                record.identity.clone(),
                record.region.clone(),
                name,
                field(bucket, "CreationDate"),
                location,
            ]);
        }
    }
    (headers(&["profile", "region", "bucket", "created", "location"]), rows)
}
