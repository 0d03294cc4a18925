use std::sync::Arc;

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use log::info;
use serde_json::{json, Value};

use crate::capability::{CallArgs, Capability, CapabilityHandle, TargetMatrix};

/// Builds the target matrix: one capability handle per requested service for
/// every profile x region combination.
pub async fn build_matrix(
    profiles: &[String],
    regions: &[String],
    services: &[&str],
) -> Result<TargetMatrix, anyhow::Error> {
    let mut matrix = TargetMatrix::new();
    for profile in profiles {
        for region in regions {
            info!("Loading AWS config for profile {profile} in {region}");
            let config = aws_config::defaults(BehaviorVersion::v2023_11_09())
                .profile_name(profile)
                .region(Region::new(region.clone()))
                .load()
                .await;
            for service in services {
                matrix.insert(profile, region, service, new_capability(service, &config)?);
            }
        }
    }
    if matrix.is_empty() {
        bail!("no profiles configured; set profiles in the config file or pass --profile");
    }
    Ok(matrix)
}

fn new_capability(service: &str, config: &SdkConfig) -> Result<CapabilityHandle, anyhow::Error> {
    let handle: CapabilityHandle = match service {
        "sts" => Arc::new(StsCapability::new(config)),
        "ec2" => Arc::new(Ec2Capability::new(config)),
        "rds" => Arc::new(RdsCapability::new(config)),
        "s3" => Arc::new(S3Capability::new(config)),
        other => bail!("unsupported service: {other}"),
    };
    Ok(handle)
}

fn expect_no_args(service: &str, operation: &str, args: &CallArgs) -> Result<(), anyhow::Error> {
    match args {
        CallArgs::None => Ok(()),
        _ => bail!("{service} {operation} takes no arguments"),
    }
}

/// Accepts either one positional string or the named form, e.g.
/// `get_bucket_location("bucket-a")` or `get_bucket_location(Bucket="bucket-a")`.
fn single_string_arg(
    service: &str,
    operation: &str,
    name: &str,
    args: &CallArgs,
) -> Result<String, anyhow::Error> {
    let value = match args {
        CallArgs::Positional(values) if values.len() == 1 => &values[0],
        CallArgs::Named(map) => map
            .get(name)
            .ok_or_else(|| anyhow!("{service} {operation} requires the {name} argument"))?,
        _ => bail!("{service} {operation} requires exactly one {name} argument"),
    };
    value
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| anyhow!("{service} {operation} {name} argument must be a string"))
}

struct StsCapability {
    client: aws_sdk_sts::Client,
}

impl StsCapability {
    fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_sts::Client::new(config),
        }
    }
}

#[async_trait]
impl Capability for StsCapability {
    async fn call(&self, operation: &str, args: &CallArgs) -> Result<Value, anyhow::Error> {
        match operation {
            "get_caller_identity" => {
                expect_no_args("sts", operation, args)?;
                let output = self.client.get_caller_identity().send().await?;
                Ok(json!({
                    "UserId": output.user_id().unwrap_or_default(),
                    "Account": output.account().unwrap_or_default(),
                    "Arn": output.arn().unwrap_or_default(),
                }))
            }
            other => bail!("sts capability does not support {other}"),
        }
    }
}

struct Ec2Capability {
    client: aws_sdk_ec2::Client,
}

impl Ec2Capability {
    fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_ec2::Client::new(config),
        }
    }
}

#[async_trait]
impl Capability for Ec2Capability {
    async fn call(&self, operation: &str, args: &CallArgs) -> Result<Value, anyhow::Error> {
        match operation {
            "describe_instances" => {
                expect_no_args("ec2", operation, args)?;
                let output = self.client.describe_instances().send().await?;
                let reservations: Vec<Value> = output
                    .reservations()
                    .iter()
                    .map(|reservation| {
                        let instances: Vec<Value> =
                            reservation.instances().iter().map(instance_to_value).collect();
                        json!({"Instances": instances})
                    })
                    .collect();
                Ok(json!({"Reservations": reservations}))
            }
            other => bail!("ec2 capability does not support {other}"),
        }
    }
}

fn instance_to_value(instance: &aws_sdk_ec2::types::Instance) -> Value {
    let tags: Vec<Value> = instance
        .tags()
        .iter()
        .map(|tag| {
            json!({
                "Key": tag.key().unwrap_or_default(),
                "Value": tag.value().unwrap_or_default(),
            })
        })
        .collect();
    json!({
        "InstanceId": instance.instance_id().unwrap_or_default(),
        "InstanceType": instance.instance_type().map(|t| t.as_str()).unwrap_or_default(),
        "State": {
            "Name": instance
                .state()
                .and_then(|state| state.name())
                .map(|name| name.as_str())
                .unwrap_or_default(),
        },
        "PrivateIpAddress": instance.private_ip_address().unwrap_or_default(),
        "PublicIpAddress": instance.public_ip_address().unwrap_or_default(),
        // Timestamps are not JSON-native; stringify.
        "LaunchTime": instance.launch_time().map(|t| t.to_string()).unwrap_or_default(),
        "Tags": tags,
    })
}

struct RdsCapability {
    client: aws_sdk_rds::Client,
}

impl RdsCapability {
    fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_rds::Client::new(config),
        }
    }
}

#[async_trait]
impl Capability for RdsCapability {
    async fn call(&self, operation: &str, args: &CallArgs) -> Result<Value, anyhow::Error> {
        match operation {
            "describe_db_instances" => {
                expect_no_args("rds", operation, args)?;
                let output = self.client.describe_db_instances().send().await?;
                let instances: Vec<Value> = output
                    .db_instances()
                    .iter()
                    .map(|instance| {
                        json!({
                            "DBInstanceIdentifier": instance.db_instance_identifier().unwrap_or_default(),
                            "Engine": instance.engine().unwrap_or_default(),
                            "DBInstanceStatus": instance.db_instance_status().unwrap_or_default(),
                        })
                    })
                    .collect();
                Ok(json!({"DBInstances": instances}))
            }
            "describe_db_clusters" => {
                expect_no_args("rds", operation, args)?;
                let output = self.client.describe_db_clusters().send().await?;
                let clusters: Vec<Value> = output
                    .db_clusters()
                    .iter()
                    .map(|cluster| {
                        json!({
                            "DBClusterIdentifier": cluster.db_cluster_identifier().unwrap_or_default(),
                            "Engine": cluster.engine().unwrap_or_default(),
                            "Status": cluster.status().unwrap_or_default(),
                        })
                    })
                    .collect();
                Ok(json!({"DBClusters": clusters}))
            }
            other => bail!("rds capability does not support {other}"),
        }
    }
}

struct S3Capability {
    client: aws_sdk_s3::Client,
}

impl S3Capability {
    fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_s3::Client::new(config),
        }
    }
}

#[async_trait]
impl Capability for S3Capability {
    async fn call(&self, operation: &str, args: &CallArgs) -> Result<Value, anyhow::Error> {
        match operation {
            "list_buckets" => {
                expect_no_args("s3", operation, args)?;
                let output = self.client.list_buckets().send().await?;
                let buckets: Vec<Value> = output
                    .buckets()
                    .iter()
                    .map(|bucket| {
                        json!({
                            "Name": bucket.name().unwrap_or_default(),
                            "CreationDate": bucket
                                .creation_date()
                                .map(|t| t.to_string())
                                .unwrap_or_default(),
                        })
                    })
                    .collect();
                Ok(json!({"Buckets": buckets}))
            }
            "get_bucket_location" => {
                let bucket = single_string_arg("s3", operation, "Bucket", args)?;
                let output = self.client.get_bucket_location().bucket(bucket).send().await?;
                Ok(json!({
                    "LocationConstraint": output
                        .location_constraint()
                        .map(|l| l.as_str())
                        .unwrap_or_default(),
                }))
            }
            other => bail!("s3 capability does not support {other}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_string_arg_accepts_positional_form() {
        let args = CallArgs::Positional(vec![json!("bucket-a")]);
        assert_eq!(single_string_arg("s3", "get_bucket_location", "Bucket", &args).unwrap(), "bucket-a");
    }

    #[test]
    fn single_string_arg_accepts_named_form() {
        let mut map = serde_json::Map::new();
        map.insert("Bucket".to_owned(), json!("bucket-b"));
        let args = CallArgs::Named(map);
        assert_eq!(single_string_arg("s3", "get_bucket_location", "Bucket", &args).unwrap(), "bucket-b");
    }

    #[test]
    fn single_string_arg_rejects_missing_and_non_string_values() {
        assert!(single_string_arg("s3", "op", "Bucket", &CallArgs::None).is_err());
        let args = CallArgs::Positional(vec![json!(42)]);
        assert!(single_string_arg("s3", "op", "Bucket", &args).is_err());
    }

    #[tokio::test]
    async fn empty_profile_list_yields_an_empty_matrix_error() {
        let result = build_matrix(&[], &["us-east-1".to_owned()], &["sts"]).await;
        assert!(result.is_err());
    }

    #[test]
    fn expect_no_args_rejects_parameters() {
        assert!(expect_no_args("sts", "get_caller_identity", &CallArgs::None).is_ok());
        let args = CallArgs::Positional(vec![json!("x")]);
        assert!(expect_no_args("sts", "get_caller_identity", &args).is_err());
    }
}
