mod cache;
mod capability;
mod clients;
mod config;
mod invoke;
mod output;
mod parse;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::{info, LevelFilter};
use serde_json::json;
use simple_logger::SimpleLogger;

use crate::capability::{CallArgs, CellResult, TargetMatrix};
use crate::config::Config;
use crate::invoke::{InvokeOptions, KeyedParams};
use crate::parse::ResultTable;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the config file.
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// AWS profile to use instead of the configured list.
    #[arg(short, long)]
    profile: Option<String>,

    /// AWS region to use instead of the configured list.
    #[arg(short, long)]
    region: Option<String>,

    /// Replay cached responses when present instead of calling AWS.
    #[arg(long, default_value_t = false)]
    read: bool,

    /// Persist raw responses to the cache directory.
    #[arg(long, default_value_t = false)]
    write: bool,

    /// Rerun key namespacing this run's cache entries.
    #[arg(short, long)]
    key: Option<String>,

    /// Cache directory.
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Emit CSV instead of a table.
    #[arg(long, default_value_t = false)]
    csv: bool,

    #[arg(long, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the resolved configuration.
    Debug,
    /// Caller identity for every profile and region.
    Identity,
    /// EC2 instances for every profile and region.
    Instances,
    /// RDS database instances and clusters for every profile and region.
    Databases,
    /// S3 buckets and their locations for every profile and region.
    Buckets,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();

    if args.verbose {
        SimpleLogger::new()
            .with_level(LevelFilter::Info)
            .init()
            .unwrap();
    }

    let config = Config::load(&args.config)?;
    let profiles = config.resolve_profiles(args.profile.as_deref());
    let regions = config.resolve_regions(args.region.as_deref());

    if let Command::Debug = args.command {
        println!("config file: {}", args.config.display());
        println!("profiles: {profiles:?}");
        println!("regions: {regions:?}");
        return Ok(());
    }

    let mut opts = InvokeOptions {
        read: args.read,
        write: args.write,
        rerun_key: args.key,
        ..Default::default()
    };
    if let Some(dir) = args.cache_dir.or(config.cache_dir) {
        opts.cache_dir = dir;
    }
    if opts.write && opts.rerun_key.is_none() {
        let key = cache::new_rerun_key();
        info!("Caching responses under rerun key {key}");
        opts.rerun_key = Some(key);
    }

    let (headers, rows) = match args.command {
        Command::Debug => unreachable!("handled above"),
        Command::Identity => {
            let matrix = clients::build_matrix(&profiles, &regions, &["sts"]).await?;
            let results = invoke::invoke(&matrix, "get_caller_identity", CallArgs::None, &opts).await?;
            parse::parse_caller_identity(&results)
        }
        Command::Instances => {
            let matrix = clients::build_matrix(&profiles, &regions, &["ec2"]).await?;
            let results = invoke::invoke(&matrix, "describe_instances", CallArgs::None, &opts).await?;
            parse::parse_instances(&results)
        }
        Command::Databases => {
            let matrix = clients::build_matrix(&profiles, &regions, &["rds"]).await?;
            let instances = invoke::invoke(&matrix, "describe_db_instances", CallArgs::None, &opts).await?;
            let clusters = invoke::invoke(&matrix, "describe_db_clusters", CallArgs::None, &opts).await?;
            parse::parse_databases(&instances, &clusters)
        }
        Command::Buckets => {
            let matrix = clients::build_matrix(&profiles, &regions, &["s3"]).await?;
            buckets_report(&matrix, &opts).await?
        }
    };

    if args.csv {
        output::print_csv(&headers, &rows);
    } else {
        output::print_table(&headers, &rows);
    }
    Ok(())
}

/// Two passes: list every bucket, then one keyed location call per bucket
/// discovered in the first pass.
async fn buckets_report(matrix: &TargetMatrix, opts: &InvokeOptions) -> Result<ResultTable, anyhow::Error> {
    let buckets = invoke::invoke(matrix, "list_buckets", CallArgs::None, opts).await?;
    let keyed = keyed_bucket_params(&buckets);
    let locations = invoke::invoke_keyed(matrix, "get_bucket_location", &keyed, opts).await?;
    Ok(parse::parse_buckets(&buckets, &locations))
}

fn keyed_bucket_params(buckets: &[CellResult]) -> KeyedParams {
    let mut keyed = KeyedParams::new();
    for record in buckets {
        let leaf = keyed
            .entry(record.identity.clone())
            .or_default()
            .entry(record.region.clone())
            .or_default();
        for name in parse::bucket_names(&record.response) {
            leaf.insert(name.clone(), CallArgs::Positional(vec![json!(name)]));
        }
    }
    keyed
}
