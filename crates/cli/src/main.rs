//! Command-line entry point for archiving a single bucket object.
//!
//! Reads the source object in chunks, compresses each chunk, and writes
//! the archive next to the configured output prefix. Logging is
//! controlled through `RUST_LOG` (defaults to info).

use clap::Parser;
use log::{error, info};

use bucket_archiver_pipeline::{ArchiveOutcome, Archiver, ArchiverConfig, RetrySettings};
use bucket_archiver_storage_s3::{S3ClientSettings, S3StorageClient};

#[derive(Parser, Debug)]
#[command(name = "bucket-archiver", about = "Archive a bucket object as a chunked gzip stream")]
struct Args {
    /// Source bucket name.
    #[arg(long)]
    bucket: String,

    /// Source object key.
    #[arg(long)]
    key: String,

    /// AWS region.
    #[arg(long, default_value = "us-west-2")]
    region: String,

    /// Chunk size in bytes.
    #[arg(long, default_value_t = bucket_archiver_pipeline::DEFAULT_CHUNK_SIZE)]
    chunk_size: u64,

    /// Objects at or below this size (bytes) are written with one
    /// direct put instead of a multipart session.
    #[arg(long, default_value_t = bucket_archiver_pipeline::DEFAULT_SMALL_OBJECT_THRESHOLD)]
    small_object_threshold: u64,

    /// Maximum concurrent chunk workers.
    #[arg(long, default_value_t = bucket_archiver_pipeline::DEFAULT_MAX_FAN_OUT)]
    fan_out: usize,

    /// Maximum attempts per chunk.
    #[arg(long, default_value_t = 3)]
    max_attempts: u32,

    /// Destination key prefix for archives.
    #[arg(long, default_value = bucket_archiver_pipeline::DEFAULT_OUTPUT_PREFIX)]
    output_prefix: String,

    /// Expected bucket owner account ID, validated on every request.
    #[arg(long)]
    expected_bucket_owner: Option<String>,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if let Err(err) = run(args).await {
        error!("{err}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let client = S3StorageClient::new(S3ClientSettings {
        region: args.region,
        credentials: None,
        expected_bucket_owner: args.expected_bucket_owner,
    })
    .await?;

    let config = ArchiverConfig::default()
        .with_chunk_size(args.chunk_size)
        .with_small_object_threshold(args.small_object_threshold)
        .with_max_fan_out(args.fan_out)
        .with_retry(RetrySettings {
            max_attempts: args.max_attempts,
            ..RetrySettings::default()
        })
        .with_output_prefix(args.output_prefix);

    let archiver = Archiver::new(&client, config);
    match archiver.archive_object(&args.bucket, &args.key).await? {
        ArchiveOutcome::Archived {
            location,
            parts,
            original_size,
        } => {
            info!("archived {original_size} bytes in {parts} part(s) to {location}");
            println!("{location}");
        }
        ArchiveOutcome::Skipped { key } => {
            info!("skipped {key}: already under the output prefix");
        }
    }
    Ok(())
}
