//! AWS S3 backend for the bucket-archiver storage abstraction.
//!
//! Implements `StorageClient` with the AWS SDK for Rust, including the
//! multipart upload session family used by the chunked archive pipeline.

mod client;
mod error;

pub use client::{AwsCredentials, S3ClientSettings, S3StorageClient};
