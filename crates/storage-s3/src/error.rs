//! Mapping of AWS SDK errors into the storage error taxonomy.

use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};

use bucket_archiver_storage::StorageError;

/// Service error codes that indicate a transient condition worth retrying.
const RETRYABLE_CODES: &[&str] = &[
    "RequestTimeout",
    "InternalError",
    "ServiceUnavailable",
];

/// Service error codes for request-rate limiting.
const THROTTLING_CODES: &[&str] = &[
    "SlowDown",
    "Throttling",
    "ThrottlingException",
    "RequestLimitExceeded",
];

/// Service error codes for authorization failures.
const ACCESS_DENIED_CODES: &[&str] = &[
    "AccessDenied",
    "InvalidAccessKeyId",
    "SignatureDoesNotMatch",
    "ExpiredToken",
];

/// Classify an SDK error into the pipeline's transient/permanent taxonomy.
///
/// Dispatch, timeout, and response-decode failures never reached the
/// service and are retryable network errors. Service errors are classified
/// by error code; unknown codes are treated as permanent so a
/// misconfigured request cannot burn a whole retry budget.
pub(crate) fn classify_sdk_error<E, R>(
    bucket: &str,
    key: &str,
    err: &SdkError<E, R>,
) -> StorageError
where
    E: ProvideErrorMetadata,
{
    match err {
        SdkError::ServiceError(ctx) => {
            let code = ctx.err().code().unwrap_or("Unknown");
            let message = format!(
                "{}: {}",
                code,
                ctx.err().message().unwrap_or("no message")
            );
            if THROTTLING_CODES.contains(&code) {
                StorageError::Throttled { message }
            } else if RETRYABLE_CODES.contains(&code) {
                StorageError::ServiceError {
                    message,
                    retryable: true,
                }
            } else if ACCESS_DENIED_CODES.contains(&code) {
                StorageError::AccessDenied {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    message,
                }
            } else if code == "NoSuchKey" || code == "NoSuchBucket" || code == "NotFound" {
                StorageError::NotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                }
            } else {
                StorageError::ServiceError {
                    message,
                    retryable: false,
                }
            }
        }
        SdkError::DispatchFailure(failure) => StorageError::NetworkError {
            message: format!("Dispatch failure: {failure:?}"),
            retryable: true,
        },
        SdkError::TimeoutError(_) => StorageError::NetworkError {
            message: "Request timed out".to_string(),
            retryable: true,
        },
        SdkError::ResponseError(_) => StorageError::NetworkError {
            message: "Malformed response from service".to_string(),
            retryable: true,
        },
        _ => StorageError::Other {
            message: "Request construction failed".to_string(),
        },
    }
}
