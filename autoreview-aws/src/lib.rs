//! autoreview AWS - SQS and S3 backends
//!
//! This crate provides the broker-queue client over SQS and the prompt
//! fetcher over S3 (or any S3-compatible store).

mod s3;
mod sqs;

pub use s3::S3Fetcher;
pub use sqs::SqsBroker;

use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use autoreview_core::Error;

/// Map an SDK failure into the core taxonomy
///
/// Failures to build the request (missing region, unresolvable credentials)
/// are configuration problems; everything else is transport.
pub(crate) fn sdk_error<E, R>(context: &str, err: SdkError<E, R>) -> Error
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = format!("{}: {}", context, DisplayErrorContext(&err));
    match err {
        SdkError::ConstructionFailure(_) => Error::Config(message),
        _ => Error::Transport(message),
    }
}
