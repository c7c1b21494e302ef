//! S3 prompt fetcher

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::Client;
use autoreview_core::{Error, PromptFetcher, PromptLocator, Result};
use tracing::{debug, info};

use crate::sdk_error;

/// Region used with custom endpoints, which do not route on region
const CUSTOM_ENDPOINT_REGION: &str = "auto";

/// Prompt fetcher backed by S3 or an S3-compatible store
#[derive(Debug, Clone)]
pub struct S3Fetcher {
    client: Client,
}

impl S3Fetcher {
    /// Create a fetcher from an existing SDK client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Create a fetcher, optionally pointed at a custom endpoint
    ///
    /// Without an endpoint the default AWS resolution applies. With one, the
    /// region is `auto` and path-style addressing keeps the host fixed.
    pub async fn connect(endpoint: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if endpoint.is_some() {
            loader = loader.region(Region::new(CUSTOM_ENDPOINT_REGION));
        }
        let sdk_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
            info!(endpoint, "Created S3 client with custom endpoint");
        } else {
            info!("Created S3 client");
        }

        Self::new(Client::from_conf(builder.build()))
    }
}

fn get_object_error<R>(locator: &PromptLocator, err: SdkError<GetObjectError, R>) -> Error
where
    R: std::fmt::Debug,
{
    match err {
        SdkError::ServiceError(ref service) if service.err().is_no_such_key() => {
            Error::NotFound(format!("s3://{}", locator))
        }
        other => sdk_error("S3 GetObject failed", other),
    }
}

#[async_trait]
impl PromptFetcher for S3Fetcher {
    async fn fetch(&self, locator: &PromptLocator) -> Result<Vec<u8>> {
        debug!(bucket = %locator.bucket, key = %locator.key, "Fetching prompt");

        let output = self
            .client
            .get_object()
            .bucket(&locator.bucket)
            .key(&locator.key)
            .send()
            .await
            .map_err(|e| get_object_error(locator, e))?;

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| Error::Transport(format!("Failed to read s3://{}: {}", locator, e)))?
            .into_bytes();

        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::types::error::{InvalidObjectState, NoSuchKey};

    fn locator() -> PromptLocator {
        PromptLocator::parse("s3://reviews/acme/42.txt").unwrap()
    }

    #[test]
    fn test_no_such_key_is_not_found() {
        let err: SdkError<GetObjectError, ()> =
            SdkError::service_error(GetObjectError::NoSuchKey(NoSuchKey::builder().build()), ());
        match get_object_error(&locator(), err) {
            Error::NotFound(what) => assert_eq!(what, "s3://reviews/acme/42.txt"),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_other_service_error_is_transport() {
        let state = InvalidObjectState::builder().build();
        let err: SdkError<GetObjectError, ()> =
            SdkError::service_error(GetObjectError::InvalidObjectState(state), ());
        assert!(matches!(get_object_error(&locator(), err), Error::Transport(_)));
    }

    #[test]
    fn test_construction_failure_is_config() {
        let err: SdkError<GetObjectError, ()> = SdkError::construction_failure("no region");
        assert!(matches!(get_object_error(&locator(), err), Error::Config(_)));
    }
}
