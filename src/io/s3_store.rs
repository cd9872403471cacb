//! S3 listing through the AWS SDK
//!
//! Each store owns a current-thread tokio runtime, so a worker thread drives
//! its own client synchronously and no runtime is shared across workers.
//! Credentials come from the default AWS provider chain.

use crate::io::ObjectStore;
use crate::types::{CoverageError, CoverageResult};
use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::operation::list_objects_v2::{ListObjectsV2Error, ListObjectsV2Output};
use aws_sdk_s3::Client as S3Client;
use std::time::Duration;
use tokio::runtime::Runtime;

pub struct S3ObjectStore {
    client: S3Client,
    runtime: Runtime,
    region: String,
    endpoint_url: Option<String>,
}

impl S3ObjectStore {
    /// `endpoint_url` and `force_path_style` target S3-compatible services
    /// such as MinIO or LocalStack; `timeout` bounds each listing call
    pub fn new(
        region: &str,
        endpoint_url: Option<&str>,
        force_path_style: bool,
        timeout: Duration,
    ) -> CoverageResult<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| CoverageError::BackendUnavailable(format!("Failed to start S3 client runtime: {}", e)))?;

        let aws_config = runtime.block_on(
            aws_config::defaults(BehaviorVersion::latest())
                .region(Region::new(region.to_string()))
                .timeout_config(TimeoutConfig::builder().operation_timeout(timeout).build())
                .load(),
        );

        let mut s3_config_builder = S3ConfigBuilder::from(&aws_config);
        if let Some(endpoint_url) = endpoint_url {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint_url);
        }
        if force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }
        let client = S3Client::from_conf(s3_config_builder.build());

        log::debug!("S3 client initialized for region {}", region);
        Ok(Self {
            client,
            runtime,
            region: region.to_string(),
            endpoint_url: endpoint_url.map(String::from),
        })
    }
}

impl ObjectStore for S3ObjectStore {
    fn list_keys(&self, bucket: &str, prefix: &str) -> CoverageResult<Vec<String>> {
        self.runtime.block_on(async {
            let mut pages = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .prefix(prefix)
                .into_paginator()
                .send();

            let mut keys = Vec::new();
            while let Some(page) = pages.next().await {
                let page = page.map_err(|e| classify_listing_error(bucket, prefix, e))?;
                keys.extend(page_keys(&page));
            }
            Ok(keys)
        })
    }

    fn check_access(&self, bucket: &str) -> CoverageResult<()> {
        self.runtime
            .block_on(self.client.list_objects_v2().bucket(bucket).max_keys(1).send())
            .map(|_| ())
            .map_err(|e| classify_listing_error(bucket, "", e))
    }

    fn describe(&self) -> String {
        match &self.endpoint_url {
            Some(endpoint) => format!("S3 endpoint {} ({})", endpoint, self.region),
            None => format!("S3 ({})", self.region),
        }
    }
}

fn page_keys(page: &ListObjectsV2Output) -> impl Iterator<Item = String> + '_ {
    page.contents().iter().filter_map(|obj| obj.key().map(String::from))
}

/// Authentication and permission failures hold for every prefix of a bucket
fn is_access_failure(status: u16) -> bool {
    matches!(status, 401 | 403)
}

/// Split SDK failures into "this prefix failed" and "the backend is unusable"
fn classify_listing_error(bucket: &str, prefix: &str, err: SdkError<ListObjectsV2Error>) -> CoverageError {
    let message = DisplayErrorContext(&err).to_string();
    let backend_unusable = match &err {
        SdkError::ConstructionFailure(_) | SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => true,
        SdkError::ServiceError(service) => {
            matches!(service.err(), ListObjectsV2Error::NoSuchBucket(_))
                || is_access_failure(service.raw().status().as_u16())
        }
        SdkError::ResponseError(response) => is_access_failure(response.raw().status().as_u16()),
        _ => false,
    };

    if backend_unusable {
        CoverageError::BackendUnavailable(format!("s3://{}: {}", bucket, message))
    } else {
        CoverageError::Listing {
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::types::Object;

    #[test]
    fn test_page_keys_skip_keyless_entries() {
        let page = ListObjectsV2Output::builder()
            .contents(Object::builder().key("products/POE/2024/02/01/a.xml").build())
            .contents(Object::builder().build())
            .contents(Object::builder().key("products/POE/2024/02/01/b&c.xml").build())
            .build();

        let keys: Vec<String> = page_keys(&page).collect();
        assert_eq!(keys, vec!["products/POE/2024/02/01/a.xml", "products/POE/2024/02/01/b&c.xml"]);
    }

    #[test]
    fn test_auth_failures_are_not_per_prefix() {
        assert!(is_access_failure(401));
        assert!(is_access_failure(403));
        assert!(!is_access_failure(404));
        assert!(!is_access_failure(500));
        assert!(!is_access_failure(503));
    }

    #[test]
    fn test_store_builds_without_network() {
        let store = S3ObjectStore::new("us-west-2", Some("http://127.0.0.1:9000"), true, Duration::from_secs(5))
            .expect("Failed to build S3 store");
        assert_eq!(store.describe(), "S3 endpoint http://127.0.0.1:9000 (us-west-2)");
        assert_eq!(store.object_uri("nisar-ops-rs-fwd", "a/b.h5"), "s3://nisar-ops-rs-fwd/a/b.h5");
    }
}
