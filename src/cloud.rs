//! Authenticated cloud client bundle, built on demand from static config.

use async_trait::async_trait;
use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::Credentials;
use std::sync::Arc;
use tracing::debug;

use crate::capacity::{AutoScalingCapacity, CapacityController};
use crate::config::AwsConfig;
use crate::error::CloudError;
use crate::origin::{CloudFrontOrigins, OriginSwitcher};
use crate::records::{RecordUpdater, Route53Records};

/// Clients for the three services mutated during reconciliation.
#[derive(Clone)]
pub struct CloudClients {
    /// DNS record updater.
    pub records: Arc<dyn RecordUpdater>,
    /// CDN origin switcher.
    pub origins: Arc<dyn OriginSwitcher>,
    /// Compute capacity controller.
    pub capacity: Arc<dyn CapacityController>,
}

/// Builds [`CloudClients`].
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Build a fresh client bundle.
    async fn connect(&self) -> Result<CloudClients, CloudError>;
}

/// AWS provider using a static key pair and a fixed region.
pub struct AwsProvider {
    config: AwsConfig,
}

impl AwsProvider {
    /// Create a provider for the given AWS settings.
    pub fn new(config: AwsConfig) -> Self {
        Self { config }
    }

    async fn sdk_config(&self) -> Result<SdkConfig, CloudError> {
        if self.config.access_key.is_empty() {
            return Err(CloudError::MissingCredential("access_key"));
        }
        if self.config.secret_key.is_empty() {
            return Err(CloudError::MissingCredential("secret_key"));
        }
        if self.config.region.is_empty() {
            return Err(CloudError::MissingRegion);
        }

        let credentials = Credentials::new(
            self.config.access_key.clone(),
            self.config.secret_key.clone(),
            None,
            None,
            "edge-failover-static",
        );
        let timeouts = TimeoutConfig::builder()
            .operation_timeout(self.config.request_timeout())
            .build();

        debug!(region = %self.config.region, "Building AWS config");

        Ok(aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(self.config.region.clone()))
            .credentials_provider(credentials)
            .timeout_config(timeouts)
            .load()
            .await)
    }
}

#[async_trait]
impl CloudProvider for AwsProvider {
    async fn connect(&self) -> Result<CloudClients, CloudError> {
        let sdk = self.sdk_config().await?;

        Ok(CloudClients {
            records: Arc::new(Route53Records::new(aws_sdk_route53::Client::new(&sdk))),
            origins: Arc::new(CloudFrontOrigins::new(aws_sdk_cloudfront::Client::new(&sdk))),
            capacity: Arc::new(AutoScalingCapacity::new(aws_sdk_autoscaling::Client::new(&sdk))),
        })
    }
}
