//! CDN default-origin switching.

use async_trait::async_trait;
use aws_sdk_cloudfront::error::DisplayErrorContext;
use aws_sdk_cloudfront::types::DistributionConfig;
use aws_sdk_cloudfront::Client;
use tracing::info;

use crate::error::RemoteError;
use crate::metrics::{self, Timer};

/// Points a distribution's default cache behavior at another origin.
#[async_trait]
pub trait OriginSwitcher: Send + Sync {
    /// Retarget `distribution_id` to `origin_id`.
    ///
    /// The origin must already be declared on the distribution. A stale
    /// entity tag yields [`RemoteError::ConcurrencyConflict`]; the caller
    /// decides whether to retry.
    async fn retarget(&self, distribution_id: &str, origin_id: &str) -> Result<(), RemoteError>;
}

/// Rewrite only the default cache behavior's target origin.
pub fn set_default_origin(
    config: &mut DistributionConfig,
    origin_id: &str,
) -> Result<(), RemoteError> {
    let behavior = config
        .default_cache_behavior
        .as_mut()
        .ok_or(RemoteError::MissingField {
            service: "cloudfront",
            operation: "GetDistributionConfig",
            field: "DefaultCacheBehavior",
        })?;
    behavior.target_origin_id = origin_id.to_string();
    Ok(())
}

/// CloudFront backed origin switcher.
pub struct CloudFrontOrigins {
    client: Client,
}

impl CloudFrontOrigins {
    /// Wrap a configured CloudFront client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl OriginSwitcher for CloudFrontOrigins {
    async fn retarget(&self, distribution_id: &str, origin_id: &str) -> Result<(), RemoteError> {
        info!(distribution_id, origin_id, "Retargeting CloudFront distribution");

        let timer = Timer::start();
        let current = self
            .client
            .get_distribution_config()
            .id(distribution_id)
            .send()
            .await;
        metrics::record_remote_call("cloudfront", "GetDistributionConfig", timer.elapsed());

        let current = current.map_err(|e| RemoteError::Service {
            service: "cloudfront",
            operation: "GetDistributionConfig",
            message: DisplayErrorContext(&e).to_string(),
        })?;

        let etag = current.e_tag().map(str::to_owned);
        let mut config = current.distribution_config.ok_or(RemoteError::MissingField {
            service: "cloudfront",
            operation: "GetDistributionConfig",
            field: "DistributionConfig",
        })?;
        set_default_origin(&mut config, origin_id)?;

        let timer = Timer::start();
        let updated = self
            .client
            .update_distribution()
            .id(distribution_id)
            .distribution_config(config)
            .set_if_match(etag)
            .send()
            .await;
        metrics::record_remote_call("cloudfront", "UpdateDistribution", timer.elapsed());

        match updated {
            Ok(_) => {
                info!(distribution_id, origin_id, "CloudFront distribution retargeted");
                Ok(())
            }
            Err(e) => {
                let stale = e.as_service_error().is_some_and(|se| {
                    se.is_precondition_failed() || se.is_invalid_if_match_version()
                });
                if stale {
                    Err(RemoteError::ConcurrencyConflict {
                        distribution_id: distribution_id.to_string(),
                    })
                } else {
                    Err(RemoteError::Service {
                        service: "cloudfront",
                        operation: "UpdateDistribution",
                        message: DisplayErrorContext(&e).to_string(),
                    })
                }
            }
        }
    }
}
