//! Fixed-size control of the fallback Auto Scaling group.

use async_trait::async_trait;
use aws_sdk_autoscaling::error::DisplayErrorContext;
use aws_sdk_autoscaling::Client;
use tracing::info;

use crate::error::RemoteError;
use crate::metrics::{self, Timer};

/// Instance count that shuts the group down.
pub const SHUTDOWN: i32 = 0;

/// Instance count that keeps the fallback path serving.
pub const SERVING: i32 = 1;

/// Sets the instance count of an autoscaling group.
#[async_trait]
pub trait CapacityController: Send + Sync {
    /// Set min, max and desired to `desired` in one call.
    ///
    /// Setting the current size again is a no-op on the remote side.
    async fn set_capacity(&self, group_name: &str, desired: i32) -> Result<(), RemoteError>;
}

/// Auto Scaling backed controller.
pub struct AutoScalingCapacity {
    client: Client,
}

impl AutoScalingCapacity {
    /// Wrap a configured Auto Scaling client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CapacityController for AutoScalingCapacity {
    async fn set_capacity(&self, group_name: &str, desired: i32) -> Result<(), RemoteError> {
        info!(group_name, desired, "Updating auto scaling group capacity");

        let timer = Timer::start();
        let result = self
            .client
            .update_auto_scaling_group()
            .auto_scaling_group_name(group_name)
            .min_size(desired)
            .max_size(desired)
            .desired_capacity(desired)
            .send()
            .await;
        metrics::record_remote_call("autoscaling", "UpdateAutoScalingGroup", timer.elapsed());

        result.map_err(|e| RemoteError::Service {
            service: "autoscaling",
            operation: "UpdateAutoScalingGroup",
            message: DisplayErrorContext(&e).to_string(),
        })?;

        info!(group_name, desired, "Auto scaling group capacity updated");
        Ok(())
    }
}
