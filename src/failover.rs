//! Failover state machine.
//!
//! ```text
//!            closed=true                     closed=false
//!   Unknown ─────────────▶ Fallback   Unknown ─────────────▶ Normal
//!   Normal  ─────────────▶ Fallback   Fallback ────────────▶ Normal (+ pending shutdown)
//!
//!   any failed transition ─────────▶ Unknown
//! ```
//!
//! Entering fallback guarantees capacity before traffic is redirected:
//! capacity → 1, CDN → fallback origin, DNS → fallback value.
//! Leaving fallback restores the primary path and keeps the fallback
//! capacity warm until the configured delay has passed:
//! CDN → normal origin, capacity → 1, DNS → normal value, then after the
//! delay capacity → 0.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::capacity::{SERVING, SHUTDOWN};
use crate::cloud::{CloudClients, CloudProvider};
use crate::config::IspFallbackConfig;
use crate::error::{FailoverError, RemoteError};
use crate::metrics;
use crate::records::{self, RecordChange};

/// Which path serves traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailoverMode {
    /// Primary link serves traffic.
    Normal,
    /// Cloud fallback serves traffic.
    Fallback,
}

impl FailoverMode {
    /// Lowercase name for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailoverMode::Normal => "normal",
            FailoverMode::Fallback => "fallback",
        }
    }
}

/// Static targets for both modes.
#[derive(Debug, Clone)]
pub struct FailoverPlan {
    /// Hosted zones holding the failover record.
    pub zone_ids: Vec<String>,
    /// Failover record name.
    pub record_name: String,
    /// Failover record type.
    pub record_type: String,
    /// Failover record TTL.
    pub ttl: i64,
    /// Record value while normal.
    pub normal_value: String,
    /// Record value while failed over.
    pub fallback_value: String,
    /// CloudFront distribution.
    pub distribution_id: String,
    /// Origin while normal.
    pub normal_origin: String,
    /// Origin while failed over.
    pub fallback_origin: String,
    /// Auto Scaling group.
    pub group_name: String,
    /// Grace period before scaling the group to zero after recovery.
    pub shutdown_delay: Duration,
}

impl From<&IspFallbackConfig> for FailoverPlan {
    fn from(config: &IspFallbackConfig) -> Self {
        Self {
            zone_ids: config.record.hosted_zone_ids.clone(),
            record_name: config.record.name.clone(),
            record_type: config.record.record_type.clone(),
            ttl: config.record.ttl,
            normal_value: config.record.normal.clone(),
            fallback_value: config.record.fallback.clone(),
            distribution_id: config.cloudfront.distribution_id.clone(),
            normal_origin: config.cloudfront.normal_origin.clone(),
            fallback_origin: config.cloudfront.fallback_origin.clone(),
            group_name: config.auto_scaling_group.name.clone(),
            shutdown_delay: config.auto_scaling_group.shutdown_delay(),
        }
    }
}

impl FailoverPlan {
    fn record(&self, mode: FailoverMode) -> RecordChange {
        let value = match mode {
            FailoverMode::Normal => &self.normal_value,
            FailoverMode::Fallback => &self.fallback_value,
        };
        RecordChange {
            name: self.record_name.clone(),
            value: value.clone(),
            ttl: self.ttl,
            record_type: self.record_type.clone(),
        }
    }
}

/// Snapshot of the machine's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailoverStatus {
    /// Current mode, `None` while unknown.
    pub mode: Option<FailoverMode>,
    /// When the fallback group will be scaled to zero.
    pub pending_shutdown: Option<Instant>,
}

/// What the transition step of a tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Mode already matched the observation.
    Unchanged,
    /// Successfully switched to the given mode.
    Switched(FailoverMode),
    /// The switch towards `target` failed; mode is now unknown.
    Failed {
        /// Mode that was being entered.
        target: FailoverMode,
        /// The remote call that failed.
        error: RemoteError,
    },
}

/// What the pending-shutdown step of a tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownCheck {
    /// No shutdown is scheduled.
    Idle,
    /// Scheduled but not yet due.
    Waiting {
        /// Time left until the deadline.
        remaining: Duration,
    },
    /// The group was scaled to zero and the schedule cleared.
    Completed,
    /// Scale-down failed; the schedule stays for the next tick.
    Failed(RemoteError),
}

/// Result of one reachability observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Whether the primary path was observed down.
    pub closed: bool,
    /// Transition step outcome.
    pub transition: Transition,
    /// Shutdown step outcome.
    pub shutdown: ShutdownCheck,
    /// State after the tick.
    pub status: FailoverStatus,
}

/// The failover state machine.
///
/// Not synchronized: exactly one owner drives it, see
/// [`crate::controller`].
pub struct FailoverMachine {
    plan: FailoverPlan,
    provider: Arc<dyn CloudProvider>,
    mode: Option<FailoverMode>,
    pending_shutdown: Option<Instant>,
}

impl FailoverMachine {
    /// Create a machine in the unknown state.
    pub fn new(plan: FailoverPlan, provider: Arc<dyn CloudProvider>) -> Self {
        Self {
            plan,
            provider,
            mode: None,
            pending_shutdown: None,
        }
    }

    /// Current state.
    pub fn status(&self) -> FailoverStatus {
        FailoverStatus {
            mode: self.mode,
            pending_shutdown: self.pending_shutdown,
        }
    }

    /// Forget the current mode so the next observation re-applies it.
    pub fn reset(&mut self) {
        self.mode = None;
        metrics::record_mode(None);
    }

    /// Feed one reachability observation taken at `now`.
    ///
    /// Remote failures are reported in the [`TickReport`]. Failing to build
    /// cloud clients aborts the tick, including the shutdown check.
    pub async fn observe(&mut self, closed: bool, now: Instant) -> Result<TickReport, FailoverError> {
        let mut clients = None;

        let transition = match (self.mode, closed) {
            (None | Some(FailoverMode::Fallback), false) => {
                self.exit_fallback(&mut clients, now).await?
            }
            (None | Some(FailoverMode::Normal), true) => {
                self.enter_fallback(&mut clients, now).await?
            }
            (Some(mode), _) => {
                if closed {
                    info!(mode = mode.as_str(), "ISP ports are closed");
                } else {
                    info!(mode = mode.as_str(), "ISP ports are open");
                }
                Transition::Unchanged
            }
        };

        let shutdown = self.check_shutdown(&mut clients, now).await?;

        metrics::record_mode(self.mode);
        metrics::record_shutdown_pending(self.pending_shutdown.is_some());

        Ok(TickReport {
            closed,
            transition,
            shutdown,
            status: self.status(),
        })
    }

    async fn exit_fallback(
        &mut self,
        clients: &mut Option<CloudClients>,
        now: Instant,
    ) -> Result<Transition, FailoverError> {
        info!("Disabling ISP fallback");

        let clients = match self.connect(clients).await {
            Ok(clients) => clients,
            Err(e) => {
                self.mode = None;
                self.pending_shutdown = None;
                return Err(e);
            }
        };

        let plan = &self.plan;
        let result = async {
            clients
                .origins
                .retarget(&plan.distribution_id, &plan.normal_origin)
                .await?;
            clients.capacity.set_capacity(&plan.group_name, SERVING).await?;
            records::upsert(
                clients.records.as_ref(),
                &plan.zone_ids,
                &plan.record(FailoverMode::Normal),
                "failover",
            )
            .await
            .into_result()
        }
        .await;

        Ok(self.finish(FailoverMode::Normal, result, now))
    }

    async fn enter_fallback(
        &mut self,
        clients: &mut Option<CloudClients>,
        now: Instant,
    ) -> Result<Transition, FailoverError> {
        info!("Enabling ISP fallback");

        if self.pending_shutdown.take().is_some() {
            info!("Cancelled pending auto scaling group shutdown");
        }

        let clients = match self.connect(clients).await {
            Ok(clients) => clients,
            Err(e) => {
                self.mode = None;
                return Err(e);
            }
        };

        let plan = &self.plan;
        let result = async {
            // Capacity first: traffic must not be pointed at an empty group.
            clients.capacity.set_capacity(&plan.group_name, SERVING).await?;
            clients
                .origins
                .retarget(&plan.distribution_id, &plan.fallback_origin)
                .await?;
            records::upsert(
                clients.records.as_ref(),
                &plan.zone_ids,
                &plan.record(FailoverMode::Fallback),
                "failover",
            )
            .await
            .into_result()
        }
        .await;

        Ok(self.finish(FailoverMode::Fallback, result, now))
    }

    fn finish(
        &mut self,
        target: FailoverMode,
        result: Result<(), RemoteError>,
        now: Instant,
    ) -> Transition {
        metrics::record_transition(target, result.is_ok());

        match result {
            Ok(()) => {
                self.mode = Some(target);
                if target == FailoverMode::Normal {
                    let deadline = now + self.plan.shutdown_delay;
                    self.pending_shutdown = Some(deadline);
                    info!(
                        group_name = %self.plan.group_name,
                        delay_secs = self.plan.shutdown_delay.as_secs(),
                        "ISP fallback disabled, auto scaling group shutdown scheduled"
                    );
                } else {
                    info!("ISP fallback enabled");
                }
                Transition::Switched(target)
            }
            Err(error) => {
                error!(target = target.as_str(), error = %error, "Failover transition failed");
                self.mode = None;
                if target == FailoverMode::Normal {
                    self.pending_shutdown = None;
                }
                Transition::Failed { target, error }
            }
        }
    }

    async fn check_shutdown(
        &mut self,
        clients: &mut Option<CloudClients>,
        now: Instant,
    ) -> Result<ShutdownCheck, FailoverError> {
        let Some(deadline) = self.pending_shutdown else {
            return Ok(ShutdownCheck::Idle);
        };
        if now < deadline {
            return Ok(ShutdownCheck::Waiting {
                remaining: deadline - now,
            });
        }

        let clients = self.connect(clients).await?;
        let result = clients
            .capacity
            .set_capacity(&self.plan.group_name, SHUTDOWN)
            .await;
        metrics::record_shutdown(result.is_ok());

        match result {
            Ok(()) => {
                info!(group_name = %self.plan.group_name, "Auto scaling group shut down");
                self.pending_shutdown = None;
                Ok(ShutdownCheck::Completed)
            }
            Err(e) => {
                warn!(
                    group_name = %self.plan.group_name,
                    error = %e,
                    "Auto scaling group shutdown failed, retrying next tick"
                );
                Ok(ShutdownCheck::Failed(e))
            }
        }
    }

    /// Build clients at most once per tick.
    async fn connect(
        &self,
        clients: &mut Option<CloudClients>,
    ) -> Result<CloudClients, FailoverError> {
        if let Some(existing) = clients.as_ref() {
            return Ok(existing.clone());
        }
        let built = self.provider.connect().await.map_err(|e| {
            error!(error = %e, "Error on getting AWS config");
            FailoverError::Cloud(e)
        })?;
        *clients = Some(built.clone());
        Ok(built)
    }
}
