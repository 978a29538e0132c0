//! The two reconciliation loops and the periodic runner driving them.

use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cloud::CloudProvider;
use crate::config::RecordConfig;
use crate::controller::FailoverHandle;
use crate::error::FailoverError;
use crate::failover::TickReport;
use crate::metrics::{self, DnsCheckResult};
use crate::probe::{is_closed, PublicIpSource, ReachabilityProbe};
use crate::records::{self, RecordChange, UpsertReport};
use crate::resolver::NameResolver;

/// One unit of periodic work.
#[async_trait]
pub trait Reconcile: Send + Sync + 'static {
    /// Loop name for logs and metrics.
    fn name(&self) -> &'static str;

    /// Run a single tick.
    async fn tick(&self) -> Result<(), FailoverError>;
}

/// Run `reconciler` every `period` until `cancel` fires.
///
/// Each tick runs in its own task and is awaited before the next one is
/// scheduled. Errors and panics are logged; the loop always continues.
pub async fn run_periodic<R: Reconcile>(
    reconciler: Arc<R>,
    period: Duration,
    cancel: CancellationToken,
) {
    let name = reconciler.name();
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(loop_name = name, period_secs = period.as_secs(), "Starting reconciliation loop");

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                info!(loop_name = name, "Reconciliation loop shutting down");
                return;
            }

            _ = interval.tick() => {
                let reconciler = reconciler.clone();
                let outcome = tokio::spawn(async move { reconciler.tick().await }).await;

                match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        error!(loop_name = name, error = %e, "Reconciliation tick failed");
                        metrics::record_tick_failure(name, false);
                    }
                    Err(e) => {
                        error!(loop_name = name, error = %e, "Reconciliation tick panicked");
                        metrics::record_tick_failure(name, true);
                    }
                }
            }
        }
    }
}

/// What the DNS loop decided on one tick.
#[derive(Debug, Clone)]
pub enum DnsCheck {
    /// The published record already matches the public IP.
    UpToDate {
        /// Observed public IP.
        ip: IpAddr,
    },
    /// An upsert was issued to every zone.
    Updated {
        /// Per-zone results.
        report: UpsertReport,
        /// True when forced by a resolution failure rather than a mismatch.
        forced: bool,
    },
    /// Without a public IP there is nothing to publish.
    Skipped,
}

/// Keeps a record pointed at the current public IP.
pub struct DnsReconciler {
    source: Arc<dyn PublicIpSource>,
    resolver: Arc<dyn NameResolver>,
    provider: Arc<dyn CloudProvider>,
    record: RecordConfig,
    failover: Option<FailoverHandle>,
}

impl DnsReconciler {
    /// Create a reconciler for `record`.
    pub fn new(
        source: Arc<dyn PublicIpSource>,
        resolver: Arc<dyn NameResolver>,
        provider: Arc<dyn CloudProvider>,
        record: RecordConfig,
    ) -> Self {
        Self {
            source,
            resolver,
            provider,
            record,
            failover: None,
        }
    }

    /// Report the failover mode alongside each check.
    pub fn with_failover(mut self, handle: FailoverHandle) -> Self {
        self.failover = Some(handle);
        self
    }

    /// Compare public and published addresses, upserting on mismatch.
    pub async fn reconcile(&self) -> Result<DnsCheck, FailoverError> {
        let mode = self.failover.as_ref().and_then(|h| h.status().mode);
        info!(name = %self.record.name, failover_mode = ?mode, "Checking DNS...");

        let public_ip = self.source.public_ip().await;
        let resolved = self.resolver.resolve(&self.record.name).await;

        let (public_ip, forced) = match (public_ip, resolved) {
            (Err(e), _) => {
                error!(error = %e, "Error on fetching public IP, skipping DNS update");
                metrics::record_dns_check(DnsCheckResult::Skipped);
                return Ok(DnsCheck::Skipped);
            }
            (Ok(ip), Err(e)) => {
                warn!(name = %self.record.name, error = %e, "Error on resolving DNS, forcing update");
                (ip, true)
            }
            (Ok(ip), Ok(current)) if ip == current => {
                info!(name = %self.record.name, ip = %ip, "DNS is up to date with public IP");
                metrics::record_dns_check(DnsCheckResult::UpToDate);
                return Ok(DnsCheck::UpToDate { ip });
            }
            (Ok(ip), Ok(current)) => {
                info!(from = %current, to = %ip, "Public IP changed");
                (ip, false)
            }
        };

        metrics::record_dns_check(if forced {
            DnsCheckResult::Forced
        } else {
            DnsCheckResult::Changed
        });

        let clients = self.provider.connect().await?;
        let change = RecordChange {
            name: self.record.name.clone(),
            value: public_ip.to_string(),
            ttl: self.record.ttl,
            record_type: self.record.record_type.clone(),
        };
        let report = records::upsert(
            clients.records.as_ref(),
            &self.record.hosted_zone_ids,
            &change,
            "public_ip",
        )
        .await;

        if !report.is_complete() {
            warn!(
                name = %change.name,
                failed = report.failed(),
                total = report.zones.len(),
                "DNS update incomplete, retrying next tick"
            );
        }

        Ok(DnsCheck::Updated { report, forced })
    }
}

#[async_trait]
impl Reconcile for DnsReconciler {
    fn name(&self) -> &'static str {
        "dns"
    }

    async fn tick(&self) -> Result<(), FailoverError> {
        self.reconcile().await.map(|_| ())
    }
}

/// Feeds primary link reachability into the failover controller.
pub struct ReachabilityReconciler {
    probe: Arc<dyn ReachabilityProbe>,
    failover: FailoverHandle,
}

impl ReachabilityReconciler {
    /// Create a reconciler reporting to `failover`.
    pub fn new(probe: Arc<dyn ReachabilityProbe>, failover: FailoverHandle) -> Self {
        Self { probe, failover }
    }

    /// Probe once and drive the state machine with the result.
    pub async fn reconcile(&self) -> Result<TickReport, FailoverError> {
        info!("Checking ISP ports...");

        let result = self.probe.probe().await;
        if let Err(e) = &result {
            debug!(status = e.status(), error = %e, "Reachability probe error");
        }

        self.failover.observe(is_closed(&result)).await
    }
}

#[async_trait]
impl Reconcile for ReachabilityReconciler {
    fn name(&self) -> &'static str {
        "reachability"
    }

    async fn tick(&self) -> Result<(), FailoverError> {
        self.reconcile().await.map(|_| ())
    }
}
