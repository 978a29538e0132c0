//! Service wiring and lifecycle management.

use reqwest::Client;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::cloud::{AwsProvider, CloudProvider};
use crate::config::Config;
use crate::controller;
use crate::error::FailoverError;
use crate::failover::{FailoverMachine, FailoverPlan};
use crate::probe::{PortProbe, PublicIpFetcher, PublicIpSource, ReachabilityProbe};
use crate::reconcile::{run_periodic, DnsReconciler, ReachabilityReconciler};
use crate::resolver::{NameResolver, SystemResolver};

/// Both reconciliation loops and the failover controller.
pub struct FailoverService {
    dns: DnsReconciler,
    probe: Arc<dyn ReachabilityProbe>,
    machine: FailoverMachine,
    config: Config,
}

impl FailoverService {
    /// Build production clients from `config`.
    pub fn new(config: Config) -> Result<Self, FailoverError> {
        config.validate()?;

        let client = Client::builder()
            .user_agent(concat!("edge-failover/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FailoverError::Config(format!("could not build HTTP client: {e}")))?;

        let source: Arc<dyn PublicIpSource> =
            Arc::new(PublicIpFetcher::new(client.clone(), &config.dns_updater.public_ip));
        let probe: Arc<dyn ReachabilityProbe> =
            Arc::new(PortProbe::new(client, &config.isp_fallback.probe));
        let resolver: Arc<dyn NameResolver> = Arc::new(SystemResolver::from_system_conf()?);
        let provider: Arc<dyn CloudProvider> = Arc::new(AwsProvider::new(config.aws.clone()));

        Ok(Self::with_components(config, source, resolver, probe, provider))
    }

    /// Build from explicit components.
    pub fn with_components(
        config: Config,
        source: Arc<dyn PublicIpSource>,
        resolver: Arc<dyn NameResolver>,
        probe: Arc<dyn ReachabilityProbe>,
        provider: Arc<dyn CloudProvider>,
    ) -> Self {
        let dns = DnsReconciler::new(
            source,
            resolver,
            provider.clone(),
            config.dns_updater.record.clone(),
        );
        let machine = FailoverMachine::new(FailoverPlan::from(&config.isp_fallback), provider);

        Self {
            dns,
            probe,
            machine,
            config,
        }
    }

    /// Run both loops until `cancel` fires.
    ///
    /// The first tick of each loop runs immediately. Ticks in flight when
    /// `cancel` fires are allowed to finish.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), FailoverError> {
        let Self {
            dns,
            probe,
            machine,
            config,
        } = self;

        info!(
            dns_record = %config.dns_updater.record.name,
            dns_interval_secs = config.dns_updater.check_interval_secs,
            fallback_record = %config.isp_fallback.record.name,
            fallback_interval_secs = config.isp_fallback.check_interval_secs,
            distribution_id = %config.isp_fallback.cloudfront.distribution_id,
            group_name = %config.isp_fallback.auto_scaling_group.name,
            "Starting edge-failover"
        );

        let (handle, controller_task) = controller::spawn(machine, cancel.clone());

        let dns = Arc::new(dns.with_failover(handle.clone()));
        let reachability = Arc::new(ReachabilityReconciler::new(probe, handle));

        let dns_task = tokio::spawn(run_periodic(
            dns,
            config.dns_updater.check_interval(),
            cancel.clone(),
        ));
        let reachability_task = tokio::spawn(run_periodic(
            reachability,
            config.isp_fallback.check_interval(),
            cancel.clone(),
        ));

        cancel.cancelled().await;
        info!("Shutdown requested, waiting for loops to stop");

        for (name, task) in [
            ("dns", dns_task),
            ("reachability", reachability_task),
            ("controller", controller_task),
        ] {
            if let Err(e) = task.await {
                error!(task = name, error = %e, "Task ended abnormally");
            }
        }

        info!("edge-failover stopped");
        Ok(())
    }
}
