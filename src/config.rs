//! Configuration types for edge-failover.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::FailoverError;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Public IP to DNS record synchronization.
    pub dns_updater: DnsUpdaterConfig,

    /// Primary link monitoring and failover.
    pub isp_fallback: IspFallbackConfig,

    /// AWS region and static credentials.
    pub aws: AwsConfig,

    /// Telemetry configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// DNS updater loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsUpdaterConfig {
    /// Seconds between checks.
    #[serde(default = "default_dns_interval")]
    pub check_interval_secs: u64,

    /// Where the public IP is fetched from.
    pub public_ip: PublicIpConfig,

    /// Record kept in sync with the public IP.
    pub record: RecordConfig,
}

/// Public IP fetcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicIpConfig {
    /// URL answering with the caller's address (e.g. "https://checkip.amazonaws.com").
    pub url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

/// A record upserted into one or more hosted zones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordConfig {
    /// Route 53 hosted zone IDs; every zone receives the same change.
    pub hosted_zone_ids: Vec<String>,

    /// Fully qualified record name.
    pub name: String,

    /// TTL in seconds.
    #[serde(default = "default_record_ttl")]
    pub ttl: i64,

    /// Record type, passed through to Route 53 as-is.
    #[serde(default = "default_address_type")]
    pub record_type: String,
}

/// ISP fallback loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IspFallbackConfig {
    /// Seconds between reachability checks.
    #[serde(default = "default_fallback_interval")]
    pub check_interval_secs: u64,

    /// Reachability probe through the primary link.
    pub probe: ProbeConfig,

    /// Record switched between the normal and fallback values.
    pub record: FallbackRecordConfig,

    /// CloudFront distribution whose default origin is switched.
    pub cloudfront: CloudFrontConfig,

    /// Auto Scaling group backing the fallback path.
    pub auto_scaling_group: AutoScalingGroupConfig,
}

/// Reachability probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// URL reached through the primary link.
    pub url: String,

    /// `Host` header override sent with the probe.
    #[serde(default)]
    pub host: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

/// Failover record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackRecordConfig {
    /// Route 53 hosted zone IDs.
    pub hosted_zone_ids: Vec<String>,

    /// Fully qualified record name.
    pub name: String,

    /// TTL in seconds.
    #[serde(default = "default_record_ttl")]
    pub ttl: i64,

    /// Record type, passed through to Route 53 as-is.
    #[serde(default = "default_alias_type")]
    pub record_type: String,

    /// Value published while the primary link is up.
    pub normal: String,

    /// Value published while failed over.
    pub fallback: String,
}

/// CloudFront origin switching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudFrontConfig {
    /// Distribution ID.
    pub distribution_id: String,

    /// Origin ID used while the primary link is up.
    pub normal_origin: String,

    /// Origin ID used while failed over.
    pub fallback_origin: String,
}

/// Auto Scaling group controlled during failover.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoScalingGroupConfig {
    /// Group name.
    pub name: String,

    /// Seconds the group stays up after leaving fallback.
    #[serde(default = "default_shutdown_delay")]
    pub shutdown_delay_secs: u64,
}

/// AWS access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    /// Region (e.g. "us-east-1").
    pub region: String,

    /// Static access key ID.
    pub access_key: String,

    /// Static secret access key.
    pub secret_key: String,

    /// Deadline for a single AWS operation, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level filter (e.g., "info", "debug", "edge_failover=debug,warn").
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Prometheus metrics exporter address.
    #[serde(default)]
    pub prometheus_addr: Option<SocketAddr>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            prometheus_addr: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_dns_interval() -> u64 {
    60
}

fn default_fallback_interval() -> u64 {
    30
}

fn default_http_timeout() -> u64 {
    5
}

fn default_record_ttl() -> i64 {
    300
}

fn default_address_type() -> String {
    "A".to_string()
}

fn default_alias_type() -> String {
    "CNAME".to_string()
}

fn default_shutdown_delay() -> u64 {
    900
}

fn default_request_timeout() -> u64 {
    30
}

impl DnsUpdaterConfig {
    /// Interval between DNS checks.
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }
}

impl IspFallbackConfig {
    /// Interval between reachability checks.
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }
}

impl AutoScalingGroupConfig {
    /// Grace period before the group is scaled to zero.
    pub fn shutdown_delay(&self) -> Duration {
        Duration::from_secs(self.shutdown_delay_secs)
    }
}

impl AwsConfig {
    /// Per-operation deadline.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Config {
    /// Reject configurations the loops cannot act on.
    pub fn validate(&self) -> Result<(), FailoverError> {
        let dns = &self.dns_updater;
        let fallback = &self.isp_fallback;

        require(dns.check_interval_secs > 0, "dns_updater.check_interval_secs must be positive")?;
        require(dns.public_ip.timeout_secs > 0, "dns_updater.public_ip.timeout_secs must be positive")?;
        require(!dns.public_ip.url.is_empty(), "dns_updater.public_ip.url is empty")?;
        require(
            !dns.record.hosted_zone_ids.is_empty(),
            "dns_updater.record.hosted_zone_ids is empty",
        )?;
        require(!dns.record.name.is_empty(), "dns_updater.record.name is empty")?;

        require(
            fallback.check_interval_secs > 0,
            "isp_fallback.check_interval_secs must be positive",
        )?;
        require(fallback.probe.timeout_secs > 0, "isp_fallback.probe.timeout_secs must be positive")?;
        require(!fallback.probe.url.is_empty(), "isp_fallback.probe.url is empty")?;
        require(
            !fallback.record.hosted_zone_ids.is_empty(),
            "isp_fallback.record.hosted_zone_ids is empty",
        )?;
        require(!fallback.record.name.is_empty(), "isp_fallback.record.name is empty")?;
        require(
            !fallback.record.normal.is_empty() && !fallback.record.fallback.is_empty(),
            "isp_fallback.record needs both normal and fallback values",
        )?;
        require(
            !fallback.cloudfront.distribution_id.is_empty(),
            "isp_fallback.cloudfront.distribution_id is empty",
        )?;
        require(
            !fallback.cloudfront.normal_origin.is_empty()
                && !fallback.cloudfront.fallback_origin.is_empty(),
            "isp_fallback.cloudfront needs both normal_origin and fallback_origin",
        )?;
        require(
            !fallback.auto_scaling_group.name.is_empty(),
            "isp_fallback.auto_scaling_group.name is empty",
        )?;

        require(self.aws.request_timeout_secs > 0, "aws.request_timeout_secs must be positive")?;

        Ok(())
    }
}

fn require(condition: bool, message: &str) -> Result<(), FailoverError> {
    if condition {
        Ok(())
    } else {
        Err(FailoverError::Config(message.to_string()))
    }
}
