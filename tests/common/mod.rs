//! Shared test infrastructure: in-memory cloud services, probes and resolver.

#![allow(dead_code)]

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use edge_failover::capacity::CapacityController;
use edge_failover::cloud::{CloudClients, CloudProvider};
use edge_failover::config::RecordConfig;
use edge_failover::error::{CloudError, ProbeError, RemoteError, ResolutionError};
use edge_failover::failover::FailoverPlan;
use edge_failover::origin::OriginSwitcher;
use edge_failover::probe::{PublicIpSource, ReachabilityProbe};
use edge_failover::records::{RecordChange, RecordUpdater};
use edge_failover::resolver::NameResolver;

// --- Constants ---

pub const ZONE_A: &str = "Z0000000000A";
pub const ZONE_B: &str = "Z0000000000B";
pub const DISTRIBUTION: &str = "E2EXAMPLE";
pub const NORMAL_ORIGIN: &str = "home-origin";
pub const FALLBACK_ORIGIN: &str = "ec2-origin";
pub const GROUP: &str = "fallback-asg";
pub const SHUTDOWN_DELAY: Duration = Duration::from_secs(900);

// --- Call log ---

/// One remote mutation, as seen by the in-memory services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Upsert { zone_id: String, value: String },
    Retarget { origin_id: String },
    Capacity { desired: i32 },
}

/// Which mutation to fail.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Fault {
    Zone(String),
    Retarget(String),
    Capacity(i32),
}

/// Ordered log of calls shared by every in-memory service.
#[derive(Clone, Default)]
pub struct CloudLog {
    calls: Arc<Mutex<Vec<Call>>>,
    faults: Arc<Mutex<HashSet<Fault>>>,
}

impl CloudLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    pub fn fail(&self, fault: Fault) {
        self.faults.lock().insert(fault);
    }

    pub fn heal(&self, fault: &Fault) {
        self.faults.lock().remove(fault);
    }

    fn record(&self, call: Call, fault: Fault, service: &'static str) -> Result<(), RemoteError> {
        self.calls.lock().push(call);
        if self.faults.lock().contains(&fault) {
            return Err(RemoteError::Service {
                service,
                operation: "test",
                message: format!("injected failure: {fault:?}"),
            });
        }
        Ok(())
    }

    /// Capacity calls only, in order.
    pub fn capacity_calls(&self) -> Vec<i32> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Capacity { desired } => Some(desired),
                _ => None,
            })
            .collect()
    }
}

pub fn upsert(zone_id: &str, value: &str) -> Call {
    Call::Upsert {
        zone_id: zone_id.to_string(),
        value: value.to_string(),
    }
}

pub fn retarget(origin_id: &str) -> Call {
    Call::Retarget {
        origin_id: origin_id.to_string(),
    }
}

pub fn capacity(desired: i32) -> Call {
    Call::Capacity { desired }
}

// --- In-memory services ---

struct MemoryRecords(CloudLog);

#[async_trait]
impl RecordUpdater for MemoryRecords {
    async fn upsert_zone(&self, zone_id: &str, change: &RecordChange) -> Result<(), RemoteError> {
        self.0
            .record(upsert(zone_id, &change.value), Fault::Zone(zone_id.to_string()), "route53")
    }
}

struct MemoryOrigins(CloudLog);

#[async_trait]
impl OriginSwitcher for MemoryOrigins {
    async fn retarget(&self, _distribution_id: &str, origin_id: &str) -> Result<(), RemoteError> {
        self.0.record(
            retarget(origin_id),
            Fault::Retarget(origin_id.to_string()),
            "cloudfront",
        )
    }
}

struct MemoryCapacity(CloudLog);

#[async_trait]
impl CapacityController for MemoryCapacity {
    async fn set_capacity(&self, _group_name: &str, desired: i32) -> Result<(), RemoteError> {
        self.0
            .record(capacity(desired), Fault::Capacity(desired), "autoscaling")
    }
}

/// Provider handing out in-memory services that share one [`CloudLog`].
pub struct MemoryProvider {
    log: CloudLog,
    fail_connect: Mutex<bool>,
    connects: AtomicUsize,
}

impl MemoryProvider {
    pub fn new(log: CloudLog) -> Arc<Self> {
        Arc::new(Self {
            log,
            fail_connect: Mutex::new(false),
            connects: AtomicUsize::new(0),
        })
    }

    pub fn set_fail_connect(&self, fail: bool) {
        *self.fail_connect.lock() = fail;
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CloudProvider for MemoryProvider {
    async fn connect(&self) -> Result<CloudClients, CloudError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if *self.fail_connect.lock() {
            return Err(CloudError::MissingCredential("access_key"));
        }
        Ok(CloudClients {
            records: Arc::new(MemoryRecords(self.log.clone())),
            origins: Arc::new(MemoryOrigins(self.log.clone())),
            capacity: Arc::new(MemoryCapacity(self.log.clone())),
        })
    }
}

// --- Probes and resolver ---

/// Public IP source returning a scripted address or a transport failure.
pub struct StaticIp(pub Mutex<Option<IpAddr>>);

impl StaticIp {
    pub fn ok(ip: &str) -> Arc<Self> {
        Arc::new(Self(Mutex::new(Some(ip.parse().unwrap()))))
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self(Mutex::new(None)))
    }
}

#[async_trait]
impl PublicIpSource for StaticIp {
    async fn public_ip(&self) -> Result<IpAddr, ProbeError> {
        (*self.0.lock()).ok_or_else(|| ProbeError::Timeout {
            url: "https://checkip.example.com".to_string(),
        })
    }
}

/// Resolver returning a scripted answer.
pub struct StaticResolver(pub Mutex<Option<IpAddr>>);

impl StaticResolver {
    pub fn ok(ip: &str) -> Arc<Self> {
        Arc::new(Self(Mutex::new(Some(ip.parse().unwrap()))))
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self(Mutex::new(None)))
    }
}

#[async_trait]
impl NameResolver for StaticResolver {
    async fn resolve(&self, name: &str) -> Result<IpAddr, ResolutionError> {
        (*self.0.lock()).ok_or_else(|| ResolutionError::NoAddresses {
            name: name.to_string(),
        })
    }
}

/// Reachability probe whose outcome can be flipped between ticks.
pub struct ScriptedProbe {
    closed: Mutex<bool>,
    http_status: Mutex<Option<u16>>,
}

impl ScriptedProbe {
    pub fn open() -> Arc<Self> {
        Arc::new(Self {
            closed: Mutex::new(false),
            http_status: Mutex::new(None),
        })
    }

    pub fn set_closed(&self, closed: bool) {
        *self.closed.lock() = closed;
    }

    /// Answer with an HTTP error status instead of success.
    pub fn set_http_error(&self, status: Option<u16>) {
        *self.http_status.lock() = status;
    }
}

#[async_trait]
impl ReachabilityProbe for ScriptedProbe {
    async fn probe(&self) -> Result<(), ProbeError> {
        let url = "http://198.51.100.7/".to_string();
        if *self.closed.lock() {
            return Err(ProbeError::Timeout { url });
        }
        match *self.http_status.lock() {
            Some(status) => Err(ProbeError::Status {
                url,
                status,
                body: String::new(),
            }),
            None => Ok(()),
        }
    }
}

// --- Builders ---

pub fn test_plan() -> FailoverPlan {
    FailoverPlan {
        zone_ids: vec![ZONE_A.to_string(), ZONE_B.to_string()],
        record_name: "www.example.com".to_string(),
        record_type: "CNAME".to_string(),
        ttl: 300,
        normal_value: "home.example.com".to_string(),
        fallback_value: "fallback.example.com".to_string(),
        distribution_id: DISTRIBUTION.to_string(),
        normal_origin: NORMAL_ORIGIN.to_string(),
        fallback_origin: FALLBACK_ORIGIN.to_string(),
        group_name: GROUP.to_string(),
        shutdown_delay: SHUTDOWN_DELAY,
    }
}

pub fn test_record() -> RecordConfig {
    RecordConfig {
        hosted_zone_ids: vec![ZONE_A.to_string(), ZONE_B.to_string()],
        name: "home.example.com".to_string(),
        ttl: 300,
        record_type: "A".to_string(),
    }
}

/// Calls of the full enter-fallback sequence against [`test_plan`].
pub fn enter_sequence() -> Vec<Call> {
    vec![
        capacity(1),
        retarget(FALLBACK_ORIGIN),
        upsert(ZONE_A, "fallback.example.com"),
        upsert(ZONE_B, "fallback.example.com"),
    ]
}

/// Calls of the full exit-fallback sequence against [`test_plan`].
pub fn exit_sequence() -> Vec<Call> {
    vec![
        retarget(NORMAL_ORIGIN),
        capacity(1),
        upsert(ZONE_A, "home.example.com"),
        upsert(ZONE_B, "home.example.com"),
    ]
}
