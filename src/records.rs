//! DNS record upserts across hosted zones.
//!
//! Every zone is attempted independently and reported on its own; one zone
//! failing never stops the remaining zones from being updated.

use async_trait::async_trait;
use aws_sdk_route53::error::DisplayErrorContext;
use aws_sdk_route53::types::{
    Change, ChangeAction, ChangeBatch, ResourceRecord, ResourceRecordSet, RrType,
};
use aws_sdk_route53::Client;
use tracing::{error, info};

use crate::error::RemoteError;
use crate::metrics::{self, Timer};

/// A single-value record to upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordChange {
    /// Fully qualified record name.
    pub name: String,
    /// The one resource value.
    pub value: String,
    /// TTL in seconds.
    pub ttl: i64,
    /// Opaque record type ("A", "CNAME", ...).
    pub record_type: String,
}

/// Applies an upsert to one hosted zone.
#[async_trait]
pub trait RecordUpdater: Send + Sync {
    /// Create or replace `change` in `zone_id`.
    async fn upsert_zone(&self, zone_id: &str, change: &RecordChange) -> Result<(), RemoteError>;
}

/// Outcome of the upsert in one zone.
#[derive(Debug, Clone)]
pub struct ZoneOutcome {
    /// Hosted zone ID.
    pub zone_id: String,
    /// Result for this zone.
    pub result: Result<(), RemoteError>,
}

/// Per-zone results of one upsert pass.
#[derive(Debug, Clone)]
pub struct UpsertReport {
    /// Record that was upserted.
    pub change: RecordChange,
    /// One entry per zone, in configuration order.
    pub zones: Vec<ZoneOutcome>,
}

impl UpsertReport {
    /// Number of zones that rejected the change.
    pub fn failed(&self) -> usize {
        self.zones.iter().filter(|z| z.result.is_err()).count()
    }

    /// True when every zone accepted the change.
    pub fn is_complete(&self) -> bool {
        self.failed() == 0
    }

    /// Collapse into a single result.
    pub fn into_result(self) -> Result<(), RemoteError> {
        let failed = self.failed();
        if failed == 0 {
            return Ok(());
        }
        let total = self.zones.len();
        // A single-zone failure keeps its own error.
        if total == 1 {
            if let Some(ZoneOutcome { result: Err(e), .. }) = self.zones.into_iter().next() {
                return Err(e);
            }
        }
        Err(RemoteError::PartialUpsert {
            record: self.change.name,
            failed,
            total,
        })
    }
}

/// Upsert `change` into every zone in `zone_ids`.
pub async fn upsert(
    updater: &dyn RecordUpdater,
    zone_ids: &[String],
    change: &RecordChange,
    purpose: &'static str,
) -> UpsertReport {
    let mut zones = Vec::with_capacity(zone_ids.len());

    for zone_id in zone_ids {
        info!(
            zone_id = %zone_id,
            name = %change.name,
            value = %change.value,
            record_type = %change.record_type,
            "Upserting DNS record"
        );

        let result = updater.upsert_zone(zone_id, change).await;
        match &result {
            Ok(()) => info!(zone_id = %zone_id, name = %change.name, value = %change.value, "DNS record updated"),
            Err(e) => error!(zone_id = %zone_id, name = %change.name, error = %e, "DNS record update failed"),
        }
        metrics::record_zone_upsert(purpose, result.is_ok());

        zones.push(ZoneOutcome {
            zone_id: zone_id.clone(),
            result,
        });
    }

    UpsertReport {
        change: change.clone(),
        zones,
    }
}

/// Build the Route 53 change batch for an upsert.
pub fn upsert_batch(change: &RecordChange) -> Result<ChangeBatch, RemoteError> {
    let invalid = |e: aws_sdk_route53::error::BuildError| RemoteError::InvalidRequest {
        service: "route53",
        message: e.to_string(),
    };

    let record = ResourceRecord::builder()
        .value(&change.value)
        .build()
        .map_err(invalid)?;

    let record_set = ResourceRecordSet::builder()
        .name(&change.name)
        .r#type(RrType::from(change.record_type.as_str()))
        .ttl(change.ttl)
        .resource_records(record)
        .build()
        .map_err(invalid)?;

    let change = Change::builder()
        .action(ChangeAction::Upsert)
        .resource_record_set(record_set)
        .build()
        .map_err(invalid)?;

    ChangeBatch::builder().changes(change).build().map_err(invalid)
}

/// Route 53 backed updater.
pub struct Route53Records {
    client: Client,
}

impl Route53Records {
    /// Wrap a configured Route 53 client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RecordUpdater for Route53Records {
    async fn upsert_zone(&self, zone_id: &str, change: &RecordChange) -> Result<(), RemoteError> {
        let batch = upsert_batch(change)?;
        let timer = Timer::start();

        let result = self
            .client
            .change_resource_record_sets()
            .hosted_zone_id(zone_id)
            .change_batch(batch)
            .send()
            .await;

        metrics::record_remote_call("route53", "ChangeResourceRecordSets", timer.elapsed());

        result.map(|_| ()).map_err(|e| RemoteError::Service {
            service: "route53",
            operation: "ChangeResourceRecordSets",
            message: DisplayErrorContext(&e).to_string(),
        })
    }
}
