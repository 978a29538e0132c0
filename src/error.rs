//! Error types for edge-failover.

use thiserror::Error;

/// Errors that can occur while reconciling DNS or driving failover.
#[derive(Debug, Error)]
pub enum FailoverError {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Public IP fetch or reachability probe failed
    #[error("Probe error: {0}")]
    Probe(#[from] ProbeError),

    /// Forward lookup of the published record failed
    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    /// Cloud clients could not be built
    #[error("Cloud client error: {0}")]
    Cloud(#[from] CloudError),

    /// A remote mutation (DNS, CDN, capacity) failed
    #[error("Remote call failed: {0}")]
    Remote(#[from] RemoteError),

    /// The failover controller task is gone
    #[error("failover controller is not running")]
    ControllerStopped,

    /// A transition panicked; the mode was reset to unknown
    #[error("failover transition panicked")]
    TransitionPanicked,
}

/// Failure of a single HTTP probe.
///
/// [`ProbeError::status`] is `0` when no HTTP response was received at all.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The request did not complete within the configured timeout.
    #[error("request to {url} timed out")]
    Timeout {
        /// Probed URL.
        url: String,
    },

    /// Connection, TLS or protocol failure while sending the request or
    /// reading the response head; no status is known.
    #[error("request to {url} failed: {source}")]
    Network {
        /// Probed URL.
        url: String,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-2xx status.
    #[error("{url} responded with HTTP {status}")]
    Status {
        /// Probed URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// The status line arrived but reading the body failed.
    #[error("reading response body from {url} (HTTP {status}) failed: {source}")]
    Body {
        /// Probed URL.
        url: String,
        /// HTTP status code already received.
        status: u16,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The response body could not be decoded into an address.
    #[error("could not decode {content_type} response from {url}: {reason}")]
    Decode {
        /// Probed URL.
        url: String,
        /// HTTP status code of the undecodable response.
        status: u16,
        /// Content type the decoder selected.
        content_type: &'static str,
        /// Decoder message.
        reason: String,
    },
}

impl ProbeError {
    /// HTTP status carried by the error, `0` for transport-level failures.
    pub fn status(&self) -> u16 {
        match self {
            ProbeError::Timeout { .. } | ProbeError::Network { .. } => 0,
            ProbeError::Status { status, .. }
            | ProbeError::Body { status, .. }
            | ProbeError::Decode { status, .. } => *status,
        }
    }

    /// True when no response came back, which is the only "link down" signal.
    pub fn is_transport(&self) -> bool {
        self.status() == 0
    }
}

/// Forward lookup failures.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// The resolver could not be built from system configuration.
    #[error("could not create resolver: {0}")]
    Resolver(String),

    /// The lookup itself failed.
    #[error("lookup of {name} failed: {reason}")]
    Lookup {
        /// Queried name.
        name: String,
        /// Resolver message.
        reason: String,
    },

    /// The lookup succeeded but returned no addresses.
    #[error("lookup of {name} returned no addresses")]
    NoAddresses {
        /// Queried name.
        name: String,
    },
}

/// Failures building the cloud client bundle.
#[derive(Debug, Clone, Error)]
pub enum CloudError {
    /// Access or secret key is empty.
    #[error("missing AWS credential: {0}")]
    MissingCredential(&'static str),

    /// Region is empty.
    #[error("missing AWS region")]
    MissingRegion,
}

/// Failures of remote mutations against DNS, CDN and autoscaling APIs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The service rejected the call or it could not be sent.
    #[error("{service} {operation} failed: {message}")]
    Service {
        /// Remote service (route53, cloudfront, autoscaling).
        service: &'static str,
        /// Operation name.
        operation: &'static str,
        /// Error with full context.
        message: String,
    },

    /// The distribution changed between read and write; the caller retries.
    #[error("distribution {distribution_id} was modified concurrently (stale ETag)")]
    ConcurrencyConflict {
        /// Distribution being updated.
        distribution_id: String,
    },

    /// A response lacked a field needed to continue.
    #[error("{service} {operation} response is missing {field}")]
    MissingField {
        /// Remote service.
        service: &'static str,
        /// Operation name.
        operation: &'static str,
        /// Missing field.
        field: &'static str,
    },

    /// The request could not be built locally.
    #[error("could not build {service} request: {message}")]
    InvalidRequest {
        /// Remote service.
        service: &'static str,
        /// Builder message.
        message: String,
    },

    /// Some hosted zones rejected the upsert; every zone was attempted.
    #[error("DNS upsert of {record} failed in {failed} of {total} hosted zones")]
    PartialUpsert {
        /// Record name.
        record: String,
        /// Zones that failed.
        failed: usize,
        /// Zones attempted.
        total: usize,
    },
}
