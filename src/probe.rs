//! Public IP and reachability probes.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HOST};
use reqwest::Client;
use std::net::IpAddr;
use std::time::Duration;
use tracing::debug;

use crate::config::{ProbeConfig, PublicIpConfig};
use crate::decode::{decode_address, ContentType};
use crate::error::ProbeError;
use crate::metrics::{self, ProbeKind, Timer};

/// Source of the host's current public address.
#[async_trait]
pub trait PublicIpSource: Send + Sync {
    /// Fetch the public address once.
    async fn public_ip(&self) -> Result<IpAddr, ProbeError>;
}

/// Probe through the primary link.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    /// Issue one probe request. Any HTTP response counts as success.
    async fn probe(&self) -> Result<(), ProbeError>;
}

/// True when a probe result means the primary path is down.
///
/// Only transport-level failures count. An HTTP error status still proves
/// the path carries traffic.
pub fn is_closed(result: &Result<(), ProbeError>) -> bool {
    matches!(result, Err(e) if e.is_transport())
}

/// Completed HTTP exchange with a 2xx status.
struct HttpResponse {
    status: u16,
    content_type: ContentType,
    body: String,
}

/// GET `url` with the given headers, failing on transport errors and non-2xx.
async fn get(
    client: &Client,
    url: &str,
    timeout: Duration,
    headers: &[(reqwest::header::HeaderName, &str)],
) -> Result<HttpResponse, ProbeError> {
    let mut request = client.get(url).timeout(timeout);
    for (name, value) in headers {
        request = request.header(name.clone(), *value);
    }

    debug!(method = "GET", url, headers = ?headers, "---> HTTP request");
    let timer = Timer::start();

    let response = request.send().await.map_err(|e| transport_error(url, e))?;
    let status = response.status();
    let content_type = ContentType::from_header(
        response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
    );

    // The status is known from here on, so body failures must keep it.
    let bytes = response.bytes().await.map_err(|e| ProbeError::Body {
        url: url.to_string(),
        status: status.as_u16(),
        source: e,
    })?;
    let body = String::from_utf8_lossy(&bytes).into_owned();

    debug!(
        url,
        status = status.as_u16(),
        elapsed_ms = timer.elapsed().as_millis() as u64,
        body_len = body.len(),
        "<--- HTTP response"
    );

    if !status.is_success() {
        return Err(ProbeError::Status {
            url: url.to_string(),
            status: status.as_u16(),
            body,
        });
    }

    Ok(HttpResponse {
        status: status.as_u16(),
        content_type,
        body,
    })
}

fn transport_error(url: &str, err: reqwest::Error) -> ProbeError {
    if err.is_timeout() {
        ProbeError::Timeout {
            url: url.to_string(),
        }
    } else {
        ProbeError::Network {
            url: url.to_string(),
            source: err,
        }
    }
}

/// Fetches the public IP from an HTTP echo service.
pub struct PublicIpFetcher {
    client: Client,
    url: String,
    timeout: Duration,
}

impl PublicIpFetcher {
    /// Create a fetcher for the configured service.
    pub fn new(client: Client, config: &PublicIpConfig) -> Self {
        Self {
            client,
            url: config.url.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

#[async_trait]
impl PublicIpSource for PublicIpFetcher {
    async fn public_ip(&self) -> Result<IpAddr, ProbeError> {
        let result = async {
            let response = get(&self.client, &self.url, self.timeout, &[(ACCEPT, "text/plain")]).await?;

            decode_address(response.content_type, &response.body).map_err(|reason| {
                ProbeError::Decode {
                    url: self.url.clone(),
                    status: response.status,
                    content_type: response.content_type.as_str(),
                    reason,
                }
            })
        }
        .await;

        metrics::record_probe(ProbeKind::PublicIp, result.as_ref().err());
        result
    }
}

/// Probes an endpoint reachable only through the primary link.
pub struct PortProbe {
    client: Client,
    url: String,
    host: Option<String>,
    timeout: Duration,
}

impl PortProbe {
    /// Create a probe for the configured endpoint.
    pub fn new(client: Client, config: &ProbeConfig) -> Self {
        Self {
            client,
            url: config.url.clone(),
            host: config.host.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

#[async_trait]
impl ReachabilityProbe for PortProbe {
    async fn probe(&self) -> Result<(), ProbeError> {
        let headers: Vec<_> = self.host.as_deref().map(|h| (HOST, h)).into_iter().collect();
        let result = get(&self.client, &self.url, self.timeout, &headers)
            .await
            .map(|_| ());

        metrics::record_probe(ProbeKind::Reachability, result.as_ref().err());
        result
    }
}
