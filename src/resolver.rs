//! Forward lookup of the currently published record.

use async_trait::async_trait;
use hickory_resolver::TokioResolver;
use std::net::IpAddr;
use tracing::debug;

use crate::error::ResolutionError;

/// Resolves a name to the address the world currently sees.
#[async_trait]
pub trait NameResolver: Send + Sync {
    /// Return the first address published for `name`.
    async fn resolve(&self, name: &str) -> Result<IpAddr, ResolutionError>;
}

/// Resolver using the host's system configuration (`/etc/resolv.conf`).
pub struct SystemResolver {
    resolver: TokioResolver,
}

impl SystemResolver {
    /// Build from system configuration with caching disabled, so every
    /// lookup reflects what upstream servers publish right now.
    pub fn from_system_conf() -> Result<Self, ResolutionError> {
        let mut builder = TokioResolver::builder_tokio()
            .map_err(|e| ResolutionError::Resolver(e.to_string()))?;
        builder.options_mut().cache_size = 0;

        Ok(Self {
            resolver: builder.build(),
        })
    }
}

#[async_trait]
impl NameResolver for SystemResolver {
    async fn resolve(&self, name: &str) -> Result<IpAddr, ResolutionError> {
        debug!(name, "resolving");

        let lookup = self
            .resolver
            .lookup_ip(name)
            .await
            .map_err(|e| ResolutionError::Lookup {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        first_address(name, lookup.iter())
    }
}

/// Pick the first address, guarding against empty answers.
fn first_address(
    name: &str,
    mut addresses: impl Iterator<Item = IpAddr>,
) -> Result<IpAddr, ResolutionError> {
    addresses.next().ok_or_else(|| ResolutionError::NoAddresses {
        name: name.to_string(),
    })
}
