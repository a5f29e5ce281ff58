//! Collaborator seams: who owns a device, and where announcements go
//!
//! The presence core only consults these. Chat front-ends provide their
//! own implementations; the ones here back the daemon.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::DeviceConfig;
use crate::devices::HardwareAddress;

/// Owner of one or more registered devices
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity(String);

impl Identity {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Maps hardware addresses to their registered owners
pub trait IdentityRegistry: Send + Sync {
    fn owner_of(&self, address: &HardwareAddress) -> Option<Identity>;
}

#[derive(Debug, Error)]
#[error("Notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Text message sink
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), NotifyError>;
}

/// Registry built from the `[[devices]]` table of the config file
#[derive(Debug, Default)]
pub struct StaticRegistry {
    owners: HashMap<HardwareAddress, Identity>,
}

impl StaticRegistry {
    pub fn from_devices(devices: &[DeviceConfig]) -> Self {
        let owners = devices
            .iter()
            .map(|d| {
                (
                    HardwareAddress::new(d.mac.as_str()).normalized(),
                    Identity::new(d.owner.as_str()),
                )
            })
            .collect();
        Self { owners }
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

impl IdentityRegistry for StaticRegistry {
    fn owner_of(&self, address: &HardwareAddress) -> Option<Identity> {
        self.owners.get(&address.normalized()).cloned()
    }
}

/// Distinct owners of the given addresses; unregistered addresses are skipped
pub fn resolve_owners(addresses: &HashSet<HardwareAddress>, registry: &dyn IdentityRegistry) -> BTreeSet<Identity> {
    addresses.iter().filter_map(|a| registry.owner_of(a)).collect()
}

/// Writes notifications to the log
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        tracing::info!("Notification: {}", text);
        Ok(())
    }
}
