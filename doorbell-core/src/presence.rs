//! "Who is online right now"
//!
//! [`PresenceQuery`] combines the authenticator and the device lister.
//! [`PresenceQuery::online_addresses`] never fails: router trouble is
//! logged and reported as nobody online, so periodic callers keep running.
//! Callers that need to tell a degraded answer from a confirmed empty one
//! use [`PresenceQuery::poll`].
//!
//! [`PresenceQuery::ring`] is the doorbell itself: it tells every registered
//! owner who is home that someone is at the door.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use thiserror::Error;

use crate::auth::{AuthError, Authenticator};
use crate::clock::Clock;
use crate::config::RouterConfig;
use crate::devices::{DeviceLister, HardwareAddress, ListError};
use crate::registry::{self, Identity, IdentityRegistry, Notifier, NotifyError};
use crate::transport::RouterTransport;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PresenceError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    List(#[from] ListError),
}

#[derive(Debug, Error)]
pub enum RingError {
    #[error(transparent)]
    Presence(#[from] PresenceError),

    #[error(transparent)]
    Notify(#[from] NotifyError),
}

/// Opening line of the doorbell message
pub const BELL_MESSAGE: &str = "Someone is asking to open the door!";

/// Result of ringing the doorbell
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RingOutcome {
    /// No registered owner has a device online
    NobodyHome,
    /// These owners were notified
    Notified(BTreeSet<Identity>),
}

/// Doorbell message addressed to `owners`, one mention per line
pub fn bell_message(owners: &BTreeSet<Identity>) -> String {
    let mut message = BELL_MESSAGE.to_string();
    for owner in owners {
        message.push_str("\n@");
        message.push_str(owner.as_str());
    }
    message
}

pub struct PresenceQuery {
    auth: Authenticator,
    lister: DeviceLister,
    reauth_on_rejection: bool,
}

impl PresenceQuery {
    pub fn new(auth: Authenticator, lister: DeviceLister) -> Self {
        Self {
            auth,
            lister,
            reauth_on_rejection: false,
        }
    }

    /// Build the authenticator and lister for one router
    pub fn from_config(config: &RouterConfig, transport: Arc<dyn RouterTransport>, clock: Arc<dyn Clock>) -> Self {
        let auth = Authenticator::new(config, Arc::clone(&transport), clock);
        let lister = DeviceLister::new(config, transport);
        Self::new(auth, lister).with_reauth_on_rejection(config.reauth_on_rejection)
    }

    /// When the router rejects the cached token, log in again and retry once
    pub fn with_reauth_on_rejection(mut self, enabled: bool) -> Self {
        self.reauth_on_rejection = enabled;
        self
    }

    /// Online addresses, or the reason they could not be determined
    pub async fn poll(&self) -> Result<HashSet<HardwareAddress>, PresenceError> {
        let token = self.auth.get_token().await?;
        match self.lister.list_online(&token).await {
            Err(ListError::Rejected(code)) if self.reauth_on_rejection => {
                tracing::info!("Router rejected session token (code {}), logging in again", code);
                self.auth.invalidate().await;
                let token = self.auth.get_token().await?;
                Ok(self.lister.list_online(&token).await?)
            }
            result => Ok(result?),
        }
    }

    /// Online addresses; empty when the router cannot be queried
    pub async fn online_addresses(&self) -> HashSet<HardwareAddress> {
        match self.poll().await {
            Ok(online) => online,
            Err(e) => {
                tracing::warn!("Presence check failed: {}", e);
                HashSet::new()
            }
        }
    }

    /// Registered owners with at least one device online
    pub async fn online_owners(&self, registry: &dyn IdentityRegistry) -> Result<BTreeSet<Identity>, PresenceError> {
        let online = self.poll().await?;
        Ok(registry::resolve_owners(&online, registry))
    }

    /// Ring the doorbell: notify the registered owners who are home
    pub async fn ring(
        &self,
        registry: &dyn IdentityRegistry,
        notifier: &dyn Notifier,
    ) -> Result<RingOutcome, RingError> {
        let owners = self.online_owners(registry).await?;
        if owners.is_empty() {
            tracing::info!("Doorbell rang, no registered owner is home");
            return Ok(RingOutcome::NobodyHome);
        }

        notifier.send(&bell_message(&owners)).await?;
        tracing::info!("Doorbell rang, notified {} owners", owners.len());
        Ok(RingOutcome::Notified(owners))
    }
}
