//! Presence polling loop for the `watch` command
//!
//! The first successful poll sets the baseline. After that every poll is
//! diffed against the last good one and changes are sent to the notifier.
//! A failed poll keeps the previous state, so a router hiccup does not
//! look like everybody leaving.

use std::collections::BTreeSet;

use tokio::time::{interval, Duration, MissedTickBehavior};

use doorbell_core::{Identity, IdentityRegistry, Notifier, PresenceQuery};

/// Owners who came or went between two polls
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Changes {
    pub arrived: Vec<Identity>,
    pub departed: Vec<Identity>,
}

impl Changes {
    pub fn is_empty(&self) -> bool {
        self.arrived.is_empty() && self.departed.is_empty()
    }

    /// One message per direction of change
    pub fn announcements(&self) -> Vec<String> {
        let mut messages = Vec::new();
        if !self.arrived.is_empty() {
            messages.push(format!("Arrived: {}", join_names(&self.arrived)));
        }
        if !self.departed.is_empty() {
            messages.push(format!("Left: {}", join_names(&self.departed)));
        }
        messages
    }
}

/// Comma-separated owner names
pub fn join_names<'a>(names: impl IntoIterator<Item = &'a Identity>) -> String {
    names.into_iter().map(Identity::as_str).collect::<Vec<_>>().join(", ")
}

/// Last known set of present owners
#[derive(Debug, Default)]
pub struct PresenceWatch {
    present: Option<BTreeSet<Identity>>,
}

impl PresenceWatch {
    /// Record a successful poll. Returns `None` for the baseline poll.
    pub fn update(&mut self, current: BTreeSet<Identity>) -> Option<Changes> {
        let changes = self.present.as_ref().map(|previous| Changes {
            arrived: current.difference(previous).cloned().collect(),
            departed: previous.difference(&current).cloned().collect(),
        });
        self.present = Some(current);
        changes
    }
}

/// Poll until Ctrl+C
pub async fn run(query: &PresenceQuery, registry: &dyn IdentityRegistry, notifier: &dyn Notifier, every: Duration) {
    let mut watch = PresenceWatch::default();
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                poll_once(&mut watch, query, registry, notifier).await;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C, shutting down");
                break;
            }
        }
    }
}

async fn poll_once(
    watch: &mut PresenceWatch,
    query: &PresenceQuery,
    registry: &dyn IdentityRegistry,
    notifier: &dyn Notifier,
) {
    let owners = match query.online_owners(registry).await {
        Ok(owners) => owners,
        Err(e) => {
            tracing::warn!("Presence poll failed, keeping previous state: {}", e);
            return;
        }
    };

    let count = owners.len();
    match watch.update(owners) {
        None => tracing::info!("{} registered owners present", count),
        Some(changes) if changes.is_empty() => tracing::debug!("No presence changes"),
        Some(changes) => {
            for message in changes.announcements() {
                if let Err(e) = notifier.send(&message).await {
                    tracing::warn!("{}", e);
                }
            }
        }
    }
}
