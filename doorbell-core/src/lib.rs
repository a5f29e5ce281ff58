//! doorbell-core: Presence detection through a home router's web API
//!
//! This crate provides:
//! - Router login (nonce challenge-response) with a cached session token
//! - Live device table polling
//! - A presence façade answering "which hardware addresses are online now"
//! - Collaborator seams for owner lookup and notifications
//! - Configuration loading

pub mod auth;
pub mod clock;
pub mod config;
pub mod devices;
pub mod presence;
pub mod registry;
pub mod testing;
pub mod transport;

pub use auth::{AuthError, Authenticator, SessionToken};
pub use clock::{Clock, SystemClock};
pub use config::Config;
pub use devices::{DeviceLister, HardwareAddress, ListError};
pub use presence::{PresenceError, PresenceQuery, RingError, RingOutcome};
pub use registry::{Identity, IdentityRegistry, LogNotifier, Notifier, StaticRegistry};
pub use transport::{HttpResponse, HttpTransport, RouterTransport, TransportError};

/// Router session tokens are accepted for this long after issuance
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 300;

/// Upper bound on any single request to the router
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Default presence polling interval for the daemon
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
