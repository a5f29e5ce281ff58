//! Live device table from the router
//!
//! `GET <luci>/;stok=<token>/api/misystem/devicelist` answers with a JSON
//! object whose `list` holds one entry per known device:
//!
//! ```json
//! {"code":0,"list":[{"mac":"AA:BB:CC:DD:EE:FF","online":1,"name":"phone"}]}
//! ```
//!
//! A token the router no longer accepts comes back as HTTP 200 with a
//! non-zero `code` and no `list`.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use crate::auth::SessionToken;
use crate::config::RouterConfig;
use crate::transport::RouterTransport;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ListError {
    #[error("Router device list unreachable: {0}")]
    Unreachable(String),

    #[error("Malformed device list: {0}")]
    BadResponse(String),

    #[error("Router rejected the device list request (code {0})")]
    Rejected(i64),
}

/// Hardware address as reported by the router.
///
/// The router does not promise a canonical form, so comparisons against
/// user-supplied addresses should go through [`HardwareAddress::normalized`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(transparent)]
pub struct HardwareAddress(String);

impl HardwareAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Upper-case, colon-separated form
    pub fn normalized(&self) -> HardwareAddress {
        HardwareAddress(self.0.trim().to_uppercase().replace('-', ":"))
    }
}

impl fmt::Display for HardwareAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HardwareAddress {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// One row of the router's device table
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceRecord {
    pub mac: HardwareAddress,
    #[serde(default)]
    pub online: i64,
}

impl DeviceRecord {
    pub fn is_online(&self) -> bool {
        self.online == 1
    }
}

#[derive(Debug, Deserialize)]
struct DeviceListResponse {
    code: Option<i64>,
    #[serde(default)]
    list: Vec<DeviceRecord>,
}

/// Parse a device list body into the set of online addresses
pub fn parse_device_list(body: &str) -> Result<HashSet<HardwareAddress>, ListError> {
    let resp: DeviceListResponse =
        serde_json::from_str(body).map_err(|e| ListError::BadResponse(e.to_string()))?;

    if let Some(code) = resp.code.filter(|c| *c != 0) {
        return Err(ListError::Rejected(code));
    }

    Ok(resp
        .list
        .into_iter()
        .filter(DeviceRecord::is_online)
        .map(|d| d.mac)
        .collect())
}

/// Fetches the router's live device table
pub struct DeviceLister {
    transport: Arc<dyn RouterTransport>,
    base_url: String,
}

impl DeviceLister {
    pub fn new(config: &RouterConfig, transport: Arc<dyn RouterTransport>) -> Self {
        Self {
            transport,
            base_url: config.base_url(),
        }
    }

    /// Addresses of every device the router currently marks online
    pub async fn list_online(&self, token: &SessionToken) -> Result<HashSet<HardwareAddress>, ListError> {
        let url = format!("{}/;stok={}/api/misystem/devicelist", self.base_url, token.secret());

        let resp = self
            .transport
            .get(&url)
            .await
            .map_err(|e| ListError::Unreachable(e.to_string()))?;
        if !resp.is_ok() {
            return Err(ListError::Unreachable(format!("HTTP {}", resp.status)));
        }

        let online = parse_device_list(&resp.body)?;
        tracing::debug!("Router reports {} devices online", online.len());
        Ok(online)
    }
}
