use std::collections::HashMap;
use std::time::Duration;

use chathub_domain::id::OrganizationId;

/// Default Z-API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.z-api.io";

/// Credentials of one Z-API instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZapiInstance {
    pub instance_id: String,
    pub token: String,
}

/// Settings of the Z-API adapter.
#[derive(Debug, Clone)]
pub struct ZapiConfig {
    pub base_url: String,
    /// Account security token sent as `Client-Token` when set.
    pub client_token: Option<String>,
    /// Interval between status polls of an open session.
    pub poll_interval: Duration,
    /// Bound on every HTTP request.
    pub request_timeout: Duration,
    /// Log the phone out of the instance when its session closes.
    pub logout_on_close: bool,
    pub instances: HashMap<OrganizationId, ZapiInstance>,
}

impl Default for ZapiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            client_token: None,
            poll_interval: Duration::from_secs(5),
            request_timeout: Duration::from_secs(15),
            logout_on_close: false,
            instances: HashMap::new(),
        }
    }
}
