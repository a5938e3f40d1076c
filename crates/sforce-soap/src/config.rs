//! Client configuration.

use std::time::Duration;

/// Login endpoint used when no server URL is configured
pub const DEFAULT_SERVER_URL: &str = "https://login.salesforce.com/services/Soap/u/20.0";

/// Total attempts per call when the connection keeps failing
pub const MAX_ATTEMPTS: u32 = 3;

/// Settings threaded through every call made by one client.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Login endpoint. Default: [`DEFAULT_SERVER_URL`].
    pub server_url: String,
    /// Sent as `CallOptions/client`. Default: `sforce/<version>`.
    pub client_id: String,
    /// Gzip request bodies. Default: true.
    pub gzip_request: bool,
    /// Ask for gzip responses. Default: true.
    pub gzip_response: bool,
    /// Rewrite `https://` endpoints to `http://`. Default: false.
    pub force_http: bool,
    /// Per-attempt timeout. Default: 10 seconds.
    pub timeout: Duration,
    /// `QueryOptions/batchSize` for query, queryMore and search. Default: 500.
    pub batch_size: u32,
    /// Keep sObject descriptions between calls. Default: false.
    pub cache_type_descriptions: bool,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            client_id: format!("sforce/{}", env!("CARGO_PKG_VERSION")),
            gzip_request: true,
            gzip_response: true,
            force_http: false,
            timeout: Duration::from_secs(10),
            batch_size: 500,
            cache_type_descriptions: false,
            user_agent: format!("sforce-rs/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Defaults overlaid with `SF_SERVER_URL`, `SF_CLIENT_ID`, `SF_GZIP`,
    /// `SF_TIMEOUT_SECS` and `SF_BATCH_SIZE`. Unparsable values are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        let mut config = Self::default();
        if let Some(url) = lookup("SF_SERVER_URL") {
            config.server_url = url;
        }
        if let Some(id) = lookup("SF_CLIENT_ID") {
            config.client_id = id;
        }
        if let Some(gzip) = lookup("SF_GZIP") {
            let enabled = !matches!(gzip.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no");
            config.gzip_request = enabled;
            config.gzip_response = enabled;
        }
        if let Some(secs) = lookup("SF_TIMEOUT_SECS").and_then(|s| s.trim().parse::<u64>().ok()) {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(size) = lookup("SF_BATCH_SIZE").and_then(|s| s.trim().parse::<u32>().ok()) {
            config.batch_size = size;
        }
        config
    }

    pub fn with_server_url<S: Into<String>>(mut self, url: S) -> Self {
        self.server_url = url.into();
        self
    }

    pub fn with_client_id<S: Into<String>>(mut self, id: S) -> Self {
        self.client_id = id.into();
        self
    }

    /// Set both compression directions at once
    pub fn with_gzip(mut self, enabled: bool) -> Self {
        self.gzip_request = enabled;
        self.gzip_response = enabled;
        self
    }

    pub fn with_gzip_request(mut self, enabled: bool) -> Self {
        self.gzip_request = enabled;
        self
    }

    pub fn with_gzip_response(mut self, enabled: bool) -> Self {
        self.gzip_response = enabled;
        self
    }

    pub fn with_force_http(mut self, enabled: bool) -> Self {
        self.force_http = enabled;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_batch_size(mut self, size: u32) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_cache_type_descriptions(mut self, enabled: bool) -> Self {
        self.cache_type_descriptions = enabled;
        self
    }

    pub fn with_user_agent<S: Into<String>>(mut self, agent: S) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Endpoint actually contacted for `url`
    pub fn effective_url(&self, url: &str) -> String {
        match url.strip_prefix("https://") {
            Some(rest) if self.force_http => format!("http://{rest}"),
            _ => url.to_string(),
        }
    }
}
