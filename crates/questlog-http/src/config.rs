//! Client configuration.

use std::time::Duration;

use questlog_core::ApiUrl;

use crate::endpoints::{LoginShape, PROFILE, RefreshShape};

/// Configuration for a [`Client`](crate::Client).
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use questlog_core::ApiUrl;
/// use questlog_http::{ClientConfig, RefreshShape};
///
/// let config = ClientConfig::new(ApiUrl::new("https://rpg.example.com/api").unwrap())
///     .with_timeout(Duration::from_secs(10))
///     .with_refresh_shapes(vec![RefreshShape::RefreshToken]);
/// assert_eq!(config.refresh_shapes.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API base URL; endpoint paths are appended to it.
    pub base_url: ApiUrl,
    /// `User-Agent` sent with every call.
    pub user_agent: String,
    /// Transport timeout for a single call. `None` leaves it to the transport.
    pub timeout: Option<Duration>,
    /// Path queried for the user profile when token claims carry no identity.
    pub profile_path: String,
    /// Login body shapes, tried in order.
    pub login_shapes: Vec<LoginShape>,
    /// Refresh body shapes, tried in order.
    pub refresh_shapes: Vec<RefreshShape>,
    /// Buffered session events per subscriber.
    pub event_capacity: usize,
}

impl ClientConfig {
    /// Create a configuration with defaults for the given API.
    pub fn new(base_url: ApiUrl) -> Self {
        Self {
            base_url,
            user_agent: concat!("questlog/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: None,
            profile_path: PROFILE.to_string(),
            login_shapes: LoginShape::ALL.to_vec(),
            refresh_shapes: RefreshShape::ALL.to_vec(),
            event_capacity: 16,
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_profile_path(mut self, path: impl Into<String>) -> Self {
        self.profile_path = path.into();
        self
    }

    /// Restrict login to the given body shapes. An empty list is ignored.
    pub fn with_login_shapes(mut self, shapes: Vec<LoginShape>) -> Self {
        if !shapes.is_empty() {
            self.login_shapes = shapes;
        }
        self
    }

    /// Restrict refresh to the given body shapes. An empty list is ignored.
    pub fn with_refresh_shapes(mut self, shapes: Vec<RefreshShape>) -> Self {
        if !shapes.is_empty() {
            self.refresh_shapes = shapes;
        }
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_try_every_known_shape() {
        let config = ClientConfig::new(ApiUrl::new("http://localhost:8080").unwrap());
        assert_eq!(config.login_shapes.first(), Some(&LoginShape::Username));
        assert_eq!(config.refresh_shapes.first(), Some(&RefreshShape::RefreshToken));
        assert_eq!(config.profile_path, "/auth/me");
        assert!(config.user_agent.starts_with("questlog/"));
    }

    #[test]
    fn empty_shape_lists_are_ignored() {
        let config = ClientConfig::new(ApiUrl::new("http://localhost:8080").unwrap())
            .with_login_shapes(Vec::new())
            .with_refresh_shapes(Vec::new());
        assert_eq!(config.login_shapes.len(), LoginShape::ALL.len());
        assert_eq!(config.refresh_shapes.len(), RefreshShape::ALL.len());
    }
}
