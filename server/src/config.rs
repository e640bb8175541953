use std::net::SocketAddr;
use tutor_core::TutorConfig;

/// Daemon settings on top of the shared tutor config
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: SocketAddr,
    /// Idle minutes before a session expires. 0 keeps sessions forever.
    pub session_ttl_minutes: i64,
    /// How often expired sessions are swept
    pub cleanup_interval_secs: u64,
    pub tutor: TutorConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            http_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            session_ttl_minutes: 60,
            cleanup_interval_secs: 60,
            tutor: TutorConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn session_ttl(&self) -> Option<chrono::Duration> {
        (self.session_ttl_minutes > 0).then(|| chrono::Duration::minutes(self.session_ttl_minutes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ttl() {
        let mut config = AppConfig::default();
        assert_eq!(config.session_ttl(), Some(chrono::Duration::minutes(60)));

        config.session_ttl_minutes = 0;
        assert_eq!(config.session_ttl(), None);
    }
}
