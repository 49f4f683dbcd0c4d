use serde::{Deserialize, Deserializer};

/// Configuration for the API server
#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    /// PostgreSQL database URL
    pub database_url: String,
    /// Redis URL, used for the analytics cache
    pub redis_url: String,
    /// Port to run the server on
    #[serde(default = "default_port")]
    pub port: u16,
    /// Lifetime of a login session
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,
    /// Maximum number of pooled Postgres connections
    #[serde(default = "default_db_pool_size")]
    pub db_pool_size: usize,
    /// How long dashboard aggregates stay in Redis
    #[serde(default = "default_analytics_cache_seconds")]
    pub analytics_cache_seconds: u64,
    /// Interval of the session/booking housekeeping job
    #[serde(
        default = "default_housekeeping_interval_seconds",
        deserialize_with = "at_least_one_second"
    )]
    pub housekeeping_interval_seconds: u64,
    /// Bootstrap admin account, created on startup when missing
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    /// `text` or `json`
    #[serde(default = "default_log_format")]
    pub log_format: String,
    /// Printed on invoices and certificates
    #[serde(default = "default_organization_name")]
    pub organization_name: String,
}

fn default_port() -> u16 {
    3000
}

fn default_session_ttl_hours() -> i64 {
    24
}

fn default_db_pool_size() -> usize {
    20
}

fn default_analytics_cache_seconds() -> u64 {
    60
}

fn default_housekeeping_interval_seconds() -> u64 {
    300
}

/// A zero interval would make the housekeeping timer panic
fn at_least_one_second<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(u64::deserialize(deserializer)?.max(1))
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_organization_name() -> String {
    "Mock Exam Center".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let vars = vec![
            ("DATABASE_URL".to_string(), "postgres://localhost/exams".to_string()),
            ("REDIS_URL".to_string(), "redis://localhost".to_string()),
        ];
        let config = envy::from_iter::<_, Config>(vars).unwrap();

        assert_eq!(config.port, 3000);
        assert_eq!(config.session_ttl_hours, 24);
        assert_eq!(config.db_pool_size, 20);
        assert_eq!(config.analytics_cache_seconds, 60);
        assert_eq!(config.housekeeping_interval_seconds, 300);
        assert_eq!(config.log_format, "text");
        assert!(config.admin_email.is_none());
    }

    #[test]
    fn test_config_overrides() {
        let vars = vec![
            ("DATABASE_URL".to_string(), "postgres://localhost/exams".to_string()),
            ("REDIS_URL".to_string(), "redis://localhost".to_string()),
            ("PORT".to_string(), "8080".to_string()),
            ("ADMIN_EMAIL".to_string(), "root@example.com".to_string()),
            ("LOG_FORMAT".to_string(), "json".to_string()),
        ];
        let config = envy::from_iter::<_, Config>(vars).unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.admin_email.as_deref(), Some("root@example.com"));
        assert_eq!(config.log_format, "json");
    }

    #[test]
    fn test_housekeeping_interval_is_at_least_one_second() {
        let vars = vec![
            ("DATABASE_URL".to_string(), "postgres://localhost/exams".to_string()),
            ("REDIS_URL".to_string(), "redis://localhost".to_string()),
            ("HOUSEKEEPING_INTERVAL_SECONDS".to_string(), "0".to_string()),
        ];
        let config = envy::from_iter::<_, Config>(vars).unwrap();
        assert_eq!(config.housekeeping_interval_seconds, 1);
    }

    #[test]
    fn test_config_requires_database_url() {
        let vars = vec![("REDIS_URL".to_string(), "redis://localhost".to_string())];
        assert!(envy::from_iter::<_, Config>(vars).is_err());
    }
}
