pub mod analysis;
pub mod domain;
pub mod error;
pub mod ingest;
pub mod llm;
pub mod prompt;
pub mod session;
pub mod views;

pub mod config {
    use anyhow::Context;

    pub const DEFAULT_ALLOCATION_TOLERANCE_PCT: f64 = 5.0;
    pub const DEFAULT_SESSION_TTL_SECS: u64 = 3600;
    pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
    pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
    pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash-latest";
    pub const DEFAULT_GEMINI_TIMEOUT_SECS: u64 = 60;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub gemini_api_key: Option<String>,
        pub gemini_base_url: String,
        pub gemini_model: String,
        pub gemini_timeout_secs: u64,
        pub sentry_dsn: Option<String>,
        pub allocation_tolerance_pct: f64,
        pub session_ttl_secs: u64,
        pub max_upload_bytes: usize,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let settings = Self {
                gemini_api_key: std::env::var("GEMINI_API_KEY")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
                gemini_base_url: parse_env("GEMINI_BASE_URL")?
                    .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
                gemini_model: parse_env("GEMINI_MODEL")?
                    .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
                gemini_timeout_secs: parse_env("GEMINI_TIMEOUT_SECS")?
                    .unwrap_or(DEFAULT_GEMINI_TIMEOUT_SECS),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                allocation_tolerance_pct: parse_env("ALLOCATION_TOLERANCE_PCT")?
                    .unwrap_or(DEFAULT_ALLOCATION_TOLERANCE_PCT),
                session_ttl_secs: parse_env("SESSION_TTL_SECS")?
                    .unwrap_or(DEFAULT_SESSION_TTL_SECS),
                max_upload_bytes: parse_env("MAX_UPLOAD_BYTES")?
                    .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            };
            settings.validate()?;
            Ok(settings)
        }

        fn validate(&self) -> anyhow::Result<()> {
            anyhow::ensure!(
                self.gemini_timeout_secs > 0,
                "GEMINI_TIMEOUT_SECS must be greater than 0"
            );
            Ok(())
        }

        pub fn require_gemini_api_key(&self) -> anyhow::Result<&str> {
            self.gemini_api_key
                .as_deref()
                .context("GEMINI_API_KEY is required")
        }
    }

    impl Default for Settings {
        fn default() -> Self {
            Self {
                gemini_api_key: None,
                gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
                gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
                gemini_timeout_secs: DEFAULT_GEMINI_TIMEOUT_SECS,
                sentry_dsn: None,
                allocation_tolerance_pct: DEFAULT_ALLOCATION_TOLERANCE_PCT,
                session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
                max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            }
        }
    }

    fn parse_env<T>(key: &str) -> anyhow::Result<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match std::env::var(key) {
            Ok(raw) if !raw.trim().is_empty() => raw
                .trim()
                .parse::<T>()
                .map(Some)
                .with_context(|| format!("{key} has an invalid value: {raw}")),
            _ => Ok(None),
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn require_gemini_api_key_reports_missing_key() {
            let settings = Settings::default();
            let err = settings.require_gemini_api_key().unwrap_err();
            assert!(err.to_string().contains("GEMINI_API_KEY"));
        }

        #[test]
        fn zero_gemini_timeout_is_rejected() {
            let settings = Settings {
                gemini_timeout_secs: 0,
                ..Settings::default()
            };
            let err = settings.validate().unwrap_err();
            assert!(err.to_string().contains("GEMINI_TIMEOUT_SECS"));
            assert!(Settings::default().validate().is_ok());
        }

        #[test]
        fn malformed_numeric_value_is_an_error() {
            std::env::set_var("REBALANCER_TEST_MALFORMED_TIMEOUT", "soon");
            let err = parse_env::<u64>("REBALANCER_TEST_MALFORMED_TIMEOUT").unwrap_err();
            assert!(err.to_string().contains("REBALANCER_TEST_MALFORMED_TIMEOUT"));
        }

        #[test]
        fn parse_env_ignores_unset_keys() {
            let parsed: Option<u64> =
                parse_env("REBALANCER_TEST_SURELY_UNSET_VARIABLE").unwrap();
            assert_eq!(parsed, None);
        }
    }
}
