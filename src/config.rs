use std::env;
use std::str::FromStr;

use chrono_tz::Tz;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app_name: String,
    pub environment: String,
    pub api_prefix: String,
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub dev_auth_overrides_enabled: bool,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst_size: u32,
    pub auth_jwt_secret: Option<String>,
    pub database_url: Option<String>,
    pub db_pool_max_connections: u32,
    pub db_pool_min_connections: u32,
    pub db_pool_acquire_timeout_seconds: u64,
    /// Local timezone used to resolve "today" for due dates and overdue
    /// derivation (the property operates in one timezone, not UTC).
    pub timezone: Tz,
    /// Day of month rent falls due when generate-monthly is not given one.
    pub billing_due_day: u32,
    pub proof_max_bytes: usize,
    pub proof_bucket: Option<String>,
    pub proof_public_base_url: Option<String>,
    pub complaints_api_url: Option<String>,
    pub history_cache_ttl_seconds: u64,
    pub history_cache_max_entries: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            app_name: env_or("APP_NAME", "KosanKu API"),
            environment: env_or("ENVIRONMENT", "development"),
            api_prefix: normalize_prefix(&env_or("API_PREFIX", "/api")),
            host: env_or("HOST", "0.0.0.0"),
            port: env_parse_or("PORT", 8000),
            cors_origins: parse_csv(&env_or("CORS_ORIGINS", "http://localhost:3000")),
            dev_auth_overrides_enabled: env_parse_bool_or("DEV_AUTH_OVERRIDES_ENABLED", false),
            rate_limit_per_second: env_parse_or("RATE_LIMIT_PER_SECOND", 10),
            rate_limit_burst_size: env_parse_or("RATE_LIMIT_BURST_SIZE", 100),
            auth_jwt_secret: env_opt("AUTH_JWT_SECRET"),
            database_url: env_opt("DATABASE_URL"),
            db_pool_max_connections: env_parse_or("DB_POOL_MAX_CONNECTIONS", 5),
            db_pool_min_connections: env_parse_or("DB_POOL_MIN_CONNECTIONS", 1),
            db_pool_acquire_timeout_seconds: env_parse_or("DB_POOL_ACQUIRE_TIMEOUT_SECONDS", 5),
            timezone: parse_timezone(env_opt("TIMEZONE").as_deref()),
            billing_due_day: env_parse_or("BILLING_DUE_DAY", 5).clamp(1, 31),
            proof_max_bytes: env_parse_or("PROOF_MAX_BYTES", 5 * 1024 * 1024),
            proof_bucket: env_opt("PROOF_BUCKET"),
            proof_public_base_url: env_opt("PROOF_PUBLIC_BASE_URL")
                .filter(|raw| url::Url::parse(raw).is_ok()),
            complaints_api_url: env_opt("COMPLAINTS_API_URL")
                .filter(|raw| url::Url::parse(raw).is_ok()),
            history_cache_ttl_seconds: env_parse_or("HISTORY_CACHE_TTL_SECONDS", 30),
            history_cache_max_entries: env_parse_or("HISTORY_CACHE_MAX_ENTRIES", 1000),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.trim().eq_ignore_ascii_case("production")
    }

    pub fn auth_dev_overrides_enabled(&self) -> bool {
        if self.is_production() {
            return false;
        }
        self.dev_auth_overrides_enabled
    }
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

fn env_parse_or<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    env_opt(key)
        .and_then(|raw| raw.parse::<T>().ok())
        .unwrap_or(default)
}

fn env_parse_bool_or(key: &str, default: bool) -> bool {
    match env_opt(key).as_deref().map(str::to_ascii_lowercase) {
        Some(value) if value == "1" || value == "true" || value == "yes" || value == "on" => true,
        Some(value) if value == "0" || value == "false" || value == "no" || value == "off" => false,
        Some(_) => default,
        None => default,
    }
}

fn parse_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

fn parse_timezone(raw: Option<&str>) -> Tz {
    raw.and_then(|value| value.parse::<Tz>().ok())
        .unwrap_or(chrono_tz::Asia::Jakarta)
}

fn normalize_prefix(raw: &str) -> String {
    let mut prefix = raw.trim().to_string();
    if prefix.is_empty() {
        return "/api".to_string();
    }
    if !prefix.starts_with('/') {
        prefix.insert(0, '/');
    }
    while prefix.ends_with('/') && prefix.len() > 1 {
        prefix.pop();
    }
    prefix
}

#[cfg(test)]
mod tests {
    use super::{normalize_prefix, parse_csv, parse_timezone};

    #[test]
    fn normalizes_prefix() {
        assert_eq!(normalize_prefix("api"), "/api");
        assert_eq!(normalize_prefix("/api/"), "/api");
        assert_eq!(normalize_prefix(""), "/api");
    }

    #[test]
    fn parses_origin_lists() {
        assert_eq!(
            parse_csv("http://a.test, http://b.test ,"),
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
    }

    #[test]
    fn falls_back_to_jakarta_timezone() {
        assert_eq!(parse_timezone(None), chrono_tz::Asia::Jakarta);
        assert_eq!(parse_timezone(Some("not-a-zone")), chrono_tz::Asia::Jakarta);
        assert_eq!(
            parse_timezone(Some("Asia/Makassar")),
            chrono_tz::Asia::Makassar
        );
    }
}
