use std::env;
use tracing::warn;

pub const DEFAULT_MEETING_BASE_URL: &str = "https://meet.jit.si";
pub const DEFAULT_MAX_EMERGENCY_PER_SLOT: u32 = 2;
pub const DEFAULT_AVAILABILITY_WINDOW_DAYS: u32 = 10;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub meeting_base_url: String,
    pub max_emergency_per_slot: u32,
    pub availability_window_days: u32,
    pub bind_addr: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            meeting_base_url: env::var("MEETING_BASE_URL")
                .unwrap_or_else(|_| {
                    warn!("MEETING_BASE_URL not set, using default");
                    DEFAULT_MEETING_BASE_URL.to_string()
                }),
            max_emergency_per_slot: parse_or_default(
                "MAX_EMERGENCY_PER_SLOT",
                DEFAULT_MAX_EMERGENCY_PER_SLOT,
            ),
            availability_window_days: parse_or_default(
                "AVAILABILITY_WINDOW_DAYS",
                DEFAULT_AVAILABILITY_WINDOW_DAYS,
            ),
            bind_addr: env::var("BIND_ADDR")
                .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    /// Configuration pointing at a Supabase instance with every scheduling
    /// knob at its default. Used by tests and local tooling.
    pub fn with_supabase(url: &str, anon_key: &str, jwt_secret: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            supabase_anon_key: anon_key.to_string(),
            supabase_jwt_secret: jwt_secret.to_string(),
            meeting_base_url: DEFAULT_MEETING_BASE_URL.to_string(),
            max_emergency_per_slot: DEFAULT_MAX_EMERGENCY_PER_SLOT,
            availability_window_days: DEFAULT_AVAILABILITY_WINDOW_DAYS,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }
}

fn parse_or_default(key: &str, default: u32) -> u32 {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} is not a valid number ({:?}), using {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_supabase_uses_scheduling_defaults() {
        let config = AppConfig::with_supabase("http://localhost:54321", "anon", "secret");

        assert!(config.is_configured());
        assert_eq!(config.max_emergency_per_slot, DEFAULT_MAX_EMERGENCY_PER_SLOT);
        assert_eq!(config.availability_window_days, 10);
        assert_eq!(config.meeting_base_url, DEFAULT_MEETING_BASE_URL);
    }

    #[test]
    fn empty_supabase_url_is_not_configured() {
        let config = AppConfig::with_supabase("", "anon", "secret");
        assert!(!config.is_configured());
    }
}
