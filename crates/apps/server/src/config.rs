use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use discovery::{DiscoveryConfig, FilterLimits};

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub places_path: PathBuf,
    pub discovery: DiscoveryConfig,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; unset or unparseable numeric
    /// keys keep their defaults.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let raw_addr = var("DISCOVERY_ADDR").unwrap_or_else(|| "127.0.0.1:9200".to_string());
        let addr = raw_addr
            .parse()
            .map_err(|e| format!("invalid DISCOVERY_ADDR {raw_addr:?}: {e}"))?;
        let places_path = var("PLACES_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data/places.json"));

        let base = DiscoveryConfig::default();
        let limits = FilterLimits {
            min_radius_m: env_var_u32(&var, "DISCOVERY_MIN_RADIUS_M", base.limits.min_radius_m),
            max_radius_m: env_var_u32(&var, "DISCOVERY_MAX_RADIUS_M", base.limits.max_radius_m),
            default_radius_m: env_var_u32(
                &var,
                "DISCOVERY_DEFAULT_RADIUS_M",
                base.limits.default_radius_m,
            ),
            max_tags: env_var_usize(&var, "DISCOVERY_MAX_TAGS", base.limits.max_tags),
        };
        if limits.min_radius_m > limits.max_radius_m
            || !limits.radius_allowed(i64::from(limits.default_radius_m))
        {
            return Err(format!(
                "inconsistent radius limits: min={} max={} default={}",
                limits.min_radius_m, limits.max_radius_m, limits.default_radius_m
            ));
        }

        let discovery = DiscoveryConfig {
            limits,
            default_page_size: env_var_usize(
                &var,
                "DISCOVERY_DEFAULT_PAGE_SIZE",
                base.default_page_size,
            ),
            max_page_size: env_var_usize(&var, "DISCOVERY_MAX_PAGE_SIZE", base.max_page_size),
            max_map_points: env_var_usize(&var, "DISCOVERY_MAX_MAP_POINTS", base.max_map_points),
            default_locale: var("DISCOVERY_DEFAULT_LOCALE").unwrap_or(base.default_locale),
        };

        Ok(Self {
            addr,
            places_path,
            discovery,
        })
    }
}

fn env_var_u32(var: &impl Fn(&str) -> Option<String>, key: &str, default: u32) -> u32 {
    var(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_var_usize(var: &impl Fn(&str) -> Option<String>, key: &str, default: usize) -> usize {
    var(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}
