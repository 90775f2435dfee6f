//! Engine configuration from environment variables.

use std::path::Path;

/// Listing page-size limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_size: u32,
    pub max_size: u32,
}

impl PageLimits {
    /// Requested size, defaulted and clamped to `1..=max_size`.
    pub fn clamp(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_size)
            .clamp(1, self.max_size.max(1))
    }
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_size: 20,
            max_size: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub page_limits: PageLimits,
    pub cors_allowed_origins: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (the environment, or a map in tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL").unwrap_or_else(|| "sqlite:divemap.db".into());
        let server_host = lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let server_port = parse_or(
            "SERVER_PORT",
            lookup("SERVER_PORT").or_else(|| lookup("PORT")),
            3000,
        )?;
        let defaults = PageLimits::default();
        let page_limits = PageLimits {
            default_size: parse_or(
                "DIVEMAP_DEFAULT_PAGE_SIZE",
                lookup("DIVEMAP_DEFAULT_PAGE_SIZE"),
                defaults.default_size,
            )?,
            max_size: parse_or(
                "DIVEMAP_MAX_PAGE_SIZE",
                lookup("DIVEMAP_MAX_PAGE_SIZE"),
                defaults.max_size,
            )?,
        };
        if page_limits.max_size == 0 {
            return Err(ConfigError::Invalid {
                key: "DIVEMAP_MAX_PAGE_SIZE",
                value: "0".into(),
            });
        }
        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(Self {
            database_url,
            server_host,
            server_port,
            page_limits,
            cors_allowed_origins,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    key: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

/// Load `.env.local` then `.env` from the repository root, if present.
pub fn load_dotenv_from_repo_root() {
    let repo_root = Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join("..");

    // Prefer local overrides.
    for filename in [".env.local", ".env"] {
        let path = repo_root.join(filename);
        if path.exists() {
            let _ = dotenvy::from_path(path);
        }
    }
}
