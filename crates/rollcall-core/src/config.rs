use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Environment variables recognised in addition to `rollcall.toml`.
/// Env always wins over the file; the file wins over built-in defaults.
const ENV_KEYS: &[&str] = &[
    "DISCORD_TOKEN",
    "MCP_DISCORD_DB_PATH",
    "GUILD_ALLOWLIST",
    "LOG_LEVEL",
    "DRY_RUN",
];

/// Immutable process configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Discord bot token. May be empty only when `dry_run` is set.
    #[serde(default)]
    pub discord_token: String,

    /// Path of the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Comma-separated guild ids the bot may operate against.
    /// Empty means unrestricted.
    #[serde(default, deserialize_with = "de_stringly")]
    pub guild_allowlist: String,

    /// Default log verbosity when RUST_LOG is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// When true, all outbound Discord writes are suppressed.
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discord_token: String::new(),
            db_path: default_db_path(),
            guild_allowlist: String::new(),
            log_level: default_log_level(),
            dry_run: false,
        }
    }
}

impl Config {
    /// Load config from `rollcall.toml` (path overridable via `ROLLCALL_CONFIG`)
    /// with the documented environment variables layered on top.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .or_else(|| std::env::var("ROLLCALL_CONFIG").ok())
            .unwrap_or_else(|| "rollcall.toml".to_string());

        let env = Env::raw().only(ENV_KEYS).map(|key| {
            match key.as_str().to_ascii_uppercase().as_str() {
                "DISCORD_TOKEN" => "discord_token".into(),
                "MCP_DISCORD_DB_PATH" => "db_path".into(),
                "GUILD_ALLOWLIST" => "guild_allowlist".into(),
                "LOG_LEVEL" => "log_level".into(),
                "DRY_RUN" => "dry_run".into(),
                other => other.to_ascii_lowercase().into(),
            }
        });

        let config: Config = Figment::new()
            .merge(Toml::file(&path))
            .merge(env)
            .extract()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Parsed guild allowlist. Empty slice means no restriction.
    pub fn allowlist(&self) -> Vec<String> {
        self.guild_allowlist
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }

    fn validate(&self) -> Result<()> {
        if self.discord_token.is_empty() && !self.dry_run {
            return Err(ConfigError::MissingToken);
        }
        Ok(())
    }
}

/// The env provider type-infers values, so a lone numeric guild id arrives
/// as an integer. Accept it as a string either way.
fn de_stringly<'de, D: serde::Deserializer<'de>>(de: D) -> std::result::Result<String, D::Error> {
    struct Stringly;

    impl serde::de::Visitor<'_> for Stringly {
        type Value = String;

        fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("a string or a number")
        }

        fn visit_str<E: serde::de::Error>(self, v: &str) -> std::result::Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_u64<E: serde::de::Error>(self, v: u64) -> std::result::Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_i64<E: serde::de::Error>(self, v: i64) -> std::result::Result<String, E> {
            Ok(v.to_string())
        }
    }

    de.deserialize_any(Stringly)
}

fn default_db_path() -> String {
    "discord_mcp.db".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}
