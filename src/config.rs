use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

use crate::tracker::resolver::MatchRule;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub system: SystemConfig,
    pub polling: PollingConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemConfig {
    pub health_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    pub check_interval_secs: u64,
    pub refresh_hour: u32,
    pub refresh_minute: u32,
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolverConfig {
    #[serde(default = "default_match_rule")]
    pub match_rule: MatchRule,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            match_rule: default_match_rule(),
        }
    }
}

fn default_match_rule() -> MatchRule {
    MatchRule::Keyword
}

#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub telegram_bot_token: String,
    pub telegram_chat_id: i64,
    pub gamma_url: String,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        Ok(config)
    }
}

impl EnvConfig {
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        Ok(Self {
            telegram_bot_token: std::env::var("TELEGRAM_BOT_TOKEN")
                .context("TELEGRAM_BOT_TOKEN not set")?,
            telegram_chat_id: std::env::var("TELEGRAM_CHAT_ID")
                .context("TELEGRAM_CHAT_ID not set")?
                .parse()
                .context("TELEGRAM_CHAT_ID is not a numeric chat id")?,
            gamma_url: std::env::var("POLYMARKET_GAMMA_URL")
                .unwrap_or_else(|_| "https://gamma-api.polymarket.com".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_parses() {
        let config: Config = toml::from_str(
            r#"
            [system]
            health_port = 8080

            [polling]
            check_interval_secs = 30
            refresh_hour = 0
            refresh_minute = 5

            [resolver]
            match_rule = "date"
            "#,
        )
        .unwrap();

        assert_eq!(config.system.health_port, 8080);
        assert_eq!(config.polling.check_interval_secs, 30);
        assert_eq!(config.polling.utc_offset_minutes, 0);
        assert_eq!(config.resolver.match_rule, MatchRule::Date);
    }

    #[test]
    fn test_resolver_section_defaults_to_keyword() {
        let config: Config = toml::from_str(
            r#"
            [system]
            health_port = 8080

            [polling]
            check_interval_secs = 30
            refresh_hour = 0
            refresh_minute = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.resolver.match_rule, MatchRule::Keyword);
    }
}
