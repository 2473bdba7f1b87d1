use anyhow::{Context, Result};

use crate::agent::DEFAULT_MAX_STEPS;
use crate::model::ModelId;

/// Settings the agent factories read on every request
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub default_model: String,
    pub aws_region: String,
    pub debug_mode: bool,
    pub max_steps: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            default_model: ModelId::default().as_str().to_string(),
            aws_region: "us-east-1".to_string(),
            debug_mode: true,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub agents: AgentSettings,

    /// Session storage and knowledge base; in-memory sessions when unset
    pub database_url: Option<String>,

    /// Brave Search key; DuckDuckGo is used without one
    pub brave_api_key: Option<String>,

    pub http_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = AgentSettings::default();

        Ok(Self {
            agents: AgentSettings {
                default_model: std::env::var("SAGE_DEFAULT_MODEL")
                    .unwrap_or(defaults.default_model),
                aws_region: std::env::var("AWS_REGION").unwrap_or(defaults.aws_region),
                debug_mode: std::env::var("SAGE_DEBUG")
                    .map(|v| parse_flag(&v))
                    .unwrap_or(defaults.debug_mode),
                max_steps: match std::env::var("SAGE_MAX_STEPS") {
                    Ok(v) => v.trim().parse().context("SAGE_MAX_STEPS must be a number")?,
                    Err(_) => defaults.max_steps,
                },
            },

            database_url: non_empty_var("DATABASE_URL"),
            brave_api_key: non_empty_var("BRAVE_API_KEY"),

            http_port: parse_port(
                &std::env::var("HTTP_PORT").unwrap_or_else(|_| "8000".to_string()),
            )?,
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_port(value: &str) -> Result<u16> {
    value.trim().parse().context("HTTP_PORT must be a port number")
}

/// `false`, `0`, `no` and `off` disable a flag; anything else enables it
fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_lowercase().as_str(),
        "false" | "0" | "no" | "off"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = AgentSettings::default();
        assert_eq!(settings.default_model, "amazon.nova-lite-v1:0");
        assert_eq!(settings.aws_region, "us-east-1");
        assert!(settings.debug_mode);
        assert_eq!(settings.max_steps, 10);
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag("1"));
        assert!(!parse_flag("False"));
        assert!(!parse_flag(" off "));
    }

    #[test]
    fn test_parse_port() {
        assert_eq!(parse_port("8000").unwrap(), 8000);
        assert_eq!(parse_port(" 3000 ").unwrap(), 3000);
        let err = parse_port("80a0").unwrap_err();
        assert_eq!(err.to_string(), "HTTP_PORT must be a port number");
        assert!(parse_port("70000").is_err());
    }
}
