use std::net::SocketAddr;
use std::path::PathBuf;

use secrecy::SecretString;
use thiserror::Error;

use scrivener_core::orchestrator::{DEFAULT_MAX_CONTEXT_CHARS, DEFAULT_MAX_TURNS};
use scrivener_provider::groq::{DEFAULT_BASE_URL, DEFAULT_MODEL};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("GROQ_API_KEY is not set")]
    MissingApiKey,

    #[error("invalid {key} '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug)]
pub struct Config {
    pub api_key: SecretString,
    pub model: String,
    pub base_url: String,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub max_context_turns: usize,
    pub max_context_chars: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = get("GROQ_API_KEY").ok_or(ConfigError::MissingApiKey)?;
        let host = get("SCRIVENER_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = parse(get("SCRIVENER_PORT"), "SCRIVENER_PORT", 3000)?;
        let addr: SocketAddr = format!("{}:{}", host, port).parse().map_err(|e: std::net::AddrParseError| {
            ConfigError::Invalid {
                key: "SCRIVENER_HOST",
                value: host.clone(),
                reason: e.to_string(),
            }
        })?;

        let max_context_turns = parse(get("SCRIVENER_MAX_CONTEXT_TURNS"), "SCRIVENER_MAX_CONTEXT_TURNS", DEFAULT_MAX_TURNS)?;
        if max_context_turns == 0 {
            return Err(ConfigError::Invalid {
                key: "SCRIVENER_MAX_CONTEXT_TURNS",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }

        Ok(Self {
            api_key: SecretString::from(api_key),
            model: get("GROQ_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into()),
            base_url: get("GROQ_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into()),
            db_path: PathBuf::from(get("SCRIVENER_DB_PATH").unwrap_or_else(|| "scrivener.db".into())),
            addr,
            max_context_turns,
            max_context_chars: parse(
                get("SCRIVENER_MAX_CONTEXT_CHARS"),
                "SCRIVENER_MAX_CONTEXT_CHARS",
                DEFAULT_MAX_CONTEXT_CHARS,
            )?,
        })
    }
}

fn parse<T>(raw: Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_with_only_the_key() {
        let cfg = config(&[("GROQ_API_KEY", "gsk_test")]).unwrap();
        assert_eq!(cfg.api_key.expose_secret(), "gsk_test");
        assert_eq!(cfg.model, DEFAULT_MODEL);
        assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.db_path, PathBuf::from("scrivener.db"));
        assert_eq!(cfg.addr.port(), 3000);
        assert_eq!(cfg.max_context_turns, 20);
        assert_eq!(cfg.max_context_chars, 24_000);
        assert!(!format!("{cfg:?}").contains("gsk_test"));
    }

    #[test]
    fn missing_or_blank_key_is_fatal() {
        assert!(matches!(config(&[]), Err(ConfigError::MissingApiKey)));
        assert!(matches!(config(&[("GROQ_API_KEY", "   ")]), Err(ConfigError::MissingApiKey)));
    }

    #[test]
    fn overrides_and_bad_values() {
        let cfg = config(&[
            ("GROQ_API_KEY", "k"),
            ("GROQ_MODEL", "gemma2-9b-it"),
            ("SCRIVENER_HOST", "127.0.0.1"),
            ("SCRIVENER_PORT", "8080"),
            ("SCRIVENER_MAX_CONTEXT_CHARS", "1000"),
        ])
        .unwrap();
        assert_eq!(cfg.model, "gemma2-9b-it");
        assert_eq!(cfg.addr.to_string(), "127.0.0.1:8080");
        assert_eq!(cfg.max_context_chars, 1000);

        assert!(matches!(
            config(&[("GROQ_API_KEY", "k"), ("SCRIVENER_PORT", "eighty")]),
            Err(ConfigError::Invalid { key: "SCRIVENER_PORT", .. })
        ));
        assert!(matches!(
            config(&[("GROQ_API_KEY", "k"), ("SCRIVENER_MAX_CONTEXT_TURNS", "0")]),
            Err(ConfigError::Invalid { key: "SCRIVENER_MAX_CONTEXT_TURNS", .. })
        ));
    }
}
