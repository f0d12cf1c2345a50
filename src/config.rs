//! Configuration types.
//!
//! Built once at startup from the environment and shared read-only
//! (behind `Arc`) with the fetcher, the sender and the model components.

use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default system prompt for the assistant.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. You can send emails using \
the send_email tool, retrieve emails from the inbox using the retrieve_emails tool, and \
summarize recent emails using the summarize_emails tool when requested.";

/// Mail account and server settings.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub imap_host: String,
    pub imap_port: u16,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub mailbox: String,
    /// Account identifier, also used as the From address.
    pub username: String,
    /// App-specific password.
    pub password: SecretString,
    /// Applied to connect, read and write on both protocols.
    pub timeout: Duration,
}

/// Language-model endpoint settings.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: SecretString,
    pub model: String,
    /// Base URL of an OpenAI-compatible API (no trailing `/chat/completions`).
    pub api_base: String,
}

/// Agent behavior.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Agent name for identification.
    pub name: String,
    pub system_prompt: String,
    /// Maximum model calls per operator turn.
    pub max_iterations: usize,
    /// How many summarization calls may be in flight at once.
    pub summary_concurrency: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "inbox-assist".to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_iterations: 10,
            summary_concurrency: 4,
        }
    }
}

/// Everything the assistant needs, loaded once.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub mail: MailConfig,
    pub llm: LlmConfig,
    pub agent: AgentConfig,
}

impl AssistantConfig {
    /// Build config from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require =
            |key: &str| get(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()));

        let username = require("GMAIL_EMAIL")?;
        let password = SecretString::from(require("GMAIL_APP_PASSWORD")?);
        let api_key = SecretString::from(require("GEMINI_API_KEY")?);

        let timeout_secs: u64 = parse_or(&get, "MAIL_TIMEOUT_SECS", 30)?;

        let mail = MailConfig {
            imap_host: get("MAIL_IMAP_HOST").unwrap_or_else(|| "imap.gmail.com".to_string()),
            imap_port: parse_or(&get, "MAIL_IMAP_PORT", 993)?,
            smtp_host: get("MAIL_SMTP_HOST").unwrap_or_else(|| "smtp.gmail.com".to_string()),
            smtp_port: parse_or(&get, "MAIL_SMTP_PORT", 465)?,
            mailbox: get("MAIL_MAILBOX").unwrap_or_else(|| "INBOX".to_string()),
            username,
            password,
            timeout: Duration::from_secs(timeout_secs),
        };

        let llm = LlmConfig {
            api_key,
            model: get("ASSISTANT_MODEL").unwrap_or_else(|| "gemini-2.0-flash".to_string()),
            api_base: get("LLM_API_BASE").unwrap_or_else(|| {
                "https://generativelanguage.googleapis.com/v1beta/openai".to_string()
            }),
        };

        let defaults = AgentConfig::default();
        let max_iterations: usize =
            parse_or(&get, "ASSISTANT_MAX_ITERATIONS", defaults.max_iterations)?;
        let summary_concurrency: usize =
            parse_or(&get, "SUMMARY_CONCURRENCY", defaults.summary_concurrency)?;

        let agent = AgentConfig {
            system_prompt: get("ASSISTANT_SYSTEM_PROMPT").unwrap_or(defaults.system_prompt),
            max_iterations: max_iterations.max(1),
            summary_concurrency: summary_concurrency.max(1),
            ..defaults
        };

        Ok(Self { mail, llm, agent })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("{raw:?}: {e}"),
            }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("GMAIL_EMAIL", "me@example.com"),
        ("GMAIL_APP_PASSWORD", "app-secret"),
        ("GEMINI_API_KEY", "gm-key"),
    ];

    #[test]
    fn defaults_applied() {
        let config = AssistantConfig::from_lookup(lookup(REQUIRED)).unwrap();
        assert_eq!(config.mail.imap_host, "imap.gmail.com");
        assert_eq!(config.mail.imap_port, 993);
        assert_eq!(config.mail.smtp_host, "smtp.gmail.com");
        assert_eq!(config.mail.smtp_port, 465);
        assert_eq!(config.mail.mailbox, "INBOX");
        assert_eq!(config.mail.timeout, Duration::from_secs(30));
        assert_eq!(config.mail.username, "me@example.com");
        assert_eq!(config.mail.password.expose_secret(), "app-secret");
        assert_eq!(config.llm.model, "gemini-2.0-flash");
        assert_eq!(config.llm.api_key.expose_secret(), "gm-key");
        assert_eq!(config.agent.max_iterations, 10);
        assert_eq!(config.agent.summary_concurrency, 4);
    }

    #[test]
    fn missing_password_is_startup_error() {
        let err = AssistantConfig::from_lookup(lookup(&[
            ("GMAIL_EMAIL", "me@example.com"),
            ("GEMINI_API_KEY", "gm-key"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "GMAIL_APP_PASSWORD"));
    }

    #[test]
    fn blank_value_counts_as_missing() {
        let err = AssistantConfig::from_lookup(lookup(&[
            ("GMAIL_EMAIL", "   "),
            ("GMAIL_APP_PASSWORD", "app-secret"),
            ("GEMINI_API_KEY", "gm-key"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "GMAIL_EMAIL"));
    }

    #[test]
    fn overrides_parsed() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend_from_slice(&[
            ("MAIL_IMAP_HOST", "imap.example.org"),
            ("MAIL_SMTP_PORT", "587"),
            ("SUMMARY_CONCURRENCY", "1"),
            ("ASSISTANT_MODEL", "gemini-2.5-flash"),
        ]);
        let config = AssistantConfig::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.mail.imap_host, "imap.example.org");
        assert_eq!(config.mail.smtp_port, 587);
        assert_eq!(config.agent.summary_concurrency, 1);
        assert_eq!(config.llm.model, "gemini-2.5-flash");
    }

    #[test]
    fn invalid_port_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("MAIL_IMAP_PORT", "not-a-port"));
        let err = AssistantConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "MAIL_IMAP_PORT"));
    }

    #[test]
    fn debug_does_not_leak_secrets() {
        let config = AssistantConfig::from_lookup(lookup(REQUIRED)).unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("app-secret"));
        assert!(!rendered.contains("gm-key"));
    }
}
