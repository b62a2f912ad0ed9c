use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::audio::subscription::ReconnectPolicy;

/// Límite de embeds que Discord acepta en un mensaje
const MAX_EMBEDS_PER_MESSAGE: usize = 10;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub command_prefix: String,

    // Reconexión
    pub ready_timeout: Duration,
    pub moved_grace: Duration,
    pub rejoin_backoff: Duration,
    pub max_rejoin_attempts: u32,

    // Cola
    pub queue_page_size: usize,

    // yt-dlp
    pub ytdlp_path: String,
    pub resolver_lang: Option<String>,
    pub stream_timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let config = Self::from_lookup(|key| std::env::var(key).ok())?;

        // Validate configuration before returning
        config.validate()?;

        Ok(config)
    }

    /// Construye la configuración leyendo cada variable con `lookup`.
    ///
    /// Las variables vacías cuentan como ausentes.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let secs = |key: &str, default: u64| -> Result<Duration> {
            let raw = var(key).unwrap_or_else(|| default.to_string());
            let secs: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("{} debe ser un número de segundos, got: {}", key, raw))?;
            Ok(Duration::from_secs(secs))
        };

        Ok(Self {
            // Discord
            discord_token: var("DISCORD_TOKEN").context("DISCORD_TOKEN no está definido")?,
            command_prefix: var("COMMAND_PREFIX").unwrap_or_else(|| "!".to_string()),

            // Reconexión
            ready_timeout: secs("READY_TIMEOUT_SECS", 20)?,
            moved_grace: secs("MOVED_GRACE_SECS", 5)?,
            rejoin_backoff: secs("REJOIN_BACKOFF_SECS", 5)?,
            max_rejoin_attempts: var("MAX_REJOIN_ATTEMPTS")
                .unwrap_or_else(|| "5".to_string())
                .trim()
                .parse()
                .context("MAX_REJOIN_ATTEMPTS inválido")?,

            // Cola
            queue_page_size: var("QUEUE_PAGE_SIZE")
                .unwrap_or_else(|| "5".to_string())
                .trim()
                .parse()
                .context("QUEUE_PAGE_SIZE inválido")?,

            // yt-dlp
            ytdlp_path: var("YTDLP_PATH").unwrap_or_else(|| "yt-dlp".to_string()),
            resolver_lang: var("RESOLVER_LANG"),
            stream_timeout: secs("STREAM_TIMEOUT_SECS", 30)?,
        })
    }

    /// Validates configuration values for correctness.
    ///
    /// - Durations must be greater than zero
    /// - The page size must fit in a single Discord message (1..=10)
    /// - The rejoin ceiling must stay within 1..=50
    /// - The command prefix must not be empty
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("Discord token must not be empty");
        }

        if self.command_prefix.trim().is_empty() {
            anyhow::bail!("Command prefix must not be empty");
        }

        for (name, value) in [
            ("Ready timeout", self.ready_timeout),
            ("Moved grace period", self.moved_grace),
            ("Rejoin backoff", self.rejoin_backoff),
            ("Stream timeout", self.stream_timeout),
        ] {
            if value.is_zero() {
                anyhow::bail!("{} must be greater than 0", name);
            }
        }

        if self.max_rejoin_attempts == 0 || self.max_rejoin_attempts > 50 {
            anyhow::bail!(
                "Max rejoin attempts must be between 1 and 50, got: {}",
                self.max_rejoin_attempts
            );
        }

        if self.queue_page_size == 0 || self.queue_page_size > MAX_EMBEDS_PER_MESSAGE {
            anyhow::bail!(
                "Queue page size must be between 1 and {}, got: {}",
                MAX_EMBEDS_PER_MESSAGE,
                self.queue_page_size
            );
        }

        Ok(())
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            ready_timeout: self.ready_timeout,
            moved_grace: self.moved_grace,
            rejoin_backoff: self.rejoin_backoff,
            max_rejoin_attempts: self.max_rejoin_attempts,
        }
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// The token is never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Commands: prefix '{}'\n  \
            Reconnect: ready {}s, moved grace {}s, backoff {}s x {} attempts\n  \
            Queue: {} per page\n  \
            Resolver: {} (lang {}), stream timeout {}s",
            self.command_prefix,
            self.ready_timeout.as_secs(),
            self.moved_grace.as_secs(),
            self.rejoin_backoff.as_secs(),
            self.max_rejoin_attempts,
            self.queue_page_size,
            self.ytdlp_path,
            self.resolver_lang.as_deref().unwrap_or("default"),
            self.stream_timeout.as_secs(),
        )
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        let policy = ReconnectPolicy::default();
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            command_prefix: "!".to_string(),

            ready_timeout: policy.ready_timeout,
            moved_grace: policy.moved_grace,
            rejoin_backoff: policy.rejoin_backoff,
            max_rejoin_attempts: policy.max_rejoin_attempts,

            queue_page_size: 5,

            ytdlp_path: "yt-dlp".to_string(),
            resolver_lang: None,
            stream_timeout: Duration::from_secs(30),
        }
    }
}
