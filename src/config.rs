use clap::{Parser, ValueEnum};
use std::time::Duration;

use crate::rate_limit::RateLimitPolicy;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

// CLI argument structure, every flag can also come from the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "verse-gateway")]
#[command(about = "Rate limited gateway serving verse lookups and a daily verse per user")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "VERSE_GATEWAY_PORT", default_value_t = 8080)]
    pub port: u16,

    // Content backend that answers POST /api/verse
    #[arg(short, long, env = "VERSE_GATEWAY_BACKEND_URL", default_value = "http://localhost:8000")]
    pub backend_url: String,

    // PostgREST endpoint holding daily_verse and query_history.
    // Without it history lives in process memory and daily selections are
    // pruned down to the last couple of days on every sweep.
    #[arg(long, env = "VERSE_GATEWAY_POSTGREST_URL")]
    pub postgrest_url: Option<String>,

    #[arg(long, env = "VERSE_GATEWAY_POSTGREST_KEY", default_value = "", hide_env_values = true)]
    pub postgrest_key: String,

    // Timeout for every upstream call, in milliseconds
    #[arg(long, env = "VERSE_GATEWAY_UPSTREAM_TIMEOUT_MS", default_value_t = 15_000)]
    pub upstream_timeout_ms: u64,

    // How often expired rate limit windows are swept, in seconds
    #[arg(long, env = "VERSE_GATEWAY_SWEEP_INTERVAL", default_value_t = 60)]
    pub sweep_interval: u64,

    // Zone used when a request carries no timezone or an unknown one
    #[arg(long, env = "VERSE_GATEWAY_FALLBACK_TIMEZONE", default_value = "UTC")]
    pub fallback_timezone: chrono_tz::Tz,

    // /api/verse: max requests per window
    #[arg(long, env = "VERSE_GATEWAY_VERSE_LIMIT", default_value_t = 60)]
    pub verse_limit: u32,

    // /api/verse: window in seconds
    #[arg(long, env = "VERSE_GATEWAY_VERSE_WINDOW", default_value_t = 60)]
    pub verse_window: u64,

    // /api/daily: max requests per window
    #[arg(long, env = "VERSE_GATEWAY_DAILY_LIMIT", default_value_t = 10)]
    pub daily_limit: u32,

    // /api/daily: window in seconds
    #[arg(long, env = "VERSE_GATEWAY_DAILY_WINDOW", default_value_t = 60)]
    pub daily_window: u64,

    // /api/history (GET): max requests per window
    #[arg(long, env = "VERSE_GATEWAY_HISTORY_LIMIT", default_value_t = 30)]
    pub history_limit: u32,

    // /api/history (GET): window in seconds
    #[arg(long, env = "VERSE_GATEWAY_HISTORY_WINDOW", default_value_t = 60)]
    pub history_window: u64,

    // /api/history (DELETE): max requests per window
    #[arg(long, env = "VERSE_GATEWAY_HISTORY_DELETE_LIMIT", default_value_t = 5)]
    pub history_delete_limit: u32,

    // /api/history (DELETE): window in seconds
    #[arg(long, env = "VERSE_GATEWAY_HISTORY_DELETE_WINDOW", default_value_t = 60)]
    pub history_delete_window: u64,

    #[arg(long, env = "VERSE_GATEWAY_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

impl Args {
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }

    pub fn sweep_every(&self) -> Duration {
        Duration::from_secs(self.sweep_interval)
    }

    pub fn policies(&self) -> Policies {
        Policies {
            verse: RateLimitPolicy::new(self.verse_limit, Duration::from_secs(self.verse_window)),
            daily: RateLimitPolicy::new(self.daily_limit, Duration::from_secs(self.daily_window)),
            history: RateLimitPolicy::new(self.history_limit, Duration::from_secs(self.history_window)),
            history_delete: RateLimitPolicy::new(
                self.history_delete_limit,
                Duration::from_secs(self.history_delete_window),
            ),
        }
    }
}

// Per-route admission policies
#[derive(Debug, Clone, Copy)]
pub struct Policies {
    pub verse: RateLimitPolicy,
    pub daily: RateLimitPolicy,
    pub history: RateLimitPolicy,
    pub history_delete: RateLimitPolicy,
}

impl Default for Policies {
    fn default() -> Self {
        Self {
            verse: RateLimitPolicy::per_minute(60),
            daily: RateLimitPolicy::per_minute(10),
            history: RateLimitPolicy::per_minute(30),
            history_delete: RateLimitPolicy::per_minute(5),
        }
    }
}
