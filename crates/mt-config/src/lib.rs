use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub bind_addr: String,
    pub db_url: String,
    /// Public base URL the tracking pixel links point back to.
    pub public_url: String,
    /// Address shown in the signature block of every rendered body.
    pub sender: String,
    pub textgen_url: String,
    pub textgen_api_key: String,
    pub textgen_model: String,
    pub textgen_timeout_ms: u64,
    pub relay_url: String,
    pub relay_api_key: String,
    pub relay_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".into(),
            db_url: "sqlite://mailtrack.db".into(),
            public_url: "http://localhost:8080".into(),
            sender: "campaigns@mailtrack.local".into(),
            textgen_url: "https://api.groq.com/openai/v1/chat/completions".into(),
            textgen_api_key: String::new(),
            textgen_model: "mixtral-8x7b-32768".into(),
            textgen_timeout_ms: 15_000,
            relay_url: "http://localhost:8025/api/send".into(),
            relay_api_key: String::new(),
            relay_timeout_ms: 15_000,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut cfg = Self::default();
        if let Ok(v) = env::var("MT_BIND_ADDR") {
            if !v.is_empty() {
                cfg.bind_addr = v;
            }
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            if !v.is_empty() {
                cfg.db_url = v;
            }
        }
        if let Ok(v) = env::var("MT_PUBLIC_URL") {
            if !v.is_empty() {
                cfg.public_url = v;
            }
        }
        if let Ok(v) = env::var("MT_SENDER") {
            if !v.is_empty() {
                cfg.sender = v;
            }
        }
        if let Ok(v) = env::var("MT_TEXTGEN_URL") {
            if !v.is_empty() {
                cfg.textgen_url = v;
            }
        }
        if let Ok(v) = env::var("MT_TEXTGEN_API_KEY") {
            if !v.is_empty() {
                cfg.textgen_api_key = v;
            }
        }
        if let Ok(v) = env::var("MT_TEXTGEN_MODEL") {
            if !v.is_empty() {
                cfg.textgen_model = v;
            }
        }
        if let Ok(v) = env::var("MT_TEXTGEN_TIMEOUT_MS") {
            if let Ok(ms) = v.parse() {
                cfg.textgen_timeout_ms = ms;
            }
        }
        if let Ok(v) = env::var("MT_RELAY_URL") {
            if !v.is_empty() {
                cfg.relay_url = v;
            }
        }
        if let Ok(v) = env::var("MT_RELAY_API_KEY") {
            if !v.is_empty() {
                cfg.relay_api_key = v;
            }
        }
        if let Ok(v) = env::var("MT_RELAY_TIMEOUT_MS") {
            if let Ok(ms) = v.parse() {
                cfg.relay_timeout_ms = ms;
            }
        }
        Ok(cfg)
    }
}
