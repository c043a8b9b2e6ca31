use huddle_common::helpers::{env_parse, env_string};
use huddle_common::{Error, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_CHANNEL: &str = "test";
pub const DEFAULT_GATEWAY_URL: &str = "http://127.0.0.1:8080";
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_SLOT_CAPACITY: usize = 4;
pub const DEFAULT_SCREEN_ENCODER: &str = "1080p";
pub const DEFAULT_PLACEHOLDER_IMAGE: &str = "/public/img1.jpg";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// RTC application id.
    pub app_id: String,
    pub channel: String,
    /// Chat application key. Falls back to `app_id` when empty.
    pub chat_app_key: String,
    /// Base URL of the token gateway.
    pub gateway_url: String,
    pub http_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    /// Number of pre-existing participant slots in the layout.
    pub slot_capacity: usize,
    pub screen_encoder_profile: String,
    pub placeholder_image: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            channel: DEFAULT_CHANNEL.into(),
            chat_app_key: String::new(),
            gateway_url: DEFAULT_GATEWAY_URL.into(),
            http_timeout_ms: DEFAULT_HTTP_TIMEOUT_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            slot_capacity: DEFAULT_SLOT_CAPACITY,
            screen_encoder_profile: DEFAULT_SCREEN_ENCODER.into(),
            placeholder_image: DEFAULT_PLACEHOLDER_IMAGE.into(),
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `HUDDLE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(v) = env_string("HUDDLE_APP_ID") {
            config.app_id = v;
        }
        if let Some(v) = env_string("HUDDLE_CHANNEL") {
            config.channel = v;
        }
        if let Some(v) = env_string("HUDDLE_CHAT_APP_KEY") {
            config.chat_app_key = v;
        }
        if let Some(v) = env_string("HUDDLE_GATEWAY_URL") {
            config.gateway_url = v;
        }
        if let Some(v) = env_parse("HUDDLE_HTTP_TIMEOUT_MS")? {
            config.http_timeout_ms = v;
        }
        if let Some(v) = env_parse("HUDDLE_CONNECT_TIMEOUT_MS")? {
            config.connect_timeout_ms = v;
        }
        if let Some(v) = env_parse("HUDDLE_SLOT_CAPACITY")? {
            config.slot_capacity = v;
        }
        if let Some(v) = env_string("HUDDLE_SCREEN_ENCODER") {
            config.screen_encoder_profile = v;
        }
        if let Some(v) = env_string("HUDDLE_PLACEHOLDER_IMAGE") {
            config.placeholder_image = v;
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.app_id.trim().is_empty() {
            return Err(Error::config("app_id is required"));
        }
        if self.channel.trim().is_empty() {
            return Err(Error::config("channel must not be empty"));
        }
        let url = Url::parse(&self.gateway_url)
            .map_err(|e| Error::config(format!("gateway_url {:?}: {e}", self.gateway_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "gateway_url must be http or https, got {}",
                url.scheme()
            )));
        }
        if self.http_timeout_ms == 0 || self.connect_timeout_ms == 0 {
            return Err(Error::config("timeouts must be greater than zero"));
        }
        if self.screen_encoder_profile.trim().is_empty() {
            return Err(Error::config("screen_encoder_profile must not be empty"));
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn chat_app_key(&self) -> &str {
        if self.chat_app_key.is_empty() {
            &self.app_id
        } else {
            &self.chat_app_key
        }
    }
}
