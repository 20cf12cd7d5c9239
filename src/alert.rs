//! Admin alert gateway.
//!
//! Fire-and-forget: the scoring engine logs and swallows any failure here, so
//! a broken webhook can never stall a scoring cycle. A missing bot token or
//! chat id disables the sink entirely instead of erroring.

use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::Serialize;
use tracing::debug;

use crate::config::AlertConfig;
use crate::model::Trajectory;

#[derive(Debug, Clone)]
pub struct TrendAlert {
    pub title: String,
    pub tps: f32,
    pub trajectory: Trajectory,
    pub cluster_id: String,
}

#[async_trait::async_trait]
pub trait AlertSink: Send + Sync {
    async fn notify(&self, alert: &TrendAlert) -> Result<()>;
}

/// No-op sink used when alerting is not configured.
pub struct NullAlerter;

#[async_trait::async_trait]
impl AlertSink for NullAlerter {
    async fn notify(&self, alert: &TrendAlert) -> Result<()> {
        debug!(
            title = %alert.title,
            tps = alert.tps,
            "admin alert suppressed (no alert sink configured)"
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

pub struct TelegramAlerter {
    client: reqwest::Client,
    api_url: String,
    chat_id: String,
    timeout: Duration,
    max_retries: u8,
}

impl TelegramAlerter {
    /// Returns `None` when the bot token or admin chat id is missing.
    pub fn from_config(cfg: &AlertConfig) -> Option<Self> {
        let token = cfg.bot_token.as_deref()?.trim().to_string();
        let chat_id = cfg.admin_chat_id.as_deref()?.trim().to_string();
        if token.is_empty() || chat_id.is_empty() {
            return None;
        }
        Some(Self {
            client: reqwest::Client::new(),
            api_url: format!("https://api.telegram.org/bot{token}/sendMessage"),
            chat_id,
            timeout: Duration::from_secs(15),
            max_retries: 3,
        })
    }

    fn render(alert: &TrendAlert) -> String {
        format!(
            "<b>Trend Detection</b>\n\n\
             <b>Topic:</b> {}\n\
             <b>Score:</b> {:.1} TPS\n\
             <b>Trajectory:</b> {}\n\
             <b>Cluster:</b> {}",
            alert.title,
            alert.tps,
            alert.trajectory.as_str(),
            alert.cluster_id,
        )
    }
}

#[async_trait::async_trait]
impl AlertSink for TelegramAlerter {
    async fn notify(&self, alert: &TrendAlert) -> Result<()> {
        let text = Self::render(alert);
        let payload = SendMessage {
            chat_id: &self.chat_id,
            text: &text,
            parse_mode: "HTML",
        };

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.api_url)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            match res {
                Ok(rsp) => {
                    if let Err(e) = rsp.error_for_status_ref() {
                        if attempt < self.max_retries {
                            tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1)))
                                .await;
                            continue;
                        }
                        return Err(anyhow!("telegram HTTP error: {e}"));
                    }
                    return Ok(());
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
                        continue;
                    }
                    return Err(anyhow!("telegram request failed: {e}"));
                }
            }
        }
    }
}
