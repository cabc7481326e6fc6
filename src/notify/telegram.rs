use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::multipart;
use reqwest::Client;

use super::{ImageBlob, Notifier};

const API_BASE: &str = "https://api.telegram.org";

pub struct TelegramNotifier {
    bot_token: String,
    chat_id: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: String) -> Self {
        Self {
            bot_token,
            chat_id,
            client: Client::new(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{API_BASE}/bot{}/{method}", self.bot_token)
    }

    async fn send_message(&self, text: &str) -> Result<()> {
        let body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
        });

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(self.method_url("sendMessage"))
                .timeout(self.timeout)
                .json(&body)
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
                        return Err(anyhow!("telegram sendMessage HTTP error: {e}"));
                    }
                    return Ok(());
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
                        continue;
                    }
                    return Err(anyhow!("telegram sendMessage request failed: {e}"));
                }
            }
        }
    }

    async fn send_photo(&self, image: &ImageBlob) -> Result<()> {
        let part = multipart::Part::bytes(image.bytes.clone()).file_name(image.name.clone());
        let form = multipart::Form::new()
            .text("chat_id", self.chat_id.clone())
            .part("photo", part);

        self.client
            .post(self.method_url("sendPhoto"))
            .timeout(self.timeout)
            .multipart(form)
            .send()
            .await
            .context("telegram sendPhoto")?
            .error_for_status()
            .context("telegram sendPhoto non-2xx")?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str, images: &[ImageBlob]) -> Result<()> {
        // Photos go out first so the text lands next to its charts. A
        // failed photo is logged and skipped; the text is the payload
        // that decides success.
        for image in images {
            if let Err(e) = self.send_photo(image).await {
                tracing::warn!(error = ?e, image = %image.name, "photo upload failed");
            }
        }
        self.send_message(text).await
    }
}
