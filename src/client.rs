use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::chat::Product;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_USER_ID: &str = "user1";

/// One outbound call to the assistant backend. The chat container is
/// generic over this so tests can stand in for the network.
pub trait Transport {
    async fn send(&self, message: &str, user_id: Option<&str>) -> Result<ChatReply>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
}

/// Parsed body of a successful `/chat` response. A missing `products`
/// field decodes to an empty list so downstream code never sees an
/// absent value.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatReply {
    pub response: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub products: Vec<Product>,
}

#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    base_url: String,
}

impl ChatClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl Transport for ChatClient {
    async fn send(&self, message: &str, user_id: Option<&str>) -> Result<ChatReply> {
        let url = format!("{}/chat", self.base_url);
        let request = ChatRequest { message, user_id };

        // The backend authenticates via the user_id query parameter.
        let response = self
            .client
            .post(&url)
            .query(&[("user_id", user_id.unwrap_or(DEFAULT_USER_ID))])
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "chat request failed with status: {}",
                response.status()
            ));
        }

        let reply: ChatReply = response.json().await?;
        Ok(reply)
    }
}
