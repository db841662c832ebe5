//! Chat state container: the append-only message log and typing flag.
//!
//! One `ChatState` is created per session and owned by the application;
//! all mutation goes through `send_message` / `set_typing` (or the two
//! halves `push_user` / `push_reply` when the transport call runs on a
//! spawned task).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::client::{ChatReply, Transport};

/// Fixed assistant reply shown for any transport failure.
pub const ERROR_FALLBACK: &str = "Sorry, I encountered an error. Please try again.";

const GREETING: &str = "Say 'Hi' to start a conversation.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A product card attached to an assistant message. Display record only;
/// it has no lifecycle beyond the message it arrived with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price: f64,
    pub description: String,
    pub image: String,
    pub rating: f64,
    pub reviews: u32,
}

/// One turn in the conversation. Immutable once pushed onto the log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub content: String,
    pub role: Role,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub products: Vec<Product>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>, products: Vec<Product>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            role,
            timestamp: Utc::now(),
            products,
        }
    }
}

pub struct ChatState {
    /// Insertion order is display order.
    pub messages: Vec<Message>,
    /// True exactly while a send awaits its resolution.
    pub is_typing: bool,
    pub user_id: Option<String>,
}

impl ChatState {
    pub fn new(user_id: Option<String>) -> Self {
        Self {
            messages: vec![Message::new(Role::Assistant, GREETING, Vec::new())],
            is_typing: false,
            user_id,
        }
    }

    /// Append the user's message and raise the typing flag. Callers must
    /// follow up with exactly one `push_reply` once the transport call
    /// resolves.
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(Message::new(Role::User, content, Vec::new()));
        self.is_typing = true;
    }

    /// Resolve a pending send: append exactly one assistant message and
    /// lower the typing flag. Transport failures are absorbed here, logged,
    /// and surfaced only as the fixed fallback reply.
    pub fn push_reply(&mut self, result: anyhow::Result<ChatReply>) {
        let message = match result {
            Ok(reply) => {
                tracing::debug!(confidence = reply.confidence, "assistant reply received");
                Message::new(Role::Assistant, reply.response, reply.products)
            }
            Err(err) => {
                tracing::error!("chat request failed: {err:#}");
                Message::new(Role::Assistant, ERROR_FALLBACK, Vec::new())
            }
        };
        self.messages.push(message);
        self.is_typing = false;
    }

    /// Send one message through the transport and record the outcome.
    ///
    /// The user message is on the log (and `is_typing` set) before the
    /// network call starts. Success or failure, exactly one assistant
    /// message is appended and `is_typing` ends false; errors never
    /// propagate to the caller.
    #[allow(dead_code)] // the TUI runs the two halves around a spawned task
    pub async fn send_message<T: Transport>(&mut self, transport: &T, content: &str) {
        self.push_user(content);
        let result = transport.send(content, self.user_id.as_deref()).await;
        self.push_reply(result);
    }

    #[allow(dead_code)]
    pub fn set_typing(&mut self, is_typing: bool) {
        self.is_typing = is_typing;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    struct Canned(ChatReply);

    impl Transport for Canned {
        async fn send(&self, _message: &str, _user_id: Option<&str>) -> anyhow::Result<ChatReply> {
            Ok(self.0.clone())
        }
    }

    struct Failing;

    impl Transport for Failing {
        async fn send(&self, _message: &str, _user_id: Option<&str>) -> anyhow::Result<ChatReply> {
            Err(anyhow!("connection refused"))
        }
    }

    fn reply(text: &str, products: Vec<Product>) -> ChatReply {
        ChatReply {
            response: text.to_string(),
            confidence: 0.9,
            products,
        }
    }

    fn product(id: &str, name: &str) -> Product {
        Product {
            id: id.to_string(),
            name: name.to_string(),
            price: 49.99,
            description: "A product".to_string(),
            image: "https://example.com/p.jpg".to_string(),
            rating: 4.5,
            reviews: 120,
        }
    }

    #[test]
    fn test_initial_state() {
        let chat = ChatState::new(None);
        assert_eq!(chat.messages.len(), 1);
        assert_eq!(chat.messages[0].role, Role::Assistant);
        assert_eq!(chat.messages[0].content, GREETING);
        assert!(chat.messages[0].products.is_empty());
        assert!(!chat.is_typing);
    }

    #[tokio::test]
    async fn test_send_appends_user_and_assistant() {
        let mut chat = ChatState::new(None);
        let before = chat.messages.len();

        chat.send_message(&Canned(reply("Hello!", Vec::new())), "Hi").await;

        assert_eq!(chat.messages.len(), before + 2);
        let user = &chat.messages[before];
        let assistant = &chat.messages[before + 1];
        assert_eq!(user.role, Role::User);
        assert_eq!(user.content, "Hi");
        assert_eq!(assistant.role, Role::Assistant);
        assert_eq!(assistant.content, "Hello!");
        assert!(assistant.products.is_empty());
        assert!(!chat.is_typing);
    }

    #[tokio::test]
    async fn test_send_failure_appends_fallback() {
        let mut chat = ChatState::new(None);
        let before = chat.messages.len();

        chat.send_message(&Failing, "Hi").await;

        assert_eq!(chat.messages.len(), before + 2);
        let assistant = chat.messages.last().unwrap();
        assert_eq!(assistant.role, Role::Assistant);
        assert_eq!(assistant.content, ERROR_FALLBACK);
        assert!(!chat.is_typing);
    }

    #[tokio::test]
    async fn test_products_preserved_in_order() {
        let mut chat = ChatState::new(None);
        let products = vec![product("p1", "Wireless Headphones"), product("p2", "Smartwatch")];

        chat.send_message(&Canned(reply("Here are some products", products.clone())), "show me headphones")
            .await;

        let assistant = chat.messages.last().unwrap();
        assert_eq!(assistant.products.len(), 2);
        assert_eq!(assistant.products, products);
    }

    #[test]
    fn test_typing_spans_the_pending_request() {
        let mut chat = ChatState::new(None);
        chat.push_user("Hi");
        assert!(chat.is_typing);
        assert_eq!(chat.messages.last().unwrap().role, Role::User);

        chat.push_reply(Ok(reply("Hello!", Vec::new())));
        assert!(!chat.is_typing);
        assert_eq!(chat.messages.last().unwrap().content, "Hello!");
    }

    #[test]
    fn test_set_typing_idempotent() {
        let mut chat = ChatState::new(None);
        let before = chat.messages.len();
        chat.set_typing(false);
        assert!(!chat.is_typing);
        assert_eq!(chat.messages.len(), before);

        chat.set_typing(true);
        chat.set_typing(true);
        assert!(chat.is_typing);
        assert_eq!(chat.messages.len(), before);
    }

    #[test]
    fn test_message_ids_are_unique() {
        let mut chat = ChatState::new(None);
        chat.push_user("one");
        chat.push_reply(Ok(reply("two", Vec::new())));
        chat.push_user("three");
        chat.push_reply(Ok(reply("four", Vec::new())));

        let mut ids: Vec<&str> = chat.messages.iter().map(|m| m.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), chat.messages.len());
    }
}
