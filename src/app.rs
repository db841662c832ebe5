use anyhow::Result;
use tokio::task::JoinHandle;

use crate::chat::ChatState;
use crate::client::{ChatClient, ChatReply, Transport};
use crate::config::Config;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub struct App {
    pub should_quit: bool,

    // Conversation state and its transport
    pub chat: ChatState,
    pub client: ChatClient,

    // Input line
    pub input: String,
    pub cursor: usize, // char index into input

    // Message log viewport
    pub chat_scroll: u16,
    pub chat_height: u16, // inner size of the log area, updated during render
    pub chat_width: u16,

    // In-flight request. At most one; Enter is refused while it is pending.
    pub reply_task: Option<JoinHandle<Result<ChatReply>>>,

    // Animation state (0-2 for ellipsis animation)
    pub animation_frame: u8,
}

impl App {
    pub fn new(config: &Config) -> Self {
        Self {
            should_quit: false,
            chat: ChatState::new(Some(config.user_id().to_string())),
            client: ChatClient::new(config.base_url()),
            input: String::new(),
            cursor: 0,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            reply_task: None,
            animation_frame: 0,
        }
    }

    /// Submit the current input line. Whitespace-only input never reaches
    /// the chat container, and a pending reply leaves the line untouched.
    pub fn submit(&mut self) {
        if self.reply_task.is_some() {
            return;
        }
        let content = self.input.trim().to_string();
        if content.is_empty() {
            return;
        }

        self.input.clear();
        self.cursor = 0;
        self.chat.push_user(&content);
        self.scroll_to_bottom();

        let client = self.client.clone();
        let user_id = self.chat.user_id.clone();
        self.reply_task = Some(tokio::spawn(async move {
            client.send(&content, user_id.as_deref()).await
        }));
    }

    /// Collect a finished reply task, if any. A panicked task counts as a
    /// transport failure and produces the same fallback message.
    pub async fn poll_reply(&mut self) {
        let finished = self
            .reply_task
            .as_ref()
            .map(|task| task.is_finished())
            .unwrap_or(false);
        if !finished {
            return;
        }

        if let Some(task) = self.reply_task.take() {
            let result = match task.await {
                Ok(result) => result,
                Err(err) => Err(anyhow::anyhow!("reply task failed: {err}")),
            };
            self.chat.push_reply(result);
            self.scroll_to_bottom();
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.chat.is_typing {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Input editing (cursor is a char index; the string is edited at the
    // corresponding byte position)

    pub fn insert_char(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.input, self.cursor);
        self.input.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn delete_back(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.input, self.cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn delete_forward(&mut self) {
        if self.cursor < self.input.chars().count() {
            let byte_pos = char_to_byte_index(&self.input, self.cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.input.chars().count());
    }

    pub fn cursor_home(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.cursor = self.input.chars().count();
    }

    // Message log scrolling

    pub fn scroll_up(&mut self, amount: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(amount);
    }

    pub fn scroll_down(&mut self, amount: u16) {
        let max_scroll = self.total_log_lines().saturating_sub(self.viewport_height());
        self.chat_scroll = self.chat_scroll.saturating_add(amount).min(max_scroll);
    }

    /// Scroll so the newest message (or the typing indicator) is visible.
    pub fn scroll_to_bottom(&mut self) {
        self.chat_scroll = self.total_log_lines().saturating_sub(self.viewport_height());
    }

    fn viewport_height(&self) -> u16 {
        if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        }
    }

    /// Rendered line count of the log at the current chat width. Mirrors
    /// the layout produced by `ui::render`: a role label per message,
    /// wrapped content, two rows per product card, a blank separator.
    fn total_log_lines(&self) -> u16 {
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total: u16 = 0;
        for msg in &self.chat.messages {
            total += 1; // role label
            for line in msg.content.lines() {
                // Char count, not byte length, for proper UTF-8 handling
                let char_count = line.chars().count();
                total += ((char_count / wrap_width) + 1) as u16;
            }
            for product in &msg.products {
                total += 1; // name / price / rating row
                total += ((product.description.chars().count() / wrap_width) + 1) as u16;
            }
            total += 1; // blank line after message
        }

        if self.chat.is_typing {
            total += 2; // label + animated indicator
        }

        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_app() -> App {
        App::new(&Config::default())
    }

    fn canned_reply() -> Result<ChatReply> {
        Ok(ChatReply {
            response: "Hello!".to_string(),
            confidence: 0.9,
            products: Vec::new(),
        })
    }

    #[tokio::test]
    async fn test_submit_whitespace_is_a_no_op() {
        let mut app = test_app();
        app.input = "   \t ".to_string();
        app.cursor = app.input.chars().count();

        app.submit();

        assert_eq!(app.chat.messages.len(), 1); // greeting only
        assert!(app.reply_task.is_none());
        assert!(!app.chat.is_typing);
        assert_eq!(app.input, "   \t "); // line left for the user to edit
    }

    #[tokio::test]
    async fn test_submit_refused_while_reply_pending() {
        let mut app = test_app();
        app.reply_task = Some(tokio::spawn(async { canned_reply() }));
        app.input = "second message".to_string();

        app.submit();

        assert_eq!(app.chat.messages.len(), 1);
        assert_eq!(app.input, "second message");
    }

    #[tokio::test]
    async fn test_poll_reply_resolves_finished_task() {
        let mut app = test_app();
        app.chat.push_user("Hi");
        app.reply_task = Some(tokio::spawn(async { canned_reply() }));

        while app.reply_task.is_some() {
            app.poll_reply().await;
            tokio::task::yield_now().await;
        }

        assert_eq!(app.chat.messages.last().unwrap().content, "Hello!");
        assert!(!app.chat.is_typing);
    }

    #[test]
    fn test_input_editing_is_utf8_safe() {
        let mut app = test_app();
        for c in "café".chars() {
            app.insert_char(c);
        }
        assert_eq!(app.input, "café");
        assert_eq!(app.cursor, 4);

        app.cursor_left();
        app.insert_char('f');
        assert_eq!(app.input, "caffé");

        app.cursor_end();
        app.delete_back();
        assert_eq!(app.input, "caff");

        app.cursor_home();
        app.delete_forward();
        assert_eq!(app.input, "aff");
        assert_eq!(app.cursor, 0);
    }

    #[test]
    fn test_delete_back_at_start_is_a_no_op() {
        let mut app = test_app();
        app.delete_back();
        assert_eq!(app.input, "");
        assert_eq!(app.cursor, 0);
    }
}
