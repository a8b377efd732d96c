use ratatui::layout::Rect;
use tracing::{info, warn};

use crate::client::ChatClient;
use crate::config::Settings;
use crate::error::ChatError;
use crate::state::{BubbleHandle, ChatRole, Transcript};
use crate::tui::{AppEvent, EventSender};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Input,
    Transcript,
}

pub struct App {
    pub should_quit: bool,
    pub focus: FocusPane,

    // Conversation
    pub transcript: Transcript,
    pub client: ChatClient,
    pub settings: Settings,

    // Input box and send button. Both are disabled together while a reply is awaited.
    pub input: String,
    pub input_cursor: usize, // char index into input
    pub input_enabled: bool,

    // Transcript scrolling
    pub chat_scroll: u16,
    pub chat_height: u16, // inner height of the transcript pane
    pub chat_width: u16,  // inner width, for wrap estimates

    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Areas for mouse hit-testing (updated during render)
    pub chat_area: Option<Rect>,
    pub send_area: Option<Rect>,

    events: EventSender,
}

impl App {
    pub fn new(settings: Settings, events: EventSender) -> Self {
        let client = ChatClient::new(&settings.backend_url, &settings.session_id);

        Self {
            should_quit: false,
            focus: FocusPane::Input,

            transcript: Transcript::new(),
            client,
            settings,

            input: String::new(),
            input_cursor: 0,
            input_enabled: true,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,

            animation_frame: 0,

            chat_area: None,
            send_area: None,

            events,
        }
    }

    pub fn input_focused(&self) -> bool {
        self.focus == FocusPane::Input
    }

    /// Append a bubble and scroll so it is visible
    pub fn append_message(&mut self, role: ChatRole, text: &str) -> BubbleHandle {
        let handle = self.transcript.append(role, text);
        self.scroll_to_bottom();
        handle
    }

    /// Send the current input. Returns the placeholder's handle, or None
    /// when the trimmed input is empty and nothing happened.
    ///
    /// Does not check whether another request is in flight; callers that
    /// honor the disabled controls get one request at a time.
    pub fn send_message(&mut self) -> Option<BubbleHandle> {
        let text = self.input.trim().to_string();
        if text.is_empty() {
            return None;
        }

        self.input.clear();
        self.input_cursor = 0;
        self.input_enabled = false;

        self.append_message(ChatRole::Outgoing, &text);
        let handle = self.transcript.append_placeholder();
        self.scroll_to_bottom();

        info!(
            chars = text.chars().count(),
            bubbles = self.transcript.len(),
            session = %self.settings.session_id,
            "sending message"
        );

        let client = self.client.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let outcome = client.send(&text).await;
            // Receiver is gone only when the app is shutting down
            let _ = tx.send(AppEvent::Reply { handle, outcome });
        });

        Some(handle)
    }

    /// Fill in the placeholder and hand control back to the input,
    /// whatever the outcome
    pub fn settle_reply(&mut self, handle: BubbleHandle, outcome: Result<String, ChatError>) {
        let text = match outcome {
            Ok(reply) => {
                info!(chars = reply.chars().count(), "reply received");
                reply
            }
            Err(e) => {
                warn!(error = %e, "send failed");
                e.bubble_text()
            }
        };

        if !self.transcript.resolve(handle, &text) {
            match self.transcript.get(handle) {
                Some(_) => warn!(?handle, "reply for a bubble that was already resolved"),
                None => warn!(?handle, "reply for an unknown bubble"),
            }
        }

        self.input_enabled = true;
        self.focus = FocusPane::Input;
        self.scroll_to_bottom();
    }

    pub fn tick_animation(&mut self) {
        if self.transcript.has_pending() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Input editing. All positions are char indices.

    pub fn insert_char(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.input, self.input_cursor);
        self.input.insert(byte_pos, c);
        self.input_cursor += 1;
    }

    pub fn delete_before_cursor(&mut self) {
        if self.input_cursor > 0 {
            self.input_cursor -= 1;
            let byte_pos = char_to_byte_index(&self.input, self.input_cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn delete_at_cursor(&mut self) {
        if self.input_cursor < self.input.chars().count() {
            let byte_pos = char_to_byte_index(&self.input, self.input_cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn cursor_left(&mut self) {
        self.input_cursor = self.input_cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        let char_count = self.input.chars().count();
        self.input_cursor = (self.input_cursor + 1).min(char_count);
    }

    pub fn cursor_home(&mut self) {
        self.input_cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.input_cursor = self.input.chars().count();
    }

    // Transcript scrolling

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(self.max_scroll());
    }

    pub fn scroll_page_up(&mut self) {
        self.scroll_up(self.visible_height() / 2);
    }

    pub fn scroll_page_down(&mut self) {
        self.scroll_down(self.visible_height() / 2);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.chat_scroll = self.max_scroll();
    }

    /// Record the transcript pane's inner size. A view that was at the
    /// bottom stays there; otherwise the offset is clamped to the new range.
    pub fn set_chat_viewport(&mut self, width: u16, height: u16) {
        if width == self.chat_width && height == self.chat_height {
            return;
        }
        let at_bottom = self.chat_scroll >= self.max_scroll();
        self.chat_width = width;
        self.chat_height = height;
        if at_bottom {
            self.scroll_to_bottom();
        } else {
            self.chat_scroll = self.chat_scroll.min(self.max_scroll());
        }
    }

    fn max_scroll(&self) -> u16 {
        self.transcript_lines().saturating_sub(self.visible_height())
    }

    fn visible_height(&self) -> u16 {
        if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        }
    }

    /// Estimate of rendered transcript lines after wrapping
    fn transcript_lines(&self) -> u16 {
        // Use actual pane width when known
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;
        for msg in self.transcript.messages() {
            total_lines = total_lines.saturating_add(1); // "You:" / "Bot:" label
            for line in msg.text.lines() {
                let char_count = line.chars().count();
                // An empty line still takes a row
                let wrapped = char_count.div_ceil(wrap_width).max(1);
                total_lines = total_lines.saturating_add(wrapped as u16);
            }
            total_lines = total_lines.saturating_add(1); // blank separator
        }
        total_lines
    }
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::CONNECTION_FAILED;
    use crate::state::PLACEHOLDER_TEXT;
    use serde_json::json;
    use tokio::sync::mpsc;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub(crate) fn app_for(url: &str) -> (App, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let settings = Settings {
            backend_url: url.to_string(),
            session_id: "session-test".to_string(),
        };
        (App::new(settings, tx), rx)
    }

    /// Wait for the reply event and apply it
    pub(crate) async fn settle_next(app: &mut App, rx: &mut mpsc::UnboundedReceiver<AppEvent>) {
        match rx.recv().await {
            Some(AppEvent::Reply { handle, outcome }) => app.settle_reply(handle, outcome),
            other => panic!("expected a reply event, got {:?}", other),
        }
    }

    async fn server_replying(status: u16, body: serde_json::Value) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&server)
            .await;
        server
    }

    fn assert_controls_restored(app: &App) {
        assert!(app.input_enabled);
        assert_eq!(app.focus, FocusPane::Input);
    }

    #[tokio::test]
    async fn test_blank_input_is_a_no_op() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let (mut app, _rx) = app_for(&server.uri());
        app.input = "   \n\t ".to_string();

        assert!(app.send_message().is_none());
        assert!(app.transcript.is_empty());
        assert!(app.input_enabled);
        assert_eq!(app.input, "   \n\t ");
    }

    #[tokio::test]
    async fn test_send_appends_outgoing_then_placeholder() {
        let server = server_replying(200, json!({ "response": "Hi" })).await;
        let (mut app, mut rx) = app_for(&server.uri());
        app.input = "  hello  ".to_string();
        app.input_cursor = 9;

        let handle = app.send_message().unwrap();

        assert!(app.input.is_empty());
        assert_eq!(app.input_cursor, 0);
        assert!(!app.input_enabled);

        let messages = app.transcript.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ChatRole::Outgoing);
        assert_eq!(messages[0].text, "hello");
        assert_eq!(messages[1].role, ChatRole::Incoming);
        assert_eq!(messages[1].text, PLACEHOLDER_TEXT);
        assert!(messages[1].pending);

        settle_next(&mut app, &mut rx).await;
        assert_eq!(app.transcript.len(), 2);
        assert_eq!(app.transcript.get(handle).unwrap().text, "Hi");
        assert_controls_restored(&app);
    }

    #[tokio::test]
    async fn test_server_error_fills_placeholder() {
        let server = server_replying(400, json!({ "error": "bad session" })).await;
        let (mut app, mut rx) = app_for(&server.uri());
        app.input = "hello".to_string();

        let handle = app.send_message().unwrap();
        settle_next(&mut app, &mut rx).await;

        assert_eq!(app.transcript.get(handle).unwrap().text, "Error: bad session");
        assert_controls_restored(&app);
    }

    #[tokio::test]
    async fn test_transport_error_fills_placeholder() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let (mut app, mut rx) = app_for(&format!("http://127.0.0.1:{}/chat", port));
        app.focus = FocusPane::Transcript;
        app.input = "hello".to_string();

        let handle = app.send_message().unwrap();
        settle_next(&mut app, &mut rx).await;

        assert_eq!(app.transcript.get(handle).unwrap().text, CONNECTION_FAILED);
        assert_controls_restored(&app);
    }

    #[tokio::test]
    async fn test_overlapping_sends_land_in_their_own_bubbles() {
        let server = server_replying(200, json!({ "response": "ok" })).await;
        let (mut app, mut rx) = app_for(&server.uri());

        app.input = "first".to_string();
        let first = app.send_message().unwrap();
        app.input = "second".to_string();
        let second = app.send_message().unwrap();

        settle_next(&mut app, &mut rx).await;
        settle_next(&mut app, &mut rx).await;

        assert_eq!(app.transcript.len(), 4);
        assert_eq!(app.transcript.get(first).unwrap().text, "ok");
        assert_eq!(app.transcript.get(second).unwrap().text, "ok");
        assert!(!app.transcript.has_pending());
    }

    #[test]
    fn test_editing_is_utf8_safe() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let settings = Settings {
            backend_url: "http://127.0.0.1:1/chat".to_string(),
            session_id: "s".to_string(),
        };
        let mut app = App::new(settings, tx);

        for c in "héllo".chars() {
            app.insert_char(c);
        }
        app.cursor_left();
        app.cursor_left();
        app.cursor_left();
        app.delete_before_cursor();
        assert_eq!(app.input, "hllo");

        app.cursor_home();
        app.delete_at_cursor();
        assert_eq!(app.input, "llo");

        app.cursor_end();
        app.insert_char('!');
        assert_eq!(app.input, "llo!");
    }

    #[test]
    fn test_append_scrolls_to_bottom() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let settings = Settings {
            backend_url: "http://127.0.0.1:1/chat".to_string(),
            session_id: "s".to_string(),
        };
        let mut app = App::new(settings, tx);
        app.chat_height = 4;
        app.chat_width = 40;

        for i in 0..5 {
            app.append_message(ChatRole::Outgoing, &format!("message {}", i));
        }
        // 5 bubbles x 3 lines, 4 visible
        assert_eq!(app.chat_scroll, 11);

        app.scroll_up(5);
        assert_eq!(app.chat_scroll, 6);
        app.scroll_down(100);
        assert_eq!(app.chat_scroll, 11);
    }

    #[test]
    fn test_line_filling_the_width_takes_one_row() {
        let (mut app, _rx) = app_for("http://127.0.0.1:1/chat");
        app.chat_width = 10;
        app.chat_height = 1;

        // label + exactly 10 chars + separator = 3 rows, 1 visible
        app.append_message(ChatRole::Outgoing, "0123456789");
        assert_eq!(app.chat_scroll, 2);

        // 11 chars wrap onto a second row
        app.append_message(ChatRole::Outgoing, "0123456789a");
        assert_eq!(app.chat_scroll, 6);
    }

    #[test]
    fn test_resize_keeps_bottom_view_at_bottom() {
        let (mut app, _rx) = app_for("http://127.0.0.1:1/chat");
        app.set_chat_viewport(40, 4);
        for i in 0..5 {
            app.append_message(ChatRole::Outgoing, &format!("message {}", i));
        }
        assert_eq!(app.chat_scroll, 11);

        // Taller pane: still pinned to the last line
        app.set_chat_viewport(40, 10);
        assert_eq!(app.chat_scroll, 5);

        // Narrower pane wraps each message onto two rows
        app.set_chat_viewport(5, 10);
        assert_eq!(app.chat_scroll, 10);
    }

    #[test]
    fn test_resize_clamps_scrolled_up_view() {
        let (mut app, _rx) = app_for("http://127.0.0.1:1/chat");
        app.set_chat_viewport(40, 4);
        for i in 0..5 {
            app.append_message(ChatRole::Outgoing, &format!("message {}", i));
        }
        app.scroll_up(3);
        assert_eq!(app.chat_scroll, 8);

        // Max offset drops to 5; the view is clamped, not jumped to the top
        app.set_chat_viewport(40, 10);
        assert_eq!(app.chat_scroll, 5);

        app.scroll_up(4);
        app.set_chat_viewport(40, 12);
        assert_eq!(app.chat_scroll, 1);
    }
}
