use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::types::BrowserState;

pub const SYSTEM_PROMPT: &str = r#"You are a web navigation agent. You control a browser to accomplish user tasks.

## Input
Each turn you receive:
- A screenshot of the current webpage
- The current URL

## Output Format
Think step by step, then output your action:

<reasoning>
[Your thinking about what to do next]
</reasoning>
Action: ActionName(arguments)

## Available Actions
- Click(x, y) - Click at coordinates
- Scroll(x, y, direction) - Scroll at position, direction is "up" or "down"
- Type(text) - Type text (click input field first)
- Press(key) - Press key: Enter, Tab, Escape, Backspace, etc.
- Wait() - Wait for page to load
- Finished() - Task complete
- CallUser(question) - Ask user for help

## Coordinate System
Coordinates are 0-1000 for both x and y:
- (0, 0) = top-left
- (1000, 1000) = bottom-right
- (500, 500) = center

## Examples
<reasoning>
I see a search page. I need to click the search box to type my query.
</reasoning>
Action: Click(500, 400)

<reasoning>
The search box is focused. I'll type my search query.
</reasoning>
Action: Type(flights to Paris)

<reasoning>
Query typed. I'll press Enter to search.
</reasoning>
Action: Press(Enter)

<reasoning>
I need login credentials. I'll ask the user.
</reasoning>
Action: CallUser(What are the login credentials?)"#;

/// A message in the conversation sent to the LLM, in chat-completions shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System { content: String },
    User { content: Vec<ContentPart> },
    Assistant { content: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Message::System {
            content: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Message::Assistant {
            content: text.into(),
        }
    }

    /// A user message carrying a single text part.
    pub fn user_text(text: impl Into<String>) -> Self {
        Message::User {
            content: vec![ContentPart::text(text)],
        }
    }

    pub fn has_image(&self) -> bool {
        match self {
            Message::User { content } => content.iter().any(ContentPart::is_image),
            _ => false,
        }
    }
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn png(bytes: &[u8]) -> Self {
        ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: format!("data:image/png;base64,{}", STANDARD.encode(bytes)),
            },
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, ContentPart::ImageUrl { .. })
    }
}

impl ImageUrl {
    /// Raw bytes of a base64 data URI, if this is one.
    pub fn decode_data_uri(&self) -> Option<Vec<u8>> {
        let (_, payload) = self.url.split_once(";base64,")?;
        STANDARD.decode(payload).ok()
    }
}

/// Render the page state as the next user turn. Only the first turn of a run
/// carries the task.
pub fn build_turn_message(state: &BrowserState, task: Option<&str>) -> Message {
    let mut content = Vec::with_capacity(3);
    if let Some(task) = task {
        content.push(ContentPart::text(format!("Task: {task}")));
    }
    content.push(ContentPart::text(format!("Current URL: {}", state.url)));
    content.push(ContentPart::png(&state.screenshot));
    Message::User { content }
}

/// Copy of `conversation` in which only the last `max_images` image-bearing
/// user messages keep their image. Older ones keep their text parts and are
/// dropped only if nothing is left.
pub fn trim_images(conversation: &[Message], max_images: usize) -> Vec<Message> {
    let with_images = conversation.iter().filter(|m| m.has_image()).count();
    let mut to_strip = with_images.saturating_sub(max_images);

    let mut trimmed = Vec::with_capacity(conversation.len());
    for message in conversation {
        match message {
            Message::User { content } if to_strip > 0 && message.has_image() => {
                to_strip -= 1;
                let kept: Vec<ContentPart> =
                    content.iter().filter(|p| !p.is_image()).cloned().collect();
                if !kept.is_empty() {
                    trimmed.push(Message::User { content: kept });
                }
            }
            other => trimmed.push(other.clone()),
        }
    }
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(url: &str) -> BrowserState {
        BrowserState {
            screenshot: vec![0x89, b'P', b'N', b'G'],
            url: url.to_string(),
        }
    }

    fn texts(message: &Message) -> Vec<String> {
        match message {
            Message::User { content } => content
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.clone()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    fn sample(turns: usize) -> Vec<Message> {
        let mut conv = vec![Message::system("sys")];
        for i in 0..turns {
            let task = (i == 0).then_some("book a flight");
            conv.push(build_turn_message(&state(&format!("https://site/{i}")), task));
            conv.push(Message::assistant(format!("Action: Wait() #{i}")));
            conv.push(Message::user_text(format!("note {i}")));
        }
        conv
    }

    #[test]
    fn turn_message_with_task() {
        let message = build_turn_message(&state("https://a.test"), Some("book a flight"));
        let Message::User { content } = message else {
            panic!("expected user message");
        };
        assert_eq!(content.len(), 3);
        assert_eq!(content[0], ContentPart::text("Task: book a flight"));
        assert_eq!(content[1], ContentPart::text("Current URL: https://a.test"));
        let ContentPart::ImageUrl { image_url } = &content[2] else {
            panic!("expected image part");
        };
        assert!(image_url.url.starts_with("data:image/png;base64,"));
        assert_eq!(image_url.decode_data_uri().unwrap(), state("").screenshot);
    }

    #[test]
    fn turn_message_without_task() {
        let Message::User { content } = build_turn_message(&state("https://a.test"), None) else {
            panic!("expected user message");
        };
        assert_eq!(content.len(), 2);
        assert_eq!(content[0], ContentPart::text("Current URL: https://a.test"));
        assert!(content[1].is_image());
    }

    #[test]
    fn trim_under_budget_is_unchanged() {
        let conv = sample(2);
        assert_eq!(trim_images(&conv, 2), conv);
        assert_eq!(trim_images(&conv, 5), conv);
    }

    #[test]
    fn trim_keeps_latest_images_and_all_text() {
        let conv = sample(4);
        let trimmed = trim_images(&conv, 1);

        assert_eq!(trimmed.len(), conv.len());
        assert_eq!(trimmed.iter().filter(|m| m.has_image()).count(), 1);
        assert!(trimmed[10].has_image());
        assert_eq!(texts(&trimmed[10]), texts(&conv[10]));
        for (before, after) in conv.iter().zip(&trimmed) {
            assert_eq!(texts(before), texts(after));
        }
        assert_eq!(
            texts(&trimmed[1]),
            vec!["Task: book a flight", "Current URL: https://site/0"]
        );
    }

    #[test]
    fn trim_to_zero_strips_every_image() {
        let trimmed = trim_images(&sample(3), 0);
        assert!(trimmed.iter().all(|m| !m.has_image()));
        assert_eq!(trimmed.len(), sample(3).len());
    }

    #[test]
    fn trim_drops_messages_left_empty() {
        let conv = vec![
            Message::system("sys"),
            Message::User {
                content: vec![ContentPart::png(b"old")],
            },
            Message::assistant("Action: Wait()"),
            Message::User {
                content: vec![ContentPart::png(b"new")],
            },
        ];
        let trimmed = trim_images(&conv, 1);
        assert_eq!(
            trimmed,
            vec![conv[0].clone(), conv[2].clone(), conv[3].clone()]
        );
    }

    #[test]
    fn trim_is_idempotent() {
        let conv = sample(5);
        for k in 0..7 {
            let once = trim_images(&conv, k);
            assert_eq!(trim_images(&once, k), once);
            assert_eq!(once.iter().filter(|m| m.has_image()).count(), k.min(5));
        }
    }

    #[test]
    fn serializes_in_chat_completions_shape() {
        let value = serde_json::to_value(build_turn_message(&state("u"), None)).unwrap();
        assert_eq!(value["role"], "user");
        assert_eq!(value["content"][0]["type"], "text");
        assert_eq!(value["content"][1]["type"], "image_url");
        assert!(value["content"][1]["image_url"]["url"].is_string());

        let value = serde_json::to_value(Message::system("hi")).unwrap();
        assert_eq!(value, serde_json::json!({"role": "system", "content": "hi"}));
    }
}
