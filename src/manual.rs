//! Lets a person stand in for the model: the latest screenshot is written to
//! disk, the transcript is printed, and the next action is read from stdin.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use std::fmt::Write as _;
use std::path::PathBuf;
use tracing::info;

use crate::brain::LlmClient;
use crate::conversation::{ContentPart, Message};
use crate::human::read_reply;

const ACTION_HELP: &str = "\
Actions:
  Click(x, y)              - Click at coordinates
  Type(text)               - Type text
  Scroll(x, y, up/down)    - Scroll at position
  Press(Enter/Tab/...)     - Press key
  Wait()                   - Wait for page load
  Finished()               - Task complete
  CallUser(question)       - Ask user for help
";

pub struct ManualDriver {
    screenshot_path: PathBuf,
}

impl ManualDriver {
    /// Screenshots go to `<dir>/latest.png`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            screenshot_path: dir.into().join("latest.png"),
        }
    }

    fn save_latest_screenshot(&self, conversation: &[Message]) -> Result<bool> {
        let Some(bytes) = latest_image(conversation) else {
            return Ok(false);
        };
        if let Some(parent) = self.screenshot_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.screenshot_path, bytes)
            .with_context(|| format!("writing {}", self.screenshot_path.display()))?;
        Ok(true)
    }
}

#[async_trait]
impl LlmClient for ManualDriver {
    async fn complete(&self, conversation: &[Message]) -> Result<String> {
        if self.save_latest_screenshot(conversation)? {
            info!(
                "Latest screenshot: {} (coordinates are 0-1000 on both axes)",
                self.screenshot_path.display()
            );
        }

        let mut out = render_transcript(conversation);
        out.push('\n');
        out.push_str(ACTION_HELP);
        out.push_str("\nEnter action:\n");

        let line = tokio::task::spawn_blocking(move || read_reply(&out))
            .await
            .map_err(|e| anyhow!("stdin reader panicked: {}", e))??;
        Ok(as_action_line(&line))
    }
}

/// Screenshot from the most recent user turn that still carries one; text-only
/// turns such as error feedback are skipped.
fn latest_image(conversation: &[Message]) -> Option<Vec<u8>> {
    conversation.iter().rev().find_map(|m| match m {
        Message::User { content } => content.iter().find_map(|p| match p {
            ContentPart::ImageUrl { image_url } => image_url.decode_data_uri(),
            ContentPart::Text { .. } => None,
        }),
        _ => None,
    })
}

fn render_transcript(conversation: &[Message]) -> String {
    let rule = "=".repeat(60);
    let mut out = format!("\n{rule}\n");
    for message in conversation {
        match message {
            Message::System { content } => {
                let head: String = content.chars().take(100).collect();
                let _ = writeln!(out, "[SYSTEM] {head}...");
            }
            Message::Assistant { content } => {
                let _ = writeln!(out, "[ASSISTANT] {content}");
            }
            Message::User { content } => {
                for part in content {
                    match part {
                        ContentPart::Text { text } => {
                            let _ = writeln!(out, "[USER] {text}");
                        }
                        ContentPart::ImageUrl { .. } => out.push_str("[USER] [IMAGE]\n"),
                    }
                }
            }
        }
    }
    out.push_str(&rule);
    out.push('\n');
    out
}

fn as_action_line(line: &str) -> String {
    if line.starts_with("Action:") {
        line.to_string()
    } else {
        format!("Action: {line}")
    }
}
