use std::time::Duration;
use tracing::warn;

use crate::hands::BrowserController;
use crate::types::Action;

/// Run one browser-facing action. Failures come back as text for the model
/// instead of ending the run. `Finished`, `CallUser` and `Error` are the
/// loop's business and do nothing here.
pub async fn execute_action<B>(action: &Action, browser: &mut B, wait: Duration) -> Option<String>
where
    B: BrowserController + ?Sized,
{
    let result = match action {
        Action::Click { x, y } => browser.click(*x, *y).await,
        Action::Scroll { x, y, direction } => browser.scroll(*x, *y, *direction).await,
        Action::Type { content } => browser.type_text(content).await,
        Action::Press { key } => browser.press_key(key).await,
        Action::Wait => browser.wait(wait).await,
        Action::Finished | Action::CallUser { .. } | Action::Error { .. } => Ok(()),
    };

    result.err().map(|e| {
        warn!("{} failed: {:#}", action, e);
        format!("Action execution failed: {:#}", e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BrowserState, ScrollDirection};
    use anyhow::{Result, bail};
    use async_trait::async_trait;

    #[derive(Default)]
    struct Recording {
        calls: Vec<String>,
        fail: bool,
    }

    #[async_trait]
    impl BrowserController for Recording {
        async fn start(&mut self, url: &str) -> Result<BrowserState> {
            self.calls.push(format!("start {url}"));
            self.state().await
        }
        async fn state(&mut self) -> Result<BrowserState> {
            Ok(BrowserState {
                screenshot: Vec::new(),
                url: "about:blank".into(),
            })
        }
        async fn click(&mut self, x: i32, y: i32) -> Result<()> {
            if self.fail {
                bail!("element detached");
            }
            self.calls.push(format!("click {x} {y}"));
            Ok(())
        }
        async fn scroll(&mut self, x: i32, y: i32, direction: ScrollDirection) -> Result<()> {
            self.calls.push(format!("scroll {x} {y} {direction}"));
            Ok(())
        }
        async fn type_text(&mut self, content: &str) -> Result<()> {
            self.calls.push(format!("type {content}"));
            Ok(())
        }
        async fn press_key(&mut self, key: &str) -> Result<()> {
            self.calls.push(format!("press {key}"));
            Ok(())
        }
        async fn wait(&mut self, duration: Duration) -> Result<()> {
            self.calls.push(format!("wait {}", duration.as_millis()));
            Ok(())
        }
        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn dispatches_each_browser_action() {
        let mut browser = Recording::default();
        let wait = Duration::from_millis(1000);
        let actions = [
            Action::Click { x: 1, y: 2 },
            Action::Scroll {
                x: 3,
                y: 4,
                direction: ScrollDirection::Down,
            },
            Action::Type {
                content: "a, b".into(),
            },
            Action::Press { key: "Enter".into() },
            Action::Wait,
            Action::Finished,
            Action::CallUser {
                question: "?".into(),
            },
        ];
        for action in &actions {
            assert_eq!(execute_action(action, &mut browser, wait).await, None);
        }
        assert_eq!(
            browser.calls,
            vec![
                "click 1 2",
                "scroll 3 4 down",
                "type a, b",
                "press Enter",
                "wait 1000"
            ]
        );
    }

    #[tokio::test]
    async fn failures_become_feedback() {
        let mut browser = Recording {
            fail: true,
            ..Default::default()
        };
        let error = execute_action(&Action::Click { x: 5, y: 5 }, &mut browser, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(error, "Action execution failed: element detached");
    }
}
