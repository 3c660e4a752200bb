use serde_json::{Value, json};
use std::fmt;

/// Upper bound of the resolution-independent coordinate space.
pub const COORDINATE_MAX: i32 = 1000;

pub const DEFAULT_MAX_STEPS: usize = 10;
pub const DEFAULT_MAX_IMAGES: usize = 1;
pub const DEFAULT_START_URL: &str = "https://www.amazon.com/";
pub const DEFAULT_SETTLE_MS: u64 = 3000;
pub const DEFAULT_WAIT_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
}

impl ScrollDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            ScrollDirection::Up => "up",
            ScrollDirection::Down => "down",
        }
    }
}

impl fmt::Display for ScrollDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single action the model asks the agent to perform.
///
/// `Error` never comes from the model directly: the loop records it when a
/// reply could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Click { x: i32, y: i32 },
    Scroll { x: i32, y: i32, direction: ScrollDirection },
    Type { content: String },
    Press { key: String },
    Wait,
    Finished,
    CallUser { question: String },
    Error { message: String },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Click { .. } => "Click",
            Action::Scroll { .. } => "Scroll",
            Action::Type { .. } => "Type",
            Action::Press { .. } => "Press",
            Action::Wait => "Wait",
            Action::Finished => "Finished",
            Action::CallUser { .. } => "CallUser",
            Action::Error { .. } => "Error",
        }
    }

    /// Arguments as a JSON object, keyed the way the run summary stores them.
    pub fn args(&self) -> Value {
        match self {
            Action::Click { x, y } => json!({ "x": x, "y": y }),
            Action::Scroll { x, y, direction } => {
                json!({ "x": x, "y": y, "direction": direction.as_str() })
            }
            Action::Type { content } => json!({ "content": content }),
            Action::Press { key } => json!({ "key": key }),
            Action::CallUser { question } => json!({ "question": question }),
            Action::Wait | Action::Finished | Action::Error { .. } => json!({}),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Click { x, y } => write!(f, "Click({x}, {y})"),
            Action::Scroll { x, y, direction } => write!(f, "Scroll({x}, {y}, {direction})"),
            Action::Type { content } => write!(f, "Type({content})"),
            Action::Press { key } => write!(f, "Press({key})"),
            Action::Wait => f.write_str("Wait()"),
            Action::Finished => f.write_str("Finished()"),
            Action::CallUser { question } => write!(f, "CallUser({question})"),
            Action::Error { message } => write!(f, "Error({message})"),
        }
    }
}

/// What the agent observes of the page: a PNG screenshot and the current URL.
#[derive(Clone, PartialEq, Eq)]
pub struct BrowserState {
    pub screenshot: Vec<u8>,
    pub url: String,
}

impl fmt::Debug for BrowserState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrowserState")
            .field("screenshot", &format_args!("<{} bytes>", self.screenshot.len()))
            .field("url", &self.url)
            .finish()
    }
}

/// One completed turn of a run.
#[derive(Debug, Clone)]
pub struct Step {
    /// Page state the model was looking at when it replied.
    pub state: BrowserState,
    /// Raw model reply, reasoning included.
    pub response: String,
    pub action: Action,
    /// Set when the browser rejected an otherwise valid action.
    pub execution_error: Option<String>,
}

impl Step {
    pub fn error(&self) -> Option<&str> {
        match &self.action {
            Action::Error { message } => Some(message),
            _ => self.execution_error.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The model declared the task finished.
    Finished,
    /// The step budget ran out first.
    Exhausted,
}

/// The ordered trace of a run and how it ended.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub steps: Vec<Step>,
    pub outcome: RunOutcome,
}
