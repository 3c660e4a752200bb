//! A web navigation agent: a vision model looks at screenshots, replies with
//! `Action: Name(args)`, and the agent carries that out in Chrome.

pub mod agent;
pub mod brain;
pub mod conversation;
pub mod executor;
pub mod hands;
pub mod human;
pub mod manual;
pub mod parser;
pub mod recorder;
pub mod types;

pub use agent::{AgentConfig, AgentError, WebNavAgent};
pub use brain::{ChatClient, LlmClient, LlmConfig};
pub use conversation::{Message, build_turn_message, trim_images};
pub use hands::{BrowserConfig, BrowserController, ChromeBrowser};
pub use human::{HumanInput, StdinHuman};
pub use parser::{ParseError, parse_action};
pub use recorder::save_run;
pub use types::{Action, BrowserState, RunOutcome, RunReport, ScrollDirection, Step};
