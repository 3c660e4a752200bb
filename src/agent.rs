use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::brain::LlmClient;
use crate::conversation::{Message, SYSTEM_PROMPT, build_turn_message, trim_images};
use crate::executor::execute_action;
use crate::hands::BrowserController;
use crate::human::HumanInput;
use crate::parser::parse_action;
use crate::types::{
    Action, BrowserState, DEFAULT_MAX_IMAGES, DEFAULT_MAX_STEPS, DEFAULT_SETTLE_MS,
    DEFAULT_START_URL, DEFAULT_WAIT_MS, RunOutcome, RunReport, Step,
};

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Turn budget for one run.
    pub max_steps: usize,
    /// Screenshots kept in each request to the model.
    pub max_images: usize,
    pub start_url: String,
    /// Idle time after a successful action before the next screenshot.
    pub settle_delay: Duration,
    /// Duration of a `Wait()` action.
    pub wait_delay: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            max_images: DEFAULT_MAX_IMAGES,
            start_url: DEFAULT_START_URL.to_string(),
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_MS),
            wait_delay: Duration::from_millis(DEFAULT_WAIT_MS),
        }
    }
}

/// Errors that end a run. Bad model output and rejected actions are not
/// here: they are reported back to the model and the run continues.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("browser setup failed: {0:#}")]
    Setup(anyhow::Error),

    #[error("browser failed: {0:#}")]
    Browser(anyhow::Error),

    #[error("LLM call failed: {0:#}")]
    Llm(anyhow::Error),

    #[error("user input failed: {0:#}")]
    Human(anyhow::Error),
}

/// Where the loop goes after a turn has been recorded.
enum Next {
    Continue,
    Stop,
}

/// Drives a browser toward a task by asking the model for one action per turn.
pub struct WebNavAgent<L, H> {
    llm: L,
    human: H,
    config: AgentConfig,
}

impl<L: LlmClient, H: HumanInput> WebNavAgent<L, H> {
    pub fn new(llm: L, human: H, config: AgentConfig) -> Self {
        Self { llm, human, config }
    }

    /// Run `task` to completion or until the step budget runs out. The
    /// browser is started here and closed on every way out.
    pub async fn run<B>(&self, browser: &mut B, task: &str) -> Result<RunReport, AgentError>
    where
        B: BrowserController + ?Sized,
    {
        info!(task, start_url = %self.config.start_url, "Starting run");
        let started = browser.start(&self.config.start_url).await;

        let result = match started {
            Ok(state) => self.drive(browser, state, task).await,
            Err(e) => Err(AgentError::Setup(e)),
        };

        if let Err(e) = browser.close().await {
            warn!("Failed to close browser: {:#}", e);
        }
        result
    }

    async fn drive<B>(
        &self,
        browser: &mut B,
        mut state: BrowserState,
        task: &str,
    ) -> Result<RunReport, AgentError>
    where
        B: BrowserController + ?Sized,
    {
        let mut conversation = vec![
            Message::system(SYSTEM_PROMPT),
            build_turn_message(&state, Some(task)),
        ];
        let mut steps = Vec::new();

        for turn in 1..=self.config.max_steps {
            let request = trim_images(&conversation, self.config.max_images);
            info!(turn, "Asking the model for the next action...");
            let response = self
                .llm
                .complete(&request)
                .await
                .map_err(AgentError::Llm)?;
            conversation.push(Message::assistant(response.clone()));

            let action = match parse_action(&response) {
                Ok(action) => action,
                Err(e) => {
                    warn!(turn, "Unparsable reply: {}", e);
                    Action::Error {
                        message: e.to_string(),
                    }
                }
            };
            info!(turn, %action, "Model chose");

            let mut step = Step {
                state: state.clone(),
                response,
                action,
                execution_error: None,
            };
            let next = self
                .dispatch(browser, &mut step, &mut conversation, &mut state)
                .await?;
            steps.push(step);

            if let Next::Stop = next {
                info!(turn, "Task finished");
                return Ok(RunReport {
                    steps,
                    outcome: RunOutcome::Finished,
                });
            }
        }

        info!(max_steps = self.config.max_steps, "Step budget exhausted");
        Ok(RunReport {
            steps,
            outcome: RunOutcome::Exhausted,
        })
    }

    async fn dispatch<B>(
        &self,
        browser: &mut B,
        step: &mut Step,
        conversation: &mut Vec<Message>,
        state: &mut BrowserState,
    ) -> Result<Next, AgentError>
    where
        B: BrowserController + ?Sized,
    {
        match &step.action {
            Action::Error { message } => {
                conversation.push(Message::user_text(format!(
                    "Error: {message}\nPlease try again with a valid action."
                )));
                Ok(Next::Continue)
            }
            Action::Finished => Ok(Next::Stop),
            Action::CallUser { question } => {
                let reply = self
                    .human
                    .ask(&format!("Agent asks: {question}\nYour response: "))
                    .await
                    .map_err(AgentError::Human)?;
                conversation.push(Message::user_text(format!("User response: {reply}")));
                Ok(Next::Continue)
            }
            action => {
                if let Some(error) =
                    execute_action(action, browser, self.config.wait_delay).await
                {
                    conversation.push(Message::user_text(format!(
                        "Error: {error}\nPlease try a different action."
                    )));
                    step.execution_error = Some(error);
                    return Ok(Next::Continue);
                }

                browser
                    .wait(self.config.settle_delay)
                    .await
                    .map_err(AgentError::Browser)?;
                *state = browser.state().await.map_err(AgentError::Browser)?;
                conversation.push(build_turn_message(state, None));
                Ok(Next::Continue)
            }
        }
    }
}
