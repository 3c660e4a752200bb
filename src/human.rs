use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::io::{BufRead, Write};

/// Where `CallUser` questions go. Blocks the run until a reply arrives.
#[async_trait]
pub trait HumanInput: Send + Sync {
    async fn ask(&self, prompt: &str) -> Result<String>;
}

/// Prompts on stdout and reads one line from stdin.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinHuman;

#[async_trait]
impl HumanInput for StdinHuman {
    async fn ask(&self, prompt: &str) -> Result<String> {
        let prompt = prompt.to_string();
        tokio::task::spawn_blocking(move || read_reply(&prompt))
            .await
            .map_err(|e| anyhow!("stdin reader panicked: {}", e))?
    }
}

/// Print `prompt` and read a single line, without the trailing newline.
pub fn read_reply(prompt: &str) -> Result<String> {
    let mut stdout = std::io::stdout().lock();
    write!(stdout, "{prompt}")?;
    stdout.flush()?;

    let mut line = String::new();
    if std::io::stdin().lock().read_line(&mut line)? == 0 {
        return Err(anyhow!("stdin closed while waiting for a reply"));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
