use crate::domain::ports::Prompter;

/// Asks on the terminal; non-interactive runs get the default answer.
#[cfg(feature = "cli")]
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompter;

#[cfg(feature = "cli")]
impl Prompter for TerminalPrompter {
    fn confirm(&self, prompt: &str, default: bool) -> bool {
        use std::io::IsTerminal;

        if !std::io::stdin().is_terminal() {
            tracing::debug!("stdin is not a terminal, answering '{}' with {}", prompt, default);
            return default;
        }

        dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()
            .unwrap_or(default)
    }
}

/// Gives the same answer to every prompt.
#[derive(Debug, Clone, Copy)]
pub struct FixedPrompter {
    pub answer: bool,
}

impl FixedPrompter {
    pub fn new(answer: bool) -> Self {
        Self { answer }
    }
}

impl Prompter for FixedPrompter {
    fn confirm(&self, prompt: &str, _default: bool) -> bool {
        tracing::debug!("Answering '{}' with {}", prompt, self.answer);
        self.answer
    }
}
