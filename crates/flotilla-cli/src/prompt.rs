//! Terminal confirmation for destructive steps.
//!
//! Uses dialoguer for the prompt.

use anyhow::Result;
use console::style;
use dialoguer::{Confirm, theme::ColorfulTheme};

use flotilla_core::deploy::Confirmer;

#[derive(Default)]
pub struct TerminalConfirmer {
    theme: ColorfulTheme,
}

impl TerminalConfirmer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Confirmer for TerminalConfirmer {
    fn confirm(&self, prompt: &str) -> Result<bool> {
        let confirmed = Confirm::with_theme(&self.theme)
            .with_prompt(style(prompt).yellow().to_string())
            .default(false)
            .interact()?;
        Ok(confirmed)
    }
}
