//! Interactive prompting.
//!
//! The pipeline talks to the terminal only through [`Prompter`], so tests can
//! drive it with canned answers.

use crate::{Error, Result};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, MultiSelect, Password, Select};

/// One question for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    pub message: String,
    /// Pick-one choices; `None` asks for typed input
    pub choices: Option<Vec<String>>,
    /// Pre-selected choice or pre-filled input
    pub default: Option<String>,
    /// Hide typed input
    pub sensitive: bool,
}

impl PromptRequest {
    pub fn input(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            choices: None,
            default: None,
            sensitive: false,
        }
    }

    pub fn select(message: impl Into<String>, choices: Vec<String>) -> Self {
        Self {
            choices: Some(choices),
            ..Self::input(message)
        }
    }

    pub fn with_default(mut self, default: Option<String>) -> Self {
        self.default = default;
        self
    }

    pub fn sensitive(mut self, sensitive: bool) -> Self {
        self.sensitive = sensitive;
        self
    }
}

/// Something that can ask the user questions.
///
/// Implementations never retry: a failure is returned as-is and ends the run.
pub trait Prompter {
    /// Ask one question and return the chosen or typed value.
    fn ask(&mut self, request: &PromptRequest) -> Result<String>;

    /// Let the user tick any number of `items`; returns the ticked indices.
    fn select_many(&mut self, message: &str, items: &[String]) -> Result<Vec<usize>>;
}

/// Terminal prompter backed by `dialoguer`.
pub struct TerminalPrompter {
    theme: ColorfulTheme,
}

impl TerminalPrompter {
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }
}

impl Default for TerminalPrompter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TerminalPrompter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalPrompter").finish()
    }
}

fn prompt_error(e: dialoguer::Error) -> Error {
    Error::Prompt(e.to_string())
}

impl Prompter for TerminalPrompter {
    fn ask(&mut self, request: &PromptRequest) -> Result<String> {
        if let Some(choices) = &request.choices {
            let mut select = Select::with_theme(&self.theme)
                .with_prompt(&request.message)
                .items(choices);
            if let Some(index) = request
                .default
                .as_ref()
                .and_then(|d| choices.iter().position(|c| c == d))
            {
                select = select.default(index);
            }
            let index = select.interact().map_err(prompt_error)?;
            return Ok(choices[index].clone());
        }

        if request.sensitive {
            let typed = Password::with_theme(&self.theme)
                .with_prompt(&request.message)
                .allow_empty_password(true)
                .interact()
                .map_err(prompt_error)?;
            // Empty input keeps the hidden default
            return Ok(match (&request.default, typed.is_empty()) {
                (Some(default), true) => default.clone(),
                _ => typed,
            });
        }

        let mut input = Input::<String>::with_theme(&self.theme)
            .with_prompt(&request.message)
            .allow_empty(true);
        if let Some(default) = &request.default {
            input = input.default(default.clone());
        }
        input.interact_text().map_err(prompt_error)
    }

    fn select_many(&mut self, message: &str, items: &[String]) -> Result<Vec<usize>> {
        MultiSelect::with_theme(&self.theme)
            .with_prompt(message)
            .items(items)
            .interact()
            .map_err(prompt_error)
    }
}
