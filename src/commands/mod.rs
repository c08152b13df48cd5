//! Command implementations for the vaultenv CLI.
//!
//! Each command loads its settings, does its work through the library and
//! returns a result value that `main` prints as JSON or human text:
//! - `sync` - Ask, resolve and write the env file
//! - `plan` - Show the query plan for the current config
//! - `whoami` - Show the signed-in user

use crate::cli::RunArgs;
use crate::config::{
    ProjectConfig, Resolved, ResolvedSettings, UserConfig, ValueSource, resolve_settings,
};
use crate::engine::{self, RunOptions, Strategy};
use crate::envfile::EnvFile;
use crate::identity::{self, DefaultCredential, TokenProvider};
use crate::models::Query;
use crate::prompt::{PromptRequest, Prompter, TerminalPrompter};
use crate::vault::{KeyVaultClient, SecretStore};
use crate::{Error, Result};
use serde::Serialize;
use std::path::Path;

/// Command results that can be serialized to JSON or formatted for humans.
pub trait Output {
    /// Serialize to JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

/// Opens the store for a vault name or URL.
pub type Connect<'a> = &'a dyn Fn(&str) -> Box<dyn SecretStore>;

/// Key Vault client authenticated with the default credential chain.
///
/// Logs who the credential belongs to before the vault is used.
pub fn connect_key_vault(vault: &str) -> Box<dyn SecretStore> {
    let credential = DefaultCredential::new();
    announce_user(&credential);
    Box::new(KeyVaultClient::new(vault, Box::new(credential)))
}

/// Log the signed-in user's email. A failed lookup is only logged.
fn announce_user(credential: &dyn TokenProvider) -> Option<String> {
    match identity::current_user_email(credential) {
        Ok(email) => {
            tracing::info!(email = %email, "current user");
            Some(email)
        }
        Err(e) => {
            tracing::warn!(error = %e, "could not look up the signed-in user");
            None
        }
    }
}

/// Project config plus resolved settings for one invocation.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub project: ProjectConfig,
    pub settings: ResolvedSettings,
}

impl RunContext {
    /// Load the project config named by `--config` (if any) and resolve settings.
    pub fn load(args: &RunArgs, user: &UserConfig) -> Result<Self> {
        let project = match &args.config {
            Some(path) => ProjectConfig::load(path)?,
            None => ProjectConfig::default(),
        };
        let settings = resolve_settings(&project, user, &args.overrides());
        tracing::debug!(
            env_file = %settings.env_file.value.display(),
            env_file_source = %settings.env_file.source,
            mode = %settings.mode.value,
            case = %settings.case.value,
            concurrency = settings.concurrency.value,
            "resolved settings"
        );
        Ok(Self { project, settings })
    }

    fn strategy(&self) -> Strategy {
        Strategy::new(self.project.schema.clone(), self.project.inputs.clone())
    }

    fn run_options(&self, recreate: bool) -> RunOptions {
        RunOptions {
            recreate,
            mode: self.settings.mode.value,
            case: self.settings.case.value,
            concurrency: self.settings.concurrency.value,
        }
    }
}

// === Sync ===

#[derive(Serialize)]
pub struct SyncResult {
    pub env_file: String,
    pub written: usize,
    pub missing: Vec<String>,
}

impl Output for SyncResult {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "Wrote {} value{} to {}",
            self.written,
            if self.written == 1 { "" } else { "s" },
            self.env_file
        )];
        if !self.missing.is_empty() {
            lines.push(format!(
                "{} key{} could not be resolved:",
                self.missing.len(),
                if self.missing.len() == 1 { "" } else { "s" }
            ));
            for key in &self.missing {
                lines.push(format!("  {}", key));
            }
        }
        lines.join("\n")
    }
}

/// Ask, resolve and write the env file, interactively against Key Vault.
pub fn sync(args: &RunArgs) -> Result<SyncResult> {
    let user = UserConfig::load()?;
    let mut prompter = TerminalPrompter::new();
    sync_with(args, &user, &mut prompter, &connect_key_vault)
}

/// [`sync`] with explicit collaborators.
pub fn sync_with(
    args: &RunArgs,
    user: &UserConfig,
    prompter: &mut dyn Prompter,
    connect: Connect<'_>,
) -> Result<SyncResult> {
    let ctx = RunContext::load(args, user)?;
    let path = ctx.settings.env_file.value.clone();

    if let Some(literal) = ctx.project.literal_env() {
        literal.write(&path)?;
        tracing::info!(path = %path.display(), count = literal.len(), "wrote literal values from config");
        return Ok(sync_result(&path, literal.len(), Vec::new()));
    }

    let vault = match &ctx.settings.vault {
        Some(vault) => vault.clone(),
        None => ask_vault(prompter)?,
    };
    tracing::info!(vault = %vault.value, source = %vault.source, "using vault");
    let store = connect(&vault.value);

    let prior = EnvFile::read(&path)?;
    let outcome = engine::run(
        &ctx.strategy(),
        &prior,
        store.as_ref(),
        prompter,
        &ctx.run_options(args.recreate),
    )?;
    outcome.output.write(&path)?;
    tracing::info!(
        path = %path.display(),
        count = outcome.output.len(),
        missing = outcome.missing.len(),
        "wrote env file"
    );

    Ok(sync_result(&path, outcome.output.len(), outcome.missing))
}

fn sync_result(path: &Path, written: usize, missing: Vec<String>) -> SyncResult {
    SyncResult {
        env_file: path.display().to_string(),
        written,
        missing,
    }
}

/// Ask for the vault when no setting names one.
fn ask_vault(prompter: &mut dyn Prompter) -> Result<Resolved<String>> {
    let answer = prompter.ask(&PromptRequest::input("Enter your Azure Key Vault name:"))?;
    let answer = answer.trim();
    if answer.is_empty() {
        return Err(Error::ConfigValidation("no Key Vault name given".to_string()));
    }
    Ok(Resolved::new(answer.to_string(), ValueSource::Prompt))
}

// === Plan ===

#[derive(Serialize)]
pub struct PlanResult {
    pub strategy: String,
    pub mode: String,
    pub env_file: String,
    pub queries: Vec<Query>,
    pub keys: Vec<String>,
}

impl Output for PlanResult {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "{} quer{} ({} schema, {} mode) -> {}",
            self.queries.len(),
            if self.queries.len() == 1 { "y" } else { "ies" },
            self.strategy,
            self.mode,
            self.env_file
        )];
        for query in &self.queries {
            let detail = match query {
                Query::Group { keys, choices, .. } => {
                    format!("{} -> {}", choices.join(" | "), keys.join(", "))
                }
                Query::Individual {
                    choices: Some(choices),
                    ..
                } => choices.join(" | "),
                Query::Individual { sensitive, .. } => {
                    if *sensitive {
                        "(free-form, masked)".to_string()
                    } else {
                        "(free-form)".to_string()
                    }
                }
                Query::Multi { choices, .. } => format!("any of {}", choices.join(", ")),
            };
            lines.push(format!("  {}: {}", query.label(), detail));
        }
        lines.join("\n")
    }
}

/// Show the query plan for the current config.
pub fn plan(args: &RunArgs) -> Result<PlanResult> {
    let user = UserConfig::load()?;
    plan_with(args, &user, &connect_key_vault)
}

/// [`plan`] with an explicit store connector.
///
/// A declared schema or an `inputs` list never touches the store; discovery
/// needs a vault setting because `plan` does not prompt.
pub fn plan_with(args: &RunArgs, user: &UserConfig, connect: Connect<'_>) -> Result<PlanResult> {
    let ctx = RunContext::load(args, user)?;
    let strategy = ctx.strategy();

    let store = match (strategy.needs_store(), ctx.settings.vault()) {
        (false, _) => None,
        (true, Some(vault)) => Some(connect(vault)),
        (true, None) => {
            return Err(Error::ConfigValidation(
                "discovering a schema needs a vault: pass --vault or set AZURE_SERVER".to_string(),
            ));
        }
    };

    let planned = engine::build_plan(
        &strategy,
        store.as_deref(),
        ctx.settings.concurrency.value,
    )?;

    Ok(PlanResult {
        strategy: strategy.as_str().to_string(),
        mode: ctx.settings.mode.value.to_string(),
        env_file: ctx.settings.env_file.value.display().to_string(),
        keys: planned.plan.keys(),
        queries: planned.plan.queries().to_vec(),
    })
}

// === Whoami ===

#[derive(Serialize)]
pub struct WhoamiResult {
    pub email: String,
}

impl Output for WhoamiResult {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn to_human(&self) -> String {
        format!("Signed in as {}", self.email)
    }
}

/// Show the signed-in user's email.
pub fn whoami() -> Result<WhoamiResult> {
    let email = identity::current_user_email(&DefaultCredential::new())?;
    Ok(WhoamiResult { email })
}
