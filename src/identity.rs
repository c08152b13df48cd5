//! Access tokens and the signed-in user.
//!
//! Tokens come from, in order:
//! - `AZURE_ACCESS_TOKEN` environment variable (CI, pre-minted tokens)
//! - The Azure CLI (`az account get-access-token`)
//!
//! [`current_user_email`] asks Microsoft Graph who the token belongs to.

use serde::Deserialize;
use std::io::Read;
use std::process::{Command, Stdio};
use std::time::Duration;
use thiserror::Error;
use wait_timeout::ChildExt;

/// Environment variable holding a ready-made bearer token.
pub const ACCESS_TOKEN_ENV: &str = "AZURE_ACCESS_TOKEN";

/// Token audience for Key Vault data-plane calls.
pub const KEY_VAULT_RESOURCE: &str = "https://vault.azure.net";

/// Token audience for Microsoft Graph.
pub const GRAPH_RESOURCE: &str = "https://graph.microsoft.com";

const GRAPH_ME_URL: &str = "https://graph.microsoft.com/v1.0/me";

/// How long `az` may take before it is killed.
const AZ_CLI_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur while obtaining a token or the current user.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// No provider in the chain produced a token
    #[error("No credential available: {0}")]
    Unavailable(String),

    /// The Azure CLI ran but failed
    #[error("Azure CLI failed: {0}")]
    AzureCli(String),

    /// The Azure CLI did not answer in time
    #[error("Azure CLI timed out after {0} seconds")]
    Timeout(u64),

    /// Token rejected by Graph (401)
    #[error("Invalid or expired token: Microsoft Graph returned 401 Unauthorized")]
    Unauthorized,

    /// Network or other HTTP error
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Failed to parse a response
    #[error("Failed to parse response: {0}")]
    Parse(String),
}

/// Something that can mint bearer tokens for a resource.
pub trait TokenProvider: Send + Sync {
    fn token(&self, resource: &str) -> Result<String, CredentialError>;

    /// Short provider name for logs.
    fn name(&self) -> &'static str;
}

/// Reads a token from [`ACCESS_TOKEN_ENV`].
#[derive(Debug, Default)]
pub struct EnvTokenProvider;

impl TokenProvider for EnvTokenProvider {
    fn token(&self, _resource: &str) -> Result<String, CredentialError> {
        std::env::var(ACCESS_TOKEN_ENV)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| CredentialError::Unavailable(format!("{} is not set", ACCESS_TOKEN_ENV)))
    }

    fn name(&self) -> &'static str {
        "env"
    }
}

/// Response from `az account get-access-token` (only fields we care about).
#[derive(Debug, Deserialize)]
struct AzCliToken {
    #[serde(rename = "accessToken")]
    access_token: String,
}

/// Mints tokens by shelling out to the Azure CLI.
#[derive(Debug, Default)]
pub struct AzureCliProvider;

impl TokenProvider for AzureCliProvider {
    fn token(&self, resource: &str) -> Result<String, CredentialError> {
        let mut child = Command::new("az")
            .args([
                "account",
                "get-access-token",
                "--resource",
                resource,
                "--output",
                "json",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CredentialError::Unavailable(format!("could not run az: {}", e)))?;

        let status = match child
            .wait_timeout(AZ_CLI_TIMEOUT)
            .map_err(|e| CredentialError::AzureCli(e.to_string()))?
        {
            Some(status) => status,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(CredentialError::Timeout(AZ_CLI_TIMEOUT.as_secs()));
            }
        };

        let mut stdout = String::new();
        let mut stderr = String::new();
        if let Some(mut out) = child.stdout.take() {
            out.read_to_string(&mut stdout)
                .map_err(|e| CredentialError::AzureCli(e.to_string()))?;
        }
        if let Some(mut err) = child.stderr.take() {
            let _ = err.read_to_string(&mut stderr);
        }

        if !status.success() {
            return Err(CredentialError::AzureCli(stderr.trim().to_string()));
        }
        parse_az_token(&stdout)
    }

    fn name(&self) -> &'static str {
        "azure-cli"
    }
}

fn parse_az_token(stdout: &str) -> Result<String, CredentialError> {
    let token: AzCliToken =
        serde_json::from_str(stdout).map_err(|e| CredentialError::Parse(e.to_string()))?;
    Ok(token.access_token)
}

/// Tries each provider in order and returns the first token.
pub struct DefaultCredential {
    providers: Vec<Box<dyn TokenProvider>>,
}

impl DefaultCredential {
    pub fn new() -> Self {
        Self {
            providers: vec![Box::new(EnvTokenProvider), Box::new(AzureCliProvider)],
        }
    }

    /// Build a chain from explicit providers.
    pub fn with_providers(providers: Vec<Box<dyn TokenProvider>>) -> Self {
        Self { providers }
    }
}

impl Default for DefaultCredential {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenProvider for DefaultCredential {
    fn token(&self, resource: &str) -> Result<String, CredentialError> {
        let mut failures = Vec::new();
        for provider in &self.providers {
            match provider.token(resource) {
                Ok(token) => {
                    tracing::debug!(provider = provider.name(), "obtained access token");
                    return Ok(token);
                }
                Err(e) => failures.push(format!("{}: {}", provider.name(), e)),
            }
        }
        Err(CredentialError::Unavailable(failures.join("; ")))
    }

    fn name(&self) -> &'static str {
        "default"
    }
}

/// Response from Graph GET /me (only fields we care about).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphUser {
    pub mail: Option<String>,
    pub user_principal_name: Option<String>,
}

impl GraphUser {
    /// Mail address, falling back to the principal name.
    pub fn email(&self) -> Option<&str> {
        self.mail
            .as_deref()
            .or(self.user_principal_name.as_deref())
    }
}

/// Look up the email of the user the credential belongs to.
pub fn current_user_email(credential: &dyn TokenProvider) -> Result<String, CredentialError> {
    let token = credential.token(GRAPH_RESOURCE)?;

    let response = ureq::get(GRAPH_ME_URL)
        .set("Authorization", &format!("Bearer {}", token))
        .set("Accept", "application/json")
        .call();

    match response {
        Ok(resp) => {
            let user: GraphUser = resp
                .into_json()
                .map_err(|e| CredentialError::Parse(e.to_string()))?;
            user.email()
                .map(str::to_string)
                .ok_or_else(|| CredentialError::Parse("user has no mail or principal name".into()))
        }
        Err(ureq::Error::Status(401, _)) => Err(CredentialError::Unauthorized),
        Err(ureq::Error::Status(code, resp)) => {
            let body = resp.into_string().unwrap_or_default();
            Err(CredentialError::Http(format!("HTTP {}: {}", code, body)))
        }
        Err(e) => Err(CredentialError::Http(e.to_string())),
    }
}
