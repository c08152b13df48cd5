//! Azure Key Vault client.
//!
//! Talks to the data-plane REST API directly:
//! - `GET {vault}/secrets/{name}?api-version=7.4` reads the current version
//! - `GET {vault}/secrets?api-version=7.4` lists secrets, following `nextLink`

use super::{SecretProperties, SecretStore, StoreError};
use crate::identity::{KEY_VAULT_RESOURCE, TokenProvider};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Key Vault REST API version
const API_VERSION: &str = "7.4";

/// User-Agent header sent with every request
const USER_AGENT: &str = concat!("vaultenv/", env!("CARGO_PKG_VERSION"));

/// Build a vault URL from a vault name, or normalize an explicit URL.
///
/// `my-vault` becomes `https://my-vault.vault.azure.net`; anything starting with
/// a scheme is kept (minus a trailing slash).
pub fn vault_url(name_or_url: &str) -> String {
    let trimmed = name_or_url.trim();
    if trimmed.starts_with("https://") || trimmed.starts_with("http://") {
        trimmed.trim_end_matches('/').to_string()
    } else {
        format!("https://{}.vault.azure.net", trimmed)
    }
}

/// Response from GET /secrets/{name} (only fields we care about).
#[derive(Debug, Deserialize)]
struct SecretBundle {
    value: Option<String>,
}

/// One item of a secret listing page.
#[derive(Debug, Deserialize)]
struct SecretItem {
    id: String,
    #[serde(default)]
    tags: Option<BTreeMap<String, String>>,
}

/// A page of the secret listing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SecretListPage {
    #[serde(default)]
    value: Vec<SecretItem>,
    next_link: Option<String>,
}

/// Blocking Key Vault client.
pub struct KeyVaultClient {
    base_url: String,
    credential: Box<dyn TokenProvider>,
    /// Outcome of the first token request, reused for the rest of the run
    token: Mutex<Option<Result<String, String>>>,
}

impl KeyVaultClient {
    pub fn new(vault: &str, credential: Box<dyn TokenProvider>) -> Self {
        Self {
            base_url: vault_url(vault),
            credential,
            token: Mutex::new(None),
        }
    }

    /// The credential is asked once per client; a failure is remembered too.
    fn bearer(&self) -> Result<String, StoreError> {
        let mut cached = self.token.lock().unwrap_or_else(|p| p.into_inner());
        let outcome = cached.get_or_insert_with(|| {
            self.credential
                .token(KEY_VAULT_RESOURCE)
                .map_err(|e| e.to_string())
        });
        outcome.clone().map_err(StoreError::Credential)
    }

    /// Authenticated GET; `name` is the secret a 404 refers to, if any.
    fn get(&self, url: &str, name: Option<&str>) -> Result<ureq::Response, StoreError> {
        let token = self.bearer()?;
        let response = ureq::get(url)
            .set("Authorization", &format!("Bearer {}", token))
            .set("Accept", "application/json")
            .set("User-Agent", USER_AGENT)
            .call();

        match response {
            Ok(resp) => Ok(resp),
            Err(ureq::Error::Status(code, resp)) => Err(status_error(code, resp, name)),
            Err(e) => Err(StoreError::Http(e.to_string())),
        }
    }
}

impl std::fmt::Debug for KeyVaultClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyVaultClient")
            .field("base_url", &self.base_url)
            .field("credential", &self.credential.name())
            .finish()
    }
}

/// Map a non-success HTTP status to a store error.
fn status_error(code: u16, resp: ureq::Response, name: Option<&str>) -> StoreError {
    let body = resp.into_string().unwrap_or_default();
    match (code, name) {
        (404, Some(name)) => StoreError::NotFound(name.to_string()),
        (401, _) => StoreError::Unauthorized,
        (403, _) => StoreError::Forbidden(body),
        _ => StoreError::Http(format!("HTTP {}: {}", code, body)),
    }
}

/// Secret name from a secret id URL (`.../secrets/{name}[/{version}]`).
fn name_from_id(id: &str) -> Option<String> {
    let (_, rest) = id.split_once("/secrets/")?;
    rest.split('/')
        .next()
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

impl SecretStore for KeyVaultClient {
    fn get_secret(&self, name: &str) -> Result<String, StoreError> {
        let url = format!(
            "{}/secrets/{}?api-version={}",
            self.base_url,
            urlencoding::encode(name),
            API_VERSION
        );

        let bundle: SecretBundle = self
            .get(&url, Some(name))?
            .into_json()
            .map_err(|e| StoreError::Parse(e.to_string()))?;
        Ok(bundle.value.unwrap_or_default())
    }

    fn list_secrets(&self) -> Result<Vec<SecretProperties>, StoreError> {
        let mut secrets = Vec::new();
        let mut next = Some(format!(
            "{}/secrets?api-version={}",
            self.base_url, API_VERSION
        ));

        while let Some(url) = next.take() {
            let page: SecretListPage = self
                .get(&url, None)?
                .into_json()
                .map_err(|e| StoreError::Parse(e.to_string()))?;

            for item in page.value {
                let Some(name) = name_from_id(&item.id) else {
                    tracing::warn!(id = %item.id, "skipping secret with unrecognized id");
                    continue;
                };
                secrets.push(SecretProperties {
                    name,
                    tags: item.tags.unwrap_or_default(),
                });
            }
            next = page.next_link.filter(|link| !link.is_empty());
        }

        tracing::debug!(count = secrets.len(), vault = %self.base_url, "listed secrets");
        Ok(secrets)
    }

    fn location(&self) -> String {
        self.base_url.clone()
    }
}
