//! The resolution engine.
//!
//! A run threads immutable values through each stage:
//!
//! ```text
//! schema / store listing -> QueryPlan -> AnswerMap -> ResolvedMap -> EnvFile
//! ```
//!
//! - [`plan`] builds the query plan (declared or discovered)
//! - [`shape`] infers majority shapes for discovered groups
//! - [`collect`] asks the queries through a [`Prompter`]
//! - [`resolve`] maps answers to secrets and looks them up
//! - [`merge`] combines resolved and prior values into the output
//!
//! Which planning strategy applies is decided once per run by [`Strategy`].
//! An access failure against the store (no token, 401, 403) aborts the run
//! before any output exists.

pub mod collect;
pub mod merge;
pub mod naming;
pub mod plan;
pub mod resolve;
pub mod shape;

pub use naming::{NameCase, secret_name};
pub use plan::QueryPlan;
pub use resolve::{ResolutionMode, Resolver};

use crate::Result;
use crate::envfile::EnvFile;
use crate::models::{
    AnswerMap, InputSpec, PropertyInput, PropertySchema, Query, ResolvedMap, ResolvedValue,
    SecretRecord,
};
use crate::prompt::Prompter;
use crate::vault::{MemoryStore, SecretStore, StoreError};
use std::collections::BTreeMap;
use std::thread;

/// Where the query plan comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// Properties and groupings from the project config.
    Declared(PropertySchema),
    /// A plain list of questions from the project config's `inputs`.
    Inputs(Vec<InputSpec>),
    /// Groupings inferred from secret tags and value shapes.
    Discovered,
}

impl Strategy {
    /// A schema wins over `inputs`; with neither the schema is discovered.
    pub fn new(schema: Option<PropertySchema>, inputs: Option<Vec<InputSpec>>) -> Self {
        match (schema, inputs) {
            (Some(schema), _) => Strategy::Declared(schema),
            (None, Some(inputs)) if !inputs.is_empty() => Strategy::Inputs(inputs),
            (None, _) => Strategy::Discovered,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Declared(_) => "declared",
            Strategy::Inputs(_) => "inputs",
            Strategy::Discovered => "discovered",
        }
    }

    /// Whether building the plan reads the store.
    pub fn needs_store(&self) -> bool {
        matches!(self, Strategy::Discovered)
    }
}

/// Options for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Ask every query instead of offering a selection
    pub recreate: bool,
    pub mode: ResolutionMode,
    pub case: NameCase,
    /// Maximum concurrent store lookups
    pub concurrency: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            recreate: false,
            mode: ResolutionMode::Direct,
            case: NameCase::Lower,
            concurrency: 8,
        }
    }
}

/// A plan plus the secrets it was inferred from (discovery only).
#[derive(Debug, Clone, Default)]
pub struct PlannedRun {
    pub plan: QueryPlan,
    pub records: Vec<SecretRecord>,
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub output: EnvFile,
    /// Keys whose value is a not-found or invalid placeholder
    pub missing: Vec<String>,
    /// Number of queries asked
    pub asked: usize,
}

/// Build the query plan for `strategy`.
///
/// A discovered plan lists the store and fetches every value once.
pub fn build_plan(
    strategy: &Strategy,
    store: Option<&dyn SecretStore>,
    concurrency: usize,
) -> Result<PlannedRun> {
    match (strategy, store) {
        (Strategy::Declared(schema), _) => Ok(PlannedRun {
            plan: plan::build_declared(schema),
            records: Vec::new(),
        }),
        (Strategy::Inputs(inputs), _) => Ok(PlannedRun {
            plan: plan::build_inputs(inputs),
            records: Vec::new(),
        }),
        (Strategy::Discovered, Some(store)) => {
            let records = fetch_records(store, concurrency)?;
            if records.is_empty() {
                tracing::warn!("No secrets found in {}", store.location());
            }
            Ok(PlannedRun {
                plan: plan::build_discovered(&records),
                records,
            })
        }
        (Strategy::Discovered, None) => Err(crate::Error::Other(
            "discovering a schema requires a secret store".to_string(),
        )),
    }
}

/// List the store and fetch every secret's value.
///
/// A value that cannot be fetched is kept as `None`; such records are never
/// grouped. Access failures end the fetch.
pub fn fetch_records(store: &dyn SecretStore, concurrency: usize) -> Result<Vec<SecretRecord>> {
    let listing = store.list_secrets()?;
    let mut records = Vec::with_capacity(listing.len());

    for batch in listing.chunks(concurrency.max(1)) {
        let fetched: Vec<std::result::Result<SecretRecord, StoreError>> = thread::scope(|scope| {
            let handles: Vec<_> = batch
                .iter()
                .map(|props| {
                    scope.spawn(move || {
                        let value = match store.get_secret(&props.name) {
                            Ok(value) => Some(value),
                            Err(e) if e.is_fatal() => return Err(e),
                            Err(e) => {
                                tracing::warn!(secret = %props.name, error = %e, "could not fetch secret");
                                None
                            }
                        };
                        Ok(SecretRecord {
                            name: props.name.clone(),
                            tags: props.tags.clone(),
                            value,
                        })
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
                .collect()
        });
        for record in fetched {
            records.push(record?);
        }
    }

    Ok(records)
}

/// Output key order: prior-file keys (when updating), then schema keys.
fn known_keys(strategy: &Strategy, prior: &EnvFile, update: bool) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    if update {
        keys.extend(prior.keys().map(str::to_string));
    }
    if let Strategy::Declared(schema) = strategy {
        for key in schema.keys() {
            if !keys.iter().any(|k| k == key) {
                keys.push(key.to_string());
            }
        }
    }
    keys
}

/// Prompt defaults: prior values, plus the current value of scalar secrets.
///
/// A declared free-form answer names a secret rather than being the written
/// value, so the prior value is no use as its default and is left out.
fn prompt_defaults(
    strategy: &Strategy,
    plan: &QueryPlan,
    prior: &EnvFile,
    records: &[SecretRecord],
) -> BTreeMap<String, String> {
    let lookup_keys = match strategy {
        Strategy::Declared(_) => plan.free_form_keys(),
        _ => Default::default(),
    };
    let mut defaults: BTreeMap<String, String> = prior
        .iter()
        .filter(|(k, _)| !lookup_keys.contains(*k))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    for record in records {
        let Some(value) = &record.value else {
            continue;
        };
        if shape::object_fields(value).is_none() {
            defaults
                .entry(record.env_key())
                .or_insert_with(|| value.clone());
        }
    }
    defaults
}

/// Run the whole pipeline and return the merged output.
///
/// Nothing is written here; the caller persists `RunOutcome::output`. Any error
/// (store listing, store access, prompting) aborts the run before an output exists.
pub fn run(
    strategy: &Strategy,
    prior: &EnvFile,
    store: &dyn SecretStore,
    prompter: &mut dyn Prompter,
    options: &RunOptions,
) -> Result<RunOutcome> {
    if let Strategy::Inputs(inputs) = strategy {
        return run_inputs(inputs, prior, store, prompter, options.concurrency);
    }
    let planned = build_plan(strategy, Some(store), options.concurrency)?;
    let full_plan = &planned.plan;
    let update = !options.recreate && !prior.is_empty();

    let selected = if update && !full_plan.is_empty() {
        let indices = prompter.select_many(
            "Select values to update (space to select, enter to confirm):",
            &full_plan.labels(),
        )?;
        full_plan.select(&indices)
    } else {
        full_plan.clone()
    };
    tracing::info!(
        strategy = strategy.as_str(),
        queries = full_plan.len(),
        selected = selected.len(),
        "query plan ready"
    );

    let defaults = prompt_defaults(strategy, &selected, prior, &planned.records);
    let answers = collect::collect(&selected, &defaults, prompter)?;

    let resolved = match strategy {
        Strategy::Declared(schema) => {
            let mut resolved = Resolver::new(store, options.case)
                .with_concurrency(options.concurrency)
                .resolve(&answers, options.mode)?;
            resolved.extend(fixed_values(schema));
            resolved
        }
        _ => resolve_discovered(&selected, &answers, &planned.records, options.concurrency)?,
    };

    let output = merge::merge(
        &known_keys(strategy, prior, update),
        &full_plan.keys(),
        &resolved,
        prior,
    );
    let missing = resolved
        .iter()
        .filter(|(_, v)| v.is_placeholder())
        .map(|(k, _)| k.clone())
        .collect();

    Ok(RunOutcome {
        output,
        missing,
        asked: selected.len(),
    })
}

/// Properties declared with a plain value, as literals.
fn fixed_values(schema: &PropertySchema) -> impl Iterator<Item = (String, ResolvedValue)> + '_ {
    schema
        .properties()
        .iter()
        .filter_map(|property| match &property.input {
            PropertyInput::Fixed(value) => Some((
                property.key.clone(),
                ResolvedValue::Literal(value.clone()),
            )),
            _ => None,
        })
}

/// Ask the `inputs` list and fetch the picked secrets.
///
/// The output replaces the prior file: answers first under their upper-cased
/// keys, then each picked secret under its own name. Prior values only serve
/// as prompt defaults.
fn run_inputs(
    inputs: &[InputSpec],
    prior: &EnvFile,
    store: &dyn SecretStore,
    prompter: &mut dyn Prompter,
    concurrency: usize,
) -> Result<RunOutcome> {
    let plan = plan::build_inputs(inputs);
    tracing::info!(strategy = "inputs", queries = plan.len(), "query plan ready");

    let defaults: BTreeMap<String, String> = prior
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let answers = collect::collect(&plan, &defaults, prompter)?;

    let mut output = EnvFile::new();
    let mut names: Vec<String> = Vec::new();
    for query in plan.queries() {
        match query {
            Query::Multi { key, .. } => {
                let picked = answers.get(key).map(String::as_str).unwrap_or_default();
                names.extend(
                    picked
                        .split(',')
                        .filter(|n| !n.is_empty())
                        .map(str::to_string),
                );
            }
            other => {
                for key in other.keys() {
                    output.insert(key, answers.get(key).cloned().unwrap_or_default());
                }
            }
        }
    }

    let resolved = Resolver::new(store, NameCase::Preserve)
        .with_concurrency(concurrency)
        .resolve_named(&names)?;
    let mut missing = Vec::new();
    for name in &names {
        if let Some(value) = resolved.get(name) {
            if value.is_placeholder() {
                missing.push(name.clone());
            }
            output.insert(name.clone(), value.to_string());
        }
    }

    Ok(RunOutcome {
        output,
        missing,
        asked: plan.len(),
    })
}

/// Field answers are read from the prefetched secrets; free-form answers are
/// the value itself.
fn resolve_discovered(
    plan: &QueryPlan,
    answers: &AnswerMap,
    records: &[SecretRecord],
    concurrency: usize,
) -> Result<ResolvedMap> {
    let literal_keys = plan.free_form_keys();
    let (literal, fields): (AnswerMap, AnswerMap) = answers
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .partition(|(k, _)| literal_keys.contains(k));

    let prefetched = MemoryStore::from(records);
    let mut resolved = Resolver::new(&prefetched, NameCase::Lower)
        .with_concurrency(concurrency)
        .resolve(&fields, ResolutionMode::UnifiedJson)?;
    resolved.extend(
        literal
            .into_iter()
            .map(|(k, v)| (k, ResolvedValue::Literal(v))),
    );
    Ok(resolved)
}
