//! Answer collection.
//!
//! Walks a plan in order, one prompt per query, strictly sequentially. A group
//! answer is copied to every member key. A multi-select answer is the picked
//! choices joined with commas. Prompt failures end the run.

use crate::engine::plan::QueryPlan;
use crate::models::{AnswerMap, Query};
use crate::prompt::{PromptRequest, Prompter};
use crate::Result;
use std::collections::BTreeMap;

/// Build the prompt for one query.
///
/// `defaults` supplies the pre-selected value; for a group that is the value of
/// its first member key.
pub fn request_for(query: &Query, defaults: &BTreeMap<String, String>) -> PromptRequest {
    match query {
        Query::Group { name, keys, choices } => PromptRequest::select(
            format!("Choose value for group '{}' (applies to: {})", name, keys.join(", ")),
            choices.clone(),
        )
        .with_default(keys.first().and_then(|k| defaults.get(k)).cloned()),
        Query::Individual {
            key,
            choices: Some(choices),
            ..
        } => PromptRequest::select(format!("Choose value for {}:", key), choices.clone())
            .with_default(defaults.get(key).cloned()),
        Query::Individual {
            key,
            choices: None,
            sensitive,
        } => PromptRequest::input(format!("Enter value for {}:", key))
            .with_default(defaults.get(key).cloned())
            .sensitive(*sensitive),
        Query::Multi { key, choices } => {
            PromptRequest::select(format!("Choose {}:", key), choices.clone())
        }
    }
}

/// Ask every query in `plan` and return the answers by key.
pub fn collect(
    plan: &QueryPlan,
    defaults: &BTreeMap<String, String>,
    prompter: &mut dyn Prompter,
) -> Result<AnswerMap> {
    let mut answers = AnswerMap::new();
    for query in plan.queries() {
        let answer = match query {
            Query::Multi { key, choices } => {
                let picked = prompter.select_many(&format!("Choose {}:", key), choices)?;
                picked
                    .iter()
                    .filter_map(|&i| choices.get(i))
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(",")
            }
            single => prompter.ask(&request_for(single, defaults))?,
        };
        for key in query.keys() {
            answers.insert(key.to_string(), answer.clone());
        }
    }
    tracing::info!(queries = plan.len(), keys = answers.len(), "collected answers");
    Ok(answers)
}
