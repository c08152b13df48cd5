//! Query plan construction.
//!
//! A plan is the ordered list of questions for one run. Group queries always
//! come before individual queries; within each kind the order is the order in
//! which the schema (or the store listing) presents them. An `inputs` plan is
//! asked in the order the config lists it.

use crate::engine::shape;
use crate::models::{InputSpec, PropertyInput, PropertySchema, Query, SecretRecord};
use serde::Serialize;
use std::collections::HashSet;

/// Ordered, immutable list of queries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryPlan {
    queries: Vec<Query>,
}

impl QueryPlan {
    pub fn new(queries: Vec<Query>) -> Self {
        Self { queries }
    }

    pub fn queries(&self) -> &[Query] {
        &self.queries
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// Every key answered by the plan, in plan order, without duplicates.
    pub fn keys(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.queries
            .iter()
            .flat_map(Query::keys)
            .filter(|k| seen.insert(*k))
            .map(str::to_string)
            .collect()
    }

    /// Labels for a selection prompt, one per query.
    pub fn labels(&self) -> Vec<String> {
        self.queries.iter().map(Query::label).collect()
    }

    /// Keep only the queries at `indices`, preserving plan order.
    pub fn select(&self, indices: &[usize]) -> QueryPlan {
        let wanted: HashSet<usize> = indices.iter().copied().collect();
        let queries = self
            .queries
            .iter()
            .enumerate()
            .filter(|(i, _)| wanted.contains(i))
            .map(|(_, q)| q.clone())
            .collect();
        QueryPlan { queries }
    }

    /// Individual free-form queries, by key.
    pub fn free_form_keys(&self) -> HashSet<String> {
        self.queries
            .iter()
            .filter(|q| q.is_free_form())
            .flat_map(Query::keys)
            .map(str::to_string)
            .collect()
    }
}

/// Plan for an explicit schema.
///
/// One group query per grouping, then one individual query per property that no
/// grouping covers. Properties declared with an empty choice list or a fixed
/// value are left out.
pub fn build_declared(schema: &PropertySchema) -> QueryPlan {
    let mut queries = Vec::new();
    let mut grouped: HashSet<&str> = HashSet::new();

    for grouping in schema.groupings() {
        queries.push(Query::Group {
            name: grouping.name.clone(),
            keys: grouping.keys.clone(),
            choices: grouping.values.clone(),
        });
        grouped.extend(grouping.keys.iter().map(String::as_str));
    }

    for property in schema.properties() {
        if grouped.contains(property.key.as_str()) {
            continue;
        }
        match &property.input {
            PropertyInput::Excluded | PropertyInput::Fixed(_) => {}
            PropertyInput::FreeForm => queries.push(Query::individual(&property.key, None)),
            PropertyInput::Choices(choices) => {
                queries.push(Query::individual(&property.key, Some(choices.clone())))
            }
        }
    }

    QueryPlan::new(queries)
}

/// Plan for a config `inputs` list: one query per input, in list order.
pub fn build_inputs(inputs: &[InputSpec]) -> QueryPlan {
    let queries = inputs
        .iter()
        .map(|input| {
            if input.is_secrets() {
                Query::Multi {
                    key: input.key.clone(),
                    choices: input.choices.clone(),
                }
            } else if input.choices.is_empty() {
                Query::individual(input.env_key(), None)
            } else {
                Query::individual(input.env_key(), Some(input.choices.clone()))
            }
        })
        .collect();
    QueryPlan::new(queries)
}

/// Plan inferred from the store listing.
///
/// Records sharing a `group` tag are candidate members. Within a tag group only
/// the records matching the majority shape become a group query, offering the
/// shape's field names; a group needs at least two such members. Every other
/// record is asked about individually: a JSON object offers its own fields, any
/// other value is free-form (and sensitive, since it is a secret value).
pub fn build_discovered(records: &[SecretRecord]) -> QueryPlan {
    // tag -> member indices, in first-encountered order
    let mut tag_groups: Vec<(&str, Vec<usize>)> = Vec::new();
    for (i, record) in records.iter().enumerate() {
        if let Some(tag) = record.group() {
            match tag_groups.iter_mut().find(|(t, _)| *t == tag) {
                Some((_, members)) => members.push(i),
                None => tag_groups.push((tag, vec![i])),
            }
        }
    }

    let mut queries = Vec::new();
    let mut grouped: HashSet<String> = HashSet::new();

    for (tag, members) in &tag_groups {
        if members.len() < 2 {
            continue;
        }
        let candidates: Vec<SecretRecord> = members.iter().map(|&i| records[i].clone()).collect();
        let classification = shape::classify(&candidates);
        let Some(choices) = classification.majority_keys else {
            continue;
        };
        if classification.conforming.len() < 2 {
            continue;
        }
        grouped.extend(classification.conforming.iter().map(|r| r.name.clone()));
        tracing::debug!(
            group = %tag,
            members = classification.conforming.len(),
            divergent = classification.divergent.len(),
            "inferred group query"
        );
        queries.push(Query::Group {
            name: tag.to_string(),
            keys: classification
                .conforming
                .iter()
                .map(|r| r.env_key())
                .collect(),
            choices,
        });
    }

    for record in records {
        if grouped.contains(&record.name) {
            continue;
        }
        let fields = record.value.as_deref().and_then(shape::object_fields);
        queries.push(match fields {
            Some(fields) => Query::individual(record.env_key(), Some(fields)),
            None => Query::Individual {
                key: record.env_key(),
                choices: None,
                sensitive: true,
            },
        });
    }

    QueryPlan::new(queries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GROUP_TAG, Grouping, Property};

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn schema(properties: Vec<(&str, Option<Vec<&str>>)>, groupings: Vec<Grouping>) -> PropertySchema {
        let properties = properties
            .into_iter()
            .map(|(key, choices)| Property {
                key: key.to_string(),
                input: PropertyInput::from_choices(choices.map(|c| strings(&c))),
            })
            .collect();
        PropertySchema::new(properties, groupings).unwrap()
    }

    fn tagged(name: &str, group: &str, value: &str) -> SecretRecord {
        SecretRecord::new(name, Some(value.to_string())).with_tag(GROUP_TAG, group)
    }

    #[test]
    fn test_declared_groups_first_then_individuals() {
        let schema = schema(
            vec![
                ("COLOR", Some(vec!["red", "blue"])),
                ("DB_HOST", Some(vec!["a", "b"])),
                ("NOTES", None),
                ("DB_USER", Some(vec!["a", "b"])),
            ],
            vec![Grouping {
                name: "database".to_string(),
                keys: strings(&["DB_HOST", "DB_USER"]),
                values: strings(&["dev", "prod"]),
            }],
        );
        let plan = build_declared(&schema);

        assert_eq!(
            plan.queries(),
            &[
                Query::Group {
                    name: "database".to_string(),
                    keys: strings(&["DB_HOST", "DB_USER"]),
                    choices: strings(&["dev", "prod"]),
                },
                Query::individual("COLOR", Some(strings(&["red", "blue"]))),
                Query::individual("NOTES", None),
            ]
        );
    }

    #[test]
    fn test_declared_skips_empty_choice_lists() {
        let schema = schema(vec![("A", Some(vec![])), ("B", Some(vec!["x"]))], vec![]);
        let plan = build_declared(&schema);
        assert_eq!(plan.keys(), strings(&["B"]));
    }

    #[test]
    fn test_declared_skips_fixed_values() {
        let properties = vec![
            Property {
                key: "REGION".to_string(),
                input: PropertyInput::Fixed("eu".to_string()),
            },
            Property {
                key: "COLOR".to_string(),
                input: PropertyInput::FreeForm,
            },
        ];
        let plan = build_declared(&PropertySchema::new(properties, vec![]).unwrap());
        assert_eq!(plan.keys(), strings(&["COLOR"]));
    }

    #[test]
    fn test_inputs_keep_config_order() {
        let inputs = vec![
            InputSpec {
                key: "environment".to_string(),
                choices: strings(&["dev", "prod"]),
            },
            InputSpec {
                key: "secrets".to_string(),
                choices: strings(&["db-password", "api-key"]),
            },
            InputSpec {
                key: "owner".to_string(),
                choices: vec![],
            },
        ];
        let plan = build_inputs(&inputs);

        assert_eq!(
            plan.queries(),
            &[
                Query::individual("ENVIRONMENT", Some(strings(&["dev", "prod"]))),
                Query::Multi {
                    key: "secrets".to_string(),
                    choices: strings(&["db-password", "api-key"]),
                },
                Query::individual("OWNER", None),
            ]
        );
        assert_eq!(plan.labels(), strings(&["ENVIRONMENT", "secrets", "OWNER"]));
    }

    #[test]
    fn test_declared_plan_is_reproducible() {
        let schema = schema(
            vec![("A", Some(vec!["x"])), ("B", None), ("C", Some(vec!["y"]))],
            vec![],
        );
        assert_eq!(build_declared(&schema), build_declared(&schema));
    }

    #[test]
    fn test_discovered_majority_group_and_divergent_member() {
        let records = vec![
            tagged("api-key", "svc", r#"{"dev":"x","prod":"y"}"#),
            tagged("api-secret", "svc", r#"{"dev":"x","prod":"y"}"#),
            tagged("api-extra", "svc", r#"{"stage":"z"}"#),
        ];
        let plan = build_discovered(&records);

        assert_eq!(
            plan.queries(),
            &[
                Query::Group {
                    name: "svc".to_string(),
                    keys: strings(&["API_KEY", "API_SECRET"]),
                    choices: strings(&["dev", "prod"]),
                },
                Query::individual("API_EXTRA", Some(strings(&["stage"]))),
            ]
        );
    }

    #[test]
    fn test_discovered_single_member_group_is_individual() {
        let records = vec![tagged("lonely", "solo", r#"{"dev":"1","prod":"2"}"#)];
        let plan = build_discovered(&records);
        assert_eq!(
            plan.queries(),
            &[Query::individual("LONELY", Some(strings(&["dev", "prod"])))]
        );
    }

    #[test]
    fn test_discovered_scalar_group_is_all_individual() {
        let records = vec![tagged("a", "g", "one"), tagged("b", "g", "two")];
        let plan = build_discovered(&records);

        assert!(plan.queries().iter().all(|q| !q.is_group()));
        assert_eq!(plan.free_form_keys().len(), 2);
        assert!(matches!(
            &plan.queries()[0],
            Query::Individual { sensitive: true, .. }
        ));
    }

    #[test]
    fn test_discovered_needs_two_conforming_members() {
        // three shapes, majority has one member
        let records = vec![
            tagged("a", "g", r#"{"x":"1"}"#),
            tagged("b", "g", r#"{"y":"1"}"#),
            tagged("c", "g", r#"{"z":"1"}"#),
        ];
        let plan = build_discovered(&records);
        assert_eq!(plan.len(), 3);
        assert!(plan.queries().iter().all(|q| !q.is_group()));
    }

    #[test]
    fn test_discovered_ungrouped_keep_listing_order() {
        let records = vec![
            SecretRecord::new("zeta", Some("1".to_string())),
            tagged("g1", "grp", r#"{"a":"1"}"#),
            SecretRecord::new("alpha", Some(r#"{"a":"1"}"#.to_string())),
            tagged("g2", "grp", r#"{"a":"2"}"#),
        ];
        let plan = build_discovered(&records);

        assert_eq!(plan.labels(), strings(&["[GROUP] grp", "ZETA", "ALPHA"]));
        assert_eq!(plan.keys(), strings(&["G1", "G2", "ZETA", "ALPHA"]));
    }

    #[test]
    fn test_select_preserves_order() {
        let plan = QueryPlan::new(vec![
            Query::individual("A", None),
            Query::individual("B", None),
            Query::individual("C", None),
        ]);
        let selected = plan.select(&[2, 0]);
        assert_eq!(selected.keys(), strings(&["A", "C"]));
    }
}
