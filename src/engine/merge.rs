//! Final output assembly.

use crate::envfile::EnvFile;
use crate::models::ResolvedMap;
use std::collections::HashSet;

/// Merge resolved values and prior values into the output env file.
///
/// Keys come out in `known_keys` order, followed by any `discovered_keys` not
/// already known, in discovery order. Each key takes its resolved value if it
/// has one, else its prior value, else an empty string.
pub fn merge(
    known_keys: &[String],
    discovered_keys: &[String],
    resolved: &ResolvedMap,
    prior: &EnvFile,
) -> EnvFile {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut output = EnvFile::new();

    for key in known_keys.iter().chain(discovered_keys) {
        if !seen.insert(key.as_str()) {
            continue;
        }
        let value = match resolved.get(key) {
            Some(value) => value.to_string(),
            None => prior.get(key).unwrap_or_default().to_string(),
        };
        output.insert(key.clone(), value);
    }

    output
}
