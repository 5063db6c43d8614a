//! `${name}` placeholder substitution.
//!
//! Placeholders take the form `${name}` or `${name=default}`. Unknown names
//! without a default are left in place so the backend reports them.

use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::OnceLock;

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\$\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*(?:=\s*([^}]*?)\s*)?\}")
            .expect("placeholder regex is valid")
    })
}

/// Replaces placeholders in `sql` with values from `variables`.
pub fn substitute_variables(sql: &str, variables: &HashMap<String, String>) -> String {
    placeholder_regex()
        .replace_all(sql, |caps: &Captures<'_>| {
            let name = &caps[1];
            if let Some(value) = variables.get(name) {
                value.clone()
            } else if let Some(default) = caps.get(2) {
                default.as_str().to_string()
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

/// Placeholders in `sql` that have neither a value in `variables` nor a
/// default, in order of first appearance.
pub fn unresolved_placeholders(sql: &str, variables: &HashMap<String, String>) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in placeholder_regex().captures_iter(sql) {
        let name = &caps[1];
        if caps.get(2).is_some() || variables.contains_key(name) {
            continue;
        }
        if !names.iter().any(|existing| existing == name) {
            names.push(name.to_string());
        }
    }
    names
}
