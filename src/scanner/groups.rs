//! Named scanner groups for `mode: groups` configurations.

use phf::phf_map;
use std::collections::BTreeSet;

/// Group name to member scanner ids.
pub static GROUPS: phf::Map<&'static str, &'static [&'static str]> = phf_map! {
    "java" => &["maven-dependencies", "spring-rest-api", "jpa-entities"],
    "python" => &["pip-poetry-dependencies", "flask-routes"],
    "javascript" => &["npm-dependencies", "express-routes"],
    "go" => &["go-modules", "go-http-router"],
    "messaging" => &["kafka-consumer"],
    "schema" => &["sql-migrations"],
};

/// Union of the members of the named groups. Unknown names are ignored.
pub fn scanners_for_groups<S: AsRef<str>>(groups: &[S]) -> BTreeSet<&'static str> {
    groups
        .iter()
        .filter_map(|g| GROUPS.get(g.as_ref()))
        .flat_map(|members| members.iter().copied())
        .collect()
}

pub fn is_in_groups<S: AsRef<str>>(scanner_id: &str, groups: &[S]) -> bool {
    groups
        .iter()
        .filter_map(|g| GROUPS.get(g.as_ref()))
        .any(|members| members.contains(&scanner_id))
}

/// All group names, sorted.
pub fn available_groups() -> Vec<&'static str> {
    let mut names: Vec<_> = GROUPS.keys().copied().collect();
    names.sort_unstable();
    names
}
