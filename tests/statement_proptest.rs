//! Property tests for binding statement parsing

use deferbind::{DeferError, Statement};
use proptest::prelude::*;

fn identifier() -> impl Strategy<Value = String> {
    "[a-z_][a-z0-9_]{0,8}".prop_filter("keyword", |s| {
        !matches!(s.as_str(), "as" | "import" | "from")
    })
}

fn dotted_path() -> impl Strategy<Value = String> {
    prop::collection::vec(identifier(), 1..4).prop_map(|parts| parts.join("."))
}

fn import_names() -> impl Strategy<Value = Vec<(String, Option<String>)>> {
    prop::collection::vec((identifier(), prop::option::of(identifier())), 1..5)
}

fn render(names: &[(String, Option<String>)]) -> String {
    names
        .iter()
        .map(|(name, alias)| match alias {
            Some(alias) => format!("{name} as {alias}"),
            None => name.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

proptest! {
    #[test]
    fn displayed_statement_parses_back(path in dotted_path(), names in import_names()) {
        let text = format!("from {path} import {}", render(&names));
        let parsed: Statement = text.parse().unwrap();
        let reparsed: Statement = parsed.to_string().parse().unwrap();
        prop_assert_eq!(parsed, reparsed);
    }

    #[test]
    fn from_import_binds_alias_or_name(path in dotted_path(), names in import_names()) {
        let text = format!("from {path} import ({})", render(&names));
        let statement: Statement = text.parse().unwrap();
        let expected: Vec<String> = names
            .iter()
            .map(|(name, alias)| alias.clone().unwrap_or_else(|| name.clone()))
            .collect();
        prop_assert_eq!(statement.bound_names(), expected);
        prop_assert!(!statement.is_wildcard());
    }

    #[test]
    fn unaliased_import_binds_first_component(path in dotted_path()) {
        let statement: Statement = format!("import {path}").parse().unwrap();
        let top = path.split('.').next().unwrap().to_string();
        prop_assert_eq!(statement.bound_names(), vec![top]);
    }

    #[test]
    fn wildcard_mixed_with_names_is_invalid(path in dotted_path(), names in import_names()) {
        let text = format!("from {path} import {}, *", render(&names));
        let err = text.parse::<Statement>().unwrap_err();
        let is_invalid = matches!(err, DeferError::InvalidStatement { .. });
        prop_assert!(is_invalid);
    }

    #[test]
    fn lone_wildcard_parses_as_wildcard(path in dotted_path()) {
        let statement: Statement = format!("from {path} import *").parse().unwrap();
        prop_assert!(statement.is_wildcard());
    }

    #[test]
    fn leading_digit_alias_is_rejected(path in dotted_path(), digit in 0u8..10) {
        let text = format!("import {path} as {digit}x");
        prop_assert!(text.parse::<Statement>().is_err());
    }
}
