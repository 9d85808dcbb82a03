//! Catalog and package validation.
//!
//! Validates structural invariants of keyword catalogs, catching errors such
//! as duplicate keywords, inverted cardinalities, rules over unknown keywords
//! and unparsable bloc conditions before an editor is built from them.
//!
//! # Examples
//!
//! ```
//! use command_params_core::*;
//!
//! let command = KeywordDef::command("STATIC")
//!     .with_keyword(KeywordDef::simple("MODEL", ValueType::Object).required());
//! assert!(validate_keyword(&command).is_empty());
//!
//! // Invalid: rule over a keyword that does not exist
//! let bad = KeywordDef::command("STATIC")
//!     .with_keyword(KeywordDef::simple("MODEL", ValueType::Object))
//!     .with_rule(RuleDef::new(RuleKind::ExactlyOne, &["MODEL", "MESH"]));
//! assert!(!validate_keyword(&bad).is_empty());
//! ```

use std::collections::HashSet;

use thiserror::Error;

use crate::expr::values_equal;
use crate::{CatalogPackage, Condition, ExprError, KeywordDef, KeywordKind};

/// Catalog/package validation errors.
///
/// Each variant describes a specific structural problem found during
/// validation. The `Display` impl provides a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// Package version string is empty.
    #[error("package version cannot be empty")]
    EmptyPackageVersion,
    /// Keyword name is empty or whitespace-only.
    #[error("keyword name cannot be empty")]
    EmptyKeywordName,
    /// Two commands in the same package share a name.
    #[error("duplicate command in package: {0}")]
    DuplicateCommand(String),
    /// A top-level definition is not a command, or a command is nested.
    #[error("misplaced command keyword: {0}")]
    MisplacedCommand(String),
    /// Two keywords in the same scope share the same name.
    #[error("duplicate keyword in scope: {0}")]
    DuplicateKeyword(String),
    /// `min` exceeds `max`.
    #[error("invalid cardinality for {0}")]
    InvalidCardinality(String),
    /// A simple keyword declares sub-keywords or rules.
    #[error("simple keyword cannot own sub-keywords or rules: {0}")]
    UnexpectedSubKeywords(String),
    /// A rule references a keyword unknown in its scope.
    #[error("rule in {scope} references unknown keyword: {keyword}")]
    UnknownRuleKeyword { scope: String, keyword: String },
    /// A rule lists too few keywords or the same keyword twice.
    #[error("malformed rule in {0}")]
    MalformedRule(String),
    /// A bloc has no condition.
    #[error("bloc without condition: {0}")]
    MissingCondition(String),
    /// A non-bloc keyword carries a condition.
    #[error("condition on non-bloc keyword: {0}")]
    UnexpectedCondition(String),
    /// A bloc condition does not parse.
    #[error("invalid condition on {keyword}: {error}")]
    InvalidCondition { keyword: String, error: ExprError },
    /// A default value does not fit its keyword.
    #[error("invalid default for {0}")]
    InvalidDefault(String),
}

/// Validates a full catalog package.
///
/// Checks for an empty version string, duplicate command names, and
/// validates each command individually.
///
/// # Examples
///
/// ```
/// use command_params_core::*;
///
/// let mut package = CatalogPackage::new("1.0.0", "2024-01-01T00:00:00Z");
/// package.commands.push(KeywordDef::command("STATIC"));
/// assert!(validate_package(&package).is_empty());
///
/// // Duplicate command → error
/// package.commands.push(KeywordDef::command("STATIC"));
/// let errors = validate_package(&package);
/// assert!(errors.iter().any(|e| matches!(e, CatalogError::DuplicateCommand(_))));
/// ```
pub fn validate_package(package: &CatalogPackage) -> Vec<CatalogError> {
    let mut errors = Vec::new();

    if package.version.trim().is_empty() {
        errors.push(CatalogError::EmptyPackageVersion);
        return errors;
    }

    let mut seen_commands: HashSet<&str> = HashSet::new();
    for command in &package.commands {
        if !seen_commands.insert(command.name.as_str()) {
            errors.push(CatalogError::DuplicateCommand(command.name.clone()));
            return errors;
        }
        errors.extend(validate_keyword(command));
        if !errors.is_empty() {
            return errors;
        }
    }

    errors
}

/// Validates a command keyword definition and everything beneath it.
///
/// Stops at the first problem found.
pub fn validate_keyword(command: &KeywordDef) -> Vec<CatalogError> {
    let mut errors = Vec::new();

    if command.kind != KeywordKind::Command {
        errors.push(CatalogError::MisplacedCommand(command.name.clone()));
        return errors;
    }

    let mut path = Vec::new();
    errors.extend(validate_node(command, &mut path));
    errors
}

fn validate_node(def: &KeywordDef, path: &mut Vec<String>) -> Vec<CatalogError> {
    let mut errors = Vec::new();

    let name = def.name.trim();
    if name.is_empty() {
        errors.push(CatalogError::EmptyKeywordName);
        return errors;
    }
    path.push(name.to_string());
    let scope = path.join(".");

    if def.max.is_some_and(|max| max < def.min || max == 0) {
        errors.push(CatalogError::InvalidCardinality(scope));
        path.pop();
        return errors;
    }

    match (def.kind, &def.condition) {
        (KeywordKind::Bloc, None) => errors.push(CatalogError::MissingCondition(scope.clone())),
        (KeywordKind::Bloc, Some(source)) => {
            if let Err(error) = Condition::parse(source) {
                errors.push(CatalogError::InvalidCondition {
                    keyword: scope.clone(),
                    error,
                });
            }
        }
        (_, Some(_)) => errors.push(CatalogError::UnexpectedCondition(scope.clone())),
        (_, None) => {}
    }
    if !errors.is_empty() {
        path.pop();
        return errors;
    }

    if def.kind == KeywordKind::Simple {
        if !def.keywords.is_empty() || !def.rules.is_empty() {
            errors.push(CatalogError::UnexpectedSubKeywords(scope));
        } else if def.default.as_ref().is_some_and(|d| !default_fits(def, d)) {
            errors.push(CatalogError::InvalidDefault(scope));
        }
        path.pop();
        return errors;
    }

    if def.default.is_some() {
        errors.push(CatalogError::InvalidDefault(scope));
        path.pop();
        return errors;
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for keyword in &def.keywords {
        if keyword.kind == KeywordKind::Command {
            errors.push(CatalogError::MisplacedCommand(keyword.name.clone()));
            break;
        }
        if !seen.insert(keyword.name.as_str()) {
            errors.push(CatalogError::DuplicateKeyword(keyword.name.clone()));
            break;
        }
    }
    if !errors.is_empty() {
        path.pop();
        return errors;
    }

    errors.extend(validate_rules(def, &scope));
    if !errors.is_empty() {
        path.pop();
        return errors;
    }

    for keyword in &def.keywords {
        errors.extend(validate_node(keyword, path));
        if !errors.is_empty() {
            break;
        }
    }

    path.pop();
    errors
}

fn validate_rules(def: &KeywordDef, scope: &str) -> Vec<CatalogError> {
    let mut errors = Vec::new();

    for rule in &def.rules {
        let distinct: HashSet<&str> = rule.keywords.iter().map(String::as_str).collect();
        if rule.keywords.len() < rule.kind.min_arity() || distinct.len() != rule.keywords.len() {
            errors.push(CatalogError::MalformedRule(scope.to_string()));
            return errors;
        }
        if let Some(unknown) = rule
            .keywords
            .iter()
            .find(|k| def.find_flattened(k).is_none())
        {
            errors.push(CatalogError::UnknownRuleKeyword {
                scope: scope.to_string(),
                keyword: unknown.clone(),
            });
            return errors;
        }
    }

    errors
}

fn default_fits(def: &KeywordDef, default: &crate::Document) -> bool {
    let values: Vec<&crate::Document> = match default {
        crate::Document::Array(items) if def.is_list() => items.iter().collect(),
        other => vec![other],
    };
    values.iter().all(|value| {
        def.value_type.accepts(value)
            && (def.into.is_empty() || def.into.iter().any(|allowed| values_equal(allowed, value)))
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::{RuleDef, RuleKind, ValueType};

    use super::*;

    #[test]
    fn test_validate_package_rejects_duplicate_commands() {
        let mut package = CatalogPackage::new("1.0.0", "2026-02-07T00:00:00Z");
        package.commands.push(KeywordDef::command("STATIC"));
        package.commands.push(KeywordDef::command("STATIC"));

        let errors = validate_package(&package);
        assert_eq!(
            errors,
            vec![CatalogError::DuplicateCommand("STATIC".to_string())]
        );
    }

    #[test]
    fn test_validate_rejects_inverted_cardinality() {
        let command = KeywordDef::command("CMD")
            .with_keyword(KeywordDef::simple("GROUPS", ValueType::Text).with_cardinality(3, Some(2)));

        let errors = validate_keyword(&command);
        assert_eq!(
            errors,
            vec![CatalogError::InvalidCardinality("CMD.GROUPS".to_string())]
        );
    }

    #[test]
    fn test_validate_rejects_bad_condition() {
        let command = KeywordDef::command("CMD")
            .with_keyword(KeywordDef::simple("X", ValueType::Int))
            .with_keyword(KeywordDef::bloc("b_x", "X =="));

        let errors = validate_keyword(&command);
        assert!(matches!(
            errors.as_slice(),
            [CatalogError::InvalidCondition { keyword, .. }] if keyword == "CMD.b_x"
        ));
    }

    #[test]
    fn test_validate_accepts_rule_over_bloc_keyword() {
        let command = KeywordDef::command("CMD")
            .with_keyword(KeywordDef::simple("X", ValueType::Int))
            .with_keyword(
                KeywordDef::bloc("b_x", "X == 1")
                    .with_keyword(KeywordDef::simple("Y", ValueType::Int)),
            )
            .with_rule(RuleDef::new(RuleKind::AtMostOne, &["X", "Y"]));

        assert!(validate_keyword(&command).is_empty());
    }

    #[test]
    fn test_validate_rejects_default_outside_into() {
        let command = KeywordDef::command("CMD").with_keyword(
            KeywordDef::simple("METHOD", ValueType::Text)
                .with_into(vec![json!("MUMPS"), json!("LDLT")])
                .with_default(json!("GCPC")),
        );

        assert_eq!(
            validate_keyword(&command),
            vec![CatalogError::InvalidDefault("CMD.METHOD".to_string())]
        );
    }

    #[test]
    fn test_validate_rejects_duplicate_rule_keyword() {
        let command = KeywordDef::command("CMD")
            .with_keyword(KeywordDef::simple("A", ValueType::Int))
            .with_rule(RuleDef::new(RuleKind::AllTogether, &["A", "A"]));

        assert_eq!(
            validate_keyword(&command),
            vec![CatalogError::MalformedRule("CMD".to_string())]
        );
    }
}
