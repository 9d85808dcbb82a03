//! Schema-aware checking of value documents.
//!
//! A [`DocumentChecker`] verifies a serialized [`Document`] against the
//! [`KeywordDef`] it was produced for. On failure it reports the path from
//! the checked keyword down to the offending value, so an editor can locate
//! the live item to surface.
//!
//! # Examples
//!
//! ```
//! use command_params_core::*;
//! use serde_json::json;
//!
//! let command = KeywordDef::command("STATIC")
//!     .with_keyword(KeywordDef::simple("MODEL", ValueType::Object).required())
//!     .with_keyword(KeywordDef::simple("INFO", ValueType::Int).with_into(vec![json!(1), json!(2)]));
//!
//! let checker = SchemaChecker;
//! assert!(checker.check(&command, &json!({ "MODEL": "mo" }), &Context::new()).is_ok());
//!
//! let failure = checker
//!     .check(&command, &json!({ "MODEL": "mo", "INFO": 3 }), &Context::new())
//!     .unwrap_err();
//! assert_eq!(failure.path, vec!["INFO"]);
//! ```

use thiserror::Error;

use crate::expr::values_equal;
use crate::{Condition, Context, Document, KeywordDef, KeywordKind, RuleDef, RuleKind};

/// A failed document check.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct CheckFailure {
    /// Keyword names (and list indices) from the checked keyword down to the
    /// failure point. Empty when the checked keyword itself is at fault.
    pub path: Vec<String>,
    /// The violated rule, when a rule failed.
    pub rule: Option<RuleKind>,
    /// Human-readable explanation.
    pub message: String,
}

impl CheckFailure {
    fn new(path: &[String], message: String) -> Self {
        Self {
            path: path.to_vec(),
            rule: None,
            message,
        }
    }
}

/// Validator backend: a pure check of a document in its parent context.
pub trait DocumentChecker {
    /// Checks `document` as the value of `keyword`. `context` holds the
    /// defaulted values of the keyword's siblings.
    fn check(
        &self,
        keyword: &KeywordDef,
        document: &Document,
        context: &Context,
    ) -> Result<(), CheckFailure>;
}

/// Default [`DocumentChecker`] driven entirely by the catalog.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaChecker;

impl DocumentChecker for SchemaChecker {
    fn check(
        &self,
        keyword: &KeywordDef,
        document: &Document,
        context: &Context,
    ) -> Result<(), CheckFailure> {
        let mut path = Vec::new();
        check_keyword(keyword, document, context, &mut path)
    }
}

fn check_keyword(
    def: &KeywordDef,
    document: &Document,
    context: &Context,
    path: &mut Vec<String>,
) -> Result<(), CheckFailure> {
    match def.kind {
        KeywordKind::Command => check_mapping(def, document, context, path),
        KeywordKind::Bloc => {
            let applies = def
                .condition
                .as_deref()
                .and_then(|source| Condition::parse(source).ok())
                .is_none_or(|condition| condition.evaluate(context));
            if applies {
                check_mapping(def, document, context, path)
            } else {
                Ok(())
            }
        }
        KeywordKind::Factor if def.is_list() => {
            let elements: Vec<&Document> = match document {
                Document::Array(items) => items.iter().collect(),
                other => vec![other],
            };
            check_count(def, elements.len(), path)?;
            for (index, element) in elements.into_iter().enumerate() {
                path.push(index.to_string());
                check_mapping(def, element, &Context::new(), path)?;
                path.pop();
            }
            Ok(())
        }
        KeywordKind::Factor => check_mapping(def, document, &Context::new(), path),
        KeywordKind::Simple => check_simple(def, document, path),
    }
}

fn check_count(def: &KeywordDef, count: usize, path: &[String]) -> Result<(), CheckFailure> {
    if def.accepts_count(count) {
        return Ok(());
    }
    let max = def
        .max
        .map(|m| m.to_string())
        .unwrap_or_else(|| "n".to_string());
    Err(CheckFailure::new(
        path,
        format!(
            "{} expects between {} and {} values, got {}",
            def.name, def.min, max, count
        ),
    ))
}

/// Keywords and blocs that apply to a mapping, with the context used to
/// decide it.
struct ActiveScope<'a> {
    keywords: Vec<&'a KeywordDef>,
    blocs: Vec<&'a KeywordDef>,
    context: Context,
}

/// Evaluates bloc conditions until the set of active blocs is stable. Each
/// pass may activate blocs whose defaults feed later conditions.
fn active_scope<'a>(
    def: &'a KeywordDef,
    map: &serde_json::Map<String, Document>,
    parent: &Context,
) -> ActiveScope<'a> {
    let total_blocs = count_blocs(def);
    let mut previous: Option<Vec<String>> = None;
    let mut scope = ActiveScope {
        keywords: Vec::new(),
        blocs: Vec::new(),
        context: Context::new(),
    };

    for _ in 0..=total_blocs {
        let mut context = parent.clone();
        if let Some(defaults) = scope_defaults(&scope) {
            context.extend(defaults);
        }
        context.extend(map.iter().map(|(k, v)| (k.clone(), v.clone())));

        let mut next = ActiveScope {
            keywords: Vec::new(),
            blocs: Vec::new(),
            context,
        };
        collect_active(def, &mut next);

        let names: Vec<String> = next.blocs.iter().map(|b| b.name.clone()).collect();
        let stable = previous.as_ref() == Some(&names);
        previous = Some(names);
        scope = next;
        if stable {
            break;
        }
    }

    let defaults = scope_defaults(&scope).unwrap_or_default();
    let mut context = parent.clone();
    context.extend(defaults);
    context.extend(map.iter().map(|(k, v)| (k.clone(), v.clone())));
    scope.context = context;
    scope
}

fn count_blocs(def: &KeywordDef) -> usize {
    def.keywords
        .iter()
        .filter(|k| k.kind == KeywordKind::Bloc)
        .map(|b| 1 + count_blocs(b))
        .sum()
}

fn scope_defaults(scope: &ActiveScope<'_>) -> Option<Context> {
    if scope.keywords.is_empty() {
        return None;
    }
    Some(
        scope
            .keywords
            .iter()
            .filter_map(|k| k.default.clone().map(|d| (k.name.clone(), d)))
            .collect(),
    )
}

fn collect_active<'a>(def: &'a KeywordDef, scope: &mut ActiveScope<'a>) {
    for keyword in &def.keywords {
        if keyword.kind != KeywordKind::Bloc {
            scope.keywords.push(keyword);
            continue;
        }
        let applies = keyword
            .condition
            .as_deref()
            .and_then(|source| Condition::parse(source).ok())
            .is_none_or(|condition| condition.evaluate(&scope.context));
        if applies {
            scope.blocs.push(keyword);
            collect_active(keyword, scope);
        }
    }
}

fn check_mapping(
    def: &KeywordDef,
    document: &Document,
    parent: &Context,
    path: &mut Vec<String>,
) -> Result<(), CheckFailure> {
    let Document::Object(map) = document else {
        return Err(CheckFailure::new(
            path,
            format!("{} expects a mapping of keywords", def.name),
        ));
    };

    let scope = active_scope(def, map, parent);

    for (key, value) in map {
        let Some(keyword) = scope.keywords.iter().find(|k| &k.name == key) else {
            let message = if def.find_flattened(key).is_some() {
                format!("keyword {key} is not allowed in this context")
            } else {
                format!("unknown keyword {key} in {}", def.name)
            };
            path.push(key.clone());
            return Err(CheckFailure::new(path, message));
        };
        path.push(key.clone());
        check_keyword(keyword, value, &scope.context, path)?;
        path.pop();
    }

    if let Some(missing) = scope
        .keywords
        .iter()
        .find(|k| k.required && k.default.is_none() && !map.contains_key(&k.name))
    {
        path.push(missing.name.clone());
        return Err(CheckFailure::new(
            path,
            format!("mandatory keyword {} is missing", missing.name),
        ));
    }

    let rules = def
        .rules
        .iter()
        .chain(scope.blocs.iter().flat_map(|b| b.rules.iter()));
    for rule in rules {
        check_rule(rule, map, path)?;
    }

    Ok(())
}

fn check_rule(
    rule: &RuleDef,
    map: &serde_json::Map<String, Document>,
    path: &mut Vec<String>,
) -> Result<(), CheckFailure> {
    let present: Vec<bool> = rule.keywords.iter().map(|k| map.contains_key(k)).collect();
    if rule.kind.is_satisfied(&present) {
        return Ok(());
    }

    let offending = offending_keyword(rule, &present);
    if let Some(name) = offending {
        path.push(name.to_string());
    }
    let failure = CheckFailure {
        path: path.clone(),
        rule: Some(rule.kind),
        message: format!("{} {} is required", rule.kind.describe(), rule.keywords.join(", ")),
    };
    if offending.is_some() {
        path.pop();
    }
    Err(failure)
}

/// Picks the keyword most useful to point at for a violated rule.
fn offending_keyword<'a>(rule: &'a RuleDef, present: &[bool]) -> Option<&'a str> {
    let names = &rule.keywords;
    let nth_present = |n: usize| {
        names
            .iter()
            .zip(present)
            .filter(|(_, p)| **p)
            .nth(n)
            .map(|(k, _)| k.as_str())
    };
    let first_absent = |skip: usize| {
        names
            .iter()
            .zip(present)
            .skip(skip)
            .find(|(_, p)| !**p)
            .map(|(k, _)| k.as_str())
    };

    match rule.kind {
        RuleKind::ExactlyOne | RuleKind::AtMostOne if present.iter().any(|p| *p) => nth_present(1),
        RuleKind::ExactlyOne | RuleKind::AtMostOne | RuleKind::AtLeastOne => rule.first(),
        RuleKind::AllTogether => first_absent(0),
        RuleKind::IfFirstAllPresent => first_absent(1),
        RuleKind::OnlyFirstPresent => names
            .iter()
            .zip(present)
            .skip(1)
            .find(|(_, p)| **p)
            .map(|(k, _)| k.as_str()),
    }
}

fn check_simple(
    def: &KeywordDef,
    document: &Document,
    path: &mut Vec<String>,
) -> Result<(), CheckFailure> {
    let values: Vec<&Document> = match document {
        Document::Array(items) if def.is_list() => items.iter().collect(),
        Document::Array(_) => {
            return Err(CheckFailure::new(
                path,
                format!("{} expects a single value", def.name),
            ));
        }
        other => vec![other],
    };
    if def.is_list() {
        check_count(def, values.len(), path)?;
    }

    for (index, value) in values.into_iter().enumerate() {
        if def.is_list() {
            path.push(index.to_string());
        }
        check_scalar(def, value, path)?;
        if def.is_list() {
            path.pop();
        }
    }
    Ok(())
}

fn check_scalar(def: &KeywordDef, value: &Document, path: &[String]) -> Result<(), CheckFailure> {
    if !def.value_type.accepts(value) {
        return Err(CheckFailure::new(
            path,
            format!("{} expects a {} value, got {}", def.name, def.value_type.label(), value),
        ));
    }
    if !def.into.is_empty() && !def.into.iter().any(|allowed| values_equal(allowed, value)) {
        return Err(CheckFailure::new(
            path,
            format!("{value} is not an allowed value for {}", def.name),
        ));
    }
    if let Some(number) = value.as_f64() {
        let below = def.val_min.is_some_and(|min| number < min);
        let above = def.val_max.is_some_and(|max| number > max);
        if below || above {
            return Err(CheckFailure::new(
                path,
                format!("{number} is out of range for {}", def.name),
            ));
        }
    }
    Ok(())
}
