//! Catalog type definitions for command keyword modeling.
//!
//! This module defines the declarative data model that describes a command's
//! keywords: scalar values, factor sub-blocks, repeated sequences,
//! conditionally-visible blocs and cross-keyword rules. The types are designed
//! for serialization with [`serde`] and round-trip through JSON catalogs.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Version of the catalog contract (semver).
///
/// Embedded in every [`CatalogPackage`](crate::CatalogPackage) to track
/// compatibility across catalog versions.
pub const CATALOG_CONTRACT_VERSION: &str = "1.0.0";

/// A serialized value: a scalar, a mapping of keyword name to value, or an
/// ordered sequence of values.
pub type Document = serde_json::Value;

/// One-level mapping of keyword name to value used when evaluating
/// conditions.
pub type Context = serde_json::Map<String, Document>;

/// Structural kind of a keyword.
///
/// # Examples
///
/// ```
/// use command_params_core::KeywordKind;
///
/// assert_eq!(KeywordKind::default(), KeywordKind::Simple);
/// assert!(KeywordKind::Bloc.is_block());
/// assert!(!KeywordKind::Simple.is_block());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum KeywordKind {
    /// Root of a command.
    Command,
    /// Named sub-block of keywords, possibly repeated.
    Factor,
    /// Grouping construct gated by a condition. Its keywords are flattened
    /// into the enclosing mapping.
    Bloc,
    /// Scalar value or list of scalars (the default).
    #[default]
    Simple,
}

impl KeywordKind {
    /// Returns `true` for kinds that own sub-keywords.
    pub fn is_block(&self) -> bool {
        matches!(self, Self::Command | Self::Factor | Self::Bloc)
    }
}

/// Value type accepted by a simple keyword.
///
/// # Examples
///
/// ```
/// use command_params_core::ValueType;
/// use serde_json::json;
///
/// assert!(ValueType::Int.accepts(&json!(3)));
/// assert!(!ValueType::Int.accepts(&json!(3.5)));
/// assert!(ValueType::Real.accepts(&json!(3)));
/// assert!(ValueType::Text.accepts(&json!("mesh")));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// Integer.
    Int,
    /// Real number (integers are accepted).
    Real,
    /// Text.
    Text,
    /// Boolean.
    Bool,
    /// Reference to another command result or an opaque composite object.
    Object,
    /// Unknown/any type (the default).
    #[default]
    Any,
}

impl ValueType {
    /// Checks whether a scalar value is compatible with this type.
    pub fn accepts(&self, value: &Document) -> bool {
        match self {
            Self::Int => value.is_i64() || value.is_u64(),
            Self::Real => value.is_number(),
            Self::Text => value.is_string(),
            Self::Bool => value.is_boolean(),
            Self::Object | Self::Any => !value.is_null(),
        }
    }

    /// Short lowercase name used in messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Int => "integer",
            Self::Real => "real",
            Self::Text => "text",
            Self::Bool => "boolean",
            Self::Object => "object",
            Self::Any => "value",
        }
    }
}

/// Kind of a cross-keyword rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// Exactly one of the keywords is present.
    ExactlyOne,
    /// At most one of the keywords is present.
    AtMostOne,
    /// At least one of the keywords is present.
    AtLeastOne,
    /// Either all keywords are present or none.
    AllTogether,
    /// If the first keyword is present, all the others must be.
    IfFirstAllPresent,
    /// If the first keyword is present, none of the others may be.
    OnlyFirstPresent,
}

impl RuleKind {
    /// Minimum number of keywords a rule of this kind must list.
    pub fn min_arity(&self) -> usize {
        match self {
            Self::ExactlyOne | Self::AtMostOne | Self::AtLeastOne => 1,
            Self::AllTogether | Self::IfFirstAllPresent | Self::OnlyFirstPresent => 2,
        }
    }

    /// Evaluates the rule against the presence of each listed keyword, in
    /// rule order.
    ///
    /// # Examples
    ///
    /// ```
    /// use command_params_core::RuleKind;
    ///
    /// assert!(RuleKind::ExactlyOne.is_satisfied(&[false, true, false]));
    /// assert!(!RuleKind::ExactlyOne.is_satisfied(&[true, true, false]));
    /// assert!(RuleKind::IfFirstAllPresent.is_satisfied(&[false, true, false]));
    /// assert!(!RuleKind::OnlyFirstPresent.is_satisfied(&[true, true]));
    /// ```
    pub fn is_satisfied(&self, present: &[bool]) -> bool {
        let count = present.iter().filter(|p| **p).count();
        let first = present.first().copied().unwrap_or(false);
        match self {
            Self::ExactlyOne => count == 1,
            Self::AtMostOne => count <= 1,
            Self::AtLeastOne => count >= 1,
            Self::AllTogether => count == 0 || count == present.len(),
            Self::IfFirstAllPresent => !first || count == present.len(),
            Self::OnlyFirstPresent => !first || count == 1,
        }
    }

    /// Human-readable description of the rule.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::ExactlyOne => "exactly one of",
            Self::AtMostOne => "at most one of",
            Self::AtLeastOne => "at least one of",
            Self::AllTogether => "all or none of",
            Self::IfFirstAllPresent => "when the first is present, all of",
            Self::OnlyFirstPresent => "when the first is present, none other of",
        }
    }
}

/// A declared constraint among sibling keywords.
///
/// # Examples
///
/// ```
/// use command_params_core::{RuleDef, RuleKind};
///
/// let rule = RuleDef::new(RuleKind::ExactlyOne, &["MESH", "MODEL"]);
/// assert_eq!(rule.first(), Some("MESH"));
/// assert!(rule.references("MODEL"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDef {
    /// Kind of constraint.
    pub kind: RuleKind,
    /// Governed keyword names, in declaration order.
    pub keywords: Vec<String>,
}

impl RuleDef {
    /// Creates a rule over the given keyword names.
    pub fn new(kind: RuleKind, keywords: &[&str]) -> Self {
        Self {
            kind,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// Returns the first governed keyword.
    pub fn first(&self) -> Option<&str> {
        self.keywords.first().map(String::as_str)
    }

    /// Checks if the rule governs `name`.
    pub fn references(&self, name: &str) -> bool {
        self.keywords.iter().any(|k| k == name)
    }
}

fn default_min() -> usize {
    1
}

fn default_max() -> Option<usize> {
    Some(1)
}

/// Definition of one keyword in a command catalog.
///
/// Use the constructors [`command`](KeywordDef::command),
/// [`factor`](KeywordDef::factor), [`bloc`](KeywordDef::bloc) and
/// [`simple`](KeywordDef::simple), then chain builder methods.
///
/// # Examples
///
/// ```
/// use command_params_core::*;
/// use serde_json::json;
///
/// let command = KeywordDef::command("STATIC")
///     .with_keyword(KeywordDef::simple("MODEL", ValueType::Object).required())
///     .with_keyword(
///         KeywordDef::factor("LOAD")
///             .with_cardinality(1, None)
///             .with_keyword(KeywordDef::simple("CHARGE", ValueType::Object).required()),
///     )
///     .with_keyword(KeywordDef::simple("INFO", ValueType::Int).with_default(json!(1)));
///
/// assert!(command.find("LOAD").unwrap().is_list());
/// assert_eq!(command.find("INFO").unwrap().default, Some(json!(1)));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordDef {
    /// Keyword name as it appears in documents.
    pub name: String,
    /// Structural kind.
    #[serde(default)]
    pub kind: KeywordKind,
    /// Value type for simple keywords.
    #[serde(default)]
    pub value_type: ValueType,
    /// Mandatory by schema.
    #[serde(default)]
    pub required: bool,
    /// Minimum number of values/occurrences when present.
    #[serde(default = "default_min")]
    pub min: usize,
    /// Maximum number of values/occurrences (`None` = unbounded).
    #[serde(default = "default_max")]
    pub max: Option<usize>,
    /// Catalog default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Document>,
    /// Allowed values (empty = unrestricted).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub into: Vec<Document>,
    /// Lower numeric bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub val_min: Option<f64>,
    /// Upper numeric bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub val_max: Option<f64>,
    /// Condition gating a bloc.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Sub-keywords, in catalog order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<KeywordDef>,
    /// Rules among sub-keywords.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<RuleDef>,
    /// Description from the catalog.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl KeywordDef {
    fn with_kind(name: &str, kind: KeywordKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            value_type: ValueType::Any,
            required: false,
            min: 1,
            max: Some(1),
            default: None,
            into: Vec::new(),
            val_min: None,
            val_max: None,
            condition: None,
            keywords: Vec::new(),
            rules: Vec::new(),
            description: None,
        }
    }

    /// Creates a command (root) keyword.
    pub fn command(name: &str) -> Self {
        Self::with_kind(name, KeywordKind::Command)
    }

    /// Creates a factor keyword.
    pub fn factor(name: &str) -> Self {
        Self::with_kind(name, KeywordKind::Factor)
    }

    /// Creates a bloc gated by `condition`.
    ///
    /// # Examples
    ///
    /// ```
    /// use command_params_core::KeywordDef;
    ///
    /// let bloc = KeywordDef::bloc("b_thermal", "PHENOMENON == 'THERMAL'");
    /// assert_eq!(bloc.condition.as_deref(), Some("PHENOMENON == 'THERMAL'"));
    /// ```
    pub fn bloc(name: &str, condition: &str) -> Self {
        let mut def = Self::with_kind(name, KeywordKind::Bloc);
        def.condition = Some(condition.to_string());
        def
    }

    /// Creates a simple keyword of the given type.
    pub fn simple(name: &str, value_type: ValueType) -> Self {
        let mut def = Self::with_kind(name, KeywordKind::Simple);
        def.value_type = value_type;
        def
    }

    /// Marks as mandatory.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the catalog default.
    pub fn with_default(mut self, value: Document) -> Self {
        self.default = Some(value);
        self
    }

    /// Sets the cardinality bounds.
    pub fn with_cardinality(mut self, min: usize, max: Option<usize>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    /// Restricts values to a fixed list.
    pub fn with_into(mut self, values: Vec<Document>) -> Self {
        self.into = values;
        self
    }

    /// Sets numeric bounds.
    pub fn with_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.val_min = min;
        self.val_max = max;
        self
    }

    /// Adds a sub-keyword.
    pub fn with_keyword(mut self, keyword: KeywordDef) -> Self {
        self.keywords.push(keyword);
        self
    }

    /// Adds a rule.
    pub fn with_rule(mut self, rule: RuleDef) -> Self {
        self.rules.push(rule);
        self
    }

    /// Adds a description.
    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = Some(desc.to_string());
        self
    }

    /// Returns `true` if more than one value/occurrence is allowed.
    pub fn is_list(&self) -> bool {
        self.max != Some(1)
    }

    /// Returns `true` for a factor that may be repeated.
    pub fn is_repeatable_factor(&self) -> bool {
        self.kind == KeywordKind::Factor && self.is_list()
    }

    /// Returns `true` if `count` occurrences fit the cardinality bounds.
    pub fn accepts_count(&self, count: usize) -> bool {
        count >= self.min && self.max.is_none_or(|max| count <= max)
    }

    /// Finds a direct sub-keyword by name.
    pub fn find(&self, name: &str) -> Option<&KeywordDef> {
        self.keywords.iter().find(|k| k.name == name)
    }

    /// Finds a sub-keyword by name, looking through blocs whose keywords are
    /// flattened into this one. Direct sub-keywords take precedence.
    ///
    /// # Examples
    ///
    /// ```
    /// use command_params_core::*;
    ///
    /// let factor = KeywordDef::factor("SOLVER")
    ///     .with_keyword(KeywordDef::simple("METHOD", ValueType::Text))
    ///     .with_keyword(
    ///         KeywordDef::bloc("b_mumps", "METHOD == 'MUMPS'")
    ///             .with_keyword(KeywordDef::simple("PIVOT", ValueType::Int)),
    ///     );
    ///
    /// assert!(factor.find("PIVOT").is_none());
    /// assert!(factor.find_flattened("PIVOT").is_some());
    /// ```
    pub fn find_flattened(&self, name: &str) -> Option<&KeywordDef> {
        self.find(name).filter(|k| k.kind != KeywordKind::Bloc).or_else(|| {
            self.keywords
                .iter()
                .filter(|k| k.kind == KeywordKind::Bloc)
                .find_map(|bloc| bloc.find_flattened(name))
        })
    }

    /// Returns every non-bloc keyword reachable through blocs, in catalog
    /// order.
    pub fn flattened_keywords(&self) -> Vec<&KeywordDef> {
        let mut out = Vec::new();
        for keyword in &self.keywords {
            if keyword.kind == KeywordKind::Bloc {
                out.extend(keyword.flattened_keywords());
            } else {
                out.push(keyword);
            }
        }
        out
    }
}

/// Source of command keyword definitions.
///
/// Implemented by catalog databases. Returns `None` for unknown commands,
/// which callers treat as unsupported.
pub trait KeywordProvider {
    /// Looks up the keyword definition for a command.
    fn command(&self, name: &str) -> Option<Arc<KeywordDef>>;

    /// Returns the names of every known command.
    fn command_names(&self) -> Vec<String>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_keyword_defaults_from_json() {
        let def: KeywordDef = serde_json::from_value(json!({ "name": "INFO" })).unwrap();

        assert_eq!(def.kind, KeywordKind::Simple);
        assert_eq!(def.min, 1);
        assert_eq!(def.max, Some(1));
        assert!(!def.required);
        assert!(!def.is_list());
    }

    #[test]
    fn test_unbounded_max_from_null() {
        let def: KeywordDef =
            serde_json::from_value(json!({ "name": "GROUPS", "max": null })).unwrap();

        assert!(def.is_list());
        assert!(def.accepts_count(100));
    }

    #[test]
    fn test_find_flattened_prefers_direct_keyword() {
        let def = KeywordDef::command("CMD")
            .with_keyword(KeywordDef::simple("X", ValueType::Int))
            .with_keyword(
                KeywordDef::bloc("b", "X == 1")
                    .with_keyword(KeywordDef::simple("X", ValueType::Text))
                    .with_keyword(KeywordDef::simple("Y", ValueType::Text)),
            );

        assert_eq!(def.find_flattened("X").unwrap().value_type, ValueType::Int);
        assert_eq!(def.find_flattened("Y").unwrap().value_type, ValueType::Text);
        assert_eq!(def.flattened_keywords().len(), 3);
    }

    #[test]
    fn test_rule_satisfaction() {
        assert!(RuleKind::AllTogether.is_satisfied(&[false, false]));
        assert!(RuleKind::AllTogether.is_satisfied(&[true, true]));
        assert!(!RuleKind::AllTogether.is_satisfied(&[true, false]));
        assert!(!RuleKind::AtLeastOne.is_satisfied(&[false, false]));
        assert!(RuleKind::AtMostOne.is_satisfied(&[false, false]));
    }
}
