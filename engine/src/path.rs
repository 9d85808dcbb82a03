//! Addresses of keywords inside a command catalog.
//!
//! A [`SchemaPath`] is a command root plus a dot-separated path such as
//! `STATIC.LOAD.0.CHARGE`. Name segments walk down the catalog; an index
//! segment (all digits) selects a list element and does not consume a catalog
//! level.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use command_params_core::{KeywordDef, ValueType};
//! use command_params_engine::SchemaPath;
//!
//! let command = Arc::new(
//!     KeywordDef::command("STATIC").with_keyword(
//!         KeywordDef::factor("LOAD")
//!             .with_cardinality(1, None)
//!             .with_keyword(KeywordDef::simple("CHARGE", ValueType::Object)),
//!     ),
//! );
//!
//! let path = SchemaPath::root(command.clone()).absolute("LOAD.0.CHARGE");
//! assert_eq!(path.resolve().map(|k| k.name.as_str()), Some("CHARGE"));
//! assert!(path.parent().is_some_and(|p| p.is_sequence_element()));
//!
//! let unknown = SchemaPath::root(command).absolute("NOPE");
//! assert!(unknown.resolve().is_none());
//! ```

use std::cell::OnceCell;
use std::fmt;
use std::sync::Arc;

use command_params_core::KeywordDef;

/// Segment delimiter.
pub const DELIMITER: char = '.';

#[derive(Debug, Clone)]
struct Resolution {
    /// Keyword indices from the root, `None` if a segment is undeclared.
    chain: Option<Vec<usize>>,
    element: bool,
}

/// Immutable address of a keyword location within one command.
///
/// Resolution against the catalog is computed on first use and cached; the
/// only way to change a path is [`rename`](SchemaPath::rename), which returns
/// a fresh path.
#[derive(Clone)]
pub struct SchemaPath {
    root: Arc<KeywordDef>,
    path: String,
    resolved: OnceCell<Resolution>,
}

impl SchemaPath {
    /// Creates a path from a command root and a full dot-path. The first
    /// segment is expected to be the command name.
    pub fn new(root: Arc<KeywordDef>, path: impl Into<String>) -> Self {
        Self {
            root,
            path: path.into(),
            resolved: OnceCell::new(),
        }
    }

    /// Path of the command root itself.
    pub fn root(root: Arc<KeywordDef>) -> Self {
        let name = root.name.clone();
        Self::new(root, name)
    }

    /// The command definition this path is rooted at.
    pub fn command(&self) -> &Arc<KeywordDef> {
        &self.root
    }

    /// Full dot-path.
    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// Last segment.
    pub fn name(&self) -> &str {
        self.path
            .rsplit_once(DELIMITER)
            .map_or(self.path.as_str(), |(_, name)| name)
    }

    /// Every segment, root first.
    pub fn names(&self) -> Vec<&str> {
        self.path.split(DELIMITER).collect()
    }

    /// Path of the enclosing location, `None` at the command root.
    pub fn parent(&self) -> Option<SchemaPath> {
        self.path
            .rsplit_once(DELIMITER)
            .map(|(parent, _)| Self::new(self.root.clone(), parent))
    }

    /// Appends a relative dot-path.
    pub fn absolute(&self, relative: &str) -> SchemaPath {
        if relative.is_empty() {
            return self.clone();
        }
        Self::new(
            self.root.clone(),
            format!("{}{}{}", self.path, DELIMITER, relative),
        )
    }

    /// Returns this path relative to `base`, or `None` if `base` is not an
    /// ancestor-or-self.
    pub fn relative_to(&self, base: &SchemaPath) -> Option<String> {
        if self.path == base.path {
            return Some(String::new());
        }
        self.path
            .strip_prefix(base.path.as_str())
            .and_then(|rest| rest.strip_prefix(DELIMITER))
            .map(str::to_string)
    }

    /// Replaces the last segment.
    pub fn rename(&self, name: &str) -> SchemaPath {
        match self.parent() {
            Some(parent) => parent.absolute(name),
            None => Self::new(self.root.clone(), name),
        }
    }

    /// Returns `true` if the location holds more than one value.
    pub fn is_sequence(&self) -> bool {
        !self.is_sequence_element() && self.resolve().is_some_and(KeywordDef::is_list)
    }

    /// Returns `true` if the last segment is a list index.
    pub fn is_sequence_element(&self) -> bool {
        self.resolution().element
    }

    /// The catalog keyword at this location. For an element path this is the
    /// list keyword itself.
    pub fn resolve(&self) -> Option<&KeywordDef> {
        let chain = self.resolution().chain.as_ref()?;
        let mut def = self.root.as_ref();
        for index in chain {
            def = def.keywords.get(*index)?;
        }
        Some(def)
    }

    fn resolution(&self) -> &Resolution {
        self.resolved.get_or_init(|| resolve_segments(&self.root, &self.path))
    }
}

fn is_index(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

fn resolve_segments(root: &KeywordDef, path: &str) -> Resolution {
    let mut segments = path.split(DELIMITER);
    if segments.next() != Some(root.name.as_str()) {
        return Resolution {
            chain: None,
            element: false,
        };
    }

    let mut def = root;
    let mut chain = Vec::new();
    let mut element = false;
    for segment in segments {
        if let Some(index) = def.keywords.iter().position(|k| k.name == segment) {
            chain.push(index);
            def = &def.keywords[index];
            element = false;
            continue;
        }
        // One index per list level; anything else is not a catalog keyword.
        if is_index(segment) && def.is_list() && !element {
            element = true;
            continue;
        }
        return Resolution {
            chain: None,
            element: false,
        };
    }

    Resolution {
        chain: Some(chain),
        element,
    }
}

impl PartialEq for SchemaPath {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && Arc::ptr_eq(&self.root, &other.root)
    }
}

impl Eq for SchemaPath {}

impl fmt::Display for SchemaPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl fmt::Debug for SchemaPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SchemaPath").field(&self.path).finish()
    }
}
