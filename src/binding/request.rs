//! Binding Requests - what a binding statement asks for
//!
//! - `SourceLocation`: where the statement was written (diagnostics only)
//! - `Statement`: `import a.b [as x]` / `from a.b import x [as y], ...`
//! - `BindingRequest`: target path + attribute chain + aliases + owning scope
//!
//! Statement → request mapping:
//! ```text
//! import a.b.c            →  a  = (target "a",   chain [])
//! import a.b as x         →  x  = (target "a.b", chain [])
//! from a.b import m as y  →  y  = (target "a.b", chain ["m"])
//! ```

use std::fmt;
use std::panic::Location;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use crate::error::DeferError;
use crate::scope::{Scope, WeakScope};

/// Attribute chain (usually 0 or 1 element)
pub type AttributeChain = SmallVec<[Arc<str>; 2]>;

/// File and line of a binding statement
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    file: Arc<str>,
    line: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<Arc<str>>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    /// Location of the (track_caller-propagated) caller
    #[track_caller]
    pub fn caller() -> Self {
        let location = Location::caller();
        Self::new(location.file(), location.line())
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn line(&self) -> u32 {
        self.line
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\", line {}", self.file, self.line)
    }
}

/// Position of one name inside a `from ... import a, b, c` list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FromPosition {
    pub index: usize,
    pub count: usize,
}

impl FromPosition {
    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 >= self.count
    }
}

// ═══════════════════════════════════════════════════════════════
// STATEMENTS
// ═══════════════════════════════════════════════════════════════

/// One entry of a from-import list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportName {
    pub name: String,
    pub alias: Option<String>,
}

impl ImportName {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
        }
    }

    pub fn aliased(name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: Some(alias.into()),
        }
    }

    /// Name the entry binds in the scope
    pub fn bound_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn is_wildcard(&self) -> bool {
        self.name == "*"
    }
}

impl From<&str> for ImportName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<(&str, &str)> for ImportName {
    fn from((name, alias): (&str, &str)) -> Self {
        Self::aliased(name, alias)
    }
}

impl fmt::Display for ImportName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.alias {
            Some(alias) => write!(f, "{} as {}", self.name, alias),
            None => f.write_str(&self.name),
        }
    }
}

/// A host binding statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// `import a.b` / `import a.b as x`
    Import { path: String, alias: Option<String> },
    /// `from a.b import x as y, z`
    FromImport {
        path: String,
        names: Vec<ImportName>,
    },
}

/// One name a statement will bind
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PlannedBinding {
    pub name: String,
    pub target: String,
    pub chain: AttributeChain,
    pub position: Option<FromPosition>,
}

impl Statement {
    pub fn import(path: impl Into<String>) -> Self {
        Self::Import {
            path: path.into(),
            alias: None,
        }
    }

    pub fn import_as(path: impl Into<String>, alias: impl Into<String>) -> Self {
        Self::Import {
            path: path.into(),
            alias: Some(alias.into()),
        }
    }

    pub fn from_import<N>(path: impl Into<String>, names: impl IntoIterator<Item = N>) -> Self
    where
        N: Into<ImportName>,
    {
        Self::FromImport {
            path: path.into(),
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Import { path, .. } | Self::FromImport { path, .. } => path,
        }
    }

    /// True for `from x import *`
    pub fn is_wildcard(&self) -> bool {
        match self {
            Self::Import { .. } => false,
            Self::FromImport { names, .. } => names.iter().any(ImportName::is_wildcard),
        }
    }

    /// Scope names this statement binds, in order
    pub fn bound_names(&self) -> Vec<String> {
        self.plan().into_iter().map(|b| b.name).collect()
    }

    pub(crate) fn plan(&self) -> Vec<PlannedBinding> {
        match self {
            Self::Import { path, alias: None } => {
                let top = path.split('.').next().unwrap_or(path);
                vec![PlannedBinding {
                    name: top.to_string(),
                    target: top.to_string(),
                    chain: AttributeChain::new(),
                    position: None,
                }]
            }
            Self::Import {
                path,
                alias: Some(alias),
            } => vec![PlannedBinding {
                name: alias.clone(),
                target: path.clone(),
                chain: AttributeChain::new(),
                position: None,
            }],
            Self::FromImport { path, names } => names
                .iter()
                .enumerate()
                .map(|(index, entry)| PlannedBinding {
                    name: entry.bound_name().to_string(),
                    target: path.clone(),
                    chain: smallvec::smallvec![Arc::from(entry.name.as_str())],
                    position: Some(FromPosition {
                        index,
                        count: names.len(),
                    }),
                })
                .collect(),
        }
    }

    fn validate(self, raw: &str) -> Result<Self, DeferError> {
        let invalid = |reason: String| DeferError::InvalidStatement {
            statement: raw.to_string(),
            reason,
        };

        if !is_dotted_path(self.path()) {
            return Err(invalid(format!("'{}' is not a dotted path", self.path())));
        }
        match &self {
            Self::Import { alias, .. } => {
                if let Some(alias) = alias {
                    if !is_identifier(alias) {
                        return Err(invalid(format!("'{alias}' is not an identifier")));
                    }
                }
            }
            Self::FromImport { names, .. } => {
                if names.is_empty() {
                    return Err(invalid("nothing to import".to_string()));
                }
                for entry in names {
                    if entry.is_wildcard() {
                        if entry.alias.is_some() || names.len() > 1 {
                            return Err(invalid("'*' must be the only name".to_string()));
                        }
                        continue;
                    }
                    if !is_identifier(&entry.name) {
                        return Err(invalid(format!("'{}' is not an identifier", entry.name)));
                    }
                    if let Some(alias) = &entry.alias {
                        if !is_identifier(alias) {
                            return Err(invalid(format!("'{alias}' is not an identifier")));
                        }
                    }
                }
            }
        }
        Ok(self)
    }
}

impl FromStr for Statement {
    type Err = DeferError;

    /// Parse `import a.b [as x]` or `from a.b import x [as y], (z)`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let invalid = |reason: &str| DeferError::InvalidStatement {
            statement: raw.to_string(),
            reason: reason.to_string(),
        };
        let words: Vec<&str> = raw.split_whitespace().collect();

        let statement = match words.as_slice() {
            ["import", path] => Self::import(*path),
            ["import", path, "as", alias] => Self::import_as(*path, *alias),
            ["from", path, "import", ..] => {
                let rest = raw
                    .split_once(" import ")
                    .map(|(_, rest)| rest.trim())
                    .ok_or_else(|| invalid("missing 'import'"))?;
                let rest = rest
                    .strip_prefix('(')
                    .and_then(|r| r.strip_suffix(')'))
                    .unwrap_or(rest);
                let names = rest
                    .split(',')
                    .map(str::trim)
                    .filter(|entry| !entry.is_empty())
                    .map(|entry| parse_import_name(entry).ok_or_else(|| invalid("malformed name")))
                    .collect::<Result<Vec<_>, _>>()?;
                Self::FromImport {
                    path: (*path).to_string(),
                    names,
                }
            }
            _ => return Err(invalid("expected 'import ...' or 'from ... import ...'")),
        };

        statement.validate(raw)
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Import { path, alias: None } => write!(f, "import {path}"),
            Self::Import {
                path,
                alias: Some(alias),
            } => write!(f, "import {path} as {alias}"),
            Self::FromImport { path, names } => {
                write!(f, "from {path} import ")?;
                for (i, name) in names.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}")?;
                }
                Ok(())
            }
        }
    }
}

fn parse_import_name(entry: &str) -> Option<ImportName> {
    let words: Vec<&str> = entry.split_whitespace().collect();
    match words.as_slice() {
        [name] => Some(ImportName::new(*name)),
        [name, "as", alias] => Some(ImportName::aliased(*name, *alias)),
        _ => None,
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

fn is_dotted_path(s: &str) -> bool {
    !s.is_empty() && s.split('.').all(is_identifier)
}

// ═══════════════════════════════════════════════════════════════
// BINDING REQUEST
// ═══════════════════════════════════════════════════════════════

/// Immutable description of one deferred binding
///
/// Only `declared_aliases` changes after creation; it grows as the scope
/// rewriter discovers more names pointing at the same proxy.
pub struct BindingRequest {
    target_path: Arc<str>,
    attribute_chain: AttributeChain,
    declared_aliases: Mutex<FxHashSet<String>>,
    owning_scope: WeakScope,
    source_location: SourceLocation,
    from_position: Option<FromPosition>,
}

impl BindingRequest {
    pub fn new(
        target_path: impl Into<Arc<str>>,
        attribute_chain: AttributeChain,
        owning_scope: &Scope,
        source_location: SourceLocation,
    ) -> Self {
        Self {
            target_path: target_path.into(),
            attribute_chain,
            declared_aliases: Mutex::new(FxHashSet::default()),
            owning_scope: owning_scope.downgrade(),
            source_location,
            from_position: None,
        }
    }

    pub(crate) fn with_position(mut self, position: Option<FromPosition>) -> Self {
        self.from_position = position;
        self
    }

    /// Same target and scope, one attribute deeper, no aliases yet
    pub(crate) fn extended(&self, attribute: &str) -> Self {
        let mut attribute_chain = self.attribute_chain.clone();
        attribute_chain.push(Arc::from(attribute));
        Self {
            target_path: Arc::clone(&self.target_path),
            attribute_chain,
            declared_aliases: Mutex::new(FxHashSet::default()),
            owning_scope: self.owning_scope.clone(),
            source_location: self.source_location.clone(),
            from_position: None,
        }
    }

    pub fn target_path(&self) -> &Arc<str> {
        &self.target_path
    }

    pub fn attribute_chain(&self) -> &[Arc<str>] {
        &self.attribute_chain
    }

    /// `target.attr1.attr2`
    pub fn qualified_name(&self) -> String {
        let mut name = self.target_path.to_string();
        for attr in &self.attribute_chain {
            name.push('.');
            name.push_str(attr);
        }
        name
    }

    pub fn source_location(&self) -> &SourceLocation {
        &self.source_location
    }

    pub fn from_position(&self) -> Option<FromPosition> {
        self.from_position
    }

    /// None once the scope has been dropped
    pub fn owning_scope(&self) -> Option<Scope> {
        self.owning_scope.upgrade()
    }

    pub(crate) fn is_owned_by(&self, scope: &Scope) -> bool {
        self.owning_scope.points_to(scope)
    }

    /// Record `alias`; false when it was already known
    pub fn add_alias(&self, alias: impl Into<String>) -> bool {
        self.declared_aliases.lock().insert(alias.into())
    }

    pub fn has_alias(&self, alias: &str) -> bool {
        self.declared_aliases.lock().contains(alias)
    }

    /// Aliases, sorted
    pub fn declared_aliases(&self) -> Vec<String> {
        let mut aliases: Vec<String> = self.declared_aliases.lock().iter().cloned().collect();
        aliases.sort_unstable();
        aliases
    }
}

impl fmt::Debug for BindingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingRequest")
            .field("target_path", &self.target_path)
            .field("attribute_chain", &self.attribute_chain)
            .field("declared_aliases", &self.declared_aliases())
            .field("source_location", &self.source_location)
            .finish()
    }
}
