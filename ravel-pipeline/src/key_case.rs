//! Object-key case conversion.
//!
//! Server payloads use PascalCase member names while callers usually want
//! camelCase. [`KeyCaseTransform`] renames keys between the two conventions,
//! either on a parsed [`Value`] or on the key tokens of an incremental parse,
//! while leaving server-controlled names alone:
//!
//! - keys whose name matches the `ignore_keys` expression (e.g. `@id`)
//! - every key strictly below a path matching one of the `ignore_paths`
//!   patterns (e.g. the contents of `@metadata`)
//!
//! Paths are always absolute: they are matched against the location inside
//! the whole document, independently of which sub-values a filter picked.

use regex::Regex;
use serde_json::{Map, Value};

use crate::path::{JsonPath, PathPattern, Segment};

/// Naming convention applied to object keys.
///
/// Only the first character changes; the rest of the key is kept verbatim,
/// so `Pascal` undoes `Camel` for keys that started upper-case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyConvention {
    /// Lower-case first letter: `LastName` → `lastName`.
    Camel,
    /// Upper-case first letter: `lastName` → `LastName`.
    Pascal,
}

impl KeyConvention {
    /// Converts one key.
    pub fn convert(self, key: &str) -> String {
        let mut chars = key.chars();
        match chars.next() {
            Some(first) => {
                let mut converted: String = match self {
                    KeyConvention::Camel => first.to_lowercase().collect(),
                    KeyConvention::Pascal => first.to_uppercase().collect(),
                };
                converted.push_str(chars.as_str());
                converted
            }
            None => String::new(),
        }
    }
}

/// Named conversion profiles commands refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCaseProfile {
    /// Camel case everywhere.
    Default,
    /// Camel case, keeping `@`-prefixed keys and the contents of `@metadata`.
    DocumentLoad,
    /// As [`DocumentLoad`](Self::DocumentLoad), also keeping the contents of
    /// the top-level `Includes` map, whose keys are document ids.
    DocumentQuery,
    /// Pascal case everywhere; converts caller payloads back to server names.
    ServerResponse,
}

/// Renames object keys per a [`KeyConvention`], honoring exclusions.
#[derive(Debug, Clone)]
pub struct KeyCaseTransform {
    convention: KeyConvention,
    ignore_keys: Option<Regex>,
    ignore_paths: Vec<PathPattern>,
}

const METADATA_KEY_PREFIX: &str = "^@";
const BELOW_METADATA: &str = r"(^|\.)@metadata$";
const BELOW_INCLUDES: &str = r"^Includes$";

impl KeyCaseTransform {
    /// A transform without exclusions.
    pub fn new(convention: KeyConvention) -> Self {
        Self {
            convention,
            ignore_keys: None,
            ignore_paths: Vec::new(),
        }
    }

    /// The transform configured by a named profile.
    pub fn profile(profile: KeyCaseProfile) -> Self {
        match profile {
            KeyCaseProfile::Default => Self::new(KeyConvention::Camel),
            KeyCaseProfile::DocumentLoad => Self::new(KeyConvention::Camel)
                .with_builtin_exclusions(&[BELOW_METADATA]),
            KeyCaseProfile::DocumentQuery => Self::new(KeyConvention::Camel)
                .with_builtin_exclusions(&[BELOW_METADATA, BELOW_INCLUDES]),
            KeyCaseProfile::ServerResponse => Self::new(KeyConvention::Pascal),
        }
    }

    fn with_builtin_exclusions(mut self, paths: &[&str]) -> Self {
        self.ignore_keys = Regex::new(METADATA_KEY_PREFIX).ok();
        self.ignore_paths
            .extend(paths.iter().filter_map(|p| PathPattern::regex(p).ok()));
        self
    }

    /// Keeps keys whose name matches `pattern`.
    pub fn ignore_keys(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.ignore_keys = Some(Regex::new(pattern)?);
        Ok(self)
    }

    /// Keeps every key below paths selected by `pattern`.
    pub fn ignore_path(mut self, pattern: PathPattern) -> Self {
        self.ignore_paths.push(pattern);
        self
    }

    /// The active convention.
    pub fn convention(&self) -> KeyConvention {
        self.convention
    }

    /// Whether the key ending `path` keeps its name.
    pub fn is_ignored(&self, path: &JsonPath) -> bool {
        let segments = path.segments();
        let Some(Segment::Key(key)) = segments.last() else {
            return true;
        };
        if self.ignore_keys.as_ref().is_some_and(|re| re.is_match(key)) {
            return true;
        }
        (1..segments.len()).any(|len| {
            let ancestor = &segments[..len];
            self.ignore_paths
                .iter()
                .any(|pattern| pattern.matches_segments(ancestor))
        })
    }

    /// The new name of the key ending `path`.
    pub fn rename(&self, path: &JsonPath) -> Option<String> {
        if self.is_ignored(path) {
            return None;
        }
        path.last_key().map(|key| self.convention.convert(key))
    }

    /// Renames the keys of `value`, located at `path` in the document.
    pub fn apply(&self, value: &mut Value, path: &JsonPath) {
        let mut path = path.clone();
        self.walk(value, &mut path);
    }

    fn walk(&self, value: &mut Value, path: &mut JsonPath) {
        match value {
            Value::Object(map) => {
                let members = std::mem::take(map);
                let mut renamed = Map::with_capacity(members.len());
                for (key, mut child) in members {
                    path.push(Segment::Key(key));
                    self.walk(&mut child, path);
                    let name = self.rename(path);
                    if let Some(Segment::Key(original)) = path.pop() {
                        renamed.insert(name.unwrap_or(original), child);
                    }
                }
                *map = renamed;
            }
            Value::Array(items) => {
                for (index, child) in items.iter_mut().enumerate() {
                    path.push(Segment::Index(index));
                    self.walk(child, path);
                    path.pop();
                }
            }
            _ => {}
        }
    }
}

impl From<KeyCaseProfile> for KeyCaseTransform {
    fn from(profile: KeyCaseProfile) -> Self {
        KeyCaseTransform::profile(profile)
    }
}
