//! Path filters for incremental parsing.

use crate::path::{JsonPath, PathPattern};

/// Selects which parts of a document an incremental parse materializes.
///
/// Values at paths matched by a [`Pick`](PathFilter::Pick) filter are
/// assembled and emitted one by one. Members and elements matched by an
/// [`Ignore`](PathFilter::Ignore) filter are skipped entirely, including
/// inside picked values. Without any pick filter the whole document is
/// emitted as a single item.
#[derive(Debug, Clone)]
pub enum PathFilter {
    /// Emit values at matching paths.
    Pick(PathPattern),
    /// Drop values at matching paths.
    Ignore(PathPattern),
}

impl PathFilter {
    /// Picks values matching a glob, e.g. `Results.[]`.
    pub fn pick(glob: &str) -> Self {
        PathFilter::Pick(PathPattern::glob(glob))
    }

    /// Picks values whose rendered path matches `pattern`.
    pub fn pick_regex(pattern: &str) -> Result<Self, regex::Error> {
        PathPattern::regex(pattern).map(PathFilter::Pick)
    }

    /// Ignores values matching a glob.
    pub fn ignore(glob: &str) -> Self {
        PathFilter::Ignore(PathPattern::glob(glob))
    }

    /// Ignores values whose rendered path matches `pattern`.
    pub fn ignore_regex(pattern: &str) -> Result<Self, regex::Error> {
        PathPattern::regex(pattern).map(PathFilter::Ignore)
    }
}

/// Filters split by kind.
#[derive(Debug, Clone, Default)]
pub(crate) struct FilterSet {
    picks: Vec<PathPattern>,
    ignores: Vec<PathPattern>,
}

impl FilterSet {
    pub(crate) fn new(filters: impl IntoIterator<Item = PathFilter>) -> Self {
        let mut set = FilterSet::default();
        for filter in filters {
            match filter {
                PathFilter::Pick(pattern) => set.picks.push(pattern),
                PathFilter::Ignore(pattern) => set.ignores.push(pattern),
            }
        }
        set
    }

    pub(crate) fn is_picked(&self, path: &JsonPath) -> bool {
        if self.picks.is_empty() {
            path.is_root()
        } else {
            self.picks.iter().any(|pattern| pattern.matches(path))
        }
    }

    pub(crate) fn is_ignored(&self, path: &JsonPath) -> bool {
        self.ignores.iter().any(|pattern| pattern.matches(path))
    }
}
