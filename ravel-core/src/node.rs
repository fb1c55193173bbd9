//! Resolved server endpoint.

use std::fmt;

/// A server node resolved by the topology collaborator.
///
/// The executor never selects or fails over between nodes; it receives one
/// node per invocation and builds every URL from it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerNode {
    url: String,
    database: String,
}

impl ServerNode {
    /// Creates a node from its base URL and database name.
    ///
    /// Trailing slashes on the URL are dropped so that path concatenation
    /// stays deterministic (and with it, the derived cache keys).
    pub fn new(url: impl Into<String>, database: impl Into<String>) -> Self {
        let url = url.into();
        let url = url.trim_end_matches('/').to_owned();
        Self {
            url,
            database: database.into(),
        }
    }

    /// Base URL of the node, without trailing slash.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Database name this node serves for the invocation.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// `{url}/databases/{database}`, the prefix of every database-scoped path.
    pub fn database_url(&self) -> String {
        format!("{}/databases/{}", self.url, self.database)
    }
}

impl fmt::Display for ServerNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.url, self.database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_url_trims_trailing_slash() {
        let node = ServerNode::new("http://localhost:8080/", "northwind");
        assert_eq!(node.url(), "http://localhost:8080");
        assert_eq!(node.database_url(), "http://localhost:8080/databases/northwind");
    }
}
