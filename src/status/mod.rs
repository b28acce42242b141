//! # Server status query.
//!
//! The supervisor polls an external [`StatusQuery`] (for example a Minecraft
//! query-protocol client) every status interval. A success carries player and
//! version data; a failure only means that tick has no data.
//!
//! ```text
//! poll loop ──► StatusQuery::query(host)
//!                  ├─ Ok(QueryResult) ─► first success completes boot, later ones refresh Up
//!                  └─ Err(QueryError) ─► no ActiveServerInformation for this tick
//! ```

mod query_fn;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::QueryError;

pub use query_fn::QueryFn;

/// Shared handle to a status query.
pub type QueryRef = Arc<dyn StatusQuery>;

/// One player entry reported by the query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryPlayer {
    /// Player name; some servers report anonymous entries.
    pub name: Option<String>,
}

/// Result of a successful status query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Players online.
    pub numplayers: u32,
    /// Player slots.
    pub maxplayers: u32,
    /// Online players.
    #[serde(default)]
    pub players: Vec<QueryPlayer>,
    /// Server version string.
    pub version: String,
}

/// # External status query.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use mcvisor::{QueryError, QueryResult, StatusQuery};
///
/// struct AlwaysEmpty;
///
/// #[async_trait]
/// impl StatusQuery for AlwaysEmpty {
///     async fn query(&self, _host: &str) -> Result<QueryResult, QueryError> {
///         Ok(QueryResult { maxplayers: 20, version: "1.21.1".into(), ..Default::default() })
///     }
/// }
/// ```
#[async_trait]
pub trait StatusQuery: Send + Sync + 'static {
    /// Queries the server at `host` once.
    async fn query(&self, host: &str) -> Result<QueryResult, QueryError>;
}
