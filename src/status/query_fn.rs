//! # Closure-backed status query (`QueryFn`).
//!
//! [`QueryFn`] wraps `F: Fn(String) -> Fut`, producing a fresh future per poll.
//! Shared state goes into the closure explicitly as `Arc<...>`.
//!
//! ## Example
//! ```rust
//! use mcvisor::{QueryFn, QueryRef, QueryResult, QueryError};
//!
//! let q: QueryRef = QueryFn::arc(|_host: String| async move {
//!     Ok::<_, QueryError>(QueryResult { maxplayers: 10, ..Default::default() })
//! });
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use super::{QueryResult, StatusQuery};
use crate::error::QueryError;

/// Function-backed [`StatusQuery`].
#[derive(Debug)]
pub struct QueryFn<F> {
    f: F,
}

impl<F> QueryFn<F> {
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Wraps `f` and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<F, Fut> StatusQuery for QueryFn<F>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<QueryResult, QueryError>> + Send + 'static,
{
    async fn query(&self, host: &str) -> Result<QueryResult, QueryError> {
        (self.f)(host.to_string()).await
    }
}
