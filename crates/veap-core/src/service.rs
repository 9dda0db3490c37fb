//! The VEAP service contract and the default meta service

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ServiceResult;
use crate::query;
use crate::types::{
    AttrValues, Link, Pv, EXG_DATA_MARKER, QUERY_MARKER, SERVICE_MARKER,
};

/// The VEAP base services. Implemented by backends that own the object tree.
///
/// Paths are always passed in escaped form; use
/// [`crate::paths::unescape_segment`] to unescape individual segments.
#[async_trait]
pub trait Service: Send + Sync {
    /// Reads the process value of a data point. Protocol: HTTP GET on
    /// `.../~pv`.
    async fn read_pv(&self, path: &str) -> ServiceResult<Pv>;

    /// Sets the process value of a data point. Protocol: HTTP PUT on
    /// `.../~pv`.
    async fn write_pv(&self, path: &str, pv: Pv) -> ServiceResult<()>;

    /// Retrieves the history of a data point. The returned entries must be
    /// in ascending time order. Protocol: HTTP GET on `.../~hist`.
    async fn read_history(
        &self,
        path: &str,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: i64,
    ) -> ServiceResult<Vec<Pv>>;

    /// Replaces the history of a data point in the time range spanned by the
    /// given series. Protocol: HTTP PUT on `.../~hist`.
    async fn write_history(&self, path: &str, time_series: Vec<Pv>) -> ServiceResult<()>;

    /// Returns the attributes and links of a VEAP object. Protocol: HTTP GET
    /// on the object.
    async fn read_properties(&self, path: &str) -> ServiceResult<(AttrValues, Vec<Link>)>;

    /// Updates the attributes of an object, creating it if it does not exist.
    /// Returns true if a new object was created. Links are intentionally not
    /// handled. Protocol: HTTP PUT on the object.
    async fn write_properties(&self, path: &str, attributes: AttrValues) -> ServiceResult<bool>;

    /// Destroys a VEAP object. Protocol: HTTP DELETE on the object.
    async fn delete(&self, path: &str) -> ServiceResult<()>;

    /// Probes for the optional meta service capability. Backends that
    /// implement [`MetaService`] natively (e.g. with batched access to the
    /// target system) return themselves here; everyone else inherits `None`
    /// and the server falls back to [`DefaultMetaService`] semantics.
    fn meta(&self) -> Option<&dyn MetaService> {
        None
    }
}

#[async_trait]
impl<S: Service + ?Sized> Service for std::sync::Arc<S> {
    async fn read_pv(&self, path: &str) -> ServiceResult<Pv> {
        (**self).read_pv(path).await
    }

    async fn write_pv(&self, path: &str, pv: Pv) -> ServiceResult<()> {
        (**self).write_pv(path, pv).await
    }

    async fn read_history(
        &self,
        path: &str,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: i64,
    ) -> ServiceResult<Vec<Pv>> {
        (**self).read_history(path, begin, end, limit).await
    }

    async fn write_history(&self, path: &str, time_series: Vec<Pv>) -> ServiceResult<()> {
        (**self).write_history(path, time_series).await
    }

    async fn read_properties(&self, path: &str) -> ServiceResult<(AttrValues, Vec<Link>)> {
        (**self).read_properties(path).await
    }

    async fn write_properties(&self, path: &str, attributes: AttrValues) -> ServiceResult<bool> {
        (**self).write_properties(path, attributes).await
    }

    async fn delete(&self, path: &str) -> ServiceResult<()> {
        (**self).delete(path).await
    }

    fn meta(&self) -> Option<&dyn MetaService> {
        (**self).meta()
    }
}

/// Parameters of a single write within a batch exchange.
#[derive(Debug, Clone)]
pub struct WritePvParam {
    pub path: String,
    pub pv: Pv,
}

/// Result of a single read within a batch exchange.
pub type ReadPvResult = ServiceResult<Pv>;

/// One query hit: the object's path, attributes and links.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub path: String,
    pub attributes: AttrValues,
    pub links: Vec<Link>,
}

/// Additional services that can be implemented on top of [`Service`], or
/// natively by a backend for performance.
#[async_trait]
pub trait MetaService: Send + Sync {
    /// Executes multiple base services in one request: first all writes, in
    /// the given order, then all reads, in the given order. Per-operation
    /// failures are reported positionally and never abort the batch; the
    /// outer error is reserved for envelope-level failures.
    async fn exg_data(
        &self,
        write_pvs: Vec<WritePvParam>,
        read_paths: Vec<String>,
    ) -> ServiceResult<(Vec<ServiceResult<()>>, Vec<ReadPvResult>)>;

    /// Searches for objects matching any of the given path patterns. Each
    /// pattern is a `/`-separated list of glob segments evaluated against
    /// the object tree starting at the root. Patterns are evaluated
    /// independently and the results concatenated in pattern order.
    async fn query(&self, path_patterns: Vec<String>) -> ServiceResult<Vec<QueryResult>>;
}

/// Implements [`MetaService`] on top of any base [`Service`].
///
/// Also forwards the base services, augmenting the root object with the two
/// `~service` discovery links so that clients can find the meta services.
pub struct DefaultMetaService<S> {
    inner: S,
}

impl<S: Service> DefaultMetaService<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S: Service> Service for DefaultMetaService<S> {
    async fn read_pv(&self, path: &str) -> ServiceResult<Pv> {
        self.inner.read_pv(path).await
    }

    async fn write_pv(&self, path: &str, pv: Pv) -> ServiceResult<()> {
        self.inner.write_pv(path, pv).await
    }

    async fn read_history(
        &self,
        path: &str,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: i64,
    ) -> ServiceResult<Vec<Pv>> {
        self.inner.read_history(path, begin, end, limit).await
    }

    async fn write_history(&self, path: &str, time_series: Vec<Pv>) -> ServiceResult<()> {
        self.inner.write_history(path, time_series).await
    }

    async fn read_properties(&self, path: &str) -> ServiceResult<(AttrValues, Vec<Link>)> {
        let (attrs, mut links) = self.inner.read_properties(path).await?;
        if path == "/" {
            links.push(
                Link::new(SERVICE_MARKER, EXG_DATA_MARKER).with_title("ExgData Service"),
            );
            links.push(Link::new(SERVICE_MARKER, QUERY_MARKER).with_title("Search Service"));
        }
        Ok((attrs, links))
    }

    async fn write_properties(&self, path: &str, attributes: AttrValues) -> ServiceResult<bool> {
        self.inner.write_properties(path, attributes).await
    }

    async fn delete(&self, path: &str) -> ServiceResult<()> {
        self.inner.delete(path).await
    }

    fn meta(&self) -> Option<&dyn MetaService> {
        Some(self)
    }
}

#[async_trait]
impl<S: Service> MetaService for DefaultMetaService<S> {
    async fn exg_data(
        &self,
        write_pvs: Vec<WritePvParam>,
        read_paths: Vec<String>,
    ) -> ServiceResult<(Vec<ServiceResult<()>>, Vec<ReadPvResult>)> {
        // all writes first, then all reads: a read observes a preceding
        // write to the same path
        let mut write_errors = Vec::with_capacity(write_pvs.len());
        for param in write_pvs {
            write_errors.push(self.write_pv(&param.path, param.pv).await);
        }
        let mut read_results = Vec::with_capacity(read_paths.len());
        for path in &read_paths {
            read_results.push(self.read_pv(path).await);
        }
        Ok((write_errors, read_results))
    }

    async fn query(&self, path_patterns: Vec<String>) -> ServiceResult<Vec<QueryResult>> {
        let mut results = Vec::new();
        for pattern in &path_patterns {
            query::collect_matches(self, pattern, &mut results).await?;
        }
        Ok(results)
    }
}
