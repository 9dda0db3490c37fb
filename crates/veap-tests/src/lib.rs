//! Shared in-memory service fixtures for the VEAP integration tests
//!
//! These are intentionally minimal stand-ins for a real object model: just
//! enough backend to exercise every protocol operation.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;

use veap_core::{paths, AttrValues, Link, Pv, Service, ServiceError, ServiceResult};

/// Captured parameters of a `read_history` call.
#[derive(Debug, Clone)]
pub struct HistoryRequest {
    pub path: String,
    pub begin: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub limit: i64,
}

/// A configurable service double: canned results per operation plus capture
/// slots recording the last request. Operations without a configured result
/// fail with an internal error.
#[derive(Default)]
pub struct MockService {
    pub read_pv_result: Mutex<Option<ServiceResult<Pv>>>,
    pub write_pv_result: Mutex<Option<ServiceResult<()>>>,
    pub read_history_result: Mutex<Option<ServiceResult<Vec<Pv>>>>,
    pub write_history_result: Mutex<Option<ServiceResult<()>>>,
    pub read_properties_result: Mutex<Option<ServiceResult<(AttrValues, Vec<Link>)>>>,
    pub write_properties_result: Mutex<Option<ServiceResult<bool>>>,
    pub delete_result: Mutex<Option<ServiceResult<()>>>,

    pub written_pv: Mutex<Option<(String, Pv)>>,
    pub history_request: Mutex<Option<HistoryRequest>>,
    pub written_history: Mutex<Option<(String, Vec<Pv>)>>,
    pub written_properties: Mutex<Option<(String, AttrValues)>>,
    pub deleted_path: Mutex<Option<String>>,
}

fn not_provided<T>(operation: &str) -> ServiceResult<T> {
    Err(ServiceError::internal(format!("{operation} not provided")))
}

#[async_trait]
impl Service for MockService {
    async fn read_pv(&self, _path: &str) -> ServiceResult<Pv> {
        self.read_pv_result
            .lock()
            .clone()
            .unwrap_or_else(|| not_provided("ReadPV"))
    }

    async fn write_pv(&self, path: &str, pv: Pv) -> ServiceResult<()> {
        *self.written_pv.lock() = Some((path.to_string(), pv));
        self.write_pv_result
            .lock()
            .clone()
            .unwrap_or_else(|| not_provided("WritePV"))
    }

    async fn read_history(
        &self,
        path: &str,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: i64,
    ) -> ServiceResult<Vec<Pv>> {
        *self.history_request.lock() = Some(HistoryRequest {
            path: path.to_string(),
            begin,
            end,
            limit,
        });
        self.read_history_result
            .lock()
            .clone()
            .unwrap_or_else(|| not_provided("ReadHistory"))
    }

    async fn write_history(&self, path: &str, time_series: Vec<Pv>) -> ServiceResult<()> {
        *self.written_history.lock() = Some((path.to_string(), time_series));
        self.write_history_result
            .lock()
            .clone()
            .unwrap_or_else(|| not_provided("WriteHistory"))
    }

    async fn read_properties(&self, _path: &str) -> ServiceResult<(AttrValues, Vec<Link>)> {
        self.read_properties_result
            .lock()
            .clone()
            .unwrap_or_else(|| not_provided("ReadProperties"))
    }

    async fn write_properties(&self, path: &str, attributes: AttrValues) -> ServiceResult<bool> {
        *self.written_properties.lock() = Some((path.to_string(), attributes));
        self.write_properties_result
            .lock()
            .clone()
            .unwrap_or_else(|| not_provided("WriteProperties"))
    }

    async fn delete(&self, path: &str) -> ServiceResult<()> {
        *self.deleted_path.lock() = Some(path.to_string());
        self.delete_result
            .lock()
            .clone()
            .unwrap_or_else(|| not_provided("Delete"))
    }
}

/// A flat map of data points. Reads and writes address existing variables
/// only; unknown paths fail with NotFound.
pub struct VarService {
    vars: Mutex<HashMap<String, Pv>>,
}

impl VarService {
    pub fn new(initial: impl IntoIterator<Item = (String, Pv)>) -> Self {
        Self {
            vars: Mutex::new(initial.into_iter().collect()),
        }
    }

    pub fn get(&self, path: &str) -> Option<Pv> {
        self.vars.lock().get(path).cloned()
    }
}

#[async_trait]
impl Service for VarService {
    async fn read_pv(&self, path: &str) -> ServiceResult<Pv> {
        self.get(path)
            .ok_or_else(|| ServiceError::not_found(format!("Not found: {path}")))
    }

    async fn write_pv(&self, path: &str, pv: Pv) -> ServiceResult<()> {
        let mut vars = self.vars.lock();
        match vars.get_mut(path) {
            Some(slot) => {
                *slot = pv;
                Ok(())
            }
            None => Err(ServiceError::not_found(format!("Not found: {path}"))),
        }
    }

    async fn read_history(
        &self,
        _path: &str,
        _begin: DateTime<Utc>,
        _end: DateTime<Utc>,
        _limit: i64,
    ) -> ServiceResult<Vec<Pv>> {
        not_provided("ReadHistory")
    }

    async fn write_history(&self, _path: &str, _time_series: Vec<Pv>) -> ServiceResult<()> {
        not_provided("WriteHistory")
    }

    async fn read_properties(&self, _path: &str) -> ServiceResult<(AttrValues, Vec<Link>)> {
        not_provided("ReadProperties")
    }

    async fn write_properties(&self, _path: &str, _attributes: AttrValues) -> ServiceResult<bool> {
        not_provided("WriteProperties")
    }

    async fn delete(&self, _path: &str) -> ServiceResult<()> {
        not_provided("Delete")
    }
}

struct TreeNode {
    identifier: String,
    title: String,
    children: Vec<String>,
}

/// A read-only tree of nested domains, keyed by escaped path. Every node has
/// `identifier` and `title` attributes, a `collection` link to its parent
/// and one link per child.
pub struct TreeService {
    nodes: HashMap<String, TreeNode>,
}

impl TreeService {
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            "/".to_string(),
            TreeNode {
                identifier: String::new(),
                title: String::new(),
                children: Vec::new(),
            },
        );
        Self { nodes }
    }

    /// Adds a domain under `parent` (an escaped path) and returns the new
    /// domain's escaped path.
    pub fn add_domain(&mut self, parent: &str, ident: &str, title: &str) -> String {
        let escaped = paths::escape_segment(ident);
        let path = if parent == "/" {
            format!("/{escaped}")
        } else {
            format!("{parent}/{escaped}")
        };
        if let Some(node) = self.nodes.get_mut(parent) {
            node.children.push(path.clone());
        }
        self.nodes.insert(
            path.clone(),
            TreeNode {
                identifier: ident.to_string(),
                title: title.to_string(),
                children: Vec::new(),
            },
        );
        path
    }

    /// Builds a uniform tree: every node down to `depth` gets the three
    /// children `a97`, `b98` and `c99`.
    pub fn build_uniform(&mut self, parent: &str, depth: usize) {
        if depth == 0 {
            return;
        }
        for ch in ['a', 'b', 'c'] {
            let ident = format!("{ch}{}", ch as u32);
            let path = self.add_domain(parent, &ident, &ident);
            self.build_uniform(&path, depth - 1);
        }
    }
}

impl Default for TreeService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Service for TreeService {
    async fn read_pv(&self, _path: &str) -> ServiceResult<Pv> {
        not_provided("ReadPV")
    }

    async fn write_pv(&self, _path: &str, _pv: Pv) -> ServiceResult<()> {
        not_provided("WritePV")
    }

    async fn read_history(
        &self,
        _path: &str,
        _begin: DateTime<Utc>,
        _end: DateTime<Utc>,
        _limit: i64,
    ) -> ServiceResult<Vec<Pv>> {
        not_provided("ReadHistory")
    }

    async fn write_history(&self, _path: &str, _time_series: Vec<Pv>) -> ServiceResult<()> {
        not_provided("WriteHistory")
    }

    async fn read_properties(&self, path: &str) -> ServiceResult<(AttrValues, Vec<Link>)> {
        let node = self
            .nodes
            .get(path)
            .ok_or_else(|| ServiceError::not_found(format!("Not found: {path}")))?;

        let mut attrs = AttrValues::new();
        attrs.insert(
            "identifier".to_string(),
            Value::String(node.identifier.clone()),
        );
        attrs.insert("title".to_string(), Value::String(node.title.clone()));

        let mut links = Vec::new();
        if path != "/" {
            let parent_title = self
                .nodes
                .get(&paths::parent(path))
                .map(|parent| parent.title.clone())
                .unwrap_or_default();
            let mut link = Link::new("collection", "..");
            if !parent_title.is_empty() {
                link = link.with_title(parent_title);
            }
            links.push(link);
        }
        for child in &node.children {
            let mut link = Link::new("domain", paths::base_name(child));
            if let Some(child_node) = self.nodes.get(child) {
                if !child_node.title.is_empty() {
                    link = link.with_title(child_node.title.clone());
                }
            }
            links.push(link);
        }
        Ok((attrs, links))
    }

    async fn write_properties(&self, _path: &str, _attributes: AttrValues) -> ServiceResult<bool> {
        not_provided("WriteProperties")
    }

    async fn delete(&self, _path: &str) -> ServiceResult<()> {
        not_provided("Delete")
    }
}
