//! In-memory demo tree served by veapd
//!
//! A small stand-in for a real object model: objects live in a map keyed by
//! escaped path, child links are derived from the paths, and data points
//! keep a bounded history of written process values.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::{json, Value};

use veap_core::{paths, AttrValues, Link, Pv, Service, ServiceError, ServiceResult, State};

const HISTORY_CAPACITY: usize = 10_000;

struct DemoObject {
    attributes: AttrValues,
    pv: Option<Pv>,
    history: Vec<Pv>,
}

impl DemoObject {
    fn collection(title: &str) -> Self {
        let mut attributes = AttrValues::new();
        attributes.insert("title".to_string(), Value::String(title.to_string()));
        Self {
            attributes,
            pv: None,
            history: Vec::new(),
        }
    }

    fn data_point(title: &str, value: Value) -> Self {
        let mut object = Self::collection(title);
        object.pv = Some(Pv::new(Utc::now(), value, State::GOOD));
        object
    }
}

/// A demo [`Service`] with a couple of data points, usable out of the box.
pub struct DemoService {
    objects: RwLock<HashMap<String, DemoObject>>,
}

impl DemoService {
    pub fn with_demo_tree() -> Self {
        let mut objects = HashMap::new();
        objects.insert("/".to_string(), DemoObject::collection("VEAP Demo Server"));
        objects.insert("/demo".to_string(), DemoObject::collection("Demo Objects"));
        objects.insert(
            "/demo/temperature".to_string(),
            DemoObject::data_point("Room Temperature", json!(21.5)),
        );
        objects.insert(
            "/demo/switch".to_string(),
            DemoObject::data_point("Light Switch", json!(false)),
        );
        Self {
            objects: RwLock::new(objects),
        }
    }

    fn links_for(objects: &HashMap<String, DemoObject>, path: &str) -> Vec<Link> {
        let mut links = Vec::new();
        if path != "/" {
            links.push(Link::new("collection", ".."));
        }
        let mut children: Vec<&String> = objects
            .keys()
            .filter(|candidate| *candidate != path && paths::parent(candidate) == path)
            .collect();
        children.sort();
        for child in children {
            let mut link = Link::new("domain", paths::base_name(child));
            if let Some(title) = objects
                .get(child)
                .and_then(|object| object.attributes.get("title"))
                .and_then(Value::as_str)
            {
                link = link.with_title(title);
            }
            links.push(link);
        }
        links
    }
}

#[async_trait]
impl Service for DemoService {
    async fn read_pv(&self, path: &str) -> ServiceResult<Pv> {
        let objects = self.objects.read();
        let object = objects
            .get(path)
            .ok_or_else(|| ServiceError::not_found(format!("Not found: {path}")))?;
        object
            .pv
            .clone()
            .ok_or_else(|| ServiceError::not_found(format!("No process value: {path}")))
    }

    async fn write_pv(&self, path: &str, pv: Pv) -> ServiceResult<()> {
        let mut objects = self.objects.write();
        let object = objects
            .get_mut(path)
            .ok_or_else(|| ServiceError::not_found(format!("Not found: {path}")))?;
        object.history.push(pv.clone());
        object.history.sort_by_key(|entry| entry.time);
        if object.history.len() > HISTORY_CAPACITY {
            let excess = object.history.len() - HISTORY_CAPACITY;
            object.history.drain(..excess);
        }
        object.pv = Some(pv);
        Ok(())
    }

    async fn read_history(
        &self,
        path: &str,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: i64,
    ) -> ServiceResult<Vec<Pv>> {
        let objects = self.objects.read();
        let object = objects
            .get(path)
            .ok_or_else(|| ServiceError::not_found(format!("Not found: {path}")))?;
        Ok(object
            .history
            .iter()
            .filter(|entry| entry.time >= begin && entry.time < end)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn write_history(&self, path: &str, time_series: Vec<Pv>) -> ServiceResult<()> {
        let mut objects = self.objects.write();
        let object = objects
            .get_mut(path)
            .ok_or_else(|| ServiceError::not_found(format!("Not found: {path}")))?;
        let Some(min) = time_series.iter().map(|entry| entry.time).min() else {
            return Ok(());
        };
        let max = time_series
            .iter()
            .map(|entry| entry.time)
            .max()
            .unwrap_or(min);
        // the written series replaces the covered time range
        object
            .history
            .retain(|entry| entry.time < min || entry.time > max);
        object.history.extend(time_series);
        object.history.sort_by_key(|entry| entry.time);
        Ok(())
    }

    async fn read_properties(&self, path: &str) -> ServiceResult<(AttrValues, Vec<Link>)> {
        let objects = self.objects.read();
        let object = objects
            .get(path)
            .ok_or_else(|| ServiceError::not_found(format!("Not found: {path}")))?;
        Ok((object.attributes.clone(), Self::links_for(&objects, path)))
    }

    async fn write_properties(&self, path: &str, attributes: AttrValues) -> ServiceResult<bool> {
        if let Some(name) = attributes.keys().find(|name| name.starts_with('~')) {
            return Err(ServiceError::bad_request(format!(
                "Reserved attribute name: {name}"
            )));
        }
        let mut objects = self.objects.write();
        match objects.get_mut(path) {
            Some(object) => {
                for (name, value) in attributes {
                    object.attributes.insert(name, value);
                }
                Ok(false)
            }
            None => {
                objects.insert(
                    path.to_string(),
                    DemoObject {
                        attributes,
                        pv: None,
                        history: Vec::new(),
                    },
                );
                Ok(true)
            }
        }
    }

    async fn delete(&self, path: &str) -> ServiceResult<()> {
        if path == "/" {
            return Err(ServiceError::new(403, "Root cannot be deleted"));
        }
        let mut objects = self.objects.write();
        if !objects.contains_key(path) {
            return Err(ServiceError::not_found(format!("Not found: {path}")));
        }
        // the whole subtree goes away
        let subtree_prefix = format!("{path}/");
        objects.retain(|candidate, _| candidate != path && !candidate.starts_with(&subtree_prefix));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tree_navigation() {
        let service = DemoService::with_demo_tree();
        let (_, links) = service.read_properties("/").await.unwrap();
        assert!(links.iter().any(|link| link.target == "demo"));

        let (attrs, links) = service.read_properties("/demo/temperature").await.unwrap();
        assert_eq!(attrs.get("title"), Some(&json!("Room Temperature")));
        assert_eq!(links[0], Link::new("collection", ".."));
    }

    #[tokio::test]
    async fn pv_write_appends_history() {
        let service = DemoService::with_demo_tree();
        let path = "/demo/temperature";
        let begin = Utc::now();
        for value in [1, 2, 3] {
            service
                .write_pv(path, Pv::new(Utc::now(), json!(value), State::GOOD))
                .await
                .unwrap();
        }
        assert_eq!(service.read_pv(path).await.unwrap().value, json!(3));

        let end = Utc::now() + chrono::Duration::seconds(1);
        let hist = service.read_history(path, begin, end, 100).await.unwrap();
        assert_eq!(hist.len(), 3);
        assert!(hist.windows(2).all(|pair| pair[0].time <= pair[1].time));

        // the limit caps the result
        let hist = service.read_history(path, begin, end, 2).await.unwrap();
        assert_eq!(hist.len(), 2);
    }

    #[tokio::test]
    async fn history_write_replaces_range() {
        let service = DemoService::with_demo_tree();
        let path = "/demo/switch";
        let at = |ms: i64| DateTime::from_timestamp_millis(ms).unwrap();
        service
            .write_history(
                path,
                vec![
                    Pv::new(at(10), json!(1), State::GOOD),
                    Pv::new(at(20), json!(2), State::GOOD),
                    Pv::new(at(30), json!(3), State::GOOD),
                ],
            )
            .await
            .unwrap();
        // overlaps [15, 25]: the old entry at 20 goes away
        service
            .write_history(path, vec![Pv::new(at(15), json!(9), State::GOOD),
                Pv::new(at(25), json!(10), State::GOOD)])
            .await
            .unwrap();

        let hist = service
            .read_history(path, at(0), at(100), 100)
            .await
            .unwrap();
        let times: Vec<i64> = hist.iter().map(|pv| pv.time.timestamp_millis()).collect();
        assert_eq!(times, vec![10, 15, 25, 30]);
    }

    #[tokio::test]
    async fn object_lifecycle() {
        let service = DemoService::with_demo_tree();
        let attrs: AttrValues = [("title".to_string(), json!("New"))].into_iter().collect();
        assert!(service
            .write_properties("/demo/new", attrs.clone())
            .await
            .unwrap());
        assert!(!service.write_properties("/demo/new", attrs).await.unwrap());

        // reserved names are refused
        let reserved: AttrValues = [("~links".to_string(), json!([]))].into_iter().collect();
        let err = service
            .write_properties("/demo/new", reserved)
            .await
            .unwrap_err();
        assert_eq!(err.code, 400);

        service.delete("/demo").await.unwrap();
        assert!(service.read_properties("/demo/new").await.is_err());
        assert_eq!(service.delete("/demo").await.unwrap_err().code, 404);
    }
}
