//! Query service tests: glob traversal over an in-memory domain tree

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use veap_core::{
    AttrValues, DefaultMetaService, Link, MetaService, Pv, Service, ServiceResult,
};
use veap_tests::TreeService;

fn deep_tree() -> DefaultMetaService<TreeService> {
    let mut tree = TreeService::new();
    tree.build_uniform("/", 4);
    tree.add_domain("/", "ä", "ä");
    DefaultMetaService::new(tree)
}

async fn query_paths(
    service: &DefaultMetaService<TreeService>,
    patterns: &[&str],
) -> ServiceResult<Vec<String>> {
    let results = service
        .query(patterns.iter().map(|p| p.to_string()).collect())
        .await?;
    let mut paths: Vec<String> = results.into_iter().map(|r| r.path).collect();
    paths.sort();
    Ok(paths)
}

#[tokio::test]
async fn glob_patterns_match_the_tree() {
    let service = deep_tree();

    let cases: Vec<(Vec<&str>, Vec<&str>)> = vec![
        (vec!["/"], vec!["/"]),
        (vec!["/a97"], vec!["/a97"]),
        (vec!["/notExists/notExists"], vec![]),
        (vec!["/*"], vec!["/%C3%A4", "/a97", "/b98", "/c99"]),
        (vec!["/a97/??[8-9]"], vec!["/a97/b98", "/a97/c99"]),
        (vec!["/*98/??[8-9]"], vec!["/b98/b98", "/b98/c99"]),
        (
            vec!["/a97/??[^7]/*"],
            vec![
                "/a97/b98/a97",
                "/a97/b98/b98",
                "/a97/b98/c99",
                "/a97/c99/a97",
                "/a97/c99/b98",
                "/a97/c99/c99",
            ],
        ),
        // a leading slash is optional
        (vec!["a97/??[8-9]"], vec!["/a97/b98", "/a97/c99"]),
    ];

    for (patterns, expected) in cases {
        let paths = query_paths(&service, &patterns).await.unwrap();
        assert_eq!(paths, expected, "patterns {patterns:?}");
    }
}

#[tokio::test]
async fn malformed_patterns_fail_the_whole_query() {
    let service = deep_tree();

    for pattern in ["[", "%"] {
        let err = query_paths(&service, &[pattern]).await.unwrap_err();
        assert_eq!(err.code, 400, "pattern {pattern:?}");
        assert!(
            err.message
                .contains(&format!("Invalid content '{pattern}' in URL parameter")),
            "pattern {pattern:?}: {}",
            err.message
        );
    }
}

#[tokio::test]
async fn results_follow_pattern_order() {
    let service = deep_tree();

    let results = service
        .query(vec!["/b98".to_string(), "/a97".to_string()])
        .await
        .unwrap();
    let paths: Vec<&str> = results.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(paths, vec!["/b98", "/a97"]);
}

#[tokio::test]
async fn query_results_carry_attributes_and_links() {
    let service = deep_tree();

    let results = service.query(vec!["/a97/b98".to_string()]).await.unwrap();
    assert_eq!(results.len(), 1);
    let result = &results[0];
    assert_eq!(result.path, "/a97/b98");
    assert_eq!(result.attributes.get("identifier"), Some(&json!("b98")));
    assert_eq!(result.attributes.get("title"), Some(&json!("b98")));
    assert!(result
        .links
        .iter()
        .any(|link| link.role == "collection" && link.target == ".."));
}

/// Two links to the same child: hits are not deduplicated.
struct DoubleLinked;

#[async_trait]
impl Service for DoubleLinked {
    async fn read_pv(&self, _path: &str) -> ServiceResult<Pv> {
        unimplemented!()
    }

    async fn write_pv(&self, _path: &str, _pv: Pv) -> ServiceResult<()> {
        unimplemented!()
    }

    async fn read_history(
        &self,
        _path: &str,
        _begin: DateTime<Utc>,
        _end: DateTime<Utc>,
        _limit: i64,
    ) -> ServiceResult<Vec<Pv>> {
        unimplemented!()
    }

    async fn write_history(&self, _path: &str, _time_series: Vec<Pv>) -> ServiceResult<()> {
        unimplemented!()
    }

    async fn read_properties(&self, path: &str) -> ServiceResult<(AttrValues, Vec<Link>)> {
        let links = if path == "/" {
            vec![Link::new("domain", "a"), Link::new("domain", "a")]
        } else {
            vec![]
        };
        Ok((AttrValues::new(), links))
    }

    async fn write_properties(&self, _path: &str, _attributes: AttrValues) -> ServiceResult<bool> {
        unimplemented!()
    }

    async fn delete(&self, _path: &str) -> ServiceResult<()> {
        unimplemented!()
    }
}

#[tokio::test]
async fn duplicate_links_yield_duplicate_hits() {
    let service = DefaultMetaService::new(DoubleLinked);
    let results = service.query(vec!["/*".to_string()]).await.unwrap();
    let paths: Vec<&str> = results.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(paths, vec!["/a", "/a"]);
}
