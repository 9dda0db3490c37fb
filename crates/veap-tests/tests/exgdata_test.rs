//! Batch exchange tests: wire shape, partial failure and operation ordering

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use veap_client::testing::TestServer;
use veap_core::{
    AttrValues, DefaultMetaService, Link, MetaService, Pv, Service, ServiceError, ServiceResult,
    State, WritePvParam,
};
use veap_server::{router, Handler};
use veap_tests::VarService;
use veap_wire::millis_to_time;

/// Knows `/a` and `/b` with fixed read values; writes validate the value.
struct ExgFixture;

#[async_trait]
impl Service for ExgFixture {
    async fn read_pv(&self, path: &str) -> ServiceResult<Pv> {
        match path {
            "/a" => Ok(Pv::new(millis_to_time(0), json!(1), State::GOOD)),
            "/b" => Ok(Pv::new(millis_to_time(0), json!("bbb"), State::GOOD)),
            _ => Err(ServiceError::not_found(format!("Not found: {path}"))),
        }
    }

    async fn write_pv(&self, path: &str, pv: Pv) -> ServiceResult<()> {
        match path {
            "/a" if pv.value == json!(2.0) => Ok(()),
            "/a" => Err(ServiceError::bad_request("Invalid value for /a")),
            "/b" if pv.value == json!("aaa") => Ok(()),
            "/b" => Err(ServiceError::bad_request("Invalid value for /b")),
            _ => Err(ServiceError::not_found(format!("Not found: {path}"))),
        }
    }

    async fn read_history(
        &self,
        _path: &str,
        _begin: DateTime<Utc>,
        _end: DateTime<Utc>,
        _limit: i64,
    ) -> ServiceResult<Vec<Pv>> {
        Err(ServiceError::internal("ReadHistory not provided"))
    }

    async fn write_history(&self, _path: &str, _time_series: Vec<Pv>) -> ServiceResult<()> {
        Err(ServiceError::internal("WriteHistory not provided"))
    }

    async fn read_properties(&self, _path: &str) -> ServiceResult<(AttrValues, Vec<Link>)> {
        Err(ServiceError::internal("ReadProperties not provided"))
    }

    async fn write_properties(&self, _path: &str, _attributes: AttrValues) -> ServiceResult<bool> {
        Err(ServiceError::internal("WriteProperties not provided"))
    }

    async fn delete(&self, _path: &str) -> ServiceResult<()> {
        Err(ServiceError::internal("Delete not provided"))
    }
}

async fn start_exg_server() -> TestServer {
    let service = Arc::new(DefaultMetaService::new(ExgFixture));
    let handler = Arc::new(Handler::new(service));
    TestServer::start(router(handler)).await.unwrap()
}

#[tokio::test]
async fn exgdata_partial_failure_is_positional() {
    let server = start_exg_server().await;
    let client = reqwest::Client::new();

    // an empty body is not a valid envelope
    let response = client
        .put(format!("{}/~exgdata", server.base_url()))
        .body("")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let body = r#"{
        "writePVs":[
            {"path":"/a","pv":{"v":2.0}},
            {"path":"/b","pv":{"v":"aaa"}},
            {"path":"/c"}
        ],
        "readPaths":[
            "/a",
            "/b",
            "/c"
        ]
    }"#;
    let response = client
        .put(format!("{}/~exgdata", server.base_url()))
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(
        response.text().await.unwrap(),
        r#"{"writeErrors":[null,null,{"code":404,"message":"Not found: /c"}],"readResults":[{"pv":{"ts":0,"v":1,"s":0}},{"pv":{"ts":0,"v":"bbb","s":0}},{"error":{"code":404,"message":"Not found: /c"}}]}"#
    );

    // failed writes do not abort the batch either
    let body = r#"{
        "writePVs":[
            {"path":"/a","pv":{"v":1.0}},
            {"path":"/b","pv":{"v":"bbb"}}
        ],
        "readPaths":[
            "/d"
        ]
    }"#;
    let response = client
        .put(format!("{}/~exgdata", server.base_url()))
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(
        response.text().await.unwrap(),
        r#"{"writeErrors":[{"code":400,"message":"Invalid value for /a"},{"code":400,"message":"Invalid value for /b"}],"readResults":[{"error":{"code":404,"message":"Not found: /d"}}]}"#
    );
}

#[tokio::test]
async fn exgdata_writes_complete_before_reads() {
    let vars = VarService::new([(
        "/a".to_string(),
        Pv::new(millis_to_time(1000), json!(0), State::GOOD),
    )]);
    let service = DefaultMetaService::new(vars);

    let written = Pv::new(millis_to_time(5), json!(42), State::UNCERTAIN);
    let (write_errors, read_results) = service
        .exg_data(
            vec![WritePvParam {
                path: "/a".to_string(),
                pv: written.clone(),
            }],
            vec!["/a".to_string()],
        )
        .await
        .unwrap();

    // slices stay positional
    assert_eq!(write_errors.len(), 1);
    assert_eq!(read_results.len(), 1);
    assert!(write_errors[0].is_ok());
    // the read observes the preceding write at the same path
    assert_eq!(read_results[0].as_ref().unwrap(), &written);
}

#[tokio::test]
async fn exgdata_result_lengths_match_request() {
    let service = DefaultMetaService::new(VarService::new([]));

    let (write_errors, read_results) = service
        .exg_data(
            vec![
                WritePvParam {
                    path: "/missing".to_string(),
                    pv: Pv::new(millis_to_time(1), json!(1), State::GOOD),
                },
                WritePvParam {
                    path: "/also-missing".to_string(),
                    pv: Pv::new(millis_to_time(2), json!(2), State::GOOD),
                },
            ],
            vec!["/x".to_string(), "/y".to_string(), "/z".to_string()],
        )
        .await
        .unwrap();

    assert_eq!(write_errors.len(), 2);
    assert_eq!(read_results.len(), 3);
    assert!(write_errors.iter().all(|r| r.is_err()));
    assert!(read_results.iter().all(|r| r.is_err()));
}
