//! VEAP HTTP client implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde_json::Value;
use tracing::debug;
use url::form_urlencoded;

use veap_core::error::{STATUS_CREATED, STATUS_OK};
use veap_core::{
    AttrValues, Link, MetaService, Pv, QueryResult, ReadPvResult, Service, ServiceError,
    ServiceResult, WritePvParam, EXG_DATA_MARKER, HIST_MARKER, LINKS_MARKER, PATH_MARKER,
    PV_MARKER, QUERY_MARKER,
};
use veap_wire as wire;

/// Default maximum size of a valid response body: 1 MiB.
pub const DEFAULT_RESPONSE_SIZE_LIMIT: usize = 1024 * 1024;

/// Forwards VEAP service calls to a remote server.
#[derive(Debug, Clone)]
pub struct VeapClient {
    http: reqwest::Client,
    base_url: String,
    auth: Option<(String, String)>,
    response_size_limit: usize,
}

impl VeapClient {
    /// Creates a client for the server at `base_url` (e.g.
    /// `http://localhost:2121`). A trailing slash is stripped.
    pub fn new(base_url: &str) -> ServiceResult<Self> {
        url::Url::parse(base_url)
            .map_err(|err| ServiceError::client(format!("Invalid base URL {base_url}: {err}")))?;
        let http = reqwest::Client::builder()
            .build()
            .map_err(|err| ServiceError::client(format!("Creating HTTP client failed: {err}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth: None,
            response_size_limit: DEFAULT_RESPONSE_SIZE_LIMIT,
        })
    }

    /// Enables HTTP basic authentication for every request.
    pub fn with_basic_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some((user.into(), password.into()));
        self
    }

    /// Sets the maximum accepted response body size in bytes.
    pub fn with_response_size_limit(mut self, limit: usize) -> Self {
        self.response_size_limit = limit;
        self
    }

    /// Uses a specific reqwest client, e.g. one with custom timeouts or TLS
    /// configuration.
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// The configured base URL, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut builder = self.http.request(method, url);
        if let Some((user, password)) = &self.auth {
            builder = builder.basic_auth(user, Some(password));
        }
        builder
    }

    /// Sends the request and reads the response body through the size cap.
    async fn send(&self, builder: RequestBuilder, url: &str) -> ServiceResult<(StatusCode, Vec<u8>)> {
        let mut response = builder
            .send()
            .await
            .map_err(|err| ServiceError::client(format!("Request to {url} failed: {err}")))?;
        let status = response.status();

        let mut body = Vec::new();
        loop {
            let chunk = response
                .chunk()
                .await
                .map_err(|err| ServiceError::client(format!("Reading response failed: {err}")))?;
            let Some(chunk) = chunk else { break };
            body.extend_from_slice(&chunk);
            if body.len() > self.response_size_limit {
                return Err(ServiceError::client(format!(
                    "Response size limit of {} bytes exceeded",
                    self.response_size_limit
                )));
            }
        }
        Ok((status, body))
    }

    /// Like [`send`](Self::send), but maps every non-OK status into an error
    /// carrying that status code and the response body as message.
    async fn send_expect_ok(&self, builder: RequestBuilder, url: &str) -> ServiceResult<Vec<u8>> {
        let (status, body) = self.send(builder, url).await?;
        if status.as_u16() != STATUS_OK {
            return Err(status_error(status, &body));
        }
        Ok(body)
    }
}

fn status_error(status: StatusCode, body: &[u8]) -> ServiceError {
    ServiceError::new(
        status.as_u16(),
        format!(
            "Received HTTP status: {} ({})",
            status.as_u16(),
            String::from_utf8_lossy(body)
        ),
    )
}

/// Rounds an instant up to the next whole millisecond. Nanosecond precision
/// is deliberately dropped towards later times so that boundary samples are
/// not silently omitted by the server's millisecond granularity.
fn ceil_to_millis(time: DateTime<Utc>) -> i64 {
    match time.timestamp_nanos_opt() {
        Some(nanos) => nanos.div_euclid(1_000_000) + i64::from(nanos.rem_euclid(1_000_000) != 0),
        None => time.timestamp_millis(),
    }
}

fn object_str(object: &serde_json::Map<String, Value>, key: &str) -> ServiceResult<Option<String>> {
    match object.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(ServiceError::client(format!(
            "Invalid value for '{key}': {other}"
        ))),
    }
}

/// Extracts the links from a decoded `~links` property value.
fn links_from_value(value: &Value) -> ServiceResult<Vec<Link>> {
    let items = value
        .as_array()
        .ok_or_else(|| ServiceError::client("~links is not an array".to_string()))?;
    let mut links = Vec::with_capacity(items.len());
    for item in items {
        let object = item
            .as_object()
            .ok_or_else(|| ServiceError::client("~links entry is not an object".to_string()))?;
        let target = object_str(object, "href")?
            .ok_or_else(|| ServiceError::client("~links entry without href".to_string()))?;
        links.push(Link {
            role: object_str(object, "rel")?.unwrap_or_default(),
            target,
            title: object_str(object, "title")?,
        });
    }
    Ok(links)
}

#[async_trait]
impl Service for VeapClient {
    async fn read_pv(&self, path: &str) -> ServiceResult<Pv> {
        let url = format!("{}{}/{}", self.base_url, path, PV_MARKER);
        debug!(%url, "GET PV");
        let body = self.send_expect_ok(self.request(Method::GET, &url), &url).await?;
        wire::pv_from_bytes(&body, false)
            .map_err(|err| ServiceError::client(format!("Conversion of JSON to PV failed: {err}")))
    }

    async fn write_pv(&self, path: &str, pv: Pv) -> ServiceResult<()> {
        let url = format!("{}{}/{}", self.base_url, path, PV_MARKER);
        debug!(%url, "PUT PV");
        let body = serde_json::to_vec(&wire::pv_to_wire(&pv))
            .map_err(|err| ServiceError::client(format!("Conversion of PV to JSON failed: {err}")))?;
        self.send_expect_ok(self.request(Method::PUT, &url).body(body), &url)
            .await?;
        Ok(())
    }

    async fn read_history(
        &self,
        path: &str,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: i64,
    ) -> ServiceResult<Vec<Pv>> {
        let url = format!(
            "{}{}/{}?begin={}&end={}&limit={}",
            self.base_url,
            path,
            HIST_MARKER,
            ceil_to_millis(begin),
            ceil_to_millis(end),
            limit
        );
        debug!(%url, "GET history");
        let body = self.send_expect_ok(self.request(Method::GET, &url), &url).await?;
        let wire_hist: wire::WireHist = serde_json::from_slice(&body).map_err(|err| {
            ServiceError::client(format!("Conversion of JSON to history failed: {err}"))
        })?;
        wire::hist_from_wire(wire_hist).map_err(|err| ServiceError::client(err.message))
    }

    async fn write_history(&self, path: &str, time_series: Vec<Pv>) -> ServiceResult<()> {
        let url = format!("{}{}/{}", self.base_url, path, HIST_MARKER);
        debug!(%url, "PUT history");
        let body = serde_json::to_vec(&wire::hist_to_wire(&time_series)).map_err(|err| {
            ServiceError::client(format!("Conversion of history to JSON failed: {err}"))
        })?;
        self.send_expect_ok(self.request(Method::PUT, &url).body(body), &url)
            .await?;
        Ok(())
    }

    async fn read_properties(&self, path: &str) -> ServiceResult<(AttrValues, Vec<Link>)> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "GET properties");
        let body = self.send_expect_ok(self.request(Method::GET, &url), &url).await?;

        let mut attrs: AttrValues = serde_json::from_slice(&body)
            .map_err(|err| ServiceError::client(format!("Invalid JSON object: {err}")))?;
        let links = match attrs.remove(LINKS_MARKER) {
            Some(value) => links_from_value(&value)
                .map_err(|err| ServiceError::client(format!("Invalid ~links property: {err}")))?,
            None => Vec::new(),
        };
        Ok((attrs, links))
    }

    async fn write_properties(&self, path: &str, attributes: AttrValues) -> ServiceResult<bool> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "PUT properties");
        let body = serde_json::to_vec(&attributes).map_err(|err| {
            ServiceError::bad_request(format!("Conversion of attributes to JSON failed: {err}"))
        })?;
        let (status, body) = self
            .send(self.request(Method::PUT, &url).body(body), &url)
            .await?;
        if status.as_u16() != STATUS_OK && status.as_u16() != STATUS_CREATED {
            return Err(status_error(status, &body));
        }
        Ok(status.as_u16() == STATUS_CREATED)
    }

    async fn delete(&self, path: &str) -> ServiceResult<()> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "DELETE object");
        self.send_expect_ok(self.request(Method::DELETE, &url), &url)
            .await?;
        Ok(())
    }

    fn meta(&self) -> Option<&dyn MetaService> {
        Some(self)
    }
}

#[async_trait]
impl MetaService for VeapClient {
    async fn exg_data(
        &self,
        write_pvs: Vec<WritePvParam>,
        read_paths: Vec<String>,
    ) -> ServiceResult<(Vec<ServiceResult<()>>, Vec<ReadPvResult>)> {
        let url = format!("{}/{}", self.base_url, EXG_DATA_MARKER);
        debug!(%url, "PUT ExgData");

        let params = wire::exg_params_to_wire(&write_pvs, &read_paths);
        let body = serde_json::to_vec(&params).map_err(|err| {
            ServiceError::bad_request(format!("Conversion of ExgData params to JSON failed: {err}"))
        })?;
        let body = self
            .send_expect_ok(self.request(Method::PUT, &url).body(body), &url)
            .await?;

        let results: wire::WireExgDataResults = serde_json::from_slice(&body)
            .map_err(|err| ServiceError::client(format!("Invalid JSON object: {err}")))?;
        if results.write_errors.len() != write_pvs.len()
            || results.read_results.len() != read_paths.len()
        {
            return Err(ServiceError::client(
                "Exgdata response does not match request",
            ));
        }
        Ok(wire::exg_results_from_wire(results))
    }

    async fn query(&self, path_patterns: Vec<String>) -> ServiceResult<Vec<QueryResult>> {
        let query_string = {
            let mut serializer = form_urlencoded::Serializer::new(String::new());
            for pattern in &path_patterns {
                serializer.append_pair(PATH_MARKER, pattern);
            }
            serializer.finish()
        };
        let url = format!("{}/{}?{}", self.base_url, QUERY_MARKER, query_string);
        debug!(%url, "GET Query");
        let body = self.send_expect_ok(self.request(Method::GET, &url), &url).await?;

        let raw: Value = serde_json::from_slice(&body)
            .map_err(|err| ServiceError::client(format!("Invalid JSON object: {err}")))?;
        let items = raw
            .as_array()
            .ok_or_else(|| ServiceError::client("Malformed JSON object: not an array"))?;

        let mut results = Vec::with_capacity(items.len());
        for item in items {
            let object = item.as_object().ok_or_else(|| {
                ServiceError::client("Malformed JSON object: result is not an object")
            })?;
            let path = object_str(object, PATH_MARKER)?.ok_or_else(|| {
                ServiceError::client("Malformed JSON object: result without ~path")
            })?;
            let links = match object.get(LINKS_MARKER) {
                Some(value) => links_from_value(value)
                    .map_err(|err| ServiceError::client(format!("Malformed JSON object: {err}")))?,
                None => Vec::new(),
            };
            let mut attributes = object.clone();
            attributes.remove(PATH_MARKER);
            attributes.remove(LINKS_MARKER);
            results.push(QueryResult {
                path,
                attributes,
                links,
            });
        }
        Ok(results)
    }
}
