//! HTTP request dispatch for the VEAP protocol
//!
//! A [`Handler`] maps an HTTP method plus path onto VEAP service operations.
//! The final path segment selects the operation: the reserved markers `~pv`,
//! `~hist`, `~exgdata` and `~query` address the process value, history and
//! meta services, everything else addresses the object's properties. Path
//! comparisons use the escaped form of the request path.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, Request};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::Response;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tracing::{debug, trace, warn};
use url::form_urlencoded;

use veap_core::error::{STATUS_CREATED, STATUS_OK};
use veap_core::{
    paths, AttrValues, Link, Service, ServiceError, ServiceResult, EXG_DATA_MARKER, HIST_MARKER,
    LINKS_MARKER, PATH_MARKER, PV_MARKER, QUERY_MARKER,
};
use veap_wire as wire;

use crate::stats::HandlerStats;

/// Default maximum size of a valid request body: 1 MiB.
pub const DEFAULT_REQUEST_SIZE_LIMIT: usize = 1024 * 1024;

/// Default maximum number of entries in a history response.
pub const DEFAULT_HISTORY_SIZE_LIMIT: i64 = 10_000;

const WRITE_PV_QUERY_PARAM: &str = "writepv";
const FORMAT_QUERY_PARAM: &str = "format";
const FORMAT_SIMPLE: &str = "simple";

const CONTENT_TYPE_JSON: &str = "application/json";
const CONTENT_TYPE_TEXT: &str = "text/plain; charset=utf-8";

/// Transforms HTTP requests into VEAP service requests.
pub struct Handler {
    service: Arc<dyn Service>,
    url_prefix: String,
    request_size_limit: usize,
    history_size_limit: i64,
    stats: HandlerStats,
}

impl Handler {
    pub fn new(service: Arc<dyn Service>) -> Self {
        Self {
            service,
            url_prefix: String::new(),
            request_size_limit: DEFAULT_REQUEST_SIZE_LIMIT,
            history_size_limit: DEFAULT_HISTORY_SIZE_LIMIT,
            stats: HandlerStats::default(),
        }
    }

    /// Sets the URL prefix to strip from request paths, for a VEAP tree that
    /// is not mounted at the server root. No trailing slash.
    pub fn with_url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.url_prefix = prefix.into();
        self
    }

    /// Sets the maximum accepted request body size in bytes.
    pub fn with_request_size_limit(mut self, limit: usize) -> Self {
        self.request_size_limit = limit;
        self
    }

    /// Sets the maximum number of history entries returned per request.
    pub fn with_history_size_limit(mut self, limit: i64) -> Self {
        self.history_size_limit = limit;
        self
    }

    /// Statistics of this handler. Counters keep increasing for the lifetime
    /// of the handler; read them after the server has quiesced for exact
    /// values.
    pub fn stats(&self) -> &HandlerStats {
        &self.stats
    }

    pub(crate) async fn handle(&self, request: Request) -> Response {
        self.stats.inc_requests();
        let remote = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.to_string());
        let remote = remote.as_deref().unwrap_or("-");
        let method = request.method().clone();
        let uri = request.uri().clone();
        debug!(remote, method = %method, uri = %uri, "request");

        // the escaped request path; marker comparison happens on this form
        let full_path = uri.path().to_string();
        let Some(path) = full_path.strip_prefix(&self.url_prefix) else {
            return self.error_response(
                remote,
                ServiceError::not_found(format!("URL prefix does not match: {full_path}")),
            );
        };
        let path = path.to_string();
        let params = query_pairs(uri.query().unwrap_or(""));

        let body = match axum::body::to_bytes(request.into_body(), self.request_size_limit).await {
            Ok(bytes) => bytes,
            Err(err) => {
                return self.error_response(
                    remote,
                    ServiceError::bad_request(format!("Receiving of request failed: {err}")),
                );
            }
        };
        self.stats.add_request_bytes(body.len() as u64);
        if !body.is_empty() {
            trace!(body = %String::from_utf8_lossy(&body), "request body");
        }

        match self.dispatch(&method, &path, &params, &body).await {
            Ok(ok) => {
                self.stats.add_response_bytes(ok.bytes.len() as u64);
                trace!(status = ok.status, len = ok.bytes.len(), "response");
                build_response(ok.status, ok.content_type, ok.bytes)
            }
            Err(err) => self.error_response(remote, err),
        }
    }

    async fn dispatch(
        &self,
        method: &Method,
        path: &str,
        params: &[(String, String)],
        body: &[u8],
    ) -> ServiceResult<OkBody> {
        match paths::base_name(path) {
            PV_MARKER => {
                if *method == Method::GET {
                    let write_pv =
                        first_param(params, WRITE_PV_QUERY_PARAM).filter(|v| !v.is_empty());
                    if let Some(value) = write_pv {
                        // protocol extension: write a PV with a GET request
                        // and fuzzy body parsing
                        self.serve_set_pv(&paths::parent(path), value.as_bytes(), true)
                            .await?;
                        Ok(OkBody::empty())
                    } else {
                        self.serve_pv(&paths::parent(path), first_param(params, FORMAT_QUERY_PARAM))
                            .await
                    }
                } else if *method == Method::PUT {
                    self.serve_set_pv(&paths::parent(path), body, false).await?;
                    Ok(OkBody::empty())
                } else {
                    Err(ServiceError::method_not_allowed(format!(
                        "Method {method} not allowed for PV {path}"
                    )))
                }
            }

            HIST_MARKER => {
                if *method == Method::GET {
                    self.serve_history(&paths::parent(path), params).await
                } else if *method == Method::PUT {
                    self.serve_set_history(&paths::parent(path), body).await?;
                    Ok(OkBody::empty())
                } else {
                    Err(ServiceError::method_not_allowed(format!(
                        "Method {method} not allowed for history {path}"
                    )))
                }
            }

            EXG_DATA_MARKER => {
                if *method != Method::PUT {
                    return Err(ServiceError::method_not_allowed(format!(
                        "Invalid method for ExgData service: {method}"
                    )));
                }
                if path != format!("/{EXG_DATA_MARKER}") {
                    return Err(ServiceError::not_found(format!(
                        "Invalid path for ExgData service: {path}"
                    )));
                }
                self.serve_exg_data(body).await
            }

            QUERY_MARKER => {
                if *method != Method::GET {
                    return Err(ServiceError::method_not_allowed(format!(
                        "Invalid method for Query service: {method}"
                    )));
                }
                if path != format!("/{QUERY_MARKER}") {
                    return Err(ServiceError::not_found(format!(
                        "Invalid path for Query service: {path}"
                    )));
                }
                self.serve_query(params).await
            }

            _ => {
                if *method == Method::GET {
                    self.serve_properties(path).await
                } else if *method == Method::PUT {
                    let created = self.serve_set_properties(path, body).await?;
                    Ok(OkBody {
                        status: if created { STATUS_CREATED } else { STATUS_OK },
                        ..OkBody::empty()
                    })
                } else if *method == Method::DELETE {
                    self.service.delete(path).await?;
                    Ok(OkBody::empty())
                } else {
                    Err(ServiceError::method_not_allowed(format!(
                        "Method {method} not allowed for {path}"
                    )))
                }
            }
        }
    }

    async fn serve_pv(&self, path: &str, format: Option<&str>) -> ServiceResult<OkBody> {
        let pv = self.service.read_pv(path).await?;

        // protocol extension: plain text rendering of the bare value
        if format == Some(FORMAT_SIMPLE) {
            let text = match pv.value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            return Ok(OkBody {
                bytes: text.into_bytes(),
                content_type: CONTENT_TYPE_TEXT,
                status: STATUS_OK,
            });
        }

        let bytes = serde_json::to_vec(&wire::pv_to_wire(&pv))
            .map_err(|err| ServiceError::internal(format!("Conversion of PV to JSON failed: {err}")))?;
        Ok(OkBody::json(bytes))
    }

    async fn serve_set_pv(&self, path: &str, body: &[u8], fuzzy: bool) -> ServiceResult<()> {
        let pv = wire::pv_from_bytes(body, fuzzy).map_err(|err| {
            ServiceError::bad_request(format!("Conversion of JSON to PV failed: {err}"))
        })?;
        self.service.write_pv(path, pv).await
    }

    async fn serve_history(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> ServiceResult<OkBody> {
        let begin = single_time_param(params, "begin")?;
        let end = single_time_param(params, "end")?;
        let (begin, end) = match (begin, end) {
            (Some(begin), Some(end)) => (begin, end),
            (None, None) => {
                let end = Utc::now();
                (end - Duration::hours(24), end)
            }
            (Some(_), None) => {
                return Err(ServiceError::bad_request("Missing request parameter: end"))
            }
            (None, Some(_)) => {
                return Err(ServiceError::bad_request(
                    "Missing request parameter: begin",
                ))
            }
        };

        let limit = match single_int_param(params, "limit")? {
            Some(limit) if limit > self.history_size_limit => {
                // clamping is logged but not an error
                warn!("History size limit exceeded: {limit}");
                self.history_size_limit
            }
            Some(limit) => limit,
            None => self.history_size_limit,
        };

        let hist = self.service.read_history(path, begin, end, limit).await?;
        let bytes = serde_json::to_vec(&wire::hist_to_wire(&hist)).map_err(|err| {
            ServiceError::internal(format!("Conversion of history to JSON failed: {err}"))
        })?;
        Ok(OkBody::json(bytes))
    }

    async fn serve_set_history(&self, path: &str, body: &[u8]) -> ServiceResult<()> {
        let wire_hist: wire::WireHist = serde_json::from_slice(body).map_err(|err| {
            ServiceError::bad_request(format!("Conversion of JSON to history failed: {err}"))
        })?;
        let hist = wire::hist_from_wire(wire_hist)?;
        self.service.write_history(path, hist).await
    }

    async fn serve_properties(&self, path: &str) -> ServiceResult<OkBody> {
        let (attrs, links) = self.service.read_properties(path).await?;
        let bytes = serde_json::to_vec(&self.properties_to_wire(attrs, &links)?)
            .map_err(|err| {
                ServiceError::internal(format!("Conversion of properties to JSON failed: {err}"))
            })?;
        Ok(OkBody::json(bytes))
    }

    async fn serve_set_properties(&self, path: &str, body: &[u8]) -> ServiceResult<bool> {
        let attrs: AttrValues = serde_json::from_slice(body).map_err(|err| {
            ServiceError::bad_request(format!("Conversion of JSON to attributes failed: {err}"))
        })?;
        self.service.write_properties(path, attrs).await
    }

    async fn serve_exg_data(&self, body: &[u8]) -> ServiceResult<OkBody> {
        let meta = self
            .service
            .meta()
            .ok_or_else(|| ServiceError::bad_request("ExgData service not implemented"))?;

        let params: wire::WireExgDataParams = serde_json::from_slice(body).map_err(|err| {
            ServiceError::bad_request(format!("Invalid JSON for ExgData parameters: {err}"))
        })?;
        let (write_pvs, read_paths) = wire::exg_params_from_wire(params);

        let (write_errors, read_results) = meta.exg_data(write_pvs, read_paths).await?;

        let bytes = serde_json::to_vec(&wire::exg_results_to_wire(&write_errors, &read_results))
            .map_err(|err| {
                ServiceError::internal(format!(
                    "Conversion of ExgData results to JSON failed: {err}"
                ))
            })?;
        Ok(OkBody::json(bytes))
    }

    /// The `~path` URL parameter carries a path pattern (e.g.
    /// `~path=/device/*/*`) and may be repeated.
    async fn serve_query(&self, params: &[(String, String)]) -> ServiceResult<OkBody> {
        let meta = self
            .service
            .meta()
            .ok_or_else(|| ServiceError::bad_request("Query service not implemented"))?;

        let mut patterns = Vec::new();
        for (_, value) in params.iter().filter(|(name, _)| name == PATH_MARKER) {
            let Some(stripped) = value.strip_prefix(&self.url_prefix) else {
                return Err(ServiceError::not_found(format!(
                    "Path prefix does not match: {value}"
                )));
            };
            patterns.push(stripped.to_string());
        }

        let results = meta.query(patterns).await?;

        let wire_results: Vec<AttrValues> = results
            .into_iter()
            .map(|result| {
                let mut attrs = self.properties_to_wire(result.attributes, &result.links)?;
                attrs.insert(
                    PATH_MARKER.to_string(),
                    Value::String(self.rewrite_target(&result.path)),
                );
                Ok(attrs)
            })
            .collect::<ServiceResult<_>>()?;

        let bytes = serde_json::to_vec(&wire_results).map_err(|err| {
            ServiceError::internal(format!("Conversion of Query results to JSON failed: {err}"))
        })?;
        Ok(OkBody::json(bytes))
    }

    /// Builds the wire attribute object: the object's attributes plus the
    /// `~links` member (absolute targets rewritten with the URL prefix).
    /// `~links` is only present when the object has links.
    fn properties_to_wire(
        &self,
        mut attrs: AttrValues,
        links: &[Link],
    ) -> ServiceResult<AttrValues> {
        if !links.is_empty() {
            let wire_links: Vec<wire::WireLink> = links
                .iter()
                .map(|link| {
                    let mut wire_link = wire::link_to_wire(link);
                    wire_link.href = self.rewrite_target(&wire_link.href);
                    wire_link
                })
                .collect();
            let value = serde_json::to_value(wire_links).map_err(|err| {
                ServiceError::internal(format!("Conversion of links to JSON failed: {err}"))
            })?;
            attrs.insert(LINKS_MARKER.to_string(), value);
        }
        Ok(attrs)
    }

    /// Prepends the URL prefix to absolute targets so external clients see
    /// correct absolute URLs. Relative targets pass through unchanged.
    fn rewrite_target(&self, target: &str) -> String {
        if paths::is_abs(target) {
            format!("{}{}", self.url_prefix, target)
        } else {
            target.to_string()
        }
    }

    fn error_response(&self, remote: &str, err: ServiceError) -> Response {
        // the synthetic client-only code 900 (or anything else outside the
        // HTTP range) never goes on the wire
        let status = if (100..=599).contains(&err.code) {
            err.code
        } else {
            veap_core::error::STATUS_INTERNAL_SERVER_ERROR
        };
        warn!(remote, code = status, "{}", err.message);

        let body = serde_json::to_vec(&wire::WireServiceError {
            message: err.message,
        })
        .unwrap_or_default();
        self.stats.inc_error_responses();
        self.stats.add_response_bytes(body.len() as u64);
        build_response(status, CONTENT_TYPE_JSON, body)
    }
}

struct OkBody {
    bytes: Vec<u8>,
    content_type: &'static str,
    status: u16,
}

impl OkBody {
    fn empty() -> Self {
        Self {
            bytes: Vec::new(),
            content_type: CONTENT_TYPE_JSON,
            status: STATUS_OK,
        }
    }

    fn json(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            content_type: CONTENT_TYPE_JSON,
            status: STATUS_OK,
        }
    }
}

fn build_response(status: u16, content_type: &'static str, body: Vec<u8>) -> Response {
    let len = body.len();
    let mut response = Response::new(Body::from(body));
    *response.status_mut() =
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len as u64));
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    response
}

fn query_pairs(query: &str) -> Vec<(String, String)> {
    form_urlencoded::parse(query.as_bytes())
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect()
}

fn first_param<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.as_str())
}

/// Parses an integer parameter that must occur at most once.
fn single_int_param(params: &[(String, String)], name: &str) -> ServiceResult<Option<i64>> {
    let values: Vec<&str> = params
        .iter()
        .filter(|(n, _)| n == name)
        .map(|(_, v)| v.as_str())
        .collect();
    match values.as_slice() {
        [] => Ok(None),
        [value] => value.parse().map(Some).map_err(|err| {
            ServiceError::bad_request(format!("Invalid request parameter {name}: {err}"))
        }),
        _ => Err(ServiceError::bad_request(format!(
            "Invalid request parameter: {name}"
        ))),
    }
}

/// Parses a millisecond timestamp parameter that must occur at most once.
fn single_time_param(
    params: &[(String, String)],
    name: &str,
) -> ServiceResult<Option<DateTime<Utc>>> {
    Ok(single_int_param(params, name)?.map(wire::millis_to_time))
}
