//! Wire shapes of the VEAP JSON protocol

use serde::{Deserialize, Serialize};
use serde_json::Value;
use veap_core::State;

/// A process value on the wire: `{"ts": int64, "v": any, "s": int}`.
///
/// All members are optional on input: a missing or zero `ts` means "now" at
/// decode time, a missing `s` means good, a missing `v` is null. Encoding
/// always emits all three members.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WirePv {
    #[serde(default)]
    pub ts: i64,
    #[serde(default)]
    pub v: Value,
    #[serde(default)]
    pub s: State,
}

/// A history on the wire: three column arrays of equal length.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WireHist {
    #[serde(default)]
    pub ts: Vec<i64>,
    #[serde(default)]
    pub v: Vec<Value>,
    #[serde(default)]
    pub s: Vec<State>,
}

/// A link on the wire. `title` is omitted when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireLink {
    pub rel: String,
    pub href: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// An error inside the batch envelope. `message` is omitted when empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireError {
    pub code: u16,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

/// The error body of a failed HTTP request: `{"message": …}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireServiceError {
    pub message: String,
}

/// One write request within the batch envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireWritePv {
    pub path: String,
    #[serde(default)]
    pub pv: WirePv,
}

/// The batch exchange request envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WireExgDataParams {
    #[serde(rename = "writePVs", default)]
    pub write_pvs: Vec<WireWritePv>,
    #[serde(rename = "readPaths", default)]
    pub read_paths: Vec<String>,
}

/// One read result within the batch response. Exactly one of `pv` and
/// `error` is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireReadPvResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pv: Option<WirePv>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<WireError>,
}

/// The batch exchange response envelope. The slices are positional:
/// `write_errors` has one entry (null on success) per requested write,
/// `read_results` one entry per requested read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireExgDataResults {
    #[serde(rename = "writeErrors")]
    pub write_errors: Vec<Option<WireError>>,
    #[serde(rename = "readResults")]
    pub read_results: Vec<WireReadPvResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_title_omitted_when_absent() {
        let link = WireLink {
            rel: "dp".into(),
            href: "c".into(),
            title: None,
        };
        assert_eq!(
            serde_json::to_string(&link).unwrap(),
            r#"{"rel":"dp","href":"c"}"#
        );
    }

    #[test]
    fn error_message_omitted_when_empty() {
        let err = WireError {
            code: 404,
            message: String::new(),
        };
        assert_eq!(serde_json::to_string(&err).unwrap(), r#"{"code":404}"#);
    }
}
