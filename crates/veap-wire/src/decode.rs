//! Decoding wire JSON into core values

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use veap_core::{Pv, ServiceError, ServiceResult, State};

use crate::types::{WireError, WireHist, WirePv};

/// Strict variant of [`WirePv`]: unknown members are rejected. serde_json
/// additionally rejects trailing non-whitespace content after the object.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct StrictWirePv {
    #[serde(default)]
    ts: i64,
    #[serde(default)]
    v: Value,
    #[serde(default)]
    s: State,
}

/// Converts a wire timestamp (milliseconds since the Unix epoch) to an
/// instant, saturating at the representable range.
pub fn millis_to_time(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or(if ms < 0 {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}

/// Converts a wire PV to a core PV. A zero timestamp becomes "now".
pub fn wire_to_pv(wire: WirePv) -> Pv {
    let time = if wire.ts == 0 {
        Utc::now()
    } else {
        millis_to_time(wire.ts)
    };
    Pv {
        time,
        value: wire.v,
        state: wire.s,
    }
}

/// Parses a request body into a PV.
///
/// The strict mode accepts only a JSON object with the members `ts`, `v` and
/// `s` (each optional) and nothing but whitespace after it. In fuzzy mode a
/// body that fails the strict parse is taken as a bare JSON value, and a
/// body that is not JSON at all as a string value; fuzzy parsing never
/// fails.
pub fn pv_from_bytes(payload: &[u8], fuzzy: bool) -> Result<Pv, serde_json::Error> {
    match serde_json::from_slice::<StrictWirePv>(payload) {
        Ok(strict) => Ok(wire_to_pv(WirePv {
            ts: strict.ts,
            v: strict.v,
            s: strict.s,
        })),
        Err(err) => {
            if !fuzzy {
                return Err(err);
            }
            let value = serde_json::from_slice::<Value>(payload).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(payload).into_owned())
            });
            Ok(wire_to_pv(WirePv {
                v: value,
                ..WirePv::default()
            }))
        }
    }
}

/// Converts a wire history to a PV sequence. The three column arrays must
/// agree in length; empty arrays decode to an empty sequence.
pub fn hist_from_wire(wire: WireHist) -> ServiceResult<Vec<Pv>> {
    let len = wire.ts.len();
    if wire.v.len() != len || wire.s.len() != len {
        return Err(ServiceError::bad_request(
            "History arrays must have same length",
        ));
    }
    Ok(wire
        .ts
        .into_iter()
        .zip(wire.v)
        .zip(wire.s)
        .map(|((ts, v), s)| Pv {
            time: millis_to_time(ts),
            value: v,
            state: s,
        })
        .collect())
}

/// Converts a wire error back into a service error.
pub fn wire_to_error(wire: WireError) -> ServiceError {
    ServiceError::new(wire.code, wire.message)
}
