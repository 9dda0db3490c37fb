//! Encoding core values into wire JSON

use veap_core::{Pv, ServiceError};

use crate::types::{WireError, WireHist, WirePv};

/// Converts a core PV to its wire shape. The timestamp is truncated to
/// millisecond precision.
pub fn pv_to_wire(pv: &Pv) -> WirePv {
    WirePv {
        ts: pv.time.timestamp_millis(),
        v: pv.value.clone(),
        s: pv.state,
    }
}

/// Converts a PV sequence to the column-oriented wire history.
pub fn hist_to_wire(hist: &[Pv]) -> WireHist {
    let mut wire = WireHist {
        ts: Vec::with_capacity(hist.len()),
        v: Vec::with_capacity(hist.len()),
        s: Vec::with_capacity(hist.len()),
    };
    for pv in hist {
        wire.ts.push(pv.time.timestamp_millis());
        wire.v.push(pv.value.clone());
        wire.s.push(pv.state);
    }
    wire
}

/// Converts a service error to its wire shape.
pub fn error_to_wire(err: &ServiceError) -> WireError {
    WireError {
        code: err.code,
        message: err.message.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::millis_to_time;
    use serde_json::json;
    use veap_core::State;

    #[test]
    fn pv_encodes_to_milliseconds() {
        let pv = Pv::new(millis_to_time(1234), json!(123.456), State(42));
        assert_eq!(
            serde_json::to_string(&pv_to_wire(&pv)).unwrap(),
            r#"{"ts":1234,"v":123.456,"s":42}"#
        );
    }

    #[test]
    fn pv_encode_truncates_sub_millisecond() {
        let time = chrono::DateTime::from_timestamp(1, 234_567_891).unwrap();
        let pv = Pv::new(time, json!("x"), State::GOOD);
        assert_eq!(pv_to_wire(&pv).ts, 1234);
    }

    #[test]
    fn hist_encodes_column_oriented() {
        let hist = vec![
            Pv::new(millis_to_time(1), json!(3.0), State(5)),
            Pv::new(millis_to_time(2), json!(4.0), State(6)),
        ];
        assert_eq!(
            serde_json::to_string(&hist_to_wire(&hist)).unwrap(),
            r#"{"ts":[1,2],"v":[3.0,4.0],"s":[5,6]}"#
        );
        assert_eq!(
            serde_json::to_string(&hist_to_wire(&[])).unwrap(),
            r#"{"ts":[],"v":[],"s":[]}"#
        );
    }

    #[test]
    fn pv_round_trip_at_millisecond_precision() {
        let pv = Pv::new(millis_to_time(1_700_000_000_123), json!({"a": [1, 2]}), State(101));
        let encoded = serde_json::to_vec(&pv_to_wire(&pv)).unwrap();
        let decoded = crate::decode::pv_from_bytes(&encoded, false).unwrap();
        assert_eq!(decoded, pv);
    }

    #[test]
    fn hist_round_trip_at_millisecond_precision() {
        let hist = vec![
            Pv::new(millis_to_time(10), json!(1), State::GOOD),
            Pv::new(millis_to_time(20), json!("two"), State::UNCERTAIN),
            Pv::new(millis_to_time(30), json!(null), State(-5)),
        ];
        let encoded = serde_json::to_vec(&hist_to_wire(&hist)).unwrap();
        let wire: WireHist = serde_json::from_slice(&encoded).unwrap();
        assert_eq!(crate::decode::hist_from_wire(wire).unwrap(), hist);
    }
}
