//! veap-wire - JSON wire encoding for VEAP
//!
//! Bidirectional conversion between the in-memory types of `veap-core` and
//! their JSON wire shapes: process values, histories, links, errors and the
//! batch exchange envelope.
//!
//! Timestamps travel as milliseconds since the Unix epoch in a signed 64 bit
//! integer. A wire PV with a missing or zero timestamp means "now", captured
//! at decode time; a missing state means good.
//!
//! # Quick start
//!
//! ```
//! use veap_core::State;
//! use veap_wire::{pv_from_bytes, pv_to_wire};
//!
//! // strict decoding rejects unknown fields and trailing content
//! let pv = pv_from_bytes(br#"{"ts":1234,"v":123.456,"s":42}"#, false).unwrap();
//! assert_eq!(pv.value, serde_json::json!(123.456));
//! assert_eq!(pv.state, State(42));
//! assert_eq!(pv_to_wire(&pv).ts, 1234);
//!
//! // fuzzy decoding never fails
//! let pv = pv_from_bytes(b"hello", true).unwrap();
//! assert_eq!(pv.value, serde_json::json!("hello"));
//! ```

mod decode;
mod encode;
mod types;

pub use decode::{hist_from_wire, millis_to_time, pv_from_bytes, wire_to_error, wire_to_pv};
pub use encode::{error_to_wire, hist_to_wire, pv_to_wire};
pub use types::{
    WireError, WireExgDataParams, WireExgDataResults, WireHist, WireLink, WirePv,
    WireReadPvResult, WireServiceError, WireWritePv,
};

use veap_core::{Link, ReadPvResult, ServiceResult, WritePvParam};

/// Converts a core link into its wire shape.
pub fn link_to_wire(link: &Link) -> WireLink {
    WireLink {
        rel: link.role.clone(),
        href: link.target.clone(),
        title: link.title.clone(),
    }
}

/// Converts a decoded batch request envelope into core parameters.
pub fn exg_params_from_wire(wire: WireExgDataParams) -> (Vec<WritePvParam>, Vec<String>) {
    let write_pvs = wire
        .write_pvs
        .into_iter()
        .map(|w| WritePvParam {
            path: w.path,
            pv: wire_to_pv(w.pv),
        })
        .collect();
    (write_pvs, wire.read_paths)
}

/// Builds the batch request envelope from core parameters.
pub fn exg_params_to_wire(write_pvs: &[WritePvParam], read_paths: &[String]) -> WireExgDataParams {
    WireExgDataParams {
        write_pvs: write_pvs
            .iter()
            .map(|p| WireWritePv {
                path: p.path.clone(),
                pv: pv_to_wire(&p.pv),
            })
            .collect(),
        read_paths: read_paths.to_vec(),
    }
}

/// Builds the batch response envelope. The result slices stay positional:
/// `write_errors[i]` belongs to the i-th write and is null on success, and
/// each read result carries exactly one of `pv`/`error`.
pub fn exg_results_to_wire(
    write_errors: &[ServiceResult<()>],
    read_results: &[ReadPvResult],
) -> WireExgDataResults {
    WireExgDataResults {
        write_errors: write_errors
            .iter()
            .map(|r| r.as_ref().err().map(error_to_wire))
            .collect(),
        read_results: read_results
            .iter()
            .map(|r| match r {
                Ok(pv) => WireReadPvResult {
                    pv: Some(pv_to_wire(pv)),
                    error: None,
                },
                Err(err) => WireReadPvResult {
                    pv: None,
                    error: Some(error_to_wire(err)),
                },
            })
            .collect(),
    }
}

/// Converts a decoded batch response envelope back into core results. A read
/// result without an error is taken as a PV even if the `pv` member was
/// absent, mirroring the defaulting of the wire PV fields.
pub fn exg_results_from_wire(
    wire: WireExgDataResults,
) -> (Vec<ServiceResult<()>>, Vec<ReadPvResult>) {
    let write_errors = wire
        .write_errors
        .into_iter()
        .map(|entry| match entry {
            None => Ok(()),
            Some(err) => Err(wire_to_error(err)),
        })
        .collect();
    let read_results = wire
        .read_results
        .into_iter()
        .map(|entry| match entry.error {
            Some(err) => Err(wire_to_error(err)),
            None => Ok(wire_to_pv(entry.pv.unwrap_or_default())),
        })
        .collect();
    (write_errors, read_results)
}
