//! veap-client - HTTP client for VEAP
//!
//! [`VeapClient`] forwards service calls to a remote VEAP server. It
//! implements [`veap_core::Service`] and [`veap_core::MetaService`], so any
//! code written against the service contract works transparently against a
//! remote tree.
//!
//! Failures produced inside the client (connection errors, undecodable
//! responses, exceeded size limits) carry the synthetic code 900; error
//! statuses received from the server keep their code.

pub mod client;
pub mod testing;

pub use client::{VeapClient, DEFAULT_RESPONSE_SIZE_LIMIT};
