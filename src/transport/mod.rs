//! Bridges to external services.
//!
//! The detection backend is a managed inference service reached over
//! HTTP (a Databricks driver-proxy deployment in the original setup).
//! `inference` implements its wire contract: multipart frame submission,
//! CSV export retrieval, and the health probe.

mod inference;

pub use inference::{
    BackendClient, BackendHealth, DetectResponse, ExportResponse, WireDetections, WireObject,
    WireVehicle,
};
