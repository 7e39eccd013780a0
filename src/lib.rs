//! Daily price/volume anomaly screening.
//!
//! The core is a pure, synchronous pipeline: normalized market records
//! plus a threshold configuration in, an [`types::Analysis`] out. Every
//! parameter change is a full recompute; nothing is cached between runs.
//! Ingestion, export, the data generator and the dashboards are
//! collaborators layered around that core.

pub mod alerts;
pub mod detection;
pub mod export;
pub mod generator;
pub mod ingest;
pub mod latency;
pub mod stress;
pub mod tui;
pub mod types;
pub mod web;
