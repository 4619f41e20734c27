//! mule-data crate
//!
//! Transaction input records, the analysis result document, CSV ingestion,
//! and the remote analysis client.

pub mod ingest;
pub mod remote;
pub mod types;

pub use types::{AnalysisResult, AnalysisSummary, FraudRing, SuspiciousAccount, Transaction};
