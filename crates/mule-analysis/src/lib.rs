//! mule-analysis crate
//!
//! Graph-based money-mule detection: transaction graph construction,
//! bounded cycle enumeration, fan-in / fan-out smurfing, shell-account
//! flagging, ring assembly with deterministic scoring, and summary
//! aggregation.

pub mod config;
pub mod cycles;
pub mod error;
pub mod graph;
pub mod pipeline;
pub mod report;
pub mod rings;
pub mod scoring;
pub mod shell;
pub mod smurfing;
pub mod summary;

pub use config::{AnalysisConfig, CancelToken, RiskThresholds};
pub use error::{AbortReason, Detector, DetectorError, EngineError};
pub use pipeline::{analyze, analyze_strict, analyze_with_cancel, AnalysisReport, Completeness};
pub use report::{pattern_breakdown, risk_distribution, PatternBreakdown, RiskBand, RiskDistribution};
pub use summary::validate_result;
