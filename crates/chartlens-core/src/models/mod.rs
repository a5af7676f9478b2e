//! Data models for ChartLens entities.
//!
//! - `User`, `TokenGrant`, `AccountGrant`: identity snapshot and the
//!   normalized results of provider calls
//! - `Analysis`, `Insight`, `Trend`, `ChartType`: chart analysis content

pub mod analysis;
pub mod identity;

pub use analysis::{Analysis, AnalysisError, AnalysisRequest, ChartType, Insight, InsightTrend, Trend, TrendDirection};
pub use identity::{AccountGrant, TokenGrant, User};
