//! Chart analysis content models.
//!
//! These are plain data carriers for the capture and results screens; none of
//! them hold state beyond their fields.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kinds of chart a user can tag a capture with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum ChartType {
    #[serde(rename = "Bar Chart")]
    Bar,
    #[serde(rename = "Line Chart")]
    Line,
    #[serde(rename = "Pie Chart")]
    Pie,
    #[serde(rename = "Scatter Plot")]
    Scatter,
    #[serde(rename = "Area Chart")]
    Area,
    #[serde(rename = "Histogram")]
    Histogram,
    #[serde(rename = "Other")]
    Other,
}

impl ChartType {
    /// All chart types in picker order.
    pub const ALL: [ChartType; 7] = [
        ChartType::Bar,
        ChartType::Line,
        ChartType::Pie,
        ChartType::Scatter,
        ChartType::Area,
        ChartType::Histogram,
        ChartType::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ChartType::Bar => "Bar Chart",
            ChartType::Line => "Line Chart",
            ChartType::Pie => "Pie Chart",
            ChartType::Scatter => "Scatter Plot",
            ChartType::Area => "Area Chart",
            ChartType::Histogram => "Histogram",
            ChartType::Other => "Other",
        }
    }
}

impl fmt::Display for ChartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ChartType {
    type Err = AnalysisError;

    /// Accepts the full label ("Line Chart") or its first word ("line"),
    /// case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        ChartType::ALL
            .into_iter()
            .find(|t| {
                let label = t.label().to_lowercase();
                label == wanted || label.split_whitespace().next() == Some(wanted.as_str())
            })
            .ok_or_else(|| AnalysisError::UnknownChartType(s.to_string()))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("Please enter a graph title")]
    MissingTitle,

    #[error("Unknown chart type: {0}")]
    UnknownChartType(String),
}

/// Direction marker on an insight card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum InsightTrend {
    Up,
    Down,
    Neutral,
}

/// Direction of a longer-running trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum TrendDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Insight {
    pub title: String,
    pub description: String,
    pub trend: InsightTrend,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Trend {
    pub title: String,
    pub description: String,
    pub direction: TrendDirection,
    pub timeframe: String,
}

/// A captured chart and, once analyzed, its findings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Analysis {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub chart_type: ChartType,
    pub image_uri: String,
    pub date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub insights: Vec<Insight>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trends: Vec<Trend>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast: Option<String>,
}

impl Analysis {
    /// Whether the analysis has findings or is only a history entry.
    pub fn is_complete(&self) -> bool {
        self.summary.is_some()
    }
}

/// What the user entered on the context screen before analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub title: String,
    pub chart_type: Option<ChartType>,
    pub context: Option<String>,
    pub image_uri: Option<String>,
}

impl AnalysisRequest {
    /// Build a request; the title is trimmed and must not be empty.
    pub fn new(title: &str) -> Result<Self, AnalysisError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(AnalysisError::MissingTitle);
        }
        Ok(Self {
            title: title.to_string(),
            chart_type: None,
            context: None,
            image_uri: None,
        })
    }

    pub fn with_chart_type(mut self, chart_type: ChartType) -> Self {
        self.chart_type = Some(chart_type);
        self
    }

    /// Attach free-form context; blank input is dropped.
    pub fn with_context(mut self, context: &str) -> Self {
        let context = context.trim();
        self.context = (!context.is_empty()).then(|| context.to_string());
        self
    }

    pub fn with_image_uri(mut self, uri: impl Into<String>) -> Self {
        self.image_uri = Some(uri.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chart_type_from_str() {
        assert_eq!("Line Chart".parse::<ChartType>(), Ok(ChartType::Line));
        assert_eq!("pie".parse::<ChartType>(), Ok(ChartType::Pie));
        assert_eq!(" HISTOGRAM ".parse::<ChartType>(), Ok(ChartType::Histogram));
        assert_eq!(
            "radar".parse::<ChartType>(),
            Err(AnalysisError::UnknownChartType("radar".to_string()))
        );
    }

    #[test]
    fn test_chart_type_serializes_as_label() {
        let json = serde_json::to_string(&ChartType::Scatter).unwrap();
        assert_eq!(json, r#""Scatter Plot""#);
    }

    #[test]
    fn test_request_requires_title() {
        assert_eq!(AnalysisRequest::new("   "), Err(AnalysisError::MissingTitle));

        let request = AnalysisRequest::new("  Revenue by region ")
            .unwrap()
            .with_context("   ");
        assert_eq!(request.title, "Revenue by region");
        assert_eq!(request.context, None);
    }

    #[test]
    fn test_parse_history_entry() {
        let json = r#"{"id":"2","title":"Market Share Comparison","type":"Pie Chart","imageUri":"https://example.com/a.jpeg","date":"2023-05-14T10:15:00Z"}"#;
        let analysis: Analysis = serde_json::from_str(json).unwrap();
        assert_eq!(analysis.chart_type, ChartType::Pie);
        assert!(analysis.insights.is_empty());
        assert!(!analysis.is_complete());
    }
}
