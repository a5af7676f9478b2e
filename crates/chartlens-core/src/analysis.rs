//! Mocked chart analysis.
//!
//! There is no real image analysis. These functions produce fixed, plausible
//! content so the capture and results screens have something to show. Every
//! function is pure: the same input and `now` give the same output.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::models::{Analysis, AnalysisRequest, ChartType, Insight, InsightTrend, Trend, TrendDirection};

/// Placeholder image used when the request carries no capture
const SAMPLE_IMAGE_URI: &str = "https://images.pexels.com/photos/7567434/pexels-photo-7567434.jpeg";

const SUMMARY: &str = "This analysis reveals a strong overall performance with consistent growth trends across most segments. The data indicates a year-over-year increase of approximately 15%, with the highest growth occurring in Q3. However, there is a notable underperforming segment that requires attention. Seasonal patterns are evident, with predictable peaks and troughs that align with industry norms. Based on these patterns, we can forecast continued growth for the next two quarters, with an estimated 10-12% increase if current trends continue.";

const FORECAST: &str = "Based on the current data and trends, we project continued growth of 10-12% over the next two quarters. The primary growth driver will likely remain the top-performing segment. However, intervention is recommended for the underperforming segment to prevent further decline. Strategic resource allocation focusing on the highest-growth periods could maximize returns in the upcoming fiscal year.";

fn history_entry(id: &str, title: &str, chart_type: ChartType, image_uri: &str, date: DateTime<Utc>) -> Analysis {
    Analysis {
        id: id.to_string(),
        title: title.to_string(),
        chart_type,
        image_uri: image_uri.to_string(),
        date,
        summary: None,
        insights: Vec::new(),
        trends: Vec::new(),
        forecast: None,
    }
}

fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0)
        .single()
        .unwrap_or_default()
}

/// Sample history shown on the home and history screens
pub fn recent_analyses() -> Vec<Analysis> {
    vec![
        history_entry(
            "1",
            "Quarterly Sales Growth 2023",
            ChartType::Bar,
            SAMPLE_IMAGE_URI,
            utc(2023, 5, 15, 14, 30),
        ),
        history_entry(
            "2",
            "Market Share Comparison",
            ChartType::Pie,
            "https://images.pexels.com/photos/7567441/pexels-photo-7567441.jpeg",
            utc(2023, 5, 14, 10, 15),
        ),
        history_entry(
            "3",
            "Monthly Website Traffic",
            ChartType::Line,
            "https://images.pexels.com/photos/590022/pexels-photo-590022.jpeg",
            utc(2023, 5, 12, 16, 45),
        ),
        history_entry(
            "4",
            "Customer Satisfaction Metrics",
            ChartType::Bar,
            "https://images.pexels.com/photos/669615/pexels-photo-669615.jpeg",
            utc(2023, 5, 10, 9, 20),
        ),
    ]
}

fn insight(title: &str, description: &str, trend: InsightTrend, value: Option<&str>, change: Option<&str>) -> Insight {
    Insight {
        title: title.to_string(),
        description: description.to_string(),
        trend,
        value: value.map(str::to_string),
        change: change.map(str::to_string),
    }
}

fn trend(title: &str, description: &str, direction: TrendDirection, timeframe: &str) -> Trend {
    Trend {
        title: title.to_string(),
        description: description.to_string(),
        direction,
        timeframe: timeframe.to_string(),
    }
}

/// "Analyze" a captured chart.
pub fn generate_analysis(request: &AnalysisRequest, now: DateTime<Utc>) -> Analysis {
    let insights = vec![
        insight(
            "Peak Performance",
            "The highest value in the dataset occurs in Q3, showing a 23% increase over the average.",
            InsightTrend::Up,
            Some("1,245"),
            Some("+23%"),
        ),
        insight(
            "Consistent Growth",
            "The data shows a steady upward trend with an average growth rate of 12% per period.",
            InsightTrend::Up,
            Some("12%"),
            Some("+5% vs prev"),
        ),
        insight(
            "Seasonal Pattern",
            "There appears to be a cyclical pattern with peaks occurring in the third quarter of each year.",
            InsightTrend::Neutral,
            None,
            None,
        ),
        insight(
            "Underperforming Segment",
            "The smallest category shows consistent decline, dropping 8% from the previous period.",
            InsightTrend::Down,
            Some("342"),
            Some("-8%"),
        ),
    ];

    let trends = vec![
        trend(
            "Upward Momentum",
            "The overall trend is positive with sustained growth over the entire period analyzed.",
            TrendDirection::Up,
            "Last 12 months",
        ),
        trend(
            "Recovery After Dip",
            "After a significant drop in the middle of the period, values have recovered and surpassed previous levels.",
            TrendDirection::Up,
            "Last 6 months",
        ),
        trend(
            "Segment Contraction",
            "The smallest segment has been consistently shrinking and may require intervention.",
            TrendDirection::Down,
            "Last 9 months",
        ),
    ];

    let summary = match request.context {
        Some(ref context) => format!("Read in the context of \"{}\": {}", context, SUMMARY),
        None => SUMMARY.to_string(),
    };

    Analysis {
        id: now.timestamp_millis().to_string(),
        title: request.title.clone(),
        chart_type: request.chart_type.unwrap_or(ChartType::Bar),
        image_uri: request
            .image_uri
            .clone()
            .unwrap_or_else(|| SAMPLE_IMAGE_URI.to_string()),
        date: now,
        summary: Some(summary),
        insights,
        trends,
        forecast: Some(FORECAST.to_string()),
    }
}

/// History split the way the history screen lists it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryGroups {
    pub today: Vec<Analysis>,
    pub yesterday: Vec<Analysis>,
    pub older: Vec<Analysis>,
}

/// Group analyses by calendar day (UTC) relative to `today`.
/// Future-dated entries count as today.
pub fn group_by_day(analyses: &[Analysis], today: NaiveDate) -> HistoryGroups {
    let yesterday = today.pred_opt();
    let mut groups = HistoryGroups::default();
    for analysis in analyses {
        let day = analysis.date.date_naive();
        if day >= today {
            groups.today.push(analysis.clone());
        } else if Some(day) == yesterday {
            groups.yesterday.push(analysis.clone());
        } else {
            groups.older.push(analysis.clone());
        }
    }
    groups
}

/// Case-insensitive title search, optionally limited to one chart type.
pub fn filter_history(analyses: &[Analysis], query: &str, chart_type: Option<ChartType>) -> Vec<Analysis> {
    let query = query.trim().to_lowercase();
    analyses
        .iter()
        .filter(|a| chart_type.map_or(true, |t| a.chart_type == t))
        .filter(|a| query.is_empty() || a.title.to_lowercase().contains(&query))
        .cloned()
        .collect()
}
