//! View models for the report display pages.
//!
//! Every view handles the two degraded cases itself: no analysis has run yet,
//! or the sub-field it shows came back empty. A page never fails as a whole.

use crate::domain::report::{AnalysisReport, Suggestion};
use serde::Serialize;

pub const NOT_ANALYZED_MESSAGE: &str = "Please upload and analyze your portfolio first.";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PageView<T> {
    NotAnalyzed { message: String },
    Unavailable { field: String, message: String },
    Ready { view: T },
}

impl<T> PageView<T> {
    fn not_analyzed() -> Self {
        Self::NotAnalyzed {
            message: NOT_ANALYZED_MESSAGE.to_string(),
        }
    }

    fn unavailable(field: &str, what: &str) -> Self {
        Self::Unavailable {
            field: field.to_string(),
            message: format!(
                "Could not display {what}. The data may be missing from the AI's analysis."
            ),
        }
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Self::Ready { view } => Some(view),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorRow {
    pub sector: String,
    pub investment: f64,
    pub percentage: f64,
    pub investment_display: String,
    pub percentage_display: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorAllocationView {
    pub identified_country: String,
    pub rows: Vec<SectorRow>,
    pub total_investment: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiversificationView {
    pub assessment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuggestionLine {
    pub ticker: String,
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section<T> {
    pub items: Vec<T>,
    /// Shown instead of the items when there are none.
    pub empty_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationsView {
    pub summary: String,
    pub action_items: Section<String>,
    pub suggested_etfs: Section<SuggestionLine>,
    pub suggested_companies: Section<SuggestionLine>,
}

pub fn sector_allocation_view(report: Option<&AnalysisReport>) -> PageView<SectorAllocationView> {
    let Some(report) = report else {
        return PageView::not_analyzed();
    };
    if report.sector_allocation.is_empty() {
        return PageView::unavailable("sector_allocation", "sector allocation");
    }

    let rows = report
        .sector_allocation
        .iter()
        .map(|s| SectorRow {
            sector: s.sector.clone(),
            investment: s.investment,
            percentage: s.percentage,
            investment_display: format_currency(s.investment),
            percentage_display: format!("{:.2}%", s.percentage),
        })
        .collect();

    PageView::Ready {
        view: SectorAllocationView {
            identified_country: report.identified_country.clone(),
            rows,
            total_investment: report.total_investment(),
        },
    }
}

pub fn diversification_view(report: Option<&AnalysisReport>) -> PageView<DiversificationView> {
    let Some(report) = report else {
        return PageView::not_analyzed();
    };
    let assessment = report.diversification_assessment.trim();
    if assessment.is_empty() {
        return PageView::unavailable("diversification_assessment", "diversification assessment");
    }
    PageView::Ready {
        view: DiversificationView {
            assessment: assessment.to_string(),
        },
    }
}

pub fn recommendations_view(report: Option<&AnalysisReport>) -> PageView<RecommendationsView> {
    let Some(report) = report else {
        return PageView::not_analyzed();
    };
    let rec = &report.recommendations;
    let nothing_to_show = rec.summary.trim().is_empty()
        && rec.action_items.is_empty()
        && rec.suggested_etfs.is_empty()
        && rec.suggested_companies.is_empty();
    if nothing_to_show {
        return PageView::unavailable("recommendations", "recommendations");
    }

    let summary = if rec.summary.trim().is_empty() {
        "No summary provided.".to_string()
    } else {
        rec.summary.clone()
    };

    PageView::Ready {
        view: RecommendationsView {
            summary,
            action_items: section(
                rec.action_items.clone(),
                "No specific action items provided.",
            ),
            suggested_etfs: section(
                suggestion_lines(&rec.suggested_etfs),
                "No specific ETFs were suggested.",
            ),
            suggested_companies: section(
                suggestion_lines(&rec.suggested_companies),
                "No specific companies were suggested.",
            ),
        },
    }
}

fn section<T>(items: Vec<T>, empty_message: &str) -> Section<T> {
    let empty_message = items.is_empty().then(|| empty_message.to_string());
    Section {
        items,
        empty_message,
    }
}

fn suggestion_lines(suggestions: &[Suggestion]) -> Vec<SuggestionLine> {
    suggestions
        .iter()
        .map(|s| SuggestionLine {
            ticker: s.ticker.clone(),
            name: or_placeholder(&s.name, "N/A"),
            reason: or_placeholder(&s.reason, "No reason provided."),
        })
        .collect()
}

fn or_placeholder(value: &str, placeholder: &str) -> String {
    if value.trim().is_empty() {
        placeholder.to_string()
    } else {
        value.to_string()
    }
}

/// `$1,234.50`
pub fn format_currency(amount: f64) -> String {
    let cents = (amount * 100.0).round() as i64;
    let (sign, cents) = if cents < 0 { ("-", -cents) } else { ("", cents) };
    let whole = (cents / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}${grouped}.{:02}", cents % 100)
}
