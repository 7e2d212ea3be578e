use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub identified_country: String,
    pub sector_allocation: Vec<SectorAllocation>,
    pub diversification_assessment: String,
    pub recommendations: Recommendations,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorAllocation {
    pub sector: String,
    pub investment: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendations {
    pub summary: String,
    pub action_items: Vec<String>,
    pub suggested_etfs: Vec<Suggestion>,
    pub suggested_companies: Vec<Suggestion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub ticker: String,
    pub name: String,
    pub reason: String,
}

impl AnalysisReport {
    pub fn total_percentage(&self) -> f64 {
        self.sector_allocation.iter().map(|s| s.percentage).sum()
    }

    pub fn total_investment(&self) -> f64 {
        self.sector_allocation.iter().map(|s| s.investment).sum()
    }
}

/// Raised when sector percentages drift further from 100 than the tolerance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationWarning {
    pub total_percentage: f64,
    pub tolerance: f64,
}

impl std::fmt::Display for AllocationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "sector percentages sum to {:.2}, more than {:.2} points away from 100",
            self.total_percentage, self.tolerance
        )
    }
}
