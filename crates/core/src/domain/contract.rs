use crate::domain::report::{
    AllocationWarning, AnalysisReport, Recommendations, SectorAllocation, Suggestion,
};
use crate::error::ValidationError;
use serde_json::{Map, Value};

/// Checks a parsed model response against the report shape and converts it
/// into a typed [`AnalysisReport`]. Unknown keys are ignored.
pub fn validate(raw: &Value) -> Result<AnalysisReport, ValidationError> {
    let root = raw.as_object().ok_or(ValidationError::NotAnObject)?;

    // Presence of all four top-level keys is checked before any shape check so
    // the first missing key is always reported as missing.
    for key in [
        "identified_country",
        "sector_allocation",
        "diversification_assessment",
        "recommendations",
    ] {
        require(root, key, key)?;
    }

    let identified_country = string_field(root, "identified_country", "identified_country")?;

    let entries = require(root, "sector_allocation", "sector_allocation")?
        .as_array()
        .ok_or_else(|| wrong_type("sector_allocation", "an array"))?;
    let sector_allocation = entries
        .iter()
        .enumerate()
        .map(|(index, entry)| sector_entry(index, entry))
        .collect::<Result<Vec<_>, _>>()?;

    let diversification_assessment = string_field(
        root,
        "diversification_assessment",
        "diversification_assessment",
    )?;

    let recommendations = recommendations(require(root, "recommendations", "recommendations")?)?;

    Ok(AnalysisReport {
        identified_country,
        sector_allocation,
        diversification_assessment,
        recommendations,
    })
}

/// Flags allocations whose percentages are grossly off 100. An empty
/// allocation has nothing to sum and is left to the views.
pub fn allocation_warning(report: &AnalysisReport, tolerance: f64) -> Option<AllocationWarning> {
    if report.sector_allocation.is_empty() {
        return None;
    }
    let total = report.total_percentage();
    ((total - 100.0).abs() > tolerance).then_some(AllocationWarning {
        total_percentage: total,
        tolerance,
    })
}

fn sector_entry(index: usize, entry: &Value) -> Result<SectorAllocation, ValidationError> {
    let bad = |reason: &str| ValidationError::BadSectorEntry {
        index,
        reason: reason.to_string(),
    };

    let obj = entry.as_object().ok_or_else(|| bad("entry must be an object"))?;

    let sector = obj
        .get("sector")
        .and_then(Value::as_str)
        .ok_or_else(|| bad("sector must be a string"))?;
    if sector.trim().is_empty() {
        return Err(bad("sector must be non-empty"));
    }

    let investment = obj
        .get("investment")
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
        .ok_or_else(|| bad("investment must be a number"))?;
    if investment < 0.0 {
        return Err(bad("investment must be >= 0"));
    }

    let percentage = obj
        .get("percentage")
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
        .ok_or_else(|| bad("percentage must be a number"))?;
    if !(0.0..=100.0).contains(&percentage) {
        return Err(bad("percentage must be between 0 and 100"));
    }

    Ok(SectorAllocation {
        sector: sector.to_string(),
        investment,
        percentage,
    })
}

fn recommendations(value: &Value) -> Result<Recommendations, ValidationError> {
    let obj = value
        .as_object()
        .ok_or_else(|| wrong_type("recommendations", "an object"))?;

    let summary = string_field(obj, "summary", "recommendations.summary")?;

    let action_items = require(obj, "action_items", "recommendations.action_items")?
        .as_array()
        .ok_or_else(|| wrong_type("recommendations.action_items", "an array"))?
        .iter()
        .enumerate()
        .map(|(index, item)| {
            item.as_str()
                .map(str::to_string)
                .ok_or(ValidationError::BadActionItem { index })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let suggested_etfs = suggestions(obj, "suggested_etfs")?;
    let suggested_companies = suggestions(obj, "suggested_companies")?;

    Ok(Recommendations {
        summary,
        action_items,
        suggested_etfs,
        suggested_companies,
    })
}

fn suggestions(
    obj: &Map<String, Value>,
    field: &'static str,
) -> Result<Vec<Suggestion>, ValidationError> {
    let path = format!("recommendations.{field}");
    let items = require(obj, field, &path)?
        .as_array()
        .ok_or_else(|| wrong_type(&path, "an array"))?;

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let bad = |reason: String| ValidationError::BadSuggestion {
                field,
                index,
                reason,
            };
            let entry = item
                .as_object()
                .ok_or_else(|| bad("entry must be an object".to_string()))?;
            let text = |key: &str| {
                entry
                    .get(key)
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| bad(format!("{key} must be a string")))
            };

            let ticker = text("ticker")?;
            if ticker.trim().is_empty() {
                return Err(bad("ticker must be non-empty".to_string()));
            }

            Ok(Suggestion {
                ticker,
                name: text("name")?,
                reason: text("reason")?,
            })
        })
        .collect()
}

fn require<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<&'a Value, ValidationError> {
    match obj.get(key) {
        Some(Value::Null) | None => Err(ValidationError::MissingField {
            field: path.to_string(),
        }),
        Some(v) => Ok(v),
    }
}

fn string_field(
    obj: &Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<String, ValidationError> {
    require(obj, key, path)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| wrong_type(path, "a string"))
}

fn wrong_type(field: &str, expected: &'static str) -> ValidationError {
    ValidationError::WrongType {
        field: field.to_string(),
        expected,
    }
}
