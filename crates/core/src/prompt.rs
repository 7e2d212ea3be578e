//! Deterministic prompt construction.
//!
//! The required output schema is embedded verbatim in every prompt so the
//! model is told exactly which keys and types the report validator expects.

use crate::domain::portfolio::{PortfolioInput, RiskProfile};

pub const REQUIRED_JSON_SCHEMA: &str = r#"{
  "identified_country": "e.g., India",
  "sector_allocation": [
    {"sector": "Sector Name", "investment": 15000, "percentage": 30.0}
  ],
  "diversification_assessment": "A text summary of the portfolio's diversification.",
  "recommendations": {
    "summary": "A brief summary of the rebalancing strategy.",
    "action_items": ["An actionable recommendation point."],
    "suggested_etfs": [
      {"ticker": "NIFTYBEES.NS", "name": "Nifty 50 ETF", "reason": "For broad market diversification in India."}
    ],
    "suggested_companies": [
      {"ticker": "HDFCBANK.NS", "name": "HDFC Bank Ltd.", "reason": "To add exposure to the stable financial sector."}
    ]
  }
}"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPayload {
    pub text: String,
    pub image: Option<ImageAttachment>,
}

pub fn risk_phrase(risk: RiskProfile) -> String {
    format!("a {risk} risk profile")
}

pub fn build(risk: RiskProfile, input: PortfolioInput) -> PromptPayload {
    match input {
        PortfolioInput::Tabular { csv_text } => PromptPayload {
            text: tabular_prompt(risk, &csv_text),
            image: None,
        },
        PortfolioInput::Image { bytes, mime_type } => PromptPayload {
            text: image_prompt(risk),
            image: Some(ImageAttachment { bytes, mime_type }),
        },
    }
}

fn tabular_prompt(risk: RiskProfile, csv_text: &str) -> String {
    let csv_text = csv_text.trim_end_matches('\n');
    let preamble = preamble();
    let assessment = assessment_task(risk, 3);
    let recommendation = recommendation_task(risk, 4);
    let rules = output_rules();

    format!(
        "{preamble}\n\n\
The user's portfolio is provided below as CSV data. Each row is one holding.\n\
```csv\n{csv_text}\n```\n\n\
TASKS:\n\
1. Infer the country whose stock market these holdings trade on from the tickers, exchange suffixes, company names and currency, and report it in `identified_country`.\n\
2. Classify every holding into its economic sector, add up the invested amount per sector, and express each sector as a percentage of the total portfolio.\n\
{assessment}\n\
{recommendation}\n\n\
{rules}"
    )
}

fn image_prompt(risk: RiskProfile) -> String {
    let preamble = preamble();
    let assessment = assessment_task(risk, 4);
    let recommendation = recommendation_task(risk, 5);
    let rules = output_rules();

    format!(
        "{preamble}\n\n\
The user's portfolio is provided as the attached screenshot.\n\n\
TASKS:\n\
1. First, read the screenshot and extract every holding: ticker or company name, quantity, and invested or current amount. Use the numbers exactly as shown; do not estimate holdings that are not visible.\n\
2. Infer the country whose stock market these holdings trade on from the tickers, exchange names, company names and currency, and report it in `identified_country`.\n\
3. Classify every extracted holding into its economic sector, add up the invested amount per sector, and express each sector as a percentage of the total portfolio.\n\
{assessment}\n\
{recommendation}\n\n\
{rules}"
    )
}

fn preamble() -> String {
    "You are an expert global financial analyst AI. Analyze the user's investment portfolio and respond with a single JSON object that follows the required schema exactly.".to_string()
}

fn assessment_task(risk: RiskProfile, n: usize) -> String {
    format!(
        "{n}. Assess how well the portfolio is diversified across sectors and holdings, pointing out concentration risk, for an investor with {}. Write the assessment in `diversification_assessment`.",
        risk_phrase(risk)
    )
}

fn recommendation_task(risk: RiskProfile, n: usize) -> String {
    format!(
        "{n}. Recommend how to rebalance the portfolio for {}. Suggest ETFs and individual companies listed on the stock market of the identified country only, using that market's ticker format.",
        risk_phrase(risk)
    )
}

fn output_rules() -> String {
    [
        "REQUIRED JSON SCHEMA:",
        REQUIRED_JSON_SCHEMA,
        "",
        "RULES:",
        "- Return ONLY the JSON object. Do not wrap it in markdown. Do not add any text before or after it.",
        "- Include every key shown in the schema. Do not add any other keys.",
        "- `investment` and `percentage` must be plain numbers, not strings. Percentages must add up to 100.",
        "- `action_items`, `suggested_etfs` and `suggested_companies` must be arrays; use [] when there is nothing to suggest.",
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tabular(csv: &str) -> PortfolioInput {
        PortfolioInput::Tabular {
            csv_text: csv.to_string(),
        }
    }

    #[test]
    fn tabular_prompt_embeds_risk_csv_and_schema() {
        let csv = "Ticker,Investment\nAAPL,1000\nMSFT,500";
        let payload = build(RiskProfile::Moderate, tabular(csv));

        assert!(payload.text.contains("a moderate risk profile"));
        assert!(payload.text.contains(csv));
        assert!(payload.text.contains(REQUIRED_JSON_SCHEMA));
        assert!(payload.text.contains("```csv\nTicker,Investment\nAAPL,1000\nMSFT,500\n```"));
        assert_eq!(payload.image, None);
    }

    #[test]
    fn build_is_deterministic() {
        let csv = "Ticker,Investment\nAAPL,1000\n";
        for risk in RiskProfile::ALL {
            let a = build(risk, tabular(csv));
            let b = build(risk, tabular(csv));
            assert_eq!(a.text.as_bytes(), b.text.as_bytes());
        }

        let image = || PortfolioInput::Image {
            bytes: vec![1, 2, 3],
            mime_type: "image/png".to_string(),
        };
        assert_eq!(
            build(RiskProfile::Aggressive, image()),
            build(RiskProfile::Aggressive, image())
        );
    }

    #[test]
    fn image_prompt_asks_for_extraction_first_and_carries_attachment() {
        let payload = build(
            RiskProfile::Conservative,
            PortfolioInput::Image {
                bytes: vec![0xFF, 0xD8],
                mime_type: "image/jpeg".to_string(),
            },
        );

        assert!(payload.text.contains("1. First, read the screenshot and extract"));
        assert!(payload.text.contains("a conservative risk profile"));
        assert!(payload.text.contains(REQUIRED_JSON_SCHEMA));
        assert!(!payload.text.contains("```csv"));
        assert_eq!(
            payload.image,
            Some(ImageAttachment {
                bytes: vec![0xFF, 0xD8],
                mime_type: "image/jpeg".to_string()
            })
        );
    }

    #[test]
    fn prompts_differ_by_risk_profile() {
        let csv = "Ticker,Investment\nAAPL,1000";
        let conservative = build(RiskProfile::Conservative, tabular(csv));
        let aggressive = build(RiskProfile::Aggressive, tabular(csv));
        assert_ne!(conservative.text, aggressive.text);
        assert!(!aggressive.text.contains("conservative"));
    }

    #[test]
    fn schema_example_is_itself_a_valid_report() {
        let v: serde_json::Value = serde_json::from_str(REQUIRED_JSON_SCHEMA).unwrap();
        assert!(crate::domain::contract::validate(&v).is_ok());
    }
}
