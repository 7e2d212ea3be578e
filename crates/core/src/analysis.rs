use crate::config::DEFAULT_ALLOCATION_TOLERANCE_PCT;
use crate::domain::contract;
use crate::domain::portfolio::{Artifact, RiskProfile};
use crate::domain::report::{AllocationWarning, AnalysisReport};
use crate::error::AnalysisError;
use crate::ingest;
use crate::llm::{self, LlmClient};
use crate::prompt::{self, PromptPayload};
use crate::session::ReportStore;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutcome {
    pub report: Arc<AnalysisReport>,
    pub warnings: Vec<AllocationWarning>,
}

/// Builds the prompt for an upload without contacting the model.
pub fn prepare(artifact: &Artifact, risk: RiskProfile) -> Result<PromptPayload, AnalysisError> {
    let input = ingest::normalize(artifact)?;
    tracing::debug!(kind = input.kind(), %risk, "building analysis prompt");
    Ok(prompt::build(risk, input))
}

/// The analysis action: normalize, prompt, call the model once, validate,
/// then store. The store is only written when every step succeeded.
pub struct Analyzer<C> {
    client: C,
    allocation_tolerance: f64,
}

impl<C: LlmClient> Analyzer<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            allocation_tolerance: DEFAULT_ALLOCATION_TOLERANCE_PCT,
        }
    }

    pub fn with_allocation_tolerance(mut self, tolerance: f64) -> Self {
        self.allocation_tolerance = tolerance;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub async fn run(
        &self,
        artifact: &Artifact,
        risk: RiskProfile,
        store: &ReportStore,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        // Spreadsheet parsing is CPU-bound; keep it off the async workers.
        let owned = artifact.clone();
        let payload = tokio::task::spawn_blocking(move || prepare(&owned, risk))
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    file_name = %artifact.file_name,
                    "upload parsing task failed"
                );
                AnalysisError::unsupported(&artifact.file_name, "the file could not be read")
            })??;

        let raw = llm::analyze(&self.client, &payload).await?;

        let report = contract::validate(&raw).map_err(|e| {
            tracing::warn!(
                provider = ?self.client.provider(),
                field = %e.field(),
                error = %e,
                "model response failed validation"
            );
            AnalysisError::from(e)
        })?;

        let warnings: Vec<_> = contract::allocation_warning(&report, self.allocation_tolerance)
            .into_iter()
            .collect();
        for w in &warnings {
            tracing::warn!(
                total_percentage = w.total_percentage,
                tolerance = w.tolerance,
                "sector allocation does not add up to 100"
            );
        }

        let report = Arc::new(report);
        store.set(Arc::clone(&report));

        tracing::info!(
            file_name = %artifact.file_name,
            %risk,
            country = %report.identified_country,
            sectors = report.sector_allocation.len(),
            warnings = warnings.len(),
            "portfolio analysis stored"
        );

        Ok(AnalysisOutcome { report, warnings })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::llm::Provider;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::time::Duration;

    /// Replays a fixed reply and remembers the prompts it was sent.
    struct ScriptedClient {
        reply: Mutex<Option<Result<String, AnalysisError>>>,
        prompts: Mutex<Vec<PromptPayload>>,
    }

    impl ScriptedClient {
        fn replying(reply: Result<String, AnalysisError>) -> Self {
            Self {
                reply: Mutex::new(Some(reply)),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl LlmClient for ScriptedClient {
        fn provider(&self) -> Provider {
            Provider::Gemini
        }

        async fn complete(&self, payload: &PromptPayload) -> Result<String, AnalysisError> {
            self.prompts.lock().push(payload.clone());
            self.reply
                .lock()
                .take()
                .unwrap_or_else(|| Err(TransportError::Request("no scripted reply".into()).into()))
        }
    }

    fn csv_artifact() -> Artifact {
        Artifact::new(
            "portfolio.csv",
            Some("text/csv".to_string()),
            b"Ticker,Investment\nAAPL,1000\nMSFT,500".to_vec(),
        )
    }

    fn good_reply() -> String {
        let body = json!({
            "identified_country": "USA",
            "sector_allocation": [
                {"sector": "Technology", "investment": 1500, "percentage": 100.0}
            ],
            "diversification_assessment": "All holdings are in technology.",
            "recommendations": {
                "summary": "Diversify.",
                "action_items": ["Add healthcare."],
                "suggested_etfs": [{"ticker": "VTI", "name": "Vanguard Total Stock Market", "reason": "Breadth."}],
                "suggested_companies": []
            }
        });
        format!("```json\n{body}\n```")
    }

    #[tokio::test]
    async fn successful_run_stores_report() {
        let analyzer = Analyzer::new(ScriptedClient::replying(Ok(good_reply())));
        let store = ReportStore::new();

        let outcome = analyzer
            .run(&csv_artifact(), RiskProfile::Moderate, &store)
            .await
            .unwrap();

        assert_eq!(outcome.report.identified_country, "USA");
        assert!(outcome.warnings.is_empty());
        assert!(Arc::ptr_eq(&outcome.report, &store.get().unwrap()));

        let prompts = analyzer.client().prompts.lock();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].text.contains("AAPL,1000"));
        assert!(prompts[0].text.contains("a moderate risk profile"));
    }

    #[tokio::test]
    async fn timeout_leaves_previous_report_in_place() {
        let store = ReportStore::new();
        Analyzer::new(ScriptedClient::replying(Ok(good_reply())))
            .run(&csv_artifact(), RiskProfile::Moderate, &store)
            .await
            .unwrap();
        let before = store.get().unwrap();

        let timeout = TransportError::Timeout {
            after: Duration::from_secs(60),
        };
        let err = Analyzer::new(ScriptedClient::replying(Err(timeout.into())))
            .run(&csv_artifact(), RiskProfile::Aggressive, &store)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AnalysisError::Transport(TransportError::Timeout { .. })
        ));
        assert!(Arc::ptr_eq(&before, &store.get().unwrap()));
    }

    #[tokio::test]
    async fn timeout_on_empty_store_leaves_it_empty() {
        let store = ReportStore::new();
        let timeout = TransportError::Timeout {
            after: Duration::from_secs(60),
        };
        let result = Analyzer::new(ScriptedClient::replying(Err(timeout.into())))
            .run(&csv_artifact(), RiskProfile::Conservative, &store)
            .await;
        assert!(result.is_err());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn malformed_and_invalid_replies_are_not_stored() {
        let store = ReportStore::new();

        let err = Analyzer::new(ScriptedClient::replying(Ok("I cannot help".into())))
            .run(&csv_artifact(), RiskProfile::Moderate, &store)
            .await
            .unwrap_err();
        assert_eq!(err.category(), "malformed_response");

        let bad = json!({
            "identified_country": "USA",
            "sector_allocation": [{"sector": "Tech", "investment": "oops", "percentage": 50}],
            "diversification_assessment": "ok",
            "recommendations": {"summary": "s", "action_items": [], "suggested_etfs": [], "suggested_companies": []}
        });
        let err = Analyzer::new(ScriptedClient::replying(Ok(bad.to_string())))
            .run(&csv_artifact(), RiskProfile::Moderate, &store)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::Validation(crate::error::ValidationError::BadSectorEntry { index: 0, .. })
        ));

        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn unsupported_upload_never_reaches_the_model() {
        let analyzer = Analyzer::new(ScriptedClient::replying(Ok(good_reply())));
        let store = ReportStore::new();
        let artifact = Artifact::new("statement.pdf", None, b"%PDF-1.7".to_vec());

        let err = analyzer
            .run(&artifact, RiskProfile::Moderate, &store)
            .await
            .unwrap_err();

        assert_eq!(err.category(), "unsupported_format");
        assert!(analyzer.client().prompts.lock().is_empty());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn allocation_drift_is_flagged_but_stored() {
        let body = json!({
            "identified_country": "India",
            "sector_allocation": [
                {"sector": "Financials", "investment": 100, "percentage": 60},
                {"sector": "Energy", "investment": 100, "percentage": 60}
            ],
            "diversification_assessment": "Two sectors.",
            "recommendations": {"summary": "s", "action_items": [], "suggested_etfs": [], "suggested_companies": []}
        });
        let analyzer = Analyzer::new(ScriptedClient::replying(Ok(body.to_string())))
            .with_allocation_tolerance(2.0);
        let store = ReportStore::new();

        let outcome = analyzer
            .run(&csv_artifact(), RiskProfile::Moderate, &store)
            .await
            .unwrap();

        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].total_percentage, 120.0);
        assert!(store.get().is_some());
    }

    #[tokio::test]
    async fn image_upload_is_sent_as_attachment() {
        let analyzer = Analyzer::new(ScriptedClient::replying(Ok(good_reply())));
        let store = ReportStore::new();
        let artifact = Artifact::new(
            "holdings.png",
            Some("image/png".to_string()),
            vec![0x89, b'P', b'N', b'G'],
        );

        analyzer
            .run(&artifact, RiskProfile::Aggressive, &store)
            .await
            .unwrap();

        let prompts = analyzer.client().prompts.lock();
        let image = prompts[0].image.as_ref().unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.bytes, vec![0x89, b'P', b'N', b'G']);
    }

    #[test]
    fn prepare_builds_the_prompt_on_its_own() {
        let payload = prepare(&csv_artifact(), RiskProfile::Conservative).unwrap();
        assert!(payload.text.contains("MSFT,500"));
        assert!(payload.text.contains("a conservative risk profile"));
        assert!(payload.image.is_none());

        let err = prepare(
            &Artifact::new("statement.pdf", None, b"%PDF".to_vec()),
            RiskProfile::Moderate,
        )
        .unwrap_err();
        assert_eq!(err.category(), "unsupported_format");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn workbook_is_parsed_on_the_blocking_pool() {
        let analyzer = Analyzer::new(ScriptedClient::replying(Ok(good_reply())));
        let store = ReportStore::new();
        let bytes = crate::ingest::normalize::workbook_fixture(&[
            &["Ticker", "Investment"],
            &["AAPL", "1000"],
            &["MSFT", "500.5"],
        ]);
        let artifact = Artifact::new("holdings.xlsx", None, bytes);

        analyzer
            .run(&artifact, RiskProfile::Moderate, &store)
            .await
            .unwrap();

        let prompts = analyzer.client().prompts.lock();
        assert!(prompts[0].text.contains("Ticker,Investment\nAAPL,1000\nMSFT,500.5"));
        assert!(store.get().is_some());
    }
}
