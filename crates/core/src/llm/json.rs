use crate::error::AnalysisError;

/// Removes a ```` ```json ```` (any case, or bare ```` ``` ````) opening
/// fence and a closing ```` ``` ```` fence, if the model wrapped its reply in one.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let inner = match trimmed.strip_prefix("```") {
        Some(rest) => {
            let tagged = rest
                .get(..4)
                .is_some_and(|tag| tag.eq_ignore_ascii_case("json"));
            if tagged {
                &rest[4..]
            } else {
                rest
            }
        }
        None => trimmed,
    };
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    inner.trim()
}

pub fn parse_response(text: &str) -> Result<serde_json::Value, AnalysisError> {
    let cleaned = strip_code_fences(text);
    serde_json::from_str::<serde_json::Value>(cleaned).map_err(|e| {
        tracing::warn!(error = %e, raw_len = text.len(), "model reply is not valid JSON");
        AnalysisError::MalformedResponse {
            detail: e.to_string(),
            raw_output: text.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BODY: &str = r#"{"identified_country":"USA","sector_allocation":[]}"#;

    #[test]
    fn strips_json_fences() {
        let fenced = format!("```json\n{BODY}\n```\n");
        assert_eq!(strip_code_fences(&fenced), BODY);
    }

    #[test]
    fn strips_bare_and_single_line_fences() {
        assert_eq!(strip_code_fences(&format!("```\n{BODY}\n```")), BODY);
        assert_eq!(strip_code_fences(&format!("```json{BODY}```")), BODY);
    }

    #[test]
    fn fence_language_tag_is_case_insensitive() {
        for tag in ["Json", "JSON", "jSoN"] {
            let fenced = format!("```{tag}\n{BODY}\n```");
            assert_eq!(strip_code_fences(&fenced), BODY, "{tag}");
            assert!(parse_response(&fenced).is_ok(), "{tag}");
        }
    }

    #[test]
    fn leaves_unfenced_text_alone() {
        assert_eq!(strip_code_fences(&format!("  \n{BODY}\n ")), BODY);
    }

    #[test]
    fn fenced_and_unfenced_replies_parse_identically() {
        let fenced = parse_response(&format!("```json\n{BODY}\n```")).unwrap();
        let plain = parse_response(BODY).unwrap();
        assert_eq!(fenced, plain);
        assert_eq!(plain["identified_country"], json!("USA"));
    }

    #[test]
    fn prose_is_a_malformed_response() {
        let err = parse_response("Sure! Here is your analysis: {").unwrap_err();
        match err {
            AnalysisError::MalformedResponse { raw_output, .. } => {
                assert_eq!(raw_output, "Sure! Here is your analysis: {");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
