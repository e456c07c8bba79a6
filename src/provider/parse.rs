// Model response parsing
//
// Models are asked for JSON but answer however they like. A fenced block is
// preferred, then the whole text; a parse failure degrades to a structured
// medium-priority verdict carrying the raw analysis.

use serde_json::{json, Value};

use crate::engine::OptimizerScore;

/// Parse an allocation verdict out of model text and graft the optimizer
/// score onto it.
pub fn parse_allocation_response(response: &str, optimization: &OptimizerScore) -> Value {
    let candidate = extract_json_block(response).unwrap_or_else(|| response.trim().to_string());

    let mut parsed = match serde_json::from_str::<Value>(&candidate) {
        Ok(Value::Object(map)) => Value::Object(map),
        _ => json!({
            "priority_level": "medium",
            "confidence_score": 0.7,
            "analysis": response,
        }),
    };

    if let Some(map) = parsed.as_object_mut() {
        map.insert(
            "optimization_score".to_string(),
            json!(optimization.priority_score),
        );
        map.insert(
            "risk_adjusted_return".to_string(),
            json!(optimization.risk_adjusted_return),
        );
    }
    parsed
}

/// Contents of the first ```json fence, if any.
fn extract_json_block(response: &str) -> Option<String> {
    let start = response.find("```json")? + "```json".len();
    let rest = &response[start..];
    let end = rest.find("```")?;
    Some(rest[..end].trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Metrics;

    fn optimization() -> OptimizerScore {
        OptimizerScore::from_metrics(&Metrics {
            poverty_index: 0.8,
            project_impact: 0.6,
            environmental_score: 0.4,
            corruption_risk: 0.3,
        })
    }

    #[test]
    fn test_parses_fenced_json() {
        let response = "Here is my analysis:\n```json\n{\"priority_level\": \"high\", \
                        \"confidence_score\": 0.92}\n```\nLet me know if you need more.";
        let parsed = parse_allocation_response(response, &optimization());
        assert_eq!(parsed["priority_level"], "high");
        assert!((parsed["confidence_score"].as_f64().unwrap() - 0.92).abs() < 1e-9);
        assert!(parsed["optimization_score"].as_f64().is_some());
    }

    #[test]
    fn test_parses_bare_json() {
        let response = r#"{"priority_level": "low", "key_findings": []}"#;
        let parsed = parse_allocation_response(response, &optimization());
        assert_eq!(parsed["priority_level"], "low");
    }

    #[test]
    fn test_prose_falls_back_to_structured() {
        let response = "The region clearly needs substantial support based on poverty levels.";
        let parsed = parse_allocation_response(response, &optimization());
        assert_eq!(parsed["priority_level"], "medium");
        assert_eq!(parsed["analysis"].as_str().unwrap(), response);
        assert!(parsed["risk_adjusted_return"].as_f64().is_some());
    }

    #[test]
    fn test_non_object_json_falls_back() {
        // An array parses as JSON but is not a verdict
        let parsed = parse_allocation_response("[1, 2, 3]", &optimization());
        assert_eq!(parsed["priority_level"], "medium");
    }

    #[test]
    fn test_unterminated_fence_uses_whole_text() {
        let response = "```json\n{\"priority_level\": \"high\"}";
        // No closing fence: the raw text is not valid JSON, so fall back
        let parsed = parse_allocation_response(response, &optimization());
        assert_eq!(parsed["priority_level"], "medium");
    }
}
