// Prompt builders
//
// Markdown context assembled from metrics, optimizer output, notes, and
// processed evidence, followed by task instructions. File and URL summaries
// are truncated so one oversized document cannot crowd out the rest.

use super::{AllocationPayload, ExplanationPayload};

const SUMMARY_LIMIT: usize = 500;
const REFERENCE_LIMIT: usize = 300;

pub(super) fn allocation_prompt(payload: &AllocationPayload) -> String {
    let context = allocation_context(payload);
    format!(
        "You are an expert advisor for civic resource allocation and governance. \
         Your role is to analyze regional data and provide evidence-based recommendations \
         for resource allocation.\n\n\
         # Task\n\
         Analyze the following data and provide a comprehensive allocation recommendation \
         for {region}.\n\n\
         # Context and Data\n\
         {context}\n\n\
         # Your Analysis Should Include:\n\
         1. **Priority Assessment**: Evaluate the overall priority score and its components\n\
         2. **Risk Analysis**: Assess corruption risk and mitigation strategies\n\
         3. **Impact Projection**: Estimate expected outcomes and benefits\n\
         4. **Resource Recommendations**: Specific allocation suggestions\n\
         5. **Implementation Strategy**: Practical steps for deployment\n\n\
         # Output Format\n\
         Provide a structured JSON response with the following keys:\n\
         - priority_level: \"high\" | \"medium\" | \"low\"\n\
         - recommended_allocation_percentage: number (0-100)\n\
         - confidence_score: number (0-1)\n\
         - key_findings: array of strings\n\
         - recommendations: array of strings\n\
         - risk_assessment: object with risk factors and mitigations\n\
         - expected_impact: object with quantitative and qualitative impacts\n\n\
         Be data-driven, objective, and focus on maximizing social impact while \
         minimizing risks.",
        region = payload.region_id,
    )
}

fn allocation_context(payload: &AllocationPayload) -> String {
    let mut parts = Vec::new();

    parts.push("## Regional Metrics".to_string());
    parts.push(format!("Region: {}", payload.region_id));
    parts.push(format!("- Poverty Index: {:.2}", payload.metrics.poverty_index));
    parts.push(format!("- Project Impact: {:.2}", payload.metrics.project_impact));
    parts.push(format!(
        "- Environmental Score: {:.2}",
        payload.metrics.environmental_score
    ));
    parts.push(format!("- Corruption Risk: {:.2}", payload.metrics.corruption_risk));

    parts.push("\n## Optimization Analysis".to_string());
    parts.push(format!(
        "- Priority Score: {:.3}",
        payload.optimization.priority_score
    ));
    parts.push(format!(
        "- Risk-Adjusted Return: {:.3}",
        payload.optimization.risk_adjusted_return
    ));
    parts.push("\n### Score Components:".to_string());
    parts.push(format!(
        "  - Poverty Contribution: {:.3}",
        payload.optimization.components.poverty_contribution
    ));
    parts.push(format!(
        "  - Impact Contribution: {:.3}",
        payload.optimization.components.impact_contribution
    ));
    parts.push(format!(
        "  - Environment Contribution: {:.3}",
        payload.optimization.components.environment_contribution
    ));
    parts.push(format!(
        "  - Risk Penalty: {:.3}",
        payload.optimization.components.risk_penalty
    ));

    if let Some(notes) = &payload.notes {
        parts.push("\n## Additional Notes".to_string());
        parts.push(notes.content.clone());
        parts.push(format!("Language: {}", notes.language));
    }

    if !payload.files.is_empty() {
        parts.push("\n## Processed Documents".to_string());
        for (i, file) in payload.files.iter().enumerate() {
            parts.push(format!("\n### Document {}: {}", i + 1, file.filename));
            parts.push(format!("Language: {}", file.language));
            parts.push(format!("Summary: {}", truncate(&file.summary, SUMMARY_LIMIT)));
        }
    }

    if !payload.urls.is_empty() {
        parts.push("\n## Referenced Web Content".to_string());
        for (i, url) in payload.urls.iter().enumerate() {
            parts.push(format!("\n### Source {}: {}", i + 1, url.url));
            parts.push(format!("Summary: {}", truncate(&url.summary, SUMMARY_LIMIT)));
        }
    }

    parts.join("\n")
}

pub(super) fn explanation_prompt(payload: &ExplanationPayload) -> String {
    let context = explanation_context(payload);
    let lang = language_instruction(&payload.language);
    format!(
        "You are a civic communication expert helping citizens understand government \
         resource allocation decisions.\n\n\
         # Task\n\
         Explain the allocation decision {lang} in a way that is:\n\
         - Clear and accessible to non-experts\n\
         - Transparent about methodology and reasoning\n\
         - Honest about uncertainties and limitations\n\n\
         # Allocation Decision Context\n\
         {context}\n\n\
         # Your Explanation Should Cover:\n\
         1. **What was decided**: Clear statement of the allocation\n\
         2. **Why this decision**: Key factors and reasoning\n\
         3. **How it helps**: Expected benefits for the community\n\
         4. **What happens next**: Implementation steps\n\n\
         # Output Format\n\
         Provide a well-structured explanation in {language} that a typical citizen \
         can understand and trust.",
        language = payload.language,
    )
}

fn explanation_context(payload: &ExplanationPayload) -> String {
    let mut parts = Vec::new();

    parts.push(format!("## Allocation Decision for {}", payload.region_id));
    parts.push(
        serde_json::to_string_pretty(&payload.allocation_data)
            .unwrap_or_else(|_| payload.allocation_data.to_string()),
    );

    if !payload.context.is_empty() {
        parts.push("\n## Additional Context".to_string());
        parts.push(payload.context.clone());
    }

    if let Some(notes) = &payload.notes {
        parts.push("\n## Notes".to_string());
        parts.push(notes.content.clone());
    }

    if !payload.files.is_empty() {
        parts.push("\n## Supporting Documents".to_string());
        for file in &payload.files {
            parts.push(format!(
                "- {}: {}",
                file.filename,
                truncate(&file.summary, REFERENCE_LIMIT)
            ));
        }
    }

    if !payload.urls.is_empty() {
        parts.push("\n## Reference Sources".to_string());
        for url in &payload.urls {
            parts.push(format!(
                "- {}: {}",
                url.url,
                truncate(&url.summary, REFERENCE_LIMIT)
            ));
        }
    }

    parts.join("\n")
}

fn language_instruction(code: &str) -> String {
    match code {
        "en" => "in clear, simple English".to_string(),
        "es" => "en español claro y sencillo".to_string(),
        "fr" => "en français clair et simple".to_string(),
        "sw" => "kwa Kiswahili rahisi na wazi".to_string(),
        "ar" => "بالعربية الواضحة والبسيطة".to_string(),
        other => format!("in clear, simple {other}"),
    }
}

fn truncate(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Metrics, OptimizerScore};
    use serde_json::json;

    fn payload() -> AllocationPayload {
        let metrics = Metrics {
            poverty_index: 0.8,
            project_impact: 0.6,
            environmental_score: 0.4,
            corruption_risk: 0.3,
        };
        AllocationPayload {
            request_id: "alloc_1".to_string(),
            region_id: "Turkana".to_string(),
            metrics,
            optimization: OptimizerScore::from_metrics(&metrics),
            notes: Some(super::super::Note {
                content: "Severe drought this quarter".to_string(),
                language: "en".to_string(),
            }),
            files: vec![],
            urls: vec![],
            timestamp: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_allocation_prompt_includes_metrics_and_notes() {
        let prompt = allocation_prompt(&payload());
        assert!(prompt.contains("Turkana"));
        assert!(prompt.contains("Poverty Index: 0.80"));
        assert!(prompt.contains("Severe drought this quarter"));
        assert!(prompt.contains("priority_level"));
    }

    #[test]
    fn test_explanation_prompt_language_instruction() {
        let payload = ExplanationPayload {
            request_id: "explain_1".to_string(),
            region_id: "R-1".to_string(),
            allocation_data: json!({"priority_score": 0.7}),
            context: "post-flood recovery".to_string(),
            language: "sw".to_string(),
            notes: None,
            files: vec![],
            urls: vec![],
            timestamp: String::new(),
        };
        let prompt = explanation_prompt(&payload);
        assert!(prompt.contains("kwa Kiswahili rahisi na wazi"));
        assert!(prompt.contains("post-flood recovery"));
        assert!(prompt.contains("priority_score"));
    }

    #[test]
    fn test_unknown_language_falls_through() {
        assert_eq!(language_instruction("de"), "in clear, simple de");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello", 3), "hel");
        // Multi-byte characters are not split
        assert_eq!(truncate("ééé", 2), "éé");
    }
}
