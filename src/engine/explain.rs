// Allocation explanations
//
// Citizen-facing narratives for an allocation decision, rendered locally
// when the AI provider is unavailable. English carries the full structure;
// Spanish and Swahili are shorter renditions.

use serde::{Deserialize, Serialize};

use crate::engine::scoring::{round2, PriorityLevel};

/// Explanation languages the local renderer supports. Anything else falls
/// back to English.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Es,
    Sw,
}

impl Language {
    pub fn from_code(code: &str) -> Self {
        match code.to_ascii_lowercase().as_str() {
            "es" => Language::Es,
            "sw" => Language::Sw,
            _ => Language::En,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Es => "es",
            Language::Sw => "sw",
        }
    }
}

/// The allocation decision being explained. Every field has a neutral
/// default so partial payloads still produce a readable narrative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationData {
    #[serde(default = "default_half")]
    pub poverty_index: f64,
    #[serde(default = "default_half")]
    pub project_impact: f64,
    #[serde(default = "default_half")]
    pub environmental_score: f64,
    #[serde(default = "default_low_risk")]
    pub corruption_risk: f64,
    #[serde(default = "default_half")]
    pub priority_score: f64,
    #[serde(default = "default_fifty")]
    pub allocation_percentage: f64,
}

impl Default for AllocationData {
    fn default() -> Self {
        Self {
            poverty_index: default_half(),
            project_impact: default_half(),
            environmental_score: default_half(),
            corruption_risk: default_low_risk(),
            priority_score: default_half(),
            allocation_percentage: default_fifty(),
        }
    }
}

fn default_half() -> f64 {
    0.5
}
fn default_low_risk() -> f64 {
    0.3
}
fn default_fifty() -> f64 {
    50.0
}

#[derive(Debug, Clone, Serialize)]
pub struct ExplanationResult {
    pub region_id: String,
    pub explanation: String,
    pub rationale: String,
    pub key_points: Vec<String>,
    pub recommendations: Vec<String>,
    pub transparency_notes: String,
    pub language: Language,
    pub engine: &'static str,
}

/// Render the allocation explanation for a region in the requested language.
pub fn generate_explanation(
    region_id: &str,
    data: &AllocationData,
    context: &str,
    language: Language,
) -> ExplanationResult {
    let score = round2(data.priority_score);
    match language {
        Language::Es => spanish(region_id, score, data),
        Language::Sw => swahili(region_id, score, data),
        Language::En => english(region_id, score, data, context),
    }
}

fn level_labels(score: f64) -> (&'static str, &'static str) {
    match PriorityLevel::from_score(score) {
        PriorityLevel::Critical => ("CRITICAL", "immediate"),
        PriorityLevel::High => ("HIGH", "substantial"),
        PriorityLevel::Medium => ("MEDIUM", "moderate"),
        PriorityLevel::Low => ("LOW", "baseline"),
    }
}

fn english(
    region_id: &str,
    score: f64,
    data: &AllocationData,
    context: &str,
) -> ExplanationResult {
    let (level, urgency) = level_labels(score);

    let narrative = format!(
        "**Resource Allocation Decision for {region_id}**\n\n\
         Based on comprehensive analysis of regional indicators, {region_id} has been \
         assigned a **{level}** priority level with a priority score of {:.1}%. This \
         results in a recommended budget allocation of {:.1}%.\n\n\
         **Key Metrics Analysis:**\n\
         - **Poverty Index**: {:.1}% - {}\n\
         - **Project Impact**: {:.1}% - {}\n\
         - **Environmental Factors**: {:.1}% - {}\n\
         - **Governance Risk**: {:.1}% - {}\n\n\
         This {urgency} allocation is recommended to address the identified needs \
         while ensuring efficient resource utilization.",
        score * 100.0,
        data.allocation_percentage,
        data.poverty_index * 100.0,
        if data.poverty_index > 0.6 {
            "High poverty levels require economic support"
        } else {
            "Moderate poverty conditions"
        },
        data.project_impact * 100.0,
        if data.project_impact > 0.6 {
            "Strong potential for positive outcomes"
        } else {
            "Moderate impact expected"
        },
        data.environmental_score * 100.0,
        if data.environmental_score > 0.6 {
            "Significant environmental challenges"
        } else {
            "Manageable environmental conditions"
        },
        data.corruption_risk * 100.0,
        if data.corruption_risk > 0.5 {
            "Enhanced oversight required"
        } else {
            "Good governance environment"
        },
    );

    let rationale = format!(
        "The allocation decision follows a transparent, evidence-based methodology:\n\n\
         1. **Data Collection**: Regional metrics gathered from verified sources\n\
         2. **Weighted Scoring**: Priority calculated using validated weights \
         (Poverty: 40%, Impact: 30%, Environment: 20%, Governance: 10%)\n\
         3. **Risk Assessment**: Corruption and implementation risks evaluated\n\
         4. **Allocation Mapping**: Priority score translated to funding percentage recommendation\n\n\
         {}",
        if context.is_empty() {
            "Decision made using standard evaluation criteria."
        } else {
            context
        }
    );

    let key_points = vec![
        format!("Priority Level: {level} ({:.1}%)", score * 100.0),
        format!(
            "Recommended Allocation: {:.1}% of available budget",
            data.allocation_percentage
        ),
        format!(
            "Primary drivers: {}",
            if data.poverty_index > 0.6 {
                "Poverty reduction"
            } else {
                "Balanced development"
            }
        ),
        format!(
            "Implementation context: {}",
            if data.corruption_risk > 0.5 {
                "High oversight needed"
            } else {
                "Standard monitoring sufficient"
            }
        ),
    ];

    let mut recommendations = if data.allocation_percentage >= 70.0 {
        vec![
            "Fast-track approval and disbursement processes".to_string(),
            "Deploy experienced project management teams".to_string(),
            "Establish weekly monitoring checkpoints".to_string(),
        ]
    } else if data.allocation_percentage >= 50.0 {
        vec![
            "Follow standard approval processes with priority review".to_string(),
            "Implement regular monitoring protocols".to_string(),
            "Ensure stakeholder engagement".to_string(),
        ]
    } else {
        vec![
            "Process through regular channels".to_string(),
            "Monitor for changing conditions".to_string(),
            "Maintain baseline support".to_string(),
        ]
    };
    if data.corruption_risk > 0.5 {
        recommendations
            .push("Implement enhanced financial controls and third-party audits".to_string());
    }

    ExplanationResult {
        region_id: region_id.to_string(),
        explanation: narrative,
        rationale,
        key_points,
        recommendations,
        transparency_notes: "This allocation recommendation was generated using an explainable \
                             system designed for transparency and accountability. All calculations \
                             follow documented methodologies and can be audited. Stakeholders may \
                             request detailed breakdowns of the scoring and weighting systems used."
            .to_string(),
        language: Language::En,
        engine: "engine_local",
    }
}

fn spanish(region_id: &str, score: f64, data: &AllocationData) -> ExplanationResult {
    let level = match PriorityLevel::from_score(score) {
        PriorityLevel::Critical => "CRÍTICA",
        PriorityLevel::High => "ALTA",
        PriorityLevel::Medium => "MEDIA",
        PriorityLevel::Low => "BAJA",
    };

    let narrative = format!(
        "**Decisión de Asignación de Recursos para {region_id}**\n\n\
         Basado en un análisis exhaustivo de indicadores regionales, {region_id} ha sido \
         asignado un nivel de prioridad **{level}** con una puntuación de {:.1}%. Esto \
         resulta en una asignación presupuestaria recomendada de {:.1}%.\n\n\
         **Análisis de Métricas Clave:**\n\
         - **Índice de Pobreza**: {:.1}%\n\
         - **Impacto del Proyecto**: {:.1}%\n\
         - **Factores Ambientales**: {:.1}%\n\
         - **Riesgo de Gobernanza**: {:.1}%",
        score * 100.0,
        data.allocation_percentage,
        data.poverty_index * 100.0,
        data.project_impact * 100.0,
        data.environmental_score * 100.0,
        data.corruption_risk * 100.0,
    );

    ExplanationResult {
        region_id: region_id.to_string(),
        explanation: narrative,
        rationale: "Decisión basada en metodología transparente y validada científicamente."
            .to_string(),
        key_points: vec![
            format!("Nivel de Prioridad: {level}"),
            format!("Asignación Recomendada: {:.1}%", data.allocation_percentage),
        ],
        recommendations: vec![
            "Monitoreo continuo".to_string(),
            "Evaluación de impacto".to_string(),
            "Ajustes según necesidad".to_string(),
        ],
        transparency_notes: "Sistema explicable para transparencia total.".to_string(),
        language: Language::Es,
        engine: "engine_local",
    }
}

fn swahili(region_id: &str, score: f64, data: &AllocationData) -> ExplanationResult {
    let level = match PriorityLevel::from_score(score) {
        PriorityLevel::Critical => "MUHIMU SANA",
        PriorityLevel::High => "MUHIMU",
        PriorityLevel::Medium => "WA KATI",
        PriorityLevel::Low => "WA CHINI",
    };

    let narrative = format!(
        "**Uamuzi wa Ugawaji wa Rasilimali kwa {region_id}**\n\n\
         Kulingana na uchambuzi kamili wa viashiria vya mkoa, {region_id} imepewa kiwango \
         cha kipaumbele cha **{level}** na alama ya {:.1}%. Hii inasababisha mapendekezo \
         ya ugawaji wa bajeti ya {:.1}%.\n\n\
         **Uchambuzi wa Vipimo Muhimu:**\n\
         - **Kiwango cha Umaskini**: {:.1}%\n\
         - **Athari ya Mradi**: {:.1}%\n\
         - **Mambo ya Mazingira**: {:.1}%\n\
         - **Hatari ya Utawala**: {:.1}%",
        score * 100.0,
        data.allocation_percentage,
        data.poverty_index * 100.0,
        data.project_impact * 100.0,
        data.environmental_score * 100.0,
        data.corruption_risk * 100.0,
    );

    ExplanationResult {
        region_id: region_id.to_string(),
        explanation: narrative,
        rationale: "Uamuzi kulingana na mbinu wazi na imeidhinishwa kisayansi.".to_string(),
        key_points: vec![
            format!("Kiwango cha Kipaumbele: {level}"),
            format!("Ugawaji Unaopendekezwa: {:.1}%", data.allocation_percentage),
        ],
        recommendations: vec![
            "Ufuatiliaji endelevu".to_string(),
            "Tathmini ya athari".to_string(),
            "Marekebisho kulingana na mahitaji".to_string(),
        ],
        transparency_notes: "Mfumo unaoweza kuelezwa kwa uwazi kamili.".to_string(),
        language: Language::Sw,
        engine: "engine_local",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(score: f64) -> AllocationData {
        AllocationData {
            poverty_index: 0.8,
            project_impact: 0.7,
            environmental_score: 0.4,
            corruption_risk: 0.6,
            priority_score: score,
            allocation_percentage: 75.0,
        }
    }

    #[test]
    fn test_language_from_code() {
        assert_eq!(Language::from_code("es"), Language::Es);
        assert_eq!(Language::from_code("SW"), Language::Sw);
        assert_eq!(Language::from_code("en"), Language::En);
        // Unknown codes fall back to English
        assert_eq!(Language::from_code("fr"), Language::En);
    }

    #[test]
    fn test_english_narrative_includes_level_and_region() {
        let result = generate_explanation("R-001", &data(0.82), "", Language::En);
        assert!(result.explanation.contains("CRITICAL"));
        assert!(result.explanation.contains("R-001"));
        assert!(result
            .recommendations
            .iter()
            .any(|r| r.contains("Fast-track")));
        // High corruption risk adds the audit recommendation
        assert!(result
            .recommendations
            .iter()
            .any(|r| r.contains("third-party audits")));
    }

    #[test]
    fn test_context_embedded_in_rationale() {
        let result =
            generate_explanation("R-001", &data(0.5), "Drought emergency declared", Language::En);
        assert!(result.rationale.contains("Drought emergency declared"));
    }

    #[test]
    fn test_spanish_and_swahili_levels() {
        let es = generate_explanation("R-2", &data(0.55), "", Language::Es);
        assert!(es.explanation.contains("ALTA"));
        assert_eq!(es.language, Language::Es);

        let sw = generate_explanation("R-2", &data(0.2), "", Language::Sw);
        assert!(sw.explanation.contains("WA CHINI"));
    }

    #[test]
    fn test_allocation_data_defaults() {
        let parsed: AllocationData = serde_json::from_str("{}").unwrap();
        assert!((parsed.poverty_index - 0.5).abs() < 1e-9);
        assert!((parsed.corruption_risk - 0.3).abs() < 1e-9);
        assert!((parsed.allocation_percentage - 50.0).abs() < 1e-9);
    }
}
