// Weighted priority scoring
//
// Priority = 0.40*poverty + 0.30*impact + 0.20*environment + 0.10*(1 - corruption)
// All inputs and the output live on the 0-1 scale.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const POVERTY_WEIGHT: f64 = 0.40;
const IMPACT_WEIGHT: f64 = 0.30;
const ENVIRONMENT_WEIGHT: f64 = 0.20;
const GOVERNANCE_WEIGHT: f64 = 0.10;

/// The four submitted indicators, each on a 0-1 scale.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Metrics {
    /// Higher = more poverty
    pub poverty_index: f64,
    /// Higher = more expected impact
    pub project_impact: f64,
    /// Higher = more environmental degradation
    pub environmental_score: f64,
    /// Higher = more governance risk
    pub corruption_risk: f64,
}

impl Metrics {
    /// Reject any indicator outside [0, 1].
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("poverty_index", self.poverty_index),
            ("project_impact", self.project_impact),
            ("environmental_score", self.environmental_score),
            ("corruption_risk", self.corruption_risk),
        ] {
            if !(0.0..=1.0).contains(&value) || !value.is_finite() {
                return Err(Error::validation(format!(
                    "{name} must be between 0 and 1, got {value}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityLevel {
    Critical,
    High,
    Medium,
    Low,
}

impl PriorityLevel {
    /// Level thresholds: >= 0.7 critical, >= 0.5 high, >= 0.3 medium.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.7 {
            PriorityLevel::Critical
        } else if score >= 0.5 {
            PriorityLevel::High
        } else if score >= 0.3 {
            PriorityLevel::Medium
        } else {
            PriorityLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityLevel::Critical => "critical",
            PriorityLevel::High => "high",
            PriorityLevel::Medium => "medium",
            PriorityLevel::Low => "low",
        }
    }
}

/// Per-factor weighted contributions to the final score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FactorBreakdown {
    pub poverty_index: f64,
    pub project_impact: f64,
    pub environmental_score: f64,
    pub corruption_risk: f64,
}

/// Full engine verdict for one region submission.
#[derive(Debug, Clone, Serialize)]
pub struct PriorityResult {
    pub priority_score: f64,
    pub priority_level: PriorityLevel,
    pub allocation_percentage: f64,
    pub confidence_score: f64,
    pub explanation: String,
    pub key_findings: Vec<String>,
    pub recommendations: Vec<String>,
    pub factors: FactorBreakdown,
    pub engine: &'static str,
}

/// Raw weighted sum, clamped to [0, 1]. Corruption is inverted: lower risk
/// raises priority.
pub fn weighted_score(metrics: &Metrics) -> f64 {
    let score = metrics.poverty_index * POVERTY_WEIGHT
        + metrics.project_impact * IMPACT_WEIGHT
        + metrics.environmental_score * ENVIRONMENT_WEIGHT
        + (1.0 - metrics.corruption_risk) * GOVERNANCE_WEIGHT;
    score.clamp(0.0, 1.0)
}

/// Run the full verdict: score, level, allocation percentage, confidence,
/// narrative explanation, findings, and recommendations.
pub fn calculate(metrics: &Metrics) -> Result<PriorityResult> {
    metrics.validate()?;

    let score = weighted_score(metrics);
    let level = PriorityLevel::from_score(score);
    // Higher priority = higher allocation; never below a 10% baseline.
    let allocation_percentage = (score * 100.0).clamp(10.0, 100.0);
    let confidence = 0.85 + score * 0.10;

    Ok(PriorityResult {
        priority_score: round4(score),
        priority_level: level,
        allocation_percentage: round2(allocation_percentage),
        confidence_score: round2(confidence),
        explanation: level_explanation(score, level, metrics),
        key_findings: key_findings(metrics),
        recommendations: recommendations(allocation_percentage, metrics),
        factors: FactorBreakdown {
            poverty_index: metrics.poverty_index * POVERTY_WEIGHT,
            project_impact: metrics.project_impact * IMPACT_WEIGHT,
            environmental_score: metrics.environmental_score * ENVIRONMENT_WEIGHT,
            corruption_risk: (1.0 - metrics.corruption_risk) * GOVERNANCE_WEIGHT,
        },
        engine: "engine_local",
    })
}

fn level_explanation(score: f64, level: PriorityLevel, m: &Metrics) -> String {
    match level {
        PriorityLevel::Critical => format!(
            "This region shows CRITICAL need with a priority score of {:.1}%. \
             Immediate intervention is required due to high poverty ({:.1}%) \
             and significant project impact potential ({:.1}%).",
            score * 100.0,
            m.poverty_index * 100.0,
            m.project_impact * 100.0
        ),
        PriorityLevel::High => format!(
            "This region has HIGH priority with a score of {:.1}%. \
             Substantial resource allocation is recommended given the poverty level ({:.1}%) \
             and environmental conditions ({:.1}%).",
            score * 100.0,
            m.poverty_index * 100.0,
            m.environmental_score * 100.0
        ),
        PriorityLevel::Medium => format!(
            "This region shows MEDIUM priority with a score of {:.1}%. \
             Standard resource allocation is appropriate based on current metrics.",
            score * 100.0
        ),
        PriorityLevel::Low => format!(
            "This region has LOWER priority with a score of {:.1}%. \
             Baseline support should be maintained while monitoring for changing conditions.",
            score * 100.0
        ),
    }
}

fn key_findings(m: &Metrics) -> Vec<String> {
    let mut findings = Vec::new();

    if m.poverty_index >= 0.7 {
        findings.push(format!(
            "High poverty rate detected ({:.1}%) - economic support needed",
            m.poverty_index * 100.0
        ));
    }
    if m.project_impact >= 0.7 {
        findings.push(format!(
            "High project impact potential ({:.1}%) - investments will yield strong returns",
            m.project_impact * 100.0
        ));
    }
    if m.environmental_score >= 0.7 {
        findings.push(format!(
            "Severe environmental degradation ({:.1}%) - conservation measures urgent",
            m.environmental_score * 100.0
        ));
    }
    if m.corruption_risk >= 0.6 {
        findings.push(format!(
            "Elevated corruption risk ({:.1}%) - enhanced oversight required",
            m.corruption_risk * 100.0
        ));
    } else if m.corruption_risk <= 0.3 {
        findings.push(format!(
            "Low corruption risk ({:.1}%) - favorable governance environment",
            m.corruption_risk * 100.0
        ));
    }

    if findings.is_empty() {
        findings.push("Metrics indicate balanced conditions across all indicators".to_string());
    }
    findings
}

fn recommendations(allocation_percentage: f64, m: &Metrics) -> Vec<String> {
    let mut recs = Vec::new();

    if allocation_percentage >= 70.0 {
        recs.push("Allocate majority of available funds to this region".to_string());
        recs.push("Fast-track project approvals and implementation".to_string());
    } else if allocation_percentage >= 50.0 {
        recs.push("Provide substantial funding allocation".to_string());
        recs.push("Implement standard monitoring protocols".to_string());
    } else {
        recs.push("Provide moderate funding allocation".to_string());
        recs.push("Monitor for changing conditions".to_string());
    }

    if m.poverty_index >= 0.7 {
        recs.push("Prioritize poverty alleviation programs".to_string());
        recs.push("Implement cash transfer or social safety net schemes".to_string());
    }
    if m.project_impact >= 0.7 {
        recs.push("Maximize investment in high-impact projects".to_string());
    }
    if m.environmental_score >= 0.7 {
        recs.push("Include environmental restoration components".to_string());
        recs.push("Engage local communities in conservation".to_string());
    }
    if m.corruption_risk >= 0.6 {
        recs.push("Establish strong audit and oversight mechanisms".to_string());
        recs.push("Use transparent digital payment systems".to_string());
    }

    recs
}

pub(crate) fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

pub(crate) fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
