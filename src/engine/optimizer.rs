// Gateway-side scoring and budget split
//
// The gateway scores submissions with a steeper profile than the local
// engine: corruption is a subtracted penalty rather than an inverted bonus,
// and the raw sum is pushed through a sigmoid so mid-range differences are
// amplified. The budget split distributes a total across regions with a 5%
// floor per region and the remainder proportional to score.

use serde::{Deserialize, Serialize};

use crate::engine::scoring::Metrics;

const POVERTY_WEIGHT: f64 = 0.35;
const IMPACT_WEIGHT: f64 = 0.30;
const ENVIRONMENT_WEIGHT: f64 = 0.20;
const RISK_WEIGHT: f64 = 0.15;

/// Minimum share of the total budget any funded region receives.
const MIN_SHARE: f64 = 0.05;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreComponents {
    pub poverty_contribution: f64,
    pub impact_contribution: f64,
    pub environment_contribution: f64,
    pub risk_penalty: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OptimizerScore {
    /// Sigmoid-normalized score in (0, 1)
    pub priority_score: f64,
    /// Raw weighted sum before normalization (may be negative)
    pub base_score: f64,
    /// base / (1 + corruption_risk)
    pub risk_adjusted_return: f64,
    pub components: ScoreComponents,
}

impl OptimizerScore {
    pub fn from_metrics(metrics: &Metrics) -> Self {
        let base = POVERTY_WEIGHT * metrics.poverty_index
            + IMPACT_WEIGHT * metrics.project_impact
            + ENVIRONMENT_WEIGHT * metrics.environmental_score
            - RISK_WEIGHT * metrics.corruption_risk;

        // Sigmoid centered at 0.5 with slope 5 for smooth scaling
        let normalized = 1.0 / (1.0 + (-5.0 * (base - 0.5)).exp());

        Self {
            priority_score: normalized,
            base_score: base,
            risk_adjusted_return: base / (1.0 + metrics.corruption_risk),
            components: ScoreComponents {
                poverty_contribution: POVERTY_WEIGHT * metrics.poverty_index,
                impact_contribution: IMPACT_WEIGHT * metrics.project_impact,
                environment_contribution: ENVIRONMENT_WEIGHT * metrics.environmental_score,
                risk_penalty: RISK_WEIGHT * metrics.corruption_risk,
            },
        }
    }
}

/// A region entering the budget split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionScore {
    pub region_id: String,
    pub priority_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetShare {
    pub region_id: String,
    pub priority_score: f64,
    pub allocated_budget: f64,
    pub allocation_percentage: f64,
}

/// Split `total_budget` across `regions`.
///
/// Each region receives a 5% floor; the remainder is distributed
/// proportionally to score. The shares always sum to the total. With more
/// than 20 regions the floor is infeasible and the split degrades to equal
/// shares; a zero score sum splits the remainder equally.
pub fn split_budget(regions: &[RegionScore], total_budget: f64) -> Vec<BudgetShare> {
    if regions.is_empty() || total_budget <= 0.0 {
        return Vec::new();
    }

    let n = regions.len() as f64;
    let floor = MIN_SHARE * total_budget;
    let remainder = total_budget - n * floor;

    let score_sum: f64 = regions.iter().map(|r| r.priority_score.max(0.0)).sum();

    regions
        .iter()
        .map(|r| {
            let allocated = if remainder <= 0.0 {
                total_budget / n
            } else if score_sum <= 0.0 {
                floor + remainder / n
            } else {
                floor + remainder * r.priority_score.max(0.0) / score_sum
            };
            BudgetShare {
                region_id: r.region_id.clone(),
                priority_score: r.priority_score,
                allocated_budget: allocated,
                allocation_percentage: allocated / total_budget * 100.0,
            }
        })
        .collect()
}
