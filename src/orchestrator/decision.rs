// Routing decision logic

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use super::analysis::{analyze_query, Complexity, Intent, QueryAnalysis};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// Local deterministic scoring engine
    Engine,
    /// Analysis gateway (evidence pipeline + AI provider)
    Gateway,
    /// Knowledge store lookup (data sources)
    Knowledge,
    /// Engine result enriched with knowledge-store context
    HybridEngine,
    /// Gateway result enriched with knowledge-store context
    HybridGateway,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Engine => "engine",
            Route::Gateway => "gateway",
            Route::Knowledge => "knowledge",
            Route::HybridEngine => "hybrid_engine",
            Route::HybridGateway => "hybrid_gateway",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoutingOutcome {
    pub route: Route,
    pub rationale: String,
    pub analysis: QueryAnalysis,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoutingStats {
    pub total_queries: u64,
    pub engine_queries: u64,
    pub gateway_queries: u64,
    pub knowledge_queries: u64,
    pub hybrid_queries: u64,
    pub engine_pct: f64,
    pub gateway_pct: f64,
    pub knowledge_pct: f64,
    pub hybrid_pct: f64,
}

/// Routes queries and keeps per-route counters. Cheap to share behind an Arc;
/// counters are atomics, no lock needed.
#[derive(Debug, Default)]
pub struct Orchestrator {
    total: AtomicU64,
    engine: AtomicU64,
    gateway: AtomicU64,
    knowledge: AtomicU64,
    hybrid: AtomicU64,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&self, query: &str) -> RoutingOutcome {
        self.total.fetch_add(1, Ordering::Relaxed);

        let analysis = analyze_query(query);
        let route = determine_route(&analysis);

        match route {
            Route::Engine => self.engine.fetch_add(1, Ordering::Relaxed),
            Route::Gateway => self.gateway.fetch_add(1, Ordering::Relaxed),
            Route::Knowledge => self.knowledge.fetch_add(1, Ordering::Relaxed),
            Route::HybridEngine | Route::HybridGateway => {
                self.hybrid.fetch_add(1, Ordering::Relaxed)
            }
        };

        tracing::info!(
            route = route.as_str(),
            complexity = analysis.complexity.as_str(),
            intent = analysis.intent.as_str(),
            "Routing decision"
        );

        RoutingOutcome {
            route,
            rationale: rationale(route, &analysis),
            analysis,
        }
    }

    pub fn stats(&self) -> RoutingStats {
        let total = self.total.load(Ordering::Relaxed);
        let engine = self.engine.load(Ordering::Relaxed);
        let gateway = self.gateway.load(Ordering::Relaxed);
        let knowledge = self.knowledge.load(Ordering::Relaxed);
        let hybrid = self.hybrid.load(Ordering::Relaxed);

        let pct = |n: u64| {
            if total == 0 {
                0.0
            } else {
                n as f64 / total as f64 * 100.0
            }
        };

        RoutingStats {
            total_queries: total,
            engine_queries: engine,
            gateway_queries: gateway,
            knowledge_queries: knowledge,
            hybrid_queries: hybrid,
            engine_pct: pct(engine),
            gateway_pct: pct(gateway),
            knowledge_pct: pct(knowledge),
            hybrid_pct: pct(hybrid),
        }
    }
}

fn determine_route(analysis: &QueryAnalysis) -> Route {
    // Document lookups and multi-hop chains need the knowledge store
    if analysis.requires_documents || analysis.requires_multi_hop {
        return Route::Knowledge;
    }

    if analysis.complexity == Complexity::Simple && analysis.requires_calculation {
        return Route::Engine;
    }

    if analysis.requires_explanation && analysis.requires_calculation {
        return Route::HybridEngine;
    }

    if matches!(analysis.intent, Intent::Compare | Intent::Analyze) {
        return if analysis.requires_explanation {
            Route::HybridGateway
        } else {
            Route::Gateway
        };
    }

    if matches!(
        analysis.complexity,
        Complexity::Complex | Complexity::VeryComplex
    ) {
        return Route::Knowledge;
    }

    if analysis.complexity == Complexity::Moderate && analysis.requires_reasoning {
        return Route::Knowledge;
    }

    Route::Engine
}

fn rationale(route: Route, analysis: &QueryAnalysis) -> String {
    let base = match route {
        Route::Engine => "Simple calculation - using local scoring engine",
        Route::Gateway => "Analysis required - using analysis gateway",
        Route::Knowledge => "Knowledge lookup needed - using data-source store",
        Route::HybridEngine => "Calculation with explanation - combining engine + knowledge",
        Route::HybridGateway => "Analysis with reasoning - combining gateway + knowledge",
    };

    let mut reasons = Vec::new();
    if analysis.requires_documents {
        reasons.push("document search");
    }
    if analysis.requires_explanation {
        reasons.push("explanation");
    }
    if analysis.requires_multi_hop {
        reasons.push("multi-hop reasoning");
    }

    if reasons.is_empty() {
        base.to_string()
    } else {
        format!("{base} ({})", reasons.join(", "))
    }
}
