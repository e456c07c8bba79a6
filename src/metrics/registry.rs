// Prometheus registry for the /api/metrics endpoint

use anyhow::Result;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Process-wide counters exposed in Prometheus text format.
#[derive(Clone)]
pub struct ApiMetrics {
    registry: Registry,
    pub http_requests: IntCounterVec,
    pub route_decisions: IntCounterVec,
    pub gateway_fallbacks: IntCounter,
    pub in_flight: IntGauge,
}

impl ApiMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let http_requests = IntCounterVec::new(
            Opts::new("civica_http_requests_total", "HTTP requests by endpoint"),
            &["endpoint"],
        )?;
        let route_decisions = IntCounterVec::new(
            Opts::new(
                "civica_route_decisions_total",
                "Orchestrator routing decisions by route",
            ),
            &["route"],
        )?;
        let gateway_fallbacks = IntCounter::new(
            "civica_gateway_fallbacks_total",
            "Requests answered by the local engine because the gateway was unreachable",
        )?;
        let in_flight = IntGauge::new(
            "civica_requests_in_flight",
            "Requests currently being handled",
        )?;

        registry.register(Box::new(http_requests.clone()))?;
        registry.register(Box::new(route_decisions.clone()))?;
        registry.register(Box::new(gateway_fallbacks.clone()))?;
        registry.register(Box::new(in_flight.clone()))?;

        Ok(Self {
            registry,
            http_requests,
            route_decisions,
            gateway_fallbacks,
            in_flight,
        })
    }

    /// Render every registered metric in Prometheus text exposition format.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_render() {
        let metrics = ApiMetrics::new().unwrap();
        metrics.http_requests.with_label_values(&["/api/health"]).inc();
        metrics.route_decisions.with_label_values(&["engine"]).inc();
        metrics.gateway_fallbacks.inc();

        let rendered = metrics.render().unwrap();
        assert!(rendered.contains("civica_http_requests_total"));
        assert!(rendered.contains("civica_route_decisions_total"));
        assert!(rendered.contains("civica_gateway_fallbacks_total 1"));
    }

    #[test]
    fn test_in_flight_gauge() {
        let metrics = ApiMetrics::new().unwrap();
        metrics.in_flight.inc();
        metrics.in_flight.inc();
        metrics.in_flight.dec();
        assert_eq!(metrics.in_flight.get(), 1);
    }
}
