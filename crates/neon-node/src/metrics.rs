//! Prometheus metrics

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Game server metrics
#[derive(Clone)]
pub struct GameMetrics {
    registry: Registry,
    pub clicks_total: IntCounter,
    pub purchases_total: IntCounterVec,
    pub donations_total: IntCounter,
    pub auth_failures_total: IntCounterVec,
    pub players: IntGauge,
}

impl GameMetrics {
    /// Create and register every metric on a fresh registry
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let clicks_total = IntCounter::new("neon_clicks_total", "Clicks processed")?;
        let purchases_total = IntCounterVec::new(
            Opts::new("neon_purchases_total", "Accepted purchases by kind"),
            &["kind"],
        )?;
        let donations_total = IntCounter::new("neon_donations_total", "Accepted donations")?;
        let auth_failures_total = IntCounterVec::new(
            Opts::new("neon_auth_failures_total", "Rejected authentication attempts"),
            &["reason"],
        )?;
        let players = IntGauge::new("neon_players", "Players in the ledger")?;

        registry.register(Box::new(clicks_total.clone()))?;
        registry.register(Box::new(purchases_total.clone()))?;
        registry.register(Box::new(donations_total.clone()))?;
        registry.register(Box::new(auth_failures_total.clone()))?;
        registry.register(Box::new(players.clone()))?;

        Ok(Self {
            registry,
            clicks_total,
            purchases_total,
            donations_total,
            auth_failures_total,
            players,
        })
    }

    /// Text exposition format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_metrics() {
        let metrics = GameMetrics::new().unwrap();
        metrics.clicks_total.inc();
        metrics.purchases_total.with_label_values(&["producer"]).inc();
        metrics.auth_failures_total.with_label_values(&["expired"]).inc();
        metrics.players.set(3);

        let text = metrics.render().unwrap();
        assert!(text.contains("neon_clicks_total 1"));
        assert!(text.contains("neon_purchases_total{kind=\"producer\"} 1"));
        assert!(text.contains("neon_auth_failures_total{reason=\"expired\"} 1"));
        assert!(text.contains("neon_players 3"));
    }
}
