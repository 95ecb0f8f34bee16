//! Per-controller prometheus counters.
use prometheus::{Encoder, IntCounter, Registry, TextEncoder};

#[derive(Clone)]
pub struct ControllerMetrics {
    registry: Registry,
    pub load_attempts: IntCounter,
    pub load_failures: IntCounter,
    pub device_losses: IntCounter,
    pub fallback_switches: IntCounter,
}

impl ControllerMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let counter = |name: &str, help: &str| -> Result<IntCounter, prometheus::Error> {
            let c = IntCounter::new(name, help)?;
            registry.register(Box::new(c.clone()))?;
            Ok(c)
        };
        Ok(Self {
            load_attempts: counter("rechain_engine_load_attempts_total", "Engine constructions started")?,
            load_failures: counter("rechain_engine_load_failures_total", "Engine constructions that failed")?,
            device_losses: counter("rechain_engine_device_losses_total", "Device error or loss notifications handled")?,
            fallback_switches: counter("rechain_engine_fallback_switches_total", "Switches to the fallback model")?,
            registry,
        })
    }

    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_lists_counters() {
        let metrics = ControllerMetrics::new().unwrap();
        metrics.device_losses.inc();
        let text = metrics.encode().unwrap();
        assert!(text.contains("rechain_engine_device_losses_total 1"));
        assert!(text.contains("rechain_engine_load_attempts_total 0"));
    }
}
