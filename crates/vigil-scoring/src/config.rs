//! Scoring parameters.

use std::time::Duration;

/// Parameters for one camera's scorer.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    /// Feature vectors per scored window.
    pub window_size: usize,
    /// EMA weight of the newest probability.
    pub ema_alpha: f64,
    pub threshold: f64,
    /// Consecutive scored windows at or above threshold needed to trigger.
    pub consecutive_gate: u32,
    /// Share of the anomaly probability in the combined probability.
    pub anomaly_weight: f64,
    /// Multiplier applied to the EMA of a track absent from a frame.
    pub decay_rate: f64,
    /// EMA below this is zeroed and the buffer dropped.
    pub score_floor: f64,
    pub stale_timeout: Duration,
    pub stale_check_interval: Duration,
    pub anomaly_warmup: usize,
    pub anomaly_smoothing: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            window_size: 24,
            ema_alpha: 0.6,
            threshold: 0.65,
            consecutive_gate: 5,
            anomaly_weight: 0.3,
            decay_rate: 0.85,
            score_floor: 0.01,
            stale_timeout: Duration::from_secs(30),
            stale_check_interval: Duration::from_secs(10),
            anomaly_warmup: 50,
            anomaly_smoothing: 0.01,
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.window_size == 0 {
            return Err("window_size must be > 0".to_string());
        }
        if self.consecutive_gate == 0 {
            return Err("consecutive_gate must be > 0".to_string());
        }
        for (name, value) in [
            ("ema_alpha", self.ema_alpha),
            ("threshold", self.threshold),
            ("anomaly_weight", self.anomaly_weight),
            ("decay_rate", self.decay_rate),
            ("score_floor", self.score_floor),
            ("anomaly_smoothing", self.anomaly_smoothing),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("{} must be within [0, 1], got {}", name, value));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(ScoringConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_out_of_range() {
        let config = ScoringConfig {
            decay_rate: 1.5,
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().contains("decay_rate"));

        let config = ScoringConfig {
            window_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
