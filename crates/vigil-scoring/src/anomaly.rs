//! Online normalization of reconstruction errors.

/// Lower bound on variance and standard deviation.
const MIN_VARIANCE: f64 = 1e-6;

/// Maps raw reconstruction errors to `[0, 1]`.
///
/// The first `warmup` samples only calibrate mean and variance and score 0.
/// After that both are updated by exponential smoothing and the score is
/// the logistic of the z-score.
#[derive(Debug, Clone)]
pub struct AnomalyNormalizer {
    warmup: usize,
    smoothing: f64,
    samples: Vec<f64>,
    mean: f64,
    variance: f64,
    calibrated: bool,
}

impl AnomalyNormalizer {
    pub fn new(warmup: usize, smoothing: f64) -> Self {
        Self {
            warmup,
            smoothing,
            samples: Vec::with_capacity(warmup),
            mean: 0.0,
            variance: 1.0,
            calibrated: warmup == 0,
        }
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn variance(&self) -> f64 {
        self.variance
    }

    pub fn normalize(&mut self, error: f64) -> f64 {
        if !error.is_finite() {
            return 0.0;
        }

        if !self.calibrated {
            self.samples.push(error);
            if self.samples.len() >= self.warmup {
                let n = self.samples.len() as f64;
                self.mean = self.samples.iter().sum::<f64>() / n;
                let var = self
                    .samples
                    .iter()
                    .map(|e| (e - self.mean).powi(2))
                    .sum::<f64>()
                    / n;
                self.variance = var.max(MIN_VARIANCE);
                self.calibrated = true;
                self.samples = Vec::new();
            }
            return 0.0;
        }

        let a = self.smoothing;
        self.mean = (1.0 - a) * self.mean + a * error;
        self.variance = (1.0 - a) * self.variance + a * (error - self.mean).powi(2);

        let std = self.variance.sqrt().max(MIN_VARIANCE);
        let z = (error - self.mean) / std;
        sigmoid(z).clamp(0.0, 1.0)
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warmup_scores_zero() {
        let mut normalizer = AnomalyNormalizer::new(5, 0.01);
        for i in 0..5 {
            assert_eq!(normalizer.normalize(1.0 + i as f64 * 0.1), 0.0);
        }
        assert!(normalizer.is_calibrated());
        assert!((normalizer.mean() - 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_scores_after_warmup() {
        let mut normalizer = AnomalyNormalizer::new(4, 0.01);
        for e in [1.0, 2.0, 1.0, 2.0] {
            normalizer.normalize(e);
        }

        let typical = normalizer.normalize(1.5);
        assert!((typical - 0.5).abs() < 0.01, "got {}", typical);

        let outlier = normalizer.normalize(10.0);
        assert!(outlier > 0.99, "got {}", outlier);

        let low = normalizer.normalize(-10.0);
        assert!(low < 0.01, "got {}", low);
    }

    #[test]
    fn test_constant_errors_keep_variance_floor() {
        let mut normalizer = AnomalyNormalizer::new(3, 0.01);
        for _ in 0..3 {
            normalizer.normalize(0.5);
        }
        assert!(normalizer.variance() >= MIN_VARIANCE);
        let score = normalizer.normalize(0.5);
        assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn test_non_finite_ignored() {
        let mut normalizer = AnomalyNormalizer::new(2, 0.01);
        assert_eq!(normalizer.normalize(f64::NAN), 0.0);
        assert!(!normalizer.is_calibrated());
    }
}
