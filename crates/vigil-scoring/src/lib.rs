//! Per-track suspicion scoring.
//!
//! One [`TrackScorer`] per camera turns tracker observations into at most
//! one trigger per frame.

pub mod anomaly;
pub mod config;
pub mod scorer;

pub use anomaly::AnomalyNormalizer;
pub use config::ScoringConfig;
pub use scorer::{StepOutcome, TrackScorer, TrackState, Trigger};
