//! Per-track scoring state machine.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Instant;

use tracing::{debug, warn};
use vigil_ml_client::{TrackObservation, WindowScorer};
use vigil_models::{metric_names, TrackId};

use crate::anomaly::AnomalyNormalizer;
use crate::config::ScoringConfig;

/// Rolling state for one tracked person.
#[derive(Debug, Clone)]
pub struct TrackState {
    buffer: VecDeque<Vec<f32>>,
    pub ema: f64,
    pub consecutive: u32,
    pub last_seen: Instant,
    pub windows_scored: u64,
}

impl TrackState {
    fn new(now: Instant, capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            ema: 0.0,
            consecutive: 0,
            last_seen: now,
            windows_scored: 0,
        }
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

/// A track that passed the consecutive-window gate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trigger {
    pub track_id: TrackId,
    pub score: f64,
    pub consecutive: u32,
}

/// Result of one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutcome {
    /// Highest-scoring track that triggered on this frame.
    pub trigger: Option<Trigger>,
    /// Windows scored on this frame.
    pub scored: usize,
    /// Tracks removed by the stale sweep on this frame.
    pub purged: usize,
}

/// Scoring state for all tracks of one camera.
///
/// Owned by its camera worker; frames must be stepped in arrival order.
pub struct TrackScorer {
    camera_id: String,
    config: ScoringConfig,
    tracks: HashMap<TrackId, TrackState>,
    normalizer: AnomalyNormalizer,
    last_sweep: Instant,
}

impl TrackScorer {
    pub fn new(camera_id: impl Into<String>, config: ScoringConfig) -> Self {
        let normalizer = AnomalyNormalizer::new(config.anomaly_warmup, config.anomaly_smoothing);
        Self {
            camera_id: camera_id.into(),
            config,
            tracks: HashMap::new(),
            normalizer,
            last_sweep: Instant::now(),
        }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn track(&self, id: TrackId) -> Option<&TrackState> {
        self.tracks.get(&id)
    }

    pub fn tracks(&self) -> impl Iterator<Item = (&TrackId, &TrackState)> {
        self.tracks.iter()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Advance every track by one frame.
    ///
    /// An empty observation set is a valid frame: visible tracks are none,
    /// so every known track decays.
    pub async fn step(
        &mut self,
        observations: &[TrackObservation],
        now: Instant,
        scorer: &dyn WindowScorer,
    ) -> StepOutcome {
        let mut outcome = StepOutcome::default();
        let mut visible = HashSet::with_capacity(observations.len());
        let window_size = self.config.window_size;

        for obs in observations {
            if !visible.insert(obs.track_id) {
                continue;
            }

            let state = self
                .tracks
                .entry(obs.track_id)
                .or_insert_with(|| TrackState::new(now, window_size));
            state.last_seen = now;

            let Some(features) = obs.features.as_ref() else {
                continue;
            };
            state.buffer.push_back(features.clone());
            while state.buffer.len() > window_size {
                state.buffer.pop_front();
            }
            if state.buffer.len() < window_size {
                continue;
            }

            let Some(prob) = window_probability(
                &self.camera_id,
                obs.track_id,
                state.buffer.make_contiguous(),
                scorer,
                &mut self.normalizer,
                self.config.anomaly_weight,
            )
            .await
            else {
                continue;
            };

            let alpha = self.config.ema_alpha;
            state.ema = alpha * prob + (1.0 - alpha) * state.ema;
            state.windows_scored += 1;
            outcome.scored += 1;

            if state.ema >= self.config.threshold {
                state.consecutive += 1;
            } else {
                state.consecutive = 0;
            }

            if state.consecutive >= self.config.consecutive_gate {
                let candidate = Trigger {
                    track_id: obs.track_id,
                    score: state.ema,
                    consecutive: state.consecutive,
                };
                match outcome.trigger {
                    Some(best) if best.score >= candidate.score => {}
                    _ => outcome.trigger = Some(candidate),
                }
            }
        }

        for (id, state) in self.tracks.iter_mut() {
            if visible.contains(id) {
                continue;
            }
            state.ema *= self.config.decay_rate;
            state.consecutive = 0;
            if state.ema < self.config.score_floor {
                state.ema = 0.0;
                state.buffer.clear();
            }
        }

        if now.saturating_duration_since(self.last_sweep) >= self.config.stale_check_interval {
            outcome.purged = self.purge_stale(now);
        }

        if let Some(trigger) = outcome.trigger {
            metrics::counter!(metric_names::TRIGGERS_TOTAL, "camera_id" => self.camera_id.clone())
                .increment(1);
            debug!(
                camera_id = %self.camera_id,
                track_id = %trigger.track_id,
                score = trigger.score,
                consecutive = trigger.consecutive,
                "Track triggered"
            );
        }

        outcome
    }

    /// Remove tracks unseen for longer than the stale timeout.
    pub fn purge_stale(&mut self, now: Instant) -> usize {
        self.last_sweep = now;
        let timeout = self.config.stale_timeout;
        let before = self.tracks.len();
        self.tracks
            .retain(|_, state| now.saturating_duration_since(state.last_seen) <= timeout);
        let purged = before - self.tracks.len();
        if purged > 0 {
            debug!(camera_id = %self.camera_id, purged, remaining = self.tracks.len(), "Purged stale tracks");
        }
        purged
    }

    /// One line per track: `track=<id> score=<ema> consec=<n>/<gate>`.
    pub fn summary(&self) -> String {
        let mut ids: Vec<&TrackId> = self.tracks.keys().collect();
        ids.sort();
        ids.iter()
            .filter_map(|id| self.tracks.get(id).map(|s| (id, s)))
            .map(|(id, s)| {
                format!(
                    "track={} score={:.3} consec={}/{}",
                    id, s.ema, s.consecutive, self.config.consecutive_gate
                )
            })
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

/// Probability for one full window, or `None` if the classifier failed.
async fn window_probability(
    camera_id: &str,
    track_id: TrackId,
    window: &[Vec<f32>],
    scorer: &dyn WindowScorer,
    normalizer: &mut AnomalyNormalizer,
    anomaly_weight: f64,
) -> Option<f64> {
    let classifier = match scorer.classify(window).await {
        Ok(p) => p.clamp(0.0, 1.0),
        Err(e) => {
            warn!(camera_id, %track_id, "Classifier failed, window skipped: {}", e);
            return None;
        }
    };

    match scorer.reconstruction_error(window).await {
        Ok(Some(error)) => {
            let anomaly = normalizer.normalize(error);
            Some((1.0 - anomaly_weight) * classifier + anomaly_weight * anomaly)
        }
        Ok(None) => Some(classifier),
        Err(e) => {
            warn!(camera_id, %track_id, "Anomaly scorer failed, using classifier only: {}", e);
            Some(classifier)
        }
    }
}
