//! Metric names shared by every pipeline crate.

// Sources
pub const SOURCES: &str = "vigil_sources";
pub const SOURCES_FAILED: &str = "vigil_sources_failed_total";
pub const FRAME_READ_FAILURES: &str = "vigil_frame_read_failures_total";

// Scoring
pub const TRIGGERS_TOTAL: &str = "vigil_triggers_total";
pub const DUPLICATES_SUPPRESSED_TOTAL: &str = "vigil_duplicates_suppressed_total";

// Recording
pub const RECORDER_RESTARTS: &str = "vigil_recorder_restarts_total";
pub const SEGMENTS_PRUNED: &str = "vigil_segments_pruned_total";

// Queue
pub const JOBS_ENQUEUED_TOTAL: &str = "vigil_jobs_enqueued_total";
pub const JOBS_DROPPED_TOTAL: &str = "vigil_jobs_dropped_total";
pub const QUEUE_DEPTH: &str = "vigil_queue_depth";

// Clip jobs
pub const CLIP_ENCODE_SECONDS: &str = "vigil_clip_encode_seconds";
pub const JOBS_COMPLETED_TOTAL: &str = "vigil_jobs_completed_total";
pub const JOBS_FAILED_TOTAL: &str = "vigil_jobs_failed_total";
pub const ALERTS_STORED_TOTAL: &str = "vigil_alerts_stored_total";

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_are_distinct() {
        let all = [
            SOURCES,
            SOURCES_FAILED,
            FRAME_READ_FAILURES,
            TRIGGERS_TOTAL,
            DUPLICATES_SUPPRESSED_TOTAL,
            RECORDER_RESTARTS,
            SEGMENTS_PRUNED,
            JOBS_ENQUEUED_TOTAL,
            JOBS_DROPPED_TOTAL,
            QUEUE_DEPTH,
            CLIP_ENCODE_SECONDS,
            JOBS_COMPLETED_TOTAL,
            JOBS_FAILED_TOTAL,
            ALERTS_STORED_TOTAL,
        ];
        assert_eq!(all.iter().collect::<HashSet<_>>().len(), all.len());
        assert!(all.iter().all(|name| name.starts_with("vigil_")));
    }
}
