use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::detector::{Detection, EmotionLabel};

/// Count of faces in the most recent frame whose top-scoring emotion is each
/// label. Rebuilt from zero every frame; the sum of counts always equals the
/// person count of that frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmotionHistogram([u32; 7]);

impl EmotionHistogram {
    pub fn increment(&mut self, label: EmotionLabel) {
        self.0[label.index()] += 1;
    }

    pub fn get(&self, label: EmotionLabel) -> u32 {
        self.0[label.index()]
    }

    pub fn total(&self) -> u32 {
        self.0.iter().sum()
    }
}

impl Serialize for EmotionHistogram {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(EmotionLabel::ALL.len()))?;
        for label in EmotionLabel::ALL {
            map.serialize_entry(label.as_str(), &self.get(label))?;
        }
        map.end()
    }
}

/// Statistics computed from one processed frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub people: usize,
    pub emotions: EmotionHistogram,
}

impl FrameStats {
    pub fn from_detections(detections: &[Detection]) -> Self {
        let mut emotions = EmotionHistogram::default();
        for detection in detections {
            emotions.increment(detection.scores.dominant());
        }
        Self {
            people: detections.len(),
            emotions,
        }
    }
}

/// Single source of truth shared by the capture loop, the status server and
/// the GUI shell. The running flag is an atomic so stop requests take effect
/// immediately; the stats live under one mutex so readers always observe a
/// consistent (count, histogram) pair.
#[derive(Debug, Default)]
pub struct SharedState {
    running: AtomicBool,
    stats: Mutex<FrameStats>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Claims the single capture-loop slot. Returns false if a loop already
    /// holds it, which makes `start` idempotent: the caller must only spawn
    /// a loop thread after a successful claim.
    pub fn claim_start(&self) -> bool {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Requests cooperative termination. Fire-and-forget: the capture loop
    /// observes the flag on its next iteration.
    pub fn request_stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn publish(&self, stats: FrameStats) {
        *self.stats.lock().unwrap() = stats;
    }

    pub fn snapshot(&self) -> FrameStats {
        self.stats.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::EmotionScores;
    use opencv::core::Rect;

    fn detection(scores: [f32; 7]) -> Detection {
        Detection {
            bounds: Rect::new(0, 0, 32, 32),
            scores: EmotionScores::new(scores),
        }
    }

    #[test]
    fn test_empty_frame_has_zero_stats() {
        let stats = FrameStats::from_detections(&[]);
        assert_eq!(stats.people, 0);
        assert_eq!(stats.emotions.total(), 0);
    }

    #[test]
    fn test_single_happy_face() {
        let stats = FrameStats::from_detections(&[detection([
            0.0, 0.0, 0.0, 0.8, 0.1, 0.0, 0.1,
        ])]);
        assert_eq!(stats.people, 1);
        assert_eq!(stats.emotions.get(EmotionLabel::Happy), 1);
        assert_eq!(stats.emotions.total(), 1);
    }

    #[test]
    fn test_three_faces_two_neutral_one_fear() {
        let neutral = [0.1, 0.0, 0.0, 0.1, 0.1, 0.0, 0.7];
        let fear = [0.1, 0.0, 0.6, 0.1, 0.1, 0.0, 0.1];
        let stats =
            FrameStats::from_detections(&[detection(neutral), detection(fear), detection(neutral)]);
        assert_eq!(stats.people, 3);
        assert_eq!(stats.emotions.get(EmotionLabel::Neutral), 2);
        assert_eq!(stats.emotions.get(EmotionLabel::Fear), 1);
        assert_eq!(stats.emotions.total(), 3);
    }

    #[test]
    fn test_histogram_sum_matches_detection_count() {
        let detections: Vec<_> = (0..5)
            .map(|i| {
                let mut scores = [0.0f32; 7];
                scores[i % 7] = 1.0;
                detection(scores)
            })
            .collect();
        let stats = FrameStats::from_detections(&detections);
        assert_eq!(stats.emotions.total() as usize, stats.people);
    }

    #[test]
    fn test_histogram_serializes_with_fixed_keys() {
        let mut histogram = EmotionHistogram::default();
        histogram.increment(EmotionLabel::Happy);
        histogram.increment(EmotionLabel::Happy);
        histogram.increment(EmotionLabel::Sad);
        let value = serde_json::to_value(&histogram).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "angry": 0,
                "disgust": 0,
                "fear": 0,
                "happy": 2,
                "sad": 1,
                "surprise": 0,
                "neutral": 0,
            })
        );
    }

    #[test]
    fn test_claim_start_is_idempotent() {
        let state = SharedState::new();
        assert!(state.claim_start());
        assert!(!state.claim_start());
        assert!(state.is_running());
    }

    #[test]
    fn test_stop_flips_flag_immediately() {
        let state = SharedState::new();
        assert!(state.claim_start());
        state.request_stop();
        assert!(!state.is_running());
        // A fresh start after stop can claim the slot again.
        assert!(state.claim_start());
    }

    #[test]
    fn test_snapshot_is_consistent_pair() {
        let state = SharedState::new();
        let stats = FrameStats::from_detections(&[detection([0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0])]);
        state.publish(stats);
        let snapshot = state.snapshot();
        assert_eq!(snapshot.people, 1);
        assert_eq!(snapshot.emotions.total(), 1);
    }
}
