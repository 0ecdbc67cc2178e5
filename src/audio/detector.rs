use std::time::Instant;

/// Configuration for the transient classifier with tunable thresholds.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Exponential smoothing factor for the ambient noise floor.
    /// Close to 1.0 so the floor adapts slowly and a snap cannot drag it up.
    pub ambient_alpha: f32,

    /// Lower bound for both the ambient estimate and the dynamic threshold.
    pub ambient_floor: f32,

    /// Buffer RMS must exceed ambient times this multiplier to be a spike.
    pub spike_multiplier: f32,

    /// RMS must also jump by at least this ratio over the previous buffer.
    pub min_attack_ratio: f32,

    /// A spike is confirmed once RMS falls below this fraction of its peak.
    pub decay_confirm_ratio: f32,

    /// Buffers allowed between onset and decay before tracking resets.
    pub decay_window_buffers: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            ambient_alpha: 0.95,
            ambient_floor: 0.015,
            spike_multiplier: 4.0,
            min_attack_ratio: 2.0,
            decay_confirm_ratio: 0.35,
            decay_window_buffers: 8,
        }
    }
}

/// One confirmed impulsive transient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapEvent {
    pub at: Instant,
}

struct SpikeTracking {
    peak_rms: f32,
    buffers_elapsed: u32,
}

/// Classifies incoming capture buffers into snap events.
///
/// While idle the detector maintains a slowly adapting ambient noise
/// estimate; a buffer that jumps well above that floor with a sharp attack
/// starts spike tracking. The spike is confirmed as a snap only if the
/// energy collapses within a few buffers. Sustained sounds (speech, music,
/// a held tone) stay loud past the decay window and are discarded.
pub struct SnapDetector {
    config: DetectorConfig,
    ambient: f32,
    previous_rms: f32,
    tracking: Option<SpikeTracking>,
}

impl SnapDetector {
    pub fn new(config: DetectorConfig) -> Self {
        let ambient = config.ambient_floor;
        Self {
            config,
            ambient,
            previous_rms: 0.0,
            tracking: None,
        }
    }

    /// Classify one capture buffer. Called once per buffer, in arrival order,
    /// from the audio callback; must not block or allocate.
    pub fn classify(&mut self, samples: &[f32]) -> Option<SnapEvent> {
        let rms = buffer_rms(samples);

        let event = if let Some(mut tracking) = self.tracking.take() {
            tracking.buffers_elapsed += 1;
            if tracking.buffers_elapsed > self.config.decay_window_buffers {
                // Energy stayed up past the window: sustained sound, not a snap.
                None
            } else if rms < tracking.peak_rms * self.config.decay_confirm_ratio {
                Some(SnapEvent { at: Instant::now() })
            } else {
                self.tracking = Some(tracking);
                None
            }
        } else {
            // The ambient estimate only follows non-spike buffers.
            self.ambient = (self.config.ambient_alpha * self.ambient
                + (1.0 - self.config.ambient_alpha) * rms)
                .max(self.config.ambient_floor);

            let threshold =
                (self.ambient * self.config.spike_multiplier).max(self.config.ambient_floor);
            let attack_ratio = rms / self.previous_rms.max(1e-6);

            if rms > threshold && attack_ratio > self.config.min_attack_ratio {
                self.tracking = Some(SpikeTracking {
                    peak_rms: rms,
                    buffers_elapsed: 0,
                });
            }
            None
        };

        self.previous_rms = rms;
        event
    }
}

/// RMS energy of a buffer, channel-agnostic over the raw callback slice.
fn buffer_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn noise_buffer(rng: &mut StdRng, level: f32) -> Vec<f32> {
        (0..512).map(|_| rng.gen_range(-level..level)).collect()
    }

    fn tone_buffer(amplitude: f32) -> Vec<f32> {
        (0..512)
            .map(|i| amplitude * (i as f32 * 0.3).sin())
            .collect()
    }

    /// Detector fed enough quiet room noise for the ambient floor to settle.
    fn settled_detector(rng: &mut StdRng) -> SnapDetector {
        let mut detector = SnapDetector::new(DetectorConfig::default());
        for _ in 0..20 {
            assert!(detector.classify(&noise_buffer(rng, 0.01)).is_none());
        }
        detector
    }

    #[test]
    fn sharp_spike_with_fast_decay_yields_exactly_one_event() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut detector = settled_detector(&mut rng);

        // Onset buffer starts tracking but cannot confirm on its own.
        assert!(detector.classify(&tone_buffer(0.8)).is_none());

        let confirmations: Vec<bool> = (0..4)
            .map(|_| detector.classify(&noise_buffer(&mut rng, 0.01)).is_some())
            .collect();

        assert!(confirmations[0], "fast decay should confirm on the next buffer");
        assert_eq!(confirmations.iter().filter(|hit| **hit).count(), 1);
    }

    #[test]
    fn sustained_tone_produces_no_event() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut detector = settled_detector(&mut rng);

        let buffers = DetectorConfig::default().decay_window_buffers + 4;
        for _ in 0..buffers {
            assert!(detector.classify(&tone_buffer(0.8)).is_none());
        }
        assert!(detector.tracking.is_none(), "tracking must reset after the window");
    }

    #[test]
    fn slow_swell_never_starts_tracking() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut detector = settled_detector(&mut rng);

        // Each step raises the level by well under the attack-ratio gate.
        for level in [0.05, 0.07, 0.09, 0.12, 0.16] {
            assert!(detector.classify(&noise_buffer(&mut rng, level)).is_none());
            assert!(detector.tracking.is_none());
        }
    }

    #[test]
    fn detector_recovers_after_a_rejected_sustained_sound() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut detector = settled_detector(&mut rng);

        for _ in 0..12 {
            assert!(detector.classify(&tone_buffer(0.8)).is_none());
        }

        // Let the inflated ambient estimate decay back toward the floor.
        for _ in 0..60 {
            assert!(detector.classify(&noise_buffer(&mut rng, 0.01)).is_none());
        }

        assert!(detector.classify(&tone_buffer(0.8)).is_none());
        assert!(detector.classify(&noise_buffer(&mut rng, 0.01)).is_some());
    }

    #[test]
    fn ambient_estimate_never_drops_below_floor() {
        let mut detector = SnapDetector::new(DetectorConfig::default());
        let silence = vec![0.0f32; 512];
        for _ in 0..50 {
            detector.classify(&silence);
        }
        assert!(detector.ambient >= DetectorConfig::default().ambient_floor);
    }

    #[test]
    fn empty_buffer_is_harmless() {
        let mut detector = SnapDetector::new(DetectorConfig::default());
        assert!(detector.classify(&[]).is_none());
    }
}
