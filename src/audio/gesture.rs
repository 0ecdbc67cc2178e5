use std::time::{Duration, Instant};

use super::detector::SnapEvent;

/// Timing rules for grouping snaps into gesture signals.
#[derive(Debug, Clone)]
pub struct GestureConfig {
    /// Minimum spacing between two emitted signals. Snaps landing inside the
    /// cooldown are swallowed without touching any state.
    pub cooldown: Duration,

    /// Inclusive bounds on the gap between the two snaps of a double gesture.
    pub min_double_gap: Duration,
    pub max_double_gap: Duration,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(1),
            min_double_gap: Duration::from_millis(100),
            max_double_gap: Duration::from_secs(1),
        }
    }
}

/// Classification policy for incoming snaps.
///
/// `SingleOnly` is meant for while an overlay is open: every snap acts
/// immediately instead of waiting to see whether a second one follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureMode {
    Normal,
    SingleOnly,
}

/// A classified gesture, carrying the timestamp of the confirming snap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureSignal {
    Single(Instant),
    Double(Instant),
}

/// Groups confirmed snaps into single and double gesture signals.
pub struct GestureAggregator {
    config: GestureConfig,
    mode: GestureMode,
    /// First snap of a potential double, waiting for its partner.
    pending: Option<Instant>,
    last_signal: Option<Instant>,
}

impl GestureAggregator {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            mode: GestureMode::Normal,
            pending: None,
            last_signal: None,
        }
    }

    pub fn mode(&self) -> GestureMode {
        self.mode
    }

    /// Switch classification policy. Any pending unpaired snap is discarded,
    /// so a snap from before the switch can never pair with one after it.
    pub fn set_mode(&mut self, mode: GestureMode) {
        self.mode = mode;
        self.pending = None;
    }

    /// Feed one confirmed snap, in arrival order. Runs on the audio callback;
    /// must not block.
    pub fn on_snap(&mut self, event: SnapEvent) -> Option<GestureSignal> {
        let at = event.at;

        if let Some(last) = self.last_signal {
            if at.duration_since(last) < self.config.cooldown {
                return None;
            }
        }

        match self.mode {
            GestureMode::SingleOnly => {
                self.last_signal = Some(at);
                Some(GestureSignal::Single(at))
            }
            GestureMode::Normal => match self.pending {
                None => {
                    self.pending = Some(at);
                    None
                }
                Some(first) => {
                    let gap = at.duration_since(first);
                    if gap < self.config.min_double_gap {
                        // Too close to be a deliberate second tap; keep
                        // waiting on the original snap.
                        None
                    } else if gap <= self.config.max_double_gap {
                        self.pending = None;
                        self.last_signal = Some(at);
                        Some(GestureSignal::Double(at))
                    } else {
                        // The window closed; this snap opens a new one.
                        self.pending = Some(at);
                        None
                    }
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(at: Instant) -> SnapEvent {
        SnapEvent { at }
    }

    fn aggregator() -> (GestureAggregator, Instant) {
        (GestureAggregator::new(GestureConfig::default()), Instant::now())
    }

    #[test]
    fn pairs_at_both_inclusive_gap_bounds() {
        let (mut agg, t0) = aggregator();
        assert_eq!(agg.on_snap(snap(t0)), None);
        let second = t0 + Duration::from_millis(100);
        assert_eq!(agg.on_snap(snap(second)), Some(GestureSignal::Double(second)));

        let (mut agg, t0) = aggregator();
        assert_eq!(agg.on_snap(snap(t0)), None);
        let second = t0 + Duration::from_secs(1);
        assert_eq!(agg.on_snap(snap(second)), Some(GestureSignal::Double(second)));
    }

    #[test]
    fn gap_past_max_replaces_pending_instead_of_pairing() {
        let (mut agg, t0) = aggregator();
        assert_eq!(agg.on_snap(snap(t0)), None);

        let late = t0 + Duration::from_millis(1010);
        assert_eq!(agg.on_snap(snap(late)), None);

        // The late snap became the new pending one and pairs normally.
        let partner = late + Duration::from_millis(500);
        assert_eq!(agg.on_snap(snap(partner)), Some(GestureSignal::Double(partner)));
    }

    #[test]
    fn below_min_gap_keeps_the_original_pending_snap() {
        let (mut agg, t0) = aggregator();
        assert_eq!(agg.on_snap(snap(t0)), None);

        let bounce = t0 + Duration::from_millis(50);
        assert_eq!(agg.on_snap(snap(bounce)), None);

        // A later snap still pairs against t0, not the bounce.
        let partner = t0 + Duration::from_millis(500);
        assert_eq!(agg.on_snap(snap(partner)), Some(GestureSignal::Double(partner)));
    }

    #[test]
    fn cooldown_swallows_snaps_without_state_change() {
        let (mut agg, t0) = aggregator();
        agg.on_snap(snap(t0));
        let confirm = t0 + Duration::from_millis(300);
        assert_eq!(agg.on_snap(snap(confirm)), Some(GestureSignal::Double(confirm)));

        // Inside the cooldown: swallowed, and must not become pending.
        assert_eq!(agg.on_snap(snap(confirm + Duration::from_millis(500))), None);
        assert_eq!(agg.on_snap(snap(confirm + Duration::from_millis(800))), None);
        assert_eq!(agg.pending, None);

        // Swallowed snaps did not reset the cooldown; this one starts a
        // fresh pending window.
        let fresh = confirm + Duration::from_millis(1100);
        assert_eq!(agg.on_snap(snap(fresh)), None);
        assert_eq!(agg.pending, Some(fresh));
    }

    #[test]
    fn single_only_emits_immediately_per_eligible_snap() {
        let (mut agg, t0) = aggregator();
        agg.set_mode(GestureMode::SingleOnly);

        assert_eq!(agg.on_snap(snap(t0)), Some(GestureSignal::Single(t0)));
        assert_eq!(agg.on_snap(snap(t0 + Duration::from_millis(500))), None);

        let next = t0 + Duration::from_millis(1100);
        assert_eq!(agg.on_snap(snap(next)), Some(GestureSignal::Single(next)));
    }

    #[test]
    fn mode_switch_discards_pending_snap() {
        let (mut agg, t0) = aggregator();
        assert_eq!(agg.on_snap(snap(t0)), None);

        agg.set_mode(GestureMode::SingleOnly);

        // The next snap is a Single, not a delayed Double.
        let next = t0 + Duration::from_millis(200);
        assert_eq!(agg.on_snap(snap(next)), Some(GestureSignal::Single(next)));

        agg.set_mode(GestureMode::Normal);
        let after = next + Duration::from_millis(1100);
        assert_eq!(agg.on_snap(snap(after)), None);
        assert_eq!(agg.pending, Some(after));
    }
}
