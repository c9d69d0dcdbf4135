// THEORY:
// The `hysteresis` module adds memory to the decision engine. A single frame of fire
// evidence is noisy; an alert that flips on every frame is useless. The
// `HysteresisCounter` is a leaky integrator that converts the per-frame boolean into a
// stable alert:
//
// - positive evidence raises the counter by one, capped at the threshold;
// - negative evidence lowers it by one, floored at zero;
// - the alert is raised while the counter sits at the threshold.
//
// From a quiet start it therefore takes `threshold` net-positive frames to raise the
// alert and, once alerting, the same amount of net-negative evidence to clear it. An
// isolated negative frame in the middle of a real fire costs one step of progress,
// not all of it.
//
// Capping at the threshold keeps long fires from building up a reserve that would
// delay clearing the alert after the fire is out. Every negative frame costs exactly
// one step regardless of how strongly negative the evidence was.

pub const DEFAULT_FIRE_FRAME_THRESHOLD: u32 = 5;

/// Coarse view of where the integrator sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertPhase {
    /// Counter at zero.
    Quiet,
    /// Counter between zero and the threshold, moving either way.
    Building,
    /// Counter at the threshold.
    Alerting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HysteresisCounter {
    count: u32,
    threshold: u32,
}

impl HysteresisCounter {
    /// A zero threshold is raised to one so the alert can never be on before any evidence.
    pub fn new(threshold: u32) -> Self {
        Self {
            count: 0,
            threshold: threshold.max(1),
        }
    }

    /// Applies one frame of evidence and returns the resulting alert state.
    pub fn update(&mut self, evidence: bool) -> bool {
        self.count = if evidence {
            (self.count + 1).min(self.threshold)
        } else {
            self.count.saturating_sub(1)
        };
        self.is_alerting()
    }

    pub fn is_alerting(&self) -> bool {
        self.count >= self.threshold
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn phase(&self) -> AlertPhase {
        match self.count {
            0 => AlertPhase::Quiet,
            count if count >= self.threshold => AlertPhase::Alerting,
            _ => AlertPhase::Building,
        }
    }
}

impl Default for HysteresisCounter {
    fn default() -> Self {
        Self::new(DEFAULT_FIRE_FRAME_THRESHOLD)
    }
}
