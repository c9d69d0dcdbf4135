// THEORY:
// The fusion gate turns two independent, individually unreliable signals into one
// per-frame boolean. The classifier misfires on frames unlike its training data; the
// color test misfires on sunsets and warm lighting. Requiring both at once suppresses
// most false positives from either alone.
//
// This is a hard AND. There is no blending, weighting or partial credit.

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.85;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionGate {
    confidence_threshold: f32,
}

impl FusionGate {
    pub fn new(confidence_threshold: f32) -> Self {
        Self { confidence_threshold }
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    /// Frame evidence: confidence strictly above the threshold and a flame-colored frame.
    #[inline]
    pub fn fuse(&self, confidence: f32, color_verdict: bool) -> bool {
        confidence > self.confidence_threshold && color_verdict
    }
}

impl Default for FusionGate {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIDENCE_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truth_table_around_threshold() {
        let gate = FusionGate::default();
        let cases = [
            (0.0, false, false),
            (0.0, true, false),
            (0.5, true, false),
            (0.85, true, false),
            (0.85, false, false),
            (0.850_000_1, true, true),
            (0.850_000_1, false, false),
            (0.9, true, true),
            (0.9, false, false),
            (1.0, true, true),
            (1.0, false, false),
        ];

        for (confidence, color, expected) in cases {
            assert_eq!(
                gate.fuse(confidence, color),
                expected,
                "fuse({confidence}, {color})"
            );
        }
    }

    #[test]
    fn custom_threshold_is_honored() {
        let gate = FusionGate::new(0.5);
        assert!(!gate.fuse(0.5, true));
        assert!(gate.fuse(0.51, true));
    }
}
