//! Facial expression extraction and lip-sync exclusivity
//!
//! Converts the tracker's raw influence vector into the named VRM blend
//! channels (blinks + AIUEO visemes), then enforces at most one active
//! mouth shape per frame.

use serde::{Deserialize, Serialize};

use super::rig::BlendShapeSink;

// Tracker influence slots consumed by the extractor. The vector layout is
// fixed by the external tracker; only these five indices are used.
const INF_MOUTH_A: usize = 6;
const INF_MOUTH_U: usize = 7;
const INF_BLINK_LEFT: usize = 8;
const INF_BLINK_RIGHT: usize = 9;
const INF_MOUTH_I: usize = 10;

/// Named facial blend channels, each in [0, 1].
///
/// `e` is carried for the full AIUEO viseme set but no tracker slot feeds
/// it; it stays zero unless set by hand.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ExpressionWeights {
    pub blink_r: f32,
    pub blink_l: f32,
    pub a: f32,
    pub i: f32,
    pub u: f32,
    pub e: f32,
    pub o: f32,
}

/// Read one influence slot, treating missing or non-finite values as 0.
fn influence(values: &[f32], index: usize) -> f32 {
    match values.get(index) {
        Some(v) if v.is_finite() => *v,
        _ => 0.0,
    }
}

impl ExpressionWeights {
    /// Extract blend channels from a tracker influence vector.
    ///
    /// Mirror mode swaps the left/right blink slots so the avatar blinks
    /// the eye the viewer expects. `o` is not a sensor channel: it models
    /// the visual overlap of the "a" and "u" mouth shapes, weighted by
    /// their product.
    pub fn from_influences(influences: &[f32], mirror: bool) -> Self {
        let (blink_r, blink_l) = if mirror {
            (
                influence(influences, INF_BLINK_LEFT),
                influence(influences, INF_BLINK_RIGHT),
            )
        } else {
            (
                influence(influences, INF_BLINK_RIGHT),
                influence(influences, INF_BLINK_LEFT),
            )
        };

        let a = influence(influences, INF_MOUTH_A);
        let u = influence(influences, INF_MOUTH_U);

        Self {
            blink_r,
            blink_l,
            a,
            i: influence(influences, INF_MOUTH_I),
            u,
            e: 0.0,
            o: (a + a * u) * 0.5,
        }
    }

    /// Winner-take-all over the mouth-shape channels `[a, i, u, e, o]`.
    ///
    /// The first channel attaining the scan's running maximum survives with
    /// its original value; every other channel in the subset is zeroed.
    /// Strictly-greater comparison means ties go to the earlier channel,
    /// and all-zero input stays all-zero. Blink channels are untouched.
    pub fn apply_lip_exclusivity(&mut self) {
        let lips = [self.a, self.i, self.u, self.e, self.o];

        let mut max = 0.0f32;
        let mut winner = None;
        for (slot, &value) in lips.iter().enumerate() {
            if value > max {
                max = value;
                winner = Some(slot);
            }
        }

        let targets = [
            &mut self.a,
            &mut self.i,
            &mut self.u,
            &mut self.e,
            &mut self.o,
        ];
        for (slot, target) in targets.into_iter().enumerate() {
            if winner != Some(slot) {
                *target = 0.0;
            }
        }
    }

    /// The six channels pushed to the avatar's blend surface each frame.
    pub fn channels(&self) -> [(&'static str, f32); 6] {
        [
            ("blink_r", self.blink_r),
            ("blink_l", self.blink_l),
            ("a", self.a),
            ("i", self.i),
            ("u", self.u),
            ("o", self.o),
        ]
    }
}

/// Push the fixed channel set onto an avatar's blend surface.
pub fn apply_expression(sink: &mut dyn BlendShapeSink, weights: &ExpressionWeights) {
    for (name, value) in weights.channels() {
        sink.set_value(name, value);
    }
}
