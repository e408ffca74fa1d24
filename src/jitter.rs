//! Sub-pixel jitter sequence for temporal anti-aliasing.
//!
//! A fixed 15-sample Halton(2, 3) table, pre-scaled to pixel units. The state
//! vector also carries a ping-pong flag that flips on every advance, so TAA
//! history selection stays in lockstep with the jitter sample.

use glam::{Vec2, Vec4};

/// Halton(2, 3) offsets in pixels, centered on zero.
pub const HALTON_TABLE: [[f32; 2]; 15] = [
    [0.263_385, -0.025_247_5],
    [-0.385_45, 0.054_485],
    [-0.139_795, -0.537_992_5],
    [-0.279_377_5, 0.687_547_5],
    [0.713_902_5, 0.471_092_5],
    [0.900_44, -0.164_22],
    [0.448_177_5, -0.827_99],
    [-0.925_337_5, -0.291_062_5],
    [0.346_802_5, 1.022_92],
    [-1.137_42, 0.335_22],
    [-0.767_622_5, -0.912_317_5],
    [-0.200_577_5, -1.177_412_5],
    [-0.926_525, 0.968_76],
    [1.129_09, -0.750_032_5],
    [0.960_3, 1.146_25],
];

const INITIAL: Vec4 = Vec4::new(0.0, 0.0, -1.0, 0.0);

/// `(x, y)` = jitter offset, `z` = ping-pong sign, `w` = sample index.
///
/// Single writer: the pipeline advances it once per frame that renders TAA.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JitterSequence {
    value: Vec4,
}

impl Default for JitterSequence {
    fn default() -> Self {
        Self { value: INITIAL }
    }
}

impl JitterSequence {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn value(&self) -> Vec4 {
        self.value
    }

    #[inline]
    #[must_use]
    pub fn offset(&self) -> Vec2 {
        self.value.truncate().truncate()
    }

    #[inline]
    #[must_use]
    pub fn sample_index(&self) -> usize {
        self.value.w as usize
    }

    /// `true` when history is read from frame 0 and written to frame 1.
    #[inline]
    #[must_use]
    pub fn ping_pong(&self) -> bool {
        self.value.z > 0.0
    }

    /// Moves to the next sample and flips the ping-pong flag.
    pub fn advance(&mut self) {
        let next = (self.sample_index() + 1) % HALTON_TABLE.len();
        let [x, y] = HALTON_TABLE[next];
        self.value = Vec4::new(x, y, -self.value.z, next as f32);
    }

    pub fn reset(&mut self) {
        self.value = INITIAL;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_walks_the_table_and_wraps() {
        let mut j = JitterSequence::new();
        j.advance();
        assert_eq!(j.sample_index(), 1);
        assert_eq!(j.offset(), Vec2::new(-0.385_45, 0.054_485));
        for _ in 0..14 {
            j.advance();
        }
        assert_eq!(j.sample_index(), 0);
        assert_eq!(j.offset(), Vec2::new(0.263_385, -0.025_247_5));
    }

    #[test]
    fn toggle_flips_every_advance() {
        let mut j = JitterSequence::new();
        assert!(!j.ping_pong());
        j.advance();
        assert!(j.ping_pong());
        j.advance();
        assert!(!j.ping_pong());
        j.reset();
        assert_eq!(j.value(), Vec4::new(0.0, 0.0, -1.0, 0.0));
    }
}
