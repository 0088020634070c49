// Minimal PRNG (no external crates).
//
// This is NOT cryptographically secure.
// It is used only for simulation noise, and the draw order is part of the
// determinism contract: two runs with the same seed consume draws in the
// same particle iteration order and produce identical trajectories.

use std::f32::consts::TAU;

use crate::geom::Vec2;

#[derive(Debug, Clone)]
pub struct Prng {
    state: u64,
}

impl Prng {
    pub fn new(seed: u64) -> Self {
        // Avoid a zero state.
        let seed = if seed == 0 { 0x9E3779B97F4A7C15 } else { seed };
        Self { state: seed }
    }

    pub(crate) fn from_state(state: u64) -> Self {
        let state = if state == 0 {
            0x9E3779B97F4A7C15
        } else {
            state
        };
        Self { state }
    }

    pub(crate) fn state(&self) -> u64 {
        self.state
    }

    #[inline]
    fn next_u64(&mut self) -> u64 {
        // xorshift64*
        // Marsaglia / Vigna family. Simple, fast, decent for simulation noise.
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    #[inline]
    pub fn next_f32_01(&mut self) -> f32 {
        // 24 high bits fit an f32 mantissa exactly, so the result stays below 1.0.
        ((self.next_u32() >> 8) as f32) * (1.0 / 16_777_216.0)
    }

    #[inline]
    pub fn gen_range_f32(&mut self, low: f32, high: f32) -> f32 {
        low + (high - low) * self.next_f32_01()
    }

    /// Uniform angle in [0, 2π).
    #[inline]
    pub fn gen_angle(&mut self) -> f32 {
        TAU * self.next_f32_01()
    }

    /// Random unit vector (one angle draw).
    #[inline]
    pub fn gen_unit_vec(&mut self) -> Vec2 {
        Vec2::from_angle(self.gen_angle())
    }

    /// Symmetric jitter in [-scale, scale] (one draw).
    #[inline]
    pub fn gen_jitter(&mut self, scale: f32) -> f32 {
        (self.next_f32_01() - 0.5) * 2.0 * scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_seed_is_remapped() {
        let mut a = Prng::new(0);
        let mut b = Prng::new(0x9E3779B97F4A7C15);
        assert_eq!(a.next_u32(), b.next_u32());
    }

    #[test]
    fn same_seed_same_stream() {
        let mut a = Prng::new(42);
        let mut b = Prng::new(42);
        for _ in 0..100 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn f32_draws_stay_in_unit_interval() {
        let mut rng = Prng::new(7);
        for _ in 0..1000 {
            let v = rng.next_f32_01();
            assert!((0.0..1.0).contains(&v), "draw out of range: {v}");
        }
    }

    #[test]
    fn jitter_is_symmetric_about_zero() {
        let mut rng = Prng::new(3);
        for _ in 0..1000 {
            let j = rng.gen_jitter(0.25);
            assert!(j.abs() <= 0.25, "jitter out of range: {j}");
        }
    }

    #[test]
    fn unit_vec_has_unit_length() {
        let mut rng = Prng::new(11);
        for _ in 0..100 {
            let v = rng.gen_unit_vec();
            assert!((v.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn state_round_trip_resumes_stream() {
        let mut a = Prng::new(99);
        a.next_u32();
        let mut b = Prng::from_state(a.state());
        assert_eq!(a.next_u32(), b.next_u32());
    }
}
