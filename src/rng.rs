use crate::math::Vec3;
use rand::{RngCore, SeedableRng};

/// Deterministic 64-bit xorshift* sequence (Marsaglia).
///
/// Every row of the image owns one of these, seeded from its Y coordinate,
/// which makes the rendered image a pure function of the scene and the
/// render parameters — worker count and scheduling never show up in the
/// pixels. The state must never be zero; seeding guards against it.
#[derive(Debug, Clone)]
pub struct RandomSequence {
    state: u64,
}

const MULTIPLIER: u64 = 0x2545F4914F6CDD1D;

impl RandomSequence {
    pub fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { MULTIPLIER } else { seed },
        }
    }

    /// The per-row seed. The constants are arbitrary but fixed: changing
    /// them changes every image ever rendered.
    pub fn for_row(y: u32) -> Self {
        Self::new(4815162342u64.wrapping_mul(y as u64 + 1).wrapping_add(1123581321))
    }

    #[inline(always)]
    pub fn next_raw(&mut self) -> u64 {
        let mut s = self.state;
        s ^= s >> 12;
        s ^= s << 25;
        s ^= s >> 27;
        self.state = s;
        s.wrapping_mul(MULTIPLIER)
    }

    /// Uniform on [0, 1), from the high 32 bits of the raw stream.
    #[inline(always)]
    pub fn unilateral(&mut self) -> f32 {
        let bits = (self.next_raw() >> 32) as u32;
        bits as f32 / u32::MAX as f32
    }

    /// Uniform on (−1, 1).
    #[inline(always)]
    pub fn bilateral(&mut self) -> f32 {
        2.0 * self.unilateral() - 1.0
    }

    /// Uniform inside the unit ball, by rejection sampling.
    pub fn unit_ball(&mut self) -> Vec3 {
        let mut v = Vec3::new(self.bilateral(), self.bilateral(), self.bilateral());
        while v.length_squared() > 1.0 {
            v = Vec3::new(self.bilateral(), self.bilateral(), self.bilateral());
        }
        v
    }

    /// Uniform on the unit sphere.
    pub fn unit_sphere(&mut self) -> Vec3 {
        self.unit_ball().normalized_or(Vec3::new(0.0, 0.0, 1.0))
    }
}

impl RngCore for RandomSequence {
    #[inline(always)]
    fn next_u32(&mut self) -> u32 {
        (self.next_raw() >> 32) as u32
    }

    #[inline(always)]
    fn next_u64(&mut self) -> u64 {
        self.next_raw()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let bytes = self.next_raw().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for RandomSequence {
    type Seed = [u8; 8];

    fn from_seed(seed: Self::Seed) -> Self {
        Self::new(u64::from_le_bytes(seed))
    }

    fn seed_from_u64(state: u64) -> Self {
        Self::new(state)
    }
}
