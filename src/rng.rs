/// Source of uniform draws in `[0, 1)` used for spawn placement and values.
pub trait RandomSource {
    fn next_f32(&mut self) -> f32;

    fn pick_index(&mut self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        (self.next_f32() * len as f32).floor().min((len - 1) as f32) as usize
    }
}

/// Seedable mulberry32 generator.
#[derive(Clone, Debug)]
pub struct Rng {
    seed: u32,
}

impl Rng {
    pub fn new(seed: u32) -> Self {
        Self { seed }
    }

    pub fn from_entropy() -> Self {
        Self::new(rand::random::<u32>())
    }
}

impl RandomSource for Rng {
    fn next_f32(&mut self) -> f32 {
        self.seed = self.seed.wrapping_add(0x6d2b79f5);
        let mut t = self.seed;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        unit_from_bits(t ^ (t >> 14))
    }
}

// The f32 cast rounds values near 2^32 up to 1.0; keep the draw below it.
fn unit_from_bits(bits: u32) -> f32 {
    ((bits as f64 / 4_294_967_296.0) as f32).min(1.0 - f32::EPSILON)
}
