use std::f64::consts::TAU;

/// Source of independent standard-normal deviates.
pub trait NormalSource {
    fn standard_normal(&mut self) -> f64;
}

impl<S: NormalSource + ?Sized> NormalSource for &mut S {
    fn standard_normal(&mut self) -> f64 {
        (**self).standard_normal()
    }
}

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;
const XORSHIFT_STAR: u64 = 0x2545_F491_4F6C_DD1D;
const UNIT_SCALE: f64 = 1.0 / (1_u64 << 53) as f64;

/// Seeded xorshift64* uniform generator.
#[derive(Debug, Clone)]
pub struct Rng {
    state: u64,
}

impl Rng {
    /// xorshift has an all-zero fixed point, so seed 0 is remapped.
    pub fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { GOLDEN_GAMMA } else { seed },
        }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state ^= self.state >> 12;
        self.state ^= self.state << 25;
        self.state ^= self.state >> 27;
        self.state.wrapping_mul(XORSHIFT_STAR)
    }

    /// Uniform deviate in the open interval (0, 1), centred on a 53-bit grid.
    pub fn next_f64(&mut self) -> f64 {
        ((self.next_u64() >> 11) as f64 + 0.5) * UNIT_SCALE
    }

    /// Uniform deviate in `[lo, hi)`.
    pub fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }
}

/// Box-Muller transform over [`Rng`]; each uniform pair yields two normals.
#[derive(Debug, Clone)]
pub struct BoxMuller {
    uniform: Rng,
    spare: Option<f64>,
}

impl BoxMuller {
    pub fn new(seed: u64) -> Self {
        Self {
            uniform: Rng::new(seed),
            spare: None,
        }
    }
}

impl NormalSource for BoxMuller {
    fn standard_normal(&mut self) -> f64 {
        if let Some(z) = self.spare.take() {
            return z;
        }

        // next_f64 never returns 0, so the log is finite.
        let radius = (-2.0 * self.uniform.next_f64().ln()).sqrt();
        let (sin, cos) = (TAU * self.uniform.next_f64()).sin_cos();
        self.spare = Some(radius * sin);
        radius * cos
    }
}

/// Independent sub-seed for one stream (path, holding, ...) of a seeded run.
pub fn derive_seed(base_seed: u64, stream: u64) -> u64 {
    let mixed = base_seed ^ stream.rotate_left(32) ^ stream;
    splitmix64(mixed)
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(GOLDEN_GAMMA);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}
