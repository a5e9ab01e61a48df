//! Source aléatoire injectable.
//!
//! Le shuffle, le tirage pondéré des équipements et la génération de MAC
//! passent tous par `RandomSource` : en production une `RngSource` initialisée
//! par l'entropie système, en test une `RngSource::seeded`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub trait RandomSource {
    /// Entier uniforme dans `[0, upper)`. `upper` doit être > 0.
    fn below(&mut self, upper: usize) -> usize;

    /// Flottant uniforme dans `[0, 1)`
    fn unit(&mut self) -> f64;

    fn octet(&mut self) -> u8;
}

/// Source par défaut du kernel
pub type DefaultRng = RngSource<StdRng>;

/// Adaptateur `rand::Rng` → `RandomSource`
pub struct RngSource<R> {
    rng: R,
}

impl RngSource<StdRng> {
    pub fn from_entropy() -> Self {
        Self { rng: StdRng::from_entropy() }
    }

    pub fn seeded(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }

    /// Seed explicite si configurée, entropie sinon
    pub fn from_seed_option(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => Self::from_entropy(),
        }
    }
}

impl<R: Rng> RandomSource for RngSource<R> {
    fn below(&mut self, upper: usize) -> usize {
        self.rng.gen_range(0..upper)
    }

    fn unit(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    fn octet(&mut self) -> u8 {
        self.rng.gen::<u8>()
    }
}

/// Fisher–Yates en place
pub fn shuffle<T>(items: &mut [T], rng: &mut dyn RandomSource) {
    for i in (1..items.len()).rev() {
        let j = rng.below(i + 1);
        items.swap(i, j);
    }
}
