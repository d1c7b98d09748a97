//! Bounded random draws and pronounceable name generation.

use std::collections::HashSet;

use rand::Rng;
use rand::rngs::StdRng;

pub type GameRng = StdRng;

const CONSONANTS: &[char] = &[
    'b', 'c', 'd', 'f', 'g', 'h', 'k', 'l', 'm', 'n', 'p', 'r', 's', 't', 'v', 'w', 'z',
];
const VOWELS: &[char] = &['a', 'e', 'i', 'o', 'u', 'y'];

const MIN_NAME_LENGTH: usize = 4;
const MAX_NAME_LENGTH: usize = 8;

/// Inclusive integer draw. Swapped bounds are tolerated.
pub fn between<R: Rng>(rng: &mut R, min: i64, max: i64) -> i64 {
    let (low, high) = if min <= max { (min, max) } else { (max, min) };
    rng.random_range(low..=high)
}

/// Half-open float draw; returns `min` for an empty range.
pub fn between_f64<R: Rng>(rng: &mut R, min: f64, max: f64) -> f64 {
    if max <= min {
        return min;
    }
    rng.random_range(min..max)
}

/// Produces names that are unique across one game.
///
/// Every name handed out (and every fixed name registered with
/// [`NameGenerator::reserve`]) goes into a shared exclusion set.
#[derive(Debug, Clone, Default)]
pub struct NameGenerator {
    used: HashSet<String>,
}

impl NameGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a fixed name as taken.
    pub fn reserve(&mut self, name: impl Into<String>) {
        self.used.insert(name.into().to_lowercase());
    }

    pub fn is_taken(&self, name: &str) -> bool {
        self.used.contains(&name.to_lowercase())
    }

    /// Alternating consonant/vowel string of bounded length, re-rolled until
    /// it avoids every name seen so far.
    pub fn generate<R: Rng>(&mut self, rng: &mut R) -> String {
        loop {
            let candidate = pronounceable(rng);
            if !self.is_taken(&candidate) {
                self.reserve(candidate.clone());
                return candidate;
            }
        }
    }
}

fn pronounceable<R: Rng>(rng: &mut R) -> String {
    let length = rng.random_range(MIN_NAME_LENGTH..=MAX_NAME_LENGTH);
    let mut use_vowel = rng.random_bool(0.5);
    let mut name = String::with_capacity(length);

    for i in 0..length {
        let pool = if use_vowel { VOWELS } else { CONSONANTS };
        let c = pool[rng.random_range(0..pool.len())];
        if i == 0 {
            name.extend(c.to_uppercase());
        } else {
            name.push(c);
        }
        use_vowel = !use_vowel;
    }

    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn names_alternate_and_stay_in_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut names = NameGenerator::new();
        for _ in 0..200 {
            let name = names.generate(&mut rng);
            assert!(name.len() >= MIN_NAME_LENGTH && name.len() <= MAX_NAME_LENGTH, "{name}");
            assert!(name.chars().next().unwrap().is_uppercase());

            let lower: Vec<char> = name.to_lowercase().chars().collect();
            for pair in lower.windows(2) {
                assert_ne!(
                    VOWELS.contains(&pair[0]),
                    VOWELS.contains(&pair[1]),
                    "{name} does not alternate"
                );
            }
        }
    }

    #[test]
    fn reserved_names_are_never_generated() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut names = NameGenerator::new();
        let mut seen = HashSet::new();
        for _ in 0..500 {
            let name = names.generate(&mut rng);
            assert!(seen.insert(name.to_lowercase()), "duplicate {name}");
        }
        names.reserve("Passengers");
        assert!(names.is_taken("passengers"));
    }

    #[test]
    fn between_handles_swapped_bounds() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            let v = between(&mut rng, 10, 5);
            assert!((5..=10).contains(&v));
        }
        assert_eq!(between_f64(&mut rng, 2.0, 2.0), 2.0);
    }
}
