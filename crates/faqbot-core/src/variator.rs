//! Response variator: maps a canonical response to one of several
//! presentations. Seedable so tests are deterministic; disabled it is the
//! identity (first option, no prefix).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

/// Prefixes occasionally attached to semantic answers to soften certainty.
const UNCERTAINTY_PHRASES: &[&str] = &[
    "I think ",
    "Maybe this helps: ",
    "Here's what I found: ",
    "Possibly: ",
];

pub struct ResponseVariator {
    rng: Mutex<StdRng>,
    enabled: bool,
    uncertainty_probability: f32,
}

impl ResponseVariator {
    /// `seed: None` seeds from entropy; a fixed seed makes every pick
    /// reproducible.
    pub fn new(enabled: bool, seed: Option<u64>, uncertainty_probability: f32) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self {
            rng: Mutex::new(rng),
            enabled,
            uncertainty_probability: uncertainty_probability.clamp(0.0, 1.0),
        }
    }

    /// Identity variator (used when variation is disabled in config).
    pub fn disabled() -> Self {
        Self::new(false, Some(0), 0.0)
    }

    /// Picks one option; the first when disabled or the slice is singular.
    pub fn pick<'a>(&self, options: &[&'a str]) -> &'a str {
        if options.is_empty() {
            return "";
        }
        if !self.enabled || options.len() == 1 {
            return options[0];
        }
        let index = self
            .rng
            .lock()
            .map(|mut rng| rng.gen_range(0..options.len()))
            .unwrap_or(0);
        options[index]
    }

    /// Occasionally prefixes an answer with an uncertainty phrase.
    pub fn vary_uncertain(&self, response: &str) -> String {
        if !self.enabled || self.uncertainty_probability <= 0.0 {
            return response.to_string();
        }
        let mut rng = match self.rng.lock() {
            Ok(g) => g,
            Err(_) => return response.to_string(),
        };
        if rng.gen::<f32>() < self.uncertainty_probability {
            let prefix = UNCERTAINTY_PHRASES[rng.gen_range(0..UNCERTAINTY_PHRASES.len())];
            format!("{}{}", prefix, response)
        } else {
            response.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_variator_is_identity() {
        let v = ResponseVariator::disabled();
        assert_eq!(v.pick(&["a", "b", "c"]), "a");
        assert_eq!(v.vary_uncertain("answer"), "answer");
    }

    #[test]
    fn test_seeded_picks_are_reproducible() {
        let a = ResponseVariator::new(true, Some(42), 0.2);
        let b = ResponseVariator::new(true, Some(42), 0.2);
        let options = ["one", "two", "three", "four"];
        for _ in 0..10 {
            assert_eq!(a.pick(&options), b.pick(&options));
        }
    }

    #[test]
    fn test_uncertainty_prefix_preserves_answer() {
        let v = ResponseVariator::new(true, Some(7), 1.0);
        let out = v.vary_uncertain("the campus is in abeokuta");
        assert!(out.ends_with("the campus is in abeokuta"));
        assert!(out.len() > "the campus is in abeokuta".len());
    }

    #[test]
    fn test_zero_probability_never_prefixes() {
        let v = ResponseVariator::new(true, Some(7), 0.0);
        assert_eq!(v.vary_uncertain("answer"), "answer");
    }

    #[test]
    fn test_empty_options_yield_empty() {
        let v = ResponseVariator::new(true, Some(1), 0.0);
        assert_eq!(v.pick(&[]), "");
    }
}
