//! Default nickname generator.
//!
//! Produces nicknames like `magni_oak42`, short enough for servers that still
//! enforce a 9 to 16 character nickname limit.

use rand::RngExt;

const STEMS: &[&str] = &[
    "oak", "ash", "elm", "fir", "yew", "rune", "iron", "frost", "storm", "ember", "raven", "wolf",
    "bear", "hawk", "elk", "boar",
];

/// Generate a nickname like `magni_oak42`.
pub fn generate_nickname() -> String {
    let mut rng = rand::rng();
    let stem = STEMS[rng.random_range(0..STEMS.len())];
    let num: u8 = rng.random_range(0..100);
    format!("magni_{stem}{num}")
}
