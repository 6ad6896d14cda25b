//! Deterministic human-friendly session names.
//!
//! A session UUID maps to a stable `adjective-noun` pair so that
//! notifications from the same session are visually groupable without
//! exposing the raw id.

const ADJECTIVES: &[&str] = &[
    "bold", "brave", "bright", "calm", "clever",
    "cool", "cosmic", "crisp", "daring", "eager",
    "fair", "fancy", "fast", "gentle", "glad",
    "grand", "happy", "kind", "lively", "lucky",
    "merry", "noble", "proud", "quick", "quiet",
    "rapid", "smart", "solid", "swift", "warm",
    "wise", "witty", "zesty", "agile", "alert",
];

const NOUNS: &[&str] = &[
    "bear", "bird", "cat", "deer", "eagle",
    "fish", "fox", "hawk", "lion", "owl",
    "star", "moon", "sun", "wind", "wave",
    "tree", "river", "mountain", "ocean", "cloud",
    "tiger", "wolf", "dragon", "phoenix", "falcon",
    "comet", "galaxy", "planet", "nova", "meteor",
    "forest", "canyon", "valley", "peak", "storm",
];

/// Generates a friendly name like `bold-cat` from a session id.
///
/// The first 8 hex characters of the dash-stripped id seed the adjective,
/// the next 8 seed the noun. Empty or too-short ids map to
/// `unknown-session`.
pub fn generate(session_id: &str) -> String {
    if session_id.is_empty() || session_id == "unknown" {
        return "unknown-session".to_string();
    }

    let clean: String = session_id.to_lowercase().replace('-', "");
    if clean.len() < 16 {
        return "unknown-session".to_string();
    }

    let adj_index = hex_seed(&clean[0..8]) % ADJECTIVES.len();
    let noun_index = hex_seed(&clean[8..16]) % NOUNS.len();

    format!("{}-{}", ADJECTIVES[adj_index], NOUNS[noun_index])
}

// Only the first 6 characters are parsed so the value fits comfortably in
// the index arithmetic. Non-hex input seeds to 0.
fn hex_seed(seed: &str) -> usize {
    let seed = &seed[..seed.len().min(6)];
    usize::from_str_radix(seed, 16).unwrap_or(0)
}
