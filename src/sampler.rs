//! Candidate sampling: rarity-weighted roulette or uniform pick.
//!
//! The roulette is deliberately not a normalized distribution.
//! Candidates are sorted by ascending probability and the first one
//! whose probability is >= a uniform draw wins; if the draw exceeds
//! every threshold the most common candidate wins. Existing ledgers
//! were produced with this exact bias, so it must not be "fixed".

use tracing::debug;

use crate::prng::Pcg32;

/// Rarity token -> probability of being chosen.
pub const RARITY_TABLE: [(&str, f64); 4] = [
    ("common", 0.75),
    ("uncommon", 0.15),
    ("epic", 0.07),
    ("legendary", 0.03),
];

const COMMON_PROBABILITY: f64 = 0.75;

/// First token of `name` found in the rarity table. Tokens are split on
/// anything that isn't alphanumeric, so `hat_epic.png` yields `epic`.
pub fn rarity_token(name: &str) -> Option<&'static str> {
    let lower = name.to_lowercase();
    lower.split(|c: char| !c.is_ascii_alphanumeric()).find_map(|tok| {
        RARITY_TABLE
            .iter()
            .find(|(t, _)| *t == tok)
            .map(|(t, _)| *t)
    })
}

/// Probability for a name; names without a token count as common.
pub fn probability(name: &str) -> f64 {
    rarity_token(name)
        .and_then(|t| RARITY_TABLE.iter().find(|(k, _)| *k == t))
        .map(|(_, p)| *p)
        .unwrap_or(COMMON_PROBABILITY)
}

/// True if any candidate carries a non-common rarity token.
pub fn uses_rarity(candidates: &[String]) -> bool {
    candidates
        .iter()
        .any(|c| matches!(rarity_token(c), Some(t) if t != "common"))
}

/// Biased roulette over `candidates`. Always consumes one draw for a
/// non-empty input.
pub fn weighted_pick<'a>(rng: &mut Pcg32, candidates: &'a [String]) -> Option<&'a String> {
    if candidates.is_empty() {
        return None;
    }
    let mut ranked: Vec<(&String, f64)> =
        candidates.iter().map(|c| (c, probability(c))).collect();
    // Stable: equal probabilities keep their incoming order.
    ranked.sort_by(|a, b| a.1.total_cmp(&b.1));

    let draw = rng.next_float();
    let chosen = ranked
        .iter()
        .find(|(_, p)| *p >= draw)
        .or_else(|| ranked.last())
        .map(|(c, _)| *c);
    debug!(draw, ?chosen, "weighted pick");
    chosen
}

pub fn uniform_pick<'a>(rng: &mut Pcg32, candidates: &'a [String]) -> Option<&'a String> {
    if candidates.is_empty() {
        return None;
    }
    Some(&candidates[rng.next_index(candidates.len())])
}

/// Weighted when any candidate is rarity-tagged, uniform otherwise.
pub fn sample<'a>(rng: &mut Pcg32, candidates: &'a [String]) -> Option<&'a String> {
    if uses_rarity(candidates) {
        weighted_pick(rng, candidates)
    } else {
        uniform_pick(rng, candidates)
    }
}
