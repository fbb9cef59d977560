//! Cross-trait compatibility rules.
//!
//! Every rule is data: glob patterns (fnmatch syntax) grouped in
//! `RuleTables`, compiled once into a `RuleBook`. The book is
//! stateless; everything a walk learns about its own choices lives in
//! a `SelectionState` that the walk owns and threads through.
//!
//! Variant-level filters narrow in a fixed order, each working on the
//! previous result:
//!   1. hand variants follow the mouth-6 signature,
//!   2. restricting eyes exclude some mouths,
//!   3. ear-2 forces the "no gadget" head accessory,
//!   4. the active skin stream restricts mouth indices.
//! Leaf-level filters handle hand gadgets and eyelash/eye pairing.
//! The hand-7 rule runs after the walk over the whole recipe, because
//! hands are chosen after mouths.

use std::collections::{BTreeMap, HashMap};

use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{GenerateError, Result};

// -- Selection state -----------------------------------------------

/// Signatures picked up during one walk. Built fresh per generation
/// attempt and never shared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    pub mouth_six: bool,
    pub mouth_six_gadget: bool,
    pub ears_two: bool,
    pub hand_seven: bool,
    pub restricting_eyes: bool,
    /// "eyes_N" of the first eyes leaf chosen.
    pub eye_index: Option<String>,
    /// Stream token of the most recent skin leaf.
    pub skin_stream: Option<String>,
    pub head_gadget: Option<String>,
}

// -- Rule tables (data) --------------------------------------------

fn strings(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

/// Leaf names that switch a signature on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Signatures {
    pub mouth_six: Vec<String>,
    pub mouth_six_gadget: Vec<String>,
    pub ears_two: Vec<String>,
    pub hand_seven: Vec<String>,
    pub restricting_eyes: Vec<String>,
}

impl Default for Signatures {
    fn default() -> Self {
        Self {
            mouth_six: strings(&["mouth_6*", "mouth_[0-9]6*", "mouth_[0-9][0-9]6*"]),
            mouth_six_gadget: strings(&[
                "mouth_6_gadget*",
                "mouth_[0-9]6_gadget*",
                "mouth_[0-9][0-9]6_gadget*",
            ]),
            ears_two: strings(&["ear_2*"]),
            hand_seven: strings(&["*hand_7*"]),
            restricting_eyes: strings(&["eyes_12*"]),
        }
    }
}

/// Patterns that tell what kind of candidates a choice is among.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Markers {
    pub hand: Vec<String>,
    pub hand_six: Vec<String>,
    pub gadget_leaf: Vec<String>,
    pub mouth: Vec<String>,
    pub head_gadget: Vec<String>,
    pub no_gadget: Vec<String>,
    pub eyes: Vec<String>,
    pub eyelash: Vec<String>,
    pub no_eyelash: Vec<String>,
    /// Recipe lines dropped by the hand-7 repair match both of these.
    pub repair_mouth: Vec<String>,
    pub repair_gadget: Vec<String>,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            hand: strings(&["*hand*"]),
            hand_six: strings(&["*6*"]),
            gadget_leaf: strings(&["gadget*"]),
            mouth: strings(&["*mouth_*"]),
            head_gadget: strings(&["*head_gadget*"]),
            no_gadget: strings(&["*no_gadget*"]),
            eyes: strings(&["*eyes*"]),
            eyelash: strings(&["*eyelash*"]),
            no_eyelash: strings(&["*eyelashes_no*"]),
            repair_mouth: strings(&["*mouth*"]),
            repair_gadget: strings(&["*_gadget*"]),
        }
    }
}

/// Keep ("y") and exclude ("n") patterns for one head accessory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllowDeny {
    #[serde(default, rename = "y")]
    pub keep: Vec<String>,
    #[serde(default, rename = "n")]
    pub deny: Vec<String>,
}

const EARS: &str = "*gadget_ears*";
const EARRINGS: &str = "*gadget_earrings*";

const HEAD_GADGETS: &[(&str, &[&str], &[&str])] = &[
    ("head_gadget_alloro", &[EARS], &[EARRINGS]),
    ("head_gadget_wool", &[EARS], &[EARRINGS]),
    ("head_gadget_cop", &[EARS], &[EARRINGS]),
    ("head_gadget_devil", &[EARRINGS], &[EARS]),
    ("head_gadget_hat", &[EARRINGS], &["*peace*", "*cross*", "*feather*"]),
    ("head_gadget_hat1", &[EARS, EARRINGS], &[]),
    ("head_gadget_hat2", &[EARS, EARRINGS], &[]),
    ("head_gadget_pika", &[EARRINGS], &[EARS]),
    ("head_gadget_angel", &[EARS, EARRINGS], &[]),
    ("head_gadget_sail", &[], &["*peace*", "*cross*", "*feather*"]),
    ("head_gadget_weed", &[], &["*peace*", "*cross*", EARRINGS]),
    ("head_gadget_crown", &[EARS, EARRINGS], &[]),
    ("head_gadget_party", &[EARS, EARRINGS], &[]),
    ("head_gadget_rus", &[EARS, EARRINGS], &[]),
    ("head_gadget_bomb", &[EARS, EARRINGS], &[]),
    ("head_gadget_hood", &[EARS, EARRINGS], &[]),
    ("head_gadget_punk", &[EARS, EARRINGS], &[]),
    ("head_gadget_bandana", &[], &[EARRINGS, "*peace*", "*feather*", "*cross*"]),
    ("head_gadget_bandana1", &[EARS], &[EARRINGS]),
    ("head_gadget_bandana2", &[EARS], &[EARRINGS]),
    ("head_gadget_beer", &[EARS, EARRINGS], &[]),
];

const SKIN_MOUTHS: &[(&str, &[u32])] = &[
    ("silver", &[1, 2, 3]),
    ("alien_cheeta", &[1, 2, 3, 6, 7]),
    ("dark_pink", &[1, 2, 7]),
    ("gold", &[1, 2, 3, 7]),
    ("tiger_cheetah", &[1, 2, 3, 7]),
    ("tiger_giraffe", &[1, 2, 3, 7]),
    ("tiger_tiger", &[1, 2, 3, 7]),
    ("tiger_grey", &[1, 2, 3, 7]),
    ("tiger_zebra", &[1, 2, 3, 7]),
    ("zombie", &[1, 2, 7]),
];

/// The whole rule set as plain data. `Default` is the built-in table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleTables {
    pub signatures: Signatures,
    pub markers: Markers,
    /// Mouths ruled out once a restricting eyes leaf is chosen.
    pub excluded_mouths: Vec<String>,
    pub head_gadgets: BTreeMap<String, AllowDeny>,
    /// Skin stream -> mouth indices valid with it.
    pub skin_mouths: BTreeMap<String, Vec<u32>>,
    /// Regex; capture 1 is the stream token of a skin file name.
    pub skin_stream_regex: String,
    /// Regex; capture 1 is the eye index ("eyes_N") of an eyes leaf.
    pub eye_index_regex: String,
}

impl Default for RuleTables {
    fn default() -> Self {
        let head_gadgets = HEAD_GADGETS
            .iter()
            .map(|(name, keep, deny)| {
                (
                    name.to_string(),
                    AllowDeny { keep: strings(keep), deny: strings(deny) },
                )
            })
            .collect();
        let skin_mouths = SKIN_MOUTHS
            .iter()
            .map(|(skin, mouths)| (skin.to_string(), mouths.to_vec()))
            .collect();
        Self {
            signatures: Signatures::default(),
            markers: Markers::default(),
            excluded_mouths: strings(&["mouth_0[45]*"]),
            head_gadgets,
            skin_mouths,
            skin_stream_regex: r"^(?:body_skin_|\w+_\d+_)([&]*[A-Za-z0-9&_]*)\.png".into(),
            eye_index_regex: r"^(eyes_\d+)".into(),
        }
    }
}

// -- Compiled rule book --------------------------------------------

/// Union of glob patterns.
#[derive(Debug, Clone, Default)]
struct PatternSet(Vec<Pattern>);

impl PatternSet {
    fn compile<S: AsRef<str>>(sources: &[S]) -> Result<Self> {
        sources
            .iter()
            .map(|s| {
                Pattern::new(s.as_ref()).map_err(|source| GenerateError::Pattern {
                    pattern: s.as_ref().to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()
            .map(PatternSet)
    }

    fn matches(&self, name: &str) -> bool {
        self.0.iter().any(|p| p.matches(name))
    }

    fn any_match(&self, names: &[String]) -> bool {
        names.iter().any(|n| self.matches(n))
    }
}

#[derive(Debug, Clone)]
struct HeadGadgetRule {
    keep: PatternSet,
    deny: PatternSet,
}

#[derive(Debug, Clone)]
pub struct RuleBook {
    mouth_six: PatternSet,
    mouth_six_gadget: PatternSet,
    ears_two: PatternSet,
    hand_seven: PatternSet,
    restricting_eyes: PatternSet,
    hand: PatternSet,
    hand_six: PatternSet,
    gadget_leaf: PatternSet,
    mouth: PatternSet,
    head_gadget: PatternSet,
    no_gadget: PatternSet,
    eyes: PatternSet,
    eyelash: PatternSet,
    no_eyelash: PatternSet,
    repair_mouth: PatternSet,
    repair_gadget: PatternSet,
    excluded_mouths: PatternSet,
    head_gadgets: HashMap<String, HeadGadgetRule>,
    skin_mouths: HashMap<String, PatternSet>,
    skin_stream: Regex,
    eye_index: Regex,
}

impl RuleBook {
    pub fn compile(tables: &RuleTables) -> Result<Self> {
        let sig = &tables.signatures;
        let mk = &tables.markers;

        let mut head_gadgets = HashMap::new();
        for (name, rule) in &tables.head_gadgets {
            head_gadgets.insert(
                name.clone(),
                HeadGadgetRule {
                    keep: PatternSet::compile(&rule.keep)?,
                    deny: PatternSet::compile(&rule.deny)?,
                },
            );
        }

        let mut skin_mouths = HashMap::new();
        for (skin, indices) in &tables.skin_mouths {
            if indices.is_empty() {
                continue;
            }
            let globs: Vec<String> = indices.iter().map(|n| format!("*{n}*")).collect();
            skin_mouths.insert(skin.clone(), PatternSet::compile(&globs)?);
        }

        Ok(Self {
            mouth_six: PatternSet::compile(&sig.mouth_six)?,
            mouth_six_gadget: PatternSet::compile(&sig.mouth_six_gadget)?,
            ears_two: PatternSet::compile(&sig.ears_two)?,
            hand_seven: PatternSet::compile(&sig.hand_seven)?,
            restricting_eyes: PatternSet::compile(&sig.restricting_eyes)?,
            hand: PatternSet::compile(&mk.hand)?,
            hand_six: PatternSet::compile(&mk.hand_six)?,
            gadget_leaf: PatternSet::compile(&mk.gadget_leaf)?,
            mouth: PatternSet::compile(&mk.mouth)?,
            head_gadget: PatternSet::compile(&mk.head_gadget)?,
            no_gadget: PatternSet::compile(&mk.no_gadget)?,
            eyes: PatternSet::compile(&mk.eyes)?,
            eyelash: PatternSet::compile(&mk.eyelash)?,
            no_eyelash: PatternSet::compile(&mk.no_eyelash)?,
            repair_mouth: PatternSet::compile(&mk.repair_mouth)?,
            repair_gadget: PatternSet::compile(&mk.repair_gadget)?,
            excluded_mouths: PatternSet::compile(&tables.excluded_mouths)?,
            head_gadgets,
            skin_mouths,
            skin_stream: Regex::new(&tables.skin_stream_regex)?,
            eye_index: Regex::new(&tables.eye_index_regex)?,
        })
    }

    pub fn standard() -> Result<Self> {
        Self::compile(&RuleTables::default())
    }

    // -- Variant level ---------------------------------------------

    /// Narrow a variant group's candidates. Rarity-weighted groups
    /// bypass this entirely (see `walker`).
    pub fn filter_variants(&self, candidates: &[String], state: &SelectionState) -> Vec<String> {
        let mut variants = candidates.to_vec();

        if self.hand.any_match(&variants) {
            variants.retain(|v| self.hand_six.matches(v) == state.mouth_six);
        }

        if state.restricting_eyes {
            variants.retain(|v| !self.excluded_mouths.matches(v));
        }

        if state.ears_two && self.head_gadget.any_match(&variants) {
            variants.retain(|v| self.no_gadget.matches(v));
        }

        if self.mouth.any_match(&variants) {
            let valid = state
                .skin_stream
                .as_deref()
                .and_then(|s| self.skin_mouths.get(s));
            if let Some(valid) = valid {
                debug!(stream = ?state.skin_stream, "filtering mouths by skin");
                let narrowed: Vec<String> =
                    variants.iter().filter(|v| valid.matches(v)).cloned().collect();
                // An empty result would dead-end the walk; keep the wider set.
                if !narrowed.is_empty() {
                    variants = narrowed;
                }
            }
        }

        variants
    }

    // -- Leaf level ------------------------------------------------

    pub fn filter_leaves(&self, candidates: &[String], state: &SelectionState) -> Vec<String> {
        let mut leaves = candidates.to_vec();

        if state.mouth_six && self.hand.any_match(&leaves) {
            debug!("picking hand leaf constrained by mouth 6");
            leaves.retain(|l| {
                if state.mouth_six_gadget && self.gadget_leaf.matches(l) {
                    return false;
                }
                self.hand_six.matches(l)
            });
        }

        if let Some(index) = state.eye_index.as_deref() {
            if self.eyelash.any_match(&leaves) {
                debug!(index, "filtering eyelashes by eyes");
                leaves.retain(|l| l.contains(index) || self.no_eyelash.matches(l));
            }
        }

        leaves
    }

    /// Allow/deny filter for the head-accessory-plus-eyes position.
    /// Unknown or absent accessories leave the candidates untouched.
    pub fn filter_head_accessory(
        &self,
        candidates: &[String],
        state: &SelectionState,
    ) -> Vec<String> {
        let rule = match state.head_gadget.as_deref().and_then(|g| self.head_gadgets.get(g)) {
            Some(r) => r,
            None => return candidates.to_vec(),
        };
        candidates
            .iter()
            .filter(|c| rule.keep.matches(c) && !rule.deny.matches(c))
            .cloned()
            .collect()
    }

    // -- Signatures ------------------------------------------------

    /// Stream token embedded in a skin file name, if any.
    pub fn stream_of(&self, file_name: &str) -> Option<String> {
        self.skin_stream
            .captures(file_name)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Record what a freshly chosen leaf implies for later choices.
    pub fn observe_leaf(&self, leaf: &str, sets_stream: bool, state: &mut SelectionState) {
        if sets_stream {
            state.skin_stream = self.stream_of(leaf);
            info!(stream = ?state.skin_stream, "chosen skin stream");
        }
        if !state.restricting_eyes && self.restricting_eyes.matches(leaf) {
            state.restricting_eyes = true;
            info!(leaf, "restricting eyes chosen");
        }
        if !state.mouth_six && self.mouth_six.matches(leaf) {
            state.mouth_six = true;
            info!(leaf, "mouth 6 chosen, hands must match");
        }
        if !state.mouth_six_gadget && self.mouth_six_gadget.matches(leaf) {
            state.mouth_six_gadget = true;
            info!(leaf, "mouth 6 has gadgets, hands get none");
        }
        if !state.ears_two && self.ears_two.matches(leaf) {
            state.ears_two = true;
            info!(leaf, "ears 2 chosen, head accessory must be 'no_gadget'");
        }
        if !state.hand_seven && self.hand_seven.matches(leaf) {
            state.hand_seven = true;
            info!(leaf, "hand 7 chosen, mouth gadgets will be dropped");
        }
        if state.eye_index.is_none() && self.eyes.matches(leaf) {
            state.eye_index = self
                .eye_index
                .captures(leaf)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string());
            if let Some(index) = &state.eye_index {
                info!(index = index.as_str(), "eye index chosen");
            }
        }
    }

    // -- Whole-recipe repair ---------------------------------------

    /// With hand 7 chosen, drop every line naming a mouth gadget. If
    /// that would drop everything the recipe is left as is.
    pub fn repair_recipe(&self, lines: Vec<String>, state: &SelectionState) -> Vec<String> {
        if !state.hand_seven {
            return lines;
        }
        let kept: Vec<String> = lines
            .iter()
            .filter(|l| {
                let drop = self.repair_mouth.matches(l) && self.repair_gadget.matches(l);
                if drop {
                    debug!(line = l.as_str(), "removing mouth gadget incompatible with hand 7");
                }
                !drop
            })
            .cloned()
            .collect();
        if kept.is_empty() {
            lines
        } else {
            kept
        }
    }
}

// -- Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn book() -> RuleBook {
        RuleBook::standard().expect("built-in rules compile")
    }

    #[test]
    fn mouth_six_keeps_only_six_hands() {
        let state = SelectionState { mouth_six: true, ..Default::default() };
        let out = book().filter_variants(&names(&["hand_1", "hand_6", "hand_6_gadget"]), &state);
        assert_eq!(out, names(&["hand_6", "hand_6_gadget"]));
    }

    #[test]
    fn without_mouth_six_hands_exclude_six() {
        let state = SelectionState::default();
        let out = book().filter_variants(&names(&["hand_1", "hand_6", "hand_6_gadget"]), &state);
        assert_eq!(out, names(&["hand_1"]));
    }

    #[test]
    fn restricting_eyes_drop_mouths_four_and_five() {
        let state = SelectionState { restricting_eyes: true, ..Default::default() };
        let out = book().filter_variants(&names(&["mouth_03", "mouth_04", "mouth_05"]), &state);
        assert_eq!(out, names(&["mouth_03"]));
    }

    #[test]
    fn ears_two_forces_no_gadget() {
        let state = SelectionState { ears_two: true, ..Default::default() };
        let candidates = names(&["head_gadget_hat", "head_gadget_no_gadget"]);
        assert_eq!(
            book().filter_variants(&candidates, &state),
            names(&["head_gadget_no_gadget"])
        );
        // Unrelated groups are untouched.
        let other = names(&["blue", "red"]);
        assert_eq!(book().filter_variants(&other, &state), other);
    }

    #[test]
    fn skin_stream_restricts_mouths() {
        let state = SelectionState { skin_stream: Some("silver".into()), ..Default::default() };
        let out = book().filter_variants(&names(&["mouth_01", "mouth_06", "mouth_07"]), &state);
        assert_eq!(out, names(&["mouth_01"]));
    }

    #[test]
    fn skin_filter_never_empties_the_set() {
        let state = SelectionState { skin_stream: Some("silver".into()), ..Default::default() };
        let candidates = names(&["mouth_06", "mouth_07"]);
        assert_eq!(book().filter_variants(&candidates, &state), candidates);
    }

    #[test]
    fn hand_leaves_follow_mouth_six_gadget() {
        let state = SelectionState {
            mouth_six: true,
            mouth_six_gadget: true,
            ..Default::default()
        };
        let leaves = names(&["gadget_hand_6.png", "hand_6.png", "hand_2.png"]);
        assert_eq!(book().filter_leaves(&leaves, &state), names(&["hand_6.png"]));
    }

    #[test]
    fn eyelashes_pair_with_eye_index() {
        let state = SelectionState { eye_index: Some("eyes_3".into()), ..Default::default() };
        let leaves = names(&["eyelashes_eyes_3.png", "eyelashes_eyes_4.png", "eyelashes_no.png"]);
        assert_eq!(
            book().filter_leaves(&leaves, &state),
            names(&["eyelashes_eyes_3.png", "eyelashes_no.png"])
        );
    }

    #[test]
    fn head_accessory_keep_then_deny() {
        let state = SelectionState { head_gadget: Some("head_gadget_hat".into()), ..Default::default() };
        let leaves = names(&[
            "gadget_earrings_peace.png",
            "gadget_earrings_ring.png",
            "gadget_ears_cat.png",
        ]);
        assert_eq!(
            book().filter_head_accessory(&leaves, &state),
            names(&["gadget_earrings_ring.png"])
        );
    }

    #[test]
    fn unknown_head_accessory_keeps_everything() {
        let state = SelectionState { head_gadget: Some("head_gadget_none".into()), ..Default::default() };
        let leaves = names(&["gadget_ears_cat.png"]);
        assert_eq!(book().filter_head_accessory(&leaves, &state), leaves);
    }

    #[test]
    fn observe_leaf_sets_signatures() {
        let rules = book();
        let mut state = SelectionState::default();
        rules.observe_leaf("body_skin_gold.png", true, &mut state);
        rules.observe_leaf("eyes_12_blue.png", false, &mut state);
        rules.observe_leaf("mouth_06_gadget_pipe.png", false, &mut state);
        rules.observe_leaf("ear_2.png", false, &mut state);
        rules.observe_leaf("hand_7.png", false, &mut state);
        assert_eq!(state.skin_stream.as_deref(), Some("gold"));
        assert_eq!(state.eye_index.as_deref(), Some("eyes_12"));
        assert!(state.restricting_eyes);
        assert!(state.mouth_six && state.mouth_six_gadget);
        assert!(state.ears_two && state.hand_seven);
    }

    #[test]
    fn first_eye_index_sticks() {
        let rules = book();
        let mut state = SelectionState::default();
        rules.observe_leaf("eyes_3.png", false, &mut state);
        rules.observe_leaf("eyes_5.png", false, &mut state);
        assert_eq!(state.eye_index.as_deref(), Some("eyes_3"));
    }

    #[test]
    fn stream_token_extraction() {
        let rules = book();
        assert_eq!(rules.stream_of("body_skin_gold.png").as_deref(), Some("gold"));
        assert_eq!(
            rules.stream_of("head_01_tiger_zebra.png").as_deref(),
            Some("tiger_zebra")
        );
        assert_eq!(rules.stream_of("plain.png"), None);
    }

    #[test]
    fn hand_seven_repair_is_idempotent() {
        let rules = book();
        let state = SelectionState { hand_seven: true, ..Default::default() };
        let lines = names(&[
            "05_mouth/mouth_01_gadget/pipe.png",
            "05_mouth/mouth_01/plain.png",
            "07_hands/hand_7/hand_7.png",
        ]);
        let once = rules.repair_recipe(lines, &state);
        assert_eq!(once.len(), 2);
        let twice = rules.repair_recipe(once.clone(), &state);
        assert_eq!(once, twice);
    }

    #[test]
    fn repair_without_hand_seven_is_identity() {
        let rules = book();
        let lines = names(&["05_mouth/mouth_01_gadget/pipe.png"]);
        assert_eq!(rules.repair_recipe(lines.clone(), &SelectionState::default()), lines);
    }

    #[test]
    fn tables_round_trip_through_json() {
        let json = serde_json::to_string(&RuleTables::default()).unwrap();
        let back: RuleTables = serde_json::from_str(&json).unwrap();
        assert_eq!(back.head_gadgets.len(), HEAD_GADGETS.len());
        assert!(json.contains("\"y\""));
        RuleBook::compile(&back).unwrap();
    }

    #[test]
    fn bad_glob_is_reported() {
        let mut tables = RuleTables::default();
        tables.excluded_mouths = vec!["mouth_[".into()];
        assert!(matches!(
            RuleBook::compile(&tables),
            Err(GenerateError::Pattern { .. })
        ));
    }
}
