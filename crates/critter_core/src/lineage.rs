//! Kinship, alliances and naming.
//!
//! Kinship is a relation on family colors: two agents are kin when they
//! share a color or when an alliance between their two colors has been
//! recorded. Alliances are one hop only; if red allies with green and
//! green with blue, red and blue are still rivals.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::entities::{FamilyColor, Temperament};
use crate::math::Fixed;
use crate::rng::RandomSource;

/// Symmetric, append-only record of allied family colors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllianceTable {
    links: BTreeMap<FamilyColor, BTreeSet<FamilyColor>>,
}

impl AllianceTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an alliance in both directions.
    ///
    /// Returns `true` if the pair was not allied before. Allying a color
    /// with itself is a no-op.
    pub fn record(&mut self, a: FamilyColor, b: FamilyColor) -> bool {
        if a == b {
            return false;
        }
        let fresh = self.links.entry(a).or_default().insert(b);
        self.links.entry(b).or_default().insert(a);
        fresh
    }

    /// True if an alliance between the two colors was recorded.
    #[must_use]
    pub fn are_allied(&self, a: FamilyColor, b: FamilyColor) -> bool {
        self.links.get(&a).is_some_and(|set| set.contains(&b))
    }

    /// Same family or directly allied.
    #[must_use]
    pub fn is_kin(&self, a: FamilyColor, b: FamilyColor) -> bool {
        a == b || self.are_allied(a, b)
    }

    /// Colors allied with `color`, in sorted order.
    pub fn allies_of(&self, color: FamilyColor) -> impl Iterator<Item = FamilyColor> + '_ {
        self.links.get(&color).into_iter().flatten().copied()
    }

    /// Every alliance once, as `(smaller, larger)` pairs in sorted order.
    pub fn pairs(&self) -> impl Iterator<Item = (FamilyColor, FamilyColor)> + '_ {
        self.links
            .iter()
            .flat_map(|(a, set)| set.iter().map(move |b| (*a, *b)))
            .filter(|(a, b)| a < b)
    }

    /// Number of distinct alliances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs().count()
    }

    /// True if no alliance was ever recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

/// True if greed, territorial desire and curiosity all differ by at most
/// `tolerance`.
#[must_use]
pub fn traits_compatible(a: &Temperament, b: &Temperament, tolerance: Fixed) -> bool {
    (a.greed - b.greed).abs() <= tolerance
        && (a.territorial - b.territorial).abs() <= tolerance
        && (a.curiosity - b.curiosity).abs() <= tolerance
}

const CONSONANTS: &[u8] = b"BCDFGHJKLMNPRSTVWZ";
const VOWELS: &[u8] = b"aeiou";

/// Issues short, pronounceable, world-unique first names.
#[derive(Debug, Clone, Default)]
pub struct NameGenerator {
    issued: HashSet<String>,
    /// Next numeric suffix to try per two-letter base.
    next_suffix: HashMap<String, u32>,
}

impl NameGenerator {
    /// Create a generator with no names issued.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Roll a consonant-vowel name such as `"Ba"`.
    ///
    /// A name that was already issued gets the next numeric suffix for its
    /// base (`"Ba2"`, `"Ba3"`, ...), so names of the dead are never reused.
    pub fn generate(&mut self, rng: &mut impl RandomSource) -> String {
        let consonant = CONSONANTS[rng.index(CONSONANTS.len())] as char;
        let vowel = VOWELS[rng.index(VOWELS.len())] as char;
        let base = format!("{consonant}{vowel}");

        let mut name = base.clone();
        if self.issued.contains(&name) {
            let next = self.next_suffix.entry(base.clone()).or_insert(2);
            loop {
                name = format!("{base}{next}");
                *next += 1;
                // Only explicitly reserved names can already hold a suffix.
                if !self.issued.contains(&name) {
                    break;
                }
            }
        }
        self.issued.insert(name.clone());
        name
    }

    /// Mark a name as taken (for agents spawned with an explicit name).
    ///
    /// Returns `false` if it was already taken.
    pub fn reserve(&mut self, name: &str) -> bool {
        self.issued.insert(name.to_string())
    }

    /// Number of names issued so far.
    #[must_use]
    pub fn issued(&self) -> usize {
        self.issued.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::percent;
    use crate::rng::{ScriptedRng, SeededRng};

    const RED: FamilyColor = FamilyColor::new(255, 0, 0);
    const GREEN: FamilyColor = FamilyColor::new(0, 255, 0);
    const BLUE: FamilyColor = FamilyColor::new(0, 0, 255);

    fn temperament(greed: i32, territorial: i32, curiosity: i32) -> Temperament {
        Temperament {
            greed: percent(greed),
            curiosity: percent(curiosity),
            territorial: percent(territorial),
            legacy_desire: percent(100),
            bravery: percent(50),
        }
    }

    #[test]
    fn test_alliance_is_symmetric() {
        let mut table = AllianceTable::new();
        assert!(table.record(RED, GREEN));
        assert!(table.are_allied(RED, GREEN));
        assert!(table.are_allied(GREEN, RED));
        assert!(!table.record(GREEN, RED), "second record is not fresh");
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_kinship_is_not_transitive() {
        let mut table = AllianceTable::new();
        table.record(RED, GREEN);
        table.record(GREEN, BLUE);
        assert!(table.is_kin(RED, GREEN));
        assert!(table.is_kin(GREEN, BLUE));
        assert!(!table.is_kin(RED, BLUE));
        assert!(table.is_kin(BLUE, BLUE));
    }

    #[test]
    fn test_self_alliance_ignored() {
        let mut table = AllianceTable::new();
        assert!(!table.record(RED, RED));
        assert!(table.is_empty());
    }

    #[test]
    fn test_allies_of_lists_partners() {
        let mut table = AllianceTable::new();
        table.record(RED, GREEN);
        table.record(RED, BLUE);
        let allies: Vec<_> = table.allies_of(RED).collect();
        assert_eq!(allies.len(), 2);
        assert!(allies.contains(&GREEN) && allies.contains(&BLUE));
    }

    #[test]
    fn test_traits_compatible_boundary() {
        let tolerance = percent(50);
        let a = temperament(100, 100, 100);
        assert!(traits_compatible(&a, &temperament(150, 50, 100), tolerance));
        assert!(!traits_compatible(&a, &temperament(151, 100, 100), tolerance));
        assert!(!traits_compatible(&a, &temperament(100, 100, 40), tolerance));
    }

    #[test]
    fn test_names_are_capitalised_pairs() {
        let mut names = NameGenerator::new();
        let mut rng = ScriptedRng::constant(Fixed::ZERO);
        assert_eq!(names.generate(&mut rng), "Ba");
    }

    #[test]
    fn test_name_collisions_get_suffix() {
        let mut names = NameGenerator::new();
        let mut rng = ScriptedRng::constant(Fixed::ZERO);
        assert_eq!(names.generate(&mut rng), "Ba");
        assert_eq!(names.generate(&mut rng), "Ba2");
        assert_eq!(names.generate(&mut rng), "Ba3");
        assert!(!names.reserve("Ba2"));
    }

    #[test]
    fn test_suffix_skips_reserved_names() {
        let mut names = NameGenerator::new();
        let mut rng = ScriptedRng::constant(Fixed::ZERO);
        assert!(names.reserve("Ba"));
        assert!(names.reserve("Ba2"));
        assert_eq!(names.generate(&mut rng), "Ba3");
        assert_eq!(names.generate(&mut rng), "Ba4");
        assert_eq!(names.issued(), 4);
    }

    #[test]
    fn test_generated_names_unique() {
        let mut names = NameGenerator::new();
        let mut rng = SeededRng::new(11);
        let mut seen = HashSet::new();
        for _ in 0..300 {
            assert!(seen.insert(names.generate(&mut rng)));
        }
        assert_eq!(names.issued(), 300);
    }
}
