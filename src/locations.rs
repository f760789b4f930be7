//! Location resolution against Taiwan's county-level administrative units
//!
//! Place names arrive in two interchangeable glyph conventions: the
//! traditional `臺` and the everyday shorthand `台` (臺北市 vs 台北市
//! name the same city). Resolution folds the shorthand glyph to the
//! canonical form before lookup, so matching stays a deterministic
//! table lookup rather than fuzzy string similarity.

use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Glyph substitution applied before any lookup. Narrow and enumerable:
/// only the 台/臺 pair is interchangeable in administrative names.
const VARIANT_FOLD: &[(char, char)] = &[('台', '臺')];

/// Administrative suffixes stripped for the relaxed second-pass match
const ADMIN_SUFFIXES: &[char] = &['市', '縣', '區', '鄉', '鎮'];

/// Kind of administrative unit a name resolved to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationKind {
    /// County-level division (includes the special municipalities)
    County,
    /// Township or city district
    District,
    /// Observation station
    Station,
}

/// A place name resolved to its canonical form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedLocation {
    /// Fixed-convention name used internally and toward the upstream API
    pub canonical_name: &'static str,
    /// What kind of unit the name denotes
    pub kind: LocationKind,
}

/// Outcome of resolving a batch of user-supplied place names.
///
/// An empty input yields empty `matched` *and* empty `unmatched`, which
/// callers must treat as "no location filter" rather than "nothing
/// matched".
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Names that resolved, in first-seen input order
    pub matched: Vec<ResolvedLocation>,
    /// Inputs that resolved to nothing, verbatim as supplied
    pub unmatched: Vec<String>,
}

/// The 22 county-level divisions CWA datasets report against.
/// Canonical convention is the traditional 臺 glyph.
const COUNTY_TABLE: &[&str] = &[
    "臺北市",
    "新北市",
    "桃園市",
    "臺中市",
    "臺南市",
    "高雄市",
    "基隆市",
    "新竹市",
    "嘉義市",
    "新竹縣",
    "苗栗縣",
    "彰化縣",
    "南投縣",
    "雲林縣",
    "嘉義縣",
    "屏東縣",
    "宜蘭縣",
    "花蓮縣",
    "臺東縣",
    "澎湖縣",
    "金門縣",
    "連江縣",
];

/// Resolves user-supplied place names to canonical administrative units.
///
/// The reference table and its alias index are built once and never
/// mutated afterwards, so the resolver is safe to share across
/// concurrent queries.
#[derive(Debug)]
pub struct LocationResolver {
    /// Folded alias -> index into `COUNTY_TABLE`. Every key maps to
    /// exactly one entry; stems shared by several entries (新竹, 嘉義)
    /// are excluded rather than resolved arbitrarily.
    index: HashMap<String, usize>,
}

impl LocationResolver {
    /// Build the resolver from the static reference table
    #[must_use]
    pub fn new() -> Self {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut ambiguous: HashSet<String> = HashSet::new();

        for (i, canonical) in COUNTY_TABLE.iter().enumerate() {
            // Canonical names are already in folded form and unique.
            index.insert((*canonical).to_string(), i);

            let stem = strip_admin_suffix(canonical);
            if stem == *canonical {
                continue;
            }
            match index.get(&stem) {
                Some(&existing) if existing != i => {
                    ambiguous.insert(stem);
                }
                Some(_) => {}
                None => {
                    index.insert(stem, i);
                }
            }
        }

        for stem in &ambiguous {
            index.remove(stem);
            debug!(stem = %stem, "dropping ambiguous suffix-stripped alias");
        }

        Self { index }
    }

    /// Resolve a batch of place names.
    ///
    /// Each name is variant-folded, matched exactly, then retried with
    /// its administrative suffix stripped. Misses are reported in
    /// `unmatched` instead of failing the batch; the caller decides
    /// whether that invalidates the query. Duplicates (after folding)
    /// are resolved once.
    #[must_use]
    pub fn resolve(&self, names: &[String]) -> Resolution {
        let mut resolution = Resolution::default();
        let mut seen_inputs: HashSet<String> = HashSet::new();
        let mut seen_canonical: HashSet<&'static str> = HashSet::new();

        for name in names {
            let folded = fold_variants(name.trim());
            if !seen_inputs.insert(folded.clone()) {
                continue;
            }
            if folded.is_empty() {
                // A blank name is a miss, not an absent filter
                warn!(name = %name, "blank place name cannot resolve");
                resolution.unmatched.push(name.clone());
                continue;
            }

            match self.lookup(&folded) {
                Some(resolved) => {
                    if seen_canonical.insert(resolved.canonical_name) {
                        resolution.matched.push(resolved);
                    }
                }
                None => {
                    warn!(name = %name, "place name did not resolve");
                    resolution.unmatched.push(name.clone());
                }
            }
        }

        resolution
    }

    /// Single-name lookup: exact match wins over the suffix-stripped one
    fn lookup(&self, folded: &str) -> Option<ResolvedLocation> {
        if let Some(&i) = self.index.get(folded) {
            return Some(Self::entry(i));
        }

        let stem = strip_admin_suffix(folded);
        if stem != folded {
            if let Some(&i) = self.index.get(&stem) {
                return Some(Self::entry(i));
            }
        }

        None
    }

    fn entry(i: usize) -> ResolvedLocation {
        ResolvedLocation {
            canonical_name: COUNTY_TABLE[i],
            kind: LocationKind::County,
        }
    }

    /// Canonical names of every known unit, in table order
    #[must_use]
    pub fn known_locations(&self) -> &'static [&'static str] {
        COUNTY_TABLE
    }
}

impl Default for LocationResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Fold interchangeable glyph variants to the canonical convention
#[must_use]
pub fn fold_variants(name: &str) -> String {
    name.chars()
        .map(|c| {
            VARIANT_FOLD
                .iter()
                .find(|(from, _)| *from == c)
                .map_or(c, |(_, to)| *to)
        })
        .collect()
}

/// Drop one trailing administrative suffix character, if present
fn strip_admin_suffix(name: &str) -> String {
    let mut chars: Vec<char> = name.chars().collect();
    if let Some(last) = chars.last() {
        if ADMIN_SUFFIXES.contains(last) && chars.len() > 1 {
            chars.pop();
        }
    }
    chars.into_iter().collect()
}
