//! Title resolution: match a liked paper's title against the proceedings catalog.
//!
//! Every candidate is scored by the length of its longest common subsequence
//! with the source title, divided by the source title's length. The unit of
//! length ([`ScoreUnit`]) is used for both numerator and denominator.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::CoreError;
use crate::catalog::CatalogEntry;

/// Best scores below this are reported as low-confidence matches.
pub const LOW_CONFIDENCE_THRESHOLD: f64 = 0.6;
/// Best and runner-up scores closer than this are reported as ambiguous.
pub const AMBIGUITY_MARGIN: f64 = 0.1;

/// Unit in which LCS lengths and title lengths are measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreUnit {
    /// UTF-8 bytes. Multi-byte characters can partially match.
    #[default]
    Bytes,
    /// Unicode scalar values.
    Chars,
}

impl ScoreUnit {
    pub fn length(self, s: &str) -> usize {
        match self {
            ScoreUnit::Bytes => s.len(),
            ScoreUnit::Chars => s.chars().count(),
        }
    }

    pub fn lcs(self, a: &str, b: &str) -> usize {
        match self {
            ScoreUnit::Bytes => lcs_len(a.as_bytes(), b.as_bytes()),
            ScoreUnit::Chars => {
                let a: Vec<char> = a.chars().collect();
                let b: Vec<char> = b.chars().collect();
                lcs_len(&a, &b)
            }
        }
    }
}

/// Length of the longest common subsequence of `a` and `b`.
///
/// Two-row dynamic programming, O(len(a) * len(b)) time and
/// O(min(len(a), len(b))) memory.
pub fn lcs_len<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    let (outer, inner) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    if inner.is_empty() {
        return 0;
    }

    let mut prev = vec![0usize; inner.len() + 1];
    let mut curr = vec![0usize; inner.len() + 1];
    for x in outer {
        for (j, y) in inner.iter().enumerate() {
            curr[j + 1] = if x == y {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[inner.len()]
}

/// Fold a title for case- and width-insensitive scoring.
///
/// NFKC, lowercase, and runs of whitespace collapsed to a single space.
pub fn fold_title(title: &str) -> String {
    let folded: String = title.nfkc().collect::<String>().to_lowercase();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Acceptance thresholds for a resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchThresholds {
    pub low_confidence: f64,
    pub ambiguity_margin: f64,
}

impl Default for MatchThresholds {
    fn default() -> Self {
        Self {
            low_confidence: LOW_CONFIDENCE_THRESHOLD,
            ambiguity_margin: AMBIGUITY_MARGIN,
        }
    }
}

/// Diagnostic flags attached to a [`Resolution`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatchFlags {
    pub is_low_confidence: bool,
    pub is_ambiguous: bool,
}

impl MatchThresholds {
    /// Classify a best score and an optional runner-up score.
    ///
    /// Both scores are clamped to `[0.0, 1.0]` first. Without a runner-up
    /// the match is never ambiguous.
    pub fn classify(&self, best: f64, runner_up: Option<f64>) -> MatchFlags {
        let best = best.clamp(0.0, 1.0);
        MatchFlags {
            is_low_confidence: best < self.low_confidence,
            is_ambiguous: runner_up
                .map(|r| best - r.clamp(0.0, 1.0) < self.ambiguity_margin)
                .unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MatchOptions {
    pub unit: ScoreUnit,
    /// Score [`fold_title`]-ed titles instead of the verbatim ones.
    pub fold_titles: bool,
    pub thresholds: MatchThresholds,
}

/// A catalog entry together with its score against one source title.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
    /// Position of the entry in the catalog.
    pub index: usize,
    pub entry: CatalogEntry,
    /// Raw LCS length, in the configured unit.
    pub lcs: usize,
    /// `lcs / length(source title)`, unclamped.
    pub score: f64,
}

/// Outcome of resolving one source title against the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub best_entry: CatalogEntry,
    pub best_index: usize,
    pub best_lcs: usize,
    /// Unclamped normalized score of `best_entry`.
    pub best_score: f64,
    /// Second position of the ranking, if the catalog has more than one entry.
    pub runner_up: Option<RankedCandidate>,
    /// Score of `runner_up`, or 0.0 without one.
    pub runner_up_score: f64,
    pub is_low_confidence: bool,
    pub is_ambiguous: bool,
}

impl Resolution {
    pub fn clamped_best_score(&self) -> f64 {
        self.best_score.clamp(0.0, 1.0)
    }

    /// Neither low-confidence nor ambiguous.
    pub fn is_confident(&self) -> bool {
        !self.is_low_confidence && !self.is_ambiguous
    }
}

/// Score every catalog entry against `source`, in catalog order.
///
/// Returns `(index, lcs, score)` triples. `source` must be non-empty in
/// `unit`.
fn score_candidates(
    source: &str,
    catalog: &[CatalogEntry],
    options: &MatchOptions,
) -> Vec<(usize, usize, f64)> {
    let source_len = options.unit.length(source) as f64;
    catalog
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let candidate = if options.fold_titles {
                Cow::Owned(fold_title(&entry.title))
            } else {
                Cow::Borrowed(entry.title.as_str())
            };
            let lcs = options.unit.lcs(source, &candidate);
            (index, lcs, lcs as f64 / source_len)
        })
        .collect()
}

/// Order scored candidates from best to worst.
///
/// Catalog-order tie-break: the sort is stable, so among equal scores the
/// entry that appears first in the catalog ranks first.
fn rank_candidates(scored: &mut [(usize, usize, f64)]) {
    scored.sort_by(|a, b| b.2.total_cmp(&a.2));
}

/// Resolve `source_title` against `catalog` with the default options.
pub fn resolve(source_title: &str, catalog: &[CatalogEntry]) -> Result<Resolution, CoreError> {
    resolve_with(source_title, catalog, &MatchOptions::default())
}

/// Resolve `source_title` against `catalog`.
///
/// Fails with [`CoreError::InvalidInput`] when the catalog is empty or the
/// source title has zero length in the configured unit.
pub fn resolve_with(
    source_title: &str,
    catalog: &[CatalogEntry],
    options: &MatchOptions,
) -> Result<Resolution, CoreError> {
    if catalog.is_empty() {
        return Err(CoreError::InvalidInput(
            "cannot resolve a title against an empty catalog".to_string(),
        ));
    }

    let source = if options.fold_titles {
        Cow::Owned(fold_title(source_title))
    } else {
        Cow::Borrowed(source_title)
    };
    if options.unit.length(&source) == 0 {
        return Err(CoreError::InvalidInput(
            "cannot resolve an empty title".to_string(),
        ));
    }

    let mut scored = score_candidates(&source, catalog, options);
    rank_candidates(&mut scored);

    let (best_index, best_lcs, best_score) = scored[0];
    let runner_up = scored.get(1).map(|&(index, lcs, score)| RankedCandidate {
        index,
        entry: catalog[index].clone(),
        lcs,
        score,
    });
    let runner_up_score = runner_up.as_ref().map(|c| c.score).unwrap_or(0.0);
    let flags = options
        .thresholds
        .classify(best_score, runner_up.as_ref().map(|c| c.score));

    Ok(Resolution {
        best_entry: catalog[best_index].clone(),
        best_index,
        best_lcs,
        best_score,
        runner_up,
        runner_up_score,
        is_low_confidence: flags.is_low_confidence,
        is_ambiguous: flags.is_ambiguous,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(title: &str, external_id: u32) -> CatalogEntry {
        CatalogEntry {
            title: title.to_string(),
            external_id,
        }
    }

    // =========================================================================
    // LCS
    // =========================================================================

    #[test]
    fn lcs_basic() {
        assert_eq!(lcs_len(b"ABCBDAB", b"BDCABA"), 4);
        assert_eq!(lcs_len(b"abc", b"abc"), 3);
        assert_eq!(lcs_len(b"abc", b"def"), 0);
    }

    #[test]
    fn lcs_empty_side() {
        assert_eq!(lcs_len(b"", b"abc"), 0);
        assert_eq!(lcs_len(b"abc", b""), 0);
    }

    #[test]
    fn lcs_is_symmetric() {
        let a = b"Learning to Rank with Partial Feedback";
        let b = b"learning-to-rank: partial feedback";
        assert_eq!(lcs_len(a, b), lcs_len(b, a));
    }

    #[test]
    fn lcs_subsequence_not_substring() {
        // "ace" is a subsequence of "abcde", not a substring
        assert_eq!(lcs_len(b"ace", b"abcde"), 3);
    }

    // =========================================================================
    // Score units
    // =========================================================================

    #[test]
    fn non_ascii_title_bytes_vs_chars() {
        // "Café Société" is 15 bytes, 12 chars. Against the unaccented
        // spelling the common subsequence is "Caf Socit" in both units.
        let catalog = vec![entry("Cafe Societe", 1)];

        let bytes = resolve("Café Société", &catalog).unwrap();
        assert_eq!(bytes.best_lcs, 9);
        assert_eq!(bytes.best_score, 0.6);

        let options = MatchOptions {
            unit: ScoreUnit::Chars,
            ..Default::default()
        };
        let chars = resolve_with("Café Société", &catalog, &options).unwrap();
        assert_eq!(chars.best_lcs, 9);
        assert_eq!(chars.best_score, 0.75);
    }

    #[test]
    fn byte_unit_matches_shared_lead_bytes() {
        // é = C3 A9, ê = C3 AA: one shared byte, no shared char
        assert_eq!(ScoreUnit::Bytes.lcs("é", "ê"), 1);
        assert_eq!(ScoreUnit::Chars.lcs("é", "ê"), 0);
        assert_eq!(ScoreUnit::Bytes.length("é"), 2);
        assert_eq!(ScoreUnit::Chars.length("é"), 1);
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    #[test]
    fn empty_catalog_is_invalid_input() {
        assert!(matches!(
            resolve("Anything", &[]),
            Err(CoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn empty_title_is_invalid_input() {
        let catalog = vec![entry("Something", 1)];
        assert!(matches!(
            resolve("", &catalog),
            Err(CoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn duplicate_titles_break_ties_by_catalog_order() {
        let catalog = vec![
            entry("Deep Learning for X", 101),
            entry("Shallow Learning for X", 102),
            entry("Deep Learning for X", 103),
        ];
        let resolution = resolve("Deep Learning for X", &catalog).unwrap();

        assert_eq!(resolution.best_entry.external_id, 101);
        assert_eq!(resolution.best_index, 0);
        assert_eq!(resolution.best_score, 1.0);
        assert_eq!(resolution.runner_up_score, 1.0);
        assert_eq!(resolution.runner_up.as_ref().unwrap().entry.external_id, 103);
        assert!(resolution.is_ambiguous);
        assert!(!resolution.is_low_confidence);
    }

    #[test]
    fn exact_title_is_best_and_covers_source() {
        let source = "Bounded Rationality in Repeated Games";
        let catalog = vec![
            entry("Rationality in Games", 1),
            entry("Bounded Rationality in Repeated Games", 2),
            entry("Repeated Games with Bounded Memory", 3),
        ];
        let resolution = resolve(source, &catalog).unwrap();

        assert_eq!(resolution.best_entry.external_id, 2);
        assert_eq!(resolution.best_lcs, source.len());
        assert!(resolution.best_score >= resolution.runner_up_score);
    }

    #[test]
    fn best_entry_comes_from_catalog_and_score_in_range() {
        let catalog = vec![
            entry("Planning with Sketches", 7),
            entry("Sketch-based Planning", 8),
            entry("Completely Unrelated", 9),
        ];
        for title in ["planning", "Sketches!", "zzz", "Planning with Sketches and More"] {
            let resolution = resolve(title, &catalog).unwrap();
            assert!(catalog.contains(&resolution.best_entry));
            let clamped = resolution.clamped_best_score();
            assert!((0.0..=1.0).contains(&clamped));
            assert!(resolution.best_score >= resolution.runner_up_score);
        }
    }

    #[test]
    fn resolve_is_deterministic() {
        let catalog = vec![
            entry("Multi-Agent Path Finding", 1),
            entry("Multi Agent Pathfinding Revisited", 2),
        ];
        let a = resolve("Multi-agent path-finding", &catalog).unwrap();
        let b = resolve("Multi-agent path-finding", &catalog).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn single_entry_catalog_is_not_ambiguous() {
        let catalog = vec![entry("Only Paper", 1)];
        let resolution = resolve("Only Paper", &catalog).unwrap();
        assert!(resolution.runner_up.is_none());
        assert_eq!(resolution.runner_up_score, 0.0);
        assert!(!resolution.is_ambiguous);
    }

    #[test]
    fn score_exactly_at_threshold_is_not_low_confidence() {
        // 6 of 10 bytes in common
        let catalog = vec![entry("abcdefXXXX", 1)];
        let resolution = resolve("abcdefghij", &catalog).unwrap();
        assert_eq!(resolution.best_score, 0.6);
        assert!(!resolution.is_low_confidence);
    }

    #[test]
    fn ambiguity_gap_through_resolve() {
        let source = "a".repeat(100);
        let clear = vec![entry(&"a".repeat(90), 1), entry(&"a".repeat(79), 2)];
        let resolution = resolve(&source, &clear).unwrap();
        assert_eq!(resolution.best_score, 0.9);
        assert_eq!(resolution.runner_up_score, 0.79);
        assert!(!resolution.is_ambiguous);

        let close = vec![entry(&"a".repeat(82), 1), entry(&"a".repeat(90), 2)];
        let resolution = resolve(&source, &close).unwrap();
        assert_eq!(resolution.best_entry.external_id, 2);
        assert!(resolution.is_ambiguous);
    }

    #[test]
    fn low_confidence_and_ambiguous_together() {
        let catalog = vec![entry("xyz", 1), entry("xyw", 2)];
        let resolution = resolve("Completely different", &catalog).unwrap();
        assert!(resolution.is_low_confidence);
        assert!(resolution.is_ambiguous);
        assert!(!resolution.is_confident());
    }

    #[test]
    fn folding_ignores_case_and_spacing() {
        let catalog = vec![
            entry("DEEP  LEARNING for x", 1),
            entry("Deep Learners", 2),
        ];
        let verbatim = resolve("Deep Learning for X", &catalog).unwrap();
        let options = MatchOptions {
            fold_titles: true,
            ..Default::default()
        };
        let folded = resolve_with("Deep Learning for X", &catalog, &options).unwrap();

        assert_eq!(folded.best_entry.external_id, 1);
        assert_eq!(folded.best_score, 1.0);
        assert!(folded.best_score > verbatim.best_score);
    }

    #[test]
    fn fold_title_normalizes() {
        assert_eq!(fold_title("  Ｆｕｌｌwidth\tTitle  "), "fullwidth title");
    }

    // =========================================================================
    // Thresholds
    // =========================================================================

    #[test]
    fn classify_low_confidence_boundary() {
        let t = MatchThresholds::default();
        assert!(!t.classify(0.6, None).is_low_confidence);
        assert!(t.classify(0.599999, None).is_low_confidence);
    }

    #[test]
    fn classify_ambiguity_boundary() {
        let t = MatchThresholds::default();
        assert!(!t.classify(0.90, Some(0.79)).is_ambiguous);
        assert!(t.classify(0.90, Some(0.82)).is_ambiguous);
    }

    #[test]
    fn classify_clamps_scores() {
        let t = MatchThresholds::default();
        // 1.3 clamps to 1.0, so a 0.95 runner-up is within the margin
        assert!(t.classify(1.3, Some(0.95)).is_ambiguous);
        assert!(!t.classify(1.3, None).is_low_confidence);
    }
}
