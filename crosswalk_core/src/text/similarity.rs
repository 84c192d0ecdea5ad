//! Pairwise string-collection matching.
//!
//! Three methodologies share one output shape:
//! - cosine: trigram TF-IDF vectors, full pairwise cosine matrix, optimal
//!   one-to-one assignment (never greedy argmax — two near-identical names
//!   must not compete for the same best candidate);
//! - fuzzy: jaro-winkler score matrix with the same optimal assignment;
//! - naive: normalized whole-string equality, then token-set containment.

use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use strsim::jaro_winkler;

use super::assignment::max_weight_assignment;
use super::{n_grams, normalize};
use crate::error::{Result, SyncError};
use crate::frame::Value;

/// Element-wise string normalizer applied before vectorization.
pub type Normalizer = fn(&str) -> String;

/// One matched pair of strings with its similarity score in `[0, 1]`.
///
/// `input1`/`input2` are the original, pre-normalization strings so callers
/// can map matches back to their source rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityMatch {
    pub input1: String,
    pub input1_normalized: String,
    pub input2: String,
    pub input2_normalized: String,
    pub similarity: f64,
}

/// TF-IDF vector space over a trigram corpus, mirroring the smoothed-idf,
/// L2-normalized formulation of the usual text vectorizers.
struct TfidfModel {
    vocab: FxHashMap<String, usize>,
    idf: Vec<f64>,
}

impl TfidfModel {
    fn fit(docs: &[Vec<String>]) -> Self {
        let mut vocab: FxHashMap<String, usize> = FxHashMap::default();
        let mut df: Vec<usize> = Vec::new();
        for doc in docs {
            let mut seen: FxHashSet<&str> = FxHashSet::default();
            for term in doc {
                if seen.insert(term) {
                    let next = vocab.len();
                    let slot = *vocab.entry(term.clone()).or_insert(next);
                    if slot == df.len() {
                        df.push(0);
                    }
                    df[slot] += 1;
                }
            }
        }
        let n = docs.len() as f64;
        let idf = df
            .iter()
            .map(|&d| ((1.0 + n) / (1.0 + d as f64)).ln() + 1.0)
            .collect();
        Self { vocab, idf }
    }

    /// Sparse L2-normalized vector, term indices ascending.
    fn transform(&self, doc: &[String]) -> Vec<(usize, f64)> {
        let mut counts: FxHashMap<usize, f64> = FxHashMap::default();
        for term in doc {
            if let Some(&slot) = self.vocab.get(term) {
                *counts.entry(slot).or_insert(0.0) += 1.0;
            }
        }
        let mut vector: Vec<(usize, f64)> = counts
            .into_iter()
            .map(|(slot, tf)| (slot, tf * self.idf[slot]))
            .collect();
        vector.sort_unstable_by_key(|&(slot, _)| slot);
        let norm = vector.iter().map(|&(_, w)| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, w) in &mut vector {
                *w /= norm;
            }
        }
        vector
    }
}

fn sparse_dot(a: &[(usize, f64)], b: &[(usize, f64)]) -> f64 {
    let mut sum = 0.0;
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                sum += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    sum
}

fn non_null_strings(values: &[Value], what: &str) -> Result<Vec<String>> {
    let strings: Vec<String> = values.iter().filter_map(Value::to_text).collect();
    if strings.is_empty() {
        return Err(SyncError::EmptyInput {
            what: what.to_string(),
        });
    }
    Ok(strings)
}

fn build_matches(
    raw1: &[String],
    norm1: &[String],
    raw2: &[String],
    norm2: &[String],
    matrix: &[Vec<f64>],
) -> Vec<SimilarityMatch> {
    max_weight_assignment(matrix)
        .into_iter()
        .map(|(r, c)| SimilarityMatch {
            input1: raw1[c].clone(),
            input1_normalized: norm1[c].clone(),
            input2: raw2[r].clone(),
            input2_normalized: norm2[r].clone(),
            similarity: matrix[r][c],
        })
        .collect()
}

/// Cosine-similarity matching with the generic normalizer.
pub fn cosine_similarity_match(input1: &[Value], input2: &[Value]) -> Result<Vec<SimilarityMatch>> {
    cosine_similarity_match_with(normalize, input1, input2)
}

/// Cosine-similarity matching with a caller-chosen normalizer (the team
/// matcher passes [`super::normalize_team_name`]).
///
/// Null entries are dropped from both inputs first; it is an error for either
/// side to end up empty. The TF-IDF space is fitted on the union of both
/// normalized corpora, the cosine matrix is computed with rows = `input2` and
/// columns = `input1`, and the optimal assignment yields one match row per
/// assigned pair.
pub fn cosine_similarity_match_with(
    normalizer: Normalizer,
    input1: &[Value],
    input2: &[Value],
) -> Result<Vec<SimilarityMatch>> {
    let raw1 = non_null_strings(input1, "input1")?;
    let raw2 = non_null_strings(input2, "input2")?;
    let norm1: Vec<String> = raw1.iter().map(|s| normalizer(s)).collect();
    let norm2: Vec<String> = raw2.iter().map(|s| normalizer(s)).collect();

    let docs1: Vec<Vec<String>> = norm1
        .iter()
        .map(|s| n_grams(s, 3))
        .collect::<Result<_>>()?;
    let docs2: Vec<Vec<String>> = norm2
        .iter()
        .map(|s| n_grams(s, 3))
        .collect::<Result<_>>()?;

    let corpus: Vec<Vec<String>> = docs1.iter().chain(docs2.iter()).cloned().collect();
    let model = TfidfModel::fit(&corpus);

    let vectors1: Vec<Vec<(usize, f64)>> = docs1.iter().map(|d| model.transform(d)).collect();
    let vectors2: Vec<Vec<(usize, f64)>> = docs2.iter().map(|d| model.transform(d)).collect();

    let matrix: Vec<Vec<f64>> = vectors2
        .par_iter()
        .map(|v2| vectors1.iter().map(|v1| sparse_dot(v2, v1)).collect())
        .collect();

    Ok(build_matches(&raw1, &norm1, &raw2, &norm2, &matrix))
}

/// Jaro-winkler matching over normalized strings, with the same
/// optimal-assignment pairing policy as the cosine methodology.
pub fn fuzzy_similarity_match(input1: &[Value], input2: &[Value]) -> Result<Vec<SimilarityMatch>> {
    let raw1 = non_null_strings(input1, "input1")?;
    let raw2 = non_null_strings(input2, "input2")?;
    let norm1: Vec<String> = raw1.iter().map(|s| normalize(s)).collect();
    let norm2: Vec<String> = raw2.iter().map(|s| normalize(s)).collect();

    let matrix: Vec<Vec<f64>> = norm2
        .par_iter()
        .map(|s2| norm1.iter().map(|s1| jaro_winkler(s1, s2)).collect())
        .collect();

    Ok(build_matches(&raw1, &norm1, &raw2, &norm2, &matrix))
}

/// Token-set matching: first normalized whole-string equality, then
/// whitespace-token-set containment in either direction (nickname vs full
/// name). Greedy, first-found-wins by input order; each string is consumed by
/// at most one match.
pub fn naive_token_match(input1: &[Value], input2: &[Value]) -> Result<Vec<SimilarityMatch>> {
    let raw1 = non_null_strings(input1, "input1")?;
    let raw2 = non_null_strings(input2, "input2")?;
    let norm1: Vec<String> = raw1.iter().map(|s| normalize(s)).collect();
    let norm2: Vec<String> = raw2.iter().map(|s| normalize(s)).collect();

    let tokens1: Vec<FxHashSet<&str>> = norm1
        .iter()
        .map(|s| s.split_whitespace().collect())
        .collect();
    let tokens2: Vec<FxHashSet<&str>> = norm2
        .iter()
        .map(|s| s.split_whitespace().collect())
        .collect();

    let mut used1 = vec![false; norm1.len()];
    let mut used2 = vec![false; norm2.len()];
    let mut matches = Vec::new();

    let mut push = |i: usize, j: usize, used1: &mut Vec<bool>, used2: &mut Vec<bool>| {
        used1[i] = true;
        used2[j] = true;
        matches.push(SimilarityMatch {
            input1: raw1[i].clone(),
            input1_normalized: norm1[i].clone(),
            input2: raw2[j].clone(),
            input2_normalized: norm2[j].clone(),
            similarity: 1.0,
        });
    };

    // Sub-pass 1: exact normalized equality.
    for i in 0..norm1.len() {
        if used1[i] {
            continue;
        }
        let found = (0..norm2.len()).find(|&j| !used2[j] && norm1[i] == norm2[j]);
        if let Some(j) = found {
            push(i, j, &mut used1, &mut used2);
        }
    }

    // Sub-pass 2: one token set contains the other.
    for i in 0..norm1.len() {
        if used1[i] {
            continue;
        }
        let found = (0..norm2.len()).find(|&j| {
            !used2[j]
                && !tokens1[i].is_empty()
                && !tokens2[j].is_empty()
                && (tokens1[i].is_subset(&tokens2[j]) || tokens2[j].is_subset(&tokens1[i]))
        });
        if let Some(j) = found {
            push(i, j, &mut used1, &mut used2);
        }
    }

    Ok(matches)
}
