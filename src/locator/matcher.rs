//! Attribute matcher: scores how well an element matches remembered attributes

use crate::config::MatchWeights;
use crate::locator::page::ElementHandle;
use crate::locator::spec::{Expectations, LocatorSpec};

/// Weighted partial-match scorer
///
/// The score is the weight of the satisfied expectations divided by the
/// weight of the declared ones, so it always lies in `[0, 1]` and a spec
/// declaring only an id scores 1.0 on an id match. Absent attributes are
/// non-matches, never errors.
#[derive(Debug, Clone)]
pub struct AttributeMatcher {
    weights: MatchWeights,
    aria_threshold: f64,
}

impl Default for AttributeMatcher {
    fn default() -> Self {
        Self::new(MatchWeights::default(), 0.8)
    }
}

impl AttributeMatcher {
    pub fn new(weights: MatchWeights, aria_threshold: f64) -> Self {
        Self {
            weights,
            aria_threshold,
        }
    }

    /// Score one element against a spec
    pub fn score<E: ElementHandle>(&self, spec: &LocatorSpec, element: &E) -> f64 {
        self.score_expectations(&spec.expectations(), element)
    }

    /// Score against precomputed expectations (hot loop of the attribute strategy)
    pub fn score_expectations<E: ElementHandle>(&self, expected: &Expectations, element: &E) -> f64 {
        let w = &self.weights;
        let mut declared = 0.0;
        let mut achieved = 0.0;

        if let Some(id) = &expected.id {
            declared += w.id.max(0.0);
            if element.attribute("id").as_deref() == Some(id.as_str()) {
                achieved += w.id.max(0.0);
            }
        }

        if let Some(test_id) = &expected.test_id {
            declared += w.test_id.max(0.0);
            if element.attribute("data-testid").as_deref() == Some(test_id.as_str()) {
                achieved += w.test_id.max(0.0);
            }
        }

        if let Some(label) = &expected.aria_label {
            declared += w.aria_label.max(0.0);
            let similar = element
                .attribute("aria-label")
                .is_some_and(|actual| label_similarity(label, &actual) >= self.aria_threshold);
            if similar {
                achieved += w.aria_label.max(0.0);
            }
        }

        if let Some(text) = &expected.text {
            declared += w.text.max(0.0);
            if element.text().to_lowercase().contains(&text.to_lowercase()) {
                achieved += w.text.max(0.0);
            }
        }

        if declared <= 0.0 {
            return 0.0;
        }
        (achieved / declared).clamp(0.0, 1.0)
    }
}

fn label_similarity(expected: &str, actual: &str) -> f64 {
    jaro_winkler(&expected.trim().to_lowercase(), &actual.trim().to_lowercase())
}

/// Jaro-Winkler similarity in `[0, 1]` (prefix scale 0.1, prefix up to 4)
pub fn jaro_winkler(a: &str, b: &str) -> f64 {
    let sim = jaro(a, b);
    let prefix = a
        .chars()
        .zip(b.chars())
        .take(4)
        .take_while(|(x, y)| x == y)
        .count();
    sim + prefix as f64 * 0.1 * (1.0 - sim)
}

fn jaro(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let window = (a.len().max(b.len()) / 2).saturating_sub(1);
    let mut a_matched = vec![false; a.len()];
    let mut b_matched = vec![false; b.len()];
    let mut matches = 0usize;

    for i in 0..a.len() {
        let lo = i.saturating_sub(window);
        let hi = (i + window + 1).min(b.len());
        for j in lo..hi {
            if !b_matched[j] && a[i] == b[j] {
                a_matched[i] = true;
                b_matched[j] = true;
                matches += 1;
                break;
            }
        }
    }

    if matches == 0 {
        return 0.0;
    }

    let mut transpositions = 0usize;
    let mut k = 0;
    for i in 0..a.len() {
        if !a_matched[i] {
            continue;
        }
        while !b_matched[k] {
            k += 1;
        }
        if a[i] != b[k] {
            transpositions += 1;
        }
        k += 1;
    }

    let m = matches as f64;
    (m / a.len() as f64 + m / b.len() as f64 + (m - transpositions as f64 / 2.0) / m) / 3.0
}
