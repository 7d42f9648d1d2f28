use crate::locator::LocatorKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One algorithm for resolving a locator to an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// The primary query, accepted only when it matches exactly one element
    Exact,
    /// Best attribute-matcher score among same-family elements
    AttributeSimilarity,
    /// Exact visible-text equality, shallowest element wins
    Text,
    /// Query proposed by the external suggestion provider
    AiSuggestion,
}

impl StrategyKind {
    /// Fixed priority order of the chain
    pub const ORDER: [StrategyKind; 4] = [
        StrategyKind::Exact,
        StrategyKind::AttributeSimilarity,
        StrategyKind::Text,
        StrategyKind::AiSuggestion,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::Exact => "exact",
            StrategyKind::AttributeSimilarity => "attribute_similarity",
            StrategyKind::Text => "text",
            StrategyKind::AiSuggestion => "ai_suggestion",
        }
    }

    /// Whether a hit by this strategy counts as a healing
    pub fn is_healing(&self) -> bool {
        !matches!(self, StrategyKind::Exact)
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An element a strategy accepted, with how and how confidently
#[derive(Debug, Clone)]
pub struct ScoredCandidate<E> {
    pub element: E,
    /// Confidence in `[0, 1]`
    pub score: f64,
    pub matched_by: StrategyKind,
    /// A query that finds this element on the current page
    pub query: String,
    /// How `query` is to be interpreted
    pub kind: LocatorKind,
}
