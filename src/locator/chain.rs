//! Strategy chain: tries each resolution strategy in priority order

use crate::config::ResolverConfig;
use crate::dom::TagFamily;
use crate::error::{ResolveError, SuggestError};
use crate::locator::matcher::AttributeMatcher;
use crate::locator::page::{ElementHandle, PageSnapshot};
use crate::locator::spec::{LocatorKind, LocatorSpec};
use crate::locator::strategy::{ScoredCandidate, StrategyKind};
use crate::locator::suggest::{SuggestionProvider, SuggestionRequest};
use log::{debug, warn};
use std::sync::Arc;

/// Tolerance for threshold comparisons; scores are sums of float weights
const SCORE_EPSILON: f64 = 1e-9;

/// Ordered, sequential strategy evaluation
///
/// Strategies never run in parallel: the cheap deterministic ones go first
/// and the suggestion provider is only consulted once they all missed.
#[derive(Clone)]
pub struct StrategyChain {
    config: ResolverConfig,
    matcher: AttributeMatcher,
    suggester: Option<Arc<dyn SuggestionProvider>>,
}

impl StrategyChain {
    pub fn new(config: ResolverConfig) -> Self {
        let matcher = AttributeMatcher::new(config.weights, config.aria_similarity_threshold);
        Self {
            config,
            matcher,
            suggester: None,
        }
    }

    /// Builder method: enable the AI suggestion strategy
    pub fn with_suggester(mut self, suggester: Arc<dyn SuggestionProvider>) -> Self {
        self.suggester = Some(suggester);
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Run every strategy in order and return the first accepted candidate
    pub async fn resolve<'p, P: PageSnapshot>(
        &self,
        spec: &LocatorSpec,
        page: &'p P,
    ) -> Result<ScoredCandidate<P::Element<'p>>, ResolveError> {
        for strategy in StrategyKind::ORDER {
            if let Some(candidate) = self.attempt(strategy, spec, page).await? {
                return Ok(candidate);
            }
        }

        Err(ResolveError::ElementNotFound {
            locator_id: spec.locator_id(),
            query: spec.primary_query().to_string(),
        })
    }

    /// Run a single strategy. `Ok(None)` is a miss.
    pub async fn attempt<'p, P: PageSnapshot>(
        &self,
        strategy: StrategyKind,
        spec: &LocatorSpec,
        page: &'p P,
    ) -> Result<Option<ScoredCandidate<P::Element<'p>>>, ResolveError> {
        let result = match strategy {
            StrategyKind::Exact => self.exact(spec, page)?,
            StrategyKind::AttributeSimilarity => self.attribute_similarity(spec, page),
            StrategyKind::Text => self.text_match(spec, page),
            StrategyKind::AiSuggestion => self.ai_suggestion(spec, page).await,
        };

        if result.is_none() {
            debug!("Strategy {} missed for locator '{}'", strategy, spec.locator_id());
        }
        Ok(result)
    }

    fn exact<'p, P: PageSnapshot>(
        &self,
        spec: &LocatorSpec,
        page: &'p P,
    ) -> Result<Option<ScoredCandidate<P::Element<'p>>>, ResolveError> {
        let mut found = page.query_all(spec.kind(), spec.primary_query())?;

        match found.len() {
            0 => Ok(None),
            1 => Ok(found.pop().map(|element| ScoredCandidate {
                element,
                score: 1.0,
                matched_by: StrategyKind::Exact,
                query: spec.primary_query().to_string(),
                kind: spec.kind(),
            })),
            count if self.config.strict => Err(ResolveError::AmbiguousMatch {
                query: spec.primary_query().to_string(),
                count,
            }),
            count => {
                debug!(
                    "Primary query '{}' is ambiguous ({} matches), falling through",
                    spec.primary_query(),
                    count
                );
                Ok(None)
            }
        }
    }

    fn attribute_similarity<'p, P: PageSnapshot>(
        &self,
        spec: &LocatorSpec,
        page: &'p P,
    ) -> Option<ScoredCandidate<P::Element<'p>>> {
        let expectations = spec.expectations();
        if expectations.is_empty() {
            return None;
        }
        let family = spec.tag_hint().map(|tag| TagFamily::of(&tag));

        let mut best: Option<(P::Element<'p>, f64)> = None;
        for element in page.elements() {
            if family.is_some_and(|f| TagFamily::of(&element.tag_name()) != f) {
                continue;
            }
            let score = self.matcher.score_expectations(&expectations, &element);
            // strict comparison keeps the first element in document order on ties
            if best.as_ref().is_none_or(|(_, top)| score > *top) {
                best = Some((element, score));
            }
        }

        let (element, score) = best?;
        if score + SCORE_EPSILON < self.config.attribute_threshold {
            debug!(
                "Best attribute score {:.2} below threshold {:.2}",
                score, self.config.attribute_threshold
            );
            return None;
        }

        Some(ScoredCandidate {
            query: element.unique_selector(),
            kind: LocatorKind::Css,
            element,
            score,
            matched_by: StrategyKind::AttributeSimilarity,
        })
    }

    fn text_match<'p, P: PageSnapshot>(
        &self,
        spec: &LocatorSpec,
        page: &'p P,
    ) -> Option<ScoredCandidate<P::Element<'p>>> {
        let expected = spec.expected_text()?.trim();
        if expected.is_empty() {
            return None;
        }

        let matches: Vec<_> = page
            .elements()
            .into_iter()
            .filter(|element| element.text().trim() == expected)
            .collect();
        let count = matches.len();

        // min_by_key keeps the first of equally shallow elements
        let element = matches.into_iter().min_by_key(|element| element.depth())?;

        Some(ScoredCandidate {
            query: element.unique_selector(),
            kind: LocatorKind::Css,
            element,
            score: 1.0 / count as f64,
            matched_by: StrategyKind::Text,
        })
    }

    /// Consults the provider at most once per call
    async fn ai_suggestion<'p, P: PageSnapshot>(
        &self,
        spec: &LocatorSpec,
        page: &'p P,
    ) -> Option<ScoredCandidate<P::Element<'p>>> {
        let Some(suggester) = &self.suggester else {
            debug!("No suggestion provider configured");
            return None;
        };

        let timeout = self.config.suggestion_timeout_duration();
        let request = SuggestionRequest {
            description: spec.describe(),
            markup: page.raw_markup(),
            timeout,
        };

        let suggestion = match tokio::time::timeout(timeout, suggester.suggest(request)).await {
            Ok(Ok(suggestion)) => suggestion,
            Ok(Err(SuggestError::Timeout(elapsed))) => {
                warn!(
                    "Suggestion provider for locator '{}' gave up after {:?}",
                    spec.locator_id(),
                    elapsed
                );
                return None;
            }
            Err(_) => {
                warn!(
                    "Suggestion for locator '{}' timed out after {:?}",
                    spec.locator_id(),
                    timeout
                );
                return None;
            }
            Ok(Err(e)) => {
                warn!("Suggestion provider failed for locator '{}': {}", spec.locator_id(), e);
                return None;
            }
        };

        if suggestion.confidence.is_nan() || suggestion.confidence + SCORE_EPSILON < self.config.suggestion_threshold {
            debug!(
                "Suggestion '{}' rejected: confidence {:.2} below {:.2}",
                suggestion.query, suggestion.confidence, self.config.suggestion_threshold
            );
            return None;
        }

        let mut found = match page.query_all(suggestion.kind, &suggestion.query) {
            Ok(found) => found,
            Err(e) => {
                warn!("Suggested query rejected: {}", e);
                return None;
            }
        };
        if found.len() != 1 {
            debug!(
                "Suggested query '{}' matched {} elements, expected exactly one",
                suggestion.query,
                found.len()
            );
            return None;
        }

        found.pop().map(|element| ScoredCandidate {
            element,
            score: suggestion.confidence.clamp(0.0, 1.0),
            matched_by: StrategyKind::AiSuggestion,
            query: suggestion.query,
            kind: suggestion.kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{DomTree, ElementNode};
    use crate::locator::suggest::Suggestion;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FixedProvider {
        suggestion: Suggestion,
        calls: AtomicUsize,
    }

    impl FixedProvider {
        fn new(query: &str, confidence: f64) -> Arc<Self> {
            Arc::new(Self {
                suggestion: Suggestion::css(query, confidence),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SuggestionProvider for FixedProvider {
        async fn suggest(&self, _request: SuggestionRequest) -> Result<Suggestion, SuggestError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.suggestion.clone())
        }
    }

    struct SlowProvider;

    #[async_trait]
    impl SuggestionProvider for SlowProvider {
        async fn suggest(&self, _request: SuggestionRequest) -> Result<Suggestion, SuggestError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Suggestion::css("#anything", 1.0))
        }
    }

    fn login_page() -> DomTree {
        DomTree::new(
            ElementNode::new("body")
                .with_child(
                    ElementNode::new("nav").with_child(
                        ElementNode::new("a")
                            .with_attribute("href", "/help")
                            .with_text("Help"),
                    ),
                )
                .with_child(
                    ElementNode::new("form").with_child(
                        ElementNode::new("button")
                            .with_attribute("data-testid", "login-btn")
                            .with_attribute("aria-label", "Login")
                            .with_text("Login"),
                    ),
                ),
        )
    }

    #[tokio::test]
    async fn test_exact_single_match() {
        let page = login_page();
        let chain = StrategyChain::new(ResolverConfig::default());

        let hit = chain.resolve(&LocatorSpec::css("form > button"), &page).await.unwrap();
        assert_eq!(hit.matched_by, StrategyKind::Exact);
        assert_eq!(hit.score, 1.0);
        assert_eq!(hit.query, "form > button");
    }

    #[tokio::test]
    async fn test_invalid_syntax_is_not_healed() {
        let page = login_page();
        let chain = StrategyChain::new(ResolverConfig::default());
        let spec = LocatorSpec::css("button >").with_expected_text("Login");

        let err = chain.resolve(&spec, &page).await.unwrap_err();
        assert!(matches!(err, ResolveError::InvalidQuerySyntax { .. }));
    }

    #[tokio::test]
    async fn test_attribute_similarity_heals() {
        let page = login_page();
        let chain = StrategyChain::new(ResolverConfig::default());
        let spec = LocatorSpec::css("#login-btn")
            .with_expected_attribute("data-testid", "login-btn")
            .with_expected_attribute("aria-label", "Login")
            .with_expected_text("Login");

        let hit = chain.resolve(&spec, &page).await.unwrap();
        assert_eq!(hit.matched_by, StrategyKind::AttributeSimilarity);
        assert!((hit.score - 0.7).abs() < 1e-9);
        assert_eq!(hit.query, "[data-testid=\"login-btn\"]");
    }

    #[tokio::test]
    async fn test_low_attribute_score_falls_through_to_text() {
        let page = login_page();
        let chain = StrategyChain::new(ResolverConfig::default());
        // testid + aria only reach 0.5 of 1.0; the text strategy picks it up
        let spec = LocatorSpec::css("#login-btn")
            .with_expected_attribute("data-testid", "login-btn")
            .with_expected_attribute("aria-label", "Login")
            .with_expected_text("Log in");

        assert!(chain.attempt(StrategyKind::AttributeSimilarity, &spec, &page).await.unwrap().is_none());

        let spec = LocatorSpec::css("#gone").with_expected_text("Help");
        let hit = chain.resolve(&spec, &page).await.unwrap();
        assert_eq!(hit.matched_by, StrategyKind::Text);
        assert_eq!(hit.element.tag_name(), "a");
    }

    #[tokio::test]
    async fn test_tag_family_narrows_candidates() {
        let page = DomTree::new(
            ElementNode::new("body")
                .with_child(ElementNode::new("span").with_attribute("data-testid", "save"))
                .with_child(ElementNode::new("button").with_attribute("data-testid", "save")),
        );
        let chain = StrategyChain::new(ResolverConfig::default());

        let spec = LocatorSpec::css("button#save-btn").with_expected_attribute("data-testid", "save");
        let hit = chain
            .attempt(StrategyKind::AttributeSimilarity, &spec, &page)
            .await
            .unwrap();
        assert!(hit.is_none(), "0.3 of 0.6 is below threshold");

        let spec = LocatorSpec::css("button.save").with_expected_attribute("data-testid", "save");
        let hit = chain
            .attempt(StrategyKind::AttributeSimilarity, &spec, &page)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.element.tag_name(), "button");
    }

    #[tokio::test]
    async fn test_duplicate_ids_ambiguous_then_first_in_document_order() {
        let page = DomTree::new(
            ElementNode::new("body")
                .with_child(ElementNode::new("button").with_attribute("id", "dup").with_text("First"))
                .with_child(ElementNode::new("button").with_attribute("id", "dup").with_text("Second")),
        );
        let chain = StrategyChain::new(ResolverConfig::default());
        let spec = LocatorSpec::css("#dup");

        assert!(chain.attempt(StrategyKind::Exact, &spec, &page).await.unwrap().is_none());

        let hit = chain.resolve(&spec, &page).await.unwrap();
        assert_eq!(hit.matched_by, StrategyKind::AttributeSimilarity);
        assert_eq!(hit.element.text(), "First");
        assert_eq!(hit.query, "body > button:nth-child(1)");
    }

    #[tokio::test]
    async fn test_strict_mode_reports_ambiguity() {
        let page = DomTree::new(
            ElementNode::new("body")
                .with_child(ElementNode::new("li"))
                .with_child(ElementNode::new("li")),
        );
        let chain = StrategyChain::new(ResolverConfig::default().strict(true));

        let err = chain.resolve(&LocatorSpec::css("li"), &page).await.unwrap_err();
        assert_eq!(
            err,
            ResolveError::AmbiguousMatch {
                query: "li".to_string(),
                count: 2
            }
        );
    }

    #[tokio::test]
    async fn test_text_match_prefers_shallowest() {
        let page = DomTree::new(
            ElementNode::new("body")
                .with_child(ElementNode::new("div").with_child(ElementNode::new("span").with_text("Total")))
                .with_child(ElementNode::new("h2").with_text("Total")),
        );
        let chain = StrategyChain::new(ResolverConfig::default());
        let spec = LocatorSpec::css("#total").with_expected_text("Total");

        let hit = chain.attempt(StrategyKind::Text, &spec, &page).await.unwrap().unwrap();
        assert_eq!(hit.element.tag_name(), "h2");
        assert_eq!(hit.score, 0.5);
    }

    #[tokio::test]
    async fn test_text_belongs_to_the_innermost_element() {
        let page = DomTree::new(
            ElementNode::new("body").with_child(
                ElementNode::new("button")
                    .with_attribute("class", "cta")
                    .with_child(ElementNode::new("span").with_text("Login")),
            ),
        );
        let chain = StrategyChain::new(ResolverConfig::default());
        let spec = LocatorSpec::css("#login").with_expected_text("Login");

        let hit = chain.attempt(StrategyKind::Text, &spec, &page).await.unwrap().unwrap();
        assert_eq!(hit.element.tag_name(), "span");
        assert_eq!(hit.score, 1.0);
        assert_eq!(hit.kind, LocatorKind::Css);
    }

    #[tokio::test]
    async fn test_ai_suggestion_accepted_once() {
        let page = login_page();
        let provider = FixedProvider::new("form button", 0.9);
        let chain = StrategyChain::new(ResolverConfig::default()).with_suggester(provider.clone());
        let spec = LocatorSpec::css("#submit").with_description("the login button");

        let hit = chain.resolve(&spec, &page).await.unwrap();
        assert_eq!(hit.matched_by, StrategyKind::AiSuggestion);
        assert_eq!(hit.query, "form button");
        assert_eq!(hit.kind, LocatorKind::Css);
        assert_eq!(hit.score, 0.9);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ai_suggestion_rejections() {
        let page = login_page();
        let spec = LocatorSpec::css("#submit");

        for (query, confidence) in [("form button", 0.5), ("*", 0.95), ("#nope", 0.95), ("a >", 0.95)] {
            let chain = StrategyChain::new(ResolverConfig::default())
                .with_suggester(FixedProvider::new(query, confidence));
            let err = chain.resolve(&spec, &page).await.unwrap_err();
            assert!(matches!(err, ResolveError::ElementNotFound { .. }), "{}", query);
        }
    }

    #[tokio::test]
    async fn test_ai_timeout_is_a_miss() {
        let page = login_page();
        let config = ResolverConfig::default().suggestion_timeout(Duration::from_millis(20));
        let chain = StrategyChain::new(config).with_suggester(Arc::new(SlowProvider));

        let err = chain.resolve(&LocatorSpec::css("#submit"), &page).await.unwrap_err();
        assert_eq!(
            err,
            ResolveError::ElementNotFound {
                locator_id: "css:#submit".to_string(),
                query: "#submit".to_string(),
            }
        );
    }
}
