use async_trait::async_trait;
use locator_heal::error::SuggestError;
use locator_heal::locator::{Suggestion, SuggestionProvider, SuggestionRequest};
use locator_heal::review;
use locator_heal::{DomTree, ElementHandle, ElementNode, HealingLedger, LocatorKind, LocatorSpec, ResolveError,
                   Resolver, ResolverConfig, ResolverEvent, StrategyKind};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn login_page() -> DomTree {
    DomTree::new(
        ElementNode::new("body")
            .with_child(
                ElementNode::new("header").with_child(
                    ElementNode::new("a")
                        .with_attribute("id", "home")
                        .with_attribute("href", "/")
                        .with_text("Home"),
                ),
            )
            .with_child(
                ElementNode::new("form")
                    .with_child(ElementNode::new("input").with_attribute("id", "email"))
                    .with_child(
                        ElementNode::new("button")
                            .with_attribute("data-testid", "login-btn")
                            .with_attribute("aria-label", "Login")
                            .with_text("Login"),
                    ),
            ),
    )
}

fn resolver() -> Resolver {
    Resolver::new(ResolverConfig::default(), HealingLedger::in_memory())
}

/// Never answers within any reasonable timeout
struct HangingProvider {
    calls: AtomicUsize,
}

#[async_trait]
impl SuggestionProvider for HangingProvider {
    async fn suggest(&self, _request: SuggestionRequest) -> Result<Suggestion, SuggestError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(Suggestion::css("form button", 1.0))
    }
}

/// Answers from the markup it was given
struct MarkupProvider;

#[async_trait]
impl SuggestionProvider for MarkupProvider {
    async fn suggest(&self, request: SuggestionRequest) -> Result<Suggestion, SuggestError> {
        if request.markup.contains("data-testid=\"login-btn\"") {
            Ok(Suggestion::css("[data-testid=\"login-btn\"]", 0.85))
        } else {
            Err(SuggestError::Backend("nothing recognisable".to_string()))
        }
    }
}

/// Always proposes the same XPath
struct XPathProvider;

#[async_trait]
impl SuggestionProvider for XPathProvider {
    async fn suggest(&self, _request: SuggestionRequest) -> Result<Suggestion, SuggestError> {
        Ok(Suggestion {
            query: "//form/button[@aria-label='Login']".to_string(),
            kind: LocatorKind::XPath,
            confidence: 0.9,
        })
    }
}

#[tokio::test]
async fn test_unique_primary_query_resolves_exactly() {
    let page = login_page();
    let resolver = resolver();

    for query in ["#email", "form > button", "header a", "input + button", "form > :first-child"] {
        let resolution = resolver.resolve(&LocatorSpec::css(query), &page).await.unwrap();
        assert_eq!(resolution.matched_by, StrategyKind::Exact);
        assert_eq!(resolution.score, 1.0);
        assert!(resolution.record.is_none());
    }

    let resolution = resolver
        .resolve(&LocatorSpec::xpath("//form/input[@id='email']"), &page)
        .await
        .unwrap();
    assert_eq!(resolution.element.tag_name(), "input");

    assert!(resolver.ledger().locator_ids().unwrap().is_empty());
}

#[tokio::test]
async fn test_renamed_id_heals_through_expected_id() {
    let page = login_page();
    let resolver = resolver();
    let spec = LocatorSpec::css("#email-address").with_expected_attribute("id", "email");

    let resolution = resolver.resolve(&spec, &page).await.unwrap();
    assert_eq!(resolution.matched_by, StrategyKind::AttributeSimilarity);
    assert!(resolution.score >= 0.7);
    assert_eq!(resolution.element.attribute("id").as_deref(), Some("email"));
    assert_eq!(resolution.query, "#email");
}

#[tokio::test]
async fn test_login_button_scenario() {
    let page = login_page();

    // testid + aria + text: 0.7 of the declared 1.0
    let spec = LocatorSpec::css("#login-btn")
        .with_expected_attribute("data-testid", "login-btn")
        .with_expected_attribute("aria-label", "Login")
        .with_expected_text("Login");
    let resolution = resolver().resolve(&spec, &page).await.unwrap();
    assert_eq!(resolution.matched_by, StrategyKind::AttributeSimilarity);
    assert!(resolution.score >= 0.7);
    assert_eq!(resolution.element.tag_name(), "button");

    // without text the score falls short of the threshold and the chain exhausts
    let spec = LocatorSpec::css("#login-btn")
        .with_expected_attribute("data-testid", "login-btn")
        .with_expected_attribute("aria-label", "Login");
    let err = resolver().resolve(&spec, &page).await.unwrap_err();
    assert!(matches!(err, ResolveError::ElementNotFound { .. }));

    // ... unless the suggestion provider can place it
    let resolver = resolver().with_suggester(Arc::new(MarkupProvider));
    let resolution = resolver.resolve(&spec, &page).await.unwrap();
    assert_eq!(resolution.matched_by, StrategyKind::AiSuggestion);
    assert_eq!(resolution.element.tag_name(), "button");
    assert_eq!(resolution.score, 0.85);
}

#[tokio::test]
async fn test_resolution_is_idempotent() {
    let page = login_page();
    let resolver = resolver();
    let spec = LocatorSpec::css("#signin").with_expected_text("Login");

    let first = resolver.resolve(&spec, &page).await.unwrap();
    let second = resolver.resolve(&spec, &page).await.unwrap();

    assert_eq!(first.element, second.element);
    assert_eq!(first.matched_by, second.matched_by);
    assert_eq!(first.query, second.query);
    assert_eq!(first.trace, second.trace);
}

#[tokio::test]
async fn test_duplicate_ids_pick_first_in_document_order() {
    let page = DomTree::new(
        ElementNode::new("body")
            .with_child(ElementNode::new("div").with_attribute("id", "card").with_text("One"))
            .with_child(ElementNode::new("div").with_attribute("id", "card").with_text("Two")),
    );
    let resolver = resolver();

    for _ in 0..3 {
        let resolution = resolver.resolve(&LocatorSpec::css("#card"), &page).await.unwrap();
        assert_eq!(resolution.matched_by, StrategyKind::AttributeSimilarity);
        assert_eq!(resolution.element.text(), "One");
    }
}

#[tokio::test]
async fn test_ai_timeout_is_plain_not_found() {
    let page = login_page();
    let provider = Arc::new(HangingProvider {
        calls: AtomicUsize::new(0),
    });
    let config = ResolverConfig::default().suggestion_timeout(Duration::from_millis(50));
    let resolver = Resolver::new(config, HealingLedger::in_memory()).with_suggester(provider.clone());
    let spec = LocatorSpec::css("#logout").with_id("logout");

    let err = resolver.resolve(&spec, &page).await.unwrap_err();
    assert_eq!(
        err,
        ResolveError::ElementNotFound {
            locator_id: "logout".to_string(),
            query: "#logout".to_string(),
        }
    );
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

    let history = resolver.ledger().history("logout").to_vec().unwrap();
    assert_eq!(history.len(), 1);
    assert!(!history[0].succeeded);
}

#[tokio::test]
async fn test_promotion_after_three_consistent_heals() {
    let page = login_page();
    let resolver = resolver();
    let mut events = resolver.subscribe();
    let spec = LocatorSpec::css("button.submit")
        .with_id("login")
        .with_expected_attribute("data-testid", "login-btn");

    for attempt in 1..=3 {
        let resolution = resolver.resolve(&spec, &page).await.unwrap();
        assert_eq!(resolution.query, "[data-testid=\"login-btn\"]");
        assert_eq!(resolution.promotion.is_some(), attempt == 3);
        assert_eq!(
            resolver.ledger().should_auto_promote("login", 3).unwrap(),
            attempt == 3
        );
    }

    let mut promotions = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let ResolverEvent::PromotionSuggested(promotion) = event {
            promotions.push(promotion);
        }
    }
    assert_eq!(promotions.len(), 1);
    assert_eq!(promotions[0].locator_id, "login");
    assert_eq!(promotions[0].new_query, "[data-testid=\"login-btn\"]");

    let candidates = review::promotion_candidates(resolver.ledger(), 3).unwrap();
    assert_eq!(candidates, promotions);
}

#[tokio::test]
async fn test_promoted_xpath_heal_keeps_its_kind() {
    let page = login_page();
    let resolver = resolver();
    let spec = LocatorSpec::xpath("//form/button[@name='login']")
        .with_id("login")
        .with_expected_attribute("data-testid", "login-btn");

    let mut last = None;
    for _ in 0..3 {
        let resolution = resolver.resolve(&spec, &page).await.unwrap();
        assert_eq!(resolution.matched_by, StrategyKind::AttributeSimilarity);
        assert_eq!(resolution.kind, LocatorKind::Css);
        last = resolution.promotion;
    }

    let promotion = last.expect("third consistent heal suggests promotion");
    assert_eq!(promotion.new_query, "[data-testid=\"login-btn\"]");
    assert_eq!(promotion.healed_kind, Some(LocatorKind::Css));

    let promoted = LocatorSpec::new(promotion.healed_kind.unwrap(), promotion.new_query);
    let resolution = resolver.resolve(&promoted, &page).await.unwrap();
    assert_eq!(resolution.matched_by, StrategyKind::Exact);
    assert_eq!(resolution.element.tag_name(), "button");
}

#[tokio::test]
async fn test_xpath_suggestion_is_recorded_as_xpath() {
    let page = login_page();
    let resolver = resolver().with_suggester(Arc::new(XPathProvider));
    let spec = LocatorSpec::css("#sign-in").with_id("sign-in");

    let resolution = resolver.resolve(&spec, &page).await.unwrap();
    assert_eq!(resolution.matched_by, StrategyKind::AiSuggestion);
    assert_eq!(resolution.kind, LocatorKind::XPath);

    let record = resolution.record.unwrap();
    assert_eq!(record.healed_query, "//form/button[@aria-label='Login']");
    assert_eq!(record.healed_kind, Some(LocatorKind::XPath));

    let again = LocatorSpec::new(LocatorKind::XPath, record.healed_query);
    assert_eq!(resolver.resolve(&again, &page).await.unwrap().matched_by, StrategyKind::Exact);
}

#[tokio::test]
async fn test_unreadable_ledger_tail_does_not_block_resolution() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("healing.jsonl");
    let page = login_page();
    let spec = LocatorSpec::css("#login").with_id("login").with_expected_text("Login");

    {
        let resolver = Resolver::new(ResolverConfig::default(), HealingLedger::open(&path).unwrap());
        resolver.resolve(&spec, &page).await.unwrap();
    }
    // a crash mid-append leaves half a line behind
    let mut contents = std::fs::read_to_string(&path).unwrap();
    let line = contents.clone();
    contents.push_str(&line[..line.len() / 2]);
    std::fs::write(&path, contents).unwrap();

    let resolver = Resolver::new(ResolverConfig::default(), HealingLedger::open_or_in_memory(&path));
    assert_eq!(resolver.resolve(&spec, &page).await.unwrap().matched_by, StrategyKind::Text);
    assert_eq!(resolver.ledger().history("login").to_vec().unwrap().len(), 2);
}

#[tokio::test]
async fn test_concurrent_resolutions_share_the_ledger() {
    let first = login_page();
    let second = DomTree::new(
        ElementNode::new("body").with_child(
            ElementNode::new("nav").with_child(ElementNode::new("a").with_text("Pricing")),
        ),
    );
    let resolver = resolver();

    let login = LocatorSpec::css("#login").with_expected_text("Login");
    let pricing = LocatorSpec::css("#pricing").with_expected_text("Pricing");
    let email = LocatorSpec::css("#email");

    let (a, b, c) = tokio::join!(
        resolver.resolve(&login, &first),
        resolver.resolve(&pricing, &second),
        resolver.resolve(&email, &first),
    );

    assert_eq!(a.unwrap().matched_by, StrategyKind::Text);
    assert_eq!(b.unwrap().matched_by, StrategyKind::Text);
    assert_eq!(c.unwrap().matched_by, StrategyKind::Exact);

    let mut ids = resolver.ledger().locator_ids().unwrap();
    ids.sort();
    assert_eq!(ids, vec!["css:#login", "css:#pricing"]);
}

#[tokio::test]
async fn test_file_ledger_persists_heals() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("healing.jsonl");
    let page = login_page();
    let spec = LocatorSpec::css("#login").with_id("login").with_expected_text("Login");

    {
        let resolver = Resolver::new(ResolverConfig::default(), HealingLedger::open(&path).unwrap());
        resolver.resolve(&spec, &page).await.unwrap();
        resolver.resolve(&spec, &page).await.unwrap();
    }

    let ledger = HealingLedger::open(&path).unwrap();
    let history = ledger.history("login").to_vec().unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|r| r.succeeded && r.strategy_used == Some(StrategyKind::Text)));
    assert!(history[0].timestamp <= history[1].timestamp);

    let summary = review::summarize(&ledger).unwrap();
    assert_eq!(summary[0].attempts, 2);
    assert_eq!(summary[0].success_rate, 1.0);
}
