//! Resolver façade: drives the strategy chain and keeps the healing ledger current

use crate::config::ResolverConfig;
use crate::error::ResolveError;
use crate::ledger::{HealingEntry, HealingLedger, HealingRecord, PromotionSuggested};
use crate::locator::chain::StrategyChain;
use crate::locator::page::PageSnapshot;
use crate::locator::spec::{LocatorKind, LocatorSpec};
use crate::locator::strategy::{ScoredCandidate, StrategyKind};
use crate::locator::suggest::SuggestionProvider;
use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// States of one resolution call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveState {
    Start,
    TryingExact,
    TryingAttribute,
    TryingText,
    TryingAi,
    Resolved,
    Failed,
}

impl ResolveState {
    /// Strategy evaluated in this state
    pub fn strategy(&self) -> Option<StrategyKind> {
        match self {
            ResolveState::TryingExact => Some(StrategyKind::Exact),
            ResolveState::TryingAttribute => Some(StrategyKind::AttributeSimilarity),
            ResolveState::TryingText => Some(StrategyKind::Text),
            ResolveState::TryingAi => Some(StrategyKind::AiSuggestion),
            _ => None,
        }
    }

    /// Next state when the current one produced no element
    pub fn advance(&self) -> ResolveState {
        match self {
            ResolveState::Start => ResolveState::TryingExact,
            ResolveState::TryingExact => ResolveState::TryingAttribute,
            ResolveState::TryingAttribute => ResolveState::TryingText,
            ResolveState::TryingText => ResolveState::TryingAi,
            ResolveState::TryingAi => ResolveState::Failed,
            terminal => *terminal,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ResolveState::Resolved | ResolveState::Failed)
    }
}

/// Broadcast to subscribers as resolutions happen
#[derive(Debug, Clone, PartialEq)]
pub enum ResolverEvent {
    Healed(HealingRecord),
    HealingFailed(HealingRecord),
    PromotionSuggested(PromotionSuggested),
    /// A ledger write failed; the resolution itself was unaffected
    LedgerUnavailable { locator_id: String, error: String },
}

/// Successful resolution
#[derive(Debug, Clone)]
pub struct Resolution<E> {
    pub element: E,
    pub matched_by: StrategyKind,
    pub score: f64,
    /// Query that finds the element on this page
    pub query: String,
    /// How `query` is to be interpreted
    pub kind: LocatorKind,
    /// Ledger entry written for this resolution (healed and recorded only)
    pub record: Option<HealingRecord>,
    pub promotion: Option<PromotionSuggested>,
    /// Every state visited, `Start` through `Resolved`
    pub trace: Vec<ResolveState>,
}

impl<E> Resolution<E> {
    pub fn is_healed(&self) -> bool {
        self.matched_by.is_healing()
    }
}

/// Resolves locator specs against page snapshots
///
/// Cheap to clone; clones share the ledger and the event channel.
#[derive(Clone)]
pub struct Resolver {
    chain: StrategyChain,
    ledger: HealingLedger,
    events: broadcast::Sender<ResolverEvent>,
}

impl Resolver {
    pub fn new(config: ResolverConfig, ledger: HealingLedger) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            chain: StrategyChain::new(config),
            ledger,
            events,
        }
    }

    /// Builder method: enable the AI suggestion strategy
    pub fn with_suggester(mut self, suggester: Arc<dyn SuggestionProvider>) -> Self {
        self.chain = self.chain.with_suggester(suggester);
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        self.chain.config()
    }

    pub fn ledger(&self) -> &HealingLedger {
        &self.ledger
    }

    /// Receive events from every resolution made after this call
    pub fn subscribe(&self) -> broadcast::Receiver<ResolverEvent> {
        self.events.subscribe()
    }

    /// Resolve a spec against a page
    ///
    /// Exact hits leave no trace in the ledger. Ledger failures are logged and
    /// broadcast but never fail the resolution.
    pub async fn resolve<'p, P: PageSnapshot>(
        &self,
        spec: &LocatorSpec,
        page: &'p P,
    ) -> Result<Resolution<P::Element<'p>>, ResolveError> {
        let mut state = ResolveState::Start;
        let mut trace = vec![state];

        loop {
            state = state.advance();
            trace.push(state);

            let Some(strategy) = state.strategy() else {
                break;
            };
            if let Some(candidate) = self.chain.attempt(strategy, spec, page).await? {
                trace.push(ResolveState::Resolved);
                return Ok(self.resolved(spec, candidate, trace));
            }
        }

        warn!(
            "No strategy could resolve locator '{}' ({})",
            spec.locator_id(),
            spec.primary_query()
        );
        if let Some(record) = self.write(HealingEntry::failed(spec.locator_id(), spec.primary_query())) {
            self.emit(ResolverEvent::HealingFailed(record));
        }

        Err(ResolveError::ElementNotFound {
            locator_id: spec.locator_id(),
            query: spec.primary_query().to_string(),
        })
    }

    fn resolved<E>(&self, spec: &LocatorSpec, candidate: ScoredCandidate<E>, trace: Vec<ResolveState>) -> Resolution<E> {
        let mut resolution = Resolution {
            element: candidate.element,
            matched_by: candidate.matched_by,
            score: candidate.score,
            query: candidate.query,
            kind: candidate.kind,
            record: None,
            promotion: None,
            trace,
        };
        if !resolution.is_healed() {
            return resolution;
        }

        let locator_id = spec.locator_id();
        info!(
            "Healed locator '{}': '{}' -> '{}' via {} ({:.2})",
            locator_id,
            spec.primary_query(),
            resolution.query,
            resolution.matched_by,
            resolution.score
        );

        let entry = HealingEntry::healed(
            locator_id.as_str(),
            spec.primary_query(),
            resolution.query.as_str(),
            resolution.kind,
            resolution.matched_by,
            resolution.score,
        );
        let Some(record) = self.write(entry) else {
            return resolution;
        };
        self.emit(ResolverEvent::Healed(record.clone()));
        resolution.record = Some(record);

        match self.ledger.promotion(&locator_id, self.config().promotion_window) {
            Ok(Some(promotion)) => {
                info!(
                    "Locator '{}' consistently heals to '{}', suggesting promotion",
                    promotion.locator_id, promotion.new_query
                );
                self.emit(ResolverEvent::PromotionSuggested(promotion.clone()));
                resolution.promotion = Some(promotion);
            }
            Ok(None) => {}
            Err(e) => self.ledger_unavailable(&locator_id, &e.to_string()),
        }

        resolution
    }

    fn write(&self, entry: HealingEntry) -> Option<HealingRecord> {
        let locator_id = entry.locator_id.clone();
        match self.ledger.record(entry) {
            Ok(record) => Some(record),
            Err(e) => {
                self.ledger_unavailable(&locator_id, &e.to_string());
                None
            }
        }
    }

    fn ledger_unavailable(&self, locator_id: &str, error: &str) {
        warn!("Healing ledger unavailable for '{}': {}", locator_id, error);
        self.emit(ResolverEvent::LedgerUnavailable {
            locator_id: locator_id.to_string(),
            error: error.to_string(),
        });
    }

    fn emit(&self, event: ResolverEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }
}
