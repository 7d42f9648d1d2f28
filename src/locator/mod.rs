//! Locator resolution engine
//!
//! A [`LocatorSpec`] is resolved against a [`PageSnapshot`] by the
//! [`Resolver`], which walks the [`StrategyChain`] (exact query, attribute
//! similarity, text, AI suggestion) and records every heal in the
//! [`HealingLedger`](crate::ledger::HealingLedger).

pub mod chain;
pub mod matcher;
pub mod page;
pub mod resolver;
pub mod spec;
pub mod strategy;
pub mod suggest;

pub use chain::StrategyChain;
pub use matcher::{AttributeMatcher, jaro_winkler};
pub use page::{ElementHandle, PageSnapshot};
pub use resolver::{Resolution, ResolveState, Resolver, ResolverEvent};
pub use spec::{Expectations, LocatorKind, LocatorSpec};
pub use strategy::{ScoredCandidate, StrategyKind};
pub use suggest::{Suggestion, SuggestionProvider, SuggestionRequest};
