//! # locator-heal
//!
//! Self-healing element locators for browser test automation.
//!
//! A test declares *what* it wants to find as a [`LocatorSpec`]: a primary
//! query plus whatever it remembers about the element (id, test id, aria
//! label, visible text). When the page changes and the primary query no
//! longer matches exactly one element, the [`Resolver`] falls back through a
//! fixed chain of strategies and records every heal in a [`HealingLedger`].
//! Once a locator heals to the same query several times in a row, the
//! resolver suggests promoting that query.
//!
//! ## Features
//!
//! - **Strategy chain**: exact query, attribute similarity, visible text, and
//!   an optional AI suggestion provider bounded by a timeout
//! - **Attribute matcher**: weighted partial matching with Jaro-Winkler
//!   similarity for aria labels
//! - **Healing ledger**: append-only history in memory or in a JSON-lines file
//! - **Page snapshots**: DOM trees captured from Chrome via CDP, queryable
//!   with full CSS selectors and an XPath subset
//!
//! ## Resolving a locator
//!
//! ```rust
//! use locator_heal::{DomTree, ElementNode, HealingLedger, LocatorSpec, Resolver, ResolverConfig, StrategyKind};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), locator_heal::ResolveError> {
//! let page = DomTree::new(
//!     ElementNode::new("body").with_child(
//!         ElementNode::new("button")
//!             .with_attribute("data-testid", "login")
//!             .with_text("Log in"),
//!     ),
//! );
//!
//! // The id was renamed, but the test id and text still identify the button
//! let spec = LocatorSpec::css("button#login-btn")
//!     .with_expected_attribute("data-testid", "login")
//!     .with_expected_text("Log in");
//!
//! let resolver = Resolver::new(ResolverConfig::default(), HealingLedger::in_memory());
//! let resolution = resolver.resolve(&spec, &page).await?;
//!
//! assert_eq!(resolution.matched_by, StrategyKind::AttributeSimilarity);
//! assert_eq!(resolution.query, "[data-testid=\"login\"]");
//! # Ok(())
//! # }
//! ```
//!
//! ## Capturing a live page
//!
//! ```rust,no_run
//! use locator_heal::{BrowserSession, LaunchOptions};
//!
//! # fn main() -> locator_heal::Result<()> {
//! let session = BrowserSession::launch(LaunchOptions::default())?;
//! session.navigate("https://example.com")?;
//!
//! let snapshot = session.snapshot()?;
//! println!("Captured {} elements", snapshot.count_elements());
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! - [`locator`]: specs, strategies, the attribute matcher and the resolver
//! - [`ledger`]: healing records and their stores
//! - [`review`]: scheduled promotion review over a ledger
//! - [`dom`]: page snapshots and the query engine
//! - [`browser`]: Chrome session management
//! - [`config`]: resolver configuration
//! - [`error`]: error types and result aliases

pub mod browser;
pub mod config;
pub mod dom;
pub mod error;
pub mod ledger;
pub mod locator;
pub mod review;

pub use browser::{BrowserSession, ConnectionOptions, LaunchOptions};
pub use config::{MatchWeights, ResolverConfig};
pub use dom::{BoundingBox, DomTree, ElementNode, ElementSelector, SelectorMap};
pub use error::{BrowserError, LedgerError, QueryError, ResolveError, Result, SuggestError};
pub use ledger::{HealingEntry, HealingLedger, HealingRecord, PromotionSuggested};
pub use locator::{ElementHandle, LocatorKind, LocatorSpec, PageSnapshot, Resolution, Resolver, ResolverEvent,
                  StrategyKind};
