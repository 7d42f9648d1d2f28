use crate::dom::Query;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a locator's primary query is interpreted by the page engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum LocatorKind {
    #[default]
    #[serde(rename = "css")]
    Css,
    #[serde(rename = "xpath")]
    #[cfg_attr(feature = "cli", value(name = "xpath"))]
    XPath,
    #[serde(rename = "id")]
    Id,
    #[serde(rename = "test-id")]
    TestId,
}

impl fmt::Display for LocatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LocatorKind::Css => "css",
            LocatorKind::XPath => "xpath",
            LocatorKind::Id => "id",
            LocatorKind::TestId => "test-id",
        };
        f.write_str(name)
    }
}

/// Declared intent to find one element
///
/// Immutable once built: the builder methods consume and return the locator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocatorSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,

    primary_query: String,

    #[serde(default)]
    kind: LocatorKind,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    expected_attributes: IndexMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    expected_text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

/// The attribute expectations the matcher scores against, after folding in
/// what the primary query itself pins down
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expectations {
    pub id: Option<String>,
    pub test_id: Option<String>,
    pub aria_label: Option<String>,
    pub text: Option<String>,
}

impl Expectations {
    /// True when nothing can be scored
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.test_id.is_none() && self.aria_label.is_none() && self.text.is_none()
    }
}

impl LocatorSpec {
    /// Create a locator from a raw query of the given kind
    pub fn new(kind: LocatorKind, primary_query: impl Into<String>) -> Self {
        Self {
            id: None,
            primary_query: primary_query.into(),
            kind,
            expected_attributes: IndexMap::new(),
            expected_text: None,
            description: None,
        }
    }

    pub fn css(query: impl Into<String>) -> Self {
        Self::new(LocatorKind::Css, query)
    }

    pub fn xpath(query: impl Into<String>) -> Self {
        Self::new(LocatorKind::XPath, query)
    }

    pub fn by_id(id: impl Into<String>) -> Self {
        Self::new(LocatorKind::Id, id)
    }

    pub fn by_test_id(test_id: impl Into<String>) -> Self {
        Self::new(LocatorKind::TestId, test_id)
    }

    /// Builder method: set a stable locator id for the healing ledger
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Builder method: remember an attribute the element is expected to carry
    pub fn with_expected_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.expected_attributes.insert(name.into(), value.into());
        self
    }

    /// Builder method: remember the element's visible text
    pub fn with_expected_text(mut self, text: impl Into<String>) -> Self {
        self.expected_text = Some(text.into());
        self
    }

    /// Builder method: free-text description for the suggestion provider
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn primary_query(&self) -> &str {
        &self.primary_query
    }

    pub fn kind(&self) -> LocatorKind {
        self.kind
    }

    pub fn expected_attributes(&self) -> &IndexMap<String, String> {
        &self.expected_attributes
    }

    pub fn expected_text(&self) -> Option<&str> {
        self.expected_text.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Ledger key: the explicit id, or `kind:query`
    pub fn locator_id(&self) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => format!("{}:{}", self.kind, self.primary_query),
        }
    }

    /// Expected attributes plus whatever the primary query pins down.
    ///
    /// Explicit expectations win over derived ones. Empty strings count as absent.
    pub fn expectations(&self) -> Expectations {
        let parsed = Query::parse(self.kind, &self.primary_query).ok();
        let explicit = |name: &str| {
            self.expected_attributes
                .get(name)
                .filter(|v| !v.trim().is_empty())
                .cloned()
        };

        Expectations {
            id: explicit("id").or_else(|| parsed.as_ref().and_then(|q| q.pinned_id()).map(str::to_string)),
            test_id: explicit("data-testid")
                .or_else(|| parsed.as_ref().and_then(|q| q.pinned_test_id()).map(str::to_string)),
            aria_label: explicit("aria-label"),
            text: self
                .expected_text
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
        }
    }

    /// Tag the primary query targets, used to narrow attribute candidates
    pub fn tag_hint(&self) -> Option<String> {
        Query::parse(self.kind, &self.primary_query).ok()?.subject_tag()
    }

    /// Description handed to the suggestion provider; synthesized when absent
    pub fn describe(&self) -> String {
        if let Some(description) = &self.description {
            return description.clone();
        }

        let mut parts = vec![format!("element previously found by {} query '{}'", self.kind, self.primary_query)];
        for (name, value) in &self.expected_attributes {
            parts.push(format!("{}=\"{}\"", name, value));
        }
        if let Some(text) = &self.expected_text {
            parts.push(format!("text \"{}\"", text));
        }
        parts.join(", ")
    }
}
