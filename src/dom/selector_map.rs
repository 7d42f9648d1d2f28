use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A stable selector for one element of a snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElementSelector {
    /// CSS selector that matches exactly this element within the snapshot
    pub css_selector: String,

    /// Element's tag name
    pub tag_name: String,

    /// Element's ID attribute (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Element's data-testid attribute (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_id: Option<String>,

    /// Element's text content (truncated for display)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ElementSelector {
    /// Create a new ElementSelector with CSS selector
    pub fn new(css_selector: impl Into<String>, tag_name: impl Into<String>) -> Self {
        Self {
            css_selector: css_selector.into(),
            tag_name: tag_name.into(),
            id: None,
            test_id: None,
            text: None,
        }
    }

    /// Builder method: set ID
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Builder method: set data-testid
    pub fn with_test_id(mut self, test_id: impl Into<String>) -> Self {
        self.test_id = Some(test_id.into());
        self
    }

    /// Builder method: set text content, truncated to 50 characters
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        let truncated = if text.chars().count() > 50 {
            format!("{}...", text.chars().take(47).collect::<String>())
        } else {
            text
        };
        self.text = Some(truncated);
        self
    }
}

/// Map of document-order element indices to their selectors.
/// Uses IndexMap to preserve insertion order.
#[derive(Debug, Clone, Default)]
pub struct SelectorMap {
    map: IndexMap<usize, ElementSelector>,
    next_index: usize,
}

impl SelectorMap {
    /// Create a new empty SelectorMap
    pub fn new() -> Self {
        Self {
            map: IndexMap::new(),
            next_index: 0,
        }
    }

    /// Register the next element in document order and return its index
    pub fn register(&mut self, selector: ElementSelector) -> usize {
        let index = self.next_index;
        self.map.insert(index, selector);
        self.next_index += 1;
        index
    }

    /// Get selector by index
    pub fn get(&self, index: usize) -> Option<&ElementSelector> {
        self.map.get(&index)
    }

    /// Check if index exists
    pub fn contains(&self, index: usize) -> bool {
        self.map.contains_key(&index)
    }

    /// Get the number of registered elements
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Check if the map is empty
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Clear all elements
    pub fn clear(&mut self) {
        self.map.clear();
        self.next_index = 0;
    }

    /// Iterate over all (index, selector) pairs
    pub fn iter(&self) -> impl Iterator<Item = (&usize, &ElementSelector)> {
        self.map.iter()
    }

    /// Find index by CSS selector
    pub fn find_by_css_selector(&self, css_selector: &str) -> Option<usize> {
        self.map
            .iter()
            .find(|(_, sel)| sel.css_selector == css_selector)
            .map(|(idx, _)| *idx)
    }

    /// Find index by element ID
    pub fn find_by_id(&self, id: &str) -> Option<usize> {
        self.map
            .iter()
            .find(|(_, sel)| sel.id.as_deref() == Some(id))
            .map(|(idx, _)| *idx)
    }

    /// Find index by data-testid
    pub fn find_by_test_id(&self, test_id: &str) -> Option<usize> {
        self.map
            .iter()
            .find(|(_, sel)| sel.test_id.as_deref() == Some(test_id))
            .map(|(idx, _)| *idx)
    }

    /// Export to JSON for debugging
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.map)
    }
}
