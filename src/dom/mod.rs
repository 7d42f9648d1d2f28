//! DOM snapshot module
//!
//! This module provides the concrete page model the resolver runs against:
//! - ElementNode: Representation of DOM elements
//! - DomTree: Read-only page snapshot implementing `PageSnapshot`
//! - SelectorMap: Stable per-element selectors used for healed queries
//! - Query: CSS / XPath / id / test-id query engine

pub mod element;
pub mod query;
pub mod selector_map;
pub mod tree;

pub use element::{BoundingBox, ElementNode, TagFamily};
pub use query::Query;
pub use selector_map::{ElementSelector, SelectorMap};
pub use tree::{DomElement, DomTree};

use crate::error::Result;
use headless_chrome::Tab;
use std::sync::Arc;

/// Capture a DOM snapshot from a browser tab
pub fn extract_dom(tab: &Arc<Tab>) -> Result<DomTree> {
    DomTree::from_tab(tab)
}

/// Capture a snapshot without script/style subtrees
pub fn extract_simplified_dom(tab: &Arc<Tab>) -> Result<DomTree> {
    let mut tree = DomTree::from_tab(tab)?;
    tree.simplify();
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_node_export() {
        let element = ElementNode::new("div");
        assert_eq!(element.tag_name, "div");
    }

    #[test]
    fn test_selector_map_export() {
        let map = SelectorMap::new();
        assert!(map.is_empty());
    }

    #[test]
    fn test_dom_tree_export() {
        let tree = DomTree::new(ElementNode::new("body"));
        assert_eq!(tree.root().tag_name, "body");
    }
}
