use crate::dom::element::{BoundingBox, ElementNode};
use crate::dom::query::Query;
use crate::dom::selector_map::{ElementSelector, SelectorMap};
use crate::error::{BrowserError, QueryError, Result};
use crate::locator::{ElementHandle, LocatorKind, PageSnapshot};
use headless_chrome::Tab;
use std::collections::HashMap;
use std::sync::Arc;

/// Read-only snapshot of a page's DOM
#[derive(Debug, Clone)]
pub struct DomTree {
    root: ElementNode,

    /// Stable selector for every element, keyed by document order
    selector_map: SelectorMap,

    /// Page HTML as captured by the browser, if any
    markup: Option<String>,
}

/// One element of a [`DomTree`], positioned in document order
#[derive(Debug, Clone, Copy)]
pub struct DomElement<'a> {
    pub(crate) node: &'a ElementNode,
    pub(crate) index: usize,
    pub(crate) depth: usize,
    pub(crate) parent: Option<usize>,
    /// One past the last descendant's index
    pub(crate) end: usize,
    selector: &'a str,
}

impl DomTree {
    /// Create a snapshot from a root element
    pub fn new(root: ElementNode) -> Self {
        let mut tree = Self {
            root,
            selector_map: SelectorMap::new(),
            markup: None,
        };
        tree.build_selector_map();
        tree
    }

    /// Builder method: attach the page HTML captured alongside the tree
    pub fn with_markup(mut self, markup: impl Into<String>) -> Self {
        self.markup = Some(markup.into());
        self
    }

    /// Build DOM tree from a browser tab
    pub fn from_tab(tab: &Arc<Tab>) -> Result<Self> {
        let js_code = include_str!("extract_dom.js");

        let result = tab
            .evaluate(js_code, false)
            .map_err(|e| BrowserError::DomParseFailed(format!("Failed to execute DOM extraction script: {}", e)))?;

        let json_value = result
            .value
            .ok_or_else(|| BrowserError::DomParseFailed("No value returned from DOM extraction".to_string()))?;

        // The script returns a JSON string, not an object
        let json_str: String = serde_json::from_value(json_value)
            .map_err(|e| BrowserError::DomParseFailed(format!("Failed to get JSON string: {}", e)))?;

        let markup = tab
            .get_content()
            .map_err(|e| BrowserError::DomParseFailed(format!("Failed to read page content: {}", e)))?;

        Ok(Self::from_json(&json_str)?.with_markup(markup))
    }

    /// Parse a snapshot previously serialized with [`DomTree::to_json`]
    pub fn from_json(json: &str) -> Result<Self> {
        let root: ElementNode = serde_json::from_str(json)
            .map_err(|e| BrowserError::DomParseFailed(format!("Failed to parse DOM JSON: {}", e)))?;
        Ok(Self::new(root))
    }

    /// Root element of the snapshot
    pub fn root(&self) -> &ElementNode {
        &self.root
    }

    fn build_selector_map(&mut self) {
        self.selector_map.clear();

        let mut ids: HashMap<&str, usize> = HashMap::new();
        let mut test_ids: HashMap<&str, usize> = HashMap::new();
        Self::count_identities(&self.root, &mut ids, &mut test_ids);

        let root_path = self.root.tag_name.to_ascii_lowercase();
        let mut selectors = Vec::new();
        Self::collect_selectors(&self.root, &root_path, &ids, &test_ids, &mut selectors);

        for selector in selectors {
            self.selector_map.register(selector);
        }
    }

    fn count_identities<'a>(
        node: &'a ElementNode,
        ids: &mut HashMap<&'a str, usize>,
        test_ids: &mut HashMap<&'a str, usize>,
    ) {
        if let Some(id) = node.id() {
            *ids.entry(id.as_str()).or_default() += 1;
        }
        if let Some(test_id) = node.get_attribute("data-testid") {
            *test_ids.entry(test_id.as_str()).or_default() += 1;
        }
        for child in &node.children {
            Self::count_identities(child, ids, test_ids);
        }
    }

    /// Pre-order walk producing one selector per element
    fn collect_selectors(
        node: &ElementNode,
        css_path: &str,
        ids: &HashMap<&str, usize>,
        test_ids: &HashMap<&str, usize>,
        out: &mut Vec<ElementSelector>,
    ) {
        out.push(Self::build_selector(node, css_path, ids, test_ids));

        for (i, child) in node.children.iter().enumerate() {
            let child_path = format!(
                "{} > {}:nth-child({})",
                css_path,
                child.tag_name.to_ascii_lowercase(),
                child.sibling_index.unwrap_or(i + 1)
            );
            Self::collect_selectors(child, &child_path, ids, test_ids, out);
        }
    }

    /// Prefer a unique id, then a unique test id, then the structural path
    fn build_selector(
        node: &ElementNode,
        css_path: &str,
        ids: &HashMap<&str, usize>,
        test_ids: &HashMap<&str, usize>,
    ) -> ElementSelector {
        let id = node.id().filter(|id| is_quotable(id));
        let test_id = node.get_attribute("data-testid").filter(|t| is_quotable(t));

        let css_selector = match (id, test_id) {
            (Some(id), _) if ids.get(id.as_str()) == Some(&1) => {
                if is_css_ident(id) {
                    format!("#{}", id)
                } else {
                    format!("[id=\"{}\"]", id)
                }
            }
            (_, Some(t)) if test_ids.get(t.as_str()) == Some(&1) => {
                format!("[data-testid=\"{}\"]", t)
            }
            _ => css_path.to_string(),
        };

        let mut selector = ElementSelector::new(css_selector, &node.tag_name);
        if let Some(id) = node.id() {
            selector = selector.with_id(id);
        }
        if let Some(t) = node.get_attribute("data-testid") {
            selector = selector.with_test_id(t);
        }
        if !node.own_text().is_empty() {
            selector = selector.with_text(node.own_text());
        }
        selector
    }

    /// Flatten the tree into document order
    pub fn flatten(&self) -> Vec<DomElement<'_>> {
        let mut out = Vec::with_capacity(self.selector_map.len());
        Self::flatten_into(&self.root, None, 0, &self.selector_map, &mut out);
        out
    }

    fn flatten_into<'a>(
        node: &'a ElementNode,
        parent: Option<usize>,
        depth: usize,
        selectors: &'a SelectorMap,
        out: &mut Vec<DomElement<'a>>,
    ) {
        let index = out.len();
        let selector = selectors
            .get(index)
            .map(|s| s.css_selector.as_str())
            .unwrap_or_default();

        out.push(DomElement {
            node,
            index,
            depth,
            parent,
            end: index + 1,
            selector,
        });

        for child in &node.children {
            Self::flatten_into(child, Some(index), depth + 1, selectors, out);
        }

        out[index].end = out.len();
    }

    /// Remove script/style subtrees
    pub fn simplify(&mut self) {
        self.root.simplify();
        self.build_selector_map(); // Rebuild map after simplification
    }

    /// Convert the DOM tree to JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.root)
            .map_err(|e| BrowserError::DomParseFailed(format!("Failed to serialize DOM to JSON: {}", e)))
    }

    /// Get element selector by document index
    pub fn get_selector(&self, index: usize) -> Option<&ElementSelector> {
        self.selector_map.get(index)
    }

    /// Count total elements in the tree
    pub fn count_elements(&self) -> usize {
        self.selector_map.len()
    }
}

/// Usable after `#` without escaping: no leading digit, nor `-` followed by one
fn is_css_ident(value: &str) -> bool {
    let mut chars = value.chars();
    let first = match chars.next() {
        Some('-') => chars.next(),
        first => first,
    };

    first.is_some_and(|c| c.is_alphabetic() || c == '_' || c == '-')
        && value
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
}

/// Safe inside a double-quoted attribute selector
fn is_quotable(value: &str) -> bool {
    !value.is_empty() && !value.contains('"') && !value.contains('\\') && !value.contains('\n')
}

impl<'a> DomElement<'a> {
    /// The underlying node
    pub fn node(&self) -> &'a ElementNode {
        self.node
    }

    /// Document-order index
    pub fn index(&self) -> usize {
        self.index
    }

    /// Document-order index of the parent element
    pub fn parent(&self) -> Option<usize> {
        self.parent
    }
}

impl PartialEq for DomElement<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.node, other.node)
    }
}

impl ElementHandle for DomElement<'_> {
    fn attribute(&self, name: &str) -> Option<String> {
        self.node.get_attribute(name).cloned()
    }

    fn text(&self) -> String {
        self.node.own_text().to_string()
    }

    fn bounding_box(&self) -> Option<BoundingBox> {
        self.node.bounding_box
    }

    fn tag_name(&self) -> String {
        self.node.tag_name.to_ascii_lowercase()
    }

    fn depth(&self) -> usize {
        self.depth
    }

    fn unique_selector(&self) -> String {
        self.selector.to_string()
    }
}

impl PageSnapshot for DomTree {
    type Element<'a> = DomElement<'a>;

    fn query_all(&self, kind: LocatorKind, query: &str) -> std::result::Result<Vec<DomElement<'_>>, QueryError> {
        let parsed = Query::parse(kind, query)?;
        let elements = self.flatten();
        Ok(parsed
            .select(&elements)
            .into_iter()
            .map(|i| elements[i])
            .collect())
    }

    fn elements(&self) -> Vec<DomElement<'_>> {
        self.flatten()
    }

    fn raw_markup(&self) -> String {
        match &self.markup {
            Some(markup) => markup.clone(),
            None => self.root.to_markup(),
        }
    }

    fn element_at(&self, x: f64, y: f64) -> Option<DomElement<'_>> {
        self.flatten()
            .into_iter()
            .rev()
            .find(|e| e.node.bounding_box.is_some_and(|b| b.contains(x, y)))
    }
}
