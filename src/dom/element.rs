use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Represents a DOM element node captured from a page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElementNode {
    /// HTML tag name (e.g., "div", "button", "input")
    pub tag_name: String,

    /// Element attributes (e.g., id, class, data-testid, aria-label)
    #[serde(default)]
    pub attributes: HashMap<String, String>,

    /// Direct text content of the element (not including descendants)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,

    /// Child elements
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ElementNode>,

    /// Whether the element is visible in the viewport
    #[serde(default)]
    pub is_visible: bool,

    /// Bounding box information (x, y, width, height)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,

    /// 1-based position among the live page's element siblings, counting
    /// siblings the capture skipped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sibling_index: Option<usize>,
}

/// Bounding box coordinates for an element
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Coarse grouping of tags used to narrow attribute-similarity candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagFamily {
    /// Things a user activates: buttons, links, summaries
    Action,
    /// Form fields
    Field,
    /// Headings, paragraphs, labels and inline text
    Text,
    /// Layout containers and everything else
    Container,
}

impl TagFamily {
    /// Classify a tag name (case-insensitive)
    pub fn of(tag: &str) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "button" | "a" | "summary" => TagFamily::Action,
            "input" | "select" | "textarea" | "option" => TagFamily::Field,
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "p" | "span" | "label" | "strong" | "em"
            | "li" | "td" | "th" => TagFamily::Text,
            _ => TagFamily::Container,
        }
    }
}

impl ElementNode {
    /// Create a new ElementNode
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            attributes: HashMap::new(),
            text_content: None,
            children: Vec::new(),
            is_visible: false,
            bounding_box: None,
            sibling_index: None,
        }
    }

    /// Builder method: set attributes
    pub fn with_attributes(mut self, attributes: HashMap<String, String>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Builder method: add a single attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_attribute(key, value);
        self
    }

    /// Builder method: set text content
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text_content = Some(text.into());
        self
    }

    /// Builder method: set children
    pub fn with_children(mut self, children: Vec<ElementNode>) -> Self {
        self.children = children;
        self
    }

    /// Builder method: add a child
    pub fn with_child(mut self, child: ElementNode) -> Self {
        self.children.push(child);
        self
    }

    /// Builder method: set visibility
    pub fn with_visibility(mut self, visible: bool) -> Self {
        self.is_visible = visible;
        self
    }

    /// Builder method: set bounding box
    pub fn with_bounding_box(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.bounding_box = Some(BoundingBox { x, y, width, height });
        self
    }

    /// Add a single attribute
    pub fn add_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Add a child element
    pub fn add_child(&mut self, child: ElementNode) {
        self.children.push(child);
    }

    /// Get attribute value by key
    pub fn get_attribute(&self, key: &str) -> Option<&String> {
        self.attributes.get(key)
    }

    /// Check if element has a specific class
    pub fn has_class(&self, class_name: &str) -> bool {
        if let Some(classes) = self.attributes.get("class") {
            classes.split_whitespace().any(|c| c == class_name)
        } else {
            false
        }
    }

    /// Get element ID
    pub fn id(&self) -> Option<&String> {
        self.attributes.get("id")
    }

    /// Check if element is a specific tag
    pub fn is_tag(&self, tag: &str) -> bool {
        self.tag_name.eq_ignore_ascii_case(tag)
    }

    /// Tag family of this element
    pub fn tag_family(&self) -> TagFamily {
        TagFamily::of(&self.tag_name)
    }

    /// Own text with surrounding whitespace trimmed, empty when absent
    pub fn own_text(&self) -> &str {
        self.text_content.as_deref().map(str::trim).unwrap_or("")
    }

    /// Remove script, style and noscript subtrees
    ///
    /// Surviving children keep their original sibling position.
    pub fn simplify(&mut self) {
        for (i, child) in self.children.iter_mut().enumerate() {
            child.sibling_index.get_or_insert(i + 1);
        }
        self.children.retain(|child| {
            !matches!(child.tag_name.as_str(), "script" | "style" | "noscript")
        });

        for child in &mut self.children {
            child.simplify();
        }
    }

    /// Render the element and its subtree as HTML-like markup.
    ///
    /// Attributes are emitted in sorted order so the output is stable across runs.
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        self.write_markup(&mut out);
        out
    }

    fn write_markup(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.tag_name);

        let mut keys: Vec<&String> = self.attributes.keys().collect();
        keys.sort();
        for key in keys {
            let value = self.attributes[key].replace('"', "&quot;");
            out.push_str(&format!(" {}=\"{}\"", key, value));
        }
        out.push('>');

        let text = self.own_text();
        if !text.is_empty() {
            out.push_str(text);
        }

        for child in &self.children {
            child.write_markup(out);
        }

        out.push_str(&format!("</{}>", self.tag_name));
    }
}

impl BoundingBox {
    /// Create a new BoundingBox
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Check if the bounding box is visible (has non-zero dimensions)
    pub fn is_visible(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    /// Calculate the area of the bounding box
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Whether the point lies inside the box (edges inclusive)
    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.is_visible()
            && x >= self.x
            && x <= self.x + self.width
            && y >= self.y
            && y <= self.y + self.height
    }
}
