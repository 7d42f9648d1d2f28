//! Collaborator boundary towards the browser driver

use crate::dom::BoundingBox;
use crate::error::QueryError;
use crate::locator::LocatorKind;

/// Transient reference to a live element
///
/// The resolver only reads through these accessors and never holds a handle
/// beyond one resolution.
pub trait ElementHandle {
    /// Attribute value, `None` when the attribute is absent
    fn attribute(&self, name: &str) -> Option<String>;

    /// Visible text of the element itself, excluding descendants
    ///
    /// Ancestors never match on text they only contain: in
    /// `<button><span>Login</span></button>` the text `Login` belongs to the
    /// span, and the button's text is empty.
    fn text(&self) -> String;

    fn bounding_box(&self) -> Option<BoundingBox>;

    /// Lower-case tag name
    fn tag_name(&self) -> String;

    /// Distance from the document root (root is 0)
    fn depth(&self) -> usize;

    /// A CSS query that finds exactly this element in its snapshot
    fn unique_selector(&self) -> String;
}

/// Read-only view of the current page
pub trait PageSnapshot {
    type Element<'a>: ElementHandle + Clone
    where
        Self: 'a;

    /// All elements matching a raw query, in document order
    fn query_all(&self, kind: LocatorKind, query: &str) -> Result<Vec<Self::Element<'_>>, QueryError>;

    /// Every element of the page, in document order
    fn elements(&self) -> Vec<Self::Element<'_>>;

    /// Page markup handed to the suggestion provider
    fn raw_markup(&self) -> String;

    /// Topmost element at a viewport coordinate
    fn element_at(&self, x: f64, y: f64) -> Option<Self::Element<'_>>;
}
