//! Query engine for captured DOM trees
//!
//! CSS queries are parsed and matched by `scraper`: the snapshot is rendered
//! back to HTML with every element tagged by its document-order index, so
//! anything a browser's selector engine accepts works here too. Elements the
//! capture dropped are stood in for by empty placeholders, keeping positional
//! selectors such as `:nth-child` in line with the live page.
//!
//! XPath is the subset test authors actually write in locators: `/` and `//`
//! steps with name tests and the predicates `[@a]`, `[@a='v']`,
//! `[text()='v']`, `[contains(@a,'v')]`, `[contains(text(),'v')]`.

use crate::dom::element::ElementNode;
use crate::dom::tree::DomElement;
use crate::error::QueryError;
use crate::locator::LocatorKind;
use scraper::{Html, Selector};
use std::collections::BTreeSet;

/// Carries each element's document-order index through the HTML parser
const NODE_INDEX_ATTR: &str = "data-locator-heal-index";

const VOID_ELEMENTS: [&str; 13] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track", "wbr",
];

/// A parsed query, ready to evaluate
#[derive(Debug, Clone)]
pub enum Query {
    Css(CssQuery),
    XPath(Vec<Step>),
    Id(String),
    TestId(String),
}

/// A selector list validated by the CSS parser
#[derive(Debug, Clone)]
pub struct CssQuery {
    source: String,
    selector: Selector,
}

/// One location step of an XPath expression
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    axis: Axis,
    /// `None` is the `*` name test
    name: Option<String>,
    predicates: Vec<Predicate>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq)]
enum Predicate {
    HasAttribute(String),
    AttributeEquals(String, String),
    AttributeContains(String, String),
    TextEquals(String),
    TextContains(String),
}

impl Query {
    /// Parse a raw query of the given kind
    pub fn parse(kind: LocatorKind, raw: &str) -> Result<Self, QueryError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(QueryError::syntax(raw, "empty query"));
        }

        match kind {
            LocatorKind::Css => CssQuery::parse(trimmed).map(Query::Css),
            LocatorKind::XPath => parse_xpath(trimmed).map(Query::XPath),
            LocatorKind::Id => {
                if trimmed.chars().any(char::is_whitespace) {
                    return Err(QueryError::syntax(raw, "id must not contain whitespace"));
                }
                Ok(Query::Id(trimmed.to_string()))
            }
            LocatorKind::TestId => Ok(Query::TestId(trimmed.to_string())),
        }
    }

    /// Evaluate against a document-ordered element slice, returning matching
    /// slice indices in document order
    pub fn select(&self, elements: &[DomElement<'_>]) -> Vec<usize> {
        match self {
            Query::Css(css) => css.select(elements),
            Query::XPath(steps) => evaluate_xpath(steps, elements),
            Query::Id(id) => (0..elements.len())
                .filter(|&i| elements[i].node.id().map(String::as_str) == Some(id.as_str()))
                .collect(),
            Query::TestId(test_id) => (0..elements.len())
                .filter(|&i| {
                    elements[i].node.get_attribute("data-testid").map(String::as_str)
                        == Some(test_id.as_str())
                })
                .collect(),
        }
    }

    /// The id this query pins down, if it is a plain id lookup
    pub fn pinned_id(&self) -> Option<&str> {
        match self {
            Query::Id(id) => Some(id),
            Query::Css(css) => css.pinned_id(),
            Query::XPath(steps) => steps
                .last()
                .and_then(|step| step.attribute_equals("id")),
            Query::TestId(_) => None,
        }
    }

    /// The `data-testid` this query pins down, if any
    pub fn pinned_test_id(&self) -> Option<&str> {
        match self {
            Query::TestId(test_id) => Some(test_id),
            Query::Css(css) => css.pinned_test_id(),
            Query::XPath(steps) => steps
                .last()
                .and_then(|step| step.attribute_equals("data-testid")),
            Query::Id(_) => None,
        }
    }

    /// Lower-case tag name of the element the query selects, when it names one
    pub fn subject_tag(&self) -> Option<String> {
        match self {
            Query::Css(css) => css.subject_tag(),
            Query::XPath(steps) => steps.last().and_then(|step| step.name.clone()),
            _ => None,
        }
    }
}

impl CssQuery {
    fn parse(source: &str) -> Result<Self, QueryError> {
        let selector = Selector::parse(source).map_err(|e| QueryError::syntax(source, e.to_string()))?;
        Ok(Self {
            source: source.to_string(),
            selector,
        })
    }

    fn select(&self, elements: &[DomElement<'_>]) -> Vec<usize> {
        let Some(root) = elements.first() else {
            return Vec::new();
        };

        let document = Html::parse_document(&indexed_markup(root.node));
        let mut found: Vec<usize> = document
            .select(&self.selector)
            .filter_map(|element| element.value().attr(NODE_INDEX_ATTR))
            .filter_map(|index| index.parse().ok())
            .filter(|&index| index < elements.len())
            .collect();
        found.sort_unstable();
        found.dedup();
        found
    }

    /// The selector when it is one compound: no combinators, no list
    fn single_compound(&self) -> Option<&str> {
        match last_compound(&self.source) {
            Some(compound) if compound.len() == self.source.len() => Some(compound),
            _ => None,
        }
    }

    /// `#id` or `tag#id`
    fn pinned_id(&self) -> Option<&str> {
        let (tag, id) = self.single_compound()?.split_once('#')?;
        (is_type_selector(tag) && is_plain_ident(id)).then_some(id)
    }

    /// `[data-testid=v]` or `tag[data-testid="v"]`
    fn pinned_test_id(&self) -> Option<&str> {
        let (tag, rest) = self.single_compound()?.split_once('[')?;
        if !is_type_selector(tag) {
            return None;
        }
        let (name, value) = rest.strip_suffix(']')?.split_once('=')?;
        if name.trim() != "data-testid" {
            return None;
        }
        unquote(value.trim())
    }

    fn subject_tag(&self) -> Option<String> {
        let compound = last_compound(&self.source)?;
        let tag: String = compound
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
            .collect();
        tag.starts_with(|c: char| c.is_ascii_alphabetic())
            .then(|| tag.to_ascii_lowercase())
    }
}

/// Last compound of a selector; `None` for selector lists
fn last_compound(source: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut quote = None;
    let mut start = 0;

    for (i, c) in source.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '"' | '\'' => quote = Some(c),
                '[' | '(' => depth += 1,
                ']' | ')' => depth = depth.saturating_sub(1),
                ',' if depth == 0 => return None,
                '>' | '+' | '~' if depth == 0 => start = i + 1,
                c if depth == 0 && c.is_whitespace() => start = i + c.len_utf8(),
                _ => {}
            },
        }
    }

    Some(&source[start..])
}

fn is_type_selector(tag: &str) -> bool {
    tag == "*" || tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn is_plain_ident(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
}

fn unquote(value: &str) -> Option<&str> {
    for quote in ['"', '\''] {
        if let Some(inner) = value.strip_prefix(quote) {
            let inner = inner.strip_suffix(quote)?;
            return (!inner.contains(quote)).then_some(inner);
        }
    }
    is_plain_ident(value).then_some(value)
}

/// Render a subtree as an HTML document whose elements carry their
/// document-order index
fn indexed_markup(root: &ElementNode) -> String {
    let mut out = String::from("<!DOCTYPE html>");
    let mut next = 0;
    write_indexed(root, &mut next, &mut out);
    out
}

fn write_indexed(node: &ElementNode, next: &mut usize, out: &mut String) {
    out.push_str(&format!("<{} {}=\"{}\"", node.tag_name, NODE_INDEX_ATTR, next));
    *next += 1;

    for (name, value) in &node.attributes {
        if name != NODE_INDEX_ATTR {
            out.push_str(&format!(" {}=\"{}\"", name, escape(value, true)));
        }
    }
    out.push('>');

    let tag = node.tag_name.to_ascii_lowercase();
    if VOID_ELEMENTS.contains(&tag.as_str()) {
        return;
    }

    out.push_str(&escape(node.own_text(), false));

    let mut position = 0;
    for child in &node.children {
        let live = child.sibling_index.unwrap_or(position + 1);
        while position + 1 < live {
            // a sibling the capture skipped
            out.push_str("<template></template>");
            position += 1;
        }
        write_indexed(child, next, out);
        position += 1;
    }

    out.push_str(&format!("</{}>", node.tag_name));
}

fn escape(value: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

impl Step {
    fn matches(&self, element: &DomElement<'_>) -> bool {
        let node = element.node;
        if let Some(name) = &self.name {
            if !node.is_tag(name) {
                return false;
            }
        }

        self.predicates.iter().all(|predicate| match predicate {
            Predicate::HasAttribute(name) => node.get_attribute(name).is_some(),
            Predicate::AttributeEquals(name, value) => {
                node.get_attribute(name).map(String::as_str) == Some(value.as_str())
            }
            Predicate::AttributeContains(name, value) => node
                .get_attribute(name)
                .is_some_and(|actual| actual.contains(value.as_str())),
            Predicate::TextEquals(value) => node.own_text() == value,
            Predicate::TextContains(value) => node.own_text().contains(value.as_str()),
        })
    }

    fn attribute_equals(&self, attribute: &str) -> Option<&str> {
        self.predicates.iter().find_map(|predicate| match predicate {
            Predicate::AttributeEquals(name, value) if name == attribute => Some(value.as_str()),
            _ => None,
        })
    }
}

fn evaluate_xpath(steps: &[Step], elements: &[DomElement<'_>]) -> Vec<usize> {
    // `None` is the document node
    let mut context: Vec<Option<usize>> = vec![None];

    for step in steps {
        let mut next = BTreeSet::new();
        for ctx in &context {
            let candidates: Vec<usize> = match (step.axis, *ctx) {
                (Axis::Child, None) => (0..elements.len().min(1)).collect(),
                (Axis::Child, Some(i)) => (i + 1..elements[i].end)
                    .filter(|&j| elements[j].parent == Some(i))
                    .collect(),
                (Axis::Descendant, None) => (0..elements.len()).collect(),
                (Axis::Descendant, Some(i)) => (i + 1..elements[i].end).collect(),
            };
            next.extend(candidates.into_iter().filter(|&j| step.matches(&elements[j])));
        }
        context = next.into_iter().map(Some).collect();
    }

    context.into_iter().flatten().collect()
}

/// Character cursor for the XPath parser
struct Cursor<'q> {
    raw: &'q str,
    chars: Vec<char>,
    pos: usize,
}

impl<'q> Cursor<'q> {
    fn new(raw: &'q str) -> Self {
        Self {
            raw,
            chars: raw.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn eat(&mut self, expected: &str) -> bool {
        let len = expected.chars().count();
        let matches = self.chars.len() >= self.pos + len
            && self.chars[self.pos..self.pos + len]
                .iter()
                .copied()
                .eq(expected.chars());
        if matches {
            self.pos += len;
        }
        matches
    }

    /// Returns true if any whitespace was skipped
    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn error(&self, reason: impl Into<String>) -> QueryError {
        QueryError::syntax(self.raw, format!("{} at position {}", reason.into(), self.pos))
    }

    fn expect(&mut self, expected: char) -> Result<(), QueryError> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => {
                self.pos -= 1;
                Err(self.error(format!("expected '{}', found '{}'", expected, c)))
            }
            None => Err(self.error(format!("expected '{}', found end of query", expected))),
        }
    }

    fn ident(&mut self) -> Result<String, QueryError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '-' || c == '_')
        {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("expected identifier"));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn quoted(&mut self) -> Result<String, QueryError> {
        let quote = match self.peek() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(self.error("expected quoted string")),
        };
        self.pos += 1;
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == quote {
                let value = self.chars[start..self.pos].iter().collect();
                self.pos += 1;
                return Ok(value);
            }
            self.pos += 1;
        }
        Err(self.error("unterminated string"))
    }
}

fn parse_xpath(raw: &str) -> Result<Vec<Step>, QueryError> {
    let mut cur = Cursor::new(raw);
    let mut steps = Vec::new();

    // `.//x` and `//x` mean the same thing against a whole-page snapshot
    cur.eat(".");
    if cur.peek() != Some('/') {
        return Err(cur.error("XPath must start with '/' or '//'"));
    }

    while cur.peek().is_some() {
        let axis = if cur.eat("//") {
            Axis::Descendant
        } else if cur.eat("/") {
            Axis::Child
        } else {
            return Err(cur.error("expected '/' or '//'"));
        };

        let name = if cur.eat("*") {
            None
        } else {
            Some(cur.ident()?.to_ascii_lowercase())
        };

        let mut predicates = Vec::new();
        while cur.eat("[") {
            predicates.push(parse_predicate(&mut cur)?);
        }

        steps.push(Step {
            axis,
            name,
            predicates,
        });
    }

    Ok(steps)
}

fn parse_predicate(cur: &mut Cursor<'_>) -> Result<Predicate, QueryError> {
    cur.skip_ws();

    let predicate = if cur.eat("@") {
        let name = cur.ident()?;
        cur.skip_ws();
        if cur.eat("=") {
            cur.skip_ws();
            Predicate::AttributeEquals(name, cur.quoted()?)
        } else {
            Predicate::HasAttribute(name)
        }
    } else if cur.eat("text()") {
        cur.skip_ws();
        cur.expect('=')?;
        cur.skip_ws();
        Predicate::TextEquals(cur.quoted()?)
    } else if cur.eat("contains(") {
        cur.skip_ws();
        let attribute = if cur.eat("@") {
            Some(cur.ident()?)
        } else if cur.eat("text()") {
            None
        } else {
            return Err(cur.error("contains() expects @attribute or text()"));
        };
        cur.skip_ws();
        cur.expect(',')?;
        cur.skip_ws();
        let value = cur.quoted()?;
        cur.skip_ws();
        cur.expect(')')?;
        match attribute {
            Some(name) => Predicate::AttributeContains(name, value),
            None => Predicate::TextContains(value),
        }
    } else if cur.peek().is_some_and(|c| c.is_ascii_digit()) {
        return Err(cur.error("positional predicates are not supported"));
    } else {
        return Err(cur.error("unsupported predicate"));
    };

    cur.skip_ws();
    cur.expect(']')?;
    Ok(predicate)
}
