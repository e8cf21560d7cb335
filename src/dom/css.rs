//! CSS selector matching over the arena
//!
//! Selectors are parsed with scraper's grammar and matched by the `selectors`
//! crate, so pseudo-classes, sibling combinators and escapes behave as they
//! do in `querySelector`. [`ElementRef`] is the borrowed view of one element
//! that `selectors` walks.

use std::fmt;

use cssparser::{Parser as CssParser, ParserInput};
use scraper::error::SelectorErrorKind;
use scraper::selector::{CssLocalName, CssString, NonTSPseudoClass, Parser, PseudoElement, Simple};
use selectors::attr::{AttrSelectorOperation, CaseSensitivity, NamespaceConstraint};
use selectors::bloom::BloomFilter;
use selectors::matching::{
    self, ElementSelectorFlags, MatchingContext, MatchingForInvalidation, MatchingMode,
    NeedsSelectorFlags, QuirksMode, SelectorCaches,
};
use selectors::parser::{ParseRelative, SelectorImpl, SelectorList};
use selectors::{Element, OpaqueElement};

use crate::dom::{Document, ElementData, NodeId, NodeKind};
use crate::error::HtmjError;

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// A parsed selector list
#[derive(Debug, Clone)]
pub struct Selector {
    source: String,
    list: SelectorList<Simple>,
}

impl Selector {
    /// Parse a selector list such as `#list li:first-child, #list ~ p`
    pub fn parse(source: &str) -> Result<Self, HtmjError> {
        let mut input = ParserInput::new(source);
        let mut parser = CssParser::new(&mut input);
        SelectorList::parse(&Parser, &mut parser, ParseRelative::No)
            .map(|list| Self {
                source: source.to_string(),
                list,
            })
            .map_err(|err| HtmjError::InvalidSelector {
                selector: source.to_string(),
                reason: SelectorErrorKind::from(err).to_string(),
            })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether `node` is an element matching this selector
    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let Some(element) = ElementRef::new(doc, node) else {
            return false;
        };
        let mut caches = SelectorCaches::default();
        let mut context = new_context(&mut caches);
        self.matches_element(&element, &mut context)
    }

    /// Matching descendants of `scope` in document order, at most `limit`
    pub(crate) fn select(&self, doc: &Document, scope: NodeId, limit: usize) -> Vec<NodeId> {
        let mut caches = SelectorCaches::default();
        let mut context = new_context(&mut caches);
        let mut found = Vec::new();
        for node in doc.descendants(scope) {
            if found.len() >= limit {
                break;
            }
            let Some(element) = ElementRef::new(doc, node) else {
                continue;
            };
            if self.matches_element(&element, &mut context) {
                found.push(node);
            }
        }
        found
    }

    fn matches_element(
        &self,
        element: &ElementRef<'_>,
        context: &mut MatchingContext<'_, Simple>,
    ) -> bool {
        self.list
            .slice()
            .iter()
            .any(|selector| matching::matches_selector(selector, 0, None, element, context))
    }
}

fn new_context(caches: &mut SelectorCaches) -> MatchingContext<'_, Simple> {
    MatchingContext::new(
        MatchingMode::Normal,
        None,
        caches,
        QuirksMode::NoQuirks,
        NeedsSelectorFlags::No,
        MatchingForInvalidation::No,
    )
}

/// Borrowed element handle handed to the `selectors` matcher
#[derive(Clone, Copy)]
pub struct ElementRef<'a> {
    doc: &'a Document,
    id: NodeId,
    data: &'a ElementData,
}

impl<'a> ElementRef<'a> {
    /// `None` unless `id` is an element
    pub fn new(doc: &'a Document, id: NodeId) -> Option<Self> {
        doc.element(id).map(|data| Self { doc, id, data })
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    fn siblings(&self) -> (&'a [NodeId], usize) {
        let Some(parent) = self.doc.parent(self.id) else {
            return (&[], 0);
        };
        let siblings = self.doc.children(parent);
        let position = siblings.iter().position(|&n| n == self.id).unwrap_or(0);
        (siblings, position)
    }

    fn attr(&self, name: &str) -> Option<&'a str> {
        self.data
            .attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

impl fmt::Debug for ElementRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.doc.describe(self.id))
    }
}

impl Element for ElementRef<'_> {
    type Impl = Simple;

    fn opaque(&self) -> OpaqueElement {
        OpaqueElement::new(self.data)
    }

    fn parent_element(&self) -> Option<Self> {
        self.doc
            .parent(self.id)
            .and_then(|parent| Self::new(self.doc, parent))
    }

    fn parent_node_is_shadow_root(&self) -> bool {
        false
    }

    fn containing_shadow_host(&self) -> Option<Self> {
        None
    }

    fn is_pseudo_element(&self) -> bool {
        false
    }

    fn prev_sibling_element(&self) -> Option<Self> {
        let (siblings, position) = self.siblings();
        siblings[..position]
            .iter()
            .rev()
            .find_map(|&n| Self::new(self.doc, n))
    }

    fn next_sibling_element(&self) -> Option<Self> {
        let (siblings, position) = self.siblings();
        siblings
            .get(position + 1..)
            .unwrap_or_default()
            .iter()
            .find_map(|&n| Self::new(self.doc, n))
    }

    fn first_element_child(&self) -> Option<Self> {
        self.doc
            .children(self.id)
            .iter()
            .find_map(|&n| Self::new(self.doc, n))
    }

    fn is_html_element_in_html_document(&self) -> bool {
        true
    }

    fn has_local_name(&self, name: &CssLocalName) -> bool {
        self.data.name.as_str() == &*name.0
    }

    fn has_namespace(&self, ns: &<Simple as SelectorImpl>::BorrowedNamespaceUrl) -> bool {
        &**ns == HTML_NAMESPACE
    }

    fn is_same_type(&self, other: &Self) -> bool {
        self.data.name == other.data.name
    }

    fn attr_matches(
        &self,
        ns: &NamespaceConstraint<&<Simple as SelectorImpl>::NamespaceUrl>,
        local_name: &CssLocalName,
        operation: &AttrSelectorOperation<&CssString>,
    ) -> bool {
        // Parsed attributes carry no namespace
        if let NamespaceConstraint::Specific(url) = ns {
            if !url.is_empty() {
                return false;
            }
        }
        self.data
            .attrs
            .iter()
            .any(|(key, value)| key.as_str() == &*local_name.0 && operation.eval_str(value))
    }

    fn match_non_ts_pseudo_class(
        &self,
        _pc: &NonTSPseudoClass,
        _context: &mut MatchingContext<'_, Self::Impl>,
    ) -> bool {
        false
    }

    fn match_pseudo_element(
        &self,
        _pe: &PseudoElement,
        _context: &mut MatchingContext<'_, Self::Impl>,
    ) -> bool {
        false
    }

    fn apply_selector_flags(&self, _flags: ElementSelectorFlags) {}

    fn is_link(&self) -> bool {
        matches!(self.data.name.as_str(), "a" | "area" | "link") && self.attr("href").is_some()
    }

    fn is_html_slot_element(&self) -> bool {
        self.data.name == "slot"
    }

    fn has_id(&self, id: &CssLocalName, case_sensitivity: CaseSensitivity) -> bool {
        self.attr("id")
            .is_some_and(|value| case_sensitivity.eq(id.0.as_bytes(), value.as_bytes()))
    }

    fn has_class(&self, name: &CssLocalName, case_sensitivity: CaseSensitivity) -> bool {
        self.attr("class").is_some_and(|classes| {
            classes
                .split_whitespace()
                .any(|class| case_sensitivity.eq(name.0.as_bytes(), class.as_bytes()))
        })
    }

    fn has_custom_state(&self, _name: &CssLocalName) -> bool {
        false
    }

    fn imported_part(&self, _name: &CssLocalName) -> Option<CssLocalName> {
        None
    }

    fn is_part(&self, _name: &CssLocalName) -> bool {
        false
    }

    fn is_empty(&self) -> bool {
        !self
            .doc
            .children(self.id)
            .iter()
            .any(|&child| match self.doc.kind(child) {
                NodeKind::Element(_) => true,
                NodeKind::Text(text) => !text.is_empty(),
                _ => false,
            })
    }

    fn is_root(&self) -> bool {
        self.doc
            .parent(self.id)
            .is_some_and(|parent| matches!(self.doc.kind(parent), NodeKind::Document))
    }

    fn add_element_unique_hashes(&self, _filter: &mut BloomFilter) -> bool {
        false
    }
}
