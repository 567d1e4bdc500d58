//! Owned XML trees for package parts.
//!
//! Parts are small enough to hold in memory, and the patcher needs random
//! access (replace a node in place, splice children), so events from
//! `quick-xml` are folded into an owned tree. Attribute values and text are
//! kept in their escaped form, which makes untouched content round-trip
//! byte-for-byte apart from the declaration.

use crate::error::{PatchError, Result};
use quick_xml::escape::{escape, unescape};
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::borrow::Cow;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(Element),
    /// Escaped character data, entity references included verbatim.
    Text(String),
    CData(String),
    Comment(String),
    ProcessingInstruction(String),
}

impl XmlNode {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            XmlNode::Element(el) => Some(el),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Parse a standalone serialized element (e.g. a snapshot fragment).
    pub fn parse_fragment(content: &str) -> Result<Self> {
        Ok(XmlDocument::parse(content)?.root)
    }

    /// Element name without its namespace prefix.
    pub fn local_name(&self) -> &str {
        local_name(&self.name)
    }

    pub fn is(&self, local: &str) -> bool {
        self.local_name() == local
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Unescaped attribute value.
    pub fn attr(&self, name: &str) -> Option<Cow<'_, str>> {
        self.raw_attr(name)
            .map(|raw| unescape(raw).unwrap_or(Cow::Borrowed(raw)))
    }

    pub fn raw_attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn attr_u32(&self, name: &str) -> Option<u32> {
        self.attr(name).and_then(|v| v.trim().parse().ok())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.raw_attr(name).is_some()
    }

    /// Set an attribute, keeping its position when it already exists.
    pub fn set_attr(&mut self, name: &str, value: &str) {
        let escaped = escape(value).into_owned();
        match self.attributes.iter_mut().find(|(key, _)| key == name) {
            Some(slot) => slot.1 = escaped,
            None => self.attributes.push((name.to_string(), escaped)),
        }
    }

    /// Raw `(name, escaped value)` pairs in document order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(el) => Some(el),
            _ => None,
        })
    }

    pub fn child_elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|node| match node {
            XmlNode::Element(el) => Some(el),
            _ => None,
        })
    }

    pub fn child(&self, local: &str) -> Option<&Element> {
        self.child_elements().find(|el| el.is(local))
    }

    pub fn push_child(&mut self, child: Element) {
        self.children.push(XmlNode::Element(child));
    }

    /// Drop child elements for which `keep` returns false. Text, comments and
    /// other node kinds are left alone.
    pub fn retain_child_elements<F>(&mut self, mut keep: F)
    where
        F: FnMut(&Element) -> bool,
    {
        self.children.retain(|node| match node {
            XmlNode::Element(el) => keep(el),
            _ => true,
        });
    }

    /// Concatenated, unescaped text of the direct text children.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            match node {
                XmlNode::Text(raw) => out.push_str(&unescape(raw).unwrap_or(Cow::Borrowed(raw))),
                XmlNode::CData(data) => out.push_str(data),
                _ => {}
            }
        }
        out
    }

    pub fn set_text(&mut self, text: &str) {
        self.children.retain(|node| {
            !matches!(node, XmlNode::Text(_) | XmlNode::CData(_))
        });
        self.children
            .push(XmlNode::Text(escape(text).into_owned()));
    }

    /// First element in pre-order (this one included) matching `predicate`.
    pub fn find<P>(&self, predicate: &P) -> Option<&Element>
    where
        P: Fn(&Element) -> bool,
    {
        if predicate(self) {
            return Some(self);
        }
        self.child_elements().find_map(|child| child.find(predicate))
    }

    /// Pre-order traversal over this element and all descendants.
    pub fn walk<F>(&self, f: &mut F)
    where
        F: FnMut(&Element),
    {
        f(self);
        for child in self.child_elements() {
            child.walk(f);
        }
    }

    /// Pre-order traversal; `f` runs before the element's children are
    /// visited, so it may restructure them.
    pub fn walk_mut<F>(&mut self, f: &mut F)
    where
        F: FnMut(&mut Element),
    {
        f(self);
        for child in self.child_elements_mut() {
            child.walk_mut(f);
        }
    }

    /// Like [`Element::walk_mut`], also handing `f` the namespace scope its
    /// children will see.
    pub fn walk_scoped_mut<F>(&mut self, inherited: &NamespaceScope, f: &mut F)
    where
        F: FnMut(&mut Element, &NamespaceScope),
    {
        let scope = inherited.enter(self);
        f(self, &scope);
        for child in self.child_elements_mut() {
            child.walk_scoped_mut(&scope, f);
        }
    }
}

/// A parsed part: optional declaration plus a single root element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    pub declaration: bool,
    pub root: Element,
}

impl XmlDocument {
    pub fn new(root: Element) -> Self {
        Self {
            declaration: true,
            root,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        let content = std::str::from_utf8(bytes)
            .map_err(|e| PatchError::XmlParsing(format!("Part is not valid UTF-8: {}", e)))?;
        Self::parse(content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut reader = Reader::from_str(content);
        reader.config_mut().trim_text(false);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;
        let mut declaration = false;

        loop {
            match reader.read_event()? {
                Event::Decl(_) => declaration = true,
                Event::Start(ref e) => stack.push(element_from_start(e)?),
                Event::Empty(ref e) => {
                    let element = element_from_start(e)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack.pop().ok_or_else(|| {
                        PatchError::XmlParsing("Unexpected closing tag".to_string())
                    })?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(ref t) => {
                    if let Some(parent) = stack.last_mut() {
                        push_raw_text(parent, &String::from_utf8_lossy(t));
                    }
                }
                Event::GeneralRef(ref r) => {
                    if let Some(parent) = stack.last_mut() {
                        push_raw_text(parent, &format!("&{};", String::from_utf8_lossy(r)));
                    }
                }
                Event::CData(ref c) => {
                    if let Some(parent) = stack.last_mut() {
                        parent
                            .children
                            .push(XmlNode::CData(String::from_utf8_lossy(c).into_owned()));
                    }
                }
                Event::Comment(ref c) => {
                    if let Some(parent) = stack.last_mut() {
                        parent
                            .children
                            .push(XmlNode::Comment(String::from_utf8_lossy(c).into_owned()));
                    }
                }
                Event::PI(ref pi) => {
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(XmlNode::ProcessingInstruction(
                            String::from_utf8_lossy(pi).into_owned(),
                        ));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(PatchError::XmlParsing(format!(
                "Unclosed element <{}>",
                stack[stack.len() - 1].name
            )));
        }

        let root =
            root.ok_or_else(|| PatchError::XmlParsing("Document has no root element".to_string()))?;

        Ok(Self { declaration, root })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new(Vec::new());
        if self.declaration {
            writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
            writer.write_event(Event::Text(BytesText::from_escaped("\r\n")))?;
        }
        write_element(&mut writer, &self.root)?;
        Ok(writer.into_inner())
    }
}

/// Namespace declarations in scope at an element, keyed by attribute name
/// (`xmlns` for the default namespace, `xmlns:p` for prefixes).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceScope {
    bindings: HashMap<String, String>,
}

impl NamespaceScope {
    pub fn of(element: &Element) -> Self {
        Self::default().enter(element)
    }

    /// Scope seen by the children of `element`.
    pub fn enter(&self, element: &Element) -> Self {
        let mut scope = self.clone();
        for (key, value) in &element.attributes {
            if is_namespace_declaration(key) {
                scope.bindings.insert(key.clone(), value.clone());
            }
        }
        scope
    }

    fn restates(&self, key: &str, value: &str) -> bool {
        self.bindings.get(key).is_some_and(|bound| bound == value)
    }
}

/// Remove declarations on `element` and its descendants that restate a
/// binding already in scope.
///
/// Fragments serialized on their own carry their own `xmlns` declarations;
/// once spliced under `inherited` those either duplicate the host's or are
/// genuine overrides, and only the duplicates go.
pub fn normalize_namespaces(element: &mut Element, inherited: &NamespaceScope) {
    element
        .attributes
        .retain(|(key, value)| !(is_namespace_declaration(key) && inherited.restates(key, value)));

    let scope = inherited.enter(element);
    for child in element.child_elements_mut() {
        normalize_namespaces(child, &scope);
    }
}

fn is_namespace_declaration(key: &str) -> bool {
    key == "xmlns" || key.starts_with("xmlns:")
}

pub fn local_name(name: &str) -> &str {
    name.rsplit_once(':').map(|(_, local)| local).unwrap_or(name)
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    for attr in start.attributes() {
        let attr = attr?;
        element.attributes.push((
            String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
            String::from_utf8_lossy(&attr.value).into_owned(),
        ));
    }
    Ok(element)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(XmlNode::Element(element));
        return Ok(());
    }
    if root.is_some() {
        return Err(PatchError::XmlParsing(
            "Document has more than one root element".to_string(),
        ));
    }
    *root = Some(element);
    Ok(())
}

fn push_raw_text(parent: &mut Element, raw: &str) {
    if let Some(XmlNode::Text(existing)) = parent.children.last_mut() {
        existing.push_str(raw);
    } else {
        parent.children.push(XmlNode::Text(raw.to_string()));
    }
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<()> {
    let mut content = element.name.clone();
    for (key, value) in &element.attributes {
        // Values are stored escaped; pick the quote the raw value cannot contain.
        if value.contains('"') {
            content.push_str(&format!(" {}='{}'", key, value));
        } else {
            content.push_str(&format!(" {}=\"{}\"", key, value));
        }
    }
    let start = BytesStart::from_content(content, element.name.len());

    if element.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    for child in &element.children {
        match child {
            XmlNode::Element(el) => write_element(writer, el)?,
            XmlNode::Text(raw) => {
                writer.write_event(Event::Text(BytesText::from_escaped(raw.as_str())))?
            }
            XmlNode::CData(data) => {
                writer.write_event(Event::CData(BytesCData::new(data.as_str())))?
            }
            XmlNode::Comment(raw) => {
                writer.write_event(Event::Comment(BytesText::from_escaped(raw.as_str())))?
            }
            XmlNode::ProcessingInstruction(raw) => {
                writer.write_event(Event::PI(BytesPI::new(raw.as_str())))?
            }
        }
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;
    Ok(())
}
