//! Owned XML element tree for OOXML parts
//!
//! `roxmltree` gives a read-only view of a part. Template assembly needs to
//! clone, insert and remove elements, so each part that is touched is converted
//! once into this owned tree and serialized back when the package is written.
//!
//! Qualified names are kept exactly as `prefix:local`, and namespace
//! declarations are kept as ordinary `xmlns:*` attributes on the element that
//! declared them, so a part survives a parse/serialize cycle with the same
//! prefixes Word wrote.

/// WordprocessingML main namespace
pub const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// Office document relationships namespace
pub const R_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// The implicit `xml:` namespace
const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Elements whose whitespace-only text content is significant
const TEXT_ELEMENTS: &[&str] = &["w:t", "w:delText", "w:instrText"];

/// A node in the owned tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    /// Nested element
    Element(XmlElement),
    /// Character data (already unescaped)
    Text(String),
}

/// An owned XML element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    /// Qualified name, e.g. `w:p`
    pub name: String,
    /// Attributes in document order, qualified names as written
    pub attributes: Vec<(String, String)>,
    /// Child nodes in document order
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    /// Create an empty element
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder: add an attribute
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Builder: append a child element
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    /// Builder: append a text node
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(text.into()));
        self
    }

    /// Check the qualified name
    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    /// Attribute value by qualified name
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Set or replace an attribute
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    /// Child elements in order
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text(_) => None,
        })
    }

    /// Mutable child elements in order
    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut XmlElement> {
        self.children.iter_mut().filter_map(|node| match node {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text(_) => None,
        })
    }

    /// Child elements with the given qualified name
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.elements().filter(move |element| element.is(name))
    }

    /// First child element with the given qualified name
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.elements().find(|element| element.is(name))
    }

    /// First mutable child element with the given qualified name
    pub fn child_mut(&mut self, name: &str) -> Option<&mut XmlElement> {
        self.elements_mut().find(|element| element.is(name))
    }

    /// Append a child element
    pub fn push(&mut self, child: XmlElement) {
        self.children.push(XmlNode::Element(child));
    }

    /// Remove every child element with the given name
    pub fn remove_children_named(&mut self, name: &str) {
        self.children
            .retain(|node| !matches!(node, XmlNode::Element(element) if element.is(name)));
    }

    /// Edit a child element, creating it as the first child if missing
    ///
    /// Property containers (`w:pPr`, `w:rPr`, `w:tcPr`) must lead their parent.
    pub fn edit_first_child<R>(&mut self, name: &str, edit: impl FnOnce(&mut XmlElement) -> R) -> R {
        let position = self.children.iter().position(
            |node| matches!(node, XmlNode::Element(element) if element.is(name)),
        );
        let mut child = match position {
            Some(index) => match self.children.remove(index) {
                XmlNode::Element(element) => element,
                XmlNode::Text(_) => XmlElement::new(name),
            },
            None => XmlElement::new(name),
        };
        let result = edit(&mut child);
        self.children
            .insert(position.unwrap_or(0), XmlNode::Element(child));
        result
    }

    /// Insert or replace a child, keeping the schema order given by `order`
    ///
    /// Children not listed in `order` are treated as coming after every listed
    /// name.
    pub fn set_ordered_child(&mut self, child: XmlElement, order: &[&str]) {
        let rank = |name: &str| order.iter().position(|n| *n == name).unwrap_or(order.len());
        let child_rank = rank(&child.name);

        if let Some(existing) = self.child_mut(&child.name) {
            *existing = child;
            return;
        }

        let insert_at = self
            .children
            .iter()
            .position(|node| match node {
                XmlNode::Element(element) => rank(&element.name) > child_rank,
                XmlNode::Text(_) => false,
            })
            .unwrap_or(self.children.len());
        self.children.insert(insert_at, XmlNode::Element(child));
    }

    /// Concatenated character data of every descendant
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    /// Serialize this element (without an XML declaration)
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write_into(&mut out);
        out
    }

    fn write_into(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attributes {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape_xml(value));
            out.push('"');
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            match child {
                XmlNode::Element(element) => element.write_into(out),
                XmlNode::Text(text) => out.push_str(&escape_xml(text)),
            }
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

fn collect_text(element: &XmlElement, out: &mut String) {
    for child in &element.children {
        match child {
            XmlNode::Element(inner) => collect_text(inner, out),
            XmlNode::Text(text) => out.push_str(text),
        }
    }
}

/// Escape special XML characters
pub fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Parse a complete XML part into its root element
pub fn parse(text: &str) -> Result<XmlElement, roxmltree::Error> {
    let document = roxmltree::Document::parse(text)?;
    Ok(convert_element(document.root_element()))
}

/// Parse a snippet of WordprocessingML (one or more sibling elements)
///
/// The snippet may use the `w:` prefix without declaring it; any other prefix
/// must be declared inline, the same way Word writes drawing markup.
pub fn parse_fragment(xml: &str) -> Result<Vec<XmlElement>, roxmltree::Error> {
    let wrapped = format!(r#"<w:fragment xmlns:w="{}">{}</w:fragment>"#, W_NS, xml);
    let document = roxmltree::Document::parse(&wrapped)?;
    Ok(document
        .root_element()
        .children()
        .filter(|node| node.is_element())
        .map(convert_element)
        .collect())
}

/// Serialize a root element as a standalone XML part
pub fn to_part_bytes(root: &XmlElement) -> Vec<u8> {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n");
    root.write_into(&mut out);
    out.into_bytes()
}

type NamespaceBinding = (Option<String>, String);

fn namespace_bindings(node: roxmltree::Node<'_, '_>) -> Vec<NamespaceBinding> {
    node.namespaces()
        .map(|ns| (ns.name().map(str::to_string), ns.uri().to_string()))
        .collect()
}

fn convert_element(node: roxmltree::Node<'_, '_>) -> XmlElement {
    let tag = node.tag_name();
    let mut element = XmlElement::new(qualified_name(node, tag.namespace(), tag.name()));

    let inherited = node
        .parent_element()
        .map(namespace_bindings)
        .unwrap_or_default();
    for (prefix, uri) in namespace_bindings(node) {
        if uri == XML_NS || prefix.as_deref() == Some("xml") {
            continue;
        }
        if inherited.iter().any(|(p, u)| *p == prefix && *u == uri) {
            continue;
        }
        let key = match prefix {
            Some(prefix) => format!("xmlns:{}", prefix),
            None => "xmlns".to_string(),
        };
        element.attributes.push((key, uri));
    }

    for attribute in node.attributes() {
        let name = qualified_name(node, attribute.namespace(), attribute.name());
        element
            .attributes
            .push((name, attribute.value().to_string()));
    }

    let keeps_whitespace = TEXT_ELEMENTS.contains(&element.name.as_str());
    for child in node.children() {
        if child.is_element() {
            element.children.push(XmlNode::Element(convert_element(child)));
        } else if child.is_text() {
            let text = child.text().unwrap_or_default();
            if keeps_whitespace || !text.trim().is_empty() {
                element.children.push(XmlNode::Text(text.to_string()));
            }
        }
    }

    element
}

fn qualified_name(node: roxmltree::Node<'_, '_>, namespace: Option<&str>, local: &str) -> String {
    match namespace {
        Some(XML_NS) => format!("xml:{}", local),
        Some(uri) => match node.lookup_prefix(uri) {
            Some(prefix) if !prefix.is_empty() => format!("{}:{}", prefix, local),
            _ => local.to_string(),
        },
        None => local.to_string(),
    }
}
