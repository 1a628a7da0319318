//! Generic tree document backing both persisted stores.
//!
//! Save files are plain XML. The stores only need an element tree (name,
//! attributes, optional text, ordered children), so the whole file is read
//! into [`Element`] values and written back from them.

use std::{borrow::Cow, fs, path::Path};

use quick_xml::{
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event as XmlEvent},
    Reader, Writer,
};

use crate::DocumentError;

/// Attribute carrying the concrete object builder type of a node.
pub const TYPE_ATTRIBUTE: &str = "xsi:type";

const INDENT_WIDTH: usize = 2;

/// Single node of a tree document.
#[derive(Clone, Debug, PartialEq)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    text: Option<String>,
    children: Vec<Element>,
}

impl Element {
    /// Creates an element without attributes, text, or children.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            text: None,
            children: Vec::new(),
        }
    }

    /// Returns the element with the attribute set to the provided value.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(key, value);
        self
    }

    /// Returns the element with its text replaced.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Returns the element with the child appended.
    #[must_use]
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Tag name of the element.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Looks up an attribute value by key.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(candidate, _)| candidate == key)
            .map(|(_, value)| value.as_str())
    }

    /// Inserts or replaces an attribute.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self
            .attributes
            .iter_mut()
            .find(|(candidate, _)| *candidate == key)
        {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    /// Concrete builder type recorded in the `xsi:type` attribute.
    #[must_use]
    pub fn type_id(&self) -> Option<&str> {
        self.attribute(TYPE_ATTRIBUTE)
    }

    /// Text content of the element, if any.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Replaces the text content of the element.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = Some(text.into());
    }

    /// Ordered children of the element.
    #[must_use]
    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// Appends a child after the existing ones.
    pub fn push_child(&mut self, child: Element) {
        self.children.push(child);
    }

    /// Removes and returns every child, leaving the element itself in place.
    pub fn take_children(&mut self) -> Vec<Element> {
        std::mem::take(&mut self.children)
    }

    /// Replaces every child of the element.
    pub fn replace_children(&mut self, children: Vec<Element>) {
        self.children = children;
    }

    /// First child carrying the provided tag name.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.name == name)
    }

    /// Mutable access to the first child carrying the provided tag name.
    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.children.iter_mut().find(|child| child.name == name)
    }

    /// Follows a chain of child names from this element.
    #[must_use]
    pub fn descendant(&self, path: &[&str]) -> Option<&Element> {
        path.iter()
            .try_fold(self, |element, name| element.child(name))
    }

    /// Mutable variant of [`Element::descendant`].
    pub fn descendant_mut(&mut self, path: &[&str]) -> Option<&mut Element> {
        let mut current = self;
        for name in path {
            current = current.child_mut(name)?;
        }
        Some(current)
    }

    /// Trimmed text of the first child carrying the provided tag name.
    #[must_use]
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name)
            .and_then(Element::text)
            .map(str::trim)
    }

    /// Iterates over every child carrying the provided tag name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// Sets the text of the named child, appending the child when absent.
    pub fn set_child_text(&mut self, name: &str, text: impl Into<String>) {
        match self.child_mut(name) {
            Some(child) => child.set_text(text),
            None => self.children.push(Element::new(name).with_text(text)),
        }
    }

    /// Removes every child carrying the provided tag name, returning how many were dropped.
    pub fn remove_children_named(&mut self, name: &str) -> usize {
        let before = self.children.len();
        self.children.retain(|child| child.name != name);
        before - self.children.len()
    }

    fn append_text(&mut self, fragment: &str) {
        match &mut self.text {
            Some(text) => text.push_str(fragment),
            None => self.text = Some(fragment.to_owned()),
        }
    }
}

/// Whole tree document with a single root element.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    root: Element,
}

impl Document {
    /// Wraps an element as the document root.
    #[must_use]
    pub fn new(root: Element) -> Self {
        Self { root }
    }

    /// Root element of the document.
    #[must_use]
    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Mutable access to the root element.
    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    /// Consumes the document and returns its root element.
    #[must_use]
    pub fn into_root(self) -> Element {
        self.root
    }

    /// Reads and parses the document stored at the provided path.
    ///
    /// Bytes that are not valid UTF-8 are replaced with U+FFFD rather than
    /// rejected, and the replacement is what a later write stores.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let contents = String::from_utf8_lossy(&bytes);
        Self::parse(&contents)
    }

    /// Parses a document from its textual form.
    pub fn parse(source: &str) -> Result<Self, DocumentError> {
        let mut reader = Reader::from_str(source);

        let mut stack: Vec<Element> = Vec::new();
        let mut root = None;

        loop {
            match reader.read_event()? {
                XmlEvent::Start(start) => stack.push(element_from_start(&start)?),
                XmlEvent::Empty(start) => {
                    let element = element_from_start(&start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                XmlEvent::End(_) => {
                    let element = stack.pop().ok_or(DocumentError::Malformed(
                        "closing tag without matching opening tag",
                    ))?;
                    attach(&mut stack, &mut root, element)?;
                }
                XmlEvent::Text(text) => {
                    if let Some(current) = stack.last_mut() {
                        let fragment = text
                            .unescape()
                            .unwrap_or_else(|_| String::from_utf8_lossy(&text).into_owned().into());
                        // Indentation between elements; values keep their padding.
                        if !fragment.trim().is_empty() {
                            current.append_text(&fragment);
                        }
                    }
                }
                XmlEvent::CData(data) => {
                    if let Some(current) = stack.last_mut() {
                        current.append_text(&String::from_utf8_lossy(&data.into_inner()));
                    }
                }
                XmlEvent::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(DocumentError::Malformed("document ended inside an element"));
        }

        root.map(Self::new)
            .ok_or(DocumentError::Malformed("document has no root element"))
    }

    /// Serializes the document with the declaration Space Engineers expects.
    pub fn to_xml_string(&self) -> Result<String, DocumentError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', INDENT_WIDTH);
        writer.write_event(XmlEvent::Decl(BytesDecl::new("1.0", None, None)))?;
        write_element(&mut writer, &self.root)?;
        let mut bytes = writer.into_inner();
        bytes.push(b'\n');
        String::from_utf8(bytes).map_err(|_| DocumentError::Malformed("serialized document is not UTF-8"))
    }

    /// Serializes the document and writes it to the provided path.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), DocumentError> {
        let path = path.as_ref();
        let contents = self.to_xml_string()?;
        fs::write(path, contents).map_err(|source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element, DocumentError> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    for attribute in start.attributes() {
        let attribute = attribute.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .unwrap_or_else(|_| Cow::Owned(String::from_utf8_lossy(&attribute.value).into_owned()));
        element.attributes.push((key, value.into_owned()));
    }
    Ok(element)
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), DocumentError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(element);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(DocumentError::Malformed("document has more than one root element")),
    }
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<(), DocumentError> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() && element.text.is_none() {
        writer.write_event(XmlEvent::Empty(start))?;
        return Ok(());
    }

    writer.write_event(XmlEvent::Start(start))?;
    if let Some(text) = &element.text {
        writer.write_event(XmlEvent::Text(BytesText::new(text)))?;
    }
    for child in &element.children {
        write_element(writer, child)?;
    }
    writer.write_event(XmlEvent::End(BytesEnd::new(element.name.as_str())))?;
    Ok(())
}
