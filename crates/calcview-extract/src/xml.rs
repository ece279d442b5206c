//! Namespace-aware element tree
//!
//! Reads the whole document with `quick-xml` into a small owned tree so the
//! extractor can navigate parents and children freely. Every element and
//! attribute carries its resolved namespace URI.

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;

/// Calculation view model namespace
pub const CALCULATION_NS: &str = "http://www.sap.com/ndb/BiModelCalculation.ecore";

/// XML Schema instance namespace (carries `xsi:type`)
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Logical namespace aliases understood by the extractor
pub const NAMESPACES: &[(&str, &str)] = &[("Calculation", CALCULATION_NS), ("xsi", XSI_NS)];

/// Look up the URI registered for a namespace alias
pub fn namespace(alias: &str) -> Option<&'static str> {
    NAMESPACES
        .iter()
        .find(|(name, _)| *name == alias)
        .map(|(_, uri)| *uri)
}

/// Raised when the input is not well-formed XML
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("XML parsing failed at line {line}, column {column}: {message}")]
pub struct DocumentParseError {
    /// Parser diagnostic
    pub message: String,

    /// Byte offset into the document
    pub offset: u64,

    /// 1-indexed line of the failure
    pub line: usize,

    /// 1-indexed column of the failure
    pub column: usize,
}

impl DocumentParseError {
    fn at(xml: &str, position: u64, message: impl Into<String>) -> Self {
        let (line, column) = line_column(xml, position);
        Self {
            message: message.into(),
            offset: position,
            line,
            column,
        }
    }
}

/// An attribute with its resolved namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub namespace: Option<String>,
    pub local_name: String,

    /// Name as written, prefix included
    pub qualified_name: String,

    pub value: String,
}

/// An element with its attributes, children and direct text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub namespace: Option<String>,
    pub local_name: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Element>,
    text: String,
}

impl Element {
    /// Unqualified attribute value
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.is_none() && a.local_name == name)
            .map(|a| a.value.as_str())
    }

    /// Attribute value in a specific namespace
    pub fn attr_ns(&self, namespace_uri: &str, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.as_deref() == Some(namespace_uri) && a.local_name == name)
            .map(|a| a.value.as_str())
    }

    /// Whether this element has the given local name and sits either in no
    /// namespace or in the calculation view namespace
    pub fn is(&self, name: &str) -> bool {
        self.local_name == name
            && self.namespace.as_deref().map_or(true, |ns| ns == CALCULATION_NS)
    }

    /// First direct child with the given name
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.is(name))
    }

    /// Direct children with the given name, in document order
    pub fn children<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.is(name))
    }

    /// Concatenated direct text content
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Namespace bound to the reserved `xml` prefix
const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Parse a document into its root element
///
/// Rejects anything that is not well-formed: illegal characters, invalid
/// names, unbound prefixes, malformed attribute lists, misplaced
/// declarations, and content outside a single root element.
pub fn parse_document(xml: &str) -> Result<Element, DocumentParseError> {
    if let Some((offset, ch)) = xml.char_indices().find(|(_, ch)| !is_xml_char(*ch)) {
        return Err(DocumentParseError::at(
            xml,
            offset as u64,
            format!("illegal character U+{:04X}", ch as u32),
        ));
    }

    let mut reader = NsReader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;
    let mut first_event = true;

    loop {
        let offset = reader.buffer_position() as u64;
        let event = reader
            .read_event()
            .map_err(|e| DocumentParseError::at(xml, reader.error_position() as u64, e.to_string()))?;
        let fail = |message: String| DocumentParseError::at(xml, offset, message);

        match event {
            Event::Start(start) => {
                let element = open_element(&reader, &start).map_err(fail)?;
                stack.push(element);
            }
            Event::Empty(start) => {
                let element = open_element(&reader, &start).map_err(fail)?;
                attach(element, &mut stack, &mut root).map_err(fail)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| fail("unexpected closing tag".to_string()))?;
                attach(element, &mut stack, &mut root).map_err(fail)?;
            }
            Event::Text(text) => {
                if contains(&text, b"]]>") {
                    return Err(fail("']]>' is not allowed in text".to_string()));
                }
                let value = text.unescape().map_err(|e| fail(e.to_string()))?;
                check_chars(&value).map_err(fail)?;
                push_text(&mut stack, &value).map_err(fail)?;
            }
            Event::CData(data) => {
                let value = String::from_utf8_lossy(&data.into_inner()).into_owned();
                if stack.is_empty() {
                    return Err(fail("CDATA outside of the root element".to_string()));
                }
                push_text(&mut stack, &value).map_err(fail)?;
            }
            Event::Comment(comment) => {
                if contains(&comment, b"--") || comment.ends_with(b"-") {
                    return Err(fail("'--' is not allowed in comments".to_string()));
                }
            }
            Event::Decl(_) => {
                if !first_event {
                    return Err(fail(
                        "XML declaration is only allowed at the start of the document".to_string(),
                    ));
                }
            }
            Event::DocType(_) => {
                if root.is_some() || !stack.is_empty() {
                    return Err(fail("DOCTYPE after the root element".to_string()));
                }
            }
            Event::Eof => break,
            _ => {}
        }

        first_event = false;
    }

    if let Some(open) = stack.last() {
        return Err(DocumentParseError::at(
            xml,
            reader.buffer_position() as u64,
            format!("unclosed element <{}>", open.local_name),
        ));
    }

    root.ok_or_else(|| DocumentParseError::at(xml, reader.buffer_position() as u64, "no root element"))
}

/// Namespace URI of a resolved name; unbound prefixes are an error
fn bound_namespace(resolved: &ResolveResult<'_>) -> Result<Option<String>, String> {
    match resolved {
        ResolveResult::Bound(ns) => Ok(Some(String::from_utf8_lossy(ns.as_ref()).into_owned())),
        ResolveResult::Unbound => Ok(None),
        ResolveResult::Unknown(prefix) if prefix.as_slice() == b"xml" => Ok(Some(XML_NS.to_string())),
        ResolveResult::Unknown(prefix) => Err(format!(
            "unbound namespace prefix '{}'",
            String::from_utf8_lossy(prefix)
        )),
    }
}

fn open_element(reader: &NsReader<&[u8]>, start: &BytesStart<'_>) -> Result<Element, String> {
    let qualified_name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    if !is_qname(&qualified_name) {
        return Err(format!("invalid element name '{}'", qualified_name));
    }

    let raw = start.attributes_raw();
    check_attribute_list(raw.strip_suffix(b"/").unwrap_or(raw))?;

    let (resolved, _) = reader.resolve_element(start.name());
    let namespace = bound_namespace(&resolved)?;
    let mut attributes = Vec::new();

    for attr in start.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;

        let qualified_name = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        if !is_qname(&qualified_name) {
            return Err(format!("invalid attribute name '{}'", qualified_name));
        }
        if qualified_name == "xmlns" || qualified_name.starts_with("xmlns:") {
            continue;
        }

        let (resolved, local) = reader.resolve_attribute(attr.key);
        let value = attr.unescape_value().map_err(|e| e.to_string())?;
        check_chars(&value)?;

        attributes.push(Attribute {
            namespace: bound_namespace(&resolved)?,
            local_name: String::from_utf8_lossy(local.as_ref()).into_owned(),
            qualified_name,
            value: value.into_owned(),
        });
    }

    Ok(Element {
        namespace,
        local_name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
        attributes,
        children: Vec::new(),
        text: String::new(),
    })
}

/// Check the raw attribute list of a start tag
///
/// Every attribute is preceded by whitespace and has a quoted value that
/// does not contain `<`.
fn check_attribute_list(raw: &[u8]) -> Result<(), String> {
    let skip_whitespace = |mut i: usize| {
        while raw.get(i).map_or(false, |b| is_xml_whitespace(*b)) {
            i += 1;
        }
        i
    };

    let mut i = 0;
    loop {
        let name_start = skip_whitespace(i);
        if name_start == raw.len() {
            return Ok(());
        }
        if name_start == i {
            return Err("attributes must be separated by whitespace".to_string());
        }

        i = name_start;
        while raw.get(i).map_or(false, |b| *b != b'=' && !is_xml_whitespace(*b)) {
            i += 1;
        }
        i = skip_whitespace(i);
        if raw.get(i) != Some(&b'=') {
            return Err("attribute without a value".to_string());
        }

        i = skip_whitespace(i + 1);
        let quote = match raw.get(i) {
            Some(&q) if q == b'"' || q == b'\'' => q,
            _ => return Err("attribute value must be quoted".to_string()),
        };

        let value_start = i + 1;
        let value_end = raw[value_start..]
            .iter()
            .position(|b| *b == quote)
            .map(|len| value_start + len)
            .ok_or_else(|| "unterminated attribute value".to_string())?;
        if raw[value_start..value_end].contains(&b'<') {
            return Err("'<' is not allowed in attribute values".to_string());
        }

        i = value_end + 1;
    }
}

fn attach(element: Element, stack: &mut [Element], root: &mut Option<Element>) -> Result<(), String> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        return Ok(());
    }

    if root.is_some() {
        return Err(format!("junk after document element: <{}>", element.local_name));
    }

    *root = Some(element);
    Ok(())
}

fn push_text(stack: &mut [Element], text: &str) -> Result<(), String> {
    match stack.last_mut() {
        Some(current) => {
            current.text.push_str(text);
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err("text outside of the root element".to_string()),
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

fn check_chars(value: &str) -> Result<(), String> {
    match value.chars().find(|ch| !is_xml_char(*ch)) {
        Some(ch) => Err(format!("illegal character U+{:04X}", ch as u32)),
        None => Ok(()),
    }
}

/// `Char` production of XML 1.0
fn is_xml_char(ch: char) -> bool {
    matches!(ch,
        '\t' | '\n' | '\r'
        | '\u{20}'..='\u{D7FF}'
        | '\u{E000}'..='\u{FFFD}'
        | '\u{10000}'..='\u{10FFFF}')
}

fn is_xml_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\r' | b'\n')
}

fn is_name_start_char(ch: char) -> bool {
    matches!(ch,
        'A'..='Z' | 'a'..='z' | '_'
        | '\u{C0}'..='\u{D6}'
        | '\u{D8}'..='\u{F6}'
        | '\u{F8}'..='\u{2FF}'
        | '\u{370}'..='\u{37D}'
        | '\u{37F}'..='\u{1FFF}'
        | '\u{200C}'..='\u{200D}'
        | '\u{2070}'..='\u{218F}'
        | '\u{2C00}'..='\u{2FEF}'
        | '\u{3001}'..='\u{D7FF}'
        | '\u{F900}'..='\u{FDCF}'
        | '\u{FDF0}'..='\u{FFFD}'
        | '\u{10000}'..='\u{EFFFF}')
}

fn is_name_char(ch: char) -> bool {
    is_name_start_char(ch)
        || matches!(ch,
            '-' | '.' | '0'..='9' | '\u{B7}'
            | '\u{300}'..='\u{36F}'
            | '\u{203F}'..='\u{2040}')
}

/// Name without a colon
fn is_ncname(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().map_or(false, is_name_start_char) && chars.all(is_name_char)
}

/// Optionally prefixed name (`prefix:local` or `local`)
fn is_qname(name: &str) -> bool {
    match name.split_once(':') {
        Some((prefix, local)) => is_ncname(prefix) && is_ncname(local),
        None => is_ncname(name),
    }
}

/// 1-indexed line and column (in characters) for a byte offset
fn line_column(xml: &str, position: u64) -> (usize, usize) {
    let end = usize::try_from(position).unwrap_or(usize::MAX).min(xml.len());
    let before = &xml.as_bytes()[..end];
    let line_start = before
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |newline| newline + 1);

    let line = before.iter().filter(|&&b| b == b'\n').count() + 1;
    let column = String::from_utf8_lossy(&before[line_start..]).chars().count() + 1;
    (line, column)
}
