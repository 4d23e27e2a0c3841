//! Event-driven XML reader producing a namespace-stripped element tree.

use ccda_model::XmlNode;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::ParseError;

/// Parse a whole XML document into an [`XmlNode`] tree.
///
/// Element and attribute names are reduced to their local part, so `cda:code`
/// and `code` become the same element. Text content is unescaped and
/// whitespace-trimmed.
pub fn build_tree(xml: &str) -> Result<XmlNode, ParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => stack.push(element_from(&start)?),
            Event::Empty(start) => {
                let node = element_from(&start)?;
                attach(&mut stack, &mut root, node);
            }
            Event::End(_) => {
                // The reader checks tag balance, so the stack cannot be empty.
                if let Some(node) = stack.pop() {
                    attach(&mut stack, &mut root, node);
                }
            }
            Event::Text(text) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(text.unescape()?.trim());
                }
            }
            Event::CData(cdata) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(String::from_utf8_lossy(&cdata).trim());
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    root.ok_or(ParseError::NoRootElement)
}

fn element_from(start: &BytesStart<'_>) -> Result<XmlNode, ParseError> {
    let mut node = XmlNode::new(local_part(start.name().as_ref()));
    for attr in start.attributes() {
        let attr = attr?;
        let key = local_part(attr.key.as_ref()).to_string();
        let value = attr.unescape_value()?.into_owned();
        node.attributes.push((key, value));
    }
    Ok(node)
}

fn attach(stack: &mut Vec<XmlNode>, root: &mut Option<XmlNode>, node: XmlNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => {
            if root.is_none() {
                *root = Some(node);
            }
        }
    }
}

fn local_part(name: &[u8]) -> String {
    let text = String::from_utf8_lossy(name);
    match text.rsplit_once(':') {
        Some((_, local)) => local.to_string(),
        None => text.into_owned(),
    }
}
