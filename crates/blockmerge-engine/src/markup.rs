//! Workspace markup: locating the top-level blocks of a payload and writing
//! an updated payload back out.
//!
//! Parsing is event based. The root element's content is split into a
//! sequence of nodes: block elements, which are lifted out as [`Block`]s, and
//! everything else (text, comments, variable declarations, ...), which is kept
//! as raw markup in its original position. Serializing reassembles the
//! document from those slices, so untouched content is reproduced byte for
//! byte.

use std::collections::BTreeSet;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;

use crate::block::{Block, Declaration};
use crate::reconcile::Reconciliation;

/// Namespace the mergeable `block` elements live in.
pub const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";
pub const BLOCK_TAG: &str = "block";

#[derive(Debug, thiserror::Error)]
pub enum MarkupError {
    #[error("malformed markup at byte {position}: {reason}")]
    Malformed { position: usize, reason: String },

    #[error("block #{ordinal} has no id attribute")]
    MissingIdentifier { ordinal: usize },
}

impl MarkupError {
    /// Attach the file the markup came from.
    pub fn at(self, path: &Path) -> blockmerge_core::Error {
        match self {
            MarkupError::Malformed { position, reason } => blockmerge_core::Error::Parse {
                path: path.to_path_buf(),
                reason: format!("byte {position}: {reason}"),
            },
            MarkupError::MissingIdentifier { ordinal } => {
                blockmerge_core::Error::MissingIdentifier {
                    path: path.to_path_buf(),
                    ordinal,
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Markup(String),
    Block(Block),
}

/// A parsed workspace payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    /// Everything up to and including the root start tag.
    head: String,
    /// Namespace declarations made on the root element.
    namespaces: Vec<Declaration>,
    content: Vec<Node>,
    /// The root end tag and anything after it.
    tail: String,
}

/// Parse a payload and return its top-level blocks in document order.
pub fn extract_blocks(payload: &str) -> Result<Vec<Block>, MarkupError> {
    Ok(Workspace::parse(payload)?.blocks().cloned().collect())
}

impl Workspace {
    pub fn parse(payload: &str) -> Result<Self, MarkupError> {
        let mut reader = NsReader::from_str(payload);

        let mut depth = 0usize;
        let mut head: Option<String> = None;
        let mut tail: Option<String> = None;
        let mut namespaces: Vec<Declaration> = Vec::new();
        let mut content = Vec::new();
        // Start of root content not yet assigned to a node.
        let mut cursor = 0usize;
        // A block element currently being read: its start offset and attributes.
        let mut open_block: Option<(usize, Vec<(String, String)>)> = None;

        loop {
            let start = reader.buffer_position() as usize;
            let step = reader
                .read_resolved_event()
                .map(|(ns, event)| (in_xhtml(&ns), event));
            let (xhtml, event) = match step {
                Ok(step) => step,
                Err(err) => {
                    return Err(MarkupError::Malformed {
                        position: reader.error_position() as usize,
                        reason: err.to_string(),
                    })
                }
            };
            let end = reader.buffer_position() as usize;

            match event {
                Event::Start(e) => {
                    if depth == 0 {
                        if head.is_some() {
                            return Err(malformed(start, "more than one root element"));
                        }
                        head = Some(payload[..end].to_string());
                        namespaces = declarations(&e, start)?;
                        cursor = end;
                    } else if depth == 1 && xhtml && is_block(&e) {
                        flush(payload, cursor, start, &mut content);
                        open_block = Some((start, attributes(&e, start)?));
                    }
                    depth += 1;
                }
                Event::Empty(e) => {
                    if depth == 0 {
                        if head.is_some() {
                            return Err(malformed(start, "more than one root element"));
                        }
                        // `<xml/>` is opened up so blocks can be inserted.
                        let tag = &payload[start..end];
                        let open = tag.strip_suffix("/>").unwrap_or(tag).trim_end();
                        head = Some(format!("{}{}>", &payload[..start], open));
                        namespaces = declarations(&e, start)?;
                        let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                        tail = Some(format!("</{}>{}", name, &payload[end..]));
                    } else if depth == 1 && xhtml && is_block(&e) {
                        flush(payload, cursor, start, &mut content);
                        content.push(Node::Block(
                            Block::new(attributes(&e, start)?, &payload[start..end])
                                .with_scope(namespaces.clone()),
                        ));
                        cursor = end;
                    }
                }
                Event::End(_) => {
                    depth = depth
                        .checked_sub(1)
                        .ok_or_else(|| malformed(start, "unexpected closing tag"))?;
                    if depth == 1 {
                        if let Some((block_start, attrs)) = open_block.take() {
                            content.push(Node::Block(
                                Block::new(attrs, &payload[block_start..end])
                                    .with_scope(namespaces.clone()),
                            ));
                            cursor = end;
                        }
                    } else if depth == 0 {
                        flush(payload, cursor, start, &mut content);
                        tail = Some(payload[start..].to_string());
                    }
                }
                Event::Text(_) | Event::CData(_) if depth == 0 => {
                    if !payload[start..end].trim().is_empty() {
                        return Err(malformed(start, "text outside the root element"));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if depth != 0 {
            return Err(malformed(payload.len(), "root element is not closed"));
        }
        match (head, tail) {
            (Some(head), Some(tail)) => Ok(Self {
                head,
                namespaces,
                content,
                tail,
            }),
            _ => Err(malformed(0, "no root element")),
        }
    }

    /// Top-level blocks in document order.
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.content.iter().filter_map(|node| match node {
            Node::Block(block) => Some(block),
            Node::Markup(_) => None,
        })
    }

    /// The workspace with a reconciliation applied: superseded blocks are
    /// dropped from their positions and the incoming blocks are appended at
    /// the end of the root, re-declaring whatever namespaces their own root
    /// bound differently. All other root content stays where it was.
    pub fn rebuild(&self, reconciliation: &Reconciliation) -> Workspace {
        let superseded: BTreeSet<usize> = reconciliation.superseded.iter().copied().collect();

        let mut ordinal = 0usize;
        let mut content: Vec<Node> = Vec::with_capacity(self.content.len());
        for node in &self.content {
            match node {
                Node::Block(_) => {
                    if !superseded.contains(&ordinal) {
                        content.push(node.clone());
                    }
                    ordinal += 1;
                }
                Node::Markup(_) => content.push(node.clone()),
            }
        }
        content.extend(
            reconciliation
                .appended
                .iter()
                .map(|block| Node::Block(block.rebased(&self.namespaces))),
        );

        Workspace {
            head: self.head.clone(),
            namespaces: self.namespaces.clone(),
            content,
            tail: self.tail.clone(),
        }
    }

    pub fn to_markup(&self) -> String {
        let mut out = String::with_capacity(
            self.head.len()
                + self.tail.len()
                + self
                    .content
                    .iter()
                    .map(|n| match n {
                        Node::Markup(s) => s.len(),
                        Node::Block(b) => b.markup().len(),
                    })
                    .sum::<usize>(),
        );
        out.push_str(&self.head);
        for node in &self.content {
            match node {
                Node::Markup(s) => out.push_str(s),
                Node::Block(b) => out.push_str(b.markup()),
            }
        }
        out.push_str(&self.tail);
        out
    }
}

fn in_xhtml(ns: &ResolveResult<'_>) -> bool {
    matches!(ns, ResolveResult::Bound(Namespace(uri)) if *uri == XHTML_NS.as_bytes())
}

fn is_block(e: &BytesStart<'_>) -> bool {
    e.local_name().as_ref() == BLOCK_TAG.as_bytes()
}

fn attributes(e: &BytesStart<'_>, position: usize) -> Result<Vec<(String, String)>, MarkupError> {
    let mut out = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| malformed(position, err.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| malformed(position, err.to_string()))?
            .into_owned();
        out.push((key, value));
    }
    Ok(out)
}

/// `xmlns` / `xmlns:p` attributes of an element, as (prefix, uri) pairs.
fn declarations(e: &BytesStart<'_>, position: usize) -> Result<Vec<Declaration>, MarkupError> {
    Ok(attributes(e, position)?
        .into_iter()
        .filter_map(|(key, uri)| {
            if key == "xmlns" {
                Some((String::new(), uri))
            } else {
                key.strip_prefix("xmlns:").map(|p| (p.to_string(), uri))
            }
        })
        .collect())
}

fn flush(payload: &str, from: usize, to: usize, content: &mut Vec<Node>) {
    if to > from {
        content.push(Node::Markup(payload[from..to].to_string()));
    }
}

fn malformed(position: usize, reason: impl Into<String>) -> MarkupError {
    MarkupError::Malformed {
        position,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = concat!(
        r#"<xml xmlns="http://www.w3.org/1999/xhtml">"#,
        r#"<variables><variable type="" id="v1">count</variable></variables>"#,
        r#"<block type="when_started" id="a" x="10" y="20">"#,
        r#"<next><block type="wait" id="nested"><field name="T">1</field></block></next>"#,
        r#"</block>"#,
        r#"<block type="comment" id="b"/>"#,
        r#"</xml>"#
    );

    fn ids(blocks: &[Block]) -> Vec<&str> {
        blocks.iter().filter_map(|b| b.attribute("id")).collect()
    }

    #[test]
    fn test_extracts_top_level_blocks_only() {
        let blocks = extract_blocks(DOC).unwrap();
        assert_eq!(ids(&blocks), vec!["a", "b"]);
        assert!(blocks[0].markup().starts_with(r#"<block type="when_started""#));
        assert!(blocks[0].markup().contains(r#"id="nested""#));
        assert!(blocks[0].markup().ends_with("</block>"));
        assert_eq!(blocks[1].markup(), r#"<block type="comment" id="b"/>"#);
        assert_eq!(blocks[0].attribute("x"), Some("10"));
    }

    #[test]
    fn test_unchanged_workspace_reproduces_payload() {
        let ws = Workspace::parse(DOC).unwrap();
        assert_eq!(ws.to_markup(), DOC);

        let with_prolog = format!("<?xml version=\"1.0\"?>\n{DOC}\n");
        assert_eq!(Workspace::parse(&with_prolog).unwrap().to_markup(), with_prolog);
    }

    #[test]
    fn test_ignores_blocks_outside_namespace() {
        let doc = concat!(
            r#"<xml xmlns="http://www.w3.org/1999/xhtml" xmlns:o="urn:other">"#,
            r#"<o:block id="foreign"/><block id="mine"/>"#,
            r#"</xml>"#
        );
        assert_eq!(ids(&extract_blocks(doc).unwrap()), vec!["mine"]);

        let unqualified = r#"<xml><block id="plain"/></xml>"#;
        assert!(extract_blocks(unqualified).unwrap().is_empty());
    }

    #[test]
    fn test_prefixed_xhtml_blocks_count() {
        let doc = concat!(
            r#"<x:xml xmlns:x="http://www.w3.org/1999/xhtml">"#,
            r#"<x:block id="p"/>"#,
            r#"</x:xml>"#
        );
        assert_eq!(ids(&extract_blocks(doc).unwrap()), vec!["p"]);
    }

    fn merge_payloads(destination: &str, source: &str) -> String {
        let dest = Workspace::parse(destination).unwrap();
        let baseline: Vec<Block> = dest.blocks().cloned().collect();
        let incoming = extract_blocks(source).unwrap();
        let outcome = crate::reconcile::reconcile(&baseline, &incoming).unwrap();
        dest.rebuild(&outcome).to_markup()
    }

    #[test]
    fn test_prefixed_source_block_survives_in_default_destination() {
        let merged = merge_payloads(
            r#"<xml xmlns="http://www.w3.org/1999/xhtml"><block id="main"/></xml>"#,
            concat!(
                r#"<x:xml xmlns:x="http://www.w3.org/1999/xhtml">"#,
                r#"<x:block id="p"><plain/></x:block>"#,
                r#"</x:xml>"#
            ),
        );
        assert_eq!(ids(&extract_blocks(&merged).unwrap()), vec!["main", "p"]);
        assert!(merged.contains(
            r#"<x:block xmlns:x="http://www.w3.org/1999/xhtml" xmlns="" id="p"><plain/></x:block>"#
        ));

        // Merging the same module again replaces the block instead of adding it twice.
        let again = merge_payloads(
            &merged,
            r#"<x:xml xmlns:x="http://www.w3.org/1999/xhtml"><x:block id="p"/></x:xml>"#,
        );
        assert_eq!(ids(&extract_blocks(&again).unwrap()), vec!["main", "p"]);
    }

    #[test]
    fn test_default_source_block_survives_in_prefixed_destination() {
        let merged = merge_payloads(
            r#"<x:xml xmlns:x="http://www.w3.org/1999/xhtml"><x:block id="main"/></x:xml>"#,
            r#"<xml xmlns="http://www.w3.org/1999/xhtml"><block id="d" v="1"/></xml>"#,
        );
        let blocks = extract_blocks(&merged).unwrap();
        assert_eq!(ids(&blocks), vec!["main", "d"]);
        assert_eq!(blocks[1].attribute("v"), Some("1"));
    }

    #[test]
    fn test_matching_namespaces_copy_blocks_verbatim() {
        let merged = merge_payloads(
            r#"<xml xmlns="http://www.w3.org/1999/xhtml"/>"#,
            r#"<xml xmlns="http://www.w3.org/1999/xhtml"><block id="a"/></xml>"#,
        );
        assert_eq!(
            merged,
            r#"<xml xmlns="http://www.w3.org/1999/xhtml"><block id="a"/></xml>"#
        );
    }

    #[test]
    fn test_attribute_values_are_unescaped() {
        let doc = r#"<xml xmlns="http://www.w3.org/1999/xhtml"><block id="a&amp;b"/></xml>"#;
        let blocks = extract_blocks(doc).unwrap();
        assert_eq!(blocks[0].attribute("id"), Some("a&b"));
        assert_eq!(blocks[0].markup(), r#"<block id="a&amp;b"/>"#);
    }

    #[test]
    fn test_self_closing_root_opens_for_insertion() {
        let dest = Workspace::parse(r#"<xml xmlns="http://www.w3.org/1999/xhtml"/>"#).unwrap();
        assert_eq!(dest.blocks().count(), 0);

        let incoming = extract_blocks(DOC).unwrap();
        let outcome = crate::reconcile::reconcile(&[], &incoming).unwrap();
        let merged = dest.rebuild(&outcome).to_markup();
        assert!(merged.starts_with(r#"<xml xmlns="http://www.w3.org/1999/xhtml">"#));
        assert!(merged.ends_with("</xml>"));
        assert_eq!(ids(&extract_blocks(&merged).unwrap()), vec!["a", "b"]);
    }

    #[test]
    fn test_rebuild_keeps_other_content_in_place() {
        let dest = Workspace::parse(DOC).unwrap();
        let incoming = extract_blocks(
            r#"<xml xmlns="http://www.w3.org/1999/xhtml"><block id="a" v="new"/><block id="c"/></xml>"#,
        )
        .unwrap();
        let baseline: Vec<Block> = dest.blocks().cloned().collect();
        let outcome = crate::reconcile::reconcile(&baseline, &incoming).unwrap();
        let merged = dest.rebuild(&outcome).to_markup();

        assert_eq!(
            merged,
            concat!(
                r#"<xml xmlns="http://www.w3.org/1999/xhtml">"#,
                r#"<variables><variable type="" id="v1">count</variable></variables>"#,
                r#"<block type="comment" id="b"/>"#,
                r#"<block id="a" v="new"/><block id="c"/>"#,
                r#"</xml>"#
            )
        );
    }

    #[test]
    fn test_malformed_markup() {
        for bad in [
            "",
            "   ",
            "<xml><block id=\"a\"></xml>",
            "<xml><block id=\"a\">",
            "<xml></xml><xml></xml>",
            "<xml></xml>trailing",
            "</xml>",
        ] {
            assert!(
                matches!(Workspace::parse(bad), Err(MarkupError::Malformed { .. })),
                "expected parse failure for {bad:?}"
            );
        }
    }

    #[test]
    fn test_error_carries_path() {
        let err = Workspace::parse("<xml>").unwrap_err();
        let err = err.at(Path::new("Modules/arm.v5blocks"));
        assert!(matches!(err, blockmerge_core::Error::Parse { .. }));
        assert!(err.to_string().contains("Modules/arm.v5blocks"));
    }
}
