use quick_xml::escape::escape;

/// A namespace declaration: prefix (empty for the default namespace) and URI.
pub type Declaration = (String, String);

/// A top-level `block` element lifted out of a workspace document.
///
/// The element is kept as the exact markup it was read from, so nested
/// content travels into the destination untouched. Attributes are decoded
/// once at extraction for identity lookups. `scope` holds the namespace
/// declarations of the root the block was read from, which its markup may
/// rely on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    attributes: Vec<(String, String)>,
    markup: String,
    scope: Vec<Declaration>,
}

impl Block {
    pub fn new(attributes: Vec<(String, String)>, markup: impl Into<String>) -> Self {
        Self {
            attributes,
            markup: markup.into(),
            scope: Vec::new(),
        }
    }

    pub fn with_scope(mut self, scope: Vec<Declaration>) -> Self {
        self.scope = scope;
        self
    }

    /// Decoded value of the attribute with the given qualified name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    /// The element exactly as it appeared in its document.
    pub fn markup(&self) -> &str {
        &self.markup
    }

    pub fn scope(&self) -> &[Declaration] {
        &self.scope
    }

    /// The block made valid under a root declaring `target`.
    ///
    /// Every binding from the block's own root that `target` binds
    /// differently (or not at all) is declared on the block's start tag, so
    /// the block and its content resolve to the same namespaces as before.
    pub fn rebased(&self, target: &[Declaration]) -> Block {
        let mut prefixes: Vec<&str> = self.scope.iter().map(|(p, _)| p.as_str()).collect();
        if !prefixes.contains(&"") {
            prefixes.push("");
        }

        let mut added: Vec<(String, String)> = Vec::new();
        for prefix in prefixes {
            let key = declaration_key(prefix);
            if self.attribute(&key).is_some() {
                continue;
            }
            let source = binding(&self.scope, prefix).unwrap_or("");
            let dest = binding(target, prefix).unwrap_or("");
            if source != dest {
                added.push((key, source.to_string()));
            }
        }

        if added.is_empty() {
            return self.clone().with_scope(target.to_vec());
        }

        let name_end = self.markup[1..]
            .find(|c: char| c.is_whitespace() || c == '/' || c == '>')
            .map_or(self.markup.len(), |i| i + 1);
        let mut markup = String::with_capacity(self.markup.len() + 64);
        markup.push_str(&self.markup[..name_end]);
        for (key, uri) in &added {
            markup.push_str(&format!(" {}=\"{}\"", key, escape(uri.as_str())));
        }
        markup.push_str(&self.markup[name_end..]);

        let mut attributes = self.attributes.clone();
        attributes.extend(added);
        Block {
            attributes,
            markup,
            scope: target.to_vec(),
        }
    }
}

fn declaration_key(prefix: &str) -> String {
    if prefix.is_empty() {
        "xmlns".to_string()
    } else {
        format!("xmlns:{prefix}")
    }
}

fn binding<'a>(scope: &'a [Declaration], prefix: &str) -> Option<&'a str> {
    scope
        .iter()
        .find(|(p, _)| p == prefix)
        .map(|(_, uri)| uri.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    const XHTML: &str = "http://www.w3.org/1999/xhtml";

    fn decl(prefix: &str, uri: &str) -> Declaration {
        (prefix.to_string(), uri.to_string())
    }

    #[test]
    fn test_same_bindings_leave_markup_alone() {
        let block = Block::new(vec![("id".into(), "a".into())], r#"<block id="a"/>"#)
            .with_scope(vec![decl("", XHTML)]);
        let rebased = block.rebased(&[decl("", XHTML)]);
        assert_eq!(rebased.markup(), r#"<block id="a"/>"#);
        assert_eq!(rebased.attributes(), block.attributes());
    }

    #[test]
    fn test_prefixed_block_declares_its_prefix() {
        let block = Block::new(vec![("id".into(), "p".into())], r#"<x:block id="p"/>"#)
            .with_scope(vec![decl("x", XHTML)]);
        let rebased = block.rebased(&[decl("", XHTML)]);
        assert_eq!(
            rebased.markup(),
            format!(r#"<x:block xmlns:x="{XHTML}" xmlns="" id="p"/>"#)
        );
        assert_eq!(rebased.attribute("xmlns:x"), Some(XHTML));
    }

    #[test]
    fn test_default_block_under_prefixed_root() {
        let block = Block::new(vec![("id".into(), "d".into())], r#"<block id="d"></block>"#)
            .with_scope(vec![decl("", XHTML)]);
        let rebased = block.rebased(&[decl("x", XHTML)]);
        assert_eq!(
            rebased.markup(),
            format!(r#"<block xmlns="{XHTML}" id="d"></block>"#)
        );
    }

    #[test]
    fn test_own_declarations_win() {
        let block = Block::new(
            vec![("xmlns".into(), XHTML.into()), ("id".into(), "o".into())],
            format!(r#"<block xmlns="{XHTML}" id="o"/>"#),
        );
        let rebased = block.rebased(&[]);
        assert_eq!(rebased.markup(), block.markup());
    }
}
