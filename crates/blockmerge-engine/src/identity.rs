//! Block identity: the `id` attribute.

use crate::block::Block;
use crate::markup::MarkupError;

pub const ID_ATTRIBUTE: &str = "id";

/// The block's identifier. `ordinal` is only used to point at the block in
/// the error.
pub fn identity(block: &Block, ordinal: usize) -> Result<&str, MarkupError> {
    block
        .attribute(ID_ATTRIBUTE)
        .ok_or(MarkupError::MissingIdentifier { ordinal })
}

/// Check that every block carries an identifier.
pub fn require_identities(blocks: &[Block]) -> Result<(), MarkupError> {
    for (ordinal, block) in blocks.iter().enumerate() {
        identity(block, ordinal)?;
    }
    Ok(())
}

/// First block with the given identifier. Blocks without one never match.
pub fn find<'a>(blocks: &'a [Block], id: &str) -> Option<&'a Block> {
    position(blocks, id).map(|i| &blocks[i])
}

/// Index of the first block with the given identifier.
pub fn position(blocks: &[Block], id: &str) -> Option<usize> {
    blocks
        .iter()
        .position(|block| block.attribute(ID_ATTRIBUTE) == Some(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(attrs: &[(&str, &str)]) -> Block {
        Block::new(
            attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            "<block/>",
        )
    }

    #[test]
    fn test_identity() {
        let b = block(&[("type", "when_started"), ("id", "abc")]);
        assert_eq!(identity(&b, 0).unwrap(), "abc");
    }

    #[test]
    fn test_missing_identity() {
        let b = block(&[("type", "when_started")]);
        assert!(matches!(
            identity(&b, 4),
            Err(MarkupError::MissingIdentifier { ordinal: 4 })
        ));
        assert!(require_identities(&[block(&[("id", "a")]), b]).is_err());
    }

    #[test]
    fn test_find_first_match() {
        let blocks = vec![
            block(&[("type", "untagged")]),
            block(&[("id", "a"), ("v", "1")]),
            block(&[("id", "a"), ("v", "2")]),
        ];
        assert_eq!(find(&blocks, "a").and_then(|b| b.attribute("v")), Some("1"));
        assert_eq!(position(&blocks, "a"), Some(1));
        assert!(find(&blocks, "zzz").is_none());
        assert!(find(&[], "a").is_none());
    }
}
