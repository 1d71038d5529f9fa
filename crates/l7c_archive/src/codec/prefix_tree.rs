//! Binary prefix trees transmitted inline in the bit-level codec's stream.
//!
//! A tree is serialized depth first: a `1` bit is an inner node followed by its left then
//! right subtree, a `0` bit is a leaf followed by its value in a fixed number of bits.

use crate::bits::BitSource;
use crate::error::{Error, Result};

/// Deepest tree accepted while building, enough for a fully skewed 8-bit alphabet
pub const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Node {
    Pending,
    Branch { left: u32, right: u32 },
    Leaf(u16),
}

/// Decoding tree stored as an arena of nodes, the root at index 0
#[derive(Debug, Clone)]
pub struct PrefixTree {
    nodes: Vec<Node>,
}

impl PrefixTree {
    /// Read a serialized tree whose leaves hold `value_bits` wide values.
    pub fn build(bits: &mut BitSource<'_>, value_bits: u32) -> Result<Self> {
        let mut nodes = vec![Node::Pending];
        let mut pending = vec![(0usize, 0usize)];

        while let Some((id, depth)) = pending.pop() {
            if bits.read_bit()? == 0 {
                nodes[id] = Node::Leaf(bits.read_bits(value_bits)? as u16);
                continue;
            }

            if depth >= MAX_DEPTH {
                return Err(Error::InvalidPrefixTree(MAX_DEPTH));
            }

            let left = nodes.len();
            nodes.push(Node::Pending);
            nodes.push(Node::Pending);
            nodes[id] = Node::Branch {
                left: left as u32,
                right: left as u32 + 1,
            };

            // left subtree comes first in the stream
            pending.push((left + 1, depth + 1));
            pending.push((left, depth + 1));
        }

        Ok(Self { nodes })
    }

    /// Walk from the root, one bit per level, and return the leaf's value.
    pub fn lookup(&self, bits: &mut BitSource<'_>) -> Result<u16> {
        let mut id = 0usize;
        loop {
            match self.nodes[id] {
                Node::Leaf(value) => return Ok(value),
                Node::Branch { left, right } => {
                    id = if bits.read_bit()? == 0 { left } else { right } as usize;
                }
                Node::Pending => return Err(Error::InvalidPrefixTree(MAX_DEPTH)),
            }
        }
    }

    /// Number of leaves, the size of the tree's alphabet
    pub fn leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf(_)))
            .count()
    }
}
