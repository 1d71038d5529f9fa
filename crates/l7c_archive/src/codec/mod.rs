//! The two chunk codecs and the prefix trees used by the bit-level one.
//!
//! - [`byte_lz`] handles mode `0x80`, a byte oriented back-reference format.
//! - [`tree_lz`] handles mode `0x81`, a bit oriented format with three inline prefix trees,
//!   a 32 KiB circular window and an optional delta filter.

pub mod byte_lz;
pub mod prefix_tree;
pub mod tree_lz;

pub use prefix_tree::PrefixTree;
pub use tree_lz::Window;
