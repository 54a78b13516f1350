//! # `midnight-verkle`
//!
//! A Verkle tree over BLS12-381: an authenticated key–value map whose
//! nodes are summarized by polynomial commitments instead of hashes, so
//! inclusion proofs stay short regardless of the branching factor.
//!
//! The tree is a radix trie over 32-byte keys consuming `w` bits per
//! level (width 10, i.e. 1024-ary nodes, is typical). Each internal node
//! commits to the polynomial whose evaluations at the roots of unity are
//! its children's scalar digests, via a precomputed Lagrange basis in G1;
//! the root commitment authenticates the whole map.
//!
//! Trees are built by [`insert`](VerkleNode::insert), or by
//! [`insert_ordered`](VerkleNode::insert_ordered) when keys arrive
//! sorted: the ordered path condenses finalized subtrees into
//! [`HashedNode`] stubs as it goes, bounding live memory and spreading
//! commitment cost over the load. Nodes serialize to a compact RLP shape
//! via [`VerkleNode::serialize`] and [`parse_node`].
//!
//! ```
//! use midnight_verkle::new_tree;
//!
//! let mut root = new_tree(4);
//! root.insert([0u8; 32], b"hello".to_vec()).unwrap();
//! assert_eq!(root.get(&[0u8; 32]).unwrap(), Some(&b"hello"[..]));
//! ```

mod commitment;
mod config;
mod encoding;
mod error;
mod kzg;
mod msm;
mod node;

pub use commitment::hash_to_fr;
pub use config::{tree_config, TreeConfig, MAX_WIDTH};
pub use encoding::parse_node;
pub use error::Error;
pub use kzg::{generate_insecure_setup, FftSettings, KzgSettings};
pub use msm::{lin_comb_g1, lin_comb_window_g1, SMALL_MSM_CUTOFF};
pub use node::{
    new_tree, new_tree_with_config, HashedNode, InternalNode, LeafNode, VerkleNode, KEY_SIZE,
};
