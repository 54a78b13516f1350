// This file is part of MIDNIGHT-ZK.
// Copyright (C) 2025 Midnight Foundation
// SPDX-License-Identifier: Apache-2.0
// Licensed under the Apache License, Version 2.0 (the "License");
// You may not use this file except in compliance with the License.
// You may obtain a copy of the License at
// http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Node variants and the insertion engine.
//!
//! A tree is a radix trie over fixed 32-byte keys: each internal node owns
//! `2^w` child slots and a key consumes `w` bits per level, most
//! significant bits first. Leaves store the full key next to their value.
//! A subtree that has been finalized by ordered insertion collapses into a
//! [`HashedNode`] carrying only its scalar digest; such a subtree still
//! contributes to parent commitments but can no longer be read or written.

use std::sync::Arc;

use midnight_curves::{Fq, G1Projective};

use crate::{
    config::{tree_config, TreeConfig},
    error::Error,
    kzg::KzgSettings,
};

/// Key length in bytes.
pub const KEY_SIZE: usize = 32;

/// A node of the tree: internal, leaf, or condensed subtree.
#[derive(Debug, Clone)]
pub enum VerkleNode {
    /// A branching node owning `2^w` child slots.
    Internal(InternalNode),
    /// A key/value pair.
    Leaf(LeafNode),
    /// A subtree condensed to its scalar digest.
    Hashed(HashedNode),
}

/// Internal node: child slots plus lazily computed commitment caches.
#[derive(Debug, Clone)]
pub struct InternalNode {
    pub(crate) children: Vec<Option<Box<VerkleNode>>>,
    pub(crate) depth: usize,
    pub(crate) config: Arc<TreeConfig>,
    pub(crate) commitment: Option<G1Projective>,
    pub(crate) hash: Option<Fq>,
}

/// Leaf node holding the full key and the value bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafNode {
    pub(crate) key: [u8; KEY_SIZE],
    pub(crate) value: Vec<u8>,
}

/// Structural stub for a subtree that only survives as its digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashedNode {
    pub(crate) hash: Fq,
}

/// Creates an empty tree: an internal root at depth 0 using the shared
/// configuration for `width`.
pub fn new_tree(width: usize) -> VerkleNode {
    new_tree_with_config(tree_config(width))
}

/// Creates an empty tree over an explicit configuration, e.g. one whose
/// Lagrange basis comes from a real ceremony.
pub fn new_tree_with_config(config: Arc<TreeConfig>) -> VerkleNode {
    VerkleNode::Internal(InternalNode::new(0, config))
}

/// Extracts key bits `[offset, offset + width)` as a big-endian integer.
/// Bits past the end of the key read as zero.
pub(crate) fn extract_bits(key: &[u8; KEY_SIZE], offset: usize, width: usize) -> usize {
    let mut index = 0;
    for bit in offset..offset + width {
        index <<= 1;
        if bit < 8 * KEY_SIZE && key[bit / 8] & (0x80 >> (bit % 8)) != 0 {
            index |= 1;
        }
    }
    index
}

/// Index of the most significant bit on which two keys disagree.
fn first_diff_bit(a: &[u8; KEY_SIZE], b: &[u8; KEY_SIZE]) -> Option<usize> {
    for (i, (x, y)) in a.iter().zip(b).enumerate() {
        if x != y {
            return Some(i * 8 + (x ^ y).leading_zeros() as usize);
        }
    }
    None
}

impl VerkleNode {
    /// Inserts `value` under `key`, replacing in place if the key exists.
    ///
    /// # Panics
    ///
    /// Panics when called on a bare leaf with a different key; leaves can
    /// only split below an internal node.
    pub fn insert(&mut self, key: [u8; KEY_SIZE], value: Vec<u8>) -> Result<(), Error> {
        match self {
            VerkleNode::Internal(root) => root.insert(key, value),
            VerkleNode::Leaf(leaf) if leaf.key == key => {
                leaf.value = value;
                Ok(())
            }
            VerkleNode::Leaf(_) => panic!("a bare leaf cannot absorb a new key"),
            VerkleNode::Hashed(_) => Err(Error::InsertIntoHashed),
        }
    }

    /// Inserts `value` under `key`, assuming keys arrive in increasing
    /// order. When the descent moves past previously visited slots, the
    /// subtrees to their left are final and get condensed into hashed
    /// stubs, spreading commitment work over the load.
    ///
    /// # Panics
    ///
    /// Panics when called on a bare leaf with a different key.
    pub fn insert_ordered(
        &mut self,
        key: [u8; KEY_SIZE],
        value: Vec<u8>,
        setup: &KzgSettings,
        lagrange: &[G1Projective],
    ) -> Result<(), Error> {
        match self {
            VerkleNode::Internal(root) => root.insert_ordered(key, value, setup, lagrange),
            VerkleNode::Leaf(leaf) if leaf.key == key => {
                leaf.value = value;
                Ok(())
            }
            VerkleNode::Leaf(_) => panic!("a bare leaf cannot absorb a new key"),
            VerkleNode::Hashed(_) => Err(Error::InsertIntoHashed),
        }
    }

    /// Looks up the value stored under `key`.
    ///
    /// Absent keys yield `Ok(None)`; descending into a condensed subtree
    /// fails with [`Error::Opaque`].
    pub fn get(&self, key: &[u8; KEY_SIZE]) -> Result<Option<&[u8]>, Error> {
        match self {
            VerkleNode::Internal(node) => node.get(key),
            VerkleNode::Leaf(leaf) => Ok((leaf.key == *key).then_some(leaf.value.as_slice())),
            VerkleNode::Hashed(_) => Err(Error::Opaque),
        }
    }
}

impl InternalNode {
    pub(crate) fn new(depth: usize, config: Arc<TreeConfig>) -> Self {
        let node_width = config.node_width();
        InternalNode {
            children: vec![None; node_width],
            depth,
            config,
            commitment: None,
            hash: None,
        }
    }

    /// Depth of this node; the root sits at 0.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The child in the given slot, if any.
    pub fn child(&self, index: usize) -> Option<&VerkleNode> {
        self.children[index].as_deref()
    }

    fn child_index(&self, key: &[u8; KEY_SIZE]) -> usize {
        extract_bits(key, self.depth * self.config.width(), self.config.width())
    }

    pub(crate) fn insert(&mut self, key: [u8; KEY_SIZE], value: Vec<u8>) -> Result<(), Error> {
        let slot = self.child_index(&key);
        match self.children[slot].as_deref_mut() {
            None => {
                self.children[slot] = Some(Box::new(VerkleNode::Leaf(LeafNode::new(key, value))));
            }
            Some(VerkleNode::Hashed(_)) => return Err(Error::InsertIntoHashed),
            Some(VerkleNode::Leaf(leaf)) if leaf.key == key => leaf.value = value,
            Some(VerkleNode::Leaf(_)) => self.split_leaf(slot, key, value)?,
            Some(VerkleNode::Internal(child)) => child.insert(key, value)?,
        }
        self.invalidate();
        Ok(())
    }

    /// Replaces the leaf in `slot` with a fresh internal node holding both
    /// the displaced leaf and the new entry, recursing until the two keys
    /// part ways.
    fn split_leaf(&mut self, slot: usize, key: [u8; KEY_SIZE], value: Vec<u8>) -> Result<(), Error> {
        let displaced = self.take_leaf(slot, &key)?;
        let mut branch = InternalNode::new(self.depth + 1, Arc::clone(&self.config));
        branch.insert(displaced.key, displaced.value)?;
        branch.insert(key, value)?;
        self.children[slot] = Some(Box::new(VerkleNode::Internal(branch)));
        Ok(())
    }

    /// Removes and returns the leaf in `slot`, after checking that the
    /// split against `key` stays within the depth limit.
    fn take_leaf(&mut self, slot: usize, key: &[u8; KEY_SIZE]) -> Result<LeafNode, Error> {
        let existing = match self.children[slot].as_deref() {
            Some(VerkleNode::Leaf(leaf)) => leaf,
            _ => unreachable!("split targets an occupied leaf slot"),
        };
        // The chain of intermediate nodes ends at the level where the two
        // keys first disagree; checking it up front keeps failed inserts
        // from mutating the tree.
        let diverge_bit =
            first_diff_bit(&existing.key, key).expect("equal keys are replaced, not split");
        if diverge_bit / self.config.width() >= self.config.depth_limit() {
            return Err(Error::DepthExceeded);
        }
        match self.children[slot].take().map(|child| *child) {
            Some(VerkleNode::Leaf(leaf)) => Ok(leaf),
            _ => unreachable!("slot content checked above"),
        }
    }

    pub(crate) fn insert_ordered(
        &mut self,
        key: [u8; KEY_SIZE],
        value: Vec<u8>,
        setup: &KzgSettings,
        lagrange: &[G1Projective],
    ) -> Result<(), Error> {
        let slot = self.child_index(&key);
        let rightmost = self.children.iter().rposition(|child| child.is_some());

        match rightmost {
            Some(last) if slot < last => return Err(Error::KeyOutOfOrder),
            Some(last) if slot == last => {
                match self.children[slot].as_deref_mut() {
                    Some(VerkleNode::Hashed(_)) => return Err(Error::InsertIntoHashed),
                    Some(VerkleNode::Leaf(leaf)) if leaf.key == key => leaf.value = value,
                    Some(VerkleNode::Leaf(leaf)) if leaf.key > key => {
                        return Err(Error::KeyOutOfOrder)
                    }
                    Some(VerkleNode::Leaf(_)) => {
                        self.split_leaf_ordered(slot, key, value, setup, lagrange)?
                    }
                    Some(VerkleNode::Internal(child)) => {
                        child.insert_ordered(key, value, setup, lagrange)?
                    }
                    None => unreachable!("rightmost slot is occupied"),
                }
            }
            _ => {
                // First visit of a slot strictly right of everything seen so
                // far: the nearest occupied left sibling is final.
                self.condense_left_of(slot, setup, lagrange);
                self.children[slot] = Some(Box::new(VerkleNode::Leaf(LeafNode::new(key, value))));
            }
        }
        self.invalidate();
        Ok(())
    }

    fn split_leaf_ordered(
        &mut self,
        slot: usize,
        key: [u8; KEY_SIZE],
        value: Vec<u8>,
        setup: &KzgSettings,
        lagrange: &[G1Projective],
    ) -> Result<(), Error> {
        let displaced = self.take_leaf(slot, &key)?;
        let mut branch = InternalNode::new(self.depth + 1, Arc::clone(&self.config));
        branch.insert_ordered(displaced.key, displaced.value, setup, lagrange)?;
        branch.insert_ordered(key, value, setup, lagrange)?;
        self.children[slot] = Some(Box::new(VerkleNode::Internal(branch)));
        Ok(())
    }

    /// Condenses the nearest occupied, still-expanded child left of `slot`.
    /// Anything further left was condensed by earlier ordered inserts.
    fn condense_left_of(
        &mut self,
        slot: usize,
        setup: &KzgSettings,
        lagrange: &[G1Projective],
    ) {
        for index in (0..slot).rev() {
            let Some(child) = self.children[index].as_deref_mut() else {
                continue;
            };
            match child {
                VerkleNode::Hashed(_) => {}
                VerkleNode::Leaf(leaf) => {
                    let hash = leaf.hash(self.config.modulus());
                    self.children[index] =
                        Some(Box::new(VerkleNode::Hashed(HashedNode::new(hash))));
                }
                VerkleNode::Internal(node) => {
                    node.compute_commitment(setup, lagrange);
                    let hash = node.hash();
                    self.children[index] =
                        Some(Box::new(VerkleNode::Hashed(HashedNode::new(hash))));
                }
            }
            break;
        }
    }

    pub(crate) fn get(&self, key: &[u8; KEY_SIZE]) -> Result<Option<&[u8]>, Error> {
        let slot = self.child_index(key);
        match self.children[slot].as_deref() {
            None => Ok(None),
            Some(VerkleNode::Leaf(leaf)) => Ok((leaf.key == *key).then_some(leaf.value.as_slice())),
            Some(VerkleNode::Internal(child)) => child.get(key),
            Some(VerkleNode::Hashed(_)) => Err(Error::Opaque),
        }
    }

    pub(crate) fn invalidate(&mut self) {
        self.commitment = None;
        self.hash = None;
    }
}

impl LeafNode {
    pub(crate) fn new(key: [u8; KEY_SIZE], value: Vec<u8>) -> Self {
        LeafNode { key, value }
    }

    /// The full 32-byte key.
    pub fn key(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }

    /// The stored value bytes.
    pub fn value(&self) -> &[u8] {
        &self.value
    }
}

impl HashedNode {
    pub(crate) fn new(hash: Fq) -> Self {
        HashedNode { hash }
    }

    /// The stored scalar digest.
    pub fn hash(&self) -> Fq {
        self.hash
    }
}

#[cfg(test)]
mod tests {
    use ff::Field;
    use group::Group;

    use super::*;
    use crate::kzg::FftSettings;

    fn test_config(width: usize) -> Arc<TreeConfig> {
        Arc::new(TreeConfig::new(
            width,
            vec![G1Projective::identity(); 1 << width],
        ))
    }

    fn dummy_setup(width: u32) -> KzgSettings {
        let fft = FftSettings::new(width);
        let n = fft.max_width();
        KzgSettings::new(
            fft,
            vec![G1Projective::generator(); n],
            vec![midnight_curves::G2Projective::generator(); n],
        )
    }

    fn key_with_first_byte(byte: u8) -> [u8; KEY_SIZE] {
        let mut key = [0u8; KEY_SIZE];
        key[0] = byte;
        key
    }

    #[test]
    fn bit_extraction() {
        let zero = [0u8; KEY_SIZE];
        let mut forty = [0u8; KEY_SIZE];
        forty[0] = 0x40;
        let ff = [0xffu8; KEY_SIZE];

        assert_eq!(extract_bits(&zero, 0, 10), 0);
        assert_eq!(extract_bits(&forty, 0, 10), 256);
        assert_eq!(extract_bits(&ff, 0, 10), 1023);

        // Byte-aligned widths read whole bytes.
        let mut key = [0u8; KEY_SIZE];
        key[1] = 0xab;
        assert_eq!(extract_bits(&key, 8, 8), 0xab);

        // The last level of a width-10 tree covers bits 250..260; the four
        // bits past the end of the key read as zero.
        assert_eq!(extract_bits(&ff, 250, 10), 0b1111110000);
    }

    #[test]
    fn diverging_bit() {
        let zero = [0u8; KEY_SIZE];
        let one = {
            let mut key = [0u8; KEY_SIZE];
            key[31] = 0x01;
            key
        };
        assert_eq!(first_diff_bit(&zero, &one), Some(255));
        assert_eq!(first_diff_bit(&zero, &zero), None);
        assert_eq!(first_diff_bit(&zero, &[0xff; KEY_SIZE]), Some(0));
    }

    #[test]
    fn insert_into_root_places_a_leaf() {
        let mut root = InternalNode::new(0, test_config(10));
        root.insert([0u8; KEY_SIZE], b"hello".to_vec()).unwrap();

        match root.child(0) {
            Some(VerkleNode::Leaf(leaf)) => assert_eq!(leaf.value(), b"hello"),
            other => panic!("expected a leaf in slot 0, got {other:?}"),
        }
    }

    #[test]
    fn extreme_keys_occupy_the_outer_slots() {
        let mut root = InternalNode::new(0, test_config(10));
        root.insert([0u8; KEY_SIZE], b"hello".to_vec()).unwrap();
        root.insert([0xffu8; KEY_SIZE], b"hello".to_vec()).unwrap();

        assert!(matches!(root.child(0), Some(VerkleNode::Leaf(_))));
        assert!(matches!(root.child(1023), Some(VerkleNode::Leaf(_))));
    }

    #[test]
    fn get_returns_the_stored_value() {
        let mut root = InternalNode::new(0, test_config(10));
        root.insert([0u8; KEY_SIZE], b"hello".to_vec()).unwrap();

        assert_eq!(root.get(&[0u8; KEY_SIZE]).unwrap(), Some(&b"hello"[..]));
        let mut absent = [0u8; KEY_SIZE];
        absent[31] = 0x01;
        assert_eq!(root.get(&absent).unwrap(), None);
    }

    #[test]
    fn reinsertion_replaces_the_value() {
        let mut root = InternalNode::new(0, test_config(10));
        root.insert([0u8; KEY_SIZE], b"hello".to_vec()).unwrap();
        root.insert([0u8; KEY_SIZE], b"world".to_vec()).unwrap();

        assert_eq!(root.get(&[0u8; KEY_SIZE]).unwrap(), Some(&b"world"[..]));
    }

    #[test]
    fn colliding_keys_split_into_a_chain() {
        // These keys agree on their first 250 bits, so the split runs all
        // the way down to the deepest level.
        let zero = [0u8; KEY_SIZE];
        let mut one = [0u8; KEY_SIZE];
        one[31] = 0x01;

        let mut root = InternalNode::new(0, test_config(10));
        root.insert(zero, b"a".to_vec()).unwrap();
        root.insert(one, b"b".to_vec()).unwrap();

        let mut node = &root;
        while let Some(VerkleNode::Internal(child)) = node.child(0) {
            node = child;
        }
        assert_eq!(node.depth(), 25);
        assert!(matches!(node.child(0), Some(VerkleNode::Leaf(_))));
        // Bit 255 lands in position 5 of the last 10-bit window.
        assert!(matches!(node.child(16), Some(VerkleNode::Leaf(_))));

        assert_eq!(root.get(&zero).unwrap(), Some(&b"a"[..]));
        assert_eq!(root.get(&one).unwrap(), Some(&b"b"[..]));
    }

    #[test]
    fn writes_into_condensed_subtrees_fail() {
        let mut root = InternalNode::new(0, test_config(10));
        root.children[0] = Some(Box::new(VerkleNode::Hashed(HashedNode::new(Fq::ONE))));

        let err = root.insert([0u8; KEY_SIZE], b"hello".to_vec()).unwrap_err();
        assert_eq!(err, Error::InsertIntoHashed);
        let err = root.get(&[0u8; KEY_SIZE]).unwrap_err();
        assert_eq!(err, Error::Opaque);
    }

    #[test]
    fn ordered_insertion_condenses_finalized_siblings() {
        let setup = dummy_setup(10);
        let lagrange = vec![G1Projective::identity(); 1024];
        let mut root = InternalNode::new(0, test_config(10));

        root.insert_ordered([0u8; KEY_SIZE], b"hello".to_vec(), &setup, &lagrange)
            .unwrap();
        assert!(matches!(root.child(0), Some(VerkleNode::Leaf(_))));

        root.insert_ordered(
            key_with_first_byte(0x40),
            b"hello".to_vec(),
            &setup,
            &lagrange,
        )
        .unwrap();

        // Moving to slot 256 finalized slot 0.
        let expected = LeafNode::new([0u8; KEY_SIZE], b"hello".to_vec())
            .hash(crate::config::scalar_modulus());
        match root.child(0) {
            Some(VerkleNode::Hashed(stub)) => assert_eq!(stub.hash(), expected),
            other => panic!("expected a hashed stub in slot 0, got {other:?}"),
        }
        assert!(matches!(root.child(256), Some(VerkleNode::Leaf(_))));
    }

    #[test]
    fn ordered_insertion_rejects_regressing_slots() {
        let setup = dummy_setup(10);
        let lagrange = vec![G1Projective::identity(); 1024];
        let mut root = InternalNode::new(0, test_config(10));

        root.insert_ordered(
            key_with_first_byte(0x40),
            b"hello".to_vec(),
            &setup,
            &lagrange,
        )
        .unwrap();
        let err = root
            .insert_ordered([0u8; KEY_SIZE], b"hello".to_vec(), &setup, &lagrange)
            .unwrap_err();
        assert_eq!(err, Error::KeyOutOfOrder);

        // The failed insert left the tree alone.
        assert_eq!(
            root.get(&key_with_first_byte(0x40)).unwrap(),
            Some(&b"hello"[..])
        );
        assert_eq!(root.get(&[0u8; KEY_SIZE]).unwrap(), None);
    }

    #[test]
    fn ordered_insertion_rejects_smaller_keys_in_the_same_slot() {
        let setup = dummy_setup(10);
        let lagrange = vec![G1Projective::identity(); 1024];
        let mut root = InternalNode::new(0, test_config(10));

        let mut one = [0u8; KEY_SIZE];
        one[31] = 0x01;
        root.insert_ordered(one, b"hello".to_vec(), &setup, &lagrange)
            .unwrap();
        let err = root
            .insert_ordered([0u8; KEY_SIZE], b"hello".to_vec(), &setup, &lagrange)
            .unwrap_err();
        assert_eq!(err, Error::KeyOutOfOrder);
        assert!(matches!(root.child(0), Some(VerkleNode::Leaf(_))));
    }

    #[test]
    #[should_panic(expected = "a bare leaf cannot absorb a new key")]
    fn bare_leaf_roots_reject_new_keys() {
        let mut leaf = VerkleNode::Leaf(LeafNode::new([0u8; KEY_SIZE], b"hello".to_vec()));
        let _ = leaf.insert(key_with_first_byte(0x40), b"world".to_vec());
    }

    #[test]
    #[should_panic(expected = "a bare leaf cannot absorb a new key")]
    fn bare_leaf_roots_reject_new_keys_in_order() {
        let setup = dummy_setup(10);
        let lagrange = vec![G1Projective::identity(); 1024];
        let mut leaf = VerkleNode::Leaf(LeafNode::new([0u8; KEY_SIZE], b"hello".to_vec()));
        let _ = leaf.insert_ordered(key_with_first_byte(0x40), b"world".to_vec(), &setup, &lagrange);
    }

    #[test]
    fn ordered_reinsertion_replaces_the_value() {
        let setup = dummy_setup(10);
        let lagrange = vec![G1Projective::identity(); 1024];
        let mut root = InternalNode::new(0, test_config(10));

        root.insert_ordered([0u8; KEY_SIZE], b"hello".to_vec(), &setup, &lagrange)
            .unwrap();
        root.insert_ordered([0u8; KEY_SIZE], b"world".to_vec(), &setup, &lagrange)
            .unwrap();
        assert_eq!(root.get(&[0u8; KEY_SIZE]).unwrap(), Some(&b"world"[..]));
    }
}
