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

//! Node wire format.
//!
//! A node serializes to an RLP list whose shape identifies its kind:
//!
//! - hashed node: `[digest(32)]`,
//! - leaf node: `[key(32), value]`,
//! - internal node: `[bitlist(2^w / 8), [children…]]`, where bit `i` of
//!   the bitlist (least significant bit first within each byte) marks slot
//!   `i` as occupied and the child list holds exactly the occupied
//!   children in increasing slot order, each encoded recursively.
//!
//! Commitment caches are never serialized; they are recomputable. Parsing
//! anchors the outermost node at depth 0.

use std::sync::Arc;

use alloy_rlp::{Encodable, Header};
use ff::PrimeField;
use midnight_curves::Fq;

use crate::{
    config::TreeConfig,
    error::Error,
    node::{HashedNode, InternalNode, LeafNode, VerkleNode, KEY_SIZE},
};

impl VerkleNode {
    /// Serializes this node (and, for internal nodes, its subtree).
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        encode_node(self, &mut out);
        out
    }
}

/// Parses a node from its serialized form, anchored at depth 0.
pub fn parse_node(serialized: &[u8], config: Arc<TreeConfig>) -> Result<VerkleNode, Error> {
    let mut buf = serialized;
    let node = decode_node(&mut buf, &config, 0)?;
    if !buf.is_empty() {
        return Err(Error::InvalidEncoding);
    }
    Ok(node)
}

fn encode_node(node: &VerkleNode, out: &mut Vec<u8>) {
    match node {
        VerkleNode::Hashed(stub) => {
            let repr = stub.hash().to_repr();
            let digest = repr.as_ref();
            Header {
                list: true,
                payload_length: digest.length(),
            }
            .encode(out);
            digest.encode(out);
        }
        VerkleNode::Leaf(leaf) => {
            let key = leaf.key().as_slice();
            let value = leaf.value();
            Header {
                list: true,
                payload_length: key.length() + value.length(),
            }
            .encode(out);
            key.encode(out);
            value.encode(out);
        }
        VerkleNode::Internal(node) => {
            let bitlist = occupancy_bitlist(node);
            let mut children = Vec::new();
            for child in node.children.iter().flatten() {
                encode_node(child, &mut children);
            }
            let children_header = Header {
                list: true,
                payload_length: children.len(),
            };
            Header {
                list: true,
                payload_length: bitlist.as_slice().length()
                    + children_header.length()
                    + children.len(),
            }
            .encode(out);
            bitlist.as_slice().encode(out);
            children_header.encode(out);
            out.extend_from_slice(&children);
        }
    }
}

fn decode_node(
    buf: &mut &[u8],
    config: &Arc<TreeConfig>,
    depth: usize,
) -> Result<VerkleNode, Error> {
    let header = Header::decode(buf)?;
    if !header.list || buf.len() < header.payload_length {
        return Err(Error::InvalidEncoding);
    }
    let (mut payload, rest) = buf.split_at(header.payload_length);
    *buf = rest;

    let first = decode_bytes(&mut payload)?;

    // A single-element list is a hashed node.
    if payload.is_empty() {
        let digest: [u8; 32] = first.try_into().map_err(|_| Error::InvalidEncoding)?;
        let mut repr = <Fq as PrimeField>::Repr::default();
        repr.as_mut().copy_from_slice(&digest);
        let hash = Option::from(Fq::from_repr(repr)).ok_or(Error::InvalidEncoding)?;
        return Ok(VerkleNode::Hashed(HashedNode::new(hash)));
    }

    if first.len() == KEY_SIZE {
        let key: [u8; KEY_SIZE] = first.try_into().expect("length checked above");
        let value = decode_bytes(&mut payload)?.to_vec();
        if !payload.is_empty() {
            return Err(Error::InvalidEncoding);
        }
        return Ok(VerkleNode::Leaf(LeafNode::new(key, value)));
    }

    if first.len() == config.node_width().div_ceil(8) {
        let children_header = Header::decode(&mut payload)?;
        if !children_header.list || payload.len() != children_header.payload_length {
            return Err(Error::InvalidEncoding);
        }
        let mut node = InternalNode::new(depth, Arc::clone(config));
        for slot in bitlist_indices(first) {
            if slot >= node.children.len() {
                return Err(Error::InvalidEncoding);
            }
            let child = decode_node(&mut payload, config, depth + 1)?;
            node.children[slot] = Some(Box::new(child));
        }
        if !payload.is_empty() {
            return Err(Error::InvalidEncoding);
        }
        return Ok(VerkleNode::Internal(node));
    }

    Err(Error::InvalidEncoding)
}

fn decode_bytes<'a>(buf: &mut &'a [u8]) -> Result<&'a [u8], Error> {
    let header = Header::decode(buf)?;
    if header.list || buf.len() < header.payload_length {
        return Err(Error::InvalidEncoding);
    }
    let (data, rest) = buf.split_at(header.payload_length);
    *buf = rest;
    Ok(data)
}

fn occupancy_bitlist(node: &InternalNode) -> Vec<u8> {
    let mut bits = vec![0u8; node.config.node_width().div_ceil(8)];
    for (slot, child) in node.children.iter().enumerate() {
        if child.is_some() {
            bits[slot / 8] |= 1 << (slot % 8);
        }
    }
    bits
}

fn bitlist_indices(bitlist: &[u8]) -> Vec<usize> {
    let mut indices = Vec::new();
    for (i, byte) in bitlist.iter().enumerate() {
        for j in 0..8 {
            if byte & (1 << j) != 0 {
                indices.push(i * 8 + j);
            }
        }
    }
    indices
}
