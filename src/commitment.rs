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

//! The commitment engine.
//!
//! Every internal node is summarized by the polynomial of degree below
//! `2^w` whose evaluations at the roots of unity are the scalar digests of
//! its children, zero in empty slots. The node's commitment is the linear
//! combination of the Lagrange basis with those evaluations; the root
//! commitment authenticates the whole tree. Commitments and their derived
//! digests are memoized per node and cleared along the path of any
//! mutation.

use ff::{Field, PrimeField};
use group::GroupEncoding;
use midnight_curves::{Fq, G1Affine, G1Projective};
use num_bigint::BigUint;
use sha2::{Digest, Sha256};

use crate::{
    config::scalar_modulus,
    kzg::KzgSettings,
    msm::{lin_comb_g1, lin_comb_window_g1, SMALL_MSM_CUTOFF},
    node::{InternalNode, LeafNode, VerkleNode},
};

/// Reduces a 32-byte digest into the scalar field.
///
/// The bytes are read as a little-endian integer and reduced modulo the
/// field order, so canonical scalar encodings map to themselves.
pub fn hash_to_fr(bytes: &[u8; 32], modulus: &BigUint) -> Fq {
    let reduced = BigUint::from_bytes_le(bytes) % modulus;
    let le = reduced.to_bytes_le();
    let mut repr = <Fq as PrimeField>::Repr::default();
    repr.as_mut()[..le.len()].copy_from_slice(&le);
    Option::from(Fq::from_repr(repr)).expect("value is reduced below the field order")
}

/// Scalar digest of a curve point: SHA-256 over its compressed form,
/// reduced into the field.
fn point_to_fr(point: &G1Projective, modulus: &BigUint) -> Fq {
    let compressed = G1Affine::from(point).to_bytes();
    let digest: [u8; 32] = Sha256::digest(compressed.as_ref()).into();
    hash_to_fr(&digest, modulus)
}

impl VerkleNode {
    /// Computes (or returns the cached) commitment of this node.
    ///
    /// `lagrange` must be the Lagrange form of `setup`'s G1 half; the
    /// result observes exactly the insertions that preceded the call.
    ///
    /// # Panics
    ///
    /// Panics on leaf and hashed nodes, which have no child polynomial to
    /// commit to, and if `lagrange` does not match the tree width.
    pub fn compute_commitment(
        &mut self,
        setup: &KzgSettings,
        lagrange: &[G1Projective],
    ) -> G1Projective {
        match self {
            VerkleNode::Internal(node) => node.compute_commitment(setup, lagrange),
            VerkleNode::Leaf(_) | VerkleNode::Hashed(_) => {
                panic!("commitments are only defined for internal nodes")
            }
        }
    }

    /// Scalar digest of this node.
    ///
    /// For internal nodes this is the reduced SHA-256 of the compressed
    /// commitment, computing the commitment against the configured basis
    /// first if no cached one exists; for leaves the reduced SHA-256 of
    /// key ‖ value; for hashed nodes the stored scalar.
    pub fn hash(&mut self) -> Fq {
        match self {
            VerkleNode::Internal(node) => node.hash(),
            VerkleNode::Leaf(leaf) => leaf.hash(scalar_modulus()),
            VerkleNode::Hashed(stub) => stub.hash(),
        }
    }
}

impl InternalNode {
    pub(crate) fn compute_commitment(
        &mut self,
        setup: &KzgSettings,
        lagrange: &[G1Projective],
    ) -> G1Projective {
        assert_eq!(
            setup.fft().max_width(),
            self.config.node_width(),
            "setup domain must match the node width"
        );
        self.commit_against(lagrange)
    }

    fn commit_against(&mut self, lagrange: &[G1Projective]) -> G1Projective {
        if let Some(commitment) = self.commitment {
            return commitment;
        }
        assert_eq!(
            lagrange.len(),
            self.config.node_width(),
            "Lagrange basis size must match the node width"
        );

        let mut evaluations = vec![Fq::ZERO; self.config.node_width()];
        for (slot, child) in self.children.iter_mut().enumerate() {
            let Some(child) = child.as_deref_mut() else {
                continue;
            };
            evaluations[slot] = match child {
                VerkleNode::Leaf(leaf) => leaf.hash(self.config.modulus()),
                VerkleNode::Hashed(stub) => stub.hash(),
                VerkleNode::Internal(node) => {
                    node.commit_against(lagrange);
                    node.hash()
                }
            };
        }

        let commitment = evaluation_msm(lagrange, &evaluations);
        self.commitment = Some(commitment);
        commitment
    }

    pub(crate) fn hash(&mut self) -> Fq {
        if let Some(hash) = self.hash {
            return hash;
        }
        let commitment = match self.commitment {
            Some(commitment) => commitment,
            None => {
                let config = std::sync::Arc::clone(&self.config);
                self.commit_against(config.lagrange())
            }
        };
        let hash = point_to_fr(&commitment, self.config.modulus());
        self.hash = Some(hash);
        hash
    }
}

impl LeafNode {
    /// Scalar digest of the leaf: SHA-256 over key ‖ value, reduced.
    pub fn hash(&self, modulus: &BigUint) -> Fq {
        let mut hasher = Sha256::new();
        hasher.update(self.key);
        hasher.update(&self.value);
        let digest: [u8; 32] = hasher.finalize().into();
        hash_to_fr(&digest, modulus)
    }
}

/// Commits to an evaluation vector, picking the MSM by its sparsity. The
/// two paths agree on every input; only their speed differs.
fn evaluation_msm(lagrange: &[G1Projective], evaluations: &[Fq]) -> G1Projective {
    let occupied = evaluations
        .iter()
        .filter(|e| !bool::from(e.is_zero()))
        .count();
    if occupied < SMALL_MSM_CUTOFF {
        lin_comb_window_g1(lagrange, evaluations)
    } else {
        lin_comb_g1(lagrange, evaluations)
    }
}
