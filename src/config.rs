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

//! Shared, immutable tree configuration.
//!
//! A [`TreeConfig`] fixes the branching of a tree: the width `w` (number of
//! key bits consumed per level), the derived child count `2^w`, the scalar
//! field modulus used during hash-to-field reduction, and the precomputed
//! Lagrange basis the commitments are taken against. One configuration is
//! built per distinct width and shared by every node of a tree.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, OnceLock},
};

use ff::PrimeField;
use midnight_curves::{Fq, G1Projective};
use num_bigint::BigUint;

use crate::{
    kzg::{generate_insecure_setup, FftSettings},
    node::KEY_SIZE,
};

/// Largest supported tree width. Bounded by the size of the development
/// setup backing [`tree_config`].
pub const MAX_WIDTH: usize = 10;

/// Secret behind the built-in development setup. It is publicly known, so
/// bases derived from it offer no binding guarantee outside of tests and
/// benchmarks.
const SETUP_SECRET: &str = "1927409816240961209460912649124";

/// Immutable per-width tree parameters.
#[derive(Debug)]
pub struct TreeConfig {
    width: usize,
    node_width: usize,
    modulus: BigUint,
    lagrange: Vec<G1Projective>,
}

impl TreeConfig {
    /// Builds a configuration from an externally derived Lagrange basis.
    ///
    /// # Panics
    ///
    /// Panics if `width` is outside `1..=MAX_WIDTH` or if the basis size
    /// does not match `2^width`.
    pub fn new(width: usize, lagrange: Vec<G1Projective>) -> Self {
        assert!(
            (1..=MAX_WIDTH).contains(&width),
            "unsupported tree width {width}"
        );
        assert_eq!(
            lagrange.len(),
            1 << width,
            "Lagrange basis size must equal the node width"
        );
        TreeConfig {
            width,
            node_width: 1 << width,
            modulus: scalar_modulus().clone(),
            lagrange,
        }
    }

    /// Number of key bits consumed per level.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of child slots per internal node, `2^width`.
    pub fn node_width(&self) -> usize {
        self.node_width
    }

    /// Scalar field modulus, used when reducing digests into the field.
    pub fn modulus(&self) -> &BigUint {
        &self.modulus
    }

    /// Precomputed Lagrange basis in G1.
    pub fn lagrange(&self) -> &[G1Projective] {
        &self.lagrange
    }

    /// Maximum number of levels a key can descend.
    pub fn depth_limit(&self) -> usize {
        (8 * KEY_SIZE).div_ceil(self.width)
    }
}

/// Returns the shared configuration for the given width, building it on
/// first use.
///
/// The Lagrange basis comes from the crate's fixed development secret; it
/// is fine for tests and benchmarks, but production trees must be built
/// against a basis from a real ceremony via [`TreeConfig::new`].
pub fn tree_config(width: usize) -> Arc<TreeConfig> {
    static CONFIGS: OnceLock<Mutex<HashMap<usize, Arc<TreeConfig>>>> = OnceLock::new();
    let configs = CONFIGS.get_or_init(|| Mutex::new(HashMap::new()));
    let mut configs = configs.lock().expect("config cache lock");
    configs
        .entry(width)
        .or_insert_with(|| {
            let fft = FftSettings::new(width as u32);
            let (_, _, lagrange) = generate_insecure_setup(SETUP_SECRET, &fft);
            Arc::new(TreeConfig::new(width, lagrange))
        })
        .clone()
}

/// Modulus of the scalar field as a big integer, parsed once.
pub(crate) fn scalar_modulus() -> &'static BigUint {
    static MODULUS: OnceLock<BigUint> = OnceLock::new();
    MODULUS.get_or_init(|| {
        let repr = Fq::MODULUS.trim_start_matches("0x");
        BigUint::parse_bytes(repr.as_bytes(), 16).expect("field modulus is valid hex")
    })
}
