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

//! Trusted-setup plumbing.
//!
//! [`FftSettings`] is a radix-2 evaluation domain over the scalar field,
//! driving forward and inverse FFTs on G1 points. Its one job here is
//! turning a monomial-form setup `[G, sG, s²G, …]` into the Lagrange basis
//! the commitments are taken against. [`KzgSettings`] bundles the setup
//! arrays with their domain. [`generate_insecure_setup`] derives both from
//! a known secret, for tests and benchmarks only.

use ff::{Field, PrimeField};
use group::Group;
use midnight_curves::{Fq, G1Projective, G2Projective};

/// Radix-2 evaluation domain of size `2^scale`.
#[derive(Debug, Clone)]
pub struct FftSettings {
    max_width: usize,
    roots_of_unity: Vec<Fq>,
    inverse_roots: Vec<Fq>,
}

impl FftSettings {
    /// Builds the domain of size `2^scale`.
    ///
    /// # Panics
    ///
    /// Panics if `scale` is zero or exceeds the 2-adicity of the scalar
    /// field.
    pub fn new(scale: u32) -> Self {
        assert!(
            scale >= 1 && scale <= Fq::S,
            "no multiplicative subgroup of order 2^{scale}"
        );
        let max_width = 1usize << scale;
        let root = Fq::ROOT_OF_UNITY.pow_vartime([1u64 << (Fq::S - scale)]);

        let mut roots_of_unity = Vec::with_capacity(max_width);
        let mut acc = Fq::ONE;
        for _ in 0..max_width {
            roots_of_unity.push(acc);
            acc *= root;
        }
        debug_assert_eq!(acc, Fq::ONE, "root of unity has the wrong order");

        let inverse_roots = std::iter::once(Fq::ONE)
            .chain(roots_of_unity[1..].iter().rev().copied())
            .collect();

        FftSettings {
            max_width,
            roots_of_unity,
            inverse_roots,
        }
    }

    /// Domain size.
    pub fn max_width(&self) -> usize {
        self.max_width
    }

    /// Forward or inverse FFT over G1.
    ///
    /// Input and output are in natural order; the inverse pass scales by
    /// `n⁻¹`.
    ///
    /// # Panics
    ///
    /// Panics if `values.len()` is not a power of two dividing the domain
    /// size.
    pub fn fft_g1(&self, values: &[G1Projective], inverse: bool) -> Vec<G1Projective> {
        let n = values.len();
        assert!(
            n.is_power_of_two() && n <= self.max_width,
            "invalid transform size {n}"
        );

        let mut out = values.to_vec();
        bit_reverse(&mut out);

        let roots = if inverse {
            &self.inverse_roots
        } else {
            &self.roots_of_unity
        };

        let mut len = 2;
        while len <= n {
            let step = self.max_width / len;
            for block in (0..n).step_by(len) {
                for j in 0..len / 2 {
                    let twiddle = roots[j * step];
                    let odd = out[block + len / 2 + j] * twiddle;
                    let even = out[block + j];
                    out[block + j] = even + odd;
                    out[block + len / 2 + j] = even - odd;
                }
            }
            len <<= 1;
        }

        if inverse {
            let n_inv: Fq = Option::from(Fq::from(n as u64).invert())
                .expect("transform size is invertible");
            for value in out.iter_mut() {
                *value *= n_inv;
            }
        }
        out
    }
}

fn bit_reverse(values: &mut [G1Projective]) {
    let n = values.len();
    if n < 2 {
        return;
    }
    let log_n = n.trailing_zeros();
    for i in 0..n {
        let j = (i.reverse_bits() >> (usize::BITS - log_n)) as usize;
        if i < j {
            values.swap(i, j);
        }
    }
}

/// Monomial-form trusted setup bundled with its evaluation domain.
#[derive(Debug, Clone)]
pub struct KzgSettings {
    fft: FftSettings,
    secret_g1: Vec<G1Projective>,
    secret_g2: Vec<G2Projective>,
}

impl KzgSettings {
    /// Bundles the setup arrays with their domain.
    ///
    /// # Panics
    ///
    /// Panics if either array does not match the domain size.
    pub fn new(
        fft: FftSettings,
        secret_g1: Vec<G1Projective>,
        secret_g2: Vec<G2Projective>,
    ) -> Self {
        assert_eq!(secret_g1.len(), fft.max_width(), "G1 setup size mismatch");
        assert_eq!(secret_g2.len(), fft.max_width(), "G2 setup size mismatch");
        KzgSettings {
            fft,
            secret_g1,
            secret_g2,
        }
    }

    /// The evaluation domain.
    pub fn fft(&self) -> &FftSettings {
        &self.fft
    }

    /// `[G, sG, s²G, …]` in G1.
    pub fn secret_g1(&self) -> &[G1Projective] {
        &self.secret_g1
    }

    /// `[H, sH, s²H, …]` in G2.
    pub fn secret_g2(&self) -> &[G2Projective] {
        &self.secret_g2
    }
}

/// Generates a setup of domain size from the given decimal secret, along
/// with the Lagrange form of its G1 half. **For testing purposes only**:
/// whoever knows the secret can forge openings against this setup.
///
/// # Panics
///
/// Panics if `secret` is not a decimal field element.
pub fn generate_insecure_setup(
    secret: &str,
    fft: &FftSettings,
) -> (Vec<G1Projective>, Vec<G2Projective>, Vec<G1Projective>) {
    let s = Fq::from_str_vartime(secret).expect("secret is a decimal field element");
    let n = fft.max_width();

    let mut secret_g1 = Vec::with_capacity(n);
    let mut secret_g2 = Vec::with_capacity(n);
    let mut s_pow = Fq::ONE;
    for _ in 0..n {
        secret_g1.push(G1Projective::generator() * s_pow);
        secret_g2.push(G2Projective::generator() * s_pow);
        s_pow *= s;
    }

    let lagrange = fft.fft_g1(&secret_g1, true);
    (secret_g1, secret_g2, lagrange)
}
