//! Linear combinations in G1.
//!
//! Commitments are multi-scalar multiplications of the Lagrange basis
//! against an evaluation vector that is often almost entirely zero. Two
//! interchangeable algorithms cover the two regimes: the library Pippenger
//! for dense vectors, and a per-point windowed ladder that skips zero
//! scalars for sparse ones.

use ff::{Field, PrimeField};
use group::Group;
use midnight_curves::{Fq, G1Projective};

/// Number of non-zero scalars below which [`lin_comb_window_g1`] is faster
/// than the Pippenger path. Measured for widths 8 and 10 with
/// `cargo bench --bench msm_threshold`.
pub const SMALL_MSM_CUTOFF: usize = 25;

/// Full multi-scalar multiplication `Σ scalars[i] · points[i]`.
///
/// # Panics
///
/// Panics if the slices differ in length.
pub fn lin_comb_g1(points: &[G1Projective], scalars: &[Fq]) -> G1Projective {
    assert_eq!(points.len(), scalars.len(), "point/scalar count mismatch");
    G1Projective::multi_exp(points, scalars)
}

/// Sparse multi-scalar multiplication: a 4-bit windowed ladder per
/// non-zero scalar. Zero entries cost nothing, so this wins when only a
/// handful of slots are occupied.
///
/// # Panics
///
/// Panics if the slices differ in length.
pub fn lin_comb_window_g1(points: &[G1Projective], scalars: &[Fq]) -> G1Projective {
    assert_eq!(points.len(), scalars.len(), "point/scalar count mismatch");
    let mut acc = G1Projective::identity();
    for (point, scalar) in points.iter().zip(scalars) {
        if bool::from(scalar.is_zero()) {
            continue;
        }
        acc += windowed_mul(point, scalar);
    }
    acc
}

fn windowed_mul(point: &G1Projective, scalar: &Fq) -> G1Projective {
    let mut table = [G1Projective::identity(); 16];
    for i in 1..table.len() {
        table[i] = table[i - 1] + point;
    }

    let repr = scalar.to_repr();
    let mut acc = G1Projective::identity();
    // Little-endian repr, consumed from the most significant nibble down.
    for byte in repr.as_ref().iter().rev() {
        for nibble in [byte >> 4, byte & 0x0f] {
            for _ in 0..4 {
                acc = acc.double();
            }
            if nibble != 0 {
                acc += table[nibble as usize];
            }
        }
    }
    acc
}
