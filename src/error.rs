//! Error type for tree operations.

use thiserror::Error;

/// Errors surfaced by tree mutation, lookup and parsing.
///
/// Every insertion failure leaves the tree untouched: either the mutation is
/// committed fully or not at all at the failing node.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// An ordered insertion received a key smaller than a key already
    /// inserted.
    #[error("key is smaller than the last key inserted in order")]
    KeyOutOfOrder,
    /// An insertion descended into a subtree that was condensed to its
    /// scalar digest.
    #[error("cannot insert into a hashed subtree")]
    InsertIntoHashed,
    /// Splitting a leaf would push the tree past its maximum depth.
    #[error("maximum tree depth exceeded")]
    DepthExceeded,
    /// A lookup descended into a subtree that was condensed to its scalar
    /// digest.
    #[error("subtree is opaque")]
    Opaque,
    /// The serialized bytes do not describe any known node shape.
    #[error("invalid node encoding")]
    InvalidEncoding,
    /// Transport-level RLP failure.
    #[error(transparent)]
    Rlp(#[from] alloy_rlp::Error),
}
