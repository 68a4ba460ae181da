// crates/diting-ledger/src/merkle.rs
// ============================================================================
// Module: Merkle Commitment
// Description: Tree construction over trace hashes and proof verification.
// Purpose: Produce per-leaf verification paths for committed audit batches.
// Dependencies: sha2, hex
// ============================================================================

//! ## Overview
//! Batches commit their leaves as a binary SHA-256 tree: adjacent hashes are
//! concatenated (as hex strings) and re-hashed; an odd node is paired with
//! itself. Every leaf gets a sibling path ordered leaf → root; self-paired
//! layers record the node's own hash, so re-folding the path is uniform:
//!
//! ```text
//! current = leaf_hash; index = leaf_index
//! for sibling in siblings:
//!     current = index even ? H(current ‖ sibling) : H(sibling ‖ current)
//!     index >>= 1
//! current == merkle_root
//! ```

// ============================================================================
// SECTION: Imports
// ============================================================================

use sha2::Digest;
use sha2::Sha256;

use crate::types::MerkleProof;
use crate::types::TraceLeaf;

// ============================================================================
// SECTION: Tree Construction
// ============================================================================

/// Sibling path of one leaf, ordered leaf → root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleProofPath {
    /// Hex-encoded leaf hash.
    pub leaf_hash: String,
    /// Leaf position within the batch's leaf order.
    pub leaf_index: usize,
    /// Sibling hashes from leaf toward root.
    pub siblings: Vec<String>,
}

/// Hashes an adjacent pair (left-first) into the parent node.
#[must_use]
pub fn hash_pair(left: &str, right: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    hex::encode(hasher.finalize())
}

/// Builds the Merkle tree over `leaves`, returning the root and one sibling
/// path per leaf (in leaf order).
///
/// An empty leaf set yields an empty root and no paths; callers reject empty
/// batches before committing.
#[must_use]
pub fn build_merkle_tree(leaves: &[TraceLeaf]) -> (String, Vec<MerkleProofPath>) {
    if leaves.is_empty() {
        return (String::new(), Vec::new());
    }

    let mut layers: Vec<Vec<String>> = Vec::new();
    layers.push(leaves.iter().map(|leaf| leaf.hash.clone()).collect());
    while layers[layers.len() - 1].len() > 1 {
        let previous = &layers[layers.len() - 1];
        let mut next = Vec::with_capacity(previous.len().div_ceil(2));
        for pair in previous.chunks(2) {
            let left = &pair[0];
            let right = pair.get(1).unwrap_or(left);
            next.push(hash_pair(left, right));
        }
        layers.push(next);
    }
    let root = layers[layers.len() - 1][0].clone();

    let mut paths = Vec::with_capacity(leaves.len());
    for (leaf_index, leaf) in leaves.iter().enumerate() {
        let mut siblings = Vec::new();
        let mut index = leaf_index;
        for layer in &layers[..layers.len() - 1] {
            let sibling_index = index ^ 1;
            // Self-paired nodes record their own hash so re-folding stays
            // uniform at every layer.
            let sibling = layer.get(sibling_index).unwrap_or(&layer[index]);
            siblings.push(sibling.clone());
            index /= 2;
        }
        paths.push(MerkleProofPath {
            leaf_hash: leaf.hash.clone(),
            leaf_index,
            siblings,
        });
    }
    (root, paths)
}

// ============================================================================
// SECTION: Verification
// ============================================================================

/// Re-folds a proof and compares the computed root to the stored root.
#[must_use]
pub fn verify_proof(proof: &MerkleProof) -> bool {
    let mut current = proof.leaf_hash.clone();
    let mut index = proof.leaf_index;
    for sibling in &proof.siblings {
        current = if index % 2 == 0 {
            hash_pair(&current, sibling)
        } else {
            hash_pair(sibling, &current)
        };
        index /= 2;
    }
    current == proof.merkle_root
}

// ============================================================================
// SECTION: Tests
// ============================================================================
