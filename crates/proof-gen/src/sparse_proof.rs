//! Sparse Merkle Proof Generation
//!
//! Generates SSZ Merkle proofs without allocating full trees for large lists.
//! `ssz_rs`'s `Prove` trait builds the whole tree in memory, which is not an
//! option for `List<Validator, 2^40>` or `List<HistoricalSummary, 2^24>`.
//!
//! # Approach
//! 1. Hash individual elements using `hash_tree_root()`
//! 2. Walk the tree with SHA-256, computing only the siblings on the path
//! 3. Use precomputed "zero hashes" for empty subtrees
//!
//! All proofs are returned leaf-first: `branch[0]` is the sibling of the leaf.

use crate::types::Root;
use sha2::{Digest, Sha256};
use ssz_rs::prelude::*;
use std::sync::OnceLock;

/// Maximum supported tree depth
const MAX_DEPTH: usize = 64;

/// `ZERO_HASHES[0]` = all-zeros (the zero leaf).
/// `ZERO_HASHES[i]` = hash(ZERO_HASHES[i-1], ZERO_HASHES[i-1])
fn zero_hashes() -> &'static [Root] {
    static ZERO_HASHES: OnceLock<Vec<Root>> = OnceLock::new();
    ZERO_HASHES.get_or_init(|| {
        let mut hashes = vec![[0u8; 32]; MAX_DEPTH + 1];
        for i in 1..=MAX_DEPTH {
            hashes[i] = hash_pair(&hashes[i - 1], &hashes[i - 1]);
        }
        hashes
    })
}

/// SHA-256 hash of two 32-byte nodes
pub(crate) fn hash_pair(left: &Root, right: &Root) -> Root {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

fn get_leaf(leaf_chunks: &[Root], index: usize) -> Root {
    leaf_chunks.get(index).copied().unwrap_or([0u8; 32])
}

/// Root of the subtree of depth `depth` whose first leaf is `start`.
/// Subtrees lying entirely past the data collapse to a zero hash.
fn compute_subtree_root(leaf_chunks: &[Root], start: usize, depth: usize) -> Root {
    if depth == 0 {
        return get_leaf(leaf_chunks, start);
    }
    if start >= leaf_chunks.len() {
        return zero_hashes()[depth];
    }

    let half = 1usize << (depth - 1);
    let left = compute_subtree_root(leaf_chunks, start, depth - 1);
    let right = compute_subtree_root(leaf_chunks, start + half, depth - 1);
    hash_pair(&left, &right)
}

/// Root of a tree of depth `depth` over `leaf_chunks`, zero-padded.
#[must_use]
pub fn merkle_root(leaf_chunks: &[Root], depth: u32) -> Root {
    compute_subtree_root(leaf_chunks, 0, depth as usize)
}

/// Generate a Merkle proof for `leaf_chunks[index]` in a tree of depth `depth`.
///
/// `leaf_chunks` contains the actual (non-zero) leaves; the tree has
/// `2^depth` leaf slots and leaves beyond `leaf_chunks.len()` are zero.
///
/// Returns `(proof, root)` where `proof` has exactly `depth` siblings.
///
/// # Panics
/// Panics if `index` does not fit in a tree of depth `depth`. Callers
/// bounds-check indices against the data they prove.
#[must_use]
pub fn prove_against_leaf_chunks(leaf_chunks: &[Root], index: usize, depth: u32) -> (Vec<Root>, Root) {
    assert!(
        depth as usize >= usize::BITS as usize || index < (1usize << depth),
        "index {index} out of range for depth {depth}"
    );

    let mut proof = Vec::with_capacity(depth as usize);
    let mut current = get_leaf(leaf_chunks, index);
    let mut pos = index;

    for level in 0..depth as usize {
        // The sibling at this level covers 2^level leaves.
        let sibling_pos = pos ^ 1;
        let sibling = compute_subtree_root(leaf_chunks, sibling_pos << level, level);

        current = if pos & 1 == 0 {
            hash_pair(&current, &sibling)
        } else {
            hash_pair(&sibling, &current)
        };
        proof.push(sibling);
        pos >>= 1;
    }

    (proof, current)
}

/// Mix in the length for a List's Merkle root.
/// `list_root = hash(data_root, length_as_le_bytes32)`
#[must_use]
pub fn mix_in_length(data_root: Root, length: usize) -> Root {
    hash_pair(&data_root, &length_chunk(length))
}

fn length_chunk(length: usize) -> Root {
    let mut length_bytes = [0u8; 32];
    length_bytes[..8].copy_from_slice(&(length as u64).to_le_bytes());
    length_bytes
}

/// Generate a Merkle proof for an element within a `List<T, N>`.
///
/// The proof holds the siblings through the data tree followed by the
/// length mix-in chunk, so its length is `list_limit_depth + 1`.
///
/// Returns `(proof_from_leaf_to_list_root, list_root)`.
#[must_use]
pub fn prove_list_element(
    element_hashes: &[Root],
    element_index: usize,
    list_limit_depth: u32,
) -> (Vec<Root>, Root) {
    let (mut proof, data_root) =
        prove_against_leaf_chunks(element_hashes, element_index, list_limit_depth);

    let length = length_chunk(element_hashes.len());
    proof.push(length);

    (proof, hash_pair(&data_root, &length))
}

/// Tree depth of a container with `num_fields` fields.
#[must_use]
pub fn container_depth(num_fields: usize) -> u32 {
    if num_fields <= 1 {
        0
    } else {
        num_fields.next_power_of_two().trailing_zeros()
    }
}

/// Generate a Merkle proof for a field within a container.
///
/// `field_hashes` contains the hash of each field in the container.
///
/// Returns `(proof, container_root)`.
#[must_use]
pub fn prove_container_field(
    field_hashes: &[Root],
    field_index: usize,
    num_fields: usize,
) -> (Vec<Root>, Root) {
    prove_against_leaf_chunks(field_hashes, field_index, container_depth(num_fields))
}

/// Generate a proof for a field within a fixed-size SSZ container (like a
/// block header), where `ssz_rs`'s `prove` is cheap.
///
/// Returns `(branch, leaf, root)`.
///
/// # Errors
/// Returns an error if the path is invalid for `T` or merkleization fails.
pub fn prove_small_container_field<T: SimpleSerialize>(
    container: &T,
    path: &[PathElement],
) -> Result<(Vec<Root>, Root, Root), MerkleizationError> {
    let (proof, witness) = container.prove(path)?;
    let branch: Vec<Root> = proof.branch.into_iter().map(Into::into).collect();
    let leaf: Root = proof.leaf.into();
    let root: Root = witness.into();
    Ok((branch, leaf, root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn branch_nodes(proof: &[Root]) -> Vec<Node> {
        proof
            .iter()
            .map(|b| Node::try_from(b.as_slice()).unwrap())
            .collect()
    }

    #[test]
    fn test_zero_hashes() {
        let zh = zero_hashes();
        assert_eq!(zh[0], [0u8; 32]);
        assert_eq!(zh[1], hash_pair(&[0u8; 32], &[0u8; 32]));
        assert_eq!(zh[2], hash_pair(&zh[1], &zh[1]));
    }

    #[test]
    fn test_prove_depth_0() {
        let leaves = vec![[42u8; 32]];
        let (proof, root) = prove_against_leaf_chunks(&leaves, 0, 0);
        assert!(proof.is_empty());
        assert_eq!(root, [42u8; 32]);
    }

    #[test]
    fn test_prove_two_leaves() {
        let leaves = vec![[1u8; 32], [2u8; 32]];
        let (proof, root) = prove_against_leaf_chunks(&leaves, 0, 1);
        assert_eq!(proof, vec![[2u8; 32]]);
        assert_eq!(root, hash_pair(&[1u8; 32], &[2u8; 32]));

        let (proof, root2) = prove_against_leaf_chunks(&leaves, 1, 1);
        assert_eq!(proof, vec![[1u8; 32]]);
        assert_eq!(root2, root);
    }

    #[test]
    fn test_prove_with_virtual_padding() {
        // 3 actual leaves in a depth-2 tree (4 leaf slots)
        let leaves = vec![[1u8; 32], [2u8; 32], [3u8; 32]];

        let (proof, root) = prove_against_leaf_chunks(&leaves, 0, 2);
        assert_eq!(proof.len(), 2);
        assert_eq!(proof[0], [2u8; 32]);
        assert_eq!(proof[1], hash_pair(&[3u8; 32], &[0u8; 32]));
        assert_eq!(root, merkle_root(&leaves, 2));
    }

    #[test]
    fn test_prove_large_depth_sparse() {
        let leaves = vec![[0xAA; 32], [0xBB; 32]];
        let (proof, _root) = prove_against_leaf_chunks(&leaves, 0, 40);
        assert_eq!(proof.len(), 40);

        let zh = zero_hashes();
        assert_eq!(proof[0], [0xBB; 32]);
        for (level, sibling) in proof.iter().enumerate().skip(1) {
            assert_eq!(*sibling, zh[level], "sibling at level {level} should be zero hash");
        }
    }

    #[test]
    fn test_list_root_matches_ssz_rs() {
        let mut list = List::<u64, 1024>::default();
        for i in 0..37u64 {
            list.push(i * 3);
        }
        let elements: Vec<Root> = list.iter().map(|v| crate::types::u64_chunk(*v)).collect();

        // u64 elements pack four to a chunk; prove over the packed view instead
        let packed: Vec<Root> = elements
            .chunks(4)
            .map(|group| {
                let mut chunk = [0u8; 32];
                for (i, e) in group.iter().enumerate() {
                    chunk[i * 8..(i + 1) * 8].copy_from_slice(&e[..8]);
                }
                chunk
            })
            .collect();
        let root = mix_in_length(merkle_root(&packed, 8), list.len());

        let expected: Root = list.hash_tree_root().unwrap().into();
        assert_eq!(root, expected);
    }

    #[test]
    fn test_prove_list_element_simple() {
        let elements = vec![[0xAA; 32], [0xBB; 32]];
        let (proof, list_root) = prove_list_element(&elements, 0, 2);

        // depth 2 data tree + 1 length mix-in
        assert_eq!(proof.len(), 3);
        assert_eq!(proof[2], length_chunk(2));
        assert_eq!(list_root, mix_in_length(merkle_root(&elements, 2), 2));
    }

    #[test]
    fn test_verify_proof_with_ssz_rs() {
        let leaves = vec![[1u8; 32], [2u8; 32], [3u8; 32], [4u8; 32]];
        let (proof, root) = prove_against_leaf_chunks(&leaves, 2, 2);

        // gindex for index 2 at depth 2 = 4 + 2 = 6
        ssz_rs::proofs::is_valid_merkle_branch_for_generalized_index(
            Node::try_from(leaves[2].as_slice()).unwrap(),
            &branch_nodes(&proof),
            6,
            Node::try_from(root.as_slice()).unwrap(),
        )
        .expect("proof should be valid");
    }

    #[test]
    fn test_container_depth() {
        assert_eq!(container_depth(1), 0);
        assert_eq!(container_depth(2), 1);
        assert_eq!(container_depth(5), 3);
        assert_eq!(container_depth(17), 5);
        assert_eq!(container_depth(28), 5);
        assert_eq!(container_depth(37), 6);
    }

    #[test]
    fn test_small_container_field_matches_sparse() {
        let header = crate::types::BeaconBlockHeader {
            slot: 9,
            proposer_index: 1,
            parent_root: [1; 32],
            state_root: [2; 32],
            body_root: [3; 32],
        };
        let (branch, leaf, root) =
            prove_small_container_field(&header, &["state_root".into()]).unwrap();
        assert_eq!(leaf, [2; 32]);
        assert_eq!(branch.len(), 3);

        let fields = vec![
            crate::types::u64_chunk(9),
            crate::types::u64_chunk(1),
            [1; 32],
            [2; 32],
            [3; 32],
        ];
        let (sparse, sparse_root) = prove_container_field(&fields, 3, 5);
        assert_eq!(sparse, branch);
        assert_eq!(sparse_root, root);
    }

    proptest! {
        #[test]
        fn prop_every_leaf_proves_against_same_root(
            count in 1usize..40,
            depth in 6u32..12,
            seed in any::<u8>(),
        ) {
            let leaves: Vec<Root> = (0..count)
                .map(|i| [seed.wrapping_add(i as u8); 32])
                .collect();
            let expected = merkle_root(&leaves, depth);

            for index in [0, count / 2, count - 1] {
                let (proof, root) = prove_against_leaf_chunks(&leaves, index, depth);
                prop_assert_eq!(proof.len(), depth as usize);
                prop_assert_eq!(root, expected);

                let gindex = (1usize << depth) + index;
                prop_assert!(ssz_rs::proofs::is_valid_merkle_branch_for_generalized_index(
                    Node::try_from(leaves[index].as_slice()).unwrap(),
                    &branch_nodes(&proof),
                    gindex,
                    Node::try_from(root.as_slice()).unwrap(),
                )
                .is_ok());
            }
        }
    }
}
