//! Merkle root computation for block commitments
//!
//! The wallet, the miner and the validator all call [`calculate_merkle_root`];
//! there is no second implementation of the pairing rule.

use super::hash::{sha256, Hash256};

/// Calculate the merkle root from an ordered list of transaction hashes.
///
/// Pairs are combined as `sha256(left || right)`. An odd hash at the end of
/// a level is paired with itself. A single hash is its own root and an empty
/// list commits to `sha256("")`.
pub fn calculate_merkle_root(hashes: &[Hash256]) -> Hash256 {
    if hashes.is_empty() {
        return Hash256::from_bytes(sha256(b""));
    }

    let mut current_level: Vec<Hash256> = hashes.to_vec();

    while current_level.len() > 1 {
        current_level = current_level
            .chunks(2)
            .map(|chunk| {
                let left = &chunk[0];
                let right = chunk.get(1).unwrap_or(left);
                combine(left, right)
            })
            .collect();
    }

    current_level[0]
}

fn combine(left: &Hash256, right: &Hash256) -> Hash256 {
    let mut data = [0u8; 64];
    data[..32].copy_from_slice(left.as_bytes());
    data[32..].copy_from_slice(right.as_bytes());
    Hash256::from_bytes(sha256(&data))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(data: &[u8]) -> Hash256 {
        Hash256::digest(data)
    }

    #[test]
    fn test_merkle_root_single() {
        let hashes = vec![leaf(b"tx1")];
        assert_eq!(calculate_merkle_root(&hashes), hashes[0]);
    }

    #[test]
    fn test_merkle_root_two() {
        let hash1 = leaf(b"tx1");
        let hash2 = leaf(b"tx2");

        let mut expected = hash1.as_bytes().to_vec();
        expected.extend_from_slice(hash2.as_bytes());

        assert_eq!(
            calculate_merkle_root(&[hash1, hash2]),
            Hash256::from_bytes(sha256(&expected))
        );
    }

    #[test]
    fn test_merkle_root_odd_duplicates_last() {
        let (a, b, c) = (leaf(b"tx1"), leaf(b"tx2"), leaf(b"tx3"));
        let expected = combine(&combine(&a, &b), &combine(&c, &c));
        assert_eq!(calculate_merkle_root(&[a, b, c]), expected);
    }

    #[test]
    fn test_merkle_root_is_order_sensitive() {
        let (a, b) = (leaf(b"tx1"), leaf(b"tx2"));
        assert_ne!(calculate_merkle_root(&[a, b]), calculate_merkle_root(&[b, a]));
    }

    #[test]
    fn test_empty_merkle_root() {
        assert_eq!(calculate_merkle_root(&[]), Hash256::from_bytes(sha256(b"")));
    }
}
