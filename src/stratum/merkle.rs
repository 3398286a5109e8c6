use super::*;

/// A node of the transaction merkle tree. Stratum ships these as hex in the
/// internal byte order, unlike the reversed hex Bitcoin uses to display
/// txids.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct MerkleNode(sha256d::Hash);

impl MerkleNode {
    pub fn as_byte_array(&self) -> &[u8; 32] {
        self.0.as_byte_array()
    }

    pub fn from_byte_array(bytes: [u8; 32]) -> Self {
        Self(sha256d::Hash::from_byte_array(bytes))
    }

    pub fn to_raw_hash(self) -> sha256d::Hash {
        self.0
    }
}

impl FromStr for MerkleNode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ensure!(s.len() == 64, "merkle node hex must be 64 chars");
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(MerkleNode(sha256d::Hash::from_byte_array(bytes)))
    }
}

impl Display for MerkleNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0.as_byte_array()))
    }
}

impl From<sha256d::Hash> for MerkleNode {
    fn from(hash: sha256d::Hash) -> Self {
        Self(hash)
    }
}

impl From<MerkleNode> for sha256d::Hash {
    fn from(node: MerkleNode) -> Self {
        node.0
    }
}

impl From<MerkleNode> for TxMerkleNode {
    fn from(node: MerkleNode) -> Self {
        TxMerkleNode::from_raw_hash(node.0)
    }
}

impl From<Txid> for MerkleNode {
    fn from(txid: Txid) -> Self {
        Self::from_byte_array(txid.to_byte_array())
    }
}

fn combine(left: sha256d::Hash, right: sha256d::Hash) -> sha256d::Hash {
    let mut concat = [0u8; 64];
    concat[..32].copy_from_slice(left.as_byte_array());
    concat[32..].copy_from_slice(right.as_byte_array());
    sha256d::Hash::hash(&concat)
}

/// The sibling hashes on the path from the coinbase leaf to the root, for a
/// block containing the coinbase followed by `txids` in order. A layer of odd
/// width pairs its last element with itself, per Bitcoin convention.
pub fn merkle_branches(txids: &[Txid]) -> Vec<MerkleNode> {
    if txids.is_empty() {
        return Vec::new();
    }

    let mut level: Vec<sha256d::Hash> = Vec::with_capacity(txids.len() + 1);
    // Placeholder for the coinbase leaf; its value never feeds a branch
    // because the leftmost path only collects right-hand siblings.
    level.push(sha256d::Hash::all_zeros());
    level.extend(txids.iter().map(|txid| txid.to_raw_hash()));

    let mut branches = Vec::new();

    while level.len() > 1 {
        // The coinbase path stays leftmost at every layer, so its sibling is
        // always the node at index 1.
        branches.push(MerkleNode(level[1]));

        level = level
            .chunks(2)
            .map(|pair| combine(pair[0], *pair.last().expect("chunk is non-empty")))
            .collect();
    }

    branches
}

/// Recomputes the merkle root from a coinbase txid and its branch.
pub fn fold_branches(coinbase_txid: sha256d::Hash, branches: &[MerkleNode]) -> MerkleNode {
    let mut root = coinbase_txid;
    for branch in branches {
        root = combine(root, branch.to_raw_hash());
    }
    MerkleNode(root)
}

/// The txid of a coinbase reassembled from its halves and extranonces.
pub fn coinbase_txid(
    coinb1: &str,
    coinb2: &str,
    extranonce1: &Extranonce,
    extranonce2: &Extranonce,
) -> Result<sha256d::Hash> {
    let coinbase = hex::decode(format!("{coinb1}{extranonce1}{extranonce2}{coinb2}"))?;
    Ok(sha256d::Hash::hash(&coinbase))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn txid(n: u32) -> Txid {
        let hex = format!("{n:x}");
        assert_eq!(hex.len(), 1);
        hex.repeat(64).parse().unwrap()
    }

    fn leaf(n: u32) -> sha256d::Hash {
        txid(n).to_raw_hash()
    }

    /// Reference full-tree computation over all leaves.
    fn full_tree_root(mut level: Vec<sha256d::Hash>) -> sha256d::Hash {
        while level.len() > 1 {
            level = level
                .chunks(2)
                .map(|pair| combine(pair[0], *pair.last().unwrap()))
                .collect();
        }
        level[0]
    }

    #[track_caller]
    fn assert_branch_fold_matches_full_tree(coinbase: sha256d::Hash, txids: Vec<Txid>) {
        let branches = merkle_branches(&txids);
        assert_eq!(
            branches.len(),
            ((txids.len() + 1) as f64).log2().ceil() as usize,
        );

        let mut leaves = vec![coinbase];
        leaves.extend(txids.iter().map(|txid| txid.to_raw_hash()));

        assert_eq!(
            fold_branches(coinbase, &branches).to_raw_hash(),
            full_tree_root(leaves),
        );
    }

    #[test]
    fn no_branches_when_only_coinbase() {
        assert!(merkle_branches(&[]).is_empty());
        assert_eq!(
            fold_branches(leaf(1), &[]).to_raw_hash(),
            leaf(1),
            "root of a single leaf is the leaf"
        );
    }

    #[test]
    fn single_txid_branch_is_that_txid() {
        let branches = merkle_branches(&[txid(1)]);
        assert_eq!(branches, vec![MerkleNode::from(txid(1))]);
    }

    #[test]
    fn two_txids() {
        // Leaves [cb, t1, t2] -> branches [t1, H(t2 || t2)].
        let branches = merkle_branches(&[txid(1), txid(2)]);
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[0], MerkleNode::from(txid(1)));
        assert_eq!(branches[1], MerkleNode(combine(leaf(2), leaf(2))));
    }

    #[test]
    fn three_txids_odd_layer_duplicates_last() {
        // Leaves [cb, t1, t2, t3] -> branches [t1, H(t2 || t3)].
        let branches = merkle_branches(&[txid(1), txid(2), txid(3)]);
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[1], MerkleNode(combine(leaf(2), leaf(3))));
    }

    #[test]
    fn fold_matches_full_tree_for_various_sizes() {
        for n in [1, 2, 3, 4, 5, 7, 8, 13] {
            let txids = (1..=n).map(|i| txid(i % 9 + 1)).collect::<Vec<Txid>>();
            assert_branch_fold_matches_full_tree(leaf(9), txids);
        }
    }

    #[test]
    fn coinbase_txid_hashes_reassembled_bytes() {
        let extranonce1 = "abcd1234".parse::<Extranonce>().unwrap();
        let extranonce2 = "00112233".parse::<Extranonce>().unwrap();

        let expected = {
            let bytes = hex::decode("aaabcd123400112233dd").unwrap();
            sha256d::Hash::hash(&bytes)
        };

        assert_eq!(
            coinbase_txid("aa", "dd", &extranonce1, &extranonce2).unwrap(),
            expected,
        );
    }

    #[test]
    fn coinbase_txid_rejects_bad_hex() {
        let extranonce = "ab".parse::<Extranonce>().unwrap();
        assert!(coinbase_txid("zz", "dd", &extranonce, &extranonce).is_err());
    }

    #[test]
    fn node_hex_roundtrip() {
        let hex = "c0f65e3443b9e2215ebd08cd6fc52d0e776897a3afdf4787cf28de48d9a8c3ad";
        let node = hex.parse::<MerkleNode>().unwrap();
        assert_eq!(node.to_string(), hex);

        let from_json: MerkleNode = serde_json::from_str(&format!("\"{hex}\"")).unwrap();
        assert_eq!(from_json, node);
    }

    #[test]
    fn node_rejects_wrong_length() {
        assert!("abcd".parse::<MerkleNode>().is_err());
    }
}
