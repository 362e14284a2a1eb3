use std::collections::BTreeMap;

use cloudmirror_protocol::{HashAlgorithm, HashOutcome, HashVerification};
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256};

enum Digester {
    Md5(Md5),
    Sha1(Sha1),
    Sha256(Sha256),
}

impl Digester {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Md5 => Self::Md5(Md5::new()),
            HashAlgorithm::Sha1 => Self::Sha1(Sha1::new()),
            HashAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Md5(h) => h.update(data),
            Self::Sha1(h) => h.update(data),
            Self::Sha256(h) => h.update(data),
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            Self::Md5(h) => hex::encode(h.finalize()),
            Self::Sha1(h) => hex::encode(h.finalize()),
            Self::Sha256(h) => hex::encode(h.finalize()),
        }
    }
}

/// Hex digest of `data` in one shot.
pub fn digest_hex(algorithm: HashAlgorithm, data: &[u8]) -> String {
    let mut digester = Digester::new(algorithm);
    digester.update(data);
    digester.finalize_hex()
}

/// Digests computed by a [`HashVerifier`] and how they compare.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashReport {
    /// Lowercase hex digest per computed algorithm.
    pub actual: BTreeMap<HashAlgorithm, String>,
    pub outcomes: HashVerification,
}

impl HashReport {
    /// Algorithms whose digest did not match.
    pub fn mismatches(&self) -> impl Iterator<Item = HashAlgorithm> + '_ {
        self.outcomes
            .iter()
            .filter(|(_, o)| **o == HashOutcome::Invalid)
            .map(|(a, _)| *a)
    }

    pub fn all_valid(&self) -> bool {
        self.outcomes.values().all(|o| *o != HashOutcome::Invalid)
    }
}

/// Incremental digest of every chunk that passes through a transfer.
///
/// Only algorithms with a non-empty expected digest are computed; the
/// rest are reported as [`HashOutcome::Absent`].
pub struct HashVerifier {
    expected: BTreeMap<HashAlgorithm, String>,
    digesters: Vec<(HashAlgorithm, Digester)>,
}

impl HashVerifier {
    pub fn new(expected: &BTreeMap<HashAlgorithm, String>) -> Self {
        let expected: BTreeMap<_, _> = expected
            .iter()
            .map(|(a, d)| (*a, d.trim().to_ascii_lowercase()))
            .collect();
        let digesters = expected
            .iter()
            .filter(|(_, d)| !d.is_empty())
            .map(|(a, _)| (*a, Digester::new(*a)))
            .collect();
        Self {
            expected,
            digesters,
        }
    }

    /// Returns `true` if no digest will be computed.
    pub fn is_empty(&self) -> bool {
        self.digesters.is_empty()
    }

    pub fn update(&mut self, data: &[u8]) {
        for (_, digester) in &mut self.digesters {
            digester.update(data);
        }
    }

    /// Consumes the verifier and compares against the expected digests.
    pub fn finalize(self) -> HashReport {
        let mut actual = BTreeMap::new();
        let mut outcomes = HashVerification::new();

        for (algorithm, digester) in self.digesters {
            let digest = digester.finalize_hex();
            let outcome = match self.expected.get(&algorithm) {
                Some(expected) if *expected == digest => HashOutcome::Valid,
                _ => HashOutcome::Invalid,
            };
            outcomes.insert(algorithm, outcome);
            actual.insert(algorithm, digest);
        }

        for algorithm in self.expected.keys() {
            outcomes.entry(*algorithm).or_insert(HashOutcome::Absent);
        }

        HashReport { actual, outcomes }
    }
}
