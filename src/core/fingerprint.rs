use crate::core::model::SourceImage;
use image_hasher::{HashAlg, Hasher, HasherConfig, ImageHash};
use std::fmt;

/// A perceptual hash of one image. Distance is the Hamming distance between
/// the two bit vectors.
#[derive(Clone, PartialEq, Eq)]
pub struct Fingerprint(ImageHash);

impl Fingerprint {
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        ImageHash::from_bytes(bytes).ok().map(Self)
    }

    pub fn distance(&self, other: &Fingerprint) -> u32 {
        self.0.dist(&other.0)
    }

    pub fn bits(&self) -> usize {
        self.0.as_bytes().len() * 8
    }

    pub fn to_base64(&self) -> String {
        self.0.to_base64()
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_base64())
    }
}

/// pHash: DCT preprocessing, then each low-frequency coefficient is compared
/// against the median of the block.
pub struct PerceptualHasher {
    hasher: Hasher,
}

impl PerceptualHasher {
    pub fn new(hash_size: u32) -> Self {
        let hasher = HasherConfig::new()
            .hash_size(hash_size, hash_size)
            .hash_alg(HashAlg::Median)
            .preproc_dct()
            .to_hasher();
        Self { hasher }
    }

    pub fn fingerprint(&self, image: &SourceImage) -> Fingerprint {
        Fingerprint(self.hasher.hash_image(&image.pixels))
    }
}

/// Outcome of offering a fingerprint to the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Accepted with the given zero-based rank.
    Accepted(usize),
    /// Rejected as a near-duplicate of the accepted fingerprint at this rank.
    DuplicateOf(usize),
}

/// Accumulates accepted fingerprints. Every candidate is compared against
/// the whole accepted set, not only the most recent entry.
#[derive(Debug)]
pub struct DedupGate {
    threshold: u32,
    accepted: Vec<Fingerprint>,
}

impl DedupGate {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            accepted: Vec::new(),
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn len(&self) -> usize {
        self.accepted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }

    /// Rank of the first accepted fingerprint within the threshold, if any.
    pub fn find_duplicate(&self, fingerprint: &Fingerprint) -> Option<usize> {
        self.accepted
            .iter()
            .position(|existing| existing.distance(fingerprint) <= self.threshold)
    }

    pub fn is_duplicate(&self, fingerprint: &Fingerprint) -> bool {
        self.find_duplicate(fingerprint).is_some()
    }

    /// Accept `fingerprint` unless it collides with an accepted one. Rejected
    /// fingerprints are dropped and leave the set unchanged.
    pub fn offer(&mut self, fingerprint: Fingerprint) -> Verdict {
        if let Some(rank) = self.find_duplicate(&fingerprint) {
            return Verdict::DuplicateOf(rank);
        }
        self.accepted.push(fingerprint);
        Verdict::Accepted(self.accepted.len() - 1)
    }

    pub fn admit(&mut self, fingerprint: Fingerprint) -> bool {
        matches!(self.offer(fingerprint), Verdict::Accepted(_))
    }
}
