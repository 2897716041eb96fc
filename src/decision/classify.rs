//! Technology buckets and connector family shapes.

use serde::Serialize;

use crate::catalog::BulbCandidate;

/// Lighting technology class a part is assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Halogen,
    Xenon,
}

impl Bucket {
    /// Colour of the light a driver sees with this technology fitted.
    pub fn light_color(self) -> &'static str {
        match self {
            Bucket::Halogen => "yellow",
            Bucket::Xenon => "white",
        }
    }

    /// Whether `part_number` has the connector shape expected for this bucket.
    pub fn matches_family(self, part_number: &str) -> bool {
        match self {
            Bucket::Halogen => is_h_family(part_number),
            Bucket::Xenon => is_d_family(part_number),
        }
    }
}

/// Assign a candidate to exactly one bucket.
///
/// An explicit technology label wins. Unlabeled parts starting with `D` are
/// xenon; everything else, including unknown technologies, falls back to
/// halogen.
pub fn classify(candidate: &BulbCandidate) -> Bucket {
    if let Some(tech) = candidate.technology.as_deref() {
        let tech = tech.to_lowercase();
        if tech.contains("halogen") {
            return Bucket::Halogen;
        }
        if tech.contains("xenon") {
            return Bucket::Xenon;
        }
    }

    if normalized(&candidate.part_number).starts_with('D') {
        Bucket::Xenon
    } else {
        Bucket::Halogen
    }
}

/// `H…`, `HB…`, `9005` or `9006`.
pub fn is_h_family(part_number: &str) -> bool {
    let p = normalized(part_number);
    p.starts_with('H') || p == "9005" || p == "9006"
}

/// `D…`.
pub fn is_d_family(part_number: &str) -> bool {
    normalized(part_number).starts_with('D')
}

fn normalized(part_number: &str) -> String {
    part_number.trim().to_uppercase()
}

/// Candidates split by bucket, deduplicated by part number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Buckets {
    pub halogen: Vec<String>,
    pub xenon: Vec<String>,
}

impl Buckets {
    /// Classify every candidate. The first occurrence of a part number decides
    /// its bucket; later duplicates are ignored.
    pub fn from_candidates(candidates: &[BulbCandidate]) -> Self {
        let mut buckets = Buckets::default();
        for candidate in candidates {
            let part = candidate.part_number.trim();
            if part.is_empty() || buckets.contains(part) {
                continue;
            }
            let part = part.to_string();
            match classify(candidate) {
                Bucket::Halogen => buckets.halogen.push(part),
                Bucket::Xenon => buckets.xenon.push(part),
            }
        }
        buckets
    }

    pub fn contains(&self, part_number: &str) -> bool {
        self.halogen.iter().chain(&self.xenon).any(|p| p == part_number)
    }

    pub fn get(&self, bucket: Bucket) -> &[String] {
        match bucket {
            Bucket::Halogen => &self.halogen,
            Bucket::Xenon => &self.xenon,
        }
    }

    /// Number of distinct part numbers across both buckets.
    pub fn union_len(&self) -> usize {
        self.halogen.len() + self.xenon.len()
    }
}
