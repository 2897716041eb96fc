//! Result decision engine.
//!
//! Turns the bulb candidates of a fully specified selection into one
//! presentation mode. Rules are evaluated in a fixed order and the first match
//! wins:
//!
//! 1. no candidates: [`Decision::Empty`]
//! 2. one distinct part: [`Decision::Single`]
//! 3. one H-family halogen part and one D-family xenon part:
//!    [`Decision::BinaryColorChoice`]
//! 4. a single bucket with several parts of its own family:
//!    [`Decision::EscalateSameFamily`]
//! 5. anything else: [`Decision::EscalateAmbiguous`]

pub mod classify;
pub mod links;

use serde::Serialize;

use crate::catalog::BulbCandidate;
use classify::{Bucket, Buckets};
use links::PartLinkResolver;

/// A part number with its purchase link. `link` is `None` when no link is registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkedPart {
    pub part_number: String,
    pub link: Option<String>,
}

impl LinkedPart {
    fn resolve(part_number: &str, links: &dyn PartLinkResolver) -> Self {
        Self {
            part_number: part_number.to_string(),
            link: links.resolve(part_number),
        }
    }
}

/// One side of a colour choice: the light a driver sees, and the part behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColoredPart {
    pub color: &'static str,
    #[serde(flatten)]
    pub part: LinkedPart,
}

impl ColoredPart {
    fn resolve(bucket: Bucket, part_number: &str, links: &dyn PartLinkResolver) -> Self {
        Self {
            color: bucket.light_color(),
            part: LinkedPart::resolve(part_number, links),
        }
    }
}

/// Why a result needs manual support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationReason {
    /// Several equivalent parts of one family.
    SameFamilyMultiple,
    /// A mix of parts that does not reduce to a colour choice.
    Ambiguous,
}

/// Presentation mode for a candidate set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Decision {
    /// No part is known for this configuration.
    Empty,
    /// One definitive part.
    Single { part: LinkedPart },
    /// Yellow light means the halogen part, white light the xenon part.
    BinaryColorChoice {
        halogen: ColoredPart,
        xenon: ColoredPart,
    },
    EscalateSameFamily { bucket: Bucket, parts: Vec<String> },
    EscalateAmbiguous {
        halogen: Vec<String>,
        xenon: Vec<String>,
    },
}

impl Decision {
    pub fn escalation(&self) -> Option<EscalationReason> {
        match self {
            Decision::EscalateSameFamily { .. } => Some(EscalationReason::SameFamilyMultiple),
            Decision::EscalateAmbiguous { .. } => Some(EscalationReason::Ambiguous),
            _ => None,
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            Decision::Empty => "empty",
            Decision::Single { .. } => "single",
            Decision::BinaryColorChoice { .. } => "binary_color_choice",
            Decision::EscalateSameFamily { .. } => "escalate_same_family",
            Decision::EscalateAmbiguous { .. } => "escalate_ambiguous",
        }
    }
}

/// Pick the presentation mode for `candidates`.
pub fn decide(candidates: &[BulbCandidate], links: &dyn PartLinkResolver) -> Decision {
    let buckets = Buckets::from_candidates(candidates);

    match buckets.union_len() {
        0 => return Decision::Empty,
        1 => {
            let part = buckets
                .halogen
                .first()
                .or(buckets.xenon.first())
                .map(|p| LinkedPart::resolve(p, links));
            if let Some(part) = part {
                return Decision::Single { part };
            }
        }
        _ => {}
    }

    if let ([h], [x]) = (buckets.halogen.as_slice(), buckets.xenon.as_slice()) {
        if Bucket::Halogen.matches_family(h) && Bucket::Xenon.matches_family(x) {
            return Decision::BinaryColorChoice {
                halogen: ColoredPart::resolve(Bucket::Halogen, h, links),
                xenon: ColoredPart::resolve(Bucket::Xenon, x, links),
            };
        }
    }

    let only = match (buckets.halogen.is_empty(), buckets.xenon.is_empty()) {
        (false, true) => Some(Bucket::Halogen),
        (true, false) => Some(Bucket::Xenon),
        _ => None,
    };
    if let Some(bucket) = only {
        let parts = buckets.get(bucket);
        if parts.len() >= 2 && parts.iter().all(|p| bucket.matches_family(p)) {
            return Decision::EscalateSameFamily {
                bucket,
                parts: parts.to_vec(),
            };
        }
    }

    Decision::EscalateAmbiguous {
        halogen: buckets.halogen,
        xenon: buckets.xenon,
    }
}
