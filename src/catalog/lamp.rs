//! Recognized lamp functions.
//!
//! The catalog carries free-form position strings. Only headlight functions
//! are offered to users: high beam, low beam and front fog.

use serde::Serialize;

/// Raw position strings accepted as a recognized lamp function, lowercase.
pub const RECOGNIZED_POSITIONS: [&str; 5] = [
    "low beam",
    "high beam",
    "fog lamps",
    "fog light",
    "front fog light",
];

/// Lamp function offered for selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LampFunction {
    HighBeam,
    LowBeam,
    Fog,
}

impl LampFunction {
    /// Map a catalog position string to its lamp function.
    ///
    /// Accepts a few fog spellings beyond [`RECOGNIZED_POSITIONS`] so labels
    /// stay stable if the catalog filter is widened.
    pub fn from_position(position: &str) -> Option<Self> {
        match position.trim().to_lowercase().as_str() {
            "high beam" => Some(LampFunction::HighBeam),
            "low beam" => Some(LampFunction::LowBeam),
            "fog lamps" | "fog lamp" | "fog light" | "front fog light" | "front fog lights" => {
                Some(LampFunction::Fog)
            }
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LampFunction::HighBeam => "High beam",
            LampFunction::LowBeam => "Low beam",
            LampFunction::Fog => "Fog lights",
        }
    }
}

/// Whether a position string belongs to the closed set served by the catalog.
pub fn is_recognized(position: &str) -> bool {
    let p = position.trim().to_lowercase();
    RECOGNIZED_POSITIONS.contains(&p.as_str())
}

/// Display label for a raw position; unknown positions are shown verbatim.
pub fn position_label(position: &str) -> String {
    LampFunction::from_position(position)
        .map_or_else(|| position.to_string(), |f| f.label().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_position_is_case_insensitive() {
        assert_eq!(LampFunction::from_position(" High Beam "), Some(LampFunction::HighBeam));
        assert_eq!(LampFunction::from_position("FOG LAMPS"), Some(LampFunction::Fog));
        assert_eq!(LampFunction::from_position("Tail light"), None);
    }

    #[test]
    fn test_recognized_set_is_closed() {
        assert!(is_recognized("Front Fog Light"));
        assert!(!is_recognized("front fog lights"));
        assert!(!is_recognized("indicator"));
    }

    #[test]
    fn test_labels() {
        assert_eq!(position_label("low beam"), "Low beam");
        assert_eq!(position_label("Cornering"), "Cornering");
    }
}
