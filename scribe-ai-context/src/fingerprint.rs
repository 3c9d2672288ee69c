//! Cheap change detection for document snapshots.
//!
//! The default [`FingerprintMode::Prefix`] hashes only the first
//! [`PREFIX_LINES`] lines (capped at [`PREFIX_CHAR_BUDGET`] characters) plus the
//! total line count. Edits that stay beyond that window and keep the line count
//! unchanged are not detected. [`FingerprintMode::FullContent`] hashes every line
//! for callers that need exact change detection and can pay for it.

use crate::document::DocumentSnapshot;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lines that feed a prefix fingerprint.
pub const PREFIX_LINES: usize = 50;

/// Character budget for the prefix window.
pub const PREFIX_CHAR_BUDGET: usize = 1000;

/// How much of the document a fingerprint covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FingerprintMode {
    #[default]
    Prefix,
    #[serde(alias = "full")]
    FullContent,
}

impl std::str::FromStr for FingerprintMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "prefix" => Ok(FingerprintMode::Prefix),
            "full" | "full-content" | "full_content" => Ok(FingerprintMode::FullContent),
            _ => Err(format!(
                "Invalid fingerprint mode: '{s}'. Valid values are: prefix, full-content"
            )),
        }
    }
}

/// Opaque change-detection signature of a snapshot.
///
/// [`Fingerprint::Unknown`] stands for a snapshot that could not be read. It never
/// matches anything, itself included, so it always forces a rebuild attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum Fingerprint {
    Known([u8; 32]),
    Unknown,
}

impl Fingerprint {
    /// Compute the fingerprint of an optional snapshot.
    pub fn of(snapshot: Option<&DocumentSnapshot>, mode: FingerprintMode) -> Self {
        match snapshot {
            Some(snapshot) => fingerprint_with_mode(snapshot, mode),
            None => Fingerprint::Unknown,
        }
    }

    /// Whether two fingerprints describe the same document state.
    pub fn matches(&self, other: &Fingerprint) -> bool {
        match (self, other) {
            (Fingerprint::Known(a), Fingerprint::Known(b)) => a == b,
            _ => false,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Fingerprint::Known(_))
    }

    pub fn to_hex(&self) -> Option<String> {
        match self {
            Fingerprint::Known(bytes) => Some(hex::encode(bytes)),
            Fingerprint::Unknown => None,
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_hex() {
            Some(hex) => write!(f, "{}", &hex[..12]),
            None => write!(f, "unknown"),
        }
    }
}

/// Prefix fingerprint of a snapshot.
pub fn fingerprint(snapshot: &DocumentSnapshot) -> Fingerprint {
    fingerprint_with_mode(snapshot, FingerprintMode::Prefix)
}

pub fn fingerprint_with_mode(snapshot: &DocumentSnapshot, mode: FingerprintMode) -> Fingerprint {
    let mut hasher = blake3::Hasher::new();
    match mode {
        FingerprintMode::Prefix => {
            let mut budget = PREFIX_CHAR_BUDGET;
            for line in snapshot.lines().iter().take(PREFIX_LINES) {
                if budget == 0 {
                    break;
                }
                let taken: String = line.text.chars().take(budget).collect();
                budget -= taken.chars().count();
                hasher.update(taken.as_bytes());
                hasher.update(b"\n");
            }
        }
        FingerprintMode::FullContent => {
            for line in snapshot.lines() {
                hasher.update(line.line_type.tag().as_bytes());
                hasher.update(&[0x1f]);
                hasher.update(line.text.as_bytes());
                hasher.update(&[u8::from(line.ends_element), b'\n']);
            }
        }
    }
    hasher.update(snapshot.len().to_string().as_bytes());
    Fingerprint::Known(*hasher.finalize().as_bytes())
}
