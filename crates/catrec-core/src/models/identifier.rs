use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Which catalog an identifier came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Grid-processing file catalog (Source A).
    Grid,
    /// Open-search data hub (Source B).
    Hub,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Grid => write!(f, "grid"),
            SourceKind::Hub => write!(f, "hub"),
        }
    }
}

/// Cross-source product key. Equal keys denote the same product.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Maps raw catalog identifiers to [`CanonicalKey`]s.
///
/// Rules per source:
/// - grid: take the last path segment, then strip the configured file
///   suffix and surrounding whitespace until neither is left, so keys that
///   still end in the suffix are normalized too.
/// - hub: identifiers are already suffix-free; only surrounding whitespace
///   is removed.
///
/// `normalize` is pure and idempotent for a fixed source kind.
/// [`IdentifierNormalizer::to_raw`] rebuilds a grid filename carrying the
/// suffix exactly once, so the round trip is lossy for names that carried
/// it more than once: `A.zip.zip` becomes `A`, which maps back to `A.zip`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierNormalizer {
    grid_suffix: String,
}

impl IdentifierNormalizer {
    pub fn new(grid_suffix: impl Into<String>) -> Self {
        Self {
            grid_suffix: grid_suffix.into(),
        }
    }

    pub fn normalize(&self, raw: &str, kind: SourceKind) -> CanonicalKey {
        let trimmed = raw.trim();
        match kind {
            SourceKind::Grid => {
                let trimmed = trimmed.trim_end_matches('/');
                let mut name = trimmed.rsplit('/').next().unwrap_or(trimmed).trim();
                if !self.grid_suffix.is_empty() {
                    while let Some(stripped) = name.strip_suffix(self.grid_suffix.as_str()) {
                        name = stripped.trim_end();
                    }
                }
                CanonicalKey(name.to_string())
            }
            SourceKind::Hub => CanonicalKey(trimmed.to_string()),
        }
    }

    pub fn normalize_all<I, S>(&self, raws: I, kind: SourceKind) -> BTreeSet<CanonicalKey>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        raws.into_iter()
            .map(|raw| self.normalize(raw.as_ref(), kind))
            .collect()
    }

    /// The raw form a key takes in the given catalog.
    pub fn to_raw(&self, key: &CanonicalKey, kind: SourceKind) -> String {
        match kind {
            SourceKind::Grid => format!("{}{}", key.0, self.grid_suffix),
            SourceKind::Hub => key.0.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_suffix_is_stripped() {
        let n = IdentifierNormalizer::new(".ext");
        assert_eq!(n.normalize("X001.ext", SourceKind::Grid).as_str(), "X001");
        assert_eq!(n.normalize("  X001.ext\r", SourceKind::Grid).as_str(), "X001");
        assert_eq!(
            n.normalize("/data/s2/X001.ext", SourceKind::Grid).as_str(),
            "X001"
        );
    }

    #[test]
    fn test_hub_identifiers_pass_through() {
        let n = IdentifierNormalizer::new(".ext");
        assert_eq!(n.normalize("X003", SourceKind::Hub).as_str(), "X003");
        assert_eq!(n.normalize("X003.ext", SourceKind::Hub).as_str(), "X003.ext");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let n = IdentifierNormalizer::new(".zip");
        let raws = [
            "A.zip",
            "A.zip.zip",
            "dir/A.zip",
            "A",
            "A.SAFE",
            "",
            "dir/ X001.zip",
            "X001 .zip",
            "X001.zip .zip",
            "dir/ /",
        ];
        for raw in raws {
            for kind in [SourceKind::Grid, SourceKind::Hub] {
                let once = n.normalize(raw, kind);
                let twice = n.normalize(once.as_str(), kind);
                assert_eq!(once, twice, "{raw} ({kind})");
            }
        }
    }

    #[test]
    fn test_round_trip_to_raw() {
        let n = IdentifierNormalizer::new(".zip");
        let raw = "S2A_MSIL1C_20240101T101421_N0510_R022_T32TQM_20240101T121006.zip";
        let key = n.normalize(raw, SourceKind::Grid);
        assert_eq!(n.to_raw(&key, SourceKind::Grid), raw);
        assert_eq!(n.to_raw(&key, SourceKind::Hub), key.as_str());
    }

    #[test]
    fn test_whitespace_inside_path_is_dropped() {
        let n = IdentifierNormalizer::new(".zip");
        assert_eq!(n.normalize("dir/ X001.zip", SourceKind::Grid).as_str(), "X001");
        assert_eq!(
            n.normalize("dir/ X001.zip", SourceKind::Grid),
            n.normalize("X001", SourceKind::Hub)
        );
    }

    #[test]
    fn test_repeated_suffix_round_trip_is_lossy() {
        let n = IdentifierNormalizer::new(".zip");
        let key = n.normalize("A.zip.zip", SourceKind::Grid);
        assert_eq!(key.as_str(), "A");
        assert_eq!(n.to_raw(&key, SourceKind::Grid), "A.zip");
    }

    #[test]
    fn test_empty_suffix_keeps_name() {
        let n = IdentifierNormalizer::new("");
        assert_eq!(n.normalize("X001.ext", SourceKind::Grid).as_str(), "X001.ext");
    }

    #[test]
    fn test_normalize_all_dedupes() {
        let n = IdentifierNormalizer::new(".ext");
        let keys = n.normalize_all(["X1.ext", "X1", "X2.ext"], SourceKind::Grid);
        assert_eq!(keys.len(), 2);
    }
}
