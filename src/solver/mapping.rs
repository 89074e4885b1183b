//! Mapping files: one `name_a, name_b` constraint per line.
//!
//! ```text
//! # producer and consumer hand over together
//! producer.FIRE_END_POSTFIRE_BEGIN, consumer.PREFIRE_BEGIN
//! ```
//!
//! Blank lines and lines starting with `#` are skipped. Tokens are
//! whitespace-trimmed. Any other line must hold exactly two non-empty
//! names.

use std::fmt::Write as _;
use std::path::Path;

use crate::error::{ConfigError, KernelError, KernelResult};

/// A constraint between two event names.
pub type MappingPair = (String, String);

/// Parse mapping text. The first bad line fails the whole parse.
pub fn parse_mapping(text: &str) -> KernelResult<Vec<MappingPair>> {
    let mut pairs = Vec::new();
    for (i, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let tokens: Vec<&str> = line.split(',').map(str::trim).collect();
        match tokens.as_slice() {
            [a, b] if !a.is_empty() && !b.is_empty() => {
                pairs.push((a.to_string(), b.to_string()));
            }
            _ => {
                return Err(ConfigError::MalformedMapping {
                    line: i + 1,
                    content: raw.to_string(),
                }
                .into())
            }
        }
    }
    Ok(pairs)
}

/// Read and parse a mapping file.
pub fn load_mapping(path: &Path) -> KernelResult<Vec<MappingPair>> {
    let text = std::fs::read_to_string(path).map_err(|source| KernelError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let pairs = parse_mapping(&text)?;
    tracing::debug!(path = %path.display(), pairs = pairs.len(), "loaded mapping");
    Ok(pairs)
}

/// Render pairs in the mapping format.
pub fn format_mapping(pairs: &[MappingPair]) -> String {
    let mut out = String::new();
    for (a, b) in pairs {
        let _ = writeln!(out, "{}, {}", a, b);
    }
    out
}

/// Write pairs to `path`, replacing its contents.
pub fn write_mapping(path: &Path, pairs: &[MappingPair]) -> KernelResult<()> {
    std::fs::write(path, format_mapping(pairs)).map_err(|source| KernelError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skips_comments_and_trims() {
        let text = "# header\n\n  a.X ,b.Y  \n# c,d\nc.Z,d.W\n";
        let pairs = parse_mapping(text).unwrap();
        assert_eq!(
            pairs,
            vec![
                ("a.X".to_string(), "b.Y".to_string()),
                ("c.Z".to_string(), "d.W".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_rejects_bad_lines() {
        for bad in ["a", "a,b,c", "a,", " ,b"] {
            let text = format!("x,y\n{}\n", bad);
            match parse_mapping(&text) {
                Err(KernelError::Config(ConfigError::MalformedMapping { line, .. })) => {
                    assert_eq!(line, 2)
                }
                other => panic!("expected malformed mapping for {:?}, got {:?}", bad, other),
            }
        }
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pairs.mapping");
        let pairs = vec![("a".to_string(), "b".to_string())];
        write_mapping(&path, &pairs).unwrap();
        assert_eq!(load_mapping(&path).unwrap(), pairs);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.mapping");
        match load_mapping(&path) {
            Err(KernelError::Io { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected I/O error, got {:?}", other),
        }
    }
}
