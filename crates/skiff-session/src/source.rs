//! Submit source descriptor parsing.
//!
//! A submit source is either a magnet URI (recognized by the fixed
//! `magnet:` prefix) or a path to an existing metainfo file. Parsing is a
//! stateless, single-shot operation; failures surface to the presentation
//! layer and never reach the engine.

use std::path::Path;

use skiff_engine_core::{JobId, JobSource};

use crate::error::SourceError;

/// Magnet URI prefix distinguishing URIs from file paths.
const MAGNET_PREFIX: &str = "magnet:";
/// Exact-topic prefix carrying the content hash.
const BTIH_PREFIX: &str = "urn:btih:";

/// Outcome of parsing a user-supplied submit source.
#[derive(Debug, Clone)]
pub struct ParsedSource {
    /// Engine-facing source descriptor.
    pub source: JobSource,
    /// Content identity, when the source text carries one (magnet URIs).
    pub id_hint: Option<JobId>,
    /// Display name, when the source text carries one.
    pub name_hint: Option<String>,
}

/// Parse a submit source string.
///
/// # Errors
///
/// Returns an error when a magnet URI carries no decodable content hash,
/// or when a non-magnet source does not name an existing file.
pub fn parse_source(input: &str) -> Result<ParsedSource, SourceError> {
    let trimmed = input.trim();
    if trimmed.starts_with(MAGNET_PREFIX) {
        return parse_magnet(trimmed);
    }

    let path = Path::new(trimmed);
    if path.is_file() {
        let name_hint = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(ToOwned::to_owned);
        Ok(ParsedSource {
            source: JobSource::metainfo_file(path),
            id_hint: None,
            name_hint,
        })
    } else {
        Err(SourceError::FileNotFound {
            path: path.to_path_buf(),
        })
    }
}

fn parse_magnet(uri: &str) -> Result<ParsedSource, SourceError> {
    let mut hash_text: Option<&str> = None;
    let mut name_hint: Option<String> = None;

    let query = uri.split_once('?').map_or("", |(_, query)| query);
    for pair in query.split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        match key {
            "xt" => {
                if let Some(hash) = value.strip_prefix(BTIH_PREFIX) {
                    hash_text = Some(hash);
                }
            }
            "dn" if name_hint.is_none() => {
                name_hint = Some(value.replace('+', " "));
            }
            _ => {}
        }
    }

    let hash_text = hash_text.ok_or_else(|| SourceError::MissingInfoHash {
        uri: uri.to_string(),
    })?;
    let id = hash_text
        .to_ascii_lowercase()
        .parse::<JobId>()
        .map_err(|_| SourceError::InvalidInfoHash {
            value: hash_text.to_string(),
        })?;

    Ok(ParsedSource {
        source: JobSource::magnet(uri),
        id_hint: Some(id),
        name_hint,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const HASH_HEX: &str = "0123456789abcdef0123456789abcdef01234567";

    #[test]
    fn magnet_with_hash_and_name_parses() {
        let uri = format!("magnet:?xt=urn:btih:{HASH_HEX}&dn=Demo+Torrent&tr=http://t.example");
        let parsed = parse_source(&uri).expect("magnet parses");

        assert!(matches!(parsed.source, JobSource::Magnet { .. }));
        assert_eq!(
            parsed.id_hint.expect("hash present").to_string(),
            HASH_HEX
        );
        assert_eq!(parsed.name_hint.as_deref(), Some("Demo Torrent"));
    }

    #[test]
    fn magnet_hash_is_case_insensitive() {
        let uri = format!("magnet:?xt=urn:btih:{}", HASH_HEX.to_ascii_uppercase());
        let parsed = parse_source(&uri).expect("magnet parses");
        assert_eq!(
            parsed.id_hint.expect("hash present").to_string(),
            HASH_HEX
        );
    }

    #[test]
    fn magnet_without_hash_is_rejected() {
        assert!(matches!(
            parse_source("magnet:?dn=just-a-name"),
            Err(SourceError::MissingInfoHash { .. })
        ));
    }

    #[test]
    fn magnet_with_short_hash_is_rejected() {
        assert!(matches!(
            parse_source("magnet:?xt=urn:btih:deadbeef"),
            Err(SourceError::InvalidInfoHash { .. })
        ));
    }

    #[test]
    fn existing_file_becomes_metainfo_source() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("linux-iso.torrent");
        fs::write(&path, b"metainfo-bytes")?;

        let parsed = parse_source(path.to_str().expect("utf-8 path"))?;
        assert!(matches!(parsed.source, JobSource::MetainfoFile { .. }));
        assert!(parsed.id_hint.is_none(), "file identity comes from the engine");
        assert_eq!(parsed.name_hint.as_deref(), Some("linux-iso"));
        Ok(())
    }

    #[test]
    fn missing_file_is_rejected() {
        assert!(matches!(
            parse_source("/nowhere/missing.torrent"),
            Err(SourceError::FileNotFound { .. })
        ));
    }
}
