//! `file:` URI helpers.
//!
//! Only the `file` scheme is required by the core. A URI is
//! accepted as `file:<path>` or `file://<path>`; the `file://` prefix is
//! stripped and the remainder is percent-decoded and canonicalized into a
//! filesystem `PathBuf`. Other schemes are recorded verbatim but are not
//! expected to be openable.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Bytes a `file:` path URI leaves unescaped: alphanumerics plus the path
/// separator and the handful of bytes safe unescaped in a URI path segment.
const PATH_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');

/// Build a `file://` URI string from an absolute filesystem path.
///
/// # Errors
///
/// Returns an error if `path` is not absolute.
pub fn file_uri(path: &Path) -> Result<String> {
    if !path.is_absolute() {
        bail!("invalid absolute file path for URI: {}", path.display());
    }
    let path_str = path.to_string_lossy();
    Ok(format!("file://{}", percent_encode_path(&path_str)))
}

/// Split a document URI into its filesystem path: `file:` required,
/// `file://` accepted and stripped, remainder canonicalized.
///
/// Non-`file` schemes are returned unchanged with `is_file` set to `false`;
/// the core records them verbatim without attempting to open them.
pub struct ParsedUri {
    pub raw: String,
    pub path: Option<PathBuf>,
    pub is_file: bool,
}

/// Parse a document URI, deriving a canonical filesystem path eagerly when
/// the scheme is `file`.
///
/// # Errors
///
/// Returns an error if the scheme is `file` but the remainder cannot be
/// percent-decoded as UTF-8.
pub fn parse_uri(uri: &str) -> Result<ParsedUri> {
    if let Some(rest) = uri.strip_prefix("file://") {
        let decoded = percent_decode_path(rest)
            .with_context(|| format!("invalid percent-encoding in URI: {uri}"))?;
        return Ok(ParsedUri {
            raw: uri.to_string(),
            path: Some(canonicalize_best_effort(&decoded)),
            is_file: true,
        });
    }
    if let Some(rest) = uri.strip_prefix("file:") {
        let decoded = percent_decode_path(rest)
            .with_context(|| format!("invalid percent-encoding in URI: {uri}"))?;
        return Ok(ParsedUri {
            raw: uri.to_string(),
            path: Some(canonicalize_best_effort(&decoded)),
            is_file: true,
        });
    }
    Ok(ParsedUri {
        raw: uri.to_string(),
        path: None,
        is_file: false,
    })
}

/// Canonicalize a path if it exists on disk; otherwise fall back to the
/// decoded path unchanged. A document may be opened before it has been
/// written (an untitled buffer saved for the first time), so failing to
/// canonicalize is not itself an error.
fn canonicalize_best_effort(decoded: &str) -> PathBuf {
    let p = PathBuf::from(decoded);
    std::fs::canonicalize(&p).unwrap_or(p)
}

fn percent_encode_path(path: &str) -> String {
    utf8_percent_encode(path, PATH_SAFE).to_string()
}

fn percent_decode_path(path: &str) -> Option<String> {
    percent_decode_str(path)
        .decode_utf8()
        .ok()
        .map(|decoded| decoded.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_uri_absolute_path() {
        let uri = file_uri(Path::new("/tmp/test.rs")).unwrap();
        assert_eq!(uri, "file:///tmp/test.rs");
    }

    #[test]
    fn file_uri_percent_encodes_spaces() {
        let uri = file_uri(Path::new("/tmp/space file.rs")).unwrap();
        assert_eq!(uri, "file:///tmp/space%20file.rs");
    }

    #[test]
    fn file_uri_rejects_relative_path() {
        assert!(file_uri(Path::new("relative/test.rs")).is_err());
    }

    #[test]
    fn parse_uri_strips_file_scheme_with_authority() {
        let parsed = parse_uri("file:///tmp/test.rs").unwrap();
        assert!(parsed.is_file);
        assert_eq!(parsed.path.unwrap(), PathBuf::from("/tmp/test.rs"));
    }

    #[test]
    fn parse_uri_strips_file_scheme_without_authority() {
        let parsed = parse_uri("file:/tmp/test.rs").unwrap();
        assert!(parsed.is_file);
        assert_eq!(parsed.path.unwrap(), PathBuf::from("/tmp/test.rs"));
    }

    #[test]
    fn parse_uri_decodes_percent_encoding() {
        let parsed = parse_uri("file:///tmp/space%20file.rs").unwrap();
        assert_eq!(parsed.path.unwrap(), PathBuf::from("/tmp/space file.rs"));
    }

    #[test]
    fn parse_uri_records_other_schemes_verbatim() {
        let parsed = parse_uri("untitled:Untitled-1").unwrap();
        assert!(!parsed.is_file);
        assert!(parsed.path.is_none());
        assert_eq!(parsed.raw, "untitled:Untitled-1");
    }
}
