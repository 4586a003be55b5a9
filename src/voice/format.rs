//! MIME type to container extension negotiation
//!
//! The sender's declared MIME type is mapped to a file extension that the
//! transcription backend understands. Unlisted `audio/*` types fall back to
//! [`DEFAULT_EXTENSION`]; the chosen extension must still appear in
//! [`SUPPORTED_EXTENSIONS`].

use crate::{Error, Result};

/// MIME type assumed when the client doesn't declare one
pub const DEFAULT_MIME_TYPE: &str = "audio/webm";

/// Container used for unlisted `audio/*` types
pub const DEFAULT_EXTENSION: &str = "webm";

/// Declared MIME type → container extension, checked in order
pub const FORMAT_TABLE: &[(&str, &str)] = &[
    ("audio/wav", "wav"),
    ("audio/x-wav", "wav"),
    ("audio/mp3", "mp3"),
    ("audio/mpeg", "mp3"),
    ("audio/mpga", "mpga"),
    ("audio/m4a", "m4a"),
    ("audio/ogg", "ogg"),
    ("audio/oga", "oga"),
    ("audio/webm", "webm"),
    ("audio/webm;codecs=opus", "webm"),
    ("audio/flac", "flac"),
    ("audio/mp4", "mp4"),
    ("audio/mp4;codecs=opus", "mp4"),
];

/// Extensions accepted by the transcription backend
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "flac", "m4a", "mp3", "mp4", "mpeg", "mpga", "oga", "ogg", "wav", "webm",
];

/// Resolve a declared MIME type to a supported container extension
///
/// # Errors
///
/// Returns [`Error::UnsupportedFormat`] for non-audio types and for
/// extensions outside the backend allowlist
pub fn resolve(mime_type: &str) -> Result<&'static str> {
    let extension = lookup(mime_type)
        .or_else(|| lookup(essence(mime_type)))
        .or_else(|| is_audio(mime_type).then_some(DEFAULT_EXTENSION))
        .ok_or_else(|| Error::UnsupportedFormat(format!("unsupported MIME type: {mime_type}")))?;

    if !SUPPORTED_EXTENSIONS.contains(&extension) {
        return Err(Error::UnsupportedFormat(format!(
            "unsupported file format: {extension}; supported formats: {}",
            SUPPORTED_EXTENSIONS.join(", ")
        )));
    }

    Ok(extension)
}

fn lookup(mime_type: &str) -> Option<&'static str> {
    FORMAT_TABLE
        .iter()
        .find(|(mime, _)| *mime == mime_type)
        .map(|(_, ext)| *ext)
}

/// MIME type without parameters (`audio/webm;codecs=vp9` → `audio/webm`)
fn essence(mime_type: &str) -> &str {
    mime_type.split(';').next().unwrap_or(mime_type).trim()
}

fn is_audio(mime_type: &str) -> bool {
    essence(mime_type)
        .strip_prefix("audio/")
        .is_some_and(|subtype| !subtype.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_table_entry_resolves_to_its_extension() {
        for (mime, ext) in FORMAT_TABLE {
            assert_eq!(resolve(mime).unwrap(), *ext, "{mime}");
        }
    }

    #[test]
    fn table_extensions_are_all_supported() {
        for (_, ext) in FORMAT_TABLE {
            assert!(SUPPORTED_EXTENSIONS.contains(ext));
        }
    }

    #[test]
    fn parameters_fall_back_to_essence() {
        assert_eq!(resolve("audio/ogg;codecs=opus").unwrap(), "ogg");
        assert_eq!(resolve("audio/wav; charset=binary").unwrap(), "wav");
    }

    #[test]
    fn unlisted_audio_uses_default_container() {
        assert_eq!(resolve("audio/aac").unwrap(), DEFAULT_EXTENSION);
        assert_eq!(resolve("audio/webm;codecs=vp9").unwrap(), "webm");
    }

    #[test]
    fn lookup_is_case_sensitive() {
        // Uppercase is not in the table, but still an audio type
        assert_eq!(resolve("audio/MPEG").unwrap(), DEFAULT_EXTENSION);
        assert!(resolve("AUDIO/mpeg").is_err());
    }

    #[test]
    fn non_audio_types_are_rejected() {
        assert!(matches!(
            resolve("application/x-bogus"),
            Err(Error::UnsupportedFormat(_))
        ));
        assert!(resolve("video/webm").is_err());
        assert!(resolve("audio/").is_err());
        assert!(resolve("").is_err());
    }
}
