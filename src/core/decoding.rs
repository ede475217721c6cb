//! Content-type dispatch for object bodies.
//!
//! Only JSON structure is decoded inline; every other supported type is
//! shipped as raw content. Gzip bodies are inflated before dispatch.

use std::io::Read;

use serde_json::Value;
use thiserror::Error;

/// Gzip magic number followed by the DEFLATE method byte.
const GZIP_MAGIC: [u8; 3] = [0x1f, 0x8b, 0x08];

/// Errors raised while decoding an object body.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Body was not valid JSON.
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    /// Body could not be inflated.
    #[error("gzip: {0}")]
    Gzip(#[from] std::io::Error),
}

/// Supported object content types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// `application/json`
    Json,
    /// `application/x-ndjson`
    NdJson,
    /// `text/plain`
    Text,
    /// `text/csv`
    Csv,
    /// `application/octet-stream`
    OctetStream,
    /// `application/gzip` and `application/x-gzip`
    Gzip,
}

/// Decoded object body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decoded {
    /// Raw body as text.
    pub message: String,
    /// Structured documents, present only for parsed JSON content.
    pub json_data: Option<Vec<Value>>,
}

impl ContentKind {
    /// Map a MIME type to a supported kind, ignoring parameters and case.
    #[must_use]
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "application/json" => Some(Self::Json),
            "application/x-ndjson" | "application/ndjson" => Some(Self::NdJson),
            "text/plain" => Some(Self::Text),
            "text/csv" => Some(Self::Csv),
            "application/octet-stream" => Some(Self::OctetStream),
            "application/gzip" | "application/x-gzip" => Some(Self::Gzip),
            _ => None,
        }
    }

    /// Guess a kind from an object name's extension.
    #[must_use]
    pub fn from_extension(name: &str) -> Option<Self> {
        let (_, ext) = name.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "ndjson" | "jsonl" => Some(Self::NdJson),
            "txt" | "log" => Some(Self::Text),
            "csv" => Some(Self::Csv),
            "gz" | "gzip" => Some(Self::Gzip),
            _ => None,
        }
    }

    /// Canonical MIME type for this kind.
    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::NdJson => "application/x-ndjson",
            Self::Text => "text/plain",
            Self::Csv => "text/csv",
            Self::OctetStream => "application/octet-stream",
            Self::Gzip => "application/x-gzip",
        }
    }

    /// Decode a raw body fetched for `object_name`.
    ///
    /// Gzipped content is inflated first, and the inner kind is taken from the
    /// name with its compression suffix removed.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError` when inflation fails or when `parse_json` is set
    /// and JSON content does not parse.
    pub fn decode(
        self,
        object_name: &str,
        raw: &[u8],
        parse_json: bool,
    ) -> Result<Decoded, DecodeError> {
        let inflated;
        let (kind, body) = if self == Self::Gzip || is_gzipped(raw) {
            inflated = inflate(raw)?;
            (inner_kind(self, object_name), inflated.as_slice())
        } else {
            (self, raw)
        };

        let json_data = match kind {
            Self::Json if parse_json => Some(parse_json_document(body)?),
            Self::NdJson if parse_json => Some(parse_json_lines(body)?),
            _ => None,
        };

        Ok(Decoded {
            message: String::from_utf8_lossy(body).into_owned(),
            json_data,
        })
    }
}

/// Whether the body starts with the gzip header.
#[must_use]
pub fn is_gzipped(raw: &[u8]) -> bool {
    raw.starts_with(&GZIP_MAGIC)
}

fn inflate(raw: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut decoder = flate2::read::GzDecoder::new(raw);
    let mut buf = Vec::new();
    decoder.read_to_end(&mut buf)?;
    Ok(buf)
}

fn inner_kind(outer: ContentKind, object_name: &str) -> ContentKind {
    let stripped = object_name
        .strip_suffix(".gz")
        .or_else(|| object_name.strip_suffix(".gzip"))
        .unwrap_or(object_name);
    match ContentKind::from_extension(stripped) {
        Some(ContentKind::Gzip) | None if outer == ContentKind::Gzip => ContentKind::Text,
        Some(kind) => kind,
        None => outer,
    }
}

/// A top-level array expands into one document per element.
fn parse_json_document(body: &[u8]) -> Result<Vec<Value>, DecodeError> {
    match serde_json::from_slice::<Value>(body)? {
        Value::Array(items) => Ok(items),
        value => Ok(vec![value]),
    }
}

fn parse_json_lines(body: &[u8]) -> Result<Vec<Value>, DecodeError> {
    body.split(|b| *b == b'\n')
        .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
        .map(|line| serde_json::from_slice::<Value>(line).map_err(DecodeError::from))
        .collect()
}
