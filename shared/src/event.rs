//! Turns an S3 notification record into a source the pipeline can work on.

use aws_lambda_events::event::s3::S3EventRecord;
use percent_encoding::percent_decode_str;
use std::path::Path;

use crate::config::{normalize_extension, Config};

/// Bucket and object key exactly as delivered by the trigger (key still percent-encoded).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerEvent {
    pub bucket: String,
    pub object_key: String,
}

impl TriggerEvent {
    pub fn new(bucket: impl Into<String>, object_key: impl Into<String>) -> Self {
        TriggerEvent {
            bucket: bucket.into(),
            object_key: object_key.into(),
        }
    }

    /// `None` when the record lacks a bucket name or an object key.
    pub fn from_record(record: &S3EventRecord) -> Option<Self> {
        let bucket = record.s3.bucket.name.clone()?;
        let object_key = record.s3.object.key.clone()?;

        Some(TriggerEvent { bucket, object_key })
    }
}

/// A trigger that passed the prefix and extension checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibleSource {
    pub bucket: String,
    /// Decoded key.
    pub object_key: String,
    /// Lowercased, with leading dot.
    pub extension: String,
}

impl EligibleSource {
    /// Last path segment of the key, extension included.
    pub fn file_name(&self) -> &str {
        self.object_key
            .rsplit('/')
            .next()
            .unwrap_or(&self.object_key)
    }

    /// File name without its extension.
    pub fn stem(&self) -> &str {
        Path::new(self.file_name())
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_else(|| self.file_name())
    }

    pub fn is_png(&self) -> bool {
        self.extension == ".png"
    }

    pub fn location(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.object_key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Decoded key lies outside the source prefix.
    OutsidePrefix { key: String },
    /// Extension (possibly empty) is not in the supported set.
    UnsupportedType { extension: String },
}

/// Form-style decoding: `+` is a space, then `%XX` escapes. Invalid UTF-8 is replaced.
pub fn decode_key(raw: &str) -> String {
    let plus_decoded = raw.replace('+', " ");

    percent_decode_str(&plus_decoded)
        .decode_utf8_lossy()
        .into_owned()
}

/// Extension of the final path segment, lowercased with a leading dot, or empty.
pub fn file_extension(key: &str) -> String {
    let file_name = key.rsplit('/').next().unwrap_or(key);

    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(normalize_extension)
        .unwrap_or_default()
}

pub fn admit(event: &TriggerEvent, cfg: &Config) -> Result<EligibleSource, Rejection> {
    let key = decode_key(&event.object_key);

    if !key.starts_with(&cfg.source_prefix) {
        return Err(Rejection::OutsidePrefix { key });
    }

    let extension = file_extension(&key);
    if !cfg.is_supported(&extension) {
        return Err(Rejection::UnsupportedType { extension });
    }

    Ok(EligibleSource {
        bucket: event.bucket.clone(),
        object_key: key,
        extension,
    })
}
