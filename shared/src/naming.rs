use uuid::Uuid;

const UNSAFE_KEY_CHARS: [char; 3] = [' ', '(', ')'];
const TOKEN_LEN: usize = 8;

/// Replaces characters that are awkward in object keys and URLs with `_`.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if UNSAFE_KEY_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

/// Eight lowercase hex chars cut from a v4 uuid. Only needs to be unique, not secret.
pub fn unique_token() -> String {
    let mut token = Uuid::new_v4().simple().to_string();
    token.truncate(TOKEN_LEN);
    token
}

/// Per-invocation name stem: `{sanitized}_{token}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedName {
    pub sanitized_base: String,
    pub unique_suffix: String,
    pub full_base: String,
}

impl DerivedName {
    /// Sanitizes `stem` and appends a fresh token, so two calls never agree.
    pub fn derive(stem: &str) -> Self {
        Self::with_token(stem, unique_token())
    }

    pub fn with_token(stem: &str, token: impl Into<String>) -> Self {
        let sanitized_base = sanitize(stem);
        let unique_suffix = token.into();
        let full_base = format!("{}_{}", sanitized_base, unique_suffix);

        DerivedName {
            sanitized_base,
            unique_suffix,
            full_base,
        }
    }
}

/// Encoding chosen for every derivative of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    Jpeg,
}

impl OutputFormat {
    /// PNG sources stay PNG; everything else becomes JPEG.
    pub fn for_source(is_png: bool) -> Self {
        if is_png {
            OutputFormat::Png
        } else {
            OutputFormat::Jpeg
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => ".png",
            OutputFormat::Jpeg => ".jpg",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSpec {
    pub width: u32,
    pub format: OutputFormat,
    pub output_key: String,
}

impl OutputSpec {
    pub fn new(output_prefix: &str, name: &DerivedName, width: u32, format: OutputFormat) -> Self {
        OutputSpec {
            width,
            format,
            output_key: output_key(output_prefix, &name.full_base, width, format),
        }
    }
}

/// `{prefix}/{full_base}/{width}_{full_base}{ext}`
pub fn output_key(
    output_prefix: &str,
    full_base: &str,
    width: u32,
    format: OutputFormat,
) -> String {
    format!(
        "{}/{}/{}_{}{}",
        output_prefix,
        full_base,
        width,
        full_base,
        format.extension()
    )
}
