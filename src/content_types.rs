use crate::config::compile_pattern;
use log::{info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A custom content-type rule as written in configuration.
///
/// `test` is either a file extension (`".md"` or `"md"`) or `regex:<pattern>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentTypeRule {
    pub test: String,
    pub content_type: String,
    #[serde(default)]
    pub is_text: bool,
}

impl ContentTypeRule {
    /// Create a rule
    pub fn new(test: &str, content_type: &str, is_text: bool) -> Self {
        Self {
            test: test.to_string(),
            content_type: content_type.to_string(),
            is_text,
        }
    }
}

/// How a definition decides whether it applies to an asset key
#[derive(Debug, Clone)]
pub enum ContentTypeMatcher {
    /// Matches keys ending in `.<ext>`, ignoring ASCII case
    Extension(String),

    /// Matches keys the pattern finds a match in
    Pattern(Regex),
}

impl ContentTypeMatcher {
    fn matches(&self, asset_key: &str) -> bool {
        match self {
            ContentTypeMatcher::Extension(ext) => {
                let key = asset_key.as_bytes();
                let suffix = ext.as_bytes();
                key.len() > suffix.len() + 1
                    && key[key.len() - suffix.len() - 1] == b'.'
                    && key[key.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
            }
            ContentTypeMatcher::Pattern(regex) => regex.is_match(asset_key),
        }
    }
}

/// A compiled content-type entry
#[derive(Debug, Clone)]
pub struct ContentTypeDefinition {
    pub matcher: ContentTypeMatcher,
    pub content_type: String,
    pub is_text: bool,
}

impl ContentTypeDefinition {
    /// Definition matching a single extension
    pub fn extension(ext: &str, content_type: &str, is_text: bool) -> Self {
        Self {
            matcher: ContentTypeMatcher::Extension(ext.trim_start_matches('.').to_string()),
            content_type: content_type.to_string(),
            is_text,
        }
    }

    /// Compile a configured rule, or `None` if it is invalid
    fn from_rule(index: usize, rule: &ContentTypeRule) -> Option<Self> {
        let mut valid = true;

        let matcher = match rule.test.strip_prefix("regex:") {
            Some(raw) => match compile_pattern(raw) {
                Ok(regex) => Some(ContentTypeMatcher::Pattern(regex)),
                Err(e) => {
                    warn!("Ignoring contentTypes[{}]: {}", index, e);
                    None
                }
            },
            None if rule.test.trim_start_matches('.').is_empty() => {
                warn!("Ignoring contentTypes[{}]: 'test' must be an extension or regex", index);
                None
            }
            None => Some(ContentTypeMatcher::Extension(
                rule.test.trim_start_matches('.').to_string(),
            )),
        };
        if matcher.is_none() {
            valid = false;
        }

        if !rule.content_type.contains('/') {
            warn!("Ignoring contentTypes[{}]: 'contentType' must be a valid MIME type", index);
            valid = false;
        }

        match (valid, matcher) {
            (true, Some(matcher)) => Some(Self {
                matcher,
                content_type: rule.content_type.clone(),
                is_text: rule.is_text,
            }),
            _ => None,
        }
    }
}

/// Text formats
const TEXT_FORMATS: &[(&str, &str)] = &[
    ("txt", "text/plain"),
    ("htm", "text/html"),
    ("html", "text/html"),
    ("xml", "application/xml"),
    ("json", "application/json"),
    ("map", "application/json"),
    ("js", "application/javascript"),
    ("mjs", "application/javascript"),
    ("css", "text/css"),
    ("svg", "image/svg+xml"),
    ("md", "text/markdown"),
    ("csv", "text/csv"),
    ("webmanifest", "application/manifest+json"),
];

/// Binary formats
const BINARY_FORMATS: &[(&str, &str)] = &[
    ("bmp", "image/bmp"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("ico", "image/vnd.microsoft.icon"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
    ("webp", "image/webp"),
    ("avif", "image/avif"),
    ("aac", "audio/aac"),
    ("mp3", "audio/mpeg"),
    ("avi", "video/x-msvideo"),
    ("mp4", "video/mp4"),
    ("mpeg", "video/mpeg"),
    ("webm", "video/webm"),
    ("pdf", "application/pdf"),
    ("tar", "application/x-tar"),
    ("zip", "application/zip"),
    ("wasm", "application/wasm"),
    ("eot", "application/vnd.ms-fontobject"),
    ("otf", "font/otf"),
    ("ttf", "font/ttf"),
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
];

/// The built-in table: text formats, then binary formats
pub fn default_content_types() -> Vec<ContentTypeDefinition> {
    let text = TEXT_FORMATS
        .iter()
        .map(|(ext, ct)| ContentTypeDefinition::extension(ext, ct, true));
    let binary = BINARY_FORMATS
        .iter()
        .map(|(ext, ct)| ContentTypeDefinition::extension(ext, ct, false));

    text.chain(binary).collect()
}

/// Combine custom rules with the built-in table.
///
/// Order matters: custom rules come first so they override the defaults.
pub fn known_content_types(custom: &[ContentTypeRule]) -> Vec<ContentTypeDefinition> {
    let mut definitions: Vec<ContentTypeDefinition> = custom
        .iter()
        .enumerate()
        .filter_map(|(index, rule)| ContentTypeDefinition::from_rule(index, rule))
        .collect();

    info!("Applying {} custom content type(s).", definitions.len());

    definitions.extend(default_content_types());
    definitions
}

/// Find the first definition matching an asset key
pub fn resolve_content_type<'a>(
    definitions: &'a [ContentTypeDefinition],
    asset_key: &str,
) -> Option<&'a ContentTypeDefinition> {
    definitions.iter().find(|def| def.matcher.matches(asset_key))
}
