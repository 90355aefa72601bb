use crate::content_types::ContentTypeRule;
use crate::error::{ServerError, ServerResult};
use crate::static_asset::ContentCompression;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

/// Normalize a path into asset-key form: one leading slash, no trailing slash, no `./` prefix
pub fn normalize_path(path: &str) -> String {
    if path == "." || path == "/" || path == "\\" || path.is_empty() {
        return "/".to_string();
    }

    let path = path.strip_prefix("./").unwrap_or(path);
    let path = path.trim_end_matches('/');

    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

/// Normalize an optional asset key, treating the empty string as unset
fn normalize_optional_path(path: Option<String>) -> Option<String> {
    path.filter(|p| !p.trim().is_empty())
        .map(|p| normalize_path(p.trim()))
}

/// A rule deciding whether a request path gets long-lived cache headers
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CacheRule {
    /// Matches a single path exactly
    Exact(String),

    /// Matches every path under a directory (configured with a trailing slash)
    Prefix(String),

    /// Matches paths the regular expression finds a match in. `source` is the
    /// configured text after `regex:`, flags included.
    Pattern { source: String, regex: Regex },
}

impl CacheRule {
    /// Test a request path against this rule
    pub fn matches(&self, path: &str) -> bool {
        match self {
            CacheRule::Exact(exact) => exact == path,
            CacheRule::Prefix(prefix) => path.starts_with(prefix.as_str()),
            CacheRule::Pattern { regex, .. } => regex.is_match(path),
        }
    }

    /// Parse a configured entry.
    ///
    /// `regex:/<pattern>/<flags>` (or `regex:<pattern>`) becomes a pattern, a
    /// trailing slash makes a prefix rule, anything else is an exact path.
    pub fn parse(input: &str) -> ServerResult<Self> {
        if let Some(raw) = input.strip_prefix("regex:") {
            let regex = compile_pattern(raw)?;
            return Ok(CacheRule::Pattern {
                source: raw.to_string(),
                regex,
            });
        }

        if input.len() > 1 && input.ends_with('/') {
            let prefix = normalize_path(input);
            if prefix == "/" {
                return Ok(CacheRule::Prefix(prefix));
            }
            return Ok(CacheRule::Prefix(format!("{}/", prefix)));
        }

        Ok(CacheRule::Exact(normalize_path(input)))
    }
}

/// Compile `/<pattern>/<flags>` or a bare pattern
pub(crate) fn compile_pattern(raw: &str) -> ServerResult<Regex> {
    let (pattern, flags) = match raw.rfind('/') {
        Some(end) if raw.starts_with('/') && end > 0 => (&raw[1..end], &raw[end + 1..]),
        _ => (raw, ""),
    };

    RegexBuilder::new(pattern)
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .build()
        .map_err(|e| ServerError::Config(format!("Invalid regex pattern '{}': {}", raw, e)))
}

impl TryFrom<String> for CacheRule {
    type Error = ServerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        CacheRule::parse(&value)
    }
}

impl From<CacheRule> for String {
    fn from(rule: CacheRule) -> Self {
        rule.to_string()
    }
}

impl fmt::Display for CacheRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheRule::Exact(path) | CacheRule::Prefix(path) => write!(f, "{}", path),
            CacheRule::Pattern { source, .. } => write!(f, "regex:{}", source),
        }
    }
}

/// Static server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    /// Path prefix the public directory is mounted under ("" for the root)
    pub public_dir_prefix: String,

    /// Paths that get long-lived caching headers
    pub extended_cache: Vec<CacheRule>,

    /// Encodings the server may answer with, if a variant exists
    pub compression: Vec<ContentCompression>,

    /// Asset key served with status 404 when nothing matches
    pub not_found_page: Option<String>,

    /// Suffixes tried on extension-less paths, in order
    pub auto_ext: Vec<String>,

    /// Index file names tried on directory-like paths, in order
    pub auto_index: Vec<String>,

    /// Asset key of a single-page app shell served for unknown routes
    pub spa_entrypoint: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            public_dir_prefix: String::new(),
            extended_cache: Vec::new(),
            compression: Vec::new(),
            not_found_page: None,
            auto_ext: Vec::new(),
            auto_index: vec!["index.html".to_string(), "index.htm".to_string()],
            spa_entrypoint: None,
        }
    }
}

impl ServerConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the public directory prefix
    pub fn with_public_dir_prefix(mut self, prefix: &str) -> Self {
        self.public_dir_prefix = prefix.to_string();
        self
    }

    /// Add an extended-cache rule
    pub fn with_extended_cache(mut self, rule: CacheRule) -> Self {
        self.extended_cache.push(rule);
        self
    }

    /// Set the allowed compression encodings
    pub fn with_compression(mut self, compression: Vec<ContentCompression>) -> Self {
        self.compression = compression;
        self
    }

    /// Set the not-found page asset key
    pub fn with_not_found_page(mut self, page: &str) -> Self {
        self.not_found_page = Some(page.to_string());
        self
    }

    /// Set the auto-extension suffixes
    pub fn with_auto_ext(mut self, exts: &[&str]) -> Self {
        self.auto_ext = exts.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Set the auto-index file names
    pub fn with_auto_index(mut self, names: &[&str]) -> Self {
        self.auto_index = names.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Set the SPA entrypoint asset key
    pub fn with_spa_entrypoint(mut self, entrypoint: &str) -> Self {
        self.spa_entrypoint = Some(entrypoint.to_string());
        self
    }

    /// Return a copy with every path-like field in canonical form
    pub fn normalized(&self) -> Self {
        let prefix = self.public_dir_prefix.trim();
        let public_dir_prefix = match normalize_path(prefix).as_str() {
            "/" => String::new(),
            normalized => normalized.to_string(),
        };

        Self {
            public_dir_prefix,
            extended_cache: self.extended_cache.clone(),
            compression: self.compression.clone(),
            not_found_page: normalize_optional_path(self.not_found_page.clone()),
            auto_ext: self.auto_ext.iter().filter(|s| !s.is_empty()).cloned().collect(),
            auto_index: self.auto_index.iter().filter(|s| !s.is_empty()).cloned().collect(),
            spa_entrypoint: normalize_optional_path(self.spa_entrypoint.clone()),
        }
    }

    /// Load configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ServerResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Parse configuration from a JSON string
    pub fn from_json_str(content: &str) -> ServerResult<Self> {
        serde_json::from_str(content).map_err(config_error)
    }

    /// Save configuration to a JSON file
    pub fn save_to_json_file<P: AsRef<Path>>(&self, path: P) -> ServerResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// Configuration for building a static asset manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ManifestConfig {
    /// Directory holding the files to embed
    pub public_dir: String,

    /// Directories (relative like `/node_modules` or absolute) to skip
    pub ignore_dirs: Vec<String>,

    /// Further paths to skip, same format as `ignore_dirs`
    pub ignore_paths: Vec<String>,

    /// Skip files and directories whose name starts with a dot
    pub ignore_dot_files: bool,

    /// Skip the `.well-known` directory
    pub ignore_well_known: bool,

    /// Custom content-type rules, tried before the built-in table
    pub content_types: Vec<ContentTypeRule>,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            public_dir: "public".to_string(),
            ignore_dirs: Vec::new(),
            ignore_paths: Vec::new(),
            ignore_dot_files: true,
            ignore_well_known: false,
            content_types: Vec::new(),
        }
    }
}

impl ManifestConfig {
    /// Create a configuration for the given public directory
    pub fn new(public_dir: &str) -> Self {
        Self {
            public_dir: public_dir.to_string(),
            ..Self::default()
        }
    }

    /// Add a directory to ignore
    pub fn with_ignore_dir(mut self, dir: &str) -> Self {
        self.ignore_dirs.push(dir.to_string());
        self
    }

    /// Set the dot-file policy
    pub fn with_ignore_dot_files(mut self, ignore: bool) -> Self {
        self.ignore_dot_files = ignore;
        self
    }

    /// Set the `.well-known` policy
    pub fn with_ignore_well_known(mut self, ignore: bool) -> Self {
        self.ignore_well_known = ignore;
        self
    }

    /// Add a custom content-type rule
    pub fn with_content_type(mut self, rule: ContentTypeRule) -> Self {
        self.content_types.push(rule);
        self
    }

    /// All ignored paths, directories first
    pub fn ignored_paths(&self) -> Vec<String> {
        self.ignore_dirs
            .iter()
            .chain(self.ignore_paths.iter())
            .cloned()
            .collect()
    }

    /// Load configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ServerResult<Self> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(config_error)
    }
}

fn config_error(e: serde_json::Error) -> ServerError {
    ServerError::Config(e.to_string())
}
