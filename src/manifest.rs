use crate::config::{normalize_path, ManifestConfig};
use crate::content_types::{known_content_types, resolve_content_type, ContentTypeDefinition};
use crate::error::{ServerError, ServerResult};
use crate::fs::{FileSystem, OsFileSystem};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Content type used when no rule matches
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Per-file metadata computed at build time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    /// Hex-encoded SHA-256 of the contents
    pub hash: String,
    pub size: u64,
    /// Where the loader reads the bytes from at startup
    pub asset_path: String,
    /// Unix seconds
    pub last_modified_time: u64,
}

/// Loader discriminator of a manifest entry.
///
/// Unrecognised names are kept so the loader can report them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AssetType {
    /// Bytes loaded fully into process memory
    EmbeddedInline,
    Unknown(String),
}

impl AssetType {
    pub fn as_str(&self) -> &str {
        match self {
            AssetType::EmbeddedInline => "embedded-inline",
            AssetType::Unknown(name) => name,
        }
    }
}

impl From<String> for AssetType {
    fn from(value: String) -> Self {
        match value.as_str() {
            // "wasm-inline" is the name older manifests use
            "embedded-inline" | "wasm-inline" => AssetType::EmbeddedInline,
            _ => AssetType::Unknown(value),
        }
    }
}

impl From<AssetType> for String {
    fn from(value: AssetType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One manifest entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticAssetMetadata {
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    pub asset_key: String,
    pub content_type: String,
    pub file_info: FileInfo,
}

/// Mapping from asset key to metadata. Sorted, so serialization is stable.
pub type StaticAssetManifest = BTreeMap<String, StaticAssetMetadata>;

/// Hex-encoded SHA-256 digest
pub fn hash_contents(contents: &[u8]) -> String {
    hex::encode(Sha256::digest(contents))
}

/// Walks a public directory and produces a [`StaticAssetManifest`]
pub struct ManifestBuilder<'a, F: FileSystem> {
    config: &'a ManifestConfig,
    fs: &'a F,
}

impl<'a, F: FileSystem> ManifestBuilder<'a, F> {
    /// Create a builder reading through the given filesystem
    pub fn new(config: &'a ManifestConfig, fs: &'a F) -> Self {
        Self { config, fs }
    }

    /// Build the manifest
    pub fn build(&self) -> ServerResult<StaticAssetManifest> {
        let public_dir = Path::new(&self.config.public_dir);
        if !self.fs.is_dir(public_dir) {
            return Err(ServerError::Config(format!(
                "Public directory '{}' does not exist or is not a directory",
                self.config.public_dir
            )));
        }
        let public_dir_path = self.fs.absolute(public_dir)?;

        info!("Using {} as public directory", public_dir_path.display());

        let ignored = self.config.ignored_paths();
        if !ignored.is_empty() {
            info!("Ignoring directories:");
            for dir in &ignored {
                info!("    - {}", dir);
            }
        }

        let mut files = Vec::new();
        self.collect_files(&public_dir_path, &public_dir_path, &ignored, &mut files)?;

        if self.config.ignore_dot_files {
            info!("Removed dot files (default behavior)");
        } else {
            warn!("Included dot files (Caution!! - .env, .gitignore, etc. may be included)");
        }

        if self.config.ignore_well_known {
            warn!("Ignored .well-known (This may cause issues with web manifests, etc.)");
        } else {
            info!("Included .well-known");
        }

        let content_types = known_content_types(&self.config.content_types);
        info!("Creating build manifest...");

        let mut manifest = StaticAssetManifest::new();
        for file in files {
            let metadata = self.describe_file(&public_dir_path, &file, &content_types)?;
            manifest.insert(metadata.asset_key.clone(), metadata);
        }

        info!("Manifest contains {} asset(s)", manifest.len());
        Ok(manifest)
    }

    /// Recursively gather file paths, applying the ignore rules
    fn collect_files(
        &self,
        root: &Path,
        dir: &Path,
        ignored: &[String],
        files: &mut Vec<PathBuf>,
    ) -> ServerResult<()> {
        for entry in self.fs.read_dir(dir)? {
            let relative = asset_key_for(root, &entry.path)?;
            let full = entry.path.to_string_lossy();

            if ignored
                .iter()
                .any(|ignore| normalize_path(ignore) == relative || ignore.as_str() == full)
            {
                debug!("Skipping ignored path {}", relative);
                continue;
            }

            let well_known = entry.name == ".well-known";
            if well_known && self.config.ignore_well_known {
                continue;
            }
            if !well_known && self.config.ignore_dot_files && entry.name.starts_with('.') {
                continue;
            }

            if entry.is_dir {
                self.collect_files(root, &entry.path, ignored, files)?;
            } else {
                files.push(entry.path);
            }
        }
        Ok(())
    }

    /// Compute the manifest entry for a single file
    fn describe_file(
        &self,
        root: &Path,
        file: &Path,
        content_types: &[ContentTypeDefinition],
    ) -> ServerResult<StaticAssetMetadata> {
        let asset_key = asset_key_for(root, file)?;

        let content_type = match resolve_content_type(content_types, &asset_key) {
            Some(definition) => definition.content_type.clone(),
            None => {
                warn!(
                    "Unknown content type for {}. Defaulting to {}",
                    asset_key, DEFAULT_CONTENT_TYPE
                );
                DEFAULT_CONTENT_TYPE.to_string()
            }
        };

        let contents = self.fs.read(file)?;
        let file_info = FileInfo {
            hash: hash_contents(&contents),
            size: contents.len() as u64,
            asset_path: asset_path_for(&self.config.public_dir, &asset_key),
            last_modified_time: self.fs.modified_secs(file)?,
        };

        Ok(StaticAssetMetadata {
            asset_type: AssetType::EmbeddedInline,
            asset_key,
            content_type,
            file_info,
        })
    }
}

/// Build a manifest from the real filesystem
pub fn build_manifest(config: &ManifestConfig) -> ServerResult<StaticAssetManifest> {
    ManifestBuilder::new(config, &OsFileSystem).build()
}

/// Derive the request path of a file below the public directory
fn asset_key_for(root: &Path, file: &Path) -> ServerResult<String> {
    let relative = file.strip_prefix(root).map_err(|_| {
        ServerError::Config(format!(
            "{} is outside of the public directory {}",
            file.display(),
            root.display()
        ))
    })?;

    let mut key = String::new();
    for component in relative.components() {
        if let Component::Normal(part) = component {
            let part = part.to_str().ok_or_else(|| {
                ServerError::Config(format!("Path is not UTF-8: {}", file.display()))
            })?;
            key.push('/');
            key.push_str(part);
        }
    }

    if key.is_empty() {
        key.push('/');
    }
    Ok(key)
}

/// Path the loader reads from: the public directory as configured, joined with the key
fn asset_path_for(public_dir: &str, asset_key: &str) -> String {
    let dir = public_dir.trim_end_matches(['/', '\\']);
    format!("{}{}", dir.replace('\\', "/"), asset_key)
}

/// Serialize a manifest as pretty JSON
pub fn manifest_to_json(manifest: &StaticAssetManifest) -> ServerResult<String> {
    Ok(serde_json::to_string_pretty(manifest)?)
}

/// Parse a manifest from JSON
pub fn manifest_from_json(content: &str) -> ServerResult<StaticAssetManifest> {
    serde_json::from_str(content)
        .map_err(|e| ServerError::Config(format!("Malformed static asset manifest: {}", e)))
}

/// Write the manifest artifact
pub fn write_manifest<P: AsRef<Path>>(manifest: &StaticAssetManifest, path: P) -> ServerResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, manifest_to_json(manifest)?)?;
    info!("Wrote static asset manifest to {}", path.display());
    Ok(())
}

/// Read the manifest artifact
pub fn read_manifest<P: AsRef<Path>>(path: P) -> ServerResult<StaticAssetManifest> {
    let content = fs::read_to_string(path)?;
    manifest_from_json(&content)
}
