use crate::asset_cache::AssetCache;
use crate::error::{ServerError, ServerResult};
use crate::fs::FileSystem;
use crate::headers::MAX_HTTP_DATE_SECS;
use crate::manifest::{hash_contents, AssetType, StaticAssetManifest, StaticAssetMetadata};
use crate::store_entry::EmbeddedStoreEntry;
use bytes::Bytes;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Supported content compression types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentCompression {
    Br,
    Gzip,
}

impl ContentCompression {
    /// The `Content-Encoding` token
    pub fn as_str(&self) -> &'static str {
        match *self {
            ContentCompression::Br => "br",
            ContentCompression::Gzip => "gzip",
        }
    }
}

impl FromStr for ContentCompression {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "br" => Ok(ContentCompression::Br),
            "gzip" => Ok(ContentCompression::Gzip),
            _ => Err(ServerError::Config(format!("Unsupported compression: {}", s))),
        }
    }
}

impl fmt::Display for ContentCompression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bytes of one representation with their validators
#[derive(Debug, Clone)]
pub struct SourceAndInfo {
    pub source: Bytes,
    pub hash: String,
    pub size: u64,
}

/// Pick the representation to serve.
///
/// Groups are visited in preference order; the first group with any available
/// variant wins, and within it the smallest variant is chosen. Falls back to
/// the uncompressed source.
pub fn find_matching_source_and_info<'a, F>(
    accept_encoding_groups: Option<&[Vec<ContentCompression>]>,
    default_source: &'a SourceAndInfo,
    source_for_encoding: F,
) -> (&'a SourceAndInfo, Option<ContentCompression>)
where
    F: Fn(ContentCompression) -> Option<&'a SourceAndInfo>,
{
    for group in accept_encoding_groups.unwrap_or_default() {
        let smallest = group
            .iter()
            .filter_map(|&encoding| source_for_encoding(encoding).map(|source| (encoding, source)))
            .min_by_key(|(_, source)| source.size);

        if let Some((encoding, source)) = smallest {
            return (source, Some(encoding));
        }
    }

    (default_source, None)
}

/// A loaded asset, ready to be served.
///
/// Cloning shares the embedded bytes; every store entry handed out has its
/// own consumption state.
#[derive(Debug, Clone)]
pub struct StaticAsset {
    metadata: StaticAssetMetadata,
    source: SourceAndInfo,
}

impl StaticAsset {
    /// Build an embedded asset from its metadata and contents
    pub fn embedded(metadata: StaticAssetMetadata, contents: Bytes) -> Self {
        let source = SourceAndInfo {
            source: contents,
            hash: metadata.file_info.hash.clone(),
            size: metadata.file_info.size,
        };
        Self { metadata, source }
    }

    /// Loader discriminator
    pub fn asset_type(&self) -> &AssetType {
        &self.metadata.asset_type
    }

    pub fn asset_key(&self) -> &str {
        &self.metadata.asset_key
    }

    /// A copy of the manifest metadata
    pub fn get_metadata(&self) -> StaticAssetMetadata {
        self.metadata.clone()
    }

    /// Borrow the manifest metadata
    pub fn metadata(&self) -> &StaticAssetMetadata {
        &self.metadata
    }

    /// A fresh, readable entry over the uncompressed bytes
    pub fn get_embedded_store_entry(&self) -> EmbeddedStoreEntry {
        self.get_store_entry(None)
    }

    /// A fresh entry for the best representation given ranked accepted encodings
    pub fn get_store_entry(&self, accept_encoding_groups: Option<&[Vec<ContentCompression>]>) -> EmbeddedStoreEntry {
        // No pre-compressed variants are embedded yet, so every lookup misses
        let (source, content_encoding) =
            find_matching_source_and_info(accept_encoding_groups, &self.source, |_| None);

        EmbeddedStoreEntry::new(source.source.clone(), content_encoding, &source.hash, source.size)
    }
}

/// Turn one manifest entry into a loaded asset, dispatching on its type
pub fn load_static_asset<F: FileSystem>(
    metadata: &StaticAssetMetadata,
    fs: &F,
) -> ServerResult<StaticAsset> {
    match &metadata.asset_type {
        AssetType::EmbeddedInline => load_embedded_inline(metadata, fs),
        AssetType::Unknown(name) => Err(ServerError::UnknownAssetType(name.clone())),
    }
}

fn load_embedded_inline<F: FileSystem>(
    metadata: &StaticAssetMetadata,
    fs: &F,
) -> ServerResult<StaticAsset> {
    if metadata.file_info.last_modified_time > MAX_HTTP_DATE_SECS {
        return Err(ServerError::Config(format!(
            "Asset {} has modification time {} past year 9999",
            metadata.asset_key, metadata.file_info.last_modified_time
        )));
    }

    let path = Path::new(&metadata.file_info.asset_path);
    let contents = fs.read(path).map_err(|e| {
        ServerError::Config(format!(
            "Failed to read asset {} from {}: {}",
            metadata.asset_key,
            path.display(),
            e
        ))
    })?;

    if contents.len() as u64 != metadata.file_info.size {
        return Err(ServerError::Config(format!(
            "Asset {} is {} bytes but the manifest records {}; rebuild the manifest",
            metadata.asset_key,
            contents.len(),
            metadata.file_info.size
        )));
    }

    if hash_contents(&contents) != metadata.file_info.hash {
        return Err(ServerError::Config(format!(
            "Asset {} no longer matches its manifest hash; rebuild the manifest",
            metadata.asset_key
        )));
    }

    Ok(StaticAsset::embedded(metadata.clone(), Bytes::from(contents)))
}

/// Load every manifest entry into a new cache.
///
/// Fails on the first entry that cannot be loaded; a partially loaded cache
/// is never returned.
pub fn create_static_assets_cache<F: FileSystem>(
    manifest: &StaticAssetManifest,
    fs: &F,
) -> ServerResult<AssetCache<StaticAsset>> {
    let mut cache = AssetCache::new();

    for (asset_key, metadata) in manifest {
        let asset = load_static_asset(metadata, fs)?;
        debug!("Loaded {} ({} bytes)", asset_key, metadata.file_info.size);
        cache.load_asset(asset_key, &asset);
    }

    info!("Loaded {} static asset(s) into memory", cache.len());
    Ok(cache)
}
