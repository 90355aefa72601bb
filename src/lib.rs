pub mod asset_cache;
pub mod config;
pub mod content_types;
pub mod error;
pub mod fs;
pub mod headers;
pub mod host;
pub mod http;
pub mod manifest;
pub mod metrics;
pub mod static_asset;
pub mod static_server;
pub mod store_entry;

/// Re-exports of common components for easier access
pub use asset_cache::AssetCache;
pub use config::{CacheRule, ManifestConfig, ServerConfig};
pub use error::{ServerError, ServerResult};
pub use fs::{FileSystem, MemoryFileSystem, OsFileSystem};
pub use http::{HttpParser, Method, Request, Response, Status};
pub use manifest::{
    build_manifest, read_manifest, write_manifest, AssetType, FileInfo, ManifestBuilder,
    StaticAssetManifest, StaticAssetMetadata,
};
pub use metrics::ServeMetrics;
pub use static_asset::{create_static_assets_cache, ContentCompression, StaticAsset};
pub use static_server::{create_static_server, AssetInit, CachePolicy, StaticServer};
pub use store_entry::{BodyState, ByteStream, EmbeddedStoreEntry, StreamReader};
