use std::collections::HashMap;

/// In-memory mapping from asset key to a loaded value.
///
/// Values go in and come out by clone, so a caller can never reach the
/// cache's own copy. Types holding large immutable buffers should make
/// `Clone` share those buffers and only duplicate mutable state.
#[derive(Debug, Clone)]
pub struct AssetCache<T: Clone> {
    assets: HashMap<String, T>,
}

impl<T: Clone> AssetCache<T> {
    /// Create an empty cache
    pub fn new() -> Self {
        Self {
            assets: HashMap::new(),
        }
    }

    /// Create a cache pre-populated with copies of the given assets
    pub fn with_assets(assets: &HashMap<String, T>) -> Self {
        Self {
            assets: assets.clone(),
        }
    }

    /// Store a copy of `asset` under `asset_key`, replacing any previous entry
    pub fn load_asset(&mut self, asset_key: &str, asset: &T) {
        self.assets.insert(asset_key.to_string(), asset.clone());
    }

    /// Return a copy of the asset stored under `asset_key`
    pub fn get_asset(&self, asset_key: &str) -> Option<T> {
        self.assets.get(asset_key).cloned()
    }

    /// Whether an asset is stored under `asset_key`
    pub fn contains(&self, asset_key: &str) -> bool {
        self.assets.contains_key(asset_key)
    }

    /// All loaded keys, in no particular order
    pub fn get_asset_keys(&self) -> Vec<String> {
        self.assets.keys().cloned().collect()
    }

    /// Number of loaded assets
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl<T: Clone> Default for AssetCache<T> {
    fn default() -> Self {
        Self::new()
    }
}
