use crate::asset_cache::AssetCache;
use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::fs::FileSystem;
use crate::headers::{
    build_headers_subset, check_if_modified_since, check_if_none_match, format_http_date,
    get_if_modified_since_header, get_if_none_match_header, HEADERS_TO_PRESERVE_FOR_304,
};
use crate::http::{Method, Request, Response, Status};
use crate::manifest::StaticAssetManifest;
use crate::metrics::ServeMetrics;
use crate::static_asset::{create_static_assets_cache, ContentCompression, StaticAsset};
use bytes::Bytes;
use log::{debug, error, warn};
use std::collections::{BTreeMap, HashMap};

/// Cache-Control value for extended caching (one year)
pub const EXTENDED_CACHE_CONTROL: &str = "max-age=31536000";

/// Cache-Control value for responses that must not be stored
pub const NEVER_CACHE_CONTROL: &str = "no-store";

/// Caching policy applied to a served asset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    Extended,
    Never,
}

impl CachePolicy {
    pub fn cache_control(&self) -> &'static str {
        match *self {
            CachePolicy::Extended => EXTENDED_CACHE_CONTROL,
            CachePolicy::Never => NEVER_CACHE_CONTROL,
        }
    }
}

/// Options for [`StaticServer::serve_asset`]
#[derive(Debug, Clone)]
pub struct AssetInit {
    pub status: Status,
    /// Extra response headers, applied after `Content-Type`
    pub headers: HashMap<String, String>,
    pub cache: Option<CachePolicy>,
}

impl Default for AssetInit {
    fn default() -> Self {
        Self {
            status: Status::Ok,
            headers: HashMap::new(),
            cache: None,
        }
    }
}

/// Serves static assets from an [`AssetCache`]
pub struct StaticServer {
    config: ServerConfig,
    assets: AssetCache<StaticAsset>,
    metrics: ServeMetrics,
}

impl StaticServer {
    /// Create a server. The cache must be fully loaded.
    pub fn new(config: ServerConfig, assets: AssetCache<StaticAsset>) -> Self {
        Self {
            config: config.normalized(),
            assets,
            metrics: ServeMetrics::new(),
        }
    }

    /// The normalized configuration in effect
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn assets(&self) -> &AssetCache<StaticAsset> {
        &self.assets
    }

    pub fn metrics(&self) -> &ServeMetrics {
        &self.metrics
    }

    /// Resolve a request path to an asset
    pub fn get_matching_asset(&self, path: &str) -> Option<StaticAsset> {
        let asset_key = self.strip_public_dir_prefix(path)?;

        if !asset_key.ends_with('/') {
            if let Some(asset) = self.assets.get_asset(asset_key) {
                return Some(asset);
            }

            if !has_extension(asset_key) {
                for ext in &self.config.auto_ext {
                    if let Some(asset) = self.assets.get_asset(&format!("{}{}", asset_key, ext)) {
                        return Some(asset);
                    }
                }
            }
        }

        let dir = asset_key.trim_end_matches('/');
        for index in &self.config.auto_index {
            if let Some(asset) = self.assets.get_asset(&format!("{}/{}", dir, index)) {
                return Some(asset);
            }
        }

        None
    }

    /// Remove the configured prefix; `None` if the path lies outside it
    fn strip_public_dir_prefix<'p>(&self, path: &'p str) -> Option<&'p str> {
        let prefix = self.config.public_dir_prefix.as_str();
        if prefix.is_empty() {
            return Some(path);
        }

        match path.strip_prefix(prefix)? {
            "" => Some("/"),
            rest if rest.starts_with('/') => Some(rest),
            _ => None,
        }
    }

    /// Rank the configured encodings the request accepts.
    ///
    /// Each group holds the encodings sharing a q-value; groups are ordered
    /// from most to least preferred. Encodings with `q=0` are refused.
    pub fn find_accept_encodings(&self, request: &Request) -> Vec<Vec<ContentCompression>> {
        if self.config.compression.is_empty() {
            return Vec::new();
        }

        let mut by_q_value: BTreeMap<u32, Vec<ContentCompression>> = BTreeMap::new();
        for item in request.get_header("Accept-Encoding").unwrap_or_default().split(',') {
            let mut parts = item.trim().split(';');
            let name = parts.next().unwrap_or_default().trim();
            let Ok(encoding) = name.parse::<ContentCompression>() else {
                continue;
            };
            if !self.config.compression.contains(&encoding) {
                continue;
            }

            let q_value = parse_q_value(parts.next());
            if q_value == 0 {
                continue;
            }
            let group = by_q_value.entry(q_value).or_default();
            if !group.contains(&encoding) {
                group.push(encoding);
            }
        }

        by_q_value.into_values().rev().collect()
    }

    /// Whether a path gets long-lived caching headers
    pub fn test_extended_cache(&self, path: &str) -> bool {
        self.config.extended_cache.iter().any(|rule| rule.matches(path))
    }

    /// Evaluate the conditional request headers.
    ///
    /// Returns the `304 Not Modified` response when the client copy is
    /// current, `None` when a full response is due. `If-Modified-Since` is
    /// only consulted when `If-None-Match` is absent.
    pub fn handle_preconditions(
        &self,
        request: &Request,
        asset: &StaticAsset,
        response_headers: &HashMap<String, String>,
    ) -> Option<Response> {
        let tags = get_if_none_match_header(request);
        if !tags.is_empty() {
            let etag = response_headers
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case("ETag"))
                .map(|(_, value)| value.clone())
                .unwrap_or_else(|| quoted_etag(&asset.metadata().file_info.hash));

            if check_if_none_match(&etag, &tags) {
                return None;
            }
            return Some(not_modified(response_headers));
        }

        if let Some(if_modified_since) = get_if_modified_since_header(request) {
            let last_modified_time = asset.metadata().file_info.last_modified_time;
            if !check_if_modified_since(last_modified_time, if_modified_since) {
                return Some(not_modified(response_headers));
            }
        }

        None
    }

    /// Build the response for a resolved asset
    pub async fn serve_asset(
        &self,
        request: &Request,
        asset: &StaticAsset,
        init: AssetInit,
    ) -> ServerResult<Response> {
        let metadata = asset.metadata();

        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), metadata.content_type.clone());
        headers.extend(init.headers);
        if let Some(cache) = init.cache {
            headers.insert("Cache-Control".to_string(), cache.cache_control().to_string());
        }

        let accept_encodings = self.find_accept_encodings(request);
        let store_entry = asset.get_store_entry(Some(accept_encodings.as_slice()));
        if let Some(encoding) = store_entry.content_encoding() {
            headers.insert("Content-Encoding".to_string(), encoding.as_str().to_string());
        }

        headers.insert("ETag".to_string(), quoted_etag(store_entry.hash()));
        let last_modified_time = metadata.file_info.last_modified_time;
        if last_modified_time != 0 {
            match format_http_date(last_modified_time) {
                Some(last_modified) => {
                    headers.insert("Last-Modified".to_string(), last_modified);
                }
                None => warn!("{} has an unrepresentable modification time", metadata.asset_key),
            }
        }

        if let Some(response) = self.handle_preconditions(request, asset, &headers) {
            return Ok(response);
        }

        headers.insert("Content-Length".to_string(), store_entry.size().to_string());
        let body = if request.method == Method::Head {
            Bytes::new()
        } else {
            store_entry.array_buffer().await?
        };

        Ok(Response {
            status: init.status,
            headers,
            body,
        })
    }

    /// Serve a request, or `None` when no asset applies
    pub async fn serve_request(&self, request: &Request) -> ServerResult<Option<Response>> {
        if !request.method.is_read_only() {
            return Ok(None);
        }

        let path = request.path();
        if let Some(asset) = self.get_matching_asset(path) {
            let init = AssetInit {
                cache: self.test_extended_cache(path).then_some(CachePolicy::Extended),
                ..AssetInit::default()
            };
            return self.serve_asset(request, &asset, init).await.map(Some);
        }

        if !request_accepts_text_html(request) {
            return Ok(None);
        }

        // Fallback keys are raw asset keys, not relative to the prefix
        if let Some(entrypoint) = &self.config.spa_entrypoint {
            if !has_extension(path) {
                if let Some(asset) = self.assets.get_asset(entrypoint) {
                    let init = AssetInit {
                        cache: Some(CachePolicy::Never),
                        ..AssetInit::default()
                    };
                    return self.serve_asset(request, &asset, init).await.map(Some);
                }
            }
        }

        if let Some(not_found_page) = &self.config.not_found_page {
            if let Some(asset) = self.assets.get_asset(not_found_page) {
                let init = AssetInit {
                    status: Status::NotFound,
                    cache: Some(CachePolicy::Never),
                    ..AssetInit::default()
                };
                return self.serve_asset(request, &asset, init).await.map(Some);
            }
        }

        Ok(None)
    }

    /// Serve a request, turning "no asset" into a bare 404 and failures into a 500
    pub async fn respond(&self, request: &Request) -> Response {
        let result = self.serve_request(request).await;
        self.finish_response(request, result)
    }

    /// Map a serving outcome to the response sent, recording it in the metrics
    fn finish_response(&self, request: &Request, result: ServerResult<Option<Response>>) -> Response {
        let mut response = match result {
            Ok(Some(response)) => response,
            Ok(None) => plain_response(Status::NotFound),
            Err(e) => {
                if e.is_stream_misuse() {
                    error!("Body misuse while serving {}: {}", request.path(), e);
                } else {
                    error!("Failed to serve {}: {}", request.path(), e);
                }
                plain_response(Status::InternalServerError)
            }
        };

        if request.method == Method::Head {
            response.body = Bytes::new();
        }

        debug!(
            "{} {} -> {}",
            request.method.as_str(),
            request.path(),
            response.status.code()
        );
        self.metrics.record(response.status, response.body.len());
        response
    }
}

/// Load every manifest entry and build a server over the result
pub fn create_static_server<F: FileSystem>(
    manifest: &StaticAssetManifest,
    config: ServerConfig,
    fs: &F,
) -> ServerResult<StaticServer> {
    let assets = create_static_assets_cache(manifest, fs)?;
    let server = StaticServer::new(config, assets);

    for key in [&server.config.spa_entrypoint, &server.config.not_found_page]
        .into_iter()
        .flatten()
    {
        if !server.assets.contains(key) {
            warn!("Fallback page {} is not in the manifest and will never be served", key);
        }
    }

    Ok(server)
}

/// Whether `Accept` admits an HTML response. A missing header admits anything.
pub fn request_accepts_text_html(request: &Request) -> bool {
    let Some(accept) = request.get_header("Accept") else {
        return true;
    };

    accept
        .split(',')
        .map(|item| item.split(';').next().unwrap_or_default().trim())
        .any(|media_range| matches!(media_range, "text/html" | "text/*" | "*/*" | "*"))
}

/// Whether the last path segment has a file extension
fn has_extension(path: &str) -> bool {
    let segment = path.rsplit('/').next().unwrap_or_default();
    matches!(segment.rfind('.'), Some(dot) if dot > 0)
}

/// `q` parameter in thousandths, clamped to `0..=1000`; absent or invalid means 1000
fn parse_q_value(param: Option<&str>) -> u32 {
    let Some(value) = param.map(str::trim).and_then(|p| p.strip_prefix("q=")) else {
        return 1000;
    };

    match value.trim().parse::<f64>() {
        Ok(q) if q.is_nan() || q > 1.0 => 1000,
        Ok(q) if q < 0.0 => 0,
        Ok(q) => (q * 1000.0).floor() as u32,
        Err(_) => 1000,
    }
}

fn quoted_etag(hash: &str) -> String {
    format!("\"{}\"", hash)
}

fn not_modified(response_headers: &HashMap<String, String>) -> Response {
    Response::with_headers(
        Status::NotModified,
        build_headers_subset(response_headers, &HEADERS_TO_PRESERVE_FOR_304),
    )
}

fn plain_response(status: Status) -> Response {
    let mut response = Response::new(status);
    response.set_text_body(status.as_str());
    response
}
