use bytes::Bytes;
use embedded_static_server::{
    create_static_server, AssetCache, AssetInit, AssetType, CachePolicy, CacheRule, FileInfo,
    ManifestBuilder, ManifestConfig, MemoryFileSystem, Method, Request, ServerConfig, ServerError,
    StaticAsset, StaticAssetMetadata, StaticServer, Status,
};

const LAST_MODIFIED: u64 = 1700000000;

fn asset(key: &str, hash: &str, content_type: &str, body: &[u8]) -> StaticAsset {
    let metadata = StaticAssetMetadata {
        asset_type: AssetType::EmbeddedInline,
        asset_key: key.to_string(),
        content_type: content_type.to_string(),
        file_info: FileInfo {
            hash: hash.to_string(),
            size: body.len() as u64,
            asset_path: format!("public{}", key),
            last_modified_time: LAST_MODIFIED,
        },
    };
    StaticAsset::embedded(metadata, Bytes::copy_from_slice(body))
}

fn server_with(config: ServerConfig, assets: &[StaticAsset]) -> StaticServer {
    let mut cache = AssetCache::new();
    for asset in assets {
        cache.load_asset(asset.asset_key(), asset);
    }
    StaticServer::new(config, cache)
}

fn single_asset_server() -> StaticServer {
    server_with(
        ServerConfig::new(),
        &[asset("/app.js", "abc123", "application/javascript", b"console.log(1);")],
    )
}

fn get(path: &str) -> Request {
    Request::new(Method::Get, path)
}

#[tokio::test]
async fn test_full_response_headers() {
    let server = single_asset_server();
    let response = server.respond(&get("/app.js")).await;

    assert_eq!(response.status, Status::Ok);
    assert_eq!(&response.body[..], b"console.log(1);");
    assert_eq!(response.get_header("Content-Type"), Some("application/javascript"));
    assert_eq!(response.get_header("Content-Length"), Some("15"));
    assert_eq!(response.get_header("ETag"), Some("\"abc123\""));
    assert_eq!(
        response.get_header("Last-Modified"),
        Some("Tue, 14 Nov 2023 22:13:20 GMT")
    );
    assert_eq!(response.get_header("Cache-Control"), None);
    assert_eq!(response.get_header("Content-Encoding"), None);
}

#[tokio::test]
async fn test_if_none_match_current_etag_is_not_modified() {
    let server = single_asset_server();
    let response = server
        .respond(&get("/app.js").with_header("If-None-Match", "\"abc123\""))
        .await;

    assert_eq!(response.status, Status::NotModified);
    assert!(response.body.is_empty());
    assert_eq!(response.get_header("ETag"), Some("\"abc123\""));
    assert_eq!(response.get_header("Content-Type"), None);
    assert_eq!(response.get_header("Last-Modified"), None);
}

#[tokio::test]
async fn test_if_none_match_star_is_not_modified() {
    let server = single_asset_server();
    let response = server
        .respond(&get("/app.js").with_header("If-None-Match", "*"))
        .await;
    assert_eq!(response.status, Status::NotModified);
}

#[tokio::test]
async fn test_if_none_match_in_list() {
    let server = single_asset_server();
    let response = server
        .respond(&get("/app.js").with_header("If-None-Match", "\"old\", \"abc123\""))
        .await;
    assert_eq!(response.status, Status::NotModified);
}

#[tokio::test]
async fn test_if_none_match_other_etag_is_full_response() {
    let server = single_asset_server();
    let response = server
        .respond(&get("/app.js").with_header("If-None-Match", "\"xyz\""))
        .await;

    assert_eq!(response.status, Status::Ok);
    assert_eq!(&response.body[..], b"console.log(1);");
}

#[tokio::test]
async fn test_if_none_match_mismatch_skips_if_modified_since() {
    let server = single_asset_server();
    let response = server
        .respond(
            &get("/app.js")
                .with_header("If-None-Match", "\"xyz\"")
                .with_header("If-Modified-Since", "Tue, 14 Nov 2023 22:13:20 GMT"),
        )
        .await;
    assert_eq!(response.status, Status::Ok);
}

#[tokio::test]
async fn test_if_modified_since() {
    let server = single_asset_server();

    let same = server
        .respond(&get("/app.js").with_header("If-Modified-Since", "Tue, 14 Nov 2023 22:13:20 GMT"))
        .await;
    assert_eq!(same.status, Status::NotModified);
    assert!(same.body.is_empty());

    let later = server
        .respond(&get("/app.js").with_header("If-Modified-Since", "Wed, 15 Nov 2023 00:00:00 GMT"))
        .await;
    assert_eq!(later.status, Status::NotModified);

    let earlier = server
        .respond(&get("/app.js").with_header("If-Modified-Since", "Tue, 14 Nov 2023 22:13:19 GMT"))
        .await;
    assert_eq!(earlier.status, Status::Ok);

    let garbage = server
        .respond(&get("/app.js").with_header("If-Modified-Since", "not a date"))
        .await;
    assert_eq!(garbage.status, Status::Ok);

    let empty = server
        .respond(&get("/app.js").with_header("If-Modified-Since", ""))
        .await;
    assert_eq!(empty.status, Status::Ok);
}

#[tokio::test]
async fn test_empty_if_none_match_falls_through_to_date() {
    let server = single_asset_server();
    let response = server
        .respond(
            &get("/app.js")
                .with_header("If-None-Match", " , ")
                .with_header("If-Modified-Since", "Tue, 14 Nov 2023 22:13:20 GMT"),
        )
        .await;
    assert_eq!(response.status, Status::NotModified);
}

#[tokio::test]
async fn test_not_modified_keeps_cache_control() {
    let config = ServerConfig::new().with_extended_cache(CacheRule::parse("/app.js").unwrap());
    let server = server_with(
        config,
        &[asset("/app.js", "abc123", "application/javascript", b"x")],
    );

    let response = server
        .respond(&get("/app.js").with_header("If-None-Match", "\"abc123\""))
        .await;
    assert_eq!(response.status, Status::NotModified);
    assert_eq!(response.get_header("Cache-Control"), Some("max-age=31536000"));
}

#[tokio::test]
async fn test_routing_fallback_order() {
    let config = ServerConfig::new()
        .with_auto_ext(&[".html"])
        .with_auto_index(&["index.html"])
        .with_spa_entrypoint("/index.html");
    let server = server_with(
        config,
        &[
            asset("/index.html", "h-index", "text/html", b"shell"),
            asset("/about.html", "h-about", "text/html", b"about"),
            asset("/blog/index.html", "h-blog", "text/html", b"blog"),
        ],
    );

    let about = server.respond(&get("/about")).await;
    assert_eq!(&about.body[..], b"about");

    let blog = server.respond(&get("/blog/")).await;
    assert_eq!(&blog.body[..], b"blog");

    let spa = server
        .respond(&get("/dashboard/settings").with_header("Accept", "text/html"))
        .await;
    assert_eq!(spa.status, Status::Ok);
    assert_eq!(&spa.body[..], b"shell");
    assert_eq!(spa.get_header("Cache-Control"), Some("no-store"));
}

#[tokio::test]
async fn test_spa_fallback_needs_html_navigation() {
    let config = ServerConfig::new().with_spa_entrypoint("/index.html");
    let server = server_with(
        config,
        &[asset("/index.html", "h-index", "text/html", b"shell")],
    );

    let json = server
        .respond(&get("/api/users").with_header("Accept", "application/json"))
        .await;
    assert_eq!(json.status, Status::NotFound);

    let missing_file = server
        .respond(&get("/missing.png").with_header("Accept", "*/*"))
        .await;
    assert_eq!(missing_file.status, Status::NotFound);
    assert_eq!(&missing_file.body[..], b"Not Found");
}

#[tokio::test]
async fn test_not_found_page() {
    let config = ServerConfig::new().with_not_found_page("/404.html");
    let server = server_with(
        config,
        &[asset("/404.html", "h-404", "text/html", b"gone")],
    );

    let page = server
        .respond(&get("/nowhere").with_header("Accept", "text/html,*/*;q=0.8"))
        .await;
    assert_eq!(page.status, Status::NotFound);
    assert_eq!(&page.body[..], b"gone");
    assert_eq!(page.get_header("Cache-Control"), Some("no-store"));

    let api = server
        .respond(&get("/nowhere").with_header("Accept", "application/json"))
        .await;
    assert_eq!(api.status, Status::NotFound);
    assert_eq!(&api.body[..], b"Not Found");
}

#[tokio::test]
async fn test_extended_cache_header() {
    let config = ServerConfig::new()
        .with_extended_cache(CacheRule::parse("/assets/").unwrap())
        .with_extended_cache(CacheRule::parse("regex:/\\.css$/").unwrap());
    let server = server_with(
        config,
        &[
            asset("/assets/logo.svg", "h1", "image/svg+xml", b"<svg/>"),
            asset("/theme.css", "h2", "text/css", b"body{}"),
            asset("/robots.txt", "h3", "text/plain", b"*"),
        ],
    );

    for path in ["/assets/logo.svg", "/theme.css"] {
        let response = server.respond(&get(path)).await;
        assert_eq!(response.get_header("Cache-Control"), Some("max-age=31536000"), "{}", path);
    }
    let response = server.respond(&get("/robots.txt")).await;
    assert_eq!(response.get_header("Cache-Control"), None);
}

#[tokio::test]
async fn test_public_dir_prefix_is_stripped() {
    let config = ServerConfig::new().with_public_dir_prefix("/static");
    let server = server_with(
        config,
        &[asset("/app.js", "abc123", "application/javascript", b"x")],
    );

    assert_eq!(server.respond(&get("/static/app.js?v=2")).await.status, Status::Ok);
    assert_eq!(server.respond(&get("/app.js")).await.status, Status::NotFound);
}

#[tokio::test]
async fn test_serve_asset_with_init() {
    let server = single_asset_server();
    let asset = server.get_matching_asset("/app.js").unwrap();

    let mut init = AssetInit {
        status: Status::NotFound,
        cache: Some(CachePolicy::Never),
        ..AssetInit::default()
    };
    init.headers.insert("X-Served-By".to_string(), "test".to_string());

    let response = server.serve_asset(&get("/app.js"), &asset, init).await.unwrap();
    assert_eq!(response.status, Status::NotFound);
    assert_eq!(response.get_header("X-Served-By"), Some("test"));
    assert_eq!(response.get_header("Cache-Control"), Some("no-store"));
}

#[tokio::test]
async fn test_each_request_gets_a_fresh_body() {
    let server = single_asset_server();
    for _ in 0..3 {
        let response = server.respond(&get("/app.js")).await;
        assert_eq!(response.status, Status::Ok);
        assert_eq!(&response.body[..], b"console.log(1);");
    }
    assert_eq!(server.metrics().ok.value(), 3);
}

#[tokio::test]
async fn test_create_from_manifest() {
    let mut fs = MemoryFileSystem::new();
    fs.add_file("/site/index.html", b"<h1>home</h1>", LAST_MODIFIED)
        .add_file("/site/docs/guide.html", b"<h1>guide</h1>", LAST_MODIFIED);

    let manifest = ManifestBuilder::new(&ManifestConfig::new("/site"), &fs)
        .build()
        .unwrap();
    let config = ServerConfig::new().with_auto_ext(&[".html"]);
    let server = create_static_server(&manifest, config, &fs).unwrap();

    let guide = server.respond(&get("/docs/guide")).await;
    assert_eq!(guide.status, Status::Ok);
    assert_eq!(&guide.body[..], b"<h1>guide</h1>");
    assert_eq!(guide.get_header("Content-Type"), Some("text/html"));

    let home = server.respond(&get("/")).await;
    assert_eq!(&home.body[..], b"<h1>home</h1>");
}

#[tokio::test]
async fn test_create_from_manifest_with_unknown_type_fails() {
    let mut fs = MemoryFileSystem::new();
    fs.add_file("/site/index.html", b"x", 1);
    let mut manifest = ManifestBuilder::new(&ManifestConfig::new("/site"), &fs)
        .build()
        .unwrap();
    manifest.get_mut("/index.html").unwrap().asset_type = AssetType::Unknown("edge-kv".to_string());

    let err = create_static_server(&manifest, ServerConfig::new(), &fs)
        .err()
        .unwrap();
    assert!(matches!(err, ServerError::UnknownAssetType(ref name) if name == "edge-kv"));
    assert_eq!(err.to_string(), "Unknown content asset type 'edge-kv'");
}
