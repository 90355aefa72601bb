use embedded_static_server::content_types::ContentTypeRule;
use embedded_static_server::manifest::hash_contents;
use embedded_static_server::{
    build_manifest, create_static_assets_cache, read_manifest, write_manifest, AssetType,
    ManifestBuilder, ManifestConfig, MemoryFileSystem, OsFileSystem, ServerError,
};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, relative: &str, contents: &[u8]) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn public_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "index.html", b"<!doctype html><title>home</title>");
    write(dir.path(), "about.html", b"<h1>about</h1>");
    write(dir.path(), "blog/index.html", b"<h1>blog</h1>");
    write(dir.path(), "assets/app.js", b"console.log('hi');");
    write(dir.path(), "assets/data.bin42", &[0, 1, 2, 3]);
    write(dir.path(), ".env", b"SECRET=1");
    write(dir.path(), ".well-known/security.txt", b"Contact: me");
    write(dir.path(), "node_modules/pkg/index.js", b"module.exports = 1;");
    dir
}

fn config_for(dir: &TempDir) -> ManifestConfig {
    ManifestConfig::new(dir.path().to_str().unwrap())
}

fn keys(manifest: &embedded_static_server::StaticAssetManifest) -> BTreeSet<String> {
    manifest.keys().cloned().collect()
}

#[test]
fn test_build_is_deterministic() {
    let dir = public_dir();
    let config = config_for(&dir);

    let first = build_manifest(&config).unwrap();
    let second = build_manifest(&config).unwrap();

    assert_eq!(keys(&first), keys(&second));
    for (key, metadata) in &first {
        assert_eq!(metadata.file_info.hash, second[key].file_info.hash);
        assert_eq!(metadata.content_type, second[key].content_type);
    }
    assert_eq!(
        first["/about.html"].file_info.hash,
        hash_contents(b"<h1>about</h1>")
    );
}

#[test]
fn test_entries_describe_files() {
    let dir = public_dir();
    let manifest = build_manifest(&config_for(&dir)).unwrap();

    let about = &manifest["/about.html"];
    assert_eq!(about.asset_type, AssetType::EmbeddedInline);
    assert_eq!(about.asset_key, "/about.html");
    assert_eq!(about.content_type, "text/html");
    assert_eq!(about.file_info.size, 14);
    assert!(about.file_info.last_modified_time > 0);
    assert!(about.file_info.asset_path.ends_with("/about.html"));

    assert_eq!(manifest["/assets/app.js"].content_type, "application/javascript");
}

#[test]
fn test_unknown_extension_falls_back_to_octet_stream() {
    let dir = public_dir();
    let manifest = build_manifest(&config_for(&dir)).unwrap();

    assert_eq!(
        manifest["/assets/data.bin42"].content_type,
        "application/octet-stream"
    );
}

#[test]
fn test_dot_files_and_well_known() {
    let dir = public_dir();

    let manifest = build_manifest(&config_for(&dir)).unwrap();
    assert!(!manifest.contains_key("/.env"));
    assert!(manifest.contains_key("/.well-known/security.txt"));

    let manifest = build_manifest(&config_for(&dir).with_ignore_dot_files(false)).unwrap();
    assert!(manifest.contains_key("/.env"));

    let manifest = build_manifest(&config_for(&dir).with_ignore_well_known(true)).unwrap();
    assert!(!manifest.contains_key("/.well-known/security.txt"));
}

#[test]
fn test_ignored_directories() {
    let dir = public_dir();

    let manifest = build_manifest(&config_for(&dir)).unwrap();
    assert!(manifest.contains_key("/node_modules/pkg/index.js"));

    let manifest = build_manifest(&config_for(&dir).with_ignore_dir("/node_modules")).unwrap();
    assert!(!manifest.contains_key("/node_modules/pkg/index.js"));
    assert!(manifest.contains_key("/blog/index.html"));

    let absolute = dir.path().canonicalize().unwrap().join("blog");
    let manifest = build_manifest(&config_for(&dir).with_ignore_dir(absolute.to_str().unwrap())).unwrap();
    assert!(!manifest.contains_key("/blog/index.html"));
}

#[test]
fn test_custom_content_types() {
    let dir = public_dir();
    let config = config_for(&dir)
        .with_content_type(ContentTypeRule::new(".bin42", "application/x-bin42", false))
        .with_content_type(ContentTypeRule::new(".js", "text/javascript", true));

    let manifest = build_manifest(&config).unwrap();
    assert_eq!(manifest["/assets/data.bin42"].content_type, "application/x-bin42");
    assert_eq!(manifest["/assets/app.js"].content_type, "text/javascript");
}

#[test]
fn test_missing_public_dir_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("does-not-exist");

    let err = build_manifest(&ManifestConfig::new(missing.to_str().unwrap())).unwrap_err();
    assert!(matches!(err, ServerError::Config(_)));
}

#[test]
fn test_manifest_into_cache_keeps_key_set() {
    let dir = public_dir();
    let manifest = build_manifest(&config_for(&dir)).unwrap();

    let cache = create_static_assets_cache(&manifest, &OsFileSystem).unwrap();
    let loaded: BTreeSet<String> = cache.get_asset_keys().into_iter().collect();
    assert_eq!(loaded, keys(&manifest));
}

#[test]
fn test_write_and_read_manifest() {
    let dir = public_dir();
    let manifest = build_manifest(&config_for(&dir)).unwrap();

    let out = tempfile::tempdir().unwrap();
    let path = out.path().join("build/manifest.json");
    write_manifest(&manifest, &path).unwrap();

    let restored = read_manifest(&path).unwrap();
    assert_eq!(restored, manifest);

    // Sorted keys make the artifact byte-stable
    write_manifest(&restored, out.path().join("again.json")).unwrap();
    assert_eq!(
        fs::read(&path).unwrap(),
        fs::read(out.path().join("again.json")).unwrap()
    );
}

#[test]
fn test_legacy_asset_type_is_accepted() {
    let json = format!(
        r#"{{
            "/a.txt": {{
                "type": "wasm-inline",
                "assetKey": "/a.txt",
                "contentType": "text/plain",
                "fileInfo": {{ "hash": "{}", "size": 1, "assetPath": "/public/a.txt", "lastModifiedTime": 0 }}
            }}
        }}"#,
        hash_contents(b"x")
    );
    let manifest = embedded_static_server::manifest::manifest_from_json(&json).unwrap();
    assert_eq!(manifest["/a.txt"].asset_type, AssetType::EmbeddedInline);

    let mut fs = MemoryFileSystem::new();
    fs.add_file("/public/a.txt", b"x", 0);
    assert!(create_static_assets_cache(&manifest, &fs).is_ok());
}

#[test]
fn test_stale_manifest_is_detected() {
    let mut fs = MemoryFileSystem::new();
    fs.add_file("/public/index.html", b"<p>v1</p>", 10);

    let config = ManifestConfig::new("/public");
    let manifest = ManifestBuilder::new(&config, &fs).build().unwrap();

    fs.add_file("/public/index.html", b"<p>version two</p>", 20);
    let err = create_static_assets_cache(&manifest, &fs).unwrap_err();
    assert!(matches!(err, ServerError::Config(_)));
}

#[test]
fn test_same_length_edit_is_detected() {
    let mut fs = MemoryFileSystem::new();
    fs.add_file("/public/index.html", b"<p>v1</p>", 10);

    let config = ManifestConfig::new("/public");
    let manifest = ManifestBuilder::new(&config, &fs).build().unwrap();

    fs.add_file("/public/index.html", b"<p>v2</p>", 10);
    let err = create_static_assets_cache(&manifest, &fs).unwrap_err();
    assert!(matches!(err, ServerError::Config(_)));
}
