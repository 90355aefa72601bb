use embedded_static_server::host;
use embedded_static_server::{
    build_manifest, create_static_server, read_manifest, write_manifest, ManifestConfig,
    OsFileSystem, ServerConfig, ServerError, ServerResult,
};
use log::info;
use std::env;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;

const DEFAULT_ADDRESS: &str = "127.0.0.1:8080";

const USAGE: &str = "usage:
  embedded-static-server build <publicDir> <manifest.json> [manifest-config.json]
  embedded-static-server serve <manifest.json> [server-config.json] [address]";

#[tokio::main]
async fn main() -> ServerResult<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("build") if args.len() >= 3 => build(&args[1], &args[2], args.get(3)),
        Some("serve") if args.len() >= 2 => {
            let address = args.get(3).map_or(DEFAULT_ADDRESS, String::as_str);
            serve(&args[1], args.get(2), address).await
        }
        _ => {
            eprintln!("{}", USAGE);
            Err(ServerError::Config("Invalid arguments".to_string()))
        }
    }
}

fn build(public_dir: &str, manifest_path: &str, config_path: Option<&String>) -> ServerResult<()> {
    let mut config = match config_path {
        Some(path) => ManifestConfig::from_json_file(path)?,
        None => ManifestConfig::default(),
    };
    config.public_dir = public_dir.to_string();

    let manifest = build_manifest(&config)?;
    write_manifest(&manifest, manifest_path)
}

async fn serve(manifest_path: &str, config_path: Option<&String>, address: &str) -> ServerResult<()> {
    let config = match config_path {
        Some(path) => ServerConfig::from_json_file(path)?,
        None => ServerConfig::new(),
    };

    // The cache is fully loaded before the listener is bound
    let manifest = read_manifest(manifest_path)?;
    let server = Arc::new(create_static_server(&manifest, config, &OsFileSystem)?);

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(true);
    })
    .map_err(|e| ServerError::Config(format!("Error setting Ctrl-C handler: {}", e)))?;

    let listener = TcpListener::bind(address).await?;
    host::serve(listener, server.clone(), async move {
        let _ = shutdown_rx.changed().await;
    })
    .await?;

    info!("Served {} request(s)\n{}", server.metrics().total(), server.metrics().format());
    Ok(())
}
