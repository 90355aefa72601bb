use crate::error::ServerResult;
use crate::http::{HttpParser, Request, Response, Status};
use crate::static_server::StaticServer;
use log::{debug, info, warn};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Largest request accepted, head and body together
pub const MAX_REQUEST_SIZE: usize = 64 * 1024;

const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Accept connections until `shutdown` resolves
pub async fn serve<S>(listener: TcpListener, server: Arc<StaticServer>, shutdown: S) -> ServerResult<()>
where
    S: Future<Output = ()>,
{
    info!("Listening on {}", listener.local_addr()?);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutting down");
                return Ok(());
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!("Failed to accept connection: {}", e);
                        continue;
                    }
                };

                let server = server.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, peer, &server).await {
                        debug!("Connection from {} ended with error: {}", peer, e);
                    }
                });
            }
        }
    }
}

/// Serve a single request on an accepted connection
pub async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    server: &StaticServer,
) -> ServerResult<()> {
    let response = match read_request(&mut stream).await {
        Ok(Some(request)) => server.respond(&request).await,
        Ok(None) => return Ok(()),
        Err(status) => {
            debug!("Rejecting request from {} with {}", peer, status.code());
            let mut response = Response::new(status);
            response.set_text_body(status.as_str());
            response
        }
    };

    let mut out = Vec::with_capacity(response.body.len() + 256);
    response.serialize(&mut out)?;
    stream.write_all(&out).await?;
    stream.shutdown().await?;
    Ok(())
}

/// Read and parse one request. `Ok(None)` if the peer closed before sending one.
async fn read_request(stream: &mut TcpStream) -> Result<Option<Request>, Status> {
    let mut parser = HttpParser::new();
    let mut buffer = [0u8; READ_BUFFER_SIZE];
    let mut received = 0;

    loop {
        let n = stream
            .read(&mut buffer)
            .await
            .map_err(|_| Status::BadRequest)?;
        if n == 0 {
            if received == 0 {
                return Ok(None);
            }
            return Err(Status::BadRequest);
        }

        received += n;
        if received > MAX_REQUEST_SIZE {
            return Err(Status::PayloadTooLarge);
        }

        parser.parse(&buffer[..n]).map_err(|_| Status::BadRequest)?;
        if parser.is_complete() {
            return parser.get_request().map(Some).map_err(|_| Status::BadRequest);
        }
    }
}
