use std::sync::Arc;

use log::{debug, warn};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{self, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::GrassError;

/// Outcome of a successful `get`/`put` negotiation: the ephemeral port
/// the client must dial and the transfer size.
pub struct TransferTicket {
    pub port: u16,
    pub size: u64,
}

/// Prepares a `get` transfer: opens the file, binds an ephemeral
/// listener and detaches a worker that streams the whole file to the
/// first (and only) peer. The listener is bound before this function
/// returns, so the client can never dial a port that is not yet
/// listening.
pub async fn start_get(path: &str, slots: &Arc<Semaphore>) -> Result<TransferTicket, GrassError> {
    let permit = acquire_slot(slots)?;

    let file = File::open(path)
        .await
        .map_err(|_| GrassError::Io("Failed to open file for get()".to_string()))?;
    let size = file
        .metadata()
        .await
        .map_err(|_| GrassError::Io("Failed to get file size".to_string()))?
        .len();

    let (listener, port) = bind_ephemeral().await?;

    tokio::spawn(async move {
        let _slot = permit;
        if let Err(e) = serve_get(listener, file).await {
            warn!("get worker on port {} failed: {}", port, e);
        }
    });

    Ok(TransferTicket { port, size })
}

/// Prepares a `put` transfer: creates (or truncates) the target file,
/// binds an ephemeral listener and detaches a worker that receives at
/// most `size` bytes from the peer. Symbolic links are refused rather
/// than followed.
pub async fn start_put(
    path: &str,
    size: u64,
    slots: &Arc<Semaphore>,
) -> Result<TransferTicket, GrassError> {
    let permit = acquire_slot(slots)?;

    if let Ok(metadata) = fs::symlink_metadata(path).await {
        if metadata.file_type().is_symlink() {
            return Err(GrassError::Io("Failed to open file for put()".to_string()));
        }
    }

    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .await
        .map_err(|_| GrassError::Io("Failed to open file for put()".to_string()))?;

    let (listener, port) = bind_ephemeral().await?;

    tokio::spawn(async move {
        let _slot = permit;
        if let Err(e) = serve_put(listener, file, size).await {
            warn!("put worker on port {} failed: {}", port, e);
        }
    });

    Ok(TransferTicket { port, size })
}

fn acquire_slot(slots: &Arc<Semaphore>) -> Result<OwnedSemaphorePermit, GrassError> {
    Arc::clone(slots)
        .try_acquire_owned()
        .map_err(|_| GrassError::Io("Too many concurrent transfers".to_string()))
}

async fn bind_ephemeral() -> Result<(TcpListener, u16), GrassError> {
    let listener = TcpListener::bind(("0.0.0.0", 0))
        .await
        .map_err(|_| GrassError::Io("Failed to open data port".to_string()))?;
    let port = listener
        .local_addr()
        .map_err(|_| GrassError::Io("Failed to open data port".to_string()))?
        .port();
    Ok((listener, port))
}

async fn serve_get(listener: TcpListener, mut file: File) -> io::Result<()> {
    let (mut peer, addr) = listener.accept().await?;
    debug!("data connection from {} (get)", addr);

    io::copy(&mut file, &mut peer).await?;
    peer.shutdown().await
}

async fn serve_put(listener: TcpListener, mut file: File, size: u64) -> io::Result<()> {
    let (peer, addr) = listener.accept().await?;
    debug!("data connection from {} (put)", addr);

    // Stop at `size` bytes even if the peer keeps sending; a peer that
    // closes early simply leaves a short file behind.
    let mut bounded = peer.take(size);
    io::copy(&mut bounded, &mut file).await?;
    file.flush().await?;

    let mut peer = bounded.into_inner();
    peer.shutdown().await
}

/// Dials a transfer port and writes everything received, up to `size`
/// bytes, into `file`. Used by the client side of `get`.
pub async fn download(addr: &str, port: u16, size: u64, file: &mut File) -> io::Result<()> {
    let peer = TcpStream::connect((addr, port)).await?;
    let mut bounded = peer.take(size);
    io::copy(&mut bounded, file).await?;
    file.flush().await
}

/// Dials a transfer port and streams the whole of `file` to it. Used by
/// the client side of `put`.
pub async fn upload(addr: &str, port: u16, file: &mut File) -> io::Result<()> {
    let mut peer = TcpStream::connect((addr, port)).await?;
    io::copy(file, &mut peer).await?;
    peer.shutdown().await
}
