//! DCC receive.
//!
//! An active transfer connects to the address the bot advertised and reads
//! until the bot closes the connection. Bytes land in a part file of its
//! own, `<name>.<n>.part`, which is linked to `<name>` only once the
//! transfer verified, so a file under its final name is always complete.
//! The final name is never overwritten: when `<name>` is taken the file
//! becomes `<stem> (1).<ext>`, `<stem> (2).<ext>` and so on.

use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use xdcc_proto::DccSend;

use crate::config::TransferConfig;
use crate::error::TransferError;

/// Read and write-buffer size for a single transfer.
pub const BUFFER_SIZE: usize = 3 * 1024 * 1024;

const PART_SUFFIX: &str = ".part";
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Tunables for a transfer, taken from `[transfer]`.
#[derive(Debug, Clone)]
pub struct TransferOptions {
    pub download_dir: PathBuf,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub send_acks: bool,
}

impl From<&TransferConfig> for TransferOptions {
    fn from(config: &TransferConfig) -> Self {
        Self {
            download_dir: config.download_dir.clone(),
            connect_timeout: config.connect_timeout(),
            read_timeout: config.read_timeout(),
            send_acks: config.send_acks,
        }
    }
}

/// Cancellation and progress shared between a running transfer and whoever
/// watches it.
#[derive(Debug, Clone, Default)]
pub struct TransferControl {
    pub cancel: CancellationToken,
    pub received: Arc<AtomicU64>,
}

impl TransferControl {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            received: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }
}

/// A completed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Writes DCC streams to the download directory.
#[derive(Debug, Clone)]
pub struct TransferEngine {
    options: TransferOptions,
    next_part: Arc<AtomicU64>,
}

impl TransferEngine {
    pub fn new(options: TransferOptions) -> Self {
        Self {
            options,
            next_part: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn options(&self) -> &TransferOptions {
        &self.options
    }

    /// Receive the file a DCC SEND handshake offers.
    pub async fn receive(
        &self,
        offer: &DccSend,
        control: &TransferControl,
    ) -> Result<TransferOutcome, TransferError> {
        if offer.is_passive() {
            return self.begin_passive_transfer(offer).await;
        }
        self.begin_active_transfer(offer.ip, offer.port, &offer.filename, offer.size, control)
            .await
    }

    /// Connect to `ip:port` and stream the file into the download directory.
    ///
    /// `ip` is the big-endian IPv4 address as sent in the handshake. When
    /// `expected_size` is known the transfer stops there and fails if the
    /// peer closes early.
    pub async fn begin_active_transfer(
        &self,
        ip: u32,
        port: u16,
        filename: &str,
        expected_size: Option<u64>,
        control: &TransferControl,
    ) -> Result<TransferOutcome, TransferError> {
        let file_name = sanitize_file_name(filename)?;
        let addr = SocketAddrV4::new(Ipv4Addr::from(ip), port);
        let dir = &self.options.download_dir;
        tokio::fs::create_dir_all(dir).await?;

        info!(%addr, file = %file_name, size = ?expected_size, "Starting DCC transfer");

        let result = async {
            let stream = self.connect(addr, &control.cancel).await?;
            let (part_path, file) = self.create_part_file(dir, &file_name).await?;
            let bytes = self
                .stream_to_file(stream, file, expected_size, control)
                .await?;
            let final_path = publish(&part_path, dir, &file_name).await?;
            Ok::<_, TransferError>((final_path, bytes))
        }
        .await;

        match result {
            Ok((final_path, bytes)) => {
                info!(file = %final_path.display(), bytes, "DCC transfer complete");
                Ok(TransferOutcome {
                    path: final_path,
                    bytes,
                })
            }
            Err(e) => {
                warn!(%addr, file = %file_name, received = control.received(), error = %e, "DCC transfer failed");
                Err(e)
            }
        }
    }

    /// Passive (reverse) DCC needs a listening socket on our side, which is
    /// not implemented.
    pub async fn begin_passive_transfer(
        &self,
        offer: &DccSend,
    ) -> Result<TransferOutcome, TransferError> {
        warn!(file = %offer.filename, token = ?offer.token, "Passive DCC offer ignored");
        Err(TransferError::PassiveUnsupported)
    }

    async fn connect(
        &self,
        addr: SocketAddrV4,
        cancel: &CancellationToken,
    ) -> Result<TcpStream, TransferError> {
        let secs = self.options.connect_timeout.as_secs();
        tokio::select! {
            _ = cancel.cancelled() => Err(TransferError::Cancelled(0)),
            result = timeout(self.options.connect_timeout, TcpStream::connect(addr)) => match result {
                Err(_) => Err(TransferError::Timeout { phase: "connect", secs }),
                Ok(Err(source)) => Err(TransferError::Connect { addr, source }),
                Ok(Ok(stream)) => Ok(stream),
            },
        }
    }

    /// Open a part file no other transfer uses, `<name>.<n>.part`.
    async fn create_part_file(
        &self,
        dir: &Path,
        file_name: &str,
    ) -> Result<(PathBuf, File), TransferError> {
        loop {
            let n = self.next_part.fetch_add(1, Ordering::Relaxed);
            let path = dir.join(format!("{file_name}.{n}{PART_SUFFIX}"));
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn stream_to_file(
        &self,
        mut stream: TcpStream,
        file: File,
        expected_size: Option<u64>,
        control: &TransferControl,
    ) -> Result<u64, TransferError> {
        let mut file = BufWriter::with_capacity(BUFFER_SIZE, file);
        let mut buf = vec![0u8; BUFFER_SIZE];
        let mut received: u64 = 0;
        let mut send_acks = self.options.send_acks;
        let read_secs = self.options.read_timeout.as_secs();

        loop {
            let n = tokio::select! {
                _ = control.cancel.cancelled() => {
                    file.flush().await?;
                    return Err(TransferError::Cancelled(received));
                }
                result = timeout(self.options.read_timeout, stream.read(&mut buf)) => match result {
                    Err(_) => {
                        file.flush().await?;
                        return Err(TransferError::Timeout { phase: "read", secs: read_secs });
                    }
                    Ok(read) => read,
                },
            };
            let n = match n {
                Ok(n) => n,
                Err(e) => {
                    file.flush().await?;
                    return Err(e.into());
                }
            };
            if n == 0 {
                break;
            }

            file.write_all(&buf[..n]).await?;
            received += n as u64;
            control.received.store(received, Ordering::Relaxed);

            if send_acks {
                match send_ack(&mut stream, received, control, self.options.read_timeout).await {
                    Ok(true) => {}
                    Ok(false) => send_acks = false,
                    Err(e) => {
                        file.flush().await?;
                        return Err(e);
                    }
                }
            }

            if expected_size.is_some_and(|expected| received >= expected) {
                break;
            }
        }

        file.flush().await?;

        if received == 0 {
            return Err(TransferError::Empty);
        }
        if let Some(expected) = expected_size
            && expected != received
        {
            return Err(TransferError::Incomplete { expected, received });
        }
        Ok(received)
    }
}

/// Write one ack, bounded by `limit` and by cancellation. `Ok(false)` means
/// the peer refused it and acking should stop.
async fn send_ack<W>(
    writer: &mut W,
    received: u64,
    control: &TransferControl,
    limit: Duration,
) -> Result<bool, TransferError>
where
    W: AsyncWrite + Unpin,
{
    let ack = dcc_ack(received);
    tokio::select! {
        _ = control.cancel.cancelled() => Err(TransferError::Cancelled(received)),
        result = timeout(limit, writer.write_all(&ack)) => match result {
            Err(_) => Err(TransferError::Timeout { phase: "ack", secs: limit.as_secs() }),
            Ok(Err(e)) => {
                debug!(error = %e, "DCC ack failed, no longer acknowledging");
                Ok(false)
            }
            Ok(Ok(())) => Ok(true),
        },
    }
}

/// Link `part_path` to the first free name among `<name>`, `<stem> (1).<ext>`,
/// ... and drop the part file. An existing file is never replaced.
async fn publish(part_path: &Path, dir: &Path, file_name: &str) -> Result<PathBuf, TransferError> {
    for attempt in 0..MAX_NAME_ATTEMPTS {
        let candidate = dir.join(numbered_name(file_name, attempt));
        match tokio::fs::hard_link(part_path, &candidate).await {
            Ok(()) => {
                tokio::fs::remove_file(part_path).await?;
                return Ok(candidate);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            // No hard links on this filesystem.
            Err(e) if e.kind() == ErrorKind::Unsupported => {
                if tokio::fs::try_exists(&candidate).await? {
                    continue;
                }
                tokio::fs::rename(part_path, &candidate).await?;
                return Ok(candidate);
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(TransferError::Io(std::io::Error::new(
        ErrorKind::AlreadyExists,
        format!("no free name for {file_name}"),
    )))
}

/// `name` for attempt 0, otherwise `<stem> (n).<ext>`.
fn numbered_name(name: &str, attempt: u32) -> String {
    if attempt == 0 {
        return name.to_string();
    }
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem} ({attempt}).{ext}"),
        _ => format!("{name} ({attempt})"),
    }
}

/// DCC acknowledgement: total bytes received as a 32-bit big-endian
/// integer, wrapping past 4 GiB.
fn dcc_ack(received: u64) -> [u8; 4] {
    (received as u32).to_be_bytes()
}

/// Reduce a peer-supplied name to a single path component.
pub fn sanitize_file_name(name: &str) -> Result<String, TransferError> {
    let last = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = last.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        return Err(TransferError::InvalidFileName(name.to_string()));
    }
    Ok(cleaned.to_string())
}
