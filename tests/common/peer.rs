//! Fake XDCC bot on the DCC side: listens on loopback and serves one
//! connection.

use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub struct DccPeer {
    listener: TcpListener,
}

impl DccPeer {
    pub async fn bind() -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        Ok(Self { listener })
    }

    pub fn port(&self) -> u16 {
        self.listener.local_addr().map(|a| a.port()).unwrap_or(0)
    }

    /// Loopback as the big-endian integer a DCC SEND carries.
    pub fn ip(&self) -> u32 {
        u32::from(Ipv4Addr::LOCALHOST)
    }

    /// `DCC SEND` CTCP offering `file` from this peer.
    pub fn offer(&self, file: &str, size: Option<usize>) -> String {
        match size {
            Some(size) => format!("\x01DCC SEND {} {} {} {}\x01", file, self.ip(), self.port(), size),
            None => format!("\x01DCC SEND {} {} {}\x01", file, self.ip(), self.port()),
        }
    }

    /// Send `payload`, close our write side, and collect the acks the
    /// receiver sends until it hangs up.
    pub fn serve(self, payload: Vec<u8>) -> JoinHandle<anyhow::Result<Vec<u8>>> {
        tokio::spawn(async move {
            let (mut socket, _) = self.listener.accept().await?;
            socket.write_all(&payload).await?;
            socket.shutdown().await?;
            let mut acks = Vec::new();
            let _ = tokio::time::timeout(Duration::from_secs(5), socket.read_to_end(&mut acks)).await;
            Ok(acks)
        })
    }

    /// Whether anyone connects within `wait`.
    #[allow(dead_code)]
    pub async fn accepted_within(&self, wait: Duration) -> bool {
        tokio::time::timeout(wait, self.listener.accept()).await.is_ok()
    }

    /// Accept and immediately reset the connection without sending data.
    pub fn serve_reset(self) -> JoinHandle<anyhow::Result<()>> {
        tokio::spawn(async move {
            let (socket, _) = self.listener.accept().await?;
            socket2::SockRef::from(&socket).set_linger(Some(Duration::ZERO))?;
            drop(socket);
            Ok(())
        })
    }
}
