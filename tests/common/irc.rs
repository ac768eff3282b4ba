//! Scripted IRC server.
//!
//! Accepts the daemon's connection and lets a test drive the other side of
//! the link line by line.

use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::time::timeout;
use xdcc_proto::Message;

pub struct FakeIrcServer {
    listener: TcpListener,
}

impl FakeIrcServer {
    pub async fn bind() -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        Ok(Self { listener })
    }

    /// `host:port` to put in the server config.
    pub fn address(&self) -> String {
        self.listener
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_default()
    }

    pub async fn accept(&self) -> anyhow::Result<FakeLink> {
        let (stream, _) = timeout(Duration::from_secs(5), self.listener.accept()).await??;
        let (read_half, write_half) = stream.into_split();
        Ok(FakeLink {
            reader: BufReader::new(read_half),
            writer: write_half,
        })
    }
}

/// Server side of one client connection.
pub struct FakeLink {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl FakeLink {
    pub async fn send_raw(&mut self, line: &str) -> anyhow::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Receive a single message from the client.
    pub async fn recv(&mut self) -> anyhow::Result<Message> {
        let mut line = String::new();
        let read = timeout(Duration::from_secs(5), self.reader.read_line(&mut line)).await??;
        if read == 0 {
            anyhow::bail!("client closed the connection");
        }
        line.trim_end()
            .parse::<Message>()
            .map_err(|e| anyhow::anyhow!("Parse error: {}", e))
    }

    /// Receive messages until one has the given command, returning it.
    pub async fn recv_command(&mut self, command: &str) -> anyhow::Result<Message> {
        loop {
            let msg = self.recv().await?;
            if msg.command == command {
                return Ok(msg);
            }
        }
    }
}
