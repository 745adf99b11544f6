//! The byte-stream medium underneath the transport.

use async_trait::async_trait;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream};

use crate::config::CommsConfig;

/// Write side of the medium
pub type BoxWriter = Pin<Box<dyn AsyncWrite + Send>>;
/// Read side of the medium
pub type BoxReader = Pin<Box<dyn AsyncRead + Send>>;

/// Opens the two independent byte streams to the peer.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open the stream carrying messages to the peer.
    async fn open_writer(&self) -> io::Result<BoxWriter>;

    /// Open the stream carrying messages from the peer.
    async fn open_reader(&self) -> io::Result<BoxReader>;
}

/// Connects through two filesystem paths, typically named pipes created by the peer.
///
/// Opening a named pipe blocks until the other end opens it too; `tokio::fs` runs that on the
/// blocking pool.
#[derive(Debug, Clone)]
pub struct PipeConnector {
    writer_path: PathBuf,
    reader_path: PathBuf,
}

impl PipeConnector {
    pub fn new(writer_path: impl Into<PathBuf>, reader_path: impl Into<PathBuf>) -> Self {
        Self {
            writer_path: writer_path.into(),
            reader_path: reader_path.into(),
        }
    }

    pub fn from_config(config: &CommsConfig) -> Self {
        Self::new(config.writer_path.clone(), config.reader_path.clone())
    }
}

#[async_trait]
impl Connector for PipeConnector {
    async fn open_writer(&self) -> io::Result<BoxWriter> {
        log::debug!("Opening writer pipe {}", self.writer_path.display());
        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .open(&self.writer_path)
            .await?;
        Ok(Box::pin(file))
    }

    async fn open_reader(&self) -> io::Result<BoxReader> {
        log::debug!("Opening reader pipe {}", self.reader_path.display());
        let file = tokio::fs::File::open(&self.reader_path).await?;
        Ok(Box::pin(file))
    }
}

/// Connects to an in-process peer over `tokio::io::duplex` streams.
///
/// Each side can be opened once; the matching [`DuplexPeer`] holds the other ends.
pub struct DuplexConnector {
    writer: Mutex<Option<DuplexStream>>,
    reader: Mutex<Option<DuplexStream>>,
}

/// The peer's ends of a [`DuplexConnector`].
pub struct DuplexPeer {
    /// Receives what the transport writes
    pub from_transport: DuplexStream,
    /// Feeds what the transport reads
    pub to_transport: DuplexStream,
}

impl DuplexConnector {
    /// Create a connector and its peer with `buffer` bytes of capacity per direction.
    pub fn pair(buffer: usize) -> (Self, DuplexPeer) {
        let (writer, from_transport) = tokio::io::duplex(buffer);
        let (reader, to_transport) = tokio::io::duplex(buffer);
        let connector = Self {
            writer: Mutex::new(Some(writer)),
            reader: Mutex::new(Some(reader)),
        };
        let peer = DuplexPeer {
            from_transport,
            to_transport,
        };
        (connector, peer)
    }

    fn take(slot: &Mutex<Option<DuplexStream>>, side: &str) -> io::Result<DuplexStream> {
        let mut slot = slot
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "duplex slot poisoned"))?;
        slot.take().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotConnected,
                format!("duplex {} already taken", side),
            )
        })
    }
}

#[async_trait]
impl Connector for DuplexConnector {
    async fn open_writer(&self) -> io::Result<BoxWriter> {
        Ok(Box::pin(Self::take(&self.writer, "writer")?))
    }

    async fn open_reader(&self) -> io::Result<BoxReader> {
        Ok(Box::pin(Self::take(&self.reader, "reader")?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_duplex_streams_are_connected() {
        let (connector, mut peer) = DuplexConnector::pair(64);

        let mut writer = connector.open_writer().await.unwrap();
        writer.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        peer.from_transport.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        let mut reader = connector.open_reader().await.unwrap();
        peer.to_transport.write_all(b"pong").await.unwrap();
        reader.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");
    }

    #[tokio::test]
    async fn test_duplex_sides_open_once() {
        let (connector, _peer) = DuplexConnector::pair(64);
        assert!(connector.open_writer().await.is_ok());
        let err = connector.open_writer().await.err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }
}
