// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Byte-stream transports a channel runs over.

use std::fmt;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_serial::SerialPortBuilderExt;

use aprs_core::DynResult;

const TCP_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Bidirectional byte stream returned by [`Transport::connect`].
pub trait ByteStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> ByteStream for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    Serial { device: String, baud: u32 },
    Tcp { host: String, port: u16 },
}

impl Transport {
    pub async fn connect(&self) -> DynResult<Box<dyn ByteStream>> {
        match self {
            Transport::Serial { device, baud } => {
                let stream = tokio_serial::new(device, *baud)
                    .open_native_async()
                    .map_err(|e| format!("open {}: {}", device, e))?;
                Ok(Box::new(stream))
            }
            Transport::Tcp { host, port } => {
                let stream = tokio::time::timeout(
                    TCP_CONNECT_TIMEOUT,
                    TcpStream::connect((host.as_str(), *port)),
                )
                .await
                .map_err(|_| format!("connect {}:{}: timed out", host, port))??;
                stream.set_nodelay(true)?;
                Ok(Box::new(stream))
            }
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Serial { device, baud } => write!(f, "serial {} @ {} baud", device, baud),
            Transport::Tcp { host, port } => write!(f, "tcp {}:{}", host, port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_tcp_connect_and_exchange() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            sock.write_all(b"hello").await.unwrap();
        });

        let transport = Transport::Tcp {
            host: "127.0.0.1".to_string(),
            port,
        };
        let mut stream = transport.connect().await.unwrap();
        let mut buf = [0u8; 5];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_serial_open_failure_is_error() {
        let transport = Transport::Serial {
            device: "/dev/nonexistent-tnc".to_string(),
            baud: 9600,
        };
        assert!(transport.connect().await.is_err());
    }

    #[test]
    fn test_display() {
        let t = Transport::Tcp {
            host: "rotate.aprs.net".to_string(),
            port: 14580,
        };
        assert_eq!(t.to_string(), "tcp rotate.aprs.net:14580");
    }
}
