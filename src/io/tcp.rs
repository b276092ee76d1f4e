// src/io/tcp.rs
//
// LAN link: the analyzer's LIS port reached over a TCP socket.

use std::io::Read;
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::io::{classify_read, IoError, Link};

/// Upper bound for establishing the connection
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// A connected TCP stream with a bounded read timeout.
pub struct TcpLink {
    stream: TcpStream,
    label: String,
}

impl TcpLink {
    pub fn connect(host: &str, port: u16, read_timeout: Duration) -> Result<Self, IoError> {
        let device = format!("tcp({}:{})", host, port);

        let addrs: Vec<_> = (host, port)
            .to_socket_addrs()
            .map_err(|e| IoError::connection(&device, format!("resolve: {}", e)))?
            .collect();
        if addrs.is_empty() {
            return Err(IoError::connection(&device, "host resolved to no addresses"));
        }

        let mut last_err = None;
        let mut connected = None;
        for addr in &addrs {
            match TcpStream::connect_timeout(addr, CONNECT_TIMEOUT) {
                Ok(s) => {
                    connected = Some(s);
                    break;
                }
                Err(e) => last_err = Some(e),
            }
        }

        let stream = match (connected, last_err) {
            (Some(s), _) => s,
            (None, Some(e)) if e.kind() == std::io::ErrorKind::TimedOut => {
                return Err(IoError::timeout(&device, "connect"));
            }
            (None, Some(e)) => return Err(IoError::connection(&device, e.to_string())),
            (None, None) => return Err(IoError::connection(&device, "no address attempted")),
        };

        stream
            .set_read_timeout(Some(read_timeout))
            .map_err(|e| IoError::protocol(&device, format!("set read timeout: {}", e)))?;

        tlog!(
            "[tcp] Connected to {} (read timeout {:.1}s)",
            device,
            read_timeout.as_secs_f64()
        );

        Ok(TcpLink {
            stream,
            label: device,
        })
    }
}

impl Link for TcpLink {
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, IoError> {
        let result = self.stream.read(buf);
        classify_read(&self.label, result)
    }

    fn label(&self) -> &str {
        &self.label
    }
}

impl Drop for TcpLink {
    fn drop(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}
