use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};

use tracing::{debug, warn};

use crate::config::LinkConfig;
use crate::protocol::{parse_value_header, validate_key, Command, Reply, CRLF};
use crate::{CacheError, Result};

/// A single connection to one cache server.
///
/// Each call performs one synchronous request/response exchange, there is no
/// pipelining. After an I/O or protocol error the state of the connection is
/// unknown and the link should no longer be trusted.
#[derive(Debug)]
pub struct ServerLink {
    addr: String,
    max_value_size: usize,

    /// [`None`] once the link has been closed.
    conn: Option<Connection>,
}

/// Buffered views over the one socket owned by a [`ServerLink`].
#[derive(Debug)]
struct Connection {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl Connection {
    fn new(stream: TcpStream) -> std::io::Result<Self> {
        Ok(Connection {
            reader: BufReader::new(stream.try_clone()?),
            writer: BufWriter::new(stream),
        })
    }

    fn send(&mut self, cmd: &Command) -> Result<()> {
        cmd.encode(&mut self.writer)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Read one `\n` terminated line. Hitting EOF before the terminator is an error.
    fn read_line(&mut self) -> Result<String> {
        let mut buf = Vec::new();
        self.reader.read_until(b'\n', &mut buf)?;
        if buf.last() != Some(&b'\n') {
            return Err(std::io::Error::from(ErrorKind::UnexpectedEof).into());
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

impl ServerLink {
    /// Open a link to `addr` (`host:port`) with the default [`LinkConfig`].
    pub fn open(addr: &str) -> Result<ServerLink> {
        ServerLink::open_with(addr, &LinkConfig::default())
    }

    /// Resolve `addr` and dial each resolved endpoint in turn until one accepts.
    pub fn open_with(addr: &str, config: &LinkConfig) -> Result<ServerLink> {
        let connect_err = |source: std::io::Error| CacheError::Connect {
            addr: addr.to_string(),
            source,
        };

        let mut last_err = None;
        for endpoint in addr.to_socket_addrs().map_err(connect_err)? {
            match TcpStream::connect_timeout(&endpoint, config.connect_timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(config.io_timeout).map_err(connect_err)?;
                    stream.set_write_timeout(config.io_timeout).map_err(connect_err)?;
                    let conn = Connection::new(stream).map_err(connect_err)?;
                    debug!(addr, %endpoint, "Connected");
                    return Ok(ServerLink {
                        addr: addr.to_string(),
                        max_value_size: config.max_value_size,
                        conn: Some(conn),
                    });
                }
                Err(e) => {
                    debug!(addr, %endpoint, error = %e, "Unable to connect to endpoint");
                    last_err = Some(e);
                }
            }
        }

        match last_err {
            Some(source) => Err(connect_err(source)),
            None => Err(CacheError::Resolve {
                addr: addr.to_string(),
            }),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn is_closed(&self) -> bool {
        self.conn.is_none()
    }

    fn connection(&mut self) -> Result<&mut Connection> {
        match self.conn.as_mut() {
            Some(conn) => Ok(conn),
            None => Err(CacheError::Closed {
                addr: self.addr.clone(),
            }),
        }
    }

    /// Retrieve the value stored for `key`, [`None`] when the server has no entry.
    ///
    /// The whole response is consumed, including the CRLF after the payload and
    /// the closing `END` line, so the connection is ready for the next request.
    pub fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;
        debug!(addr = %self.addr, key, "Getting key");
        let max_value_size = self.max_value_size;
        let conn = self.connection()?;
        conn.send(&Command::Get { key })?;

        let line = conn.read_line()?;
        match Reply::parse(&line) {
            Reply::End => return Ok(None),
            Reply::Error(line) => return Err(CacheError::Server { line }),
            _ => {}
        }

        let record = parse_value_header(&line)?;
        if record.key != key {
            return Err(CacheError::protocol(format!(
                "requested {} but received {}",
                key, record.key
            )));
        }

        if record.length > max_value_size {
            return Err(CacheError::protocol(format!(
                "value too large, {} bytes exceeds limit of {}",
                record.length, max_value_size
            )));
        }

        let mut data = vec![0; record.length];
        conn.reader.read_exact(&mut data)?;
        let mut trailer = [0; 2];
        conn.reader.read_exact(&mut trailer)?;
        if &trailer[..] != CRLF {
            return Err(CacheError::protocol("value not terminated by CRLF"));
        }

        match Reply::parse(&conn.read_line()?) {
            Reply::End => Ok(Some(data)),
            other => Err(CacheError::protocol(format!(
                "expected END, received {:?}",
                other
            ))),
        }
    }

    /// Store `value` under `key` with zero flags and no expiry.
    pub fn set(&mut self, key: &str, value: &[u8]) -> Result<()> {
        validate_key(key)?;
        debug!(addr = %self.addr, key, size = value.len(), "Setting key");
        let conn = self.connection()?;
        conn.send(&Command::Set { key, value })?;

        match Reply::parse(&conn.read_line()?) {
            Reply::Stored => Ok(()),
            Reply::NotStored | Reply::Exists | Reply::NotFound => Err(CacheError::NotStored {
                key: key.to_string(),
            }),
            Reply::Error(line) => Err(CacheError::Server { line }),
            other => Err(CacheError::protocol(format!(
                "expected STORED, received {:?}",
                other
            ))),
        }
    }

    /// Delete `key`. Returns `false` when the server had no entry for it.
    pub fn delete(&mut self, key: &str) -> Result<bool> {
        validate_key(key)?;
        debug!(addr = %self.addr, key, "Deleting key");
        let conn = self.connection()?;
        conn.send(&Command::Delete { key })?;

        match Reply::parse(&conn.read_line()?) {
            Reply::Deleted => Ok(true),
            Reply::NotFound => Ok(false),
            Reply::Error(line) => Err(CacheError::Server { line }),
            other => Err(CacheError::protocol(format!(
                "expected DELETED or NOT_FOUND, received {:?}",
                other
            ))),
        }
    }

    /// Shut the connection down. Closing an already closed link is an error.
    pub fn close(&mut self) -> Result<()> {
        let conn = self.conn.take().ok_or_else(|| CacheError::Closed {
            addr: self.addr.clone(),
        })?;
        debug!(addr = %self.addr, "Closing connection");

        match conn.writer.get_ref().shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            // The peer went away first, the socket is released all the same.
            Err(e) if e.kind() == ErrorKind::NotConnected => Ok(()),
            Err(source) => {
                warn!(addr = %self.addr, error = %source, "Close failed");
                Err(CacheError::Close {
                    addr: self.addr.clone(),
                    source,
                })
            }
        }
    }
}
