//! In-process memcache compatible server used by the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

type Store = Arc<Mutex<HashMap<String, Vec<u8>>>>;

/// Serves `get`, `set` and `delete` from an in-memory map, one thread per connection.
pub struct MockServer {
    addr: String,
    store: Store,
    reject_writes: Arc<AtomicBool>,
    connections: Arc<AtomicUsize>,
}

impl MockServer {
    pub fn start() -> MockServer {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock server");
        let addr = listener.local_addr().unwrap().to_string();
        let store: Store = Arc::default();
        let reject_writes = Arc::new(AtomicBool::new(false));
        let connections = Arc::new(AtomicUsize::new(0));

        let (s, r, c) = (store.clone(), reject_writes.clone(), connections.clone());
        thread::spawn(move || {
            for stream in listener.incoming() {
                let stream = match stream {
                    Ok(stream) => stream,
                    Err(_) => return,
                };
                let (s, r, c) = (s.clone(), r.clone(), c.clone());
                c.fetch_add(1, Ordering::SeqCst);
                thread::spawn(move || {
                    let _ = serve(stream, s, r);
                    c.fetch_sub(1, Ordering::SeqCst);
                });
            }
        });

        MockServer {
            addr,
            store,
            reject_writes,
            connections,
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Inspect the stored value without going through the protocol.
    pub fn value(&self, key: &str) -> Option<Vec<u8>> {
        self.store.lock().unwrap().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.store.lock().unwrap().len()
    }

    /// Number of client connections which have not been closed yet.
    pub fn open_connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Wait up to five seconds for the number of open connections to reach `expected`.
    pub fn wait_for_connections(&self, expected: usize) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if self.open_connections() == expected {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    /// When enabled, every `set` is answered with `SERVER_ERROR`.
    pub fn reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }
}

/// An address which refuses connections.
pub fn unreachable_addr() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().to_string()
}

fn serve(stream: TcpStream, store: Store, reject_writes: Arc<AtomicBool>) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = stream;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Ok(());
        }
        let parts: Vec<&str> = line.trim_end().split(' ').collect();
        match parts.as_slice() {
            ["get", keys @ ..] if !keys.is_empty() => {
                let store = store.lock().unwrap();
                for key in keys {
                    if let Some(value) = store.get(*key) {
                        write!(writer, "VALUE {} 0 {}\r\n", key, value.len())?;
                        writer.write_all(value)?;
                        writer.write_all(b"\r\n")?;
                    }
                }
                writer.write_all(b"END\r\n")?;
            }
            ["set", key, _flags, _exptime, len] => {
                let len: usize = match len.parse() {
                    Ok(len) => len,
                    Err(_) => {
                        writer.write_all(b"CLIENT_ERROR bad data chunk\r\n")?;
                        continue;
                    }
                };
                let mut data = vec![0; len + 2];
                reader.read_exact(&mut data)?;
                data.truncate(len);
                if reject_writes.load(Ordering::SeqCst) {
                    writer.write_all(b"SERVER_ERROR out of memory storing object\r\n")?;
                } else {
                    store.lock().unwrap().insert(key.to_string(), data);
                    writer.write_all(b"STORED\r\n")?;
                }
            }
            ["delete", key] => match store.lock().unwrap().remove(*key) {
                Some(_) => writer.write_all(b"DELETED\r\n")?,
                None => writer.write_all(b"NOT_FOUND\r\n")?,
            },
            _ => writer.write_all(b"ERROR\r\n")?,
        }
        writer.flush()?;
    }
}
