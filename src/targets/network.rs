//! Network target for remote logging
//!
//! Sends records to a remote server over TCP, one JSON object per line.
//! Useful for centralized logging in distributed systems.

use crate::core::{LogRecord, LoggerError, Result, Target};
use std::io::{BufWriter, Write};
use std::net::TcpStream;
use std::time::Duration;

const IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Network target that sends JSON lines to a remote TCP server
///
/// # Example
///
/// ```no_run
/// use rust_log_pipeline::prelude::*;
/// use rust_log_pipeline::targets::NetworkTarget;
///
/// let target = NetworkTarget::new("127.0.0.1:8080")
///     .expect("Failed to connect to log server");
///
/// let logger = Logger::builder().target(target).build().unwrap();
/// logger.info("This log will be sent to 127.0.0.1:8080");
/// ```
pub struct NetworkTarget {
    name: String,
    stream: Option<BufWriter<TcpStream>>,
    address: String,
    reconnect_on_error: bool,
}

impl NetworkTarget {
    /// Connect to `address` (e.g. "localhost:8080", "192.168.1.1:9000")
    ///
    /// # Errors
    ///
    /// Returns error if connection fails
    pub fn new(address: impl Into<String>) -> Result<Self> {
        let address = address.into();
        let stream = Self::connect(&address)?;
        Ok(Self {
            name: "network".to_string(),
            stream: Some(stream),
            address,
            reconnect_on_error: true,
        })
    }

    /// Enable or disable automatic reconnection on errors
    ///
    /// Default: enabled
    #[must_use]
    pub fn with_reconnect(mut self, enable: bool) -> Self {
        self.reconnect_on_error = enable;
        self
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    fn connect(address: &str) -> Result<BufWriter<TcpStream>> {
        let context = |e: std::io::Error| LoggerError::io_operation("connecting to log server", address, e);
        let stream = TcpStream::connect(address).map_err(context)?;
        stream.set_write_timeout(Some(IO_TIMEOUT)).map_err(context)?;
        stream.set_read_timeout(Some(IO_TIMEOUT)).map_err(context)?;
        stream.set_nodelay(true).map_err(context)?;
        Ok(BufWriter::new(stream))
    }

    /// Send `payload`, reconnecting once if the connection was lost
    fn send(&mut self, payload: &[u8]) -> Result<()> {
        let result = match self.stream.as_mut() {
            Some(stream) => stream.write_all(payload).and_then(|()| stream.flush()),
            None if self.reconnect_on_error => Err(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "not connected",
            )),
            None => return Err(LoggerError::writer("Network stream not connected")),
        };

        let Err(e) = result else {
            return Ok(());
        };
        self.stream = None;
        if !self.reconnect_on_error {
            return Err(e.into());
        }

        match Self::connect(&self.address) {
            Ok(mut stream) => {
                stream.write_all(payload)?;
                stream.flush()?;
                self.stream = Some(stream);
                Ok(())
            }
            Err(reconnect_err) => Err(LoggerError::writer(format!(
                "Failed to send log and reconnect: {} (reconnect: {})",
                e, reconnect_err
            ))),
        }
    }
}

impl Target for NetworkTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&mut self, record: &LogRecord) -> Result<()> {
        let mut payload = serde_json::to_vec(record)?;
        payload.push(b'\n');
        self.send(&payload)
    }

    fn write_batch(&mut self, records: &[&LogRecord]) -> Result<()> {
        let mut payload = Vec::with_capacity(records.len() * 256);
        for record in records {
            serde_json::to_writer(&mut payload, record)?;
            payload.push(b'\n');
        }
        self.send(&payload)
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(ref mut stream) = self.stream {
            stream.flush()?;
        }
        Ok(())
    }

    fn health_check(&self) -> bool {
        self.stream.is_some()
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            stream.flush()?;
        }
        Ok(())
    }
}
