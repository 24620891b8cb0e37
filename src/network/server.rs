//! TCP Server
//!
//! Owns the table directory, accepts connections, and spawns one handler
//! thread per client. A failure to accept or handle a single connection is
//! logged and never terminates the accept loop.

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use crate::config::Config;
use crate::directory::TableDirectory;
use crate::error::{Result, StoreError};

use super::Connection;

/// TCP server for stackstore
pub struct Server {
    config: Config,

    /// Shared table directory, handed to every connection handler
    directory: Arc<TableDirectory>,

    /// Bound listener; populated by [`bind`](Self::bind)
    listener: Option<TcpListener>,

    /// Number of live connection handler threads
    active_connections: Arc<AtomicUsize>,
}

impl Server {
    /// Create a new server with the given config and an empty directory
    pub fn new(config: Config) -> Self {
        Self {
            config,
            directory: Arc::new(TableDirectory::new()),
            listener: None,
            active_connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// The shared table directory
    pub fn directory(&self) -> Arc<TableDirectory> {
        Arc::clone(&self.directory)
    }

    /// Bind the listening socket and return the bound address
    ///
    /// Useful on its own when listening on an OS-assigned port.
    pub fn bind(&mut self) -> Result<SocketAddr> {
        let listener = TcpListener::bind(&self.config.listen_addr)?;
        let addr = listener.local_addr()?;
        self.listener = Some(listener);
        Ok(addr)
    }

    /// Run the accept loop (blocking; returns only on fatal bind failure)
    pub fn run(&mut self) -> Result<()> {
        if self.listener.is_none() {
            self.bind()?;
        }
        let Some(listener) = self.listener.take() else {
            return Err(StoreError::Config("server has no listener".to_string()));
        };

        tracing::info!("Listening on {}", listener.local_addr()?);

        for stream in listener.incoming() {
            match stream {
                Ok(stream) => self.spawn_handler(stream),
                Err(e) => tracing::warn!("Failed to accept connection: {}", e),
            }
        }

        Ok(())
    }

    /// Spawn a handler thread for one accepted connection
    fn spawn_handler(&self, stream: TcpStream) {
        // Enforce the connection cap before spending a thread
        let active = self.active_connections.fetch_add(1, Ordering::SeqCst) + 1;
        if active > self.config.max_connections {
            self.active_connections.fetch_sub(1, Ordering::SeqCst);
            tracing::warn!(
                "Refusing connection: {} active connections at capacity",
                active - 1
            );
            return;
        }

        let directory = Arc::clone(&self.directory);
        let counter = Arc::clone(&self.active_connections);
        let read_timeout_ms = self.config.read_timeout_ms;
        let write_timeout_ms = self.config.write_timeout_ms;

        thread::spawn(move || {
            let result = (|| {
                let mut connection = Connection::new(stream, directory)?;
                connection.set_timeouts(read_timeout_ms, write_timeout_ms)?;
                connection.handle()
            })();

            if let Err(e) = result {
                tracing::warn!("Connection handler failed: {}", e);
            }

            counter.fetch_sub(1, Ordering::SeqCst);
        });
    }
}
