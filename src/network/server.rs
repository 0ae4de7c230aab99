//! TCP Server
//!
//! Accepts connections and runs each on its own worker thread.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam::sync::WaitGroup;

use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::error::Result;

use super::{Connection, ControlChannel, ShutdownSignal};

/// TCP server for Keyward
///
/// ## Threads
/// - The caller's thread runs the accept loop
/// - One worker per accepted connection
/// - One control channel worker
pub struct Server {
    config: Config,
    listener: TcpListener,
    control: ControlChannel,
    dispatcher: Arc<Dispatcher>,
    shutdown: ShutdownSignal,

    /// Live connection workers
    active: Arc<AtomicUsize>,
}

impl Server {
    /// Bind the client listener and the control socket
    pub fn bind(config: Config, dispatcher: Arc<Dispatcher>) -> Result<Self> {
        config.validate()?;

        let listener = TcpListener::bind(&config.listen_addr)?;
        // Non-blocking so the accept loop can observe shutdown
        listener.set_nonblocking(true)?;

        let shutdown = ShutdownSignal::new();
        let control = ControlChannel::bind(
            &config.control_path,
            Arc::clone(&dispatcher),
            shutdown.clone(),
            config.poll_interval(),
        )?;

        Ok(Self {
            config,
            listener,
            control,
            dispatcher,
            shutdown,
            active: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Address the client listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle for signalling shutdown from another thread
    pub fn shutdown_handle(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    /// Start the server (blocking)
    ///
    /// Returns once shutdown has been signalled and every worker has
    /// finished its current request and exited.
    pub fn run(self) -> Result<()> {
        let Server {
            config,
            listener,
            control,
            dispatcher,
            shutdown,
            active,
        } = self;

        tracing::info!("Listening on {}", listener.local_addr()?);

        let control_worker = thread::Builder::new()
            .name("keyward-control".into())
            .spawn(move || control.run())?;

        let workers = WaitGroup::new();
        let mut next_id: u64 = 0;

        while !shutdown.is_triggered() {
            match listener.accept() {
                Ok((stream, addr)) => {
                    next_id += 1;
                    spawn_worker(
                        stream,
                        addr,
                        next_id,
                        &config,
                        &dispatcher,
                        &shutdown,
                        &active,
                        &workers,
                    );
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(config.poll_interval());
                }
                Err(e) => {
                    tracing::warn!("Accept failed: {}", e);
                    thread::sleep(config.poll_interval());
                }
            }
        }

        drop(listener);
        tracing::info!(
            "Shutting down, waiting for {} connection(s)",
            active.load(Ordering::SeqCst)
        );
        workers.wait();

        if control_worker.join().is_err() {
            tracing::error!("Control channel worker panicked");
        }

        Ok(())
    }
}

/// Decrements the live connection count when a worker ends
struct ActiveGuard(Arc<AtomicUsize>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[allow(clippy::too_many_arguments)]
fn spawn_worker(
    stream: TcpStream,
    addr: SocketAddr,
    id: u64,
    config: &Config,
    dispatcher: &Arc<Dispatcher>,
    shutdown: &ShutdownSignal,
    active: &Arc<AtomicUsize>,
    workers: &WaitGroup,
) {
    if active.load(Ordering::SeqCst) >= config.max_connections {
        tracing::warn!(
            "Refusing {}: {} connections already active",
            addr,
            config.max_connections
        );
        return;
    }

    active.fetch_add(1, Ordering::SeqCst);
    let guard = ActiveGuard(Arc::clone(active));
    let wait = workers.clone();

    let connection = Connection::new(
        stream,
        Arc::clone(dispatcher),
        shutdown.clone(),
        config,
    );

    let spawned = thread::Builder::new()
        .name(format!("keyward-conn-{}", id))
        .spawn(move || {
            let _guard = guard;
            let _wait = wait;

            match connection {
                Ok(mut connection) => {
                    if let Err(e) = connection.handle() {
                        tracing::debug!("Connection {} ended with error: {}", addr, e);
                    }
                }
                Err(e) => tracing::warn!("Failed to set up connection {}: {}", addr, e),
            }
        });

    if let Err(e) = spawned {
        tracing::error!("Failed to spawn worker for {}: {}", addr, e);
    }
}
