//! Tests for Server, Connection, and ControlChannel
//!
//! These tests verify:
//! - Encrypt/decrypt over TCP
//! - Protocol errors keep the connection open
//! - Control commands over the Unix socket, including exit
//! - Cooperative shutdown with idle clients attached
//! - Connection limits and oversized frames

use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use keyward::network::{send_control, Client, Server, ShutdownSignal};
use keyward::protocol::{ControlCommand, Request, RequestType, Response};
use keyward::trusted::{AeadModule, Operation, TrustedModule};
use keyward::{
    Config, Dispatcher, FileKeyLoader, KeyCache, KeyId, Result, SecretBuffer, ServiceError,
};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

/// Wraps AeadModule and counts transform calls
struct CountingModule {
    inner: AeadModule,
    calls: Arc<AtomicUsize>,
}

impl TrustedModule for CountingModule {
    fn transform(
        &mut self,
        op: Operation,
        key: &SecretBuffer,
        payload: &[u8],
    ) -> Result<SecretBuffer> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.transform(op, key, payload)
    }
}

struct TestServer {
    temp: TempDir,
    addr: SocketAddr,
    control: PathBuf,
    key_id: KeyId,
    calls: Arc<AtomicUsize>,
    cache: Arc<KeyCache>,
    shutdown: ShutdownSignal,
    handle: Option<JoinHandle<Result<()>>>,
}

impl TestServer {
    fn start() -> Self {
        Self::start_with(|builder| builder)
    }

    fn start_with(
        tweak: impl FnOnce(keyward::config::ConfigBuilder) -> keyward::config::ConfigBuilder,
    ) -> Self {
        let temp = TempDir::new().unwrap();
        let key_path = temp.path().join("kek.bin");
        fs::write(&key_path, [0x42u8; 32]).unwrap();
        let control = temp.path().join("control.sock");

        let builder = Config::builder()
            .listen_addr("127.0.0.1:0")
            .control_path(&control)
            .poll_interval_ms(10)
            .read_timeout_ms(2000)
            .write_timeout_ms(2000);
        let config = tweak(builder).build();

        let calls = Arc::new(AtomicUsize::new(0));
        let cache = Arc::new(KeyCache::new(config.cache_capacity, FileKeyLoader::new()));
        let module = CountingModule {
            inner: AeadModule::new(),
            calls: Arc::clone(&calls),
        };
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&cache), module));

        let server = Server::bind(config, dispatcher).unwrap();
        let addr = server.local_addr().unwrap();
        let shutdown = server.shutdown_handle();
        let handle = thread::spawn(move || server.run());

        Self {
            key_id: KeyId::from(format!("file:{}", key_path.display())),
            temp,
            addr,
            control,
            calls,
            cache,
            shutdown,
            handle: Some(handle),
        }
    }

    fn client(&self) -> Client {
        Client::connect(self.addr).unwrap()
    }

    /// Wait for `run` to return after shutdown was requested elsewhere
    fn join(&mut self) -> Result<()> {
        self.handle.take().unwrap().join().unwrap()
    }

    fn stop(mut self) -> Result<()> {
        self.shutdown.trigger();
        self.join()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn success_data(response: Response) -> SecretBuffer {
    match response {
        Response::Success { data, .. } => data,
        other => panic!("Expected success, got {:?}", other),
    }
}

// =============================================================================
// Request Tests
// =============================================================================

#[test]
fn test_encrypt_decrypt_over_tcp() {
    let server = TestServer::start();
    let mut client = server.client();

    let response = client
        .request(&Request::encrypt(server.key_id.clone(), b"data encryption key"))
        .unwrap();
    let sealed = match response {
        Response::Success {
            request_type,
            key_id,
            data,
        } => {
            assert_eq!(request_type, RequestType::Encrypt);
            assert_eq!(key_id, server.key_id);
            data
        }
        other => panic!("Expected success, got {:?}", other),
    };

    let opened = success_data(
        client
            .request(&Request::decrypt(server.key_id.clone(), sealed.as_bytes()))
            .unwrap(),
    );

    assert_eq!(opened.as_bytes(), b"data encryption key");
    assert_eq!(server.cache.len(), 1);
    server.stop().unwrap();
}

#[test]
fn test_missing_data_keeps_connection_open() {
    let server = TestServer::start();
    let mut client = server.client();

    let response = client.send_raw(br#"{"request_type": 1, "key_id": "file:/k"}"#).unwrap();
    assert_eq!(response, Response::Error(ServiceError::MissingData));

    let response = client
        .request(&Request::encrypt(server.key_id.clone(), b"still here"))
        .unwrap();
    assert!(!response.is_error());
}

#[test]
fn test_unknown_request_type_over_tcp() {
    let server = TestServer::start();
    let mut client = server.client();

    let request = Request::new(
        RequestType::Unknown(3),
        server.key_id.clone(),
        SecretBuffer::from_slice(b"payload"),
    );
    let response = client.request(&request).unwrap();

    assert_eq!(response, Response::Error(ServiceError::RequestType));
    assert_eq!(server.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_unknown_key_over_tcp() {
    let server = TestServer::start();
    let mut client = server.client();

    let missing = format!("file:{}/absent.bin", server.temp.path().display());
    let response = client
        .request(&Request::encrypt(missing.as_str(), b"payload"))
        .unwrap();

    assert_eq!(response, Response::Error(ServiceError::KeyLoad));
}

#[test]
fn test_concurrent_clients() {
    let server = TestServer::start();
    let addr = server.addr;

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let key_id = server.key_id.clone();
            thread::spawn(move || {
                let mut client = Client::connect(addr).unwrap();
                for j in 0..20 {
                    let plaintext = format!("client {} message {}", i, j);
                    let sealed = success_data(
                        client
                            .request(&Request::encrypt(key_id.clone(), plaintext.as_bytes()))
                            .unwrap(),
                    );
                    let opened = success_data(
                        client
                            .request(&Request::decrypt(key_id.clone(), sealed.as_bytes()))
                            .unwrap(),
                    );
                    assert_eq!(opened.as_bytes(), plaintext.as_bytes());
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(server.calls.load(Ordering::SeqCst), 8 * 20 * 2);
    assert_eq!(server.cache.len(), 1);
}

// =============================================================================
// Control Channel Tests
// =============================================================================

#[test]
fn test_control_load_and_remove() {
    let server = TestServer::start();

    let load = ControlCommand::Load(server.key_id.clone());
    assert_eq!(send_control(&server.control, &load).unwrap(), "ok 1");
    assert!(server.cache.contains(&server.key_id));

    let remove = ControlCommand::Remove(server.key_id.clone());
    assert_eq!(send_control(&server.control, &remove).unwrap(), "ok 1");
    assert!(server.cache.is_empty());

    let reply = send_control(&server.control, &remove).unwrap();
    assert!(reply.starts_with("error"), "reply: {}", reply);
}

#[test]
fn test_control_remove_all() {
    let server = TestServer::start();
    let mut client = server.client();
    client
        .request(&Request::encrypt(server.key_id.clone(), b"x"))
        .unwrap();

    let reply = send_control(&server.control, &ControlCommand::RemoveAll).unwrap();

    assert_eq!(reply, "ok 1");
    assert!(server.cache.is_empty());
}

#[test]
fn test_control_survives_bad_commands() {
    use std::io::{Read, Write};
    use std::os::unix::net::UnixStream;

    let server = TestServer::start();

    let mut stream = UnixStream::connect(&server.control).unwrap();
    stream.write_all(b"reboot now\n").unwrap();
    stream.shutdown(std::net::Shutdown::Write).unwrap();
    let mut reply = String::new();
    stream.read_to_string(&mut reply).unwrap();
    assert!(reply.starts_with("error"));

    // Disconnect without sending anything
    drop(UnixStream::connect(&server.control).unwrap());

    let load = ControlCommand::Load(server.key_id.clone());
    assert_eq!(send_control(&server.control, &load).unwrap(), "ok 1");
}

#[test]
fn test_control_exit_stops_server() {
    let mut server = TestServer::start();
    let _idle = server.client();

    assert_eq!(
        send_control(&server.control, &ControlCommand::Exit).unwrap(),
        "ok"
    );

    server.join().unwrap();
    assert!(!server.control.exists());
}

/// Send one line and leave the write half open, as `nc -U` does
fn send_line_without_half_close(path: &std::path::Path, line: &str) -> String {
    use std::io::{Read, Write};
    use std::os::unix::net::UnixStream;

    let mut stream = UnixStream::connect(path).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    stream.write_all(line.as_bytes()).unwrap();

    let mut reply = String::new();
    stream.read_to_string(&mut reply).unwrap();
    reply.trim_end().to_string()
}

#[test]
fn test_control_line_runs_without_half_close() {
    let server = TestServer::start();

    let reply = send_line_without_half_close(&server.control, &format!("load {}\n", server.key_id));

    assert_eq!(reply, "ok 1");
    assert!(server.cache.contains(&server.key_id));
}

#[test]
fn test_control_exit_without_half_close_stops_server() {
    let mut server = TestServer::start();

    let started = std::time::Instant::now();
    let reply = send_line_without_half_close(&server.control, "exit\n");

    assert_eq!(reply, "ok");
    assert!(started.elapsed() < Duration::from_secs(2));
    server.join().unwrap();
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_shutdown_with_idle_clients() {
    let server = TestServer::start();
    let addr = server.addr;
    let mut idle = server.client();
    idle.request(&Request::encrypt(server.key_id.clone(), b"x"))
        .unwrap();

    server.stop().unwrap();

    assert!(idle
        .request(&Request::encrypt(KeyId::from("file:/x"), b"x"))
        .is_err());
    assert!(Client::connect(addr).is_err());
}

#[test]
fn test_connection_limit() {
    let server = TestServer::start_with(|builder| builder.max_connections(1));

    let mut first = server.client();
    first
        .request(&Request::encrypt(server.key_id.clone(), b"x"))
        .unwrap();

    let mut second = server.client();
    assert!(second
        .request(&Request::encrypt(server.key_id.clone(), b"x"))
        .is_err());

    // The admitted connection is unaffected
    assert!(first
        .request(&Request::encrypt(server.key_id.clone(), b"y"))
        .is_ok());
}

#[test]
fn test_oversized_frame_closes_connection() {
    let server = TestServer::start_with(|builder| builder.max_frame_size(64));
    let mut client = server.client();

    assert!(client.send_raw(&[b' '; 1000]).is_err());

    // Other clients are unaffected
    thread::sleep(Duration::from_millis(20));
    let mut other = server.client();
    assert!(other
        .request(&Request::encrypt(server.key_id.clone(), b"ok"))
        .is_ok());
}

#[test]
fn test_stale_control_socket_is_replaced() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("stale.sock");
    // A crashed daemon leaves its socket file behind
    drop(std::os::unix::net::UnixListener::bind(&path).unwrap());
    assert!(path.exists());

    let dispatcher = Arc::new(Dispatcher::new(
        Arc::new(KeyCache::new(4, FileKeyLoader::new())),
        AeadModule::new(),
    ));
    let config = Config::builder()
        .listen_addr("127.0.0.1:0")
        .control_path(&path)
        .poll_interval_ms(10)
        .build();

    let server = Server::bind(config, dispatcher).unwrap();
    let shutdown = server.shutdown_handle();
    let handle = thread::spawn(move || server.run());

    let reply = send_control(&path, &ControlCommand::RemoveAll).unwrap();
    assert_eq!(reply, "ok 0");

    shutdown.trigger();
    handle.join().unwrap().unwrap();
    assert!(!path.exists());
}

#[test]
fn test_control_path_that_is_a_regular_file_is_rejected() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("not-a-socket");
    fs::write(&path, b"data").unwrap();

    let dispatcher = Arc::new(Dispatcher::new(
        Arc::new(KeyCache::new(4, FileKeyLoader::new())),
        AeadModule::new(),
    ));
    let config = Config::builder()
        .listen_addr("127.0.0.1:0")
        .control_path(&path)
        .build();

    assert!(Server::bind(config, dispatcher).is_err());
    assert!(path.exists());
}
