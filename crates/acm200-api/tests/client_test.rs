#![allow(clippy::unwrap_used)]
// Integration tests for `DeviceClient` against an in-process fake matrix.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use acm200_api::{DeviceAddress, DeviceClient, Error, RouteMap, Transport, TransportConfig};

// ── Fake device ─────────────────────────────────────────────────────

type Responder = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Accepts connections, records the command line of each, answers via
/// `respond` (or stays silent on `None`) and holds the socket open until
/// the client closes it.
struct FakeDevice {
    addr: SocketAddr,
    commands: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicUsize>,
}

impl FakeDevice {
    async fn start(
        banner: Option<&'static str>,
        respond: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let commands = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(AtomicUsize::new(0));
        let respond: Responder = Arc::new(respond);

        let accept_commands = Arc::clone(&commands);
        let accept_closed = Arc::clone(&closed);
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(serve(
                    socket,
                    banner,
                    Arc::clone(&respond),
                    Arc::clone(&accept_commands),
                    Arc::clone(&accept_closed),
                ));
            }
        });

        Self {
            addr,
            commands,
            closed,
        }
    }

    fn client(&self, config: TransportConfig) -> DeviceClient {
        let address = DeviceAddress::new("127.0.0.1", self.addr.port()).unwrap();
        DeviceClient::new(address, config)
    }

    fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    async fn wait_closed(&self, expected: usize) {
        let deadline = Instant::now() + Duration::from_secs(3);
        while self.closed.load(Ordering::SeqCst) < expected {
            assert!(
                Instant::now() < deadline,
                "expected {expected} closed connections, saw {}",
                self.closed.load(Ordering::SeqCst)
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

async fn serve(
    mut socket: TcpStream,
    banner: Option<&'static str>,
    respond: Responder,
    commands: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicUsize>,
) {
    if let Some(banner) = banner {
        let _ = socket.write_all(banner.as_bytes()).await;
    }

    let mut buf = Vec::new();
    let mut chunk = [0u8; 256];
    let line = loop {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => {
                closed.fetch_add(1, Ordering::SeqCst);
                return;
            }
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = buf.windows(2).position(|w| w == b"\r\n") {
                    break String::from_utf8_lossy(&buf[..pos]).into_owned();
                }
            }
        }
    };

    commands.lock().unwrap().push(line.clone());
    if let Some(reply) = respond(&line) {
        let _ = socket.write_all(reply.as_bytes()).await;
    }

    loop {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
    }
    closed.fetch_add(1, Ordering::SeqCst);
}

fn fast() -> TransportConfig {
    TransportConfig {
        banner_timeout: Duration::from_millis(50),
        read_timeout: Duration::from_millis(200),
        response_deadline: Duration::from_secs(2),
        ..TransportConfig::default()
    }
}

fn routes(pairs: &[(u16, u16)]) -> RouteMap {
    pairs.iter().copied().collect()
}

// ── Switch tests ────────────────────────────────────────────────────

#[tokio::test]
async fn test_switch_sends_padded_command_and_closes() {
    let device = FakeDevice::start(None, |_| None).await;
    let client = device.client(fast());

    let receipt = client.switch_route(2, 5).await.unwrap();

    assert_eq!(receipt.command, "OUT002FR005");
    assert_eq!(receipt.reply, "");
    assert!(!receipt.rejected);
    assert_eq!(device.commands(), vec!["OUT002FR005"]);
    device.wait_closed(1).await;
}

#[tokio::test]
async fn test_switch_with_default_timeouts_returns_after_silence() {
    let device = FakeDevice::start(None, |_| None).await;
    let client = device.client(TransportConfig::default());

    let started = Instant::now();
    client.switch_route(2, 5).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(3));
    device.wait_closed(1).await;
}

#[tokio::test]
async fn test_switch_rejection_is_still_success() {
    let device =
        FakeDevice::start(None, |_| Some("[ERROR] Invalid input\r\nACM200>".into())).await;
    let client = device.client(fast());

    let receipt = client.switch_route(1, 9).await.unwrap();

    assert!(receipt.rejected);
    assert!(receipt.reply.contains("[ERROR]"));
}

#[tokio::test]
async fn test_switch_invalid_ids_never_connect() {
    let device = FakeDevice::start(None, |_| None).await;
    let client = device.client(fast());

    let result = client.switch_route(0, 1).await;

    assert!(
        matches!(result, Err(Error::InvalidArgument { .. })),
        "expected InvalidArgument, got: {result:?}"
    );
    assert!(device.commands().is_empty());
}

// ── Status tests ────────────────────────────────────────────────────

fn fallthrough_device(command: &str) -> Option<String> {
    match command {
        "STATUS" => Some("Unknown command\r\nACM200>".into()),
        "OUT 000 STATUS" => Some(
            "OUT 001 FROM IN 002\r\nOUT 002 FROM IN AUTO\r\nOUT 003 FROM IN 001\r\nACM200>".into(),
        ),
        _ => None,
    }
}

#[tokio::test]
async fn test_bulk_routes_fall_through_spellings() {
    let device = FakeDevice::start(None, fallthrough_device).await;
    let client = device.client(fast());

    let parsed = client.get_bulk_routes().await.unwrap();

    assert_eq!(parsed, routes(&[(1, 2), (3, 1)]));
    assert_eq!(device.commands(), vec!["STATUS", "OUT 000 STATUS"]);
    device.wait_closed(2).await;
}

#[tokio::test]
async fn test_bulk_routes_are_idempotent() {
    let device = FakeDevice::start(None, fallthrough_device).await;
    let client = device.client(fast());

    let first = client.get_bulk_routes().await.unwrap();
    let second = client.get_bulk_routes().await.unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_bulk_routes_empty_when_nothing_parses() {
    let device = FakeDevice::start(None, |_| Some("ACM200>".into())).await;
    let client = device.client(fast());

    let parsed = client.get_bulk_routes().await.unwrap();

    assert!(parsed.is_empty());
    assert_eq!(device.commands().len(), 4);
}

#[tokio::test]
async fn test_single_route_tries_next_spelling() {
    let device = FakeDevice::start(None, |command| match command {
        "OUT002 STATUS" => Some("OUT 002 FROM IN 004\r\n".into()),
        _ => None,
    })
    .await;
    let client = device.client(fast());

    let input = client.get_route(2).await.unwrap();

    assert_eq!(input, Some(4));
    assert_eq!(device.commands(), vec!["OUT 002 STATUS", "OUT002 STATUS"]);
}

#[tokio::test]
async fn test_single_route_absent() {
    let device = FakeDevice::start(None, |_| Some("OUT 001 FROM IN 001\r\n".into())).await;
    let client = device.client(fast());

    let input = client.get_route(5).await.unwrap();

    assert_eq!(input, None);
    assert_eq!(device.commands().len(), 3);
}

// ── Framing tests ───────────────────────────────────────────────────

#[tokio::test]
async fn test_prompt_ends_response_early() {
    let device = FakeDevice::start(None, |_| Some("OUT 001 FROM IN 003\r\nACM200> ".into())).await;
    let client = device.client(TransportConfig {
        banner_timeout: Duration::ZERO,
        read_timeout: Duration::from_secs(5),
        response_deadline: Duration::from_secs(10),
        ..TransportConfig::default()
    });

    let started = Instant::now();
    let parsed = client.get_bulk_routes().await.unwrap();

    assert_eq!(parsed, routes(&[(1, 3)]));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_banner_is_drained_before_command() {
    let device = FakeDevice::start(Some("Welcome to ACM200\r\nACM200>"), |command| {
        (command == "STATUS").then(|| "OUT 004 FROM IN 001\r\nACM200>".into())
    })
    .await;
    let client = device.client(fast());

    let parsed = client.get_bulk_routes().await.unwrap();

    assert_eq!(parsed, routes(&[(4, 1)]));
    assert_eq!(device.commands(), vec!["STATUS"]);
}

#[tokio::test]
async fn test_response_byte_budget() {
    let device = FakeDevice::start(None, |_| Some("x".repeat(100_000))).await;
    let client = device.client(TransportConfig {
        max_response_bytes: 4096,
        ..fast()
    });

    let receipt = client.switch_route(1, 1).await.unwrap();

    assert_eq!(receipt.reply.len(), 4096);
}

/// Writes one byte every 100ms from connect onwards and never a prompt.
async fn start_trickling_device() -> (SocketAddr, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let commands = Arc::new(Mutex::new(Vec::new()));

    let accept_commands = Arc::clone(&commands);
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let (mut reader, mut writer) = socket.into_split();
            tokio::spawn(async move {
                while writer.write_all(b"x").await.is_ok() {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            });
            let commands = Arc::clone(&accept_commands);
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 256];
                while let Ok(n) = reader.read(&mut chunk).await {
                    if n == 0 {
                        break;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                    if let Some(pos) = buf.windows(2).position(|w| w == b"\r\n") {
                        let line = String::from_utf8_lossy(&buf[..pos]).into_owned();
                        commands.lock().unwrap().push(line);
                        buf.drain(..pos + 2);
                    }
                }
            });
        }
    });

    (addr, commands)
}

#[tokio::test]
async fn test_trickling_banner_cannot_hold_the_slot() {
    let (addr, commands) = start_trickling_device().await;
    let client = DeviceClient::new(
        DeviceAddress::new("127.0.0.1", addr.port()).unwrap(),
        TransportConfig {
            banner_timeout: Duration::from_millis(300),
            read_timeout: Duration::from_millis(200),
            response_deadline: Duration::from_secs(1),
            ..TransportConfig::default()
        },
    );

    let started = Instant::now();
    let receipt = tokio::time::timeout(Duration::from_secs(10), client.switch_route(1, 1))
        .await
        .expect("switch stuck behind a trickling banner")
        .unwrap();

    // Banner drain (300ms) plus response deadline (1s), with slack.
    assert!(
        started.elapsed() < Duration::from_secs(3),
        "switch took {:?}",
        started.elapsed()
    );
    assert_eq!(receipt.command, "OUT001FR001");
    assert!(receipt.reply.starts_with('x'));

    let deadline = Instant::now() + Duration::from_secs(2);
    while commands.lock().unwrap().is_empty() && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(commands.lock().unwrap().clone(), vec!["OUT001FR001"]);
}

// ── Failure tests ───────────────────────────────────────────────────

#[tokio::test]
async fn test_connection_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let client = DeviceClient::new(DeviceAddress::new("127.0.0.1", port).unwrap(), fast());
    let result = client.get_bulk_routes().await;

    assert!(
        matches!(result, Err(Error::Connection { .. })),
        "expected Connection error, got: {result:?}"
    );
    let err = result.unwrap_err();
    assert!(err.is_connection());
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_shutdown_abandons_in_flight_call() {
    let device = FakeDevice::start(None, |_| None).await;
    let client = Arc::new(device.client(TransportConfig {
        read_timeout: Duration::from_secs(10),
        response_deadline: Duration::from_secs(20),
        ..fast()
    }));

    let pending = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.get_bulk_routes().await })
    };
    tokio::time::sleep(Duration::from_millis(200)).await;
    client.shutdown();

    let result = tokio::time::timeout(Duration::from_secs(1), pending)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(result, Err(Error::Cancelled)));
    device.wait_closed(1).await;

    assert!(matches!(
        client.switch_route(1, 1).await,
        Err(Error::Cancelled)
    ));
}

// ── Exclusivity ─────────────────────────────────────────────────────

/// Records connection open/close around a fixed delay.
#[derive(Default)]
struct RecordingTransport {
    events: Mutex<Vec<String>>,
}

impl Transport for RecordingTransport {
    async fn execute(&self, command: &str) -> Result<String, Error> {
        self.events.lock().unwrap().push(format!("open {command}"));
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.events.lock().unwrap().push(format!("close {command}"));
        Ok(String::new())
    }
}

#[tokio::test]
async fn test_concurrent_switches_never_interleave() {
    let address = DeviceAddress::new("10.0.0.5", 23).unwrap();
    let client = DeviceClient::with_transport(address, RecordingTransport::default());

    let (a, b) = tokio::join!(client.switch_route(1, 2), client.switch_route(3, 4));
    a.unwrap();
    b.unwrap();

    let events = client.transport().events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            "open OUT001FR002",
            "close OUT001FR002",
            "open OUT003FR004",
            "close OUT003FR004",
        ]
    );
}
