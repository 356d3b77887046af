//! Scripted mock marking machine for integration tests
//!
//! Listens on a random localhost port, reads CR-terminated commands and
//! answers with CRLF-terminated lines the way the machine does.

#![allow(dead_code)]

use gravokit_communication::ConnectionSettings;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Files reported by `LS` without a mask
pub const FILES: [&str; 3] = ["FILE1.T2L", "FILE2.T2L", "TEST.T2L"];

#[derive(Debug, Clone, Default)]
pub struct MockOptions {
    /// The first N connections read commands but never reply
    pub silent_connections: usize,
    /// Pause between the progress line and the terminal line of `GO`
    pub marking_delay: Duration,
    /// Answer `GO` with `ER 2 32` instead of running a cycle
    pub refuse_marking: bool,
}

#[derive(Debug, Default)]
struct Shared {
    options: MockOptions,
    connections: AtomicUsize,
    commands: Mutex<Vec<String>>,
    events: Mutex<Vec<String>>,
}

pub struct MockMachine {
    addr: SocketAddr,
    shared: Arc<Shared>,
    handle: JoinHandle<()>,
}

impl MockMachine {
    pub async fn start() -> Self {
        Self::start_with(MockOptions::default()).await
    }

    pub async fn start_with(options: MockOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock machine");
        let addr = listener.local_addr().expect("mock address");
        let shared = Arc::new(Shared {
            options,
            ..Default::default()
        });

        let handle = {
            let shared = Arc::clone(&shared);
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let index = shared.connections.fetch_add(1, Ordering::SeqCst);
                    let silent = index < shared.options.silent_connections;
                    tokio::spawn(serve(stream, Arc::clone(&shared), silent));
                }
            })
        };

        Self {
            addr,
            shared,
            handle,
        }
    }

    /// Client settings pointing at this mock with short timeouts
    pub fn settings(&self) -> ConnectionSettings {
        ConnectionSettings::new(self.addr.ip().to_string(), self.addr.port())
            .with_connect_timeout(Duration::from_secs(2))
            .with_timeout(Some(Duration::from_secs(2)))
            .with_reconnect(3, Duration::from_millis(10))
    }

    pub fn connections(&self) -> usize {
        self.shared.connections.load(Ordering::SeqCst)
    }

    /// Every command received, CR stripped, across all connections
    pub fn commands(&self) -> Vec<String> {
        self.shared.commands.lock().clone()
    }

    /// `recv <cmd>` and `sent <line>` entries in wire order
    pub fn events(&self) -> Vec<String> {
        self.shared.events.lock().clone()
    }
}

impl Drop for MockMachine {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve(stream: TcpStream, shared: Arc<Shared>, silent: bool) {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\r', &mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let command = String::from_utf8_lossy(&buf).trim().to_string();
        if command.is_empty() {
            continue;
        }
        shared.commands.lock().push(command.clone());
        shared.events.lock().push(format!("recv {}", command));

        if silent {
            continue;
        }
        if command == "QUIT" {
            return;
        }

        let keyword = command.split_whitespace().next().unwrap_or_default();
        if keyword == "GO" && shared.options.refuse_marking {
            if send(&mut writer, &shared, "ER 2 32").await.is_err() {
                return;
            }
            continue;
        }
        if keyword == "GO" {
            for line in ["GO M", "GO 50%"] {
                if send(&mut writer, &shared, line).await.is_err() {
                    return;
                }
            }
            tokio::time::sleep(shared.options.marking_delay).await;
            if send(&mut writer, &shared, "GO F").await.is_err() {
                return;
            }
            continue;
        }

        for line in reply(&command) {
            if send(&mut writer, &shared, &line).await.is_err() {
                return;
            }
        }
    }
}

async fn send(
    writer: &mut tokio::net::tcp::OwnedWriteHalf,
    shared: &Shared,
    line: &str,
) -> std::io::Result<()> {
    shared.events.lock().push(format!("sent {}", line));
    writer.write_all(format!("{}\r\n", line).as_bytes()).await?;
    writer.flush().await
}

fn reply(command: &str) -> Vec<String> {
    let mut fields = command.splitn(2, ' ');
    let keyword = fields.next().unwrap_or_default();
    let args = fields.next().unwrap_or_default();

    let single = |line: &str| vec![line.to_string()];
    match keyword {
        "ST" => single("ST 4 0 0"),
        "AD" => single("ER 3 5"),
        "AM" => single("AM 1"),
        "GP" => single("GP \"MASTER\":\"1\""),
        "SP" => single("SP 1"),
        "LD" if args.starts_with("\"missing") => single("ER 1 5"),
        "LD" => single("LD 1"),
        "PF" => single("PF 1"),
        "RM" => single("RM 1"),
        "VG" => single(&format!("VG {} \"HELLO\"", args)),
        "VS" => single("VS 1"),
        "LS" => match args {
            "" => {
                let mut lines = vec![FILES.len().to_string()];
                lines.extend(FILES.iter().map(|f| f.to_string()));
                lines
            }
            "*.NONE" => single("0"),
            "BAD" => single("ER 1 7"),
            mask => {
                let suffix = mask.trim_start_matches('*');
                let matching: Vec<String> = FILES
                    .iter()
                    .filter(|f| f.ends_with(suffix))
                    .map(|f| f.to_string())
                    .collect();
                let mut lines = vec![matching.len().to_string()];
                lines.extend(matching);
                lines
            }
        },
        _ => single("ER 1 1"),
    }
}
