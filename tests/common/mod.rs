//! Shared utilities for integration tests.
//!
//! Provides an in-process bloomd stand-in speaking the newline-delimited
//! text protocol over an in-memory filter table, with hooks for the fault
//! modes the client must survive: chunked block writes, rejected creates,
//! injected internal errors, and servers that never answer.
#![allow(
    dead_code,
    reason = "helpers are shared across test binaries with different usage"
)]

use std::{
    collections::{BTreeMap, HashSet},
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream, tcp::OwnedWriteHalf},
    task::JoinHandle,
};

pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Fault-injection knobs for [`MockBloomd`].
#[derive(Clone, Debug, Default)]
pub struct ServerOptions {
    /// Creates asking for a capacity below this are rejected with
    /// `Client Error: Bad arguments`. Zero accepts anything.
    pub min_capacity: u64,
    /// Write each response in chunks of this many bytes, yielding between
    /// chunks, to exercise frame reassembly.
    pub chunk: Option<usize>,
    /// Answer this many commands with `Internal Error` before behaving.
    pub internal_errors: usize,
    /// Read requests but never respond.
    pub stall: bool,
}

#[derive(Debug, Default)]
struct Filter {
    probability: f64,
    capacity: u64,
    keys: HashSet<String>,
}

struct Shared {
    options: ServerOptions,
    filters: Mutex<BTreeMap<String, Filter>>,
    log: Mutex<Vec<String>>,
    internal_errors: AtomicUsize,
}

/// An in-process bloomd stand-in bound to an ephemeral (or caller-chosen)
/// local port.
pub struct MockBloomd {
    addr: SocketAddr,
    shared: Arc<Shared>,
    accept_task: JoinHandle<()>,
}

impl MockBloomd {
    pub async fn start() -> TestResult<Self> {
        Self::start_with(ServerOptions::default()).await
    }

    pub async fn start_with(options: ServerOptions) -> TestResult<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        Self::serve(listener, options)
    }

    /// Bind a specific port, for servers that come up after the client.
    pub async fn start_on(port: u16, options: ServerOptions) -> TestResult<Self> {
        let listener = TcpListener::bind(("127.0.0.1", port)).await?;
        Self::serve(listener, options)
    }

    fn serve(listener: TcpListener, options: ServerOptions) -> TestResult<Self> {
        let addr = listener.local_addr()?;
        let shared = Arc::new(Shared {
            internal_errors: AtomicUsize::new(options.internal_errors),
            options,
            filters: Mutex::new(BTreeMap::new()),
            log: Mutex::new(Vec::new()),
        });
        let accept_shared = Arc::clone(&shared);
        let accept_task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let shared = Arc::clone(&accept_shared);
                tokio::spawn(async move {
                    let _ = serve_connection(stream, shared).await;
                });
            }
        });
        Ok(Self {
            addr,
            shared,
            accept_task,
        })
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Request lines in arrival order, across all connections.
    pub fn log(&self) -> Vec<String> {
        self.shared.log.lock().expect("log poisoned").clone()
    }

    /// Stop accepting; established connections die with the task.
    pub fn stop(&self) {
        self.accept_task.abort();
    }
}

impl Drop for MockBloomd {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

/// Reserve an ephemeral port that is free right now.
pub async fn free_port() -> TestResult<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    Ok(listener.local_addr()?.port())
}

async fn serve_connection(stream: TcpStream, shared: Arc<Shared>) -> std::io::Result<()> {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    while let Some(line) = lines.next_line().await? {
        shared.log.lock().expect("log poisoned").push(line.clone());
        if shared.options.stall {
            continue;
        }
        let response = respond(&line, &shared);
        send(&mut write, &response, shared.options.chunk).await?;
    }
    Ok(())
}

async fn send(
    write: &mut OwnedWriteHalf,
    response: &str,
    chunk: Option<usize>,
) -> std::io::Result<()> {
    match chunk {
        Some(size) => {
            for piece in response.as_bytes().chunks(size.max(1)) {
                write.write_all(piece).await?;
                write.flush().await?;
                tokio::task::yield_now().await;
            }
        }
        None => write.write_all(response.as_bytes()).await?,
    }
    Ok(())
}

fn block(lines: &[String]) -> String {
    let mut out = String::from("START\n");
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str("END\n");
    out
}

fn respond(line: &str, shared: &Shared) -> String {
    if shared
        .internal_errors
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
    {
        return "Internal Error\n".to_string();
    }

    let mut parts = line.split_whitespace();
    let verb = parts.next().unwrap_or_default();
    let args: Vec<&str> = parts.collect();
    let mut filters = shared.filters.lock().expect("filters poisoned");

    match (verb, args.as_slice()) {
        ("create", [name, options @ ..]) => {
            if filters.contains_key(*name) {
                return "Exists\n".to_string();
            }
            let mut filter = Filter {
                probability: 0.001,
                capacity: 100_000,
                keys: HashSet::new(),
            };
            for option in options {
                match option.split_once('=') {
                    Some(("capacity", value)) => {
                        filter.capacity = value.parse().unwrap_or_default();
                    }
                    Some(("prob", value)) => {
                        filter.probability = value.parse().unwrap_or_default();
                    }
                    Some((_, _)) => {}
                    None => return "Client Error: Bad arguments\n".to_string(),
                }
            }
            if shared.options.min_capacity != 0 && filter.capacity < shared.options.min_capacity {
                return "Client Error: Bad arguments\n".to_string();
            }
            filters.insert((*name).to_string(), filter);
            "Done\n".to_string()
        }
        ("list", rest) => {
            let prefix = rest.first().copied().unwrap_or_default();
            let rows: Vec<String> = filters
                .iter()
                .filter(|(name, _)| name.starts_with(prefix))
                .map(|(name, filter)| {
                    format!(
                        "{name} {} {} {} {}",
                        filter.probability,
                        filter.keys.len() * 8 + 1024,
                        filter.capacity,
                        filter.keys.len()
                    )
                })
                .collect();
            block(&rows)
        }
        ("drop", [name]) => {
            if filters.remove(*name).is_some() {
                "Done\n".to_string()
            } else {
                "Filter does not exist\n".to_string()
            }
        }
        ("close" | "clear", [name]) => {
            if filters.contains_key(*name) {
                "Done\n".to_string()
            } else {
                "Filter does not exist\n".to_string()
            }
        }
        ("flush", _) => "Done\n".to_string(),
        ("set", [name, key]) => match filters.get_mut(*name) {
            Some(filter) => yes_no(filter.keys.insert((*key).to_string())),
            None => "Filter does not exist\n".to_string(),
        },
        ("check", [name, key]) => match filters.get(*name) {
            Some(filter) => yes_no(filter.keys.contains(*key)),
            None => "Filter does not exist\n".to_string(),
        },
        ("bulk", [name, keys @ ..]) if !keys.is_empty() => match filters.get_mut(*name) {
            Some(filter) => {
                let answers: Vec<&str> = keys
                    .iter()
                    .map(|key| {
                        if filter.keys.insert((*key).to_string()) {
                            "Yes"
                        } else {
                            "No"
                        }
                    })
                    .collect();
                format!("{}\n", answers.join(" "))
            }
            None => "Filter does not exist\n".to_string(),
        },
        ("multi", [name, keys @ ..]) if !keys.is_empty() => match filters.get(*name) {
            Some(filter) => {
                let answers: Vec<&str> = keys
                    .iter()
                    .map(|key| if filter.keys.contains(*key) { "Yes" } else { "No" })
                    .collect();
                format!("{}\n", answers.join(" "))
            }
            None => "Filter does not exist\n".to_string(),
        },
        ("info", [name]) => match filters.get(*name) {
            Some(filter) => block(&[
                format!("capacity {}", filter.capacity),
                "checks 0".to_string(),
                "check_hits 0".to_string(),
                "check_misses 0".to_string(),
                "in_memory 1".to_string(),
                "page_ins 0".to_string(),
                "page_outs 0".to_string(),
                format!("probability {}", filter.probability),
                "sets 0".to_string(),
                "set_hits 0".to_string(),
                "set_misses 0".to_string(),
                format!("size {}", filter.keys.len()),
                format!("storage {}", filter.keys.len() * 8 + 1024),
            ]),
            None => "Filter does not exist\n".to_string(),
        },
        _ => "Client Error: Command not supported\n".to_string(),
    }
}

fn yes_no(value: bool) -> String {
    if value { "Yes\n" } else { "No\n" }.to_string()
}
