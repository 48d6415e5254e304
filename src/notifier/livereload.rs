// src/notifier/livereload.rs

//! Live-reload push channel.
//!
//! Browsers connect over a websocket; after every task completion each
//! connected client receives one JSON message:
//!
//! ```json
//! {"task":"styles","status":"success","paths":["assets/css/app.css"],"error":null}
//! ```
//!
//! Accepting and broadcasting happen on two dedicated threads; `notify`
//! only pushes onto a channel.

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use tungstenite::{Message, WebSocket};

use crate::notifier::Notifier;
use crate::types::{RunOutcome, RunStatus};

/// Connections kept open; older ones are closed first.
const MAX_CLIENTS: usize = 10;

type Clients = Arc<Mutex<Vec<WebSocket<TcpStream>>>>;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReloadMessage {
    pub task: String,
    pub status: RunStatus,
    pub paths: Vec<PathBuf>,
    pub error: Option<String>,
}

impl From<&RunOutcome> for ReloadMessage {
    fn from(outcome: &RunOutcome) -> Self {
        Self {
            task: outcome.task.clone(),
            status: outcome.status,
            paths: outcome.outputs.clone(),
            error: outcome.error.as_ref().map(|e| e.to_string()),
        }
    }
}

pub struct LiveReloadServer {
    addr: SocketAddr,
    tx: Sender<String>,
    clients: Clients,
    _threads: (JoinHandle<()>, JoinHandle<()>),
}

impl std::fmt::Debug for LiveReloadServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveReloadServer")
            .field("addr", &self.addr)
            .finish_non_exhaustive()
    }
}

impl LiveReloadServer {
    /// Listen on `addr`, or on an ephemeral port of the same host when
    /// `addr` is taken.
    pub fn start(addr: &str) -> Result<Self> {
        let listener = reserve(addr)?;
        let addr = listener.local_addr().context("reading live-reload address")?;
        let clients: Clients = Arc::new(Mutex::new(Vec::new()));

        let incoming = spawn_incoming(listener, Arc::clone(&clients));
        let (tx, outgoing) = spawn_broadcast(Arc::clone(&clients));

        info!(%addr, "live-reload server listening");
        Ok(Self {
            addr,
            tx,
            clients,
            _threads: (incoming, outgoing),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn client_count(&self) -> usize {
        lock(&self.clients).len()
    }
}

impl Notifier for LiveReloadServer {
    fn notify(&self, outcome: &RunOutcome) -> Result<()> {
        let payload = serde_json::to_string(&ReloadMessage::from(outcome))?;
        self.tx
            .send(payload)
            .map_err(|_| anyhow!("live-reload broadcast thread has stopped"))
    }
}

fn reserve(addr: &str) -> Result<TcpListener> {
    match TcpListener::bind(addr) {
        Ok(sock) => Ok(sock),
        Err(e) => {
            let host = addr.rsplit_once(':').map(|(h, _)| h).unwrap_or("127.0.0.1");
            warn!(%addr, error = %e, "live-reload address busy; using an ephemeral port");
            TcpListener::bind((host, 0))
                .with_context(|| format!("binding live-reload server on {host}"))
        }
    }
}

fn lock(clients: &Clients) -> MutexGuard<'_, Vec<WebSocket<TcpStream>>> {
    clients.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn spawn_incoming(server: TcpListener, clients: Clients) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for stream in server.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(error = %e, "live-reload accept failed");
                    continue;
                }
            };
            match tungstenite::accept(stream) {
                Ok(socket) => {
                    debug!("live-reload client connected");
                    lock(&clients).push(socket);
                }
                Err(e) => warn!(error = %e, "live-reload handshake failed"),
            }
        }
    })
}

fn spawn_broadcast(clients: Clients) -> (Sender<String>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel::<String>();

    let thread = std::thread::spawn(move || {
        while let Ok(payload) = rx.recv() {
            let mut clients = lock(&clients);
            let mut broken = vec![];

            for (i, socket) in clients.iter_mut().enumerate() {
                match socket.send(Message::text(payload.clone())) {
                    Ok(_) => {}
                    Err(tungstenite::Error::Io(e)) => {
                        debug!(error = %e, "dropping live-reload client");
                        broken.push(i);
                    }
                    Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                        broken.push(i);
                    }
                    Err(e) => {
                        error!(error = ?e, "live-reload send failed");
                    }
                }
            }

            for i in broken.into_iter().rev() {
                clients.remove(i);
            }

            let len = clients.len();
            if len > MAX_CLIENTS {
                for mut socket in clients.drain(0..len - MAX_CLIENTS) {
                    socket.close(None).ok();
                }
            }
        }
    });

    (tx, thread)
}
