//! Player-process transport.
//!
//! Each stream is piped into a fresh player process (`ffplay`-compatible,
//! reading from stdin). The process exit status drives the end-of-stream
//! signal; a forced stop kills the process and reports `stopped_externally`.
//! Pausing holds back stdin so the player drains its buffer and waits.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStdin, Command};
use tokio::sync::{oneshot, watch};

use playqueue_core::{StreamHandle, Transport, TransportError, TransportFactory, TransportSignals};

use crate::config::PlayerSettings;

const COPY_CHUNK: usize = 16 * 1024;

pub struct PlayerTransportFactory {
    settings: PlayerSettings,
}

impl PlayerTransportFactory {
    pub fn new(settings: PlayerSettings) -> Self {
        Self { settings }
    }
}

impl TransportFactory for PlayerTransportFactory {
    fn connect(&self, session_id: &str) -> Result<Arc<dyn Transport>, TransportError> {
        tracing::info!(session_id = %session_id, program = %self.settings.program, "player transport ready");
        Ok(Arc::new(PlayerTransport::new(session_id, self.settings.clone())))
    }
}

struct Playback {
    id: u64,
    kill: Option<oneshot::Sender<()>>,
    paused: watch::Sender<bool>,
}

#[derive(Default)]
struct PlayerSlot {
    current: Option<Playback>,
}

pub struct PlayerTransport {
    session_id: String,
    settings: PlayerSettings,
    slot: Arc<Mutex<PlayerSlot>>,
    next_id: AtomicU64,
    destroyed: AtomicBool,
}

enum Exit {
    Killed,
    Finished(std::io::Result<std::process::ExitStatus>),
}

impl PlayerTransport {
    pub fn new(session_id: impl Into<String>, settings: PlayerSettings) -> Self {
        Self {
            session_id: session_id.into(),
            settings,
            slot: Arc::new(Mutex::new(PlayerSlot::default())),
            next_id: AtomicU64::new(1),
            destroyed: AtomicBool::new(false),
        }
    }

    fn kill_current(&self) -> bool {
        let mut slot = self.slot.lock().unwrap_or_else(|err| err.into_inner());
        match slot.current.take() {
            Some(mut playback) => {
                if let Some(kill) = playback.kill.take() {
                    let _ = kill.send(());
                }
                true
            }
            None => false,
        }
    }
}

impl Transport for PlayerTransport {
    fn play(&self, stream: StreamHandle, signals: TransportSignals) -> Result<(), TransportError> {
        if self.is_destroyed() {
            return Err(TransportError::Offline);
        }
        self.kill_current();

        let mut child = Command::new(&self.settings.program)
            .args(&self.settings.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                TransportError::Failed(format!("spawn {}: {err}", self.settings.program))
            })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::Failed("player stdin not captured".to_string()))?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (kill_tx, kill_rx) = oneshot::channel();
        let (paused_tx, paused_rx) = watch::channel(false);
        {
            let mut slot = self.slot.lock().unwrap_or_else(|err| err.into_inner());
            slot.current = Some(Playback {
                id,
                kill: Some(kill_tx),
                paused: paused_tx,
            });
        }

        let label = stream.label().to_string();
        tracing::debug!(session_id = %self.session_id, title = %label, "player started");
        let session_id = self.session_id.clone();
        let slot = self.slot.clone();
        tokio::spawn(async move {
            let (reader, guard) = stream.into_parts();
            let feeder = tokio::spawn(feed_stdin(reader, stdin, paused_rx));

            let exit = tokio::select! {
                _ = kill_rx => Exit::Killed,
                status = child.wait() => Exit::Finished(status),
            };
            feeder.abort();
            drop(guard);

            {
                let mut slot = slot.lock().unwrap_or_else(|err| err.into_inner());
                if slot.current.as_ref().is_some_and(|p| p.id == id) {
                    slot.current = None;
                }
            }

            match exit {
                Exit::Killed => {
                    let _ = child.kill().await;
                    tracing::debug!(session_id = %session_id, title = %label, "player killed");
                    signals.stopped_externally();
                }
                Exit::Finished(Ok(status)) if status.success() => {
                    tracing::debug!(session_id = %session_id, title = %label, "player finished");
                    signals.finished();
                }
                Exit::Finished(Ok(status)) => {
                    signals.error(format!("player exited with {status}"));
                }
                Exit::Finished(Err(err)) => {
                    signals.error(format!("wait for player: {err}"));
                }
            }
        });
        Ok(())
    }

    fn force_stop(&self) -> Result<(), TransportError> {
        self.kill_current();
        Ok(())
    }

    fn pause_toggle(&self) -> Result<bool, TransportError> {
        let slot = self.slot.lock().unwrap_or_else(|err| err.into_inner());
        let Some(playback) = slot.current.as_ref() else {
            return Err(TransportError::Failed("nothing is playing".to_string()));
        };
        let paused = !*playback.paused.borrow();
        playback.paused.send_replace(paused);
        Ok(paused)
    }

    fn disconnect(&self) {
        if !self.destroyed.swap(true, Ordering::SeqCst) {
            self.kill_current();
            tracing::info!(session_id = %self.session_id, "player transport disconnected");
        }
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}

/// Copy the stream into the player, holding back while paused.
async fn feed_stdin(
    mut reader: std::pin::Pin<Box<dyn tokio::io::AsyncRead + Send>>,
    mut stdin: ChildStdin,
    mut paused: watch::Receiver<bool>,
) {
    let mut buf = vec![0u8; COPY_CHUNK];
    loop {
        if paused.wait_for(|p| !*p).await.is_err() {
            return;
        }
        let n = match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        if stdin.write_all(&buf[..n]).await.is_err() {
            return;
        }
    }
    // Closing stdin tells the player the stream is complete.
    let _ = stdin.shutdown().await;
}
