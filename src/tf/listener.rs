//! Background thread feeding a [`TransformBuffer`] from channels.
//!
//! Producers (drivers, odometry, dataset replay) send [`TfMessage`] batches on
//! the dynamic or the static channel; the listener thread inserts them into the
//! shared buffer, which in turn wakes any blocked lookups.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, select, unbounded};
use tracing::{debug, info, warn};

use crate::msg::TfMessage;

use super::TransformBuffer;

/// How often the thread re-checks the shutdown flag while idle.
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(50);

const DYNAMIC_AUTHORITY: &str = "tf";
const STATIC_AUTHORITY: &str = "tf_static";

pub struct TransformListener {
    buffer: Arc<TransformBuffer>,
    shutdown_requested: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TransformListener {
    /// Spawns the listener thread reading from the given receivers.
    pub fn spawn(
        buffer: Arc<TransformBuffer>,
        dynamic_rx: Receiver<TfMessage>,
        static_rx: Receiver<TfMessage>,
    ) -> Self {
        let shutdown_requested = Arc::new(AtomicBool::new(false));
        let handle = {
            let buffer = Arc::clone(&buffer);
            let shutdown = Arc::clone(&shutdown_requested);
            thread::spawn(move || run(buffer, dynamic_rx, static_rx, shutdown))
        };

        Self {
            buffer,
            shutdown_requested,
            handle: Some(handle),
        }
    }

    /// Creates the channels and the listener in one go.
    ///
    /// Returns `(listener, dynamic_tx, static_tx)`.
    pub fn channel(buffer: Arc<TransformBuffer>) -> (Self, Sender<TfMessage>, Sender<TfMessage>) {
        let (dynamic_tx, dynamic_rx) = unbounded();
        let (static_tx, static_rx) = unbounded();
        (Self::spawn(buffer, dynamic_rx, static_rx), dynamic_tx, static_tx)
    }

    pub fn buffer(&self) -> &Arc<TransformBuffer> {
        &self.buffer
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stops the thread after the batch it is currently handling.
    pub fn shutdown(&mut self) {
        self.shutdown_requested.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("transform listener thread panicked");
            }
        }
    }

    /// Waits until both senders are dropped and all queued messages are
    /// inserted.
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("transform listener thread panicked");
            }
        }
    }
}

impl Drop for TransformListener {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(
    buffer: Arc<TransformBuffer>,
    dynamic_rx: Receiver<TfMessage>,
    static_rx: Receiver<TfMessage>,
    shutdown: Arc<AtomicBool>,
) {
    info!("transform listener started");
    let mut dynamic_open = true;
    let mut static_open = true;
    let never = crossbeam_channel::never();

    while (dynamic_open || static_open) && !shutdown.load(Ordering::SeqCst) {
        // A disconnected receiver would fire forever, swap it for `never`.
        let dyn_rx = if dynamic_open { &dynamic_rx } else { &never };
        let sta_rx = if static_open { &static_rx } else { &never };

        select! {
            recv(dyn_rx) -> msg => match msg {
                Ok(msg) => insert_all(&buffer, msg, false),
                Err(_) => {
                    debug!("dynamic transform channel disconnected");
                    dynamic_open = false;
                }
            },
            recv(sta_rx) -> msg => match msg {
                Ok(msg) => insert_all(&buffer, msg, true),
                Err(_) => {
                    debug!("static transform channel disconnected");
                    static_open = false;
                }
            },
            default(SHUTDOWN_POLL_INTERVAL) => {}
        }
    }
    info!("transform listener stopped");
}

fn insert_all(buffer: &TransformBuffer, msg: TfMessage, is_static: bool) {
    let authority = if is_static {
        STATIC_AUTHORITY
    } else {
        DYNAMIC_AUTHORITY
    };
    for transform in &msg.transforms {
        if let Err(e) = buffer.set_transform(transform, authority, is_static) {
            warn!("{}", e);
        }
    }
}
