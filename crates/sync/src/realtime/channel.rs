//! Realtime channel lifecycle: subscribe, per-stream reader tasks, and the
//! reconnect-with-backoff loop.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use futures::StreamExt;
use log::{debug, warn};
use tokio::sync::{watch, Mutex as TokioMutex};
use tokio::task::JoinHandle;

use hearth_core::errors::{Error, Result};
use hearth_core::remote::{
    AuthSession, ChannelStatus, ChannelStreams, RealtimeChannel, RealtimeTransport,
};
use hearth_core::retry::{self, MAX_RETRIES};
use hearth_core::tables::CORE_TABLES;

use super::{broadcast, handle_row_change};
use crate::handlers::SyncCx;
use crate::status::ConnectionState;

/// Topic of the row-change channel.
const CHANNEL_TOPIC: &str = "crm-changes";

pub(crate) struct ChannelManager {
    transport: Arc<dyn RealtimeTransport>,
    cx: SyncCx,
    auth: Arc<dyn AuthSession>,
    /// Test mode skips real sleeps in the retry loop.
    test_mode: bool,
    listening: AtomicBool,
    retry_attempt: AtomicU32,
    connection_tx: watch::Sender<ConnectionState>,
    channel: TokioMutex<Option<Box<dyn RealtimeChannel>>>,
    reader_tasks: StdMutex<Vec<JoinHandle<()>>>,
    retry_task: StdMutex<Option<JoinHandle<()>>>,
}

impl ChannelManager {
    pub(crate) fn new(
        transport: Arc<dyn RealtimeTransport>,
        cx: SyncCx,
        auth: Arc<dyn AuthSession>,
        test_mode: bool,
    ) -> Self {
        let (connection_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            transport,
            cx,
            auth,
            test_mode,
            listening: AtomicBool::new(false),
            retry_attempt: AtomicU32::new(0),
            connection_tx,
            channel: TokioMutex::new(None),
            reader_tasks: StdMutex::new(Vec::new()),
            retry_task: StdMutex::new(None),
        }
    }

    pub(crate) fn connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection_tx.subscribe()
    }

    pub(crate) fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    /// Open the subscription and spawn its readers. Failures enter the retry
    /// loop rather than surfacing to the caller.
    pub(crate) async fn start_listening(self: &Arc<Self>) {
        // set before the subscribe await so a concurrent stop is observed
        if self.listening.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(err) = self.open_channel().await {
            warn!("[Sync] Realtime subscribe failed: {}", err);
            self.clear_channel().await;
            self.spawn_retry_loop(1);
        }
    }

    /// Cancel retries, tear the subscription down, and await reader
    /// quiescence.
    pub(crate) async fn stop_listening(&self) {
        self.listening.store(false, Ordering::SeqCst);

        if let Some(handle) = self.take_retry_task() {
            handle.abort();
            let _ = handle.await;
        }
        let readers = self.drain_readers();
        for handle in &readers {
            handle.abort();
        }
        for handle in readers {
            let _ = handle.await;
        }

        self.clear_channel().await;
        self.connection_tx.send_replace(ConnectionState::Disconnected);
    }

    /// Cancel any backoff loop, zero the attempt counter, and try a fresh
    /// subscribe immediately.
    pub(crate) async fn reset_and_reconnect(self: &Arc<Self>) {
        if let Some(handle) = self.take_retry_task() {
            handle.abort();
            let _ = handle.await;
        }
        self.retry_attempt.store(0, Ordering::SeqCst);

        let readers = self.drain_readers();
        for handle in &readers {
            handle.abort();
        }
        for handle in readers {
            let _ = handle.await;
        }
        self.clear_channel().await;

        self.listening.store(true, Ordering::SeqCst);
        if let Err(err) = self.open_channel().await {
            warn!("[Sync] Reconnect subscribe failed: {}", err);
            self.clear_channel().await;
            self.spawn_retry_loop(1);
        }
    }

    async fn open_channel(self: &Arc<Self>) -> Result<()> {
        let mut channel = self.transport.subscribe(CHANNEL_TOPIC, &CORE_TABLES).await?;

        // a stop raced the subscribe; undo it
        if !self.listening.load(Ordering::SeqCst) {
            let _ = channel.unsubscribe().await;
            return Ok(());
        }

        let streams = channel
            .take_streams()
            .ok_or_else(|| Error::Channel("channel produced no streams".to_string()))?;
        *self.channel.lock().await = Some(channel);
        self.spawn_readers(streams);

        self.retry_attempt.store(0, Ordering::SeqCst);
        self.connection_tx.send_replace(ConnectionState::Connected);
        debug!("[Sync] Realtime channel subscribed");
        Ok(())
    }

    fn spawn_readers(&self, streams: ChannelStreams) {
        let mut tasks = Vec::new();

        for mut stream in streams.row_changes {
            let cx = self.cx.clone();
            tasks.push(tokio::spawn(async move {
                while let Some(change) = stream.next().await {
                    handle_row_change(&cx, change);
                }
            }));
        }

        let cx = self.cx.clone();
        let auth = Arc::clone(&self.auth);
        let mut broadcasts = streams.broadcasts;
        tasks.push(tokio::spawn(async move {
            while let Some(message) = broadcasts.next().await {
                broadcast::handle_broadcast(&cx, auth.current_user_id(), message);
            }
        }));

        let connection_tx = self.connection_tx.clone();
        let mut status = streams.status;
        tasks.push(tokio::spawn(async move {
            while let Some(event) = status.next().await {
                match event {
                    ChannelStatus::Subscribed => {
                        connection_tx.send_replace(ConnectionState::Connected);
                    }
                    ChannelStatus::Closed => {
                        connection_tx.send_replace(ConnectionState::Disconnected);
                    }
                    ChannelStatus::ChannelError(message) => {
                        warn!("[Sync] Realtime channel error: {}", message);
                        connection_tx.send_replace(ConnectionState::Disconnected);
                    }
                }
            }
        }));

        self.reader_tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(tasks);
    }

    fn spawn_retry_loop(self: &Arc<Self>, first_attempt: u32) {
        let manager = Arc::clone(self);
        let max = MAX_RETRIES as u32;
        let handle = tokio::spawn(async move {
            let mut attempt = first_attempt.max(1);
            loop {
                if !manager.listening.load(Ordering::SeqCst) {
                    break;
                }

                if attempt <= max {
                    manager
                        .connection_tx
                        .send_replace(ConnectionState::Reconnecting { attempt, max });
                } else if attempt == max + 1 {
                    warn!(
                        "[Sync] Realtime reconnect budget exhausted after {} attempts; degraded",
                        max
                    );
                    manager.connection_tx.send_replace(ConnectionState::Degraded);
                }
                manager.retry_attempt.store(attempt, Ordering::SeqCst);

                let delay = retry::delay(attempt.saturating_sub(1));
                if manager.test_mode {
                    tokio::task::yield_now().await;
                } else {
                    tokio::time::sleep(delay).await;
                }
                if !manager.listening.load(Ordering::SeqCst) {
                    break;
                }

                match manager.open_channel().await {
                    Ok(()) => break,
                    Err(err) => {
                        debug!("[Sync] Reconnect attempt {} failed: {}", attempt, err);
                        manager.clear_channel().await;
                        attempt += 1;
                    }
                }
            }
        });
        *self
            .retry_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    async fn clear_channel(&self) {
        if let Some(mut channel) = self.channel.lock().await.take() {
            if let Err(err) = channel.unsubscribe().await {
                debug!("[Sync] Unsubscribe failed: {}", err);
            }
        }
    }

    fn take_retry_task(&self) -> Option<JoinHandle<()>> {
        self.retry_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn drain_readers(&self) -> Vec<JoinHandle<()>> {
        std::mem::take(
            &mut *self
                .reader_tasks
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }
}
