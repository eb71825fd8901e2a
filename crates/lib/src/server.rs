//! Game server: turns inbound channel messages into serialized per-player dispatch turns.
//!
//! Each turn loads the player's session, dispatches, and saves the returned session. Turns
//! for different players run concurrently; turns for the same player are serialized by a
//! per-player lock held across load → dispatch → save.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::{JoinError, JoinHandle, JoinSet};

use crate::answer::GameAnswer;
use crate::channels::InboundMessage;
use crate::dispatch::Dispatcher;
use crate::message::PlayerInfo;
use crate::session::{SessionData, SessionRepository};

const DEFAULT_QUEUE_CAPACITY: usize = 64;
const DEFAULT_WORKER_IDLE: Duration = Duration::from_secs(60);

/// Per-player turn locks. An entry lives while some turn for that player holds or awaits it.
#[derive(Default)]
struct TurnLocks {
    inner: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl TurnLocks {
    async fn for_player(&self, key: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.inner.read().await.get(key) {
            return lock.clone();
        }
        self.inner
            .write()
            .await
            .entry(key.to_string())
            .or_default()
            .clone()
    }

    /// Drop the entry for `key` when `lock` is the last handle outside the map.
    async fn release(&self, key: &str, lock: Arc<Mutex<()>>) {
        let mut inner = self.inner.write().await;
        // Handles are only cloned out of the map under the read lock, so the count is stable here.
        if Arc::strong_count(&lock) == 2 {
            inner.remove(key);
        }
    }

    async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}

/// Shared state for processing inbound turns.
pub struct GameServer {
    dispatcher: Arc<Dispatcher>,
    sessions: Arc<dyn SessionRepository>,
    default_locale: String,
    locks: TurnLocks,
    queue_capacity: usize,
    worker_idle: Duration,
}

impl GameServer {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        sessions: Arc<dyn SessionRepository>,
        default_locale: impl Into<String>,
    ) -> Self {
        Self {
            dispatcher,
            sessions,
            default_locale: default_locale.into(),
            locks: TurnLocks::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            worker_idle: DEFAULT_WORKER_IDLE,
        }
    }

    /// Capacity of each player's pending-turn queue in [`run`](Self::run) (minimum 1).
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// How long a player's worker waits for another turn before exiting.
    pub fn with_worker_idle(mut self, idle: Duration) -> Self {
        self.worker_idle = idle;
        self
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Number of players with a turn in progress or waiting.
    pub async fn active_players(&self) -> usize {
        self.locks.len().await
    }

    /// Process one inbound message as a full turn. Returns the answer sent, if any.
    /// The session is saved only when the turn succeeds.
    pub async fn handle_inbound(&self, msg: InboundMessage) -> Result<Option<GameAnswer>> {
        let key = msg.player_key();
        let lock = self.locks.for_player(&key).await;
        let result = {
            let _turn = lock.lock().await;
            self.turn(&key, msg).await
        };
        self.locks.release(&key, lock).await;
        result
    }

    async fn turn(&self, key: &str, msg: InboundMessage) -> Result<Option<GameAnswer>> {
        let session = self
            .sessions
            .load(key)
            .await
            .with_context(|| format!("loading session for {}", key))?
            .unwrap_or_else(|| SessionData::new(key));
        let locale = msg
            .locale
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(&self.default_locale)
            .to_string();
        let player = PlayerInfo::new(key, locale);
        let incoming = msg.to_incoming();

        let outcome = self
            .dispatcher
            .dispatch(&incoming, &player, session)
            .await
            .with_context(|| format!("dispatching turn for {}", key))?;

        let mut session = outcome.session;
        session.touch();
        self.sessions
            .save(&session)
            .await
            .with_context(|| format!("saving session for {}", key))?;
        Ok(outcome.answer)
    }

    /// Consume inbound messages until the sender side closes, then finish every queued turn.
    ///
    /// Each player gets a worker task with a bounded queue; it runs their turns one at a time
    /// in arrival order and exits after [`with_worker_idle`](Self::with_worker_idle) without
    /// work. Players run in parallel. A full player queue stalls intake, which in turn fills
    /// the inbound queue and pushes back on the channel connectors.
    pub fn run(self: Arc<Self>, mut inbound_rx: mpsc::Receiver<InboundMessage>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut workers = Workers::default();
            loop {
                tokio::select! {
                    msg = inbound_rx.recv() => match msg {
                        Some(msg) => self.enqueue(&mut workers, msg).await,
                        None => break,
                    },
                    Some(done) = workers.tasks.join_next(), if !workers.tasks.is_empty() => {
                        workers.reap(done);
                    }
                }
            }
            log::info!("inbound queue closed, finishing {} player queues", workers.queues.len());
            workers.queues.clear();
            while let Some(done) = workers.tasks.join_next().await {
                workers.reap(done);
            }
            log::info!("game server stopped");
        })
    }

    async fn enqueue(self: &Arc<Self>, workers: &mut Workers, msg: InboundMessage) {
        let key = msg.player_key();
        let msg = match workers.queues.get(&key) {
            Some(tx) => match tx.send(msg).await {
                Ok(()) => return,
                Err(mpsc::error::SendError(msg)) => msg,
            },
            None => msg,
        };
        // A closed queue means the worker is idling out; let it finish so turns stay ordered.
        if workers.queues.remove(&key).is_some() {
            workers.wait_for(&key).await;
        }
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        if tx.send(msg).await.is_err() {
            log::warn!("inbound: queue for {} closed before its first turn", key);
            return;
        }
        workers.tasks.spawn(self.clone().player_worker(key.clone(), rx));
        workers.queues.insert(key, tx);
    }

    async fn player_worker(self: Arc<Self>, key: String, mut rx: mpsc::Receiver<InboundMessage>) -> String {
        log::debug!("inbound: worker started for {}", key);
        loop {
            match tokio::time::timeout(self.worker_idle, rx.recv()).await {
                Ok(Some(msg)) => self.worker_turn(&key, msg).await,
                Ok(None) => break,
                Err(_) => {
                    rx.close();
                    while let Some(msg) = rx.recv().await {
                        self.worker_turn(&key, msg).await;
                    }
                    log::debug!("inbound: worker for {} idle, exiting", key);
                    break;
                }
            }
        }
        key
    }

    async fn worker_turn(&self, key: &str, msg: InboundMessage) {
        if let Err(e) = self.handle_inbound(msg).await {
            log::warn!("inbound: turn for {} failed: {:#}", key, e);
        }
    }
}

/// Live player queues and the worker tasks draining them. Each task returns its player key.
#[derive(Default)]
struct Workers {
    queues: HashMap<String, mpsc::Sender<InboundMessage>>,
    tasks: JoinSet<String>,
}

impl Workers {
    fn reap(&mut self, done: Result<String, JoinError>) {
        match done {
            Ok(key) => {
                if self.queues.get(&key).is_some_and(|tx| tx.is_closed()) {
                    self.queues.remove(&key);
                }
            }
            Err(e) => log::warn!("inbound: player worker ended abnormally: {}", e),
        }
    }

    /// Wait until the worker for `key` has exited, reaping any others that finish first.
    async fn wait_for(&mut self, key: &str) {
        while let Some(done) = self.tasks.join_next().await {
            match done {
                Ok(finished) if finished == key => return,
                other => self.reap(other),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn turn_locks_are_shared_per_player() {
        let locks = TurnLocks::default();
        let a1 = locks.for_player("a").await;
        let a2 = locks.for_player("a").await;
        let b = locks.for_player("b").await;
        assert!(Arc::ptr_eq(&a1, &a2));
        assert!(!Arc::ptr_eq(&a1, &b));
        let _held = a1.lock().await;
        assert!(a2.try_lock().is_err());
        assert!(b.try_lock().is_ok());
    }

    #[tokio::test]
    async fn turn_locks_are_released_when_unused() {
        let locks = TurnLocks::default();
        let first = locks.for_player("a").await;
        let waiting = locks.for_player("a").await;
        locks.release("a", first).await;
        assert_eq!(locks.len().await, 1);
        locks.release("a", waiting).await;
        assert_eq!(locks.len().await, 0);
    }
}
