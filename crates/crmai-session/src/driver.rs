//! Intent dispatch loop

use crate::events::Intent;
use crate::session::ChatSession;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Feeds UI intents into a [`ChatSession`].
///
/// Each intent runs in its own task so a long reply never blocks a stop or
/// clear request; the session's state machine decides what is accepted.
pub struct SessionDriver {
    session: ChatSession,
    intents: mpsc::Receiver<Intent>,
}

impl SessionDriver {
    /// Create a driver and the sender the UI uses to reach it.
    pub fn new(session: ChatSession, buffer: usize) -> (mpsc::Sender<Intent>, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (
            tx,
            Self {
                session,
                intents: rx,
            },
        )
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    /// Load the initial suggestions, then dispatch intents until `Shutdown`
    /// arrives or every sender is gone. Work still in flight is cancelled.
    pub async fn run(mut self) {
        self.session.load_suggestions().await;
        info!("Session driver started");

        let mut tasks = JoinSet::new();
        loop {
            tokio::select! {
                intent = self.intents.recv() => match intent {
                    Some(Intent::Shutdown) | None => break,
                    Some(intent) => {
                        debug!("Dispatching {:?}", intent);
                        let session = self.session.clone();
                        tasks.spawn(async move { session.handle_intent(intent).await });
                    }
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            warn!("Intent task panicked: {}", e);
                        }
                    }
                }
            }
        }

        tasks.shutdown().await;
        self.session.shutdown();
        info!("Session driver stopped");
    }
}
