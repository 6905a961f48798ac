//! Live progress fan-out.
//!
//! Each project gets its own actor task owning its subscriber set; every
//! interaction is a message to that actor, so no call site ever touches a
//! shared subscriber map. Delivery is best-effort and unbuffered: a
//! subscriber connecting mid-run sees only future events, and closed
//! subscribers are pruned on the next publish.

use crate::models::TaskStage;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// A progress update pushed to subscribers of a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub task_id: Uuid,
    pub stage: TaskStage,
    /// Overall progress in [0, 1] across all stages.
    pub progress: f64,
    pub message: String,
    pub current_scene: Option<usize>,
    pub total_scenes: usize,
}

enum Command {
    Subscribe(mpsc::UnboundedSender<ProgressEvent>),
    Publish(ProgressEvent),
}

async fn project_actor(project_id: Uuid, mut rx: mpsc::UnboundedReceiver<Command>) {
    let mut subscribers: Vec<mpsc::UnboundedSender<ProgressEvent>> = Vec::new();

    while let Some(command) = rx.recv().await {
        match command {
            Command::Subscribe(tx) => subscribers.push(tx),
            Command::Publish(event) => {
                subscribers.retain(|tx| tx.send(event.clone()).is_ok());
            }
        }
    }

    debug!("Progress actor for project {project_id} stopped");
}

/// Handle for publishing and subscribing to per-project progress streams.
#[derive(Default)]
pub struct ProgressHub {
    actors: Mutex<HashMap<Uuid, mpsc::UnboundedSender<Command>>>,
}

impl ProgressHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn actor(&self, project_id: Uuid) -> mpsc::UnboundedSender<Command> {
        let mut actors = self.actors.lock();

        if let Some(tx) = actors.get(&project_id) {
            if !tx.is_closed() {
                return tx.clone();
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(project_actor(project_id, rx));
        actors.insert(project_id, tx.clone());
        tx
    }

    /// Subscribe to a project's live events from this point on.
    pub fn subscribe(&self, project_id: Uuid) -> mpsc::UnboundedReceiver<ProgressEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = self.actor(project_id).send(Command::Subscribe(tx));
        rx
    }

    /// Push an event to every current subscriber of the project.
    pub fn publish(&self, project_id: Uuid, event: ProgressEvent) {
        let _ = self.actor(project_id).send(Command::Publish(event));
    }
}
