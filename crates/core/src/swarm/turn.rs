//! # Turn Context
//!
//! Collects the events of one user turn. Every emitted event is recorded on
//! the session (applying its delta), kept for the caller, and forwarded to
//! the stream channel when one is attached.

use tokio::sync::mpsc;

use super::events::FlowEvent;
use crate::state::{Session, SessionState};

pub struct TurnContext<'a> {
    session: &'a mut Session,
    emitted: Vec<FlowEvent>,
    event_tx: Option<mpsc::Sender<FlowEvent>>,
}

impl<'a> TurnContext<'a> {
    pub fn new(session: &'a mut Session, event_tx: Option<mpsc::Sender<FlowEvent>>) -> Self {
        Self {
            session,
            emitted: Vec::new(),
            event_tx,
        }
    }

    /// Emit an event
    pub async fn emit(&mut self, event: FlowEvent) {
        self.session.record(event.clone());
        self.emitted.push(event.clone());
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.session.state
    }

    pub fn session(&self) -> &Session {
        &*self.session
    }

    /// Events emitted during this turn, in order
    pub fn finish(self) -> Vec<FlowEvent> {
        self.emitted
    }
}
