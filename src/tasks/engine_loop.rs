//! Engine background task

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::{
    engine::{Clock, Engine, EngineEvent},
    state::Session,
};

/// Background task that owns the engine and feeds it events one at a time.
/// Publishes the session on `session_tx` after every event that changed it.
pub async fn engine_task<C: Clock>(
    mut engine: Engine<C>,
    mut events: mpsc::UnboundedReceiver<EngineEvent>,
    session_tx: watch::Sender<Session>,
) {
    info!("Starting engine task");
    publish(&engine, &session_tx);

    while let Some(event) = events.recv().await {
        match event {
            EngineEvent::Command { command, reply } => {
                let result = engine.execute(command).map(|()| engine.session().clone());
                if let Err(e) = &result {
                    warn!("Command rejected: {}", e);
                }
                if reply.send(result).is_err() {
                    debug!("Caller went away before the reply");
                }
            }
            EngineEvent::Wakeup { token, wakeup } => engine.handle_wakeup(token, wakeup),
            EngineEvent::Shutdown { done } => {
                engine.shutdown();
                publish(&engine, &session_tx);
                let _ = done.send(());
                info!("Engine task stopped");
                return;
            }
        }
        publish(&engine, &session_tx);
    }

    warn!("Engine queue closed, saving and stopping");
    engine.shutdown();
}

fn publish<C: Clock>(engine: &Engine<C>, session_tx: &watch::Sender<Session>) {
    let session = engine.session();
    session_tx.send_if_modified(|current| {
        if current == session {
            false
        } else {
            *current = session.clone();
            true
        }
    });
}
