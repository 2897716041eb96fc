//! Per-session actor.
//!
//! Each session runs one task that owns its [`CascadeController`]. Commands
//! from HTTP handlers and fetch completions from the catalog are interleaved
//! through a single `select!`, so the controller never needs a lock.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};

use crate::catalog::CatalogGateway;
use crate::decision::links::PartLinkResolver;
use crate::error::{SelectionError, SessionError};
use crate::fetch::FetchCompletion;
use crate::selection::{CascadeController, FieldUpdate};
use crate::session::SessionView;

const COMMAND_BUFFER: usize = 32;

#[derive(Debug)]
enum Command {
    Update {
        update: FieldUpdate,
        reply: oneshot::Sender<Result<SessionView, SelectionError>>,
    },
    ClearAll {
        reply: oneshot::Sender<SessionView>,
    },
    View {
        wait_idle: bool,
        reply: oneshot::Sender<SessionView>,
    },
}

/// Shared read-only collaborators of every session.
#[derive(Debug, Clone)]
pub struct SessionDeps {
    pub gateway: Arc<dyn CatalogGateway>,
    pub links: Arc<dyn PartLinkResolver>,
    pub support_phone: String,
}

/// Cloneable handle to a running session actor.
///
/// The actor stops once every handle is dropped.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: String,
    commands: mpsc::Sender<Command>,
    last_activity: Arc<RwLock<DateTime<Utc>>>,
}

impl SessionHandle {
    /// Spawn an actor and issue its initial years fetch.
    pub fn spawn(id: String, deps: SessionDeps) -> Self {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();

        let actor = SessionActor {
            id: id.clone(),
            controller: CascadeController::new(Arc::clone(&deps.gateway), completions_tx),
            commands: commands_rx,
            completions: completions_rx,
            deps,
            idle_waiters: Vec::new(),
        };
        tokio::spawn(actor.run());

        Self {
            id,
            commands: commands_tx,
            last_activity: Arc::new(RwLock::new(Utc::now())),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn set_field(&self, update: FieldUpdate) -> Result<SessionView, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Update { update, reply }).await?;
        Ok(rx.await.map_err(|_| SessionError::Closed)??)
    }

    pub async fn clear_all(&self) -> Result<SessionView, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ClearAll { reply }).await?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Current view, including any fetches still in progress.
    pub async fn view(&self) -> Result<SessionView, SessionError> {
        self.request_view(false).await
    }

    /// View once no category is loading.
    pub async fn view_when_idle(&self) -> Result<SessionView, SessionError> {
        self.request_view(true).await
    }

    async fn request_view(&self, wait_idle: bool) -> Result<SessionView, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::View { wait_idle, reply }).await?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    async fn send(&self, command: Command) -> Result<(), SessionError> {
        self.touch();
        self.commands
            .send(command)
            .await
            .map_err(|_| SessionError::Closed)
    }

    fn touch(&self) {
        let mut guard = self
            .last_activity
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = Utc::now();
    }

    /// Time since the last command was sent.
    #[must_use]
    pub fn idle_for(&self) -> Duration {
        let last = *self
            .last_activity
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        (Utc::now() - last).to_std().unwrap_or(Duration::ZERO)
    }
}

struct SessionActor {
    id: String,
    controller: CascadeController,
    commands: mpsc::Receiver<Command>,
    completions: mpsc::UnboundedReceiver<FetchCompletion>,
    deps: SessionDeps,
    idle_waiters: Vec<oneshot::Sender<SessionView>>,
}

impl SessionActor {
    async fn run(mut self) {
        tracing::debug!(session_id = %self.id, "Session actor started");
        self.controller.start();

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    let Some(command) = command else { break };
                    self.handle(command);
                }
                Some(completion) = self.completions.recv() => {
                    self.controller.apply_completion(completion);
                }
            }
            self.release_idle_waiters();
        }

        tracing::debug!(session_id = %self.id, "Session actor stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Update { update, reply } => {
                let result = self.controller.set_field(update).map(|()| self.view());
                if let Err(e) = &result {
                    tracing::debug!(session_id = %self.id, error = %e, "Rejected selection change");
                }
                let _ = reply.send(result);
            }
            Command::ClearAll { reply } => {
                self.controller.clear_all();
                let _ = reply.send(self.view());
            }
            Command::View { wait_idle, reply } => {
                if wait_idle && self.controller.loading().any() {
                    self.idle_waiters.push(reply);
                } else {
                    let _ = reply.send(self.view());
                }
            }
        }
    }

    fn release_idle_waiters(&mut self) {
        if self.idle_waiters.is_empty() || self.controller.loading().any() {
            return;
        }
        let view = self.view();
        for waiter in self.idle_waiters.drain(..) {
            let _ = waiter.send(view.clone());
        }
    }

    fn view(&self) -> SessionView {
        SessionView::build(
            &self.id,
            &self.controller,
            self.deps.links.as_ref(),
            &self.deps.support_phone,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::memory::{FitmentRow, MemoryCatalog};
    use crate::decision::Decision;
    use crate::decision::links::LinkTable;
    use crate::selection::{Modification, PositionChoice, Stage};

    fn row(model_type: &str, bulb: &str) -> FitmentRow {
        FitmentRow {
            model_year: 2019,
            brand: "BMW".into(),
            model_name: "X5".into(),
            model_type_name: Some(model_type.into()),
            body_type: Some("SUV".into()),
            position_category: None,
            position: Some("Low Beam".into()),
            bulb_type: Some(bulb.into()),
            technology: None,
        }
    }

    fn spawn() -> SessionHandle {
        let deps = SessionDeps {
            gateway: Arc::new(MemoryCatalog::new(vec![
                row("xDrive30d", "H7"),
                row("xDrive30d", "H11"),
                row("xDrive30d", "H8"),
                row("M50i", "D1S"),
            ])),
            links: Arc::new(LinkTable::builtin()),
            support_phone: "+359 88 000 0000".into(),
        };
        SessionHandle::spawn("s-1".into(), deps)
    }

    #[tokio::test]
    async fn test_actor_walks_the_cascade() {
        let session = spawn();
        let view = session.view_when_idle().await.unwrap();
        assert_eq!(view.options.years, [2019]);
        assert_eq!(view.next_stage, Some(Stage::Year));

        session.set_field(FieldUpdate::Year(Some(2019))).await.unwrap();
        session.view_when_idle().await.unwrap();
        session
            .set_field(FieldUpdate::Brand(Some("BMW".into())))
            .await
            .unwrap();
        session.view_when_idle().await.unwrap();
        session
            .set_field(FieldUpdate::Model(Some("X5".into())))
            .await
            .unwrap();
        let view = session.view_when_idle().await.unwrap();
        assert_eq!(view.options.modifications.len(), 2);

        session
            .set_field(FieldUpdate::Modification(Some(Modification::new(
                Some("xDrive30d"),
                Some("SUV"),
            ))))
            .await
            .unwrap();
        session.view_when_idle().await.unwrap();
        session
            .set_field(FieldUpdate::Position(Some(PositionChoice::new(None, "Low Beam"))))
            .await
            .unwrap();
        let view = session.view_when_idle().await.unwrap();

        assert_eq!(view.decision.as_ref().map(Decision::mode), Some("escalate_same_family"));
        assert_eq!(view.support_phone.as_deref(), Some("+359 88 000 0000"));
        assert_eq!(view.next_stage, None);
    }

    #[tokio::test]
    async fn test_actor_reports_rejected_update() {
        let session = spawn();
        let err = session
            .set_field(FieldUpdate::Model(Some("X5".into())))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SessionError::Selection(SelectionError::StageNotReady { stage: Stage::Model })
        );
    }

    #[tokio::test]
    async fn test_clear_all_resets_view() {
        let session = spawn();
        session.view_when_idle().await.unwrap();
        session.set_field(FieldUpdate::Year(Some(2019))).await.unwrap();
        session.view_when_idle().await.unwrap();

        let view = session.clear_all().await.unwrap();
        assert_eq!(view.selection.year, None);
        assert!(view.options.brands.is_empty());
        assert_eq!(view.options.years, [2019]);
        assert!(!view.loading.any());
    }
}
