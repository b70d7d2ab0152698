//! Registry actor implementation
//!
//! The single authority over active sessions, their display names, and the
//! roster. Connection handlers talk to it only through [`RegistryHandle`];
//! commands are processed one at a time, so the state needs no locking.
//!
//! Delivery into mailboxes never waits. A session whose mailbox is full (or
//! already closed) is evicted on the spot, and the remaining sessions get a
//! fresh roster.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::allocator::UsernameAllocator;
use crate::error::{AppError, Result};
use crate::message::ServerMessage;
use crate::session::Session;
use crate::types::SessionId;

/// Commands sent from connection handlers to the Registry actor
#[derive(Debug)]
pub enum RegistryCommand {
    /// New session, replied to with its display name
    Register {
        session_id: SessionId,
        mailbox: mpsc::Sender<ServerMessage>,
        reply: oneshot::Sender<Result<String>>,
    },
    /// Session ended
    Unregister {
        session_id: SessionId,
    },
    /// Text to fan out, tagged with the sender's name
    Broadcast {
        session_id: SessionId,
        text: String,
    },
    /// Re-broadcast the roster to everyone, on behalf of a session
    RequestUserList {
        session_id: SessionId,
    },
    /// Read the roster without changing anything
    RosterSnapshot {
        reply: oneshot::Sender<Vec<String>>,
    },
}

/// Cloneable front door to a running Registry
#[derive(Debug, Clone)]
pub struct RegistryHandle {
    sender: mpsc::Sender<RegistryCommand>,
}

impl RegistryHandle {
    /// Wrap a command sender
    pub fn new(sender: mpsc::Sender<RegistryCommand>) -> Self {
        Self { sender }
    }

    /// Register a session and wait for its display name
    pub async fn register(
        &self,
        session_id: SessionId,
        mailbox: mpsc::Sender<ServerMessage>,
    ) -> Result<String> {
        let (reply, rx) = oneshot::channel();
        self.send(RegistryCommand::Register {
            session_id,
            mailbox,
            reply,
        })
        .await?;
        rx.await.map_err(|_| AppError::RegistryClosed)?
    }

    /// Remove a session; a no-op for sessions that are not active
    pub async fn unregister(&self, session_id: SessionId) -> Result<()> {
        self.send(RegistryCommand::Unregister { session_id }).await
    }

    /// Fan out text from a session to every active session
    pub async fn broadcast(&self, session_id: SessionId, text: String) -> Result<()> {
        self.send(RegistryCommand::Broadcast { session_id, text })
            .await
    }

    /// Ask for the roster to be sent to every active session
    pub async fn request_user_list(&self, session_id: SessionId) -> Result<()> {
        self.send(RegistryCommand::RequestUserList { session_id })
            .await
    }

    /// Current roster, in assignment order
    pub async fn roster_snapshot(&self) -> Result<Vec<String>> {
        let (reply, rx) = oneshot::channel();
        self.send(RegistryCommand::RosterSnapshot { reply }).await?;
        rx.await.map_err(|_| AppError::RegistryClosed)
    }

    async fn send(&self, cmd: RegistryCommand) -> Result<()> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| AppError::RegistryClosed)
    }
}

/// The Registry actor state
pub struct Registry {
    /// Active sessions: SessionId -> Session
    sessions: HashMap<SessionId, Session>,
    /// Names of active sessions, in assignment order
    roster: Vec<String>,
    allocator: UsernameAllocator,
}

impl Registry {
    /// Create an empty Registry drawing names from `allocator`
    pub fn new(allocator: UsernameAllocator) -> Self {
        Self {
            sessions: HashMap::new(),
            roster: Vec::new(),
            allocator,
        }
    }

    /// Start the actor on the current runtime
    ///
    /// The task ends once every handle has been dropped.
    pub fn spawn(self, buffer: usize) -> (RegistryHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(buffer);
        let task = tokio::spawn(self.run(rx));
        (RegistryHandle::new(tx), task)
    }

    /// Run the Registry event loop
    ///
    /// Continuously receives and processes commands until all senders are dropped.
    pub async fn run(mut self, mut receiver: mpsc::Receiver<RegistryCommand>) {
        info!("Registry started");

        while let Some(cmd) = receiver.recv().await {
            self.handle_command(cmd);
        }

        info!("Registry shutting down");
    }

    /// Process a single command
    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Register {
                session_id,
                mailbox,
                reply,
            } => {
                let fresh = !self.sessions.contains_key(&session_id);
                let result = self.register(session_id, mailbox);
                let registered = fresh && result.is_ok();
                if reply.send(result).is_err() && registered {
                    // Handler went away while waiting.
                    self.unregister(session_id);
                }
            }
            RegistryCommand::Unregister { session_id } => {
                self.unregister(session_id);
            }
            RegistryCommand::Broadcast { session_id, text } => {
                self.broadcast_from(session_id, text);
            }
            RegistryCommand::RequestUserList { session_id } => {
                if self.sessions.contains_key(&session_id) {
                    self.broadcast_roster();
                } else {
                    debug!("Ignoring roster request from inactive session {}", session_id);
                }
            }
            RegistryCommand::RosterSnapshot { reply } => {
                let _ = reply.send(self.roster_snapshot());
            }
        }
    }

    /// Add a session and give it a display name
    ///
    /// Everyone (the newcomer included) receives the updated roster before
    /// the newcomer is told its own name.
    pub fn register(
        &mut self,
        session_id: SessionId,
        mailbox: mpsc::Sender<ServerMessage>,
    ) -> Result<String> {
        if let Some(name) = self.sessions.get(&session_id).and_then(Session::username) {
            warn!("Session {} registered twice", session_id);
            return Ok(name.to_string());
        }

        // The roster holds exactly the names currently assigned.
        let username = self.allocator.allocate(&self.roster)?;

        let mut session = Session::new(session_id, mailbox);
        session.assign_username(username.clone());
        self.sessions.insert(session_id, session);
        self.roster.push(username.clone());

        info!("Session {} assigned username '{}'", session_id, username);

        self.broadcast_roster();

        let notified = self.sessions.get(&session_id).map(|session| {
            session.try_deliver(ServerMessage::Username {
                username: username.clone(),
            })
        });
        if let Some(Err(e)) = notified {
            warn!("Could not notify session {} of its name: {}", session_id, e);
            self.evict(vec![session_id]);
            self.broadcast_roster();
        }

        debug!("Active sessions: {}", self.sessions.len());

        Ok(username)
    }

    /// Remove a session; unknown sessions are ignored
    ///
    /// Returns whether anything was removed.
    pub fn unregister(&mut self, session_id: SessionId) -> bool {
        let Some(session) = self.remove_session(session_id) else {
            return false;
        };

        info!(
            "Session {} ('{}') unregistered",
            session_id,
            session.username().unwrap_or_default()
        );
        // Dropping the session closes its mailbox.
        drop(session);

        self.broadcast_roster();
        debug!("Active sessions: {}", self.sessions.len());
        true
    }

    /// Fan out a message from the session with the given ID
    ///
    /// Dropped if the session is not active or has no name yet.
    pub fn broadcast_from(&mut self, session_id: SessionId, text: String) {
        let Some(sender_name) = self
            .sessions
            .get(&session_id)
            .and_then(Session::username)
            .map(str::to_owned)
        else {
            warn!("Dropping message from {}: no assigned name", session_id);
            return;
        };

        self.broadcast(&sender_name, text);
    }

    /// Fan out `text` tagged with `sender_name` to every active session
    pub fn broadcast(&mut self, sender_name: &str, text: String) {
        self.deliver_to_all(ServerMessage::Message {
            user: sender_name.to_string(),
            text,
        });
    }

    /// Send the current roster to every active session
    pub fn broadcast_roster(&mut self) {
        let update = self.user_list();
        self.deliver_to_all(update);
    }

    /// Current roster, in assignment order
    pub fn roster_snapshot(&self) -> Vec<String> {
        self.roster.clone()
    }

    /// Number of active sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Display name of an active session
    pub fn username_of(&self, session_id: SessionId) -> Option<&str> {
        self.sessions.get(&session_id).and_then(Session::username)
    }

    fn user_list(&self) -> ServerMessage {
        ServerMessage::UserList {
            users: self.roster.clone(),
        }
    }

    /// Deliver to everyone, evicting sessions that cannot take it
    ///
    /// Each eviction round is followed by a roster update, which can evict
    /// further sessions; every round removes at least one, so this ends.
    fn deliver_to_all(&mut self, msg: ServerMessage) {
        let mut failed = self.fan_out(&msg);

        while !failed.is_empty() {
            self.evict(failed);
            let update = self.user_list();
            failed = self.fan_out(&update);
        }
    }

    /// Try every mailbox once, returning the sessions that refused
    fn fan_out(&self, msg: &ServerMessage) -> Vec<SessionId> {
        self.sessions
            .values()
            .filter_map(|session| match session.try_deliver(msg.clone()) {
                Ok(()) => None,
                Err(e) => {
                    debug!("Delivery to {} failed: {}", session.id, e);
                    Some(session.id)
                }
            })
            .collect()
    }

    fn evict(&mut self, session_ids: Vec<SessionId>) {
        for session_id in session_ids {
            if let Some(session) = self.remove_session(session_id) {
                warn!(
                    "Evicted session {} ('{}'): mailbox unavailable",
                    session_id,
                    session.username().unwrap_or_default()
                );
            }
        }
    }

    /// Take a session out of the active set and release its name
    fn remove_session(&mut self, session_id: SessionId) -> Option<Session> {
        let session = self.sessions.remove(&session_id)?;

        if let Some(name) = session.username() {
            self.allocator.release(name);
            if let Some(pos) = self.roster.iter().position(|n| n == name) {
                self.roster.remove(pos);
            }
        }

        Some(session)
    }
}
