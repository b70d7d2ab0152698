//! Session struct definition
//!
//! Registry-side state for one connected peer: its identity, display name,
//! and the sending half of its outbound mailbox.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::SendError;
use crate::message::ServerMessage;
use crate::types::SessionId;

/// Connected session information
///
/// The Registry holds the only strong `Sender` of the mailbox, so dropping a
/// `Session` closes the mailbox and lets the writer task finish.
#[derive(Debug)]
pub struct Session {
    /// Unique identifier for this session
    pub id: SessionId,
    /// Display name (None until assigned)
    username: Option<String>,
    /// Server → Client mailbox
    mailbox: mpsc::Sender<ServerMessage>,
}

impl Session {
    /// Create a new session with the given ID and mailbox
    pub fn new(id: SessionId, mailbox: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            id,
            username: None,
            mailbox,
        }
    }

    /// Enqueue a message without waiting
    ///
    /// A full mailbox is reported rather than awaited; the Registry treats
    /// both errors as a failed session.
    pub fn try_deliver(&self, msg: ServerMessage) -> Result<(), SendError> {
        self.mailbox.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => SendError::MailboxFull,
            TrySendError::Closed(_) => SendError::MailboxClosed,
        })
    }

    /// Display name, if one has been assigned
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Assign the display name
    ///
    /// A session is named once; later calls are ignored.
    pub fn assign_username(&mut self, username: String) {
        if self.username.is_none() {
            self.username = Some(username);
        }
    }
}
