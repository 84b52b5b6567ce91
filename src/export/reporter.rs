//! Outbound notifications for one export run.

use tokio::sync::mpsc;
use tracing::debug;

use super::model::{CompleteData, ProgressData, ServerMessage};

/// Queues notifications for the connection's writer.
///
/// A closed connection is not an error for the export: notifications sent
/// after the client left are dropped.
#[derive(Debug, Clone)]
pub struct ExportReporter {
    tx: mpsc::UnboundedSender<ServerMessage>,
}

impl ExportReporter {
    pub fn new(tx: mpsc::UnboundedSender<ServerMessage>) -> Self {
        Self { tx }
    }

    /// A reporter paired with the receiving end, for callers that own both.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn log(&self, message: impl Into<String>) {
        self.send(ServerMessage::Log {
            message: message.into(),
        });
    }

    pub fn error(&self, message: impl Into<String>) {
        self.send(ServerMessage::Error {
            message: message.into(),
        });
    }

    pub fn progress(&self, data: ProgressData) {
        self.send(ServerMessage::Progress { data });
    }

    pub fn complete(&self, data: CompleteData) {
        self.send(ServerMessage::Complete { data });
    }

    fn send(&self, msg: ServerMessage) {
        if self.tx.send(msg).is_err() {
            debug!("Client disconnected, notification dropped");
        }
    }
}
