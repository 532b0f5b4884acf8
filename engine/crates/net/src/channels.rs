use tokio::sync::mpsc;

/// Per-session write channel (coordinator / registry -> session writer task).
pub type SessionWriteTx = session::OutboundTx;
pub type SessionWriteRx = session::OutboundRx;

pub fn session_channel() -> (SessionWriteTx, SessionWriteRx) {
    mpsc::unbounded_channel()
}
