use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-connection outbound channel carrying serialized frames.
pub type OutboundTx = mpsc::UnboundedSender<String>;
pub type OutboundRx = mpsc::UnboundedReceiver<String>;

/// Connection lifecycle: `Unjoined -> Active -> Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unjoined,
    Active,
    Closed,
}

/// Live projection of a joined player. Dropped on disconnect.
#[derive(Debug, Clone, PartialEq)]
pub struct LivePlayer {
    pub player_id: i64,
    pub name: String,
    pub level: u32,
    pub map: String,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown session: {0}")]
    UnknownSession(SessionId),

    #[error("session already joined")]
    AlreadyJoined,

    #[error("player already online: {0}")]
    NameInUse(String),
}

#[derive(Debug)]
struct SessionEntry {
    outbound: OutboundTx,
    player: Option<LivePlayer>,
}

impl SessionEntry {
    fn state(&self) -> SessionState {
        if self.player.is_some() {
            SessionState::Active
        } else {
            SessionState::Unjoined
        }
    }
}

/// Process-wide registry of live connections.
///
/// Every read, write and fan-out happens inside one critical section, so a
/// publish never observes a half-registered or half-removed session.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<BTreeMap<SessionId, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<SessionId, SessionEntry>> {
        // A panic while holding the lock cannot leave an entry half-written:
        // every mutation below is a single map operation.
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a freshly accepted connection in the `Unjoined` state.
    pub fn attach(&self, session_id: SessionId, outbound: OutboundTx) {
        self.lock().insert(
            session_id,
            SessionEntry {
                outbound,
                player: None,
            },
        );
    }

    /// Bind a player to a connection, returning every other active player.
    pub fn join(
        &self,
        session_id: SessionId,
        player: LivePlayer,
    ) -> Result<Vec<LivePlayer>, RegistryError> {
        let mut sessions = self.lock();

        match sessions.get(&session_id) {
            None => return Err(RegistryError::UnknownSession(session_id)),
            Some(entry) if entry.player.is_some() => return Err(RegistryError::AlreadyJoined),
            Some(_) => {}
        }

        let name_taken = sessions
            .iter()
            .any(|(sid, e)| *sid != session_id && e.player.as_ref().is_some_and(|p| p.name == player.name));
        if name_taken {
            return Err(RegistryError::NameInUse(player.name));
        }

        let peers = sessions
            .iter()
            .filter(|(sid, _)| **sid != session_id)
            .filter_map(|(_, e)| e.player.clone())
            .collect();

        if let Some(entry) = sessions.get_mut(&session_id) {
            entry.player = Some(player);
        }
        Ok(peers)
    }

    pub fn state(&self, session_id: SessionId) -> SessionState {
        self.lock()
            .get(&session_id)
            .map(SessionEntry::state)
            .unwrap_or(SessionState::Closed)
    }

    /// Snapshot of the live player bound to a connection.
    pub fn player(&self, session_id: SessionId) -> Option<LivePlayer> {
        self.lock().get(&session_id).and_then(|e| e.player.clone())
    }

    /// Update the live position. Returns the updated projection, or None when
    /// the session is not active.
    pub fn update_position(
        &self,
        session_id: SessionId,
        x: f64,
        y: f64,
        map: &str,
    ) -> Option<LivePlayer> {
        let mut sessions = self.lock();
        let player = sessions.get_mut(&session_id)?.player.as_mut()?;
        player.x = x;
        player.y = y;
        if player.map != map {
            player.map = map.to_string();
        }
        Some(player.clone())
    }

    pub fn set_level(&self, session_id: SessionId, level: u32) {
        if let Some(player) = self
            .lock()
            .get_mut(&session_id)
            .and_then(|e| e.player.as_mut())
        {
            player.level = level;
        }
    }

    /// Deliver a frame to a single connection (joined or not).
    pub fn send_to(&self, session_id: SessionId, frame: &str) -> bool {
        match self.lock().get(&session_id) {
            Some(entry) => entry.outbound.send(frame.to_string()).is_ok(),
            None => false,
        }
    }

    /// Fan a frame out to every active session except `except`.
    /// Returns the number of sessions the frame was queued for.
    pub fn publish(&self, frame: &str, except: Option<SessionId>) -> usize {
        let sessions = self.lock();
        let mut delivered = 0;
        for (sid, entry) in sessions.iter() {
            if Some(*sid) == except || entry.player.is_none() {
                continue;
            }
            if entry.outbound.send(frame.to_string()).is_ok() {
                delivered += 1;
            } else {
                tracing::debug!(session_id = %sid, "publish: outbound channel closed");
            }
        }
        delivered
    }

    /// Remove a connection. Returns the live player if the session had
    /// joined; a second call for the same session returns None.
    pub fn detach(&self, session_id: SessionId) -> Option<LivePlayer> {
        self.lock().remove(&session_id).and_then(|e| e.player)
    }

    /// Count of joined sessions.
    pub fn active_count(&self) -> usize {
        self.lock().values().filter(|e| e.player.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live(id: i64, name: &str) -> LivePlayer {
        LivePlayer {
            player_id: id,
            name: name.to_string(),
            level: 1,
            map: "map-city".to_string(),
            x: 400.0,
            y: 300.0,
        }
    }

    fn attach(reg: &SessionRegistry, id: u64) -> OutboundRx {
        let (tx, rx) = mpsc::unbounded_channel();
        reg.attach(SessionId(id), tx);
        rx
    }

    #[test]
    fn session_lifecycle() {
        let reg = SessionRegistry::new();
        let sid = SessionId(1);
        let _rx = attach(&reg, 1);

        assert_eq!(reg.state(sid), SessionState::Unjoined);

        let peers = reg.join(sid, live(10, "Ana")).unwrap();
        assert!(peers.is_empty());
        assert_eq!(reg.state(sid), SessionState::Active);
        assert_eq!(reg.player(sid).unwrap().player_id, 10);

        let removed = reg.detach(sid);
        assert_eq!(removed.unwrap().name, "Ana");
        assert_eq!(reg.state(sid), SessionState::Closed);
    }

    #[test]
    fn detach_is_idempotent() {
        let reg = SessionRegistry::new();
        let _rx = attach(&reg, 1);
        reg.join(SessionId(1), live(1, "Ana")).unwrap();

        assert!(reg.detach(SessionId(1)).is_some());
        assert!(reg.detach(SessionId(1)).is_none());
        assert_eq!(reg.state(SessionId(1)), SessionState::Closed);
        assert_eq!(reg.active_count(), 0);
    }

    #[test]
    fn join_returns_other_players() {
        let reg = SessionRegistry::new();
        let _a = attach(&reg, 1);
        let _b = attach(&reg, 2);
        let _c = attach(&reg, 3);

        reg.join(SessionId(1), live(1, "Ana")).unwrap();
        reg.join(SessionId(2), live(2, "Bia")).unwrap();
        // Session 3 never joined, so it is not a peer.
        let peers = reg.join(SessionId(3), live(3, "Caio")).unwrap();
        assert_eq!(peers.len(), 2);

        let _d = attach(&reg, 4);
        let peers = reg.join(SessionId(4), live(4, "Duda")).unwrap();
        let names: Vec<_> = peers.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Ana", "Bia", "Caio"]);
    }

    #[test]
    fn join_rejects_duplicate_name_and_double_join() {
        let reg = SessionRegistry::new();
        let _a = attach(&reg, 1);
        let _b = attach(&reg, 2);

        reg.join(SessionId(1), live(1, "Ana")).unwrap();
        assert_eq!(
            reg.join(SessionId(1), live(1, "Ana")),
            Err(RegistryError::AlreadyJoined)
        );
        assert_eq!(
            reg.join(SessionId(2), live(1, "Ana")),
            Err(RegistryError::NameInUse("Ana".to_string()))
        );
        // Names are case-sensitive.
        assert!(reg.join(SessionId(2), live(2, "ana")).is_ok());
    }

    #[test]
    fn join_unknown_session() {
        let reg = SessionRegistry::new();
        assert_eq!(
            reg.join(SessionId(9), live(1, "Ana")),
            Err(RegistryError::UnknownSession(SessionId(9)))
        );
    }

    #[test]
    fn update_position_requires_active_session() {
        let reg = SessionRegistry::new();
        let _rx = attach(&reg, 1);
        assert!(reg.update_position(SessionId(1), 1.0, 2.0, "map-city").is_none());

        reg.join(SessionId(1), live(1, "Ana")).unwrap();
        let moved = reg
            .update_position(SessionId(1), 12.5, 40.0, "map-forest")
            .unwrap();
        assert_eq!(moved.x, 12.5);
        assert_eq!(moved.map, "map-forest");
        assert_eq!(reg.player(SessionId(1)).unwrap().y, 40.0);
    }

    #[test]
    fn publish_skips_sender_and_unjoined() {
        let reg = SessionRegistry::new();
        let mut a = attach(&reg, 1);
        let mut b = attach(&reg, 2);
        let mut c = attach(&reg, 3);
        reg.join(SessionId(1), live(1, "Ana")).unwrap();
        reg.join(SessionId(2), live(2, "Bia")).unwrap();

        let delivered = reg.publish("hello", Some(SessionId(1)));
        assert_eq!(delivered, 1);
        assert_eq!(b.try_recv().unwrap(), "hello");
        assert!(a.try_recv().is_err());
        assert!(c.try_recv().is_err());

        assert_eq!(reg.publish("all", None), 2);
        assert_eq!(a.try_recv().unwrap(), "all");
    }

    #[test]
    fn send_to_reaches_unjoined_session() {
        let reg = SessionRegistry::new();
        let mut rx = attach(&reg, 5);
        assert!(reg.send_to(SessionId(5), "welcome"));
        assert_eq!(rx.try_recv().unwrap(), "welcome");
        assert!(!reg.send_to(SessionId(6), "nobody"));
    }

    #[test]
    fn publish_ignores_closed_receivers() {
        let reg = SessionRegistry::new();
        let rx = attach(&reg, 1);
        let mut other = attach(&reg, 2);
        reg.join(SessionId(1), live(1, "Ana")).unwrap();
        reg.join(SessionId(2), live(2, "Bia")).unwrap();
        drop(rx);

        assert_eq!(reg.publish("x", None), 1);
        assert_eq!(other.try_recv().unwrap(), "x");
    }

    #[test]
    fn set_level_updates_projection() {
        let reg = SessionRegistry::new();
        let _rx = attach(&reg, 1);
        reg.join(SessionId(1), live(1, "Ana")).unwrap();
        reg.set_level(SessionId(1), 4);
        assert_eq!(reg.player(SessionId(1)).unwrap().level, 4);
        assert_eq!(reg.active_count(), 1);
    }
}
