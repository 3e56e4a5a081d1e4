use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use actix::prelude::*;
use log::debug;
use thiserror::Error;
use uuid::Uuid;

use crate::models::messages::{CloseChannel, OutboundFrame, ServerMessage};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("connection not established or lost, try logging in again")]
    NotAuthenticated,
    #[error("unknown connection")]
    UnknownChannel,
}

/// Write-side of one websocket connection. Sends are fire-and-forget; a
/// handle whose session is gone swallows them.
#[derive(Clone)]
pub struct ChannelHandle {
    pub id: Uuid,
    pub peer: Option<String>,
    frames: Recipient<OutboundFrame>,
    control: Recipient<CloseChannel>,
}

impl ChannelHandle {
    pub fn new(
        id: Uuid,
        peer: Option<String>,
        frames: Recipient<OutboundFrame>,
        control: Recipient<CloseChannel>,
    ) -> ChannelHandle {
        ChannelHandle {
            id,
            peer,
            frames,
            control,
        }
    }

    pub fn peer_or_unknown(&self) -> &str {
        self.peer.as_deref().unwrap_or("unknown")
    }

    pub fn send(&self, frame: String) {
        if self.frames.try_send(OutboundFrame(frame)).is_err() {
            debug!("Dropped a frame for closed channel {}", self.id);
        }
    }

    pub fn close(&self) {
        let _ = self.control.do_send(CloseChannel);
    }

    pub fn is_connected(&self) -> bool {
        self.frames.connected()
    }
}

impl fmt::Debug for ChannelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelHandle")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .finish()
    }
}

struct Connection {
    channel: ChannelHandle,
    user: Option<String>,
    opened_at: Instant,
}

/// An authenticated session that just ended; the owner still has to credit
/// the time to the account and announce the departure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEnd {
    pub name: String,
    pub online_seconds: u64,
}

/// All open connections plus the name-to-channel index for the logged-in
/// ones. A user has at most one live channel; logging in elsewhere closes
/// the previous one.
pub struct ConnectionRegistry {
    connections: HashMap<Uuid, Connection>,
    online: HashMap<String, Uuid>,
    unauth_ttl: Duration,
    sweep_every: Duration,
    next_sweep: Instant,
}

impl ConnectionRegistry {
    pub fn new(unauth_ttl: Duration, sweep_every: Duration, now: Instant) -> ConnectionRegistry {
        ConnectionRegistry {
            connections: HashMap::new(),
            online: HashMap::new(),
            unauth_ttl,
            sweep_every,
            next_sweep: now + sweep_every,
        }
    }

    /// Registers a freshly opened, not yet authenticated channel.
    pub fn opened(&mut self, channel: ChannelHandle, now: Instant) {
        debug!(
            "Channel {} opened from {}",
            channel.id,
            channel.peer_or_unknown()
        );
        self.connections.insert(
            channel.id,
            Connection {
                channel,
                user: None,
                opened_at: now,
            },
        );
    }

    /// Removes a closed channel. Returns the ended session when a user was
    /// logged in on it.
    pub fn closed(&mut self, channel_id: Uuid, now: Instant) -> Option<SessionEnd> {
        let connection = self.connections.remove(&channel_id)?;
        let name = connection.user?;
        if self.online.get(&name) == Some(&channel_id) {
            self.online.remove(&name);
        }
        Some(SessionEnd {
            name,
            online_seconds: now.saturating_duration_since(connection.opened_at).as_secs(),
        })
    }

    /// Binds a logged-in user to their channel. Any previous channel of the
    /// same user is told why and closed, and a different user previously
    /// bound to this channel is logged out. The ended sessions are returned
    /// for the caller to settle.
    pub fn bind(
        &mut self,
        name: &str,
        channel_id: Uuid,
        now: Instant,
    ) -> Result<Vec<SessionEnd>, RegistryError> {
        if !self.connections.contains_key(&channel_id) {
            return Err(RegistryError::UnknownChannel);
        }
        let mut ended = Vec::new();
        let new_peer = self.connections[&channel_id].channel.peer_or_unknown().to_string();

        if let Some(&old_id) = self.online.get(name) {
            if old_id != channel_id {
                if let Some(old) = self.connections.remove(&old_id) {
                    let notice = ServerMessage::error(format!(
                        "this connection is closed, '{}' logged in again from {}",
                        name, new_peer
                    ));
                    old.channel.send(notice.to_frame());
                    old.channel.close();
                    debug!("Channel {} of '{}' superseded by {}", old_id, name, channel_id);
                    ended.push(SessionEnd {
                        name: name.to_string(),
                        online_seconds: now
                            .saturating_duration_since(old.opened_at)
                            .as_secs(),
                    });
                }
            }
        }

        let connection = self
            .connections
            .get_mut(&channel_id)
            .ok_or(RegistryError::UnknownChannel)?;
        if let Some(previous) = connection.user.take() {
            if previous != name {
                ended.push(SessionEnd {
                    name: previous.clone(),
                    online_seconds: now
                        .saturating_duration_since(connection.opened_at)
                        .as_secs(),
                });
                self.online.remove(&previous);
            }
        }
        connection.user = Some(name.to_string());
        // The session clock restarts at login; pre-login time is not
        // credited to the account.
        connection.opened_at = now;
        self.online.insert(name.to_string(), channel_id);
        Ok(ended)
    }

    /// Resolves the user logged in on a channel; protected operations call
    /// this first.
    pub fn resolve(&self, channel_id: Uuid) -> Result<&str, RegistryError> {
        self.connections
            .get(&channel_id)
            .and_then(|connection| connection.user.as_deref())
            .ok_or(RegistryError::NotAuthenticated)
    }

    pub fn is_online(&self, name: &str) -> bool {
        self.online.contains_key(name)
    }

    /// Logged-in names, sorted for stable listings.
    pub fn online_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.online.keys().cloned().collect();
        names.sort();
        names
    }

    /// Seconds the user's current session has lasted, zero when offline.
    pub fn session_seconds(&self, name: &str, now: Instant) -> u64 {
        self.online
            .get(name)
            .and_then(|id| self.connections.get(id))
            .map(|connection| now.saturating_duration_since(connection.opened_at).as_secs())
            .unwrap_or(0)
    }

    /// Delivers to a user's channel; quietly does nothing when the user is
    /// offline.
    pub fn send_to_user(&self, name: &str, message: &ServerMessage) {
        if let Some(connection) = self.online.get(name).and_then(|id| self.connections.get(id)) {
            connection.channel.send(message.to_frame());
        }
    }

    pub fn send_to_channel(&self, channel_id: Uuid, message: &ServerMessage) {
        if let Some(connection) = self.connections.get(&channel_id) {
            connection.channel.send(message.to_frame());
        }
    }

    /// Sends a final message and closes the channel. The registry entry
    /// stays until the session actor reports the disconnect.
    pub fn send_and_close(&self, channel_id: Uuid, message: &ServerMessage) {
        if let Some(connection) = self.connections.get(&channel_id) {
            connection.channel.send(message.to_frame());
            connection.channel.close();
        }
    }

    pub fn send_to_all_online(&self, message: &ServerMessage) {
        let frame = message.to_frame();
        for id in self.online.values() {
            if let Some(connection) = self.connections.get(id) {
                connection.channel.send(frame.clone());
            }
        }
    }

    /// Drops channels whose session actor is gone and force-closes
    /// connections that never logged in within the allowance. Rate-limits
    /// itself to the configured interval.
    pub fn sweep(&mut self, now: Instant) -> Vec<SessionEnd> {
        if now < self.next_sweep {
            return Vec::new();
        }
        self.next_sweep = now + self.sweep_every;

        let mut ended = Vec::new();
        let dead: Vec<Uuid> = self
            .connections
            .values()
            .filter(|connection| !connection.channel.is_connected())
            .map(|connection| connection.channel.id)
            .collect();
        for id in dead {
            debug!("Dropping dead channel {}", id);
            if let Some(end) = self.closed(id, now) {
                ended.push(end);
            }
        }

        let stale: Vec<Uuid> = self
            .connections
            .values()
            .filter(|connection| {
                connection.user.is_none()
                    && now.saturating_duration_since(connection.opened_at) > self.unauth_ttl
            })
            .map(|connection| connection.channel.id)
            .collect();
        for id in stale {
            debug!("Closing channel {} with no login for too long", id);
            let notice = ServerMessage::error("the connection is closed, no login for too long");
            self.send_and_close(id, &notice);
            self.connections.remove(&id);
        }
        ended
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    struct Collector {
        frames: Arc<Mutex<Vec<String>>>,
        closed: Arc<AtomicBool>,
    }

    impl Actor for Collector {
        type Context = Context<Self>;
    }

    impl Handler<OutboundFrame> for Collector {
        type Result = ();

        fn handle(&mut self, msg: OutboundFrame, _: &mut Context<Self>) {
            self.frames.lock().unwrap().push(msg.0);
        }
    }

    impl Handler<CloseChannel> for Collector {
        type Result = ();

        fn handle(&mut self, _: CloseChannel, ctx: &mut Context<Self>) {
            self.closed.store(true, Ordering::SeqCst);
            ctx.stop();
        }
    }

    struct Stub {
        handle: ChannelHandle,
        frames: Arc<Mutex<Vec<String>>>,
        closed: Arc<AtomicBool>,
    }

    fn stub_channel(peer: &str) -> Stub {
        let frames = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let addr = Collector {
            frames: frames.clone(),
            closed: closed.clone(),
        }
        .start();
        Stub {
            handle: ChannelHandle::new(
                Uuid::new_v4(),
                Some(peer.to_string()),
                addr.clone().recipient(),
                addr.recipient(),
            ),
            frames,
            closed,
        }
    }

    fn registry(now: Instant) -> ConnectionRegistry {
        ConnectionRegistry::new(Duration::from_secs(60), Duration::from_secs(60), now)
    }

    async fn settle() {
        actix_rt::time::sleep(Duration::from_millis(20)).await;
    }

    #[actix_rt::test]
    async fn bind_then_resolve_and_send() {
        let now = Instant::now();
        let mut registry = registry(now);
        let stub = stub_channel("10.0.0.1");
        let id = stub.handle.id;

        registry.opened(stub.handle.clone(), now);
        assert_eq!(
            registry.resolve(id).unwrap_err(),
            RegistryError::NotAuthenticated
        );

        let ended = registry.bind("alice", id, now).unwrap();
        assert!(ended.is_empty());
        assert_eq!(registry.resolve(id).unwrap(), "alice");
        assert!(registry.is_online("alice"));
        assert_eq!(registry.online_names(), vec!["alice".to_string()]);

        registry.send_to_user("alice", &ServerMessage::error("hello"));
        registry.send_to_user("nobody", &ServerMessage::error("lost"));
        settle().await;
        let frames = stub.frames.lock().unwrap();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].contains("hello"));
    }

    #[actix_rt::test]
    async fn binding_an_unknown_channel_fails() {
        let now = Instant::now();
        let mut registry = registry(now);
        assert_eq!(
            registry.bind("alice", Uuid::new_v4(), now).unwrap_err(),
            RegistryError::UnknownChannel
        );
    }

    #[actix_rt::test]
    async fn second_login_supersedes_the_first_channel() {
        let now = Instant::now();
        let mut registry = registry(now);
        let first = stub_channel("10.0.0.1");
        let second = stub_channel("10.0.0.2");
        registry.opened(first.handle.clone(), now);
        registry.opened(second.handle.clone(), now);
        registry.bind("alice", first.handle.id, now).unwrap();

        let later = now + Duration::from_secs(90);
        let ended = registry.bind("alice", second.handle.id, later).unwrap();
        assert_eq!(
            ended,
            vec![SessionEnd {
                name: "alice".to_string(),
                online_seconds: 90,
            }]
        );
        assert_eq!(
            registry.resolve(first.handle.id).unwrap_err(),
            RegistryError::NotAuthenticated
        );
        assert_eq!(registry.resolve(second.handle.id).unwrap(), "alice");

        registry.send_to_user("alice", &ServerMessage::error("routed"));
        settle().await;
        assert!(first.closed.load(Ordering::SeqCst));
        let old_frames = first.frames.lock().unwrap();
        assert_eq!(old_frames.len(), 1);
        assert!(old_frames[0].contains("10.0.0.2"));
        let new_frames = second.frames.lock().unwrap();
        assert_eq!(new_frames.len(), 1);
        assert!(new_frames[0].contains("routed"));
    }

    #[actix_rt::test]
    async fn switching_accounts_on_one_channel_ends_the_old_session() {
        let now = Instant::now();
        let mut registry = registry(now);
        let stub = stub_channel("10.0.0.1");
        registry.opened(stub.handle.clone(), now);
        registry.bind("alice", stub.handle.id, now).unwrap();

        let later = now + Duration::from_secs(30);
        let ended = registry.bind("bob", stub.handle.id, later).unwrap();
        assert_eq!(
            ended,
            vec![SessionEnd {
                name: "alice".to_string(),
                online_seconds: 30,
            }]
        );
        assert!(!registry.is_online("alice"));
        assert_eq!(registry.resolve(stub.handle.id).unwrap(), "bob");
    }

    #[actix_rt::test]
    async fn closing_reports_the_ended_session() {
        let now = Instant::now();
        let mut registry = registry(now);
        let stub = stub_channel("10.0.0.1");
        registry.opened(stub.handle.clone(), now);
        assert_eq!(registry.closed(stub.handle.id, now), None);

        let stub = stub_channel("10.0.0.1");
        registry.opened(stub.handle.clone(), now);
        registry.bind("alice", stub.handle.id, now).unwrap();
        let end = registry
            .closed(stub.handle.id, now + Duration::from_secs(12))
            .unwrap();
        assert_eq!(end.name, "alice");
        assert_eq!(end.online_seconds, 12);
        assert!(!registry.is_online("alice"));
        assert_eq!(registry.closed(stub.handle.id, now), None);
    }

    #[actix_rt::test]
    async fn sweep_closes_channels_that_never_log_in() {
        let now = Instant::now();
        let mut registry = registry(now);
        let idler = stub_channel("10.0.0.1");
        let player = stub_channel("10.0.0.2");
        registry.opened(idler.handle.clone(), now);
        registry.opened(player.handle.clone(), now);
        registry.bind("alice", player.handle.id, now).unwrap();

        let ended = registry.sweep(now + Duration::from_secs(90));
        assert!(ended.is_empty());
        settle().await;
        assert!(idler.closed.load(Ordering::SeqCst));
        assert!(idler.frames.lock().unwrap()[0].contains("no login"));
        assert!(!player.closed.load(Ordering::SeqCst));
        assert_eq!(registry.connection_count(), 1);
    }

    #[actix_rt::test]
    async fn sweep_reaps_dead_channels_and_reports_their_sessions() {
        let now = Instant::now();
        let mut registry = registry(now);
        let stub = stub_channel("10.0.0.1");
        registry.opened(stub.handle.clone(), now);
        registry.bind("alice", stub.handle.id, now).unwrap();

        // The session actor dies without the registry hearing about it.
        stub.handle.close();
        settle().await;
        assert!(!stub.handle.is_connected());

        let ended = registry.sweep(now + Duration::from_secs(61));
        assert_eq!(ended.len(), 1);
        assert_eq!(ended[0].name, "alice");
        assert!(!registry.is_online("alice"));
        assert_eq!(registry.connection_count(), 0);
    }

    #[actix_rt::test]
    async fn sweep_rate_limits_itself() {
        let now = Instant::now();
        let mut registry = registry(now);
        let idler = stub_channel("10.0.0.1");
        registry.opened(idler.handle.clone(), now);

        // Past the TTL but before the sweep interval comes around again.
        registry.sweep(now + Duration::from_secs(59));
        settle().await;
        assert!(!idler.closed.load(Ordering::SeqCst));
        assert_eq!(registry.connection_count(), 1);
    }
}
