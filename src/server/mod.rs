pub mod connections;
pub mod invitations;
pub mod sessions;

use std::time::{Duration, Instant};

use actix::prelude::*;
use chrono::Local;
use log::{debug, error, info, warn};
use uuid::Uuid;

use crate::accounts::{AccountRecord, AccountStore, BanList};
use crate::config::ServerConfig;
use crate::game::chess_match::MatchError;
use crate::models::messages::{require, ActionRequest, ClientMessage, ProtocolError, ServerMessage};
use crate::models::profile::{LobbyUser, UserProfile};
use crate::server::connections::{ChannelHandle, ConnectionRegistry, SessionEnd};
use crate::server::invitations::InvitationManager;
use crate::server::sessions::{MatchUpdate, SessionError, SessionManager};

/// A websocket session announcing its channel.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Connect {
    pub channel: ChannelHandle,
}

/// A websocket session reporting that its channel closed.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Disconnect {
    pub channel_id: Uuid,
}

/// A decoded client message forwarded by a websocket session.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Inbound {
    pub channel_id: Uuid,
    pub message: ClientMessage,
}

/// The single authority over all mutable server state. Sessions only decode
/// and forward; every mutation happens here, one mailbox message at a time,
/// so no lock is ever taken.
pub struct GameServer {
    config: ServerConfig,
    registry: ConnectionRegistry,
    invitations: InvitationManager,
    sessions: SessionManager,
    accounts: AccountStore,
    banned_ips: BanList,
    next_presence: Instant,
}

impl GameServer {
    pub fn new(config: ServerConfig, accounts: AccountStore, banned_ips: BanList) -> GameServer {
        let now = Instant::now();
        GameServer {
            registry: ConnectionRegistry::new(
                config.unauth_ttl,
                config.connection_sweep_every,
                now,
            ),
            invitations: InvitationManager::new(
                config.invitation_ttl,
                config.invitation_sweep_every,
                now,
            ),
            sessions: SessionManager::new(config.time_per_player, config.match_sweep_every, now),
            accounts,
            banned_ips,
            next_presence: now + config.presence_every,
            config,
        }
    }

    /// Routes one inbound message. Login and account creation work on bare
    /// channels, everything else resolves the sender first and a failure to
    /// do so costs the connection.
    fn dispatch(&mut self, channel_id: Uuid, message: ClientMessage, now: Instant) {
        debug!("Dispatching '{}' from channel {}", message.kind, channel_id);
        let kind = message.kind.clone();
        let result = match kind.as_str() {
            "login" => self.handle_login(channel_id, message, now),
            "create_account" => self.handle_create_account(channel_id, message, now),
            _ => match self.registry.resolve(channel_id) {
                Ok(name) => {
                    let name = name.to_string();
                    self.dispatch_authenticated(channel_id, &name, message, now)
                }
                Err(err) => {
                    warn!(
                        "Rejected '{}' from unauthenticated channel {}",
                        kind, channel_id
                    );
                    let notice = ServerMessage {
                        kind: "auth_error".to_string(),
                        text: Some(err.to_string()),
                        ..Default::default()
                    };
                    self.registry.send_and_close(channel_id, &notice);
                    Ok(())
                }
            },
        };
        // A malformed message is reported but does not cost the connection.
        if let Err(err) = result {
            warn!("Bad '{}' message on channel {}: {}", kind, channel_id, err);
            self.registry
                .send_to_channel(channel_id, &ServerMessage::error(err.to_string()));
        }
    }

    fn dispatch_authenticated(
        &mut self,
        channel_id: Uuid,
        name: &str,
        message: ClientMessage,
        now: Instant,
    ) -> Result<(), ProtocolError> {
        match message.kind.as_str() {
            "chat_send" => {
                let text = require(message.text, "text")?;
                self.broadcast_chat(name, &text);
                Ok(())
            }
            "get_online_users" => {
                let listing = self.online_users_message(name, now);
                self.registry.send_to_channel(channel_id, &listing);
                Ok(())
            }
            "invite" => {
                let target = require(message.target_name, "target_name")?;
                let accept = require(message.accept, "accept")?;
                self.handle_invite(name, &target, accept, now);
                Ok(())
            }
            "invite_response" => {
                let inviter = require(message.target_name, "target_name")?;
                let accept = require(message.accept, "accept")?;
                if accept {
                    self.invitations.accept(&inviter, name);
                } else {
                    self.invitations.reject(&inviter, name);
                }
                Ok(())
            }
            "get_current_match" => {
                let current = self.current_match_message(name);
                self.registry.send_to_channel(channel_id, &current);
                Ok(())
            }
            "do_action" => {
                let action = require(message.action, "action")?;
                self.handle_action(name, &action, now);
                Ok(())
            }
            other => Err(ProtocolError::UnknownKind(other.to_string())),
        }
    }

    fn handle_login(
        &mut self,
        channel_id: Uuid,
        message: ClientMessage,
        now: Instant,
    ) -> Result<(), ProtocolError> {
        let name = require(message.name, "name")?;
        let password = require(message.password_hash, "password_hash")?;
        match self.accounts.login(&name, &password) {
            Ok(record) => self.complete_login(channel_id, record, now),
            Err(err) => {
                info!("Failed login for '{}': {}", name, err);
                let notice = ServerMessage {
                    kind: "login_error".to_string(),
                    text: Some(err.to_string()),
                    ..Default::default()
                };
                self.registry.send_and_close(channel_id, &notice);
            }
        }
        Ok(())
    }

    fn handle_create_account(
        &mut self,
        channel_id: Uuid,
        message: ClientMessage,
        now: Instant,
    ) -> Result<(), ProtocolError> {
        let name = require(message.name, "name")?;
        let password = require(message.password_hash, "password_hash")?;
        match self.accounts.create(&name, &password) {
            Ok(record) => self.complete_login(channel_id, record, now),
            Err(err) => {
                info!("Refused account creation for '{}': {}", name, err);
                let notice = ServerMessage {
                    kind: "create_account_error".to_string(),
                    text: Some(err.to_string()),
                    ..Default::default()
                };
                self.registry.send_and_close(channel_id, &notice);
            }
        }
        Ok(())
    }

    /// Binds the authenticated user to the channel, settles any session
    /// this supersedes, announces the arrival and hands the client its
    /// opening bundle.
    fn complete_login(&mut self, channel_id: Uuid, record: AccountRecord, now: Instant) {
        let name = record.name;
        match self.registry.bind(&name, channel_id, now) {
            Ok(ended) => {
                for end in ended {
                    self.finish_session(end);
                }
                info!("'{}' logged in on channel {}", name, channel_id);
                self.broadcast_chat(&name, "is online");
                let bundle = self.lobby_bundle(&name, true, now);
                self.registry.send_to_user(&name, &bundle);
            }
            Err(err) => {
                // The channel vanished between opening and authenticating.
                warn!("Could not bind '{}' to channel {}: {}", name, channel_id, err);
            }
        }
    }

    /// Credits a finished session's time to the account and, unless the
    /// user is already back, announces the departure.
    fn finish_session(&mut self, end: SessionEnd) {
        if let Err(err) = self.accounts.add_online_seconds(&end.name, end.online_seconds) {
            error!("Failed to credit session time for '{}': {}", end.name, err);
        }
        if !self.registry.is_online(&end.name) {
            self.broadcast_chat(&end.name, "went offline");
        }
    }

    fn handle_invite(&mut self, name: &str, target: &str, accept: bool, now: Instant) {
        if self.accounts.find(target).is_none() {
            debug!("'{}' invited unknown user '{}'", name, target);
            return;
        }
        if accept {
            self.invitations.invite(name, target, now);
        } else {
            self.invitations.cancel(name, target);
        }
    }

    fn handle_action(&mut self, name: &str, action: &ActionRequest, now: Instant) {
        if let Err(err) = self.sessions.apply(&mut self.accounts, name, action, now) {
            // A rules error that is not an ordinary rejection means the match
            // state itself is broken.
            match &err {
                SessionError::Match(MatchError::Rules(rules_err))
                    if !rules_err.is_rejection() =>
                {
                    error!("Match state violation on action by '{}': {}", name, err);
                }
                _ => debug!("Action by '{}' rejected: {}", name, err),
            }
            let notice = ServerMessage {
                kind: "action_error".to_string(),
                text: Some(err.to_string()),
                ..Default::default()
            };
            self.registry.send_to_user(name, &notice);
        }
    }

    /// Starts matches for freshly agreed invitation pairs and delivers
    /// queued match updates to their participants.
    fn flush_events(&mut self, now: Instant) {
        for (source, target) in self.invitations.drain_agreed() {
            if !self.registry.is_online(&source) || !self.registry.is_online(&target) {
                debug!(
                    "No match for '{}' and '{}', one of them went offline",
                    source, target
                );
                continue;
            }
            let seats = match (self.accounts.find(&source), self.accounts.find(&target)) {
                (Some(first), Some(second)) => (
                    (first.name.clone(), first.rank),
                    (second.name.clone(), second.rank),
                ),
                _ => {
                    error!(
                        "Agreed players '{}' and '{}' are missing from the account store",
                        source, target
                    );
                    continue;
                }
            };
            match self.sessions.start_match(seats.0, seats.1, now) {
                Ok(_) => debug!("{} matches running", self.sessions.match_count()),
                Err(err) => debug!("Could not start the agreed match: {}", err),
            }
        }
        for MatchUpdate {
            participants,
            snapshot,
        } in self.sessions.drain_updates()
        {
            let message = ServerMessage {
                kind: "current_match".to_string(),
                game: Some(snapshot),
                ..Default::default()
            };
            for name in participants {
                self.registry.send_to_user(&name, &message);
            }
        }
    }

    /// Periodic housekeeping: dead and idle connections, expired
    /// invitations, overdue clocks, then the lobby push to everyone online.
    fn maintain(&mut self, now: Instant) {
        for end in self.registry.sweep(now) {
            self.finish_session(end);
        }
        self.invitations.sweep(now);
        self.sessions.sweep_time(&mut self.accounts, now);
        self.flush_events(now);
        if now >= self.next_presence {
            self.next_presence = now + self.config.presence_every;
            for name in self.registry.online_names() {
                let bundle = self.lobby_bundle(&name, false, now);
                self.registry.send_to_user(&name, &bundle);
            }
        }
    }

    fn broadcast_chat(&self, name: &str, text: &str) {
        let message = ServerMessage {
            kind: "chat_message".to_string(),
            name: Some(name.to_string()),
            time: Some(Local::now().format("%H:%M:%S").to_string()),
            text: Some(text.to_string()),
            ..Default::default()
        };
        self.registry.send_to_all_online(&message);
    }

    /// The lobby as `for_name` sees it: everyone else online, flagged with
    /// whether they were already invited and whether they are playing.
    fn lobby_listing(&self, for_name: &str, now: Instant) -> Vec<LobbyUser> {
        let mut users = Vec::new();
        for name in self.registry.online_names() {
            if name == for_name {
                continue;
            }
            let Some(record) = self.accounts.find(&name) else {
                error!("Online user '{}' has no account record", name);
                continue;
            };
            users.push(LobbyUser {
                profile: self.live_profile(record, now),
                invited: self.invitations.is_invited(for_name, &name),
                playing: self.sessions.is_playing(&name),
            });
        }
        users
    }

    fn live_profile(&self, record: &AccountRecord, now: Instant) -> UserProfile {
        let mut profile = record.profile();
        profile.online_seconds += self.registry.session_seconds(&record.name, now);
        profile
    }

    fn online_users_message(&self, for_name: &str, now: Instant) -> ServerMessage {
        ServerMessage {
            kind: "online_users".to_string(),
            users: Some(self.lobby_listing(for_name, now)),
            ..Default::default()
        }
    }

    fn incoming_invites_message(&self, for_name: &str, now: Instant) -> ServerMessage {
        let mut inviters = Vec::new();
        for name in self.invitations.inviters_of(for_name) {
            let Some(record) = self.accounts.find(&name) else {
                continue;
            };
            inviters.push(LobbyUser {
                profile: self.live_profile(record, now),
                invited: self.invitations.is_invited(for_name, &name),
                playing: self.sessions.is_playing(&name),
            });
        }
        ServerMessage {
            kind: "incoming_invites".to_string(),
            inviters: Some(inviters),
            ..Default::default()
        }
    }

    fn current_match_message(&self, name: &str) -> ServerMessage {
        ServerMessage {
            kind: "current_match".to_string(),
            game: self.sessions.current_snapshot(name),
            ..Default::default()
        }
    }

    /// The standing bundle a client keeps itself current from: own profile,
    /// the lobby, pending invites and, right after login, the match it may
    /// still be in.
    fn lobby_bundle(&self, name: &str, include_match: bool, now: Instant) -> ServerMessage {
        let mut messages = Vec::new();
        if let Some(record) = self.accounts.find(name) {
            messages.push(ServerMessage {
                kind: "login_success".to_string(),
                profile: Some(self.live_profile(record, now)),
                ..Default::default()
            });
        }
        messages.push(self.online_users_message(name, now));
        messages.push(self.incoming_invites_message(name, now));
        if include_match {
            messages.push(self.current_match_message(name));
        }
        ServerMessage {
            kind: "batch".to_string(),
            messages: Some(messages),
            ..Default::default()
        }
    }
}

impl Actor for GameServer {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Context<Self>) {
        info!("Game server started");
        ctx.run_interval(Duration::from_secs(1), |server, _| {
            server.maintain(Instant::now());
        });
    }
}

impl Handler<Connect> for GameServer {
    type Result = ();

    fn handle(&mut self, msg: Connect, _: &mut Context<Self>) {
        let peer = msg.channel.peer_or_unknown().to_string();
        if self.banned_ips.matches_prefix(&peer) {
            warn!("Refused connection from banned address {}", peer);
            let notice =
                ServerMessage::error("connections from your address are not accepted");
            msg.channel.send(notice.to_frame());
            msg.channel.close();
            return;
        }
        self.registry.opened(msg.channel, Instant::now());
        debug!("{} connections open", self.registry.connection_count());
    }
}

impl Handler<Disconnect> for GameServer {
    type Result = ();

    fn handle(&mut self, msg: Disconnect, _: &mut Context<Self>) {
        if let Some(end) = self.registry.closed(msg.channel_id, Instant::now()) {
            info!("'{}' disconnected", end.name);
            self.finish_session(end);
        }
    }
}

impl Handler<Inbound> for GameServer {
    type Result = ();

    fn handle(&mut self, msg: Inbound, _: &mut Context<Self>) {
        let now = Instant::now();
        self.dispatch(msg.channel_id, msg.message, now);
        self.flush_events(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::messages::{CloseChannel, OutboundFrame};
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

    struct Client {
        id: Uuid,
        frames: Arc<Mutex<Vec<String>>>,
        closed: Arc<AtomicBool>,
    }

    impl Client {
        fn frame_with(&self, needle: &str) -> Option<String> {
            self.frames
                .lock()
                .unwrap()
                .iter()
                .find(|frame| frame.contains(needle))
                .cloned()
        }

        /// Matches on the frame prefix, so a standalone message is not
        /// confused with the same kind nested inside a batch.
        fn frame_starting(&self, prefix: &str) -> Option<String> {
            self.frames
                .lock()
                .unwrap()
                .iter()
                .find(|frame| frame.starts_with(prefix))
                .cloned()
        }
    }

    fn stub_client(peer: &str) -> (ChannelHandle, Client) {
        let frames = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let addr = Collector {
            frames: frames.clone(),
            closed: closed.clone(),
        }
        .start();
        let id = Uuid::new_v4();
        let channel = ChannelHandle::new(
            id,
            Some(peer.to_string()),
            addr.clone().recipient(),
            addr.recipient(),
        );
        (channel, Client { id, frames, closed })
    }

    async fn connect(server: &Addr<GameServer>, peer: &str) -> Client {
        let (channel, client) = stub_client(peer);
        server.send(Connect { channel }).await.unwrap();
        client
    }

    fn message(kind: &str) -> ClientMessage {
        ClientMessage {
            kind: kind.to_string(),
            name: None,
            password_hash: None,
            text: None,
            target_name: None,
            accept: None,
            action: None,
        }
    }

    async fn send(server: &Addr<GameServer>, client: &Client, message: ClientMessage) {
        server
            .send(Inbound {
                channel_id: client.id,
                message,
            })
            .await
            .unwrap();
        actix_rt::time::sleep(Duration::from_millis(20)).await;
    }

    async fn login(server: &Addr<GameServer>, client: &Client, name: &str) {
        let mut login = message("login");
        login.name = Some(name.to_string());
        login.password_hash = Some("pw".to_string());
        send(server, client, login).await;
    }

    fn accounts_with(tag: &str, names: &[&str]) -> AccountStore {
        let path = std::env::temp_dir().join(format!(
            "chess-server-{}-{}.json",
            tag,
            Uuid::new_v4()
        ));
        let mut accounts =
            AccountStore::load(path, BanList::default(), 1000).unwrap();
        for name in names {
            accounts.create(name, "pw").unwrap();
        }
        accounts
    }

    fn server_with_accounts(tag: &str, names: &[&str]) -> Addr<GameServer> {
        GameServer::new(
            ServerConfig::default(),
            accounts_with(tag, names),
            BanList::default(),
        )
        .start()
    }

    #[actix_rt::test]
    async fn login_announces_and_bundles_the_lobby() {
        let server = server_with_accounts("login", &["alice"]);
        let client = connect(&server, "10.0.0.1").await;
        login(&server, &client, "alice").await;

        let chat = client.frame_with("chat_message").unwrap();
        assert!(chat.contains("is online"));
        let bundle = client.frame_with("batch").unwrap();
        assert!(bundle.contains("login_success"));
        assert!(bundle.contains("online_users"));
        assert!(bundle.contains("incoming_invites"));
        assert!(bundle.contains("current_match"));
        assert!(!client.closed.load(Ordering::SeqCst));
    }

    #[actix_rt::test]
    async fn protected_kinds_need_a_login_first() {
        let server = server_with_accounts("auth", &["alice"]);
        let client = connect(&server, "10.0.0.1").await;
        send(&server, &client, message("get_online_users")).await;

        let notice = client.frame_with("auth_error").unwrap();
        assert!(notice.contains("try logging in again"));
        assert!(client.closed.load(Ordering::SeqCst));
    }

    #[actix_rt::test]
    async fn wrong_password_costs_the_connection() {
        let server = server_with_accounts("badpw", &["alice"]);
        let client = connect(&server, "10.0.0.1").await;
        let mut login = message("login");
        login.name = Some("alice".to_string());
        login.password_hash = Some("wrong".to_string());
        send(&server, &client, login).await;

        let notice = client.frame_with("login_error").unwrap();
        assert!(notice.contains("wrong login or password"));
        assert!(client.closed.load(Ordering::SeqCst));
    }

    #[actix_rt::test]
    async fn creating_an_account_logs_straight_in() {
        let server = server_with_accounts("create", &[]);
        let client = connect(&server, "10.0.0.1").await;
        let mut create = message("create_account");
        create.name = Some("carol".to_string());
        create.password_hash = Some("pw".to_string());
        send(&server, &client, create).await;

        let bundle = client.frame_with("login_success").unwrap();
        assert!(bundle.contains("carol"));

        // The name is now taken.
        let other = connect(&server, "10.0.0.2").await;
        let mut create = message("create_account");
        create.name = Some("carol".to_string());
        create.password_hash = Some("pw".to_string());
        send(&server, &other, create).await;
        let notice = other.frame_with("create_account_error").unwrap();
        assert!(notice.contains("already taken"));
        assert!(other.closed.load(Ordering::SeqCst));
    }

    #[actix_rt::test]
    async fn missing_parameters_are_named_and_forgiven() {
        let server = server_with_accounts("params", &["alice"]);
        let client = connect(&server, "10.0.0.1").await;
        login(&server, &client, "alice").await;

        send(&server, &client, message("chat_send")).await;
        let notice = client.frame_with("missing or invalid parameter").unwrap();
        assert!(notice.contains("'text'"));
        assert!(!client.closed.load(Ordering::SeqCst));

        send(&server, &client, message("no_such_kind")).await;
        let notice = client.frame_with("unknown message kind").unwrap();
        assert!(notice.contains("no_such_kind"));
        assert!(!client.closed.load(Ordering::SeqCst));
    }

    #[actix_rt::test]
    async fn mutual_invitations_start_a_match() {
        let server = server_with_accounts("match", &["alice", "bob"]);
        let alice = connect(&server, "10.0.0.1").await;
        let bob = connect(&server, "10.0.0.2").await;
        login(&server, &alice, "alice").await;
        login(&server, &bob, "bob").await;

        let mut invite = message("invite");
        invite.target_name = Some("bob".to_string());
        invite.accept = Some(true);
        send(&server, &alice, invite).await;
        assert!(alice.frame_starting(r#"{"kind":"current_match""#).is_none());

        let mut invite = message("invite");
        invite.target_name = Some("alice".to_string());
        invite.accept = Some(true);
        send(&server, &bob, invite).await;

        for client in [&alice, &bob] {
            let update = client.frame_starting(r#"{"kind":"current_match""#).unwrap();
            assert!(update.contains(r#""finished":false"#));
            assert!(update.contains(r#""board""#));
        }
    }

    #[actix_rt::test]
    async fn chat_lines_reach_everyone_online() {
        let server = server_with_accounts("chat", &["alice", "bob"]);
        let alice = connect(&server, "10.0.0.1").await;
        let bob = connect(&server, "10.0.0.2").await;
        login(&server, &alice, "alice").await;
        login(&server, &bob, "bob").await;

        let mut chat = message("chat_send");
        chat.text = Some("good morning".to_string());
        send(&server, &alice, chat).await;

        for client in [&alice, &bob] {
            let line = client.frame_with("good morning").unwrap();
            assert!(line.contains(r#""kind":"chat_message""#));
            assert!(line.contains(r#""name":"alice""#));
        }
    }

    #[actix_rt::test]
    async fn the_presence_tick_rebundles_the_lobby() {
        let now = Instant::now();
        let mut server = GameServer::new(
            ServerConfig::default(),
            accounts_with("presence", &["alice"]),
            BanList::default(),
        );
        let (channel, client) = stub_client("10.0.0.1");
        server.registry.opened(channel, now);
        let mut login = message("login");
        login.name = Some("alice".to_string());
        login.password_hash = Some("pw".to_string());
        server.dispatch(client.id, login, now);

        // One second short of the interval nothing is pushed.
        server.maintain(now + Duration::from_secs(6));
        server.maintain(now + Duration::from_secs(8));
        actix_rt::time::sleep(Duration::from_millis(20)).await;

        let frames = client.frames.lock().unwrap();
        let bundles: Vec<&String> = frames
            .iter()
            .filter(|frame| frame.starts_with(r#"{"kind":"batch""#))
            .collect();
        assert_eq!(bundles.len(), 2);
        // The login bundle reports the current match, the periodic one
        // leaves it to the match-change pushes.
        assert!(bundles[0].contains("current_match"));
        assert!(!bundles[1].contains("current_match"));
        assert!(bundles[1].contains("login_success"));
        assert!(bundles[1].contains("online_users"));
        assert!(bundles[1].contains("incoming_invites"));
    }

    #[actix_rt::test]
    async fn banned_addresses_are_turned_away() {
        let ban_path = std::env::temp_dir().join(format!("chess-ipban-{}.txt", Uuid::new_v4()));
        std::fs::write(&ban_path, "10.6.6.\n").unwrap();
        let banned = BanList::load(&ban_path);
        let path = std::env::temp_dir().join(format!("chess-server-ban-{}.json", Uuid::new_v4()));
        let accounts = AccountStore::load(path, BanList::default(), 1000).unwrap();
        let server = GameServer::new(ServerConfig::default(), accounts, banned).start();

        let client = connect(&server, "10.6.6.21").await;
        actix_rt::time::sleep(Duration::from_millis(20)).await;
        assert!(client.frame_with("not accepted").is_some());
        assert!(client.closed.load(Ordering::SeqCst));
        let _ = std::fs::remove_file(&ban_path);
    }
}
