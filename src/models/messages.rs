use actix::prelude::*;
use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::game::board::{PieceKind, Square};
use crate::game::chess_match::MatchSnapshot;
use crate::models::profile::{LobbyUser, UserProfile};

/// Frame pushed to a websocket session actor for delivery to its client.
#[derive(Message, Debug, Clone)]
#[rtype(result = "()")]
pub struct OutboundFrame(pub String);

/// Tells a websocket session actor to close the underlying connection.
#[derive(Message, Debug, Clone, Copy)]
#[rtype(result = "()")]
pub struct CloseChannel;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("missing or invalid parameter '{0}'")]
    BadParameter(&'static str),
    #[error("unknown message kind '{0}'")]
    UnknownKind(String),
}

/// Pulls a required parameter out of a client message, naming the offender
/// when it is absent.
pub fn require<T>(value: Option<T>, key: &'static str) -> Result<T, ProtocolError> {
    value.ok_or(ProtocolError::BadParameter(key))
}

/// Message sent from client to server. `kind` selects the operation, the
/// remaining fields carry its parameters.
#[derive(Deserialize, Debug, Clone)]
pub struct ClientMessage {
    pub kind: String,
    pub name: Option<String>,
    pub password_hash: Option<String>,
    pub text: Option<String>,
    pub target_name: Option<String>,
    pub accept: Option<bool>,
    pub action: Option<ActionRequest>,
}

/// A match action requested by a player.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionRequest {
    Move { from: Square, to: Square },
    ChoosePromotion { piece: PieceKind },
    Surrender,
    OfferDraw,
}

/// Message sent from server to client. `kind` tells the client what it is
/// looking at; absent fields are left off the wire.
#[derive(Serialize, Debug, Clone, Default)]
pub struct ServerMessage {
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<UserProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<LobbyUser>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inviters: Option<Vec<LobbyUser>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game: Option<MatchSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<ServerMessage>>,
}

impl ServerMessage {
    pub fn error(text: impl Into<String>) -> ServerMessage {
        ServerMessage {
            kind: "error".to_string(),
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// Serializes for the wire. Serialization of our own types only fails
    /// on a bug, in which case the client still gets a well-formed error.
    pub fn to_frame(&self) -> String {
        match serde_json::to_string(self) {
            Ok(frame) => frame,
            Err(err) => {
                warn!("Failed to serialize outbound message: {}", err);
                "{\"kind\":\"error\",\"text\":\"internal server error\"}".to_string()
            }
        }
    }
}
