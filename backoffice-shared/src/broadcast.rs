//! Broadcast channel authorization
//!
//! Realtime clients subscribe to private and presence channels through a
//! Pusher-compatible socket server. Before joining, the client asks the API
//! to sign `socket_id:channel_name` (plus the presence payload for presence
//! channels) with the application secret; the socket server verifies the
//! signature with the same secret.
//!
//! Supported channels:
//!
//! - `private-user.{user_uuid}`: notifications for one user
//! - `presence-chat.{conversation_uuid}`: live view of an AI conversation
//!
//! # Example
//!
//! ```
//! use backoffice_shared::broadcast::{Channel, sign};
//! use uuid::Uuid;
//!
//! let user_id = Uuid::new_v4();
//! let channel = Channel::parse(&format!("private-user.{}", user_id)).unwrap();
//! assert_eq!(channel, Channel::PrivateUser(user_id));
//!
//! let auth = sign("app-key", "app-secret", "1234.5678", &channel.to_string(), None);
//! assert!(auth.starts_with("app-key:"));
//! ```

use std::fmt;

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

const PRIVATE_USER_PREFIX: &str = "private-user.";
const PRESENCE_CHAT_PREFIX: &str = "presence-chat.";

/// Errors from channel authorization requests
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BroadcastError {
    #[error("Invalid socket id")]
    InvalidSocketId,

    #[error("Unknown channel: {0}")]
    UnknownChannel(String),
}

/// A channel the API knows how to authorize
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    PrivateUser(Uuid),
    PresenceChat(Uuid),
}

impl Channel {
    /// Parses a channel name
    ///
    /// Unknown prefixes and malformed ids are both `UnknownChannel`. Ids
    /// must be lowercase hyphenated, so the parsed channel displays as
    /// exactly `name` and a signature over either string is the same.
    pub fn parse(name: &str) -> Result<Self, BroadcastError> {
        let unknown = || BroadcastError::UnknownChannel(name.to_string());

        let channel = if let Some(id) = name.strip_prefix(PRIVATE_USER_PREFIX) {
            Uuid::parse_str(id).map(Channel::PrivateUser)
        } else if let Some(id) = name.strip_prefix(PRESENCE_CHAT_PREFIX) {
            Uuid::parse_str(id).map(Channel::PresenceChat)
        } else {
            return Err(unknown());
        }
        .map_err(|_| unknown())?;

        if channel.to_string() != name {
            return Err(unknown());
        }
        Ok(channel)
    }

    pub fn is_presence(&self) -> bool {
        matches!(self, Channel::PresenceChat(_))
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::PrivateUser(id) => write!(f, "{}{}", PRIVATE_USER_PREFIX, id),
            Channel::PresenceChat(id) => write!(f, "{}{}", PRESENCE_CHAT_PREFIX, id),
        }
    }
}

/// Presence member payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresenceData {
    pub user_id: Uuid,
    pub user_info: PresenceUserInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresenceUserInfo {
    pub name: String,
    pub email: String,
}

/// Signed response returned to the socket client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelAuth {
    pub auth: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_data: Option<String>,
}

/// Validates a socket id of the form `<digits>.<digits>`
pub fn validate_socket_id(socket_id: &str) -> Result<(), BroadcastError> {
    let valid = socket_id
        .split_once('.')
        .map(|(left, right)| {
            !left.is_empty()
                && !right.is_empty()
                && left.bytes().all(|b| b.is_ascii_digit())
                && right.bytes().all(|b| b.is_ascii_digit())
        })
        .unwrap_or(false);

    if valid {
        Ok(())
    } else {
        Err(BroadcastError::InvalidSocketId)
    }
}

/// Hex-encoded HMAC-SHA256 of `message` under `secret`
pub fn hmac_hex(secret: &str, message: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Builds the `auth` value `<app_key>:<signature>`
///
/// The signed string is `socket_id:channel` with `:channel_data` appended
/// for presence channels.
pub fn sign(
    app_key: &str,
    secret: &str,
    socket_id: &str,
    channel: &str,
    channel_data: Option<&str>,
) -> String {
    let message = match channel_data {
        Some(data) => format!("{}:{}:{}", socket_id, channel, data),
        None => format!("{}:{}", socket_id, channel),
    };

    format!("{}:{}", app_key, hmac_hex(secret, &message))
}

/// Signs a channel subscription, serializing presence data when given
pub fn authorize(
    app_key: &str,
    secret: &str,
    socket_id: &str,
    channel: &Channel,
    presence: Option<&PresenceData>,
) -> Result<ChannelAuth, serde_json::Error> {
    let channel_data = presence.map(serde_json::to_string).transpose()?;
    let auth = sign(
        app_key,
        secret,
        socket_id,
        &channel.to_string(),
        channel_data.as_deref(),
    );

    Ok(ChannelAuth { auth, channel_data })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hmac_matches_rfc4231_vector() {
        assert_eq!(
            hmac_hex("Jefe", "what do ya want for nothing?"),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_parse_channels() {
        let id = Uuid::new_v4();

        assert_eq!(
            Channel::parse(&format!("private-user.{}", id)),
            Ok(Channel::PrivateUser(id))
        );
        assert_eq!(
            Channel::parse(&format!("presence-chat.{}", id)),
            Ok(Channel::PresenceChat(id))
        );
        assert!(Channel::parse("private-user.not-a-uuid").is_err());
        assert!(Channel::parse(&format!("private-admin.{}", id)).is_err());
        assert!(Channel::parse("").is_err());
    }

    #[test]
    fn test_parse_rejects_non_canonical_ids() {
        let id = Uuid::new_v4();
        let upper = id.to_string().to_uppercase();

        assert!(Channel::parse(&format!("private-user.{}", upper)).is_err());
        assert!(Channel::parse(&format!("presence-chat.{}", id.simple())).is_err());
        assert!(Channel::parse(&format!("private-user.{{{}}}", id)).is_err());
        assert!(Channel::parse(&format!("private-user.urn:uuid:{}", id)).is_err());
    }

    #[test]
    fn test_channel_display_round_trips() {
        let channel = Channel::PresenceChat(Uuid::new_v4());
        assert_eq!(Channel::parse(&channel.to_string()), Ok(channel));
        assert!(channel.is_presence());
    }

    #[test]
    fn test_validate_socket_id() {
        assert!(validate_socket_id("1234.5678").is_ok());
        assert!(validate_socket_id("1.2").is_ok());
        assert_eq!(validate_socket_id("1234"), Err(BroadcastError::InvalidSocketId));
        assert!(validate_socket_id("1234.").is_err());
        assert!(validate_socket_id(".5678").is_err());
        assert!(validate_socket_id("12a4.5678").is_err());
        assert!(validate_socket_id("1.2.3").is_err());
        assert!(validate_socket_id("1234.5678:private-user.x").is_err());
    }

    #[test]
    fn test_sign_private_channel() {
        let auth = sign("key", "secret", "1234.5678", "private-user.abc", None);
        let expected = hmac_hex("secret", "1234.5678:private-user.abc");
        assert_eq!(auth, format!("key:{}", expected));
    }

    #[test]
    fn test_authorize_presence_channel_signs_channel_data() {
        let conversation_id = Uuid::new_v4();
        let channel = Channel::PresenceChat(conversation_id);
        let presence = PresenceData {
            user_id: Uuid::new_v4(),
            user_info: PresenceUserInfo {
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
            },
        };

        let result = authorize("key", "secret", "1.2", &channel, Some(&presence)).unwrap();
        let data = result.channel_data.clone().unwrap();

        let parsed: PresenceData = serde_json::from_str(&data).unwrap();
        assert_eq!(parsed, presence);

        let message = format!("1.2:presence-chat.{}:{}", conversation_id, data);
        assert_eq!(result.auth, format!("key:{}", hmac_hex("secret", &message)));
    }
}
