//! Private channel grants
//!
//! A grant is `<key>:<hex hmac_sha256(secret, "<socket_id>:<channel>")>`,
//! the format channel client libraries send back when subscribing.

use hmac::{Hmac, Mac};
use livedesk_shared::ChannelName;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::auth::Caller;

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies channel subscription grants
#[derive(Clone)]
pub struct ChannelAuthorizer {
    key: String,
    secret: Vec<u8>,
}

impl ChannelAuthorizer {
    pub fn new(key: &str, secret: &str) -> Self {
        Self {
            key: key.to_string(),
            secret: secret.as_bytes().to_vec(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Produce the grant for `socket_id` on `channel`
    pub fn sign(&self, socket_id: &str, channel: &str) -> Result<String, ChannelAuthError> {
        if !is_valid_socket_id(socket_id) {
            return Err(ChannelAuthError::InvalidSocketId);
        }

        let signature = self.signature(&format!("{}:{}", socket_id, channel))?;
        Ok(format!("{}:{}", self.key, signature))
    }

    /// Check a grant presented by a subscriber
    pub fn verify(&self, socket_id: &str, channel: &str, grant: &str) -> bool {
        match self.sign(socket_id, channel) {
            Ok(expected) => constant_time_compare(grant, &expected),
            Err(_) => false,
        }
    }

    /// Hex HMAC-SHA256 of `payload` under the app secret
    pub fn signature(&self, payload: &str) -> Result<String, ChannelAuthError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| ChannelAuthError::HmacInitFailed)?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

/// Socket ids look like `123.456`
pub fn is_valid_socket_id(socket_id: &str) -> bool {
    let Some((left, right)) = socket_id.split_once('.') else {
        return false;
    };

    let digits = |s: &str| !s.is_empty() && s.len() <= 20 && s.bytes().all(|b| b.is_ascii_digit());
    digits(left) && digits(right)
}

/// Decide whether `caller` may subscribe to `channel`.
///
/// `conversation_exists` is only consulted for conversation channels.
pub fn check_scope(
    caller: &Caller,
    channel: ChannelName,
    conversation_exists: bool,
) -> Result<(), ChannelAuthError> {
    match (caller, channel) {
        (Caller::Anonymous, _) => Err(ChannelAuthError::Unauthenticated),

        (Caller::Agent(user), ChannelName::Agent(agent_id)) if user.user_id == agent_id => Ok(()),
        (Caller::Agent(_), ChannelName::Conversation(_)) if conversation_exists => Ok(()),

        (Caller::Visitor { conversation_id }, ChannelName::Conversation(id))
            if *conversation_id == id && conversation_exists =>
        {
            Ok(())
        }

        _ => Err(ChannelAuthError::OutOfScope),
    }
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        let dummy = vec![0u8; a.len()];
        let _ = a.as_bytes().ct_eq(&dummy);
        return false;
    }

    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelAuthError {
    #[error("Invalid socket id")]
    InvalidSocketId,
    #[error("Invalid channel name: {0}")]
    InvalidChannel(String),
    #[error("Authentication required")]
    Unauthenticated,
    #[error("Channel is outside the caller's scope")]
    OutOfScope,
    #[error("HMAC initialization failed")]
    HmacInitFailed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthUser;
    use uuid::Uuid;

    fn agent(user_id: Uuid) -> Caller {
        Caller::Agent(AuthUser {
            user_id,
            email: "agent@example.com".to_string(),
        })
    }

    #[test]
    fn test_known_grant_vector() {
        let authorizer = ChannelAuthorizer::new("278d425bdf160c739803", "7ad3773142a6692b25b8");

        let grant = authorizer.sign("1234.1234", "private-foobar").unwrap();
        assert_eq!(
            grant,
            "278d425bdf160c739803:58df8b0c36d6982b82c3ecf6b4662e34fe8c25bba48f5369f135bf843651c3a4"
        );
        assert!(authorizer.verify("1234.1234", "private-foobar", &grant));
    }

    #[test]
    fn test_grant_bound_to_socket_and_channel() {
        let authorizer = ChannelAuthorizer::new("key", "a-channel-secret-value");
        let grant = authorizer.sign("1.2", "private-agent-x").unwrap();

        assert!(!authorizer.verify("1.3", "private-agent-x", &grant));
        assert!(!authorizer.verify("1.2", "private-agent-y", &grant));
        assert!(!authorizer.verify("1.2", "private-agent-x", "key:deadbeef"));
    }

    #[test]
    fn test_socket_id_format() {
        assert!(is_valid_socket_id("1234.5678"));
        assert!(!is_valid_socket_id("1234"));
        assert!(!is_valid_socket_id("12a4.5678"));
        assert!(!is_valid_socket_id(".5678"));
        assert!(!is_valid_socket_id("1.2.3"));

        let authorizer = ChannelAuthorizer::new("key", "a-channel-secret-value");
        assert!(matches!(
            authorizer.sign("bogus", "private-foobar"),
            Err(ChannelAuthError::InvalidSocketId)
        ));
    }

    #[test]
    fn test_agent_scope() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let conversation = Uuid::new_v4();

        assert!(check_scope(&agent(me), ChannelName::Agent(me), false).is_ok());
        assert!(matches!(
            check_scope(&agent(me), ChannelName::Agent(other), false),
            Err(ChannelAuthError::OutOfScope)
        ));
        assert!(check_scope(&agent(me), ChannelName::Conversation(conversation), true).is_ok());
        assert!(check_scope(&agent(me), ChannelName::Conversation(conversation), false).is_err());
    }

    #[test]
    fn test_visitor_scope() {
        let mine = Uuid::new_v4();
        let theirs = Uuid::new_v4();
        let visitor = Caller::Visitor {
            conversation_id: mine,
        };

        assert!(check_scope(&visitor, ChannelName::Conversation(mine), true).is_ok());
        assert!(check_scope(&visitor, ChannelName::Conversation(theirs), true).is_err());
        assert!(check_scope(&visitor, ChannelName::Agent(Uuid::new_v4()), false).is_err());
    }

    #[test]
    fn test_anonymous_is_unauthenticated() {
        assert!(matches!(
            check_scope(&Caller::Anonymous, ChannelName::Agent(Uuid::new_v4()), false),
            Err(ChannelAuthError::Unauthenticated)
        ));
    }
}
