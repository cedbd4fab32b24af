//! Protocol-level addresses (JIDs).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use cr_domain::error::{Error, Result};

/// Server appended to bare phone numbers.
pub const DEFAULT_SERVER: &str = "s.whatsapp.net";

/// A protocol address: `user@server`.
///
/// The user part is a phone-derived digit string; bare digits parse with
/// the default server appended, so callers can pass `"5511999999999"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Jid {
    pub user: String,
    pub server: String,
}

impl Jid {
    pub fn new(user: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            server: server.into(),
        }
    }

    /// Parse a recipient address, normalizing bare numbers.
    pub fn parse(input: &str) -> Result<Self> {
        let (user, server) = match input.split_once('@') {
            Some((u, s)) => (u, s),
            None => (input, DEFAULT_SERVER),
        };

        let digits = user.strip_prefix('+').unwrap_or(user);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidInput(format!(
                "invalid recipient {input:?}: user part must be a phone number"
            )));
        }
        if server.is_empty()
            || !server
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'-')
        {
            return Err(Error::InvalidInput(format!(
                "invalid recipient {input:?}: bad server part"
            )));
        }

        Ok(Self::new(digits, server))
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.server)
    }
}

impl FromStr for Jid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Jid {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Jid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_number_gets_default_server() {
        let jid = Jid::parse("5511999999999").unwrap();
        assert_eq!(jid.user, "5511999999999");
        assert_eq!(jid.server, DEFAULT_SERVER);
        assert_eq!(jid.to_string(), "5511999999999@s.whatsapp.net");
    }

    #[test]
    fn full_address_round_trips() {
        let jid = Jid::parse("5511999999999@s.whatsapp.net").unwrap();
        assert_eq!(jid.to_string(), "5511999999999@s.whatsapp.net");
    }

    #[test]
    fn leading_plus_is_stripped() {
        let jid = Jid::parse("+5511999999999").unwrap();
        assert_eq!(jid.user, "5511999999999");
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(Jid::parse("not-a-number!!").is_err());
        assert!(Jid::parse("").is_err());
        assert!(Jid::parse("@s.whatsapp.net").is_err());
        assert!(Jid::parse("123@").is_err());
        assert!(Jid::parse("abc@s.whatsapp.net").is_err());
    }

    #[test]
    fn serde_as_string() {
        let jid = Jid::parse("123@g.us").unwrap();
        let json = serde_json::to_string(&jid).unwrap();
        assert_eq!(json, "\"123@g.us\"");
        let back: Jid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, jid);
    }
}
