//! Identities of accounts, signers and code units

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

/// Seconds since the unix epoch.
pub type Timestamp = u64;

/// A 32-byte identity. Externally controlled identities are ed25519 public
/// keys; wallets, modules and other code units use derived identities.
///
/// Ordering is byte-wise, which is the order relayed signatures must follow.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Identity(pub [u8; 32]);

/// Identifier of a module code unit.
pub type ModuleId = Identity;

/// Identifier of an upgrade coordinator.
pub type UpgraderId = Identity;

impl Identity {
    pub const NULL: Identity = Identity([0u8; 32]);

    pub fn is_null(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Derive a deterministic identity for a named code unit.
    pub fn derive(label: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"bastion:code:");
        hasher.update(label.as_bytes());
        Identity(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl From<[u8; 32]> for Identity {
    fn from(bytes: [u8; 32]) -> Self {
        Identity(bytes)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // first 4 bytes are enough to tell identities apart in logs
        write!(f, "Identity(0x{}..)", hex::encode(&self.0[..4]))
    }
}

impl FromStr for Identity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(raw).map_err(|e| format!("Invalid identity hex: {}", e))?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| format!("Identity must be 32 bytes, got {}", v.len()))?;
        Ok(Identity(array))
    }
}

impl Serialize for Identity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for Identity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            s.parse().map_err(serde::de::Error::custom)
        } else {
            <[u8; 32]>::deserialize(deserializer).map(Identity)
        }
    }
}
