//! Canonical byte encodings for hashing/signing and module call payloads.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::crypto::sha256;
use crate::error::WalletError;
use crate::identity::Identity;

/// Objects with a canonical binary representation for hashing/signing.
/// Must stay deterministic across platforms and versions.
pub trait CanonicalSerialize {
    fn write_canonical(&self, out: &mut Vec<u8>);
}

impl CanonicalSerialize for u8 {
    fn write_canonical(&self, out: &mut Vec<u8>) {
        out.push(*self);
    }
}

impl CanonicalSerialize for u64 {
    fn write_canonical(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_be_bytes());
    }
}

impl CanonicalSerialize for bool {
    fn write_canonical(&self, out: &mut Vec<u8>) {
        out.push(u8::from(*self));
    }
}

impl CanonicalSerialize for Identity {
    fn write_canonical(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.as_bytes());
    }
}

impl CanonicalSerialize for [u8] {
    fn write_canonical(&self, out: &mut Vec<u8>) {
        (self.len() as u64).write_canonical(out);
        out.extend_from_slice(self);
    }
}

impl CanonicalSerialize for str {
    fn write_canonical(&self, out: &mut Vec<u8>) {
        self.as_bytes().write_canonical(out);
    }
}

impl CanonicalSerialize for String {
    fn write_canonical(&self, out: &mut Vec<u8>) {
        self.as_str().write_canonical(out);
    }
}

impl<T: CanonicalSerialize> CanonicalSerialize for Option<T> {
    fn write_canonical(&self, out: &mut Vec<u8>) {
        match self {
            None => out.push(0),
            Some(value) => {
                out.push(1);
                value.write_canonical(out);
            }
        }
    }
}

/// First four bytes of the SHA-256 of a function signature.
pub type Selector = [u8; 4];

pub fn selector(signature: &str) -> Selector {
    let hash = sha256(&[signature.as_bytes()]);
    [hash[0], hash[1], hash[2], hash[3]]
}

/// A module invocation: `selector || account || bincode(args)`.
///
/// Every module entry point acts on one wallet, which is carried in the fixed
/// header so relays can check it without knowing the argument types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub selector: Selector,
    pub account: Identity,
    pub args: Vec<u8>,
}

const CALL_HEADER_LEN: usize = 4 + 32;

impl Call {
    pub fn new<A: Serialize>(signature: &str, account: Identity, args: &A) -> Result<Self, WalletError> {
        Ok(Call {
            selector: selector(signature),
            account,
            args: bincode::serialize(args)?,
        })
    }

    pub fn decode_args<A: DeserializeOwned>(&self) -> Result<A, WalletError> {
        Ok(bincode::deserialize(&self.args)?)
    }

    pub fn is(&self, signature: &str) -> bool {
        self.selector == selector(signature)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(CALL_HEADER_LEN + self.args.len());
        out.extend_from_slice(&self.selector);
        out.extend_from_slice(self.account.as_bytes());
        out.extend_from_slice(&self.args);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WalletError> {
        if bytes.len() < CALL_HEADER_LEN {
            return Err(WalletError::MalformedPayload(format!(
                "payload is {} bytes, header needs {}",
                bytes.len(),
                CALL_HEADER_LEN
            )));
        }
        let mut selector = [0u8; 4];
        selector.copy_from_slice(&bytes[..4]);
        let mut account = [0u8; 32];
        account.copy_from_slice(&bytes[4..CALL_HEADER_LEN]);
        Ok(Call {
            selector,
            account: Identity(account),
            args: bytes[CALL_HEADER_LEN..].to_vec(),
        })
    }

    pub fn unknown_selector(&self) -> WalletError {
        WalletError::UnknownSelector(hex::encode(self.selector))
    }
}

/// Encode a module return value.
pub fn encode_return<T: Serialize>(value: &T) -> Result<Vec<u8>, WalletError> {
    Ok(bincode::serialize(value)?)
}

/// Decode a module return value.
pub fn decode_return<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, WalletError> {
    Ok(bincode::deserialize(bytes)?)
}

/// Serde helper: byte vectors as hex strings in human readable formats.
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
        } else {
            serializer.serialize_bytes(bytes)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(serde::de::Error::custom)
        } else {
            Vec::<u8>::deserialize(deserializer)
        }
    }
}

/// Serde helper: a list of byte vectors as hex strings.
pub mod hex_bytes_list {
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(items: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(items.len()))?;
        for item in items {
            seq.serialize_element(&format!("0x{}", hex::encode(item)))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Vec<u8>>, D::Error> {
        let raw = Vec::<String>::deserialize(deserializer)?;
        raw.iter()
            .map(|s| hex::decode(s.strip_prefix("0x").unwrap_or(s)).map_err(serde::de::Error::custom))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_lengths_are_prefixed() {
        let a = [b"ab".as_slice(), b"c"].concat();
        let mut left = Vec::new();
        b"ab".as_slice().write_canonical(&mut left);
        b"c".as_slice().write_canonical(&mut left);
        let mut right = Vec::new();
        b"a".as_slice().write_canonical(&mut right);
        b"bc".as_slice().write_canonical(&mut right);
        assert_ne!(left, right);
        assert_ne!(left, a);
    }

    #[test]
    fn test_call_bytes() {
        let account = Identity::derive("wallet");
        let target = Identity::derive("guardian");
        let call = Call::new("request_guardian_addition(Identity)", account, &target).unwrap();
        let decoded = Call::from_bytes(&call.to_bytes()).unwrap();
        assert_eq!(decoded, call);
        assert!(decoded.is("request_guardian_addition(Identity)"));
        assert_eq!(decoded.decode_args::<Identity>().unwrap(), target);
    }

    #[test]
    fn test_short_payload_rejected() {
        assert!(matches!(
            Call::from_bytes(&[1, 2, 3]),
            Err(WalletError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_selectors_differ() {
        assert_ne!(selector("a()"), selector("b()"));
    }
}
