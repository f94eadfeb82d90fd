use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use sha2::{Digest as _, Sha256};

use crate::identity::Identity;

/// 32-byte message digest signed by owners and guardians.
pub type Digest = [u8; 32];

/// Encoded signature length: 32-byte public key followed by 64-byte signature.
pub const SIGNATURE_LEN: usize = 96;

pub struct KeyPair {
    pub signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a new Ed25519 keypair
    pub fn generate() -> Self {
        let mut csprng = OsRng;
        KeyPair {
            signing_key: SigningKey::generate(&mut csprng),
        }
    }

    /// Deterministic keypair from a 32-byte seed
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        KeyPair {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Restore from a hex encoded secret key
    pub fn from_secret_hex(secret_hex: &str) -> Result<Self, String> {
        let bytes = hex::decode(secret_hex.trim()).map_err(|e| format!("Invalid secret hex: {}", e))?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| "Secret key must be 32 bytes".to_string())?;
        Ok(Self::from_seed(&seed))
    }

    pub fn secret_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }

    pub fn public_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// The identity controlled by this key
    pub fn identity(&self) -> Identity {
        Identity(self.public_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }

    /// Sign a digest and return the recoverable 96-byte encoding
    pub fn sign_digest(&self, digest: &Digest) -> Vec<u8> {
        let signature = self.sign(digest);
        let mut out = Vec::with_capacity(SIGNATURE_LEN);
        out.extend_from_slice(&self.public_key().to_bytes());
        out.extend_from_slice(&signature.to_bytes());
        out
    }
}

/// Maps a signature over a digest back to the identity that produced it.
pub trait SignatureRecovery: Send + Sync {
    /// `None` when the signature is malformed or does not verify.
    fn recover(&self, digest: &Digest, signature: &[u8]) -> Option<Identity>;
}

/// Recovery for the 96-byte `public key || signature` encoding.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ed25519Recovery;

impl SignatureRecovery for Ed25519Recovery {
    fn recover(&self, digest: &Digest, signature: &[u8]) -> Option<Identity> {
        if signature.len() != SIGNATURE_LEN {
            return None;
        }
        let pk_bytes: [u8; 32] = signature[..32].try_into().ok()?;
        let sig_bytes: [u8; 64] = signature[32..].try_into().ok()?;
        let public = VerifyingKey::from_bytes(&pk_bytes).ok()?;
        let sig = Signature::from_bytes(&sig_bytes);
        public.verify(digest, &sig).ok()?;
        Some(Identity(pk_bytes))
    }
}

/// SHA-256 over the concatenation of `parts`
pub fn sha256(parts: &[&[u8]]) -> Digest {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_recover() {
        let kp = KeyPair::generate();
        let digest = sha256(&[b"hello"]);
        let sig = kp.sign_digest(&digest);
        assert_eq!(sig.len(), SIGNATURE_LEN);
        assert_eq!(Ed25519Recovery.recover(&digest, &sig), Some(kp.identity()));
    }

    #[test]
    fn test_recover_rejects_other_digest() {
        let kp = KeyPair::from_seed(&[7u8; 32]);
        let sig = kp.sign_digest(&sha256(&[b"a"]));
        assert_eq!(Ed25519Recovery.recover(&sha256(&[b"b"]), &sig), None);
        assert_eq!(Ed25519Recovery.recover(&sha256(&[b"a"]), &sig[..64]), None);
    }

    #[test]
    fn test_secret_roundtrip() {
        let kp = KeyPair::generate();
        let restored = KeyPair::from_secret_hex(&kp.secret_hex()).unwrap();
        assert_eq!(kp.identity(), restored.identity());
    }
}
