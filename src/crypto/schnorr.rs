//! Schnorr signatures over secp256k1
//!
//! Key generation and signing exist so wallets and tests can produce
//! transactions. The ledger itself only ever calls [`PublicKey::verify`].

use k256::schnorr::signature::{Signer, Verifier};
use k256::schnorr::{Signature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Signature errors
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Signing failed: {0}")]
    SigningFailed(String),
}

/// Secret signing key
#[derive(Clone)]
pub struct PrivateKey(SigningKey);

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PrivateKey([REDACTED])")
    }
}

/// x-only public key; doubles as the owner identity of an output
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey(#[serde(with = "fixed_bytes")] pub [u8; 32]);

/// 64-byte Schnorr signature
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchnorrSignature(#[serde(with = "fixed_bytes")] pub [u8; 64]);

mod fixed_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S, const N: usize>(bytes: &[u8; N], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D, const N: usize>(deserializer: D) -> Result<[u8; N], D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes: Vec<u8> = Deserialize::deserialize(deserializer)?;
        bytes.try_into().map_err(|v: Vec<u8>| {
            serde::de::Error::custom(format!("expected {} bytes, got {}", N, v.len()))
        })
    }
}

impl PrivateKey {
    /// Generate a new random private key
    pub fn generate() -> Self {
        PrivateKey(SigningKey::random(&mut OsRng))
    }

    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, SignatureError> {
        SigningKey::from_bytes(bytes)
            .map(PrivateKey)
            .map_err(|_| SignatureError::InvalidPrivateKey)
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.verifying_key().to_bytes().into())
    }

    /// Sign an arbitrary message
    pub fn sign(&self, message: &[u8]) -> Result<SchnorrSignature, SignatureError> {
        let signature: Signature = self
            .0
            .try_sign(message)
            .map_err(|e| SignatureError::SigningFailed(e.to_string()))?;
        Ok(SchnorrSignature(signature.to_bytes()))
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes().into()
    }
}

impl PublicKey {
    /// Create from 32 bytes, rejecting points not on the curve
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, SignatureError> {
        VerifyingKey::from_bytes(bytes).map_err(|_| SignatureError::InvalidPublicKey)?;
        Ok(PublicKey(*bytes))
    }

    /// Verify `signature` over `message`.
    ///
    /// Malformed keys or signatures simply fail verification.
    pub fn verify(&self, message: &[u8], signature: &SchnorrSignature) -> bool {
        let verifying_key = match VerifyingKey::from_bytes(&self.0) {
            Ok(vk) => vk,
            Err(_) => return false,
        };

        let sig = match Signature::try_from(signature.0.as_slice()) {
            Ok(s) => s,
            Err(_) => return false,
        };

        verifying_key.verify(message, &sig).is_ok()
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }
}

impl SchnorrSignature {
    /// Placeholder used before an input is signed
    pub const fn empty() -> Self {
        SchnorrSignature([0u8; 64])
    }

    pub fn from_bytes(bytes: &[u8; 64]) -> Self {
        SchnorrSignature(*bytes)
    }

    pub fn to_bytes(&self) -> [u8; 64] {
        self.0
    }
}

impl Default for SchnorrSignature {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.0))
    }
}

impl std::fmt::Debug for SchnorrSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature({})", hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify() {
        let private = PrivateKey::generate();
        let public = private.public_key();

        let signature = private.sign(b"test message").unwrap();
        assert!(public.verify(b"test message", &signature));
    }

    #[test]
    fn test_wrong_key_fails() {
        let signer = PrivateKey::generate();
        let other = PrivateKey::generate().public_key();

        let signature = signer.sign(b"test message").unwrap();
        assert!(!other.verify(b"test message", &signature));
    }

    #[test]
    fn test_wrong_message_fails() {
        let private = PrivateKey::generate();
        let signature = private.sign(b"message 1").unwrap();
        assert!(!private.public_key().verify(b"message 2", &signature));
    }

    #[test]
    fn test_empty_signature_fails() {
        let public = PrivateKey::generate().public_key();
        assert!(!public.verify(b"anything", &SchnorrSignature::empty()));
    }

    #[test]
    fn test_garbage_public_key_fails() {
        let private = PrivateKey::generate();
        let signature = private.sign(b"msg").unwrap();
        // Not a valid x coordinate
        let bogus = PublicKey([0xff; 32]);
        assert!(!bogus.verify(b"msg", &signature));
        assert!(PublicKey::from_bytes(&[0xff; 32]).is_err());
    }

    #[test]
    fn test_key_serialization() {
        let private = PrivateKey::generate();
        let recovered = PrivateKey::from_bytes(&private.to_bytes()).unwrap();
        assert_eq!(private.public_key(), recovered.public_key());
    }
}
