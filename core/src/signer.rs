//! Credential handling and message signing.
//!
//! Credentials are raw secp256k1 private keys (hex, optional `0x`). The
//! identity of an account is the EIP-55 checksummed Ethereum address derived
//! from that key, and login challenges are signed as EIP-191 personal
//! messages.

use std::fmt;

use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use sha3::{Digest, Keccak256};
use zeroize::Zeroize;

use crate::error::SignerError;

/// Secret credential material. Never printed in full.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into().trim().to_string())
    }

    /// The credential exactly as supplied (trimmed). Only the removal
    /// ledger and the signer read this.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Decode into 32 key bytes, enforcing `(0x)?[0-9a-fA-F]{64}`.
    fn key_bytes(&self) -> Result<[u8; 32], SignerError> {
        let body = self.0.strip_prefix("0x").unwrap_or(&self.0);
        if body.len() != 64 || !body.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(SignerError::InvalidCredential(
                "invalid private key format or length".to_string(),
            ));
        }
        let mut out = [0u8; 32];
        hex::decode_to_slice(body, &mut out)
            .map_err(|e| SignerError::InvalidCredential(e.to_string()))?;
        Ok(out)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

impl Drop for Credential {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Derives identities from credentials and signs messages with them.
pub trait Signer: Send + Sync {
    /// Stable public identifier for the credential.
    fn identity(&self, credential: &Credential) -> Result<String, SignerError>;

    /// Public key in the form the remote service expects inside challenges.
    fn public_key(&self, credential: &Credential) -> Result<String, SignerError>;

    fn sign(&self, credential: &Credential, message: &str) -> Result<String, SignerError>;
}

/// A credential bound to a signer. Handed to the campaign client so it can
/// request signatures without ever holding the credential itself.
#[derive(Clone, Copy)]
pub struct BoundSigner<'a> {
    signer: &'a dyn Signer,
    credential: &'a Credential,
}

impl<'a> BoundSigner<'a> {
    pub fn new(signer: &'a dyn Signer, credential: &'a Credential) -> Self {
        Self { signer, credential }
    }

    pub fn public_key(&self) -> Result<String, SignerError> {
        self.signer.public_key(self.credential)
    }

    pub fn sign(&self, message: &str) -> Result<String, SignerError> {
        self.signer.sign(self.credential, message)
    }
}

/// Ethereum personal-message signer (secp256k1 + keccak256).
pub struct EthSigner {
    secp: Secp256k1<secp256k1::All>,
}

impl EthSigner {
    pub fn new() -> Self {
        Self { secp: Secp256k1::new() }
    }

    fn keypair(&self, credential: &Credential) -> Result<(SecretKey, PublicKey), SignerError> {
        let mut bytes = credential.key_bytes()?;
        let secret = SecretKey::from_slice(&bytes)
            .map_err(|e| SignerError::InvalidCredential(e.to_string()));
        bytes.zeroize();
        let secret = secret?;
        let public = PublicKey::from_secret_key(&self.secp, &secret);
        Ok((secret, public))
    }
}

impl Default for EthSigner {
    fn default() -> Self {
        Self::new()
    }
}

impl Signer for EthSigner {
    fn identity(&self, credential: &Credential) -> Result<String, SignerError> {
        let (_, public) = self.keypair(credential)?;
        Ok(address_from_public_key(&public))
    }

    fn public_key(&self, credential: &Credential) -> Result<String, SignerError> {
        let (_, public) = self.keypair(credential)?;
        Ok(format!("0x{}", hex::encode(public.serialize_uncompressed())))
    }

    fn sign(&self, credential: &Credential, message: &str) -> Result<String, SignerError> {
        let (secret, _) = self.keypair(credential)?;
        let digest = personal_message_hash(message);
        let msg = Message::from_digest_slice(&digest)
            .map_err(|e| SignerError::Signing(e.to_string()))?;
        let (rec_id, rs) = self
            .secp
            .sign_ecdsa_recoverable(&msg, &secret)
            .serialize_compact();

        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&rs);
        out[64] = 27 + u8::try_from(rec_id.to_i32()).map_err(|e| SignerError::Signing(e.to_string()))?;
        Ok(format!("0x{}", hex::encode(out)))
    }
}

/// keccak256("\x19Ethereum Signed Message:\n" ++ len ++ message)
pub fn personal_message_hash(message: &str) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(format!("\x19Ethereum Signed Message:\n{}", message.len()).as_bytes());
    hasher.update(message.as_bytes());
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// EIP-55 checksummed address of an uncompressed public key.
pub fn address_from_public_key(public: &PublicKey) -> String {
    let uncompressed = public.serialize_uncompressed();
    let digest = Keccak256::digest(&uncompressed[1..]);
    to_checksum_address(&hex::encode(&digest[12..]))
}

fn to_checksum_address(lower_hex: &str) -> String {
    let hash = Keccak256::digest(lower_hex.as_bytes());
    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in lower_hex.chars().enumerate() {
        let nibble = (hash[i / 2] >> (if i % 2 == 0 { 4 } else { 0 })) & 0x0f;
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};

    const KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
    const ADDRESS: &str = "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23";

    #[test]
    fn identity_is_checksummed_address() {
        let signer = EthSigner::new();
        let id = signer.identity(&Credential::new(KEY)).unwrap();
        assert_eq!(id, ADDRESS);
    }

    #[test]
    fn identity_ignores_0x_prefix() {
        let signer = EthSigner::new();
        let a = signer.identity(&Credential::new(KEY)).unwrap();
        let b = signer.identity(&Credential::new(format!("0x{KEY}"))).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_malformed_credentials() {
        let signer = EthSigner::new();
        for bad in ["", "0x1234", "zz0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318"] {
            assert!(matches!(
                signer.identity(&Credential::new(bad)),
                Err(SignerError::InvalidCredential(_))
            ));
        }
        // Right shape, but zero is not a valid secp256k1 scalar.
        let zero = "0".repeat(64);
        assert!(signer.identity(&Credential::new(zero)).is_err());
    }

    #[test]
    fn public_key_is_uncompressed_hex() {
        let signer = EthSigner::new();
        let pk = signer.public_key(&Credential::new(KEY)).unwrap();
        assert!(pk.starts_with("0x04"));
        assert_eq!(pk.len(), 2 + 130);
    }

    #[test]
    fn signature_recovers_to_identity() {
        let signer = EthSigner::new();
        let cred = Credential::new(KEY);
        let message = "Please sign your public key '0x04ab' in order to login into quest campaign";
        let sig_hex = signer.sign(&cred, message).unwrap();
        let bytes = hex::decode(sig_hex.trim_start_matches("0x")).unwrap();
        assert_eq!(bytes.len(), 65);
        assert!(bytes[64] == 27 || bytes[64] == 28);

        let rec_id = RecoveryId::from_i32(i32::from(bytes[64] - 27)).unwrap();
        let sig = RecoverableSignature::from_compact(&bytes[..64], rec_id).unwrap();
        let msg = Message::from_digest_slice(&personal_message_hash(message)).unwrap();
        let recovered = Secp256k1::new().recover_ecdsa(&msg, &sig).unwrap();
        assert_eq!(address_from_public_key(&recovered), ADDRESS);
    }

    #[test]
    fn signing_is_deterministic() {
        let signer = EthSigner::new();
        let cred = Credential::new(KEY);
        assert_eq!(signer.sign(&cred, "hello").unwrap(), signer.sign(&cred, "hello").unwrap());
    }

    #[test]
    fn credential_debug_is_redacted() {
        let cred = Credential::new(KEY);
        assert!(!format!("{cred:?}").contains("4c08"));
        assert!(!format!("{cred}").contains("4c08"));
    }
}
