// ABOUTME: Deterministic Ed25519 signing key management for token issuance
// ABOUTME: Derives the keypair from the configured 32-byte secret and exposes JWT key material
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Latchkey Contributors

use ed25519_dalek::pkcs8::EncodePrivateKey;
use ed25519_dalek::SigningKey;
use jsonwebtoken::{DecodingKey, EncodingKey};
use thiserror::Error;
use zeroize::Zeroize;

/// Key derivation failures
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("signing seed must be exactly 32 bytes, got {0}")]
    InvalidSeedLength(usize),
    #[error("failed to encode signing key: {0}")]
    Encoding(String),
}

/// Ed25519 signing material shared by every token operation.
///
/// The keypair is derived deterministically from the configured secret, so the
/// same secret yields the same keys across restarts and outstanding tokens
/// survive redeploys. Losing the secret invalidates every issued token.
pub struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    public: [u8; 32],
}

impl SigningKeys {
    /// Derive the keypair from a 32-byte seed
    ///
    /// # Errors
    /// Returns an error if the seed has the wrong length or the key cannot be
    /// encoded for the JWT library
    pub fn from_seed(seed: &[u8]) -> Result<Self, KeyError> {
        let mut seed_bytes: [u8; 32] = seed
            .try_into()
            .map_err(|_| KeyError::InvalidSeedLength(seed.len()))?;

        let signing_key = SigningKey::from_bytes(&seed_bytes);
        seed_bytes.zeroize();

        let pkcs8 = signing_key
            .to_pkcs8_der()
            .map_err(|e| KeyError::Encoding(e.to_string()))?;
        let encoding = EncodingKey::from_ed_der(pkcs8.as_bytes());

        let verifying_key = signing_key.verifying_key();
        let public = verifying_key.to_bytes();
        let decoding = DecodingKey::from_ed_der(&public);

        Ok(Self {
            encoding,
            decoding,
            public,
        })
    }

    /// Key used to sign tokens
    #[must_use]
    pub const fn encoding_key(&self) -> &EncodingKey {
        &self.encoding
    }

    /// Key used to verify token signatures
    #[must_use]
    pub const fn decoding_key(&self) -> &DecodingKey {
        &self.decoding
    }

    /// Raw 32-byte Ed25519 public key, as published in the JWKS
    #[must_use]
    pub const fn public_key_bytes(&self) -> &[u8; 32] {
        &self.public
    }
}
