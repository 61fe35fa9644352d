//! Reversible encryption applied to every persisted token record.

// crates.io
use aes_gcm::{
	Aes256Gcm, Nonce,
	aead::{Aead, KeyInit},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use rand::Rng;
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Opaque, reversible transform used by [`FileStore`](crate::store::FileStore).
pub trait Cipher: Send + Sync {
	/// Encrypts `plaintext` into a printable string.
	fn encrypt(&self, plaintext: &[u8]) -> Result<String, CipherError>;

	/// Reverses [`Cipher::encrypt`].
	fn decrypt(&self, ciphertext: &str) -> Result<Vec<u8>, CipherError>;
}

/// Failures raised by [`Cipher`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum CipherError {
	/// The key material is not usable.
	#[error("Encryption key is invalid: {reason}.")]
	InvalidKey {
		/// Human-readable reason.
		reason: String,
	},
	/// Encryption failed.
	#[error("Encryption failed.")]
	Encrypt,
	/// The ciphertext is malformed, was tampered with, or belongs to another key.
	#[error("Decryption failed: {reason}.")]
	Decrypt {
		/// Human-readable reason.
		reason: String,
	},
}

/// AES-256-GCM with a random 96-bit nonce per message.
///
/// Output is `base64(nonce || ciphertext || tag)`.
#[derive(Clone)]
pub struct Aes256GcmCipher {
	cipher: Aes256Gcm,
}
impl Aes256GcmCipher {
	/// Builds the cipher from 32 raw key bytes.
	pub fn from_key(key: &[u8; KEY_LEN]) -> Result<Self, CipherError> {
		let cipher = Aes256Gcm::new_from_slice(key)
			.map_err(|e| CipherError::InvalidKey { reason: e.to_string() })?;

		Ok(Self { cipher })
	}

	/// Builds the cipher from a base64-encoded 32-byte key.
	pub fn from_base64(encoded: &str) -> Result<Self, CipherError> {
		let bytes = STANDARD
			.decode(encoded.trim())
			.map_err(|e| CipherError::InvalidKey { reason: e.to_string() })?;

		Self::from_slice(&bytes)
	}

	/// Builds the cipher from a hex-encoded 32-byte key (64 hex digits).
	pub fn from_hex(encoded: &str) -> Result<Self, CipherError> {
		let bytes = hex::decode(encoded.trim())
			.map_err(|e| CipherError::InvalidKey { reason: e.to_string() })?;

		Self::from_slice(&bytes)
	}

	/// Derives the key as the SHA-256 digest of an arbitrary passphrase.
	pub fn from_passphrase(passphrase: &str) -> Result<Self, CipherError> {
		if passphrase.is_empty() {
			return Err(CipherError::InvalidKey { reason: "passphrase is empty".into() });
		}

		Self::from_slice(&Sha256::digest(passphrase.as_bytes()))
	}

	fn from_slice(bytes: &[u8]) -> Result<Self, CipherError> {
		let key = <[u8; KEY_LEN]>::try_from(bytes).map_err(|_| CipherError::InvalidKey {
			reason: format!("expected {KEY_LEN} bytes, got {}", bytes.len()),
		})?;

		Self::from_key(&key)
	}
}
impl Debug for Aes256GcmCipher {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Aes256GcmCipher").field("key", &"<redacted>").finish()
	}
}
impl Cipher for Aes256GcmCipher {
	fn encrypt(&self, plaintext: &[u8]) -> Result<String, CipherError> {
		let mut nonce = [0_u8; NONCE_LEN];

		rand::rng().fill(&mut nonce);

		let sealed = self
			.cipher
			.encrypt(Nonce::from_slice(&nonce), plaintext)
			.map_err(|_| CipherError::Encrypt)?;
		let mut payload = Vec::with_capacity(NONCE_LEN + sealed.len());

		payload.extend_from_slice(&nonce);
		payload.extend_from_slice(&sealed);

		Ok(STANDARD.encode(payload))
	}

	fn decrypt(&self, ciphertext: &str) -> Result<Vec<u8>, CipherError> {
		let payload = STANDARD
			.decode(ciphertext.trim())
			.map_err(|e| CipherError::Decrypt { reason: e.to_string() })?;

		if payload.len() <= NONCE_LEN {
			return Err(CipherError::Decrypt { reason: "payload is truncated".into() });
		}

		let (nonce, sealed) = payload.split_at(NONCE_LEN);

		self.cipher.decrypt(Nonce::from_slice(nonce), sealed).map_err(|_| CipherError::Decrypt {
			reason: "authentication tag mismatch".into(),
		})
	}
}
