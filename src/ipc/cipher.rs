use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chacha20poly1305::ChaCha20Poly1305;
use chacha20poly1305::Key;
use chacha20poly1305::KeyInit;
use chacha20poly1305::Nonce;
use chacha20poly1305::Tag;
use chacha20poly1305::aead::AeadInPlace;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use std::fmt::Debug;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;

use crate::error::Exception;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Authenticated encryption for IPC payloads.
///
/// Payloads are sealed with ChaCha20-Poly1305 under a 256-bit key derived
/// from a secret with SHA-256. Each message gets a fresh random nonce.
///
/// # Wire Format
///
/// `base64(json({"iv": b64, "tag": b64, "data": b64}))`
///
/// Opening fails closed: a malformed envelope, a field of the wrong size,
/// or a tag that does not verify all raise a [`Transport`] exception.
///
/// [`Transport`]: crate::error::ExceptionGroup::Transport
#[derive(Clone)]
pub struct Cipher {
  aead: ChaCha20Poly1305,
}

impl Cipher {
  /// Derives a cipher from a secret of any length.
  pub fn from_secret(secret: &str) -> Self {
    let digest = Sha256::digest(secret.as_bytes());

    Self {
      aead: ChaCha20Poly1305::new(Key::from_slice(&digest)),
    }
  }

  /// Seals `plaintext` into a self-describing envelope.
  pub fn encrypt(&self, plaintext: &[u8]) -> Result<String, Exception> {
    let mut nonce: [u8; NONCE_LEN] = [0; NONCE_LEN];
    let mut data: Vec<u8> = plaintext.to_vec();

    OsRng.fill_bytes(&mut nonce);

    let tag: Tag = self
      .aead
      .encrypt_in_place_detached(Nonce::from_slice(&nonce), b"", &mut data)
      .map_err(|_| Exception::transport("encryption failed"))?;

    let envelope: Envelope = Envelope {
      iv: STANDARD.encode(nonce),
      tag: STANDARD.encode(tag),
      data: STANDARD.encode(data),
    };

    let json: Vec<u8> = serde_json::to_vec(&envelope)
      .map_err(|error| Exception::transport(format_args!("failed to encode envelope: {error}")))?;

    Ok(STANDARD.encode(json))
  }

  /// Opens an envelope produced by [`encrypt`][Self::encrypt].
  pub fn decrypt<T>(&self, envelope: T) -> Result<Vec<u8>, Exception>
  where
    T: AsRef<[u8]>,
  {
    let json: Vec<u8> = STANDARD
      .decode(envelope.as_ref())
      .map_err(|_| Exception::transport("invalid base64 encoded data"))?;

    let envelope: Envelope = serde_json::from_slice(&json)
      .map_err(|_| Exception::transport("invalid encrypted data format"))?;

    let nonce: Vec<u8> = decode_field(&envelope.iv, NONCE_LEN)?;
    let tag: Vec<u8> = decode_field(&envelope.tag, TAG_LEN)?;

    let mut data: Vec<u8> = STANDARD
      .decode(&envelope.data)
      .map_err(|_| Exception::transport("invalid encryption components"))?;

    self
      .aead
      .decrypt_in_place_detached(
        Nonce::from_slice(&nonce),
        b"",
        &mut data,
        Tag::from_slice(&tag),
      )
      .map_err(|_| Exception::transport("decryption failed: authentication tag mismatch"))?;

    Ok(data)
  }
}

impl Debug for Cipher {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.write_str("Cipher(ChaCha20-Poly1305)")
  }
}

#[derive(Serialize, Deserialize)]
struct Envelope {
  iv: String,
  tag: String,
  data: String,
}

fn decode_field(field: &str, size: usize) -> Result<Vec<u8>, Exception> {
  match STANDARD.decode(field) {
    Ok(bytes) if bytes.len() == size => Ok(bytes),
    _ => Err(Exception::transport("invalid encryption components")),
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
