//! Message codec with optional password-derived encryption.
//!
//! Without a password, messages travel as plain JSON text. With one, each
//! message is encrypted as AES-256-GCM under a key derived from the
//! password with scrypt and a constant protocol-wide salt, and transmitted
//! as `<hex ciphertext>|<hex iv>` with a fresh random 16-byte IV.
//!
//! This is a lightweight confidentiality layer for trusted-network
//! deployments, not a security boundary: there is no peer identity and no
//! replay protection. Note that the key is re-derived on every message for
//! wire compatibility with existing peers, which makes the slow KDF a
//! per-message cost.

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::{AesGcm, Nonce};
use rand::RngCore;
use scrypt::Params;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Protocol-wide KDF salt. Changing it breaks wire compatibility.
const SALT: &[u8] = b"commandsocket-salt";

/// IV length on the wire (GCM accepts non-96-bit IVs).
const IV_LEN: usize = 16;

type Cipher = AesGcm<Aes256, U16>;

/// Failure to produce or understand a frame.
///
/// Callers on the receive path treat every variant as "drop the frame": an
/// unparseable or undecryptable message must never take the connection down.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("encrypted frame is missing the ciphertext|iv separator")]
    MissingSeparator,
    #[error("malformed hex in frame: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("bad IV length: expected {IV_LEN} bytes, got {0}")]
    BadIv(usize),
    #[error("decryption failed")]
    Decrypt,
    #[error("encryption failed")]
    Encrypt,
    #[error("key derivation failed")]
    Kdf,
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serialize a message, encrypting it when a password is configured.
pub fn encode<T: Serialize>(message: &T, password: Option<&str>) -> Result<String, CodecError> {
    let plain = serde_json::to_string(message)?;
    let Some(password) = password else {
        return Ok(plain);
    };

    let cipher = cipher_for(password)?;
    let mut iv = [0u8; IV_LEN];
    rand::rng().fill_bytes(&mut iv);

    let ciphertext = cipher
        .encrypt(Nonce::<U16>::from_slice(&iv), plain.as_bytes())
        .map_err(|_| CodecError::Encrypt)?;

    Ok(format!("{}|{}", hex::encode(ciphertext), hex::encode(iv)))
}

/// Parse a frame, decrypting it first when a password is configured.
pub fn decode<T: DeserializeOwned>(frame: &str, password: Option<&str>) -> Result<T, CodecError> {
    let Some(password) = password else {
        return Ok(serde_json::from_str(frame)?);
    };

    let (ciphertext_hex, iv_hex) = frame
        .split_once('|')
        .ok_or(CodecError::MissingSeparator)?;
    let ciphertext = hex::decode(ciphertext_hex)?;
    let iv = hex::decode(iv_hex)?;
    if iv.len() != IV_LEN {
        return Err(CodecError::BadIv(iv.len()));
    }

    let cipher = cipher_for(password)?;
    let plain = cipher
        .decrypt(Nonce::<U16>::from_slice(&iv), ciphertext.as_ref())
        .map_err(|_| CodecError::Decrypt)?;

    Ok(serde_json::from_slice(&plain)?)
}

fn cipher_for(password: &str) -> Result<Cipher, CodecError> {
    // scrypt with N=2^14, r=8, p=1, matching the peer's parameters.
    let params = Params::new(14, 8, 1, 32).map_err(|_| CodecError::Kdf)?;
    let mut key = [0u8; 32];
    scrypt::scrypt(password.as_bytes(), SALT, &params, &mut key).map_err(|_| CodecError::Kdf)?;
    Cipher::new_from_slice(&key).map_err(|_| CodecError::Kdf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn plaintext_roundtrip() {
        let msg = json!({ "action": "get-version", "reqID": 0 });
        let frame = encode(&msg, None).unwrap();
        assert_eq!(frame, msg.to_string());
        let back: Value = decode(&frame, None).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn encrypted_roundtrip() {
        let msg = json!({ "type": "focus", "focus": true });
        let frame = encode(&msg, Some("hunter2")).unwrap();
        assert!(frame.contains('|'));
        let back: Value = decode(&frame, Some("hunter2")).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn fresh_iv_per_message() {
        let msg = json!({ "type": "focus", "focus": true });
        let a = encode(&msg, Some("pw")).unwrap();
        let b = encode(&msg, Some("pw")).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_password_fails() {
        let frame = encode(&json!({ "x": 1 }), Some("right")).unwrap();
        let err = decode::<Value>(&frame, Some("wrong")).unwrap_err();
        assert!(matches!(err, CodecError::Decrypt));
    }

    #[test]
    fn missing_separator_fails() {
        let err = decode::<Value>("deadbeef", Some("pw")).unwrap_err();
        assert!(matches!(err, CodecError::MissingSeparator));
    }

    #[test]
    fn malformed_hex_fails() {
        let err = decode::<Value>("nothex|nothex", Some("pw")).unwrap_err();
        assert!(matches!(err, CodecError::Hex(_)));
    }

    #[test]
    fn truncated_iv_fails() {
        let err = decode::<Value>("deadbeef|aabb", Some("pw")).unwrap_err();
        assert!(matches!(err, CodecError::BadIv(2)));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let frame = encode(&json!({ "x": 1 }), Some("pw")).unwrap();
        let (ct, iv) = frame.split_once('|').unwrap();
        let mut bytes = hex::decode(ct).unwrap();
        bytes[0] ^= 0xff;
        let tampered = format!("{}|{}", hex::encode(bytes), iv);
        let err = decode::<Value>(&tampered, Some("pw")).unwrap_err();
        assert!(matches!(err, CodecError::Decrypt));
    }
}
