//! # Node Key
//!
//! The seed's long-lived ed25519 key, stored as `node_key.json`. The node
//! id is the hex of the first 20 bytes of SHA-256 over the public key.

use std::fs;
use std::path::{Path, PathBuf};

use ed25519_dalek::{SigningKey, SECRET_KEY_LENGTH};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use seed_peer_exchange::PeerId;

#[derive(Debug, Error)]
pub enum NodeKeyError {
    #[error("failed to access node key {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed node key {path}: {reason}")]
    Format { path: PathBuf, reason: String },
}

#[derive(Serialize, Deserialize)]
struct NodeKeyFile {
    /// Hex-encoded ed25519 secret key
    priv_key: String,
}

/// Identity key of this node
pub struct NodeKey {
    signing: SigningKey,
}

impl NodeKey {
    /// Fresh random key.
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::generate(&mut rand::thread_rng()),
        }
    }

    pub fn from_secret(secret: [u8; SECRET_KEY_LENGTH]) -> Self {
        Self {
            signing: SigningKey::from_bytes(&secret),
        }
    }

    /// Node id derived from the public key.
    pub fn id(&self) -> PeerId {
        let digest = Sha256::digest(self.signing.verifying_key().as_bytes());
        let mut hash = [0u8; PeerId::KEY_HASH_LEN];
        hash.copy_from_slice(&digest[..PeerId::KEY_HASH_LEN]);
        PeerId::from_key_hash(&hash)
    }

    /// Hex of the public key
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.signing.verifying_key().as_bytes())
    }

    /// Load the key at `path`, generating and saving one if the file is
    /// missing. A present but unreadable key is an error, never replaced.
    pub fn load_or_generate(path: &Path) -> Result<Self, NodeKeyError> {
        if path.exists() {
            return Self::load(path);
        }
        let key = Self::generate();
        key.save(path)?;
        tracing::info!(path = %path.display(), id = %key.id(), "generated node key");
        Ok(key)
    }

    pub fn load(path: &Path) -> Result<Self, NodeKeyError> {
        let raw = fs::read_to_string(path).map_err(|source| NodeKeyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let format = |reason: String| NodeKeyError::Format {
            path: path.to_path_buf(),
            reason,
        };
        let file: NodeKeyFile = serde_json::from_str(&raw).map_err(|e| format(e.to_string()))?;
        let bytes = hex::decode(file.priv_key.trim()).map_err(|e| format(e.to_string()))?;
        let secret: [u8; SECRET_KEY_LENGTH] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| format(format!("expected 32 key bytes, found {}", b.len())))?;
        Ok(Self::from_secret(secret))
    }

    /// Write the key, readable by the owner only on Unix.
    pub fn save(&self, path: &Path) -> Result<(), NodeKeyError> {
        let io = |source| NodeKeyError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io)?;
        }
        let file = NodeKeyFile {
            priv_key: hex::encode(self.signing.to_bytes()),
        };
        let rendered = serde_json::to_string_pretty(&file).map_err(|e| NodeKeyError::Format {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        fs::write(path, rendered).map_err(io)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(io)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for NodeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeKey")
            .field("id", &self.id())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_is_forty_hex_chars() {
        let key = NodeKey::from_secret([7u8; SECRET_KEY_LENGTH]);
        let id = key.id();
        assert_eq!(id.as_str().len(), PeerId::KEY_HASH_LEN * 2);
        assert_eq!(id, NodeKey::from_secret([7u8; SECRET_KEY_LENGTH]).id());
        assert_ne!(id, NodeKey::from_secret([8u8; SECRET_KEY_LENGTH]).id());
    }

    #[test]
    fn test_generated_key_is_persisted_and_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config/node_key.json");

        let generated = NodeKey::load_or_generate(&path).unwrap();
        assert!(path.exists());
        let reloaded = NodeKey::load_or_generate(&path).unwrap();
        assert_eq!(generated.id(), reloaded.id());
        assert_eq!(generated.public_key_hex(), reloaded.public_key_hex());
    }

    #[test]
    fn test_corrupt_key_is_not_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node_key.json");
        fs::write(&path, r#"{"priv_key":"abcd"}"#).unwrap();

        let err = NodeKey::load_or_generate(&path).unwrap_err();
        assert!(matches!(err, NodeKeyError::Format { .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), r#"{"priv_key":"abcd"}"#);
    }
}
