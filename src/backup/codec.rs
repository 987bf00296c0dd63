//! Backup file encoding
//!
//! A backup file is one format byte followed by the payload:
//!
//! - `0`: the snapshot as UTF-8 JSON
//! - `1`: the JSON encrypted with `CipherService` (`nonce || ciphertext || tag`)
//!
//! Timestamps are ISO-8601 (RFC 3339) and `schemaVersion` is the first field,
//! so the version gate runs before the full snapshot is deserialized.

use std::sync::Arc;

use serde::Deserialize;

use crate::crypto::CipherService;
use crate::error::BackupError;
use crate::models::{BackupSnapshot, SchemaVersion};

/// How a backup payload is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupFormat {
    Plaintext,
    Encrypted,
}

impl BackupFormat {
    pub fn flag(self) -> u8 {
        match self {
            Self::Plaintext => 0,
            Self::Encrypted => 1,
        }
    }

    pub fn from_flag(flag: u8) -> Result<Self, BackupError> {
        match flag {
            0 => Ok(Self::Plaintext),
            1 => Ok(Self::Encrypted),
            other => Err(BackupError::InvalidBackupData(format!(
                "unknown format flag {}",
                other
            ))),
        }
    }

    /// Format of an encoded backup, from its first byte
    pub fn detect(bytes: &[u8]) -> Result<Self, BackupError> {
        let flag = bytes
            .first()
            .ok_or_else(|| BackupError::InvalidBackupData("backup file is empty".into()))?;
        Self::from_flag(*flag)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionHeader {
    schema_version: Option<String>,
}

/// Serializes snapshots and wraps them for storage
pub struct BackupCodec {
    cipher: Arc<CipherService>,
}

impl BackupCodec {
    pub fn new(cipher: Arc<CipherService>) -> Self {
        Self { cipher }
    }

    /// Canonical JSON encoding of a snapshot
    pub fn serialize(&self, snapshot: &BackupSnapshot) -> Result<Vec<u8>, BackupError> {
        serde_json::to_vec(snapshot).map_err(|e| {
            BackupError::InvalidBackupData(format!("failed to serialize snapshot: {}", e))
        })
    }

    /// Serialize, optionally encrypt, and prefix the format flag
    pub fn encode(&self, snapshot: &BackupSnapshot, encrypt: bool) -> Result<Vec<u8>, BackupError> {
        let json = self.serialize(snapshot)?;

        let (format, payload) = if encrypt {
            (
                BackupFormat::Encrypted,
                self.cipher.encrypt(&json)?.into_bytes(),
            )
        } else {
            (BackupFormat::Plaintext, json)
        };

        let mut out = Vec::with_capacity(1 + payload.len());
        out.push(format.flag());
        out.extend_from_slice(&payload);
        Ok(out)
    }

    /// Reverse `encode`, rejecting snapshots of another major version
    pub fn decode(&self, bytes: &[u8], expected_major: u32) -> Result<BackupSnapshot, BackupError> {
        let format = BackupFormat::detect(bytes)?;
        let payload = &bytes[1..];

        let json = match format {
            BackupFormat::Plaintext => payload.to_vec(),
            BackupFormat::Encrypted => self.cipher.decrypt(payload)?,
        };

        self.deserialize(&json, expected_major)
    }

    /// Parse snapshot JSON after checking its schema version
    pub fn deserialize(&self, json: &[u8], expected_major: u32) -> Result<BackupSnapshot, BackupError> {
        let version = probe_version(json)?;
        if !version.is_compatible_with(expected_major) {
            return Err(BackupError::IncompatibleVersion {
                found: version.to_string(),
                expected: expected_major,
            });
        }

        serde_json::from_slice(json)
            .map_err(|e| BackupError::InvalidBackupData(format!("malformed snapshot: {}", e)))
    }
}

/// Read only the schema version from snapshot JSON
pub fn probe_version(json: &[u8]) -> Result<SchemaVersion, BackupError> {
    let header: VersionHeader = serde_json::from_slice(json)
        .map_err(|e| BackupError::InvalidBackupData(format!("not a snapshot document: {}", e)))?;

    header
        .schema_version
        .ok_or_else(|| BackupError::InvalidBackupData("missing schemaVersion".into()))?
        .parse()
        .map_err(BackupError::InvalidBackupData)
}
