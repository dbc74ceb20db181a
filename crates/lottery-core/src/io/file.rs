//! Session artifacts on disk.

use super::layout;
use super::traits::{Storage, StorageError};
use crate::crypto::Secret;
use crate::protocol::SessionId;
use crate::tx::{LotteryTx, TxKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// What a saved file holds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum EntryKind {
    Secret,
    Transaction(TxKind),
    Transactions,
    RevealedSecrets,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct ManifestEntry {
    file: String,
    kind: EntryKind,
    /// Transaction ids, empty for secrets
    txids: Vec<String>,
    saved_at: DateTime<Utc>,
}

/// Index of everything saved in one session directory
#[derive(Clone, Debug, Serialize, Deserialize)]
struct Manifest {
    session: SessionId,
    entries: Vec<ManifestEntry>,
}

/// Writes each session into `<root>/<session id>/`: hex files for the
/// secret and transactions, plus a JSON manifest
#[derive(Debug)]
pub struct FileStorage {
    root: PathBuf,
    manifests: HashMap<SessionId, Manifest>,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), manifests: HashMap::new() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn session_dir(&self, session: SessionId) -> PathBuf {
        self.root.join(session.to_string())
    }

    fn write(
        &mut self,
        session: SessionId,
        file: String,
        kind: EntryKind,
        txids: Vec<String>,
        content: &str,
    ) -> Result<PathBuf, StorageError> {
        let dir = self.session_dir(session);
        fs::create_dir_all(&dir)?;
        let path = dir.join(&file);
        fs::write(&path, content)?;

        let manifest = self
            .manifests
            .entry(session)
            .or_insert_with(|| Manifest { session, entries: Vec::new() });
        manifest.entries.retain(|entry| entry.file != file);
        manifest.entries.push(ManifestEntry { file, kind, txids, saved_at: Utc::now() });
        fs::write(dir.join(layout::MANIFEST), serde_json::to_string_pretty(manifest)?)?;

        info!(path = %path.display(), "Saved");
        Ok(path)
    }
}

impl Storage for FileStorage {
    fn save_secret(&mut self, session: SessionId, secret: &Secret) -> Result<PathBuf, StorageError> {
        self.write(session, layout::SECRET.to_string(), EntryKind::Secret, Vec::new(), &secret.to_string())
    }

    fn save_transaction(&mut self, session: SessionId, tx: &LotteryTx) -> Result<PathBuf, StorageError> {
        self.write(
            session,
            layout::transaction(tx),
            EntryKind::Transaction(tx.kind()),
            vec![tx.txid().to_string()],
            &tx.to_hex(),
        )
    }

    fn save_transactions(
        &mut self,
        session: SessionId,
        name: &str,
        txs: &[Option<LotteryTx>],
    ) -> Result<PathBuf, StorageError> {
        let txids = txs.iter().flatten().map(|tx| tx.txid().to_string()).collect();
        let content = super::hex_lines(txs.iter().map(super::slot_hex));
        self.write(session, layout::collection(name), EntryKind::Transactions, txids, &content)
    }

    fn save_secrets(&mut self, session: SessionId, secrets: &[Secret]) -> Result<PathBuf, StorageError> {
        let content = super::hex_lines(secrets.iter().map(Secret::to_string));
        self.write(
            session,
            layout::REVEALED_SECRETS.to_string(),
            EntryKind::RevealedSecrets,
            Vec::new(),
            &content,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::fixtures;

    fn temp_root() -> PathBuf {
        std::env::temp_dir().join(format!("lottery-storage-{}", SessionId::new()))
    }

    #[test]
    fn test_writes_files_and_manifest() {
        let root = temp_root();
        let mut storage = FileStorage::new(&root);
        let session = SessionId::new();
        let commit = LotteryTx::from(fixtures::commit(0, &fixtures::secret(8)));

        let secret_path = storage.save_secret(session, &fixtures::secret(8)).unwrap();
        let tx_path = storage.save_transaction(session, &commit).unwrap();

        assert_eq!(secret_path, root.join(session.to_string()).join("secret.hex"));
        assert_eq!(fs::read_to_string(&secret_path).unwrap(), "0001020304050607");
        assert_eq!(fs::read_to_string(&tx_path).unwrap(), commit.to_hex());

        let manifest: Manifest = serde_json::from_str(
            &fs::read_to_string(storage.session_dir(session).join(layout::MANIFEST)).unwrap(),
        )
        .unwrap();
        assert_eq!(manifest.session, session);
        assert_eq!(manifest.entries.len(), 2);
        assert_eq!(manifest.entries[1].kind, EntryKind::Transaction(TxKind::Commit));
        assert_eq!(manifest.entries[1].txids, vec![commit.txid().to_string()]);

        fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn test_collection_keeps_empty_local_slot() {
        let root = temp_root();
        let mut storage = FileStorage::new(&root);
        let session = SessionId::new();
        let first = LotteryTx::from(fixtures::commit(0, &fixtures::secret(8)));
        let third = LotteryTx::from(fixtures::commit(2, &fixtures::secret(9)));

        let path = storage
            .save_transactions(session, layout::OTHERS_COMMITS, &[Some(first.clone()), None, Some(third.clone())])
            .unwrap();

        let content = fs::read_to_string(path).unwrap();
        assert_eq!(content.lines().collect::<Vec<_>>(), vec![first.to_hex(), String::new(), third.to_hex()]);
        assert_eq!(
            storage.manifests[&session].entries[0].txids,
            vec![first.txid().to_string(), third.txid().to_string()]
        );
        fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn test_resaving_replaces_manifest_entry() {
        let root = temp_root();
        let mut storage = FileStorage::new(&root);
        let session = SessionId::new();

        storage.save_secret(session, &fixtures::secret(8)).unwrap();
        storage.save_secret(session, &fixtures::secret(9)).unwrap();

        assert_eq!(storage.manifests[&session].entries.len(), 1);
        fs::remove_dir_all(root).unwrap();
    }
}
