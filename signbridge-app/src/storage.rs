//! Encrypted SQLite key-value store backing the conversation snapshot.

use std::path::{Path, PathBuf};

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{TimeZone, Utc};
use rand::RngCore;
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use signbridge_core::{BridgeError, KeyValueStore};

#[derive(Debug, Clone)]
pub struct LocalStore {
    db_path: PathBuf,
    cipher: TextCipher,
}

#[derive(Debug, Clone)]
struct TextCipher {
    key: [u8; 32],
}

impl TextCipher {
    fn new(scope: &Path) -> Self {
        let username = std::env::var("USERNAME")
            .or_else(|_| std::env::var("USER"))
            .unwrap_or_default();
        let computer = std::env::var("COMPUTERNAME")
            .or_else(|_| std::env::var("HOSTNAME"))
            .unwrap_or_default();
        let material = format!(
            "{username}|{computer}|{}|signbridge-history-v1",
            scope.to_string_lossy()
        );
        let mut hasher = Sha256::new();
        hasher.update(material.as_bytes());
        let digest = hasher.finalize();
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest[..32]);
        Self { key }
    }

    fn encrypt(&self, plain: &str) -> Result<String, String> {
        if plain.is_empty() {
            return Ok(String::new());
        }
        let cipher = Aes256Gcm::new_from_slice(&self.key).map_err(|e| e.to_string())?;
        let mut nonce_bytes = [0u8; 12];
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let encrypted = cipher
            .encrypt(nonce, plain.as_bytes())
            .map_err(|e| e.to_string())?;
        let mut out = Vec::with_capacity(12 + encrypted.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&encrypted);
        Ok(BASE64.encode(out))
    }

    fn decrypt(&self, encoded: &str) -> Option<String> {
        if encoded.is_empty() {
            return Some(String::new());
        }
        let bytes = BASE64.decode(encoded).ok()?;
        if bytes.len() <= 12 {
            return None;
        }
        let (nonce_bytes, cipher_bytes) = bytes.split_at(12);
        let nonce = Nonce::from_slice(nonce_bytes);
        let cipher = Aes256Gcm::new_from_slice(&self.key).ok()?;
        let plain = cipher.decrypt(nonce, cipher_bytes).ok()?;
        String::from_utf8(plain).ok()
    }
}

impl LocalStore {
    pub fn default_db_path() -> PathBuf {
        #[cfg(target_os = "windows")]
        {
            std::env::var_os("APPDATA")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."))
                .join("Lattice Labs")
                .join("SignBridge")
                .join("signbridge.db")
        }
        #[cfg(not(target_os = "windows"))]
        {
            std::env::var_os("XDG_DATA_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|| {
                    std::env::var_os("HOME")
                        .map(PathBuf::from)
                        .unwrap_or_else(|| PathBuf::from("/tmp"))
                        .join(".local")
                        .join("share")
                })
                .join("signbridge")
                .join("signbridge.db")
        }
    }

    pub fn new(db_path: PathBuf) -> Result<Self, String> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        let store = Self {
            cipher: TextCipher::new(&db_path),
            db_path,
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn open(&self) -> Result<Connection, String> {
        Connection::open(&self.db_path).map_err(|e| e.to_string())
    }

    fn init_schema(&self) -> Result<(), String> {
        let conn = self.open()?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            CREATE TABLE IF NOT EXISTS kv (
              key TEXT PRIMARY KEY,
              value_enc TEXT NOT NULL,
              updated_at INTEGER NOT NULL
            );
            "#,
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Decrypted value of `key`. A value that no longer decrypts (moved
    /// database, different user) is reported as an error, not as absent.
    pub fn get_value(&self, key: &str) -> Result<Option<String>, String> {
        let conn = self.open()?;
        let enc: Option<String> = conn
            .query_row("SELECT value_enc FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|e| e.to_string())?;
        match enc {
            None => Ok(None),
            Some(enc) => self
                .cipher
                .decrypt(&enc)
                .map(Some)
                .ok_or_else(|| format!("value for '{key}' could not be decrypted")),
        }
    }

    pub fn set_value(&self, key: &str, value: &str) -> Result<(), String> {
        let value_enc = self.cipher.encrypt(value)?;
        let conn = self.open()?;
        conn.execute(
            r#"
            INSERT INTO kv (key, value_enc, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET value_enc = excluded.value_enc, updated_at = excluded.updated_at
            "#,
            params![key, value_enc, Utc::now().timestamp()],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn remove_value(&self, key: &str) -> Result<(), String> {
        let conn = self.open()?;
        conn.execute("DELETE FROM kv WHERE key = ?1", params![key])
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    /// RFC 3339 time of the last write to `key`.
    pub fn updated_at(&self, key: &str) -> Result<Option<String>, String> {
        let conn = self.open()?;
        let ts: Option<i64> = conn
            .query_row("SELECT updated_at FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|e| e.to_string())?;
        Ok(ts.map(ts_to_rfc3339))
    }
}

impl KeyValueStore for LocalStore {
    fn get(&self, key: &str) -> signbridge_core::Result<Option<String>> {
        self.get_value(key).map_err(BridgeError::Storage)
    }

    fn set(&self, key: &str, value: &str) -> signbridge_core::Result<()> {
        self.set_value(key, value).map_err(BridgeError::Storage)
    }

    fn remove(&self, key: &str) -> signbridge_core::Result<()> {
        self.remove_value(key).map_err(BridgeError::Storage)
    }
}

fn ts_to_rfc3339(ts: i64) -> String {
    Utc.timestamp_opt(ts, 0)
        .single()
        .unwrap_or_else(Utc::now)
        .to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, LocalStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalStore::new(dir.path().join("nested").join("signbridge.db"))
            .expect("open store");
        (dir, store)
    }

    #[test]
    fn values_survive_reopening_the_database() {
        let (dir, store) = temp_store();
        store
            .set_value("signbridge_history", r#"[{"text":"Bonjour"}]"#)
            .expect("set");

        let reopened =
            LocalStore::new(dir.path().join("nested").join("signbridge.db")).expect("reopen");
        assert_eq!(
            reopened.get_value("signbridge_history").expect("get").as_deref(),
            Some(r#"[{"text":"Bonjour"}]"#)
        );
        assert!(reopened
            .updated_at("signbridge_history")
            .expect("updated_at")
            .is_some());
    }

    #[test]
    fn values_are_encrypted_at_rest() {
        let (_dir, store) = temp_store();
        store.set_value("k", "texte très secret").expect("set");

        let conn = Connection::open(store.path()).expect("raw open");
        let raw: String = conn
            .query_row("SELECT value_enc FROM kv WHERE key = 'k'", [], |row| row.get(0))
            .expect("raw row");
        assert!(!raw.contains("secret"));
        assert_ne!(raw, "texte très secret");
    }

    #[test]
    fn set_overwrites_and_remove_is_idempotent() {
        let (_dir, store) = temp_store();
        store.set_value("k", "one").expect("set one");
        store.set_value("k", "two").expect("set two");
        assert_eq!(store.get_value("k").expect("get").as_deref(), Some("two"));

        store.remove_value("k").expect("remove");
        store.remove_value("k").expect("remove absent");
        assert_eq!(store.get_value("k").expect("get"), None);
        assert_eq!(store.get_value("never-set").expect("get"), None);
    }

    #[test]
    fn undecryptable_values_surface_as_storage_errors() {
        let (_dir, store) = temp_store();
        let conn = Connection::open(store.path()).expect("raw open");
        conn.execute(
            "INSERT INTO kv (key, value_enc, updated_at) VALUES ('k', 'bm90LWNpcGhlcnRleHQtYXQtYWxs', 0)",
            [],
        )
        .expect("raw insert");

        let err = KeyValueStore::get(&store, "k").expect_err("tampered value");
        assert!(matches!(err, BridgeError::Storage(_)));
    }

    #[test]
    fn cipher_round_trips_and_rejects_short_input() {
        let cipher = TextCipher::new(Path::new("/tmp/a.db"));
        let enc = cipher.encrypt("Merci").expect("encrypt");
        assert_eq!(cipher.decrypt(&enc).as_deref(), Some("Merci"));
        assert_eq!(cipher.encrypt("").expect("empty"), "");
        assert_eq!(cipher.decrypt("AAAA"), None);

        let other = TextCipher::new(Path::new("/tmp/b.db"));
        assert_eq!(other.decrypt(&enc), None);
    }
}
