// ============================================================================
// STOCKAGE DES FICHIERS
// ============================================================================
//
// Description:
//   Interface vers l'object store + implémentation locale (système de fichiers).
//
// Opérations:
//   - put : stocke les bytes, renvoie (clé, URL)
//   - get : relit les bytes d'une clé
//   - delete : supprime l'objet (un objet déjà absent n'est pas une erreur)
//   - presign : URL temporaire signée (HMAC-SHA256 sur "clé:expiration")
//
// Points d'attention:
//   - Pas de retry : une erreur remonte immédiatement à l'appelant
//   - Les clés sont générées ici (UUID + nom nettoyé), jamais fournies par le client
//
// ============================================================================

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::error;
use uuid::Uuid;

use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub key: String,
    pub url: String,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, bytes: Vec<u8>, content_type: &str, file_name: &str) -> Result<StoredObject, AppError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, AppError>;

    async fn delete(&self, key: &str) -> Result<(), AppError>;

    fn presign(&self, key: &str, ttl_minutes: i64) -> Result<String, AppError>;

    /// Vérifie une URL produite par `presign` quand le store sert lui-même les fichiers
    fn verify_presigned(&self, _key: &str, _expires: i64, _signature: &str) -> bool {
        false
    }
}

pub struct LocalObjectStore {
    root: PathBuf,
    public_base_url: String,
    signing_key: Vec<u8>,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str, signing_key: &str) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            signing_key: signing_key.as_bytes().to_vec(),
        }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, AppError> {
        if !is_safe_key(key) {
            return Err(AppError::BadRequest("Invalid file key".to_string()));
        }
        Ok(self.root.join(key))
    }

    fn signature(&self, key: &str, expires: i64) -> Result<HmacSha256, AppError> {
        let mut mac = HmacSha256::new_from_slice(&self.signing_key)
            .map_err(|e| AppError::Internal(format!("Invalid signing key: {}", e)))?;
        mac.update(format!("{}:{}", key, expires).as_bytes());
        Ok(mac)
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, bytes: Vec<u8>, _content_type: &str, file_name: &str) -> Result<StoredObject, AppError> {
        let key = format!("{}-{}", Uuid::new_v4(), sanitize_file_name(file_name));
        let path = self.path_for(&key)?;

        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            error!(error = %e, "Failed to create upload directory");
            AppError::Internal(format!("Error uploading file: {}", e))
        })?;
        tokio::fs::write(&path, bytes).await.map_err(|e| {
            error!(error = %e, key = %key, "Failed to write file");
            AppError::Internal(format!("Error uploading file: {}", e))
        })?;

        let url = format!("{}/{}", self.public_base_url, key);
        Ok(StoredObject { key, url })
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, AppError> {
        let path = self.path_for(key)?;
        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AppError::NotFound("File not found".to_string()),
            _ => AppError::Internal(format!("Error downloading file: {}", e)),
        })
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Internal(format!("Error deleting file: {}", e))),
        }
    }

    fn presign(&self, key: &str, ttl_minutes: i64) -> Result<String, AppError> {
        if !is_safe_key(key) {
            return Err(AppError::BadRequest("Invalid file key".to_string()));
        }

        let expires = (Utc::now() + Duration::minutes(ttl_minutes)).timestamp();
        let signature = hex::encode(self.signature(key, expires)?.finalize().into_bytes());

        Ok(format!(
            "{}/{}?expires={}&signature={}",
            self.public_base_url, key, expires, signature
        ))
    }

    fn verify_presigned(&self, key: &str, expires: i64, signature: &str) -> bool {
        if expires <= Utc::now().timestamp() || !is_safe_key(key) {
            return false;
        }
        let Ok(expected) = hex::decode(signature) else {
            return false;
        };
        match self.signature(key, expires) {
            Ok(mac) => mac.verify_slice(&expected).is_ok(),
            Err(_) => false,
        }
    }
}

/// Une clé ne doit jamais sortir du répertoire d'upload
fn is_safe_key(key: &str) -> bool {
    !key.is_empty()
        && !key.contains("..")
        && key.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
}

fn sanitize_file_name(file_name: &str) -> String {
    let cleaned: String = file_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let cleaned = cleaned.replace("..", "_");

    if cleaned.is_empty() { "file".to_string() } else { cleaned }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &tempfile::TempDir) -> LocalObjectStore {
        LocalObjectStore::new(dir.path(), "http://localhost/api/v1/files/", "signing-secret")
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        let stored = store.put(b"hello".to_vec(), "application/pdf", "notes cours 1.pdf").await.unwrap();
        assert!(stored.key.ends_with("notes_cours_1.pdf"));
        assert_eq!(stored.url, format!("http://localhost/api/v1/files/{}", stored.key));

        assert_eq!(store.get(&stored.key).await.unwrap(), b"hello".to_vec());

        store.delete(&stored.key).await.unwrap();
        assert!(matches!(store.get(&stored.key).await, Err(AppError::NotFound(_))));

        // Supprimer un objet déjà absent n'échoue pas
        store.delete(&stored.key).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        assert!(matches!(store.get("../etc/passwd").await, Err(AppError::BadRequest(_))));
        assert!(matches!(store.delete("a/b").await, Err(AppError::BadRequest(_))));
        assert_eq!(sanitize_file_name("../../x.pdf"), "____x.pdf");
    }

    #[test]
    fn test_presigned_url_verification() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        let url = store.presign("abc-file.pdf", 15).unwrap();
        let query = url.split('?').nth(1).unwrap();
        let mut expires = 0;
        let mut signature = String::new();
        for pair in query.split('&') {
            let (k, v) = pair.split_once('=').unwrap();
            match k {
                "expires" => expires = v.parse().unwrap(),
                "signature" => signature = v.to_string(),
                _ => {}
            }
        }

        assert!(store.verify_presigned("abc-file.pdf", expires, &signature));
        assert!(!store.verify_presigned("other.pdf", expires, &signature));
        assert!(!store.verify_presigned("abc-file.pdf", expires + 1, &signature));
        assert!(!store.verify_presigned("abc-file.pdf", expires, "zz"));
    }

    #[test]
    fn test_expired_presigned_url_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        let expires = Utc::now().timestamp() - 5;
        let signature = hex::encode(store.signature("k.pdf", expires).unwrap().finalize().into_bytes());
        assert!(!store.verify_presigned("k.pdf", expires, &signature));
    }
}
