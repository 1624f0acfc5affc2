// Doublures partagées par les tests des services et des routes

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set};
use uuid::Uuid;

use crate::config::Config;
use crate::db;
use crate::error::AppError;
use crate::models::{posts, users};
use crate::services::mail_service::Mailer;
use crate::services::storage_service::{ObjectStore, StoredObject};
use crate::state::AppState;
use crate::utils::password;

#[derive(Debug, Clone)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<SentMail>>,
    pub fail: AtomicBool,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), AppError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Internal("Failed to send email: transport down".to_string()));
        }
        self.sent.lock().unwrap().push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: html_body.to_string(),
        });
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryObjectStore {
    pub objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
    pub fail_deletes: AtomicBool,
    deletes_before_failure: Mutex<Option<usize>>,
    deletes: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    /// Les `n` prochains deletes réussissent, les suivants échouent
    pub fn fail_deletes_after(&self, n: usize) {
        self.deletes.store(0, Ordering::SeqCst);
        *self.deletes_before_failure.lock().unwrap() = Some(n);
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, bytes: Vec<u8>, content_type: &str, file_name: &str) -> Result<StoredObject, AppError> {
        let key = format!("{}-{}", Uuid::new_v4(), file_name);
        self.objects
            .lock()
            .unwrap()
            .insert(key.clone(), (bytes, content_type.to_string()));
        Ok(StoredObject {
            url: format!("memory://{}", key),
            key,
        })
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, AppError> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|(bytes, _)| bytes.clone())
            .ok_or_else(|| AppError::NotFound("File not found".to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let attempt = self.deletes.fetch_add(1, Ordering::SeqCst);
        let budget_spent = matches!(*self.deletes_before_failure.lock().unwrap(), Some(n) if attempt >= n);
        if self.fail_deletes.load(Ordering::SeqCst) || budget_spent {
            return Err(AppError::Internal("Error deleting file: store unavailable".to_string()));
        }
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    fn presign(&self, key: &str, ttl_minutes: i64) -> Result<String, AppError> {
        Ok(format!("memory://{}?ttl={}", key, ttl_minutes))
    }
}

pub struct TestContext {
    pub state: AppState,
    pub mailer: Arc<RecordingMailer>,
    pub storage: Arc<MemoryObjectStore>,
}

pub async fn test_state() -> TestContext {
    let db = db::test_connection().await;
    let mailer = Arc::new(RecordingMailer::default());
    let storage = Arc::new(MemoryObjectStore::default());
    let state = AppState::new(db, Config::for_tests(), mailer.clone(), storage.clone());

    TestContext { state, mailer, storage }
}

/// Insère directement un user actif (sans passer par signup/activation)
pub async fn insert_user(state: &AppState, username: &str, plain_password: &str) -> users::Model {
    let now = Utc::now();
    users::ActiveModel {
        id: Set(Uuid::new_v4()),
        username: Set(username.to_string()),
        firstname: Set(username.to_string()),
        lastname: Set("Test".to_string()),
        email: Set(format!("{}@uni.ca", username)),
        password_hash: Set(password::hash_password(plain_password).unwrap()),
        profile_picture: Set(None),
        program: Set(None),
        year_of_graduation: Set(None),
        share_space_profile_username: Set(None),
        share_space_profile_type: Set(None),
        is_admin: Set(false),
        is_onboarded: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&state.db)
    .await
    .unwrap()
}

/// Post avec un objet déjà présent dans le store mémoire
pub async fn insert_post(ctx: &TestContext, owner: Uuid, title: &str, program: &str) -> posts::Model {
    let stored = ctx
        .storage
        .put(b"%PDF-1.4".to_vec(), "application/pdf", "notes.pdf")
        .await
        .unwrap();
    let now = Utc::now();

    posts::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(owner),
        title: Set(title.to_string()),
        description: Set(String::new()),
        thumbnail: Set(None),
        is_blacklisted: Set(false),
        file_type: Set("application/pdf".to_string()),
        file_name: Set("notes.pdf".to_string()),
        file_url: Set(stored.url),
        file_key: Set(stored.key),
        program: Set(program.to_string()),
        course: Set("CSI2110".to_string()),
        resource_type: Set("Notes".to_string()),
        semester: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&ctx.state.db)
    .await
    .unwrap()
}
