//! Encrypted, file-backed [`CredentialStore`] with atomic replace-on-write.
//!
//! The document is a single pretty-printed JSON object mapping cleartext `organization:service`
//! keys to ciphertext strings. Every value decrypts independently to one JSON [`TokenRecord`],
//! so one damaged entry never hides the others. Only a document that is not a JSON object at
//! all counts as corrupt and is reset.

// std
use std::{
	fs::{self, File},
	io::{ErrorKind, Write},
	path::{Path, PathBuf},
	process,
	sync::atomic::{AtomicU64, Ordering},
};
// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	auth::{CredentialKey, TokenRecord},
	obs::{self, StoreEvent},
	store::{Cipher, CredentialStore, StoreError, StoreFuture, ensure_persistable},
};

type Document = BTreeMap<String, Value>;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

enum Snapshot {
	Document(Document),
	Corrupt(String),
	Unreadable(String),
}

/// Persists encrypted records to one JSON file, rewriting it atomically on every mutation.
///
/// The read-modify-write cycle is serialized in-process; across processes the atomic rename
/// gives last-writer-wins.
#[derive(Clone)]
pub struct FileStore {
	path: PathBuf,
	cipher: Arc<dyn Cipher>,
	lock: Arc<Mutex<()>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path.
	///
	/// Missing parent directories and an empty `{}` document are created eagerly.
	pub fn open(path: impl Into<PathBuf>, cipher: Arc<dyn Cipher>) -> Result<Self, StoreError> {
		let path = path.into();

		ensure_parent_exists(&path)?;

		if !path.exists() {
			persist(&path, &Document::new())?;
		}

		Ok(Self { path, cipher, lock: Arc::new(Mutex::new(())) })
	}

	/// Location of the backing document.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn read_snapshot(&self) -> Snapshot {
		let bytes = match fs::read(&self.path) {
			Ok(bytes) => bytes,
			Err(e) if e.kind() == ErrorKind::NotFound => return Snapshot::Document(Document::new()),
			Err(e) =>
				return Snapshot::Unreadable(format!("Failed to read {}: {e}", self.path.display())),
		};

		if bytes.iter().all(u8::is_ascii_whitespace) {
			return Snapshot::Document(Document::new());
		}

		match serde_json::from_slice::<Document>(&bytes) {
			Ok(document) => Snapshot::Document(document),
			Err(e) => Snapshot::Corrupt(format!("Failed to parse {}: {e}", self.path.display())),
		}
	}

	/// Reads the document, resetting it to `{}` when it is corrupt.
	///
	/// Returns `None` when the file cannot be read at all.
	fn read_or_reset(&self) -> Option<Document> {
		match self.read_snapshot() {
			Snapshot::Document(document) => Some(document),
			Snapshot::Corrupt(detail) => {
				self.reset(&detail);

				Some(Document::new())
			},
			Snapshot::Unreadable(detail) => {
				obs::record_store_event(StoreEvent::ReadFailed, None, &detail);

				None
			},
		}
	}

	fn reset(&self, detail: &str) {
		obs::record_store_event(StoreEvent::CorruptDocument, None, &detail);

		if let Err(e) = persist(&self.path, &Document::new()) {
			obs::record_store_event(StoreEvent::ResetFailed, None, &e);
		}
	}

	fn writable_document(&self) -> Result<Document, StoreError> {
		match self.read_snapshot() {
			Snapshot::Document(document) => Ok(document),
			Snapshot::Corrupt(detail) => {
				obs::record_store_event(StoreEvent::CorruptDocument, None, &detail);

				Ok(Document::new())
			},
			Snapshot::Unreadable(message) => Err(StoreError::Backend { message }),
		}
	}

	fn seal(&self, record: &TokenRecord) -> Result<String, StoreError> {
		let plaintext = serde_json::to_vec(record).map_err(|e| StoreError::Serialization {
			message: format!("Failed to serialize token record: {e}"),
		})?;

		self.cipher
			.encrypt(&plaintext)
			.map_err(|e| StoreError::Encryption { message: e.to_string() })
	}

	fn open_entry(&self, key: &CredentialKey, entry: &Value) -> Option<TokenRecord> {
		let opened = entry
			.as_str()
			.ok_or_else(|| String::from("Entry is not a ciphertext string"))
			.and_then(|sealed| self.cipher.decrypt(sealed).map_err(|e| e.to_string()))
			.and_then(|plaintext| {
				serde_json::from_slice::<TokenRecord>(&plaintext).map_err(|e| e.to_string())
			})
			.and_then(|record| {
				ensure_persistable(&record).map(|_| record).map_err(|e| e.to_string())
			});

		match opened {
			Ok(record) => Some(record),
			Err(detail) => {
				obs::record_store_event(StoreEvent::UndecryptableEntry, Some(key), &detail);

				None
			},
		}
	}

	fn save_now(&self, key: &CredentialKey, record: &TokenRecord) -> Result<(), StoreError> {
		ensure_persistable(record)?;

		let sealed = self.seal(record)?;
		let _guard = self.lock.lock();
		let mut document = self.writable_document()?;

		document.insert(key.to_string(), Value::String(sealed));

		persist(&self.path, &document)
	}

	fn load_now(&self, key: &CredentialKey) -> Option<TokenRecord> {
		let document = {
			let _guard = self.lock.lock();

			self.read_or_reset()?
		};

		document.get(&key.to_string()).and_then(|entry| self.open_entry(key, entry))
	}

	fn delete_now(&self, key: &CredentialKey) -> Result<bool, StoreError> {
		let _guard = self.lock.lock();
		let mut document = match self.read_snapshot() {
			Snapshot::Document(document) => document,
			Snapshot::Corrupt(detail) => {
				self.reset(&detail);

				return Ok(false);
			},
			Snapshot::Unreadable(message) => return Err(StoreError::Backend { message }),
		};

		if document.remove(&key.to_string()).is_none() {
			return Ok(false);
		}

		persist(&self.path, &document)?;

		Ok(true)
	}

	fn keys_now(&self) -> Vec<CredentialKey> {
		let document = {
			let _guard = self.lock.lock();

			self.read_or_reset().unwrap_or_default()
		};

		document
			.into_keys()
			.filter_map(|raw| match raw.parse::<CredentialKey>() {
				Ok(key) => Some(key),
				Err(e) => {
					obs::record_store_event(StoreEvent::InvalidKey, None, &e);

					None
				},
			})
			.collect()
	}
}
impl Debug for FileStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("FileStore").field("path", &self.path).finish_non_exhaustive()
	}
}
impl CredentialStore for FileStore {
	fn save<'a>(&'a self, key: &'a CredentialKey, record: TokenRecord) -> StoreFuture<'a, ()> {
		Box::pin(async move { self.save_now(key, &record) })
	}

	fn load<'a>(&'a self, key: &'a CredentialKey) -> StoreFuture<'a, Option<TokenRecord>> {
		Box::pin(async move { Ok(self.load_now(key)) })
	}

	fn delete<'a>(&'a self, key: &'a CredentialKey) -> StoreFuture<'a, bool> {
		Box::pin(async move { self.delete_now(key) })
	}

	fn keys(&self) -> StoreFuture<'_, Vec<CredentialKey>> {
		Box::pin(async move { Ok(self.keys_now()) })
	}
}

fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
			message: format!("Failed to create store directory {}: {e}", parent.display()),
		})?;
	}

	Ok(())
}

fn persist(path: &Path, document: &Document) -> Result<(), StoreError> {
	ensure_parent_exists(path)?;

	let serialized = serde_json::to_vec_pretty(document).map_err(|e| StoreError::Serialization {
		message: format!("Failed to serialize store document: {e}"),
	})?;
	let tmp_path = temp_path_for(path);

	{
		let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
			message: format!("Failed to create {}: {e}", tmp_path.display()),
		})?;

		file.write_all(&serialized).map_err(|e| StoreError::Backend {
			message: format!("Failed to write {}: {e}", tmp_path.display()),
		})?;
		file.sync_all().map_err(|e| StoreError::Backend {
			message: format!("Failed to sync {}: {e}", tmp_path.display()),
		})?;
	}

	fs::rename(&tmp_path, path).map_err(|e| {
		let _ = fs::remove_file(&tmp_path);

		StoreError::Backend { message: format!("Failed to replace {}: {e}", path.display()) }
	})
}

fn temp_path_for(path: &Path) -> PathBuf {
	let mut name = path.file_name().map(|name| name.to_os_string()).unwrap_or_default();

	name.push(format!(
		".{}.{}.tmp",
		process::id(),
		TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
	));

	path.with_file_name(name)
}

#[cfg(test)]
mod tests {
	// std
	use std::env;
	// self
	use super::*;
	use crate::{_preludet::key, store::Aes256GcmCipher};

	fn temp_path(label: &str) -> PathBuf {
		let unique = format!(
			"token_broker_file_store_{label}_{}_{}",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique).join("tokens.json")
	}

	fn cipher() -> Arc<dyn Cipher> {
		Arc::new(
			Aes256GcmCipher::from_passphrase("file-store-tests")
				.expect("Passphrase cipher should build."),
		)
	}

	fn record(token: &str) -> TokenRecord {
		TokenRecord::builder()
			.access_token(token)
			.refresh_token("refresh")
			.expires_in(Duration::hours(1))
			.build()
			.expect("Failed to build file-store test record.")
	}

	fn cleanup(path: &Path) {
		if let Some(parent) = path.parent() {
			let _ = fs::remove_dir_all(parent);
		}
	}

	#[test]
	fn open_creates_directory_and_empty_document() {
		let path = temp_path("open");
		let _store = FileStore::open(&path, cipher()).expect("Store should open.");

		assert_eq!(fs::read_to_string(&path).expect("Document should exist."), "{}");

		cleanup(&path);
	}

	#[test]
	fn temp_paths_are_unique_per_write() {
		let path = Path::new("data/tokens.json");
		let first = temp_path_for(path);
		let second = temp_path_for(path);

		assert_ne!(first, second);
		assert_eq!(first.parent(), path.parent());
		assert!(first.to_string_lossy().ends_with(".tmp"));
	}

	#[tokio::test]
	async fn stores_sharing_a_path_keep_every_entry() {
		let path = temp_path("shared");
		let left = FileStore::open(&path, cipher()).expect("Store should open.");
		let right = FileStore::open(&path, cipher()).expect("Store should open.");

		left.save(&key("org1", "crm"), record("a")).await.expect("Save should succeed.");
		right.save(&key("org2", "crm"), record("b")).await.expect("Save should succeed.");

		assert!(left.load(&key("org2", "crm")).await.expect("Load never fails.").is_some());
		assert!(right.load(&key("org1", "crm")).await.expect("Load never fails.").is_some());

		cleanup(&path);
	}

	#[tokio::test]
	async fn entries_are_encrypted_at_rest_with_cleartext_keys() {
		let path = temp_path("at_rest");
		let store = FileStore::open(&path, cipher()).expect("Store should open.");
		let key = key("org123", "crm");

		store.save(&key, record("very-secret-access")).await.expect("Save should succeed.");

		let raw = fs::read_to_string(&path).expect("Document should be readable.");
		let document: Document = serde_json::from_str(&raw).expect("Document should be JSON.");

		assert!(raw.contains('\n'), "Document should be pretty-printed.");
		assert!(!raw.contains("very-secret-access"));
		assert!(document.contains_key("org123:crm"));
		assert!(
			fs::read_dir(path.parent().expect("Document should have a parent."))
				.expect("Store directory should be readable.")
				.filter_map(|entry| entry.ok())
				.all(|entry| !entry.file_name().to_string_lossy().ends_with(".tmp")),
			"Temporary files must be renamed away."
		);

		cleanup(&path);
	}

	#[tokio::test]
	async fn undecryptable_entries_read_as_absent_without_hiding_others() {
		let path = temp_path("undecryptable");
		let store = FileStore::open(&path, cipher()).expect("Store should open.");
		let good = key("org123", "crm");
		let bad = key("org123", "erp");

		store.save(&good, record("good")).await.expect("Save should succeed.");

		let mut document: Document =
			serde_json::from_str(&fs::read_to_string(&path).expect("Document should be readable."))
				.expect("Document should be JSON.");

		document.insert(bad.to_string(), "garbage".into());
		persist(&path, &document).expect("Tampered document should persist.");

		assert!(store.load(&bad).await.expect("Load never fails.").is_none());
		assert_eq!(
			store.load(&good).await.expect("Load never fails.").map(|r| r.access_token),
			Some(record("good").access_token)
		);

		cleanup(&path);
	}

	#[tokio::test]
	async fn non_string_entries_read_as_absent_without_resetting_the_document() {
		let path = temp_path("non_string");
		let store = FileStore::open(&path, cipher()).expect("Store should open.");
		let good = key("org1", "crm");
		let odd = key("org1", "erp");

		store.save(&good, record("good")).await.expect("Save should succeed.");

		let mut document: Document =
			serde_json::from_str(&fs::read_to_string(&path).expect("Document should be readable."))
				.expect("Document should be JSON.");

		document.insert("legacy".into(), Value::from(1));
		document.insert(odd.to_string(), serde_json::json!({ "access_token": "plain" }));
		persist(&path, &document).expect("Tampered document should persist.");

		assert!(store.load(&odd).await.expect("Load never fails.").is_none());
		assert_eq!(
			store.load(&good).await.expect("Load never fails.").map(|r| r.access_token),
			Some(record("good").access_token)
		);

		store.save(&key("org2", "crm"), record("other")).await.expect("Save should succeed.");

		let reread: Document =
			serde_json::from_str(&fs::read_to_string(&path).expect("Document should be readable."))
				.expect("Document should be JSON.");

		assert_eq!(reread.get("legacy"), Some(&Value::from(1)));
		assert!(reread.contains_key("org1:crm"));
		assert!(reread.contains_key("org2:crm"));

		cleanup(&path);
	}

	#[tokio::test]
	async fn delete_reports_whether_an_entry_was_removed() {
		let path = temp_path("delete");
		let store = FileStore::open(&path, cipher()).expect("Store should open.");
		let key = key("org123", "crm");

		assert!(!store.delete(&key).await.expect("Delete should succeed."));

		store.save(&key, record("abc")).await.expect("Save should succeed.");

		assert!(store.delete(&key).await.expect("Delete should succeed."));
		assert!(!store.delete(&key).await.expect("Delete should succeed."));
		assert!(store.load(&key).await.expect("Load never fails.").is_none());

		cleanup(&path);
	}

	#[tokio::test]
	async fn keys_skip_unparsable_entries() {
		let path = temp_path("keys");
		let store = FileStore::open(&path, cipher()).expect("Store should open.");

		store.save(&key("org1", "crm"), record("a")).await.expect("Save should succeed.");
		store.save(&key("org2", "erp"), record("b")).await.expect("Save should succeed.");

		let mut document: Document =
			serde_json::from_str(&fs::read_to_string(&path).expect("Document should be readable."))
				.expect("Document should be JSON.");

		document.insert("no-separator".into(), "x".into());
		persist(&path, &document).expect("Tampered document should persist.");

		assert_eq!(
			store.keys().await.expect("Keys never fail."),
			vec![key("org1", "crm"), key("org2", "erp")]
		);

		cleanup(&path);
	}

	#[tokio::test]
	async fn blank_access_tokens_are_rejected_before_touching_disk() {
		let path = temp_path("blank");
		let store = FileStore::open(&path, cipher()).expect("Store should open.");
		let mut blank = record("abc");

		blank.access_token = crate::auth::TokenSecret::new(" ");

		assert!(matches!(
			store.save(&key("org1", "crm"), blank).await,
			Err(StoreError::InvalidRecord { .. })
		));
		assert_eq!(fs::read_to_string(&path).expect("Document should exist."), "{}");

		cleanup(&path);
	}
}
