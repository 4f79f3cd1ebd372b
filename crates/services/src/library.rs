//! Image library: records, collections, saved prompts, share links and edit
//! history persisted in SQLite, with image bytes kept in a [`BlobStore`].
//!
//! Every mutation writes straight through; callers re-fetch the lists they
//! display afterwards.

use crate::blob_store::{storage_path_for, BlobStore, FsBlobStore};
use crate::stats::compute_statistics;
use crate::validation::validate_upload;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use shared::records::{
    Collection, EditHistoryEntry, ImageRecord, SavedPrompt, ShareExpiry, ShareLink,
    UsageStatistics,
};
use shared::StudioError;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

const IMAGE_COLUMNS: &str =
    "id, original_url, edited_url, filename, uploaded_at, tags, is_favorite, description, storage_path";

fn db(err: rusqlite::Error) -> StudioError {
    StudioError::Database(err.to_string())
}

fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or_else(|| Utc.timestamp_nanos(0))
}

fn non_blank(value: &str, field: &str) -> Result<String, StudioError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(StudioError::validation(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn image_from_row(row: &Row) -> rusqlite::Result<ImageRecord> {
    let tags_json: Option<String> = row.get(5)?;
    let tags = tags_json
        .and_then(|t| serde_json::from_str::<Vec<String>>(&t).ok())
        .unwrap_or_default();
    Ok(ImageRecord {
        id: row.get(0)?,
        original_url: row.get(1)?,
        edited_url: row.get(2)?,
        filename: row.get(3)?,
        uploaded_at: from_millis(row.get(4)?),
        tags,
        is_favorite: row.get::<_, i64>(6)? != 0,
        description: row.get(7)?,
        storage_path: row.get(8)?,
    })
}

fn collection_from_row(row: &Row) -> rusqlite::Result<Collection> {
    Ok(Collection {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_at: from_millis(row.get(3)?),
        image_count: row.get::<_, i64>(4)?.max(0) as usize,
    })
}

fn prompt_from_row(row: &Row) -> rusqlite::Result<SavedPrompt> {
    Ok(SavedPrompt {
        id: row.get(0)?,
        name: row.get(1)?,
        prompt: row.get(2)?,
        category: row.get(3)?,
        used_count: row.get::<_, i64>(4)?.max(0) as u32,
        created_at: from_millis(row.get(5)?),
    })
}

fn share_from_row(row: &Row) -> rusqlite::Result<ShareLink> {
    Ok(ShareLink {
        id: row.get(0)?,
        image_id: row.get(1)?,
        token: row.get(2)?,
        created_at: from_millis(row.get(3)?),
        expires_at: row.get::<_, Option<i64>>(4)?.map(from_millis),
    })
}

fn edit_from_row(row: &Row) -> rusqlite::Result<EditHistoryEntry> {
    Ok(EditHistoryEntry {
        id: row.get(0)?,
        image_id: row.get(1)?,
        prompt: row.get(2)?,
        created_at: from_millis(row.get(3)?),
    })
}

/// Persistent store for everything the gallery shows
pub struct Library {
    conn: Mutex<Connection>,
    blobs: Arc<dyn BlobStore>,
}

impl Library {
    /// Open (or create) the library under `data_dir`: `library.db` plus a
    /// `blobs/` directory.
    pub fn open(data_dir: &Path, public_base_url: &str) -> Result<Self, StudioError> {
        std::fs::create_dir_all(data_dir)?;
        let blobs = FsBlobStore::new(&data_dir.join("blobs"), public_base_url)?;
        let conn = Connection::open(data_dir.join("library.db")).map_err(db)?;
        Self::with_connection(conn, Arc::new(blobs))
    }

    pub fn with_connection(
        conn: Connection,
        blobs: Arc<dyn BlobStore>,
    ) -> Result<Self, StudioError> {
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            blobs,
        })
    }

    /// In-memory database, used by tests and dry runs.
    pub fn in_memory(blobs: Arc<dyn BlobStore>) -> Result<Self, StudioError> {
        Self::with_connection(Connection::open_in_memory().map_err(db)?, blobs)
    }

    fn init_schema(conn: &Connection) -> Result<(), StudioError> {
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
            CREATE TABLE IF NOT EXISTS images (
                id TEXT PRIMARY KEY,
                original_url TEXT NOT NULL,
                edited_url TEXT,
                filename TEXT NOT NULL,
                uploaded_at INTEGER NOT NULL,
                tags TEXT,
                is_favorite INTEGER NOT NULL DEFAULT 0,
                description TEXT,
                storage_path TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS collections (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT,
                created_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS collection_images (
                collection_id TEXT NOT NULL REFERENCES collections(id) ON DELETE CASCADE,
                image_id TEXT NOT NULL REFERENCES images(id) ON DELETE CASCADE,
                PRIMARY KEY (collection_id, image_id)
            );
            CREATE TABLE IF NOT EXISTS saved_prompts (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                prompt TEXT NOT NULL,
                category TEXT,
                used_count INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS share_links (
                id TEXT PRIMARY KEY,
                image_id TEXT NOT NULL REFERENCES images(id) ON DELETE CASCADE,
                token TEXT UNIQUE NOT NULL,
                created_at INTEGER NOT NULL,
                expires_at INTEGER
            );
            CREATE TABLE IF NOT EXISTS edit_history (
                id TEXT PRIMARY KEY,
                image_id TEXT REFERENCES images(id) ON DELETE SET NULL,
                prompt TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_images_uploaded ON images(uploaded_at);",
        )
        .map_err(db)
    }

    // ── Images ───────────────────────────────────────────────────────

    /// Validate an upload, store its bytes and insert the record.
    pub fn save_image(
        &self,
        filename: &str,
        bytes: &[u8],
        edited_url: Option<&str>,
    ) -> Result<ImageRecord, StudioError> {
        let valid = validate_upload(filename, bytes)?;
        let storage_path = storage_path_for(&valid.filename);
        self.blobs.put(&storage_path, bytes)?;

        let mut record = ImageRecord::new(
            valid.filename,
            self.blobs.public_url(&storage_path),
            storage_path.clone(),
            Utc::now(),
        );
        record.edited_url = edited_url.map(str::to_string);

        if let Err(err) = self.insert_image(&record) {
            // the record never existed, so the blob would be orphaned
            if let Err(cleanup) = self.blobs.remove(&storage_path) {
                tracing::warn!(
                    path = %storage_path,
                    error = %cleanup,
                    "orphaned blob left after failed insert"
                );
            }
            return Err(err);
        }
        tracing::info!(id = %record.id, filename = %record.filename, "image saved");
        Ok(record)
    }

    /// Insert an already-built record (blob assumed present).
    pub fn insert_image(&self, record: &ImageRecord) -> Result<(), StudioError> {
        let tags = serde_json::to_string(&record.tags)
            .map_err(|e| StudioError::Database(e.to_string()))?;
        self.conn
            .lock()
            .execute(
                &format!(
                    "INSERT INTO images ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    IMAGE_COLUMNS
                ),
                params![
                    record.id,
                    record.original_url,
                    record.edited_url,
                    record.filename,
                    to_millis(record.uploaded_at),
                    tags,
                    record.is_favorite as i64,
                    record.description,
                    record.storage_path,
                ],
            )
            .map_err(db)?;
        Ok(())
    }

    /// All images, newest first.
    pub fn list_images(&self) -> Result<Vec<ImageRecord>, StudioError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM images ORDER BY uploaded_at DESC",
                IMAGE_COLUMNS
            ))
            .map_err(db)?;
        let rows = stmt.query_map([], image_from_row).map_err(db)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db)
    }

    pub fn get_image(&self, id: &str) -> Result<ImageRecord, StudioError> {
        self.conn
            .lock()
            .query_row(
                &format!("SELECT {} FROM images WHERE id = ?1", IMAGE_COLUMNS),
                params![id],
                image_from_row,
            )
            .optional()
            .map_err(db)?
            .ok_or_else(|| StudioError::not_found("image", id))
    }

    fn update_image(
        &self,
        id: &str,
        sql: &str,
        value: &dyn rusqlite::ToSql,
    ) -> Result<(), StudioError> {
        let changed = self
            .conn
            .lock()
            .execute(sql, params![value, id])
            .map_err(db)?;
        if changed == 0 {
            return Err(StudioError::not_found("image", id));
        }
        Ok(())
    }

    pub fn set_tags(&self, id: &str, tags: &[String]) -> Result<(), StudioError> {
        let json =
            serde_json::to_string(tags).map_err(|e| StudioError::Database(e.to_string()))?;
        self.update_image(id, "UPDATE images SET tags = ?1 WHERE id = ?2", &json)
    }

    pub fn set_description(&self, id: &str, description: Option<&str>) -> Result<(), StudioError> {
        let description = optional_text(description);
        self.update_image(
            id,
            "UPDATE images SET description = ?1 WHERE id = ?2",
            &description,
        )
    }

    pub fn set_edited_url(&self, id: &str, edited_url: &str) -> Result<(), StudioError> {
        self.update_image(id, "UPDATE images SET edited_url = ?1 WHERE id = ?2", &edited_url)
    }

    /// Flip the favorite flag and return the new value.
    pub fn toggle_favorite(&self, id: &str) -> Result<bool, StudioError> {
        self.conn
            .lock()
            .query_row(
                "UPDATE images SET is_favorite = 1 - is_favorite WHERE id = ?1
                 RETURNING is_favorite",
                params![id],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .map_err(db)?
            .map(|flag| flag != 0)
            .ok_or_else(|| StudioError::not_found("image", id))
    }

    /// Remove the blob, then the record.
    ///
    /// If the blob cannot be removed the record is kept and the storage error
    /// is returned, so no record ever points at a missing blob.
    pub fn delete_image(&self, id: &str) -> Result<(), StudioError> {
        let record = self.get_image(id)?;

        if let Err(err) = self.blobs.remove(&record.storage_path) {
            tracing::warn!(id, error = %err, "blob removal failed; record kept");
            return Err(err);
        }

        self.conn
            .lock()
            .execute("DELETE FROM images WHERE id = ?1", params![id])
            .map_err(db)?;
        tracing::info!(id, "image deleted");
        Ok(())
    }

    // ── Collections ──────────────────────────────────────────────────

    pub fn create_collection(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Collection, StudioError> {
        let collection = Collection {
            id: Uuid::new_v4().to_string(),
            name: non_blank(name, "Collection name")?,
            description: optional_text(description),
            created_at: Utc::now(),
            image_count: 0,
        };
        self.conn
            .lock()
            .execute(
                "INSERT INTO collections (id, name, description, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    collection.id,
                    collection.name,
                    collection.description,
                    to_millis(collection.created_at)
                ],
            )
            .map_err(db)?;
        Ok(collection)
    }

    pub fn update_collection(
        &self,
        id: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<(), StudioError> {
        let name = non_blank(name, "Collection name")?;
        let changed = self
            .conn
            .lock()
            .execute(
                "UPDATE collections SET name = ?1, description = ?2 WHERE id = ?3",
                params![name, optional_text(description), id],
            )
            .map_err(db)?;
        if changed == 0 {
            return Err(StudioError::not_found("collection", id));
        }
        Ok(())
    }

    pub fn delete_collection(&self, id: &str) -> Result<(), StudioError> {
        let changed = self
            .conn
            .lock()
            .execute("DELETE FROM collections WHERE id = ?1", params![id])
            .map_err(db)?;
        if changed == 0 {
            return Err(StudioError::not_found("collection", id));
        }
        Ok(())
    }

    /// Collections newest first, with their image counts.
    pub fn list_collections(&self) -> Result<Vec<Collection>, StudioError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT c.id, c.name, c.description, c.created_at, COUNT(ci.image_id)
                 FROM collections c
                 LEFT JOIN collection_images ci ON ci.collection_id = c.id
                 GROUP BY c.id
                 ORDER BY c.created_at DESC",
            )
            .map_err(db)?;
        let rows = stmt.query_map([], collection_from_row).map_err(db)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db)
    }

    /// Add images to a collection. Images already in it are skipped; returns
    /// how many were added.
    pub fn add_to_collection(
        &self,
        collection_id: &str,
        image_ids: &[String],
    ) -> Result<usize, StudioError> {
        if image_ids.is_empty() {
            return Err(StudioError::validation("Select a collection and images"));
        }
        let mut conn = self.conn.lock();
        let exists: Option<String> = conn
            .query_row(
                "SELECT id FROM collections WHERE id = ?1",
                params![collection_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(db)?;
        if exists.is_none() {
            return Err(StudioError::not_found("collection", collection_id));
        }

        let tx = conn.transaction().map_err(db)?;
        let mut added = 0;
        for image_id in image_ids {
            let known: Option<String> = tx
                .query_row(
                    "SELECT id FROM images WHERE id = ?1",
                    params![image_id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(db)?;
            if known.is_none() {
                return Err(StudioError::not_found("image", image_id.as_str()));
            }
            added += tx
                .execute(
                    "INSERT OR IGNORE INTO collection_images (collection_id, image_id) VALUES (?1, ?2)",
                    params![collection_id, image_id],
                )
                .map_err(db)?;
        }
        tx.commit().map_err(db)?;
        Ok(added)
    }

    pub fn collection_images(&self, collection_id: &str) -> Result<Vec<ImageRecord>, StudioError> {
        let conn = self.conn.lock();
        let columns = IMAGE_COLUMNS
            .split(", ")
            .map(|c| format!("i.{}", c))
            .collect::<Vec<_>>()
            .join(", ");
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM images i
                 JOIN collection_images ci ON ci.image_id = i.id
                 WHERE ci.collection_id = ?1
                 ORDER BY i.uploaded_at DESC",
                columns
            ))
            .map_err(db)?;
        let rows = stmt
            .query_map(params![collection_id], image_from_row)
            .map_err(db)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db)
    }

    // ── Saved prompts ────────────────────────────────────────────────

    pub fn save_prompt(
        &self,
        name: &str,
        prompt: &str,
        category: Option<&str>,
    ) -> Result<SavedPrompt, StudioError> {
        let saved = SavedPrompt {
            id: Uuid::new_v4().to_string(),
            name: non_blank(name, "Name")?,
            prompt: non_blank(prompt, "Prompt")?,
            category: optional_text(category),
            used_count: 0,
            created_at: Utc::now(),
        };
        self.conn
            .lock()
            .execute(
                "INSERT INTO saved_prompts (id, name, prompt, category, used_count, created_at)
                 VALUES (?1, ?2, ?3, ?4, 0, ?5)",
                params![
                    saved.id,
                    saved.name,
                    saved.prompt,
                    saved.category,
                    to_millis(saved.created_at)
                ],
            )
            .map_err(db)?;
        Ok(saved)
    }

    pub fn update_prompt(
        &self,
        id: &str,
        name: &str,
        prompt: &str,
        category: Option<&str>,
    ) -> Result<(), StudioError> {
        let changed = self
            .conn
            .lock()
            .execute(
                "UPDATE saved_prompts SET name = ?1, prompt = ?2, category = ?3 WHERE id = ?4",
                params![
                    non_blank(name, "Name")?,
                    non_blank(prompt, "Prompt")?,
                    optional_text(category),
                    id
                ],
            )
            .map_err(db)?;
        if changed == 0 {
            return Err(StudioError::not_found("prompt", id));
        }
        Ok(())
    }

    pub fn delete_prompt(&self, id: &str) -> Result<(), StudioError> {
        let changed = self
            .conn
            .lock()
            .execute("DELETE FROM saved_prompts WHERE id = ?1", params![id])
            .map_err(db)?;
        if changed == 0 {
            return Err(StudioError::not_found("prompt", id));
        }
        Ok(())
    }

    /// Most used first.
    pub fn list_prompts(&self) -> Result<Vec<SavedPrompt>, StudioError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, name, prompt, category, used_count, created_at FROM saved_prompts
                 ORDER BY used_count DESC, created_at DESC",
            )
            .map_err(db)?;
        let rows = stmt.query_map([], prompt_from_row).map_err(db)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db)
    }

    /// Bump the usage counter and hand back the prompt.
    pub fn use_prompt(&self, id: &str) -> Result<SavedPrompt, StudioError> {
        let conn = self.conn.lock();
        let changed = conn
            .execute(
                "UPDATE saved_prompts SET used_count = used_count + 1 WHERE id = ?1",
                params![id],
            )
            .map_err(db)?;
        if changed == 0 {
            return Err(StudioError::not_found("prompt", id));
        }
        conn.query_row(
            "SELECT id, name, prompt, category, used_count, created_at FROM saved_prompts WHERE id = ?1",
            params![id],
            prompt_from_row,
        )
        .map_err(db)
    }

    // ── Share links ──────────────────────────────────────────────────

    pub fn create_share_link(
        &self,
        image_id: &str,
        expiry: ShareExpiry,
        now: DateTime<Utc>,
    ) -> Result<ShareLink, StudioError> {
        self.get_image(image_id)?;
        let link = ShareLink {
            id: Uuid::new_v4().to_string(),
            image_id: image_id.to_string(),
            token: Uuid::new_v4().to_string(),
            created_at: now,
            expires_at: expiry.expires_at(now),
        };
        self.conn
            .lock()
            .execute(
                "INSERT INTO share_links (id, image_id, token, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    link.id,
                    link.image_id,
                    link.token,
                    to_millis(link.created_at),
                    link.expires_at.map(to_millis)
                ],
            )
            .map_err(db)?;
        Ok(link)
    }

    /// The shared image, provided the link exists and has not expired.
    pub fn resolve_share_link(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<ImageRecord, StudioError> {
        let link = self
            .conn
            .lock()
            .query_row(
                "SELECT id, image_id, token, created_at, expires_at FROM share_links WHERE token = ?1",
                params![token],
                share_from_row,
            )
            .optional()
            .map_err(db)?
            .ok_or_else(|| StudioError::not_found("share link", token))?;

        if link.is_expired(now) {
            return Err(StudioError::not_found("share link", token));
        }
        self.get_image(&link.image_id)
    }

    // ── Edit history & statistics ────────────────────────────────────

    pub fn record_edit(
        &self,
        image_id: Option<&str>,
        prompt: &str,
    ) -> Result<EditHistoryEntry, StudioError> {
        let entry = EditHistoryEntry {
            id: Uuid::new_v4().to_string(),
            image_id: image_id.map(str::to_string),
            prompt: prompt.to_string(),
            created_at: Utc::now(),
        };
        self.conn
            .lock()
            .execute(
                "INSERT INTO edit_history (id, image_id, prompt, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    entry.id,
                    entry.image_id,
                    entry.prompt,
                    to_millis(entry.created_at)
                ],
            )
            .map_err(db)?;
        Ok(entry)
    }

    /// Edits newest first; `limit` of `None` returns all of them.
    pub fn edit_history(&self, limit: Option<usize>) -> Result<Vec<EditHistoryEntry>, StudioError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, image_id, prompt, created_at FROM edit_history
                 ORDER BY created_at DESC LIMIT ?1",
            )
            .map_err(db)?;
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let rows = stmt.query_map(params![limit], edit_from_row).map_err(db)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db)
    }

    /// The `limit` most recent edits.
    pub fn recent_edits(&self, limit: usize) -> Result<Vec<EditHistoryEntry>, StudioError> {
        self.edit_history(Some(limit))
    }

    pub fn statistics(&self, now: DateTime<Utc>) -> Result<UsageStatistics, StudioError> {
        let images = self.list_images()?;
        let edits = self.edit_history(None)?;
        Ok(compute_statistics(&images, &edits, now))
    }
}
