use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use tracing::{debug, info};

use crate::config::AnalysisParams;
use crate::error::{Error, Result};
use crate::hashing::FingerprintRecord;
use crate::index::{FingerprintIndex, IndexBuilder};

const PARAMS_KEY: &str = "analysis_params";

fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE meta (
            key         TEXT PRIMARY KEY,
            value       TEXT NOT NULL
        );
        CREATE TABLE tracks (
            track_id    INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL UNIQUE
        );
        CREATE TABLE fingerprints (
            hash        INTEGER NOT NULL,
            time_offset REAL NOT NULL,
            track_id    INTEGER NOT NULL,
            FOREIGN KEY (track_id) REFERENCES tracks (track_id)
        );",
    )?;
    Ok(())
}

/// `index.db` -> `index.db.tmp`, next to the target so the final rename stays on
/// one filesystem.
fn staging_path(db_path: &Path) -> PathBuf {
    let mut name = db_path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("index"));
    name.push(".tmp");
    db_path.with_file_name(name)
}

fn write_index(path: &Path, index: &FingerprintIndex) -> Result<()> {
    let mut conn = Connection::open(path)?;
    create_schema(&conn)?;

    let tx = conn.transaction()?;
    {
        tx.execute(
            "INSERT INTO meta (key, value) VALUES (?1, ?2)",
            params![PARAMS_KEY, index.params().encode()],
        )?;

        let mut track_ids = HashMap::with_capacity(index.tracks().len());
        let mut stmt = tx.prepare("INSERT INTO tracks (name) VALUES (?1)")?;
        for track in index.tracks() {
            stmt.execute(params![&**track])?;
            track_ids.insert(&**track, tx.last_insert_rowid());
        }

        let mut stmt = tx
            .prepare("INSERT INTO fingerprints (hash, time_offset, track_id) VALUES (?1, ?2, ?3)")?;
        for (hash, entries) in index.buckets() {
            for entry in entries {
                let track_id = track_ids.get(&*entry.track).ok_or_else(|| {
                    Error::CorruptIndex(format!("entry for unlisted track {}", entry.track))
                })?;
                stmt.execute(params![hash as i64, entry.offset, track_id])?;
            }
        }
    }
    tx.commit()?;
    conn.close().map_err(|(_, err)| Error::from(err))?;
    Ok(())
}

/// Writes the whole index to `db_path`, replacing whatever file was there. The new
/// file is built beside the target and only renamed over it once fully written, so
/// a failed save leaves the previous index untouched.
pub fn save_index(db_path: impl AsRef<Path>, index: &FingerprintIndex) -> Result<()> {
    let db_path = db_path.as_ref();
    let staging = staging_path(db_path);
    if staging.exists() {
        fs::remove_file(&staging)?;
    }

    if let Err(err) = write_index(&staging, index) {
        let _ = fs::remove_file(&staging);
        return Err(err);
    }
    fs::rename(&staging, db_path)?;

    info!(
        path = %db_path.display(),
        tracks = index.tracks().len(),
        hashes = index.hash_count(),
        entries = index.entry_count(),
        "index saved"
    );
    Ok(())
}

/// Reads the whole index back into memory. Fails if it was built with different
/// analysis parameters than `expected`.
pub fn load_index(
    db_path: impl AsRef<Path>,
    expected: &AnalysisParams,
) -> Result<FingerprintIndex> {
    let db_path = db_path.as_ref();
    if !db_path.is_file() {
        return Err(Error::IndexNotFound(db_path.to_path_buf()));
    }

    let conn = Connection::open_with_flags(db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;

    let stored: Option<String> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = ?1",
            params![PARAMS_KEY],
            |row| row.get(0),
        )
        .optional()?;
    let stored = stored.ok_or_else(|| Error::CorruptIndex("missing analysis parameters".into()))?;
    if stored != expected.encode() {
        return Err(Error::ParamsMismatch {
            stored,
            expected: expected.encode(),
        });
    }

    let mut builder = IndexBuilder::new(*expected);

    let mut names: HashMap<i64, String> = HashMap::new();
    let mut stmt = conn.prepare("SELECT track_id, name FROM tracks ORDER BY track_id")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?;
    for row in rows {
        let (track_id, name) = row?;
        builder.add_records(&name, &[]);
        names.insert(track_id, name);
    }

    let mut stmt =
        conn.prepare("SELECT hash, time_offset, track_id FROM fingerprints ORDER BY rowid")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, f64>(1)?,
            row.get::<_, i64>(2)?,
        ))
    })?;

    for row in rows {
        let (hash, time_offset, track_id) = row?;
        let name = names
            .get(&track_id)
            .ok_or_else(|| Error::CorruptIndex(format!("unknown track id {}", track_id)))?;
        let record = FingerprintRecord {
            hash: hash as u64,
            offset: time_offset,
        };
        builder.add_records(name, &[record]);
    }

    let index = builder.finish();
    debug!(
        path = %db_path.display(),
        tracks = index.tracks().len(),
        entries = index.entry_count(),
        "index loaded"
    );
    Ok(index)
}
