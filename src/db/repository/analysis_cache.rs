use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;

/// Look up a cached analysis payload by context hash.
pub fn get_cached_analysis(
    conn: &Connection,
    context_hash: &str,
) -> Result<Option<String>, DatabaseError> {
    let result = conn.query_row(
        "SELECT payload FROM analysis_cache WHERE context_hash = ?1",
        params![context_hash],
        |row| row.get::<_, String>(0),
    );

    match result {
        Ok(payload) => Ok(Some(payload)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Store (or refresh) an analysis payload under its context hash.
pub fn put_cached_analysis(
    conn: &Connection,
    context_hash: &str,
    patient_id: &Uuid,
    payload: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO analysis_cache (context_hash, patient_id, payload)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(context_hash) DO UPDATE SET payload = excluded.payload",
        params![context_hash, patient_id.to_string(), payload],
    )?;
    Ok(())
}
