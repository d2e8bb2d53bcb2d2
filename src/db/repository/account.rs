use std::str::FromStr;

use rusqlite::{params, Connection};

use crate::db::DatabaseError;
use crate::models::enums::{PersonalizationLevel, Tier};
use crate::models::{AccountSettings, AiSettings};

pub fn upsert_account(
    conn: &Connection,
    account_id: &str,
    settings: &AccountSettings,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO accounts (id, tier, memory_enabled, personalization_level)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(id) DO UPDATE SET
             tier = excluded.tier,
             memory_enabled = excluded.memory_enabled,
             personalization_level = excluded.personalization_level",
        params![
            account_id,
            settings.tier.as_str(),
            settings.ai.memory_enabled,
            settings.ai.personalization_level.as_str(),
        ],
    )?;
    Ok(())
}

/// Fetch account settings. Unknown accounts fall back to defaults
/// (free tier, memory off) rather than failing the chat turn.
pub fn get_account_settings(
    conn: &Connection,
    account_id: &str,
) -> Result<AccountSettings, DatabaseError> {
    let result = conn.query_row(
        "SELECT tier, memory_enabled, personalization_level FROM accounts WHERE id = ?1",
        params![account_id],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, bool>(1)?,
                row.get::<_, String>(2)?,
            ))
        },
    );

    match result {
        Ok((tier, memory_enabled, level)) => Ok(AccountSettings {
            tier: Tier::from_str(&tier)?,
            ai: AiSettings {
                memory_enabled,
                personalization_level: PersonalizationLevel::from_str(&level)?,
            },
        }),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(AccountSettings::default()),
        Err(e) => Err(e.into()),
    }
}
