use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{format_timestamp, parse_timestamp};
use crate::db::DatabaseError;
use crate::models::enums::MessageRole;
use crate::models::{Conversation, Message};

pub fn insert_conversation(conn: &Connection, conv: &Conversation) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO conversations (id, account_id, patient_id, title, started_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            conv.id.to_string(),
            conv.account_id,
            conv.patient_id.map(|id| id.to_string()),
            conv.title,
            format_timestamp(conv.started_at),
        ],
    )?;
    Ok(())
}

pub fn get_conversation(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<Conversation>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, account_id, patient_id, title, started_at
         FROM conversations WHERE id = ?1",
        params![id.to_string()],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
            ))
        },
    );

    match result {
        Ok((id, account_id, patient_id, title, started_at)) => Ok(Some(Conversation {
            id: Uuid::parse_str(&id)
                .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
            account_id,
            patient_id: patient_id.and_then(|s| Uuid::parse_str(&s).ok()),
            title,
            started_at: parse_timestamp(&started_at)?,
        })),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_conversations(
    conn: &Connection,
    account_id: &str,
) -> Result<Vec<Conversation>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, account_id, patient_id, title, started_at
         FROM conversations WHERE account_id = ?1 ORDER BY started_at DESC",
    )?;

    let rows = stmt.query_map(params![account_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, Option<String>>(3)?,
            row.get::<_, String>(4)?,
        ))
    })?;

    let mut conversations = Vec::new();
    for row in rows {
        let (id, account_id, patient_id, title, started_at) = row?;
        conversations.push(Conversation {
            id: Uuid::parse_str(&id)
                .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
            account_id,
            patient_id: patient_id.and_then(|s| Uuid::parse_str(&s).ok()),
            title,
            started_at: parse_timestamp(&started_at)?,
        });
    }
    Ok(conversations)
}

pub fn insert_message(conn: &Connection, msg: &Message) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO messages (id, conversation_id, role, content, image_url, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            msg.id.to_string(),
            msg.conversation_id.to_string(),
            msg.role.as_str(),
            msg.content,
            msg.image_url,
            format_timestamp(msg.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_messages_by_conversation(
    conn: &Connection,
    conversation_id: &Uuid,
) -> Result<Vec<Message>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, conversation_id, role, content, image_url, created_at
         FROM messages WHERE conversation_id = ?1 ORDER BY created_at ASC, id ASC",
    )?;

    let rows = stmt.query_map(params![conversation_id.to_string()], |row| {
        Ok(MessageRow {
            id: row.get(0)?,
            conversation_id: row.get(1)?,
            role: row.get(2)?,
            content: row.get(3)?,
            image_url: row.get(4)?,
            created_at: row.get(5)?,
        })
    })?;

    let mut messages = Vec::new();
    for row in rows {
        messages.push(message_from_row(row?)?);
    }
    Ok(messages)
}

/// Most recent `limit` messages, oldest first: the slice of history the
/// assembler sees when account memory is enabled.
pub fn get_recent_messages(
    conn: &Connection,
    conversation_id: &Uuid,
    limit: usize,
) -> Result<Vec<Message>, DatabaseError> {
    let mut messages = get_messages_by_conversation(conn, conversation_id)?;
    if messages.len() > limit {
        messages = messages.split_off(messages.len() - limit);
    }
    Ok(messages)
}

struct MessageRow {
    id: String,
    conversation_id: String,
    role: String,
    content: String,
    image_url: Option<String>,
    created_at: String,
}

fn message_from_row(row: MessageRow) -> Result<Message, DatabaseError> {
    Ok(Message {
        id: Uuid::parse_str(&row.id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        conversation_id: Uuid::parse_str(&row.conversation_id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        role: MessageRole::from_str(&row.role)?,
        content: row.content,
        image_url: row.image_url,
        created_at: parse_timestamp(&row.created_at)?,
    })
}
