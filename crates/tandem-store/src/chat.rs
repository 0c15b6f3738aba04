//! CRUD operations for [`ChatMessage`] records.

use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::Result;
use crate::models::ChatMessage;
use crate::sql;

impl Database {
    /// Insert a new chat message.
    pub fn insert_chat_message(&self, message: &ChatMessage) -> Result<()> {
        self.conn().execute(
            "INSERT INTO messages (id, couple_id, sender_id, body, sent_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                message.id.to_string(),
                message.couple_id.to_string(),
                message.sender_id.to_string(),
                message.body,
                message.sent_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// List a couple's messages, newest first.
    pub fn chat_messages_for_couple(
        &self,
        couple_id: Uuid,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<ChatMessage>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, couple_id, sender_id, body, sent_at
             FROM messages
             WHERE couple_id = ?1
             ORDER BY sent_at DESC
             LIMIT ?2 OFFSET ?3",
        )?;
        let rows = stmt.query_map(
            params![couple_id.to_string(), limit, offset],
            row_to_message,
        )?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatMessage> {
    let id_str: String = row.get(0)?;
    let couple_id_str: String = row.get(1)?;
    let sender_id_str: String = row.get(2)?;
    let body: String = row.get(3)?;
    let sent_str: String = row.get(4)?;

    Ok(ChatMessage {
        id: sql::parse_uuid(0, &id_str)?,
        couple_id: sql::parse_uuid(1, &couple_id_str)?,
        sender_id: sql::parse_uuid(2, &sender_id_str)?,
        body,
        sent_at: sql::parse_ts(4, &sent_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{active_couple, test_db};
    use chrono::Utc;

    #[test]
    fn test_messages_paginate_newest_first() {
        let mut db = test_db();
        let (couple_id, ana_id, _) = active_couple(&mut db);

        for i in 0..5 {
            db.insert_chat_message(&ChatMessage {
                id: Uuid::new_v4(),
                couple_id,
                sender_id: ana_id,
                body: format!("message {i}"),
                sent_at: Utc::now() + chrono::Duration::seconds(i),
            })
            .unwrap();
        }

        let page = db.chat_messages_for_couple(couple_id, 2, 0).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].body, "message 4");

        let next = db.chat_messages_for_couple(couple_id, 2, 2).unwrap();
        assert_eq!(next[0].body, "message 2");
    }
}
