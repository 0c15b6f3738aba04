use rusqlite::Connection;

const UP_SQL: &str = r#"
-- Add mood columns to users table
ALTER TABLE users ADD COLUMN mood TEXT;
ALTER TABLE users ADD COLUMN mood_updated_at TEXT;

-- Shared memories (soft-delete lifecycle; dissolution archives active rows)
CREATE TABLE IF NOT EXISTS memories (
    id          TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    couple_id   TEXT NOT NULL,               -- FK -> couples(id)
    author_id   TEXT NOT NULL,
    title       TEXT NOT NULL,
    body        TEXT NOT NULL,
    photo_ref   TEXT,                        -- opaque hosting reference
    happened_on TEXT,                        -- YYYY-MM-DD
    status      TEXT NOT NULL DEFAULT 'active',  -- active | archived | deleted
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,

    FOREIGN KEY (couple_id) REFERENCES couples(id)
);

CREATE INDEX IF NOT EXISTS idx_memories_couple_status
    ON memories(couple_id, status, created_at DESC);

-- Chat messages
CREATE TABLE IF NOT EXISTS messages (
    id        TEXT PRIMARY KEY NOT NULL,
    couple_id TEXT NOT NULL,
    sender_id TEXT NOT NULL,
    body      TEXT NOT NULL,
    sent_at   TEXT NOT NULL,

    FOREIGN KEY (couple_id) REFERENCES couples(id)
);

CREATE INDEX IF NOT EXISTS idx_messages_couple_ts
    ON messages(couple_id, sent_at DESC);

-- Last known location per partner
CREATE TABLE IF NOT EXISTS locations (
    couple_id  TEXT NOT NULL,
    user_id    TEXT NOT NULL,
    latitude   REAL NOT NULL,
    longitude  REAL NOT NULL,
    updated_at TEXT NOT NULL,

    PRIMARY KEY (couple_id, user_id),
    FOREIGN KEY (couple_id) REFERENCES couples(id)
);

-- Walkie-talkie buzzes (poll-based)
CREATE TABLE IF NOT EXISTS buzzes (
    id        TEXT PRIMARY KEY NOT NULL,
    couple_id TEXT NOT NULL,
    sender_id TEXT NOT NULL,
    voice_ref TEXT,                          -- opaque hosting reference
    sent_at   TEXT NOT NULL,
    seen_at   TEXT,

    FOREIGN KEY (couple_id) REFERENCES couples(id)
);

CREATE INDEX IF NOT EXISTS idx_buzzes_couple_unseen
    ON buzzes(couple_id, seen_at, sent_at DESC);

-- Shared calendar events
CREATE TABLE IF NOT EXISTS calendar_events (
    id         TEXT PRIMARY KEY NOT NULL,
    couple_id  TEXT NOT NULL,
    author_id  TEXT NOT NULL,
    title      TEXT NOT NULL,
    note       TEXT,
    starts_on  TEXT NOT NULL,                -- YYYY-MM-DD
    created_at TEXT NOT NULL,

    FOREIGN KEY (couple_id) REFERENCES couples(id)
);

CREATE INDEX IF NOT EXISTS idx_calendar_couple_date
    ON calendar_events(couple_id, starts_on ASC);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
