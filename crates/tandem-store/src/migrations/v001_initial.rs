//! v001 -- Initial schema creation.
//!
//! Creates the pairing/consent/streak core: `users`, `sessions`, `couples`,
//! `couple_members`, `consent_ledgers`, `consent_history`,
//! `relationship_history`, `ephemeral_items`, `streak_counters`, and
//! `breakup_reviews`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id                  TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    pairing_code        TEXT NOT NULL UNIQUE,       -- short shareable code
    display_name        TEXT NOT NULL,
    relationship_status TEXT NOT NULL DEFAULT 'single',  -- single | paired
    couple_id           TEXT,                       -- weak ref -> couples(id)
    created_at          TEXT NOT NULL               -- ISO-8601 / RFC-3339
);

-- ----------------------------------------------------------------
-- Sessions (bearer tokens)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS sessions (
    token        TEXT PRIMARY KEY NOT NULL,         -- 64 hex chars
    user_id      TEXT NOT NULL,
    created_at   TEXT NOT NULL,
    last_seen_at TEXT NOT NULL,

    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

-- ----------------------------------------------------------------
-- Couples, with the pairing-request sub-record embedded
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS couples (
    id                      TEXT PRIMARY KEY NOT NULL,
    partner1_id             TEXT NOT NULL,           -- request initiator
    partner2_id             TEXT NOT NULL,           -- request target
    state                   TEXT NOT NULL DEFAULT 'pending',  -- pending | active | dissolved
    request_initiator_id    TEXT NOT NULL,
    request_target_id       TEXT NOT NULL,
    request_status          TEXT NOT NULL DEFAULT 'pending',  -- pending | accepted | rejected
    request_created_at      TEXT NOT NULL,
    request_resolved_at     TEXT,
    paired_at               TEXT,                    -- set on accept
    relationship_started_on TEXT,                    -- YYYY-MM-DD, user supplied
    dissolved_at            TEXT,

    FOREIGN KEY (partner1_id) REFERENCES users(id),
    FOREIGN KEY (partner2_id) REFERENCES users(id)
);

-- ----------------------------------------------------------------
-- Couple membership.  The partial unique index is the database-level
-- enforcement of "at most one pending/active couple per user".
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS couple_members (
    couple_id TEXT NOT NULL,
    user_id   TEXT NOT NULL,
    live      INTEGER NOT NULL DEFAULT 1,            -- boolean 0/1

    PRIMARY KEY (couple_id, user_id),
    FOREIGN KEY (couple_id) REFERENCES couples(id),
    FOREIGN KEY (user_id) REFERENCES users(id)
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_couple_members_one_live
    ON couple_members(user_id) WHERE live = 1;

-- ----------------------------------------------------------------
-- Consent ledger: one row per couple that has reached 'active'.
-- Created all-false inside the accept transaction.
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS consent_ledgers (
    couple_id           TEXT PRIMARY KEY NOT NULL,
    p1_photo_sharing    INTEGER NOT NULL DEFAULT 0,
    p1_memory_access    INTEGER NOT NULL DEFAULT 0,
    p1_location_sharing INTEGER NOT NULL DEFAULT 0,
    p2_photo_sharing    INTEGER NOT NULL DEFAULT 0,
    p2_memory_access    INTEGER NOT NULL DEFAULT 0,
    p2_location_sharing INTEGER NOT NULL DEFAULT 0,
    p1_updated_at       TEXT,
    p2_updated_at       TEXT,
    created_at          TEXT NOT NULL,

    FOREIGN KEY (couple_id) REFERENCES couples(id)
);

-- ----------------------------------------------------------------
-- Consent history: append-only flag-flip audit log.  No update or
-- delete path exists in the store API.
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS consent_history (
    id         TEXT PRIMARY KEY NOT NULL,
    couple_id  TEXT NOT NULL,
    user_id    TEXT NOT NULL,
    feature    TEXT NOT NULL,
    new_value  INTEGER NOT NULL,
    changed_at TEXT NOT NULL,

    FOREIGN KEY (couple_id) REFERENCES couples(id)
);

CREATE INDEX IF NOT EXISTS idx_consent_history_couple
    ON consent_history(couple_id, changed_at DESC);

-- ----------------------------------------------------------------
-- Relationship history: permanent, survives dissolution.
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS relationship_history (
    id                TEXT PRIMARY KEY NOT NULL,
    user_id           TEXT NOT NULL,
    couple_id         TEXT NOT NULL,
    partner_id        TEXT NOT NULL,
    partner_name      TEXT NOT NULL,                 -- snapshot at dissolution
    started_at        TEXT NOT NULL,
    ended_at          TEXT NOT NULL,
    duration_days     INTEGER NOT NULL,
    initiated_breakup INTEGER NOT NULL,              -- boolean 0/1
    created_at        TEXT NOT NULL,

    FOREIGN KEY (user_id) REFERENCES users(id)
);

CREATE INDEX IF NOT EXISTS idx_relationship_history_user
    ON relationship_history(user_id, ended_at DESC);

-- ----------------------------------------------------------------
-- Ephemeral items (streak photos).  Live := is_expired = 0 AND
-- expires_at > now; enforced at read time by filtering.
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS ephemeral_items (
    id          TEXT PRIMARY KEY NOT NULL,
    couple_id   TEXT NOT NULL,
    uploader_id TEXT NOT NULL,
    content_ref TEXT NOT NULL,                       -- opaque hosting reference
    created_at  TEXT NOT NULL,
    expires_at  TEXT NOT NULL,                       -- created_at + 24h
    viewed_at   TEXT,
    viewed_by   TEXT,
    is_expired  INTEGER NOT NULL DEFAULT 0,          -- boolean 0/1

    FOREIGN KEY (couple_id) REFERENCES couples(id)
);

CREATE INDEX IF NOT EXISTS idx_ephemeral_live
    ON ephemeral_items(uploader_id, is_expired, expires_at);

-- ----------------------------------------------------------------
-- Streak counters: one per couple, created zeroed on accept.
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS streak_counters (
    couple_id            TEXT PRIMARY KEY NOT NULL,
    current              INTEGER NOT NULL DEFAULT 0,
    best                 INTEGER NOT NULL DEFAULT 0,
    last_qualifying_day  TEXT,                       -- YYYY-MM-DD
    p1_last_submitted_at TEXT,
    p2_last_submitted_at TEXT,

    FOREIGN KEY (couple_id) REFERENCES couples(id)
);

-- ----------------------------------------------------------------
-- Breakup reviews: fully anonymous, keyed only to the dissolved
-- couple.  Deliberately no author column.
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS breakup_reviews (
    id         TEXT PRIMARY KEY NOT NULL,
    couple_id  TEXT NOT NULL,
    note       TEXT NOT NULL,
    created_at TEXT NOT NULL,

    FOREIGN KEY (couple_id) REFERENCES couples(id)
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
