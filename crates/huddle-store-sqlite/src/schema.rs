//! SQL schema for the Huddle SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id      TEXT PRIMARY KEY,
    display_name TEXT,
    real_name    TEXT,
    role         TEXT NOT NULL,      -- 'admin' | 'member'
    created_at   TEXT NOT NULL
);

-- Events are never physically deleted; is_deleted is terminal.
CREATE TABLE IF NOT EXISTS events (
    event_id      TEXT PRIMARY KEY,
    creator_id    TEXT NOT NULL,
    title         TEXT NOT NULL,
    location      TEXT,
    content       TEXT,
    notes         TEXT,
    scheduled_at  TEXT NOT NULL,     -- RFC 3339 UTC, fixed width
    status        TEXT NOT NULL,     -- 'registering' | 'ongoing' | 'finished'
    is_deleted    INTEGER NOT NULL DEFAULT 0,
    delete_time   TEXT,
    deleted_by    TEXT,
    delete_reason TEXT,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS registrations (
    registration_id TEXT PRIMARY KEY,
    event_id        TEXT NOT NULL REFERENCES events(event_id),
    user_id         TEXT NOT NULL,
    status          TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL,
    cancel_reason   TEXT,
    cancel_time     TEXT,
    UNIQUE (event_id, user_id)
);

-- No foreign keys: attempts outlive the rows they describe, and failed
-- attempts may reference records that have since gone missing.
CREATE TABLE IF NOT EXISTS notifications (
    notification_id TEXT PRIMARY KEY,
    event_id        TEXT NOT NULL,
    user_id         TEXT NOT NULL,
    operator_id     TEXT NOT NULL,
    kind            TEXT NOT NULL,   -- 'event_deleted' | 'batch_summary'
    status          TEXT NOT NULL,   -- 'pending' | 'sent' | 'failed' | 'read'
    title           TEXT NOT NULL,
    content         TEXT NOT NULL,
    retry_count     INTEGER NOT NULL DEFAULT 0,
    last_retry_time TEXT,
    error           TEXT,
    created_at      TEXT NOT NULL,
    send_time       TEXT,
    read_time       TEXT,
    metadata        TEXT NOT NULL DEFAULT '{}'
);

CREATE TABLE IF NOT EXISTS event_logs (
    log_id         TEXT PRIMARY KEY,
    event_id       TEXT NOT NULL,
    action         TEXT NOT NULL,
    operator_id    TEXT NOT NULL,
    operator_role  TEXT NOT NULL,
    event_title    TEXT NOT NULL,
    event_time     TEXT NOT NULL,
    reason         TEXT NOT NULL,
    before_stats   TEXT NOT NULL,    -- JSON RegistrationStats
    after_stats    TEXT,             -- JSON RegistrationStats or NULL
    operation_time TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS events_scheduled_idx       ON events(scheduled_at);
CREATE INDEX IF NOT EXISTS registrations_event_idx    ON registrations(event_id);
CREATE INDEX IF NOT EXISTS notifications_status_idx   ON notifications(status, created_at);
CREATE INDEX IF NOT EXISTS notifications_user_idx     ON notifications(user_id);
CREATE INDEX IF NOT EXISTS notifications_event_idx    ON notifications(event_id);
CREATE INDEX IF NOT EXISTS event_logs_event_idx       ON event_logs(event_id);

PRAGMA user_version = 1;
";
