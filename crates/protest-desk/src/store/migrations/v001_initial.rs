//! v001 -- customer record graph.
//!
//! Foreign keys carry no `ON DELETE` actions: removal order is the caller's job.

use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS profiles (
    id               TEXT PRIMARY KEY NOT NULL,   -- external auth identifier
    email            TEXT NOT NULL UNIQUE,
    first_name       TEXT NOT NULL,
    last_name        TEXT NOT NULL,
    phone            TEXT,
    role             TEXT NOT NULL DEFAULT 'customer',
    is_authenticated INTEGER NOT NULL DEFAULT 0,  -- boolean 0/1
    referral_code    TEXT,
    created_at       TEXT
);

CREATE INDEX IF NOT EXISTS idx_profiles_referral_code ON profiles(referral_code);

CREATE TABLE IF NOT EXISTS contacts (
    id           TEXT PRIMARY KEY NOT NULL,
    first_name   TEXT NOT NULL,
    last_name    TEXT NOT NULL,
    email        TEXT,
    phone        TEXT,
    contact_type TEXT NOT NULL,
    created_at   TEXT
);

CREATE TABLE IF NOT EXISTS owners (
    id              TEXT PRIMARY KEY NOT NULL,
    name            TEXT NOT NULL,
    owner_type      TEXT NOT NULL,
    entity_name     TEXT,
    mailing_address TEXT,
    created_by      TEXT NOT NULL,
    created_at      TEXT,

    FOREIGN KEY (created_by) REFERENCES profiles(id)
);

CREATE TABLE IF NOT EXISTS properties (
    id                TEXT PRIMARY KEY NOT NULL,
    user_id           TEXT NOT NULL,
    owner_id          TEXT NOT NULL,
    contact_id        TEXT,
    address           TEXT NOT NULL UNIQUE,       -- situs address
    parcel_number     TEXT,
    county            TEXT,
    assessed_value    REAL,
    estimated_savings REAL,
    created_at        TEXT,

    FOREIGN KEY (user_id)    REFERENCES profiles(id),
    FOREIGN KEY (owner_id)   REFERENCES owners(id),
    FOREIGN KEY (contact_id) REFERENCES contacts(id)
);

CREATE INDEX IF NOT EXISTS idx_properties_user_id ON properties(user_id);

CREATE TABLE IF NOT EXISTS applications (
    id          TEXT PRIMARY KEY NOT NULL,
    property_id TEXT NOT NULL,
    user_id     TEXT NOT NULL,
    signature   TEXT,
    is_verified INTEGER NOT NULL DEFAULT 0,
    status      TEXT NOT NULL,
    created_at  TEXT,

    FOREIGN KEY (property_id) REFERENCES properties(id),
    FOREIGN KEY (user_id)     REFERENCES profiles(id)
);

CREATE TABLE IF NOT EXISTS protests (
    id               TEXT PRIMARY KEY NOT NULL,
    property_id      TEXT NOT NULL,
    tax_year         INTEGER NOT NULL,
    appeal_status    TEXT NOT NULL,
    exemption_status TEXT NOT NULL,
    assessed_value   REAL,
    market_value     REAL,
    protest_amount   REAL,
    offer_amount     REAL,
    recommendation   TEXT,
    hearing_date     TEXT,
    savings_amount   REAL NOT NULL DEFAULT 0,
    created_at       TEXT,

    FOREIGN KEY (property_id) REFERENCES properties(id)
);

CREATE INDEX IF NOT EXISTS idx_protests_property_id ON protests(property_id);

CREATE TABLE IF NOT EXISTS bills (
    id         TEXT PRIMARY KEY NOT NULL,
    user_id    TEXT NOT NULL,
    owner_id   TEXT NOT NULL,
    protest_id TEXT,
    amount     REAL NOT NULL,
    status     TEXT NOT NULL,
    created_at TEXT,

    FOREIGN KEY (user_id)    REFERENCES profiles(id),
    FOREIGN KEY (owner_id)   REFERENCES owners(id),
    FOREIGN KEY (protest_id) REFERENCES protests(id)
);

CREATE TABLE IF NOT EXISTS customer_documents (
    id            TEXT PRIMARY KEY NOT NULL,
    user_id       TEXT NOT NULL,
    property_id   TEXT,
    document_type TEXT NOT NULL,
    storage_path  TEXT,
    created_at    TEXT,

    FOREIGN KEY (user_id)     REFERENCES profiles(id),
    FOREIGN KEY (property_id) REFERENCES properties(id)
);

CREATE TABLE IF NOT EXISTS communications (
    id         TEXT PRIMARY KEY NOT NULL,
    contact_id TEXT NOT NULL,
    channel    TEXT NOT NULL,
    body       TEXT,
    created_at TEXT,

    FOREIGN KEY (contact_id) REFERENCES contacts(id)
);

CREATE TABLE IF NOT EXISTS communication_properties (
    id               TEXT PRIMARY KEY NOT NULL,
    communication_id TEXT NOT NULL,
    property_id      TEXT NOT NULL,

    FOREIGN KEY (communication_id) REFERENCES communications(id),
    FOREIGN KEY (property_id)      REFERENCES properties(id)
);

CREATE TABLE IF NOT EXISTS credit_transactions (
    id      TEXT PRIMARY KEY NOT NULL,
    user_id TEXT NOT NULL,
    amount  REAL NOT NULL,
    reason  TEXT,

    FOREIGN KEY (user_id) REFERENCES profiles(id)
);

CREATE TABLE IF NOT EXISTS verification_codes (
    id         TEXT PRIMARY KEY NOT NULL,
    user_id    TEXT NOT NULL,
    code       TEXT NOT NULL,
    expires_at TEXT,

    FOREIGN KEY (user_id) REFERENCES profiles(id)
);

CREATE TABLE IF NOT EXISTS referral_relationships (
    id            TEXT PRIMARY KEY NOT NULL,
    referrer_id   TEXT NOT NULL,
    referee_id    TEXT NOT NULL,
    referral_code TEXT NOT NULL,
    status        TEXT NOT NULL,
    created_at    TEXT,

    FOREIGN KEY (referrer_id) REFERENCES profiles(id),
    FOREIGN KEY (referee_id)  REFERENCES profiles(id)
);
"#;

/// Columns stored as 0/1 integers that decode back to JSON booleans.
pub const BOOLEAN_COLUMNS: &[(&str, &str)] = &[
    ("profiles", "is_authenticated"),
    ("applications", "is_verified"),
];

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
