//! SQL schema for the ADT SQLite store.
//!
//! Every mutable table has an `_audit` twin whose leading columns mirror the
//! live table exactly, followed by `valid_until` and `stored_until`. An
//! audit row is written by copying the live row as it stands
//! (`INSERT INTO x_audit SELECT *, ?, ? FROM x ...`), so the two column
//! lists must stay in step.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- ── Identity ────────────────────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS mrn (
    mrn_id        TEXT PRIMARY KEY,
    mrn           TEXT UNIQUE,
    nhs_number    TEXT,
    source_system TEXT NOT NULL,
    stored_from   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS mrn_audit (
    mrn_id        TEXT NOT NULL,
    mrn           TEXT,
    nhs_number    TEXT,
    source_system TEXT NOT NULL,
    stored_from   TEXT NOT NULL,
    valid_until   TEXT NOT NULL,
    stored_until  TEXT NOT NULL
);

-- One row per identifier; live_mrn_id is always a single hop.
CREATE TABLE IF NOT EXISTS mrn_to_live (
    mrn_id      TEXT PRIMARY KEY REFERENCES mrn(mrn_id),
    live_mrn_id TEXT NOT NULL REFERENCES mrn(mrn_id),
    valid_from  TEXT NOT NULL,
    stored_from TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS mrn_to_live_audit (
    mrn_id       TEXT NOT NULL,
    live_mrn_id  TEXT NOT NULL,
    valid_from   TEXT NOT NULL,
    stored_from  TEXT NOT NULL,
    valid_until  TEXT NOT NULL,
    stored_until TEXT NOT NULL
);

-- field_times: JSON object of column name -> last business time applied.
CREATE TABLE IF NOT EXISTS core_demographic (
    core_demographic_id TEXT PRIMARY KEY,
    mrn_id              TEXT NOT NULL UNIQUE REFERENCES mrn(mrn_id),
    given_name          TEXT,
    middle_name         TEXT,
    family_name         TEXT,
    sex                 TEXT,
    date_of_birth       TEXT,
    home_postcode       TEXT,
    alive               INTEGER,
    date_of_death       TEXT,
    field_times         TEXT NOT NULL DEFAULT '{}',
    valid_from          TEXT NOT NULL,
    stored_from         TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS core_demographic_audit (
    core_demographic_id TEXT NOT NULL,
    mrn_id              TEXT NOT NULL,
    given_name          TEXT,
    middle_name         TEXT,
    family_name         TEXT,
    sex                 TEXT,
    date_of_birth       TEXT,
    home_postcode       TEXT,
    alive               INTEGER,
    date_of_death       TEXT,
    field_times         TEXT NOT NULL,
    valid_from          TEXT NOT NULL,
    stored_from         TEXT NOT NULL,
    valid_until         TEXT NOT NULL,
    stored_until        TEXT NOT NULL
);

-- ── Visits ──────────────────────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS hospital_visit (
    hospital_visit_id     TEXT PRIMARY KEY,
    encounter             TEXT NOT NULL UNIQUE,
    mrn_id                TEXT NOT NULL REFERENCES mrn(mrn_id),
    source_system         TEXT NOT NULL,
    patient_class         TEXT,
    arrival_method        TEXT,
    presentation_time     TEXT,
    admission_time        TEXT,
    discharge_time        TEXT,
    discharge_disposition TEXT,
    discharge_destination TEXT,
    field_times           TEXT NOT NULL DEFAULT '{}',
    valid_from            TEXT NOT NULL,
    stored_from           TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS hospital_visit_audit (
    hospital_visit_id     TEXT NOT NULL,
    encounter             TEXT NOT NULL,
    mrn_id                TEXT NOT NULL,
    source_system         TEXT NOT NULL,
    patient_class         TEXT,
    arrival_method        TEXT,
    presentation_time     TEXT,
    admission_time        TEXT,
    discharge_time        TEXT,
    discharge_disposition TEXT,
    discharge_destination TEXT,
    field_times           TEXT NOT NULL,
    valid_from            TEXT NOT NULL,
    stored_from           TEXT NOT NULL,
    valid_until           TEXT NOT NULL,
    stored_until          TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS location_visit (
    location_visit_id  TEXT PRIMARY KEY,
    hospital_visit_id  TEXT NOT NULL REFERENCES hospital_visit(hospital_visit_id),
    location           TEXT NOT NULL,
    admission_time     TEXT,
    inferred_admission INTEGER NOT NULL DEFAULT 0,
    discharge_time     TEXT,
    inferred_discharge INTEGER NOT NULL DEFAULT 0,
    valid_from         TEXT NOT NULL,
    stored_from        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS location_visit_audit (
    location_visit_id  TEXT NOT NULL,
    hospital_visit_id  TEXT NOT NULL,
    location           TEXT NOT NULL,
    admission_time     TEXT,
    inferred_admission INTEGER NOT NULL,
    discharge_time     TEXT,
    inferred_discharge INTEGER NOT NULL,
    valid_from         TEXT NOT NULL,
    stored_from        TEXT NOT NULL,
    valid_until        TEXT NOT NULL,
    stored_until       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS planned_movement (
    planned_movement_id TEXT PRIMARY KEY,
    hospital_visit_id   TEXT NOT NULL REFERENCES hospital_visit(hospital_visit_id),
    event_type          TEXT NOT NULL,   -- 'admit' | 'transfer' | 'discharge'
    location            TEXT,
    event_datetime      TEXT,
    cancelled           INTEGER NOT NULL DEFAULT 0,
    cancelled_datetime  TEXT,
    consumed_datetime   TEXT,
    valid_from          TEXT NOT NULL,
    stored_from         TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS planned_movement_audit (
    planned_movement_id TEXT NOT NULL,
    hospital_visit_id   TEXT NOT NULL,
    event_type          TEXT NOT NULL,
    location            TEXT,
    event_datetime      TEXT,
    cancelled           INTEGER NOT NULL,
    cancelled_datetime  TEXT,
    consumed_datetime   TEXT,
    valid_from          TEXT NOT NULL,
    stored_from         TEXT NOT NULL,
    valid_until         TEXT NOT NULL,
    stored_until        TEXT NOT NULL
);

-- Movements reported for each encounter. A visit's location history is
-- rebuilt from these after every movement message. Departures from an
-- unnamed location have location ''. recorded is the latest recorded time
-- of any message reporting the movement.
CREATE TABLE IF NOT EXISTS location_event (
    encounter   TEXT NOT NULL,
    kind        TEXT NOT NULL,   -- 'arrival' | 'departure' | 'restored' | 'seen' | 'swap'
    location    TEXT NOT NULL,
    event_time  TEXT NOT NULL,
    previous    TEXT,
    recorded    TEXT NOT NULL,
    stored_from TEXT NOT NULL,
    PRIMARY KEY (encounter, kind, location, event_time)
);

-- Cancelled movements. A matching movement recorded no later than the
-- cancellation is ignored. Discharges are keyed with location ''.
CREATE TABLE IF NOT EXISTS cancelled_movement (
    encounter          TEXT NOT NULL,
    location           TEXT NOT NULL,
    event_time         TEXT NOT NULL,
    movement           TEXT NOT NULL,   -- 'admit' | 'transfer' | 'discharge'
    cancelled_recorded TEXT NOT NULL,
    stored_from        TEXT NOT NULL,
    PRIMARY KEY (encounter, location, event_time, movement)
);

-- ── Operations ──────────────────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS message_outcome (
    outcome_id         TEXT PRIMARY KEY,
    source_message_id  TEXT NOT NULL,
    message_type       TEXT NOT NULL,
    message_datetime   TEXT NOT NULL,
    status             TEXT NOT NULL,
    error_message      TEXT,
    processing_started TEXT NOT NULL,
    duration_micros    INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS mrn_nhs_idx              ON mrn(nhs_number);
CREATE INDEX IF NOT EXISTS mrn_to_live_live_idx     ON mrn_to_live(live_mrn_id);
CREATE INDEX IF NOT EXISTS hospital_visit_mrn_idx   ON hospital_visit(mrn_id);
CREATE INDEX IF NOT EXISTS location_visit_hv_idx    ON location_visit(hospital_visit_id);
CREATE INDEX IF NOT EXISTS planned_movement_hv_idx  ON planned_movement(hospital_visit_id);
CREATE INDEX IF NOT EXISTS message_outcome_src_idx  ON message_outcome(source_message_id);

PRAGMA user_version = 1;
";
