//! Identity resolver: identifier creation, lookup and merge chains.
//!
//! Every identifier has exactly one `mrn_to_live` row. Merges re-point all
//! rows targeting the retired live identifier in one batch, so resolving an
//! identifier is always a single hop.

use adt_core::{
  identity::{Mrn, MrnToLive},
  Error as CoreError,
};
use rusqlite::{Connection, OptionalExtension as _};
use uuid::Uuid;

use crate::{
  encode::{decode_uuid, encode_dt, encode_uuid, FieldTimes, RawMrn, MRN_COLUMNS},
  row_state::{RowState, Stamp, TemporalRow},
  Result,
};

// ─── Rows ────────────────────────────────────────────────────────────────────

impl TemporalRow for Mrn {
  const TABLE: &'static str = "mrn";
  const ID_COLUMN: &'static str = "mrn_id";

  fn row_id(&self) -> Uuid { self.mrn_id }

  fn touch(&mut self, stamp: Stamp) { self.stored_from = stamp.stored_from; }

  fn insert(&self, conn: &Connection, _: &FieldTimes) -> Result<()> {
    conn.execute(
      "INSERT INTO mrn (mrn_id, mrn, nhs_number, source_system, stored_from)
       VALUES (?1, ?2, ?3, ?4, ?5)",
      rusqlite::params![
        encode_uuid(self.mrn_id),
        self.mrn,
        self.nhs_number,
        self.source_system,
        encode_dt(self.stored_from),
      ],
    )?;
    Ok(())
  }

  fn update(&self, conn: &Connection, _: &FieldTimes) -> Result<()> {
    conn.execute(
      "UPDATE mrn SET mrn = ?2, nhs_number = ?3, source_system = ?4, stored_from = ?5
       WHERE mrn_id = ?1",
      rusqlite::params![
        encode_uuid(self.mrn_id),
        self.mrn,
        self.nhs_number,
        self.source_system,
        encode_dt(self.stored_from),
      ],
    )?;
    Ok(())
  }
}

impl TemporalRow for MrnToLive {
  const TABLE: &'static str = "mrn_to_live";
  const ID_COLUMN: &'static str = "mrn_id";

  fn row_id(&self) -> Uuid { self.mrn_id }

  fn touch(&mut self, stamp: Stamp) {
    self.valid_from = stamp.event_time;
    self.stored_from = stamp.stored_from;
  }

  fn insert(&self, conn: &Connection, _: &FieldTimes) -> Result<()> {
    conn.execute(
      "INSERT INTO mrn_to_live (mrn_id, live_mrn_id, valid_from, stored_from)
       VALUES (?1, ?2, ?3, ?4)",
      rusqlite::params![
        encode_uuid(self.mrn_id),
        encode_uuid(self.live_mrn_id),
        encode_dt(self.valid_from),
        encode_dt(self.stored_from),
      ],
    )?;
    Ok(())
  }

  fn update(&self, conn: &Connection, _: &FieldTimes) -> Result<()> {
    conn.execute(
      "UPDATE mrn_to_live SET live_mrn_id = ?2, valid_from = ?3, stored_from = ?4
       WHERE mrn_id = ?1",
      rusqlite::params![
        encode_uuid(self.mrn_id),
        encode_uuid(self.live_mrn_id),
        encode_dt(self.valid_from),
        encode_dt(self.stored_from),
      ],
    )?;
    Ok(())
  }
}

// ─── Lookup ──────────────────────────────────────────────────────────────────

pub fn get_mrn(conn: &Connection, mrn_id: Uuid) -> Result<Mrn> {
  let raw = conn.query_row(
    &format!("SELECT {MRN_COLUMNS} FROM mrn WHERE mrn_id = ?1"),
    [encode_uuid(mrn_id)],
    RawMrn::from_row,
  )?;
  raw.into_mrn()
}

pub fn find_by_mrn(conn: &Connection, mrn: &str) -> Result<Option<Mrn>> {
  conn
    .query_row(
      &format!("SELECT {MRN_COLUMNS} FROM mrn WHERE mrn = ?1"),
      [mrn],
      RawMrn::from_row,
    )
    .optional()?
    .map(RawMrn::into_mrn)
    .transpose()
}

/// Look an identifier up by either natural key, MRN first.
pub fn find(conn: &Connection, mrn: Option<&str>, nhs_number: Option<&str>) -> Result<Option<Mrn>> {
  if let Some(mrn) = mrn
    && let Some(found) = find_by_mrn(conn, mrn)?
  {
    return Ok(Some(found));
  }
  let Some(nhs_number) = nhs_number else {
    return Ok(None);
  };
  conn
    .query_row(
      &format!(
        "SELECT {MRN_COLUMNS} FROM mrn WHERE nhs_number = ?1 ORDER BY stored_from LIMIT 1"
      ),
      [nhs_number],
      RawMrn::from_row,
    )
    .optional()?
    .map(RawMrn::into_mrn)
    .transpose()
}

/// The identifier `mrn_id` currently live-points at.
pub fn live_id(conn: &Connection, mrn_id: Uuid) -> Result<Uuid> {
  let live: String = conn.query_row(
    "SELECT live_mrn_id FROM mrn_to_live WHERE mrn_id = ?1",
    [encode_uuid(mrn_id)],
    |r| r.get(0),
  )?;
  decode_uuid(&live)
}

pub fn live_of(conn: &Connection, mrn: &Mrn) -> Result<Mrn> {
  let live = live_id(conn, mrn.mrn_id)?;
  if live == mrn.mrn_id { Ok(mrn.clone()) } else { get_mrn(conn, live) }
}

// ─── Creation ────────────────────────────────────────────────────────────────

/// Find the identifier with these keys, creating it (live-pointing at
/// itself) if neither key is known.
pub fn find_or_create(
  conn: &Connection,
  mrn: Option<&str>,
  nhs_number: Option<&str>,
  source_system: &str,
  stamp: Stamp,
) -> Result<Mrn> {
  if mrn.is_none() && nhs_number.is_none() {
    return Err(CoreError::ignored("message carries no patient identifier").into());
  }
  if let Some(found) = find(conn, mrn, nhs_number)? {
    return Ok(found);
  }

  let created = Mrn {
    mrn_id:        Uuid::new_v4(),
    mrn:           mrn.map(str::to_owned),
    nhs_number:    nhs_number.map(str::to_owned),
    source_system: source_system.to_owned(),
    stored_from:   stamp.stored_from,
  };
  let created = RowState::insert(conn, created, FieldTimes::new(), stamp)?.into_entity();
  let pointer = MrnToLive {
    mrn_id:      created.mrn_id,
    live_mrn_id: created.mrn_id,
    valid_from:  stamp.event_time,
    stored_from: stamp.stored_from,
  };
  RowState::insert(conn, pointer, FieldTimes::new(), stamp)?;
  tracing::debug!(identifier = %created.label(), "created identifier");
  Ok(created)
}

/// Resolve a message's identifiers to the live identity, creating the
/// identifier on first sight.
pub fn get_or_create(
  conn: &Connection,
  mrn: Option<&str>,
  nhs_number: Option<&str>,
  source_system: &str,
  stamp: Stamp,
) -> Result<Mrn> {
  let found = find_or_create(conn, mrn, nhs_number, source_system, stamp)?;
  live_of(conn, &found)
}

// ─── Merge ───────────────────────────────────────────────────────────────────

/// Merge the identity reached from the retiring keys into `surviving`.
///
/// Every identifier live-pointing at the retired live identity is re-pointed
/// in one statement, with one audit row per link. Returns `false` when the
/// two were already the same person.
pub fn merge(
  conn: &Connection,
  retiring_mrn: Option<&str>,
  retiring_nhs_number: Option<&str>,
  surviving: &Mrn,
  source_system: &str,
  stamp: Stamp,
) -> Result<bool> {
  let retiring = find_or_create(conn, retiring_mrn, retiring_nhs_number, source_system, stamp)?;
  let retired_live = live_id(conn, retiring.mrn_id)?;
  if retired_live == surviving.mrn_id {
    tracing::debug!(
      retiring = %retiring.label(),
      surviving = %surviving.label(),
      "identities already merged"
    );
    return Ok(false);
  }

  let retired_live = encode_uuid(retired_live);
  conn.execute(
    "INSERT INTO mrn_to_live_audit
     SELECT *, ?2, ?3 FROM mrn_to_live WHERE live_mrn_id = ?1",
    rusqlite::params![retired_live, encode_dt(stamp.event_time), encode_dt(stamp.stored_from)],
  )?;
  let repointed = conn.execute(
    "UPDATE mrn_to_live SET live_mrn_id = ?2, valid_from = ?3, stored_from = ?4
     WHERE live_mrn_id = ?1",
    rusqlite::params![
      retired_live,
      encode_uuid(surviving.mrn_id),
      encode_dt(stamp.event_time),
      encode_dt(stamp.stored_from),
    ],
  )?;
  tracing::info!(
    retiring = %retiring.label(),
    surviving = %surviving.label(),
    repointed,
    "merged identities"
  );
  Ok(true)
}

// ─── Identifier change ───────────────────────────────────────────────────────

/// Rename the identifier known by the previous keys to the new keys.
pub fn change_identifier(
  conn: &Connection,
  previous_mrn: Option<&str>,
  previous_nhs_number: Option<&str>,
  new_mrn: Option<&str>,
  new_nhs_number: Option<&str>,
  source_system: &str,
  stamp: Stamp,
) -> Result<()> {
  let Some(new_mrn) = new_mrn else {
    return Err(CoreError::ignored("identifier change carries no new MRN").into());
  };
  let previous = find(conn, previous_mrn, previous_nhs_number)?;

  if let Some(existing) = find_by_mrn(conn, new_mrn)? {
    return match previous {
      Some(previous) if previous.mrn_id != existing.mrn_id => Err(
        CoreError::incompatible(format!(
          "cannot rename {} to MRN {new_mrn}: that MRN already belongs to another identifier",
          previous.label()
        ))
        .into(),
      ),
      _ => {
        tracing::debug!(mrn = new_mrn, "identifier change already applied");
        Ok(())
      }
    };
  }

  let Some(previous) = previous else {
    find_or_create(conn, Some(new_mrn), new_nhs_number, source_system, stamp)?;
    return Ok(());
  };

  let mut row = RowState::loaded(previous, FieldTimes::new(), stamp);
  row.assign(Some(new_mrn.to_owned()), |m| &mut m.mrn);
  if let Some(nhs) = new_nhs_number {
    row.assign(Some(nhs.to_owned()), |m| &mut m.nhs_number);
  }
  row.save(conn)?;
  Ok(())
}
