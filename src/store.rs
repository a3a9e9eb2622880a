use std::path::Path;

use rusqlite::Connection;
use time::Date;
use tokio::sync::{mpsc, oneshot};

use crate::model::{Identity, Slot, TimeLabel, format_date, parse_date};

const COMMAND_QUEUE_DEPTH: usize = 1024;

/// Result of a conditional claim attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The slot was free and is now held by the claimant.
    Claimed,
    /// The slot exists but someone else holds it.
    Occupied,
    /// No slot with that (date, time) has been seeded.
    Unknown,
}

#[derive(Debug)]
pub enum StoreError {
    Sqlite(rusqlite::Error),
    /// More than one row holds the same occupant — invariant I2 is broken.
    /// This is a consistency failure, never a silent pick.
    DuplicateOccupant(Identity),
    /// A persisted date/time cell no longer parses as a label.
    Corrupt(String),
    /// The store owner task is gone.
    Closed,
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Sqlite(e) => write!(f, "sqlite error: {e}"),
            StoreError::DuplicateOccupant(who) => {
                write!(f, "consistency error: {who} occupies more than one slot")
            }
            StoreError::Corrupt(what) => write!(f, "corrupt row: {what}"),
            StoreError::Closed => write!(f, "store task shut down"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Sqlite(e)
    }
}

/// Commands handled by the store owner task. Each carries a oneshot for the
/// reply, so callers await exactly one storage round trip.
enum StoreCommand {
    EnsureDaySeeded {
        date: Date,
        times: Vec<TimeLabel>,
        response: oneshot::Sender<Result<usize, StoreError>>,
    },
    ListFree {
        date: Date,
        response: oneshot::Sender<Result<Vec<TimeLabel>, StoreError>>,
    },
    FindByOccupant {
        identity: Identity,
        response: oneshot::Sender<Result<Option<Slot>, StoreError>>,
    },
    ClaimIfFree {
        date: Date,
        time: TimeLabel,
        identity: Identity,
        response: oneshot::Sender<Result<ClaimOutcome, StoreError>>,
    },
    ReleaseByOccupant {
        identity: Identity,
        response: oneshot::Sender<Result<usize, StoreError>>,
    },
}

/// Background task that owns the SQLite connection. Serializing every
/// operation through one task is the atomicity boundary: a conditional
/// UPDATE can never interleave with another mutation.
async fn store_loop(conn: Connection, mut rx: mpsc::Receiver<StoreCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            StoreCommand::EnsureDaySeeded { date, times, response } => {
                let _ = response.send(ensure_day_seeded(&conn, date, &times));
            }
            StoreCommand::ListFree { date, response } => {
                let _ = response.send(list_free(&conn, date));
            }
            StoreCommand::FindByOccupant { identity, response } => {
                let _ = response.send(find_by_occupant(&conn, &identity));
            }
            StoreCommand::ClaimIfFree { date, time, identity, response } => {
                let _ = response.send(claim_if_free(&conn, date, time, &identity));
            }
            StoreCommand::ReleaseByOccupant { identity, response } => {
                let _ = response.send(release_by_occupant(&conn, &identity));
            }
        }
    }
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS appointments (
            id    INTEGER PRIMARY KEY AUTOINCREMENT,
            phone TEXT,
            date  TEXT NOT NULL,
            time  TEXT NOT NULL,
            UNIQUE (date, time)
        )",
    )
}

fn ensure_day_seeded(conn: &Connection, date: Date, times: &[TimeLabel]) -> Result<usize, StoreError> {
    let date = format_date(date);
    let mut stmt =
        conn.prepare_cached("INSERT OR IGNORE INTO appointments (date, time) VALUES (?1, ?2)")?;
    let mut inserted = 0usize;
    for time in times {
        inserted += stmt.execute((&date, time.to_string()))?;
    }
    Ok(inserted)
}

fn list_free(conn: &Connection, date: Date) -> Result<Vec<TimeLabel>, StoreError> {
    // Zero-padded HH:MM sorts lexicographically in chronological order.
    let mut stmt = conn.prepare_cached(
        "SELECT time FROM appointments WHERE date = ?1 AND phone IS NULL ORDER BY time ASC",
    )?;
    let rows = stmt.query_map([format_date(date)], |row| row.get::<_, String>(0))?;
    let mut times = Vec::new();
    for raw in rows {
        let raw = raw?;
        let label = TimeLabel::parse(&raw).ok_or_else(|| StoreError::Corrupt(raw.clone()))?;
        times.push(label);
    }
    Ok(times)
}

fn find_by_occupant(conn: &Connection, identity: &str) -> Result<Option<Slot>, StoreError> {
    let mut stmt = conn
        .prepare_cached("SELECT date, time FROM appointments WHERE phone = ?1 LIMIT 2")?;
    let rows = stmt.query_map([identity], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut found: Option<Slot> = None;
    for row in rows {
        let (raw_date, raw_time) = row?;
        if found.is_some() {
            return Err(StoreError::DuplicateOccupant(identity.to_string()));
        }
        let date = parse_date(&raw_date).ok_or_else(|| StoreError::Corrupt(raw_date.clone()))?;
        let time = TimeLabel::parse(&raw_time).ok_or_else(|| StoreError::Corrupt(raw_time.clone()))?;
        found = Some(Slot {
            date,
            time,
            occupant: Some(identity.to_string()),
        });
    }
    Ok(found)
}

fn claim_if_free(
    conn: &Connection,
    date: Date,
    time: TimeLabel,
    identity: &str,
) -> Result<ClaimOutcome, StoreError> {
    let date = format_date(date);
    let time = time.to_string();
    let changed = conn
        .prepare_cached(
            "UPDATE appointments SET phone = ?1 WHERE date = ?2 AND time = ?3 AND phone IS NULL",
        )?
        .execute((identity, &date, &time))?;
    if changed == 1 {
        return Ok(ClaimOutcome::Claimed);
    }
    // The check-and-set claimed nothing: tell an occupied slot apart from a
    // never-seeded one. Still inside the owner task, so nothing raced us.
    let exists: bool = conn
        .prepare_cached("SELECT EXISTS(SELECT 1 FROM appointments WHERE date = ?1 AND time = ?2)")?
        .query_row((&date, &time), |row| row.get(0))?;
    if exists {
        Ok(ClaimOutcome::Occupied)
    } else {
        Ok(ClaimOutcome::Unknown)
    }
}

fn release_by_occupant(conn: &Connection, identity: &str) -> Result<usize, StoreError> {
    let changed = conn
        .prepare_cached("UPDATE appointments SET phone = NULL WHERE phone = ?1")?
        .execute([identity])?;
    Ok(changed)
}

/// Cloneable handle to the store owner task.
#[derive(Clone)]
pub struct SlotStore {
    tx: mpsc::Sender<StoreCommand>,
}

impl SlotStore {
    /// Open (or create) the database at `path` and spawn the owner task.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::with_connection(Connection::open(path)?)
    }

    /// Private database for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        init_schema(&conn)?;
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        tokio::spawn(store_loop(conn, rx));
        Ok(Self { tx })
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T, StoreError>>) -> StoreCommand,
    ) -> Result<T, StoreError> {
        let (tx, rx) = oneshot::channel();
        self.tx.send(make(tx)).await.map_err(|_| StoreError::Closed)?;
        rx.await.map_err(|_| StoreError::Closed)?
    }

    /// Insert one free slot per label for `date`; labels already present are
    /// left untouched (claimed or not). Returns how many rows were inserted.
    /// Safe to call repeatedly and concurrently with claims on the same date.
    pub async fn ensure_day_seeded(
        &self,
        date: Date,
        times: &[TimeLabel],
    ) -> Result<usize, StoreError> {
        let times = times.to_vec();
        self.request(|response| StoreCommand::EnsureDaySeeded { date, times, response })
            .await
    }

    /// All free labels for `date`, ascending. Empty when nothing is free.
    pub async fn list_free(&self, date: Date) -> Result<Vec<TimeLabel>, StoreError> {
        self.request(|response| StoreCommand::ListFree { date, response })
            .await
    }

    /// The slot currently held by `identity`, if any.
    pub async fn find_by_occupant(&self, identity: &str) -> Result<Option<Slot>, StoreError> {
        let identity = identity.to_string();
        self.request(|response| StoreCommand::FindByOccupant { identity, response })
            .await
    }

    /// Atomic check-and-set: set the occupant only if the slot exists and is
    /// free. A single conditional UPDATE — there is no lost-update window.
    pub async fn claim_if_free(
        &self,
        date: Date,
        time: TimeLabel,
        identity: &str,
    ) -> Result<ClaimOutcome, StoreError> {
        let identity = identity.to_string();
        self.request(|response| StoreCommand::ClaimIfFree { date, time, identity, response })
            .await
    }

    /// Clear the occupant on any slot held by `identity`; returns the number
    /// of rows released (0 or 1 under invariant I2).
    pub async fn release_by_occupant(&self, identity: &str) -> Result<usize, StoreError> {
        let identity = identity.to_string();
        self.request(|response| StoreCommand::ReleaseByOccupant { identity, response })
            .await
    }
}
