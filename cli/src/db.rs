//! SQLite persistence layer for the DEXB operations CLI.
//!
//! The pre-launch distribution plan lives locally at
//! `~/.dexb-ops/allocations.sqlite`: one row per vetted counterparty with the
//! amount of DEXB (in base units) it is supposed to receive before transfers
//! are enabled on-chain.
//!
//! # Schema
//! ```sql
//! CREATE TABLE allocations (
//!     holder_pubkey  TEXT PRIMARY KEY,
//!     planned_amount TEXT NOT NULL
//! );
//! ```
//!
//! `planned_amount` is a decimal string of 18-decimal base units. TEXT rather
//! than INTEGER because DEXB amounts routinely exceed the `i64` range SQLite
//! integers offer (one whole token is already 10^18 base units).

use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

// ── Path resolution ───────────────────────────────────────────────────────────

/// Returns the canonical path `~/.dexb-ops/allocations.sqlite`.
///
/// # Errors
/// Returns an error when the home directory cannot be determined (e.g. on a
/// system where `$HOME` / `USERPROFILE` is unset).
pub fn db_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context(
        "Cannot determine the home directory. \
         Ensure the HOME (Unix) or USERPROFILE (Windows) environment variable is set.",
    )?;
    Ok(home.join(".dexb-ops").join("allocations.sqlite"))
}

// ── Connection management ─────────────────────────────────────────────────────

/// Open (or create) the SQLite database at `path`.
///
/// WAL mode is enabled for better concurrent-read performance and crash safety.
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Cannot open SQLite database at {}", path.display()))?;

    // Enable WAL journal mode for crash safety.
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
        .context("Failed to configure SQLite pragmas")?;

    Ok(conn)
}

// ── Schema initialisation ─────────────────────────────────────────────────────

/// Create the `allocations` table if it does not already exist.
///
/// Safe to call on an already-initialised database (idempotent via
/// `CREATE TABLE IF NOT EXISTS`).
pub fn initialise(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS allocations (
            holder_pubkey  TEXT PRIMARY KEY,
            planned_amount TEXT NOT NULL
        );",
    )
    .context("Failed to create allocations table")?;
    Ok(())
}

// ── Amount codec ──────────────────────────────────────────────────────────────

/// Parse a stored decimal string back into base units.
pub fn parse_amount(text: &str) -> Result<i128> {
    let amount: i128 = text
        .parse()
        .with_context(|| format!("Corrupt planned_amount '{}' in the database", text))?;
    if amount < 0 {
        bail!("Corrupt planned_amount '{}': amounts are non-negative", text);
    }
    Ok(amount)
}

// ── Write operations ──────────────────────────────────────────────────────────

/// Insert a new planned allocation.
///
/// # Arguments
/// * `pubkey` — Stellar public key (G... address), used as the primary key.
/// * `amount` — planned allocation in 18-decimal base units.
///
/// # Errors
/// Returns an error if a record for `pubkey` already exists.  Use
/// [`update_allocation`] to change an existing holder's allocation.
pub fn insert_holder(conn: &Connection, pubkey: &str, amount: i128) -> Result<()> {
    let rows = conn
        .execute(
            "INSERT INTO allocations (holder_pubkey, planned_amount) VALUES (?1, ?2)",
            params![pubkey, amount.to_string()],
        )
        .with_context(|| {
            format!(
                "Failed to insert holder '{}'. \
                 The public key may already exist — use set-allocation to change their amount.",
                pubkey
            )
        })?;

    debug_assert_eq!(rows, 1, "INSERT must affect exactly one row");
    Ok(())
}

/// Return the planned allocation for `pubkey`, if present.
///
/// Returns `Ok(None)` when the holder is not in the database.
pub fn get_allocation(conn: &Connection, pubkey: &str) -> Result<Option<i128>> {
    let result = conn.query_row(
        "SELECT planned_amount FROM allocations WHERE holder_pubkey = ?1",
        params![pubkey],
        |row| row.get::<_, String>(0),
    );

    match result {
        Ok(text) => Ok(Some(parse_amount(&text)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Database query failed for pubkey '{}'", pubkey)),
    }
}

/// Returns `true` if `pubkey` already has a record in the database.
pub fn holder_exists(conn: &Connection, pubkey: &str) -> Result<bool> {
    Ok(get_allocation(conn, pubkey)?.is_some())
}

/// Update the planned allocation for an existing holder.
///
/// # Errors
/// Returns an error if the holder does not exist.
pub fn update_allocation(conn: &Connection, pubkey: &str, new_amount: i128) -> Result<()> {
    if !holder_exists(conn, pubkey)? {
        bail!(
            "Holder '{}' not found in the database. \
             Run `dexb-ops add-holder` first.",
            pubkey
        );
    }

    let rows = conn
        .execute(
            "UPDATE allocations SET planned_amount = ?1 WHERE holder_pubkey = ?2",
            params![new_amount.to_string(), pubkey],
        )
        .context("Failed to update allocation")?;

    debug_assert_eq!(rows, 1, "UPDATE must affect exactly one row");
    Ok(())
}

/// Return every `(holder, planned_amount)` pair, ordered by holder.
///
/// The reconcile command uses this to flag planned holders that never
/// received anything on-chain.
pub fn all_allocations(conn: &Connection) -> Result<Vec<(String, i128)>> {
    let mut stmt = conn
        .prepare("SELECT holder_pubkey, planned_amount FROM allocations ORDER BY holder_pubkey")
        .context("Failed to prepare allocations query")?;

    let rows = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .context("Failed to query allocations")?;

    let mut out = Vec::new();
    for row in rows {
        let (pubkey, text) = row.context("Failed to read allocation row")?;
        out.push((pubkey, parse_amount(&text)?));
    }
    Ok(out)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
