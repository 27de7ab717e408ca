//! `reconcile` command — cross-reference on-chain DEXB `transfer` events
//! with the local SQLite allocation plan.
//!
//! For every planned holder the command:
//! 1. Sums every on-chain transfer received by that address.
//! 2. Compares the total against the planned pre-launch allocation.
//! 3. Renders everything as a table to stdout.
//!
//! Recipients that appear on-chain without a planned allocation are listed
//! too, with a warning — during the pre-launch phase every distribution is
//! supposed to be in the plan.
//!
//! # Example output
//!
//! ```text
//! Distribution reconciliation
//! Soroban RPC  : https://soroban-testnet.stellar.org
//! Contract     : CXXX...
//! Start ledger : 1000000
//!
//! ┌──────────────────────┬────────────────┬────────────────┬────────┐
//! │ Holder               │ Planned (DEXB) │ Received (DEXB)│ Status │
//! ├──────────────────────┼────────────────┼────────────────┼────────┤
//! │ GAAZI4TCR3TY5OJHCTJ… │      1000.000  │      1000.000  │ ✓      │
//! └──────────────────────┴────────────────┴────────────────┴────────┘
//! ```

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Table};

use crate::{db, rpc};

// ── Constants ─────────────────────────────────────────────────────────────────

/// Default Soroban RPC endpoint (Stellar testnet).
pub const DEFAULT_RPC_URL: &str = "https://soroban-testnet.stellar.org";

/// 1 DEXB = 10^18 base units.
const UNITS_PER_DEXB: i128 = 1_000_000_000_000_000_000;

// ── Public entry point ────────────────────────────────────────────────────────

/// Arguments for the `reconcile` command.
pub struct ReconcileArgs<'a> {
    pub rpc_url: &'a str,
    pub contract_id: &'a str,
    pub start_ledger: u32,
}

/// Run the reconcile command: fetch events, aggregate receipts, compare
/// against the plan, print table.
pub fn run(args: ReconcileArgs<'_>) -> Result<()> {
    // ── Print header ──────────────────────────────────────────────────────────
    println!("Distribution reconciliation");
    println!("Soroban RPC  : {}", args.rpc_url);
    println!("Contract     : {}", args.contract_id);
    println!("Start ledger : {}", args.start_ledger);
    println!();

    // ── Fetch on-chain events ─────────────────────────────────────────────────
    let events = rpc::fetch_transfer_events(args.rpc_url, args.contract_id, args.start_ledger)
        .context("Failed to fetch transfer events from Soroban RPC")?;

    if events.is_empty() {
        println!(
            "No transfer events found for contract '{}' from ledger {}.",
            args.contract_id, args.start_ledger
        );
        return Ok(());
    }

    let received = aggregate_receipts(&events);

    // ── Open local database ───────────────────────────────────────────────────
    let db_path = db::db_path()?;
    let planned: BTreeMap<String, i128> = if db_path.exists() {
        let conn = db::open(&db_path).context("Failed to open local database")?;
        db::all_allocations(&conn)?.into_iter().collect()
    } else {
        eprintln!(
            "WARN: No local allocation database at '{}'; run `dexb-ops init` first.",
            db_path.display()
        );
        BTreeMap::new()
    };

    // ── Build table ───────────────────────────────────────────────────────────
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            "Holder",
            "Planned (DEXB)",
            "Received (DEXB)",
            "Status",
        ]);

    let mut mismatches = 0usize;
    let mut unplanned = 0usize;

    // Planned holders first, in plan order; then any unplanned recipients.
    for (holder, planned_amount) in &planned {
        let got = received.get(holder).copied().unwrap_or(0);
        let status = if got == *planned_amount { "✓" } else { "✗" };
        if got != *planned_amount {
            mismatches += 1;
        }
        table.add_row(vec![
            Cell::new(truncate(holder, 20)),
            Cell::new(units_to_dexb_display(*planned_amount)),
            Cell::new(units_to_dexb_display(got)),
            Cell::new(status),
        ]);
    }

    for (holder, got) in &received {
        if planned.contains_key(holder) {
            continue;
        }
        unplanned += 1;
        table.add_row(vec![
            Cell::new(truncate(holder, 20)),
            Cell::new("—"),
            Cell::new(units_to_dexb_display(*got)),
            Cell::new("not in plan"),
        ]);
        eprintln!(
            "WARN: {} received tokens on-chain but has no planned allocation.",
            holder
        );
    }

    println!("{table}");
    println!(
        "{} transfer(s), {} planned holder(s), {} mismatch(es), {} unplanned recipient(s).",
        events.len(),
        planned.len(),
        mismatches,
        unplanned
    );

    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Sum the amount each address received across all transfer events.
fn aggregate_receipts(events: &[rpc::TransferEvent]) -> BTreeMap<String, i128> {
    let mut totals: BTreeMap<String, i128> = BTreeMap::new();
    for ev in events {
        *totals.entry(ev.to.clone()).or_insert(0) += ev.amount;
    }
    totals
}

/// Format a base-unit amount as "123.456 DEXB" (three decimal places,
/// truncated). Integer arithmetic throughout: 18-decimal base units do not
/// survive an f64 round-trip.
fn units_to_dexb_display(units: i128) -> String {
    let whole = units / UNITS_PER_DEXB;
    let millis = (units % UNITS_PER_DEXB) / (UNITS_PER_DEXB / 1_000);
    format!("{whole}.{millis:03} DEXB")
}

/// Truncate a string and append "…" if longer than `max` characters.
fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_owned()
    } else {
        format!("{}…", &s[..max])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(to: &str, amount: i128) -> rpc::TransferEvent {
        rpc::TransferEvent {
            from: "GSENDER".to_owned(),
            to: to.to_owned(),
            amount,
            ledger_closed_at: "2025-01-01T00:00:00Z".to_owned(),
        }
    }

    #[test]
    fn aggregate_sums_per_recipient() {
        let events = vec![
            ev("GAAA", UNITS_PER_DEXB),
            ev("GBBB", 2 * UNITS_PER_DEXB),
            ev("GAAA", UNITS_PER_DEXB),
        ];
        let totals = aggregate_receipts(&events);
        assert_eq!(totals["GAAA"], 2 * UNITS_PER_DEXB);
        assert_eq!(totals["GBBB"], 2 * UNITS_PER_DEXB);
    }

    #[test]
    fn truncate_short_string_unchanged() {
        assert_eq!(truncate("GABC", 20), "GABC");
    }

    #[test]
    fn truncate_long_string_appends_ellipsis() {
        let s = "G".repeat(30);
        let result = truncate(&s, 20);
        assert!(result.ends_with('…'));
        // '…' is 1 Unicode scalar + 20 ASCII chars = 21 characters total.
        assert!(result.chars().count() <= 21);
    }

    #[test]
    fn units_display_formats_correctly() {
        assert_eq!(units_to_dexb_display(UNITS_PER_DEXB), "1.000 DEXB");
        assert_eq!(units_to_dexb_display(5 * UNITS_PER_DEXB), "5.000 DEXB");
        assert_eq!(
            units_to_dexb_display(UNITS_PER_DEXB + UNITS_PER_DEXB / 2),
            "1.500 DEXB"
        );
        // Full supply stays exact — no float involved.
        assert_eq!(
            units_to_dexb_display(200_000_000 * UNITS_PER_DEXB),
            "200000000.000 DEXB"
        );
    }
}
