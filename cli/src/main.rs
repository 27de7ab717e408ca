//! DEXB operations CLI — off-chain companion for the Dex Brokerage Token's
//! pre-launch distribution phase.
//!
//! # Commands
//!
//! | Command | Purpose |
//! |---------|---------|
//! | `init` | Create the local SQLite database at `~/.dexb-ops/allocations.sqlite` |
//! | `add-holder <pubkey> <amount>` | Record a planned pre-launch allocation (base units) |
//! | `set-allocation <pubkey> <amount>` | Change an existing holder's planned allocation |
//! | `reconcile --contract-id <C…>` | Compare on-chain `transfer` events against the plan |
//!
//! While the token is in its locked phase only granted accounts can move
//! funds, so every distribution is supposed to appear in this plan. The
//! `reconcile` command flags on-chain recipients the plan does not know and
//! planned holders whose received total differs from the plan.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

mod db;
mod reconcile;
mod rpc;

// ── CLI definition ────────────────────────────────────────────────────────────

/// DEXB operations CLI — pre-launch distribution bookkeeping for the
/// Dex Brokerage Token on Stellar/Soroban.
///
/// This tool runs entirely on your local machine; only `reconcile` talks to
/// the network, and it only reads public contract events.
#[derive(Parser)]
#[command(name = "dexb-ops")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialise the local allocation database.
    ///
    /// Creates ~/.dexb-ops/allocations.sqlite with the allocations table.
    /// Safe to run multiple times (idempotent).
    Init,

    /// Record a planned pre-launch allocation for a holder.
    AddHolder {
        /// Holder Stellar public key (56-character G... address).
        pubkey: String,

        /// Planned allocation in base units (1 DEXB = 10^18 base units).
        amount: String,
    },

    /// Change the planned allocation of an existing holder.
    SetAllocation {
        /// Holder Stellar public key (56-character G... address).
        pubkey: String,

        /// New planned allocation in base units.
        amount: String,
    },

    /// Compare on-chain transfer events against the local plan.
    Reconcile {
        /// DEXB token contract address (C... address).
        #[arg(long)]
        contract_id: String,

        /// Soroban RPC endpoint.
        #[arg(long, default_value = reconcile::DEFAULT_RPC_URL)]
        rpc_url: String,

        /// First ledger sequence to include in the event scan.
        #[arg(long, default_value_t = 0)]
        start_ledger: u32,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Init => cmd_init(),
        Commands::AddHolder { pubkey, amount } => cmd_add_holder(&pubkey, &amount),
        Commands::SetAllocation { pubkey, amount } => cmd_set_allocation(&pubkey, &amount),
        Commands::Reconcile {
            contract_id,
            rpc_url,
            start_ledger,
        } => reconcile::run(reconcile::ReconcileArgs {
            rpc_url: &rpc_url,
            contract_id: &contract_id,
            start_ledger,
        }),
    }
}

// ── Command implementations ───────────────────────────────────────────────────

/// `init` — create ~/.dexb-ops/allocations.sqlite.
fn cmd_init() -> Result<()> {
    let db_path = db::db_path()?;

    let dir = db_path
        .parent()
        .context("Cannot determine the parent directory for the database file")?;

    // Create ~/.dexb-ops/ with restrictive permissions (owner-only on Unix).
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Cannot create directory '{}'", dir.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))
            .with_context(|| format!("Cannot set permissions on '{}'", dir.display()))?;
    }

    // Open (or re-open) the database and apply the schema.
    let conn = db::open(&db_path)?;
    db::initialise(&conn)?;

    println!("DEXB allocation database initialised at: {}", db_path.display());
    Ok(())
}

/// `add-holder <pubkey> <amount>` — validate inputs and persist the plan row.
fn cmd_add_holder(pubkey: &str, amount: &str) -> Result<()> {
    validate_stellar_pubkey(pubkey)?;
    let amount = parse_base_units(amount)?;

    let db_path = db::db_path()?;
    if !db_path.exists() {
        bail!(
            "Database not found at '{}'.\n\
             Run `dexb-ops init` to create it first.",
            db_path.display()
        );
    }

    let conn = db::open(&db_path)?;

    if db::holder_exists(&conn, pubkey)? {
        bail!(
            "Holder '{}' already exists in the database.\n\
             Each holder has exactly one planned allocation.\n\
             To change it, use `dexb-ops set-allocation {} <new-amount>`.",
            pubkey,
            pubkey
        );
    }

    db::insert_holder(&conn, pubkey, amount).context("Failed to persist allocation record")?;

    println!("Recorded planned allocation:");
    println!("  Holder : {}", pubkey);
    println!("  Amount : {} base units", amount);
    Ok(())
}

/// `set-allocation <pubkey> <amount>` — update an existing plan row.
fn cmd_set_allocation(pubkey: &str, amount: &str) -> Result<()> {
    validate_stellar_pubkey(pubkey)?;
    let amount = parse_base_units(amount)?;

    let db_path = db::db_path()?;
    if !db_path.exists() {
        bail!(
            "Database not found at '{}'.\n\
             Run `dexb-ops init` to create it first.",
            db_path.display()
        );
    }

    let conn = db::open(&db_path)?;
    db::update_allocation(&conn, pubkey, amount)?;

    println!("Updated planned allocation:");
    println!("  Holder : {}", pubkey);
    println!("  Amount : {} base units", amount);
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Validate that `pubkey` looks like a Stellar public key.
///
/// Stellar public keys (G... addresses / StrKeys) are exactly 56 characters
/// long, start with 'G', and contain only uppercase alphanumeric characters
/// from the Stellar StrKey alphabet.
///
/// This is a lightweight sanity check — full StrKey checksum validation would
/// require an additional dependency.
fn validate_stellar_pubkey(pubkey: &str) -> Result<()> {
    // Stellar StrKey public keys start with 'G' and are always 56 characters.
    if pubkey.len() != 56 || !pubkey.starts_with('G') {
        bail!(
            "Invalid Stellar public key: '{}'\n\
             Expected a 56-character address starting with 'G' \
             (e.g. GAAZI4TCR3TY5OJHCTJC2A4QSY6CJWJH5IAJTGKIN2ER7LBNVKOCCWN).",
            pubkey
        );
    }

    // StrKey uses base32 alphabet: A-Z 2-7.
    let valid_chars = pubkey
        .chars()
        .all(|c| c.is_ascii_uppercase() || ('2'..='7').contains(&c));

    if !valid_chars {
        bail!(
            "Invalid Stellar public key: '{}'\n\
             StrKey addresses may only contain uppercase letters A-Z and digits 2-7.",
            pubkey
        );
    }

    Ok(())
}

/// Parse a user-supplied base-unit amount.
///
/// Plain non-negative decimal integers only; the full DEXB supply
/// (2 × 10^26 base units) needs i128.
fn parse_base_units(input: &str) -> Result<i128> {
    let amount: i128 = input.parse().with_context(|| {
        format!(
            "Invalid amount '{}': expected a plain decimal number of base units \
             (1 DEXB = 1000000000000000000).",
            input
        )
    })?;
    if amount < 0 {
        bail!("Invalid amount '{}': allocations are non-negative.", input);
    }
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Build a syntactically valid 56-char Stellar G-address for use in tests.
    // Stellar StrKey public keys: prefix 'G' + 55 chars from [A-Z2-7].
    fn valid_key() -> String {
        format!("G{}", "A".repeat(55))
    }

    #[test]
    fn valid_pubkey_passes_validation() {
        assert!(validate_stellar_pubkey(&valid_key()).is_ok());
    }

    #[test]
    fn wrong_prefix_is_rejected() {
        // Same length as a real key but starts with 'S' (Stellar secret key prefix).
        let bad = format!("S{}", "A".repeat(55));
        assert!(
            validate_stellar_pubkey(&bad).is_err(),
            "S-prefix must be rejected"
        );
    }

    #[test]
    fn wrong_length_is_rejected() {
        assert!(
            validate_stellar_pubkey("GABC").is_err(),
            "short key must be rejected"
        );
        assert!(
            validate_stellar_pubkey(&format!("G{}", "A".repeat(60))).is_err(),
            "long key (61 chars) must be rejected"
        );
    }

    #[test]
    fn invalid_chars_are_rejected() {
        // Replace a character deep in the key with '!' (not in StrKey alphabet).
        let base = valid_key();
        let mut chars: Vec<char> = base.chars().collect();
        chars[20] = '!';
        let bad_key: String = chars.into_iter().collect();
        assert!(
            validate_stellar_pubkey(&bad_key).is_err(),
            "invalid char must be rejected"
        );
    }

    #[test]
    fn base_units_parse_full_supply() {
        // 200,000,000 DEXB in base units — far past u64.
        let full = "200000000000000000000000000";
        assert_eq!(
            parse_base_units(full).unwrap(),
            200_000_000 * 1_000_000_000_000_000_000i128
        );
    }

    #[test]
    fn base_units_reject_negatives_and_garbage() {
        assert!(parse_base_units("-1").is_err());
        assert!(parse_base_units("1.5").is_err());
        assert!(parse_base_units("one").is_err());
    }
}
