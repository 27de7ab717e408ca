//! Soroban JSON-RPC client for querying DEXB `transfer` contract events.
//!
//! Calls the `getEvents` RPC method and returns strongly-typed
//! [`TransferEvent`] values for every confirmed transfer emitted by the
//! token contract.
//!
//! # XDR layout produced by `dexb_token`
//!
//! ```text
//! topics[0]  ScVal::Symbol("transfer")
//! topics[1]  ScVal::Address(<from>)
//! topics[2]  ScVal::Address(<to>)
//! data       ScVal::I128(Int128Parts)   // amount in base units
//! ```

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD as B64, Engine};
use serde::Deserialize;
use stellar_xdr::curr::{AccountId, Int128Parts, Limits, PublicKey, ReadXdr, ScAddress, ScVal};

// ── Public types ──────────────────────────────────────────────────────────────

/// A decoded `transfer` event emitted by the DEXB token contract.
#[derive(Debug, Clone)]
pub struct TransferEvent {
    /// Stellar address the tokens left.
    pub from: String,
    /// Stellar address the tokens arrived at.
    pub to: String,
    /// Amount in 18-decimal base units.
    pub amount: i128,
    /// ISO-8601 timestamp from the ledger that closed the event.
    pub ledger_closed_at: String,
}

// ── JSON-RPC response types ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<GetEventsResult>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct GetEventsResult {
    events: Vec<RawEvent>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "ledgerClosedAt")]
    ledger_closed_at: String,
    topic: Vec<String>,
    value: String,
    #[serde(rename = "inSuccessfulContractCall")]
    in_successful_contract_call: bool,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Fetch all `transfer` events emitted by `contract_id`.
///
/// # Arguments
/// * `rpc_url`      — Soroban RPC endpoint (e.g. `https://soroban-testnet.stellar.org`).
/// * `contract_id`  — Strkey contract address (C… address).
/// * `start_ledger` — First ledger sequence to include in the scan.
pub fn fetch_transfer_events(
    rpc_url: &str,
    contract_id: &str,
    start_ledger: u32,
) -> Result<Vec<TransferEvent>> {
    let body = serde_json::json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "getEvents",
        "params": {
            "startLedger": start_ledger,
            "filters": [{
                "type": "contract",
                "contractIds": [contract_id]
            }],
            "pagination": { "limit": 200 }
        }
    });

    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .context("Failed to build HTTP client")?;

    let resp: RpcResponse = client
        .post(rpc_url)
        .json(&body)
        .send()
        .context("Failed to reach Soroban RPC — check your --rpc-url")?
        .json()
        .context("Failed to parse Soroban RPC response")?;

    if let Some(err) = resp.error {
        bail!("Soroban RPC error: {}", err);
    }

    let raw_events = resp.result.map(|r| r.events).unwrap_or_default();

    let mut out = Vec::new();
    for ev in raw_events {
        if !ev.in_successful_contract_call {
            continue;
        }
        // Skip approve/grant/burn and other event types.
        if let Some(event) = try_decode_transfer_event(&ev)? {
            out.push(event);
        }
    }
    Ok(out)
}

// ── XDR decoding helpers ──────────────────────────────────────────────────────

/// Try to decode a raw RPC event as a DEXB `transfer` event.
///
/// Returns `Ok(None)` when the event is a different type.
fn try_decode_transfer_event(ev: &RawEvent) -> Result<Option<TransferEvent>> {
    if ev.topic.len() < 3 {
        return Ok(None);
    }

    // Topic 0 must be Symbol("transfer").
    let topic0 = decode_scval(&ev.topic[0]).context("Failed to decode event topic[0]")?;
    let event_name = match &topic0 {
        ScVal::Symbol(s) => std::str::from_utf8(s.as_slice())
            .context("Event name is not valid UTF-8")?
            .to_owned(),
        _ => return Ok(None),
    };
    if event_name != "transfer" {
        return Ok(None);
    }

    // Topics 1 and 2 are the sender and the recipient.
    let from = match decode_scval(&ev.topic[1]).context("Failed to decode event topic[1]")? {
        ScVal::Address(addr) => scaddress_to_strkey(&addr)?,
        _ => return Ok(None),
    };
    let to = match decode_scval(&ev.topic[2]).context("Failed to decode event topic[2]")? {
        ScVal::Address(addr) => scaddress_to_strkey(&addr)?,
        _ => return Ok(None),
    };

    // Data is I128(amount).
    let amount = match decode_scval(&ev.value).context("Failed to decode event data")? {
        ScVal::I128(Int128Parts { hi, lo }) => ((hi as i128) << 64) | (lo as i128),
        other => bail!("Expected ScVal::I128 for transfer data, got {:?}", other),
    };

    Ok(Some(TransferEvent {
        from,
        to,
        amount,
        ledger_closed_at: ev.ledger_closed_at.clone(),
    }))
}

fn decode_scval(b64: &str) -> Result<ScVal> {
    let bytes = B64
        .decode(b64)
        .context("Failed to base64-decode XDR ScVal")?;
    ScVal::from_xdr(&bytes, Limits::none()).context("Failed to XDR-decode ScVal")
}

/// Convert a Soroban `ScAddress` to a Stellar G-address StrKey string.
fn scaddress_to_strkey(addr: &ScAddress) -> Result<String> {
    match addr {
        ScAddress::Account(AccountId(PublicKey::PublicKeyTypeEd25519(bytes))) => {
            let pk = stellar_strkey::ed25519::PublicKey(bytes.0);
            Ok(stellar_strkey::Strkey::PublicKeyEd25519(pk).to_string())
        }
        ScAddress::Contract(hash) => {
            // Contract addresses can legitimately receive tokens (e.g. the
            // token contract itself during a mistaken send); render as hex.
            Ok(format!("C:{}", hex::encode(hash.0)))
        }
    }
}
