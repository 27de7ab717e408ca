#![no_std]

use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, symbol_short, token, vec, Address, Bytes,
    Env, IntoVal, String, Symbol, Val, Vec,
};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Typed errors returned by the DEXB token.
///
/// Using `contracterror` means callers get a typed `Error` variant instead
/// of an opaque host-level panic, enabling `try_*` assertions in tests.
/// Any entry point returning one of these rolls back every storage write
/// made earlier in the same invocation.
#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
#[repr(u32)]
pub enum TokenError {
    /// The caller is not the current owner.
    NotOwner = 1,
    /// `enable_transfers` was called after the one-way switch already flipped.
    AlreadyEnabled = 2,
    /// Grant mutation attempted after transfers were enabled.
    TransfersAlreadyEnabled = 3,
    /// Transfer-class operation attempted before transfers were enabled,
    /// by an initiator without a pre-launch grant.
    TransfersNotEnabled = 4,
    /// The zero account can never hold a transfer grant.
    NullAccountNotGrantable = 5,
    /// The account already holds a transfer grant.
    AlreadyGranted = 6,
    /// The account holds no transfer grant to cancel.
    NotGranted = 7,
    /// Transfers to the zero account are rejected.
    InvalidRecipient = 8,
    /// The sender's balance does not cover the amount.
    InsufficientBalance = 9,
    /// The spender's remaining allowance does not cover the amount.
    InsufficientAllowance = 10,
    /// Ownership cannot be handed to the zero account.
    NullOwnerNotAllowed = 11,
    /// Nothing to withdraw.
    ZeroBalance = 12,
    /// The approve-and-call spender does not implement `on_approval`.
    CallbackNotSupported = 13,
    /// The token never accepts direct native-currency deposits.
    DirectDepositRejected = 14,
    /// `initialize` may only run once.
    AlreadyInitialized = 15,
    /// Amounts are non-negative by definition.
    NegativeAmount = 16,
    /// Checked arithmetic overflowed i128.
    Overflow = 17,
}

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// One whole DEXB in base units (18 implied decimal places).
pub const TOKEN_SCALE: i128 = 1_000_000_000_000_000_000;

/// Fixed supply minted at initialization: 200,000,000 DEXB.
pub const INITIAL_SUPPLY: i128 = 200_000_000 * TOKEN_SCALE;

const DECIMALS: u32 = 18;

/// Soroban has no `address(0)`; the all-zero ed25519 account plays that
/// role. It can never authorize anything (no key ever hashes to zero), so
/// excluding it from grants, ownership, and receipt mirrors the zero-account
/// exclusions of the abstract ledger.
const ZERO_ACCOUNT: &str = "GAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAWHF";

// ── Event topics ────────────────────────────────────────────
const EVENT_INIT: Symbol = symbol_short!("init");
const EVENT_TRANSFER: Symbol = symbol_short!("transfer");
const EVENT_APPROVE: Symbol = symbol_short!("approve");
const EVENT_BURN: Symbol = symbol_short!("burn");
const EVENT_GRANT: Symbol = symbol_short!("grant");
const EVENT_UNGRANT: Symbol = symbol_short!("ungrant");
const EVENT_ENABLED: Symbol = symbol_short!("enabled");
const EVENT_SET_OWNER: Symbol = symbol_short!("set_owner");
const EVENT_WD_TOKEN: Symbol = symbol_short!("wd_token");
const EVENT_WD_NATIVE: Symbol = symbol_short!("wd_native");

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Storage key space.
///
/// Singletons (`Owner`, `NativeToken`, `Transferable`, `TotalSupply`) live in
/// instance storage; per-account entries in persistent storage.
#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    Owner,
    NativeToken,
    Transferable,
    TotalSupply,
    Balance(Address),
    Allowance(Address, Address),
    Grant(Address),
}

fn read_owner(e: &Env) -> Address {
    e.storage()
        .instance()
        .get(&DataKey::Owner)
        .expect("not initialized")
}

fn read_native_token(e: &Env) -> Address {
    e.storage()
        .instance()
        .get(&DataKey::NativeToken)
        .expect("not initialized")
}

fn read_transferable(e: &Env) -> bool {
    e.storage()
        .instance()
        .get(&DataKey::Transferable)
        .unwrap_or(false)
}

fn read_total_supply(e: &Env) -> i128 {
    e.storage().instance().get(&DataKey::TotalSupply).unwrap_or(0)
}

fn read_balance(e: &Env, id: &Address) -> i128 {
    e.storage()
        .persistent()
        .get(&DataKey::Balance(id.clone()))
        .unwrap_or(0)
}

fn write_balance(e: &Env, id: &Address, amount: i128) {
    e.storage()
        .persistent()
        .set(&DataKey::Balance(id.clone()), &amount);
}

fn read_allowance(e: &Env, owner: &Address, spender: &Address) -> i128 {
    e.storage()
        .persistent()
        .get(&DataKey::Allowance(owner.clone(), spender.clone()))
        .unwrap_or(0)
}

fn write_allowance(e: &Env, owner: &Address, spender: &Address, amount: i128) {
    e.storage()
        .persistent()
        .set(&DataKey::Allowance(owner.clone(), spender.clone()), &amount);
}

fn read_grant(e: &Env, id: &Address) -> bool {
    e.storage()
        .persistent()
        .get(&DataKey::Grant(id.clone()))
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Internal checks
// ---------------------------------------------------------------------------

fn zero_account(e: &Env) -> Address {
    Address::from_string(&String::from_str(e, ZERO_ACCOUNT))
}

fn check_owner(e: &Env, caller: &Address) -> Result<(), TokenError> {
    caller.require_auth();
    if *caller != read_owner(e) {
        return Err(TokenError::NotOwner);
    }
    Ok(())
}

fn check_nonnegative(amount: i128) -> Result<(), TokenError> {
    if amount < 0 {
        return Err(TokenError::NegativeAmount);
    }
    Ok(())
}

/// `initiator` may move funds once transfers are globally enabled, or while
/// still locked if it holds a pre-launch grant.
fn check_transfer_authority(e: &Env, initiator: &Address) -> Result<(), TokenError> {
    if !read_transferable(e) && !read_grant(e, initiator) {
        return Err(TokenError::TransfersNotEnabled);
    }
    Ok(())
}

/// Allowance-class operations have no per-account escape hatch: they are
/// usable only once transfers are globally enabled.
fn check_transfers_enabled(e: &Env) -> Result<(), TokenError> {
    if !read_transferable(e) {
        return Err(TokenError::TransfersNotEnabled);
    }
    Ok(())
}

/// Debit `from`, credit `to`. Pure bookkeeping; callers do authorization.
fn spend_and_credit(e: &Env, from: &Address, to: &Address, amount: i128) -> Result<(), TokenError> {
    if *to == zero_account(e) {
        return Err(TokenError::InvalidRecipient);
    }
    let from_balance = read_balance(e, from);
    if amount > from_balance {
        return Err(TokenError::InsufficientBalance);
    }
    write_balance(e, from, from_balance - amount);
    let to_balance = read_balance(e, to)
        .checked_add(amount)
        .ok_or(TokenError::Overflow)?;
    write_balance(e, to, to_balance);
    Ok(())
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

#[contract]
pub struct DexbToken;

#[contractimpl]
impl DexbToken {
    /// One-shot constructor replacement.
    ///
    /// Credits the full fixed supply to `owner`, hands `owner` the first
    /// pre-launch transfer grant, and records the native-asset contract used
    /// by [`withdraw_native`]. Transfers start disabled.
    pub fn initialize(e: Env, owner: Address, native_token: Address) -> Result<(), TokenError> {
        if e.storage().instance().has(&DataKey::Owner) {
            return Err(TokenError::AlreadyInitialized);
        }
        if owner == zero_account(&e) {
            return Err(TokenError::NullOwnerNotAllowed);
        }

        e.storage().instance().set(&DataKey::Owner, &owner);
        e.storage()
            .instance()
            .set(&DataKey::NativeToken, &native_token);
        e.storage().instance().set(&DataKey::Transferable, &false);
        e.storage()
            .instance()
            .set(&DataKey::TotalSupply, &INITIAL_SUPPLY);
        write_balance(&e, &owner, INITIAL_SUPPLY);
        e.storage()
            .persistent()
            .set(&DataKey::Grant(owner.clone()), &true);

        e.events().publish((EVENT_INIT, owner), INITIAL_SUPPLY);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Metadata & reads
    // -----------------------------------------------------------------------

    pub fn name(e: Env) -> String {
        String::from_str(&e, "Dex Brokerage Token")
    }

    pub fn symbol(e: Env) -> String {
        String::from_str(&e, "DEXB")
    }

    pub fn decimals(_e: Env) -> u32 {
        DECIMALS
    }

    pub fn total_supply(e: Env) -> i128 {
        read_total_supply(&e)
    }

    pub fn balance(e: Env, id: Address) -> i128 {
        read_balance(&e, &id)
    }

    pub fn allowance(e: Env, owner: Address, spender: Address) -> i128 {
        read_allowance(&e, &owner, &spender)
    }

    /// True while `account` holds a pre-launch transfer grant. Reading the
    /// zero account is a defined false, never an error.
    pub fn transfer_grants(e: Env, account: Address) -> bool {
        read_grant(&e, &account)
    }

    pub fn transferable(e: Env) -> bool {
        read_transferable(&e)
    }

    pub fn owner(e: Env) -> Address {
        read_owner(&e)
    }

    // -----------------------------------------------------------------------
    // Transfer authority — one-way state machine
    // -----------------------------------------------------------------------

    /// Flip the one-way switch from the pre-launch phase to open trading.
    /// Once flipped it can never be reversed, and the grant list freezes.
    pub fn enable_transfers(e: Env, caller: Address) -> Result<(), TokenError> {
        check_owner(&e, &caller)?;
        if read_transferable(&e) {
            return Err(TokenError::AlreadyEnabled);
        }
        e.storage().instance().set(&DataKey::Transferable, &true);
        e.events().publish((EVENT_ENABLED,), ());
        Ok(())
    }

    /// Whitelist `account` to initiate transfers during the pre-launch phase.
    pub fn grant_transfer_right(e: Env, caller: Address, account: Address) -> Result<(), TokenError> {
        check_owner(&e, &caller)?;
        if read_transferable(&e) {
            return Err(TokenError::TransfersAlreadyEnabled);
        }
        if account == zero_account(&e) {
            return Err(TokenError::NullAccountNotGrantable);
        }
        if read_grant(&e, &account) {
            return Err(TokenError::AlreadyGranted);
        }
        e.storage()
            .persistent()
            .set(&DataKey::Grant(account.clone()), &true);
        e.events().publish((EVENT_GRANT, account), ());
        Ok(())
    }

    /// Revoke a pre-launch transfer grant.
    pub fn cancel_transfer_right(
        e: Env,
        caller: Address,
        account: Address,
    ) -> Result<(), TokenError> {
        check_owner(&e, &caller)?;
        if read_transferable(&e) {
            return Err(TokenError::TransfersAlreadyEnabled);
        }
        if !read_grant(&e, &account) {
            return Err(TokenError::NotGranted);
        }
        e.storage()
            .persistent()
            .remove(&DataKey::Grant(account.clone()));
        e.events().publish((EVENT_UNGRANT, account), ());
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Ledger operations
    // -----------------------------------------------------------------------

    pub fn transfer(e: Env, from: Address, to: Address, amount: i128) -> Result<(), TokenError> {
        from.require_auth();
        check_nonnegative(amount)?;
        check_transfer_authority(&e, &from)?;
        spend_and_credit(&e, &from, &to, amount)?;
        e.events().publish((EVENT_TRANSFER, from, to), amount);
        Ok(())
    }

    /// Delegated transfer. The allowance *owner* (`from`) is the initiating
    /// account for the pre-launch authority check, matching the direct
    /// transfer rule.
    pub fn transfer_from(
        e: Env,
        spender: Address,
        from: Address,
        to: Address,
        amount: i128,
    ) -> Result<(), TokenError> {
        spender.require_auth();
        check_nonnegative(amount)?;
        check_transfer_authority(&e, &from)?;

        let allowance = read_allowance(&e, &from, &spender);
        if amount > allowance {
            return Err(TokenError::InsufficientAllowance);
        }
        write_allowance(&e, &from, &spender, allowance - amount);

        spend_and_credit(&e, &from, &to, amount)?;
        e.events().publish((EVENT_TRANSFER, from, to), amount);
        Ok(())
    }

    /// Destroy `amount` of the caller's tokens, shrinking total supply by the
    /// same amount. Supply contraction is permanent.
    pub fn burn(e: Env, from: Address, amount: i128) -> Result<(), TokenError> {
        from.require_auth();
        check_nonnegative(amount)?;
        check_transfers_enabled(&e)?;

        let balance = read_balance(&e, &from);
        if amount > balance {
            return Err(TokenError::InsufficientBalance);
        }
        write_balance(&e, &from, balance - amount);
        e.storage()
            .instance()
            .set(&DataKey::TotalSupply, &(read_total_supply(&e) - amount));

        e.events().publish((EVENT_BURN, from), amount);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Allowances
    // -----------------------------------------------------------------------

    /// Absolute set: overwrites any previous allowance.
    pub fn approve(
        e: Env,
        from: Address,
        spender: Address,
        amount: i128,
    ) -> Result<(), TokenError> {
        from.require_auth();
        check_nonnegative(amount)?;
        check_transfers_enabled(&e)?;
        write_allowance(&e, &from, &spender, amount);
        e.events().publish((EVENT_APPROVE, from, spender), amount);
        Ok(())
    }

    pub fn increase_approval(
        e: Env,
        from: Address,
        spender: Address,
        delta: i128,
    ) -> Result<(), TokenError> {
        from.require_auth();
        check_nonnegative(delta)?;
        check_transfers_enabled(&e)?;
        let raised = read_allowance(&e, &from, &spender)
            .checked_add(delta)
            .ok_or(TokenError::Overflow)?;
        write_allowance(&e, &from, &spender, raised);
        e.events().publish((EVENT_APPROVE, from, spender), raised);
        Ok(())
    }

    /// Relative decrease, clamped at zero: a delta larger than the current
    /// allowance leaves zero rather than failing.
    pub fn decrease_approval(
        e: Env,
        from: Address,
        spender: Address,
        delta: i128,
    ) -> Result<(), TokenError> {
        from.require_auth();
        check_nonnegative(delta)?;
        check_transfers_enabled(&e)?;
        let current = read_allowance(&e, &from, &spender);
        let lowered = if delta > current { 0 } else { current - delta };
        write_allowance(&e, &from, &spender, lowered);
        e.events().publish((EVENT_APPROVE, from, spender), lowered);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Notify-on-approve
    // -----------------------------------------------------------------------

    /// Set the allowance, then synchronously notify `spender` by invoking
    /// `on_approval(from, amount, token, payload)` on it.
    ///
    /// Checks-Effects-Interactions: the allowance is written and the approval
    /// event emitted BEFORE the external call, so any nested invocation the
    /// callback triggers observes the new allowance. A spender that does not
    /// implement the callback fails the whole invocation — the host then
    /// rolls the allowance back along with everything else.
    pub fn approve_and_call(
        e: Env,
        from: Address,
        spender: Address,
        amount: i128,
        payload: Bytes,
    ) -> Result<(), TokenError> {
        from.require_auth();
        check_nonnegative(amount)?;
        check_transfers_enabled(&e)?;

        write_allowance(&e, &from, &spender, amount);
        e.events()
            .publish((EVENT_APPROVE, from.clone(), spender.clone()), amount);

        let cb_args: Vec<Val> = vec![
            &e,
            from.into_val(&e),
            amount.into_val(&e),
            e.current_contract_address().into_val(&e),
            payload.into_val(&e),
        ];
        let outcome = e.try_invoke_contract::<Val, soroban_sdk::Error>(
            &spender,
            &Symbol::new(&e, "on_approval"),
            cb_args,
        );
        if outcome.is_err() {
            return Err(TokenError::CallbackNotSupported);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Recovery bridge
    // -----------------------------------------------------------------------

    /// Reclaim the full balance this contract holds in an arbitrary SEP-41
    /// token, pushing it to the current owner. Mutates no local state; a
    /// failing foreign transfer fails the whole invocation.
    pub fn withdraw_foreign_token(
        e: Env,
        caller: Address,
        foreign: Address,
    ) -> Result<(), TokenError> {
        check_owner(&e, &caller)?;

        let client = token::Client::new(&e, &foreign);
        let held = client.balance(&e.current_contract_address());
        if held == 0 {
            return Err(TokenError::ZeroBalance);
        }
        client.transfer(&e.current_contract_address(), &caller, &held);

        e.events().publish((EVENT_WD_TOKEN, foreign), held);
        Ok(())
    }

    /// Reclaim native currency pushed to the contract address through paths
    /// the contract cannot intercept (classic-Stellar sends to a contract
    /// address). Recovery, not a deposit feature: [`deposit`] always rejects.
    pub fn withdraw_native(e: Env, caller: Address) -> Result<(), TokenError> {
        check_owner(&e, &caller)?;

        let client = token::Client::new(&e, &read_native_token(&e));
        let held = client.balance(&e.current_contract_address());
        if held == 0 {
            return Err(TokenError::ZeroBalance);
        }
        client.transfer(&e.current_contract_address(), &caller, &held);

        e.events().publish((EVENT_WD_NATIVE,), held);
        Ok(())
    }

    /// The generic payment path. The token never accepts direct
    /// native-currency deposits.
    pub fn deposit(_e: Env, _from: Address, _amount: i128) -> Result<(), TokenError> {
        Err(TokenError::DirectDepositRejected)
    }

    // -----------------------------------------------------------------------
    // Ownership
    // -----------------------------------------------------------------------

    /// Replace the owner. Every owner-gated check reads the stored owner at
    /// call time, so the previous owner's admin capability ends here.
    pub fn transfer_ownership(
        e: Env,
        caller: Address,
        new_owner: Address,
    ) -> Result<(), TokenError> {
        check_owner(&e, &caller)?;
        if new_owner == zero_account(&e) {
            return Err(TokenError::NullOwnerNotAllowed);
        }
        e.storage().instance().set(&DataKey::Owner, &new_owner);
        e.events().publish((EVENT_SET_OWNER, caller, new_owner), ());
        Ok(())
    }
}
