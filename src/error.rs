//! Unified error types for the ledger.

use thiserror::Error;

use crate::address::Address;
use crate::market::MarketStatus;

/// Errors surfaced to the collaborator layer by ledger and oracle operations.
#[derive(Error, Debug)]
pub enum LedgerError {
    // === Validation ===
    /// Stake amount must be greater than zero.
    #[error("invalid amount: {amount} (must be greater than zero)")]
    InvalidAmount {
        /// The rejected amount.
        amount: u64,
    },

    /// End or resolution time is inconsistent.
    #[error("invalid schedule: {reason}")]
    InvalidSchedule {
        /// Why the schedule was rejected.
        reason: String,
    },

    /// Question or description violates the text limits.
    #[error("invalid {field}: {reason}")]
    InvalidText {
        /// Which text field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// Oracle outcome is not a binary value.
    #[error("oracle outcome {value} is not binary")]
    InvalidOutcome {
        /// The raw outcome value.
        value: i32,
    },

    /// No account exists at the address.
    #[error("{kind} not found at {address}")]
    NotFound {
        /// Kind of account looked up.
        kind: &'static str,
        /// Address looked up.
        address: Address,
    },

    // === State conflicts ===
    /// Market is not accepting the operation in its current state.
    #[error("market {market} is not active (status: {status})")]
    MarketNotActive {
        /// Market address.
        market: Address,
        /// Status at the time of the call.
        status: MarketStatus,
    },

    /// Market has not been resolved yet.
    #[error("market {market} has not been resolved yet")]
    MarketNotResolved {
        /// Market address.
        market: Address,
    },

    /// Market has already been resolved.
    #[error("market {market} has already been resolved")]
    MarketAlreadyResolved {
        /// Market address.
        market: Address,
    },

    /// A market with the same creator and question prefix exists.
    #[error("market already exists at {market}")]
    MarketExists {
        /// Existing market address.
        market: Address,
    },

    /// Only the market creator can resolve the market.
    #[error("{resolver} is not the creator of market {market}")]
    UnauthorizedResolver {
        /// Market address.
        market: Address,
        /// Identity that attempted the resolution.
        resolver: Address,
    },

    /// Winnings have already been claimed.
    #[error("bet {bet} has already been claimed")]
    BetAlreadyClaimed {
        /// Bet address.
        bet: Address,
    },

    /// The bet did not win.
    #[error("bet {bet} did not win")]
    LosingBet {
        /// Bet address.
        bet: Address,
    },

    /// A top-up was placed on the opposite side of an existing bet.
    #[error("bet {bet} already predicts {existing}; cannot add to the other side")]
    PredictionMismatch {
        /// Bet address.
        bet: Address,
        /// Side of the existing bet.
        existing: crate::market::Side,
    },

    /// Oracle assertion is not verified or below the confidence floor.
    #[error("oracle assertion for {event_id} is not usable: {reason}")]
    OracleUnverified {
        /// Event id.
        event_id: String,
        /// Why the assertion was rejected.
        reason: String,
    },

    /// Asserted outcome disagrees with the oracle.
    #[error("asserted outcome {asserted} disagrees with oracle outcome {oracle}")]
    OutcomeMismatch {
        /// Outcome asserted by the resolver.
        asserted: crate::market::Side,
        /// Outcome reported by the oracle.
        oracle: crate::market::Side,
    },

    /// Pool arithmetic overflowed.
    #[error("arithmetic overflow in {context}")]
    MathOverflow {
        /// Operation that overflowed.
        context: &'static str,
    },

    // === Codec ===
    /// Account bytes could not be decoded or a record could not be encoded.
    #[error("malformed account: {0}")]
    MalformedAccount(#[from] CodecError),

    /// Address derivation failed.
    #[error("address derivation failed: {0}")]
    Address(#[from] AddressError),

    // === Transient ===
    /// The ledger/RPC collaborator is unavailable or timed out.
    #[error("ledger unavailable: {reason}")]
    LedgerUnavailable {
        /// Failure reason.
        reason: String,
    },
}

/// Error taxonomy used to decide retry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorClass {
    /// Bad input, rejected before any mutation.
    Validation,
    /// Permanent conflict with the record's state.
    StateConflict,
    /// Corrupt or incompatible bytes.
    Codec,
    /// Infrastructure failure, no state was mutated.
    Transient,
}

impl LedgerError {
    /// Classify the error.
    pub fn class(&self) -> ErrorClass {
        match self {
            LedgerError::InvalidAmount { .. }
            | LedgerError::InvalidSchedule { .. }
            | LedgerError::InvalidText { .. }
            | LedgerError::InvalidOutcome { .. }
            | LedgerError::NotFound { .. } => ErrorClass::Validation,

            LedgerError::MarketNotActive { .. }
            | LedgerError::MarketNotResolved { .. }
            | LedgerError::MarketAlreadyResolved { .. }
            | LedgerError::MarketExists { .. }
            | LedgerError::UnauthorizedResolver { .. }
            | LedgerError::BetAlreadyClaimed { .. }
            | LedgerError::LosingBet { .. }
            | LedgerError::PredictionMismatch { .. }
            | LedgerError::OracleUnverified { .. }
            | LedgerError::OutcomeMismatch { .. }
            | LedgerError::MathOverflow { .. } => ErrorClass::StateConflict,

            LedgerError::MalformedAccount(_) => ErrorClass::Codec,
            LedgerError::Address(AddressError::InvalidHex(_))
            | LedgerError::Address(AddressError::InvalidLength { .. }) => ErrorClass::Validation,
            LedgerError::Address(_) => ErrorClass::Codec,

            LedgerError::LedgerUnavailable { .. } => ErrorClass::Transient,
        }
    }

    /// Whether the caller may retry (after fixing input for validation errors).
    pub fn is_retryable(&self) -> bool {
        matches!(self.class(), ErrorClass::Validation | ErrorClass::Transient)
    }

    /// Stable machine-readable name of the error.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::InvalidAmount { .. } => "InvalidAmount",
            LedgerError::InvalidSchedule { .. } => "InvalidSchedule",
            LedgerError::InvalidText { .. } => "InvalidText",
            LedgerError::InvalidOutcome { .. } => "InvalidOutcome",
            LedgerError::NotFound { .. } => "NotFound",
            LedgerError::MarketNotActive { .. } => "MarketNotActive",
            LedgerError::MarketNotResolved { .. } => "MarketNotResolved",
            LedgerError::MarketAlreadyResolved { .. } => "MarketAlreadyResolved",
            LedgerError::MarketExists { .. } => "MarketExists",
            LedgerError::UnauthorizedResolver { .. } => "UnauthorizedResolver",
            LedgerError::BetAlreadyClaimed { .. } => "BetAlreadyClaimed",
            LedgerError::LosingBet { .. } => "LosingBet",
            LedgerError::PredictionMismatch { .. } => "PredictionMismatch",
            LedgerError::OracleUnverified { .. } => "OracleUnverified",
            LedgerError::OutcomeMismatch { .. } => "OutcomeMismatch",
            LedgerError::MathOverflow { .. } => "MathOverflow",
            LedgerError::MalformedAccount(_) => "MalformedAccount",
            LedgerError::Address(AddressError::AddressSpaceExhausted { .. }) => {
                "AddressSpaceExhausted"
            }
            LedgerError::Address(_) => "InvalidAddress",
            LedgerError::LedgerUnavailable { .. } => "LedgerUnavailable",
        }
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        LedgerError::LedgerUnavailable {
            reason: err.to_string(),
        }
    }
}

/// Account encoding and decoding errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Buffer is shorter than the record's fixed fields.
    #[error("{record} needs at least {needed} bytes, got {available}")]
    BufferTooShort {
        /// Record kind.
        record: &'static str,
        /// Minimum size.
        needed: usize,
        /// Actual size.
        available: usize,
    },

    /// A field would read past the end of the buffer.
    #[error("field {field} at offset {offset} needs {len} bytes, {remaining} remaining")]
    FieldOverrun {
        /// Field name.
        field: &'static str,
        /// Offset of the field.
        offset: usize,
        /// Bytes the field needs.
        len: usize,
        /// Bytes left in the buffer.
        remaining: usize,
    },

    /// Boolean flag byte outside {0, 1}.
    #[error("flag {field} has invalid value {value}")]
    InvalidFlag {
        /// Field name.
        field: &'static str,
        /// Raw byte.
        value: u8,
    },

    /// Optional field holds neither a valid value nor the absent sentinel.
    #[error("optional field {field} has invalid value {value}")]
    InvalidOptional {
        /// Field name.
        field: &'static str,
        /// Raw value.
        value: i64,
    },

    /// Text field is not valid UTF-8.
    #[error("field {field} is not valid utf-8")]
    InvalidUtf8 {
        /// Field name.
        field: &'static str,
    },

    /// Field decoded but violates the record's invariants.
    #[error("field {field} is invalid: {reason}")]
    InvalidValue {
        /// Field name.
        field: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// Leading discriminator does not name a known account kind.
    #[error("unknown discriminator 0x{}", hex::encode(.0))]
    UnknownDiscriminator([u8; 8]),

    /// Discriminator names a different account kind than requested.
    #[error("expected {expected} account, found {found}")]
    WrongKind {
        /// Requested kind.
        expected: &'static str,
        /// Kind named by the discriminator.
        found: &'static str,
    },

    /// Bytes remain after the last field.
    #[error("{count} trailing bytes after {record}")]
    TrailingBytes {
        /// Record kind.
        record: &'static str,
        /// Number of unread bytes.
        count: usize,
    },

    /// Field is too long to encode.
    #[error("field {field} is {len} bytes, exceeds the encodable maximum")]
    FieldTooLong {
        /// Field name.
        field: &'static str,
        /// Actual length.
        len: usize,
    },
}

/// Address parsing and derivation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// Hex text could not be decoded.
    #[error("invalid hex address: {0}")]
    InvalidHex(String),

    /// Address has the wrong length.
    #[error("address must be {expected} bytes, got {got}")]
    InvalidLength {
        /// Required length.
        expected: usize,
        /// Actual length.
        got: usize,
    },

    /// A seed exceeds the maximum seed length.
    #[error("seed is {got} bytes, maximum is {max}")]
    SeedTooLong {
        /// Maximum seed length.
        max: usize,
        /// Actual seed length.
        got: usize,
    },

    /// Too many seeds were supplied.
    #[error("{got} seeds supplied, maximum is {max}")]
    TooManySeeds {
        /// Maximum seed count.
        max: usize,
        /// Actual seed count.
        got: usize,
    },

    /// The given nonce derives a reserved address.
    #[error("nonce {nonce} derives a reserved address")]
    ReservedAddress {
        /// The rejected nonce.
        nonce: u8,
    },

    /// No nonce yields a usable address.
    #[error("address space exhausted for namespace {namespace}")]
    AddressSpaceExhausted {
        /// Namespace being derived.
        namespace: String,
    },
}

/// Errors reported by the ledger/RPC collaborator.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// The collaborator could not be reached or failed the request.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The call did not complete within the caller's timeout.
    #[error("store call timed out after {timeout_ms}ms")]
    Timeout {
        /// Timeout that elapsed.
        timeout_ms: u64,
    },
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, LedgerError>;
