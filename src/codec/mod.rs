//! Binary account codec.
//!
//! Every account starts with an 8-byte discriminator naming its kind,
//! followed by fixed-offset little-endian fields. Strings are stored as a
//! `u32` length prefix plus UTF-8 bytes. Decoding is strict: short buffers,
//! overrunning prefixes, flag bytes outside {0, 1}, invalid sentinels and
//! trailing bytes are all rejected.

mod bet;
mod buffer;
mod event;
mod market;

pub use buffer::{Reader, Writer};

use crate::error::CodecError;
use crate::market::{Bet, Market};
use crate::oracle::{EventAccount, OracleAssertion};

/// Width of the leading discriminator.
pub const DISCRIMINATOR_LEN: usize = 8;

/// Account kinds known to the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum AccountKind {
    /// A prediction market.
    Market,
    /// A bettor's stake on a market.
    Bet,
    /// An oracle event.
    Event,
    /// An oracle assertion about an event.
    Oracle,
}

impl AccountKind {
    /// Leading bytes identifying the kind.
    pub const fn discriminator(self) -> [u8; DISCRIMINATOR_LEN] {
        match self {
            AccountKind::Market => *b"market\0\0",
            AccountKind::Bet => *b"bet\0\0\0\0\0",
            AccountKind::Event => *b"event\0\0\0",
            AccountKind::Oracle => *b"oracle\0\0",
        }
    }

    /// Kind named by a discriminator.
    pub fn from_discriminator(raw: [u8; DISCRIMINATOR_LEN]) -> Result<Self, CodecError> {
        use strum::IntoEnumIterator;
        AccountKind::iter()
            .find(|kind| kind.discriminator() == raw)
            .ok_or(CodecError::UnknownDiscriminator(raw))
    }

    /// Static name used in error messages.
    pub const fn name(self) -> &'static str {
        match self {
            AccountKind::Market => "market",
            AccountKind::Bet => "bet",
            AccountKind::Event => "event",
            AccountKind::Oracle => "oracle",
        }
    }
}

/// A record with a fixed binary layout.
pub trait AccountRecord: Sized {
    /// Kind written as the discriminator.
    const KIND: AccountKind;

    /// Size of the record with every variable-length field empty.
    const MIN_LEN: usize;

    /// Write every field after the discriminator.
    fn encode_body(&self, w: &mut Writer) -> Result<(), CodecError>;

    /// Read every field after the discriminator.
    fn decode_body(r: &mut Reader<'_>) -> Result<Self, CodecError>;
}

/// Encode a record with its discriminator.
pub fn encode<T: AccountRecord>(record: &T) -> Result<Vec<u8>, CodecError> {
    let mut w = Writer::with_capacity(T::MIN_LEN);
    w.bytes(&T::KIND.discriminator());
    record.encode_body(&mut w)?;
    Ok(w.into_bytes())
}

/// Decode a record, checking its length, discriminator and that every byte
/// is consumed.
pub fn decode<T: AccountRecord>(bytes: &[u8]) -> Result<T, CodecError> {
    if bytes.len() < T::MIN_LEN {
        return Err(CodecError::BufferTooShort {
            record: T::KIND.name(),
            needed: T::MIN_LEN,
            available: bytes.len(),
        });
    }

    let mut r = Reader::new(bytes);
    let found = read_kind(&mut r)?;
    if found != T::KIND {
        return Err(CodecError::WrongKind {
            expected: T::KIND.name(),
            found: found.name(),
        });
    }

    let record = T::decode_body(&mut r)?;
    if r.remaining() > 0 {
        return Err(CodecError::TrailingBytes {
            record: T::KIND.name(),
            count: r.remaining(),
        });
    }
    Ok(record)
}

/// Kind named by a buffer's discriminator, without decoding the body.
pub fn peek_kind(bytes: &[u8]) -> Result<AccountKind, CodecError> {
    read_kind(&mut Reader::new(bytes))
}

fn read_kind(r: &mut Reader<'_>) -> Result<AccountKind, CodecError> {
    let raw = r.bytes("discriminator", DISCRIMINATOR_LEN)?;
    let mut disc = [0u8; DISCRIMINATOR_LEN];
    disc.copy_from_slice(raw);
    AccountKind::from_discriminator(disc)
}

/// Any decoded account.
#[derive(Debug, Clone, PartialEq)]
pub enum Account {
    /// Market account.
    Market(Market),
    /// Bet account.
    Bet(Bet),
    /// Oracle event account.
    Event(EventAccount),
    /// Oracle assertion account.
    Oracle(OracleAssertion),
}

impl Account {
    /// Kind of the account.
    pub fn kind(&self) -> AccountKind {
        match self {
            Account::Market(_) => AccountKind::Market,
            Account::Bet(_) => AccountKind::Bet,
            Account::Event(_) => AccountKind::Event,
            Account::Oracle(_) => AccountKind::Oracle,
        }
    }
}

/// Decode an account of any kind, dispatching on the discriminator.
pub fn decode_account(bytes: &[u8]) -> Result<Account, CodecError> {
    match peek_kind(bytes)? {
        AccountKind::Market => decode(bytes).map(Account::Market),
        AccountKind::Bet => decode(bytes).map(Account::Bet),
        AccountKind::Event => decode(bytes).map(Account::Event),
        AccountKind::Oracle => decode(bytes).map(Account::Oracle),
    }
}
