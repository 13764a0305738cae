//! Nonce-searching address derivation.

use alloy::primitives::keccak256;
use tracing::trace;

use super::{Address, ADDRESS_LEN};
use crate::error::AddressError;

/// Maximum number of seeds (namespace excluded).
pub const MAX_SEEDS: usize = 15;
/// Maximum length of a single seed in bytes.
pub const MAX_SEED_LEN: usize = 32;

/// Domain separator appended after the program id.
const DERIVATION_MARKER: &[u8] = b"LedgerDerivedAddress";

/// Whether an address falls in the reserved half of the address space.
///
/// Addresses with the high bit of the final byte set are reserved for
/// externally held identities, so a derived account can never collide with
/// a key-holder's address.
pub fn is_reserved(address: &Address) -> bool {
    address.0[ADDRESS_LEN - 1] & 0x80 != 0
}

/// Derives account addresses under a single program id.
#[derive(Debug, Clone)]
pub struct AddressDeriver {
    program_id: Address,
    reserved: fn(&Address) -> bool,
}

impl AddressDeriver {
    /// Create a deriver for the given program id using [`is_reserved`].
    pub fn new(program_id: Address) -> Self {
        Self {
            program_id,
            reserved: is_reserved,
        }
    }

    /// Create a deriver with a custom reserved-space predicate.
    pub fn with_reserved(program_id: Address, reserved: fn(&Address) -> bool) -> Self {
        Self {
            program_id,
            reserved,
        }
    }

    /// The program id mixed into every address.
    pub fn program_id(&self) -> &Address {
        &self.program_id
    }

    /// Compute the address for a known nonce.
    ///
    /// Fails with [`AddressError::ReservedAddress`] if that nonce lands in the
    /// reserved space, so a stored nonce can be verified without a search.
    pub fn create_address(
        &self,
        namespace: &[u8],
        seeds: &[&[u8]],
        nonce: u8,
    ) -> Result<Address, AddressError> {
        validate_seeds(namespace, seeds)?;
        let address = self.hash(namespace, seeds, nonce);
        if (self.reserved)(&address) {
            return Err(AddressError::ReservedAddress { nonce });
        }
        Ok(address)
    }

    /// Find the first usable address, searching nonces from 255 down to 0.
    pub fn derive(&self, namespace: &[u8], seeds: &[&[u8]]) -> Result<(Address, u8), AddressError> {
        validate_seeds(namespace, seeds)?;

        for nonce in (0..=u8::MAX).rev() {
            let address = self.hash(namespace, seeds, nonce);
            if !(self.reserved)(&address) {
                return Ok((address, nonce));
            }
            trace!(nonce, "derived address is reserved, retrying");
        }

        Err(AddressError::AddressSpaceExhausted {
            namespace: String::from_utf8_lossy(namespace).into_owned(),
        })
    }

    /// Derive a market address from its creator and question.
    pub fn market_address(&self, creator: &Address, question: &str) -> Result<(Address, u8), AddressError> {
        self.derive(
            super::namespace::MARKET,
            &[creator.as_ref(), super::question_seed(question)],
        )
    }

    /// Derive the bet address for a (market, bettor) pair.
    pub fn bet_address(&self, market: &Address, bettor: &Address) -> Result<(Address, u8), AddressError> {
        self.derive(super::namespace::BET, &[market.as_ref(), bettor.as_ref()])
    }

    /// Derive the event account address for an event id.
    pub fn event_address(&self, event_id: &[u8]) -> Result<(Address, u8), AddressError> {
        self.derive(super::namespace::EVENT, &[event_id])
    }

    /// Derive the oracle assertion address for an event id.
    pub fn oracle_address(&self, event_id: &[u8]) -> Result<(Address, u8), AddressError> {
        self.derive(super::namespace::ORACLE, &[event_id])
    }

    fn hash(&self, namespace: &[u8], seeds: &[&[u8]], nonce: u8) -> Address {
        let capacity = namespace.len()
            + seeds.iter().map(|s| s.len()).sum::<usize>()
            + 1
            + ADDRESS_LEN
            + DERIVATION_MARKER.len();
        let mut preimage = Vec::with_capacity(capacity);
        preimage.extend_from_slice(namespace);
        for seed in seeds {
            preimage.extend_from_slice(seed);
        }
        preimage.push(nonce);
        preimage.extend_from_slice(self.program_id.as_ref());
        preimage.extend_from_slice(DERIVATION_MARKER);

        Address(keccak256(&preimage).0)
    }
}

fn validate_seeds(namespace: &[u8], seeds: &[&[u8]]) -> Result<(), AddressError> {
    if seeds.len() > MAX_SEEDS {
        return Err(AddressError::TooManySeeds {
            max: MAX_SEEDS,
            got: seeds.len(),
        });
    }
    for seed in std::iter::once(&namespace).chain(seeds.iter()) {
        if seed.len() > MAX_SEED_LEN {
            return Err(AddressError::SeedTooLong {
                max: MAX_SEED_LEN,
                got: seed.len(),
            });
        }
    }
    Ok(())
}
