//! Bet account layout.
//!
//! ```text
//! discriminator  8
//! market        32
//! bettor        32
//! amount         8  u64
//! prediction     1  1 = yes, 0 = no
//! claimed        1  flag
//! bump           1
//! ```

use super::{AccountKind, AccountRecord, Reader, Writer};
use crate::error::CodecError;
use crate::market::{Bet, Side};

impl AccountRecord for Bet {
    const KIND: AccountKind = AccountKind::Bet;
    const MIN_LEN: usize = 8 + 32 + 32 + 8 + 1 + 1 + 1;

    fn encode_body(&self, w: &mut Writer) -> Result<(), CodecError> {
        if self.amount == 0 {
            return Err(CodecError::InvalidValue {
                field: "amount",
                reason: "must be positive",
            });
        }
        w.address(&self.market);
        w.address(&self.bettor);
        w.u64(self.amount);
        w.flag(self.prediction.as_bool());
        w.flag(self.claimed);
        w.u8(self.bump);
        Ok(())
    }

    fn decode_body(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        let market = r.address("market")?;
        let bettor = r.address("bettor")?;
        let amount = r.u64("amount")?;
        if amount == 0 {
            return Err(CodecError::InvalidValue {
                field: "amount",
                reason: "must be positive",
            });
        }
        let prediction = Side::from_bool(r.flag("prediction")?);
        let claimed = r.flag("claimed")?;
        let bump = r.u8("bump")?;

        Ok(Bet {
            market,
            bettor,
            amount,
            prediction,
            claimed,
            bump,
        })
    }
}
