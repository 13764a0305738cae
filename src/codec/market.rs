//! Market account layout.
//!
//! ```text
//! discriminator     8
//! creator          32
//! question          4 + n
//! description       4 + n
//! end_time          8
//! resolution_time   8
//! total_yes         8
//! total_no          8
//! resolved          1  flag
//! outcome           1  1 = yes, 0 = no, 255 = none
//! bump              1
//! metadata count    4  then per entry: tag u8, len u32, bytes
//! ```

use super::{AccountKind, AccountRecord, Reader, Writer};
use crate::error::CodecError;
use crate::market::{Market, MarketMetadata, Side};

const OUTCOME_NONE: u8 = u8::MAX;

const TAG_IMAGE_URL: u8 = 1;
const TAG_EXTERNAL_URL: u8 = 2;
const TAG_RESOLUTION_SOURCE: u8 = 3;

/// Smallest metadata entry: tag plus empty length prefix.
const MIN_ENTRY_LEN: usize = 1 + 4;

impl AccountRecord for Market {
    const KIND: AccountKind = AccountKind::Market;
    const MIN_LEN: usize = 8 + 32 + 4 + 4 + 8 + 8 + 8 + 8 + 1 + 1 + 1 + 4;

    fn encode_body(&self, w: &mut Writer) -> Result<(), CodecError> {
        if self.resolved != self.outcome.is_some() {
            return Err(CodecError::InvalidValue {
                field: "outcome",
                reason: "must be present exactly when resolved",
            });
        }

        w.address(&self.creator);
        w.string("question", &self.question)?;
        w.string("description", &self.description)?;
        w.timestamp("end_time", self.end_time)?;
        w.timestamp("resolution_time", self.resolution_time)?;
        w.u64(self.total_yes_amount);
        w.u64(self.total_no_amount);
        w.flag(self.resolved);
        w.u8(match self.outcome {
            None => OUTCOME_NONE,
            Some(side) => u8::from(side.as_bool()),
        });
        w.u8(self.bump);

        let count = u32::try_from(self.metadata.len()).map_err(|_| CodecError::FieldTooLong {
            field: "metadata",
            len: self.metadata.len(),
        })?;
        w.u32(count);
        for entry in &self.metadata {
            encode_metadata(w, entry)?;
        }
        Ok(())
    }

    fn decode_body(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        let creator = r.address("creator")?;
        let question = r.string("question")?;
        let description = r.string("description")?;
        let end_time = r.timestamp("end_time")?;
        let resolution_time = r.timestamp("resolution_time")?;
        let total_yes_amount = r.u64("total_yes")?;
        let total_no_amount = r.u64("total_no")?;
        let resolved = r.flag("resolved")?;
        let outcome = match r.u8("outcome")? {
            OUTCOME_NONE => None,
            0 => Some(Side::No),
            1 => Some(Side::Yes),
            value => {
                return Err(CodecError::InvalidOptional {
                    field: "outcome",
                    value: value.into(),
                })
            }
        };
        if resolved != outcome.is_some() {
            return Err(CodecError::InvalidValue {
                field: "outcome",
                reason: "must be present exactly when resolved",
            });
        }
        let bump = r.u8("bump")?;

        let count = r.u32("metadata")? as usize;
        // A lying count cannot force a large allocation.
        let mut metadata = Vec::with_capacity(count.min(r.remaining() / MIN_ENTRY_LEN));
        for _ in 0..count {
            metadata.push(decode_metadata(r)?);
        }

        Ok(Market {
            creator,
            question,
            description,
            end_time,
            resolution_time,
            total_yes_amount,
            total_no_amount,
            resolved,
            outcome,
            bump,
            metadata,
        })
    }
}

fn encode_metadata(w: &mut Writer, entry: &MarketMetadata) -> Result<(), CodecError> {
    match entry {
        MarketMetadata::ImageUrl { url } => {
            w.u8(TAG_IMAGE_URL);
            w.string("metadata.image_url", url)
        }
        MarketMetadata::ExternalUrl { url } => {
            w.u8(TAG_EXTERNAL_URL);
            w.string("metadata.external_url", url)
        }
        MarketMetadata::ResolutionSource { source } => {
            w.u8(TAG_RESOLUTION_SOURCE);
            w.string("metadata.resolution_source", source)
        }
        MarketMetadata::Unknown { tag, bytes } => {
            if matches!(*tag, TAG_IMAGE_URL | TAG_EXTERNAL_URL | TAG_RESOLUTION_SOURCE) {
                return Err(CodecError::InvalidValue {
                    field: "metadata.tag",
                    reason: "unknown entry uses a known tag",
                });
            }
            w.u8(*tag);
            w.prefixed("metadata.unknown", bytes)
        }
    }
}

fn decode_metadata(r: &mut Reader<'_>) -> Result<MarketMetadata, CodecError> {
    let entry = match r.u8("metadata.tag")? {
        TAG_IMAGE_URL => MarketMetadata::ImageUrl {
            url: r.string("metadata.image_url")?,
        },
        TAG_EXTERNAL_URL => MarketMetadata::ExternalUrl {
            url: r.string("metadata.external_url")?,
        },
        TAG_RESOLUTION_SOURCE => MarketMetadata::ResolutionSource {
            source: r.string("metadata.resolution_source")?,
        },
        tag => MarketMetadata::Unknown {
            tag,
            bytes: r.prefixed("metadata.unknown")?.to_vec(),
        },
    };
    Ok(entry)
}
