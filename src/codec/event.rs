//! Oracle event and assertion layouts.
//!
//! ```text
//! event                            oracle
//! discriminator   8                discriminator  8
//! event_id       32 NUL-padded     event_id      32 NUL-padded
//! title           4 + n            outcome        4 i32, -1 = none
//! description     4 + n            confidence     4 f32 in [0, 1]
//! category        4 + n            timestamp      8
//! end_time        8                source         4 + n
//! resolved        1 flag           verified       1 flag
//! outcome         4 i32, -1 = none
//! total_volume    8
//! participants    4
//! ```

use super::{AccountKind, AccountRecord, Reader, Writer};
use crate::error::CodecError;
use crate::oracle::{EventAccount, EventId, OracleAssertion, EVENT_ID_LEN};

const OUTCOME_NONE: i32 = -1;

fn write_outcome(w: &mut Writer, outcome: Option<u32>) -> Result<(), CodecError> {
    let raw = match outcome {
        None => OUTCOME_NONE,
        Some(value) => i32::try_from(value).map_err(|_| CodecError::InvalidValue {
            field: "outcome",
            reason: "exceeds i32 range",
        })?,
    };
    w.i32(raw);
    Ok(())
}

fn read_outcome(r: &mut Reader<'_>) -> Result<Option<u32>, CodecError> {
    match r.i32("outcome")? {
        OUTCOME_NONE => Ok(None),
        value if value >= 0 => Ok(Some(value as u32)),
        value => Err(CodecError::InvalidOptional {
            field: "outcome",
            value: value.into(),
        }),
    }
}

fn read_event_id(r: &mut Reader<'_>) -> Result<EventId, CodecError> {
    EventId::from_padded(r.bytes("event_id", EVENT_ID_LEN)?)
}

impl AccountRecord for EventAccount {
    const KIND: AccountKind = AccountKind::Event;
    const MIN_LEN: usize = 8 + 32 + 4 + 4 + 4 + 8 + 1 + 4 + 8 + 4;

    fn encode_body(&self, w: &mut Writer) -> Result<(), CodecError> {
        w.bytes(&self.event_id.to_padded());
        w.string("title", &self.title)?;
        w.string("description", &self.description)?;
        w.string("category", &self.category)?;
        w.timestamp("end_time", self.end_time)?;
        w.flag(self.resolved);
        write_outcome(w, self.outcome)?;
        w.u64(self.total_volume);
        w.u32(self.participants);
        Ok(())
    }

    fn decode_body(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(EventAccount {
            event_id: read_event_id(r)?,
            title: r.string("title")?,
            description: r.string("description")?,
            category: r.string("category")?,
            end_time: r.timestamp("end_time")?,
            resolved: r.flag("resolved")?,
            outcome: read_outcome(r)?,
            total_volume: r.u64("total_volume")?,
            participants: r.u32("participants")?,
        })
    }
}

fn check_confidence(confidence: f32) -> Result<(), CodecError> {
    if confidence.is_finite() && (0.0..=1.0).contains(&confidence) {
        Ok(())
    } else {
        Err(CodecError::InvalidValue {
            field: "confidence",
            reason: "must be a finite value in [0, 1]",
        })
    }
}

impl AccountRecord for OracleAssertion {
    const KIND: AccountKind = AccountKind::Oracle;
    const MIN_LEN: usize = 8 + 32 + 4 + 4 + 8 + 4 + 1;

    fn encode_body(&self, w: &mut Writer) -> Result<(), CodecError> {
        check_confidence(self.confidence)?;
        w.bytes(&self.event_id.to_padded());
        write_outcome(w, self.outcome)?;
        w.f32(self.confidence);
        w.timestamp("timestamp", self.timestamp)?;
        w.string("source", &self.source)?;
        w.flag(self.verified);
        Ok(())
    }

    fn decode_body(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        let event_id = read_event_id(r)?;
        let outcome = read_outcome(r)?;
        let confidence = r.f32("confidence")?;
        check_confidence(confidence)?;

        Ok(OracleAssertion {
            event_id,
            outcome,
            confidence,
            timestamp: r.timestamp("timestamp")?,
            source: r.string("source")?,
            verified: r.flag("verified")?,
        })
    }
}
