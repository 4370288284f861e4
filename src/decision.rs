//! Immutable decision records and the persisted timestamp codec
use chrono::{DateTime, TimeZone, Utc};

use crate::error::DecisionError;
use crate::template::FlowType;

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl TimeStamp<Utc> {
    pub fn now() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .unwrap()
            .into()
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
#[cbor(index_only)]
pub enum DecisionKind {
    #[n(0)]
    Approved,
    #[n(1)]
    Rejected,
}

impl DecisionKind {
    /// Parse the wire value used by callers. Anything other than
    /// `approved`/`rejected` is a caller error.
    pub fn parse(value: &str) -> Result<Self, DecisionError> {
        match value.trim().to_lowercase().as_str() {
            "approved" => Ok(DecisionKind::Approved),
            "rejected" => Ok(DecisionKind::Rejected),
            other => Err(DecisionError::InvalidDecision(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionKind::Approved => "approved",
            DecisionKind::Rejected => "rejected",
        }
    }
}

/// One approve/reject fact for one step of one entity. Appended to the log,
/// never mutated or deleted; a correction is a newer decision for the same
/// step, and the latest `decided_at` wins.
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Decision {
    #[n(0)]
    pub id: String, // uuid7
    #[n(1)]
    pub flow_type: FlowType,
    #[n(2)]
    pub entity_id: String,
    #[n(3)]
    pub step_id: String,
    #[n(4)]
    pub decision: DecisionKind,
    #[n(5)]
    pub comment: Option<String>,
    #[n(6)]
    pub decided_by: Option<String>, // actor id
    #[n(7)]
    pub decided_by_email: Option<String>,
    #[n(8)]
    pub decided_by_name: Option<String>,
    #[n(9)]
    pub decided_by_role: String,
    #[n(10)]
    pub decided_at: TimeStamp<Utc>,
}

impl Decision {
    /// Display identity of the decider: name, then email, then raw id.
    pub fn decider_display(&self) -> Option<String> {
        self.decided_by_name
            .clone()
            .or_else(|| self.decided_by_email.clone())
            .or_else(|| self.decided_by.clone())
    }
}
