//! Entity <-> record mapping contract.

use crate::record::{CodecResult, Record};

/// Bidirectional mapping between a typed entity and a generic record.
///
/// `to_record` must emit exactly the contract's columns (the primary key
/// included, `Value::Null` when unset). `from_record` receives rows whose
/// mapped table is already set to the contract's table, so plain column
/// names resolve against aliased projections.
pub trait EntityCodec: Sized + Send + 'static {
    fn to_record(&self) -> Record;

    fn from_record(record: &Record) -> CodecResult<Self>;
}
