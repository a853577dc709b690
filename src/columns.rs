//! Cell-level coercion helpers for the arrow arrays the pipeline reads.
//!
//! Raw day files come from several producers, so the same logical column can
//! arrive under different physical types: user and entity identifiers as any
//! string or integer flavor, timestamps as plain `Int64` epoch milliseconds or
//! as a typed `Timestamp` column in any unit. These helpers normalize a single
//! cell to the pipeline's canonical form and return `None` for nulls or
//! unsupported types so callers can decide how to react.

use arrow::array::{
    Array, Int32Array, Int64Array, LargeStringArray, StringArray, StringViewArray,
    TimestampMicrosecondArray, TimestampMillisecondArray, TimestampNanosecondArray,
    TimestampSecondArray, UInt32Array, UInt64Array,
};
use arrow::datatypes::{DataType, TimeUnit};

use crate::types::EpochMillis;

/// Renders one cell as an owned string.
///
/// Integer identifiers are rendered in decimal with no padding so that the
/// same logical id hashes identically whether the producer stored it as text
/// or as a number.
pub(crate) fn string_at(array: &dyn Array, row: usize) -> Option<String> {
    if array.is_null(row) {
        return None;
    }
    match array.data_type() {
        DataType::Utf8 => array
            .as_any()
            .downcast_ref::<StringArray>()
            .map(|col| col.value(row).to_string()),
        DataType::LargeUtf8 => array
            .as_any()
            .downcast_ref::<LargeStringArray>()
            .map(|col| col.value(row).to_string()),
        DataType::Utf8View => array
            .as_any()
            .downcast_ref::<StringViewArray>()
            .map(|col| col.value(row).to_string()),
        DataType::Int32 => array
            .as_any()
            .downcast_ref::<Int32Array>()
            .map(|col| col.value(row).to_string()),
        DataType::Int64 => array
            .as_any()
            .downcast_ref::<Int64Array>()
            .map(|col| col.value(row).to_string()),
        DataType::UInt32 => array
            .as_any()
            .downcast_ref::<UInt32Array>()
            .map(|col| col.value(row).to_string()),
        DataType::UInt64 => array
            .as_any()
            .downcast_ref::<UInt64Array>()
            .map(|col| col.value(row).to_string()),
        _ => None,
    }
}

/// Reads one cell as a `u32` token id, rejecting values outside the range.
pub(crate) fn u32_at(array: &dyn Array, row: usize) -> Option<u32> {
    if array.is_null(row) {
        return None;
    }
    match array.data_type() {
        DataType::UInt32 => array
            .as_any()
            .downcast_ref::<UInt32Array>()
            .map(|col| col.value(row)),
        DataType::Int32 => array
            .as_any()
            .downcast_ref::<Int32Array>()
            .and_then(|col| u32::try_from(col.value(row)).ok()),
        DataType::Int64 => array
            .as_any()
            .downcast_ref::<Int64Array>()
            .and_then(|col| u32::try_from(col.value(row)).ok()),
        DataType::UInt64 => array
            .as_any()
            .downcast_ref::<UInt64Array>()
            .and_then(|col| u32::try_from(col.value(row)).ok()),
        _ => None,
    }
}

/// Reads one cell as epoch milliseconds.
///
/// Sub-millisecond units truncate toward zero; seconds scale up.
pub(crate) fn millis_at(array: &dyn Array, row: usize) -> Option<EpochMillis> {
    if array.is_null(row) {
        return None;
    }
    match array.data_type() {
        DataType::Int64 => array
            .as_any()
            .downcast_ref::<Int64Array>()
            .map(|col| col.value(row)),
        DataType::Int32 => array
            .as_any()
            .downcast_ref::<Int32Array>()
            .map(|col| i64::from(col.value(row))),
        DataType::Timestamp(TimeUnit::Second, _) => array
            .as_any()
            .downcast_ref::<TimestampSecondArray>()
            .map(|col| col.value(row).saturating_mul(1_000)),
        DataType::Timestamp(TimeUnit::Millisecond, _) => array
            .as_any()
            .downcast_ref::<TimestampMillisecondArray>()
            .map(|col| col.value(row)),
        DataType::Timestamp(TimeUnit::Microsecond, _) => array
            .as_any()
            .downcast_ref::<TimestampMicrosecondArray>()
            .map(|col| col.value(row) / 1_000),
        DataType::Timestamp(TimeUnit::Nanosecond, _) => array
            .as_any()
            .downcast_ref::<TimestampNanosecondArray>()
            .map(|col| col.value(row) / 1_000_000),
        _ => None,
    }
}
