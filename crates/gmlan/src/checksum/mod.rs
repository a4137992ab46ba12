//! Firmware checksum / partition verifier
//!
//! ```text
//! image
//! ┌──────────────┬──────────────┬──────────────────────┬──────────────┐
//! │ boot         │ metadata     │ calibration ...      │ main         │
//! └──────────────┴──────┬───────┴──────────────────────┴──────────────┘
//!                       │  4-byte BE pointer at 0x20140 -> metadata base
//!                       ▼
//!            per range: header (= range start), modsum, CRC-32
//! ```
//!
//! Layout variants are static tables. Every stored field sits outside the
//! ranges it covers.

mod layout;
mod verify;

pub use layout::{LayoutVariant, PartitionRange, LAYOUTS, METADATA_POINTER_OFFSET, TYPE_1, TYPE_2};
pub use verify::{
    compute_checksums, crc32, metadata_pointer, modsum, stamp_metadata, verify_checksum,
    verify_image, ChecksumError, ChecksumReport, ChecksumStatus, ChecksumVerifier, RangeChecksums,
};
