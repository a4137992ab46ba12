//! Synthetic firmware images
//!
//! Builds simulator flash contents that pass `gmlan`'s checksum verifier:
//! pseudo-random data with the metadata block stamped into the unused gap
//! between the boot and first calibration ranges.
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │  boot                               │  0x00000
//! ├─────────────────────────────────────┤
//! │  metadata block (headers, sums)     │  0x20000
//! │  metadata pointer                   │  0x20140
//! ├─────────────────────────────────────┤
//! │  calibration ranges                 │  0x20400
//! ├─────────────────────────────────────┤
//! │  main                               │
//! └─────────────────────────────────────┘
//! ```

use gmlan::checksum::{stamp_metadata, LayoutVariant};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

/// Where synthetic images keep their checksum metadata
pub const METADATA_BASE: u32 = 0x2_0000;

/// Size of the unchecksummed gap holding the metadata
const METADATA_GAP: usize = 0x400;

/// Deterministic image for `layout`, seeded by `seed`
///
/// Returns `None` if the layout has no room for the metadata block at
/// [`METADATA_BASE`].
pub fn synthetic_image(layout: &LayoutVariant, seed: u64) -> Option<Vec<u8>> {
    let mut image = vec![0u8; layout.image_size];
    StdRng::seed_from_u64(seed).fill_bytes(&mut image);

    let base = METADATA_BASE as usize;
    image.get_mut(base..base + METADATA_GAP)?.fill(0xFF);

    stamp_metadata(&mut image, layout, METADATA_BASE).then_some(image)
}

/// Flat fill for families without a partition layout
pub fn blank_image(size: usize) -> Vec<u8> {
    vec![0xFF; size]
}
