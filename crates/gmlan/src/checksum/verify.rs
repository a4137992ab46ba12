//! Checksum verification and repair

use std::path::{Path, PathBuf};

use crc::{Crc, CRC_32_ISO_HDLC};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::layout::{LayoutVariant, PartitionRange, LAYOUTS};
use crate::events::{EventCategory, SharedSink};

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Outcome of verifying one image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecksumStatus {
    /// Every stored value matches
    Ok,
    /// Mismatches found and every one was rewritten
    MismatchCorrected,
    /// At least one mismatch was left in place
    MismatchRejected,
    /// No layout has this image size
    InvalidFileLength,
    /// The metadata block does not match any layout of this size
    UnknownLayout,
}

#[derive(Debug, Error)]
pub enum ChecksumError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Stored and computed values for one range
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RangeChecksums {
    pub name: &'static str,
    pub start: u32,
    pub end: u32,
    pub stored_modsum: u32,
    pub computed_modsum: u32,
    pub stored_crc: u32,
    pub computed_crc: u32,
}

impl RangeChecksums {
    pub fn is_valid(&self) -> bool {
        self.stored_modsum == self.computed_modsum && self.stored_crc == self.computed_crc
    }
}

/// Per-range checksums of a recognised image
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChecksumReport {
    pub layout: &'static str,
    pub metadata_base: u32,
    pub ranges: Vec<RangeChecksums>,
}

/// 32-bit wrapping byte sum
pub fn modsum(data: &[u8]) -> u32 {
    data.iter().fold(0u32, |acc, &b| acc.wrapping_add(b as u32))
}

/// CRC-32 (ISO HDLC)
pub fn crc32(data: &[u8]) -> u32 {
    CRC32.checksum(data)
}

/// Read the 4-byte big-endian metadata pointer at `offset`
pub fn metadata_pointer(image: &[u8], offset: usize) -> Option<u32> {
    let bytes = image.get(offset..offset + 4)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn read_u32(image: &[u8], offset: usize) -> Option<u32> {
    metadata_pointer(image, offset)
}

fn write_u32(image: &mut [u8], offset: usize, value: u32) {
    image[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
}

struct Located {
    layout: &'static LayoutVariant,
    base: usize,
}

impl Located {
    fn field(&self, relative: u32) -> usize {
        self.base + relative as usize
    }
}

fn fields_are_valid(layout: &LayoutVariant, base: usize, image_len: usize) -> bool {
    layout.ranges.iter().all(|r| {
        [r.header_offset, r.modsum_offset, r.crc_offset].iter().all(|&rel| {
            let field = base + rel as usize;
            field + 4 <= image_len
                && layout
                    .ranges
                    .iter()
                    .all(|other| (field..field + 4).all(|b| !other.contains(b)))
        })
    })
}

fn locate(image: &[u8]) -> Result<Located, ChecksumStatus> {
    let mut sized = LAYOUTS
        .iter()
        .copied()
        .filter(|l| l.image_size == image.len())
        .peekable();
    if sized.peek().is_none() {
        return Err(ChecksumStatus::InvalidFileLength);
    }

    for layout in sized {
        let Some(pointer) = metadata_pointer(image, layout.pointer_offset) else {
            continue;
        };
        let base = pointer as usize;
        if !fields_are_valid(layout, base, image.len()) {
            debug!(layout = layout.name, base, "Metadata pointer out of place");
            continue;
        }
        let headers_match = layout
            .ranges
            .iter()
            .all(|r| read_u32(image, base + r.header_offset as usize) == Some(r.start));
        if headers_match {
            return Ok(Located { layout, base });
        }
    }
    Err(ChecksumStatus::UnknownLayout)
}

fn range_checksums(image: &[u8], located: &Located, r: &PartitionRange) -> RangeChecksums {
    let data = &image[r.start as usize..=r.end as usize];
    RangeChecksums {
        name: r.name,
        start: r.start,
        end: r.end,
        stored_modsum: read_u32(image, located.field(r.modsum_offset)).unwrap_or(0),
        computed_modsum: modsum(data),
        stored_crc: read_u32(image, located.field(r.crc_offset)).unwrap_or(0),
        computed_crc: crc32(data),
    }
}

/// Report stored and computed values without modifying anything
pub fn compute_checksums(image: &[u8]) -> Result<ChecksumReport, ChecksumStatus> {
    let located = locate(image)?;
    Ok(ChecksumReport {
        layout: located.layout.name,
        metadata_base: located.base as u32,
        ranges: located
            .layout
            .ranges
            .iter()
            .map(|r| range_checksums(image, &located, r))
            .collect(),
    })
}

/// Verify an in-memory image, repairing accepted mismatches
///
/// `confirm(layer, stored, computed)` runs for every mismatching value. A
/// value is rewritten only when `autocorrect` is set and `confirm`
/// returned true.
pub fn verify_image<F>(image: &mut [u8], autocorrect: bool, mut confirm: F) -> ChecksumStatus
where
    F: FnMut(&str, u32, u32) -> bool,
{
    verify_in_place(image, autocorrect, &mut confirm).0
}

/// Returns the status and whether the image was modified
fn verify_in_place(
    image: &mut [u8],
    autocorrect: bool,
    confirm: &mut dyn FnMut(&str, u32, u32) -> bool,
) -> (ChecksumStatus, bool) {
    let located = match locate(image) {
        Ok(located) => located,
        Err(status) => return (status, false),
    };
    debug!(layout = located.layout.name, base = located.base, "Layout recognised");

    let mut mismatches = 0usize;
    let mut corrected = 0usize;
    for r in located.layout.ranges {
        let sums = range_checksums(image, &located, r);
        let fields = [
            ("modsum", located.field(r.modsum_offset), sums.stored_modsum, sums.computed_modsum),
            ("crc", located.field(r.crc_offset), sums.stored_crc, sums.computed_crc),
        ];
        for (kind, offset, stored, computed) in fields {
            if stored == computed {
                continue;
            }
            mismatches += 1;
            let layer = format!("{} {}", r.name, kind);
            warn!(
                layer = %layer,
                stored = %format!("0x{:08X}", stored),
                computed = %format!("0x{:08X}", computed),
                "Checksum mismatch"
            );
            if confirm(&layer, stored, computed) && autocorrect {
                write_u32(image, offset, computed);
                corrected += 1;
            }
        }
    }

    let status = match (mismatches, corrected) {
        (0, _) => ChecksumStatus::Ok,
        (m, c) if m == c => ChecksumStatus::MismatchCorrected,
        _ => ChecksumStatus::MismatchRejected,
    };
    (status, corrected > 0)
}

/// Verify a firmware file, rewriting it once if anything was corrected
pub fn verify_checksum<F>(
    path: &Path,
    autocorrect: bool,
    mut confirm: F,
) -> Result<ChecksumStatus, ChecksumError>
where
    F: FnMut(&str, u32, u32) -> bool,
{
    let mut image = std::fs::read(path).map_err(|source| ChecksumError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let (status, changed) = verify_in_place(&mut image, autocorrect, &mut confirm);
    if changed {
        std::fs::write(path, &image).map_err(|source| ChecksumError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "Corrected checksums written");
    }
    Ok(status)
}

/// Write the metadata pointer, range headers and correct checksums
///
/// Returns false if the layout does not fit `image` at `metadata_base`.
pub fn stamp_metadata(image: &mut [u8], layout: &LayoutVariant, metadata_base: u32) -> bool {
    let base = metadata_base as usize;
    if image.len() != layout.image_size
        || layout.pointer_offset + 4 > image.len()
        || !fields_are_valid(layout, base, image.len())
    {
        return false;
    }
    write_u32(image, layout.pointer_offset, metadata_base);
    for r in layout.ranges {
        write_u32(image, base + r.header_offset as usize, r.start);
    }
    for r in layout.ranges {
        let data = &image[r.start as usize..=r.end as usize];
        let (sum, crc) = (modsum(data), crc32(data));
        write_u32(image, base + r.modsum_offset as usize, sum);
        write_u32(image, base + r.crc_offset as usize, crc);
    }
    true
}

/// Verifier reporting through an info sink
pub struct ChecksumVerifier {
    sink: SharedSink,
}

impl ChecksumVerifier {
    pub fn new(sink: SharedSink) -> Self {
        Self { sink }
    }

    /// [`verify_checksum`] with one event per mismatch and one for the outcome
    ///
    /// A rewritten image is also reported as [`EventCategory::ConvertingFile`].
    pub fn verify_file<F>(
        &self,
        path: &Path,
        autocorrect: bool,
        mut confirm: F,
    ) -> crate::Result<ChecksumStatus>
    where
        F: FnMut(&str, u32, u32) -> bool,
    {
        let sink = &self.sink;
        let result = verify_checksum(path, autocorrect, |layer, stored, computed| {
            sink.emit(
                &format!(
                    "{}: file 0x{:08X}, computed 0x{:08X}",
                    layer, stored, computed
                ),
                EventCategory::Checksum,
            );
            confirm(layer, stored, computed)
        });
        match &result {
            Ok(status) => {
                self.sink.emit(
                    &format!("{}: {}", path.display(), describe(*status)),
                    EventCategory::Checksum,
                );
                if *status == ChecksumStatus::MismatchCorrected {
                    self.sink.emit(
                        &format!("Wrote corrected image to {}", path.display()),
                        EventCategory::ConvertingFile,
                    );
                }
            }
            Err(e) => self.sink.emit(&e.to_string(), EventCategory::Checksum),
        }
        Ok(result?)
    }
}

fn describe(status: ChecksumStatus) -> &'static str {
    match status {
        ChecksumStatus::Ok => "checksums OK",
        ChecksumStatus::MismatchCorrected => "checksum mismatch corrected",
        ChecksumStatus::MismatchRejected => "checksum mismatch not corrected",
        ChecksumStatus::InvalidFileLength => "invalid file length",
        ChecksumStatus::UnknownLayout => "unknown layout",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::{TYPE_1, TYPE_2};
    use crate::events::MemorySink;
    use std::sync::Arc;

    const BASE: u32 = 0x2_0000;

    fn image(layout: &LayoutVariant) -> Vec<u8> {
        let mut image: Vec<u8> = (0..layout.image_size)
            .map(|i| (i.wrapping_mul(31) >> 3) as u8)
            .collect();
        assert!(stamp_metadata(&mut image, layout, BASE));
        image
    }

    #[test]
    fn crc_matches_reference_vector() {
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(modsum(&[0xFF, 0xFF, 0x02]), 0x200);
    }

    #[test]
    fn pointer_is_big_endian() {
        let mut image = vec![0u8; 0x20200];
        image[0x20140..0x20144].copy_from_slice(&[0x00, 0x02, 0x00, 0x00]);
        assert_eq!(metadata_pointer(&image, 0x20140), Some(0x0002_0000));
        assert_eq!(metadata_pointer(&image, 0x201FE), None);
    }

    #[test]
    fn stamped_images_verify() {
        for layout in [&TYPE_1, &TYPE_2] {
            let mut image = image(layout);
            let mut calls = 0;
            let status = verify_image(&mut image, true, |_, _, _| {
                calls += 1;
                true
            });
            assert_eq!(status, ChecksumStatus::Ok);
            assert_eq!(calls, 0);

            let report = compute_checksums(&image).unwrap();
            assert_eq!(report.layout, layout.name);
            assert!(report.ranges.iter().all(RangeChecksums::is_valid));
        }
    }

    #[test]
    fn accepted_mismatch_is_corrected() {
        let mut image = image(&TYPE_1);
        image[0x4_1234] ^= 0x5A;

        let mut layers = Vec::new();
        let status = verify_image(&mut image, true, |layer, stored, computed| {
            assert_ne!(stored, computed);
            layers.push(layer.to_string());
            true
        });
        assert_eq!(status, ChecksumStatus::MismatchCorrected);
        assert_eq!(layers, vec!["calibration 2 modsum", "calibration 2 crc"]);
        assert_eq!(verify_image(&mut image, false, |_, _, _| false), ChecksumStatus::Ok);
    }

    #[test]
    fn rejected_mismatch_leaves_image_alone() {
        let mut image = image(&TYPE_1);
        image[0x1_0000] ^= 0x01;
        let before = image.clone();

        let status = verify_image(&mut image, true, |_, _, _| false);
        assert_eq!(status, ChecksumStatus::MismatchRejected);
        assert_eq!(image, before);
    }

    #[test]
    fn accepted_without_autocorrect_is_not_written() {
        let mut image = image(&TYPE_1);
        image[0x7_0000] ^= 0x01;
        let before = image.clone();

        let status = verify_image(&mut image, false, |_, _, _| true);
        assert_eq!(status, ChecksumStatus::MismatchRejected);
        assert_eq!(image, before);
    }

    #[test]
    fn wrong_length_and_unknown_layout() {
        let mut short = vec![0u8; 0x1000];
        assert_eq!(
            verify_image(&mut short, true, |_, _, _| true),
            ChecksumStatus::InvalidFileLength
        );

        let mut image = image(&TYPE_1);
        let header = BASE as usize + TYPE_1.ranges[1].header_offset as usize;
        image[header + 3] ^= 0xFF;
        assert_eq!(
            verify_image(&mut image, true, |_, _, _| true),
            ChecksumStatus::UnknownLayout
        );

        let mut image = image_with_pointer(0x6_0000);
        assert_eq!(
            verify_image(&mut image, true, |_, _, _| true),
            ChecksumStatus::UnknownLayout
        );
    }

    fn image_with_pointer(pointer: u32) -> Vec<u8> {
        let mut image = image(&TYPE_1);
        write_u32(&mut image, TYPE_1.pointer_offset, pointer);
        image
    }

    #[test]
    fn file_is_rewritten_once_corrected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.bin");
        let mut image = image(&TYPE_1);
        image[0x9_0000] ^= 0xFF;
        std::fs::write(&path, &image).unwrap();

        let sink = MemorySink::new();
        let verifier = ChecksumVerifier::new(Arc::new(sink.clone()));
        let status = verifier.verify_file(&path, true, |_, _, _| true).unwrap();
        assert_eq!(status, ChecksumStatus::MismatchCorrected);

        let status = verify_checksum(&path, false, |_, _, _| false).unwrap();
        assert_eq!(status, ChecksumStatus::Ok);
        let events = sink.messages(EventCategory::Checksum);
        assert_eq!(events.len(), 3);
        assert!(events[0].starts_with("main modsum: file 0x"));
        assert!(events[2].ends_with("checksum mismatch corrected"));
        assert_eq!(
            sink.messages(EventCategory::ConvertingFile),
            vec![format!("Wrote corrected image to {}", path.display())]
        );
    }

    #[test]
    fn clean_file_is_not_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.bin");
        std::fs::write(&path, image(&TYPE_1)).unwrap();

        let sink = MemorySink::new();
        let verifier = ChecksumVerifier::new(Arc::new(sink.clone()));
        let status = verifier.verify_file(&path, true, |_, _, _| true).unwrap();
        assert_eq!(status, ChecksumStatus::Ok);
        assert!(sink.messages(EventCategory::ConvertingFile).is_empty());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = verify_checksum(&dir.path().join("missing.bin"), false, |_, _, _| false);
        assert!(matches!(result, Err(ChecksumError::Read { .. })));

        let verifier = ChecksumVerifier::new(Arc::new(MemorySink::new()));
        let result = verifier.verify_file(&dir.path().join("missing.bin"), false, |_, _, _| false);
        assert!(matches!(
            result,
            Err(crate::GmlanError::Checksum(ChecksumError::Read { .. }))
        ));
    }
}
