//! Partition layout tables

/// File offset of the 4-byte big-endian metadata pointer
pub const METADATA_POINTER_OFFSET: usize = 0x20140;

/// One checksummed region of a firmware image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionRange {
    pub name: &'static str,
    /// First covered byte
    pub start: u32,
    /// Last covered byte (inclusive)
    pub end: u32,
    /// Stored 32-bit byte sum, relative to the metadata base
    pub modsum_offset: u32,
    /// Stored CRC-32, relative to the metadata base
    pub crc_offset: u32,
    /// Stored range start, relative to the metadata base
    pub header_offset: u32,
}

impl PartitionRange {
    pub fn len(&self) -> usize {
        (self.end - self.start) as usize + 1
    }

    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.start as usize && offset <= self.end as usize
    }
}

/// A named image layout
#[derive(Debug, PartialEq, Eq)]
pub struct LayoutVariant {
    pub name: &'static str,
    /// Exact file size of images using this layout
    pub image_size: usize,
    pub pointer_offset: usize,
    pub ranges: &'static [PartitionRange],
}

const fn range(name: &'static str, index: u32, start: u32, end: u32) -> PartitionRange {
    let header_offset = 0x10 + index * 12;
    PartitionRange {
        name,
        start,
        end,
        header_offset,
        modsum_offset: header_offset + 4,
        crc_offset: header_offset + 8,
    }
}

/// 1 MiB images
pub static TYPE_1: LayoutVariant = LayoutVariant {
    name: "type 1",
    image_size: 0x10_0000,
    pointer_offset: METADATA_POINTER_OFFSET,
    ranges: &[
        range("boot", 0, 0x0_0000, 0x1_FFFF),
        range("calibration 1", 1, 0x2_0400, 0x3_FFFF),
        range("calibration 2", 2, 0x4_0000, 0x5_FFFF),
        range("main", 3, 0x6_0000, 0xF_FFFF),
    ],
};

/// 2 MiB images
pub static TYPE_2: LayoutVariant = LayoutVariant {
    name: "type 2",
    image_size: 0x20_0000,
    pointer_offset: METADATA_POINTER_OFFSET,
    ranges: &[
        range("boot", 0, 0x0_0000, 0x1_FFFF),
        range("engine calibration", 1, 0x2_0400, 0x5_FFFF),
        range("transmission calibration", 2, 0x6_0000, 0x7_FFFF),
        range("main", 3, 0x8_0000, 0x1F_FFFF),
    ],
};

pub static LAYOUTS: &[&LayoutVariant] = &[&TYPE_1, &TYPE_2];
