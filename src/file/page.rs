use super::error::{PageError, PageResult};
use super::{HEADER_SIZE, PAGE_SIZE, PageId};

/// Page signature written into the first four header bytes
const SIGNATURE: u32 = 0x00DB_DB01;

/// Bytes per slot directory entry (offset u16 + length u16)
const SLOT_SIZE: usize = 4;

const SIGNATURE_OFF: usize = 0;
const SLOT_COUNT_OFF: usize = 4;
const LOWER_BOUND_OFF: usize = 6;
const UPPER_BOUND_OFF: usize = 8;

/// A fixed-size slotted page.
///
/// Layout: a 10-byte header (signature, slot count, lower bound, upper
/// bound), a slot directory growing forward from the header, and
/// variable-length records growing backward from the end of the page.
/// All multi-byte integers are big-endian. Records are never moved or
/// compacted once written.
#[derive(Debug, Clone)]
pub struct HeapPage {
    page_id: PageId,
    buf: Box<[u8; PAGE_SIZE]>,
}

impl HeapPage {
    /// Create a fresh, empty page with an initialized header
    pub fn new(page_id: PageId) -> Self {
        let mut page = Self {
            page_id,
            buf: Box::new([0u8; PAGE_SIZE]),
        };
        page.write_u32(SIGNATURE_OFF, SIGNATURE);
        page.write_u16(SLOT_COUNT_OFF, 0);
        page.write_u16(LOWER_BOUND_OFF, HEADER_SIZE as u16);
        page.write_u16(UPPER_BOUND_OFF, PAGE_SIZE as u16);
        page
    }

    /// Adopt a buffer loaded from disk, validating length and signature
    pub fn from_bytes(page_id: PageId, bytes: &[u8]) -> PageResult<Self> {
        if bytes.len() != PAGE_SIZE {
            return Err(PageError::InvalidLength {
                expected: PAGE_SIZE,
                actual: bytes.len(),
            });
        }
        let mut buf = Box::new([0u8; PAGE_SIZE]);
        buf.copy_from_slice(bytes);
        let page = Self { page_id, buf };
        if !page.is_valid() {
            return Err(PageError::BadSignature);
        }
        Ok(page)
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Number of occupied slots
    pub fn slot_count(&self) -> u16 {
        self.read_u16(SLOT_COUNT_OFF)
    }

    pub fn is_valid(&self) -> bool {
        self.read_u32(SIGNATURE_OFF) == SIGNATURE
    }

    /// Raw page bytes, used by index structures overlaying their own
    /// layouts past the page header
    pub fn bytes(&self) -> &[u8] {
        &self.buf[..]
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.buf[..]
    }

    /// Append a record, returning the slot index it landed in.
    ///
    /// Fails with `OutOfSpace` when the record plus its slot entry does
    /// not fit between the bounds; the caller is expected to allocate a
    /// new page and retry there. The page is never resized.
    pub fn write(&mut self, data: &[u8]) -> PageResult<u16> {
        self.verify_signature()?;

        let slot_count = self.read_u16(SLOT_COUNT_OFF);
        let lower = self.read_u16(LOWER_BOUND_OFF) as usize;
        let upper = self.read_u16(UPPER_BOUND_OFF) as usize;

        let required = SLOT_SIZE + data.len();
        let free = upper - lower;
        if required > free {
            return Err(PageError::OutOfSpace { required, free });
        }

        let new_upper = upper - data.len();
        self.buf[new_upper..upper].copy_from_slice(data);

        let slot_pos = HEADER_SIZE + slot_count as usize * SLOT_SIZE;
        self.write_u16(slot_pos, new_upper as u16);
        self.write_u16(slot_pos + 2, data.len() as u16);

        self.write_u16(SLOT_COUNT_OFF, slot_count + 1);
        self.write_u16(LOWER_BOUND_OFF, (lower + SLOT_SIZE) as u16);
        self.write_u16(UPPER_BOUND_OFF, new_upper as u16);

        Ok(slot_count)
    }

    /// Read the record stored in the given slot
    pub fn read(&self, slot: u16) -> PageResult<Vec<u8>> {
        self.verify_signature()?;

        let slot_count = self.read_u16(SLOT_COUNT_OFF);
        if slot >= slot_count {
            return Err(PageError::SlotOutOfRange { slot, slot_count });
        }

        let slot_pos = HEADER_SIZE + slot as usize * SLOT_SIZE;
        let offset = self.read_u16(slot_pos);
        let length = self.read_u16(slot_pos + 2);

        let upper = self.read_u16(UPPER_BOUND_OFF);
        let end = offset as usize + length as usize;
        if end > PAGE_SIZE || offset < upper {
            return Err(PageError::CorruptSlot {
                offset,
                length,
                upper,
            });
        }

        Ok(self.buf[offset as usize..end].to_vec())
    }

    fn verify_signature(&self) -> PageResult<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(PageError::BadSignature)
        }
    }

    fn read_u16(&self, pos: usize) -> u16 {
        u16::from_be_bytes([self.buf[pos], self.buf[pos + 1]])
    }

    fn read_u32(&self, pos: usize) -> u32 {
        u32::from_be_bytes([
            self.buf[pos],
            self.buf[pos + 1],
            self.buf[pos + 2],
            self.buf[pos + 3],
        ])
    }

    fn write_u16(&mut self, pos: usize, value: u16) {
        self.buf[pos..pos + 2].copy_from_slice(&value.to_be_bytes());
    }

    fn write_u32(&mut self, pos: usize, value: u32) {
        self.buf[pos..pos + 4].copy_from_slice(&value.to_be_bytes());
    }
}
