//! Bounds-checked access to guest linear memory.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("guest memory access out of bounds: {len} bytes at {offset:#x} (memory is {size} bytes)")]
pub struct MemoryError {
    pub offset: u64,
    pub len: u64,
    pub size: usize,
}

/// Byte-addressable window into a guest's linear memory.
///
/// Implementors only provide span access; the fixed-width little-endian
/// helpers the guest ABI needs are built on top.
pub trait GuestMemory {
    fn size(&self) -> usize;

    fn span(&self, offset: u64, len: u64) -> Result<&[u8], MemoryError>;

    fn span_mut(&mut self, offset: u64, len: u64) -> Result<&mut [u8], MemoryError>;

    fn read_array<const N: usize>(&self, addr: u64) -> Result<[u8; N], MemoryError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.span(addr, N as u64)?);
        Ok(out)
    }

    fn write_bytes(&mut self, addr: u64, bytes: &[u8]) -> Result<(), MemoryError> {
        self.span_mut(addr, bytes.len() as u64)?.copy_from_slice(bytes);
        Ok(())
    }

    fn read_u32(&self, addr: u64) -> Result<u32, MemoryError> {
        Ok(u32::from_le_bytes(self.read_array(addr)?))
    }

    fn read_i32(&self, addr: u64) -> Result<i32, MemoryError> {
        Ok(self.read_u32(addr)? as i32)
    }

    fn read_u64(&self, addr: u64) -> Result<u64, MemoryError> {
        Ok(u64::from_le_bytes(self.read_array(addr)?))
    }

    fn read_i64(&self, addr: u64) -> Result<i64, MemoryError> {
        Ok(self.read_u64(addr)? as i64)
    }

    fn write_u8(&mut self, addr: u64, val: u8) -> Result<(), MemoryError> {
        self.write_bytes(addr, &[val])
    }

    fn write_u32(&mut self, addr: u64, val: u32) -> Result<(), MemoryError> {
        self.write_bytes(addr, &val.to_le_bytes())
    }

    fn write_i32(&mut self, addr: u64, val: i32) -> Result<(), MemoryError> {
        self.write_u32(addr, val as u32)
    }

    fn write_u64(&mut self, addr: u64, val: u64) -> Result<(), MemoryError> {
        self.write_bytes(addr, &val.to_le_bytes())
    }

    fn write_i64(&mut self, addr: u64, val: i64) -> Result<(), MemoryError> {
        self.write_u64(addr, val as u64)
    }

    /// Span described by a `(ptr: i64, len: i64)` pair stored at `addr`.
    fn slice(&self, addr: u64) -> Result<&[u8], MemoryError> {
        let (ptr, len) = self.slice_header(addr)?;
        self.span(ptr, len)
    }

    fn slice_mut(&mut self, addr: u64) -> Result<&mut [u8], MemoryError> {
        let (ptr, len) = self.slice_header(addr)?;
        self.span_mut(ptr, len)
    }

    fn slice_header(&self, addr: u64) -> Result<(u64, u64), MemoryError> {
        Ok((self.read_u64(addr)?, self.read_u64(addr + 8)?))
    }
}

fn checked_range(offset: u64, len: u64, size: usize) -> Result<std::ops::Range<usize>, MemoryError> {
    let err = || MemoryError { offset, len, size };
    let end = offset.checked_add(len).ok_or_else(err)?;
    if end > size as u64 {
        return Err(err());
    }
    Ok(offset as usize..end as usize)
}

impl GuestMemory for [u8] {
    fn size(&self) -> usize {
        self.len()
    }

    fn span(&self, offset: u64, len: u64) -> Result<&[u8], MemoryError> {
        let range = checked_range(offset, len, self.len())?;
        Ok(&self[range])
    }

    fn span_mut(&mut self, offset: u64, len: u64) -> Result<&mut [u8], MemoryError> {
        let range = checked_range(offset, len, self.len())?;
        Ok(&mut self[range])
    }
}

impl GuestMemory for Vec<u8> {
    fn size(&self) -> usize {
        self.len()
    }

    fn span(&self, offset: u64, len: u64) -> Result<&[u8], MemoryError> {
        self.as_slice().span(offset, len)
    }

    fn span_mut(&mut self, offset: u64, len: u64) -> Result<&mut [u8], MemoryError> {
        self.as_mut_slice().span_mut(offset, len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_little_endian_helpers() {
        let mut mem = vec![0u8; 32];
        mem.write_u64(8, 0x0102_0304_0506_0708).unwrap();
        assert_eq!(&mem[8..16], &[8, 7, 6, 5, 4, 3, 2, 1]);
        assert_eq!(mem.read_u32(8).unwrap(), 0x0506_0708);
        mem.write_i32(0, -2).unwrap();
        assert_eq!(mem.read_i32(0).unwrap(), -2);
    }

    #[test]
    fn test_span_bounds() {
        let mem = vec![0u8; 16];
        assert!(mem.span(8, 8).is_ok());
        assert!(mem.span(16, 0).is_ok());
        let err = mem.span(9, 8).unwrap_err();
        assert_eq!(err, MemoryError { offset: 9, len: 8, size: 16 });
        assert!(mem.span(u64::MAX, 2).is_err());
    }

    #[test]
    fn test_slice_header() {
        let mut mem = vec![0u8; 64];
        mem.write_u64(0, 32).unwrap();
        mem.write_u64(8, 3).unwrap();
        mem.write_bytes(32, b"abc").unwrap();
        assert_eq!(mem.slice(0).unwrap(), b"abc");
        // negative length reinterprets as a huge span
        mem.write_i64(8, -1).unwrap();
        assert!(mem.slice(0).is_err());
    }
}
