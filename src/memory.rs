//! Memory seam between the renderer and the host machine.
//!
//! The renderer never owns RAM. The ULA, LoRes and tilemap units read from
//! the 16 KiB screen bank (bank 5, or bank 7 when shadow-selected by the
//! host); Layer 2 reads from flat physical SRAM addresses. Both go through
//! this trait so the renderer stays independent of the host's banking logic.

/// Read-only view of machine memory as the video hardware sees it.
pub trait VideoMemory {
    /// Reads a byte from the active 16 KiB screen bank. `offset` is masked
    /// to 14 bits by callers.
    fn read_screen(&self, offset: u16) -> u8;

    /// Reads a byte from flat physical memory (Layer 2 banks live at
    /// 0x04_0000 and up). Out-of-range addresses read as 0.
    fn read_physical(&self, addr: u32) -> u8;
}

/// Flat vector-backed memory, used by tests and simple hosts.
pub struct FlatMemory {
    /// Screen bank contents (16 KiB).
    pub screen: Vec<u8>,
    /// Physical SRAM image; index 0 is physical address 0.
    pub physical: Vec<u8>,
}

impl FlatMemory {
    pub fn new(physical_size: usize) -> Self {
        Self {
            screen: vec![0; 0x4000],
            physical: vec![0; physical_size],
        }
    }
}

impl VideoMemory for FlatMemory {
    fn read_screen(&self, offset: u16) -> u8 {
        self.screen[(offset & 0x3fff) as usize]
    }

    fn read_physical(&self, addr: u32) -> u8 {
        self.physical.get(addr as usize).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screen_offset_wraps_to_14_bits() {
        let mut mem = FlatMemory::new(0);
        mem.screen[0x1234] = 0xa5;
        assert_eq!(mem.read_screen(0x1234), 0xa5);
        assert_eq!(mem.read_screen(0x5234), 0xa5);
    }

    #[test]
    fn test_physical_out_of_range_reads_zero() {
        let mem = FlatMemory::new(0x1000);
        assert_eq!(mem.read_physical(0x0fff), 0);
        assert_eq!(mem.read_physical(0x10_0000), 0);
    }
}
