//! メモリスナップショット
//!
//! コアダンプなど、プロセス外に保存されたメモリイメージへのアクセスです。
//! 領域ごとに読み取り可否を持ち、移動済みオブジェクトの転送先も記録できます。

use crate::access::{MemoryAccessResult, MemoryAccessor};
use std::collections::{BTreeMap, HashMap};

/// スナップショット内の領域
#[derive(Debug, Clone)]
struct Region {
    bytes: Vec<u8>,
    readable: bool,
}

impl Region {
    fn end(&self, base: u64) -> u64 {
        base.saturating_add(self.bytes.len() as u64)
    }
}

/// メモリスナップショット
#[derive(Debug, Clone, Default)]
pub struct SnapshotMemory {
    regions: BTreeMap<u64, Region>,
    forwards: HashMap<u64, u64>,
}

impl SnapshotMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 読み取り可能な領域を追加する
    pub fn add_region(&mut self, base: u64, bytes: Vec<u8>) {
        self.regions.insert(
            base,
            Region {
                bytes,
                readable: true,
            },
        );
    }

    /// マッピングはされているが読み取れない領域を追加する
    pub fn add_inaccessible(&mut self, base: u64, len: usize) {
        self.regions.insert(
            base,
            Region {
                bytes: vec![0u8; len],
                readable: false,
            },
        );
    }

    /// `from` の読み取りを `to` へ転送する
    pub fn add_forward(&mut self, from: u64, to: u64) {
        self.forwards.insert(from, to);
    }

    /// 既存の領域内にバイト列を書き込む。どの領域にも収まらなければ新しい領域を作る
    pub fn write_bytes(&mut self, address: u64, data: &[u8]) {
        if let Some((&base, region)) = self.regions.range_mut(..=address).next_back() {
            let offset = (address - base) as usize;
            if offset + data.len() <= region.bytes.len() {
                region.bytes[offset..offset + data.len()].copy_from_slice(data);
                return;
            }
        }
        self.add_region(address, data.to_vec());
    }

    pub fn write_u16(&mut self, address: u64, value: u16) {
        self.write_bytes(address, &value.to_le_bytes());
    }

    pub fn write_u32(&mut self, address: u64, value: u32) {
        self.write_bytes(address, &value.to_le_bytes());
    }

    pub fn write_u64(&mut self, address: u64, value: u64) {
        self.write_bytes(address, &value.to_le_bytes());
    }

    /// 領域の数
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }
}

impl MemoryAccessor for SnapshotMemory {
    fn read(&self, address: u64, buf: &mut [u8]) -> MemoryAccessResult {
        if let Some(&to) = self.forwards.get(&address) {
            return MemoryAccessResult::Moved { to };
        }

        let Some((&base, region)) = self.regions.range(..=address).next_back() else {
            return MemoryAccessResult::AddressNotValid;
        };
        if address >= region.end(base) {
            return MemoryAccessResult::AddressNotValid;
        }
        if !region.readable {
            return MemoryAccessResult::AddressValidButInaccessible;
        }

        let offset = (address - base) as usize;
        let available = region.bytes.len() - offset;
        if available < buf.len() {
            buf[..available].copy_from_slice(&region.bytes[offset..]);
            return MemoryAccessResult::Partial { read: available };
        }

        buf.copy_from_slice(&region.bytes[offset..offset + buf.len()]);
        MemoryAccessResult::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_within_region() {
        let mut memory = SnapshotMemory::new();
        memory.add_region(0x1000, vec![1, 2, 3, 4, 5]);

        let mut buf = [0u8; 2];
        assert_eq!(memory.read(0x1002, &mut buf), MemoryAccessResult::Ok);
        assert_eq!(buf, [3, 4]);
    }

    #[test]
    fn test_read_classification() {
        let mut memory = SnapshotMemory::new();
        memory.add_region(0x1000, vec![0xaa; 4]);
        memory.add_inaccessible(0x2000, 0x10);
        memory.add_forward(0x3000, 0x1000);

        let mut buf = [0u8; 8];
        assert_eq!(memory.read(0x500, &mut buf), MemoryAccessResult::AddressNotValid);
        assert_eq!(memory.read(0x1004, &mut buf), MemoryAccessResult::AddressNotValid);
        assert_eq!(
            memory.read(0x2008, &mut buf),
            MemoryAccessResult::AddressValidButInaccessible
        );
        assert_eq!(
            memory.read(0x3000, &mut buf),
            MemoryAccessResult::Moved { to: 0x1000 }
        );
        assert_eq!(
            memory.read(0x1000, &mut buf),
            MemoryAccessResult::Partial { read: 4 }
        );
        assert_eq!(&buf[..4], &[0xaa; 4]);
    }

    #[test]
    fn test_write_patches_existing_region() {
        let mut memory = SnapshotMemory::new();
        memory.add_region(0x1000, vec![0u8; 0x10]);
        memory.write_u32(0x1004, 0xdead_beef);
        memory.write_u16(0x5000, 7);

        assert_eq!(memory.region_count(), 2);
        let mut buf = [0u8; 4];
        assert_eq!(memory.read(0x1004, &mut buf), MemoryAccessResult::Ok);
        assert_eq!(u32::from_le_bytes(buf), 0xdead_beef);
    }
}
