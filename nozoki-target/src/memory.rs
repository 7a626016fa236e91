//! 稼働中プロセスへのメモリアクセス

use crate::Result;
use nix::errno::Errno;
use nix::unistd::Pid;
use nozoki_core::{MemoryAccessResult, MemoryAccessor};
use std::fs::File;
use std::io::{Read as _, Seek, SeekFrom};
use tracing::{debug, trace};

/// メモリマッピング情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryMapping {
    pub start: u64,
    pub end: u64,
    pub readable: bool,
    pub writable: bool,
    pub executable: bool,
    pub path: Option<String>,
}

impl MemoryMapping {
    pub fn contains(&self, address: u64) -> bool {
        address >= self.start && address < self.end
    }
}

/// /proc/pid/maps の内容を解析する
///
/// フォーマット: "address perms offset dev inode pathname"
/// 例: "7f1234567000-7f1234568000 r-xp 00000000 08:01 123456 /lib/libc.so"
pub fn parse_maps(content: &str) -> Result<Vec<MemoryMapping>> {
    let mut mappings = Vec::new();

    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 2 {
            continue;
        }

        let Some((start, end)) = parts[0].split_once('-') else {
            continue;
        };
        let start = u64::from_str_radix(start, 16)
            .map_err(|e| anyhow::anyhow!("Failed to parse start address '{}': {}", start, e))?;
        let end = u64::from_str_radix(end, 16)
            .map_err(|e| anyhow::anyhow!("Failed to parse end address '{}': {}", end, e))?;

        let perms = parts[1].as_bytes();
        mappings.push(MemoryMapping {
            start,
            end,
            readable: perms.first() == Some(&b'r'),
            writable: perms.get(1) == Some(&b'w'),
            executable: perms.get(2) == Some(&b'x'),
            path: (parts.len() > 5).then(|| parts[5..].join(" ")),
        });
    }

    Ok(mappings)
}

/// プロセスのメモリアクセス
///
/// 読み取りに失敗した場合は /proc/pid/maps を見て失敗を分類します。
#[derive(Debug, Clone)]
pub struct ProcessMemory {
    pid: Pid,
}

impl ProcessMemory {
    /// メモリアクセスを作成する
    pub fn new(pid: i32) -> Self {
        Self {
            pid: Pid::from_raw(pid),
        }
    }

    pub fn pid(&self) -> i32 {
        self.pid.as_raw()
    }

    /// /proc/pid/mem のパスを取得する
    fn mem_path(&self) -> String {
        format!("/proc/{}/mem", self.pid)
    }

    /// /proc/pid/maps を解析してメモリマッピング情報を取得する
    pub fn mappings(&self) -> Result<Vec<MemoryMapping>> {
        let maps_path = format!("/proc/{}/maps", self.pid);
        let content = std::fs::read_to_string(&maps_path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", maps_path, e))?;
        parse_maps(&content)
    }

    /// /proc/pid/mem経由で読めるだけ読み取り、読み取ったバイト数を返す
    ///
    /// 1バイトも読めずに失敗した場合だけエラーになります。
    fn read_via_proc_mem(&self, address: u64, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut file = File::open(self.mem_path())?;
        file.seek(SeekFrom::Start(address))?;

        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) if filled == 0 => return Err(e),
                Err(_) => break,
            }
        }
        Ok(filled)
    }

    /// PTRACE_PEEKDATAを使用してメモリから読めるだけ読み取る
    ///
    /// /proc/pid/memが使用できない場合のフォールバック。
    /// アタッチして停止しているプロセスでのみ成功します。
    fn read_via_ptrace(&self, address: u64, buf: &mut [u8]) -> usize {
        use nix::sys::ptrace;

        let word_size = std::mem::size_of::<std::ffi::c_long>();
        let mut filled = 0;

        // word単位で読み取り
        while filled < buf.len() {
            let word_addr = address.wrapping_add(filled as u64) as *mut std::ffi::c_void;
            let word = match ptrace::read(self.pid, word_addr) {
                Ok(word) => word,
                Err(e) => {
                    trace!("ptrace read at {:p} failed: {}", word_addr, e);
                    break;
                }
            };

            let bytes = word.to_ne_bytes();
            let copy_size = (buf.len() - filled).min(word_size);
            buf[filled..filled + copy_size].copy_from_slice(&bytes[..copy_size]);
            filled += copy_size;
        }
        filled
    }

    /// 読み取り失敗をマッピング情報から分類する
    fn classify_failure(&self, address: u64, read: usize) -> MemoryAccessResult {
        let mappings = match self.mappings() {
            Ok(mappings) => mappings,
            Err(e) => {
                debug!("Cannot classify read at 0x{:x}: {}", address, e);
                return MemoryAccessResult::AddressValidButInaccessible;
            }
        };

        match mappings.iter().find(|m| m.contains(address)) {
            None => MemoryAccessResult::AddressNotValid,
            Some(mapping) if !mapping.readable => MemoryAccessResult::AddressValidButInaccessible,
            Some(_) if read > 0 => MemoryAccessResult::Partial { read },
            Some(_) => MemoryAccessResult::AddressValidButInaccessible,
        }
    }
}

impl MemoryAccessor for ProcessMemory {
    fn read(&self, address: u64, buf: &mut [u8]) -> MemoryAccessResult {
        if buf.is_empty() {
            return MemoryAccessResult::Ok;
        }

        let read = match self.read_via_proc_mem(address, buf) {
            Ok(read) => read,
            Err(e) if e.raw_os_error() == Some(Errno::EIO as i32) => {
                // EIOエラー（未マッピング領域）の場合、ptraceにフォールバック
                debug!("/proc/{}/mem failed at 0x{:x}, falling back to ptrace", self.pid, address);
                self.read_via_ptrace(address, buf)
            }
            Err(e) => {
                debug!("Failed to read 0x{:x} from pid {}: {}", address, self.pid, e);
                0
            }
        };

        if read == buf.len() {
            return MemoryAccessResult::Ok;
        }

        let result = self.classify_failure(address, read);
        trace!(
            "Read of {} bytes at 0x{:x}: {}",
            buf.len(),
            address,
            result
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAPS: &str = "\
55d0c0a00000-55d0c0a21000 r--p 00000000 08:01 1234 /usr/bin/node
55d0c0a21000-55d0c0b00000 r-xp 00021000 08:01 1234 /usr/bin/node
7f00aa000000-7f00aa100000 ---p 00000000 00:00 0
7ffc1c000000-7ffc1c021000 rw-p 00000000 00:00 0 [stack]
";

    #[test]
    fn test_parse_maps() {
        let mappings = parse_maps(MAPS).unwrap();
        assert_eq!(mappings.len(), 4);

        assert_eq!(mappings[0].start, 0x55d0_c0a0_0000);
        assert_eq!(mappings[0].end, 0x55d0_c0a2_1000);
        assert!(mappings[0].readable && !mappings[0].writable);
        assert_eq!(mappings[0].path.as_deref(), Some("/usr/bin/node"));

        assert!(mappings[1].executable);
        assert!(!mappings[2].readable);
        assert_eq!(mappings[2].path, None);
        assert_eq!(mappings[3].path.as_deref(), Some("[stack]"));
        assert!(mappings[3].contains(0x7ffc_1c00_0010));
        assert!(!mappings[3].contains(0x7ffc_1c02_1000));
    }

    #[test]
    fn test_parse_maps_invalid() {
        assert!(parse_maps("zzzz-1000 r--p 0 0:0 0").is_err());
        assert!(parse_maps("\n\n").unwrap().is_empty());
    }

    #[test]
    fn test_read_own_memory() {
        let memory = ProcessMemory::new(std::process::id() as i32);
        let value: u64 = 0x1122_3344_5566_7788;

        let mut buf = [0u8; 8];
        let address = &value as *const u64 as u64;
        assert_eq!(memory.read(address, &mut buf), MemoryAccessResult::Ok);
        assert_eq!(u64::from_le_bytes(buf), value);
    }

    #[test]
    fn test_read_unmapped_memory() {
        let memory = ProcessMemory::new(std::process::id() as i32);
        let mut buf = [0u8; 8];
        assert_eq!(memory.read(0x10, &mut buf), MemoryAccessResult::AddressNotValid);
    }
}
