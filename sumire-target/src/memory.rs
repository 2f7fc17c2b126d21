//! メモリアクセス機能

use crate::{Result, TargetError};
use nix::errno::Errno;
use nix::sys::ptrace;
use nix::unistd::Pid;
use std::fs::File;
use std::io::{BufRead, BufReader};

/// メモリマッピング情報
#[derive(Debug, Clone)]
pub struct MemoryMapping {
    pub start: u64,
    pub end: u64,
    pub readable: bool,
    pub writable: bool,
    pub executable: bool,
}

/// ターゲットプロセスのメモリアクセス
///
/// PTRACE_PEEKDATA/POKEDATAによるワード粒度のアクセスを提供します。
/// ワードの一部だけを書き換える書き込みは、隣接バイトを壊さないよう
/// read-modify-writeで行います。
pub struct Memory {
    pid: Pid,
}

/// ワードサイズ（バイト数）
const WORD_SIZE: usize = std::mem::size_of::<u64>();

impl Memory {
    /// メモリアクセスを作成する
    pub fn new(pid: i32) -> Self {
        Self {
            pid: Pid::from_raw(pid),
        }
    }

    /// 1ワードを読み取る
    pub fn read_word(&self, addr: u64) -> Result<u64> {
        let word = ptrace::read(self.pid, addr as ptrace::AddressType)
            .map_err(|e| TargetError::MemoryAccess { addr, source: e })?;
        Ok(word as u64)
    }

    /// 1ワードを書き込む
    pub fn write_word(&self, addr: u64, value: u64) -> Result<()> {
        ptrace::write(self.pid, addr as ptrace::AddressType, value as i64)
            .map_err(|e| TargetError::MemoryAccess { addr, source: e })?;
        Ok(())
    }

    /// メモリからデータを読み取る
    ///
    /// ワード単位で読み取り、要求されたバイト数に切り詰めます。
    pub fn read(&self, addr: u64, len: usize) -> Result<Vec<u8>> {
        let mut data = Vec::with_capacity(len);

        for offset in (0..len).step_by(WORD_SIZE) {
            let word = self.read_word(addr + offset as u64)?;
            let bytes = word.to_le_bytes();
            let remaining = len - offset;
            data.extend_from_slice(&bytes[..remaining.min(WORD_SIZE)]);
        }

        data.truncate(len);
        Ok(data)
    }

    /// メモリにデータを書き込む
    ///
    /// 末尾の半端なワードは既存のワードを読み取ってマージしてから
    /// 書き戻します。
    pub fn write(&self, addr: u64, data: &[u8]) -> Result<()> {
        let mut written = 0;

        while written < data.len() {
            let word_addr = addr + written as u64;
            let remaining = data.len() - written;

            let word = if remaining >= WORD_SIZE {
                u64::from_le_bytes(data[written..written + WORD_SIZE].try_into().unwrap())
            } else {
                // 部分ワード: 既存バイトを保持するためread-modify-write
                let current = self.read_word(word_addr)?;
                let mut buf = current.to_le_bytes();
                buf[..remaining].copy_from_slice(&data[written..]);
                u64::from_le_bytes(buf)
            };

            self.write_word(word_addr, word)?;
            written += WORD_SIZE;
        }

        Ok(())
    }

    /// /proc/pid/maps を解析してメモリマッピング情報を取得する
    pub fn mappings(&self) -> Result<Vec<MemoryMapping>> {
        let maps_path = format!("/proc/{}/maps", self.pid);
        let file = File::open(&maps_path).map_err(io_errno)?;
        let reader = BufReader::new(file);

        let mut mappings = Vec::new();

        for line in reader.lines() {
            let line = line.map_err(io_errno)?;
            // フォーマット: "start-end perms offset dev inode pathname"
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 2 {
                continue;
            }

            let addr_parts: Vec<&str> = parts[0].split('-').collect();
            if addr_parts.len() != 2 {
                continue;
            }
            let (Ok(start), Ok(end)) = (
                u64::from_str_radix(addr_parts[0], 16),
                u64::from_str_radix(addr_parts[1], 16),
            ) else {
                continue;
            };

            let perms = parts[1];
            mappings.push(MemoryMapping {
                start,
                end,
                readable: perms.starts_with('r'),
                writable: perms.chars().nth(1) == Some('w'),
                executable: perms.chars().nth(2) == Some('x'),
            });
        }

        Ok(mappings)
    }

    /// 指定されたアドレスが有効なメモリマッピング内にあるかチェックする
    pub fn is_mapped(&self, addr: u64) -> Result<bool> {
        let mappings = self.mappings()?;
        Ok(mappings.iter().any(|m| addr >= m.start && addr < m.end))
    }
}

fn io_errno(e: std::io::Error) -> TargetError {
    TargetError::Process(Errno::from_raw(e.raw_os_error().unwrap_or(nix::libc::EIO)))
}
