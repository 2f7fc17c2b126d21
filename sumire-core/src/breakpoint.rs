//! ブレークポイント管理

use crate::{DebugError, Result};
use std::collections::HashMap;
use sumire_dwarf::DebugInfoResolver;
use sumire_target::{Memory, SoftwareBreakpoint};
use tracing::debug;

/// ブレークポイントマネージャ
///
/// 設置済みブレークポイントのテーブルをアドレスをキーとして排他的に
/// 所有します。1アドレスにつき高々1レコード。追跡中のアドレスの
/// メモリを書き換えてよいのはこのコンポーネントだけです。
pub struct BreakpointManager {
    table: HashMap<u64, SoftwareBreakpoint>,
}

impl BreakpointManager {
    /// 新しいブレークポイントマネージャを作成する
    pub fn new() -> Self {
        Self {
            table: HashMap::new(),
        }
    }

    /// アドレスにブレークポイントを設定して有効化する
    ///
    /// 同じアドレスにレコードが既にあればBreakpointConflictを返します。
    /// 有効化が失敗した場合、テーブルは変更されません。
    pub fn set_at_address(&mut self, addr: u64, memory: &Memory) -> Result<()> {
        if self.table.contains_key(&addr) {
            return Err(DebugError::BreakpointConflict(addr));
        }

        let mut bp = SoftwareBreakpoint::new(addr);
        bp.enable(memory)?;
        self.table.insert(addr, bp);
        debug!("breakpoint set at {:#x}", addr);
        Ok(())
    }

    /// 関数のエントリ（プロローグ直後）にブレークポイントを設定する
    pub fn set_at_function(
        &mut self,
        name: &str,
        resolver: &DebugInfoResolver,
        memory: &Memory,
    ) -> Result<u64> {
        let addr = resolver
            .function_entry_address(name)
            .ok_or_else(|| DebugError::SymbolNotFound(name.to_string()))?;
        self.set_at_address(addr, memory)?;
        Ok(addr)
    }

    /// ソース位置にブレークポイントを設定する
    ///
    /// (file, line) にマッチする最初の文開始アドレスに設定します。
    pub fn set_at_line(
        &mut self,
        file: &str,
        line: u64,
        resolver: &DebugInfoResolver,
        memory: &Memory,
    ) -> Result<u64> {
        let addr = resolver
            .line_to_address(file, line)
            .ok_or_else(|| DebugError::LineNotFound {
                file: file.to_string(),
                line,
            })?;
        self.set_at_address(addr, memory)?;
        Ok(addr)
    }

    /// ブレークポイントを有効化する
    ///
    /// 既に有効、またはレコードが存在しない場合は何もしません。
    pub fn enable(&mut self, addr: u64, memory: &Memory) -> Result<()> {
        if let Some(bp) = self.table.get_mut(&addr) {
            bp.enable(memory)?;
        }
        Ok(())
    }

    /// ブレークポイントを無効化する
    ///
    /// レコードは保持されます。既に無効、または存在しない場合は
    /// 何もしません。
    pub fn disable(&mut self, addr: u64, memory: &Memory) -> Result<()> {
        if let Some(bp) = self.table.get_mut(&addr) {
            bp.disable(memory)?;
        }
        Ok(())
    }

    /// ブレークポイントを削除する
    ///
    /// 有効なら無効化してからレコードを消します。存在しないアドレスは
    /// no-opです。無効化が失敗した場合レコードは残ります。
    pub fn remove(&mut self, addr: u64, memory: &Memory) -> Result<()> {
        if let Some(bp) = self.table.get_mut(&addr) {
            bp.disable(memory)?;
            self.table.remove(&addr);
            debug!("breakpoint removed at {:#x}", addr);
        }
        Ok(())
    }

    /// アドレスのブレークポイントを参照する
    pub fn lookup(&self, addr: u64) -> Option<&SoftwareBreakpoint> {
        self.table.get(&addr)
    }

    /// アドレスに有効なブレークポイントがあるかどうか
    pub fn is_enabled_at(&self, addr: u64) -> bool {
        self.table.get(&addr).is_some_and(|bp| bp.is_enabled())
    }

    /// 設置済みブレークポイントの数
    pub fn count(&self) -> usize {
        self.table.len()
    }
}

impl Default for BreakpointManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_table_lookups() {
        let manager = BreakpointManager::new();
        assert!(manager.lookup(0x1000).is_none());
        assert!(!manager.is_enabled_at(0x1000));
        assert_eq!(manager.count(), 0);
    }

    #[test]
    fn test_remove_unknown_address_is_noop() {
        // 存在しないアドレスのremove/enable/disableはメモリに触れない
        let mut manager = BreakpointManager::new();
        let memory = Memory::new(0);
        assert!(manager.remove(0x1000, &memory).is_ok());
        assert!(manager.enable(0x1000, &memory).is_ok());
        assert!(manager.disable(0x1000, &memory).is_ok());
    }
}
