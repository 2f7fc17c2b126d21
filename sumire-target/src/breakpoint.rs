//! ソフトウェアブレークポイントのパッチ適用

use crate::{Memory, Result};

/// INT3命令のオペコード
pub const TRAP_OPCODE: u8 = 0xCC;

/// トラップ命令の幅（バイト数）
///
/// ブレークポイントヒット時、PCはこの幅だけ巻き戻されます。
pub const TRAP_INSTRUCTION_LEN: u64 = 1;

/// ソフトウェアブレークポイント（INT3命令）
///
/// 有効な間、addressのメモリ低位バイトはトラップオペコードで、
/// 元のバイトはこのレコードに保存されています。無効化すると
/// 元のバイトが正確に復元されます。
#[derive(Debug, Clone)]
pub struct SoftwareBreakpoint {
    address: u64,
    original_byte: u8,
    enabled: bool,
}

impl SoftwareBreakpoint {
    /// 無効状態のブレークポイントを作成する
    pub fn new(address: u64) -> Self {
        Self {
            address,
            original_byte: 0,
            enabled: false,
        }
    }

    /// ブレークポイントのアドレスを取得する
    pub fn address(&self) -> u64 {
        self.address
    }

    /// ブレークポイントが有効かどうか
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// 保存されている元のバイトを取得する
    pub fn original_byte(&self) -> u8 {
        self.original_byte
    }

    /// ブレークポイントを有効化する
    ///
    /// アドレスのワードを読み取って低位バイトを保存し、低位バイトだけを
    /// INT3に置き換えたワードを書き戻します。既に有効なら何もしません。
    /// 書き込みが失敗した場合、レコードは変更されません。
    pub fn enable(&mut self, memory: &Memory) -> Result<()> {
        if self.enabled {
            return Ok(());
        }

        let word = memory.read_word(self.address)?;
        let saved = (word & 0xff) as u8;
        let patched = (word & !0xffu64) | u64::from(TRAP_OPCODE);
        memory.write_word(self.address, patched)?;

        self.original_byte = saved;
        self.enabled = true;
        Ok(())
    }

    /// ブレークポイントを無効化する
    ///
    /// 現在のワードを読み取り、保存していた元のバイトを低位に戻して
    /// 書き込みます。既に無効なら何もしません。
    pub fn disable(&mut self, memory: &Memory) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let word = memory.read_word(self.address)?;
        let restored = (word & !0xffu64) | u64::from(self.original_byte);
        memory.write_word(self.address, restored)?;

        self.enabled = false;
        Ok(())
    }
}
