//! デバッガ本体

use crate::breakpoint::BreakpointManager;
use crate::events::StopEvent;
use crate::{DebugError, Result};
use std::path::Path;
use sumire_dwarf::DebugInfoResolver;
use sumire_target::{Memory, Process, ProcessState, RegisterSnapshot, Registers};
use tracing::info;

/// デバッガ
///
/// トレーシーのハンドル、メモリ・レジスタアクセス、デバッグ情報
/// リゾルバ、ブレークポイントテーブルを所有します。リゾルバは起動時に
/// 一度だけ構築され、以後読み取り専用です。
pub struct Debugger {
    pub(crate) process: Process,
    pub(crate) memory: Memory,
    pub(crate) registers: Registers,
    pub(crate) resolver: DebugInfoResolver,
    pub(crate) breakpoints: BreakpointManager,
    pub(crate) exit_code: Option<i32>,
}

impl Debugger {
    /// 実行可能ファイルを起動してデバッガを構築する
    ///
    /// デバッグ情報を読み込んでからプロセスを起動します。プロセスは
    /// 最初の命令で停止した状態で返ります。
    pub fn launch<P: AsRef<Path>>(program: P, args: &[String]) -> Result<Self> {
        let resolver = DebugInfoResolver::load(&program)
            .map_err(|e| DebugError::DebugInfo(e.to_string()))?;
        let process = Process::launch(&program, args)?;
        let pid = process.pid();
        info!(pid, "tracee launched");

        Ok(Self {
            process,
            memory: Memory::new(pid),
            registers: Registers::new(pid),
            resolver,
            breakpoints: BreakpointManager::new(),
            exit_code: None,
        })
    }

    /// 既存プロセスにアタッチしてデバッガを構築する
    ///
    /// デバッグ情報はバイナリのパスから読み込みます。
    pub fn attach<P: AsRef<Path>>(program: P, pid: i32) -> Result<Self> {
        let resolver = DebugInfoResolver::load(&program)
            .map_err(|e| DebugError::DebugInfo(e.to_string()))?;
        let process = Process::attach(pid)?;
        info!(pid, "attached to tracee");

        Ok(Self {
            process,
            memory: Memory::new(pid),
            registers: Registers::new(pid),
            resolver,
            breakpoints: BreakpointManager::new(),
            exit_code: None,
        })
    }

    /// プロセスIDを取得する
    pub fn pid(&self) -> i32 {
        self.process.pid()
    }

    /// トレーシーのライフサイクル状態を取得する
    pub fn state(&self) -> ProcessState {
        self.process.state()
    }

    /// 観測済みの終了コードを取得する
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// 終了済みならその終了イベントを返す
    pub(crate) fn exited_event(&self) -> Option<StopEvent> {
        self.exit_code.map(|code| StopEvent::Exited { code })
    }

    /// デバッグ情報リゾルバへの参照を取得する
    pub fn resolver(&self) -> &DebugInfoResolver {
        &self.resolver
    }

    /// ブレークポイントテーブルへの参照を取得する
    pub fn breakpoints(&self) -> &BreakpointManager {
        &self.breakpoints
    }

    /// アドレスにブレークポイントを設定する
    pub fn set_breakpoint_at_address(&mut self, addr: u64) -> Result<()> {
        self.breakpoints.set_at_address(addr, &self.memory)
    }

    /// 関数のエントリにブレークポイントを設定し、選ばれたアドレスを返す
    pub fn set_breakpoint_at_function(&mut self, name: &str) -> Result<u64> {
        self.breakpoints
            .set_at_function(name, &self.resolver, &self.memory)
    }

    /// ソース位置にブレークポイントを設定し、選ばれたアドレスを返す
    pub fn set_breakpoint_at_line(&mut self, file: &str, line: u64) -> Result<u64> {
        self.breakpoints
            .set_at_line(file, line, &self.resolver, &self.memory)
    }

    /// ブレークポイントを削除する
    pub fn remove_breakpoint(&mut self, addr: u64) -> Result<()> {
        self.breakpoints.remove(addr, &self.memory)
    }

    /// メモリからデータを読み取る
    pub fn read_memory(&self, addr: u64, len: usize) -> Result<Vec<u8>> {
        Ok(self.memory.read(addr, len)?)
    }

    /// メモリにデータを書き込む
    pub fn write_memory(&self, addr: u64, data: &[u8]) -> Result<()> {
        Ok(self.memory.write(addr, data)?)
    }

    /// メモリから1ワードを読み取る
    pub fn read_memory_word(&self, addr: u64) -> Result<u64> {
        Ok(self.memory.read_word(addr)?)
    }

    /// メモリに1ワードを書き込む
    pub fn write_memory_word(&self, addr: u64, value: u64) -> Result<()> {
        Ok(self.memory.write_word(addr, value)?)
    }

    /// 全レジスタのスナップショットを読み取る
    pub fn register_snapshot(&self) -> Result<RegisterSnapshot> {
        Ok(self.registers.read()?)
    }

    /// 名前でレジスタ値を読み取る
    pub fn read_register(&self, name: &str) -> Result<Option<u64>> {
        Ok(self.registers.read_by_name(name)?)
    }

    /// 名前でレジスタ値を書き込む（未知の名前ならfalse）
    pub fn write_register(&self, name: &str, value: u64) -> Result<bool> {
        Ok(self.registers.write_by_name(name, value)?)
    }

    /// プログラムカウンタを取得する
    pub fn get_pc(&self) -> Result<u64> {
        Ok(self.registers.get_pc()?)
    }

    /// プログラムカウンタを設定する
    pub fn set_pc(&mut self, pc: u64) -> Result<()> {
        Ok(self.registers.set_pc(pc)?)
    }

    /// トレーシーを強制終了する（冪等）
    pub fn terminate(&mut self) -> Result<()> {
        Ok(self.process.terminate()?)
    }
}
