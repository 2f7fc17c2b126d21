//! ステッピングエンジン
//!
//! 命令単位・ソース行単位のステップ実行を実装します。ブレークポイントの
//! 一時的な無効化・有効化はすべてブレークポイントマネージャ経由で行い、
//! トレーシーからは計装が見えないことを保証します。

use crate::debugger::Debugger;
use crate::events::StopEvent;
use crate::Result;
use tracing::{debug, trace};

/// フレームベースから戻りアドレスまでのオフセット
///
/// x86_64のSystem V呼び出し規約では、rbpの8バイト上に呼び出し元への
/// 戻りアドレスが置かれます。
const RETURN_ADDRESS_OFFSET: u64 = 8;

impl Debugger {
    /// PC上のブレークポイントを跨いで1命令だけ実行する
    ///
    /// PCが有効なブレークポイントのアドレスに一致する場合、それを
    /// 無効化して1命令実行し、停止を待ってから再有効化します。この手順を
    /// 踏まずにresumeすると、元の命令が実行されないまま同じトラップが
    /// 再発します。PCがブレークポイント上に無ければno-opです。
    ///
    /// 正常にステップできた場合はNone、ステップ中にトレーシーが終了・
    /// フォールトした場合はそのイベントを返します。
    pub fn step_over_current_breakpoint(&mut self) -> Result<Option<StopEvent>> {
        if let Some(event) = self.exited_event() {
            return Ok(Some(event));
        }

        let pc = self.registers.get_pc()?;
        if !self.breakpoints.is_enabled_at(pc) {
            return Ok(None);
        }

        trace!("stepping over breakpoint under pc {:#x}", pc);
        self.breakpoints.disable(pc, &self.memory)?;
        self.process.step()?;
        let event = self.wait_for_stop()?;

        if event.is_exit() {
            // 死んだプロセスには触れない
            return Ok(Some(event));
        }

        self.breakpoints.enable(pc, &self.memory)?;
        match event {
            StopEvent::SingleStepTrap => Ok(None),
            other => Ok(Some(other)),
        }
    }

    /// 1命令だけ実行する
    ///
    /// PCがブレークポイント上にある場合も透過的に処理します。ステップ後の
    /// PCが別の有効なブレークポイントのアドレスに載っていても、それは
    /// 通常の停止として報告されます（特別扱いしません）。
    pub fn single_step_instruction(&mut self) -> Result<StopEvent> {
        if let Some(event) = self.exited_event() {
            return Ok(event);
        }

        let pc = self.registers.get_pc()?;
        if self.breakpoints.is_enabled_at(pc) {
            self.breakpoints.disable(pc, &self.memory)?;
            self.process.step()?;
            let event = self.wait_for_stop()?;
            if !event.is_exit() {
                self.breakpoints.enable(pc, &self.memory)?;
            }
            Ok(event)
        } else {
            self.process.step()?;
            self.wait_for_stop()
        }
    }

    /// 次の停止まで実行継続する
    ///
    /// PC上のブレークポイントを跨いでからresumeし、停止イベントを
    /// 分類して返します。
    pub fn continue_execution(&mut self) -> Result<StopEvent> {
        if let Some(event) = self.exited_event() {
            return Ok(event);
        }
        if let Some(event) = self.step_over_current_breakpoint()? {
            return Ok(event);
        }
        self.process.resume()?;
        self.wait_for_stop()
    }

    /// 指定アドレスまで実行する（一時ブレークポイントのプロトコル）
    ///
    /// アドレスにレコードが無ければ一時ブレークポイントを設置し、停止後に
    /// 取り除きます。ユーザブレークポイントが既に存在する場合はそのまま
    /// 使い、後から削除しません。トレーシーが終了した場合は後始末を
    /// 行いません。
    fn run_to_address(&mut self, target: u64) -> Result<StopEvent> {
        let temporary = self.breakpoints.lookup(target).is_none();
        if temporary {
            trace!("installing temporary breakpoint at {:#x}", target);
            self.breakpoints.set_at_address(target, &self.memory)?;
        }

        let event = self.continue_execution()?;

        if temporary && !event.is_exit() {
            self.breakpoints.remove(target, &self.memory)?;
        }
        Ok(event)
    }

    /// 現在の関数から抜けるまで実行する
    ///
    /// 現在フレームの戻りアドレス（rbp+8のワード）まで実行します。
    pub fn step_out(&mut self) -> Result<StopEvent> {
        if let Some(event) = self.exited_event() {
            return Ok(event);
        }

        let frame_base = self.registers.get_frame_pointer()?;
        let return_address = self.memory.read_word(frame_base + RETURN_ADDRESS_OFFSET)?;
        debug!("stepping out of current frame to {:#x}", return_address);
        self.run_to_address(return_address)
    }

    /// CU外の不透明な領域から抜ける
    ///
    /// 行情報も関数情報も無い位置（動的リンクスタブ等）は、直前のcallで
    /// 入った直後でまだフレームを持たないため、戻りアドレスはスタック
    /// トップにあります。そこまで実行して呼び出し元に戻ります。
    ///
    /// 戻りアドレスに到達した場合はNone（操作を継続してよい）、別の
    /// 停止が起きた場合はそのイベントを返します。
    fn leave_opaque_region(&mut self) -> Result<Option<StopEvent>> {
        let sp = self.registers.get_stack_pointer()?;
        let return_address = self.memory.read_word(sp)?;
        trace!("leaving region without debug info via {:#x}", return_address);

        let event = self.run_to_address(return_address)?;
        match event {
            StopEvent::BreakpointHit { address, .. } if address == return_address => Ok(None),
            other => Ok(Some(other)),
        }
    }

    /// ソース行単位のステップイン
    ///
    /// 解決された行が開始時と異なり、かつ有効な行エントリが存在する
    /// アドレスに達するまで1命令ずつ実行します。既知の関数内で行情報が
    /// 欠けた位置は踏み越え、どのCUにも属さない位置（動的リンクスタブ等）
    /// はスタックトップの戻りアドレス経由で抜けます。開始位置に行情報が
    /// 無い場合はステップアウトに等価です。
    pub fn step_into(&mut self) -> Result<StopEvent> {
        if let Some(event) = self.exited_event() {
            return Ok(event);
        }

        let pc = self.registers.get_pc()?;
        let Some((start_file, start_line)) = self.current_line(pc) else {
            return self.step_out();
        };

        loop {
            let pc = self.registers.get_pc()?;
            match self.current_line(pc) {
                Some((file, line)) if line != start_line || file != start_file => {
                    debug!(file = %file, line, "step into reached new line");
                    return Ok(StopEvent::SingleStepTrap);
                }
                Some(_) => {}
                None => {
                    if self.resolver.address_to_function(pc).is_none() {
                        if let Some(event) = self.leave_opaque_region()? {
                            return Ok(event);
                        }
                        continue;
                    }
                    // 既知の関数内で行が欠けている位置はステップを続ける
                }
            }

            let event = self.single_step_instruction()?;
            if !matches!(event, StopEvent::SingleStepTrap) {
                return Ok(event);
            }
        }
    }

    /// ソース行単位のステップオーバー
    ///
    /// 呼び出しには降りません。別の関数の先頭命令への着地はcall命令を
    /// 踏んだ証拠とみなし、スタックトップの戻りアドレスまで一時
    /// ブレークポイントで飛ばします。解決された行が開始時と異なり、
    /// かつスタックポインタが開始時の深さマーカー以上（同じか浅い）に
    /// なったところで停止します。再帰呼び出しは行の一致ではなく深さ
    /// マーカーで判別します。
    pub fn step_over(&mut self) -> Result<StopEvent> {
        if let Some(event) = self.exited_event() {
            return Ok(event);
        }

        let pc = self.registers.get_pc()?;
        let Some((start_file, start_line)) = self.current_line(pc) else {
            return self.step_out();
        };
        let start_function_low = self.resolver.address_to_function(pc).map(|f| f.low_address);
        let depth_marker = self.registers.get_stack_pointer()?;

        loop {
            let pc = self.registers.get_pc()?;
            let sp = self.registers.get_stack_pointer()?;
            let function_low = self.resolver.address_to_function(pc).map(|f| f.low_address);

            // 関数の先頭への着地はcallを踏んだ証拠。別関数へのcallに加え、
            // 同じ関数の先頭でも深さが増えていれば再帰呼び出し。
            if let Some(low) = function_low {
                let entered_call =
                    pc == low && (function_low != start_function_low || sp < depth_marker);
                if entered_call {
                    let return_address = self.memory.read_word(sp)?;
                    trace!(
                        "skipping over call to {:#x}, return address {:#x}",
                        low,
                        return_address
                    );
                    let event = self.run_to_address(return_address)?;
                    match event {
                        StopEvent::BreakpointHit { address, .. }
                            if address == return_address => {}
                        other => return Ok(other),
                    }
                    continue;
                }
            }

            match self.current_line(pc) {
                Some((file, line)) => {
                    if (line != start_line || file != start_file) && sp >= depth_marker {
                        debug!(file = %file, line, "step over reached new line");
                        return Ok(StopEvent::SingleStepTrap);
                    }
                }
                None => {
                    if function_low.is_none() {
                        if let Some(event) = self.leave_opaque_region()? {
                            return Ok(event);
                        }
                        continue;
                    }
                }
            }

            let event = self.single_step_instruction()?;
            if !matches!(event, StopEvent::SingleStepTrap) {
                return Ok(event);
            }
        }
    }

    /// PCの行情報を (file, line) で取得する
    fn current_line(&self, pc: u64) -> Option<(String, u64)> {
        self.resolver
            .address_to_line(pc)
            .map(|row| (row.file.clone(), row.line))
    }
}
