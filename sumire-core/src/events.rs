//! 停止イベントの分類

use crate::debugger::Debugger;
use crate::Result;
use nix::sys::signal::Signal;
use nix::sys::wait::WaitStatus;
use sumire_target::TRAP_INSTRUCTION_LEN;
use tracing::{trace, warn};

/// ソース位置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub line: u64,
}

/// 分類済みの停止イベント
///
/// wait 1回につき1つ生成され、呼び出し側が消費します。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopEvent {
    /// ブレークポイントヒット（PCは巻き戻し済み）
    BreakpointHit {
        address: u64,
        /// ベストエフォートで解決したソース位置
        location: Option<SourceLocation>,
    },
    /// シングルステップ完了のトレーストラップ
    SingleStepTrap,
    /// その他のシグナルによる停止（プロセスは停止したまま）
    Signaled { signal: Signal, code: i32 },
    /// プロセス終了
    Exited { code: i32 },
}

impl StopEvent {
    /// プロセスがもう存在しないイベントかどうか
    pub fn is_exit(&self) -> bool {
        matches!(self, StopEvent::Exited { .. })
    }
}

impl Debugger {
    /// 状態変化を待機し、停止イベントに分類する
    ///
    /// SIGTRAP停止でPC-トラップ幅が有効なブレークポイントに一致すれば
    /// BreakpointHitとしてPCを巻き戻し、一致しなければSingleStepTrap。
    /// その他のシグナルはSignaled、終了はExitedになります。シグナルで
    /// 殺された場合は慣例どおり 128+signo の終了コードを充てます。
    pub fn wait_for_stop(&mut self) -> Result<StopEvent> {
        let status = self.process.wait()?;

        let event = match status {
            WaitStatus::Exited(_, code) => {
                self.exit_code = Some(code);
                StopEvent::Exited { code }
            }
            WaitStatus::Signaled(_, signal, _) => {
                let code = 128 + signal as i32;
                self.exit_code = Some(code);
                StopEvent::Exited { code }
            }
            WaitStatus::Stopped(_, Signal::SIGTRAP) => {
                let pc = self.registers.get_pc()?;
                let bp_addr = pc.wrapping_sub(TRAP_INSTRUCTION_LEN);
                if self.breakpoints.is_enabled_at(bp_addr) {
                    // 元の命令から再開できるようトラップ幅だけ巻き戻す
                    self.registers.set_pc(bp_addr)?;
                    let location = self.resolver.address_to_line(bp_addr).map(|row| {
                        SourceLocation {
                            file: row.file.clone(),
                            line: row.line,
                        }
                    });
                    StopEvent::BreakpointHit {
                        address: bp_addr,
                        location,
                    }
                } else {
                    StopEvent::SingleStepTrap
                }
            }
            WaitStatus::Stopped(_, signal) => {
                let code = self.process.siginfo().map(|si| si.si_code).unwrap_or(0);
                StopEvent::Signaled { signal, code }
            }
            status => {
                warn!(?status, "unexpected wait status, treating as trace trap");
                StopEvent::SingleStepTrap
            }
        };

        trace!(?event, "stop classified");
        Ok(event)
    }
}
