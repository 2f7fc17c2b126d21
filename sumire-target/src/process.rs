//! プロセス制御機能

use crate::{Result, TargetError};
use nix::sys::personality::{self, Persona};
use nix::sys::ptrace;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{execv, fork, ForkResult, Pid};
use std::ffi::CString;
use std::path::Path;
use tracing::debug;

/// デバッグ対象プロセスのライフサイクル状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// 生成済み、まだ実行されていない
    Created,
    /// 実行中（次の停止まで）
    Running,
    /// ptraceによる停止中
    Stopped,
    /// 終了済み
    Exited,
}

/// デバッグ対象のプロセス
///
/// ひとつのトレーシー（tracee）を排他的に所有します。launchで生成した
/// 子プロセスはdrop時にkillして回収し、attachしたプロセスはdetachします。
#[derive(Debug)]
pub struct Process {
    pid: Pid,
    state: ProcessState,
    owned: bool,
}

impl Process {
    /// 実行可能ファイルを起動してデバッグ対象プロセスを開始する
    ///
    /// forkした子プロセスでPTRACE_TRACEMEを設定し、ASLRを無効化してから
    /// execvで対象バイナリを実行します。execve直後のSIGTRAP停止を消費した
    /// 状態で返るため、呼び出し側はブレークポイントを安全に設定できます。
    pub fn launch<P: AsRef<Path>>(program: P, args: &[String]) -> Result<Self> {
        let path = program.as_ref().to_string_lossy().into_owned();

        let program_cstring = CString::new(path.as_str()).map_err(|_| TargetError::Launch {
            path: path.clone(),
            reason: "path contains an interior NUL byte".into(),
        })?;

        let mut cstring_args = vec![program_cstring.clone()];
        for arg in args {
            cstring_args.push(CString::new(arg.as_str()).map_err(|_| TargetError::Launch {
                path: path.clone(),
                reason: format!("argument '{}' contains an interior NUL byte", arg),
            })?);
        }

        match unsafe { fork() }.map_err(|e| TargetError::Launch {
            path: path.clone(),
            reason: format!("fork failed: {}", e),
        })? {
            ForkResult::Parent { child } => {
                // 子プロセスがexecve後のSIGTRAPで停止するのを待つ
                match waitpid(child, None)? {
                    WaitStatus::Stopped(_, Signal::SIGTRAP) => {
                        debug!(pid = child.as_raw(), "tracee stopped at first instruction");
                        Ok(Self {
                            pid: child,
                            state: ProcessState::Created,
                            owned: true,
                        })
                    }
                    WaitStatus::Exited(_, code) => Err(TargetError::Launch {
                        path,
                        reason: format!("child exited with code {} before tracing began", code),
                    }),
                    status => Err(TargetError::Launch {
                        path,
                        reason: format!("unexpected wait status after execv: {:?}", status),
                    }),
                }
            }
            ForkResult::Child => {
                // 子プロセス: トレースを要求し、固定ベースアドレスのために
                // ASLRを無効化してからexecvする
                if ptrace::traceme().is_err() {
                    std::process::exit(127);
                }
                if let Ok(persona) = personality::get() {
                    let _ = personality::set(persona | Persona::ADDR_NO_RANDOMIZE);
                }
                let _ = execv(&program_cstring, &cstring_args);

                // execvが失敗した場合のみここに到達する
                std::process::exit(127);
            }
        }
    }

    /// 既存のプロセスにアタッチする
    ///
    /// アタッチによるSIGSTOP停止を消費した状態で返ります。
    pub fn attach(pid: i32) -> Result<Self> {
        let pid = Pid::from_raw(pid);
        ptrace::attach(pid).map_err(|e| TargetError::Attach {
            pid: pid.as_raw(),
            source: e,
        })?;
        waitpid(pid, None)?;
        Ok(Self {
            pid,
            state: ProcessState::Stopped,
            owned: false,
        })
    }

    /// プロセスIDを取得する
    pub fn pid(&self) -> i32 {
        self.pid.as_raw()
    }

    /// ライフサイクル状態を取得する
    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// プロセスを次の停止イベントまで実行継続する
    ///
    /// ブロックしません。対応するwait()とちょうど一度ずつ対にして呼びます。
    pub fn resume(&mut self) -> Result<()> {
        ptrace::cont(self.pid, None)?;
        self.state = ProcessState::Running;
        Ok(())
    }

    /// 1命令だけ実行する（シングルステップ）
    ///
    /// resume()と同様にブロックせず、wait()と対にして使います。
    pub fn step(&mut self) -> Result<()> {
        ptrace::step(self.pid, None)?;
        self.state = ProcessState::Running;
        Ok(())
    }

    /// 状態変化を待機し、未分類の停止理由を返す
    ///
    /// resume()/step()ごとにちょうど一度だけ呼びます。分類は
    /// イベントディスパッチャが行います。
    pub fn wait(&mut self) -> Result<WaitStatus> {
        let status = waitpid(self.pid, None)?;
        self.state = match status {
            WaitStatus::Exited(_, _) | WaitStatus::Signaled(_, _, _) => ProcessState::Exited,
            WaitStatus::Stopped(_, _) => ProcessState::Stopped,
            _ => self.state,
        };
        Ok(status)
    }

    /// 直近の停止シグナルの詳細を取得する
    pub fn siginfo(&self) -> Result<nix::libc::siginfo_t> {
        Ok(ptrace::getsiginfo(self.pid)?)
    }

    /// プロセスを強制終了して回収する
    ///
    /// 冪等です。既に終了している場合は何もしません。
    pub fn terminate(&mut self) -> Result<()> {
        if self.state == ProcessState::Exited {
            return Ok(());
        }
        let _ = kill(self.pid, Signal::SIGKILL);
        let _ = waitpid(self.pid, None);
        self.state = ProcessState::Exited;
        Ok(())
    }
}

impl Drop for Process {
    fn drop(&mut self) {
        if self.state == ProcessState::Exited {
            return;
        }
        if self.owned {
            let _ = kill(self.pid, Signal::SIGKILL);
            let _ = waitpid(self.pid, None);
        } else {
            let _ = ptrace::detach(self.pid, None);
        }
    }
}
