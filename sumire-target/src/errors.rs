//! ターゲット制御のエラー型

use nix::errno::Errno;

/// ターゲットプロセス制御のエラー
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    /// 子プロセスの生成または実行ファイルの起動に失敗
    #[error("failed to launch '{path}': {reason}")]
    Launch { path: String, reason: String },

    /// 既存プロセスへのアタッチに失敗
    #[error("failed to attach to pid {pid}: {source}")]
    Attach {
        pid: i32,
        #[source]
        source: Errno,
    },

    /// ptrace等のOS制御呼び出しに失敗
    #[error("process control failed: {0}")]
    Process(#[from] Errno),

    /// マップされていないアドレスへのアクセス
    #[error("memory access failed at 0x{addr:x}: {source}")]
    MemoryAccess {
        addr: u64,
        #[source]
        source: Errno,
    },
}

/// ターゲット制御の結果型
pub type Result<T> = std::result::Result<T, TargetError>;
