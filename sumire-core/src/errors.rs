//! デバッガコアのエラー型

use sumire_target::TargetError;

/// デバッガコアのエラー
///
/// SymbolNotFound/LineNotFoundは回復可能で、コマンドの拒否だけで
/// プロセスとブレークポイントテーブルは変化しません。
#[derive(Debug, thiserror::Error)]
pub enum DebugError {
    /// ターゲットプロセス制御の失敗
    #[error(transparent)]
    Target(#[from] TargetError),

    /// 指定された名前の関数・シンボルが見つからない
    #[error("no symbol named '{0}'")]
    SymbolNotFound(String),

    /// 指定された位置に文開始の行が見つからない
    #[error("no statement at {file}:{line}")]
    LineNotFound { file: String, line: u64 },

    /// 同じアドレスへの二重のブレークポイント設定
    #[error("breakpoint already set at {0:#x}")]
    BreakpointConflict(u64),

    /// デバッグ情報の読み込みに失敗
    #[error("failed to load debug info: {0}")]
    DebugInfo(String),
}

/// デバッガコアの結果型
pub type Result<T> = std::result::Result<T, DebugError>;
