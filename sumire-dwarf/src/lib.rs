//! Sumire デバッグ情報解決
//!
//! このクレートは、ELFファイルとDWARFデバッグ情報を読み込み、
//! アドレス・ソース行・関数・シンボルを相互に解決するための
//! 読み取り専用のクエリ面を提供します。テーブルはロード時に一度だけ
//! 構築され、以後変更されません。

pub mod functions;
pub mod lines;
pub mod loader;
pub mod resolver;
pub mod symbols;

pub use functions::FunctionInfo;
pub use lines::{LineRow, UnitLineTable};
pub use loader::DwarfLoader;
pub use resolver::DebugInfoResolver;
pub use symbols::{Symbol, SymbolKind};

/// デバッグ情報解決の結果型
pub type Result<T> = anyhow::Result<T>;
