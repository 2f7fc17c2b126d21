//! Sumire デバッガコア
//!
//! ブレークポイント管理、ステッピングエンジン、停止イベントの分類と、
//! それらを束ねるデバッガ本体を提供します。テキスト処理はコマンドの
//! パースだけで、表示や入力はCLI側の責務です。

pub mod breakpoint;
pub mod command;
pub mod debugger;
pub mod errors;
pub mod events;
pub mod parse;
pub mod stepping;

pub use breakpoint::BreakpointManager;
pub use command::{BreakLocation, Command};
pub use debugger::Debugger;
pub use errors::{DebugError, Result};
pub use events::{SourceLocation, StopEvent};
