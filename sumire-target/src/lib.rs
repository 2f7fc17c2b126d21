//! Sumire ターゲットプロセス制御
//!
//! このクレートは、デバッグ対象のプロセスを制御するための低レベル機能を提供します。
//! ptrace、レジスタアクセス、メモリアクセス、ブレークポイントのパッチ適用などを行います。

pub mod breakpoint;
pub mod errors;
pub mod memory;
pub mod process;
pub mod registers;

pub use breakpoint::{SoftwareBreakpoint, TRAP_INSTRUCTION_LEN, TRAP_OPCODE};
pub use errors::{Result, TargetError};
pub use memory::{Memory, MemoryMapping};
pub use process::{Process, ProcessState};
pub use registers::{RegisterSnapshot, Registers, REGISTER_NAMES};
