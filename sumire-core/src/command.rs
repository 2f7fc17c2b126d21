//! デバッガコマンド

use crate::parse::{parse_break_location, parse_hex_value};

/// ブレークポイントの設定位置
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakLocation {
    /// 機械語アドレス（0xプレフィックス）
    Address(u64),
    /// 関数名（プロローグ直後に設定される）
    Function(String),
    /// ソース位置 file:line
    Line { file: String, line: u64 },
}

/// デバッガコマンド
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 実行継続
    Continue,
    /// ブレークポイントを設定
    Break(BreakLocation),
    /// ブレークポイントを削除
    Delete(u64),
    /// ソース行単位のステップ（呼び出しに入る）
    StepInto,
    /// ソース行単位のステップ（呼び出しを跨ぐ）
    StepOver,
    /// 現在の関数から抜けるまで実行
    StepOut,
    /// 1命令だけステップ
    StepInstruction,
    /// 名前付きレジスタの読み取り
    RegisterRead(String),
    /// 名前付きレジスタへの書き込み
    RegisterWrite(String, u64),
    /// 全レジスタのダンプ表示
    RegisterDump,
    /// メモリワードの読み取り
    MemoryRead(u64),
    /// メモリワードへの書き込み
    MemoryWrite(u64, u64),
    /// ヘルプ表示
    Help,
    /// 終了
    Quit,
}

impl Command {
    /// コマンド文字列をパースする
    pub fn parse(input: &str) -> Option<Self> {
        let parts: Vec<&str> = input.trim().split_whitespace().collect();
        if parts.is_empty() {
            return None;
        }

        match parts[0] {
            "continue" | "c" => Some(Command::Continue),
            "break" | "b" => {
                let location = parse_break_location(parts.get(1)?)?;
                Some(Command::Break(location))
            }
            "delete" | "d" => {
                let addr = parse_hex_value(parts.get(1)?)?;
                Some(Command::Delete(addr))
            }
            "step" | "s" => Some(Command::StepInto),
            "next" | "n" => Some(Command::StepOver),
            "finish" | "f" => Some(Command::StepOut),
            "stepi" | "si" => Some(Command::StepInstruction),
            "register" | "reg" => match *parts.get(1)? {
                "dump" => Some(Command::RegisterDump),
                "read" => Some(Command::RegisterRead(parts.get(2)?.to_string())),
                "write" => {
                    let name = parts.get(2)?.to_string();
                    let value = parse_hex_value(parts.get(3)?)?;
                    Some(Command::RegisterWrite(name, value))
                }
                _ => None,
            },
            "memory" | "mem" => match *parts.get(1)? {
                "read" => Some(Command::MemoryRead(parse_hex_value(parts.get(2)?)?)),
                "write" => {
                    let addr = parse_hex_value(parts.get(2)?)?;
                    let value = parse_hex_value(parts.get(3)?)?;
                    Some(Command::MemoryWrite(addr, value))
                }
                _ => None,
            },
            "help" | "h" | "?" => Some(Command::Help),
            "quit" | "q" | "exit" => Some(Command::Quit),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("continue"), Some(Command::Continue));
        assert_eq!(Command::parse("c"), Some(Command::Continue));
        assert_eq!(Command::parse("step"), Some(Command::StepInto));
        assert_eq!(Command::parse("next"), Some(Command::StepOver));
        assert_eq!(Command::parse("finish"), Some(Command::StepOut));
        assert_eq!(Command::parse("stepi"), Some(Command::StepInstruction));
        assert_eq!(Command::parse("quit"), Some(Command::Quit));
        assert_eq!(Command::parse("bogus"), None);
        assert_eq!(Command::parse(""), None);
    }

    #[test]
    fn test_parse_break_variants() {
        assert_eq!(
            Command::parse("break 0x1234"),
            Some(Command::Break(BreakLocation::Address(0x1234)))
        );
        assert_eq!(
            Command::parse("b main"),
            Some(Command::Break(BreakLocation::Function("main".to_string())))
        );
        assert_eq!(
            Command::parse("break a.c:10"),
            Some(Command::Break(BreakLocation::Line {
                file: "a.c".to_string(),
                line: 10
            }))
        );
        assert_eq!(Command::parse("break"), None);
    }

    #[test]
    fn test_parse_delete() {
        assert_eq!(Command::parse("delete 0x1234"), Some(Command::Delete(0x1234)));
        assert_eq!(Command::parse("d 0x1234"), Some(Command::Delete(0x1234)));
    }

    #[test]
    fn test_parse_register_commands() {
        assert_eq!(Command::parse("register dump"), Some(Command::RegisterDump));
        assert_eq!(
            Command::parse("register read rip"),
            Some(Command::RegisterRead("rip".to_string()))
        );
        assert_eq!(
            Command::parse("register write rax 0xff"),
            Some(Command::RegisterWrite("rax".to_string(), 0xff))
        );
        assert_eq!(Command::parse("register"), None);
        assert_eq!(Command::parse("register read"), None);
    }

    #[test]
    fn test_parse_memory_commands() {
        assert_eq!(
            Command::parse("memory read 0x2000"),
            Some(Command::MemoryRead(0x2000))
        );
        assert_eq!(
            Command::parse("memory write 0x2000 0xdeadbeef"),
            Some(Command::MemoryWrite(0x2000, 0xdeadbeef))
        );
        assert_eq!(Command::parse("memory peek 0x2000"), None);
    }
}
