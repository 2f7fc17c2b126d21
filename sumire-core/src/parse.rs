//! コマンド引数のパース

use crate::command::BreakLocation;

/// 16進数（0xプレフィックス付き）または10進数の値をパースする
pub fn parse_hex_value(s: &str) -> Option<u64> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else {
        s.parse::<u64>().ok()
    }
}

/// ブレークポイントの位置指定をパースする
///
/// 0xプレフィックスはアドレス、"file:line" はソース位置、
/// それ以外は関数名として解釈します。
pub fn parse_break_location(s: &str) -> Option<BreakLocation> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if s.starts_with("0x") || s.starts_with("0X") {
        return parse_hex_value(s).map(BreakLocation::Address);
    }

    if let Some((file, line)) = s.rsplit_once(':') {
        if let Ok(line) = line.parse::<u64>() {
            if !file.is_empty() {
                return Some(BreakLocation::Line {
                    file: file.to_string(),
                    line,
                });
            }
        }
    }

    Some(BreakLocation::Function(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_value() {
        assert_eq!(parse_hex_value("0x1234"), Some(0x1234));
        assert_eq!(parse_hex_value("0XABCD"), Some(0xabcd));
        assert_eq!(parse_hex_value("1234"), Some(1234));
        assert_eq!(parse_hex_value("xyz"), None);
        assert_eq!(parse_hex_value("0xghij"), None);
    }

    #[test]
    fn test_parse_break_location_address() {
        assert_eq!(
            parse_break_location("0x400000"),
            Some(BreakLocation::Address(0x400000))
        );
        assert_eq!(parse_break_location("0xzz"), None);
    }

    #[test]
    fn test_parse_break_location_line() {
        assert_eq!(
            parse_break_location("main.c:42"),
            Some(BreakLocation::Line {
                file: "main.c".to_string(),
                line: 42
            })
        );
        // コロンの後ろが行番号でなければ関数名扱い（C++の::等）
        assert_eq!(
            parse_break_location("ns::func"),
            Some(BreakLocation::Function("ns::func".to_string()))
        );
    }

    #[test]
    fn test_parse_break_location_function() {
        assert_eq!(
            parse_break_location("main"),
            Some(BreakLocation::Function("main".to_string()))
        );
    }
}
