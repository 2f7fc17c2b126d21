//! アドレス・行・関数・シンボルの解決

use crate::functions::{build_function_table, FunctionInfo};
use crate::lines::{build_unit_tables, path_matches, LineRow, UnitLineTable};
use crate::loader::DwarfLoader;
use crate::symbols::{build_symbol_table, Symbol};
use crate::Result;
use std::path::Path;
use tracing::debug;

/// デバッグ情報リゾルバ
///
/// ロード時に一度だけ構築されるフラットで不変なテーブルを所有し、
/// 読み取り専用のクエリだけを提供します。DIEツリーはクエリ時には
/// 走査しません。
pub struct DebugInfoResolver {
    functions: Vec<FunctionInfo>,
    units: Vec<UnitLineTable>,
    symbols: Vec<Symbol>,
}

impl DebugInfoResolver {
    /// バイナリからデバッグ情報を読み込んでテーブルを構築する
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let loader = DwarfLoader::load(path)?;
        let functions = build_function_table(&loader)?;
        let units = build_unit_tables(&loader)?;
        let symbols = build_symbol_table(&loader);

        debug!(
            functions = functions.len(),
            units = units.len(),
            symbols = symbols.len(),
            "debug info tables built"
        );

        Ok(Self {
            functions,
            units,
            symbols,
        })
    }

    /// pcを範囲に含む関数を検索する
    pub fn address_to_function(&self, pc: u64) -> Option<&FunctionInfo> {
        let idx = self.functions.partition_point(|f| f.low_address <= pc);
        if idx == 0 {
            return None;
        }
        let func = &self.functions[idx - 1];
        func.contains(pc).then_some(func)
    }

    /// pcに対応する行（floor検索）を返す
    ///
    /// pcを範囲に含むコンパイルユニット内で、address <= pc を満たす
    /// 最大の行を返します。どのユニットもpcを含まない場合はNoneです。
    pub fn address_to_line(&self, pc: u64) -> Option<&LineRow> {
        let unit = self.units.iter().find(|u| u.contains(pc))?;
        unit.floor_row(pc)
    }

    /// (file, line) に対応する最初の文開始アドレスを返す
    pub fn line_to_address(&self, file: &str, line: u64) -> Option<u64> {
        self.units
            .iter()
            .flat_map(|u| u.rows.iter())
            .filter(|row| row.is_stmt && row.line == line && path_matches(&row.file, file))
            .map(|row| row.address)
            .min()
    }

    /// 関数のエントリアドレス（プロローグの直後）を返す
    ///
    /// 関数の範囲内でlow addressより真に後ろにある最初の行のアドレスを
    /// 返します。そのような行がなければlow addressにフォールバックします。
    pub fn function_entry_address(&self, name: &str) -> Option<u64> {
        let func = self.functions.iter().find(|f| f.name == name)?;

        let entry = self
            .units
            .iter()
            .filter(|u| u.contains(func.low_address))
            .flat_map(|u| u.rows.iter())
            .filter(|row| row.address > func.low_address && row.address < func.high_address)
            .min_by_key(|row| row.address);

        Some(entry.map_or(func.low_address, |row| row.address))
    }

    /// 名前に一致するシンボルを列挙する
    ///
    /// マングル名とデマングル名の両方で一致を調べます。
    pub fn symbol_lookup(&self, name: &str) -> Vec<Symbol> {
        self.symbols
            .iter()
            .filter(|s| s.name == name || s.demangled_name == name)
            .cloned()
            .collect()
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::SymbolKind;

    fn row(file: &str, line: u64, address: u64, is_stmt: bool) -> LineRow {
        LineRow {
            file: file.to_string(),
            line,
            address,
            is_stmt,
        }
    }

    /// 関数foo [0x1000, 0x1020)、行テーブルに(0x1000, 5)と(0x1005, 10)を持つ
    /// リゾルバを構築する
    fn resolver() -> DebugInfoResolver {
        DebugInfoResolver {
            functions: vec![
                FunctionInfo {
                    name: "foo".to_string(),
                    low_address: 0x1000,
                    high_address: 0x1020,
                },
                FunctionInfo {
                    name: "bar".to_string(),
                    low_address: 0x1020,
                    high_address: 0x1040,
                },
            ],
            units: vec![UnitLineTable {
                ranges: vec![(0x1000, 0x1040)],
                rows: vec![
                    row("/src/a.c", 5, 0x1000, true),
                    row("/src/a.c", 10, 0x1005, true),
                    row("/src/a.c", 11, 0x1010, false),
                    row("/src/a.c", 20, 0x1020, true),
                ],
            }],
            symbols: vec![Symbol::new("foo".to_string(), SymbolKind::Function, 0x1000)],
        }
    }

    #[test]
    fn test_address_to_function_boundaries() {
        let r = resolver();
        assert_eq!(r.address_to_function(0x1000).unwrap().name, "foo");
        assert_eq!(r.address_to_function(0x101f).unwrap().name, "foo");
        assert_eq!(r.address_to_function(0x1020).unwrap().name, "bar");
        assert!(r.address_to_function(0x1040).is_none());
        assert!(r.address_to_function(0xfff).is_none());
    }

    #[test]
    fn test_address_to_line_floor() {
        let r = resolver();
        assert_eq!(r.address_to_line(0x1000).unwrap().line, 5);
        assert_eq!(r.address_to_line(0x1004).unwrap().line, 5);
        assert_eq!(r.address_to_line(0x1005).unwrap().line, 10);
        assert_eq!(r.address_to_line(0x100c).unwrap().line, 10);
    }

    #[test]
    fn test_address_to_line_outside_any_unit() {
        let r = resolver();
        assert!(r.address_to_line(0x2000).is_none());
        assert!(r.address_to_line(0xfff).is_none());
    }

    #[test]
    fn test_function_entry_skips_prologue() {
        // fooの最初の文は0x1005にある。エントリアドレスは0x1000ではなく
        // プロローグの直後を指すこと。
        let r = resolver();
        assert_eq!(r.function_entry_address("foo"), Some(0x1005));
    }

    #[test]
    fn test_function_entry_falls_back_to_low_address() {
        // barの範囲内にlowより後ろの行が無いためlowにフォールバックする
        let r = resolver();
        assert_eq!(r.function_entry_address("bar"), Some(0x1020));
        assert_eq!(r.function_entry_address("unknown"), None);
    }

    #[test]
    fn test_line_to_address_requires_statement_start() {
        let r = resolver();
        assert_eq!(r.line_to_address("a.c", 10), Some(0x1005));
        // 行11の行は文開始フラグが立っていない
        assert_eq!(r.line_to_address("a.c", 11), None);
        assert_eq!(r.line_to_address("b.c", 10), None);
    }

    #[test]
    fn test_symbol_lookup_exact_name() {
        let r = resolver();
        let found = r.symbol_lookup("foo");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, SymbolKind::Function);
        assert!(r.symbol_lookup("baz").is_empty());
    }
}
