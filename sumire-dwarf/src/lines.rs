//! フラットな行テーブル

use crate::loader::{DwarfLoader, Reader};
use crate::Result;
use std::path::PathBuf;

/// 行テーブルの1行
///
/// コンパイルユニット内でアドレス昇順に並びます。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRow {
    /// ソースファイルのパス
    pub file: String,
    /// 行番号
    pub line: u64,
    /// 行に対応する先頭アドレス
    pub address: u64,
    /// 文の開始位置かどうか
    pub is_stmt: bool,
}

/// コンパイルユニットごとの行テーブル
///
/// ユニットのアドレス範囲と、アドレス順にソートされた行からなります。
#[derive(Debug, Clone, Default)]
pub struct UnitLineTable {
    /// ユニットのアドレス範囲 [start, end) のリスト
    pub ranges: Vec<(u64, u64)>,
    /// アドレス順の行テーブル
    pub rows: Vec<LineRow>,
}

impl UnitLineTable {
    /// このユニットの範囲がpcを含むかどうか
    pub fn contains(&self, pc: u64) -> bool {
        self.ranges.iter().any(|&(start, end)| pc >= start && pc < end)
    }

    /// address <= pc を満たす最大の行（floor検索）
    pub fn floor_row(&self, pc: u64) -> Option<&LineRow> {
        let idx = self.rows.partition_point(|row| row.address <= pc);
        if idx == 0 {
            None
        } else {
            Some(&self.rows[idx - 1])
        }
    }
}

/// クエリのファイル指定が行のファイルパスにマッチするか
///
/// 完全一致、またはパス区切りで切れる末尾一致（"a.c" は "/src/a.c" に
/// マッチし、"bar/a.c" の "r/a.c" にはマッチしない）を受け付けます。
pub fn path_matches(row_file: &str, query: &str) -> bool {
    if row_file == query {
        return true;
    }
    row_file.ends_with(query) && row_file[..row_file.len() - query.len()].ends_with('/')
}

/// 全コンパイルユニットの行テーブルを構築する
///
/// 行プログラムを一度だけ走査し、end-of-sequence行を除いた全行を
/// アドレス順のフラットなテーブルに展開します。
pub fn build_unit_tables(loader: &DwarfLoader) -> Result<Vec<UnitLineTable>> {
    let dwarf = loader.dwarf();
    let mut units = Vec::new();

    let mut unit_iter = dwarf.units();
    while let Some(header) = unit_iter.next()? {
        let unit = dwarf.unit(header)?;
        let mut table = UnitLineTable::default();

        let mut range_iter = dwarf.unit_ranges(&unit)?;
        while let Some(range) = range_iter.next()? {
            if range.begin < range.end {
                table.ranges.push((range.begin, range.end));
            }
        }

        if let Some(program) = unit.line_program.clone() {
            let mut row_iter = program.rows();
            while let Some((header, row)) = row_iter.next_row()? {
                if row.end_sequence() {
                    continue;
                }
                let Some(line) = row.line() else {
                    continue;
                };
                let Some(file_entry) = row.file(header) else {
                    continue;
                };

                let mut path = PathBuf::new();
                if let Some(dir) = file_entry.directory(header) {
                    let dir: Reader = dwarf.attr_string(&unit, dir)?;
                    path.push(dir.to_string_lossy().as_ref());
                }
                let name: Reader = dwarf.attr_string(&unit, file_entry.path_name())?;
                path.push(name.to_string_lossy().as_ref());

                table.rows.push(LineRow {
                    file: path.to_string_lossy().into_owned(),
                    line: line.get(),
                    address: row.address(),
                    is_stmt: row.is_stmt(),
                });
            }
        }

        table.rows.sort_by_key(|row| row.address);

        if !table.ranges.is_empty() || !table.rows.is_empty() {
            units.push(table);
        }
    }

    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(address: u64, line: u64) -> LineRow {
        LineRow {
            file: "/src/a.c".to_string(),
            line,
            address,
            is_stmt: true,
        }
    }

    fn table() -> UnitLineTable {
        UnitLineTable {
            ranges: vec![(0x1000, 0x2000)],
            rows: vec![row(0x1000, 1), row(0x1010, 2), row(0x1020, 3)],
        }
    }

    #[test]
    fn test_floor_row_exact_and_between() {
        let t = table();
        assert_eq!(t.floor_row(0x1000).unwrap().line, 1);
        assert_eq!(t.floor_row(0x100f).unwrap().line, 1);
        assert_eq!(t.floor_row(0x1010).unwrap().line, 2);
        assert_eq!(t.floor_row(0x1fff).unwrap().line, 3);
    }

    #[test]
    fn test_floor_row_before_first() {
        let t = table();
        assert!(t.floor_row(0xfff).is_none());
    }

    #[test]
    fn test_contains() {
        let t = table();
        assert!(t.contains(0x1000));
        assert!(t.contains(0x1fff));
        assert!(!t.contains(0x2000));
        assert!(!t.contains(0xfff));
    }

    #[test]
    fn test_path_matches() {
        assert!(path_matches("/src/a.c", "/src/a.c"));
        assert!(path_matches("/src/a.c", "a.c"));
        assert!(path_matches("/src/a.c", "src/a.c"));
        assert!(!path_matches("/src/bar.c", "a.c"));
        assert!(!path_matches("/src/bar/a.c", "r/a.c"));
    }
}
