//! レジスタアクセス機能

use crate::Result;
use nix::sys::ptrace;
use nix::unistd::Pid;

/// 全レジスタのスナップショット
///
/// 常に全体を読み取り、全体を書き戻します。1フィールドの変更は
/// スナップショットのread-modify-writeになります。
pub type RegisterSnapshot = nix::libc::user_regs_struct;

/// x86_64のユーザレジスタ名（ダンプ表示順）
pub const REGISTER_NAMES: [&str; 27] = [
    "r15", "r14", "r13", "r12", "rbp", "rbx", "r11", "r10", "r9", "r8", "rax", "rcx", "rdx",
    "rsi", "rdi", "orig_rax", "rip", "cs", "eflags", "rsp", "ss", "fs_base", "gs_base", "ds",
    "es", "fs", "gs",
];

/// スナップショットから名前でレジスタ値を取り出す
pub fn value_of(regs: &RegisterSnapshot, name: &str) -> Option<u64> {
    let value = match name {
        "r15" => regs.r15,
        "r14" => regs.r14,
        "r13" => regs.r13,
        "r12" => regs.r12,
        "rbp" => regs.rbp,
        "rbx" => regs.rbx,
        "r11" => regs.r11,
        "r10" => regs.r10,
        "r9" => regs.r9,
        "r8" => regs.r8,
        "rax" => regs.rax,
        "rcx" => regs.rcx,
        "rdx" => regs.rdx,
        "rsi" => regs.rsi,
        "rdi" => regs.rdi,
        "orig_rax" => regs.orig_rax,
        "rip" => regs.rip,
        "cs" => regs.cs,
        "eflags" => regs.eflags,
        "rsp" => regs.rsp,
        "ss" => regs.ss,
        "fs_base" => regs.fs_base,
        "gs_base" => regs.gs_base,
        "ds" => regs.ds,
        "es" => regs.es,
        "fs" => regs.fs,
        "gs" => regs.gs,
        _ => return None,
    };
    Some(value)
}

/// スナップショットの名前付きレジスタを書き換える
///
/// 未知の名前に対してはfalseを返し、スナップショットは変更しません。
pub fn set_value(regs: &mut RegisterSnapshot, name: &str, value: u64) -> bool {
    match name {
        "r15" => regs.r15 = value,
        "r14" => regs.r14 = value,
        "r13" => regs.r13 = value,
        "r12" => regs.r12 = value,
        "rbp" => regs.rbp = value,
        "rbx" => regs.rbx = value,
        "r11" => regs.r11 = value,
        "r10" => regs.r10 = value,
        "r9" => regs.r9 = value,
        "r8" => regs.r8 = value,
        "rax" => regs.rax = value,
        "rcx" => regs.rcx = value,
        "rdx" => regs.rdx = value,
        "rsi" => regs.rsi = value,
        "rdi" => regs.rdi = value,
        "orig_rax" => regs.orig_rax = value,
        "rip" => regs.rip = value,
        "cs" => regs.cs = value,
        "eflags" => regs.eflags = value,
        "rsp" => regs.rsp = value,
        "ss" => regs.ss = value,
        "fs_base" => regs.fs_base = value,
        "gs_base" => regs.gs_base = value,
        "ds" => regs.ds = value,
        "es" => regs.es = value,
        "fs" => regs.fs = value,
        "gs" => regs.gs = value,
        _ => return false,
    }
    true
}

/// レジスタアクセス
pub struct Registers {
    pid: Pid,
}

impl Registers {
    /// レジスタアクセスを作成する
    pub fn new(pid: i32) -> Self {
        Self {
            pid: Pid::from_raw(pid),
        }
    }

    /// 全レジスタを読み取る
    pub fn read(&self) -> Result<RegisterSnapshot> {
        Ok(ptrace::getregs(self.pid)?)
    }

    /// 全レジスタを書き込む
    pub fn write(&self, regs: RegisterSnapshot) -> Result<()> {
        ptrace::setregs(self.pid, regs)?;
        Ok(())
    }

    /// プログラムカウンタ（RIP）を取得する
    pub fn get_pc(&self) -> Result<u64> {
        Ok(self.read()?.rip)
    }

    /// プログラムカウンタ（RIP）を設定する
    pub fn set_pc(&self, pc: u64) -> Result<()> {
        let mut regs = self.read()?;
        regs.rip = pc;
        self.write(regs)
    }

    /// フレームベース（RBP）を取得する
    pub fn get_frame_pointer(&self) -> Result<u64> {
        Ok(self.read()?.rbp)
    }

    /// スタックポインタ（RSP）を取得する
    pub fn get_stack_pointer(&self) -> Result<u64> {
        Ok(self.read()?.rsp)
    }

    /// 名前でレジスタ値を読み取る
    pub fn read_by_name(&self, name: &str) -> Result<Option<u64>> {
        let regs = self.read()?;
        Ok(value_of(&regs, name))
    }

    /// 名前でレジスタ値を書き込む
    ///
    /// 未知の名前の場合はfalseを返します。
    pub fn write_by_name(&self, name: &str, value: u64) -> Result<bool> {
        let mut regs = self.read()?;
        if !set_value(&mut regs, name, value) {
            return Ok(false);
        }
        self.write(regs)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zeroed_regs() -> RegisterSnapshot {
        unsafe { std::mem::zeroed() }
    }

    #[test]
    fn test_value_of_known_names() {
        let mut regs = zeroed_regs();
        regs.rip = 0x4000_1234;
        regs.rsp = 0x7fff_0000;

        assert_eq!(value_of(&regs, "rip"), Some(0x4000_1234));
        assert_eq!(value_of(&regs, "rsp"), Some(0x7fff_0000));
        assert_eq!(value_of(&regs, "rax"), Some(0));
        assert_eq!(value_of(&regs, "xyz"), None);
    }

    #[test]
    fn test_set_value_round_trip() {
        let mut regs = zeroed_regs();

        assert!(set_value(&mut regs, "rbx", 42));
        assert_eq!(value_of(&regs, "rbx"), Some(42));

        assert!(!set_value(&mut regs, "not_a_register", 1));
    }

    #[test]
    fn test_every_listed_name_resolves() {
        let regs = zeroed_regs();
        for name in REGISTER_NAMES {
            assert!(value_of(&regs, name).is_some(), "unknown register {}", name);
        }
    }
}
