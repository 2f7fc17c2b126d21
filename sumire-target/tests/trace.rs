//! 実プロセスに対するターゲット制御の結合テスト
//!
//! どのLinux環境にもある /bin/true, /bin/sleep をトレーシーとして使い、
//! 起動・停止・メモリ・レジスタ・ブレークポイントのパッチ適用を
//! 実機で検証します。

use nix::sys::wait::WaitStatus;
use sumire_target::{
    Memory, Process, ProcessState, Registers, SoftwareBreakpoint, TargetError, TRAP_OPCODE,
};

fn find_binary(candidates: &[&str]) -> String {
    candidates
        .iter()
        .find(|p| std::path::Path::new(p).exists())
        .unwrap_or_else(|| panic!("none of {:?} exists", candidates))
        .to_string()
}

fn true_binary() -> String {
    find_binary(&["/bin/true", "/usr/bin/true"])
}

fn sleep_binary() -> String {
    find_binary(&["/bin/sleep", "/usr/bin/sleep"])
}

#[test]
fn test_launch_stops_at_first_instruction() {
    let mut process = Process::launch(true_binary(), &[]).unwrap();
    assert_eq!(process.state(), ProcessState::Created);

    let registers = Registers::new(process.pid());
    let pc = registers.get_pc().unwrap();
    assert_ne!(pc, 0);

    // 停止中はコードメモリが読めること
    let memory = Memory::new(process.pid());
    memory.read_word(pc).unwrap();

    process.terminate().unwrap();
}

#[test]
fn test_resume_runs_to_clean_exit() {
    let mut process = Process::launch(true_binary(), &[]).unwrap();
    process.resume().unwrap();

    let status = process.wait().unwrap();
    assert!(matches!(status, WaitStatus::Exited(_, 0)), "got {:?}", status);
    assert_eq!(process.state(), ProcessState::Exited);
}

#[test]
fn test_launch_nonexistent_binary_fails() {
    let err = Process::launch("/nonexistent/no-such-binary", &[]).unwrap_err();
    assert!(matches!(err, TargetError::Launch { .. }), "got {:?}", err);
}

#[test]
fn test_attach_nonexistent_pid_fails() {
    let err = Process::attach(0x7fff_fff0).unwrap_err();
    assert!(matches!(err, TargetError::Attach { .. }), "got {:?}", err);
}

#[test]
fn test_memory_word_round_trip() {
    let mut process = Process::launch(sleep_binary(), &["30".to_string()]).unwrap();
    let memory = Memory::new(process.pid());

    // 書き込み可能なマッピングを探す
    let mappings = memory.mappings().unwrap();
    let target = mappings
        .iter()
        .find(|m| m.writable && m.end - m.start >= 16)
        .expect("no writable mapping found")
        .start;

    memory.write_word(target, 0xdeadbeef).unwrap();
    assert_eq!(memory.read_word(target).unwrap(), 0xdeadbeef);

    // 部分書き込みは隣接バイトを保存すること（read-modify-write）
    memory.write(target, &[0xaa]).unwrap();
    assert_eq!(memory.read_word(target).unwrap(), 0xdead_beaa);

    // バッファ読み書きの往復
    let data = [1u8, 2, 3, 4, 5, 6, 7, 8, 9, 10];
    memory.write(target, &data).unwrap();
    assert_eq!(memory.read(target, data.len()).unwrap(), data);

    assert!(memory.is_mapped(target).unwrap());

    process.terminate().unwrap();
}

#[test]
fn test_memory_access_error_on_unmapped_address() {
    let mut process = Process::launch(sleep_binary(), &["30".to_string()]).unwrap();
    let memory = Memory::new(process.pid());

    // どのマッピングにも属さないアドレス
    let err = memory.read_word(0x10).unwrap_err();
    assert!(
        matches!(err, TargetError::MemoryAccess { addr: 0x10, .. }),
        "got {:?}",
        err
    );

    process.terminate().unwrap();
}

#[test]
fn test_breakpoint_enable_disable_restores_word() {
    let mut process = Process::launch(sleep_binary(), &["30".to_string()]).unwrap();
    let memory = Memory::new(process.pid());
    let registers = Registers::new(process.pid());

    let pc = registers.get_pc().unwrap();
    let original = memory.read_word(pc).unwrap();

    let mut bp = SoftwareBreakpoint::new(pc);
    assert!(!bp.is_enabled());

    bp.enable(&memory).unwrap();
    assert!(bp.is_enabled());
    assert_eq!(bp.original_byte(), (original & 0xff) as u8);

    // 低位バイトだけがトラップに置き換わり、残りは保存されること
    let patched = memory.read_word(pc).unwrap();
    assert_eq!(patched & 0xff, u64::from(TRAP_OPCODE));
    assert_eq!(patched & !0xff, original & !0xff);

    // 有効化は冪等
    bp.enable(&memory).unwrap();
    assert_eq!(memory.read_word(pc).unwrap(), patched);

    // 無効化で元のワードが正確に復元されること
    bp.disable(&memory).unwrap();
    assert!(!bp.is_enabled());
    assert_eq!(memory.read_word(pc).unwrap(), original);

    // 無効化も冪等
    bp.disable(&memory).unwrap();
    assert_eq!(memory.read_word(pc).unwrap(), original);

    process.terminate().unwrap();
}

#[test]
fn test_register_snapshot_round_trip() {
    let mut process = Process::launch(sleep_binary(), &["30".to_string()]).unwrap();
    let registers = Registers::new(process.pid());

    let mut regs = registers.read().unwrap();
    let original_rbx = regs.rbx;
    regs.rbx = 0x1122_3344_5566_7788;
    registers.write(regs).unwrap();

    assert_eq!(
        registers.read_by_name("rbx").unwrap(),
        Some(0x1122_3344_5566_7788)
    );

    // 名前経由の書き込みも全スナップショットのround-trip
    assert!(registers.write_by_name("rbx", original_rbx).unwrap());
    assert_eq!(registers.read_by_name("rbx").unwrap(), Some(original_rbx));
    assert_eq!(registers.read_by_name("nosuchreg").unwrap(), None);

    process.terminate().unwrap();
}

#[test]
fn test_set_pc_round_trip() {
    let mut process = Process::launch(sleep_binary(), &["30".to_string()]).unwrap();
    let registers = Registers::new(process.pid());

    let pc = registers.get_pc().unwrap();
    registers.set_pc(pc + 4).unwrap();
    assert_eq!(registers.get_pc().unwrap(), pc + 4);

    process.terminate().unwrap();
}

#[test]
fn test_attach_to_child_process() {
    let mut child = std::process::Command::new(sleep_binary())
        .arg("30")
        .spawn()
        .unwrap();

    let mut process = Process::attach(child.id() as i32).unwrap();
    assert_eq!(process.state(), ProcessState::Stopped);

    let registers = Registers::new(process.pid());
    assert_ne!(registers.get_pc().unwrap(), 0);

    process.terminate().unwrap();
    let _ = child.wait();
}

#[test]
fn test_terminate_is_idempotent() {
    let mut process = Process::launch(sleep_binary(), &["30".to_string()]).unwrap();

    process.terminate().unwrap();
    assert_eq!(process.state(), ProcessState::Exited);

    // 2回目も成功し、状態は変わらない
    process.terminate().unwrap();
    assert_eq!(process.state(), ProcessState::Exited);
}
