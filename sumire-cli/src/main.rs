//! Sumire CLI - コマンドラインインターフェース
//!
//! ネイティブLinux実行ファイル向けソースレベルデバッガ sumire の
//! REPLインターフェース

use anyhow::Result;
use clap::{Parser, Subcommand};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use sumire_core::{BreakLocation, Command, Debugger, StopEvent};
use sumire_target::{registers, REGISTER_NAMES};

/// Sumire - Source-level Debugger
#[derive(Parser)]
#[command(name = "sumire")]
#[command(version = "0.1.0")]
#[command(about = "Source-level debugger for native Linux executables", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: DebugCommand,
}

#[derive(Subcommand)]
enum DebugCommand {
    /// Launch and debug an executable
    Run {
        /// Path to the executable binary
        binary: String,

        /// Arguments to pass to the program
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Attach to an existing process
    Attach {
        /// Path to the executable binary
        binary: String,

        /// Process ID to attach to
        #[arg(short, long)]
        pid: i32,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut debugger = init_debugger(cli.command)?;
    run_repl(&mut debugger)?;

    Ok(())
}

/// デバッガを初期化してプロセスを起動またはアタッチする
///
/// 失敗した場合はエラーを返し、プロセスは非ゼロの終了コードで
/// 終了します。
fn init_debugger(command: DebugCommand) -> Result<Debugger> {
    let debugger = match command {
        DebugCommand::Run { binary, args } => {
            println!("Launching: {}", binary);
            let debugger = Debugger::launch(&binary, &args)?;
            println!("Process {} stopped at first instruction", debugger.pid());
            debugger
        }
        DebugCommand::Attach { binary, pid } => {
            println!("Attaching to process {}", pid);
            let debugger = Debugger::attach(&binary, pid)?;
            println!("Attached to process {}", pid);
            debugger
        }
    };
    println!("Type 'help' for available commands, 'quit' to exit.");
    println!();
    Ok(debugger)
}

/// REPLループを実行する
fn run_repl(debugger: &mut Debugger) -> Result<()> {
    let mut rl = DefaultEditor::new()?;

    loop {
        let readline = rl.readline("(sumire) ");
        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                rl.add_history_entry(line)?;

                let Some(command) = Command::parse(line) else {
                    println!("Unknown command: {}", line);
                    println!("Type 'help' for available commands.");
                    continue;
                };

                if command == Command::Quit {
                    break;
                }

                if let Err(e) = handle_command(debugger, command) {
                    eprintln!("Error: {}", e);
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}

/// パース済みコマンドをコアに対して実行する
fn handle_command(debugger: &mut Debugger, command: Command) -> Result<()> {
    match command {
        Command::Continue => {
            let event = debugger.continue_execution()?;
            report_stop(debugger, &event);
        }
        Command::Break(location) => handle_break(debugger, location)?,
        Command::Delete(addr) => {
            debugger.remove_breakpoint(addr)?;
            println!("Breakpoint deleted at {:#x}", addr);
        }
        Command::StepInto => {
            let event = debugger.step_into()?;
            report_stop(debugger, &event);
        }
        Command::StepOver => {
            let event = debugger.step_over()?;
            report_stop(debugger, &event);
        }
        Command::StepOut => {
            let event = debugger.step_out()?;
            report_stop(debugger, &event);
        }
        Command::StepInstruction => {
            let event = debugger.single_step_instruction()?;
            report_stop(debugger, &event);
        }
        Command::RegisterRead(name) => match debugger.read_register(&name)? {
            Some(value) => println!("{:<10} {:#018x}", name, value),
            None => println!("Unknown register: {}", name),
        },
        Command::RegisterWrite(name, value) => {
            if !debugger.write_register(&name, value)? {
                println!("Unknown register: {}", name);
            }
        }
        Command::RegisterDump => {
            let regs = debugger.register_snapshot()?;
            for name in REGISTER_NAMES {
                if let Some(value) = registers::value_of(&regs, name) {
                    println!("{:<10} {:#018x}", name, value);
                }
            }
        }
        Command::MemoryRead(addr) => {
            let word = debugger.read_memory_word(addr)?;
            println!("{:#x}: {:#018x}", addr, word);
        }
        Command::MemoryWrite(addr, value) => {
            debugger.write_memory_word(addr, value)?;
        }
        Command::Help => print_help(),
        Command::Quit => {}
    }

    Ok(())
}

/// Breakコマンドを処理する
fn handle_break(debugger: &mut Debugger, location: BreakLocation) -> Result<()> {
    match location {
        BreakLocation::Address(addr) => {
            debugger.set_breakpoint_at_address(addr)?;
            println!("Breakpoint set at {:#x}", addr);
        }
        BreakLocation::Function(name) => {
            let addr = debugger.set_breakpoint_at_function(&name)?;
            println!("Breakpoint set at {:#x} ({})", addr, name);
        }
        BreakLocation::Line { file, line } => {
            let addr = debugger.set_breakpoint_at_line(&file, line)?;
            println!("Breakpoint set at {:#x} ({}:{})", addr, file, line);
        }
    }
    Ok(())
}

/// 停止イベントを表示する
fn report_stop(debugger: &Debugger, event: &StopEvent) {
    match event {
        StopEvent::BreakpointHit { address, location } => {
            println!("Breakpoint hit at {:#x}", address);
            if let Some(loc) = location {
                println!("  at {}:{}", loc.file, loc.line);
            }
            if let Some(func) = debugger.resolver().address_to_function(*address) {
                println!("  in function {}", func.name);
            }
        }
        StopEvent::SingleStepTrap => {
            print_position(debugger);
        }
        StopEvent::Signaled { signal, code } => {
            println!("Process stopped by signal {:?} (code {})", signal, code);
        }
        StopEvent::Exited { code } => {
            println!("Process exited with code {}", code);
        }
    }
}

/// 現在位置（PCとソース行）を表示する
fn print_position(debugger: &Debugger) {
    let Ok(pc) = debugger.get_pc() else {
        return;
    };
    print!("Stopped at {:#x}", pc);
    if let Some(row) = debugger.resolver().address_to_line(pc) {
        print!(" ({}:{})", row.file, row.line);
    }
    if let Some(func) = debugger.resolver().address_to_function(pc) {
        print!(" in {}", func.name);
    }
    println!();
}

fn print_help() {
    println!("Available commands:");
    println!();
    println!("  continue (c)             - Continue execution until the next stop");
    println!("  break <0xADDR>           - Set breakpoint at address");
    println!("  break <function>         - Set breakpoint at function entry");
    println!("  break <file:line>        - Set breakpoint at source line");
    println!("  delete <0xADDR>          - Remove breakpoint");
    println!("  step (s)                 - Step one source line, entering calls");
    println!("  next (n)                 - Step one source line, over calls");
    println!("  finish (f)               - Run until the current function returns");
    println!("  stepi (si)               - Step one machine instruction");
    println!("  register dump            - Dump all registers");
    println!("  register read <name>     - Read a register");
    println!("  register write <name> <0xVAL> - Write a register");
    println!("  memory read <0xADDR>     - Read a word of memory");
    println!("  memory write <0xADDR> <0xVAL> - Write a word of memory");
    println!("  help                     - Show this help message");
    println!("  quit (q)                 - Exit the debugger");
}
