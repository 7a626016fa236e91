//! Nozoki CLI - コマンドラインインターフェース
//!
//! 停止中のプロセスのヒープオブジェクトを調べる nozoki のワンショット/REPLインターフェース

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use nozoki_core::parse::{parse_address, parse_instance_type};
use nozoki_core::{
    Command, InspectConfig, Inspector, ObjectKind, ObjectRequest, PointerCompression,
    PointerForm, ViewHandle,
};
use nozoki_target::{Process, ProcessMemory};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::ops::ControlFlow;
use tracing::debug;

/// Nozoki - Heap Object Inspector
#[derive(Parser)]
#[command(name = "nozoki")]
#[command(version)]
#[command(about = "Describe tagged heap objects in a stopped process", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: InspectCommand,
}

/// 解析設定のフラグ
#[derive(Args)]
struct ConfigArgs {
    /// The target was built without pointer compression
    #[arg(long, global = true)]
    no_compression: bool,

    /// Size of the pointer compression cage in bits
    #[arg(long, global = true, default_value_t = 32, value_parser = clap::value_parser!(u32).range(1..64))]
    cage_bits: u32,

    /// Map an instance type to an object kind (repeatable), e.g. 0x83=FixedArray
    #[arg(long = "instance-type", value_name = "TYPE=KIND", global = true, value_parser = parse_instance_type)]
    instance_types: Vec<(u16, ObjectKind)>,

    /// Maximum number of "moved to" redirects to follow
    #[arg(long, global = true, default_value_t = 4)]
    max_hops: usize,
}

impl ConfigArgs {
    fn to_config(&self) -> InspectConfig {
        InspectConfig {
            compression: PointerCompression {
                enabled: !self.no_compression,
                cage_bits: self.cage_bits,
            },
            instance_types: self.instance_types.iter().copied().collect(),
            max_forwarding_hops: self.max_hops,
            ..InspectConfig::default()
        }
    }
}

/// アドレスの形の指定
#[derive(Clone, Copy, ValueEnum)]
enum FormArg {
    Auto,
    Compressed,
    Uncompressed,
}

impl From<FormArg> for PointerForm {
    fn from(form: FormArg) -> Self {
        match form {
            FormArg::Auto => PointerForm::Auto,
            FormArg::Compressed => PointerForm::Compressed,
            FormArg::Uncompressed => PointerForm::Uncompressed,
        }
    }
}

#[derive(Subcommand)]
enum InspectCommand {
    /// Describe one object and exit
    Inspect {
        /// Process ID to attach to
        #[arg(short, long)]
        pid: i32,

        /// Tagged address (or Smi) of the object
        #[arg(value_parser = parse_address)]
        address: u64,

        /// Expected type of the object
        #[arg(long = "type", value_name = "TYPE")]
        type_hint: Option<String>,

        /// Any uncompressed address inside the heap, used to decompress pointers
        #[arg(long, value_parser = parse_address)]
        heap_pointer: Option<u64>,

        /// Whether the address is a compressed pointer
        #[arg(long, value_enum, default_value_t = FormArg::Auto)]
        form: FormArg,
    },

    /// Attach to a process and inspect objects interactively
    Attach {
        /// Process ID to attach to
        #[arg(short, long)]
        pid: i32,

        /// Any uncompressed address inside the heap, used to decompress pointers
        #[arg(long, value_parser = parse_address)]
        heap_pointer: Option<u64>,
    },
}

fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config = cli.config.to_config();

    match cli.command {
        InspectCommand::Inspect {
            pid,
            address,
            type_hint,
            heap_pointer,
            form,
        } => {
            let mut request = ObjectRequest::new(address).with_pointer_form(form.into());
            request.type_hint = type_hint;
            request.any_heap_pointer = heap_pointer;
            run_inspect(pid, config, &request)
        }
        InspectCommand::Attach { pid, heap_pointer } => {
            println!("Nozoki - Heap Object Inspector");
            println!("Version {}", env!("CARGO_PKG_VERSION"));
            println!();
            run_attach(pid, config, heap_pointer)
        }
    }
}

/// ログ出力を初期化する（RUST_LOG が無ければ nozoki=info）
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nozoki=info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// 1つのオブジェクトを解析して表示する
fn run_inspect(pid: i32, config: InspectConfig, request: &ObjectRequest) -> Result<()> {
    let process = Process::attach(pid)?;
    debug!("Attached to process {} for a single inspection", process.pid());
    let mut inspector = Inspector::new(process.memory(), config);

    let handle = inspector.describe(request);
    print_view(&inspector, handle)?;
    inspector.release(handle)?;
    Ok(())
}

/// REPLのセッション
struct Session {
    inspector: Inspector<ProcessMemory>,
    heap_pointer: Option<u64>,
}

/// プロセスにアタッチしてREPLループを実行する
fn run_attach(pid: i32, config: InspectConfig, heap_pointer: Option<u64>) -> Result<()> {
    let process = Process::attach(pid)?;
    debug!("Attached to process {} ({:?})", process.pid(), config.compression);
    println!("Attached to process {}", process.pid());
    println!("Type 'help' for available commands, 'quit' to exit.");
    println!();

    let mut session = Session {
        inspector: Inspector::new(process.memory(), config),
        heap_pointer,
    };
    let mut rl = DefaultEditor::new()?;

    loop {
        let readline = rl.readline("(nozoki) ");
        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                rl.add_history_entry(line)?;

                match handle_command(&mut session, line) {
                    Ok(ControlFlow::Continue(())) => {}
                    Ok(ControlFlow::Break(())) => break,
                    Err(e) => eprintln!("Error: {}", e),
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

    // processのDropでデタッチされる
    println!("Detaching from process {}", process.pid());
    Ok(())
}

fn handle_command(session: &mut Session, line: &str) -> Result<ControlFlow<()>> {
    match Command::parse(line) {
        Some(Command::Inspect { address, type_hint }) => {
            handle_inspect(session, &address, type_hint)?
        }
        Some(Command::Views) => handle_views(session),
        Some(Command::Release(id)) => {
            let handle = ViewHandle::from_raw(id);
            session.inspector.release(handle)?;
            debug!("{} views still live", session.inspector.live_views().len());
            println!("Released view {}", handle);
        }
        Some(Command::Help) => print_help(),
        Some(Command::Quit) => {
            println!("Goodbye!");
            return Ok(ControlFlow::Break(()));
        }
        None => {
            println!("Unknown command: {}", line);
            println!("Type 'help' for available commands.");
        }
    }

    Ok(ControlFlow::Continue(()))
}

/// Inspectコマンドを処理する
fn handle_inspect(session: &mut Session, address: &str, type_hint: Option<String>) -> Result<()> {
    let mut request = ObjectRequest::new(parse_address(address)?);
    request.type_hint = type_hint;
    request.any_heap_pointer = session.heap_pointer;

    let handle = session.inspector.describe(&request);
    print_view(&session.inspector, handle)
}

/// Viewsコマンドを処理する
fn handle_views(session: &Session) {
    let handles = session.inspector.live_views();
    if handles.is_empty() {
        println!("No live views");
        return;
    }

    println!("Live views ({}):", handles.len());
    for handle in handles {
        if let Ok(result) = session.inspector.result(handle) {
            println!("  {} {}", handle, result.brief());
        }
    }
}

/// 公開ビューの内容を表示する
fn print_view(inspector: &Inspector<ProcessMemory>, handle: ViewHandle) -> Result<()> {
    let result = inspector.result(handle)?;
    println!("{} {}", handle, result);
    Ok(())
}

fn print_help() {
    println!("Available commands:");
    println!();
    println!("  help              - Show this help message");
    println!("  quit/exit/q       - Detach and exit");
    println!();
    println!("Inspect commands:");
    println!("  inspect <addr> [type] - Describe the object at a tagged address");
    println!("  views             - List live views");
    println!("  release <handle>  - Release a view and everything it owns");
    println!();
    println!("Examples:");
    println!("  inspect 0x3a5c08049e71");
    println!("  inspect 0x08049e71 JSArray");
    println!("  release 1");
}
