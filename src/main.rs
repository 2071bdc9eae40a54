use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use typesh::driver::{self, CompileOptions, Mode};
use typesh::optimizer::OptimizerOptions;
use typesh::target::TargetShell;

#[derive(Parser, Debug)]
#[command(name = "typeshc")]
#[command(version)]
#[command(about = "Compile a typed typesh syntax tree (JSON) to a shell script", long_about = None)]
struct Args {
    /// Syntax tree produced by the typesh parser
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output shell dialect
    #[arg(long, value_name = "bash|posix", default_value_t = TargetShell::Posix)]
    target: TargetShell,

    /// Write the script to a file instead of stdout
    #[arg(short, long, value_name = "FILE", conflicts_with_all = ["check", "emit_ast"])]
    out: Option<PathBuf>,

    /// Check semantics without emitting code
    #[arg(long, conflicts_with_all = ["emit_ast", "emit_sh"])]
    check: bool,

    /// Print the optimized syntax tree as JSON
    #[arg(long, conflicts_with = "emit_sh")]
    emit_ast: bool,

    /// Print the shell script (default)
    #[arg(long)]
    emit_sh: bool,

    /// Disable constant folding
    #[arg(long)]
    no_fold: bool,

    /// Disable constant propagation
    #[arg(long)]
    no_propagate: bool,

    /// Do not set the executable bit on the output file
    #[arg(long, requires = "out")]
    no_chmod_x: bool,

    /// Log pipeline stages to stderr
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn mode(&self) -> Mode {
        if self.check {
            Mode::Check
        } else if self.emit_ast {
            Mode::EmitAst
        } else if self.emit_sh {
            Mode::EmitSh
        } else {
            Mode::Default
        }
    }

    fn options(&self) -> CompileOptions {
        CompileOptions {
            target: self.target,
            mode: self.mode(),
            optimizer: OptimizerOptions {
                constant_propagation: !self.no_propagate,
                constant_folding: !self.no_fold,
            },
            out_path: self.out.clone(),
            chmod_x: !self.no_chmod_x,
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "typesh=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match driver::compile_file(&args.input, &args.options()) {
        Ok(compiled) => {
            if !compiled.diagnostics.is_empty() {
                eprintln!("{}", compiled.diagnostics.render(Some(&args.input.display().to_string())));
            }
            if !compiled.output.is_empty() {
                print!("{}", compiled.output);
                if !compiled.output.ends_with('\n') {
                    println!();
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
