use crate::ast::Program;
use crate::codegen::{self, CodegenOptions, Unsupported};
use crate::diagnostics::DiagnosticBag;
use crate::error::CompileError;
use crate::optimizer::{self, OptimizerOptions};
use crate::semantics;
use crate::target::TargetShell;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Emit the script (same as `EmitSh`).
    #[default]
    Default,
    Check,
    EmitAst,
    EmitSh,
}

#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub target: TargetShell,
    pub mode: Mode,
    pub optimizer: OptimizerOptions,
    pub out_path: Option<PathBuf>,
    pub chmod_x: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            target: TargetShell::Posix,
            mode: Mode::Default,
            optimizer: OptimizerOptions::default(),
            out_path: None,
            chmod_x: false,
        }
    }
}

/// Everything one run of the pipeline produced.
#[derive(Debug)]
pub struct CompileOutput {
    pub diagnostics: DiagnosticBag,
    /// Tree after optimization; `None` when analysis failed.
    pub program: Option<Program>,
    /// Script text; `None` when analysis failed or generation was skipped.
    pub script: Option<String>,
    pub unsupported: Vec<Unsupported>,
}

/// Successful result of [`compile_file`]: text for stdout plus non-fatal diagnostics.
#[derive(Debug)]
pub struct Compiled {
    pub output: String,
    pub diagnostics: DiagnosticBag,
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("unable to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write to {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed syntax tree in {}: {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{rendered}")]
    Rejected { rendered: String, errors: usize },
    #[error("{}", render_unsupported(.0))]
    Unsupported(Vec<Unsupported>),
    #[error(transparent)]
    Compile(#[from] CompileError),
}

fn render_unsupported(items: &[Unsupported]) -> String {
    items.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n")
}

impl DriverError {
    pub fn exit_code(&self) -> i32 {
        match self {
            DriverError::Read { .. } | DriverError::Write { .. } => 1,
            _ => 2,
        }
    }
}

/// Analyze, optimize and (unless only checking) generate. Analysis errors stop
/// the pipeline but are returned, not raised.
pub fn compile_program(program: &Program, options: &CompileOptions) -> Result<CompileOutput, CompileError> {
    let analysis = semantics::analyze(program);
    info!(
        errors = analysis.diagnostics.errors().count(),
        warnings = analysis.diagnostics.warnings().count(),
        "semantic analysis finished"
    );
    if analysis.diagnostics.has_errors() {
        return Ok(CompileOutput {
            diagnostics: analysis.diagnostics,
            program: None,
            script: None,
            unsupported: Vec::new(),
        });
    }

    let optimized = optimizer::optimize(program, options.optimizer);
    debug!(optimizer = ?options.optimizer, "optimizer finished");

    let (script, unsupported) = match options.mode {
        Mode::Check | Mode::EmitAst => (None, Vec::new()),
        Mode::Default | Mode::EmitSh => {
            let generated = codegen::generate(&optimized, &analysis.symbols, CodegenOptions { target: options.target })?;
            info!(
                bytes = generated.text.len(),
                unsupported = generated.unsupported.len(),
                target = %options.target,
                "code generation finished"
            );
            (Some(generated.text), generated.unsupported)
        }
    };
    Ok(CompileOutput {
        diagnostics: analysis.diagnostics,
        program: Some(optimized),
        script,
        unsupported,
    })
}

pub fn read_program(path: &Path) -> Result<Program, DriverError> {
    let text = std::fs::read_to_string(path).map_err(|source| DriverError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), bytes = text.len(), "loaded syntax tree");
    serde_json::from_str(&text).map_err(|source| DriverError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

pub fn compile_file(path: &Path, options: &CompileOptions) -> Result<Compiled, DriverError> {
    let program = read_program(path)?;
    let output = compile_program(&program, options)?;
    if output.diagnostics.has_errors() {
        return Err(DriverError::Rejected {
            rendered: output.diagnostics.render(Some(&path.display().to_string())),
            errors: output.diagnostics.errors().count(),
        });
    }
    if !output.unsupported.is_empty() {
        return Err(DriverError::Unsupported(output.unsupported));
    }

    let text = match options.mode {
        Mode::Check => "OK".to_string(),
        Mode::EmitAst => {
            let tree = output.program.unwrap_or_default();
            serde_json::to_string_pretty(&tree).map_err(|source| DriverError::Malformed {
                path: path.to_path_buf(),
                source,
            })?
        }
        Mode::Default | Mode::EmitSh => output.script.unwrap_or_default(),
    };

    let emitted = matches!(options.mode, Mode::Default | Mode::EmitSh);
    let output_text = match (&options.out_path, emitted) {
        (Some(out_path), true) => {
            write_script(out_path, &text, options.chmod_x)?;
            String::new()
        }
        _ => text,
    };
    Ok(Compiled {
        output: output_text,
        diagnostics: output.diagnostics,
    })
}

fn write_script(out_path: &Path, text: &str, chmod_x: bool) -> Result<(), DriverError> {
    std::fs::write(out_path, text).map_err(|source| DriverError::Write {
        path: out_path.to_path_buf(),
        source,
    })?;
    #[cfg(unix)]
    {
        if chmod_x {
            if let Ok(metadata) = std::fs::metadata(out_path) {
                let mut perms = metadata.permissions();
                perms.set_mode(perms.mode() | 0o111);
                let _ = std::fs::set_permissions(out_path, perms);
            }
        }
    }
    #[cfg(not(unix))]
    let _ = chmod_x;
    debug!(path = %out_path.display(), "wrote script");
    Ok(())
}
