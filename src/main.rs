use std::fs;
use std::path::{Path, PathBuf};
use std::process::{self, Command};

use bplc::{CompileError, CompileResult};
use clap::Parser;
use log::{LevelFilter, debug, info};

/// Compile a BPL program to x86-64 assembly and link it with the C toolchain.
#[derive(Parser, Debug)]
#[command(name = "bplc", version, about, long_about = None)]
struct Cli {
  /// Source file to compile
  #[arg(value_name = "INFILE")]
  input: PathBuf,

  /// Stop after writing the assembly file
  #[arg(short = 'S')]
  assembly_only: bool,

  /// Name of the executable (defaults to the input file stem)
  #[arg(short, long, value_name = "NAME")]
  output: Option<PathBuf>,

  /// Assembler and linker driver
  #[arg(long, value_name = "PROGRAM", env = "BPLC_CC", default_value = "cc")]
  cc: String,

  /// Increase log verbosity (-v debug, -vv trace)
  #[arg(short, long, action = clap::ArgAction::Count)]
  verbose: u8,
}

impl Cli {
  fn executable(&self) -> PathBuf {
    match &self.output {
      Some(path) => path.clone(),
      None => PathBuf::from(self.input.file_stem().unwrap_or(self.input.as_os_str())),
    }
  }

  /// Paths of the assembly file and, unless `-S`, the executable.
  fn outputs(&self) -> CompileResult<(PathBuf, Option<PathBuf>)> {
    let executable = self.executable();
    let asm_path = executable.with_extension("s");
    if self.assembly_only {
      return Ok((asm_path, None));
    }
    if asm_path == executable {
      return Err(CompileError::OutputClash { path: executable });
    }
    Ok((asm_path, Some(executable)))
  }
}

fn init_logging(verbose: u8) {
  let level = match verbose {
    0 => LevelFilter::Warn,
    1 => LevelFilter::Debug,
    _ => LevelFilter::Trace,
  };
  env_logger::Builder::new()
    .filter_level(level)
    .parse_default_env()
    .format_timestamp(None)
    .init();
}

fn assemble(cc: &str, asm_path: &Path, executable: &Path) -> CompileResult<()> {
  debug!("running {cc} {} -o {}", asm_path.display(), executable.display());
  let status = Command::new(cc)
    .arg(asm_path)
    .arg("-o")
    .arg(executable)
    .status()
    .map_err(|err| CompileError::Toolchain {
      program: cc.to_string(),
      message: err.to_string(),
    })?;
  if !status.success() {
    return Err(CompileError::Toolchain {
      program: cc.to_string(),
      message: format!("exited with {status}"),
    });
  }
  Ok(())
}

fn run(cli: &Cli, source: &str) -> CompileResult<()> {
  let (asm_path, executable) = cli.outputs()?;
  let asm = bplc::generate_assembly(source)?;

  fs::write(&asm_path, asm).map_err(|source| CompileError::Io {
    path: asm_path.clone(),
    source,
  })?;
  info!("wrote {}", asm_path.display());

  if let Some(executable) = executable {
    assemble(&cli.cc, &asm_path, &executable)?;
    info!("linked {}", executable.display());
  }
  Ok(())
}

fn main() {
  let cli = Cli::parse();
  init_logging(cli.verbose);

  let file = cli.input.display().to_string();
  let source = match fs::read_to_string(&cli.input) {
    Ok(source) => source,
    Err(source) => {
      let err = CompileError::Io {
        path: cli.input.clone(),
        source,
      };
      eprintln!("{err}");
      process::exit(1);
    }
  };

  if let Err(err) = run(&cli, &source) {
    eprintln!("{}", err.render(&file, &source));
    process::exit(1);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn cli(args: &[&str]) -> Cli {
    Cli::parse_from(std::iter::once("bplc").chain(args.iter().copied()))
  }

  #[test]
  fn outputs_default_to_the_input_stem() {
    let (asm, exe) = cli(&["dir/prog.bpl"]).outputs().unwrap();
    assert_eq!(asm, PathBuf::from("prog.s"));
    assert_eq!(exe, Some(PathBuf::from("prog")));
  }

  #[test]
  fn assembly_only_writes_just_the_s_file() {
    let (asm, exe) = cli(&["-S", "-o", "out.s", "prog.bpl"]).outputs().unwrap();
    assert_eq!(asm, PathBuf::from("out.s"));
    assert_eq!(exe, None);
  }

  #[test]
  fn executable_named_like_the_assembly_is_rejected() {
    let err = cli(&["-o", "prog.s", "prog.bpl"]).outputs().unwrap_err();
    assert!(matches!(err, CompileError::OutputClash { .. }));
  }
}
