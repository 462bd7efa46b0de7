//! Assemble, link and run compiled programs with the host C toolchain.
//!
//! Every case is skipped when the host is not x86-64 Linux or no `cc` is
//! available.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

fn toolchain_available() -> bool {
  if !cfg!(all(target_arch = "x86_64", target_os = "linux")) {
    return false;
  }
  Command::new("cc")
    .arg("--version")
    .stdout(Stdio::null())
    .stderr(Stdio::null())
    .status()
    .map(|status| status.success())
    .unwrap_or(false)
}

fn compile_and_run(name: &str, file: &str, input: &str) -> Option<Output> {
  if !toolchain_available() {
    eprintln!("skipping {name}: no x86-64 Linux toolchain");
    return None;
  }

  let manifest = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
  let source = fs::read_to_string(manifest.join("tests").join("programs").join(file))
    .unwrap_or_else(|err| panic!("reading {file}: {err}"));
  let asm = bplc::generate_assembly(&source).unwrap_or_else(|err| panic!("{}", err.render(file, &source)));

  let dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("runtime");
  fs::create_dir_all(&dir).unwrap();
  let asm_path = dir.join(format!("{name}.s"));
  let exe_path = dir.join(name);
  fs::write(&asm_path, asm).unwrap();

  let status = Command::new("cc")
    .arg(&asm_path)
    .arg("-o")
    .arg(&exe_path)
    .status()
    .unwrap();
  assert!(status.success(), "cc failed for {file}");

  let mut child = Command::new(&exe_path)
    .stdin(Stdio::piped())
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .spawn()
    .unwrap();
  // A program that never reads may exit before its input is written.
  let _ = child.stdin.take().unwrap().write_all(input.as_bytes());
  Some(child.wait_with_output().unwrap())
}

macro_rules! success_tests {
  ($({ name: $name:ident, file: $file:literal, $(input: $input:literal,)? expected: $expected:literal $(,)? }),* $(,)?) => {
    $(
      #[test]
      fn $name() {
        #[allow(unused_assignments, unused_mut)]
        let mut input = "";
        $(input = $input;)?
        let Some(output) = compile_and_run(stringify!($name), $file, input) else {
          return;
        };
        assert!(output.status.success(), "{} exited with {}", $file, output.status);
        assert_eq!(String::from_utf8_lossy(&output.stdout), $expected);
      }
    )*
  };
}

macro_rules! runtime_error_tests {
  ($({ name: $name:ident, file: $file:literal, expected: $expected:literal $(,)? }),* $(,)?) => {
    $(
      #[test]
      fn $name() {
        let Some(output) = compile_and_run(stringify!($name), $file, "") else {
          return;
        };
        assert_eq!(output.status.code(), Some(1));
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains($expected), "unexpected output {stdout:?}");
      }
    )*
  };
}

success_tests! {
  {
    name: factorial,
    file: "factorial.bpl",
    expected: "120 \n",
  },
  {
    name: sixty_four_bit_arithmetic,
    file: "big_numbers.bpl",
    expected: "8589934592 \n4500000000 \n1000000000 \n-3 \n",
  },
  {
    name: in_bounds_indices,
    file: "array_in_bounds.bpl",
    expected: "6 \n",
  },
  {
    name: pointer_parameters_write_through,
    file: "pointers.bpl",
    expected: "70 \n0 1 4 9 16 \n0 10 40 90 160 \n",
  },
  {
    name: locals_shadow_globals,
    file: "scopes.bpl",
    expected: "5 1 6 \n",
  },
  {
    name: shadowed_global_written_through_pointer,
    file: "shadow_through_pointer.bpl",
    expected: "3 9 \n",
  },
  {
    name: arguments_keep_their_order,
    file: "arguments.bpl",
    expected: "5 1234 \n",
  },
  {
    name: read_integers,
    file: "echo_sum.bpl",
    input: "40 2\n",
    expected: "42 \n",
  },
  {
    name: string_values,
    file: "strings.bpl",
    expected: "hello zero many hello \n",
  },
}

runtime_error_tests! {
  {
    name: index_past_the_end_traps,
    file: "array_overflow.bpl",
    expected: "0 1 2 You fell off the end of an array.\n",
  },
  {
    name: negative_index_traps,
    file: "negative_index.bpl",
    expected: "5 You fell off the end of an array.\n",
  },
}
