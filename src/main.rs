#![warn(clippy::all)]

use accu::ast::Program;
use accu::diagnostic::{ansi::AnsiRenderer, json, Diagnostic};

#[derive(Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Ansi,
    Text,
    Json,
}

/// Scan args for --json/-j, --text/-t, --ansi/-a. Return (mode, remaining_args).
/// Multiple format flags → error + exit(1).
fn detect_output_mode(args: Vec<String>) -> (OutputMode, Vec<String>) {
    let mut mode: Option<OutputMode> = None;
    let mut remaining = Vec::with_capacity(args.len());
    let mut conflict = false;

    for arg in args {
        match arg.as_str() {
            "--json" | "-j" => {
                if mode.is_some() { conflict = true; } else { mode = Some(OutputMode::Json); }
            }
            "--text" | "-t" => {
                if mode.is_some() { conflict = true; } else { mode = Some(OutputMode::Text); }
            }
            "--ansi" | "-a" => {
                if mode.is_some() { conflict = true; } else { mode = Some(OutputMode::Ansi); }
            }
            _ => remaining.push(arg),
        }
    }

    if conflict {
        eprintln!("error: --json, --text, and --ansi are mutually exclusive");
        std::process::exit(1);
    }

    let resolved = mode.unwrap_or_else(|| {
        // Auto-detect: isatty(stderr) && !NO_COLOR → Ansi; isatty && NO_COLOR → Text; !isatty → Json
        // SAFETY: isatty(2) is always safe to call with any fd value; it returns 0 on
        // error or if the fd is not a terminal. STDERR_FILENO is a well-known constant.
        let is_tty = unsafe { libc::isatty(libc::STDERR_FILENO) } != 0;
        let no_color = std::env::var("NO_COLOR").is_ok();
        if is_tty && !no_color {
            OutputMode::Ansi
        } else if is_tty {
            OutputMode::Text
        } else {
            OutputMode::Json
        }
    });

    (resolved, remaining)
}

fn report_diagnostic(d: &Diagnostic, mode: OutputMode) {
    let s = match mode {
        OutputMode::Ansi => AnsiRenderer { use_color: true }.render(d),
        OutputMode::Text => AnsiRenderer { use_color: false }.render(d),
        // JSON mode: one object per line (NDJSON) so multiple errors are parseable.
        OutputMode::Json => format!("{}\n", json::render(d)),
    };
    eprint!("{}", s);
}

fn main() {
    let raw_args: Vec<String> = std::env::args().collect();
    let (mode, args) = detect_output_mode(raw_args);

    if args.len() > 1 && (args[1] == "--version" || args[1] == "-V") {
        println!("accu {}", env!("CARGO_PKG_VERSION"));
        std::process::exit(0);
    }

    if args.len() < 3 {
        eprintln!("Usage: accu <input> <output>");
        eprintln!("  <input>   AST of the source program as JSON, from the upstream parser");
        eprintln!("  <output>  target file for the VM program, one instruction per line");
        std::process::exit(1);
    }

    let source = match std::fs::read_to_string(&args[1]) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading {}: {}", args[1], e);
            std::process::exit(1);
        }
    };

    let program: Program = match serde_json::from_str(&source) {
        Ok(p) => p,
        Err(e) => {
            let d = Diagnostic::error(format!("malformed AST document: {e}")).with_code("ACC-P001");
            report_diagnostic(&d, mode);
            std::process::exit(1);
        }
    };

    let code = match accu::compile(&program) {
        Ok(code) => code,
        Err(e) => {
            report_diagnostic(&Diagnostic::from(&e), mode);
            std::process::exit(1);
        }
    };

    // The output file exists only for accepted programs.
    if let Err(e) = std::fs::write(&args[2], code.serialize()) {
        eprintln!("Error writing {}: {}", args[2], e);
        std::process::exit(1);
    }
}
