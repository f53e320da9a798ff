use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::{Config, Editor};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use veld::config::{
    Options, HISTORY_FILE, VERSION, WELCOME_FOOTER, WELCOME_MESSAGE, WELCOME_SUBTITLE,
};
use veld::eval::Interpreter;
use veld::helper::VeldHelper;

/// Veld interpreter with a REPL and a script runner
#[derive(Parser, Debug)]
#[command(name = "veld")]
#[command(version = VERSION)]
#[command(about = "A tree-walking interpreter for the Veld scripting language")]
struct CliArgs {
    /// Script file to execute (optional - if not provided, starts REPL)
    #[arg(value_name = "FILE")]
    script: Option<PathBuf>,

    /// Expose host-facing built-ins such as input()
    #[arg(long = "unsafe")]
    unsafe_mode: bool,

    /// Scan, parse, and resolve only; do not evaluate
    #[arg(long = "no-run")]
    no_run: bool,
}

fn main() -> ExitCode {
    let args = CliArgs::parse();
    let options = Options {
        unsafe_mode: args.unsafe_mode,
    };

    match &args.script {
        Some(path) => run_script(path, options, args.no_run),
        None => run_repl(options, args.no_run),
    }
}

/// Script mode: run the whole file, then exit 0, 65 (static error), or 70
/// (runtime error).
fn run_script(path: &Path, options: Options, check_only: bool) -> ExitCode {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(error) => {
            eprintln!("Cannot read script file {}: {}", path.display(), error);
            return ExitCode::from(74);
        }
    };

    let mut interpreter = Interpreter::new(options);
    let result = if check_only {
        interpreter.check(&source)
    } else {
        interpreter.run(&source)
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error.report();
            ExitCode::from(error.exit_code() as u8)
        }
    }
}

/// REPL mode: errors abort only the current construct and the session
/// continues.
fn run_repl(options: Options, check_only: bool) -> ExitCode {
    let mut interpreter = Interpreter::new(options);

    let config = Config::builder().auto_add_history(true).build();
    let mut rl = match Editor::with_config(config) {
        Ok(editor) => editor,
        Err(error) => {
            eprintln!("Failed to initialize REPL: {error}");
            return ExitCode::FAILURE;
        }
    };
    rl.set_helper(Some(VeldHelper::new()));
    let _ = rl.load_history(HISTORY_FILE);

    println!("{WELCOME_MESSAGE}");
    println!("{WELCOME_SUBTITLE}");
    println!("{WELCOME_FOOTER}");

    // Bare expression results echo only on a real terminal
    let interactive = std::io::stdin().is_terminal();

    loop {
        match rl.readline("veld> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let result = if check_only {
                    interpreter.check(&line)
                } else if interactive {
                    interpreter.run_interactive(&line)
                } else {
                    interpreter.run(&line)
                };
                if let Err(error) = result {
                    error.report();
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!();
                break;
            }
            Err(error) => {
                eprintln!("Error: {error}");
                break;
            }
        }
    }

    let _ = rl.save_history(HISTORY_FILE);
    ExitCode::SUCCESS
}
