use std::io::{self, BufRead, Write};
use std::{env, fs, process::ExitCode};

use lox::{Diagnostics, Lox, StdPrint};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    match args.len() {
        1 => run_prompt(),
        2 => run_file(&args[1]),
        _ => {
            println!("Usage: lox [script]");
            ExitCode::from(64)
        }
    }
}

fn run_file(path: &str) -> ExitCode {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error reading {path}: {err}");
            return ExitCode::from(66);
        }
    };

    let mut lox = Lox::new();
    let mut diagnostics = Diagnostics::new();
    lox.run(&source, &mut StdPrint, &mut diagnostics);

    if diagnostics.had_error() {
        ExitCode::from(65)
    } else if diagnostics.had_runtime_error() {
        ExitCode::from(70)
    } else {
        ExitCode::SUCCESS
    }
}

fn run_prompt() -> ExitCode {
    let mut lox = Lox::new();
    let mut diagnostics = Diagnostics::new();
    let stdin = io::stdin();

    loop {
        print!("> ");
        if io::stdout().flush().is_err() {
            return ExitCode::SUCCESS;
        }

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => return ExitCode::SUCCESS, // EOF
            Ok(_) => {
                lox.run(&line, &mut StdPrint, &mut diagnostics);
                diagnostics.reset_error();
            }
            Err(err) => {
                eprintln!("error reading stdin: {err}");
                return ExitCode::from(74);
            }
        }
    }
}
