use clap::Parser as ClapParser;
use loxide::interpreter::Interpreter;
use loxide::App;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::{fs, process};

#[derive(ClapParser, Debug)]
#[command(version, about = "Tree-walking interpreter for the Lox language", long_about = None)]
struct Cli {
    /// Script to execute; omit to start an interactive prompt.
    script: Option<PathBuf>,
}

fn main() {
    env_logger::init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            // Usage problems keep the conventional exit code.
            eprintln!("{}", error);
            process::exit(64);
        }
    };

    let app = App::new();
    let mut interpreter = Interpreter::new(&app.interner);

    match cli.script {
        Some(path) => run_file(&app, &mut interpreter, &path),
        None => run_prompt(&app, &mut interpreter),
    }
}

fn run_file(app: &App, interpreter: &mut Interpreter, path: &Path) {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(error) => {
            eprintln!("Error: could not open file {}: {}", path.display(), error);
            process::exit(66);
        }
    };

    app.run(interpreter, &source);

    if app.had_error() {
        process::exit(65);
    }
    if app.had_runtime_error() {
        process::exit(70);
    }
}

fn run_prompt(app: &App, interpreter: &mut Interpreter) {
    let stdin = io::stdin();
    let mut handle = stdin.lock();
    let mut line = String::with_capacity(1024);

    loop {
        print!("> ");
        io::stdout().flush().expect("Could not flush stdout");

        line.clear();
        match handle.read_line(&mut line) {
            // EOF: the user is done with the prompt.
            Ok(0) => break,
            Ok(_) => {
                app.run_repl(interpreter, &line);
                app.clear_errors();
            }
            Err(error) => {
                eprintln!("Error: {}", error);
                process::exit(70);
            }
        }
    }
}
