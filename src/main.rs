mod cli;
mod config;

use clap::Parser;
use owo_colors::OwoColorize;
use std::io::{self, Read};
use std::path::Path;

use cli::{generate_completions, Args, Commands};
use config::{init_logging, AppConfig, Mode};
use toy::diagnostic::render_diagnostics;
use toy::lexer::tokenize;
use toy::{parse, parse_and_run, StdIo, ToyError};

fn main() {
    let args = Args::parse();

    if let Some(Commands::Complete { shell }) = args.command {
        generate_completions(shell);
        return;
    }

    let config = AppConfig::from_args(&args);
    init_logging(&config);

    let (source, file_name) = match read_program(&args) {
        Ok(program) => program,
        Err(message) => {
            error_message(&config, &format!("Error: {}", message));
            std::process::exit(1);
        }
    };
    tracing::debug!(file = %file_name, bytes = source.len(), mode = ?config.mode, "loaded program");

    let result = match config.mode {
        Mode::Tokens => dump_tokens(&source),
        Mode::Ast => parse(&source).map(|program| println!("{:#?}", program)).map_err(ToyError::from),
        Mode::Check => parse(&source).map(|_| ()).map_err(ToyError::from),
        Mode::Run => {
            let mut io = StdIo::new();
            parse_and_run(&source, &mut io)
        }
    };

    if let Err(err) = result {
        report_error(&config, &source, &file_name, &err);
        std::process::exit(1);
    }
}

/// Returns the program text and the name used for it in diagnostics.
fn read_program(args: &Args) -> Result<(String, String), String> {
    if let Some(path) = &args.file {
        return read_file(path).map(|source| (source, path.display().to_string()));
    }
    if let Some(program) = &args.eval {
        return Ok((program.clone(), "<eval>".to_string()));
    }
    if atty::is(atty::Stream::Stdin) {
        return Err("No program given. Pass a FILE, use -e '<program>', or pipe a program on stdin".to_string());
    }

    let mut source = String::new();
    io::stdin()
        .read_to_string(&mut source)
        .map_err(|e| format!("Failed to read stdin: {}", e))?;
    Ok((source, "<stdin>".to_string()))
}

fn read_file(path: &Path) -> Result<String, String> {
    std::fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path.display(), e))
}

fn dump_tokens(source: &str) -> Result<(), ToyError> {
    let tokens = tokenize(source).map_err(|e| ToyError::Parse(e.into()))?;
    for token in tokens {
        println!("{}:{}\t{}", token.line, token.col, token.token.describe());
    }
    Ok(())
}

fn report_error(config: &AppConfig, source: &str, file_name: &str, err: &ToyError) {
    error_message(config, &format!("Error: {}", err));
    let diagnostic = err.to_diagnostic();
    if !diagnostic.labels.is_empty() {
        eprint!("{}", render_diagnostics(source, file_name, &[diagnostic], config.color_enabled));
    }
}

fn error_message(config: &AppConfig, message: &str) {
    if config.color_enabled {
        eprintln!("{}", message.red().bold());
    } else {
        eprintln!("{}", message);
    }
}
