use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "toy")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Interpreter for the toy scripting language", long_about = None)]
pub struct Args {
    /// Script to run. Without FILE or -e the program is read from stdin.
    #[arg(value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Run PROGRAM given on the command line instead of a file.
    #[arg(short = 'e', long = "eval", value_name = "PROGRAM", conflicts_with = "file")]
    pub eval: Option<String>,

    #[arg(long = "color", value_name = "WHEN", default_value = "auto")]
    pub color: ColorChoice,

    /// Log pipeline stages to stderr. RUST_LOG takes precedence.
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Parse only and report syntax errors.
    #[arg(long = "check", conflicts_with_all = ["tokens", "ast"])]
    pub check: bool,

    /// Print the token stream and exit.
    #[arg(long = "tokens", conflicts_with = "ast")]
    pub tokens: bool,

    /// Print the parsed syntax tree and exit.
    #[arg(long = "ast")]
    pub ast: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print shell completions.
    Complete {
        #[arg(value_name = "SHELL")]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorChoice {
    Auto,
    Always,
    Never,
}

impl std::str::FromStr for ColorChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ColorChoice::Auto),
            "always" => Ok(ColorChoice::Always),
            "never" => Ok(ColorChoice::Never),
            _ => Err(format!(
                "Invalid color choice: {}. Must be 'auto', 'always', or 'never'",
                s
            )),
        }
    }
}

pub fn generate_completions(shell: Shell) {
    let mut cmd = Args::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, &bin_name, &mut io::stdout());
}
