use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::cli::{Args, ColorChoice};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Run,
    Check,
    Tokens,
    Ast,
}

pub struct AppConfig {
    pub color_enabled: bool,
    pub verbose: bool,
    pub mode: Mode,
}

impl AppConfig {
    pub fn from_args(args: &Args) -> Self {
        let color_enabled = match args.color {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => atty::is(atty::Stream::Stderr),
        };

        let mode = if args.check {
            Mode::Check
        } else if args.tokens {
            Mode::Tokens
        } else if args.ast {
            Mode::Ast
        } else {
            Mode::Run
        };

        AppConfig {
            color_enabled,
            verbose: args.verbose,
            mode,
        }
    }
}

/// Installs the stderr log subscriber. `RUST_LOG` wins over `--verbose`;
/// with neither, nothing is installed and tracing calls are no-ops.
pub fn init_logging(config: &AppConfig) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if config.verbose {
        EnvFilter::new("toy=debug")
    } else {
        return;
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true)
                .with_ansi(config.color_enabled),
        )
        .with(filter)
        .init();
}
