use check_syntax::cli::Cli;
use check_syntax::config::{self, Configuration};
use check_syntax::context::{self, FileSelection};
use check_syntax::reporter;
use check_syntax::walker::ScanRequest;
use check_syntax::{CancelToken, Error, RealCommandRunner, Result, SyntaxCheckRunner};
use clap::Parser;
use owo_colors::OwoColorize;
use owo_colors::Stream::Stderr;
use std::io;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let code = match run(&cli) {
        Ok(code) => code,
        Err(error) => {
            eprintln!(
                "{} {error}",
                "error:".if_supports_color(Stderr, |s| s.red())
            );
            error.exit_code()
        }
    };
    process::exit(code);
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<i32> {
    let cwd = std::env::current_dir()?;
    let file_layer = config::load_file_layer(cli.config.as_deref(), &cwd)?;
    let config = Configuration::from_raw(cli.overrides().layer_over(file_layer))?;

    // The deadline covers the whole batch, file selection included.
    let mut cancel = CancelToken::new();
    if let Some(timeout) = config.timeout() {
        cancel = cancel.with_timeout(timeout);
    }
    let handler_token = cancel.clone();
    if let Err(error) = ctrlc::set_handler(move || handler_token.cancel()) {
        tracing::warn!(%error, "could not install Ctrl-C handler");
    }

    let selection = select_files(cli, &config)?;
    if cancel.is_cancelled() {
        return Err(Error::Interrupted);
    }

    let runner = SyntaxCheckRunner::new(&config, RealCommandRunner::new(cancel));
    let result = runner.run(selection)?;
    reporter::print_result(&result, cli.output)?;
    Ok(result.status.exit_code())
}

fn select_files(cli: &Cli, config: &Configuration) -> Result<FileSelection> {
    let request = ScanRequest::from_config(config);
    if !cli.files.is_empty() {
        return Ok(FileSelection::Explicit(cli.files.clone()));
    }
    if cli.stdin {
        let paths = context::read_path_list(io::stdin().lock())?;
        return Ok(FileSelection::Explicit(paths));
    }
    if cli.staged {
        return Ok(FileSelection::Explicit(context::staged_files(&request)?));
    }
    Ok(FileSelection::Scan(request))
}
