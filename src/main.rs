use clap::{crate_authors, crate_version, Args, Parser};
use cmd::run::RunCommand;
use simplelog::*;
use std::process::ExitCode;

mod cmd;

const EXIT_FAILURE: u8 = 1;
const EXIT_SETUP: u8 = 101;

#[derive(Parser)]
#[clap(author = crate_authors!("\n"), version = crate_version!(), about = "Upload a file for bulk processing and download the results", long_about = None)]
struct App {
    #[clap(flatten)]
    global_opts: GlobalOpts,

    #[clap(flatten)]
    run: RunCommand,
}

#[derive(Args)]
struct GlobalOpts {
    /// Show more information in command output
    #[clap(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let app = App::parse();

    let level = if app.global_opts.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let _ = TermLogger::init(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    );

    match cmd::run::execute(&app.run) {
        Ok(outcome) if outcome.success => {
            print!("{}", outcome.message);
            ExitCode::SUCCESS
        }
        Ok(outcome) => {
            eprint!("{}", outcome.message);
            ExitCode::from(EXIT_FAILURE)
        }
        Err(e) => {
            eprintln!("{:#}", e);
            ExitCode::from(EXIT_SETUP)
        }
    }
}
