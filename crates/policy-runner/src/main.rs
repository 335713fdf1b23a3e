use anyhow::{Result, anyhow};

mod cli;
mod logging;
mod policies;
mod run;

fn main() -> Result<()> {
    let matches = cli::build_cli().get_matches();

    let verbose = matches.get_flag("verbose");
    let log_fmt = matches
        .get_one::<String>("log-fmt")
        .map(String::as_str)
        .unwrap_or("text");
    logging::setup_tracing(verbose, log_fmt)?;

    match matches.subcommand() {
        Some(("policies", _)) => {
            for policy in policies::list() {
                println!("{policy}");
            }
            Ok(())
        }
        Some(("run", matches)) => run::exec(matches),
        Some((command, _)) => Err(anyhow!("unknown subcommand: {}", command)),
        None => {
            // NOTE: this should not happen due to
            // subcommand_required setting
            unreachable!();
        }
    }
}
