use clap::{
    Arg, ArgAction, Command, builder::PossibleValuesParser, crate_authors, crate_description,
    crate_name, crate_version,
};
use lazy_static::lazy_static;

use crate::policies;

lazy_static! {
    static ref VERSION_AND_POLICIES: String = {
        format!(
            r#"{}

Built-in policies: {}
"#,
            crate_version!(),
            policies::list().collect::<Vec<_>>().join(", "),
        )
    };
}

fn subcommand_run() -> Command {
    let mut args = vec![
        Arg::new("policy")
            .long("policy")
            .short('p')
            .required(true)
            .value_name("NAME")
            .value_parser(PossibleValuesParser::new(policies::list()))
            .help("Name of the policy to evaluate"),
        Arg::new("request-path")
            .long("request-path")
            .short('r')
            .required(true)
            .value_name("PATH")
            .help("File containing the admission request (or AdmissionReview) in JSON format. Use '-' to read from stdin"),
        Arg::new("settings-path")
            .long("settings-path")
            .short('s')
            .value_name("PATH")
            .conflicts_with("settings-json")
            .help("File containing the settings for this policy, in YAML or JSON format"),
        Arg::new("settings-json")
            .long("settings-json")
            .value_name("VALUE")
            .help("JSON string containing the settings for this policy"),
    ];
    args.sort_by(|a, b| a.get_id().cmp(b.get_id()));

    Command::new("run")
        .about("Evaluates an admission request with one of the built-in policies")
        .args(args)
}

pub fn build_cli() -> Command {
    let mut subcommands = vec![
        Command::new("policies").about("Lists the built-in policies"),
        subcommand_run(),
    ];
    subcommands.sort_by(|a, b| a.get_name().cmp(b.get_name()));

    Command::new(crate_name!())
        .version(crate_version!())
        .author(crate_authors!())
        .about(crate_description!())
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Increase verbosity"),
        )
        .arg(
            Arg::new("log-fmt")
                .long("log-fmt")
                .global(true)
                .value_name("FORMAT")
                .default_value("text")
                .value_parser(PossibleValuesParser::new(["text", "json"]))
                .help("Log output format"),
        )
        .subcommands(subcommands)
        .long_version(VERSION_AND_POLICIES.as_str())
        .subcommand_required(true)
        .arg_required_else_help(true)
}
