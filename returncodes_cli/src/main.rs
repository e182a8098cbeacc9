use clap::{App, Arg, SubCommand};
use num_enum::TryFromPrimitive;
use returncodes::Config;
use std::convert::TryFrom;
use tracing::level_filters::LevelFilter;

mod command_ceremony;
mod command_e2e;

use command_ceremony::{command_ceremony, command_export};
use command_e2e::command_e2e;

#[derive(TryFromPrimitive, PartialEq, Copy, Clone, Debug)]
#[repr(u8)]
enum Verbosity {
    Silent = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
}

impl From<Verbosity> for LevelFilter {
    fn from(verbosity: Verbosity) -> Self {
        match verbosity {
            Verbosity::Silent => LevelFilter::OFF,
            Verbosity::Error => LevelFilter::ERROR,
            Verbosity::Warn => LevelFilter::WARN,
            Verbosity::Info => LevelFilter::INFO,
            Verbosity::Debug => LevelFilter::DEBUG,
        }
    }
}

fn main() {
    let matches = App::new("ReturnCodes CLI")
        .version("1.0")
        .about("Runs control-component key ceremonies and return code computations")
        .arg(
            Arg::with_name("config")
                .long("config")
                .short("c")
                .takes_value(true)
                .help("Configuration file in JSON format - can also be set with RETURNCODES_CONFIG"),
        )
        .arg(
            Arg::with_name("v")
                .short("v")
                .multiple(true)
                .help("Sets the level of verbosity"),
        )
        .arg(
            Arg::with_name("quiet")
                .short("q")
                .help("Silences all logging"),
        )
        .subcommand(
            SubCommand::with_name("ceremony")
                .about("Generate a key for every configured control component and split it among custodians")
                .arg(
                    Arg::with_name("OUT-DIR")
                        .index(1)
                        .required(true)
                        .help("Directory the custodian share files are written to"),
                ),
        )
        .subcommand(
            SubCommand::with_name("export")
                .about("Rebuild every component key from custodian shares and write it sealed")
                .arg(
                    Arg::with_name("SHARES-DIR")
                        .index(1)
                        .required(true)
                        .help("Directory holding the share files; sealed keys are written here too"),
                )
                .arg(
                    Arg::with_name("custodians")
                        .long("custodians")
                        .takes_value(true)
                        .multiple(true)
                        .use_delimiter(true)
                        .help("Custodian indices whose shares are used - defaults to the first threshold"),
                )
                .arg(
                    Arg::with_name("sealing-secret")
                        .long("sealing-secret")
                        .takes_value(true)
                        .required(true)
                        .help("Hex-encoded secret the component keys are sealed with"),
                ),
        )
        .subcommand(
            SubCommand::with_name("e2e")
                .about("Simulate return code computation for random ballots")
                .arg(
                    Arg::with_name("ballots")
                        .long("ballots")
                        .takes_value(true)
                        .default_value("1")
                        .help("Number of ballots to process"),
                )
                .arg(
                    Arg::with_name("selections")
                        .long("selections")
                        .takes_value(true)
                        .default_value("3")
                        .help("Number of selections per ballot"),
                )
                .arg(
                    Arg::with_name("keys")
                        .long("keys")
                        .takes_value(true)
                        .requires("sealing-secret")
                        .help("Directory of sealed keys written by export"),
                )
                .arg(
                    Arg::with_name("sealing-secret")
                        .long("sealing-secret")
                        .takes_value(true)
                        .help("Hex-encoded secret the component keys were sealed with"),
                ),
        )
        .get_matches();

    let verbosity = if matches.is_present("quiet") {
        Verbosity::Silent
    } else {
        let level = 2 + matches.occurrences_of("v").min(2) as u8;
        Verbosity::try_from(level).unwrap_or(Verbosity::Debug)
    };
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::from(verbosity))
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(matches.value_of("config"));

    // Subcommands
    if let Some(matches) = matches.subcommand_matches("ceremony") {
        command_ceremony(matches, &config);
        std::process::exit(0);
    }
    if let Some(matches) = matches.subcommand_matches("export") {
        command_export(matches, &config);
        std::process::exit(0);
    }
    if let Some(matches) = matches.subcommand_matches("e2e") {
        command_e2e(matches, &config);
        std::process::exit(0);
    }

    eprintln!("returncodes: no subcommand given, see --help");
    std::process::exit(1);
}

// The --config flag wins over RETURNCODES_CONFIG; without either the defaults apply
fn load_config(flag: Option<&str>) -> Config {
    let env_var = std::env::var("RETURNCODES_CONFIG");
    let path = match flag {
        Some(path) => Some(path),
        None => env_var.as_deref().ok(),
    };

    let config = match path {
        Some(path) => Config::from_file(path).unwrap_or_else(|e| {
            eprintln!("returncodes: unable to load config {}: {}", path, e);
            std::process::exit(1);
        }),
        None => Config::default(),
    };
    tracing::debug!(
        hash_policy = %config.hash_policy.identifier(),
        components = config.control_components.len(),
        "configuration loaded"
    );
    config
}

pub(crate) fn sealing_secret(matches: &clap::ArgMatches) -> Vec<u8> {
    // Unwrap is OK, callers only get here when the arg is present
    let secret = matches.value_of("sealing-secret").unwrap();
    hex::decode(secret).unwrap_or_else(|e| {
        eprintln!("returncodes: sealing secret must be hex: {}", e);
        std::process::exit(1);
    })
}
