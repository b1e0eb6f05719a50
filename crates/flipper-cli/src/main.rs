use anyhow::Result;
use clap::{Arg, ArgMatches, Command, ValueHint};
use log::LevelFilter;
use std::path::PathBuf;

use flipper_classifiers::config::AnalysisConfig;
use flipper_cli::report::{resolve_config, run_report, ReportOverrides};

fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("FLIPPER_LOG", "error,flipper=info"))
        .init();

    let matches = Command::new("flipper")
        .version(clap::crate_version!())
        .about("\u{1F427} flipper - Penguin sex classification report")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("report")
                .about("Train, validate and compare classifiers and write an HTML report")
                .arg(
                    Arg::new("config")
                        .help("Path to analysis JSON configuration file")
                        .required(false)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("data")
                        .short('d')
                        .long("data")
                        .help(
                            "Path to the penguins CSV/TSV file. Overrides the data file \
                             specified in the configuration file.",
                        )
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .help("Path of the HTML report to write.")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("metrics")
                        .long("metrics")
                        .help("Also write per-resample metrics to this CSV file.")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .help("Random seed for the split, the resamples and the random forest.")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    Arg::new("bootstraps")
                        .long("bootstraps")
                        .help("Number of bootstrap resamples.")
                        .value_parser(clap::value_parser!(usize)),
                ),
        )
        .subcommand(Command::new("config").about("Print the default configuration as JSON"))
        .help_template(
            "{usage-heading} {usage}\n\n\
             {about-with-newline}\n\
             Version {version}\n\n\
             {all-args}{after-help}",
        )
        .get_matches();

    match matches.subcommand() {
        Some(("report", sub_m)) => handle_report(sub_m),
        Some(("config", _)) => {
            println!("{}", serde_json::to_string_pretty(&AnalysisConfig::default())?);
            Ok(())
        }
        _ => unreachable!("Subcommand is required by CLI configuration"),
    }
}

fn handle_report(matches: &ArgMatches) -> Result<()> {
    let config_path: Option<&PathBuf> = matches.get_one("config");
    let overrides = ReportOverrides {
        data_path: matches.get_one::<PathBuf>("data").cloned(),
        report_path: matches.get_one::<PathBuf>("output").cloned(),
        metrics_path: matches.get_one::<PathBuf>("metrics").cloned(),
        seed: matches.get_one::<u64>("seed").copied(),
        n_bootstraps: matches.get_one::<usize>("bootstraps").copied(),
    };

    let config = match resolve_config(config_path, &overrides) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{:#}", e);
            std::process::exit(1)
        }
    };

    if config_path.is_none() {
        let default_json = serde_json::to_string_pretty(&config).unwrap_or_default();
        eprintln!("[flipper] No config provided; using defaults:\n{}", default_json);
    }

    match run_report(&config) {
        Ok(result) => {
            eprintln!(
                "[flipper] Report written to {} ({} records, {} resamples)",
                config.report_path.display(),
                result.data.len(),
                result.resampling.n_samples - result.resampling.skipped.len()
            );
            Ok(())
        }
        Err(e) => {
            log::error!("Report failed: {:#}", e);
            std::process::exit(1)
        }
    }
}
