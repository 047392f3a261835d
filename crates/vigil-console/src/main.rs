use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, Command};
use std::path::PathBuf;
use vigil_alerts::AlertStatus;
use vigil_console::{init_tracing, run_demo, ConsoleConfig, DemoOptions};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Command::new("vigil-console")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Optimistic alert status console")
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Path to a TOML config file"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .global(true)
                .help("Log filter used when RUST_LOG is unset"),
        )
        .subcommand_required(true)
        .subcommand(Command::new("statuses").about("List alert statuses"))
        .subcommand(
            Command::new("demo")
                .about("Update one alert's status against a simulated server")
                .arg(
                    Arg::new("alert")
                        .long("alert")
                        .default_value("a1")
                        .help("Alert id"),
                )
                .arg(
                    Arg::new("status")
                        .long("status")
                        .required(true)
                        .help("Target status (OPEN, TRIAGED, CLOSED, RESOLVED)"),
                )
                .arg(
                    Arg::new("fail")
                        .long("fail")
                        .action(ArgAction::SetTrue)
                        .help("Make the server reject the update"),
                )
                .arg(
                    Arg::new("latency-ms")
                        .long("latency-ms")
                        .value_parser(value_parser!(u64))
                        .help("Simulated round-trip latency"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        );

    let matches = cli.get_matches();

    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => ConsoleConfig::load(path)?,
        None => ConsoleConfig::default(),
    };
    if let Some(level) = matches.get_one::<String>("log-level") {
        config.log_level.clone_from(level);
    }
    init_tracing(&config.log_level, config.log_json);

    match matches.subcommand() {
        Some(("statuses", _)) => {
            for status in AlertStatus::ALL {
                println!("{:<10} {}", status.as_str(), status.label());
            }
        }
        Some(("demo", args)) => {
            if args.get_flag("fail") {
                config.backend.fail = true;
            }
            if let Some(latency) = args.get_one::<u64>("latency-ms") {
                config.backend.latency_ms = *latency;
            }

            let raw_status = args
                .get_one::<String>("status")
                .context("missing --status")?;
            let options = DemoOptions {
                alert_id: args
                    .get_one::<String>("alert")
                    .cloned()
                    .unwrap_or_else(|| "a1".to_string()),
                status: raw_status.parse()?,
            };

            let report = run_demo(&config, &options).await?;

            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Alert {}", options.alert_id);
                println!("  Before:      {}", report.initial);
                println!("  Speculative: {}", report.speculative);
                println!("  Settled:     {}", report.settled);
                if let Some(notification) = &report.notification {
                    println!("  {notification}");
                }
            }

            if !report.success {
                std::process::exit(1);
            }
        }
        _ => unreachable!("subcommand required"),
    }

    Ok(())
}
