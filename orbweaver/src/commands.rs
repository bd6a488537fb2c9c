use crate::CLAP_STYLING;
use clap::{arg, command};
use url::Url;

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("orbweaver")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("orbweaver")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .subcommand_required(false)
        .subcommand(
            command!("init")
                .about("Initializes the orbweaver database on your filesystem")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Location to store the orbweaver database")
                        .default_value("~/.config/orbweaver/"),
                )
                .arg(
                    arg!(-f - -"force")
                        .help(
                            "Forces the overwriting of any existing database at the specified \
                        location.",
                        )
                        .required(false),
                ),
        )
        .subcommand(
            command!("crawl")
                .about(
                    "Breadth-first crawl of the mention graph around a seed account. \
                Contributes accounts, messages and weighted connections to the store.",
                )
                .arg(
                    arg!(-s --"seed" <HANDLE>)
                        .required(true)
                        .help("The account handle to start the crawl from"),
                )
                .arg(
                    arg!(-a --"api" <URL>)
                        .required(true)
                        .help("Base URL of the timeline API")
                        .value_parser(clap::value_parser!(Url)),
                )
                .arg(
                    arg!(--"token" <TOKEN>)
                        .required(false)
                        .help("Bearer token for authenticated feeds"),
                )
                .arg(
                    arg!(-d --"depth" <HOPS>)
                        .required(false)
                        .help("How many hops to crawl out from the seed")
                        .value_parser(clap::value_parser!(i64))
                        .default_value("2"),
                )
                .arg(
                    arg!(-m --"messages" <COUNT>)
                        .required(false)
                        .help("Messages to request per account")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("100"),
                )
                .arg(
                    arg!(--"follow-fraction" <FRACTION>)
                        .required(false)
                        .help("Fraction of the fetch size kept as follow candidates per account")
                        .value_parser(clap::value_parser!(f64))
                        .default_value("0.05"),
                )
                .arg(
                    arg!(--"db" <PATH>)
                        .required(false)
                        .help("Database path (default: <seed>.db in the working directory)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(--"dump-dir" <PATH>)
                        .required(false)
                        .help("Directory to dump raw timelines as JSONL, one file per account")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Request timeout in seconds")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("10"),
                ),
        )
        .subcommand(
            command!("stream")
                .about(
                    "Ingest a live event stream, classify messages in batches and keep \
                the ones matching the classes of interest.",
                )
                .arg(
                    arg!(--"source" <URL>)
                        .required(false)
                        .help("Streaming endpoint emitting one JSON event per line")
                        .value_parser(clap::value_parser!(Url))
                        .conflicts_with("replay"),
                )
                .arg(
                    arg!(--"replay" <PATH>)
                        .required(false)
                        .help("Replay a captured stream from a file ('-' for stdin)")
                        .value_parser(clap::value_parser!(std::path::PathBuf))
                        .conflicts_with("source"),
                )
                .arg(
                    arg!(--"token" <TOKEN>)
                        .required(false)
                        .help("Bearer token for authenticated streams"),
                )
                .arg(
                    arg!(--"db" <PATH>)
                        .required(true)
                        .help("Database to fold qualifying events into")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(--"model" <PATH>)
                        .required(true)
                        .help("Path to the classifier model JSON")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(-b --"batch-size" <COUNT>)
                        .required(false)
                        .help("Events per classification batch")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("100"),
                )
                .arg(
                    arg!(--"capacity" <COUNT>)
                        .required(false)
                        .help("Buffered events before the oldest are dropped (default: 10x batch size)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(-t --"threshold" <PROBABILITY>)
                        .required(false)
                        .help("Minimum class probability; predictions at or below are discarded")
                        .value_parser(clap::value_parser!(f64))
                        .default_value("0.9"),
                )
                .arg(
                    arg!(-c --"classes" <CLASSES>)
                        .required(true)
                        .help("Comma-separated class labels worth keeping")
                        .value_delimiter(','),
                )
                .arg(
                    arg!(--"track" <KEYWORDS>)
                        .required(false)
                        .help("Comma-separated keywords; lines matching none are skipped")
                        .value_delimiter(','),
                ),
        )
        .subcommand(
            command!("classify")
                .about("Classify the stored messages and print the confident predictions")
                .arg(
                    arg!(--"db" <PATH>)
                        .required(true)
                        .help("Database holding the messages to classify")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(--"model" <PATH>)
                        .required(true)
                        .help("Path to the classifier model JSON")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(-b --"batch-size" <COUNT>)
                        .required(false)
                        .help("Messages per classification batch")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("100"),
                )
                .arg(
                    arg!(-t --"threshold" <PROBABILITY>)
                        .required(false)
                        .help("Minimum class probability; predictions at or below are discarded")
                        .value_parser(clap::value_parser!(f64))
                        .default_value("0.9"),
                )
                .arg(
                    arg!(-c --"classes" <CLASSES>)
                        .required(false)
                        .help("Only show predictions for these classes (default: all)")
                        .value_delimiter(','),
                ),
        )
        .subcommand(
            command!("rank")
                .about("Rank accounts by weighted PageRank over the mention graph")
                .arg(
                    arg!(--"db" <PATH>)
                        .required(true)
                        .help("Database holding the mention graph")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(-n --"top" <COUNT>)
                        .required(false)
                        .help("How many accounts to show")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("10"),
                )
                .arg(
                    arg!(--"min-component" <NODES>)
                        .required(false)
                        .help("Drop weakly connected components smaller than this before ranking")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("1"),
                )
                .arg(
                    arg!(--"damping" <FACTOR>)
                        .required(false)
                        .help("PageRank damping factor")
                        .value_parser(clap::value_parser!(f64))
                        .default_value("0.85"),
                )
                .arg(
                    arg!(--"iterations" <COUNT>)
                        .required(false)
                        .help("Power iteration rounds")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("50"),
                ),
        )
        .subcommand(
            command!("report")
                .about("Summarize everything the store knows about the crawled network")
                .arg(
                    arg!(--"db" <PATH>)
                        .required(true)
                        .help("Database to report on")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json, csv")
                        .value_parser(["text", "json", "csv"])
                        .default_value("text"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                ),
        )
}
