use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use orbweaver_core::MentionGraph;
use orbweaver_core::data::Database;
use orbweaver_core::report::{self, ReportFormat};
use orbweaver_harvest::{Crawler, HttpFeedProvider};
use orbweaver_stream::ClassificationBuffer;
use orbweaver_stream::classifier::{BayesModel, Classifier, argmax, prediction_entropy};
use orbweaver_stream::source::{HttpEventSource, matches_track, replay_lines};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const STARTER_MODEL: &str = include_str!("../model/starter-model.json");

// Helper functions for the crawl and stream handlers

/// Normalizes a seed handle for use in file names: strips a leading '@'
/// and drops anything that is not alphanumeric, '_' or '-'.
pub fn sanitize_seed(seed: &str) -> String {
    let cleaned: String = seed
        .trim()
        .trim_start_matches('@')
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        "seed".to_string()
    } else {
        cleaned
    }
}

/// An explicit --db wins; otherwise the database lands in the working
/// directory as <seed>.db.
pub fn database_path_for_seed(db: Option<&PathBuf>, seed: &str) -> PathBuf {
    match db {
        Some(path) => path.clone(),
        None => PathBuf::from(format!("{}.db", sanitize_seed(seed))),
    }
}

pub fn validate_threshold(threshold: f64) -> Result<f64, String> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(threshold)
    } else {
        Err(format!(
            "threshold must be between 0.0 and 1.0, got {}",
            threshold
        ))
    }
}

pub enum EventSource {
    Http(Url),
    Replay(PathBuf),
}

/// Picks the stream input from the mutually exclusive --source/--replay pair
pub fn resolve_event_source(
    source: Option<&Url>,
    replay: Option<&PathBuf>,
) -> Result<EventSource, String> {
    match (source, replay) {
        (Some(url), None) => Ok(EventSource::Http(url.clone())),
        (None, Some(path)) => Ok(EventSource::Replay(path.clone())),
        (Some(_), Some(_)) => Err("--source and --replay are mutually exclusive".to_string()),
        (None, None) => Err("Either --source or --replay must be provided".to_string()),
    }
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_prompt(msg: &str) -> String {
    print!("{} ", msg.bright_cyan().bold());
    io::stdout().flush().unwrap();
    let mut response = String::new();
    io::stdin().read_line(&mut response).unwrap();
    response.trim().to_lowercase()
}

pub fn handle_init(args: &ArgMatches) {
    print_divider();
    println!("{}", "  ORBWEAVER INITIALIZATION".bright_white().bold());
    print_divider();
    println!();

    let config_path = args.get_one::<String>("PATH").unwrap();
    let force = args.get_flag("force");
    let expanded_config_dir = shellexpand::tilde(config_path);
    let config_dir = Path::new(expanded_config_dir.as_ref());
    let db_loc = config_dir.join("orbweaver.db");
    let db_path = db_loc.as_path();
    let user_config_root = config_dir.parent().expect("Invalid database path");

    println!("{} Parsed arguments", "✓".green().bold());
    println!(
        "{} Target: {}",
        "→".blue(),
        config_dir.display().to_string().bright_white()
    );
    println!();

    let dir_exists = config_dir.exists();
    let model_dir = config_dir.join("models");
    let model_path = model_dir.join("starter-model.json");
    let model_exists = model_path.exists();

    // Check for existing installation
    if (dir_exists || model_exists) && !force {
        println!("{}", "⚠ WARNING".yellow().bold());
        println!("Configuration directory already exists:");
        if dir_exists {
            println!(
                "  {} {}",
                "•".yellow(),
                user_config_root.display().to_string().bright_white()
            );
        }
        if model_exists {
            println!(
                "  {} {}",
                "•".yellow(),
                model_path.display().to_string().bright_white()
            );
        }
        println!();
        println!(
            "{}",
            "This operation will overwrite existing files.".yellow()
        );

        let response = print_prompt("Do you want to continue? [y/N]:");
        println!();

        if response != "y" && response != "yes" {
            println!("{} Initialization cancelled.", "✗".red().bold());
            return;
        }
        println!("{} Proceeding with overwrite", "→".yellow().bold());
        println!();
    }

    // Model installation prompt
    let install_model = if !force {
        println!("{}", "MODEL SETUP".bright_blue().bold());
        println!("Orbweaver includes a starter topic classification model.");
        println!(
            "{} {}",
            "Target:".blue(),
            model_path.display().to_string().bright_white()
        );
        println!();

        let response = print_prompt("Would you like to install it? [Y/n]:");
        println!();

        response != "n" && response != "no"
    } else {
        true
    };

    // Create configuration assets
    if install_model {
        create_configuration_assets(&config_dir, &model_dir, &model_path);
    } else {
        println!("{} Skipping model installation", "→".blue());
        println!(
            "{} Manual model location: {}",
            "ℹ".blue(),
            model_dir.display().to_string().bright_white()
        );
        println!();
    }

    // Handle existing database in force mode
    if force && Database::exists(db_path) {
        println!(
            "{} Deleting existing database (force mode)",
            "→".yellow().bold()
        );
        Database::drop(db_path);
        println!("{} Existing database removed", "✓".green().bold());
        println!();
    }

    // Database creation
    if Database::exists(db_path) && !force {
        println!("{}", "⚠ WARNING".yellow().bold());
        println!("Database already exists at:");
        println!(
            "  {} {}",
            "•".yellow(),
            db_path.display().to_string().bright_white()
        );
        println!();

        let response = print_prompt("Would you like to overwrite it? [Y/n]:");
        println!();

        if response == "n" || response == "no" {
            println!("{} Keeping existing database", "→".blue());
            println!();
        } else {
            Database::drop(db_path);
            println!("{} Existing database removed", "✓".green().bold());
            println!();
        }
    }

    if !Database::exists(db_path) {
        println!("{} Creating database...", "→".blue());
        Database::new(db_path).expect("Failed to create database");
        println!(
            "{} Database initialized: {}",
            "✓".green().bold(),
            db_path.display().to_string().bright_white()
        );
    }

    println!();
    print_divider();
    println!("{}", "  INITIALIZATION COMPLETE".green().bold());
    print_divider();
    println!();
    println!(
        "{} Config directory: {}",
        "✓".green().bold(),
        user_config_root.display().to_string().bright_white()
    );
    println!(
        "{} Database: {}",
        "✓".green().bold(),
        db_path.display().to_string().bright_white()
    );
    if install_model {
        println!(
            "{} Model: {}",
            "✓".green().bold(),
            model_path.display().to_string().bright_white()
        );
    }
    println!();
}

fn create_configuration_assets(config_dir: &&Path, model_dir: &PathBuf, model_path: &PathBuf) {
    println!("{} Creating directory structure...", "→".blue());

    fs::create_dir_all(config_dir).expect("Failed to create config directory");
    println!(
        "  {} {}",
        "✓".green(),
        config_dir.display().to_string().bright_white()
    );

    fs::create_dir_all(model_dir).expect("Failed to create models directory");
    println!(
        "  {} {}",
        "✓".green(),
        model_dir.display().to_string().bright_white()
    );

    println!("{} Installing starter model...", "→".blue());
    fs::write(model_path, STARTER_MODEL).expect("Failed to write starter model");

    let model_size = STARTER_MODEL.len();
    println!(
        "  {} {} ({} bytes)",
        "✓".green().bold(),
        model_path.display().to_string().bright_white(),
        model_size.to_string().cyan()
    );
    println!();
}

pub async fn handle_crawl(sub_matches: &ArgMatches) {
    // Initialize tracing for logging
    tracing_subscriber::fmt::init();

    let seed = sub_matches.get_one::<String>("seed").unwrap();
    let api = sub_matches.get_one::<Url>("api").unwrap();
    let token = sub_matches.get_one::<String>("token").cloned();
    let depth = *sub_matches.get_one::<i64>("depth").unwrap_or(&2);
    let messages = *sub_matches.get_one::<usize>("messages").unwrap_or(&100);
    let follow_fraction = *sub_matches
        .get_one::<f64>("follow-fraction")
        .unwrap_or(&0.05);
    let db_arg = sub_matches.get_one::<PathBuf>("db");
    let dump_dir = sub_matches.get_one::<PathBuf>("dump-dir").cloned();
    let timeout = *sub_matches.get_one::<u64>("timeout").unwrap_or(&10);

    let seed = sanitize_seed(seed);
    let db_path = database_path_for_seed(db_arg, &seed);

    // Print crawl configuration
    println!("\n🕸️  Crawling the mention graph around @{}", seed);
    println!("API: {}", api);
    println!("Max depth: {}", depth);
    println!("Messages per account: {}", messages);
    println!("Follow fraction: {}", follow_fraction);
    println!("Database: {}\n", db_path.display());

    let db = match Database::new(&db_path) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("✗ Failed to open database: {}", e);
            std::process::exit(1);
        }
    };

    let mut provider = HttpFeedProvider::with_timeout(api.clone(), timeout);
    if let Some(token) = token {
        provider = provider.with_bearer_token(token);
    }

    // Spinner showing the account currently being fetched
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));

    let spinner_clone = spinner.clone();
    let progress_callback = Arc::new(move |depth: i64, user: String| {
        spinner_clone.set_message(format!("depth {}: @{}", depth, user));
    });

    let mut crawler = Crawler::new(Arc::new(provider))
        .with_max_depth(depth)
        .with_message_count(messages)
        .with_follow_fraction(follow_fraction)
        .with_progress_callback(progress_callback);
    if let Some(dump_dir) = dump_dir {
        crawler = crawler.with_dump_dir(dump_dir);
    }

    match crawler.run(&db, &seed).await {
        Ok(stats) => {
            spinner.finish_and_clear();
            println!("\n✓ Crawl complete!\n");
            println!("  Accounts visited: {}", stats.users_visited);
            println!("  Messages stored: {}", stats.messages_stored);
            println!("  Connections added: {}", stats.edges_added);
            println!("  Locations stored: {}", stats.locations_stored);
            if stats.fetch_failures > 0 {
                println!("  Fetch failures: {}", stats.fetch_failures);
            }
            println!("  Deepest layer: {}", stats.max_depth_reached);
            println!("  Elapsed: {:.1?}", stats.duration);
            println!("\nNext: orbweaver rank --db {}", db_path.display());
        }
        Err(e) => {
            spinner.finish_and_clear();
            eprintln!("✗ Crawl failed: {}", e);
            std::process::exit(1);
        }
    }
}

pub async fn handle_stream(sub_matches: &ArgMatches) {
    // Initialize tracing for logging
    tracing_subscriber::fmt::init();

    let source = sub_matches.get_one::<Url>("source");
    let replay = sub_matches.get_one::<PathBuf>("replay");
    let token = sub_matches.get_one::<String>("token").cloned();
    let db_path = sub_matches.get_one::<PathBuf>("db").unwrap();
    let model_path = sub_matches.get_one::<PathBuf>("model").unwrap();
    let batch_size = *sub_matches.get_one::<usize>("batch-size").unwrap_or(&100);
    let capacity = sub_matches
        .get_one::<usize>("capacity")
        .copied()
        .unwrap_or(batch_size * 10);
    let threshold = *sub_matches.get_one::<f64>("threshold").unwrap_or(&0.9);
    let classes: Vec<String> = sub_matches
        .get_many::<String>("classes")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let track: Vec<String> = sub_matches
        .get_many::<String>("track")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();

    let chosen_source = match resolve_event_source(source, replay) {
        Ok(chosen) => chosen,
        Err(e) => {
            eprintln!("✗ {}", e);
            std::process::exit(1);
        }
    };

    let threshold = match validate_threshold(threshold) {
        Ok(threshold) => threshold,
        Err(e) => {
            eprintln!("✗ {}", e);
            std::process::exit(1);
        }
    };

    let model = match BayesModel::load(model_path) {
        Ok(model) => model,
        Err(e) => {
            eprintln!("✗ Failed to load model: {}", e);
            std::process::exit(1);
        }
    };

    let db = match Database::new(db_path) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("✗ Failed to open database: {}", e);
            std::process::exit(1);
        }
    };

    println!("\n🕸️  Streaming into {}", db_path.display());
    println!("Classes of interest: {}", classes.join(", "));
    println!("Batch size: {}", batch_size);
    println!("Probability threshold: {}", threshold);
    if !track.is_empty() {
        println!("Tracking keywords: {}", track.join(", "));
    }
    println!();

    let buffer = ClassificationBuffer::new(Arc::new(model))
        .with_batch_size(batch_size)
        .with_capacity(capacity)
        .with_classes_of_interest(classes)
        .with_probability_threshold(threshold);

    let (tx, mut rx) = tokio::sync::mpsc::channel::<String>(256);

    // The source pump gets its own task; ingestion stays on this one
    // because the database connection is single-threaded.
    let pump = match chosen_source {
        EventSource::Http(url) => {
            let source = HttpEventSource::new(url).with_bearer_token(token);
            tokio::spawn(async move { source.run(tx).await })
        }
        EventSource::Replay(path) => tokio::spawn(async move { replay_lines(&path, tx).await }),
    };

    let mut lines_seen: u64 = 0;
    while let Some(line) = rx.recv().await {
        if !matches_track(&line, &track) {
            continue;
        }
        lines_seen += 1;
        if let Err(e) = buffer.ingest(&line, &db).await {
            eprintln!("✗ Store error, stopping: {}", e);
            std::process::exit(1);
        }
    }

    // Classify whatever is left below a full batch
    if let Err(e) = buffer.flush(&db).await {
        eprintln!("✗ Store error on final flush: {}", e);
        std::process::exit(1);
    }

    match pump.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            eprintln!("✗ Stream source failed: {}", e);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("✗ Stream task panicked: {}", e);
            std::process::exit(1);
        }
    }

    println!("\n✓ Stream ended\n");
    println!("  Lines ingested: {}", lines_seen);
    println!("  Events dispatched: {}", buffer.dispatched());
    if buffer.dropped() > 0 {
        println!("  Events dropped at capacity: {}", buffer.dropped());
    }
    println!();
}

pub async fn handle_classify(sub_matches: &ArgMatches) {
    let db_path = sub_matches.get_one::<PathBuf>("db").unwrap();
    let model_path = sub_matches.get_one::<PathBuf>("model").unwrap();
    let batch_size = *sub_matches.get_one::<usize>("batch-size").unwrap_or(&100);
    let threshold = *sub_matches.get_one::<f64>("threshold").unwrap_or(&0.9);
    let classes: Option<Vec<String>> = sub_matches
        .get_many::<String>("classes")
        .map(|values| values.cloned().collect());

    let threshold = match validate_threshold(threshold) {
        Ok(threshold) => threshold,
        Err(e) => {
            eprintln!("✗ {}", e);
            std::process::exit(1);
        }
    };

    if !Database::exists(db_path) {
        eprintln!("✗ No database at {}", db_path.display());
        std::process::exit(1);
    }

    let model = match BayesModel::load(model_path) {
        Ok(model) => model,
        Err(e) => {
            eprintln!("✗ Failed to load model: {}", e);
            std::process::exit(1);
        }
    };

    let db = match Database::new(db_path) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("✗ Failed to open database: {}", e);
            std::process::exit(1);
        }
    };

    let messages = match db.messages() {
        Ok(messages) => messages,
        Err(e) => {
            eprintln!("✗ Failed to read messages: {}", e);
            std::process::exit(1);
        }
    };
    if messages.is_empty() {
        println!("Nothing to classify.");
        return;
    }

    println!(
        "\n{:<20} {:<12} {:>7} {:>8}  {}",
        "ACCOUNT", "LABEL", "PROB", "ENTROPY", "MESSAGE"
    );

    let mut kept = 0usize;
    let mut total = 0usize;
    for chunk in messages.chunks(batch_size.max(1)) {
        let texts: Vec<String> = chunk.iter().map(|message| message.text.clone()).collect();
        let distributions = match model.predict_proba(&texts).await {
            Ok(distributions) => distributions,
            Err(e) => {
                eprintln!("✗ Classification failed: {}", e);
                std::process::exit(1);
            }
        };

        for (message, probs) in chunk.iter().zip(distributions.iter()) {
            total += 1;
            let Some((index, prob)) = argmax(probs) else {
                continue;
            };
            let Some(label) = model.labels().get(index) else {
                continue;
            };
            if prob <= threshold {
                continue;
            }
            if let Some(classes) = &classes {
                if !classes.iter().any(|class| class == label) {
                    continue;
                }
            }
            kept += 1;
            let preview: String = message.text.chars().take(48).collect();
            println!(
                "{:<20} {:<12} {:>7.3} {:>8.3}  {}",
                message.user,
                label,
                prob,
                prediction_entropy(probs),
                preview
            );
        }
    }

    println!("\n✓ {} of {} messages matched\n", kept, total);
}

pub fn handle_rank(sub_matches: &ArgMatches) {
    let db_path = sub_matches.get_one::<PathBuf>("db").unwrap();
    let top = *sub_matches.get_one::<usize>("top").unwrap_or(&10);
    let min_component = *sub_matches.get_one::<usize>("min-component").unwrap_or(&1);
    let damping = *sub_matches.get_one::<f64>("damping").unwrap_or(&0.85);
    let iterations = *sub_matches.get_one::<usize>("iterations").unwrap_or(&50);

    if !Database::exists(db_path) {
        eprintln!("✗ No database at {}", db_path.display());
        std::process::exit(1);
    }

    let db = match Database::new(db_path) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("✗ Failed to open database: {}", e);
            std::process::exit(1);
        }
    };

    let mut graph = match MentionGraph::build(&db) {
        Ok(graph) => graph,
        Err(e) => {
            eprintln!("✗ Failed to load graph: {}", e);
            std::process::exit(1);
        }
    };

    if graph.node_count() == 0 {
        println!("Graph is empty, nothing to rank.");
        return;
    }

    if min_component > 1 {
        graph.retain_components(min_component);
        println!(
            "\n🕸️  {} accounts, {} connections (components under {} nodes pruned)\n",
            graph.node_count(),
            graph.edge_count(),
            min_component
        );
    } else {
        println!(
            "\n🕸️  {} accounts, {} connections\n",
            graph.node_count(),
            graph.edge_count()
        );
    }

    for (position, node) in graph.top_nodes(damping, iterations, top).iter().enumerate() {
        println!("{:>3}. {:<24} {:.6}", position + 1, node.name, node.rank);
    }
    println!();
}

pub fn handle_report(sub_matches: &ArgMatches) {
    let db_path = sub_matches.get_one::<PathBuf>("db").unwrap();
    let format_arg = sub_matches
        .get_one::<String>("format")
        .map(|s| s.as_str())
        .unwrap_or("text");
    let output = sub_matches.get_one::<PathBuf>("output");

    let format = match ReportFormat::from_str(format_arg) {
        Some(format) => format,
        None => {
            eprintln!("✗ Unknown report format: {}", format_arg);
            std::process::exit(1);
        }
    };

    if !Database::exists(db_path) {
        eprintln!("✗ No database at {}", db_path.display());
        std::process::exit(1);
    }

    let db = match Database::new(db_path) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("✗ Failed to open database: {}", e);
            std::process::exit(1);
        }
    };

    let data = match report::gather_report_data(&db, &db_path.display().to_string()) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("✗ Failed to gather report data: {}", e);
            std::process::exit(1);
        }
    };

    let rendered = match format {
        ReportFormat::Text => report::generate_text_report(&data),
        ReportFormat::Json => match report::generate_json_report(&data) {
            Ok(rendered) => rendered,
            Err(e) => {
                eprintln!("✗ Failed to render JSON report: {}", e);
                std::process::exit(1);
            }
        },
        ReportFormat::Csv => match report::generate_csv_report(&db) {
            Ok(rendered) => rendered,
            Err(e) => {
                eprintln!("✗ Failed to render CSV report: {}", e);
                std::process::exit(1);
            }
        },
    };

    match output {
        Some(path) => match report::save_report(&rendered, path) {
            Ok(()) => println!("✓ Report saved to {}", path.display()),
            Err(e) => {
                eprintln!("✗ Failed to save report: {}", e);
                std::process::exit(1);
            }
        },
        None => print!("{}", rendered),
    }
}
