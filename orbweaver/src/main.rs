use commands::command_argument_builder;
use orbweaver_core::print_banner;

mod commands;
mod handlers;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    if chosen_command.subcommand().is_none() {
        // No subcommand provided, just show the banner
        return;
    }

    match chosen_command.subcommand() {
        Some(("init", primary_command)) => handlers::handle_init(primary_command),
        Some(("crawl", primary_command)) => handlers::handle_crawl(primary_command).await,
        Some(("stream", primary_command)) => handlers::handle_stream(primary_command).await,
        Some(("classify", primary_command)) => handlers::handle_classify(primary_command).await,
        Some(("rank", primary_command)) => handlers::handle_rank(primary_command),
        Some(("report", primary_command)) => handlers::handle_report(primary_command),
        _ => unreachable!("clap should ensure we don't get here"),
    }
}

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);
