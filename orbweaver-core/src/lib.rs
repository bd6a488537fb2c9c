use colored::Colorize;

pub mod data;
pub mod error;
pub mod graph;
pub mod mentions;
pub mod report;

pub use data::Database;
pub use error::StoreError;
pub use graph::MentionGraph;

pub fn print_banner() {
    let art = r#"
 ██████  ██████  ██████  ██     ██ ███████  █████  ██    ██ ███████ ██████
██    ██ ██   ██ ██   ██ ██     ██ ██      ██   ██ ██    ██ ██      ██   ██
██    ██ ██████  ██████  ██  █  ██ █████   ███████ ██    ██ █████   ██████
██    ██ ██   ██ ██   ██ ██ ███ ██ ██      ██   ██  ██  ██  ██      ██   ██
 ██████  ██   ██ ██████   ███ ███  ███████ ██   ██   ████   ███████ ██   ██"#;
    println!("{}", art.bright_magenta().bold());
    println!(
        "  {} {}",
        format!("v{}", env!("CARGO_PKG_VERSION")).cyan(),
        "· weaving social graphs from public chatter".bright_black()
    );
    println!();
}
