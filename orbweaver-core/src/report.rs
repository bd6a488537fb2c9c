// Report generation from database

use crate::data::Database;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
    Csv,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            "csv" => Some(ReportFormat::Csv),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportData {
    pub database: String,
    pub total_users: i64,
    pub visited_users: i64,
    pub total_edges: i64,
    pub total_messages: i64,
    pub total_locations: i64,
    pub max_depth: i64,
    pub depth_counts: Vec<DepthCount>,
    pub top_edges: Vec<EdgeData>,
    pub most_mentioned: Vec<MentionedAccount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending: Option<PendingFrontier>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepthCount {
    pub depth: i64,
    pub users: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeData {
    pub source: String,
    pub target: String,
    pub weight: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MentionedAccount {
    pub name: String,
    pub incoming_weight: i64,
}

/// Present when the crawl stopped with unvisited users left, so a report
/// can show where a resumed crawl would pick up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingFrontier {
    pub unvisited: i64,
    pub next: String,
    pub depth: i64,
}

pub fn gather_report_data(db: &Database, database: &str) -> Result<ReportData> {
    let total_users = db.count_users()?;
    let visited_users = db.count_visited()?;
    let total_edges = db.count_edges()?;
    let total_messages = db.count_messages()?;
    let total_locations = db.count_locations()?;
    let max_depth = db.max_depth()?;

    let depth_counts = db
        .depth_histogram()?
        .into_iter()
        .map(|(depth, users)| DepthCount { depth, users })
        .collect();

    let top_edges = db
        .top_edges(10)?
        .into_iter()
        .map(|edge| EdgeData {
            source: edge.source,
            target: edge.target,
            weight: edge.weight,
        })
        .collect();

    // Most-mentioned accounts by total incoming weight
    let most_mentioned = {
        let conn = db.get_connection();
        let mut stmt = conn.prepare(
            "SELECT user_2_name, SUM(weight) AS total
             FROM connections
             GROUP BY user_2_name
             ORDER BY total DESC, user_2_name
             LIMIT 10",
        )?;

        stmt.query_map([], |row| {
            Ok(MentionedAccount {
                name: row.get(0)?,
                incoming_weight: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?
    };

    let pending = match db.next_unvisited()? {
        Some(user) => Some(PendingFrontier {
            unvisited: total_users - visited_users,
            next: user.name,
            depth: user.depth,
        }),
        None => None,
    };

    Ok(ReportData {
        database: database.to_string(),
        total_users,
        visited_users,
        total_edges,
        total_messages,
        total_locations,
        max_depth,
        depth_counts,
        top_edges,
        most_mentioned,
        pending,
    })
}

pub fn generate_text_report(data: &ReportData) -> String {
    let divider = format!("{}\n", "━".repeat(70));
    let mut report = String::new();

    // Header
    report.push_str(&divider);
    report.push_str("                     ORBWEAVER NETWORK REPORT\n");
    report.push_str(&divider);
    report.push_str("\n");

    report.push_str(&format!("Database:     {}\n", data.database));
    report.push_str(&format!("Accounts:     {}\n", data.total_users));
    report.push_str(&format!("Visited:      {}\n", data.visited_users));
    report.push_str(&format!("Connections:  {}\n", data.total_edges));
    report.push_str(&format!("Messages:     {}\n", data.total_messages));
    report.push_str(&format!("Locations:    {}\n", data.total_locations));
    report.push_str(&format!("Max depth:    {}\n", data.max_depth));
    report.push_str("\n");

    // Depth profile
    if !data.depth_counts.is_empty() {
        report.push_str(&divider);
        report.push_str("DEPTH PROFILE\n");
        report.push_str(&divider);
        report.push_str("\n");
        for row in &data.depth_counts {
            report.push_str(&format!("  depth {:>2}: {} accounts\n", row.depth, row.users));
        }
        report.push_str("\n");
    }

    // Heaviest connections
    if !data.top_edges.is_empty() {
        report.push_str(&divider);
        report.push_str("TOP CONNECTIONS\n");
        report.push_str(&divider);
        report.push_str("\n");
        for (idx, edge) in data.top_edges.iter().enumerate() {
            report.push_str(&format!(
                "  [{}] {} -> {}  (weight {})\n",
                idx + 1,
                edge.source,
                edge.target,
                edge.weight
            ));
        }
        report.push_str("\n");
    }

    if !data.most_mentioned.is_empty() {
        report.push_str(&divider);
        report.push_str("MOST MENTIONED\n");
        report.push_str(&divider);
        report.push_str("\n");
        for (idx, account) in data.most_mentioned.iter().enumerate() {
            report.push_str(&format!(
                "  [{}] {}  (incoming weight {})\n",
                idx + 1,
                account.name,
                account.incoming_weight
            ));
        }
        report.push_str("\n");
    }

    if let Some(ref pending) = data.pending {
        report.push_str(&divider);
        report.push_str("PENDING FRONTIER\n");
        report.push_str(&divider);
        report.push_str("\n");
        report.push_str(&format!(
            "  {} accounts still unvisited. Next in line: {} (depth {})\n\n",
            pending.unvisited, pending.next, pending.depth
        ));
    }

    // Footer
    report.push_str(&divider);
    report.push_str("                          End of Report\n");
    report.push_str(&divider);
    report.push_str("\nGenerated by Orbweaver - a social graph crawler\n");
    report.push_str("Collected data may be subject to platform terms of service.\n\n");

    report
}

pub fn generate_json_report(data: &ReportData) -> std::result::Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "Orbweaver",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "format": "json",
                "disclaimer": "Collected data may be subject to platform terms of service"
            },
            "database": data.database,
            "summary": {
                "total_users": data.total_users,
                "visited_users": data.visited_users,
                "unvisited_users": data.total_users - data.visited_users,
                "total_connections": data.total_edges,
                "total_messages": data.total_messages,
                "total_locations": data.total_locations,
                "max_depth": data.max_depth
            },
            "depth_profile": data.depth_counts,
            "top_connections": data.top_edges,
            "most_mentioned": data.most_mentioned,
            "pending_frontier": data.pending
        }
    });

    serde_json::to_string_pretty(&json_report)
}

/// Full connection dump, one row per stored edge.
pub fn generate_csv_report(db: &Database) -> Result<String> {
    let mut csv = String::from("source,target,weight\n");
    for edge in db.edges()? {
        csv.push_str(&format!(
            "{},{},{}\n",
            csv_escape(&edge.source),
            csv_escape(&edge.target),
            edge.weight
        ));
    }
    Ok(csv)
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
