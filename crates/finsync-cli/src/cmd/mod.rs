//! Subcommands

pub mod gbbq;
pub mod plan;
pub mod sync;

use std::sync::Arc;

use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use finsync_core::SharedProgress;
use finsync_tdx::{Coordinator, TdxDecoder};

fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(
            header
                .iter()
                .map(|h| Cell::new(h).fg(Color::Cyan))
                .collect::<Vec<_>>(),
        );
    table
}

/// Print a key-value summary table on stderr
pub fn print_summary(title: &str, rows: &[(&str, String)]) {
    let mut table = table(&[title, "Value"]);
    for (label, value) in rows {
        table.add_row(vec![Cell::new(label), Cell::new(value)]);
    }
    eprintln!("\n{table}");
}

/// Coordinator over HTTP with the stock TDX decoder
pub fn coordinator(config: finsync_tdx::Config, progress: &SharedProgress) -> Coordinator {
    let transport = Arc::new(config.http_transport());
    let decoder = Arc::new(TdxDecoder::new(config.corporate_action_key.clone()));
    Coordinator::new(config, transport, decoder, Arc::clone(progress))
}

/// Effective pipeline settings
pub fn print_config(config: &finsync_tdx::Config) {
    let path = |p: &std::path::Path| p.display().to_string();
    print_summary(
        "Setting",
        &[
            ("Package directory", path(&config.package_dir)),
            ("Snapshot directory", path(&config.snapshot_dir)),
            ("Corporate actions", path(&config.corporate_action_output())),
            ("gbbq input", path(&config.corporate_action_input)),
            (
                "gbbq key table",
                config
                    .corporate_action_key
                    .as_deref()
                    .map_or_else(|| "not set".to_string(), path),
            ),
            (
                "Export gbbq",
                if config.corporate_actions_enabled { "yes" } else { "no" }.to_string(),
            ),
            ("Manifest URL", config.manifest_url.clone()),
            ("Base URL", config.base_url.clone()),
            ("Workers", config.workers.to_string()),
            ("Compression level", config.zstd_level.to_string()),
            ("Read timeout", format!("{}s", config.read_timeout.as_secs())),
            ("Manifest timeout", format!("{}s", config.manifest_timeout.as_secs())),
            ("Item deadline", format!("{}s", config.item_deadline.as_secs())),
            ("Max retries", config.max_retries.to_string()),
        ],
    );
}
