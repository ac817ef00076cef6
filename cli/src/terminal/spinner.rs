use std::sync::OnceLock;
use std::time::Duration;

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

static SPINNER: OnceLock<ProgressBar> = OnceLock::new();

pub fn start(target_count: usize) -> &'static ProgressBar {
    SPINNER.get_or_init(|| {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.blue} {msg}")
            .unwrap()
            .tick_strings(&[
                "▁▁▁▁▁",
                "▁▂▂▂▁",
                "▁▄▂▄▁",
                "▂▄▆▄▂",
                "▄▆█▆▄",
                "▂▄▆▄▂",
                "▁▄▂▄▁",
                "▁▂▂▂▁",
            ]);

        pb.set_style(style);
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message(format!("Probing candidates for {target_count} targets..."));
        pb
    })
}

pub fn report_endpoint(count: usize, descriptor: &str) {
    if let Some(pb) = SPINNER.get() {
        pb.println(format!("{} {}", "[+]".green().bold(), descriptor));
        pb.set_message(format!(
            "{} endpoints validated so far...",
            count.to_string().green().bold()
        ));
    }
}

pub fn report_hint(tag: &str) {
    if let Some(pb) = SPINNER.get() {
        pb.println(format!(
            "{} slow endpoint seen ({}), raising the latency budget",
            "[*]".yellow().bold(),
            tag.trim()
        ));
    }
}
