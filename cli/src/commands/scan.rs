use std::sync::Arc;

use colored::Colorize;

use frontr_common::config::ScanConfig;
use frontr_common::state::{StatusKind, StatusSink};
use frontr_core::engine::Engine;

use crate::commands::ScanArgs;
use crate::terminal::spinner;

pub async fn scan(args: ScanArgs) -> anyhow::Result<()> {
    let cfg = ScanConfig {
        threshold_ms: args.threshold,
        data_dir: args.data_dir.unwrap_or_else(std::env::temp_dir),
        override_path: args.frontlist,
        filter: args.filter,
    };

    let sink: StatusSink = Arc::new(|kind, payload, text| match kind {
        StatusKind::ProxyInfo => spinner::report_endpoint(payload, text),
        StatusKind::ShowToast => spinner::report_hint(text),
        StatusKind::StartPage => {}
        StatusKind::Command => tracing::debug!(payload, text, "command event"),
    });

    let mut engine = Engine::new(cfg, sink)?;
    let loaded = engine.load()?;
    if loaded == 0 {
        println!("{}", "no targets to scan".yellow());
        return Ok(());
    }

    let spin = spinner::start(loaded);
    let report = engine.run().await?;
    spin.finish_and_clear();

    let validated = engine.state().validated();
    if validated > 0 {
        println!(
            "{} {validated} endpoints across {} targets",
            "scan complete:".green().bold(),
            engine.state().registered_targets()
        );
    } else {
        println!("{}", "no working endpoints found".yellow().bold());
    }
    if report.idle_workers > 0 {
        println!(
            "{} {} targets had nothing to scan",
            "note:".dimmed(),
            report.idle_workers
        );
    }

    Ok(())
}
