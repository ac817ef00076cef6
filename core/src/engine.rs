//! Scan coordinator.
//!
//! Loads the target roster from the preferred document source, spawns one
//! worker per target, and aggregates their endings. Session-wide state is
//! injected into every worker; nothing here lives in process globals.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

use frontr_common::config::ScanConfig;
use frontr_common::network::front::FrontTarget;
use frontr_common::seal;
use frontr_common::state::{ScanState, StatusSink};
use frontr_common::vocab;
use frontr_protocols::tls;

use crate::probe::ProbeRunner;
use crate::store::EndpointStore;
use crate::sweep::{SweepContext, SweepEnd, TargetSweep};

/// Name of the refreshed target document inside the data directory.
pub const DOCUMENT_FILENAME: &str = "frontlist.ng";

const BUNDLED_DOCUMENT: &str = include_str!("../assets/frontlist");

/// Aggregate outcome of one engine run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanReport {
    /// Endpoints accepted across workers that ran to exhaustion.
    pub accepted: usize,
    /// Workers that wound down on the session-wide stop condition.
    pub stopped_workers: usize,
    /// Workers that had nothing to scan.
    pub idle_workers: usize,
}

pub struct Engine {
    cfg: ScanConfig,
    state: Arc<ScanState>,
    sink: StatusSink,
    decoy_sni: String,
    disabled_suite: u16,
    tls_config: Arc<rustls::ClientConfig>,
    targets: Vec<FrontTarget>,
}

impl Engine {
    pub fn new(cfg: ScanConfig, sink: StatusSink) -> Result<Self> {
        let decoy_sni = vocab::decoy_host();
        let disabled_suite = vocab::pick_disabled_suite();
        let tls_config =
            tls::client_config(disabled_suite).context("build tls client config")?;
        info!(
            decoy = %decoy_sni,
            suite = %format!("0x{disabled_suite:04x}"),
            "scan session initialized"
        );

        Ok(Self {
            cfg,
            state: Arc::new(ScanState::new()),
            sink,
            decoy_sni,
            disabled_suite,
            tls_config,
            targets: Vec::new(),
        })
    }

    pub fn state(&self) -> Arc<ScanState> {
        self.state.clone()
    }

    /// Loads the target roster. Returns how many active targets survived
    /// filtering and parsing; zero is a valid, if useless, session.
    pub fn load(&mut self) -> Result<usize> {
        let document = self.read_document()?;
        self.targets = parse_document(&document, &self.cfg.filter);
        info!(targets = self.targets.len(), "target roster loaded");
        Ok(self.targets.len())
    }

    /// Preference order: a previously refreshed copy in the data
    /// directory, then the configured override, then the bundled document.
    fn read_document(&self) -> Result<String> {
        let refreshed = self.cfg.data_dir.join(DOCUMENT_FILENAME);
        if refreshed.exists() {
            debug!(path = %refreshed.display(), "using refreshed target document");
            let bytes = fs::read(&refreshed)
                .with_context(|| format!("read {}", refreshed.display()))?;
            return decode_document(&bytes);
        }

        if let Some(path) = &self.cfg.override_path {
            debug!(path = %path.display(), "using override target document");
            let bytes =
                fs::read(path).with_context(|| format!("read {}", path.display()))?;
            return decode_document(&bytes);
        }

        debug!("using bundled target document");
        Ok(BUNDLED_DOCUMENT.to_string())
    }

    /// Spawns one worker per loaded target and waits for all of them.
    pub async fn run(&mut self) -> Result<ScanReport> {
        let targets = std::mem::take(&mut self.targets);
        let cipher_tag = format!("0x{:04x}", self.disabled_suite);

        let mut workers = Vec::with_capacity(targets.len());
        for target in targets {
            let host = target.hidden_host.clone();
            let ctx = SweepContext {
                state: self.state.clone(),
                sink: self.sink.clone(),
                tls_config: self.tls_config.clone(),
                decoy_sni: self.decoy_sni.clone(),
                cipher_tag: cipher_tag.clone(),
                base_threshold_ms: self.cfg.threshold_ms,
                data_dir: self.cfg.data_dir.clone(),
            };

            workers.push((host, tokio::spawn(run_target(target, ctx))));
        }

        let mut report = ScanReport::default();
        for (host, handle) in workers {
            match handle.await {
                Ok(SweepEnd::Exhausted(accepted)) => report.accepted += accepted,
                Ok(SweepEnd::Stopped) => report.stopped_workers += 1,
                Ok(SweepEnd::NoCandidates) => report.idle_workers += 1,
                Err(err) => error!(host = %host, error = %err, "target worker panicked"),
            }
        }

        info!(
            validated = self.state.validated(),
            targets = self.state.registered_targets(),
            "scan session finished"
        );
        Ok(report)
    }
}

/// One target worker: open the store, feed cached endpoints back in, and
/// run the sweep. A store that will not open degrades the target to "no
/// candidates" rather than failing the session.
async fn run_target(target: FrontTarget, ctx: SweepContext) -> SweepEnd {
    let (store, cached) = match EndpointStore::open(&ctx.data_dir, &target.hidden_host).await {
        Ok(store) => {
            let cached = store.load_recent().await;
            (Some(store), cached)
        }
        Err(err) => {
            error!(host = %target.hidden_host, error = %err, "endpoint store unavailable");
            return SweepEnd::NoCandidates;
        }
    };

    let mut prober = ProbeRunner::new(
        ctx.decoy_sni.clone(),
        target.hidden_host.clone(),
        target.path_prefix.clone(),
        ctx.tls_config.clone(),
    );
    let mut sweep = TargetSweep::new(target, store, cached, ctx);
    sweep.run(&mut prober).await
}

/// Atomically replaces the cached target document for the next session.
pub fn replace_document(data_dir: &Path, contents: &str) -> std::io::Result<PathBuf> {
    let path = data_dir.join(DOCUMENT_FILENAME);
    let staged = data_dir.join(format!("{DOCUMENT_FILENAME}.tmp"));
    fs::write(&staged, contents)?;
    fs::rename(&staged, &path)?;
    Ok(path)
}

fn decode_document(bytes: &[u8]) -> Result<String> {
    if seal::is_sealed(bytes) {
        return seal::open(bytes).context("unseal target document");
    }
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

fn parse_document(document: &str, filter: &str) -> Vec<FrontTarget> {
    let mut targets = Vec::new();
    for line in document.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if !filter.is_empty() && !line.contains(filter) {
            debug!(line, "definition line filtered out");
            continue;
        }
        match line.parse::<FrontTarget>() {
            Ok(target) if target.is_deprecated() => {
                debug!(host = %target.hidden_host, "dropping deprecated target");
            }
            Ok(target) => targets.push(target),
            Err(err) => warn!(line, error = %err, "skipping malformed definition line"),
        }
    }
    targets
}
