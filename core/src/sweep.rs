//! Per-target acceptance sweep.
//!
//! Walks the target's candidate blocks (cache-derived singles first),
//! draws random addresses, classifies each trial against an adaptive
//! latency threshold, and reports accepted endpoints upward. The sweep
//! polls the session-wide stop flag once per candidate and never
//! interrupts a trial already in flight.

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use rustls::ClientConfig;
use tracing::{debug, info, warn};

use frontr_common::error::ProbeError;
use frontr_common::network::block::AddrBlock;
use frontr_common::network::front::{FrontEndpoint, FrontTarget};
use frontr_common::state::{ScanState, StatusKind, StatusSink};

use crate::engine;
use crate::fetch;
use crate::probe::ProbeReport;
use crate::store::EndpointStore;

/// First response byte that marks a genuine fronted verification body.
pub const RESPONSE_FLAG: char = '3';

const CEILING_MARGIN_MS: u32 = 1_700;
const THRESHOLD_STEP_MS: u32 = 80;
const ERROR_BUDGET_NUMERATOR: u32 = 30;
const MAX_ACCEPTS_PER_BLOCK: u32 = 2;
const MAX_SLOW_PER_BLOCK: u32 = 3;

/// How one trial is judged against the current latency threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Slow,
    Reject,
}

/// Pure classification of a trial outcome. A trial matches when it
/// returned HTTP 200 with the flagged body; latency then splits Accept
/// from Slow. Everything else, probe errors included, is a Reject.
pub fn classify(outcome: &Result<ProbeReport, ProbeError>, threshold_ms: u32) -> Verdict {
    match outcome {
        Ok(report) if report.status == 200 && report.body.starts_with(RESPONSE_FLAG) => {
            if report.latency_ms <= threshold_ms {
                Verdict::Accept
            } else {
                Verdict::Slow
            }
        }
        _ => Verdict::Reject,
    }
}

/// Runs one candidate trial. Implemented by the real probe runner and by
/// scripted probers in tests.
#[async_trait]
pub trait CandidateProber: Send {
    async fn probe(&mut self, addr: Ipv4Addr) -> Result<ProbeReport, ProbeError>;
}

/// How a target's sweep ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepEnd {
    /// All blocks visited; carries the endpoints accepted for this target.
    Exhausted(usize),
    /// The session-wide stop condition was observed.
    Stopped,
    /// Nothing to scan: no usable blocks, or the store never opened.
    NoCandidates,
}

/// Session-wide pieces every sweep shares.
#[derive(Clone)]
pub struct SweepContext {
    pub state: Arc<ScanState>,
    pub sink: StatusSink,
    pub tls_config: Arc<ClientConfig>,
    pub decoy_sni: String,
    /// Hex tag of the cipher suite excluded this session, recorded with
    /// every persisted row.
    pub cipher_tag: String,
    pub base_threshold_ms: u32,
    pub data_dir: PathBuf,
}

pub struct TargetSweep {
    target: FrontTarget,
    blocks: Vec<AddrBlock>,
    store: Option<EndpointStore>,
    endpoints: Vec<FrontEndpoint>,
    ctx: SweepContext,
}

impl TargetSweep {
    /// `cached` addresses come from the store oldest-first; each is
    /// prepended as a single-address block, so they are retried before any
    /// configured block and the most recently loaded row lands first.
    pub fn new(
        target: FrontTarget,
        store: Option<EndpointStore>,
        cached: Vec<Ipv4Addr>,
        ctx: SweepContext,
    ) -> Self {
        let mut blocks: Vec<AddrBlock> = target
            .blocks
            .iter()
            .copied()
            .filter(|block| block.is_valid())
            .collect();
        for addr in cached {
            blocks.insert(0, AddrBlock::single(addr));
        }

        Self {
            target,
            blocks,
            store,
            endpoints: Vec::new(),
            ctx,
        }
    }

    pub fn endpoints(&self) -> &[FrontEndpoint] {
        &self.endpoints
    }

    /// Runs the acceptance loop. All blocks are swept at least once, and
    /// again for as long as the whole session has validated nothing.
    pub async fn run(&mut self, prober: &mut dyn CandidateProber) -> SweepEnd {
        let blocks = self.blocks.clone();
        let block_total = blocks.len() as u32;
        if block_total == 0 {
            warn!(host = %self.target.hidden_host, "no usable candidate blocks");
            return SweepEnd::NoCandidates;
        }

        let ceiling = self.ctx.base_threshold_ms + CEILING_MARGIN_MS;
        // Integer division: 31+ blocks leave a zero budget, aborting a
        // block on its first error.
        let max_errors = ERROR_BUDGET_NUMERATOR / block_total;

        loop {
            for (idx, block) in blocks.iter().enumerate() {
                let mut threshold = self.ctx.base_threshold_ms;
                let mut accepts = 0u32;
                let mut slow = 0u32;
                let mut errors = 0u32;
                let size = block.size();

                let progress = (idx + 1) * 100 / block_total as usize;
                debug!(
                    host = %self.target.hidden_host,
                    block = idx + 1,
                    of = block_total,
                    progress,
                    "sweeping block"
                );

                let mut seq = 0u64;
                while threshold < ceiling && seq < size && errors <= max_errors {
                    if self.ctx.state.should_stop() {
                        info!(host = %self.target.hidden_host, "stop condition observed");
                        return SweepEnd::Stopped;
                    }

                    let addr = block.rand_addr();
                    let outcome = prober.probe(addr).await;
                    let verdict = classify(&outcome, threshold);
                    debug!(
                        host = %self.target.hidden_host,
                        %addr,
                        ?verdict,
                        threshold,
                        ceiling,
                        errors,
                        max_errors,
                        "candidate judged"
                    );

                    match verdict {
                        Verdict::Accept => {
                            if let Ok(report) = &outcome {
                                accepts += 1;
                                errors = 0;
                                slow = 0;
                                if self.accept(addr, report).await {
                                    return SweepEnd::Stopped;
                                }
                                if accepts >= MAX_ACCEPTS_PER_BLOCK {
                                    break;
                                }
                            }
                        }
                        Verdict::Slow => {
                            threshold += THRESHOLD_STEP_MS;
                            if self.ctx.state.validated() == 0
                                && self.ctx.state.first_slow_hint()
                            {
                                let tag =
                                    self.target.hidden_host.chars().next().unwrap_or(' ');
                                (self.ctx.sink)(
                                    StatusKind::ShowToast,
                                    slow as usize,
                                    &format!(" {tag}S1 "),
                                );
                            }
                            if slow > MAX_SLOW_PER_BLOCK {
                                break;
                            }
                            slow += 1;
                        }
                        Verdict::Reject => {
                            errors += 1;
                            if let Err(err) = &outcome {
                                debug!(%addr, error = %err, "candidate rejected");
                            }
                        }
                    }
                    seq += 1;
                }
            }

            if self.ctx.state.validated() > 0 {
                break;
            }
        }

        info!(
            host = %self.target.hidden_host,
            accepted = self.endpoints.len(),
            "sweep finished"
        );
        SweepEnd::Exhausted(self.endpoints.len())
    }

    /// Accept bookkeeping. Returns true when this acceptance tripped the
    /// session-wide stop condition.
    async fn accept(&mut self, addr: Ipv4Addr, report: &ProbeReport) -> bool {
        let endpoint = FrontEndpoint {
            front_host: report.front_host.clone(),
            addr,
            latency_ms: report.latency_ms,
        };
        self.endpoints.push(endpoint.clone());

        if let Some(store) = &self.store {
            store
                .append(
                    addr,
                    &report.front_host,
                    report.latency_ms,
                    &self.ctx.cipher_tag,
                )
                .await;
        }

        let analytics = format!(
            "{}_{}_{}",
            self.target.hidden_host, addr, self.ctx.decoy_sni
        );
        (self.ctx.sink)(StatusKind::Command, 1, &analytics);

        if self.ctx.state.register(&self.target.hidden_host) {
            return true;
        }

        self.refresh_document(&endpoint).await;

        let descriptor = format!(
            "{};{};https://{}{};{}",
            self.target.priority,
            addr,
            report.front_host,
            self.target.path_prefix,
            self.target.hidden_host
        );
        (self.ctx.sink)(
            StatusKind::ProxyInfo,
            self.ctx.state.validated(),
            &descriptor,
        );
        info!(
            host = %self.target.hidden_host,
            %addr,
            front = %report.front_host,
            latency_ms = report.latency_ms,
            "front endpoint ready"
        );
        false
    }

    /// One-shot allow-list and document refresh through the endpoint that
    /// just proved itself. The gate lock is distinct from the registration
    /// lock, and the trigger-size check under it keeps this to at most one
    /// run per session.
    async fn refresh_document(&self, endpoint: &FrontEndpoint) {
        let _gate = self.ctx.state.refresh_gate().lock().await;
        if self.ctx.state.validated() != self.ctx.state.update_trigger() {
            return;
        }

        let allow_path = format!("{}{}", self.target.path_prefix, fetch::ALLOWLIST_PATH);
        match fetch::fronted_get(
            self.ctx.tls_config.clone(),
            endpoint.addr,
            &endpoint.front_host,
            &self.target.hidden_host,
            &allow_path,
        )
        .await
        {
            Ok(resp) if resp.status == 200 && !resp.body.is_empty() => {
                let trimmed = resp.body.trim_matches(|c| c == '\r' || c == '\n');
                (self.ctx.sink)(StatusKind::Command, 2, trimmed);
            }
            Ok(resp) => debug!(status = resp.status, "allow-list fetch returned nothing usable"),
            Err(err) => warn!(error = %err, "allow-list fetch failed"),
        }

        let doc_path = format!("{}{}", self.target.path_prefix, fetch::DOCUMENT_PATH);
        match fetch::fronted_get(
            self.ctx.tls_config.clone(),
            endpoint.addr,
            &endpoint.front_host,
            &self.target.hidden_host,
            &doc_path,
        )
        .await
        {
            Ok(resp) if resp.status == 200 && !resp.body.is_empty() => {
                match engine::replace_document(&self.ctx.data_dir, &resp.body) {
                    Ok(path) => info!(path = %path.display(), "target document refreshed"),
                    Err(err) => warn!(error = %err, "failed to store refreshed document"),
                }
            }
            Ok(resp) => debug!(status = resp.status, "document fetch returned nothing usable"),
            Err(err) => warn!(error = %err, "target document fetch failed"),
        }
    }
}
