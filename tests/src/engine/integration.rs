#![cfg(test)]
use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

use frontr_common::config::ScanConfig;
use frontr_common::error::ProbeError;
use frontr_common::network::block::AddrBlock;
use frontr_common::network::front::FrontTarget;
use frontr_common::seal;
use frontr_common::state::{ScanState, StatusSink};
use frontr_core::engine::Engine;
use frontr_core::probe::ProbeReport;
use frontr_core::store::EndpointStore;
use frontr_core::sweep::{CandidateProber, SweepContext, SweepEnd, TargetSweep};

fn noop_sink() -> StatusSink {
    Arc::new(|_, _, _| {})
}

fn sweep_context(state: Arc<ScanState>, data_dir: &Path) -> SweepContext {
    SweepContext {
        state,
        sink: noop_sink(),
        tls_config: frontr_protocols::tls::client_config(0x1301).unwrap(),
        decoy_sni: "decoy.example.com".to_string(),
        cipher_tag: "0x1301".to_string(),
        base_threshold_ms: 200,
        data_dir: data_dir.to_path_buf(),
    }
}

fn target_with_blocks(blocks: Vec<AddrBlock>) -> FrontTarget {
    FrontTarget {
        priority: 1,
        type_tag: 'B',
        hidden_host: "hidden.example.com".to_string(),
        path_prefix: "/".to_string(),
        blocks,
    }
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Match(u32),
    Fail,
}

/// Replays a fixed script of trial outcomes and counts how often it was
/// asked; addresses are ignored.
struct ScriptedProber {
    script: Vec<Step>,
    calls: usize,
}

impl ScriptedProber {
    fn new(script: Vec<Step>) -> Self {
        Self { script, calls: 0 }
    }
}

#[async_trait]
impl CandidateProber for ScriptedProber {
    async fn probe(&mut self, _addr: Ipv4Addr) -> Result<ProbeReport, ProbeError> {
        let step = self.script.get(self.calls).copied().unwrap_or(Step::Fail);
        self.calls += 1;
        match step {
            Step::Match(latency_ms) => Ok(ProbeReport {
                front_host: "front.example.net".to_string(),
                status: 200,
                latency_ms,
                body: "3ok".to_string(),
            }),
            Step::Fail => Err(ProbeError::ConnectTimeout),
        }
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[tokio::test]
async fn store_round_trips_appended_endpoints() {
    let dir = tempfile::tempdir().unwrap();
    let store = EndpointStore::open(dir.path(), "hidden.example.com")
        .await
        .unwrap();

    let addr = Ipv4Addr::new(203, 0, 113, 9);
    store.append(addr, "front.example.net", 120, "0x1301").await;
    store.append(addr, "front.example.net", 130, "0x1301").await;

    let recent = store.load_recent().await;
    assert_eq!(recent, vec![addr], "duplicate addresses must collapse");
}

#[tokio::test]
async fn store_returns_addresses_oldest_first() {
    let dir = tempfile::tempdir().unwrap();
    let store = EndpointStore::open(dir.path(), "hidden.example.com")
        .await
        .unwrap();

    let newer = Ipv4Addr::new(203, 0, 113, 1);
    let older = Ipv4Addr::new(203, 0, 113, 2);
    for (addr, tm) in [(newer, unix_now()), (older, unix_now() - 3_600)] {
        sqlx::query(
            "INSERT INTO endpoints (tm, score, addr, front_host, cipher) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(tm)
        .bind(100i64)
        .bind(addr.to_string())
        .bind("front.example.net")
        .bind("0x1301")
        .execute(store.pool())
        .await
        .unwrap();
    }

    assert_eq!(store.load_recent().await, vec![older, newer]);
}

#[tokio::test]
async fn store_prunes_week_old_rows_on_open() {
    let dir = tempfile::tempdir().unwrap();
    let store = EndpointStore::open(dir.path(), "hidden.example.com")
        .await
        .unwrap();

    let fresh = Ipv4Addr::new(203, 0, 113, 1);
    let stale = Ipv4Addr::new(203, 0, 113, 2);
    for (addr, tm) in [(fresh, unix_now()), (stale, unix_now() - 8 * 86_400)] {
        sqlx::query(
            "INSERT INTO endpoints (tm, score, addr, front_host, cipher) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(tm)
        .bind(100i64)
        .bind(addr.to_string())
        .bind("front.example.net")
        .bind("0x1301")
        .execute(store.pool())
        .await
        .unwrap();
    }
    drop(store);

    let reopened = EndpointStore::open(dir.path(), "hidden.example.com")
        .await
        .unwrap();
    assert_eq!(reopened.load_recent().await, vec![fresh]);
}

#[tokio::test]
async fn stopped_session_starts_no_new_probes() {
    let dir = tempfile::tempdir().unwrap();
    let state = Arc::new(ScanState::with_limits(1, 0));
    state.register("already-done.example.com");
    assert!(state.should_stop());

    let target = target_with_blocks(vec![AddrBlock::parse("192.0.2.0/28")]);
    let mut sweep = TargetSweep::new(target, None, Vec::new(), sweep_context(state, dir.path()));
    let mut prober = ScriptedProber::new(vec![Step::Match(10)]);

    assert_eq!(sweep.run(&mut prober).await, SweepEnd::Stopped);
    assert_eq!(prober.calls, 0, "no probe may start after the stop flag");
}

#[tokio::test]
async fn invalid_blocks_are_never_drawn_from() {
    let dir = tempfile::tempdir().unwrap();
    let state = Arc::new(ScanState::with_limits(100, 0));

    let target = target_with_blocks(vec![
        AddrBlock::parse("bogus"),
        AddrBlock::parse("10.0.0.0/33"),
    ]);
    let mut sweep = TargetSweep::new(target, None, Vec::new(), sweep_context(state, dir.path()));
    let mut prober = ScriptedProber::new(vec![Step::Match(10)]);

    assert_eq!(sweep.run(&mut prober).await, SweepEnd::NoCandidates);
    assert_eq!(prober.calls, 0);
}

#[tokio::test]
async fn zero_error_budget_aborts_each_block_after_one_reject() {
    let dir = tempfile::tempdir().unwrap();
    // Someone else already validated, so the sweep makes exactly one pass.
    let state = Arc::new(ScanState::with_limits(100, 0));
    state.register("other.example.com");

    // 31 blocks push the integer-division budget to 30 / 31 == 0.
    let blocks: Vec<AddrBlock> = (1..=31)
        .map(|i| AddrBlock::single(Ipv4Addr::new(192, 0, 2, i)))
        .collect();
    let target = target_with_blocks(blocks);
    let mut sweep = TargetSweep::new(target, None, Vec::new(), sweep_context(state, dir.path()));
    let mut prober = ScriptedProber::new(Vec::new());

    assert_eq!(sweep.run(&mut prober).await, SweepEnd::Exhausted(0));
    assert_eq!(prober.calls, 31, "one failed draw per block, then abort");
}

#[tokio::test]
async fn sweep_outcomes_are_reproducible_under_replay() {
    let script = vec![
        Step::Match(120),
        Step::Match(260),
        Step::Fail,
        Step::Match(150),
    ];

    let mut endings = Vec::new();
    for _ in 0..2 {
        let dir = tempfile::tempdir().unwrap();
        let state = Arc::new(ScanState::with_limits(100, 0));
        state.register("other.example.com");

        let target = target_with_blocks(vec![AddrBlock::parse("192.0.2.0/28")]);
        let mut sweep =
            TargetSweep::new(target, None, Vec::new(), sweep_context(state, dir.path()));
        let mut prober = ScriptedProber::new(script.clone());

        let end = sweep.run(&mut prober).await;
        endings.push((end, prober.calls, sweep.endpoints().len()));
    }

    assert_eq!(endings[0], endings[1]);
    // 120ms accepted, 260ms slow (threshold 200 -> 280), one failure,
    // 150ms accepted: the second accept closes the block.
    assert_eq!(endings[0], (SweepEnd::Exhausted(2), 4, 2));
}

#[tokio::test]
async fn engine_loads_plaintext_and_sealed_documents() {
    let document = "\
        5: Bfirst.example.com/,a,b,203.0.113.0/24\n\
        2: Adead.example.com/,a,b,198.51.100.0/24\n\
        garbage line\n";

    for sealed in [false, true] {
        let dir = tempfile::tempdir().unwrap();
        let doc_path = dir.path().join("frontlist");
        if sealed {
            std::fs::write(&doc_path, seal::seal(document).unwrap()).unwrap();
        } else {
            std::fs::write(&doc_path, document).unwrap();
        }

        let cfg = ScanConfig {
            threshold_ms: 200,
            data_dir: dir.path().to_path_buf(),
            override_path: Some(doc_path),
            filter: String::new(),
        };
        let mut engine = Engine::new(cfg, noop_sink()).unwrap();
        assert_eq!(engine.load().unwrap(), 1, "sealed={sealed}");
    }
}

#[tokio::test]
async fn engine_filter_narrows_the_roster() {
    let document = "\
        5: Bfirst.example.com/,a,b,203.0.113.0/24\n\
        6: Bsecond.example.net/,a,b,198.51.100.0/24\n";

    let dir = tempfile::tempdir().unwrap();
    let doc_path = dir.path().join("frontlist");
    std::fs::write(&doc_path, document).unwrap();

    let cfg = ScanConfig {
        threshold_ms: 200,
        data_dir: dir.path().to_path_buf(),
        override_path: Some(doc_path),
        filter: "example.net".to_string(),
    };
    let mut engine = Engine::new(cfg, noop_sink()).unwrap();
    assert_eq!(engine.load().unwrap(), 1);
}

#[tokio::test]
async fn engine_run_with_empty_roster_finishes_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let doc_path = dir.path().join("frontlist");
    std::fs::write(&doc_path, "2: Adead.example.com/,a,b,198.51.100.0/24\n").unwrap();

    let cfg = ScanConfig {
        threshold_ms: 200,
        data_dir: dir.path().to_path_buf(),
        override_path: Some(doc_path),
        filter: String::new(),
    };
    let mut engine = Engine::new(cfg, noop_sink()).unwrap();
    assert_eq!(engine.load().unwrap(), 0);

    let report = engine.run().await.unwrap();
    assert_eq!(report.accepted, 0);
    assert_eq!(engine.state().validated(), 0);
}
