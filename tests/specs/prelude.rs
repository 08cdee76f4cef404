//! Shared harness: seeded in-memory store, mock wazuh-DB server, and a
//! started orchestrator capturing delivered events.

use sift_adapters::WdbPool;
use sift_builder::Registry;
use sift_core::{Event, Expression, Name, RunResult, TraceLevel};
use sift_router::{prod, test, Options, Orchestrator};
use sift_storage::MemStore;
pub use sift_storage::Store;
use std::io::{Read, Write};
use std::os::unix::net::UnixListener;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub struct Harness {
    _wdb_dir: tempfile::TempDir,
    pub store: Arc<MemStore>,
    pub orch: Orchestrator,
    pub delivered: Arc<Mutex<Vec<Event>>>,
}

impl Harness {
    pub fn new(docs: &[(&str, &str)]) -> Self {
        Self::build(docs, Duration::from_millis(500), "ok")
    }

    pub fn with_wdb_response(docs: &[(&str, &str)], response: &'static str) -> Self {
        Self::build(docs, Duration::from_millis(500), response)
    }

    pub fn with_timeout(docs: &[(&str, &str)], test_timeout: Duration) -> Self {
        Self::build(docs, test_timeout, "ok")
    }

    fn build(docs: &[(&str, &str)], test_timeout: Duration, wdb_response: &'static str) -> Self {
        init_tracing();
        let wdb_dir = tempfile::tempdir().unwrap();
        let sock = wdb_dir.path().join("wdb.sock");
        spawn_wdb_server(UnixListener::bind(&sock).unwrap(), wdb_response);

        let store = Arc::new(MemStore::new());
        for (name, json) in docs {
            store.seed(&Name::parse(name).unwrap(), json.as_bytes().to_vec());
        }

        let mut registry =
            Registry::with_defaults(Arc::new(WdbPool::new(&sock, Duration::from_secs(1))));
        register_sleep_helper(&mut registry);

        let delivered = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&delivered);
        let orch = Orchestrator::new(Options {
            workers: 4,
            store: Arc::clone(&store) as Arc<dyn sift_storage::Store>,
            registry: Arc::new(registry),
            event_queue_capacity: 1024,
            test_queue_capacity: 16,
            test_timeout,
            delivery: Some(Arc::new(move |event| {
                sink.lock().unwrap().push(event);
            })),
        })
        .unwrap();
        orch.start().unwrap();

        Self {
            _wdb_dir: wdb_dir,
            store,
            orch,
            delivered,
        }
    }

    pub fn delivered_count(&self) -> usize {
        self.delivered.lock().unwrap().len()
    }

    /// Poll until the condition holds or the deadline passes.
    pub fn wait_until(&self, deadline: Duration, cond: impl Fn(&Harness) -> bool) -> bool {
        let until = Instant::now() + deadline;
        while Instant::now() < until {
            if cond(self) {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        cond(self)
    }
}

/// Honor `RUST_LOG` when debugging a spec; quiet otherwise.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// `+sleep/<ms>`: a transform that blocks the worker. Only the specs
/// register it; it exists to exercise deadlines.
fn register_sleep_helper(registry: &mut Registry) {
    registry
        .register(
            "sleep",
            Box::new(|ids, args| {
                let ms: u64 = args.args.first().and_then(|a| a.parse().ok()).unwrap_or(0);
                Ok(Expression::term(
                    ids,
                    format!("sleep({ms})"),
                    Arc::new(move |event| {
                        std::thread::sleep(Duration::from_millis(ms));
                        RunResult::success(event, "slept")
                    }),
                ))
            }),
        )
        .unwrap();
}

/// Accept loop answering every length-prefixed frame with `response`.
fn spawn_wdb_server(listener: UnixListener, response: &'static str) {
    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { break };
            std::thread::spawn(move || loop {
                let mut header = [0u8; 4];
                if stream.read_exact(&mut header).is_err() {
                    break;
                }
                let mut buf = vec![0u8; u32::from_le_bytes(header) as usize];
                if stream.read_exact(&mut buf).is_err() {
                    break;
                }
                let payload = response.as_bytes();
                let len = (payload.len() as u32).to_le_bytes();
                if stream.write_all(&len).is_err() || stream.write_all(payload).is_err() {
                    break;
                }
            });
        }
    });
}

pub fn entry(name: &str, policy: &str, filter: &str, priority: u32) -> prod::EntryPost {
    prod::EntryPost {
        name: name.to_string(),
        policy: Name::parse(policy).unwrap(),
        filter: Name::parse(filter).unwrap(),
        priority,
        description: None,
        disabled: false,
    }
}

pub fn test_entry(name: &str, policy: &str) -> test::EntryPost {
    test::EntryPost {
        name: name.to_string(),
        policy: Name::parse(policy).unwrap(),
        lifetime_secs: 600,
        description: None,
    }
}

pub fn trace_options(entry_name: &str, trace_level: TraceLevel) -> test::Options {
    test::Options {
        entry_name: entry_name.to_string(),
        trace_level,
        asset_filter: Default::default(),
    }
}

pub fn event(json: &str) -> Event {
    Event::from_json(json).unwrap()
}
