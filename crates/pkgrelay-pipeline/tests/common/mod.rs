//! Shared fakes for pipeline integration tests.

#![allow(dead_code)]

use std::io;
use std::path::Path;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use tokio::sync::broadcast;

use pkgrelay_core::{
    AcquisitionResult, AssetRequest, BroadcastRelayEmitter, Credential, DeviceId, DeviceProfile,
    DispatcherConfig, DistributionError, DistributionServicePort, DistributionSession,
    EntitlementGrant, JobId, JobState, RelayEvent, RelayPayload, RelayReceipt,
    RelayTransportPort, RemoteContent, RemoteEntry, TransferProgress, TransportError,
    UnavailableReason,
};
use pkgrelay_db::TestDb;
use pkgrelay_pipeline::{
    AcquisitionChain, AcquisitionStrategy, RelayDispatcher, RelayDispatcherDeps,
    build_relay_dispatcher,
};

// ============================================================================
// Acquisition
// ============================================================================

enum Script {
    Unavailable(UnavailableReason),
    Bytes(Vec<u8>),
    Local { bytes: Vec<u8>, version: String },
    Stalled(Arc<AtomicBool>),
    Blocking(Arc<AtomicBool>),
}

/// Strategy returning a fixed result and counting calls.
pub struct ScriptedStrategy {
    name: &'static str,
    script: Script,
    calls: AtomicUsize,
}

impl ScriptedStrategy {
    fn with(name: &'static str, script: Script) -> Arc<Self> {
        Arc::new(Self {
            name,
            script,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn unavailable(name: &'static str, reason: UnavailableReason) -> Arc<Self> {
        Self::with(name, Script::Unavailable(reason))
    }

    pub fn bytes(name: &'static str, bytes: &[u8]) -> Arc<Self> {
        Self::with(name, Script::Bytes(bytes.to_vec()))
    }

    pub fn local(name: &'static str, bytes: &[u8], version: &str) -> Arc<Self> {
        Self::with(
            name,
            Script::Local {
                bytes: bytes.to_vec(),
                version: version.to_string(),
            },
        )
    }

    /// A stream that never yields; the flag flips when it is dropped.
    pub fn stalled(name: &'static str) -> (Arc<Self>, Arc<AtomicBool>) {
        let dropped = Arc::new(AtomicBool::new(false));
        (Self::with(name, Script::Stalled(Arc::clone(&dropped))), dropped)
    }

    /// Never returns from `acquire`; the flag flips when the call is
    /// dropped.
    pub fn blocking(name: &'static str) -> (Arc<Self>, Arc<AtomicBool>) {
        let dropped = Arc::new(AtomicBool::new(false));
        (Self::with(name, Script::Blocking(Arc::clone(&dropped))), dropped)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AcquisitionStrategy for ScriptedStrategy {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn acquire(&self, _request: &AssetRequest) -> AcquisitionResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Unavailable(reason) => AcquisitionResult::Unavailable(reason.clone()),
            Script::Bytes(bytes) => AcquisitionResult::RemoteStream {
                stream: Box::new(io::Cursor::new(bytes.clone())),
                declared_length: Some(bytes.len() as u64),
            },
            Script::Local { bytes, version } => AcquisitionResult::LocalStream {
                stream: Box::new(io::Cursor::new(bytes.clone())),
                length: bytes.len() as u64,
                installed_version: version.clone(),
            },
            Script::Stalled(dropped) => AcquisitionResult::RemoteStream {
                stream: Box::new(StalledReader {
                    dropped: Arc::clone(dropped),
                }),
                declared_length: None,
            },
            Script::Blocking(dropped) => {
                let _held = DropFlag(Arc::clone(dropped));
                std::future::pending::<AcquisitionResult>().await
            }
        }
    }
}

/// Sets its flag when dropped.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Reader that never produces data.
struct StalledReader {
    dropped: Arc<AtomicBool>,
}

impl AsyncRead for StalledReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Pending
    }
}

impl Drop for StalledReader {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}

/// Chain of two scripted strategies.
pub fn chain(primary: Arc<ScriptedStrategy>, fallback: Arc<ScriptedStrategy>) -> AcquisitionChain {
    AcquisitionChain::new(primary, fallback)
}

// ============================================================================
// Distribution service
// ============================================================================

/// Distribution service that checks in but knows no assets.
#[derive(Default)]
pub struct EmptyCatalog {
    pub checkins: AtomicUsize,
    pub entitlements: AtomicUsize,
}

#[async_trait]
impl DistributionServicePort for EmptyCatalog {
    async fn checkin(
        &self,
        _credential: &Credential,
        _profile: &DeviceProfile,
    ) -> Result<DeviceId, DistributionError> {
        self.checkins.fetch_add(1, Ordering::SeqCst);
        Ok(DeviceId::new("device-1"))
    }

    async fn metadata(
        &self,
        _session: &DistributionSession,
        asset_id: &str,
        _channel: &str,
        _variant: &str,
    ) -> Result<RemoteEntry, DistributionError> {
        Err(DistributionError::NotFound(asset_id.to_string()))
    }

    async fn entitlement(
        &self,
        _session: &DistributionSession,
        _entry: &RemoteEntry,
        _version: &str,
    ) -> Result<EntitlementGrant, DistributionError> {
        self.entitlements.fetch_add(1, Ordering::SeqCst);
        Err(DistributionError::Denied("unexpected".to_string()))
    }

    async fn content(
        &self,
        _session: &DistributionSession,
        _entry: &RemoteEntry,
        _grant: &EntitlementGrant,
    ) -> Result<RemoteContent, DistributionError> {
        Err(DistributionError::Unreachable("unexpected".to_string()))
    }
}

/// Write an installed package into a registry directory.
pub fn install_package(root: &Path, asset_id: &str, version: &str, bytes: &[u8]) {
    let dir = root.join(asset_id);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join(pkgrelay_pipeline::MANIFEST_FILE),
        format!(r#"{{"version": "{version}", "binary": "base.bin"}}"#),
    )
    .unwrap();
    std::fs::write(dir.join("base.bin"), bytes).unwrap();
}

// ============================================================================
// Relay transport
// ============================================================================

/// One upload seen by [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub destination: String,
    pub body: Vec<u8>,
}

/// Transport that reads the whole payload in small chunks, reporting
/// progress, and records what it received.
pub struct RecordingTransport {
    uploads: Mutex<Vec<Upload>>,
    status: u16,
    delay: Duration,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Self::answering(201)
    }

    /// Answer every upload with `status`; non-2xx becomes `Rejected`.
    pub fn answering(status: u16) -> Arc<Self> {
        Arc::new(Self {
            uploads: Mutex::new(Vec::new()),
            status,
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        })
    }

    /// Hold each upload open for `delay` after reading it.
    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            uploads: Mutex::new(Vec::new()),
            status: 201,
            delay,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        })
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RelayTransportPort for RecordingTransport {
    async fn relay(
        &self,
        destination: &str,
        payload: RelayPayload,
    ) -> Result<RelayReceipt, TransportError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let RelayPayload {
            mut stream,
            length,
            progress,
        } = payload;
        let mut body = Vec::new();
        let mut chunk = [0u8; 4];
        loop {
            let n = stream
                .read(&mut chunk)
                .await
                .map_err(|e| TransportError::Io(e.to_string()))?;
            if n == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..n]);
            if let Some(tx) = &progress {
                tx.send_replace(TransferProgress {
                    sent: body.len() as u64,
                    total: length,
                });
            }
        }
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let bytes_sent = body.len() as u64;
        self.uploads.lock().unwrap().push(Upload {
            destination: destination.to_string(),
            body,
        });

        if (200..300).contains(&self.status) {
            Ok(RelayReceipt {
                destination: destination.to_string(),
                bytes_sent,
                peak_chunk: chunk.len(),
                status: self.status,
            })
        } else {
            Err(TransportError::Rejected {
                status: self.status,
                body: "rejected".to_string(),
            })
        }
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// A dispatcher over an in-memory database with a broadcast emitter.
pub struct Harness {
    pub dispatcher: Arc<RelayDispatcher>,
    pub events: broadcast::Receiver<RelayEvent>,
    pub db: TestDb,
}

impl Harness {
    pub async fn new(chain: AcquisitionChain, transport: Arc<RecordingTransport>) -> Self {
        Self::with_config(chain, transport, DispatcherConfig::default()).await
    }

    pub async fn with_config(
        chain: AcquisitionChain,
        transport: Arc<RecordingTransport>,
        config: DispatcherConfig,
    ) -> Self {
        let db = TestDb::new().await.unwrap();
        Self::on_db(db, chain, transport, config)
    }

    pub fn on_db(
        db: TestDb,
        chain: AcquisitionChain,
        transport: Arc<RecordingTransport>,
        config: DispatcherConfig,
    ) -> Self {
        let emitter = BroadcastRelayEmitter::new(1024);
        let events = emitter.subscribe();
        let dispatcher = build_relay_dispatcher(RelayDispatcherDeps {
            repository: Arc::new(db.job_repository()),
            chain,
            transport,
            events: Arc::new(emitter),
            config,
        });
        Self {
            dispatcher,
            events,
            db,
        }
    }

    /// Every event received so far.
    pub fn drain_events(&mut self) -> Vec<RelayEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    /// Wait until job `id` reports `state`.
    pub async fn wait_for_state(&mut self, id: JobId, state: JobState) {
        let wait = async {
            loop {
                match self.events.recv().await {
                    Ok(RelayEvent::JobStateChanged { id: got, state: s, .. })
                        if got == id && s == state =>
                    {
                        return;
                    }
                    Ok(_) => {}
                    Err(e) => panic!("event stream ended: {e}"),
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(5), wait)
            .await
            .expect("timed out waiting for state");
    }
}

/// A second dispatcher over the same database, as another process would
/// build it. Its queue starts empty; call `load` or `restore`.
pub fn sharing(
    db: &TestDb,
    chain: AcquisitionChain,
    transport: Arc<RecordingTransport>,
    config: DispatcherConfig,
) -> Arc<RelayDispatcher> {
    build_relay_dispatcher(RelayDispatcherDeps {
        repository: Arc::new(db.job_repository()),
        chain,
        transport,
        events: Arc::new(BroadcastRelayEmitter::new(16)),
        config,
    })
}

/// Run a dispatcher until idle, failing the test if it takes too long.
pub async fn drain(dispatcher: &Arc<RelayDispatcher>) {
    tokio::time::timeout(Duration::from_secs(5), dispatcher.run_until_idle())
        .await
        .expect("dispatcher did not go idle");
}
