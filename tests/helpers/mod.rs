/// Test doubles to simulate the CAN bus and timer during integration tests,
/// plus GridConnect helpers so expected traffic reads like a bus trace.
use lcb_datagram::protocol::datagram::registry::{
    DatagramHandler, DatagramReply, IncomingDatagram,
};
use lcb_datagram::protocol::datagram::support::DatagramSupport;
use lcb_datagram::protocol::transport::{
    can_frame::CanFrame,
    can_id::CanId,
    traits::{can_bus::CanBus, lcb_timer::LcbTimer},
};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{sleep, timeout, Duration};

#[allow(dead_code)]
pub type Support = DatagramSupport<'static, 4, 8>;

#[allow(dead_code)]
pub const LOCAL_NODE: u64 = 0x0501_01FF_FF22;
#[allow(dead_code)]
pub const LOCAL_ALIAS: u16 = 0x22A;

/// Build a `'static` support hosting one local node, `LOCAL_NODE` by default.
#[allow(unused_macros)]
macro_rules! support {
    ($config:expr) => {
        support!($config, helpers::LOCAL_NODE, helpers::LOCAL_ALIAS)
    };
    ($config:expr, $node:expr, $alias:expr) => {{
        static LOCAL: lcb_datagram::protocol::managment::alias_cache::AliasCache<4> =
            lcb_datagram::protocol::managment::alias_cache::AliasCache::new();
        static REMOTE: lcb_datagram::protocol::managment::alias_cache::AliasCache<8> =
            lcb_datagram::protocol::managment::alias_cache::AliasCache::new();
        static SUPPORT: static_cell::StaticCell<helpers::Support> = static_cell::StaticCell::new();
        lcb_datagram::protocol::managment::alias_cache::AliasDirectory::add(
            &LOCAL, $node, $alias,
        );
        let support: &'static helpers::Support =
            SUPPORT.init(helpers::Support::new(&LOCAL, &REMOTE, $config));
        support
    }};
}

#[derive(Clone)]
#[allow(dead_code)]
/// In-memory CAN bus reproducing the `CanBus` trait behavior.
pub struct MockCanBus {
    tx: mpsc::UnboundedSender<CanFrame>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<CanFrame>>>,
}

#[allow(dead_code)]
impl MockCanBus {
    /// Construct a pair of interconnected buses (DUT ↔ host).
    pub fn create_pair() -> (Self, Self) {
        let (dut_tx, host_rx) = mpsc::unbounded_channel();
        let (host_tx, dut_rx) = mpsc::unbounded_channel();

        let dut_bus = Self {
            tx: dut_tx,
            rx: Arc::new(Mutex::new(dut_rx)),
        };

        let host_bus = Self {
            tx: host_tx,
            rx: Arc::new(Mutex::new(host_rx)),
        };

        (dut_bus, host_bus)
    }

    /// Inject a GridConnect frame.
    pub async fn send_gc(&mut self, text: &str) {
        self.send(&gc(text)).await.expect("mock bus closed");
    }

    /// Next frame as GridConnect text, failing after 200 ms of silence.
    pub async fn expect_gc(&mut self) -> String {
        let frame = timeout(Duration::from_millis(200), self.recv())
            .await
            .expect("frame expected on the bus")
            .expect("mock bus closed");
        to_gc(&frame)
    }

    /// Assert nothing is emitted for `millis`.
    pub async fn expect_silence(&mut self, millis: u64) {
        if let Ok(frame) = timeout(Duration::from_millis(millis), self.recv()).await {
            panic!("unexpected frame {:?}", frame.map(|f| to_gc(&f)));
        }
    }
}

impl CanBus for MockCanBus {
    type Error = ();

    async fn send<'a>(&'a mut self, frame: &'a CanFrame) -> Result<(), Self::Error> {
        self.tx.send(frame.clone()).map_err(|_| ())?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<CanFrame, Self::Error> {
        let mut rx = self.rx.lock().await;
        rx.recv().await.ok_or(())
    }
}

#[allow(dead_code)]
/// Timer based on `tokio::time::sleep` to drive delays in tests.
pub struct MockTimer;

impl LcbTimer for MockTimer {
    async fn delay_ms(&mut self, millis: u32) {
        sleep(Duration::from_millis(millis as u64)).await;
    }
}

//==================================================================================GridConnect
#[allow(dead_code)]
/// Parse `:X<id>N<data>;`.
pub fn gc(text: &str) -> CanFrame {
    let body = text
        .strip_prefix(":X")
        .and_then(|rest| rest.strip_suffix(';'))
        .expect("GridConnect frame must look like :X...N...;");
    let (id, data) = body.split_once('N').expect("missing N separator");
    let id = u32::from_str_radix(id, 16).expect("invalid identifier");
    let bytes: Vec<u8> = (0..data.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&data[i..i + 2], 16).expect("invalid data byte"))
        .collect();
    CanFrame::new(CanId(id), &bytes).expect("at most 8 data bytes")
}

#[allow(dead_code)]
/// Format as `:X<id>N<data>;` with upper-case hex.
pub fn to_gc(frame: &CanFrame) -> String {
    let data: String = frame.payload().iter().map(|b| format!("{b:02X}")).collect();
    format!(":X{:08X}N{};", frame.id.0, data)
}

//==================================================================================Handlers
#[allow(dead_code)]
/// Handler storing every datagram it receives and answering with a fixed reply.
pub struct Recorder {
    reply: DatagramReply,
    received: StdMutex<Vec<IncomingDatagram>>,
}

#[allow(dead_code)]
impl Recorder {
    pub const fn new(reply: DatagramReply) -> Self {
        Self {
            reply,
            received: StdMutex::new(Vec::new()),
        }
    }

    pub fn received(&self) -> Vec<IncomingDatagram> {
        self.received.lock().unwrap().clone()
    }
}

impl DatagramHandler for Recorder {
    fn handle_datagram(&self, datagram: IncomingDatagram) -> DatagramReply {
        self.received.lock().unwrap().push(datagram);
        self.reply
    }
}
