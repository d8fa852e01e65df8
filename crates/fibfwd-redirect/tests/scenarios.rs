//! End-to-end redirect scenarios against mock collaborators.
//!
//! The mocks record every buffer store and platform call so tests can assert
//! both the verdict and exactly which bytes were touched, in which order.

use fibfwd_redirect::{
    DeferredNeighbor, DeferredVerdict, Direction, DropReason, FibLookup, FibLookupRequest,
    FibLookupResult, FibRedirect, FibRoute, FibStatus, InterfaceTable, L3Header, L3Processor,
    L3Reject, NeighborTable, RedirectConfig, RedirectOutcome, RedirectPlatform, StaticFib,
};
use fibfwd_types::{AddressFamily, BufferError, IpAddress, MacAddress, PacketBuffer};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::Arc;

/// Packet buffer that records stores and can refuse a store at one offset.
struct RecordingBuffer {
    bytes: Vec<u8>,
    stores: Vec<(usize, Vec<u8>)>,
    fail_store_at: Option<usize>,
}

impl RecordingBuffer {
    fn new(len: usize) -> Self {
        Self {
            bytes: vec![0u8; len],
            stores: Vec::new(),
            fail_store_at: None,
        }
    }

    fn failing_at(len: usize, offset: usize) -> Self {
        Self {
            fail_store_at: Some(offset),
            ..Self::new(len)
        }
    }
}

impl PacketBuffer for RecordingBuffer {
    fn len(&self) -> usize {
        self.bytes.len()
    }

    fn load_bytes(&self, offset: usize, dst: &mut [u8]) -> Result<(), BufferError> {
        self.bytes.load_bytes(offset, dst)
    }

    fn store_bytes(&mut self, offset: usize, src: &[u8]) -> Result<(), BufferError> {
        if self.fail_store_at == Some(offset) {
            return Err(BufferError::OutOfBounds {
                offset,
                len: src.len(),
                buffer_len: self.bytes.len(),
            });
        }
        self.bytes.store_bytes(offset, src)?;
        self.stores.push((offset, src.to_vec()));
        Ok(())
    }
}

/// FIB answering every request with a fixed result and remembering requests.
struct MockFib {
    result: FibLookupResult,
    requests: Mutex<Vec<FibLookupRequest>>,
}

impl MockFib {
    fn new(result: FibLookupResult) -> Arc<Self> {
        Arc::new(Self {
            result,
            requests: Mutex::new(Vec::new()),
        })
    }
}

impl FibLookup for MockFib {
    fn lookup(&self, request: &FibLookupRequest) -> FibLookupResult {
        self.requests.lock().push(request.clone());
        self.result.clone()
    }
}

/// L3 processor that never touches the buffer.
struct MockL3 {
    reject: Option<L3Reject>,
    calls: Mutex<u32>,
}

impl MockL3 {
    fn accept() -> Arc<Self> {
        Arc::new(Self {
            reject: None,
            calls: Mutex::new(0),
        })
    }

    fn reject(reason: L3Reject) -> Arc<Self> {
        Arc::new(Self {
            reject: Some(reason),
            calls: Mutex::new(0),
        })
    }
}

impl L3Processor for MockL3 {
    fn process(
        &self,
        _packet: &mut dyn PacketBuffer,
        _header: &L3Header,
        direction: Direction,
    ) -> Result<(), L3Reject> {
        assert_eq!(direction, Direction::Egress);
        *self.calls.lock() += 1;
        self.reject.map_or(Ok(()), Err)
    }
}

#[derive(Default)]
struct MockPlatform {
    resolver: bool,
    redirects: Mutex<Vec<u32>>,
    deferred: Mutex<Vec<(u32, Option<DeferredNeighbor>)>>,
}

impl MockPlatform {
    fn with_resolver(resolver: bool) -> Arc<Self> {
        Arc::new(Self {
            resolver,
            ..Default::default()
        })
    }
}

impl RedirectPlatform for MockPlatform {
    fn neigh_resolver_available(&self) -> bool {
        self.resolver
    }

    fn redirect(&self, ifindex: u32) {
        self.redirects.lock().push(ifindex);
    }

    fn redirect_neigh(&self, ifindex: u32, next_hop: Option<&DeferredNeighbor>) -> DeferredVerdict {
        self.deferred.lock().push((ifindex, next_hop.copied()));
        DeferredVerdict::Redirected
    }
}

struct Harness {
    fib: Arc<MockFib>,
    l3: Arc<MockL3>,
    neighbors: Arc<NeighborTable>,
    interfaces: Arc<InterfaceTable>,
    platform: Arc<MockPlatform>,
}

impl Harness {
    fn new(result: FibLookupResult, resolver: bool) -> Self {
        Self {
            fib: MockFib::new(result),
            l3: MockL3::accept(),
            neighbors: Arc::new(NeighborTable::new()),
            interfaces: Arc::new(InterfaceTable::new()),
            platform: MockPlatform::with_resolver(resolver),
        }
    }

    fn engine(&self) -> FibRedirect {
        FibRedirect::new(
            RedirectConfig::default(),
            self.fib.clone(),
            self.neighbors.clone(),
            self.interfaces.clone(),
            self.l3.clone(),
            self.platform.clone(),
        )
    }
}

fn mac(s: &str) -> MacAddress {
    s.parse().unwrap()
}

fn ip(s: &str) -> IpAddress {
    s.parse().unwrap()
}

fn v4_header() -> L3Header {
    L3Header::v4(14, "192.0.2.10".parse().unwrap(), "198.51.100.20".parse().unwrap())
}

fn v6_header() -> L3Header {
    L3Header::v6(14, "2001:db8::10".parse().unwrap(), "2001:db8:1::20".parse().unwrap())
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn scenario_a_ipv4_success_rewrites_from_fib() {
    init_logging();
    let h = Harness::new(
        FibLookupResult::success(3, mac("11:22:33:44:55:66"), mac("AA:BB:CC:DD:EE:FF")),
        false,
    );
    let mut buf = RecordingBuffer::new(34);

    let outcome = h.engine().redirect(&mut buf, &v4_header(), 1);

    assert_eq!(outcome, RedirectOutcome::Redirected(3));
    assert_eq!(&buf.bytes[0..6], &[0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
    assert_eq!(&buf.bytes[6..12], &[0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
    assert_eq!(
        buf.stores,
        vec![
            (0, vec![0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]),
            (6, vec![0x11, 0x22, 0x33, 0x44, 0x55, 0x66]),
        ]
    );
    assert_eq!(*h.platform.redirects.lock(), vec![3]);

    let requests = h.fib.requests.lock();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].family, AddressFamily::Inet);
    assert_eq!(requests[0].ifindex, 1);
    assert_eq!(requests[0].src, ip("192.0.2.10"));
    assert_eq!(requests[0].dst, ip("198.51.100.20"));
}

#[test]
fn scenario_b_ipv6_no_neighbor_cache_miss() {
    init_logging();
    let h = Harness::new(FibLookupResult::no_neighbor(4, Some(ip("fe80::1"))), false);
    h.interfaces.set_mac(4, mac("02:00:00:00:00:02"));
    let mut buf = RecordingBuffer::new(54);

    let outcome = h.engine().redirect(&mut buf, &v6_header(), 1);

    assert_eq!(outcome, RedirectOutcome::Drop(DropReason::UnresolvedNeighbor));
    assert!(buf.stores.is_empty());
    assert_eq!(buf.bytes, vec![0u8; 54]);
    assert!(h.platform.redirects.lock().is_empty());
    assert_eq!(h.fib.requests.lock()[0].family, AddressFamily::Inet6);
}

#[test]
fn scenario_c_ipv6_no_neighbor_cache_hit() {
    init_logging();
    let h = Harness::new(FibLookupResult::no_neighbor(4, Some(ip("fe80::1"))), false);
    h.interfaces.set_mac(4, mac("02:00:00:00:00:02"));
    h.neighbors.insert(ip("fe80::1"), mac("02:00:00:00:00:01"));
    let mut buf = RecordingBuffer::new(54);

    let outcome = h.engine().redirect(&mut buf, &v6_header(), 1);

    assert_eq!(outcome, RedirectOutcome::Redirected(4));
    assert_eq!(&buf.bytes[0..6], mac("02:00:00:00:00:01").as_bytes());
    assert_eq!(&buf.bytes[6..12], mac("02:00:00:00:00:02").as_bytes());
    assert_eq!(buf.stores.iter().map(|(off, _)| *off).collect::<Vec<_>>(), vec![0, 6]);
    assert_eq!(*h.platform.redirects.lock(), vec![4]);
}

#[test]
fn scenario_d_l3_reject_beats_every_fib_outcome() {
    init_logging();
    let results = [
        FibLookupResult::success(3, mac("11:22:33:44:55:66"), mac("aa:bb:cc:dd:ee:ff")),
        FibLookupResult::no_neighbor(3, Some(ip("198.51.100.254"))),
    ];

    for resolver in [false, true] {
        for result in results.clone() {
            let mut h = Harness::new(result, resolver);
            h.l3 = MockL3::reject(L3Reject::HopLimitExceeded);
            h.neighbors.insert(ip("198.51.100.254"), mac("aa:00:00:00:00:fe"));
            h.interfaces.set_mac(3, mac("02:00:00:00:00:03"));
            let mut buf = RecordingBuffer::new(34);

            let outcome = h.engine().redirect(&mut buf, &v4_header(), 1);

            assert_eq!(
                outcome,
                RedirectOutcome::Drop(DropReason::L3Rejected(L3Reject::HopLimitExceeded))
            );
            assert!(buf.stores.is_empty());
            assert!(h.platform.redirects.lock().is_empty());
            assert!(h.platform.deferred.lock().is_empty());
            assert_eq!(*h.l3.calls.lock(), 1);
        }
    }
}

#[test]
fn other_fib_statuses_drop_without_l3_or_writes() {
    for code in [1, 2, 3, 4, 5, 6, 8, 9, 255, -1] {
        let h = Harness::new(FibLookupResult::failed(FibStatus::from_raw(code)), true);
        let mut buf = RecordingBuffer::new(34);

        let outcome = h.engine().redirect(&mut buf, &v4_header(), 1);

        assert_eq!(outcome, RedirectOutcome::Drop(DropReason::NoRoute), "code {}", code);
        assert!(buf.stores.is_empty());
        assert_eq!(*h.l3.calls.lock(), 0);
        assert!(h.platform.deferred.lock().is_empty());
    }
}

#[test]
fn deferred_resolution_skips_local_rewrite() {
    let h = Harness::new(FibLookupResult::no_neighbor(7, Some(ip("fe80::1"))), true);
    h.neighbors.insert(ip("fe80::1"), mac("02:00:00:00:00:01"));
    let mut buf = RecordingBuffer::new(54);

    let outcome = h.engine().redirect(&mut buf, &v6_header(), 1);

    assert_eq!(outcome, RedirectOutcome::Redirected(7));
    assert!(buf.stores.is_empty());
    assert!(h.platform.redirects.lock().is_empty());

    let deferred = h.platform.deferred.lock();
    assert_eq!(deferred.len(), 1);
    let (ifindex, next_hop) = deferred[0];
    assert_eq!(ifindex, 7);
    let next_hop = next_hop.unwrap();
    assert_eq!(next_hop.family(), AddressFamily::Inet6);
    assert_eq!(*next_hop.next_hop(), ip("fe80::1"));
}

#[test]
fn cross_family_next_hop_uses_its_own_neighbor_family() {
    // IPv4 packet routed via an IPv6 gateway.
    let h = Harness::new(FibLookupResult::no_neighbor(2, Some(ip("fe80::9"))), false);
    h.interfaces.set_mac(2, mac("02:00:00:00:00:22"));
    h.neighbors.insert(ip("fe80::9"), mac("aa:00:00:00:00:99"));
    h.neighbors.insert(ip("198.51.100.20"), mac("aa:00:00:00:00:20"));
    let mut buf = RecordingBuffer::new(34);

    let outcome = h.engine().redirect(&mut buf, &v4_header(), 1);

    assert_eq!(outcome, RedirectOutcome::Redirected(2));
    assert_eq!(&buf.bytes[0..6], mac("aa:00:00:00:00:99").as_bytes());
    assert_eq!(&buf.bytes[6..12], mac("02:00:00:00:00:22").as_bytes());
}

#[test]
fn destination_write_failure_skips_source_write() {
    let h = Harness::new(
        FibLookupResult::success(3, mac("11:22:33:44:55:66"), mac("aa:bb:cc:dd:ee:ff")),
        false,
    );
    let mut buf = RecordingBuffer::failing_at(34, 0);

    let outcome = h.engine().redirect(&mut buf, &v4_header(), 1);

    assert_eq!(outcome, RedirectOutcome::Drop(DropReason::HeaderWriteError));
    assert!(buf.stores.is_empty());
    assert!(h.platform.redirects.lock().is_empty());
}

#[test]
fn source_write_failure_drops_after_destination() {
    let h = Harness::new(FibLookupResult::no_neighbor(4, Some(ip("fe80::1"))), false);
    h.interfaces.set_mac(4, mac("02:00:00:00:00:02"));
    h.neighbors.insert(ip("fe80::1"), mac("02:00:00:00:00:01"));
    let mut buf = RecordingBuffer::failing_at(54, 6);

    let outcome = h.engine().redirect(&mut buf, &v6_header(), 1);

    assert_eq!(outcome, RedirectOutcome::Drop(DropReason::HeaderWriteError));
    assert_eq!(buf.stores, vec![(0, mac("02:00:00:00:00:01").as_bytes().to_vec())]);
    assert!(h.platform.redirects.lock().is_empty());
}

#[test]
fn short_frame_is_header_write_error() {
    let h = Harness::new(
        FibLookupResult::success(3, mac("11:22:33:44:55:66"), mac("aa:bb:cc:dd:ee:ff")),
        false,
    );
    let mut frame = vec![0u8; 8];

    let outcome = h.engine().redirect(&mut frame, &v4_header(), 1);

    assert_eq!(outcome, RedirectOutcome::Drop(DropReason::HeaderWriteError));
    assert_eq!(&frame[..6], mac("aa:bb:cc:dd:ee:ff").as_bytes());
    assert_eq!(&frame[6..], &[0, 0]);
}

#[test]
fn static_fib_end_to_end_with_standard_l3() {
    let neighbors = Arc::new(NeighborTable::new());
    let interfaces = Arc::new(InterfaceTable::new());
    interfaces.set_mac(2, mac("02:00:00:00:00:02"));
    let fib = Arc::new(StaticFib::new(neighbors.clone(), interfaces.clone()));
    fib.add_route(FibRoute::via(
        "0.0.0.0/0".parse().unwrap(),
        ip("192.0.2.254"),
        2,
    ));

    let engine = FibRedirect::new(
        RedirectConfig::default(),
        fib,
        neighbors.clone(),
        interfaces,
        Arc::new(fibfwd_redirect::StandardL3Processor),
        MockPlatform::with_resolver(false),
    );

    let mut frame = vec![0u8; 14];
    frame[12] = 0x08;
    frame.extend_from_slice(&[
        0x45, 0x00, 0x00, 0x14, 0x00, 0x00, 0x40, 0x00, 64, 17, 0x00, 0x00, 10, 0, 0, 1, 8, 8, 8,
        8,
    ]);
    let header = L3Header::from_packet(&frame, 14).unwrap();

    // Hop processing runs before neighbor resolution, so a miss leaves the
    // TTL decremented but the Ethernet header untouched.
    assert_eq!(
        engine.redirect(&mut frame, &header, 1),
        RedirectOutcome::Drop(DropReason::UnresolvedNeighbor)
    );
    assert_eq!(&frame[0..12], &[0u8; 12]);
    assert_eq!(frame[14 + 8], 63);

    neighbors.insert(ip("192.0.2.254"), mac("aa:00:00:00:00:fe"));
    assert_eq!(engine.redirect(&mut frame, &header, 1), RedirectOutcome::Redirected(2));
    assert_eq!(&frame[0..6], mac("aa:00:00:00:00:fe").as_bytes());
    assert_eq!(&frame[6..12], mac("02:00:00:00:00:02").as_bytes());
    assert_eq!(frame[14 + 8], 62);
}

#[test]
fn redirect_v4_and_v6_wrappers_seed_lookup() {
    let h = Harness::new(FibLookupResult::failed(FibStatus::Unreachable), false);
    let engine = h.engine();
    let mut buf = vec![0u8; 64];

    engine.redirect_v4(
        &mut buf,
        14,
        "10.0.0.1".parse().unwrap(),
        "10.0.0.2".parse().unwrap(),
        6,
    );
    engine.redirect_v6(
        &mut buf,
        14,
        "2001:db8::1".parse().unwrap(),
        "2001:db8::2".parse().unwrap(),
        7,
    );

    let requests = h.fib.requests.lock();
    assert_eq!(requests[0].family, AddressFamily::Inet);
    assert_eq!(requests[0].ifindex, 6);
    assert_eq!(requests[0].dst, ip("10.0.0.2"));
    assert_eq!(requests[1].family, AddressFamily::Inet6);
    assert_eq!(requests[1].ifindex, 7);
    assert_eq!(requests[1].src, ip("2001:db8::1"));
}
