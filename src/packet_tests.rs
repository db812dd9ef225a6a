use super::*;

fn sample() -> Packet {
    // 14 bytes mac (dst+src+ethertype) + 20 bytes "network" + 8 bytes "transport"
    let mut bytes = alloc::vec![0u8; 14 + 20 + 8];
    bytes[12] = 0x08;
    bytes[13] = 0x00; // ethertype 0x0800 (IPv4)
    Packet::from_frame(&bytes, 14, 20, ChecksumMode::None)
}

#[test]
fn layout_matches_constructor_arguments() {
    let p = sample();
    assert_eq!(p.mac_len(), 14);
    assert_eq!(p.network_offset() - p.mac_offset(), 14);
    assert_eq!(p.transport_offset() - p.network_offset(), 20);
    assert_eq!(p.len(), 14 + 20 + 8);
    assert_eq!(p.ethertype(), 0x0800);
}

#[test]
fn set_ethertype_writes_final_two_bytes_of_mac_header() {
    let mut p = sample();
    p.set_ethertype(0x8847);
    assert_eq!(p.ethertype(), 0x8847);
    assert_eq!(p.mac_header()[12], 0x88);
    assert_eq!(p.mac_header()[13], 0x47);
}

#[test]
fn grow_then_shrink_mac_header_round_trips_mac_bytes() {
    let mut p = sample();
    let before: alloc::vec::Vec<u8> = p.mac_header().to_vec();

    p.grow_mac_header().unwrap();
    assert_eq!(p.mac_header(), &before[..]);
    assert_eq!(p.len(), 14 + 20 + 8 + TAG_HLEN);

    p.set_mac_gap(0xDEAD_BEEF);
    assert_eq!(p.mac_gap(), 0xDEAD_BEEF);

    p.shrink_mac_header();
    assert_eq!(p.mac_header(), &before[..]);
    assert_eq!(p.len(), 14 + 20 + 8);
}

#[test]
fn grow_mac_header_consumes_headroom_without_reallocating_when_available() {
    let mut p = sample();
    let cap_before = p.head();
    assert!(cap_before >= TAG_HLEN, "HEADROOM must cover one tag push");
    p.grow_mac_header().unwrap();
    assert_eq!(p.head(), cap_before - TAG_HLEN);
}

#[test]
fn ensure_writable_extends_tail_when_short() {
    let mut p = sample();
    let extra = p.transport_offset() - p.mac_offset() + 100;
    p.ensure_writable(extra).unwrap();
    assert!(p.tail() - p.mac_offset() >= extra);
}

#[test]
fn simulated_oom_surfaces_as_out_of_memory_without_mutating() {
    let mut p = sample();
    let before_head = p.head();
    p.simulate_oom();
    let err = p.grow_mac_header().unwrap_err();
    assert_eq!(err, ExecError::OutOfMemory);
    assert_eq!(p.head(), before_head);
}

#[test]
fn try_clone_produces_independent_buffer() {
    let mut p = sample();
    let mut clone = p.try_clone().expect("clone should succeed");
    clone.set_ethertype(0x86DD);
    assert_eq!(p.ethertype(), 0x0800);
    assert_eq!(clone.ethertype(), 0x86DD);
}

#[test]
fn try_clone_respects_simulated_oom() {
    let mut p = sample();
    p.simulate_oom();
    assert!(p.try_clone().is_none());
    // the flag is one-shot: a subsequent clone succeeds.
    assert!(p.try_clone().is_some());
}

#[test]
fn hash_clear_drops_cached_rx_hash() {
    let mut p = sample();
    p.set_rx_hash(42);
    assert_eq!(p.rx_hash(), Some(42));
    p.hash_clear();
    assert_eq!(p.rx_hash(), None);
}
