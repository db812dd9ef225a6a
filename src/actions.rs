//! Action list representation and wire encoding (spec §3 `ActionList`, §5).
//!
//! The original datapath receives its action list as a netlink attribute
//! stream (type/length/value, 4-byte aligned). Parsing netlink directly is
//! out of this crate's scope (spec §1 Non-goals), so this module defines a
//! small self-contained TLV encoding good enough to round-trip an action
//! list to bytes and back, plus the typed [`Action`] enum the executor
//! actually dispatches on — decoding happens once, at the edge, the same
//! way the original's `nla_for_each_attr` walk is done once per list
//! rather than re-parsed on every recursive call.

extern crate alloc;

use alloc::vec::Vec;

use crate::error::ExecError;
use crate::key::{Ipv4Addr, Ipv6Addr, MacAddr};

/// Opcode byte identifying each attribute's payload shape.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Opcode {
    Output = 0,
    Userspace = 1,
    SetEthernet = 2,
    PushVlan = 3,
    PopVlan = 4,
    PushMpls = 5,
    PopMpls = 6,
    SetMpls = 7,
    SetIpv4 = 8,
    SetIpv6 = 9,
    SetTcp = 10,
    SetUdp = 11,
    SetSctp = 12,
    Sample = 13,
    Recirc = 14,
    Hash = 15,
}

impl Opcode {
    fn from_u8(b: u8) -> Result<Self, ExecError> {
        Ok(match b {
            0 => Self::Output,
            1 => Self::Userspace,
            2 => Self::SetEthernet,
            3 => Self::PushVlan,
            4 => Self::PopVlan,
            5 => Self::PushMpls,
            6 => Self::PopMpls,
            7 => Self::SetMpls,
            8 => Self::SetIpv4,
            9 => Self::SetIpv6,
            10 => Self::SetTcp,
            11 => Self::SetUdp,
            12 => Self::SetSctp,
            13 => Self::Sample,
            14 => Self::Recirc,
            15 => Self::Hash,
            _ => return Err(ExecError::MalformedHeader),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HashAlgorithm {
    OvsFlowHash,
    L4,
}

/// One decoded action. The executor (`executor.rs`) matches on this
/// directly; `Sample` and nothing else nests a sub-list, the same
/// asymmetry the original's attribute grammar has (`OVS_ACTION_ATTR_SAMPLE`
/// is the only action carrying a nested `OVS_SAMPLE_ATTR_ACTIONS` list).
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    Output { port: u32 },
    Userspace { pid: u32, userdata: Vec<u8> },
    SetEthernet { src: Option<MacAddr>, dst: Option<MacAddr> },
    PushVlan { tpid: u16, tci: u16 },
    PopVlan,
    PushMpls { lse: u32, ethertype: u16 },
    PopMpls { ethertype: u16 },
    SetMpls { lse: u32 },
    SetIpv4 { src: Option<Ipv4Addr>, dst: Option<Ipv4Addr>, tos: Option<u8>, ttl: Option<u8> },
    SetIpv6 { src: Option<Ipv6Addr>, dst: Option<Ipv6Addr>, tclass: Option<u8>, flow_label: Option<u32>, hop_limit: Option<u8> },
    SetTcp { src: Option<u16>, dst: Option<u16> },
    SetUdp { src: Option<u16>, dst: Option<u16> },
    SetSctp { src: Option<u16>, dst: Option<u16> },
    Sample { probability: u32, actions: Vec<Action> },
    Recirc { recirc_id: u32 },
    Hash { algorithm: HashAlgorithm, basis: u32 },
}

/// A decoded action list plus its position, in the spirit of the
/// original's `nlattr *a, int rem` walk — the executor advances through
/// this without needing to touch the encoding again.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActionList(pub Vec<Action>);

impl ActionList {
    pub fn new(actions: Vec<Action>) -> Self {
        Self(actions)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> core::slice::Iter<'_, Action> {
        self.0.iter()
    }

    /// Whether `idx` is the last action in the list — used by `sample`'s
    /// fast path and the recirculation "don't clone if nothing follows"
    /// optimization, both grounded on the original's `last_action` helper.
    pub fn is_last(&self, idx: usize) -> bool {
        idx + 1 == self.0.len()
    }
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn put_bytes(out: &mut Vec<u8>, opcode: Opcode, payload: &[u8]) {
    out.push(opcode as u8);
    out.push(0); // reserved, keeps attributes 2-byte aligned like nlattr padding
    out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    out.extend_from_slice(payload);
}

/// Encode an action list to the internal TLV wire form.
pub fn encode(actions: &ActionList) -> Vec<u8> {
    let mut out = Vec::new();
    encode_into(&mut out, &actions.0);
    out
}

fn encode_into(out: &mut Vec<u8>, actions: &[Action]) {
    for action in actions {
        match action {
            Action::Output { port } => {
                let mut p = Vec::new();
                put_u32(&mut p, *port);
                put_bytes(out, Opcode::Output, &p);
            }
            Action::Userspace { pid, userdata } => {
                let mut p = Vec::new();
                put_u32(&mut p, *pid);
                p.extend_from_slice(userdata);
                put_bytes(out, Opcode::Userspace, &p);
            }
            Action::SetEthernet { src, dst } => {
                let mut p = [0u8; 14];
                p[0] = src.is_some() as u8;
                if let Some(m) = src {
                    p[1..7].copy_from_slice(&m.0);
                }
                p[7] = dst.is_some() as u8;
                if let Some(m) = dst {
                    p[8..14].copy_from_slice(&m.0);
                }
                put_bytes(out, Opcode::SetEthernet, &p);
            }
            Action::PushVlan { tpid, tci } => {
                let mut p = Vec::new();
                p.extend_from_slice(&tpid.to_be_bytes());
                p.extend_from_slice(&tci.to_be_bytes());
                put_bytes(out, Opcode::PushVlan, &p);
            }
            Action::PopVlan => put_bytes(out, Opcode::PopVlan, &[]),
            Action::PushMpls { lse, ethertype } => {
                let mut p = Vec::new();
                put_u32(&mut p, *lse);
                p.extend_from_slice(&ethertype.to_be_bytes());
                put_bytes(out, Opcode::PushMpls, &p);
            }
            Action::PopMpls { ethertype } => put_bytes(out, Opcode::PopMpls, &ethertype.to_be_bytes()),
            Action::SetMpls { lse } => {
                let mut p = Vec::new();
                put_u32(&mut p, *lse);
                put_bytes(out, Opcode::SetMpls, &p);
            }
            Action::SetIpv4 { src, dst, tos, ttl } => {
                let mut p = Vec::new();
                p.extend_from_slice(&src.map(|a| a.to_u32_be()).unwrap_or(0).to_be_bytes());
                p.extend_from_slice(&dst.map(|a| a.to_u32_be()).unwrap_or(0).to_be_bytes());
                p.push(tos.unwrap_or(0));
                p.push(ttl.unwrap_or(0));
                p.push((src.is_some() as u8) | ((dst.is_some() as u8) << 1) | ((tos.is_some() as u8) << 2) | ((ttl.is_some() as u8) << 3));
                put_bytes(out, Opcode::SetIpv4, &p);
            }
            Action::SetIpv6 { src, dst, tclass, flow_label, hop_limit } => {
                let mut p = Vec::new();
                p.extend_from_slice(&src.map(|a| a.0).unwrap_or([0; 16]));
                p.extend_from_slice(&dst.map(|a| a.0).unwrap_or([0; 16]));
                p.push(tclass.unwrap_or(0));
                p.extend_from_slice(&flow_label.unwrap_or(0).to_be_bytes());
                p.push(hop_limit.unwrap_or(0));
                p.push(
                    (src.is_some() as u8)
                        | ((dst.is_some() as u8) << 1)
                        | ((tclass.is_some() as u8) << 2)
                        | ((flow_label.is_some() as u8) << 3)
                        | ((hop_limit.is_some() as u8) << 4),
                );
                put_bytes(out, Opcode::SetIpv6, &p);
            }
            Action::SetTcp { src, dst } => encode_ports(out, Opcode::SetTcp, *src, *dst),
            Action::SetUdp { src, dst } => encode_ports(out, Opcode::SetUdp, *src, *dst),
            Action::SetSctp { src, dst } => encode_ports(out, Opcode::SetSctp, *src, *dst),
            Action::Sample { probability, actions } => {
                let mut p = Vec::new();
                put_u32(&mut p, *probability);
                encode_into(&mut p, actions);
                put_bytes(out, Opcode::Sample, &p);
            }
            Action::Recirc { recirc_id } => {
                let mut p = Vec::new();
                put_u32(&mut p, *recirc_id);
                put_bytes(out, Opcode::Recirc, &p);
            }
            Action::Hash { algorithm, basis } => {
                let mut p = Vec::new();
                p.push(match algorithm {
                    HashAlgorithm::OvsFlowHash => 0,
                    HashAlgorithm::L4 => 1,
                });
                put_u32(&mut p, *basis);
                put_bytes(out, Opcode::Hash, &p);
            }
        }
    }
}

fn encode_ports(out: &mut Vec<u8>, opcode: Opcode, src: Option<u16>, dst: Option<u16>) {
    let mut p = Vec::new();
    p.extend_from_slice(&src.unwrap_or(0).to_be_bytes());
    p.extend_from_slice(&dst.unwrap_or(0).to_be_bytes());
    p.push((src.is_some() as u8) | ((dst.is_some() as u8) << 1));
    put_bytes(out, opcode, &p);
}

/// Decode a TLV byte stream back into an [`ActionList`]. Returns
/// `ExecError::MalformedHeader` on any structurally invalid attribute,
/// mirroring how the original rejects a netlink stream it cannot parse.
pub fn decode(bytes: &[u8]) -> Result<ActionList, ExecError> {
    Ok(ActionList(decode_list(bytes)?))
}

fn decode_list(mut bytes: &[u8]) -> Result<Vec<Action>, ExecError> {
    let mut out = Vec::new();
    while !bytes.is_empty() {
        if bytes.len() < 4 {
            return Err(ExecError::MalformedHeader);
        }
        let opcode = Opcode::from_u8(bytes[0])?;
        let len = u16::from_be_bytes([bytes[2], bytes[3]]) as usize;
        if bytes.len() < 4 + len {
            return Err(ExecError::MalformedHeader);
        }
        let payload = &bytes[4..4 + len];
        out.push(decode_one(opcode, payload)?);
        bytes = &bytes[4 + len..];
    }
    Ok(out)
}

fn decode_one(opcode: Opcode, p: &[u8]) -> Result<Action, ExecError> {
    let need = |n: usize| if p.len() < n { Err(ExecError::MalformedHeader) } else { Ok(()) };
    Ok(match opcode {
        Opcode::Output => {
            need(4)?;
            Action::Output { port: u32::from_be_bytes(p[0..4].try_into().unwrap()) }
        }
        Opcode::Userspace => {
            need(4)?;
            Action::Userspace {
                pid: u32::from_be_bytes(p[0..4].try_into().unwrap()),
                userdata: p[4..].to_vec(),
            }
        }
        Opcode::SetEthernet => {
            need(14)?;
            let src = (p[0] != 0).then(|| MacAddr(p[1..7].try_into().unwrap()));
            let dst = (p[7] != 0).then(|| MacAddr(p[8..14].try_into().unwrap()));
            Action::SetEthernet { src, dst }
        }
        Opcode::PushVlan => {
            need(4)?;
            Action::PushVlan {
                tpid: u16::from_be_bytes(p[0..2].try_into().unwrap()),
                tci: u16::from_be_bytes(p[2..4].try_into().unwrap()),
            }
        }
        Opcode::PopVlan => Action::PopVlan,
        Opcode::PushMpls => {
            need(6)?;
            Action::PushMpls {
                lse: u32::from_be_bytes(p[0..4].try_into().unwrap()),
                ethertype: u16::from_be_bytes(p[4..6].try_into().unwrap()),
            }
        }
        Opcode::PopMpls => {
            need(2)?;
            Action::PopMpls { ethertype: u16::from_be_bytes(p[0..2].try_into().unwrap()) }
        }
        Opcode::SetMpls => {
            need(4)?;
            Action::SetMpls { lse: u32::from_be_bytes(p[0..4].try_into().unwrap()) }
        }
        Opcode::SetIpv4 => {
            need(11)?;
            let flags = p[10];
            Action::SetIpv4 {
                src: (flags & 1 != 0).then(|| Ipv4Addr::from_u32_be(u32::from_be_bytes(p[0..4].try_into().unwrap()))),
                dst: (flags & 2 != 0).then(|| Ipv4Addr::from_u32_be(u32::from_be_bytes(p[4..8].try_into().unwrap()))),
                tos: (flags & 4 != 0).then_some(p[8]),
                ttl: (flags & 8 != 0).then_some(p[9]),
            }
        }
        Opcode::SetIpv6 => {
            need(39)?;
            let flags = p[38];
            Action::SetIpv6 {
                src: (flags & 1 != 0).then(|| Ipv6Addr(p[0..16].try_into().unwrap())),
                dst: (flags & 2 != 0).then(|| Ipv6Addr(p[16..32].try_into().unwrap())),
                tclass: (flags & 4 != 0).then_some(p[32]),
                flow_label: (flags & 8 != 0).then(|| u32::from_be_bytes(p[33..37].try_into().unwrap())),
                hop_limit: (flags & 16 != 0).then_some(p[37]),
            }
        }
        Opcode::SetTcp => {
            let (src, dst) = decode_ports(p)?;
            Action::SetTcp { src, dst }
        }
        Opcode::SetUdp => {
            let (src, dst) = decode_ports(p)?;
            Action::SetUdp { src, dst }
        }
        Opcode::SetSctp => {
            let (src, dst) = decode_ports(p)?;
            Action::SetSctp { src, dst }
        }
        Opcode::Sample => {
            need(4)?;
            Action::Sample {
                probability: u32::from_be_bytes(p[0..4].try_into().unwrap()),
                actions: decode_list(&p[4..])?,
            }
        }
        Opcode::Recirc => {
            need(4)?;
            Action::Recirc { recirc_id: u32::from_be_bytes(p[0..4].try_into().unwrap()) }
        }
        Opcode::Hash => {
            need(5)?;
            Action::Hash {
                algorithm: if p[0] == 0 { HashAlgorithm::OvsFlowHash } else { HashAlgorithm::L4 },
                basis: u32::from_be_bytes(p[1..5].try_into().unwrap()),
            }
        }
    })
}

fn decode_ports(p: &[u8]) -> Result<(Option<u16>, Option<u16>), ExecError> {
    if p.len() < 5 {
        return Err(ExecError::MalformedHeader);
    }
    let flags = p[4];
    Ok((
        (flags & 1 != 0).then(|| u16::from_be_bytes(p[0..2].try_into().unwrap())),
        (flags & 2 != 0).then(|| u16::from_be_bytes(p[2..4].try_into().unwrap())),
    ))
}
