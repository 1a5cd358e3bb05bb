//! Deterministic addressing of the lab: one internal LAN per AS and one /30 per AS-pair link.

pub mod allocator;
pub mod internal_lan;

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::net::Ipv4Addr;
use std::path::Path;

use ipnetwork::Ipv4Network;
use log::{debug, info};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::as_graph::ASN;
use crate::error::{Error, Result};
use crate::shared::{Relationships, YesNo};
use crate::topology::Topology;

pub use allocator::{LinkAllocator, LinkBlock};
pub use internal_lan::{internal_lan, internal_prefix};

/// Host offset of the provider end of a provider/customer link.
const PROVIDER_OFFSET: u8 = 2;
const CUSTOMER_OFFSET: u8 = 1;
/// Host offsets of the AS that resolves a peer link and of its peer.
const INITIATOR_OFFSET: u8 = 1;
const RESPONDER_OFFSET: u8 = 2;

/// A neighbor together with the address it has on the shared link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerLink {
    pub peer: ASN,
    pub address: Ipv4Addr,
}

impl Serialize for PeerLink {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.peer.to_string(), &self.address)?;
        map.end()
    }
}

/// Addressing view of one AS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NeighborRecord {
    #[serde(skip)]
    pub asn: ASN,
    pub p2p: Vec<PeerLink>,
    pub p2c: Vec<PeerLink>,
    pub c2p: Vec<PeerLink>,
    /// This AS's own address on the link towards each neighbor.
    #[serde(rename = "asLan")]
    pub as_lan: BTreeMap<ASN, Ipv4Addr>,
    #[serde(rename = "internalLan")]
    pub internal_lan: Ipv4Addr,
    pub rpki: YesNo,
    #[serde(rename = "coll")]
    pub collector: YesNo,
}

impl NeighborRecord {
    fn new(asn: ASN, rpki: YesNo, collector: YesNo) -> Result<Self> {
        Ok(NeighborRecord {
            asn,
            p2p: Vec::new(),
            p2c: Vec::new(),
            c2p: Vec::new(),
            as_lan: BTreeMap::new(),
            internal_lan: internal_lan(asn)?,
            rpki,
            collector,
        })
    }

    pub fn get_links(&self, rel: Relationships) -> &[PeerLink] {
        match rel {
            Relationships::Peers => &self.p2p,
            Relationships::Customers => &self.p2c,
            Relationships::Providers => &self.c2p,
        }
    }

    fn get_links_mut(&mut self, rel: Relationships) -> &mut Vec<PeerLink> {
        match rel {
            Relationships::Peers => &mut self.p2p,
            Relationships::Customers => &mut self.p2c,
            Relationships::Providers => &mut self.c2p,
        }
    }

    /// Every link, `p2p` first, then `p2c`, then `c2p`.
    pub fn links(&self) -> impl Iterator<Item = (Relationships, &PeerLink)> {
        Relationships::ALL
            .into_iter()
            .flat_map(move |rel| self.get_links(rel).iter().map(move |link| (rel, link)))
    }

    pub fn internal_prefix(&self) -> Result<Ipv4Network> {
        let [a, b, c, _] = self.internal_lan.octets();
        Ok(Ipv4Network::new(Ipv4Addr::new(a, b, c, 0), 24)?)
    }

    pub fn is_rpki(&self) -> bool {
        self.rpki.into()
    }

    pub fn is_collector(&self) -> bool {
        self.collector.into()
    }
}

/// Offsets of (this AS, neighbor) on a link of kind `rel` seen from this AS.
fn link_offsets(rel: Relationships) -> (u8, u8) {
    match rel {
        Relationships::Peers => (INITIATOR_OFFSET, RESPONDER_OFFSET),
        Relationships::Customers => (PROVIDER_OFFSET, CUSTOMER_OFFSET),
        Relationships::Providers => (CUSTOMER_OFFSET, PROVIDER_OFFSET),
    }
}

/// Neighbor records of every AS of a topology, in synthesis order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressPlan {
    order: Vec<ASN>,
    records: BTreeMap<ASN, NeighborRecord>,
}

impl AddressPlan {
    /// Assign every internal LAN and resolve every AS-pair link exactly once, drawing link
    /// blocks from `allocator`.
    pub fn synthesize(topology: &Topology, allocator: &mut LinkAllocator) -> Result<Self> {
        let order = topology.synthesis_order();
        let mut records = BTreeMap::new();
        for asn in &order {
            let node = topology.get(asn).ok_or(Error::UnknownAs(*asn))?;
            records.insert(*asn, NeighborRecord::new(*asn, node.rpki, node.collector)?);
        }

        for asn in &order {
            let node = topology.get(asn).ok_or(Error::UnknownAs(*asn))?;
            for rel in Relationships::ALL {
                for &peer in node.get_neighbors(rel) {
                    let resolved = records
                        .get(&peer)
                        .ok_or(Error::UnknownAs(peer))?
                        .as_lan
                        .contains_key(asn);
                    if resolved {
                        continue;
                    }

                    let block = allocator.allocate()?;
                    let (own_offset, peer_offset) = link_offsets(rel);
                    let (Some(own_address), Some(peer_address)) =
                        (block.host(own_offset), block.host(peer_offset))
                    else {
                        return Err(Error::InvalidConfig(format!(
                            "link offsets {}/{} outside the /30 {}",
                            own_offset,
                            peer_offset,
                            block.base()
                        )));
                    };
                    debug!(
                        "link AS {} ({}) - AS {} ({}) [{}]",
                        asn, own_address, peer, peer_address, rel
                    );

                    if let Some(record) = records.get_mut(asn) {
                        record.get_links_mut(rel).push(PeerLink {
                            peer,
                            address: peer_address,
                        });
                        record.as_lan.insert(peer, own_address);
                    }
                    if let Some(record) = records.get_mut(&peer) {
                        record.get_links_mut(rel.invert()).push(PeerLink {
                            peer: *asn,
                            address: own_address,
                        });
                        record.as_lan.insert(*asn, peer_address);
                    }
                }
            }
        }

        info!(
            "Address plan of {} ASes synthesized, next free link block {}",
            records.len(),
            allocator.cursor()
        );
        Ok(AddressPlan { order, records })
    }

    pub fn get(&self, asn: &ASN) -> Option<&NeighborRecord> {
        self.records.get(asn)
    }

    pub fn order(&self) -> &[ASN] {
        &self.order
    }

    /// The AS that also hosts the RPKI server link and announces its prefix.
    pub fn first_as(&self) -> Option<ASN> {
        self.order.first().copied()
    }

    /// Records in synthesis order.
    pub fn iter(&self) -> impl Iterator<Item = &NeighborRecord> {
        self.order.iter().filter_map(|asn| self.records.get(asn))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn to_json_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(&self.records)?)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &self.records)?;
        info!("Neighbor records saved to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_put_provider_on_two() {
        assert_eq!(link_offsets(Relationships::Customers), (2, 1));
        assert_eq!(link_offsets(Relationships::Providers), (1, 2));
        assert_eq!(link_offsets(Relationships::Peers), (1, 2));
    }

    #[test]
    fn test_peer_link_serializes_as_single_entry_map() {
        let link = PeerLink {
            peer: 65001,
            address: Ipv4Addr::new(120, 0, 0, 2),
        };
        assert_eq!(
            serde_json::to_string(&link).unwrap(),
            r#"{"65001":"120.0.0.2"}"#
        );
    }
}
