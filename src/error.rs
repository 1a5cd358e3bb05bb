//! Module containing the crate error type

use thiserror::Error;

use crate::as_graph::ASN;

/// Main error type
#[derive(Debug, Error)]
pub enum Error {
    /// The AS number has more decimal digits than the internal LAN scheme can encode.
    #[error("AS number {0} out of range for internal LAN synthesis")]
    AsnOutOfRange(ASN),
    /// The link address pool ran out of /30 blocks.
    #[error("Exhausted all available link LANs")]
    AddressPoolExhausted,
    /// The requested customer cone root is not part of the graph.
    #[error("AS {0} is not present in the graph")]
    RootNotFound(ASN),
    /// The requested customer cone root has no customers.
    #[error("AS {0} is a leaf (no p2c relationships) and cannot be a cone root")]
    RootIsLeaf(ASN),
    /// A relationship references an AS that has no node.
    #[error("AS {0} is referenced but not defined in the topology")]
    UnknownAs(ASN),
    /// The configuration is inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    /// The attack phase was requested before the routers converged.
    #[error("Routers have not converged, refusing to trigger the hijack")]
    NotConverged,
    /// A router query could not be executed.
    #[error("Query on {router} failed: {reason}")]
    RouterQuery { router: String, reason: String },
    /// Download of the relationship dataset failed.
    #[error("Failed to download {url}: {status}")]
    Download { url: String, status: String },
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Network prefix error: {0}")]
    Prefix(#[from] ipnetwork::IpNetworkError),
    #[error("HTTP Error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Progress bar template error: {0}")]
    Template(#[from] indicatif::style::TemplateError),
}

pub type Result<T> = std::result::Result<T, Error>;
