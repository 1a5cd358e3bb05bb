use std::fs::{self, File};
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use bzip2::read::BzDecoder;
use chrono::{Duration, Utc};
use lazy_static::lazy_static;
use log::{debug, info, trace};
use regex::Regex;

use crate::as_graph::{ASGraph, ASN};
use crate::error::{Error, Result};

const SERIAL_2_URL: &str = "http://data.caida.org/datasets/as-relationships/serial-2/";

lazy_static! {
    static ref PROVIDER_CUSTOMER_LINE: Regex = Regex::new(r"^(\d+)\|(\d+)\|-1").unwrap();
    static ref PEER_LINE: Regex = Regex::new(r"^(\d+)\|(\d+)\|0(?:\|(.*))?").unwrap();
}

/// Downloads and caches the CAIDA serial-2 relationship file of a given day.
pub struct CAIDAASGraphCollector {
    days_ago: u32,
    cache_dir: PathBuf,
}

impl CAIDAASGraphCollector {
    pub fn new(days_ago: u32, cache_dir: &Path) -> Self {
        CAIDAASGraphCollector {
            days_ago,
            cache_dir: cache_dir.to_path_buf(),
        }
    }

    pub fn run(&self) -> Result<PathBuf> {
        fs::create_dir_all(&self.cache_dir)?;

        let cached_path = self.get_cached_path();
        if cached_path.exists() {
            info!("Using cached CAIDA data from {}", cached_path.display());
            return Ok(cached_path);
        }

        let url = self.get_download_url();
        info!("Downloading CAIDA AS relationships from {}", url);
        let bz2_data = self.download_file(&url)?;

        let mut decompressed = Vec::new();
        BzDecoder::new(bz2_data.as_slice()).read_to_end(&mut decompressed)?;
        fs::write(&cached_path, decompressed)?;

        info!("CAIDA data saved to {}", cached_path.display());
        Ok(cached_path)
    }

    fn get_cached_path(&self) -> PathBuf {
        let date = Utc::now() - Duration::days(self.days_ago as i64);
        self.cache_dir
            .join(format!("caida_{}.txt", date.format("%Y%m%d")))
    }

    fn get_download_url(&self) -> String {
        let date = Utc::now() - Duration::days(self.days_ago as i64);
        format!("{}{}.as-rel2.txt.bz2", SERIAL_2_URL, date.format("%Y%m%d"))
    }

    fn download_file(&self, url: &str) -> Result<Vec<u8>> {
        let response = reqwest::blocking::get(url)?;
        if !response.status().is_success() {
            return Err(Error::Download {
                url: url.to_string(),
                status: response.status().to_string(),
            });
        }
        Ok(response.bytes()?.to_vec())
    }
}

/// One relationship record of the dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ASRelation {
    ProviderCustomer { provider: ASN, customer: ASN },
    Peers { a: ASN, b: ASN, source: Option<String> },
}

/// Everything extracted from a relationship file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationshipMetadata {
    /// ASes of the `# input clique:` directive.
    pub clique: Vec<ASN>,
    /// ASes of the `# IXP ASes:` directive.
    pub ixp_ases: Vec<ASN>,
    pub as_relations: Vec<ASRelation>,
}

fn parse_asn_list(list: &str) -> Vec<ASN> {
    list.split_whitespace().filter_map(|s| s.parse().ok()).collect()
}

/// Classify a single line. Lines that are neither a known directive nor a relationship are
/// skipped and yield `None`.
fn parse_line(line: &str, metadata: &mut RelationshipMetadata) -> Option<()> {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix("# input clique:") {
        metadata.clique = parse_asn_list(rest);
    } else if let Some(rest) = line.strip_prefix("# IXP ASes:") {
        metadata.ixp_ases = parse_asn_list(rest);
    } else if line.starts_with('#') {
        return None;
    } else if let Some(caps) = PROVIDER_CUSTOMER_LINE.captures(line) {
        metadata.as_relations.push(ASRelation::ProviderCustomer {
            provider: caps[1].parse().ok()?,
            customer: caps[2].parse().ok()?,
        });
    } else if let Some(caps) = PEER_LINE.captures(line) {
        // the source is the fourth field, when present
        let source = caps
            .get(3)
            .and_then(|rest| rest.as_str().split('|').next())
            .filter(|source| !source.is_empty())
            .map(str::to_string);
        metadata.as_relations.push(ASRelation::Peers {
            a: caps[1].parse().ok()?,
            b: caps[2].parse().ok()?,
            source,
        });
    } else {
        return None;
    }
    Some(())
}

/// Parses relationship records into [`RelationshipMetadata`].
pub struct CAIDAASGraphJSONConverter {
    file_path: PathBuf,
}

impl CAIDAASGraphJSONConverter {
    pub fn new(file_path: &Path) -> Self {
        CAIDAASGraphJSONConverter {
            file_path: file_path.to_path_buf(),
        }
    }

    /// Parse the file; `.bz2` files are decompressed on the fly.
    pub fn parse_file(&self) -> Result<RelationshipMetadata> {
        info!("Processing the BGP relations file {}", self.file_path.display());
        let file = File::open(&self.file_path)?;
        let is_bz2 = self
            .file_path
            .extension()
            .map(|ext| ext == "bz2")
            .unwrap_or(false);
        if is_bz2 {
            Self::parse_reader(BufReader::new(BzDecoder::new(file)))
        } else {
            Self::parse_reader(BufReader::new(file))
        }
    }

    pub fn parse_reader<R: BufRead>(reader: R) -> Result<RelationshipMetadata> {
        let mut metadata = RelationshipMetadata::default();
        let mut skipped = 0usize;
        for line in reader.lines() {
            let line = line?;
            if parse_line(&line, &mut metadata).is_none() {
                trace!("skipping line {:?}", line);
                skipped += 1;
            }
        }
        debug!(
            "parsed {} relations, skipped {} lines",
            metadata.as_relations.len(),
            skipped
        );
        Ok(metadata)
    }

    pub fn convert(&self) -> Result<ASGraph> {
        Ok(generate_as_graph(&self.parse_file()?))
    }
}

/// Build the mirrored relationship graph out of the parsed records.
pub fn generate_as_graph(metadata: &RelationshipMetadata) -> ASGraph {
    let mut as_graph = ASGraph::new();
    for relation in &metadata.as_relations {
        match *relation {
            ASRelation::ProviderCustomer { provider, customer } => {
                as_graph.add_provider_customer(provider, customer)
            }
            ASRelation::Peers { a, b, .. } => as_graph.add_peers(a, b),
        }
    }

    for asn in &metadata.clique {
        if let Some(as_obj) = as_graph.get_mut(asn) {
            as_obj.tier_1 = true;
        }
    }
    for asn in &metadata.ixp_ases {
        if let Some(as_obj) = as_graph.get_mut(asn) {
            as_obj.ixp = true;
        }
    }

    as_graph
}
