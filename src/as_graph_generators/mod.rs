pub mod caida;

use std::path::PathBuf;

use crate::as_graph::ASGraph;
use crate::error::Result;

pub trait ASGraphGenerator {
    fn generate(&self) -> Result<ASGraph>;
}

/// Build the graph from a relationship file already on disk.
pub struct RelationsFileGenerator {
    pub relations_file: PathBuf,
}

impl RelationsFileGenerator {
    pub fn new(relations_file: PathBuf) -> Self {
        RelationsFileGenerator { relations_file }
    }
}

impl ASGraphGenerator for RelationsFileGenerator {
    fn generate(&self) -> Result<ASGraph> {
        caida::CAIDAASGraphJSONConverter::new(&self.relations_file).convert()
    }
}

/// Download (or reuse the cached) CAIDA dataset and build the graph from it.
pub struct CAIDAASGraphGenerator {
    pub days_ago: u32,
    pub cache_dir: PathBuf,
}

impl CAIDAASGraphGenerator {
    pub fn new() -> Self {
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("conelab");
        CAIDAASGraphGenerator {
            days_ago: 10,
            cache_dir,
        }
    }

    pub fn with_days_ago(mut self, days: u32) -> Self {
        self.days_ago = days;
        self
    }

    pub fn with_cache_dir(mut self, dir: PathBuf) -> Self {
        self.cache_dir = dir;
        self
    }

    /// Download the file without converting it.
    pub fn fetch(&self) -> Result<PathBuf> {
        caida::CAIDAASGraphCollector::new(self.days_ago, &self.cache_dir).run()
    }
}

impl Default for CAIDAASGraphGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ASGraphGenerator for CAIDAASGraphGenerator {
    fn generate(&self) -> Result<ASGraph> {
        let cached_path = self.fetch()?;
        caida::CAIDAASGraphJSONConverter::new(&cached_path).convert()
    }
}
