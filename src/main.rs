use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use log::{info, warn};

use conelab::as_graph_generators::{ASGraphGenerator, CAIDAASGraphGenerator, RelationsFileGenerator};
use conelab::customer_cone::statistics::ConeStatistics;
use conelab::lab::{NODE_SELECTION_FILE, TOPOLOGY_FILE};
use conelab::{
    ASGraph, CommandExecutor, CustomerCone, Error, Lab, LabConfig, NodeSelection, SystemClock,
    Topology, ASN,
};

const AS_GRAPH_FILE: &str = "as_graph.json";
const CUSTOMER_CONE_FILE: &str = "customer_cone.json";
const STATISTICS_FILE: &str = "statistics_customer_cone.json";
const ANALYSIS_FILE: &str = "bgp_analysis_results.json";

#[derive(Parser, Debug)]
#[command(about, long_about = None)]
struct Cli {
    /// JSON configuration file. Flags given on the command line take precedence.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Directory receiving every artifact.
    #[arg(short, long, global = true)]
    output_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct GraphArgs {
    /// CAIDA serial-2 relationship file (plain or .bz2).
    #[arg(short, long)]
    relations: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse a relationship file into `as_graph.json`.
    Parse(GraphArgs),
    /// Download the CAIDA relationship dataset of a past day.
    FetchCaida {
        #[arg(long, default_value_t = 10)]
        days_ago: u32,
        #[arg(long)]
        cache_dir: Option<PathBuf>,
        /// Also parse the downloaded file into `as_graph.json`.
        #[arg(long)]
        parse: bool,
    },
    /// Extract the customer cone of an AS.
    Cone {
        #[command(flatten)]
        graph: GraphArgs,
        #[arg(long)]
        root: Option<ASN>,
        #[arg(long)]
        statistics: bool,
    },
    /// Synthesize the whole lab of a customer cone.
    Synthesize {
        #[command(flatten)]
        graph: GraphArgs,
        #[arg(long)]
        root: Option<ASN>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        prefer_customer: bool,
        #[arg(long)]
        permit_invalid: bool,
    },
    /// Run the hijack on a running lab and classify the routers.
    Attack,
}

fn load_config(cli: &Cli) -> Result<LabConfig, Error> {
    let mut config = match &cli.config {
        Some(path) => LabConfig::load_from_file(path)?,
        None => LabConfig::default(),
    };
    if let Some(dir) = &cli.output_dir {
        config = config.with_output_dir(dir.clone());
    }
    Ok(config)
}

fn relations_file(config: &LabConfig, args: &GraphArgs) -> Result<PathBuf, Error> {
    args.relations
        .clone()
        .or_else(|| config.relations_file.clone())
        .ok_or_else(|| Error::InvalidConfig("no relations file given".to_string()))
}

fn build_graph(config: &LabConfig, args: &GraphArgs) -> Result<ASGraph, Error> {
    let path = relations_file(config, args)?;
    info!("Parsing relationships from {}", path.display());
    let graph = RelationsFileGenerator::new(path).generate()?;
    info!("AS graph with {} ASes", graph.len());
    Ok(graph)
}

fn build_cone(config: &LabConfig, graph: &ASGraph) -> Result<CustomerCone, Error> {
    let root = config
        .specified_as
        .ok_or_else(|| Error::InvalidConfig("no cone root given".to_string()))?;
    graph.validate_cone_root(root)?;
    CustomerCone::build(graph, root)
}

fn write_cone(config: &LabConfig, cone: &CustomerCone, statistics: bool) -> Result<(), Error> {
    let dir = &config.output_dir;
    fs::create_dir_all(dir)?;
    cone.save_to_file(&dir.join(CUSTOMER_CONE_FILE))?;
    if statistics || config.show_statistics_ccone {
        let stats = ConeStatistics::compute(cone);
        info!(
            "Cone of AS {}: {} ASes, {} sub-cones",
            cone.root(),
            stats.size,
            stats.sub_cones
        );
        stats.save_to_file(cone.root(), &dir.join(STATISTICS_FILE))?;
    }
    Ok(())
}

fn load_selection(dir: &Path) -> Result<NodeSelection, Error> {
    let raw = fs::read_to_string(dir.join(NODE_SELECTION_FILE))?;
    Ok(serde_json::from_str(&raw)?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    pretty_env_logger::init();

    let cli = Cli::parse();
    let mut config = load_config(&cli)?;

    match &cli.command {
        Command::Parse(args) => {
            let graph = build_graph(&config, args)?;
            fs::create_dir_all(&config.output_dir)?;
            graph.save_to_file(&config.output_dir.join(AS_GRAPH_FILE))?;
        }
        Command::FetchCaida {
            days_ago,
            cache_dir,
            parse,
        } => {
            let mut generator = CAIDAASGraphGenerator::new().with_days_ago(*days_ago);
            if let Some(dir) = cache_dir {
                generator = generator.with_cache_dir(dir.clone());
            }
            let path = generator.fetch()?;
            info!("CAIDA relationships available at {}", path.display());
            if *parse {
                let graph = RelationsFileGenerator::new(path).generate()?;
                fs::create_dir_all(&config.output_dir)?;
                graph.save_to_file(&config.output_dir.join(AS_GRAPH_FILE))?;
            }
        }
        Command::Cone {
            graph,
            root,
            statistics,
        } => {
            if let Some(root) = root {
                config = config.with_specified_as(*root);
            }
            config.validate()?;
            let as_graph = build_graph(&config, graph)?;
            let cone = build_cone(&config, &as_graph)?;
            write_cone(&config, &cone, *statistics)?;
        }
        Command::Synthesize {
            graph,
            root,
            seed,
            prefer_customer,
            permit_invalid,
        } => {
            if let Some(root) = root {
                config = config.with_specified_as(*root);
            }
            if let Some(seed) = seed {
                config = config.with_seed(*seed);
            }
            if *prefer_customer {
                config = config.with_prefer_customer(true);
            }
            if *permit_invalid {
                config = config.with_invalid_prefixes_in_bgp_table(true);
            }
            config.validate()?;

            let as_graph = build_graph(&config, graph)?;
            let cone = build_cone(&config, &as_graph)?;
            write_cone(&config, &cone, false)?;

            let selection = config.node_selection(&cone)?;
            info!(
                "{} RPKI nodes, {} collector peers, hacker AS {}, victim AS {}",
                selection.rpki_nodes.len(),
                selection.collector_nodes.len(),
                selection.hacker_node,
                selection.victim_node
            );
            let lab = Lab::synthesize(&config, &cone, &selection)?;
            info!(
                "Hijack of {} by AS {} is predicted {} by validating routers",
                lab.orchestrator.victim_prefix(),
                selection.hacker_node,
                lab.predicted_hijack_state()
            );
            let artifacts = lab.render(&config)?;
            artifacts.write_to(&config.output_dir)?;
        }
        Command::Attack => {
            config.validate()?;
            let dir = config.output_dir.clone();
            let topology = Topology::load_from_file(&dir.join(TOPOLOGY_FILE))?;
            let selection = load_selection(&dir)?;
            let lab = Lab::from_topology(
                &config,
                topology,
                selection.hacker_node,
                selection.victim_node,
            )?;

            let mut executor = CommandExecutor::new(config.executor.clone())?;
            let mut clock = SystemClock::new();
            let routers = lab.plan.order().to_vec();
            let report = lab
                .orchestrator
                .run(&mut executor, &mut clock, &routers, &config.convergence)?;
            if report.red_nodes.len() > 1 {
                warn!(
                    "{} of {} routers prefer the hijacked route",
                    report.red_nodes.len(),
                    routers.len()
                );
            }
            report.save_to_file(&dir.join(ANALYSIS_FILE))?;
        }
    }
    Ok(())
}
