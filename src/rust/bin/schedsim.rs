// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

#![deny(clippy::all)]

//======================================================================================================================
// Imports
//======================================================================================================================

use ::anyhow::Result;
use ::clap::{
    Arg,
    ArgAction,
    ArgMatches,
    Command,
};
use ::flexi_logger::LoggerHandle;
use ::schedsim::{
    config::load_workload,
    runtime::logging,
    DequeuePolicy,
    FlowConfig,
    FlowReport,
    HostKind,
    SimConfig,
    SimStats,
    Simulation,
};

//======================================================================================================================
// Program Arguments
//======================================================================================================================

/// Program Arguments
#[derive(Debug)]
pub struct ProgramArguments {
    /// Run configuration.
    config: SimConfig,
    /// Path to the workload file.
    workload: String,
    /// Include raw latencies in the report.
    print_values: bool,
    /// Number of `-v` flags.
    verbosity: u8,
}

/// Associate functions for Program Arguments
impl ProgramArguments {
    /// Parses the program arguments from the command line interface.
    pub fn new(app_name: &'static str, app_author: &'static str, app_about: &'static str) -> Result<Self> {
        let matches: ArgMatches = Command::new(app_name)
            .author(app_author)
            .about(app_about)
            .arg(
                Arg::new("cores")
                    .long("cores")
                    .short('c')
                    .value_parser(clap::value_parser!(usize))
                    .default_value("8")
                    .value_name("COUNT")
                    .help("Sets the number of cores"),
            )
            .arg(
                Arg::new("network-cores")
                    .long("network-cores")
                    .short('n')
                    .value_parser(clap::value_parser!(usize))
                    .default_value("0")
                    .value_name("COUNT")
                    .help("Sets the number of network cores of a partitioned host"),
            )
            .arg(
                Arg::new("host-type")
                    .long("host-type")
                    .value_parser(clap::value_parser!(String))
                    .default_value("global")
                    .value_name("global|local|partitioned-global|mixed-global|static-core|perflow|dispatcher")
                    .help("Sets the host type"),
            )
            .arg(
                Arg::new("deq-cost")
                    .long("deq-cost")
                    .value_parser(clap::value_parser!(f64))
                    .default_value("0")
                    .value_name("TIME")
                    .help("Sets the cost of one dequeue"),
            )
            .arg(
                Arg::new("preemption-cost")
                    .long("preemption-cost")
                    .value_parser(clap::value_parser!(f64))
                    .default_value("0")
                    .value_name("TIME")
                    .help("Sets the cost of one preemption"),
            )
            .arg(
                Arg::new("queue-policy")
                    .long("queue-policy")
                    .value_parser(clap::value_parser!(String))
                    .default_value("longest-length")
                    .value_name("longest-length|longest-load|first-packet-latency|first-packet-wait|round-robin")
                    .help("Sets the dequeue policy of a per-flow host"),
            )
            .arg(
                Arg::new("sim-time")
                    .long("sim-time")
                    .short('t')
                    .value_parser(clap::value_parser!(f64))
                    .default_value("500000")
                    .value_name("TIME")
                    .help("Sets the simulated time"),
            )
            .arg(
                Arg::new("seed")
                    .long("seed")
                    .short('s')
                    .value_parser(clap::value_parser!(u64))
                    .default_value("0")
                    .value_name("SEED")
                    .help("Sets the random seed"),
            )
            .arg(
                Arg::new("workload-conf")
                    .long("workload-conf")
                    .value_parser(clap::value_parser!(String))
                    .required(true)
                    .value_name("PATH")
                    .help("Sets the workload file"),
            )
            .arg(
                Arg::new("print-values")
                    .long("print-values")
                    .action(ArgAction::SetTrue)
                    .help("Prints every recorded latency"),
            )
            .arg(
                Arg::new("verbose")
                    .short('v')
                    .action(ArgAction::Count)
                    .help("Increases verbosity"),
            )
            .get_matches();

        let mut config: SimConfig = SimConfig::default();
        if let Some(cores) = matches.get_one::<usize>("cores") {
            config.cores = *cores;
        }
        if let Some(network_cores) = matches.get_one::<usize>("network-cores") {
            config.network_cores = *network_cores;
        }
        if let Some(host_kind) = matches.get_one::<String>("host-type") {
            config.host_kind = host_kind.parse::<HostKind>()?;
        }
        if let Some(dequeue_cost) = matches.get_one::<f64>("deq-cost") {
            config.dequeue_cost = *dequeue_cost;
        }
        if let Some(preemption_cost) = matches.get_one::<f64>("preemption-cost") {
            config.preemption_cost = *preemption_cost;
        }
        if let Some(queue_policy) = matches.get_one::<String>("queue-policy") {
            config.queue_policy = queue_policy.parse::<DequeuePolicy>()?;
        }
        if let Some(horizon) = matches.get_one::<f64>("sim-time") {
            config.horizon = *horizon;
        }
        if let Some(seed) = matches.get_one::<u64>("seed") {
            config.seed = *seed;
        }

        let workload: String = match matches.get_one::<String>("workload-conf") {
            Some(workload) => workload.to_string(),
            None => anyhow::bail!("missing workload file"),
        };

        Ok(Self {
            config,
            workload,
            print_values: matches.get_flag("print-values"),
            verbosity: matches.get_count("verbose"),
        })
    }
}

//======================================================================================================================
// main()
//======================================================================================================================

fn main() -> Result<()> {
    let args: ProgramArguments = ProgramArguments::new(
        "schedsim",
        "Microsoft Corporation",
        "Simulates request scheduling on a multi-core host.",
    )?;
    let _logger: LoggerHandle = logging::initialize(logging::level_for_verbosity(args.verbosity))?;

    let flows: Vec<FlowConfig> = load_workload(&args.workload)?;
    let cores: usize = args.config.cores;
    let simulation: Simulation = Simulation::new(args.config, flows)?;
    let stats: SimStats = simulation.run()?;

    let reports: Vec<FlowReport> = stats.report(cores, args.print_values)?;
    println!("{}", serde_json::to_string(&reports)?);
    Ok(())
}
