use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use toml::Table;

use kaon::l2::L2Config;
use kaon::sim::config::{to_level_filter, Config, SimConfig};
use kaon::sim::top::L2Top;
use kaon::traffic::TrafficConfig;

#[derive(Parser)]
#[command(version, about)]
struct KaonArgs {
    #[arg(help = "Path to config.toml")]
    config_path: PathBuf,
    #[arg(long, help = "Override number of simulated cycles")]
    num_cycles: Option<u64>,
    #[arg(long, help = "Override stimulus RNG seed")]
    seed: Option<u64>,
    #[arg(long, help = "Enable log at level (0:warn, 1:info, 2:debug, 3:trace)")]
    log: Option<u64>,
}

pub fn main() -> anyhow::Result<()> {
    let argv = KaonArgs::parse();
    let config = fs::read_to_string(&argv.config_path)
        .with_context(|| format!("failed to read config file {}", argv.config_path.display()))?;
    let config_table: Table = toml::from_str(&config).context("cannot parse config toml")?;

    let mut sim_config = SimConfig::from_section(config_table.get("sim"));
    let l2_config = L2Config::from_section(config_table.get("l2"));
    let traffic_config = TrafficConfig::from_section(config_table.get("traffic"));

    // override toml configs with argv
    sim_config.num_cycles = argv.num_cycles.unwrap_or(sim_config.num_cycles);
    sim_config.seed = argv.seed.unwrap_or(sim_config.seed);
    sim_config.log_level = argv.log.unwrap_or(sim_config.log_level);

    env_logger::Builder::from_default_env()
        .filter_level(to_level_filter(sim_config.log_level))
        .init();

    let mut top = L2Top::new(sim_config, l2_config, traffic_config);
    let stats = top.simulate();
    println!(
        "cycles: {}\nrequests: {}\nresponses: {}\ndrops: {}\nfills: {}\nsync failures: {}\nl1 updates: {}",
        sim_config.num_cycles,
        stats.requests,
        stats.responses,
        stats.drops,
        stats.fills,
        stats.sync_failures,
        stats.invalidations,
    );
    Ok(())
}
