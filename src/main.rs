use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use metroii_kernel::{
    ConfigLoader, ConfigOverrides, CoordinatorBuilder, KernelConfig, PeriodicActor, Policy,
    ResolverKind,
};

/// MetroII kernel demo: periodic actors under a selectable resolver.
#[derive(Parser, Debug)]
#[command(name = "metroii")]
#[command(version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// TOML config file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Constraint mapping file (one `a, b` pair per line)
    #[arg(short, long, value_name = "PATH")]
    mapping: Option<PathBuf>,

    /// Log every resolved event
    #[arg(long)]
    print_trace: bool,

    /// Base period of the demo actors
    #[arg(long)]
    period: Option<u64>,

    /// Number of periodic actors
    #[arg(long, default_value_t = 3)]
    actors: u64,

    /// Cycles each actor runs before asking to halt
    #[arg(long, default_value_t = 3)]
    cycles: u64,

    /// Round bound (0 = unbounded)
    #[arg(long)]
    max_rounds: Option<u64>,

    /// constraint | time | time_then_constraint
    #[arg(long)]
    resolver: Option<ResolverKind>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut loader = ConfigLoader::new().with_overrides(ConfigOverrides {
        mapping: args.mapping.clone(),
        print_trace: args.print_trace.then_some(true),
        period: args.period,
        max_rounds: args.max_rounds,
        resolver: args.resolver,
    });
    if let Some(path) = &args.config {
        loader = loader.with_file(path);
    }
    let config = loader.load().context("loading kernel configuration")?;

    // --debug > --verbose / print_trace > RUST_LOG > "warn"
    let filter = if args.debug {
        EnvFilter::new("metroii_kernel=debug,metroii=debug")
    } else if args.verbose || config.print_trace {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_filter(filter))
        .init();

    println!("═══════════════════════════════════════════════════════");
    println!("  MetroII — Event-Coordination Kernel");
    println!("  {} periodic actors, resolver = {:?}", args.actors, config.resolver);
    println!("═══════════════════════════════════════════════════════");
    println!();

    let hash_1 = run_model("Run 1", &config, &args)?;
    let hash_2 = run_model("Run 2", &config, &args)?;

    println!("  Verification:");
    println!("    Run 1 log hash: {:016x}", hash_1);
    println!("    Run 2 log hash: {:016x}", hash_2);
    if hash_1 == hash_2 {
        println!("    ✓ Logs are IDENTICAL — deterministic rounds confirmed.");
    } else {
        println!("    ✗ MISMATCH — determinism violation detected!");
    }
    Ok(())
}

fn run_model(label: &str, config: &KernelConfig, args: &Args) -> Result<u64> {
    let mut builder = CoordinatorBuilder::new()
        .from_config(config)
        .with_checkpoints(4);
    for i in 0..args.actors {
        let actor = PeriodicActor::new(format!("p{}", i), config.period * (i + 1))
            .halting_after(args.cycles);
        builder = builder.actor_with_policy(actor, Policy::blocking_actor());
    }
    let (coordinator, outcome) = builder.run().with_context(|| format!("{} failed", label))?;

    println!(
        "  {}: {} rounds, {} notified, {:?}",
        label, outcome.rounds, outcome.notified, outcome.termination
    );
    if let Some(t) = coordinator.latest_time() {
        println!("    latest notified time: {}", t);
    }
    let log = coordinator
        .event_log()
        .context("round log was not enabled")?;
    for cp in log.checkpoints() {
        println!("    Checkpoint: round {}, hash={:016x}", cp.round, cp.state_hash);
    }
    println!();
    Ok(log.log_hash())
}
