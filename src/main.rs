use std::path::PathBuf;
use std::process;

use spikeflow::checkpoint::{self, Checkpoint};
use spikeflow::config::{FlowConfig, LearningConfig};
use spikeflow::error::FlowError;
use spikeflow::learning::LearningLoop;
use spikeflow::router::FlowRouter;

fn main() {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.first().map(String::as_str) == Some("--help")
        || args.first().map(String::as_str) == Some("-h")
        || args.first().map(String::as_str) == Some("help")
    {
        print_help();
        return;
    }

    let result = match args.first().map(String::as_str) {
        None => run_demo(),
        Some("run") => run_once(&args[1..]),
        Some("learn") => run_learn(&args[1..]),
        Some(other) => {
            eprintln!("Unknown command: {other}");
            print_help();
            process::exit(2);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn print_help() {
    println!("spikeflow (spiking-particle flow router with an online learning loop)");
    println!("usage:");
    println!("  cargo run                       # fixed-seed learning demo");
    println!("  cargo run -- run [--seed S]     # single epoch, histogram dump");
    println!("  cargo run -- learn [--epochs N] [--seed S] [--target FILE] [--checkpoints DIR]");
    println!("  cargo run -- --help");
}

const DEMO_ENERGIES: [f32; 8] = [10.0, 20.0, 15.0, 8.0, 12.0, 18.0, 22.0, 14.0];

fn run_demo() -> Result<(), FlowError> {
    let cfg = FlowConfig {
        seed: Some(7),
        ..FlowConfig::default()
    };
    let learn = LearningConfig::default();

    let mut learner = LearningLoop::new(cfg, learn)?;
    let series = learner.run(&DEMO_ENERGIES, Some(&DEMO_ENERGIES))?;
    for m in &series {
        println!("{}", m.summary());
    }

    let p = learner.params();
    println!(
        "learned: threshold={:.3} radial_bias={:.3} spike_kick={:.3}",
        p.lif_threshold, p.radial_bias, p.spike_kick
    );
    println!("gains: {:?}", p.gains);
    Ok(())
}

fn run_once(args: &[String]) -> Result<(), FlowError> {
    let seed = flag_value(args, "--seed")
        .map(|s| parse_u64(&s, "--seed"))
        .unwrap_or(7);

    let cfg = FlowConfig {
        seed: Some(seed),
        ..FlowConfig::default()
    };
    let mut router = FlowRouter::new(cfg)?;
    let mut state = router.seed_state(&DEMO_ENERGIES);
    let out = router.run(&mut state)?;

    let spike_rate = if out.particle_steps > 0 {
        out.spikes as f32 / out.particle_steps as f32
    } else {
        0.0
    };
    println!(
        "steps={} completions={} deaths={} spike_rate={:.3}",
        state.step,
        out.completions.len(),
        out.deaths,
        spike_rate
    );
    for (b, e) in state.outputs.iter().enumerate() {
        println!("bin {b:2}: {e:.3}");
    }
    Ok(())
}

fn run_learn(args: &[String]) -> Result<(), FlowError> {
    let seed = flag_value(args, "--seed")
        .map(|s| parse_u64(&s, "--seed"))
        .unwrap_or(7);
    let epochs = flag_value(args, "--epochs")
        .map(|s| parse_u64(&s, "--epochs") as u32)
        .unwrap_or(LearningConfig::default().epochs);
    let target_path = flag_value(args, "--target").map(PathBuf::from);
    let checkpoint_dir = flag_value(args, "--checkpoints").map(PathBuf::from);

    let cfg = FlowConfig {
        seed: Some(seed),
        ..FlowConfig::default()
    };
    let learn = LearningConfig {
        epochs,
        ..LearningConfig::default()
    };

    let target = match &target_path {
        Some(path) => checkpoint::load_target(path, cfg.bins)?,
        None => checkpoint::derive_target(&DEMO_ENERGIES, cfg.bins),
    };

    if let Some(dir) = &checkpoint_dir {
        std::fs::create_dir_all(dir).map_err(|e| FlowError::Io {
            path: dir.clone(),
            source: e,
        })?;
    }

    let mut learner = LearningLoop::new(cfg, learn)?;
    for _ in 0..epochs {
        let metrics = learner.run_epoch(&DEMO_ENERGIES, &target)?;
        println!("{}", metrics.summary());

        if let Some(dir) = &checkpoint_dir {
            let record = Checkpoint {
                epoch: metrics.epoch,
                params: learner.params().clone(),
                metrics: metrics.clone(),
            };
            let path = dir.join(format!("epoch_{:04}.json", record.epoch));
            checkpoint::save_checkpoint(&path, &record)?;
        }
    }
    Ok(())
}

fn flag_value(args: &[String], name: &str) -> Option<String> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1).cloned())
}

fn parse_u64(s: &str, flag: &str) -> u64 {
    s.parse().unwrap_or_else(|_| {
        eprintln!("{flag} must be a number, got '{s}'");
        process::exit(2);
    })
}
