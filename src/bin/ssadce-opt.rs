// Copyright (c) 2017-2021 Fabian Schuiki

#[macro_use]
extern crate clap;
#[macro_use]
extern crate log;

use anyhow::{anyhow, bail, Context, Result};
use clap::Arg;
use ssadce::{
    assembly::parse_module,
    opt::prelude::*,
    pass::{DeadCodeElim, Propagation},
    verifier::Verifier,
};
use std::{
    fs::File,
    io::{BufWriter, Read, Write},
};

fn main() {
    match main_inner() {
        Ok(_) => (),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn main_inner() -> Result<()> {
    let matches = app_from_crate!()
        .about("Eliminates dead code from SSA assembly.")
        .arg(
            Arg::with_name("verbosity")
                .short("v")
                .multiple(true)
                .help(first_line(HELP_VERBOSITY))
                .long_help(HELP_VERBOSITY),
        )
        .arg(
            Arg::with_name("input")
                .help("Assembly file to optimize")
                .required(true),
        )
        .arg(
            Arg::with_name("output")
                .short("o")
                .long("output")
                .takes_value(true)
                .help("File to write output to; stdout if omitted"),
        )
        .arg(
            Arg::with_name("time-passes")
                .short("t")
                .long("time")
                .help("Print execution time statistics per pass"),
        )
        .arg(
            Arg::with_name("single-threaded")
                .short("s")
                .long("no-parallel")
                .help("Do not parallelize execution"),
        )
        .arg(
            Arg::with_name("passes")
                .short("p")
                .long("pass")
                .value_name("PASS")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1)
                .help(first_line(HELP_PASSES))
                .long_help(HELP_PASSES),
        )
        .arg(
            Arg::with_name("disable")
                .long("disable")
                .value_name("PASS")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1)
                .help("Disable a pass; it is skipped wherever it is scheduled"),
        )
        .arg(
            Arg::with_name("operands-only")
                .long("operands-only")
                .help("Only propagate liveness from users to their operands"),
        )
        .get_matches();

    // Configure the logger.
    let verbose = std::cmp::max(1, matches.occurrences_of("verbosity") as usize) - 1;
    let quiet = !matches.is_present("verbosity");
    stderrlog::new()
        .module("ssadce")
        .module("ssadce_opt")
        .quiet(quiet)
        .verbosity(verbose)
        .init()
        .map_err(|e| anyhow!("failed to initialize logger: {}", e))?;

    // Configure rayon to be single-threaded if requested.
    let parallel = !matches.is_present("single-threaded");
    if !parallel {
        info!("Limiting to one rayon worker thread");
        rayon::ThreadPoolBuilder::new()
            .num_threads(1)
            .build_global()
            .context("failed to configure thread pool")?;
    }

    // Prepare the time tracking.
    let mut times = vec![];
    let tinit = time::precise_time_ns();

    // Read the input.
    let t0 = time::precise_time_ns();
    let mut module = {
        let path = matches
            .value_of("input")
            .ok_or_else(|| anyhow!("no input file given"))?;
        let mut input = File::open(path).with_context(|| format!("failed to open {}", path))?;
        let mut contents = String::new();
        input
            .read_to_string(&mut contents)
            .with_context(|| format!("failed to read {}", path))?;
        let module = parse_module(&contents).map_err(|e| anyhow!("{}: {}", path, e))?;
        let mut verifier = Verifier::new();
        verifier.verify_module(&module);
        verifier
            .finish()
            .map_err(|errs| anyhow!("Verification of input failed:\n{}", errs))?;
        module
    };
    let t1 = time::precise_time_ns();
    times.push(("parse".to_owned(), t1 - t0));

    // Configure the passes.
    let mut ctx = PassContext::new();
    if let Some(disabled) = matches.values_of("disable") {
        for pass in disabled {
            debug!("Disabling pass {}", pass);
            ctx.disable(pass);
        }
    }
    let propagation = if matches.is_present("operands-only") {
        Propagation::OperandsOnly
    } else {
        Propagation::Bidirectional
    };
    let passes: Vec<_> = match matches.values_of("passes") {
        Some(passes) => passes.collect(),
        None => vec!["dce"],
    };
    for &pass in &passes {
        if pass != DeadCodeElim::NAME && pass != "verify" {
            bail!("Unknown pass `{}`", pass);
        }
    }

    // Apply optimization passes.
    debug!("Running {:?}", passes);
    for &pass in &passes {
        trace!("Running pass {}", pass);
        let t0 = time::precise_time_ns();
        let changed = match pass {
            "dce" => {
                let mut dce = DeadCodeElim::with_propagation(propagation);
                if parallel {
                    run_parallel(&dce, &ctx, &mut module)
                } else {
                    dce.run_on_module(&ctx, &mut module)
                }
            }
            _ => {
                let mut verifier = Verifier::new();
                verifier.verify_module(&module);
                if let Err(errs) = verifier.finish() {
                    error!("Verification failed:\n{}", errs);
                }
                false
            }
        };
        for (unit, what) in ctx.take_invalidations() {
            debug!("Pass {} invalidated {} analyses of {}", pass, what, unit);
        }
        debug!("Pass {} {}", pass, if changed { "modified the module" } else { "made no changes" });
        let t1 = time::precise_time_ns();
        times.push((pass.to_owned(), t1 - t0));
    }

    // Verify modified module.
    let t0 = time::precise_time_ns();
    let mut verifier = Verifier::new();
    verifier.verify_module(&module);
    verifier
        .finish()
        .map_err(|errs| anyhow!("Verification failed after optimization:\n{}", errs))?;
    let t1 = time::precise_time_ns();
    times.push(("verify".to_owned(), t1 - t0));

    // Write the output.
    let t0 = time::precise_time_ns();
    if let Some(path) = matches.value_of("output") {
        let output = File::create(path).with_context(|| format!("failed to create {}", path))?;
        let mut output = BufWriter::with_capacity(1 << 20, output);
        ssadce::assembly::write_module(&mut output, &module)
            .and_then(|_| output.flush())
            .with_context(|| format!("failed to write {}", path))?;
    } else {
        let stdout = std::io::stdout();
        ssadce::assembly::write_module(stdout.lock(), &module)
            .context("failed to write to stdout")?;
    }
    let t1 = time::precise_time_ns();
    times.push(("output".to_owned(), t1 - t0));

    // Final time stat.
    let tfinal = time::precise_time_ns();
    times.push(("total".to_owned(), tfinal - tinit));

    // Print execution time statistics if requested by the user.
    if matches.is_present("time-passes") {
        eprintln!("Execution Time Statistics:");
        for (mut name, ns) in times {
            name.push(':');
            eprintln!("  {:10}  {:8.3} ms", name, ns as f64 * 1.0e-6);
        }
    }

    // Dump some threading statistics.
    info!("Used {} rayon worker threads", rayon::current_num_threads());

    Ok(())
}

fn first_line(text: &'static str) -> &'static str {
    text.lines().next().unwrap_or(text)
}

static HELP_VERBOSITY: &str = "Increase message verbosity

This option can be specified multiple times to increase the level of verbosity \
in the output:

-v      Only print errors
-vv     Also print warnings
-vvv    Also print info messages
-vvvv   Also print debug messages
-vvvvv  Also print detailed tracing messages
";

static HELP_PASSES: &str = "Exact order of passes to run

This option specifies the exact order of passes to be executed. If omitted, \
only dead code elimination runs. The admissible passes are as follows:

dce         Dead Code Elimination
verify      Verify the module and report errors without aborting
";
