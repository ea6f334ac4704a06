//! Toggle a side-by-side stereo display mode on an X11 output through `xrandr`

#![deny(
    clippy::all,
    clippy::complexity,
    clippy::correctness,
    clippy::nursery,
    clippy::pedantic,
    clippy::perf,
    clippy::style,
    absolute_paths_not_starting_with_crate,
    anonymous_parameters,
    bad_style,
    ellipsis_inclusive_range_patterns,
    exported_private_dependencies,
    ill_formed_attribute_input,
    improper_ctypes,
    keyword_idents,
    macro_use_extern_crate,
    meta_variable_misuse,
    missing_abi,
    no_mangle_generic_items,
    non_shorthand_field_patterns,
    noop_method_call,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    semicolon_in_expressions_from_macros,
    trivial_casts,
    trivial_numeric_casts,
    unconditional_recursion,
    unreachable_pub,
    unsafe_code,
    while_true
)]
#![allow(
    clippy::doc_markdown,
    clippy::module_name_repetitions,
    clippy::redundant_pub_crate,
    clippy::similar_names,
    clippy::struct_excessive_bools,
    clippy::too_many_lines,
    clippy::exit,
    clippy::print_stdout,
    clippy::use_debug
)]
#![cfg_attr(
    any(test),
    allow(
        clippy::expect_fun_call,
        clippy::expect_used,
        clippy::panic,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        clippy::unwrap_used,
        clippy::wildcard_enum_match_arm,
        clippy::float_cmp,
    )
)]

mod cli;
mod config;
mod controller;
mod error;
mod geometry;
mod macros;
mod randr;
mod screen;
mod utils;
mod x11;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use cli::{Action, Opts, USAGE};
use colored::Colorize;
use config::Config;
use controller::Controller;
use randr::Xrandr;
use std::process;
use utils::wants_color;

fn main() {
    let args = match Opts::try_parse() {
        Ok(args) => args,
        // `--help` and `--version`
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            // Anything else is an invalid argument, which exits with 1
            let _ignored = e.print();
            process::exit(1);
        },
    };

    if let Err(e) = run(args) {
        sbs_error!("{:#}", e);
        process::exit(1);
    }
}

/// Set up the ambient state and perform the requested action
fn run(mut args: Opts) -> Result<()> {
    match args.color_when.as_deref() {
        Some("never") => colored::control::set_override(false),
        Some("always") => colored::control::set_override(true),
        _ if !wants_color() => colored::control::set_override(false),
        _ => {},
    }

    let action = match args.action.as_deref() {
        Some(action) => Action::parse(action).ok_or_else(|| {
            eprintln!("{}\n", *USAGE);
            anyhow!("invalid action: '{}'", action)
        })?,
        None => {
            eprintln!("{}\n", *USAGE);
            return Err(anyhow!("no action was given"));
        },
    };

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };
    if let Some(output) = args.output.take() {
        config.display.output = output;
        config.display.fallback_outputs.clear();
    }

    let _logger = utils::initialize_logging(&config, &args)?;
    log::debug!("{}: {:#?}", "Configuration options".bright_blue(), config);
    log::debug!("performing {:?}", action);
    if args.dry_run {
        sbs_info!("dry run, the display configuration is left untouched");
    }

    let xrandr = Xrandr::new(config.xrandr())
        .native_query(config.global.native_query)
        .dry_run(args.dry_run);
    let mut controller = Controller::new(xrandr, config.display);
    let output = controller.settings().output.clone();

    match action {
        Action::Enable => {
            let switched = controller
                .enable()
                .context("failed to enable the side-by-side mode")?;
            if !args.dry_run {
                println!(
                    "{} switched to {}",
                    switched.yellow().bold(),
                    controller.settings().modeline.name.green().bold()
                );
            }
        },
        Action::Disable => {
            let switched = controller
                .disable()
                .context("failed to restore the standard mode")?;
            if !args.dry_run {
                println!(
                    "{} switched to {}",
                    switched.yellow().bold(),
                    controller.settings().standard_mode.green().bold()
                );
            }
        },
        Action::Status => {
            let report = controller.status().context("failed to query the display")?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report);
            }
        },
        Action::Position => {
            let point = controller
                .position()
                .with_context(|| format!("failed to find the position of {}", output))?;
            if args.json {
                println!("{}", serde_json::to_string(&point)?);
            } else {
                println!("{}", point);
            }
        },
    }

    Ok(())
}
