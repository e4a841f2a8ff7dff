// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod runtime;

use anyhow::{Context, Result};
use config::Config;
use ontrack_app::{AppState, TabKind};
use ontrack_db::Store;
use ontrack_tui::AppRuntime;
use runtime::DbRuntime;
use std::env;
use std::path::PathBuf;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `ontrack --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;

    let db_path = config.db_path()?;
    if options.print_db_path {
        println!("{}", db_path.display());
        return Ok(());
    }

    let (store, store_path) = if options.guest {
        (Store::open_memory()?, None)
    } else {
        let store = Store::open(&db_path).with_context(|| {
            format!(
                "open database {} -- if this path is wrong, set [storage].db_path or ONTRACK_DB_PATH",
                db_path.display()
            )
        })?;
        (store, Some(db_path))
    };
    store.bootstrap()?;

    let ai_client = if config.ai_enabled() {
        // A model picked in Settings wins over the config file.
        let model = store
            .get_ai_model()?
            .unwrap_or_else(|| config.ai_model().to_owned());
        Some(
            ontrack_ai::Client::new(
                config.ai_base_url(),
                &model,
                config.ai_api_key(),
                config.ai_timeout()?,
            )
            .with_context(|| {
                format!(
                    "invalid [ai] config in {}; fix base_url/model/timeout values",
                    options.config_path.display()
                )
            })?,
        )
    } else {
        None
    };
    if options.check_only {
        return Ok(());
    }

    let mut state = AppState::default();
    if !store.get_show_dashboard()? {
        state.active_tab = TabKind::Goals;
    }

    let mut runtime = DbRuntime::new(store, ai_client, config.show_help_bar(), store_path);
    if options.guest {
        runtime.start_guest_session()?;
        state.status_line = Some("guest session: changes are not saved".to_owned());
    }
    ontrack_tui::run_app(&mut state, &mut runtime)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_db_path: bool,
    guest: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_db_path: false,
        guest: false,
        print_example: false,
        check_only: false,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-path" => {
                options.print_db_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--guest" => {
                options.guest = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow::anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("ontrack");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-path             Print resolved database path");
    println!("  --print-example-config   Print a config template");
    println!("  --guest                  Launch a guest session with sample data (in-memory)");
    println!("  --check                  Validate config, database, and AI client settings");
    println!("  --help                   Show this help");
}
