// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod logging;
mod runtime;

use anyhow::{Context, Result};
use config::Config;
use rolodex_app::{ClientListState, local_today};
use rolodex_db::{DocumentQuery, Store};
use rolodex_testkit::ClientFaker;
use runtime::StoreFeed;
use std::env;
use std::path::PathBuf;

const DEMO_CLIENT_COUNT: usize = 40;
const DEMO_SEED: u64 = 20_240_102;

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
            "load config {}; run `rolodex --print-example-config` to generate a v1 template",
            options.config_path.display()
        )
    })?;

    // Live queries need a file the poller can open, so demo data goes to a
    // throwaway directory rather than an in-memory store.
    let (_demo_dir, db_path) = if options.demo {
        let (dir, path) = rolodex_testkit::temp_db_path()?;
        (Some(dir), path)
    } else {
        (None, config.db_path()?)
    };
    if options.print_db_path {
        println!("{}", db_path.display());
        return Ok(());
    }

    logging::init(&config.log_level(), &config.log_path()?)?;

    let store = Store::open(&db_path).with_context(|| {
        format!(
            "open database {} -- if this path is wrong, set [storage].db_path or ROLODEX_DB_PATH",
            db_path.display()
        )
    })?;
    store.bootstrap()?;

    let collection = config.collection();
    if options.demo {
        seed_demo_data(&store, collection)?;
    }
    if let Some(import_path) = &options.import_path {
        let imported = store.import_json(collection, import_path)?;
        println!("imported {imported} client(s) into {collection}");
        return Ok(());
    }

    let poll_interval = config.poll_interval()?;
    if options.check_only {
        store.list_documents(&DocumentQuery::clients(collection))?;
        return Ok(());
    }

    tracing::info!(
        db = %db_path.display(),
        collection,
        demo = options.demo,
        "starting client directory"
    );
    let mut state = ClientListState::activate();
    let mut feed = StoreFeed::new(db_path, DocumentQuery::clients(collection), poll_interval);
    rolodex_tui::run_app(&mut state, &mut feed)
}

fn seed_demo_data(store: &Store, collection: &str) -> Result<()> {
    let mut faker = ClientFaker::new(DEMO_SEED);
    for document in faker.demo_documents(DEMO_CLIENT_COUNT, local_today()) {
        store.add_document(collection, &document)?;
    }
    tracing::info!(collection, count = DEMO_CLIENT_COUNT, "seeded demo clients");
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_db_path: bool,
    demo: bool,
    import_path: Option<PathBuf>,
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
        demo: false,
        import_path: None,
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
            "--import" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--import requires a JSON file path"))?;
                options.import_path = Some(PathBuf::from(value.as_ref()));
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
            "--demo" => {
                options.demo = true;
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
    println!("rolodex - client directory");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-path             Print resolved database path");
    println!("  --print-example-config   Print a v1 config template");
    println!("  --demo                   Launch with seeded demo clients (temporary database)");
    println!("  --import <file>          Load clients from a JSON array file and exit");
    println!("  --check                  Validate config + DB + client query, then exit");
    println!("  --help                   Show this help");
}
