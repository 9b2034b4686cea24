//! Application orchestrator.
//! Loads/merges config, initializes logging, installs the signal handler, opens the store
//! and dispatches the subcommand on a Tokio runtime.

use anyhow::{Context, Result};
use std::env;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use tracing::{debug, error};

use foldersync::cli::{Args, Command, FolderCommand, sanitize_path};
use foldersync::config::{
    CONFIG_ENV, default_config_path, ensure_default_config_exists, load_config_from_default_xml,
    load_config_from_xml_env,
};
use foldersync::output as out;
use foldersync::{
    Config, EngineOptions, FolderMoveOutcome, MetadataStore, SledStore, SyncEngine, SyncError, shutdown,
};

use crate::logging::init_tracing;

fn print_config_location() {
    if let Some(p) = env::var_os(CONFIG_ENV) {
        out::print_info(&format!("Using {CONFIG_ENV} (explicit):\n  {}", p.to_string_lossy()));
        return;
    }
    match default_config_path() {
        Some(p) => {
            out::print_info(&format!("Default foldersync config path:\n  {}", p.display()));
            if !p.exists() {
                out::print_info("No config file exists there yet; one is written on the next run.");
            }
        }
        None => out::print_error("Could not determine a default config path"),
    }
}

/// XML (explicit env path, else default location) over defaults, then CLI over both.
fn load_config(args: &Args) -> Result<Config> {
    let mut cfg = match load_config_from_xml_env()? {
        Some(cfg) => cfg,
        None => load_config_from_default_xml()?.unwrap_or_default(),
    };
    args.apply_overrides(&mut cfg);
    Ok(cfg)
}

/// Run the CLI application.
pub fn run(args: Args) -> Result<ExitCode> {
    if args.print_config {
        print_config_location();
        return Ok(ExitCode::SUCCESS);
    }
    let Some(command) = args.command.clone() else {
        out::print_error("no command given; see --help");
        return Ok(ExitCode::from(2));
    };

    if let Some(path) = ensure_default_config_exists() {
        out::print_success(&format!("A template foldersync config was written to: {}", path.display()));
    }

    let cfg = load_config(&args)?;
    let guard = init_tracing(&cfg.log_level, cfg.log_file.as_deref(), args.json).inspect_err(|e| {
        out::print_error(&format!("Failed to initialize logging: {e}"));
    })?;

    // Dropped on SIGINT so buffered file logs are flushed.
    let guard_slot = Arc::new(Mutex::new(guard));
    {
        let guard_slot = Arc::clone(&guard_slot);
        ctrlc::set_handler(move || {
            shutdown::request();
            out::print_warn("Received interrupt; finishing the current step...");
            if let Ok(mut g) = guard_slot.lock() {
                let _ = g.take();
            }
        })
        .context("install signal handler")?;
    }

    cfg.validate()?;
    debug!(?cfg, "configuration resolved");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("start async runtime")?;
    let result = runtime.block_on(dispatch(command, &cfg, args.json));

    let code = match result {
        Ok(code) => code,
        Err(e) => match e.downcast_ref::<SyncError>() {
            Some(se) => {
                error!(code = se.code(), kind = se.kind(), error = %se, "command failed");
                out::print_error(&se.to_string());
                ExitCode::from(se.code() as u8)
            }
            None => {
                error!(error = ?e, "command failed");
                out::print_error(&format!("{e:#}"));
                ExitCode::FAILURE
            }
        },
    };

    if let Ok(mut g) = guard_slot.lock() {
        let _ = g.take();
    }
    Ok(code)
}

async fn dispatch(command: Command, cfg: &Config, json: bool) -> Result<ExitCode> {
    let store: Arc<dyn MetadataStore> = Arc::new(
        SledStore::open(&cfg.store_path)
            .with_context(|| format!("open metadata store '{}'", cfg.store_path.display()))?,
    );
    let engine = SyncEngine::new(store, EngineOptions::from(cfg));

    match command {
        Command::Folder(FolderCommand::Add { path, parent }) => {
            let record = engine.register_folder(&sanitize_path(&path), parent)?;
            if json {
                out::print_user(&serde_json::to_string(&record)?);
            } else {
                out::print_user(&record.id.to_string());
            }
        }
        Command::Folder(FolderCommand::List) => {
            let mut folders = engine.store().folders().map_err(SyncError::from)?;
            folders.sort_by(|a, b| a.path.cmp(&b.path));
            for f in folders {
                if json {
                    out::print_user(&serde_json::to_string(&f)?);
                } else {
                    let parent = f.parent.map(|p| p.to_string()).unwrap_or_else(|| "-".into());
                    out::print_user(&format!("{}\t{}\t{}", f.id, parent, f.path.display()));
                }
            }
        }
        Command::MoveFolder { source, target } => {
            let outcome = engine.move_folder(source, target).await;
            engine.flush_background().await;
            match outcome? {
                FolderMoveOutcome::NoOp => out::print_info("folder is already in the target; nothing moved"),
                FolderMoveOutcome::Moved { from, to } => {
                    out::print_user(&format!("{} -> {}", from.display(), to.display()))
                }
            }
        }
        Command::MoveFiles { into, files } => {
            let files: Vec<_> = files.iter().map(|f| sanitize_path(f)).collect();
            let outcome = engine.move_files_detailed(&files, into).await?;
            engine.flush_background().await;
            for (old, new) in &outcome.moved {
                out::print_user(&format!("{} -> {}", old.display(), new.display()));
            }
            for (file, e) in &outcome.failed {
                out::print_error(&format!("{}: {e}", file.display()));
            }
            if let Some((_, e)) = outcome.failed.first() {
                return Ok(ExitCode::from(e.code() as u8));
            }
        }
        Command::Reconcile => {
            let report = engine.reconcile().await?;
            if json {
                out::print_user(&serde_json::to_string(&report)?);
            } else if report.is_clean() {
                out::print_success("store and disk agree");
            } else {
                for id in &report.rolled_back {
                    out::print_user(&format!("interrupted move rolled back: {id}"));
                }
                for id in &report.rolled_forward {
                    out::print_user(&format!("interrupted move committed: {id}"));
                }
                for id in &report.unresolved_intents {
                    out::print_warn(&format!("unresolved relocation intent: {id}"));
                }
                out::print_user(&format!("stale identity entries removed: {}", report.stale_mappings));
                out::print_user(&format!("bookmarks re-derived: {}", report.rebookmarked.len()));
                for id in &report.missing_folders {
                    out::print_user(&format!("missing folder: {id}"));
                }
                for p in &report.dangling_checkpoints {
                    out::print_user(&format!("dangling checkpoint: {}", p.display()));
                }
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
