//! Application orchestrator.
//! Loads/merges config, initializes logging, installs the signal handler,
//! wires store, breaker, notifier and disk together, then runs one command.

use anyhow::{Result, bail};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

use resilient_move::cli::{Args, Command};
use resilient_move::config::{CONFIG_ENV, LoadResult, default_config_path, load_or_init};
use resilient_move::output as out;
use resilient_move::{
    Backoff, CircuitBreaker, Config, DiskRegistry, FileDeleter, FileMover, FileStore, LOCAL_DISK,
    LocalDisk, ResilientFsError, SendmailNotifier, shutdown,
};

use crate::logging::init_tracing;

/// Run the CLI application.
pub fn run(args: Args) -> Result<()> {
    if args.print_config {
        print_config_location();
        return Ok(());
    }

    let mut cfg = match load_or_init()? {
        LoadResult::CreatedTemplate(path) => {
            out::print_success(&format!(
                "A template resilient_move config was written to: {}",
                path.display()
            ));
            out::print_info(
                "Edit `disk_root` (and the breaker settings if needed), then re-run this command.",
            );
            out::print_info(&format!("To use a different location set {CONFIG_ENV}."));
            return Ok(());
        }
        LoadResult::Loaded(cfg, _) => cfg,
    };
    args.apply_overrides(&mut cfg);

    let Some(command) = args.command.clone() else {
        bail!("no command given; try `resilient_move --help`");
    };

    let guard_opt = init_tracing(&cfg.log_level, cfg.log_file.as_deref(), args.json)
        .inspect_err(|e| out::print_error(&format!("Failed to initialize logging: {e}")))?;

    // Dropping the guard flushes the file appender; the handler does that on SIGINT.
    let guard_slot = Arc::new(Mutex::new(guard_opt));
    {
        let guard_slot = Arc::clone(&guard_slot);
        if let Err(e) = ctrlc::set_handler(move || {
            shutdown::request();
            out::print_warn("Received interrupt; finishing the current step...");
            if let Ok(mut g) = guard_slot.lock() {
                let _ = g.take();
            }
        }) {
            warn!(error = %e, "Failed to install signal handler");
        }
    }

    debug!(?args, "Starting resilient_move");
    let result = cfg.validate().and_then(|()| execute(&cfg, command, args.json));

    if let Err(e) = &result {
        log_failure(e);
    }
    if let Ok(mut g) = guard_slot.lock() {
        let _ = g.take();
    }
    result
}

fn print_config_location() {
    if let Some(cfg_env) = std::env::var_os(CONFIG_ENV) {
        out::print_info(&format!(
            "Using {CONFIG_ENV} (explicit):\n  {}\n",
            PathBuf::from(cfg_env).display()
        ));
        out::print_info(&format!("To override, unset {CONFIG_ENV} or point it at another file."));
        return;
    }
    match default_config_path() {
        Ok(p) => {
            out::print_info(&format!(
                "Default resilient_move config path:\n  {}\n",
                p.display()
            ));
            if p.exists() {
                out::print_info("A config file already exists at that location.");
            } else {
                out::print_info(
                    "No config file exists there yet. Run any command to create a template.",
                );
            }
        }
        Err(e) => out::print_error(&format!("Could not determine a default config path: {e}")),
    }
}

/// Store, breaker (with mail notifier when configured) and the local disk.
fn build_breaker(cfg: &Config) -> Arc<CircuitBreaker> {
    let store = Arc::new(FileStore::new(&cfg.store_path));
    let mut breaker = CircuitBreaker::new(&cfg.breaker_name, cfg.breaker_config(), store);
    if cfg.notify_on_open {
        breaker = breaker.with_notifier(Arc::new(SendmailNotifier::new(&cfg.sendmail_path)));
    }
    Arc::new(breaker)
}

fn execute(cfg: &Config, command: Command, json: bool) -> Result<()> {
    let breaker = build_breaker(cfg);
    let backoff = Backoff::fixed(cfg.backoff);

    match command {
        Command::Move { sources, to } => {
            let disks = Arc::new(
                DiskRegistry::new().with_disk(LOCAL_DISK, Arc::new(LocalDisk::new(&cfg.disk_root))),
            );
            let mut mover = FileMover::new(breaker, disks).with_backoff(backoff);
            let moved = mover.move_all(LOCAL_DISK, &sources, &to, cfg.max_attempts)?;

            if shutdown::is_requested() {
                let restored = mover.rollback(cfg.max_attempts)?;
                warn!(restored, "Interrupted; batch rolled back");
                bail!("interrupted; {restored} moved file(s) were put back");
            }
            mover.commit();
            for (src, dest) in sources.iter().zip(&moved) {
                info!(source = %src.display(), dest = %dest.display(), "Move completed");
                out::print_user(&dest.display().to_string());
            }
            Ok(())
        }
        Command::Delete { path, missing_ok } => {
            let disk = LocalDisk::new(&cfg.disk_root).treat_missing_as_deleted(missing_ok);
            let disks = Arc::new(DiskRegistry::new().with_disk(LOCAL_DISK, Arc::new(disk)));
            let deleter = FileDeleter::new(breaker, disks).with_backoff(backoff);
            deleter.delete(LOCAL_DISK, &path, cfg.max_attempts)?;
            out::print_success(&format!("Deleted {}", path.display()));
            Ok(())
        }
        Command::Stats => {
            let stats = breaker.stats()?;
            if json {
                out::print_user(&serde_json::to_string_pretty(&stats)?);
            } else {
                out::print_user(&format!(
                    "breaker: {}\nstate: {}\nfailures: {}/{}\nopened_at: {}\nrecovery_timeout: {}s",
                    stats.name,
                    stats.state,
                    stats.failure_count,
                    stats.failure_threshold,
                    stats
                        .opened_at
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "-".into()),
                    stats.recovery_timeout.as_secs(),
                ));
            }
            Ok(())
        }
        Command::Reset => {
            breaker.reset();
            out::print_success(&format!("Breaker '{}' reset to closed", breaker.name()));
            Ok(())
        }
    }
}

fn log_failure(e: &anyhow::Error) {
    let Some(rf) = e.downcast_ref::<ResilientFsError>() else {
        error!(error = %format!("{e:#}"), "Command failed");
        return;
    };
    let code = rf.code();
    match rf {
        ResilientFsError::CircuitOpen { breaker, disk, path } => {
            error!(code, kind = "circuit_open", %breaker, %disk, path = %path.display(), "Refused while breaker is open")
        }
        ResilientFsError::MoveFailure { source_path, attempts, rolled_back, .. } => {
            error!(code, kind = "move_failure", source = %source_path.display(), attempts, rolled_back, error = %rf, "Move failed")
        }
        ResilientFsError::RollbackFailure { unresolved, restored, .. } => {
            error!(code, kind = "rollback_failure", unresolved = unresolved.len(), restored, error = %rf, "Rollback left files inconsistent")
        }
        ResilientFsError::DeleteFailure { disk, path, attempts, .. } => {
            error!(code, kind = "delete_failure", %disk, path = %path.display(), attempts, "Delete failed")
        }
        ResilientFsError::Validation(msg) | ResilientFsError::UnknownDisk(msg) => {
            error!(code, kind = "invalid", %msg, "Command rejected")
        }
    }
}
