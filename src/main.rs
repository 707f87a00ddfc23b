mod cli;

use anyhow::Context;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;

use cli::{ChecksAction, Cli, Commands};
use weekly_journal_lib::api::{mapper, IdentityProvider, RemoteStore, SupabaseClient};
use weekly_journal_lib::config::default_config_path;
use weekly_journal_lib::commands::{import_message, preview_trade_log, read_trade_log_file, ScreenshotFile};
use weekly_journal_lib::db::{Database, SqliteCache};
use weekly_journal_lib::models::{EntryPatch, FIXED_CHECKS};
use weekly_journal_lib::session::{IdleTimeout, SessionGate, StorageBus};
use weekly_journal_lib::sync::SyncLayer;
use weekly_journal_lib::week::week_key_for;
use weekly_journal_lib::{Clock, EntryStore, JournalApp, JournalConfig, SystemClock};

const PASSWORD_ENV: &str = "JOURNAL_PASSWORD";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let cache_path = match cli.cache.clone() {
        Some(path) => path,
        None => config.cache_path()?,
    };

    if let Commands::Config { init } = cli.command {
        return show_config(&config, cli.config.as_deref(), init);
    }

    let mut journal = open_journal(&cache_path)?;
    run(&mut journal, &config, cli.command).await
}

/// The opened journal and the database backing its cache
struct Journal {
    app: JournalApp,
    database: Arc<Database>,
    cache: Arc<SqliteCache>,
}

fn load_config(path: Option<&Path>) -> anyhow::Result<JournalConfig> {
    let config = match path {
        Some(path) => JournalConfig::load_from(path)?.with_overrides(|name| std::env::var(name).ok()),
        None => JournalConfig::load()?,
    };
    Ok(config)
}

fn show_config(config: &JournalConfig, path: Option<&Path>, init: bool) -> anyhow::Result<()> {
    if init {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => default_config_path()?,
        };
        if path.exists() {
            anyhow::bail!("{} already exists", path.display());
        }
        config.save_to(&path)?;
        println!("Config written to {}", path.display());
        return Ok(());
    }
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

fn open_journal(cache_path: &Path) -> anyhow::Result<Journal> {
    if let Some(dir) = cache_path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    let path = cache_path
        .to_str()
        .with_context(|| format!("cache path {} is not valid UTF-8", cache_path.display()))?;

    let database = Arc::new(
        Database::new(path).with_context(|| format!("failed to open journal cache {}", path))?,
    );
    let cache = Arc::new(SqliteCache::new(Arc::clone(&database)));
    let app = JournalApp::new(EntryStore::load(cache.clone(), Arc::new(SystemClock)));
    Ok(Journal { app, database, cache })
}

async fn run(journal: &mut Journal, config: &JournalConfig, command: Commands) -> anyhow::Result<()> {
    let command = match command {
        Commands::Sync { email } => return sync_with_backend(journal, config, &email).await,
        other => other,
    };

    let app = &mut journal.app;
    match command {
        Commands::Week { date } => {
            let week = week_key_for(date.as_deref().unwrap_or(""), app.store().clock());
            println!("{}", week);
        }
        Commands::Show { date } => {
            let week = app.select_week(date.as_deref().unwrap_or(""));
            let entry = app.current_entry();
            println!("{} (score {}%)", week, app.current_score());
            println!("{}", serde_json::to_string_pretty(&entry)?);
        }
        Commands::Note { date, text } => {
            let week = app.select_week(date.as_str());
            app.update_current(EntryPatch::context(text));
            println!("Context saved for {}", week);
        }
        Commands::Tag { date, tag, remove } => {
            let week = app.select_week(date.as_str());
            let entry = if remove {
                app.remove_tag(week, &tag)
            } else {
                app.add_tag(week, &tag)
            };
            let tags: Vec<&str> = entry.tags.iter().map(String::as_str).collect();
            println!("{}: {}", week, tags.join(", "));
        }
        Commands::Tick { date, id, off } => {
            let known = FIXED_CHECKS.iter().any(|c| c.id == id) || app.custom_checks().iter().any(|c| c.id == id);
            if !known {
                anyhow::bail!("unknown checklist item {}", id);
            }
            let week = app.select_week(date.as_str());
            app.set_check(&id, !off);
            println!("{} score {}%", week, app.current_score());
        }
        Commands::ImportTrades { file, week, dry_run } => {
            let week = app.select_week(week.as_deref().unwrap_or(""));
            let content = read_trade_log_file(&file)?;
            let result = if dry_run {
                preview_trade_log(&content, week)
            } else {
                app.import_trade_log(&content)
            };
            println!("{}", import_message(&result));
            let summary = result?;
            if summary.skipped_rows > 0 {
                println!("{} rows skipped (unreadable time)", summary.skipped_rows);
            }
        }
        Commands::Attach { date, files } => {
            app.select_week(date.as_str());
            let mut picked = Vec::new();
            for path in &files {
                match ScreenshotFile::from_path(path) {
                    Ok(file) => picked.push(file),
                    Err(e) => eprintln!("Skipping {}: {}", path.display(), e),
                }
            }
            let result = app.attach_screenshots(picked);
            for notice in &result.skipped {
                eprintln!("Skipped: {}", notice);
            }
            println!("Attached {} screenshots to {}", result.added, app.current_week());
        }
        Commands::Export { out } => {
            let json = app.export_backup()?;
            match out {
                Some(path) => {
                    std::fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Backup written to {}", path.display());
                }
                None => println!("{}", json),
            }
        }
        Commands::Restore { file } => {
            let json = std::fs::read_to_string(&file).with_context(|| format!("failed to read {}", file.display()))?;
            let (weeks, checks) = app.restore_backup(&json)?;
            println!("Restored {} weeks and {} custom checks", weeks, checks);
        }
        Commands::History => {
            let history = app.store().history();
            if history.is_empty() {
                println!("No weeks recorded yet");
            }
            for row in history {
                println!(
                    "{}  {:>3}%  {:>3} trades  {:>10.2}  {}",
                    row.week,
                    row.score,
                    row.number_of_trades,
                    row.pnl,
                    row.tags.join(", ")
                );
            }
        }
        Commands::Checks { action } => run_checks(app, action)?,
        Commands::Sync { .. } | Commands::Config { .. } => {}
    }
    Ok(())
}

async fn sync_with_backend(journal: &mut Journal, config: &JournalConfig, email: &str) -> anyhow::Result<()> {
    let (url, anon_key) = config
        .backend()
        .context("backend_url and anon_key must be configured to sync")?;
    let password = std::env::var(PASSWORD_ENV).with_context(|| format!("{} is not set", PASSWORD_ENV))?;

    let client = Arc::new(SupabaseClient::new(url, anon_key));
    let session = client.sign_in(email, &password).await?;

    // a logout from another process or a stalled sync ends this session
    let mut gate = SessionGate::new(client.clone());
    gate.mount().await;
    let bus = Arc::new(StorageBus::new(Arc::clone(&journal.database), config.storage_poll_interval())?);
    let timeout = Arc::new(IdleTimeout::new(
        client.clone(),
        journal.cache.clone(),
        bus,
        Arc::new(SystemClock),
        config.idle_timeout(),
    ));
    let app = &mut journal.app;
    app.watch_termination(timeout.subscribe_terminated());
    gate.arm_idle_timeout(Arc::clone(&timeout), config.idle_check_interval());

    let layer = SyncLayer::new(client.clone(), Arc::new(SystemClock), &session.user_id, config.sync_debounce());
    app.attach_session(layer).await;

    let now = SystemClock.now();
    client
        .upsert_settings(&mapper::checks_to_settings_row(&session.user_id, app.custom_checks(), now))
        .await?;
    for (week, entry) in app.store().entries() {
        client
            .upsert_week(&mapper::entry_to_week_row(&session.user_id, *week, entry, now))
            .await
            .with_context(|| format!("failed to upload {}", week))?;
        if timeout.is_terminated() {
            anyhow::bail!("session ended during sync");
        }
    }

    println!(
        "Synced {} weeks and {} custom checks for {}",
        app.store().len(),
        app.custom_checks().len(),
        email
    );
    Ok(())
}

fn run_checks(app: &mut JournalApp, action: ChecksAction) -> anyhow::Result<()> {
    match action {
        ChecksAction::List => {
            for check in FIXED_CHECKS {
                println!("{:<24} {}", check.id, check.label);
            }
            for check in app.custom_checks() {
                println!("{:<24} {}", check.id, check.label);
            }
        }
        ChecksAction::Add { label } => {
            let check = app.add_custom_check(&label)?;
            println!("Added {}", check.id);
        }
        ChecksAction::Rename { id, label } => {
            app.rename_custom_check(&id, &label)?;
            println!("Renamed {}", id);
        }
        ChecksAction::Remove { id } => {
            if !app.remove_custom_check(&id) {
                anyhow::bail!("no custom check with id {}", id);
            }
            println!("Removed {}", id);
        }
    }
    Ok(())
}
