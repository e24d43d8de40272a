//! Admin command implementations
//!
//! Every command writes its report to the given writer and returns an error
//! instead of printing one, so the binary decides the exit status.

use crate::cli::Command;
use anyhow::{Context, Result, bail};
use quotacrab::core::credential::{validate_limit, validate_name};
use quotacrab::{Credential, FieldUpdate, SqliteStore, Store, StoreError, clock};
use rand::RngCore;
use std::io::Write;

/// Random bytes in a generated key
pub const KEY_BYTES: usize = 16;

const KEY_ATTEMPTS: usize = 3;

/// Generate a fresh API key: 16 random bytes, hex encoded
pub fn generate_key() -> String {
    let mut bytes = [0u8; KEY_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Run one admin command against `store`
pub fn run(store: &SqliteStore, command: Command, default_limit: i64, out: &mut impl Write) -> Result<()> {
    match command {
        Command::Setup => setup(store, out),
        Command::New { name, limit } => create(store, &name, limit.unwrap_or(default_limit), out),
        Command::Update { key, assignment } => update(store, &key, &assignment, out),
        Command::Show { key } => show(store, &key, out),
        Command::List => list(store, out),
        Command::Delete { key } => delete(store, &key, out),
        Command::Reset { yes } => reset(store, yes, out),
    }
}

fn setup(store: &SqliteStore, out: &mut impl Write) -> Result<()> {
    let location = store
        .path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| ":memory:".to_string());
    writeln!(out, "Database ready at {location} ({} credentials)", store.len()?)?;
    Ok(())
}

fn create(store: &SqliteStore, name: &str, limit: i64, out: &mut impl Write) -> Result<()> {
    validate_name(name)?;
    validate_limit(limit)?;

    let credential = create_with_fresh_key(store, name, limit)?;
    tracing::info!(name, limit, "credential created");

    writeln!(out, "API key created")?;
    writeln!(out, "----------------------------")?;
    writeln!(out, "Name:       {}", credential.name)?;
    writeln!(out, "API key:    {}", credential.key)?;
    writeln!(out, "Rate limit: {} requests per window", credential.limit)?;
    writeln!(out, "----------------------------")?;
    Ok(())
}

fn create_with_fresh_key(store: &SqliteStore, name: &str, limit: i64) -> Result<Credential> {
    for _ in 0..KEY_ATTEMPTS {
        match store.create(&generate_key(), name, limit, clock::now_millis()) {
            Err(StoreError::DuplicateKey) => {
                tracing::warn!("generated key collided, retrying");
            }
            other => return Ok(other?),
        }
    }
    bail!("could not generate a unique API key after {KEY_ATTEMPTS} attempts")
}

fn update(store: &SqliteStore, key: &str, assignment: &str, out: &mut impl Write) -> Result<()> {
    let update: FieldUpdate = assignment.parse()?;
    store
        .update_field(key, &update)
        .with_context(|| format!("failed to update {}", update.field()))?;
    tracing::info!(field = update.field(), "credential updated");

    writeln!(out, "Updated {update}")?;
    writeln!(out, "API key: {key}")?;
    Ok(())
}

fn show(store: &SqliteStore, key: &str, out: &mut impl Write) -> Result<()> {
    let credential = store.get(key)?;
    writeln!(out, "Name:         {}", credential.name)?;
    writeln!(out, "API key:      {}", credential.key)?;
    writeln!(out, "Rate limit:   {}", credential.limit)?;
    writeln!(out, "Used:         {}", credential.count)?;
    writeln!(out, "Window start: {}", credential.window_start)?;
    writeln!(out, "Created at:   {}", credential.created_at)?;
    Ok(())
}

fn list(store: &SqliteStore, out: &mut impl Write) -> Result<()> {
    let credentials = store.list()?;
    if credentials.is_empty() {
        writeln!(out, "No credentials")?;
        return Ok(());
    }

    let name_width = credentials
        .iter()
        .map(|c| c.name.len())
        .max()
        .unwrap_or(0)
        .max("NAME".len());
    writeln!(out, "{:<name_width$}  {:<32}  {:>10}  {:>10}", "NAME", "KEY", "LIMIT", "USED")?;
    for c in &credentials {
        writeln!(
            out,
            "{:<name_width$}  {:<32}  {:>10}  {:>10}",
            c.name, c.key, c.limit, c.count
        )?;
    }
    Ok(())
}

fn delete(store: &SqliteStore, key: &str, out: &mut impl Write) -> Result<()> {
    store.delete(key)?;
    tracing::info!("credential deleted");
    writeln!(out, "Deleted API key {key}")?;
    Ok(())
}

fn reset(store: &SqliteStore, yes: bool, out: &mut impl Write) -> Result<()> {
    if !yes {
        bail!("reset removes every credential; pass --yes to confirm");
    }
    let removed = store.clear()?;
    tracing::warn!(removed, "all credentials removed");
    writeln!(out, "Removed {removed} credentials")?;
    Ok(())
}
