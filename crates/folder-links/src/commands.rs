use crate::config::{load_settings, TomlSettingsStore};
use crate::fs_vault::FsVault;
use crate::watcher::watch_vault;
use anyhow::{anyhow, bail, Context, Result};
use colored::Colorize;
use folder_links_core::events::FolderRename;
use folder_links_core::host::{
    FileExplorer, Notifier, RenameChoice, RenamePrompt, RenamePromptRequest, Vault,
};
use folder_links_core::link_parser::extract_folder_links;
use folder_links_core::rename::RenameOutcome;
use folder_links_core::path::folder_path_from_link;
use folder_links_core::resolver::{resolve, resolve_path, LinkAction, LinkState};
use folder_links_core::snapshot::{FolderEntry, FolderSnapshot};
use folder_links_core::translation::EnglishTranslator;
use folder_links_core::{FolderLinksPlugin, HostServices};
use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

/// Prints the folder a link points to.
struct ConsoleExplorer;

impl FileExplorer for ConsoleExplorer {
    fn reveal_in_folder(&self, folder: &FolderEntry) {
        println!("{} {}", "→".cyan(), folder.path);
    }
}

struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notice(&self, message: &str) {
        println!("{}", message.green());
    }
}

/// Asks on stdin. Anything unreadable counts as "do not update".
struct StdinPrompt;

impl RenamePrompt for StdinPrompt {
    fn ask(&self, request: &RenamePromptRequest) -> RenameChoice {
        println!("{}", request.title.bold());
        for line in &request.body {
            println!("  {}", line);
        }
        print!("[a]lways update / [j]ust once / [N]o: ");
        if io::stdout().flush().is_err() {
            return RenameChoice::DoNotUpdate;
        }
        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => parse_choice(&answer),
            Err(e) => {
                tracing::warn!("Could not read answer: {}", e);
                RenameChoice::DoNotUpdate
            }
        }
    }
}

/// Answers yes without asking (`--yes`).
struct AssumeYes;

impl RenamePrompt for AssumeYes {
    fn ask(&self, _request: &RenamePromptRequest) -> RenameChoice {
        RenameChoice::JustOnce
    }
}

pub fn parse_choice(answer: &str) -> RenameChoice {
    match answer.trim().to_lowercase().as_str() {
        "a" | "always" => RenameChoice::AlwaysUpdate,
        "j" | "y" | "yes" | "once" => RenameChoice::JustOnce,
        _ => RenameChoice::DoNotUpdate,
    }
}

/// Open the vault and build a plugin over it with every note indexed.
fn open(
    vault_dir: &Path,
    prompt: Arc<dyn RenamePrompt>,
) -> Result<(Arc<FsVault>, Arc<FolderLinksPlugin>)> {
    let vault = FsVault::open(vault_dir)
        .with_context(|| format!("Cannot open vault {}", vault_dir.display()))?;
    let vault = Arc::new(vault);
    let settings = load_settings(vault_dir)?;
    let host = HostServices {
        vault: vault.clone(),
        explorer: Arc::new(ConsoleExplorer),
        translator: Arc::new(EnglishTranslator),
        prompt,
        notifier: Arc::new(ConsoleNotifier),
        settings_store: Arc::new(TomlSettingsStore::new(vault_dir)),
    };
    let plugin = Arc::new(FolderLinksPlugin::new(host, settings));
    let notes = vault.notes();
    plugin.index_notes(notes.iter().map(String::as_str))?;
    Ok((vault, plugin))
}

/// One folder link occurrence found by `check`.
#[derive(Debug, PartialEq, Eq)]
pub struct CheckedLink {
    pub file: String,
    pub line: usize,
    pub target: String,
    pub state: LinkState,
}

pub fn collect_links(vault: &FsVault, snapshot: &FolderSnapshot) -> Result<Vec<CheckedLink>> {
    let mut out = Vec::new();
    for file in vault.notes() {
        let content = vault.read(&file)?;
        for occ in extract_folder_links(&content) {
            out.push(CheckedLink {
                file: file.clone(),
                line: occ.line,
                target: occ.key(),
                state: resolve(&occ.raw_target, snapshot).state(),
            });
        }
    }
    Ok(out)
}

pub fn check(vault_dir: &Path, strict: bool) -> Result<()> {
    let (vault, plugin) = open(vault_dir, Arc::new(AssumeYes))?;
    let links = collect_links(&vault, &plugin.folders())?;

    for link in &links {
        let status = match link.state {
            LinkState::Resolved => "resolved".green(),
            LinkState::Unresolved => "missing".red(),
        };
        println!("{}:{}  [[{}]]  {}", link.file.dimmed(), link.line, link.target, status);
    }

    let missing = links
        .iter()
        .filter(|l| l.state == LinkState::Unresolved)
        .count();
    println!(
        "\n{} folder link(s), {} resolved, {} missing",
        links.len(),
        links.len() - missing,
        missing
    );
    if strict && missing > 0 {
        bail!("{} folder link(s) point to missing folders", missing);
    }
    Ok(())
}

pub fn create(vault_dir: &Path, link: &str) -> Result<()> {
    let (_vault, plugin) = open(vault_dir, Arc::new(AssumeYes))?;
    match plugin.on_link_click(link).map_err(|e| anyhow!(e.user_message()))? {
        LinkAction::Revealed(path) => println!("{} already exists", path.bold()),
        LinkAction::Created(path) => println!("{} {}", "Created".green(), path.bold()),
        LinkAction::Ignored => println!("The vault root always exists"),
    }
    Ok(())
}

pub fn rename(vault_dir: &Path, old: &str, new: &str, yes: bool) -> Result<()> {
    let prompt: Arc<dyn RenamePrompt> = if yes {
        Arc::new(AssumeYes)
    } else {
        Arc::new(StdinPrompt)
    };
    let (vault, plugin) = open(vault_dir, prompt)?;
    let rename = FolderRename::new(old, new);

    vault
        .rename_folder(&rename.old_path, &rename.new_path)
        .map_err(|e| anyhow!(e.user_message()))?;
    println!("Moved {} to {}", rename.old_path.bold(), rename.new_path.bold());

    match plugin
        .apply_folder_rename(rename)
        .map_err(|e| anyhow!(e.user_message()))?
    {
        RenameOutcome::NoLinks => println!("No links to update"),
        RenameOutcome::Declined => println!("{}", "Links left unchanged".yellow()),
        RenameOutcome::Updated(report) => {
            for file in &report.written {
                println!("  {} {}", "updated".green(), file);
            }
        }
    }
    Ok(())
}

/// Resolution state of every linked folder.
fn link_states(
    plugin: &FolderLinksPlugin,
    snapshot: &FolderSnapshot,
) -> BTreeMap<String, LinkState> {
    plugin
        .index()
        .all_folder_links()
        .into_iter()
        .map(|key| {
            let state = resolve_path(&folder_path_from_link(&key), snapshot).state();
            (key, state)
        })
        .collect()
}

pub async fn watch(vault_dir: &Path) -> Result<()> {
    let (vault, plugin) = open(vault_dir, Arc::new(StdinPrompt))?;
    let mut handles = plugin.start();
    let (_watcher, watch_handle) =
        watch_vault(vault, plugin.clone()).context("Failed to watch vault")?;
    handles.push(watch_handle);

    let mut states = link_states(&plugin, &plugin.folders());
    let mut rx = plugin.subscribe();
    println!(
        "Watching {} ({} linked folders). Ctrl-C to stop.",
        vault_dir.display(),
        states.len()
    );

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = rx.borrow_and_update().clone();
                let next = link_states(&plugin, &snapshot);
                for (link, state) in &next {
                    if states.get(link) != Some(state) {
                        tracing::info!(link = %link, ?state, "Folder link changed");
                        let label = match state {
                            LinkState::Resolved => "resolved".green(),
                            LinkState::Unresolved => "missing".red(),
                        };
                        println!("[[{}]] {}", link, label);
                    }
                }
                states = next;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Stopping");
                break;
            }
        }
    }

    plugin.unload();
    handles.iter().for_each(|h| h.abort());
    Ok(())
}

pub fn settings(
    vault_dir: &Path,
    show_in_outgoing_links: Option<bool>,
    always_update: Option<bool>,
) -> Result<()> {
    let (_vault, plugin) = open(vault_dir, Arc::new(AssumeYes))?;
    if let Some(show) = show_in_outgoing_links {
        plugin.set_show_in_outgoing_links(show)?;
    }
    if let Some(always) = always_update {
        plugin.set_always_update(always)?;
    }
    let current = plugin.settings().get();
    println!("show_in_outgoing_links = {}", current.show_in_outgoing_links);
    println!("always_update = {}", current.always_update);
    Ok(())
}
