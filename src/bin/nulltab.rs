use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use nulltab::actor::broadcast;
use nulltab::actor::tab_service::{
    Command, CommandResponse, DashboardOutcome, SwitchOutcome, SwitchTab, TabService,
    TabServiceHandle,
};
use nulltab::common::config::{self, Config};
use nulltab::model::tab::{TabId, WindowId};
use nulltab::model::topics::{Topic, TopicStore};
use nulltab::sys::memory::MemoryBrowser;
use nulltab::sys::storage::FileStore;
use nulltab::ui::status;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "nulltab", about = "Keep recent tabs at hand and park the rest in one group")]
struct Cli {
    /// Browser state to operate on, as a RON snapshot.
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    /// Extension storage file.
    #[arg(long, global = true)]
    storage: Option<PathBuf>,

    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    #[command(flatten)]
    Tabs(TabCmd),
    #[command(subcommand)]
    Topics(TopicsCmd),
}

/// Commands that go through the tab service.
#[derive(Subcommand)]
enum TabCmd {
    /// Print every window with its tabs and groups.
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Switch to a tab, regrouping the main window around it.
    Switch {
        tab: i64,
        /// Only focus the tab, leave groups alone.
        #[arg(long)]
        focus_only: bool,
    },
    /// Move a window's tabs into the main group. Defaults to the focused
    /// window.
    Manage { window: Option<i64> },
    /// Discard main group tabs that have been idle for a while.
    SuspendStale,
    /// Discard every tab in the main group.
    SuspendGrouped,
    /// Bring the dashboard tab forward, opening it if needed.
    Dashboard,
    Close {
        #[arg(required = true)]
        tabs: Vec<i64>,
    },
}

#[derive(Subcommand)]
enum TopicsCmd {
    List,
    Add {
        name: String,
        #[arg(long)]
        color: Option<String>,
    },
    Rename { id: String, name: String },
    Remove { id: String },
    Assign { url: String, id: String },
    Unassign { url: String },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    install_tracing();

    let config = match &cli.config {
        Some(path) => Config::read(path)?,
        None => Config::load_default()?,
    };
    let storage_path = cli.storage.clone().unwrap_or_else(config::storage_file);
    let store = FileStore::open(&storage_path)?;
    debug!(path = %storage_path.display(), "opened storage");

    let command = match &cli.command {
        Cmd::Topics(cmd) => {
            let runtime = tokio::runtime::Builder::new_current_thread().build()?;
            return runtime.block_on(run_topics(&store, cmd));
        }
        Cmd::Tabs(cmd) => cmd,
    };

    let snapshot_path = cli.snapshot.clone().unwrap_or_else(config::snapshot_file);
    let browser = MemoryBrowser::load(&snapshot_path)
        .with_context(|| format!("loading browser snapshot {}", snapshot_path.display()))?;
    let (broadcast_tx, _) = broadcast::channel();
    let handle = TabService::spawn(browser.clone(), store, config.settings, broadcast_tx)?;

    let result = run(&handle, command);
    if !matches!(command, TabCmd::Status { .. }) {
        save(&browser, &snapshot_path)?;
    }
    result
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_tree::HierarchicalLayer::default()
                .with_indent_amount(2)
                .with_indent_lines(true)
                .with_targets(true),
        )
        .with(EnvFilter::from_default_env())
        .init();
}

fn save(browser: &MemoryBrowser, path: &Path) -> anyhow::Result<()> {
    browser.save(path).with_context(|| format!("saving browser snapshot {}", path.display()))
}

fn run(handle: &TabServiceHandle, command: &TabCmd) -> anyhow::Result<()> {
    let response = match command {
        TabCmd::Status { json } => {
            let windows = handle.query_windows()?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&windows)?);
            } else {
                print!("{}", status::render(&windows)?);
            }
            return Ok(());
        }
        TabCmd::Switch { tab, focus_only } => {
            let tab = TabId::new(*tab);
            if *focus_only {
                handle.switch_tab(SwitchTab::focus_only(tab))?
            } else {
                handle.switch_tab_managed(tab)?
            }
        }
        TabCmd::Manage { window } => {
            let window = match window {
                Some(id) => WindowId::new(*id),
                None => focused_window(handle)?,
            };
            handle.manage_window(window)?
        }
        TabCmd::SuspendStale => handle.execute(Command::SuspendStaleTabs)?,
        TabCmd::SuspendGrouped => handle.execute(Command::SuspendGroupedTabs)?,
        TabCmd::Dashboard => handle.execute(Command::OpenDashboard)?,
        TabCmd::Close { tabs } => {
            handle.execute(Command::CloseTabs(tabs.iter().copied().map(TabId::new).collect()))?
        }
    };
    report(response)
}

fn focused_window(handle: &TabServiceHandle) -> anyhow::Result<WindowId> {
    let windows = handle.query_windows()?;
    windows
        .iter()
        .find(|w| w.focused)
        .or(windows.first())
        .map(|w| w.id)
        .context("the snapshot has no windows")
}

fn report(response: CommandResponse) -> anyhow::Result<()> {
    match response {
        CommandResponse::Switched(SwitchOutcome::FocusOnly) => println!("focused"),
        CommandResponse::Switched(SwitchOutcome::Regrouped(partition)) => {
            println!(
                "focused, {} tabs kept out, {} moved into the main group",
                partition.ungrouped.len(),
                partition.to_group.len()
            )
        }
        CommandResponse::Managed(Some(group)) => println!("window managed by group {group}"),
        CommandResponse::Managed(None) => println!("nothing to manage"),
        CommandResponse::Suspended(report) => {
            println!("discarded {} tabs", report.discarded.len());
            for (tab, err) in &report.failed {
                eprintln!("tab {tab}: {err}");
            }
            if !report.is_complete() {
                bail!("{} tabs could not be discarded", report.failed.len());
            }
        }
        CommandResponse::Dashboard(DashboardOutcome::Opened(tab)) => {
            println!("opened dashboard in tab {tab}")
        }
        CommandResponse::Dashboard(DashboardOutcome::AlreadyFocused(tab)) => {
            println!("dashboard already focused in tab {tab}")
        }
        CommandResponse::Dashboard(DashboardOutcome::Switched(tab, _)) => {
            println!("switched to dashboard in tab {tab}")
        }
        CommandResponse::Closed => println!("closed"),
        CommandResponse::Skipped => println!("browser is busy, nothing changed"),
    }
    Ok(())
}

async fn run_topics(store: &FileStore, command: &TopicsCmd) -> anyhow::Result<()> {
    let topics = TopicStore::new(store);
    match command {
        TopicsCmd::List => {
            let assignments = topics.tab_assignments().await?;
            for topic in topics.topics().await? {
                let color = topic.color.as_deref().map(|c| format!(" ({c})")).unwrap_or_default();
                println!("{} {}{color}", topic.id, topic.name);
                for (url, _) in assignments.iter().filter(|(_, id)| **id == topic.id) {
                    println!("  {url}");
                }
            }
        }
        TopicsCmd::Add { name, color } => {
            let topic = topics.save_topic(name.clone(), color.clone()).await?;
            println!("{}", topic.id);
        }
        TopicsCmd::Rename { id, name } => {
            let Some(topic) = topics.topics().await?.into_iter().find(|t| &t.id == id) else {
                bail!("no topic with id {id}");
            };
            topics.update_topic(&Topic { name: name.clone(), ..topic }).await?;
        }
        TopicsCmd::Remove { id } => topics.delete_topic(id).await?,
        TopicsCmd::Assign { url, id } => topics.assign_tab_to_topic(url, id).await?,
        TopicsCmd::Unassign { url } => topics.remove_tab_assignment(url).await?,
    }
    Ok(())
}
