// ============================================================================
// caselab - command-line driver for the phone-case sticker builder
// ============================================================================
// Usage:
//   caselab show [--styles]                 Print the grid and order total
//   caselab place 3 bear [--method drag]    Put a trinket in a slot
//   caselab move 3 7                        Move/swap two slots
//   caselab randomize [--pack ID] [--seed]  Fill the grid at random
//   caselab checkout [--submit]             Summarize the order
//   caselab session                         Read commands from stdin
//                                           (undo/redo work within a session)
//   caselab admin --user NAME charms        Manage the catalog (admin API)
//   caselab admin --user NAME update-charm bear Bear 2.75 --tags cute
// ============================================================================

use anyhow::{anyhow, Result};
use caselab_core::pack::{all_tags, TrayFilter};
use caselab_core::{
    AdminClient, BuilderEngine, CaseLabConfig, CatalogClient, CharmPayload, MoveOutcome, Pack,
    PlacementMethod, RedbBackend, RemovalMethod, SnapshotStore, StylePatch, TracingSink,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io::BufRead;
use std::sync::Arc;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// Phone-case sticker builder
#[derive(Parser)]
#[command(name = "caselab", version, about = "Design a phone case from trinket stickers")]
struct Cli {
    /// Path to the design database (default: ~/.caselab/design.redb)
    #[arg(long, global = true)]
    db_path: Option<String>,

    /// Catalog/admin API base URL (default: http://localhost:4000)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Refresh the catalog from the API before running the command
    #[arg(long, global = true)]
    online: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Engine(EngineCommand),

    /// Read one command per line from stdin against a single undo history
    Session,

    /// List bundled packs
    Packs,

    /// List catalog trinkets
    Catalog {
        /// Name or id search
        #[arg(long, default_value = "")]
        query: String,

        /// Only trinkets carrying this tag
        #[arg(long)]
        tag: Option<String>,
    },

    /// Catalog management through the admin API
    Admin {
        #[arg(long)]
        user: String,

        /// Password (falls back to CASELAB_ADMIN_PASSWORD)
        #[arg(long)]
        password: Option<String>,

        #[command(subcommand)]
        action: AdminCommand,
    },
}

/// Commands that operate on the design
#[derive(Subcommand, Debug, PartialEq)]
enum EngineCommand {
    /// Print the grid and the current order total
    Show {
        /// Also print each placed sticker's style
        #[arg(long)]
        styles: bool,
    },

    /// Put a trinket in a slot
    Place {
        index: usize,
        trinket: String,
        #[arg(long, value_enum, default_value_t = MethodArg::Tap)]
        method: MethodArg,
    },

    /// Clear a slot
    Remove { index: usize },

    /// Move a sticker, swapping with the destination's occupant
    Move { from: usize, to: usize },

    /// Copy a sticker into the first empty slot
    Duplicate { index: usize },

    /// Raise a sticker above all others
    Front { index: usize },

    /// Lower a sticker below all others
    Back { index: usize },

    /// Adjust a sticker's style (values are clamped)
    Style {
        index: usize,
        #[arg(long)]
        scale: Option<f64>,
        #[arg(long, allow_hyphen_values = true)]
        rotate: Option<f64>,
        #[arg(long)]
        depth: Option<f64>,
        #[arg(long, allow_hyphen_values = true)]
        z_index: Option<f64>,
    },

    /// Replace the design with random stickers
    Randomize {
        /// Draw each sticker at most once from this pack
        #[arg(long)]
        pack: Option<String>,

        /// Seed for a reproducible layout
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Clear every sticker outside a pack
    Prune {
        #[arg(long)]
        pack: String,
    },

    /// Print order lines and total
    Totals,

    /// Open checkout (and optionally submit)
    Checkout {
        #[arg(long)]
        pack: Option<String>,

        #[arg(long)]
        submit: bool,
    },

    /// Clear the whole design (cannot be undone)
    Reset,
}

#[derive(Subcommand, Debug, PartialEq)]
enum AdminCommand {
    /// Show the signed-in admin
    Me,

    /// List charms
    Charms,

    /// Create a charm (id derived from the name unless given)
    AddCharm {
        #[arg(long)]
        id: Option<String>,
        #[command(flatten)]
        charm: CharmArgs,
    },

    /// Replace a charm's fields
    UpdateCharm {
        id: String,
        #[command(flatten)]
        charm: CharmArgs,
    },

    /// Delete a charm
    DeleteCharm { id: String },

    /// Set the case price
    CasePrice { price: String },
}

/// Charm form fields, validated before anything is sent
#[derive(Args, Debug, PartialEq)]
struct CharmArgs {
    name: String,
    price: String,
    #[arg(long)]
    icon: Option<String>,
    /// Comma-separated tags
    #[arg(long)]
    tags: Option<String>,
}

impl CharmArgs {
    fn payload(&self) -> Result<CharmPayload> {
        let body = serde_json::json!({
            "name": self.name,
            "price": self.price,
            "icon": self.icon,
            "tags": self.tags,
        });
        Ok(caselab_core::admin::sanitize_charm_payload(&body)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum MethodArg {
    Tap,
    Drag,
    Swap,
}

impl From<MethodArg> for PlacementMethod {
    fn from(method: MethodArg) -> Self {
        match method {
            MethodArg::Tap => PlacementMethod::Tap,
            MethodArg::Drag => PlacementMethod::Drag,
            MethodArg::Swap => PlacementMethod::Swap,
        }
    }
}

/// One line of a `session`
#[derive(Parser, Debug)]
#[command(no_binary_name = true, disable_help_flag = true, disable_version_flag = true)]
struct SessionLine {
    #[command(subcommand)]
    command: SessionCommand,
}

#[derive(Subcommand, Debug, PartialEq)]
enum SessionCommand {
    #[command(flatten)]
    Engine(EngineCommand),
    Undo,
    Redo,
    Quit,
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        debug!("No .env file loaded: {}", e);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("caselab_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = CaseLabConfig::from_env();
    if let Some(path) = cli.db_path {
        config.db_path = Some(path);
    }
    if let Some(url) = cli.api_url {
        config.api_url = url;
    }

    match cli.command {
        Commands::Packs => cmd_packs(),
        Commands::Catalog { query, tag } => {
            let catalog = load_catalog(&config, cli.online).await;
            cmd_catalog(&catalog, &TrayFilter::new(query, tag))
        }
        Commands::Admin {
            user,
            password,
            action,
        } => {
            let password = password
                .or_else(|| std::env::var("CASELAB_ADMIN_PASSWORD").ok())
                .ok_or_else(|| anyhow!("Password required (--password or CASELAB_ADMIN_PASSWORD)"))?;
            cmd_admin(&config, &user, &password, action).await
        }
        Commands::Engine(command) => {
            let mut engine = open_engine(&config, cli.online).await?;
            run_command(&mut engine, command)
        }
        Commands::Session => {
            let mut engine = open_engine(&config, cli.online).await?;
            cmd_session(&mut engine, std::io::stdin().lock())
        }
    }
}

async fn load_catalog(config: &CaseLabConfig, online: bool) -> caselab_core::CatalogData {
    let mut client = CatalogClient::new(config.api_url.as_str());
    if online {
        client.refresh().await;
    }
    client.data().clone()
}

async fn open_engine(config: &CaseLabConfig, online: bool) -> Result<BuilderEngine> {
    let backend = RedbBackend::open(config.db_path.as_deref())?;
    let mut engine = BuilderEngine::new(
        config.engine_settings(),
        SnapshotStore::new(backend),
        Arc::new(TracingSink),
    );
    if online {
        let cleared = engine.set_catalog(load_catalog(config, true).await);
        if !cleared.is_empty() {
            warn!("Cleared {} stickers no longer in the catalog", cleared.len());
        }
    }
    Ok(engine)
}

fn run_command(engine: &mut BuilderEngine, command: EngineCommand) -> Result<()> {
    match command {
        EngineCommand::Show { styles } => {
            print_grid(engine);
            if styles {
                print_styles(engine);
            }
            let summary = engine.totals();
            println!("Total: ${:.2} ({} placed)", summary.total, summary.placed_count);
        }
        EngineCommand::Place {
            index,
            trinket,
            method,
        } => {
            if engine.find_trinket(&trinket).is_none() {
                anyhow::bail!("Unknown trinket '{}'. Run `caselab catalog` to list them.", trinket);
            }
            match engine.place_at(index, Some(&trinket), method.into())? {
                Some(previous) if previous != trinket => {
                    println!("Placed {} in slot {} (replaced {})", trinket, index, previous)
                }
                _ => println!("Placed {} in slot {}", trinket, index),
            }
        }
        EngineCommand::Remove { index } => match engine.remove_at(index, RemovalMethod::Tap)? {
            Some(removal) => println!("Removed {} from slot {}", removal.trinket_id, index),
            None => println!("Slot {} is already empty", index),
        },
        EngineCommand::Move { from, to } => match engine.move_or_swap(from, to)? {
            MoveOutcome::Selected(index) => println!("Selected slot {}", index),
            MoveOutcome::Moved {
                trinket_id,
                replaced_id: Some(other),
            } => println!("Swapped {} (slot {}) with {} (slot {})", trinket_id, from, other, to),
            MoveOutcome::Moved { trinket_id, .. } => {
                println!("Moved {} from slot {} to slot {}", trinket_id, from, to)
            }
        },
        EngineCommand::Duplicate { index } => match engine.duplicate(index)? {
            Some(target) => println!("Duplicated slot {} into slot {}", index, target),
            None => println!("Slot {} is empty, nothing to duplicate", index),
        },
        EngineCommand::Front { index } => {
            let z_index = engine.bring_to_front(index)?;
            println!("Slot {} raised to layer {}", index, z_index);
        }
        EngineCommand::Back { index } => {
            let z_index = engine.send_to_back(index)?;
            println!("Slot {} lowered to layer {}", index, z_index);
        }
        EngineCommand::Style {
            index,
            scale,
            rotate,
            depth,
            z_index,
        } => {
            let style = engine.update_style(
                index,
                StylePatch {
                    scale,
                    rotate,
                    depth,
                    z_index,
                },
            )?;
            println!(
                "Slot {}: scale {:.2}, rotate {:.0}, depth {:.1}, layer {}",
                index, style.scale, style.rotate, style.depth, style.z_index
            );
        }
        EngineCommand::Randomize { pack, seed } => {
            engine.set_pack(pack.as_deref())?;
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            let count = engine.randomize(&mut rng);
            println!("Placed {} random stickers", count);
        }
        EngineCommand::Prune { pack } => {
            let cleared = engine.set_pack(Some(&pack))?;
            println!("Cleared {} stickers outside {}", cleared.len(), pack);
        }
        EngineCommand::Totals => print_totals(engine),
        EngineCommand::Checkout { pack, submit } => {
            if let Some(pack) = pack.as_deref() {
                engine.set_pack(Some(pack))?;
            }
            if !engine.checkout_unlocked() {
                anyhow::bail!(
                    "Checkout unlocks at {} stickers ({} placed)",
                    caselab_core::order::CHECKOUT_UNLOCK_COUNT,
                    engine.slots().placed_count()
                );
            }
            engine.checkout();
            print_totals(engine);
            if submit {
                let summary = engine.submit_checkout();
                println!("Order submitted: ${:.2}", summary.total);
            }
        }
        EngineCommand::Reset => {
            engine.reset();
            println!("Design cleared");
        }
    }
    Ok(())
}

fn cmd_session(engine: &mut BuilderEngine, input: impl BufRead) -> Result<()> {
    for line in input.lines() {
        let line = line?;
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() || words[0].starts_with('#') {
            continue;
        }
        let parsed = match SessionLine::try_parse_from(words) {
            Ok(parsed) => parsed,
            Err(e) => {
                eprintln!("{}", e);
                continue;
            }
        };
        match parsed.command {
            SessionCommand::Quit => break,
            SessionCommand::Undo => {
                println!("{}", if engine.undo() { "Undone" } else { "Nothing to undo" })
            }
            SessionCommand::Redo => {
                println!("{}", if engine.redo() { "Redone" } else { "Nothing to redo" })
            }
            SessionCommand::Engine(command) => {
                if let Err(e) = run_command(engine, command) {
                    eprintln!("Error: {}", e);
                }
            }
        }
    }
    Ok(())
}

fn cmd_packs() -> Result<()> {
    for pack in Pack::all() {
        println!("{:<16}  {:<16}  {}", pack.id, pack.name, pack.trinkets.join(", "));
    }
    Ok(())
}

fn cmd_catalog(catalog: &caselab_core::CatalogData, filter: &TrayFilter) -> Result<()> {
    println!("Case price: ${:.2}", catalog.case_price);
    println!("Tags: {}", all_tags(&catalog.trinkets).join(", "));
    println!();
    println!("{:<14}  {:<16}  {:>6}  {}", "ID", "NAME", "PRICE", "TAGS");
    println!("{}", "-".repeat(56));
    let shown = filter.apply(&catalog.trinkets);
    for trinket in &shown {
        println!(
            "{:<14}  {:<16}  {:>6.2}  {}",
            trinket.id,
            trinket.name,
            trinket.price,
            trinket.tags().join(", ")
        );
    }
    println!("\n{} of {} trinkets", shown.len(), catalog.trinkets.len());
    Ok(())
}

async fn cmd_admin(
    config: &CaseLabConfig,
    user: &str,
    password: &str,
    action: AdminCommand,
) -> Result<()> {
    let mut client = AdminClient::new(config.api_url.as_str());
    client.login(user, password).await?;

    let result = run_admin(config, &client, action).await;

    if let Err(e) = client.logout().await {
        warn!("Logout failed: {}", e);
    }
    result
}

async fn run_admin(config: &CaseLabConfig, client: &AdminClient, action: AdminCommand) -> Result<()> {
    match action {
        AdminCommand::Me => {
            println!("Signed in as {}", client.me().await?);
        }
        AdminCommand::Charms => {
            let mut catalog = CatalogClient::new(config.api_url.as_str());
            if let Some(token) = client.session_token() {
                catalog = catalog.with_session(token);
            }
            catalog.refresh().await;
            let case_price = catalog.data().case_price;
            let charms = client.list_charms().await?;
            cmd_catalog(
                &caselab_core::CatalogData {
                    case_price,
                    trinkets: charms,
                },
                &TrayFilter::default(),
            )?;
        }
        AdminCommand::AddCharm { id, charm } => {
            let payload = charm.payload()?;
            let charm_id = client.next_charm_id(id.as_deref(), &payload.name).await?;
            if charm_id.generated {
                println!("Using generated id {}", charm_id.id);
            }
            let created = client.create_charm(Some(&charm_id.id), &payload).await?;
            println!("Created {} ({})", created.id, created.name);
        }
        AdminCommand::UpdateCharm { id, charm } => {
            let updated = client.update_charm(&id, &charm.payload()?).await?;
            println!("Updated {} ({}, ${:.2})", updated.id, updated.name, updated.price);
        }
        AdminCommand::DeleteCharm { id } => {
            client.delete_charm(&id).await?;
            println!("Deleted {}", id);
        }
        AdminCommand::CasePrice { price } => {
            let price = caselab_core::admin::validate_case_price(&serde_json::Value::String(price))?;
            let stored = client.set_case_price(price).await?;
            println!("Case price set to ${:.2}", stored);
        }
    }
    Ok(())
}

fn print_grid(engine: &BuilderEngine) {
    let cols = engine.cols();
    for row in 0..engine.rows() {
        let cells: Vec<String> = (0..cols)
            .map(|col| row * cols + col)
            .filter(|&i| i < engine.slot_count())
            .map(|i| format!("{:>2} {:<12}", i, engine.slots().get(i).unwrap_or("·")))
            .collect();
        println!("{}", cells.join(" "));
    }
}

fn print_styles(engine: &BuilderEngine) {
    for (index, id) in engine.slots().occupied() {
        if let Some(style) = engine.styles().get(index) {
            println!(
                "  {:>2} {:<12} scale {:.2}  rotate {:>4.0}  depth {:.1}  layer {}",
                index, id, style.scale, style.rotate, style.depth, style.z_index
            );
        }
    }
}

fn print_totals(engine: &BuilderEngine) {
    let summary = engine.totals();
    println!("Case                ${:>7.2}", engine.catalog().case_price);
    for item in &summary.items {
        let price = engine.find_trinket(&item.id).map_or(0.0, |t| t.price);
        println!("{:<14} x{:<3} ${:>7.2}", item.id, item.qty, price * f64::from(item.qty));
    }
    println!("Total               ${:>7.2}", summary.total);
}
