use std::{
    io::{self, BufRead, Write},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use client_core::{
    BulkError, HttpRecordService, ListScreen, Listable, NotificationLevel, RecordService,
    SortOrder, StatusFilter,
};
use serde_json::Value;
use shared::{
    domain::{Customer, EntityKind, Kra, Record, RecordId, Selectable, Task, Team, Ticket, User},
    protocol::BulkParams,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Operate on opsdesk records from the command line")]
struct Cli {
    #[arg(long, env = "OPSDESK_SERVER_URL", default_value = "http://127.0.0.1:8080")]
    server_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print one page of a filtered, sorted collection.
    List {
        kind: EntityKind,
        #[command(flatten)]
        query: ListArgs,
    },
    /// Run a bulk action over explicit ids.
    Bulk {
        kind: EntityKind,
        action: String,
        #[arg(long, value_delimiter = ',', required = true)]
        ids: Vec<String>,
        #[arg(long)]
        role: Option<String>,
        #[arg(long)]
        assignee: Option<String>,
        #[arg(long)]
        status: Option<String>,
        /// Skip the confirmation prompt for destructive actions.
        #[arg(long)]
        yes: bool,
    },
    Create {
        kind: EntityKind,
        #[arg(long)]
        json: String,
    },
}

#[derive(Args, Debug)]
struct ListArgs {
    #[arg(long, default_value = "")]
    search: String,
    #[arg(long, default_value = "all")]
    status: StatusFilter,
    #[arg(long)]
    sort_by: Option<String>,
    #[arg(long)]
    desc: bool,
    #[arg(long, default_value_t = 1)]
    page: usize,
    #[arg(long, default_value_t = 20)]
    page_size: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let kind = match &cli.command {
        Command::List { kind, .. } | Command::Bulk { kind, .. } | Command::Create { kind, .. } => *kind,
    };
    match kind {
        EntityKind::Tasks => run::<Task>(&cli.server_url, cli.command).await,
        EntityKind::Kras => run::<Kra>(&cli.server_url, cli.command).await,
        EntityKind::Users => run::<User>(&cli.server_url, cli.command).await,
        EntityKind::Teams => run::<Team>(&cli.server_url, cli.command).await,
        EntityKind::Tickets => run::<Ticket>(&cli.server_url, cli.command).await,
        EntityKind::Customers => run::<Customer>(&cli.server_url, cli.command).await,
    }
}

async fn run<R: Record + Listable>(server_url: &str, command: Command) -> Result<()> {
    let service = Arc::new(HttpRecordService::<R>::new(server_url)?);
    debug!(kind = %R::KIND, server_url, "connected");

    match command {
        Command::List { query, .. } => list(service, query).await,
        Command::Bulk {
            action,
            ids,
            role,
            assignee,
            status,
            yes,
            ..
        } => {
            let mut params = BulkParams::new();
            for (key, value) in [("role", role), ("assignee_id", assignee), ("status", status)] {
                if let Some(value) = value {
                    params.insert(key.to_string(), Value::from(value));
                }
            }
            bulk(service, &action, &ids, params, yes).await
        }
        Command::Create { json, .. } => {
            let input: Value = serde_json::from_str(&json).context("--json is not valid JSON")?;
            let record = service.create(input).await?;
            println!("created {} {}", R::KIND, record.id());
            Ok(())
        }
    }
}

async fn list<R: Record + Listable>(service: Arc<HttpRecordService<R>>, args: ListArgs) -> Result<()> {
    let mut screen = ListScreen::new(service, args.page_size);
    screen.reload().await?;
    screen.set_search_term(args.search);
    screen.set_status_filter(args.status);
    if let Some(field) = args.sort_by {
        let order = if args.desc { SortOrder::Desc } else { SortOrder::Asc };
        screen.set_sort(field, order);
    }
    screen.set_page(args.page);

    let page = screen.visible_page();
    for record in &page.items {
        println!("{}", serde_json::to_string(record)?);
    }
    println!(
        "page {}/{} ({} {})",
        page.page,
        page.total_pages,
        page.total_items,
        R::KIND.noun_for(page.total_items)
    );
    Ok(())
}

async fn bulk<R: Record + Listable>(
    service: Arc<HttpRecordService<R>>,
    action: &str,
    ids: &[String],
    params: BulkParams,
    yes: bool,
) -> Result<()> {
    let mut screen = ListScreen::new(service, usize::MAX);
    screen.reload().await?;
    let ids: Vec<RecordId> = ids.iter().map(|raw| RecordId::from(raw.as_str())).collect();
    for id in screen.select_ids(&ids) {
        eprintln!("skipping {id}: not in the current list");
    }

    let selected = screen.selection().selected_count();
    let confirmed = yes || !screen.executor().is_destructive(action)? || confirm(action, selected, R::KIND)?;
    if !confirmed {
        println!("aborted");
        return Ok(());
    }

    let outcome = match screen.run_bulk_action(action, &params, true).await {
        Ok(outcome) => outcome,
        Err(BulkError::EmptySelection) => bail!("none of the given ids exist"),
        Err(error) => return Err(error.into()),
    };

    println!("{}", outcome.notification.message);
    for id in &outcome.result.failed_ids {
        println!("  failed: {id}");
    }
    if outcome.notification.level == NotificationLevel::Error {
        bail!("{action} failed for every record");
    }
    Ok(())
}

fn confirm(action: &str, count: usize, kind: EntityKind) -> Result<bool> {
    print!("{action} {count} {}? [y/N] ", kind.noun_for(count));
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}
