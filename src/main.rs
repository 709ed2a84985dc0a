use std::sync::Arc;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use secrecy::ExposeSecret;
use uuid::Uuid;

use icebox::config::IceboxConfig;
use icebox::discovery::{DiscoveryScanner, Triage, build_classifier, triage_discovered};
use icebox::ideas::{Idea, IdeaService, IdeaStatus, Metric, Priority, Trigger};
use icebox::llm::{LlmProvider, create_provider};
use icebox::notion::NotionClient;
use icebox::proxy::{ProxyState, notion_proxy_routes};
use icebox::store::open_store;
use icebox::wake::build_scorer;

#[derive(Parser, Debug)]
#[command(name = "icebox")]
#[command(author, version, about = "Freeze ideas, wake the right ones, find the forgotten ones")]
struct Args {
    /// Name recorded on decisions
    #[arg(long, default_value = "cli")]
    actor: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add a new active idea
    Add {
        title: String,
        #[arg(short, long, default_value = "")]
        description: String,
        #[arg(short, long, default_value = "medium")]
        priority: Priority,
        #[arg(short, long, default_value = "general")]
        category: String,
    },
    /// List ideas in the workspace
    List {
        #[arg(short, long)]
        status: Option<IdeaStatus>,
    },
    /// Freeze an idea until a trigger fires
    Freeze {
        id: Uuid,
        #[arg(short, long)]
        reason: String,
        /// Wake-up date (YYYY-MM-DD)
        #[arg(long, conflicts_with_all = ["metric", "keyword"])]
        date: Option<NaiveDate>,
        /// Metric condition, e.g. "MAU"
        #[arg(long, conflicts_with = "keyword")]
        metric: Option<String>,
        /// External keyword to watch for
        #[arg(long)]
        keyword: Option<String>,
    },
    /// Thaw a frozen idea
    Thaw {
        id: Uuid,
        #[arg(short, long, default_value = "Thawed from the icebox")]
        reason: String,
    },
    /// Kill an idea
    Kill {
        id: Uuid,
        #[arg(short, long)]
        reason: String,
    },
    /// Vote for an idea
    Vote {
        id: Uuid,
        #[arg(short, long)]
        user: String,
        #[arg(short, long, default_value = "")]
        tag: String,
    },
    /// Merge source ideas into a target
    Merge {
        target: Uuid,
        #[arg(required = true)]
        sources: Vec<Uuid>,
    },
    /// Record a metric snapshot
    Metric {
        name: String,
        current: f64,
        target: f64,
        #[arg(short, long, default_value = "")]
        unit: String,
    },
    /// Show Smart Wake recommendations
    Wake,
    /// Show frozen ideas whose trigger holds
    Triggers {
        /// External signal text (repeatable)
        #[arg(short, long)]
        signal: Vec<String>,
    },
    /// Scan Notion for dormant ideas
    Discover {
        /// File every discovered idea into the icebox
        #[arg(long, value_enum)]
        import: Option<ImportAs>,
    },
    /// Run the same-origin Notion proxy
    ServeProxy {
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Exchange a Notion OAuth code for an access token
    NotionToken {
        #[arg(long)]
        code: String,
        #[arg(long)]
        redirect_uri: String,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ImportAs {
    Active,
    Frozen,
}

impl From<ImportAs> for Triage {
    fn from(value: ImportAs) -> Self {
        match value {
            ImportAs::Active => Triage::Active,
            ImportAs::Frozen => Triage::Frozen,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = IceboxConfig::from_env().context("Invalid configuration")?;

    let llm: Option<Arc<dyn LlmProvider>> = config
        .llm
        .as_ref()
        .map(create_provider)
        .transpose()
        .context("Failed to create LLM provider")?;

    let store = open_store(&config.store).await.context("Failed to open store")?;
    store.init_schema().await?;

    let service = IdeaService::new(
        Arc::clone(&store),
        build_scorer(llm.clone()),
        config.workspace_id.clone(),
    )
    .with_actor(args.actor);
    let now = Utc::now();

    match args.command {
        Command::Add {
            title,
            description,
            priority,
            category,
        } => {
            let idea = Idea::new(&config.workspace_id, title)
                .with_description(description)
                .with_priority(priority)
                .with_category(category);
            let idea = service.create(idea, now).await?;
            println!("{}  {}", idea.id, idea.title);
        }
        Command::List { status } => {
            let ideas = match status {
                Some(status) => store.list_ideas_by_status(&config.workspace_id, status).await?,
                None => store.list_ideas(&config.workspace_id).await?,
            };
            for idea in ideas {
                println!(
                    "{}  {:<11} {:>3} votes  {}",
                    idea.id, idea.status, idea.votes, idea.title
                );
            }
        }
        Command::Freeze {
            id,
            reason,
            date,
            metric,
            keyword,
        } => {
            let trigger = match (date, metric, keyword) {
                (Some(date), _, _) => Trigger::Time {
                    date: date.and_hms_opt(0, 0, 0).context("Invalid date")?.and_utc(),
                },
                (_, Some(condition), _) => Trigger::Metric { condition },
                (_, _, Some(keyword)) => Trigger::External { keyword },
                _ => Trigger::None,
            };
            let idea = service.freeze(id, trigger, &reason, now).await?;
            println!("Frozen: {}", idea.title);
        }
        Command::Thaw { id, reason } => {
            let idea = service.wake(id, &reason, now).await?;
            println!("Thawed: {}", idea.title);
        }
        Command::Kill { id, reason } => {
            let idea = service.kill(id, &reason, now).await?;
            println!("Killed: {}", idea.title);
        }
        Command::Vote { id, user, tag } => {
            let idea = service.vote(id, &user, &tag, now).await?;
            println!("{} now has {} votes", idea.title, idea.votes);
        }
        Command::Merge { target, sources } => {
            let idea = service.merge(target, &sources, now).await?;
            println!("Merged into {} ({} votes)", idea.title, idea.votes);
        }
        Command::Metric {
            name,
            current,
            target,
            unit,
        } => {
            let mut metric = Metric::new(&config.workspace_id, name, current, target);
            metric.unit = unit;
            store.upsert_metric(&metric).await?;
            println!(
                "Recorded {}: {} / {}",
                metric.name, metric.current_value, metric.target_value
            );
        }
        Command::Wake => {
            let recs = service.recommendations(now).await?;
            if recs.is_empty() {
                println!("Nothing frozen.");
            }
            for rec in recs {
                let title = service.get(rec.idea_id).await.map(|i| i.title).unwrap_or_default();
                println!(
                    "{:>3}  {:<11} {}  ({})",
                    rec.score, rec.suggested_action, title, rec.reason
                );
            }
        }
        Command::Triggers { signal } => {
            for fired in service.check_triggers(&signal, now).await? {
                println!("{}  {}: {}", fired.idea_id, fired.title, fired.reason);
            }
        }
        Command::Discover { import } => {
            let token = config
                .notion
                .token
                .clone()
                .context("NOTION_TOKEN is required for discovery")?;
            let client = NotionClient::new(&config.notion.base_url)
                .with_token(token)
                .with_max_pages(config.notion.max_pages);
            let scanner = DiscoveryScanner::new(
                Arc::new(client),
                build_classifier(llm, config.discovery.dormancy_days),
            )
            .with_batch_delay(config.discovery.batch_delay);

            let report = scanner.scan(now).await?;
            eprintln!(
                "Scanned {} pages in {} batches, found {} dormant ideas",
                report.pages_scanned,
                report.batches,
                report.ideas.len()
            );
            if let Some(oldest) = report.oldest() {
                eprintln!("Oldest: {} ({} days)", oldest.title, oldest.dormant_days);
            }
            for found in &report.ideas {
                println!(
                    "{:>4}d  {:.2}  {}  {}",
                    found.dormant_days, found.confidence, found.title, found.source_url
                );
                if let Some(triage) = import {
                    triage_discovered(
                        store.as_ref(),
                        &config.workspace_id,
                        found,
                        triage.into(),
                        now,
                    )
                    .await?;
                }
            }
        }
        Command::ServeProxy { port } => {
            let port = port.unwrap_or(config.proxy_port);
            let app = notion_proxy_routes(ProxyState::new(
                config.notion.base_url.clone(),
                config.notion.oauth.clone(),
            ));
            let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
                .await
                .with_context(|| format!("Failed to bind port {port}"))?;

            eprintln!("🧊 Icebox Notion proxy v{}", env!("CARGO_PKG_VERSION"));
            eprintln!("   Upstream: {}", config.notion.base_url);
            eprintln!("   Listening: http://0.0.0.0:{port}/api/notion");
            eprintln!(
                "   OAuth: {}",
                if config.notion.oauth.is_some() { "configured" } else { "disabled" }
            );
            axum::serve(listener, app).await?;
        }
        Command::NotionToken { code, redirect_uri } => {
            let oauth = config
                .notion
                .oauth
                .as_ref()
                .context("NOTION_CLIENT_ID and NOTION_CLIENT_SECRET are required")?;
            let client = NotionClient::new(&config.notion.base_url);
            let token = client
                .exchange_oauth_code(Some(oauth), &code, &redirect_uri)
                .await?;
            eprintln!(
                "Connected workspace: {}",
                token.workspace_name.as_deref().unwrap_or("(unnamed)")
            );
            println!("{}", token.access_token.expose_secret());
        }
    }

    Ok(())
}
