//! Leadboard - lead management dashboard client
//!
//! A CLI over the lead backend: browse pending and resolved leads, mark
//! them as handled, and build aggregate reports by day, collective,
//! source and hour.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (network, backend, config, session, etc.)
//!   2 - Login rejected, or the role has no access to reports

mod analysis;
mod api;
mod cli;
mod config;
mod models;
mod refresh;
mod report;
mod session;
mod table;

use analysis::ReportOptions;
use anyhow::{Context, Result};
use api::{fetch_statuses, ApiClient, ApiError};
use chrono::{Local, Utc};
use cli::{Args, Command, OutputFormat};
use config::{Config, CONFIG_FILE};
use indicatif::{ProgressBar, ProgressStyle};
use models::{Event, LeadStatus, ReportScope};
use refresh::{refresh_events, DataState, Freshness, Poller};
use session::{current_session, FileSessionStore, Session, SessionError, SessionStore};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use table::{SortColumn, SortDirection, TableQuery};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("Leadboard v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", redacted(&args));

    match run(args).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(exit_code_for(&e));
        }
    }
}

/// Handle --init-config: generate a default .leadboard.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to set the backend URL, session file, page size and refresh interval.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Arguments with the password blanked, for debug logging.
fn redacted(args: &Args) -> Args {
    let mut args = args.clone();
    if let Some(Command::Login { password, .. }) = args.command.as_mut() {
        *password = "********".to_string();
    }
    args
}

/// Map a failure to the process exit code.
fn exit_code_for(error: &anyhow::Error) -> i32 {
    for cause in error.chain() {
        if let Some(SessionError::Forbidden { .. }) = cause.downcast_ref::<SessionError>() {
            return 2;
        }
        if let Some(ApiError::Auth(_)) = cause.downcast_ref::<ApiError>() {
            return 2;
        }
    }
    1
}

/// Resolved settings shared by every subcommand.
struct App {
    config: Config,
    store: FileSessionStore,
    format: OutputFormat,
    output: Option<PathBuf>,
    quiet: bool,
}

impl App {
    fn client(&self) -> Result<ApiClient> {
        let client =
            ApiClient::new(&self.config.api).context("Failed to initialize the API client")?;
        debug!("Using backend {}", client.base_url());
        Ok(client)
    }

    /// The current session; every data command needs one.
    fn session(&self) -> Result<Session> {
        Ok(current_session(&self.store, Utc::now())?)
    }

    /// The current session, restricted to roles that may view reports.
    fn report_session(&self) -> Result<Session> {
        let session = self.session()?;
        session.require_report_access()?;
        Ok(session)
    }

    fn emit_table(&self, table: &analysis::ReportTable) -> Result<()> {
        let rendered = report::render_table(table, self.format)?;
        self.emit(&rendered)
    }

    fn emit(&self, content: &str) -> Result<()> {
        report::write_output(content, self.output.as_deref())?;
        if let Some(ref path) = self.output {
            if !self.quiet {
                eprintln!("💾 Saved to {}", path.display());
            }
        }
        Ok(())
    }

    /// Await `future` behind a spinner unless running quiet.
    async fn with_spinner<F: Future>(&self, message: &str, future: F) -> F::Output {
        let spinner = (!self.quiet).then(|| {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
                pb.set_style(style);
            }
            pb.set_message(message.to_string());
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        });

        let result = future.await;

        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }
        result
    }
}

/// Run one subcommand. Returns the exit code.
async fn run(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let Some(command) = args.command.clone() else {
        anyhow::bail!("A command is required (try --help)");
    };

    let app = App {
        store: FileSessionStore::new(config.session.path.clone()),
        format: config.report.default_format,
        output: args.output.clone(),
        quiet: args.quiet,
        config,
    };

    match command {
        Command::Login { email, password } => run_login(&app, &email, &password).await,
        Command::Logout => run_logout(&app),
        Command::Whoami => run_whoami(&app),
        Command::Leads {
            status,
            search,
            sort,
            desc,
            page,
            page_size,
            watch,
            interval,
        } => {
            let query = TableQuery {
                search,
                sort: sort.map(|s| (SortColumn::from(s), SortDirection::from(desc))),
                page,
                page_size: page_size.unwrap_or(app.config.table.page_size),
            };
            let status = LeadStatus::from(status);
            if watch {
                let seconds = interval.unwrap_or(app.config.refresh.interval_seconds);
                run_watch(&app, status, query, Duration::from_secs(seconds)).await
            } else {
                run_leads(&app, status, &query).await
            }
        }
        Command::Detail { icodcli, asunto } => run_detail(&app, &icodcli, &asunto).await,
        Command::Mark {
            icodcli,
            asunto,
            status,
        } => run_mark(&app, &icodcli, &asunto, status.into()).await,
        Command::Report { scope, from, to } => {
            let options = ReportOptions {
                scope: ReportScope::from(scope),
                from,
                to,
            };
            run_report(&app, options).await
        }
        Command::Templates { page, limit } => run_templates(&app, page, limit).await,
    }
}

async fn run_login(app: &App, email: &str, password: &str) -> Result<i32> {
    let ttl = app.config.session.ttl().with_context(|| {
        format!(
            "session.ttl_hours must be a positive number of hours, got {}",
            app.config.session.ttl_hours
        )
    })?;
    let client = app.client()?;
    let user = app
        .with_spinner("Iniciando sesión...", client.login(email, password))
        .await?;

    let session = Session::new(user, Utc::now(), ttl);
    app.store
        .save(&session)
        .context("Failed to store the session")?;

    info!("Logged in as {} ({})", session.email, session.role);
    println!("✅ Sesión iniciada como {} ({})", session.email, session.role);
    Ok(0)
}

fn run_logout(app: &App) -> Result<i32> {
    app.store.clear().context("Failed to remove the session")?;
    debug!("Removed {}", app.store.path().display());
    println!("👋 Sesión cerrada.");
    Ok(0)
}

fn run_whoami(app: &App) -> Result<i32> {
    let session = app.session()?;
    println!("👤 {}", session.email);
    println!("   Rol: {}", session.role);
    println!(
        "   Caduca: {}",
        session
            .expires_at
            .with_timezone(&Local)
            .format("%d/%m/%Y %H:%M")
    );
    Ok(0)
}

fn leads_title(status: LeadStatus) -> String {
    format!("Leads: {}", status.label())
}

async fn run_leads(app: &App, status: LeadStatus, query: &TableQuery) -> Result<i32> {
    app.session()?;
    let client = app.client()?;

    let events = app
        .with_spinner("Cargando eventos...", client.get_events(status))
        .await?;

    emit_lead_page(app, &events, query, &leads_title(status))?;
    Ok(0)
}

fn emit_lead_page(app: &App, events: &[Event], query: &TableQuery, title: &str) -> Result<()> {
    let page = table::query_leads(events, &Local, query);
    app.emit_table(&page.to_table(title))?;

    // Status lines go to stderr so piped output stays parseable.
    if !app.quiet {
        eprintln!(
            "Página {} de {} · {} de {} leads",
            page.page, page.total_pages, page.matched, page.total
        );
    }
    Ok(())
}

fn emit_lead_state(
    app: &App,
    state: &DataState<Vec<Event>>,
    query: &TableQuery,
    title: &str,
) -> Result<()> {
    if let Some(message) = state.error() {
        warn!("Refresh failed, showing previous data");
        eprintln!("⚠️  {}", message);
    }

    match state.data() {
        Some(events) => emit_lead_page(app, events, query, title),
        None => {
            eprintln!("Sin datos todavía.");
            Ok(())
        }
    }
}

/// Keep the lead table fresh until Ctrl-C.
async fn run_watch(
    app: &App,
    status: LeadStatus,
    query: TableQuery,
    period: Duration,
) -> Result<i32> {
    app.session()?;
    let client = Arc::new(app.client()?);
    let state = Arc::new(Mutex::new(Freshness::new()));
    let title = leads_title(status);

    let (tx, mut rx) = mpsc::channel::<()>(1);
    let poller = {
        let client = client.clone();
        let state = state.clone();
        Poller::spawn(period, move || {
            let client = client.clone();
            let state = state.clone();
            let tx = tx.clone();
            async move {
                if refresh_events(&state, client.as_ref(), &[status]).await {
                    // A pending notification already covers this refresh.
                    let _ = tx.try_send(());
                }
            }
        })
    };

    let Some(poller) = poller else {
        // Polling disabled: a single refresh.
        refresh_events(&state, client.as_ref(), &[status]).await;
        let guard = state.lock().await;
        emit_lead_state(app, guard.state(), &query, &title)?;
        return Ok(0);
    };

    if !app.quiet {
        eprintln!(
            "🔄 Actualizando cada {}s. Pulsa Ctrl-C para salir.",
            period.as_secs()
        );
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Watch stopped");
                break;
            }
            Some(()) = rx.recv() => {
                let guard = state.lock().await;
                emit_lead_state(app, guard.state(), &query, &title)?;
            }
        }
    }

    poller.stop();
    Ok(0)
}

async fn run_detail(app: &App, icodcli: &str, asunto: &str) -> Result<i32> {
    app.session()?;
    let client = app.client()?;

    let events = app
        .with_spinner(
            "Cargando detalle...",
            client.get_events_by_codcli(icodcli, asunto),
        )
        .await?;

    let detail = table::detail_table(events, &Local, icodcli, asunto);
    app.emit_table(&detail)?;
    Ok(0)
}

async fn run_mark(app: &App, icodcli: &str, asunto: &str, status: LeadStatus) -> Result<i32> {
    app.session()?;
    let client = app.client()?;

    app.with_spinner(
        "Actualizando estado...",
        client.update_event(icodcli, status, asunto),
    )
    .await?;

    println!(
        "✅ {} / {} marcado como {}",
        icodcli,
        asunto,
        status.label().to_lowercase()
    );
    Ok(0)
}

async fn run_report(app: &App, options: ReportOptions) -> Result<i32> {
    app.report_session()?;
    let client = app.client()?;

    let events = app
        .with_spinner(
            "Cargando eventos...",
            fetch_statuses(&client, options.scope.statuses()),
        )
        .await?;

    let today = Local::now().date_naive();
    let report = analysis::build_report(&events, options, &Local, today);
    info!(
        "Report over {} of {} events ({} undated)",
        report.metadata.events_included,
        report.metadata.events_fetched,
        report.metadata.events_undated
    );
    for table in &report.tables {
        debug!("{}: {} leads", table.title, table.grand_total());
    }

    let rendered = report::render_report(&report, app.format)?;
    app.emit(&rendered)?;
    Ok(0)
}

async fn run_templates(app: &App, page: Option<u32>, limit: Option<u32>) -> Result<i32> {
    app.report_session()?;
    let client = app.client()?;

    let page = page.unwrap_or(app.config.api.templates_page);
    let limit = limit.unwrap_or(app.config.api.templates_limit);
    let templates = app
        .with_spinner("Cargando plantillas...", client.get_templates(page, limit))
        .await?;

    app.emit_table(&table::templates_table(templates, &Local))?;
    Ok(0)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
