//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::{LeadStatus, ReportScope};
use crate::table::{SortColumn, SortDirection};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Leadboard - lead management dashboard client
///
/// Browse pending and resolved leads, mark them as handled, and build
/// aggregate reports by day, collective, source and hour.
///
/// Examples:
///   leadboard login --email ana@empresa.es
///   leadboard leads --status pendiente --search "clínica" --sort fecha --desc
///   leadboard leads --watch --interval 30
///   leadboard mark --icodcli C10021 --asunto "Visto el vídeo" --status gestionado
///   leadboard --format csv --output informe.csv report --scope totales
///   leadboard --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Backend base URL
    ///
    /// Overrides the value in .leadboard.toml.
    #[arg(long, value_name = "URL", env = "LEADBOARD_API_URL")]
    pub base_url: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .leadboard.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Session file to use instead of the configured one
    #[arg(long, value_name = "FILE")]
    pub session_file: Option<PathBuf>,

    /// Output format for tables (markdown, json, csv)
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Write output to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .leadboard.toml configuration file
    #[arg(long)]
    pub init_config: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Dashboard screens, one per subcommand.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Log in and store a session
    Login {
        /// Account email
        #[arg(long)]
        email: String,

        /// Account password
        #[arg(long, env = "LEADBOARD_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Remove the stored session
    Logout,

    /// Show the logged-in user
    Whoami,

    /// List leads in a searchable, sortable, paginated table
    Leads {
        /// Lead list to show
        #[arg(long, default_value = "pendiente")]
        status: StatusArg,

        /// Case- and accent-insensitive text filter over all columns
        #[arg(long)]
        search: Option<String>,

        /// Column to sort by
        #[arg(long)]
        sort: Option<SortArg>,

        /// Sort descending instead of ascending
        #[arg(long, requires = "sort")]
        desc: bool,

        /// Page to show (1-based)
        #[arg(long, default_value = "1")]
        page: usize,

        /// Rows per page
        #[arg(long)]
        page_size: Option<usize>,

        /// Keep refreshing the table until interrupted
        #[arg(long)]
        watch: bool,

        /// Seconds between refreshes in watch mode
        #[arg(long, requires = "watch")]
        interval: Option<u64>,
    },

    /// Show every event of one client and subject, newest first
    Detail {
        #[arg(long)]
        icodcli: String,

        #[arg(long)]
        asunto: String,
    },

    /// Change the status of a lead
    Mark {
        #[arg(long)]
        icodcli: String,

        #[arg(long)]
        asunto: String,

        /// New status (resuelto is accepted as an alias of gestionado)
        #[arg(long)]
        status: StatusArg,
    },

    /// Aggregate report: by day and collective, by day and source, by hour today
    Report {
        /// Lead list the report is built from
        #[arg(long, default_value = "pendiente")]
        scope: ScopeArg,

        /// First day to include (YYYY-MM-DD)
        #[arg(long, value_name = "DATE", requires = "to")]
        from: Option<NaiveDate>,

        /// Last day to include (YYYY-MM-DD)
        #[arg(long, value_name = "DATE", requires = "from")]
        to: Option<NaiveDate>,
    },

    /// Email templates with their click counts, newest first
    Templates {
        #[arg(long)]
        page: Option<u32>,

        #[arg(long)]
        limit: Option<u32>,
    },
}

/// Output format for tables and reports.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
    /// CSV format
    Csv,
}

/// Lead status as written on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StatusArg {
    Pendiente,
    #[value(alias = "resuelto")]
    Gestionado,
}

impl From<StatusArg> for LeadStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Pendiente => LeadStatus::Pending,
            StatusArg::Gestionado => LeadStatus::Resolved,
        }
    }
}

/// Report scope as written on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ScopeArg {
    Pendiente,
    #[value(alias = "resuelto")]
    Gestionado,
    Totales,
}

impl From<ScopeArg> for ReportScope {
    fn from(arg: ScopeArg) -> Self {
        match arg {
            ScopeArg::Pendiente => ReportScope::Pending,
            ScopeArg::Gestionado => ReportScope::Resolved,
            ScopeArg::Totales => ReportScope::All,
        }
    }
}

/// Sortable lead table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SortArg {
    Fecha,
    Correo,
    Icodcli,
    Colectivo,
    Asunto,
    Fuente,
    Seccion,
    Estado,
}

impl From<SortArg> for SortColumn {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Fecha => SortColumn::Date,
            SortArg::Correo => SortColumn::Email,
            SortArg::Icodcli => SortColumn::ClientCode,
            SortArg::Colectivo => SortColumn::Collective,
            SortArg::Asunto => SortColumn::Subject,
            SortArg::Fuente => SortColumn::Source,
            SortArg::Seccion => SortColumn::Section,
            SortArg::Estado => SortColumn::Status,
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.command.is_none() {
            return Err("A command is required (try --help)".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref url) = self.base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Base URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        match &self.command {
            Some(Command::Login { email, password }) => {
                if email.trim().is_empty() || password.is_empty() {
                    return Err("Email and password are required".to_string());
                }
            }
            Some(Command::Leads {
                page,
                page_size,
                interval,
                ..
            }) => {
                if *page == 0 {
                    return Err("Page numbers start at 1".to_string());
                }
                if *page_size == Some(0) {
                    return Err("Page size must be at least 1".to_string());
                }
                if *interval == Some(0) {
                    return Err("Refresh interval must be at least 1 second".to_string());
                }
            }
            Some(Command::Detail { icodcli, asunto }) | Some(Command::Mark { icodcli, asunto, .. }) => {
                if icodcli.trim().is_empty() || asunto.trim().is_empty() {
                    return Err("Both --icodcli and --asunto are required".to_string());
                }
            }
            Some(Command::Report {
                from: Some(from),
                to: Some(to),
                ..
            }) => {
                if from > to {
                    return Err("--from must not be after --to".to_string());
                }
            }
            Some(Command::Templates { page, limit }) => {
                if *page == Some(0) || *limit == Some(0) {
                    return Err("Template page and limit must be at least 1".to_string());
                }
            }
            _ => {}
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

impl From<bool> for SortDirection {
    fn from(descending: bool) -> Self {
        if descending {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        }
    }
}
