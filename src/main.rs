mod api;
mod auth;
mod config;
mod debounce;
mod detail;
mod error;
mod fetch;
mod listing;
mod models;
mod profile;
mod router;
mod storage;
#[cfg(test)]
mod test_support;
mod tui;

use anyhow::{anyhow, bail, Context, Result};
use api::{HttpJobsApi, JobsApi};
use auth::AuthStore;
use clap::{Parser, Subcommand};
use config::Config;
use detail::JobDetailModel;
use fetch::ResourceState;
use listing::{JobListing, ListingState};
use models::{html_to_text, EmploymentType, JobDetailPage, JobSummary, SalaryRange};
use profile::ProfileModel;
use router::{resolve, Resolution, Route};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use storage::{Storage, TOKEN_KEY};
use tracing_subscriber::EnvFilter;

const NOT_LOGGED_IN: &str = "Not logged in. Run 'jobby login' first.";

#[derive(Parser)]
#[command(name = "jobby")]
#[command(about = "Browse a job board from the terminal")]
struct Cli {
    /// API base URL (overrides JOBBY_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Directory for the session database and log file (overrides JOBBY_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and remember the session
    Login {
        /// Account username
        #[arg(short, long)]
        username: String,

        /// Account password (falls back to JOBBY_PASSWORD)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Forget the stored session
    Logout,

    /// Show whether a session is stored
    Status,

    /// List jobs
    Jobs {
        /// Employment type filter, repeatable (FULLTIME, PARTTIME, FREELANCE, INTERNSHIP)
        #[arg(short = 't', long = "type")]
        employment_types: Vec<String>,

        /// Minimum package (1000000, 2000000, 3000000, 4000000)
        #[arg(short, long)]
        min_package: Option<String>,

        /// Search term
        #[arg(short, long)]
        search: Option<String>,

        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },

    /// Show job details and similar jobs
    Show {
        /// Job ID
        id: String,

        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the logged-in user's profile
    Profile,

    /// Open the interactive browser
    Browse {
        /// Path to start at
        #[arg(default_value = "/jobs")]
        path: String,
    },
}

fn build_config(cli: &Cli) -> Config {
    let mut config = Config::from_env();
    if let Some(url) = &cli.api_url {
        config = config.with_api_url(url);
    }
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    config
}

/// One-shot commands log warnings to stderr; the TUI owns the terminal so
/// it logs to a file in the data directory instead.
fn init_logging(config: &Config, to_file: bool) -> Result<()> {
    let default_level = if to_file { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if to_file {
        std::fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("Failed to create {}", config.data_dir.display()))?;
        let path = config.log_path();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }
    Ok(())
}

/// Falls back to a throwaway in-memory store so a broken data directory
/// means "logged out" rather than a hard failure.
fn open_storage(config: &Config) -> Result<Storage> {
    let path = config.db_path();
    match Storage::open(&path) {
        Ok(storage) => Ok(storage),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Session storage unavailable, continuing without it");
            Storage::open_in_memory().context("Failed to open in-memory session storage")
        }
    }
}

/// Check the route guard for a protected command.
fn require_session(auth: &AuthStore, route: Route) -> Result<()> {
    match resolve(route, &auth.session()) {
        Resolution::Render(_) => Ok(()),
        Resolution::Redirect(_) => Err(anyhow!(NOT_LOGGED_IN)),
        Resolution::Loading => Err(anyhow!("Session is still being restored")),
    }
}

/// Exchange credentials for a token and store it. A refused login
/// surfaces the server's message as the error.
async fn log_in(api: &dyn JobsApi, auth: &AuthStore, username: &str, password: &str) -> Result<Route> {
    let token = api.login(username, password).await?;
    Ok(auth.login(&token))
}

fn command_for(route: &Route) -> &'static str {
    match route {
        Route::Jobs | Route::JobDetail(_) => "jobby jobs",
        Route::Login => "jobby login",
        Route::Home | Route::NotFound => "jobby browse",
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = build_config(&cli);
    let interactive = matches!(cli.command, Commands::Browse { .. });
    init_logging(&config, interactive)?;
    tracing::debug!(api_url = %config.api_url, data_dir = %config.data_dir.display(), "Loaded config");

    let storage = open_storage(&config)?;
    let stored_at = match &cli.command {
        Commands::Status => storage.updated_at(TOKEN_KEY).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Could not read session timestamp");
            None
        }),
        _ => None,
    };
    let storage_path = storage.path().map(|p| p.to_path_buf());

    let auth = AuthStore::new(Box::new(storage));
    let api: Arc<dyn JobsApi> = Arc::new(HttpJobsApi::new(&config)?);

    if !interactive {
        // the browser restores the session itself after its first frame
        auth.initialize();
    }

    match cli.command {
        Commands::Login { username, password } => {
            let password = match password.or_else(|| std::env::var("JOBBY_PASSWORD").ok()) {
                Some(password) => password,
                None => bail!("No password given. Pass --password or set JOBBY_PASSWORD."),
            };
            let next = log_in(api.as_ref(), &auth, &username, &password).await?;
            println!("Logged in as {}. Run '{}' to browse listings.", username, command_for(&next));
        }

        Commands::Logout => {
            let next = auth.logout();
            println!("Logged out. Run '{}' to sign in again.", command_for(&next));
        }

        Commands::Status => {
            match auth.current_token() {
                Some(_) => {
                    println!("Logged in.");
                    if let Some(at) = stored_at {
                        println!("Session saved: {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
                    }
                }
                None => println!("Not logged in."),
            }
            if let Some(path) = storage_path {
                println!("Storage: {}", path.display());
            }
            println!("API: {}", config.api_url);
        }

        Commands::Jobs {
            employment_types,
            min_package,
            search,
            json,
        } => {
            require_session(&auth, Route::Jobs)?;
            let mut listing = JobListing::new(Arc::clone(&api), auth.subscribe(), config.debounce);

            for id in &employment_types {
                if !listing.query_mut().toggle_employment_type(id) {
                    let known: Vec<&str> = EmploymentType::ALL.iter().map(|t| t.id()).collect();
                    bail!("Unknown employment type '{}'. Expected one of: {}", id, known.join(", "));
                }
            }
            if let Some(min) = &min_package {
                let Some(range) = SalaryRange::from_id(min) else {
                    let known: Vec<&str> = SalaryRange::ALL.iter().map(|r| r.id()).collect();
                    bail!("Unknown minimum package '{}'. Expected one of: {}", min, known.join(", "));
                };
                listing.query_mut().set_minimum_package(Some(range));
            }
            if let Some(term) = &search {
                listing.query_mut().set_search_term(term, std::time::Instant::now());
                listing.submit_search();
            }

            match listing.load().await {
                ListingState::Success(jobs) if json => {
                    println!("{}", serde_json::to_string_pretty(jobs)?);
                }
                ListingState::Success(jobs) if jobs.is_empty() => {
                    println!("No Jobs Found");
                    println!("We could not find any jobs. Try other filters.");
                }
                ListingState::Success(jobs) => print_jobs(jobs),
                ListingState::Failure(message) => {
                    bail!("Oops! Something Went Wrong. We cannot seem to fetch the jobs ({}). Please try again.", message);
                }
                ListingState::Idle | ListingState::Loading => {
                    bail!("Job listing did not finish loading");
                }
            }
        }

        Commands::Show { id, json } => {
            let route = Route::JobDetail(id.clone());
            require_session(&auth, route)?;
            let mut detail = JobDetailModel::new(Arc::clone(&api), auth.subscribe(), &id);

            match detail.load().await {
                ResourceState::Success(page) if json => {
                    println!("{}", serde_json::to_string_pretty(page)?);
                }
                ResourceState::Success(page) => print_detail(page),
                ResourceState::Failure(message) => {
                    bail!(
                        "Oops! Something Went Wrong. We cannot seem to find the page you are looking for ({}). Run 'jobby jobs' to go back.",
                        message
                    );
                }
                ResourceState::Loading => bail!("Job details did not finish loading"),
            }
        }

        Commands::Profile => {
            require_session(&auth, Route::Jobs)?;
            let mut profile = ProfileModel::new(Arc::clone(&api), auth.subscribe());

            match profile.load().await {
                ResourceState::Success(profile) => {
                    println!("{}", profile.name);
                    println!("{}", profile.short_bio);
                    if let Some(url) = &profile.profile_image_url {
                        println!("Image: {}", url);
                    }
                }
                ResourceState::Failure(message) => bail!("Could not load profile: {}", message),
                ResourceState::Loading => bail!("Profile did not finish loading"),
            }
        }

        Commands::Browse { path } => {
            let start = Route::parse(&path);
            let debounce = config.debounce;
            tokio::task::block_in_place(|| tui::run_browse(api, auth, debounce, start))?;
        }
    }

    Ok(())
}

// --- Output ---

fn print_jobs(jobs: &[JobSummary]) {
    println!(
        "{:<36} {:<30} {:<12} {:<14} {:<10} {:>6}",
        "ID", "TITLE", "TYPE", "LOCATION", "PACKAGE", "RATING"
    );
    println!("{}", "-".repeat(113));
    for job in jobs {
        println!(
            "{:<36} {:<30} {:<12} {:<14} {:<10} {:>6}",
            job.id,
            truncate(&job.title, 30),
            truncate(&job.employment_type, 12),
            truncate(&job.location, 14),
            truncate(&job.package_per_annum, 10),
            job.rating.map(|r| r.to_string()).unwrap_or_else(|| "-".to_string()),
        );
    }
}

fn print_detail(page: &JobDetailPage) {
    let job = &page.job;
    let summary = &job.summary;

    println!("{}", summary.title);
    if let Some(rating) = summary.rating {
        println!("Rating: {}", rating);
    }
    println!("Location: {}", summary.location);
    println!("Type: {}", summary.employment_type);
    println!("Package: {}", summary.package_per_annum);
    if let Some(link) = &job.apply_link {
        println!("Apply: {}", link);
    }

    println!("\n--- Description ---\n{}", textwrap::fill(&summary.description_text(), 80));

    if !summary.skills.is_empty() {
        let names: Vec<&str> = summary.skills.iter().map(|s| s.name.as_str()).collect();
        println!("\n--- Skills ---\n{}", textwrap::fill(&names.join(", "), 80));
    }

    println!(
        "\n--- Life at Company ---\n{}",
        textwrap::fill(&html_to_text(&job.life_at_company.description), 80)
    );

    println!("\n--- Similar Jobs ({}) ---", page.similar_jobs.len());
    for similar in &page.similar_jobs {
        println!(
            "  {} - {} ({}, {})",
            similar.id, similar.title, similar.location, similar.employment_type
        );
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
