use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use rollcall_core::onnx::{model_paths, OnnxEmbedder};
use rollcall_core::{FaceImage, FaceMatcher, Rejection};
use rollcall_engine::{
    CheckInPipeline, CheckInRequest, Config, DashboardReader, EngineError, IdentityStore, Registration,
};
use rollcall_store::{Database, DateRange, DescriptorDir};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rollcall", version, about = "Face-verified lecture attendance")]
struct Cli {
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Credentials {
    /// Student identifier, or the email given at registration
    #[arg(short, long)]
    student: String,
    #[arg(short, long, env = "ROLLCALL_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new student with a reference face
    Register {
        #[command(flatten)]
        credentials: Credentials,
        /// Display name
        #[arg(short, long)]
        name: String,
        /// Email address, usable in place of the identifier to log in
        #[arg(short, long)]
        email: Option<String>,
        /// Photo containing exactly one face (JPEG/PNG)
        #[arg(short, long)]
        image: PathBuf,
    },
    /// Replace a student's reference face
    Reenroll {
        #[command(flatten)]
        credentials: Credentials,
        #[arg(short, long)]
        image: PathBuf,
    },
    /// Check credentials without recording anything
    Login {
        #[command(flatten)]
        credentials: Credentials,
    },
    /// Check in to a lecture
    Checkin {
        #[command(flatten)]
        credentials: Credentials,
        /// Lecture code, created on first use
        #[arg(short, long)]
        lecture: String,
        /// Title for a lecture that does not exist yet
        #[arg(long)]
        title: Option<String>,
        #[arg(short, long)]
        image: PathBuf,
    },
    /// List lectures, newest first
    Lectures,
    /// Show attendance for a lecture
    Dashboard {
        #[arg(short, long)]
        lecture: String,
        /// First day to include (YYYY-MM-DD, UTC)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last day to include (YYYY-MM-DD, UTC)
        #[arg(long)]
        to: Option<NaiveDate>,
        /// Present students with names instead of raw records
        #[arg(long, conflicts_with = "summary")]
        roster: bool,
        /// Present count per day
        #[arg(long)]
        summary: bool,
    },
    /// Show configuration and database status
    Status,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let json = cli.json;

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<EngineError>().and_then(EngineError::rejection) {
            Some(rejection) => {
                report_rejection(rejection, json);
                ExitCode::from(2)
            }
            None => {
                eprintln!("error: {err:#}");
                ExitCode::FAILURE
            }
        },
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load().context("loading configuration")?;
    tracing::debug!(db = %config.db_path.display(), "configuration loaded");
    let json = cli.json;

    match cli.command {
        Commands::Register { credentials, name, email, image } => {
            let db = open_db(&config)?;
            let face = open_image(&image)?;
            let mut embedder = load_embedder(&config)?;
            let form = Registration {
                student_id: &credentials.student,
                name: &name,
                email: email.as_deref(),
                password: &credentials.password,
            };
            let student = identity(&db, &config).register(&mut embedder, form, &face)?;
            emit(json, &student, || format!("registered {} ({})", student.student_id, student.name))
        }
        Commands::Reenroll { credentials, image } => {
            let db = open_db(&config)?;
            let face = open_image(&image)?;
            let mut embedder = load_embedder(&config)?;
            let student = identity(&db, &config).reenroll(
                &mut embedder,
                &credentials.student,
                &credentials.password,
                &face,
            )?;
            emit(json, &student, || format!("reference face updated for {}", student.student_id))
        }
        Commands::Login { credentials } => {
            let db = open_db(&config)?;
            let student = identity(&db, &config).authenticate(&credentials.student, &credentials.password)?;
            emit(json, &student, || format!("authenticated as {} ({})", student.student_id, student.name))
        }
        Commands::Checkin { credentials, lecture, title, image } => {
            let db = open_db(&config)?;
            let face = open_image(&image)?;
            let matcher = FaceMatcher::new(load_embedder(&config)?, config.match_policy());
            let mut pipeline =
                CheckInPipeline::new(identity(&db, &config), &db, matcher, config.check_in_policy());
            let req = CheckInRequest {
                student_id: &credentials.student,
                password: &credentials.password,
                lecture: &lecture,
                lecture_title: title.as_deref(),
            };
            let record = pipeline.check_in(&req, &face)?;
            emit(json, &record, || {
                format!(
                    "{} present at {} ({})",
                    record.student_id,
                    record.lecture_id,
                    record.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
                )
            })
        }
        Commands::Lectures => {
            let db = open_db(&config)?;
            let lectures = DashboardReader::new(&db).list_lectures()?;
            emit(json, &lectures, || {
                lectures
                    .iter()
                    .map(|l| format!("{}  {}  {}", l.created_on, l.code, l.title.as_deref().unwrap_or("-")))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }
        Commands::Dashboard { lecture, from, to, roster, summary } => {
            let db = open_db(&config)?;
            let dashboard = DashboardReader::new(&db);
            let range = (from.is_some() || to.is_some()).then_some(DateRange { from, to });

            if summary {
                let counts = dashboard.daily_summary(&lecture)?;
                emit(json, &counts, || {
                    counts
                        .iter()
                        .map(|c| format!("{}  {}", c.date, c.present))
                        .collect::<Vec<_>>()
                        .join("\n")
                })
            } else if roster {
                let entries = dashboard.roster(&lecture, range)?;
                emit(json, &entries, || {
                    entries
                        .iter()
                        .map(|e| format!("{}  {:<12} {}", e.timestamp.format("%Y-%m-%d %H:%M"), e.student_id, e.name))
                        .collect::<Vec<_>>()
                        .join("\n")
                })
            } else {
                let records = dashboard.list_attendance(&lecture, range)?;
                emit(json, &records, || {
                    records
                        .iter()
                        .map(|r| {
                            format!(
                                "{}  {:<12} {:<8} {}",
                                r.timestamp.format("%Y-%m-%d %H:%M:%S"),
                                r.student_id,
                                r.outcome.as_str(),
                                r.score.map(|s| format!("{s:.3}")).unwrap_or_default()
                            )
                        })
                        .collect::<Vec<_>>()
                        .join("\n")
                })
            }
        }
        Commands::Status => status(&config, json),
    }
}

fn open_db(config: &Config) -> Result<Database> {
    Database::open(&config.db_path)
        .with_context(|| format!("opening database {}", config.db_path.display()))
}

fn identity<'db>(db: &'db Database, config: &Config) -> IdentityStore<'db> {
    IdentityStore::new(db, DescriptorDir::new(config.descriptor_dir()), config.min_password_len)
}

fn open_image(path: &Path) -> Result<FaceImage> {
    FaceImage::open(path).with_context(|| format!("reading capture {}", path.display()))
}

fn load_embedder(config: &Config) -> Result<OnnxEmbedder> {
    OnnxEmbedder::load(&config.model_dir, config.min_face_confidence)
        .with_context(|| format!("loading face models from {}", config.model_dir.display()))
}

fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce() -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        let text = text();
        if !text.is_empty() {
            println!("{text}");
        }
    }
    Ok(())
}

fn report_rejection(rejection: &Rejection, json: bool) {
    if json {
        let body = serde_json::json!({ "status": "rejected", "code": rejection.code(), "detail": rejection });
        println!("{body}");
    } else {
        eprintln!("rejected: {rejection}");
    }
}

#[derive(Serialize)]
struct Status {
    version: &'static str,
    db_path: PathBuf,
    model_dir: PathBuf,
    models_present: bool,
    match_threshold: f32,
    distance_metric: String,
    duplicate_window: String,
    students: u64,
    lectures: usize,
}

fn status(config: &Config, json: bool) -> Result<()> {
    let db = open_db(config)?;
    let (detector, recognizer) = model_paths(&config.model_dir);
    let status = Status {
        version: env!("CARGO_PKG_VERSION"),
        db_path: config.db_path.clone(),
        model_dir: config.model_dir.clone(),
        models_present: detector.exists() && recognizer.exists(),
        match_threshold: config.match_threshold,
        distance_metric: config.distance_metric.to_string(),
        duplicate_window: config.duplicate_window.to_string(),
        students: db.student_count()?,
        lectures: db.list_lectures()?.len(),
    };

    emit(json, &status, || status.render())
}

impl Status {
    fn render(&self) -> String {
        format!(
            "rollcall {}\n  database:  {}\n  models:    {} ({})\n  threshold: {} ({})\n  window:    {}\n  students:  {}\n  lectures:  {}",
            self.version,
            self.db_path.display(),
            self.model_dir.display(),
            if self.models_present { "present" } else { "missing" },
            self.match_threshold,
            self.distance_metric,
            self.duplicate_window,
            self.students,
            self.lectures,
        )
    }
}
