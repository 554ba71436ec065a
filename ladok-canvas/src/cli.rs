///
/// This module implements the CLI interface for ladok-canvas: command parsing,
/// argument validation and the async entrypoint.
///
/// All client logic (handshake, pagination, normalization, report drivers) lives in the
/// [`ladok-canvas-core`] crate. This module only wires configuration, clients and output.
///
/// ## How To Use
/// - For command-line users: use the installed `ladok-canvas` binary with `--help`.
/// - For programmatic/integration use: call [`run`] with a constructed [`Cli`].
///
/// ## Session handling
/// Every subcommand except `missing-integration-ids` runs inside [`with_session`]: sign in,
/// compute the outcome, log out, return the outcome. A failing logout is logged and never
/// replaces the command's own error. `missing-integration-ids` goes straight to Canvas.
///
/// [`ladok-canvas-core`]: ../../ladok-canvas-core/
use crate::load_config::{ladok_password, load_config};
use crate::spreadsheet::write_report;
use anyhow::Result;
use clap::{Parser, Subcommand};
use ladok_canvas_core::canvas::CanvasClient;
use ladok_canvas_core::config::{canvas_base_url, LadokEndpoints, LadokEnvironment};
use ladok_canvas_core::contract::HttpTransport;
use ladok_canvas_core::ladok::{GradeSubmission, LadokSession, ParticipantStatus, SaveOutcome};
use ladok_canvas_core::report::{self, InstanceOptions, ParticipantSource, PersonRef, Report};
use ladok_canvas_core::transport::ReqwestTransport;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// CLI for ladok-canvas: spreadsheet reports joining Canvas and Ladok.
#[derive(Parser, Debug)]
#[clap(
    name = "ladok-canvas",
    version,
    about = "Cross-reference Canvas course rosters with Ladok programs and grades"
)]
pub struct Cli {
    /// Log debug output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Path to the JSON config file
    #[clap(long, default_value = "config.json", global = true)]
    pub config: PathBuf,

    /// Use plain HTTP to Canvas, for the container environment
    #[clap(short = 'C', long, global = true)]
    pub containers: bool,

    /// Sign in to the Ladok test environment
    #[clap(short = 'T', long = "test-environment", global = true)]
    pub test_environment: bool,

    /// Directory spreadsheets are written to
    #[clap(long, default_value = ".", global = true)]
    pub output_dir: PathBuf,

    /// Request timeout in seconds
    #[clap(long, default_value_t = 60, global = true)]
    pub timeout: u64,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Students of a Canvas course with their Ladok programs
    CoursePrograms {
        /// Canvas course id, course code or (part of) the course name
        course: String,
    },
    /// Participants of a Ladok course round with Canvas ids and programs
    InstancePrograms {
        /// Ladok course code, or a Canvas course when no instance code is given
        course: String,
        /// Instance code (KOPPS tillfälleskod) of the course round
        instance_code: Option<String>,
        /// Include person numbers
        #[clap(short = 'p', long)]
        person_numbers: bool,
        /// Participant states to include
        #[clap(
            long = "status",
            value_delimiter = ',',
            value_parser = parse_status,
            default_value = "not_started,ongoing,registered,finished,cancelled"
        )]
        statuses: Vec<ParticipantStatus>,
    },
    /// Students of a Canvas course that have no integration id
    MissingIntegrationIds {
        /// Canvas course id, course code or (part of) the course name
        course: String,
    },
    /// Canvas and Ladok details and programs of one person
    UserInfo {
        /// Canvas user id, profile URL, Ladok UID, e-mail, person number or SIS user id
        person: String,
        /// Course the user is enrolled in, used to find the integration id
        course: Option<String>,
        /// Show every program, not only current ones
        #[clap(long)]
        all: bool,
    },
    /// Write a grade draft to Ladok
    SetGrade {
        person_number: String,
        course_code: String,
        /// Component code, or the course code for the final grade
        component: String,
        grade: String,
        date: String,
        /// Grade scale code, e.g. AF or PF
        scale: String,
    },
    /// Attested and pending results of a student in a course
    Results {
        person_number: String,
        course_code: String,
    },
}

fn parse_status(s: &str) -> std::result::Result<ParticipantStatus, String> {
    ParticipantStatus::parse(s).ok_or_else(|| {
        format!("unknown status {s:?}; expected not_started, ongoing, registered, finished or cancelled")
    })
}

impl Cli {
    pub fn ladok_environment(&self) -> LadokEnvironment {
        if self.test_environment {
            LadokEnvironment::Test
        } else {
            LadokEnvironment::Production
        }
    }
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    let config = load_config(&cli.config)?;
    let timeout = Duration::from_secs(cli.timeout);
    let canvas = CanvasClient::new(
        ReqwestTransport::new(timeout)?,
        canvas_base_url(&config.canvas.host, cli.containers),
        config.canvas.access_token.clone(),
    );

    if let Commands::MissingIntegrationIds { course } = &cli.command {
        return missing_integration_ids(&canvas, course, &cli.output_dir).await;
    }

    let password = ladok_password(&config)?;
    let endpoints = LadokEndpoints::kth(cli.ladok_environment());
    let mut ladok = LadokSession::new(ReqwestTransport::new(timeout)?, endpoints);
    let outcome = with_session(&cli, &canvas, &mut ladok, &config.ladok.username, &password).await;
    match &outcome {
        Ok(()) => tracing::info!("Command complete"),
        Err(e) => tracing::error!(error = %e, "Command failed"),
    }
    outcome
}

/// Sign in, run the subcommand, then log out whatever the outcome.
///
/// A failing logout is logged; the subcommand's own result is returned.
pub async fn with_session<C, L>(
    cli: &Cli,
    canvas: &CanvasClient<C>,
    ladok: &mut LadokSession<L>,
    username: &str,
    password: &str,
) -> Result<()>
where
    C: HttpTransport,
    L: HttpTransport,
{
    ladok.sign_in(username, password).await?;
    let outcome = execute(cli, canvas, ladok).await;
    if let Err(e) = ladok.logout().await {
        tracing::warn!(error = %e, "Ladok logout failed");
    }
    outcome
}

/// The one report that needs no Ladok session.
async fn missing_integration_ids<C>(canvas: &CanvasClient<C>, course: &str, dir: &Path) -> Result<()>
where
    C: HttpTransport,
{
    tracing::info!(command = "missing-integration-ids", course = %course, "Starting report");
    let course_id = canvas.resolve_course_id(course).await?;
    let report = report::missing_integration_ids(canvas, course_id).await?;
    save(&report, dir)
}

/// Run a subcommand against signed-in clients.
///
/// `missing-integration-ids` ignores `ladok`.
pub async fn execute<C, L>(cli: &Cli, canvas: &CanvasClient<C>, ladok: &LadokSession<L>) -> Result<()>
where
    C: HttpTransport,
    L: HttpTransport,
{
    let today = chrono::Local::now().date_naive();
    match &cli.command {
        Commands::CoursePrograms { course } => {
            tracing::info!(command = "course-programs", course = %course, "Starting report");
            let course_id = canvas.resolve_course_id(course).await?;
            let report = report::course_programs(canvas, ladok, course_id, today).await?;
            save(&report, &cli.output_dir)
        }
        Commands::InstancePrograms {
            course,
            instance_code,
            person_numbers,
            statuses,
        } => {
            tracing::info!(command = "instance-programs", course = %course, "Starting report");
            let source = match instance_code {
                Some(instance_code) => ParticipantSource::Ladok {
                    course_code: course.clone(),
                    instance_code: instance_code.clone(),
                },
                None => ParticipantSource::Canvas {
                    course_id: canvas.resolve_course_id(course).await?,
                },
            };
            let options = InstanceOptions {
                statuses,
                include_person_numbers: *person_numbers,
                today,
            };
            let report = report::instance_programs(canvas, ladok, &source, options).await?;
            save(&report, &cli.output_dir)
        }
        Commands::MissingIntegrationIds { course } => {
            missing_integration_ids(canvas, course, &cli.output_dir).await
        }
        Commands::UserInfo { person, course, all } => {
            let person = PersonRef::parse(person);
            tracing::info!(command = "user-info", ?person, "Looking up person");
            let row = report::user_info(canvas, ladok, &person, course.as_deref(), *all, today).await?;
            for (column, value) in row.cells() {
                println!("{column}: {value}");
            }
            Ok(())
        }
        Commands::SetGrade {
            person_number,
            course_code,
            component,
            grade,
            date,
            scale,
        } => {
            let outcome = ladok
                .save_result(GradeSubmission {
                    person_number,
                    course_code,
                    component,
                    grade,
                    date,
                    grade_scale: scale,
                })
                .await?;
            match outcome {
                SaveOutcome::Updated => println!("Updated draft {course_code} {component}: {grade}"),
                SaveOutcome::Created => println!("Created draft {course_code} {component}: {grade}"),
            }
            Ok(())
        }
        Commands::Results {
            person_number,
            course_code,
        } => {
            let results = ladok.results(person_number, course_code).await?;
            if results.is_empty() {
                println!("No results for {course_code}");
            }
            for (component, result) in &results {
                println!("{component}: {} {} {}", result.grade, result.status, result.date);
            }
            Ok(())
        }
    }
}

fn save(report: &Report, dir: &Path) -> Result<()> {
    let path = write_report(report, dir)?;
    println!("Wrote {} rows to {}", report.rows.len(), path.display());
    Ok(())
}
