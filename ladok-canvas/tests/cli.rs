use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::write;
use tempfile::{tempdir, NamedTempFile};

use ladok_canvas::cli::{run, Cli, Commands};
use ladok_canvas_core::ladok::ParticipantStatus;
use ladok_canvas_core::report::{Report, ReportRow};

#[test]
fn help_lists_the_subcommands() {
    let mut cmd = Command::cargo_bin("ladok-canvas").expect("Binary exists");
    cmd.arg("--help");
    cmd.assert().success().stdout(
        predicate::str::contains("course-programs")
            .and(predicate::str::contains("instance-programs"))
            .and(predicate::str::contains("missing-integration-ids"))
            .and(predicate::str::contains("set-grade")),
    );
}

#[test]
fn missing_config_file_fails_with_a_hint() {
    let dir = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("ladok-canvas").expect("Binary exists");
    cmd.current_dir(dir.path())
        .env_remove("RUST_LOG")
        .args(["missing-integration-ids", "12345"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config file"));
}

#[test]
fn unknown_status_is_rejected_by_the_parser() {
    let config = NamedTempFile::new().unwrap();
    write(
        config.path(),
        r#"{"canvas": {"host": "canvas.kth.se", "access_token": "t"}, "ladok": {"username": "u", "password": "p"}}"#,
    )
    .unwrap();
    let mut cmd = Command::cargo_bin("ladok-canvas").expect("Binary exists");
    cmd.arg("--config")
        .arg(config.path())
        .args(["instance-programs", "II2202", "50287", "--status", "ongoing,graduated"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("unknown status"));
}

#[test]
fn status_filter_defaults_to_every_state() {
    use clap::Parser;
    let cli = Cli::try_parse_from(["ladok-canvas", "-T", "instance-programs", "II2202", "50287", "-p"]).unwrap();
    assert!(cli.test_environment);
    match cli.command {
        Commands::InstancePrograms {
            statuses,
            person_numbers,
            instance_code,
            ..
        } => {
            assert_eq!(statuses, ParticipantStatus::ALL.to_vec());
            assert!(person_numbers);
            assert_eq!(instance_code.as_deref(), Some("50287"));
        }
        other => panic!("unexpected command {other:?}"),
    }

    let cli = Cli::try_parse_from([
        "ladok-canvas",
        "instance-programs",
        "II2202",
        "--status",
        "registered,completed",
    ])
    .unwrap();
    let Commands::InstancePrograms { statuses, .. } = cli.command else {
        panic!("expected instance-programs");
    };
    assert_eq!(statuses, vec![ParticipantStatus::Registered, ParticipantStatus::Finished]);
}

#[test]
fn spreadsheet_columns_are_the_union_in_first_seen_order() {
    let mut first = ReportRow::new();
    first.set("canvas_user_id", 11u64);
    first.set("program_code", "TCOMK");
    let mut second = ReportRow::new();
    second.set("canvas_user_id", 12u64);
    second.set("ladok_id", "uid-b");
    second.set("program_code", "CINTE");
    second.set("program_code_1", "TIDAB");

    let columns = ladok_canvas::spreadsheet::header(&[first.clone(), second.clone()]);
    assert_eq!(columns, ["canvas_user_id", "program_code", "ladok_id", "program_code_1"]);

    let dir = tempdir().unwrap();
    let report = Report {
        name: "users_programs-50287".into(),
        sheet: "users_programs".into(),
        rows: vec![first, second],
    };
    let path = ladok_canvas::spreadsheet::write_report(&report, dir.path()).unwrap();
    assert_eq!(path, dir.path().join("users_programs-50287.xlsx"));
    assert!(std::fs::metadata(&path).unwrap().len() > 0);
}

#[test]
fn ids_beyond_double_precision_are_written_as_text() {
    use ladok_canvas::spreadsheet::exact_number;
    assert_eq!(exact_number(113_330_000), Some(113_330_000.0));
    assert_eq!(exact_number(-(1 << 53)), Some(-9_007_199_254_740_992.0));
    assert_eq!(exact_number((1 << 53) + 1), None);
    assert_eq!(exact_number(i64::MIN), None);

    let mut row = ReportRow::new();
    row.set("canvas_user_id", 113_330_000_000_012_345u64);
    let dir = tempdir().unwrap();
    let report = Report {
        name: "users_programs-global".into(),
        sheet: "users_programs".into(),
        rows: vec![row],
    };
    let path = ladok_canvas::spreadsheet::write_report(&report, dir.path()).unwrap();
    assert!(path.exists());
}

use std::sync::{Arc, Mutex};
use tracing_subscriber::prelude::*; // needed for .with()
use tracing_subscriber::{layer::Context, Layer, Registry};

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        use std::fmt::Write as FmtWrite;
        let mut msg = String::new();
        let _ = write!(&mut msg, "{:?}", event);
        self.events.lock().unwrap().push(msg);
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    // The config path does not exist, so run stops right after startup.
    let cli = Cli {
        verbose: false,
        config: std::path::PathBuf::from("dummy.json"),
        containers: false,
        test_environment: false,
        output_dir: std::path::PathBuf::from("."),
        timeout: 5,
        command: Commands::Results {
            person_number: "19461212-1212".into(),
            course_code: "DD1321".into(),
        },
    };

    let result = run(cli).await;
    assert!(result.is_err());

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
