//! Argument parsing, config layering and offline command runs.

use std::path::Path;

use clap::Parser;
use complaintbot_cli::chat::{ChatFlow, ChatSession};
use complaintbot_cli::{
    Cli, Command, GlobalArgs, OFFLINE_ANSWER, build_pipeline, commands, load_config,
};
use complaintbot_rag::{DistanceMetric, RagPipeline};
use complaintbot_telemetry::LogFormat;

const CSV: &str = "\
Product,Consumer complaint narrative,Complaint ID
Credit card,\"I was charged an annual fee that was never disclosed to me.\",11
Savings account,\"The bank froze my savings account without any notice.\",12
Money transfers,,13
";

fn global(dir: &Path) -> GlobalArgs {
    GlobalArgs {
        config: None,
        db_path: Some(dir.join("db")),
        collection: Some("test_complaints".into()),
        offline: true,
        log_format: LogFormat::Pretty,
        verbose: 0,
    }
}

async fn offline_pipeline(dir: &Path) -> RagPipeline {
    let config = load_config(&global(dir)).unwrap();
    build_pipeline(config, true).await.unwrap()
}

async fn indexed_pipeline(dir: &Path) -> RagPipeline {
    let csv = dir.join("complaints.csv");
    std::fs::write(&csv, CSV).unwrap();
    let pipeline = offline_pipeline(dir).await;
    commands::index(&pipeline, &csv, false, &mut Vec::new()).await.unwrap();
    pipeline
}

fn text(out: Vec<u8>) -> String {
    String::from_utf8(out).unwrap()
}

#[test]
fn parses_subcommands_and_global_flags() {
    let cli = Cli::try_parse_from([
        "complaintbot",
        "ask",
        "Why are customers unhappy with credit cards?",
        "-k",
        "2",
        "--offline",
        "--log-format",
        "json",
        "-vv",
    ])
    .unwrap();

    assert!(cli.global.offline);
    assert_eq!(cli.global.log_format, LogFormat::Json);
    assert_eq!(cli.global.telemetry_config().level, "debug");
    match cli.command {
        Command::Ask { question, k } => {
            assert_eq!(question, "Why are customers unhappy with credit cards?");
            assert_eq!(k, Some(2));
        }
        other => panic!("expected ask, got {other:?}"),
    }
}

#[test]
fn rejects_unknown_log_format() {
    assert!(Cli::try_parse_from(["complaintbot", "status", "--log-format", "xml"]).is_err());
}

#[test]
fn flags_override_the_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("complaintbot.yaml");
    let yaml = "db_path: /from/yaml\ncollection_name: from_yaml\ntop_k: 7\ndistance: l2\n";
    std::fs::write(&path, yaml).unwrap();

    let mut args = global(dir.path());
    args.config = Some(path);
    args.collection = None;
    let config = load_config(&args).unwrap();

    assert_eq!(config.db_path, dir.path().join("db"));
    assert_eq!(config.collection_name, "from_yaml");
    assert_eq!(config.top_k, 7);
    assert_eq!(config.distance, DistanceMetric::L2);
}

#[test]
fn missing_explicit_config_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut args = global(dir.path());
    args.config = Some(dir.path().join("absent.yaml"));
    let err = load_config(&args).unwrap_err();
    assert!(err.to_string().contains("absent.yaml"));
}

#[tokio::test]
async fn index_then_status_reports_the_collection() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("complaints.csv");
    std::fs::write(&csv, CSV).unwrap();
    let pipeline = offline_pipeline(dir.path()).await;

    let mut out = Vec::new();
    let report = commands::index(&pipeline, &csv, false, &mut out).await.unwrap();
    assert_eq!((report.records, report.added, report.total), (2, 2, 2));
    assert!(text(out).contains("2 added"));

    let mut out = Vec::new();
    let again = commands::index(&pipeline, &csv, false, &mut out).await.unwrap();
    assert_eq!((again.added, again.skipped), (0, 2));

    let mut out = Vec::new();
    let info = commands::status(&pipeline, &mut out).await.unwrap().unwrap();
    assert_eq!(info.count, 2);
    assert_eq!(info.dimensions, Some(384));
    let out = text(out);
    assert!(out.contains("Collection: test_complaints"));
    assert!(out.contains("Metric:     cosine"));
    assert!(out.contains("Documents:  2"));
}

#[tokio::test]
async fn rebuild_drops_previous_documents() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = indexed_pipeline(dir.path()).await;

    let single = dir.path().join("single.csv");
    let csv = "Product,Consumer complaint narrative,Complaint ID\nPersonal loan,late fees,99\n";
    std::fs::write(&single, csv).unwrap();
    let report = commands::index(&pipeline, &single, true, &mut Vec::new()).await.unwrap();
    assert_eq!((report.added, report.total), (1, 1));
}

#[tokio::test]
async fn status_without_collection_suggests_indexing() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = offline_pipeline(dir.path()).await;

    let mut out = Vec::new();
    assert!(commands::status(&pipeline, &mut out).await.unwrap().is_none());
    assert!(text(out).contains("run `complaintbot index`"));

    let err = commands::ask(&pipeline, "anything?", None, &mut Vec::new()).await.unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[tokio::test]
async fn query_prints_ranked_hits_with_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = indexed_pipeline(dir.path()).await;

    let mut out = Vec::new();
    let hits =
        commands::query(&pipeline, "savings account frozen", Some(1), &mut out).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "12_0");

    let out = text(out);
    assert!(out.starts_with("1. 12_0  distance="));
    assert!(out.contains("product=Savings account  complaint_id=12"));
    assert!(out.contains("the bank froze my savings account"));
}

#[tokio::test]
async fn ask_prints_answer_and_numbered_sources() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = indexed_pipeline(dir.path()).await;

    let mut out = Vec::new();
    let answer = commands::ask(&pipeline, "annual fee on my credit card", Some(2), &mut out)
        .await
        .unwrap();
    assert_eq!(answer.answer, OFFLINE_ANSWER);
    assert_eq!(answer.sources.len(), 2);

    let out = text(out);
    assert!(out.starts_with(OFFLINE_ANSWER));
    assert!(out.contains("Sources:\n[1] "));
    assert!(out.contains("[2] "));
}

#[test]
fn reads_questions_skipping_blanks_and_comments() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("questions.txt");
    let raw = "# product questions\nWhy are fees disputed?\n\n  What about transfers?  \n";
    std::fs::write(&path, raw).unwrap();
    assert_eq!(
        commands::read_questions(&path).unwrap(),
        ["Why are fees disputed?", "What about transfers?"]
    );

    std::fs::write(&path, "\n# nothing\n").unwrap();
    assert!(commands::read_questions(&path).is_err());
}

#[tokio::test]
async fn eval_writes_a_markdown_row_per_question() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = indexed_pipeline(dir.path()).await;

    let questions = vec!["Why are fees disputed?".to_string(), "Are accounts frozen?".to_string()];
    let mut out = Vec::new();
    commands::eval(&pipeline, &questions, &mut out).await.unwrap();

    let out = text(out);
    assert_eq!(out.lines().count(), 4);
    let first_row = out.lines().nth(2).unwrap();
    assert!(first_row.starts_with("| 1 | Why are fees disputed? |"));
}

#[tokio::test]
async fn chat_session_commands() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = indexed_pipeline(dir.path()).await;
    let mut session = ChatSession::new(1);
    let mut out = Vec::new();

    assert_eq!(session.handle(&pipeline, "   ", &mut out).await.unwrap(), ChatFlow::Continue);
    let flow = session.handle(&pipeline, "frozen savings", &mut out).await.unwrap();
    assert_eq!(flow, ChatFlow::Continue);
    assert_eq!(session.history().len(), 1);
    assert_eq!(session.history()[0].sources.len(), 1);
    assert!(text(out).contains("[1] "));

    let mut out = Vec::new();
    session.handle(&pipeline, "/sources", &mut out).await.unwrap();
    assert!(!session.show_sources());
    session.handle(&pipeline, "annual fee", &mut out).await.unwrap();
    let shown = text(out);
    assert!(shown.contains("Source display off."));
    assert!(!shown.contains("Sources:"));

    let mut out = Vec::new();
    session.handle(&pipeline, "/history", &mut out).await.unwrap();
    let listed = text(out);
    assert!(listed.contains("1. Q: frozen savings"));
    assert!(listed.contains("2. Q: annual fee"));

    let mut out = Vec::new();
    assert_eq!(session.handle(&pipeline, "/clear", &mut out).await.unwrap(), ChatFlow::Cleared);
    assert!(session.history().is_empty());
    assert_eq!(session.handle(&pipeline, "/bogus", &mut out).await.unwrap(), ChatFlow::Continue);
    assert!(text(out).contains("Unknown command /bogus"));

    assert_eq!(session.handle(&pipeline, "/quit", &mut Vec::new()).await.unwrap(), ChatFlow::Quit);
}
