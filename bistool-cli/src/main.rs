//! bistool CLI - spec generation and API tests over a local project store

mod cli;
mod config;
mod telemetry;

use std::fs;
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use bistool::openapi::{Dialect, ResponseSample};
use bistool::runner::{RunContext, TestResult, TestRunner};
use bistool::session::{ExtendedSession, SessionManager, VariableScope};
use bistool::store::FileStore;
use bistool::transfer::{export_document, import_document, ImportStrategy, TransferDocument};
use bistool::transport::ReqwestTransport;
use clap::Parser;
use http::Method;
use tracing::warn;

use cli::{Args, Command, StrategyArg};
use config::{load_config, CliConfig};

/// A test failed.
const EXIT_FAILURE: u8 = 1;
/// Bad input, configuration or storage error.
const EXIT_CONFIG_ERROR: u8 = 66;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let cfg = match load_config(args.config.as_deref()) {
        Ok(cfg) => cfg.apply_args(&args),
        Err(e) => {
            eprintln!("bistool: error: {e:#}");
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };
    if let Err(e) = telemetry::init(&cfg) {
        eprintln!("bistool: warning: {e:#}");
    }

    match run(args.command, &cfg).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(EXIT_FAILURE),
        Err(e) => {
            eprintln!("bistool: error: {e:#}");
            ExitCode::from(EXIT_CONFIG_ERROR)
        }
    }
}

type Manager = SessionManager<FileStore>;

fn open_manager(cfg: &CliConfig) -> Result<Manager> {
    let store = FileStore::new(cfg.store_root());
    let manager = SessionManager::open(store, cfg.project.clone())
        .with_context(|| format!("opening project `{}`", cfg.project))?;
    Ok(manager.with_environment(cfg.environment.clone()))
}

/// Returns `Ok(false)` when tests ran and at least one failed.
async fn run(command: Command, cfg: &CliConfig) -> Result<bool> {
    let mut manager = open_manager(cfg)?;

    match command {
        Command::Sessions => {
            list_sessions(&manager);
            Ok(true)
        }
        Command::Add {
            name,
            method,
            url,
            category,
            description,
        } => {
            let method = Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
                .map_err(|_| anyhow!("invalid HTTP method `{method}`"))?;
            let mut session = ExtendedSession::from_request(name, method, &url);
            session.category = category;
            session.description = description;
            session.include_token = manager.state().settings.include_token;
            let id = manager.save_session(session)?;
            println!("{id}");
            Ok(true)
        }
        Command::SetVar { key, value, session } => {
            match session {
                Some(session) => manager.set_variable(VariableScope::Shared, &session, &key, value)?,
                None => manager.set_global_variable(&key, value)?,
            }
            Ok(true)
        }
        Command::Generate {
            session,
            sample,
            dialect,
            live,
            output,
        } => {
            let sample = match (sample, live) {
                (Some(path), _) => {
                    let text = fs::read_to_string(&path)
                        .with_context(|| format!("reading sample {}", path.display()))?;
                    Some(ResponseSample::pasted(&text).context("sample is not valid JSON")?)
                }
                (None, true) => live_sample(&manager, &session).await?,
                (None, false) => None,
            };
            let yaml = manager.generate_spec(&session, sample.as_ref(), dialect.map(Dialect::from))?;
            match output {
                Some(path) => fs::write(&path, &yaml).with_context(|| format!("writing {}", path.display()))?,
                None => print!("{yaml}"),
            }
            Ok(true)
        }
        Command::Test { session } => run_tests(&mut manager, &session).await,
        Command::Export { file } => {
            let document = export_document(manager.state());
            let json = serde_json::to_string_pretty(&document)?;
            fs::write(&file, json).with_context(|| format!("writing {}", file.display()))?;
            println!("exported {} session(s)", document.saved_sessions.len());
            Ok(true)
        }
        Command::Import {
            file,
            strategy,
            select,
        } => {
            let text = fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
            let document: TransferDocument =
                serde_json::from_str(&text).map_err(|e| anyhow!("invalid transfer file: {e}"))?;
            let strategy = match (strategy, select.is_empty()) {
                (_, false) => ImportStrategy::Selected(select),
                (StrategyArg::Merge, true) => ImportStrategy::Merge,
                (StrategyArg::Override, true) => ImportStrategy::Override,
            };
            let report = manager.update_state(|state| import_document(state, document, &strategy))?;
            println!(
                "imported {}, replaced {}, skipped {}, new variables {}",
                report.imported,
                report.replaced,
                report.skipped.len(),
                report.variables_added
            );
            for name in &report.skipped {
                println!("  skipped: {name}");
            }
            Ok(true)
        }
    }
}

fn list_sessions(manager: &Manager) {
    let sessions = manager.list_sessions();
    if sessions.is_empty() {
        println!("no saved sessions in project `{}`", manager.project_id());
        return;
    }
    for session in sessions {
        let template = session.template();
        println!(
            "{}  {:<7} {:<40} {} test(s)  [{}]",
            session.id,
            template.method.as_str(),
            session.name,
            session.tests.len(),
            template.url.url_template()
        );
    }
}

/// Send the session's request once; a failed fetch falls back to no sample.
async fn live_sample(manager: &Manager, session: &str) -> Result<Option<ResponseSample>> {
    let session = manager.session(session)?;
    let namespace = manager.namespace_for(session);
    let auth = manager.auth_context();
    let ctx = RunContext::new(&namespace)
        .environment(manager.environment())
        .token(Some(&auth), session.include_token);

    let runner = TestRunner::new(ReqwestTransport::new());
    match runner.fetch_sample(&session.template(), &ctx).await {
        Ok(sample) => Ok(Some(sample)),
        Err(e) => {
            warn!(error = %e, "live fetch failed; generating without a sample");
            Ok(None)
        }
    }
}

async fn run_tests(manager: &mut Manager, session: &str) -> Result<bool> {
    let runner = TestRunner::new(ReqwestTransport::new());
    let summary = manager.run_tests(session, &runner).await?;
    let tests = &manager.session(session)?.tests;

    for outcome in &summary.outcomes {
        let name = tests
            .iter()
            .find(|t| t.id == outcome.test_id)
            .map(|t| t.name.as_str())
            .filter(|name| !name.is_empty())
            .unwrap_or(outcome.test_id.as_str());
        let label = match outcome.result {
            TestResult::Pass => "PASS",
            TestResult::Fail => "FAIL",
            TestResult::Unset => "----",
        };
        println!(
            "{label}  {name:<32} {:>3}  {}",
            outcome.server_status,
            outcome.request_url.as_deref().unwrap_or("-")
        );
        if let Some(error) = &outcome.error {
            println!("      {error}");
        }
    }
    println!("{} passed, {} failed", summary.passed, summary.failed);
    Ok(summary.all_passed())
}
