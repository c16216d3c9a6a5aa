use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use ocspd_core::config::SupervisorConfig;
use ocspd_core::context::{TaskContext, When};
use ocspd_core::domain::{CertSubject, Disposition, Subject, TaskFailure, TaskId};
use ocspd_core::impls::InMemoryScheduler;
use ocspd_core::ports::{Clock, SystemClock};
use ocspd_core::supervise::{Supervisor, delete_staple};
use tracing_subscriber::EnvFilter;

const PEM_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const PEM_END: &str = "-----END CERTIFICATE-----";

#[derive(Debug, Parser)]
#[command(name = "ocspd", about = "OCSP daemon task supervision tools")]
struct Cli {
    /// JSON config file (default: first of ~/.ocspd.conf.json, /etc/ocspd/ocspd.conf.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one parse pass over certificate files through the supervision
    /// boundary and show what got rescheduled.
    Check {
        #[arg(required = true)]
        certs: Vec<PathBuf>,

        /// Print the summary as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Delete the cached OCSP staple of each certificate.
    DeleteStaple {
        #[arg(required = true)]
        certs: Vec<PathBuf>,
    },
}

/// Parse task action: the file must be readable and hold a PEM certificate.
fn parse_cert(path: &Path) -> Result<(), TaskFailure> {
    let raw = std::fs::read(path).map_err(|e| TaskFailure::resource_access(path, &e))?;
    let text = String::from_utf8_lossy(&raw);
    let Some(begin) = text.find(PEM_BEGIN) else {
        return Err(TaskFailure::Parsing(format!(
            "no certificate found in {}",
            path.display()
        )));
    };
    if !text[begin..].contains(PEM_END) {
        return Err(TaskFailure::Parsing(format!(
            "truncated certificate in {}",
            path.display()
        )));
    }
    Ok(())
}

fn load_config(explicit: Option<&Path>) -> Result<SupervisorConfig, ocspd_core::config::ConfigError> {
    match explicit {
        Some(path) => SupervisorConfig::from_json_file(path),
        None => SupervisorConfig::discover(),
    }
}

fn summarize(disposition: &Disposition) -> String {
    match disposition {
        Disposition::Completed => "ok".to_string(),
        Disposition::Rescheduled { count, delay } => {
            format!("retry #{count} in {}s", delay.as_secs())
        }
        Disposition::GaveUp { count } => format!("gave up after {count} failures"),
        Disposition::Dropped { kind, severity } => format!("dropped ({kind}, {severity:?})"),
        Disposition::Dumped { trace: Ok(path) } => format!("dumped to {}", path.display()),
        Disposition::Dumped { trace: Err(e) } => format!("dump failed: {e}"),
    }
}

async fn check(config: SupervisorConfig, certs: Vec<PathBuf>, json: bool) {
    let scheduler = Arc::new(InMemoryScheduler::new());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let supervisor = Supervisor::new(&config);

    // 登録済みの subject（タスクより長生き）
    let subjects: Vec<(PathBuf, Arc<dyn Subject>)> = certs
        .into_iter()
        .map(|path| {
            let subject: Arc<dyn Subject> = Arc::new(CertSubject::new(path.clone()));
            (path, subject)
        })
        .collect();

    let mut tasks: HashMap<TaskId, (PathBuf, TaskContext)> = HashMap::new();
    for (path, subject) in &subjects {
        let ctx = TaskContext::new(
            "parse",
            Arc::clone(subject),
            When::Now,
            scheduler.clone(),
            clock.clone(),
        );
        tasks.insert(ctx.id(), (path.clone(), ctx));
    }

    let mut results = Vec::new();
    for (id, _name) in scheduler.take_due(clock.now()) {
        let Some((path, mut ctx)) = tasks.remove(&id) else {
            continue;
        };
        let action_path = path.clone();
        let disposition = supervisor
            .supervise_async(&mut ctx, async move { parse_cert(&action_path) })
            .await;
        tracing::info!(task = %ctx, outcome = %summarize(&disposition), "parse pass finished");
        if disposition.is_rescheduled() {
            tasks.insert(id, (path.clone(), ctx));
        }
        results.push((path, disposition));
    }

    let pending = scheduler.pending();
    if json {
        let body = serde_json::json!({
            "results": results
                .iter()
                .map(|(path, d)| serde_json::json!({
                    "cert": path.display().to_string(),
                    "outcome": summarize(d),
                }))
                .collect::<Vec<_>>(),
            "pending": pending
                .iter()
                .map(|(id, name, at)| serde_json::json!({
                    "task": id.to_string(),
                    "name": name.as_str(),
                    "at": at.to_rfc3339(),
                }))
                .collect::<Vec<_>>(),
        });
        println!("{body:#}");
    } else {
        for (path, d) in &results {
            println!("{}: {}", path.display(), summarize(d));
        }
        for (id, name, at) in &pending {
            println!("pending: {name} {id} at {}", at.to_rfc3339());
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "can't load configuration");
            return ExitCode::from(2);
        }
    };

    match cli.command {
        Command::Check { certs, json } => check(config, certs, json).await,
        Command::DeleteStaple { certs } => {
            for cert in certs {
                let subject = CertSubject::new(cert);
                let removed = delete_staple(&subject);
                println!(
                    "{}: {}",
                    subject.staple_path().display(),
                    if removed { "deleted" } else { "not present" }
                );
            }
        }
    }
    ExitCode::SUCCESS
}
