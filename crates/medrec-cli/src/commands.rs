use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use medrec_client::{
    ClientError, IdentityProvider, LedgerClient, Outcome, RecordView, StaticIdentity,
    SubmitReceipt,
};
use medrec_ledger::{
    AllowAll, AllowList, Authorizer, ConsentRegistry, LocalChannel, RecordLedger, RecordReader,
    ValidationReport,
};
use medrec_types::CallerIdentity;

use crate::cli::*;
use crate::config::CliConfig;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let mut config = CliConfig::load(cli.config.as_deref())?
        .with_overrides(cli.journal.clone(), cli.caller.clone());
    if let Command::Submit(SubmitArgs { timeout_ms: Some(ms), .. }) = &cli.command {
        config.ledger.submit_timeout_ms = *ms;
    }

    // `verify` must load a broken history to report it.
    let validate = !matches!(cli.command, Command::Verify(_));
    let ledger = Arc::new(open_ledger(&config, validate)?);
    let mut client = LedgerClient::new(Arc::clone(&ledger), identity(&config)?);
    if let Some(consent) = consent(&config)? {
        client = client.with_read_gate(consent);
    }

    match cli.command {
        Command::Submit(args) => cmd_submit(&client, args, cli.format).await,
        Command::Fetch(args) => cmd_fetch(&client, args, cli.format),
        Command::Subjects => cmd_subjects(&ledger, cli.format),
        Command::Verify(args) => cmd_verify(&ledger, args, cli.format),
    }
}

fn open_ledger(config: &CliConfig, validate: bool) -> anyhow::Result<RecordLedger> {
    let authorizer: Arc<dyn Authorizer> = if config.access.allowed_callers.is_empty() {
        Arc::new(AllowAll)
    } else {
        let callers = config
            .access
            .allowed_callers
            .iter()
            .map(|raw| CallerIdentity::parse(raw))
            .collect::<Result<Vec<_>, _>>()
            .context("invalid entry in [access] allowed_callers")?;
        Arc::new(AllowList::new(callers))
    };

    let channel = Arc::new(LocalChannel);
    let opened = if validate {
        RecordLedger::open(config.ledger.clone(), authorizer, channel)
    } else {
        RecordLedger::open_unverified(config.ledger.clone(), authorizer, channel)
    };
    let ledger = opened.with_context(|| match &config.ledger.journal_path {
        Some(path) => format!("opening ledger journal {}", path.display()),
        None => "opening in-memory ledger".to_string(),
    })?;
    debug!(persistent = ledger.is_persistent(), "ledger ready");
    Ok(ledger)
}

/// Consent registry seeded from `[access.read_grants]`, if any are set.
fn consent(config: &CliConfig) -> anyhow::Result<Option<Arc<ConsentRegistry>>> {
    if config.access.read_grants.is_empty() {
        return Ok(None);
    }
    let registry = ConsentRegistry::new(config.ledger.node_id);
    for (subject, grantees) in &config.access.read_grants {
        for raw in grantees {
            let grantee = CallerIdentity::parse(raw)
                .context("invalid caller in [access.read_grants]")?;
            registry
                .grant(subject, &grantee)
                .with_context(|| format!("granting {raw} read access to {subject}"))?;
        }
    }
    Ok(Some(Arc::new(registry)))
}

/// Identity used when no caller is configured. Reads work; submissions fail.
struct Unconfigured;

impl IdentityProvider for Unconfigured {
    fn current_identity(&self) -> Result<CallerIdentity, ClientError> {
        Err(ClientError::Identity(
            "pass --caller or set `caller` under [client]".into(),
        ))
    }
}

fn identity(config: &CliConfig) -> anyhow::Result<Arc<dyn IdentityProvider>> {
    let provider: Arc<dyn IdentityProvider> = match &config.client.caller {
        Some(raw) => Arc::new(StaticIdentity::parse(raw)?),
        None => Arc::new(Unconfigured),
    };
    Ok(provider)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn cmd_submit(
    client: &LedgerClient<RecordLedger>,
    args: SubmitArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let receipt: SubmitReceipt = match client.submit_record(&args.subject, &args.pointer).await {
        Ok(receipt) => receipt,
        Err(e) if e.outcome() == Outcome::Unknown => {
            warn!(subject = %args.subject, error = %e, "submission outcome unknown");
            return Err(anyhow::Error::new(e).context(format!(
                "record may or may not be stored; run `medrec fetch {}` before retrying",
                args.subject
            )));
        }
        Err(e) => return Err(e.into()),
    };

    match format {
        OutputFormat::Json => print_json(&receipt),
        OutputFormat::Text => {
            println!(
                "{} Recorded {} for {}",
                "✓".green().bold(),
                args.pointer.trim().cyan(),
                args.subject.trim().bold()
            );
            println!("  Sequence: {}", receipt.sequence.to_string().yellow());
            println!("  Timestamp: {}", receipt.timestamp);
            println!("  Request: {}", receipt.request_id.to_string().dimmed());
            Ok(())
        }
    }
}

fn cmd_fetch(
    client: &LedgerClient<RecordLedger>,
    args: FetchArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let records: Vec<RecordView> = client.fetch_records(&args.subject)?;

    match format {
        OutputFormat::Json => print_json(&records),
        OutputFormat::Text => {
            if records.is_empty() {
                println!("No records for {}.", args.subject.trim().bold());
                return Ok(());
            }
            println!(
                "{} record(s) for {}",
                records.len().to_string().bold(),
                args.subject.trim().bold()
            );
            for r in &records {
                println!(
                    "  {} {}  {}  {}",
                    format!("#{}", r.sequence).yellow(),
                    r.pointer.cyan(),
                    r.submitted_by,
                    r.timestamp.to_string().dimmed()
                );
            }
            Ok(())
        }
    }
}

fn cmd_subjects(ledger: &RecordLedger, format: OutputFormat) -> anyhow::Result<()> {
    let mut rows = Vec::new();
    for subject in ledger.subjects()? {
        let count = ledger.record_count(subject.as_str())?;
        rows.push((subject, count));
    }

    match format {
        OutputFormat::Json => {
            let body: Vec<_> = rows
                .iter()
                .map(|(s, n)| json!({ "subject": s, "records": n }))
                .collect();
            print_json(&body)
        }
        OutputFormat::Text => {
            if rows.is_empty() {
                println!("No subjects.");
            }
            for (subject, count) in &rows {
                println!("  {}  {}", subject.as_str().bold(), count);
            }
            Ok(())
        }
    }
}

fn report_json(report: &ValidationReport) -> serde_json::Value {
    json!({
        "subject": report.subject,
        "entries": report.entry_count,
        "valid": report.is_valid(),
        "violations": report.violations.iter().map(|v| json!({
            "sequence": v.sequence,
            "kind": format!("{:?}", v.kind),
            "description": v.description,
        })).collect::<Vec<_>>(),
    })
}

fn cmd_verify(ledger: &RecordLedger, args: VerifyArgs, format: OutputFormat) -> anyhow::Result<()> {
    let reports = match &args.subject {
        Some(subject) => vec![ledger.verify_subject(subject)?],
        None => ledger.verify_all()?,
    };
    let broken = reports.iter().filter(|r| !r.is_valid()).count();

    match format {
        OutputFormat::Json => {
            let body: Vec<_> = reports.iter().map(report_json).collect();
            print_json(&body)?;
        }
        OutputFormat::Text => {
            for report in &reports {
                if report.is_valid() {
                    println!(
                        "{} {} ({} entries)",
                        "✓".green(),
                        report.subject.as_str().bold(),
                        report.entry_count
                    );
                } else {
                    println!("{} {}", "✗".red().bold(), report.subject.as_str().bold());
                    for v in &report.violations {
                        println!("    seq {}: {:?}: {}", v.sequence, v.kind, v.description);
                    }
                }
            }
            if broken == 0 {
                println!(
                    "{} {} subject(s) verified",
                    "✓".green().bold(),
                    reports.len()
                );
            }
        }
    }

    if broken > 0 {
        anyhow::bail!("{broken} subject(s) failed verification");
    }
    Ok(())
}
