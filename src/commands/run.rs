//! The plan/apply pipeline.
//!
//! `plan` and `apply` are the same pipeline; `plan` runs it with mutation
//! suppressed. Resources are reconciled one at a time, in manifest order,
//! and the first error aborts the run - whatever was already applied stays
//! applied.

use crate::cli::RunArgs;
use crate::client::http::HttpClient;
use crate::config::ApiConfig;
use crate::resource;
use crate::schema::Manifest;
use anyhow::Result;
use colored::Colorize;
use log::warn;
use reconcile::Outcome;
use serde_json::{Value, json};

pub fn run(args: &RunArgs, dry_run: bool, quiet: bool) -> Result<()> {
    let manifest = Manifest::load(&args.file)?;
    if manifest.is_empty() {
        warn!("manifest {} lists no resources", args.file.display());
    }

    let api = ApiConfig::resolve(args.api_url.clone(), args.token.clone())?;
    let client = HttpClient::new(api.url, api.token);

    let mut reports = Vec::new();
    let mut changes = 0usize;

    {
        let mut report = |kind: &str, key: &str, outcome: Outcome| {
            if outcome.changed {
                changes += 1;
            }
            if !quiet && !args.json {
                print_line(kind, key, &outcome, dry_run);
            }
            let mut entry = json!({ "changed": outcome.changed });
            if !outcome.value.is_null() {
                entry[kind] = outcome.value;
            }
            reports.push(entry);
        };

        for spec in &manifest.instances {
            report(
                "instance",
                &spec.label,
                resource::instance::ensure(&client, spec, dry_run)?,
            );
        }
        for spec in &manifest.volumes {
            report(
                "volume",
                &spec.label,
                resource::volume::ensure(&client, spec, dry_run)?,
            );
        }
        for spec in &manifest.attachments {
            let key = format!("{}:{}", spec.instance, spec.volume);
            report(
                "attachment",
                &key,
                resource::attachment::ensure(&client, spec, dry_run)?,
            );
        }
        for spec in &manifest.domains {
            report(
                "domain",
                &spec.domain,
                resource::domain::ensure(&client, spec, dry_run)?,
            );
        }
        for spec in &manifest.records {
            let key = format!("{}/{}", spec.domain, spec.record.name);
            report(
                "domain_record",
                &key,
                resource::domain_record::ensure(&client, spec, dry_run)?,
            );
        }
        for spec in &manifest.balancers {
            report(
                "balancer",
                &spec.label,
                resource::balancer::ensure(&client, spec, dry_run)?,
            );
        }
        for spec in &manifest.configs {
            let key = format!("{}:{}", spec.balancer, spec.config.port);
            report(
                "balancer_config",
                &key,
                resource::balancer_config::ensure(&client, spec, dry_run)?,
            );
        }
        for spec in &manifest.nodes {
            let key = format!("{}:{}/{}", spec.balancer, spec.port, spec.node.address);
            report(
                "balancer_node",
                &key,
                resource::balancer_node::ensure(&client, spec, dry_run)?,
            );
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&Value::Array(reports))?);
    } else if !quiet {
        println!();
        let verb = if dry_run { "would change" } else { "changed" };
        println!(
            "  {} resources, {} {}",
            reports.len().to_string().bold(),
            changes.to_string().bold(),
            verb
        );
    }

    Ok(())
}

fn print_line(kind: &str, key: &str, outcome: &Outcome, dry_run: bool) {
    let deleted = outcome.value.get("status").and_then(Value::as_str) == Some("deleted");
    let symbol = if deleted {
        "-".red()
    } else if outcome.changed {
        "~".yellow()
    } else {
        "✓".green()
    };
    let note = match (outcome.changed, dry_run) {
        (false, _) => "up to date".dimmed(),
        (true, true) => "would change".yellow(),
        (true, false) if deleted => "deleted".red(),
        (true, false) => "changed".yellow(),
    };
    println!("  {symbol} {kind} {} {note}", key.bold());
}
