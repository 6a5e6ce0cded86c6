use anyhow::{anyhow, Context, Result};
use kestrel_motion::animation::{AnimationPlayer, EmitterOwner, PlayerResources};
use kestrel_motion::animation_validation::{classify_json, DefinitionKind, DefinitionValidator, Severity, ValidationIssue};
use kestrel_motion::assets::{AnimationDefinition, ParticleLibrary};
use kestrel_motion::config::EngineConfig;
use kestrel_motion::easing::EasingTable;
use serde::Serialize;
use serde_json::json;
use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

fn main() {
    env_logger::init();
    match run() {
        Ok(result) => {
            if result.summary.errors > 0 || (result.fail_on_warn && result.summary.warnings > 0) {
                process::exit(2);
            }
        }
        Err(err) => {
            eprintln!("motion_check error: {err:?}");
            process::exit(1);
        }
    }
}

#[derive(Default, Serialize)]
struct RunSummary {
    checked: usize,
    warnings: usize,
    errors: usize,
}

struct RunResult {
    summary: RunSummary,
    fail_on_warn: bool,
}

#[derive(Debug)]
struct CliOptions {
    fail_on_warn: bool,
    report_stats: bool,
    dry_run: bool,
    show_help: bool,
    particles: Option<PathBuf>,
    config: Option<PathBuf>,
    targets: Vec<String>,
}

fn run() -> Result<RunResult> {
    let args: Vec<String> = env::args().skip(1).collect();
    let options = parse_cli_args(&args)?;
    if options.show_help {
        print_usage();
        return Ok(RunResult { summary: RunSummary::default(), fail_on_warn: options.fail_on_warn });
    }
    let targets = collect_targets(&options.targets)?;
    if targets.is_empty() {
        return Err(anyhow!("no definition files found in provided paths"));
    }
    let config = match &options.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let library = match &options.particles {
        Some(path) => {
            let bytes = fs::read(path).with_context(|| format!("failed to read particle library '{}'", path.display()))?;
            Some(ParticleLibrary::from_json_slice(&bytes)?)
        }
        None => None,
    };
    let easing = EasingTable::with_builtins();
    let mut validator = DefinitionValidator::new(&easing);
    if let Some(library) = &library {
        validator = validator.with_particles(library);
    }

    let mut summary = RunSummary::default();
    for path in targets {
        summary.checked += 1;
        let issues = validator.validate_path(&path);
        for issue in &issues {
            report_issue(&path, issue);
            if options.report_stats {
                report_issue_json(&path, issue);
            }
            match issue.severity {
                Severity::Warning => summary.warnings += 1,
                Severity::Error => summary.errors += 1,
                Severity::Info => {}
            }
        }
        if issues.iter().all(|issue| issue.severity == Severity::Info) {
            println!("OK {}", path.display());
        }
        if options.dry_run && !issues.iter().any(|issue| issue.severity == Severity::Error) {
            dry_run(&path, &config, library.clone())?;
        }
    }
    println!("Checked {} definitions ({} warnings, {} errors)", summary.checked, summary.warnings, summary.errors);
    if options.report_stats {
        report_summary_json(&summary);
    }
    Ok(RunResult { summary, fail_on_warn: options.fail_on_warn })
}

/// Plays every motion in every direction headlessly, one frame per update.
fn dry_run(path: &Path, config: &EngineConfig, library: Option<ParticleLibrary>) -> Result<()> {
    let bytes = fs::read(path).with_context(|| format!("failed to read '{}'", path.display()))?;
    if classify_json(&bytes) != DefinitionKind::Animation {
        return Ok(());
    }
    let definition = Arc::new(AnimationDefinition::from_json_slice(&bytes)?);
    let resources = PlayerResources::new(Arc::clone(&definition), config.clone())
        .with_particles(Arc::new(library.unwrap_or_default()));
    for motion in definition.motions() {
        let mut player = AnimationPlayer::new(resources.clone());
        player.activate(EmitterOwner::Ui);
        if !player.set_motion(&motion.name) {
            continue;
        }
        for direction in 0..player.template().count() {
            player.set_direction(direction);
            let Some(case) = player.case().cloned() else {
                continue;
            };
            let step = player.step_ms();
            let budget = case.length() * 2;
            let mut peak_particles = 0;
            for _ in 0..budget {
                player.update(step);
                peak_particles = peak_particles.max(player.ui_emitters().live_particles());
                if player.is_ended() {
                    break;
                }
            }
            println!(
                "[dry-run] {}/{} dir {direction}: {} frames, {} layers, cycles {}, peak particles {peak_particles}",
                path.display(),
                motion.name,
                case.length(),
                case.layer_count(),
                player.cycle_index(),
            );
        }
    }
    Ok(())
}

fn print_usage() {
    eprintln!(
        "Motion Check

Usage:
  motion_check [--fail-on-warn] [--report-stats] [--dry-run]
               [--particles <library.json>] [--config <config.json>] <path> [<path>...]

Each <path> may be a file or directory. Directories are walked recursively
and JSON files holding animation or particle definitions are validated.
--particles cross-checks particle layers against an effect library.
--dry-run plays every motion in every direction once.
Use --fail-on-warn to treat warnings as errors (exit code 2).
"
    );
}

fn parse_cli_args(args: &[String]) -> Result<CliOptions> {
    let mut options = CliOptions {
        fail_on_warn: false,
        report_stats: false,
        dry_run: false,
        show_help: false,
        particles: None,
        config: None,
        targets: Vec::new(),
    };
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--fail-on-warn" => options.fail_on_warn = true,
            "--report-stats" => options.report_stats = true,
            "--dry-run" => options.dry_run = true,
            "--help" | "-h" => options.show_help = true,
            "--particles" => {
                let value = iter.next().ok_or_else(|| anyhow!("--particles needs a path"))?;
                options.particles = Some(PathBuf::from(value));
            }
            "--config" => {
                let value = iter.next().ok_or_else(|| anyhow!("--config needs a path"))?;
                options.config = Some(PathBuf::from(value));
            }
            _ if arg.starts_with("--") => {
                return Err(anyhow!("unknown flag '{arg}'"));
            }
            _ => options.targets.push(arg.clone()),
        }
    }
    Ok(options)
}

fn collect_targets(inputs: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut seen = HashSet::new();
    for input in inputs {
        let path = PathBuf::from(input);
        if !path.exists() {
            return Err(anyhow!("path '{}' does not exist", input));
        }
        if path.is_file() {
            if is_json(&path) {
                add_target(path, &mut seen, &mut files);
            } else {
                log::warn!("[motion_check] skipping '{}' (unsupported extension)", path.display());
            }
        } else if path.is_dir() {
            walk_dir(&path, &mut seen, &mut files)
                .with_context(|| format!("failed to enumerate directory '{}'", path.display()))?;
        } else {
            return Err(anyhow!("path '{}' is neither file nor directory", input));
        }
    }
    Ok(files)
}

fn walk_dir(dir: &Path, seen: &mut HashSet<PathBuf>, files: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?.map(|entry| entry.map(|e| e.path())).collect::<Result<_, _>>()?;
    entries.sort();
    for path in entries {
        if path.is_dir() {
            walk_dir(&path, seen, files)?;
        } else if is_json(&path) {
            add_target(path, seen, files);
        }
    }
    Ok(())
}

fn add_target(path: PathBuf, seen: &mut HashSet<PathBuf>, files: &mut Vec<PathBuf>) {
    let normalized = fs::canonicalize(&path).unwrap_or(path);
    if seen.insert(normalized.clone()) {
        files.push(normalized);
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()).is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

fn report_issue(path: &Path, issue: &ValidationIssue) {
    let severity = severity_label(issue.severity, true);
    println!("[{severity}] {} ({}) - {}", path.display(), issue.location, issue.message);
}

fn report_issue_json(path: &Path, issue: &ValidationIssue) {
    let json_value = json!({
        "severity": severity_label(issue.severity, false),
        "path": path.display().to_string(),
        "location": issue.location,
        "message": issue.message,
    });
    println!("{json_value}");
}

fn report_summary_json(summary: &RunSummary) {
    println!("{}", json!({ "summary": summary }));
}

fn severity_label(severity: Severity, uppercase: bool) -> &'static str {
    match (severity, uppercase) {
        (Severity::Info, true) => "INFO",
        (Severity::Warning, true) => "WARN",
        (Severity::Error, true) => "ERROR",
        (Severity::Info, false) => "info",
        (Severity::Warning, false) => "warning",
        (Severity::Error, false) => "error",
    }
}
