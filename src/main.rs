//! TweakRunner CLI Entry Point
//!
//! Renders a tweaks file and runs a workflow with it, once per repetition.
//!
//! # Usage
//!
//! ```bash
//! # Workflow embedded in a generated image, 10 runs
//! tweakrunner sweep.yaml --image portrait.png --amount 10
//!
//! # Workflow from its two JSON documents
//! tweakrunner sweep.yaml --workflow portrait.json --prompt portrait_api.json
//!
//! # Preview the resolved graphs without writing anything
//! tweakrunner sweep.yaml --image portrait.png --dry-run
//!
//! # With pause control
//! tweakrunner sweep.yaml --image portrait.png --pause-flag /tmp/pause.flag
//! ```

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use colored::Colorize;
use log::{error, info};

use tweakrunner::environment::{Settings, SETTINGS_PATH};
use tweakrunner::execution::{
    DryRunExecutor, FileExecutor, JobExecutor, JobQueue, JobStatus, QueueOutcome,
};
use tweakrunner::template::TweakRenderer;
use tweakrunner::{Tweaks, Workflow, APP_NAME, VERSION};

/// Default number of repetitions.
const DEFAULT_AMOUNT: u32 = 1;

/// Default output directory when neither settings nor arguments give one.
const DEFAULT_OUTPUT_DIR: &str = "output";

/// Where the workflow to run comes from.
#[derive(Debug, PartialEq)]
enum WorkflowSource {
    Image(PathBuf),
    Files { workflow: PathBuf, prompt: PathBuf },
}

/// Command-line configuration parsed from arguments.
#[derive(Debug, Default)]
struct Config {
    tweaks_path: Option<PathBuf>,
    image_path: Option<PathBuf>,
    workflow_path: Option<PathBuf>,
    prompt_path: Option<PathBuf>,
    amount: Option<u32>,
    output_dir: Option<PathBuf>,
    settings_path: Option<PathBuf>,
    pause_flag_path: Option<PathBuf>,
    save_tweaks_path: Option<PathBuf>,
    dry_run: bool,
    verbose: bool,
}

impl Config {
    /// Resolves `--image` / `--workflow` + `--prompt` into one source.
    fn workflow_source(&self) -> Result<WorkflowSource, String> {
        match (&self.image_path, &self.workflow_path, &self.prompt_path) {
            (Some(image), None, None) => Ok(WorkflowSource::Image(image.clone())),
            (None, Some(workflow), Some(prompt)) => Ok(WorkflowSource::Files {
                workflow: workflow.clone(),
                prompt: prompt.clone(),
            }),
            (None, Some(_), None) | (None, None, Some(_)) => {
                Err("--workflow and --prompt must be given together".to_string())
            }
            (None, None, None) => Err("Either --image or --workflow/--prompt is required".to_string()),
            _ => Err("--image cannot be combined with --workflow/--prompt".to_string()),
        }
    }
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints the application banner with version information.
fn print_banner() {
    println!();
    println!("{} v{}", APP_NAME.bold(), VERSION);
    println!("Templated Workflow Sweeps");
    println!();
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: tweakrunner [OPTIONS] <TWEAKS_FILE>");
    println!();
    println!("Arguments:");
    println!("  <TWEAKS_FILE>         Tweaks template (YAML with template expressions)");
    println!();
    println!("Options:");
    println!("  --image PATH          Load the workflow embedded in a PNG image");
    println!("  --workflow PATH       Presentation graph JSON (requires --prompt)");
    println!("  --prompt PATH         Execution graph JSON (requires --workflow)");
    println!("  --amount N            Number of runs (default: {})", DEFAULT_AMOUNT);
    println!("  --output-dir PATH     Where resolved workflows are written");
    println!("  --settings PATH       Settings file (default: {})", SETTINGS_PATH.display());
    println!("  --pause-flag PATH     Pause between runs while this file exists");
    println!("  --save-tweaks PATH    Save the first rendered tweaks as YAML");
    println!("  --dry-run             Log resolved workflows without writing them");
    println!("  --verbose             Enable debug logging");
    println!("  --help                Show this help message");
    println!("  --version             Show version information");
    println!();
    println!("Examples:");
    println!("  tweakrunner sweep.yaml --image portrait.png --amount 10");
    println!("  tweakrunner sweep.yaml --workflow wf.json --prompt wf_api.json --dry-run");
}

/// Takes the value following an option.
fn option_value<'a>(args: &'a [String], i: &mut usize, option: &str) -> Result<&'a str, String> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| format!("{} requires an argument", option))
}

/// Parses command-line arguments into a Config struct.
fn parse_arguments(args: &[String]) -> Result<Config, String> {
    let mut config = Config::default();
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--dry-run" => config.dry_run = true,
            "--verbose" | "-v" => config.verbose = true,
            "--image" => {
                config.image_path = Some(PathBuf::from(option_value(args, &mut i, arg)?));
            }
            "--workflow" => {
                config.workflow_path = Some(PathBuf::from(option_value(args, &mut i, arg)?));
            }
            "--prompt" => {
                config.prompt_path = Some(PathBuf::from(option_value(args, &mut i, arg)?));
            }
            "--output-dir" => {
                config.output_dir = Some(PathBuf::from(option_value(args, &mut i, arg)?));
            }
            "--settings" => {
                config.settings_path = Some(PathBuf::from(option_value(args, &mut i, arg)?));
            }
            "--pause-flag" => {
                config.pause_flag_path = Some(PathBuf::from(option_value(args, &mut i, arg)?));
            }
            "--save-tweaks" => {
                config.save_tweaks_path = Some(PathBuf::from(option_value(args, &mut i, arg)?));
            }
            "--amount" => {
                let value = option_value(args, &mut i, arg)?;
                let amount: u32 = value
                    .parse()
                    .map_err(|_| format!("Invalid amount: {}", value))?;
                if amount == 0 {
                    return Err("--amount must be at least 1".to_string());
                }
                config.amount = Some(amount);
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => {
                if config.tweaks_path.is_some() {
                    return Err(format!("Unexpected argument: {}", arg));
                }
                config.tweaks_path = Some(PathBuf::from(arg));
            }
        }
        i += 1;
    }

    if config.tweaks_path.is_none() {
        return Err("Missing <TWEAKS_FILE>".to_string());
    }
    config.workflow_source()?;

    Ok(config)
}

/// Prints a coloured per-job summary after the queue run.
fn print_summary(queue: &JobQueue) {
    println!();
    println!("{}", "Summary".bold());
    for job in queue.all_jobs() {
        let status = match job.status() {
            JobStatus::Completed => job.status().to_string().green(),
            JobStatus::Failed => job.status().to_string().red(),
            _ => job.status().to_string().yellow(),
        };
        let output = job
            .output_location()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {} {} ({}/{}) '{}' -> {}",
            job.id(),
            status,
            job.progress(),
            job.amount(),
            job.workflow().name(),
            output
        );
    }
    if let Some(average) = queue.timeline().average_duration() {
        println!("  average run: {:.2?}", average);
    }
}

/// Main application entry point.
fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    // Parse arguments
    let config = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    setup_logging(config.verbose);
    print_banner();

    // Settings: file, then environment overrides
    let settings_path = config
        .settings_path
        .clone()
        .unwrap_or_else(|| SETTINGS_PATH.clone());
    let settings = Settings::load_or_default(&settings_path)?.with_env_overrides();
    info!("Server address: {}", settings.server_address);

    let output_dir = config
        .output_dir
        .clone()
        .or_else(|| settings.output_folder.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

    // Workflow
    let workflow = match config.workflow_source()? {
        WorkflowSource::Image(path) => Workflow::from_image(&path)?,
        WorkflowSource::Files { workflow, prompt } => Workflow::from_files(&workflow, &prompt)?,
    };
    info!("Workflow '{}' loaded: {} nodes", workflow.name(), workflow.len());

    // Tweaks
    let Some(tweaks_path) = config.tweaks_path.as_ref() else {
        return Err("Missing <TWEAKS_FILE>".into());
    };
    let tweaks_name = tweaks_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| tweakrunner::tweaks::DEFAULT_TWEAKS_NAME.to_string());
    let renderer = Arc::new(TweakRenderer::new(settings));
    let tweaks = Tweaks::from_file(renderer, tweaks_path, tweaks_name)?;
    info!("Rendered {} tweak(s)", tweaks.len());

    if let Some(ref path) = config.save_tweaks_path {
        tweaks.save(path)?;
    }

    // Queue
    let mut queue = JobQueue::new();
    if let Some(ref path) = config.pause_flag_path {
        info!("Pause control: {}", path.display());
        queue.set_pause_flag_path(path);
    }
    queue.add(workflow, tweaks, config.amount.unwrap_or(DEFAULT_AMOUNT), true)?;

    let mut executor: Box<dyn JobExecutor> = if config.dry_run {
        info!("Mode: DRY RUN (nothing will be written)");
        Box::new(DryRunExecutor::new())
    } else {
        info!("Output directory: {}", output_dir.display());
        Box::new(FileExecutor::new(output_dir))
    };

    let result = queue.start(executor.as_mut());

    print!("{}", queue.timeline().chart());
    print_summary(&queue);

    match result {
        Ok(QueueOutcome::Completed) => {
            println!();
            println!("{}", "All runs completed.".green().bold());
            Ok(())
        }
        Ok(QueueOutcome::Stopped) => {
            println!();
            println!("{}", "Queue stopped.".yellow());
            Ok(())
        }
        Err(e) => {
            error!("Run failed: {}", e);
            Err(e.into())
        }
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("tweakrunner")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_parse_image_source() {
        let config = parse_arguments(&args(&["sweep.yaml", "--image", "a.png", "--amount", "3"]))
            .unwrap();
        assert_eq!(config.tweaks_path, Some(PathBuf::from("sweep.yaml")));
        assert_eq!(config.amount, Some(3));
        assert_eq!(
            config.workflow_source().unwrap(),
            WorkflowSource::Image(PathBuf::from("a.png"))
        );
    }

    #[test]
    fn test_parse_file_source() {
        let config = parse_arguments(&args(&[
            "--workflow", "wf.json", "--prompt", "wf_api.json", "sweep.yaml", "--dry-run",
        ]))
        .unwrap();
        assert!(config.dry_run);
        assert!(matches!(
            config.workflow_source().unwrap(),
            WorkflowSource::Files { .. }
        ));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_arguments(&args(&["--image", "a.png"])).is_err());
        assert!(parse_arguments(&args(&["sweep.yaml"])).is_err());
        assert!(parse_arguments(&args(&["sweep.yaml", "--workflow", "wf.json"])).is_err());
        assert!(parse_arguments(&args(&["sweep.yaml", "--image", "a.png", "--prompt", "p.json"]))
            .is_err());
        assert!(parse_arguments(&args(&["sweep.yaml", "--image", "a.png", "--amount", "0"]))
            .is_err());
        assert!(parse_arguments(&args(&["sweep.yaml", "--image"])).is_err());
        assert!(parse_arguments(&args(&["sweep.yaml", "--bogus"])).is_err());
    }
}
