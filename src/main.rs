use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use vision_qa::agent::RunOutcome;
use vision_qa::config;
use vision_qa::device::{AdbConfig, AdbDevice, DeviceControl};
use vision_qa::frame::{AdbScreenshots, ScreenCanvas, VisualDiff, changed_region, load_rgb};
use vision_qa::harness::{SuiteConfig, SuiteEvent, default_cases, load_cases, run_suite};
use vision_qa::logging;
use vision_qa::oracle::check_reachable;
use vision_qa::runner::{RunReport, StepRecord};
use vision_qa::session::{Session, cleanup_old_sessions};

/// Vision QA - natural-language mobile UI testing driven by a vision model
#[derive(Parser, Debug)]
#[command(
    name = "vision-qa",
    about = "Drive an Android device through natural-language test cases with a vision model",
    after_help = "ENVIRONMENT VARIABLES:\n\
        VISION_QA_ORACLE_ENDPOINT   Chat completions endpoint URL\n\
        VISION_QA_ORACLE_MODEL      Model name\n\
        VISION_QA_ORACLE_API_KEY    API key (falls back to GEMINI_API_KEY)\n\
        VISION_QA_ADB_PATH          Path to adb\n\
        VISION_QA_DEVICE_SERIAL     Target device serial\n\
        VISION_QA_DEVICE_MATCH      Substring a connected serial must contain\n\
        VISION_QA_APP_PACKAGE       Package opened by launch_app\n\
        VISION_QA_SCREENSHOT_DIR    Base directory for frames\n\
        VISION_QA_LOG_DIR           Directory for run reports\n\
        VISION_QA_STEP_BUDGET       Steps allowed per test case\n\
        RUST_LOG                    Diagnostic log filter (default: warn)"
)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run test cases against the connected device
    Run {
        /// JSON file with [{"description": ..., "expected": "pass"|"fail"}]; defaults to the built-in suite
        #[arg(short, long)]
        cases: Option<PathBuf>,

        /// Steps allowed per test case
        #[arg(short, long, env = "VISION_QA_STEP_BUDGET")]
        steps: Option<u32>,

        /// Delete each case's frames once it finishes
        #[arg(long)]
        discard_frames: bool,

        /// Print the run reports as JSON instead of step lines
        #[arg(long)]
        json: bool,
    },

    /// Check whether a matching device is online
    Devices,

    /// Capture a single frame from the device
    Capture {
        /// Frame label
        #[arg(short, long, default_value = "capture")]
        label: String,

        /// Output directory (default: a new session under the screenshot dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compare two frames pixel by pixel
    Diff {
        first: PathBuf,
        second: PathBuf,
    },

    /// Render a synthetic phone frame for testing
    Mock {
        /// Output file path
        #[arg(short, long, default_value = "./mock_frame.png")]
        output: PathBuf,

        /// Background color as hex (e.g., "fafafa")
        #[arg(short, long, default_value = "fafafa")]
        color: String,

        /// Button label drawn in the middle of the screen
        #[arg(short, long, default_value = "Create new vault")]
        label: String,
    },

    /// Remove frame sessions older than the given age
    Prune {
        /// Maximum age in hours
        #[arg(long, default_value = "24")]
        older_than_hours: u64,
    },

    /// Check that the decision oracle endpoint is reachable
    OracleCheck,
}

fn main() -> Result<(), Box<dyn Error>> {
    logging::init();
    let args = Args::parse();
    let cfg = config::get();

    match args.command {
        Some(Commands::Run {
            cases,
            steps,
            discard_frames,
            json,
        }) => {
            let cases = match cases {
                Some(path) => load_cases(&path)?,
                None => default_cases(),
            };
            let suite = SuiteConfig {
                step_budget: steps.unwrap_or(cfg.agent.step_budget).max(1),
                keep_frames: !discard_frames,
                ..SuiteConfig::default()
            };

            let reports = run_suite(&suite, &cases, |event| {
                if json {
                    return;
                }
                match event {
                    SuiteEvent::CaseStarted { case, .. } => {
                        println!("\n==============================");
                        println!("TEST: {}", case.description);
                        println!("==============================");
                    }
                    SuiteEvent::Step(record) => print_step(record),
                    SuiteEvent::CaseFinished { report, report_path } => {
                        print_summary(report);
                        if let Some(path) = report_path {
                            println!("Report: {}", path.display());
                        }
                    }
                }
            })?;

            if json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                let matched = reports.iter().filter(|r| r.matches_expectation() == Some(true)).count();
                let judged = reports.iter().filter(|r| r.expected.is_some()).count();
                println!("\n{} / {} cases matched their expected verdict", matched, judged);
            }
        }

        Some(Commands::Devices) => {
            let device = AdbDevice::new(AdbConfig::default());
            let listing = device.list_devices()?;
            print!("{}", listing);
            if device.is_connected()? {
                println!("Device ready (match: {})", device.config().device_match);
            } else {
                println!("No device matching '{}' is online", device.config().device_match);
            }
        }

        Some(Commands::Capture { label, output }) => {
            let session = match &output {
                Some(dir) => Session::with_name(dir, &label),
                None => Session::with_name(&cfg.paths.screenshot_dir, &label),
            };
            session.init()?;

            let mut frames = AdbScreenshots::new(AdbDevice::new(AdbConfig::default()), session.dir.clone());
            let frame = frames.capture(&label)?;
            let img = load_rgb(&frame.path)?;

            println!("Captured frame: {}", frame.path.display());
            println!("  Size: {}x{}", img.width(), img.height());
        }

        Some(Commands::Diff { first, second }) => {
            let a = load_rgb(&first)?;
            let b = load_rgb(&second)?;
            match changed_region(&a, &b) {
                None => println!("Frames are identical"),
                Some((x, y, w, h)) => {
                    println!("Frames differ");
                    println!("  Changed region: {}x{} at ({}, {})", w, h, x, y);
                }
            }
        }

        Some(Commands::Mock { output, color, label }) => {
            let background = parse_hex_color(&color)?;
            let mut canvas = ScreenCanvas::phone(background);
            canvas.draw_text(48, 160, "Obsidian", 6, [40, 40, 40]);
            canvas.draw_button(canvas.width() / 2, canvas.height() / 2, &label, [124, 58, 237], [255, 255, 255]);
            canvas.save(&output)?;

            println!("Created mock frame: {}", output.display());
            println!("  Size: {}x{}", canvas.width(), canvas.height());
        }

        Some(Commands::Prune { older_than_hours }) => {
            let max_age = Duration::from_secs(older_than_hours * 3600);
            let removed = cleanup_old_sessions(&cfg.paths.screenshot_dir, max_age)?;
            println!(
                "Removed {} session(s) older than {}h from {}",
                removed,
                older_than_hours,
                cfg.paths.screenshot_dir.display()
            );
        }

        Some(Commands::OracleCheck) => {
            let endpoint = &cfg.oracle.endpoint;
            match check_reachable(endpoint, cfg.oracle.connect_timeout) {
                Ok(true) => println!("Oracle endpoint reachable: {}", endpoint),
                Ok(false) | Err(_) => {
                    return Err(format!("Oracle endpoint not reachable: {}", endpoint).into());
                }
            }
            if cfg.oracle.api_key.is_none() {
                eprintln!("Warning: no API key set (VISION_QA_ORACLE_API_KEY or GEMINI_API_KEY)");
            }
        }

        None => {
            println!("Vision QA - natural-language mobile UI testing driven by a vision model");
            println!();
            println!("Usage: vision-qa <COMMAND>");
            println!();
            println!("Commands:");
            println!("  run           Run test cases against the connected device");
            println!("  devices       Check whether a matching device is online");
            println!("  capture       Capture a single frame from the device");
            println!("  diff          Compare two frames pixel by pixel");
            println!("  mock          Render a synthetic phone frame for testing");
            println!("  prune         Remove old frame sessions");
            println!("  oracle-check  Check that the decision oracle endpoint is reachable");
            println!();
            println!("Run with --help for more information.");
        }
    }

    Ok(())
}

fn print_step(record: &StepRecord) {
    let failure = record
        .judgment
        .failure()
        .map(|f| f.to_string())
        .unwrap_or_else(|| "None".to_string());
    println!(
        "\n[step {}] verdict={} failure_type={}",
        record.step,
        record.judgment.verdict(),
        failure
    );
    if !record.judgment.notes().is_empty() {
        println!("notes: {}", record.judgment.notes());
    }
    if let Some(planned) = &record.action {
        println!("plan: {} - {}", planned.action.name(), planned.why);
    }
}

fn print_summary(report: &RunReport) {
    let verdict = match report.outcome {
        RunOutcome::Unresolved => "unresolved".to_string(),
        _ => report.verdict().map(|v| v.to_string()).unwrap_or_default(),
    };
    let expected = report
        .expected
        .map(|v| v.to_string())
        .unwrap_or_else(|| "-".to_string());
    let failure = report
        .failure()
        .map(|f| f.to_string())
        .unwrap_or_else(|| "None".to_string());

    println!("\nFINAL: {} | expected: {}", verdict, expected);
    println!("failure_type: {}", failure);
    if let Some(notes) = report.notes.as_deref().filter(|n| !n.is_empty()) {
        println!("notes: {}", notes);
    }
    println!("Oracle calls: {} | Steps: {}", report.oracle_calls, report.steps_taken);
}

fn parse_hex_color(hex: &str) -> Result<[u8; 3], Box<dyn Error>> {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return Err("Color must be 6 hex digits (e.g., 'fafafa')".into());
    }
    let r = u8::from_str_radix(&hex[0..2], 16)?;
    let g = u8::from_str_radix(&hex[2..4], 16)?;
    let b = u8::from_str_radix(&hex[4..6], 16)?;
    Ok([r, g, b])
}
