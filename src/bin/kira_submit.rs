use std::process::ExitCode;
use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use kira_submit::app::{App, CheckResult, NopXmlGenerator, ValidateOptions, ValidateResult};
use kira_submit::config::{ConfigLoader, ResolvedConfig};
use kira_submit::contexts::Context;
use kira_submit::error::KiraError;
use kira_submit::lookup::EnaHttpLookup;
use kira_submit::output::{JsonOutput, OutputMode, StderrProgress};
use kira_submit::validation::Severity;

#[derive(Parser)]
#[command(name = "kira-submit")]
#[command(about = "Validate submission manifests and prepare checksum-verified submission bundles")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Validate a manifest and prepare its submission bundle")]
    Validate(ManifestArgs),
    #[command(about = "Check whether the prepared submission bundle is still current")]
    Check(ManifestArgs),
}

#[derive(Args, Clone)]
struct ManifestArgs {
    #[arg(long)]
    context: Option<Context>,

    #[arg(long)]
    manifest: Utf8PathBuf,

    #[arg(long)]
    input_dir: Option<Utf8PathBuf>,

    #[arg(long)]
    output_dir: Option<Utf8PathBuf>,

    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    force: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(kira) = report.downcast_ref::<KiraError>() {
            return ExitCode::from(map_exit_code(kira));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &KiraError) -> u8 {
    match error {
        KiraError::ValidationFailed { .. } => 2,
        KiraError::MissingConfig
        | KiraError::ConfigRead(_)
        | KiraError::ConfigParse(_)
        | KiraError::UnknownContext(_) => 2,
        KiraError::Authentication(_) | KiraError::LookupHttp(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    match cli.command {
        Commands::Validate(args) => run_validate(args, output_mode),
        Commands::Check(args) => run_check(args, output_mode),
    }
}

fn build_app(args: &ManifestArgs) -> miette::Result<App<NopXmlGenerator>> {
    let config: ResolvedConfig = ConfigLoader::resolve_or_default(args.config.as_deref())?;
    let context = args.context.or(config.context).ok_or_else(|| {
        KiraError::UnknownContext("none given; pass --context genome|reads".to_string())
    })?;
    let input_dir = args
        .input_dir
        .clone()
        .or(config.input_dir)
        .unwrap_or_else(|| Utf8PathBuf::from("."));
    let output_dir = args
        .output_dir
        .clone()
        .or(config.output_dir)
        .unwrap_or_else(|| input_dir.clone());

    let lookup = EnaHttpLookup::new(
        Some(config.lookup.base_url.as_str()),
        config.lookup.credentials(),
    )?;
    let schema = context.schema(Arc::new(lookup))?;
    Ok(App::new(context, schema, input_dir, output_dir, NopXmlGenerator))
}

fn run_validate(args: ManifestArgs, output_mode: OutputMode) -> miette::Result<()> {
    let app = build_app(&args)?;
    let options = ValidateOptions { force: args.force };
    let result = match output_mode {
        OutputMode::NonInteractive => {
            let result = app.validate(&args.manifest, options, &JsonOutput)?;
            JsonOutput::print_validate(&result).into_diagnostic()?;
            result
        }
        OutputMode::Interactive => {
            let result = app.validate(&args.manifest, options, &StderrProgress)?;
            print_validate_summary(&result);
            result
        }
    };

    if result.valid {
        return Ok(());
    }
    if result.has_authentication_error() {
        return Err(KiraError::Authentication(
            "the reference lookup rejected the configured credentials".to_string(),
        )
        .into());
    }
    Err(KiraError::ValidationFailed {
        errors: result.errors,
    }
    .into())
}

fn run_check(args: ManifestArgs, output_mode: OutputMode) -> miette::Result<()> {
    let app = build_app(&args)?;
    match output_mode {
        OutputMode::NonInteractive => {
            let result = app.check(&args.manifest, &JsonOutput)?;
            JsonOutput::print_check(&result).into_diagnostic()?;
        }
        OutputMode::Interactive => {
            let result = app.check(&args.manifest, &StderrProgress)?;
            print_check_summary(&result);
        }
    }
    Ok(())
}

fn print_validate_summary(result: &ValidateResult) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let red = "\x1b[31m";
    let reset = "\x1b[0m";

    println!("{cyan}KIRA-SUBMIT {} manifest{reset}", result.context);
    for message in result.validation.messages() {
        let colour = match message.severity() {
            Severity::Error => red,
            Severity::Info => yellow,
        };
        println!("{colour}{message}{reset}");
    }
    if result.valid {
        println!("{green}Manifest is valid{reset}");
        if let Some(group) = &result.file_group {
            println!("  file group: {group}");
        }
        if let Some(bundle) = &result.bundle {
            let action = if result.cached { "reused" } else { "written" };
            println!(
                "  submission bundle {action}: {} ({} file(s), {} bytes to upload)",
                bundle.submit_dir,
                bundle.upload_files.len(),
                bundle.upload_size()
            );
        }
    } else {
        println!("{red}Manifest is invalid: {} error(s){reset}", result.errors);
    }
    println!("  report: {}", result.report);
}

fn print_check_summary(result: &CheckResult) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let reset = "\x1b[0m";

    if result.reusable {
        println!("{green}Submission bundle is current{reset}");
    } else {
        println!("{yellow}Submission bundle must be regenerated{reset}");
    }
    if let Some(path) = &result.bundle_path {
        println!("  bundle: {path}");
    }
    for finding in &result.findings {
        println!("  {finding}");
    }
}
