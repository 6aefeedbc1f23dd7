use std::{env, process};

use bindery::{
    application::{build::BuildPipeline, error::BuildError, init::write_config_template},
    config::{self, BuildArgs, Command, InitArgs},
    infra::{browser::ChromiumLauncher, error::InfraError, telemetry},
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &BuildError) {
    let messages = error.messages();
    let emit = || {
        error!(
            kind = error.kind(),
            error = %error,
            chain = ?messages.get(1..).unwrap_or_default(),
            "build failed"
        );
    };

    if dispatcher::has_been_set() {
        emit();
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, emit);
}

async fn run() -> Result<(), BuildError> {
    let cli = config::parse_cli();
    let cwd = env::current_dir().map_err(InfraError::from)?;

    match cli.command {
        Command::Build(args) => run_build(&args, &cwd).await,
        Command::Init(args) => run_init(&args, &cwd),
    }
}

async fn run_build(args: &BuildArgs, cwd: &std::path::Path) -> Result<(), BuildError> {
    let resolved = config::resolve(args, cwd)?;
    telemetry::init(&resolved.config.logging)?;

    let pipeline = BuildPipeline::new(ChromiumLauncher);
    let report = pipeline.run(&resolved).await?;
    info!(
        output = %report.output_file.display(),
        entries = report.entries,
        outline_items = report.outline_items,
        staging = %report.staging_dir.display(),
        "PDF written"
    );
    Ok(())
}

fn run_init(args: &InitArgs, cwd: &std::path::Path) -> Result<(), BuildError> {
    telemetry::init(&config::LoggingSettings::default())?;
    let path = write_config_template(cwd, args.force)?;
    info!(path = %path.display(), "Created configuration file");
    Ok(())
}
