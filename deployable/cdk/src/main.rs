use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use golambda_stack_core::app::DEFAULT_OUTDIR;
use golambda_stack_core::{App, DeploymentEnvironment, StackProps};
use golambda_test_stack::{DescriptorConfig, GolambdaTestStack, STACK_NAME};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "golambda_test_stack",
    about = "Declare the golambda-test stack and synthesize it into a cloud assembly"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the cloud assembly for the stack
    Synth(StackArgs),
    /// Print the stacks this app declares
    List(StackArgs),
}

#[derive(Args)]
struct StackArgs {
    /// Cloud assembly output directory
    #[arg(long, default_value = DEFAULT_OUTDIR)]
    output: PathBuf,
    /// Declare the function without an environment block
    #[arg(long)]
    without_environment: bool,
    /// Account the stack is pinned to
    #[arg(long, env = "CDK_DEFAULT_ACCOUNT")]
    account: Option<String>,
    /// Region the stack is pinned to
    #[arg(long, env = "CDK_DEFAULT_REGION")]
    region: Option<String>,
    /// Stack description
    #[arg(long)]
    description: Option<String>,
    /// Stack-level tag, repeatable
    #[arg(long = "tag", value_name = "KEY=VALUE", value_parser = parse_tag)]
    tags: Vec<(String, String)>,
}

impl StackArgs {
    fn stack_props(&self) -> StackProps {
        let env = (self.account.is_some() || self.region.is_some()).then(|| DeploymentEnvironment {
            account: self.account.clone(),
            region: self.region.clone(),
        });

        StackProps {
            description: self.description.clone(),
            env,
            tags: self.tags.iter().cloned().collect::<BTreeMap<_, _>>(),
        }
    }
}

fn parse_tag(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("tag '{raw}' must be KEY=VALUE"))?;
    if key.trim().is_empty() {
        return Err(format!("tag '{raw}' has an empty key"));
    }
    Ok((key.trim().to_string(), value.to_string()))
}

fn build_app(args: &StackArgs) -> Result<(App, GolambdaTestStack), Box<dyn std::error::Error>> {
    let config = DescriptorConfig::from_process_env(!args.without_environment);
    let mut app = App::new();
    let stack = GolambdaTestStack::new(&mut app, STACK_NAME, args.stack_props(), &config)?;
    Ok((app, stack))
}

fn log_filter() -> Result<EnvFilter, Box<dyn std::error::Error>> {
    Ok(EnvFilter::from_default_env()
        .add_directive("golambda_stack_core=info".parse()?)
        .add_directive("golambda_test_stack=info".parse()?))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter()?)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Synth(args) => {
            let (app, stack) = build_app(&args)?;
            let assembly = app.synth(&args.output)?;
            info!(
                stack = stack.stack(&app).name(),
                outdir = %assembly.directory.display(),
                "synthesis complete"
            );
        }
        Commands::List(args) => {
            let (app, _) = build_app(&args)?;
            for stack in app.stacks() {
                println!("{}", stack.name());
            }
        }
    }

    Ok(())
}
