use std::fs;
use std::path::{Path, PathBuf};
use std::process::{exit, Command, ExitStatus};

use clap::{Parser, Subcommand, ValueEnum};

const HANDLER_PACKAGE: &str = "golambda";
const HANDLER_BIN: &str = "decap_event";
const STACK_PACKAGE: &str = "golambda_test_stack";
const BUILD_DIR: &str = "deployable/build";

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the golambda workspace",
    long_about = "Builds the deployable handler, synthesizes the golambda-test\n\
                  cloud assembly, and runs CI checks."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the example handler and stage it as deployable/build/bootstrap
    Package {
        /// Compilation target triple for the Lambda binary
        #[arg(long, default_value = "x86_64-unknown-linux-gnu")]
        target: String,
        /// Build profile used for the binary
        #[arg(value_enum, long, default_value_t = BuildProfile::Release)]
        profile: BuildProfile,
    },
    /// Synthesize the golambda-test stack into a cloud assembly
    Synth {
        /// Cloud assembly output directory
        #[arg(long, default_value = "cdk.out")]
        output: String,
        /// Declare the function without an environment block
        #[arg(long)]
        without_environment: bool,
    },
    /// Package the handler, then synthesize
    Release {
        #[arg(long, default_value = "x86_64-unknown-linux-gnu")]
        target: String,
        #[arg(long, default_value = "cdk.out")]
        output: String,
    },
    /// Run CI checks (fmt, clippy, tests)
    Ci {
        /// Job to run
        #[arg(value_enum, default_value_t = CiJob::Check)]
        job: CiJob,
    },
}

#[derive(Clone, ValueEnum)]
enum CiJob {
    /// Formatting, clippy, and tests
    Check,
    /// Synthesize both descriptor variants into scratch directories
    Synth,
    /// Run check + synth
    All,
}

#[derive(Clone, Copy, ValueEnum)]
enum BuildProfile {
    Debug,
    Release,
}

impl BuildProfile {
    fn dir_name(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "release",
        }
    }

    fn as_cargo_flag(self) -> Option<&'static str> {
        match self {
            Self::Debug => None,
            Self::Release => Some("--release"),
        }
    }
}

// ── helpers ────────────────────────────────────────────────────────

fn step(label: &str) {
    eprintln!("\n=== {label} ===");
}

fn cargo(args: &[&str]) -> ExitStatus {
    eprintln!("+ cargo {}", args.join(" "));
    Command::new("cargo")
        .args(args)
        .status()
        .expect("failed to execute cargo")
}

fn run_cargo(args: &[&str]) {
    let status = cargo(args);
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

fn package_handler(target: &str, profile: BuildProfile) {
    ensure_rust_target_installed(target);

    step("Build deployable handler");

    let mut cargo_args = vec![
        "build",
        "-p",
        HANDLER_PACKAGE,
        "--target",
        target,
        "--bin",
        HANDLER_BIN,
    ];
    if let Some(flag) = profile.as_cargo_flag() {
        cargo_args.push(flag);
    }
    run_cargo(&cargo_args);

    step("Stage bootstrap into the build directory");
    let binary = Path::new("target")
        .join(target)
        .join(profile.dir_name())
        .join(binary_name(HANDLER_BIN, target));
    let bootstrap = stage_bootstrap(&binary, Path::new(BUILD_DIR));

    eprintln!("\nStaged artifact:\n- {}", bootstrap.display());
}

fn synth(output: &str, without_environment: bool) {
    step("Synthesize golambda-test");

    let mut args = vec!["run", "-p", STACK_PACKAGE, "--", "synth", "--output", output];
    if without_environment {
        args.push("--without-environment");
    }
    run_cargo(&args);
}

fn ensure_rust_target_installed(target: &str) {
    let output = Command::new("rustup")
        .args(["target", "list", "--installed"])
        .output();

    let output = match output {
        Ok(value) => value,
        Err(error) => {
            eprintln!(
                "warning: failed to run `rustup target list --installed` ({error}); continuing without target preflight"
            );
            return;
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        panic!(
            "failed to list installed rust targets; run `rustup target list --installed` manually. details: {}",
            stderr.trim()
        );
    }

    let installed = String::from_utf8_lossy(&output.stdout);
    if !installed.lines().any(|line| line.trim() == target) {
        panic!(
            "required rust target `{target}` is not installed. install it with `rustup target add {target}` and re-run `cargo run -p xtask -- package`"
        );
    }
}

fn binary_name(bin_name: &str, target: &str) -> String {
    if target.contains("windows") {
        format!("{bin_name}.exe")
    } else {
        bin_name.to_string()
    }
}

/// Copies the handler binary to `<build_dir>/bootstrap`, the file name the
/// custom runtime executes, and marks it executable.
fn stage_bootstrap(binary_path: &Path, build_dir: &Path) -> PathBuf {
    if !binary_path.exists() {
        panic!("expected handler binary at '{}'", binary_path.display());
    }

    fs::create_dir_all(build_dir).expect("failed to create build directory");
    let bootstrap = build_dir.join("bootstrap");
    fs::copy(binary_path, &bootstrap).expect("failed to copy handler binary");
    mark_executable(&bootstrap);
    bootstrap
}

#[cfg(unix)]
fn mark_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .expect("failed to mark bootstrap executable");
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) {}

// ── CI jobs ────────────────────────────────────────────────────────

fn ci_check() {
    step("Check formatting");
    run_cargo(&["fmt", "--all", "--", "--check"]);

    step("Clippy");
    run_cargo(&[
        "clippy",
        "--all-targets",
        "--all-features",
        "--",
        "-D",
        "warnings",
    ]);

    step("Test workspace");
    run_cargo(&["test", "--workspace"]);
}

fn ci_synth() {
    synth("target/ci/cdk.out", false);
    synth("target/ci/cdk.out.plain", true);
}

// ── main ───────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Package { target, profile } => {
            package_handler(&target, profile);
        }
        Commands::Synth {
            output,
            without_environment,
        } => {
            synth(&output, without_environment);
        }
        Commands::Release { target, output } => {
            package_handler(&target, BuildProfile::Release);
            synth(&output, false);
        }
        Commands::Ci { job } => {
            match job {
                CiJob::Check => ci_check(),
                CiJob::Synth => ci_synth(),
                CiJob::All => {
                    ci_check();
                    ci_synth();
                }
            }
            eprintln!("\nCI job passed.");
        }
    }
}
