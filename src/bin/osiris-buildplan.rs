//! Osiris Build Plan Tooling
//!
//! This is the entry-point of `osiris-buildplan`, a command-line tool to
//! resolve the build configuration of the Android embedding of an
//! application. Its main input is the `osiris-platform.toml` manifest, which
//! specifies the application and its build configuration. This tool reads
//! the manifest, resolves it into a build plan, and hands the plan to the
//! platform build tools.
//!
//! This CLI is mainly a dispatcher of all the operations available in
//! `osiris_buildplan::op::*`. It is a simple clap-based CLI that forwards the
//! arguments to `osiris_buildplan` and visualizes the results. Exit code `1`
//! signals configuration or operation failures, exit code `2` signals usage
//! errors.

use clap;
use osiris_buildplan;
use tracing_subscriber;

use osiris_buildplan::op;
use osiris_buildplan::signing::BuildType;
use osiris_buildplan::version::LanguageLevel;

struct Cli {
    cmd: clap::Command,
}

fn arg_build_type(
    s: &str,
) -> Result<BuildType, clap::error::Error> {
    s.parse().map_err(
        |_| {
            clap::error::Error::raw(
                clap::error::ErrorKind::ValueValidation,
                "Invalid build type, expected `debug` or `release`",
            )
        }
    )
}

fn arg_language_level(
    s: &str,
) -> Result<LanguageLevel, clap::error::Error> {
    let raw = osiris_buildplan::manifest::RawLevel::Text(s.to_string());

    LanguageLevel::parse(&raw, "default-language-level").map_err(
        |_| {
            clap::error::Error::raw(
                clap::error::ErrorKind::ValueValidation,
                "Invalid language level",
            )
        }
    )
}

// Install the log subscriber
//
// Logs go to STDERR, filtered via `OSIRIS_LOG` (using the `RUST_LOG` syntax).
// Only warnings are shown by default.
fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("OSIRIS_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::IsTerminal::is_terminal(&std::io::stderr()))
        .with_target(false)
        .without_time()
        .init();
}

impl Cli {
    fn new() -> Self {
        let mut cmd;

        cmd = clap::Command::new("osiris-buildplan")
            .propagate_version(true)
            .subcommand_required(true)
            .about("Osiris Build Plan Tooling")
            .long_about("Resolve the build configuration of the Android embedding of applications")
            .version(clap::crate_version!());

        cmd = cmd.arg(
            clap::Arg::new("manifest")
                .long("manifest")
                .value_name("PATH")
                .help("Path to the platform manifest relative to the working directory")
                .default_value("./osiris-platform.toml")
                .value_parser(clap::builder::ValueParser::path_buf())
        );
        cmd = cmd.arg(
            clap::Arg::new("platform")
                .long("platform")
                .value_name("ID")
                .help("Platform entry of the manifest to operate on (defaults to the only entry)")
        );
        cmd = cmd.arg(
            clap::Arg::new("build-type")
                .long("build-type")
                .value_name("TYPE")
                .help("Build type to resolve the plan for (`debug` or `release`)")
                .default_value("release")
                .value_parser(arg_build_type)
        );

        // Defaults delegated to the framework toolchain.
        cmd = cmd.arg(
            clap::Arg::new("default-min-sdk")
                .long("default-min-sdk")
                .value_name("LEVEL")
                .help("Minimum SDK level used if the manifest declares none")
                .value_parser(clap::value_parser!(u32))
        );
        cmd = cmd.arg(
            clap::Arg::new("default-version-code")
                .long("default-version-code")
                .value_name("CODE")
                .help("Version code used if the manifest declares none")
                .value_parser(clap::value_parser!(u32))
        );
        cmd = cmd.arg(
            clap::Arg::new("default-version-name")
                .long("default-version-name")
                .value_name("NAME")
                .help("Version name used if the manifest declares none")
        );
        cmd = cmd.arg(
            clap::Arg::new("default-ndk-version")
                .long("default-ndk-version")
                .value_name("VERSION")
                .help("NDK version used if the manifest declares none")
        );
        cmd = cmd.arg(
            clap::Arg::new("default-language-level")
                .long("default-language-level")
                .value_name("LEVEL")
                .help("Java language level used if the manifest declares none")
                .value_parser(arg_language_level)
        );

        cmd = cmd.subcommand(
            clap::Command::new("check")
                .about("Validate the manifest and resolve the build plan")
        );

        cmd = cmd.subcommand(
            clap::Command::new("resolve")
                .about("Resolve the build plan and print it as JSON")
        );

        cmd = cmd.subcommand(
            clap::Command::new("emerge")
                .about("Write the build plan as persistent Gradle build scripts")
                .arg(
                    clap::Arg::new("dir")
                        .long("dir")
                        .value_name("PATH")
                        .help("Target directory (defaults to the platform path of the manifest)")
                        .value_parser(clap::builder::ValueParser::path_buf())
                )
                .arg(
                    clap::Arg::new("update")
                        .long("update")
                        .value_name("BOOL")
                        .help("Whether to allow updating existing platform integration")
                        .default_value("false")
                        .value_parser(clap::builder::ValueParser::bool())
                )
        );

        cmd = cmd.subcommand(
            clap::Command::new("build")
                .about("Build the platform integration with Gradle")
                .arg(
                    clap::Arg::new("target-dir")
                        .long("target-dir")
                        .value_name("PATH")
                        .help("Directory for build artifacts relative to the working directory")
                        .default_value("./target")
                        .value_parser(clap::builder::ValueParser::path_buf())
                )
        );

        Self {
            cmd: cmd,
        }
    }

    fn manifest_path<'m>(
        &self,
        m: &'m clap::ArgMatches,
    ) -> &'m std::path::Path {
        m.get_one::<std::path::PathBuf>("manifest")
            .expect("Manifest path lacks a value")
            .as_path()
    }

    // Directory the manifest is located in. Paths of the manifest are
    // relative to it.
    fn manifest_root<'m>(
        &self,
        m: &'m clap::ArgMatches,
    ) -> &'m std::path::Path {
        self.manifest_path(m)
            .parent()
            .unwrap_or_else(|| std::path::Path::new("."))
    }

    fn toolchain(
        &self,
        m: &clap::ArgMatches,
    ) -> osiris_buildplan::toolchain::Toolchain {
        let mut toolchain = osiris_buildplan::toolchain::Toolchain::default();

        if let Some(v) = m.get_one::<u32>("default-min-sdk") {
            toolchain.min_sdk = *v;
        }
        if let Some(v) = m.get_one::<u32>("default-version-code") {
            toolchain.version_code = *v;
        }
        if let Some(v) = m.get_one::<String>("default-version-name") {
            toolchain.version_name = v.clone();
        }
        if let Some(v) = m.get_one::<String>("default-ndk-version") {
            toolchain.ndk_version = Some(v.clone());
        }
        if let Some(v) = m.get_one::<LanguageLevel>("default-language-level") {
            toolchain.language_level = *v;
        }

        toolchain
    }

    // Parse the manifest and resolve the build plan. Warnings are logged by
    // the resolver, errors are reported here.
    fn plan(
        &self,
        m: &clap::ArgMatches,
    ) -> Result<osiris_buildplan::plan::BuildPlan, u8> {
        let manifest_path = self.manifest_path(m);

        let manifest = match osiris_buildplan::manifest::Manifest::parse_path(manifest_path) {
            Err(e) => {
                eprintln!("Cannot parse platform manifest {:?}: {}", manifest_path, e);
                return Err(1);
            },
            Ok(v) => v,
        };

        let request = op::resolve::Request {
            platform: m.get_one::<String>("platform").map(|v| v.as_str()),
            build_type: *m.get_one("build-type").expect("Build-type lacks a value"),
        };

        match op::resolve::resolve(
            &manifest,
            &request,
            &self.toolchain(m),
            &osiris_buildplan::plugin::Registry::default(),
        ) {
            Err(e) => {
                eprintln!("Cannot resolve build plan: {}", e);
                Err(1)
            },
            Ok(v) => Ok(v.plan),
        }
    }

    fn op_check(
        &self,
        m: &clap::ArgMatches,
    ) -> Result<(), u8> {
        self.plan(m).map(|_| ())
    }

    fn op_resolve(
        &self,
        m: &clap::ArgMatches,
    ) -> Result<(), u8> {
        let plan = self.plan(m)?;

        match plan.to_json() {
            Err(e) => {
                eprintln!("Cannot serialize build plan: {}", e);
                Err(1)
            },
            Ok(v) => {
                println!("{}", v);
                Ok(())
            },
        }
    }

    fn op_emerge(
        &self,
        m: &clap::ArgMatches,
        m_op: &clap::ArgMatches,
    ) -> Result<(), u8> {
        let plan = self.plan(m)?;
        let update = *m_op.get_one("update").expect("Update-flag lacks a value");
        let dir = match m_op.get_one::<std::path::PathBuf>("dir") {
            Some(v) => v.clone(),
            None => self.manifest_root(m).join(plan.platform_path()),
        };

        match op::emerge::emerge(&plan, &dir, update) {
            Err(op::emerge::Error::Already) => {
                eprintln!("Cannot emerge platform integration: Platform code already present");
                Err(1)
            },
            Err(e) => {
                eprintln!("Cannot emerge platform integration: {}", e);
                Err(1)
            },
            Ok(_) => {
                Ok(())
            },
        }
    }

    fn op_build(
        &self,
        m: &clap::ArgMatches,
        m_op: &clap::ArgMatches,
    ) -> Result<(), u8> {
        let plan = self.plan(m)?;
        let target = m_op.get_one::<std::path::PathBuf>("target-dir")
            .expect("Target-directory lacks a value");

        match op::build::build(&plan, self.manifest_root(m), target) {
            Err(e) => {
                eprintln!("Cannot build platform integration: {}", e);
                Err(1)
            },
            Ok(_) => {
                Ok(())
            },
        }
    }

    fn run(mut self) -> Result<(), u8> {
        let (m, r);

        r = self.cmd.try_get_matches_from_mut(
            std::env::args_os(),
        );

        match r {
            Ok(v) => m = v,
            Err(e) => {
                return match e.kind() {
                    clap::error::ErrorKind::DisplayHelp |
                    clap::error::ErrorKind::DisplayVersion => {
                        e.print().expect("Cannot write to STDERR");
                        Ok(())
                    },
                    _ => {
                        e.print().expect("Cannot write to STDERR");
                        Err(2)
                    }
                }
            }
        }

        init_logging();

        match m.subcommand() {
            Some(("check", _)) => self.op_check(&m),
            Some(("resolve", _)) => self.op_resolve(&m),
            Some(("emerge", m_op)) => self.op_emerge(&m, m_op),
            Some(("build", m_op)) => self.op_build(&m, m_op),
            _ => std::unreachable!(),
        }
    }
}

fn main() -> std::process::ExitCode {
    match Cli::new().run() {
        Ok(()) => 0.into(),
        Err(v) => v.into(),
    }
}
