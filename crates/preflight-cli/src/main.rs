use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use preflight_core::config::Config;
use preflight_core::extract::extract_binary_path;
use preflight_core::persist::CONFIG_FILE;
use preflight_core::persist::RunLogStore;
use preflight_core::persist::RunStatus;
use preflight_core::persist::SETTINGS_DIR;
use preflight_core::persist::TargetFile;
use preflight_exec::runner::run_test_build;

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32, Box<dyn std::error::Error>> {
    let mut args = env::args().skip(1);
    let Some(command) = args.next() else {
        print_help();
        return Ok(0);
    };

    match command.as_str() {
        "--help" | "-h" | "help" => {
            print_help();
            Ok(0)
        }
        "--version" | "-V" | "version" => {
            println!("preflight {}", env!("CARGO_PKG_VERSION"));
            Ok(0)
        }
        "build-tests" => {
            let repo = parse_repo_arg(args.collect::<Vec<_>>())?;
            build_tests(repo)
        }
        "target" => {
            let repo = parse_repo_arg(args.collect::<Vec<_>>())?;
            show_target(repo)
        }
        _ => {
            print_help();
            Err(format!("unknown command: {command}").into())
        }
    }
}

fn parse_repo_arg(args: Vec<String>) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let mut repo = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--repo" => {
                let Some(value) = args.get(i + 1) else {
                    return Err("--repo requires a path".into());
                };
                repo = Some(PathBuf::from(value));
                i += 2;
            }
            other => {
                return Err(format!("unsupported argument: {other}").into());
            }
        }
    }
    Ok(repo.unwrap_or_else(|| PathBuf::from(".")))
}

fn build_tests(repo: PathBuf) -> Result<i32, Box<dyn std::error::Error>> {
    let repo = repo.canonicalize()?;
    let config = load_config(&repo)?;
    let mut log = RunLogStore::in_repo(&repo)?;

    eprintln!(
        "> Building tests with `{} {}`...",
        config.build.program,
        config.build.args.join(" ")
    );
    let build = run_test_build(&repo, &config.build)?;

    if build.exit_code != 0 {
        log.append(build.exit_code, None, RunStatus::BuildFailed)?;
        print!("{}", build.combined_output);
        eprintln!("> Build failed with exit code {}", build.exit_code);
        // Mirror the build tool's exit code so automation can tell build
        // breakage apart from helper breakage.
        return Ok(build.exit_code);
    }

    let extracted = extract_binary_path(&build.combined_output, config.extract.strategy)?;
    let Some(binary) = extracted else {
        log.append(build.exit_code, None, RunStatus::NoBinaryFound)?;
        print!("{}", build.combined_output);
        eprintln!("> Build succeeded but no test executable was reported; target file left untouched");
        return Ok(1);
    };

    let target = TargetFile::in_repo(&repo);
    target.write(&binary)?;
    log.append(build.exit_code, Some(binary.clone()), RunStatus::Succeeded)?;

    println!("{binary}");
    eprintln!("> Wrote {}", target.path().display());
    eprintln!(
        "> Debug adapter: {} {}",
        config.adapter.program, config.adapter.port_arg
    );
    Ok(0)
}

fn show_target(repo: PathBuf) -> Result<i32, Box<dyn std::error::Error>> {
    let repo = repo.canonicalize()?;
    let target = TargetFile::in_repo(&repo);
    match target.read()? {
        Some(path) => {
            println!("{path}");
            Ok(0)
        }
        None => {
            eprintln!("> No test binary recorded; run `preflight build-tests` first");
            Ok(1)
        }
    }
}

fn load_config(repo: &Path) -> Result<Config, Box<dyn std::error::Error>> {
    if let Some(config) = read_config_file(&repo.join(SETTINGS_DIR).join(CONFIG_FILE))? {
        return Ok(config);
    }
    if let Some(dir) = dirs::config_dir() {
        if let Some(config) = read_config_file(&dir.join("preflight").join(CONFIG_FILE))? {
            return Ok(config);
        }
    }
    Ok(Config::default())
}

fn read_config_file(path: &Path) -> Result<Option<Config>, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(path)?;
    let config = toml::from_str::<Config>(&text)
        .map_err(|err| format!("invalid config {}: {err}", path.display()))?;
    Ok(Some(config))
}

fn print_help() {
    println!("preflight {}", env!("CARGO_PKG_VERSION"));
    println!("Usage:");
    println!("  preflight build-tests [--repo PATH]");
    println!("  preflight target [--repo PATH]");
    println!("  preflight --help");
    println!("  preflight --version");
}
