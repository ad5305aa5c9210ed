use crate::Kinetics::errors::IsoKinError;
use crate::Kinetics::model_builder::{IsotopologueModelBuilder, write_batch};
use crate::Utils::load_from_file::load_task_from_file;
use clap::{CommandFactory, Parser, Subcommand};
use log::{LevelFilter, error, info};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// IsoKin: isotopologue models of metabolic networks as C code
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "isokin", about = "Isotopologue models of metabolic networks as C code")]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Option<Command>,
    /// Debug logging.
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Write the C code of one task.
    Build {
        /// JSON task file.
        task: PathBuf,
        /// Output file, the task default when absent.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Print the array layout of a task.
    Layout {
        /// JSON task file.
        task: PathBuf,
    },
    /// Write the C code of several tasks in parallel.
    Batch {
        /// JSON task files.
        #[arg(required = true)]
        tasks: Vec<PathBuf>,
        /// Directory receiving `<name>.c` per task.
        #[arg(long)]
        out_dir: PathBuf,
    },
    /// Interactive menu.
    Menu,
}

pub fn init_logger(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    // a second initialization (tests, repeated menu runs) keeps the first logger
    let _ = TermLogger::init(level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto);
}

fn task_dir(task: &Path) -> PathBuf {
    match task.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// builder of a task file, network files are resolved next to it
pub fn builder_for_task(task: &Path) -> Result<(IsotopologueModelBuilder, PathBuf), IsoKinError> {
    let file_name = task.display().to_string();
    let model_task = load_task_from_file(&file_name)?;
    let base_dir = task_dir(task);
    let builder = IsotopologueModelBuilder::from_task(&model_task, &base_dir)?;
    Ok((builder, model_task.output_path(&base_dir)))
}

pub fn run(cli: &CliArgs) -> Result<(), IsoKinError> {
    match &cli.command {
        None => {
            let _ = CliArgs::command().print_help();
        }
        Some(Command::Menu) => run_interactive_menu(),
        Some(Command::Build { task, output }) => {
            let (builder, default_output) = builder_for_task(task)?;
            let path = output.clone().unwrap_or(default_output);
            builder.write_ccode_to_path(&path)?;
            println!("{}", path.display());
        }
        Some(Command::Layout { task }) => {
            let (builder, _) = builder_for_task(task)?;
            builder.build()?.layout_table().printstd();
        }
        Some(Command::Batch { tasks, out_dir }) => {
            let mut jobs = Vec::with_capacity(tasks.len());
            for task in tasks {
                let (builder, _) = builder_for_task(task)?;
                let path = out_dir.join(format!("{}.c", builder.system_name));
                jobs.push((builder, path));
            }
            let mut failed = None;
            for result in write_batch(&jobs) {
                match result {
                    Ok(path) => println!("{}", path.display()),
                    Err(e) => {
                        failed.get_or_insert(e);
                    }
                }
            }
            if let Some(e) = failed {
                return Err(e);
            }
            info!("{} models written to {}", jobs.len(), out_dir.display());
        }
    }
    Ok(())
}

pub fn run_interactive_menu() {
    loop {
        show_main_menu();
        let choice = get_user_input();
        match choice.trim() {
            "1" => {
                let task = ask("Task file: ");
                let output = ask("Output file (empty for the task default): ");
                let output = (!output.is_empty()).then(|| PathBuf::from(output));
                report(run(&CliArgs {
                    command: Some(Command::Build {
                        task: PathBuf::from(task),
                        output,
                    }),
                    verbose: false,
                }));
            }
            "2" => {
                let task = ask("Task file: ");
                report(run(&CliArgs {
                    command: Some(Command::Layout {
                        task: PathBuf::from(task),
                    }),
                    verbose: false,
                }));
            }
            "3" => {
                let _ = CliArgs::command().print_help();
            }
            "0" => {
                println!("Goodbye!");
                break;
            }
            _ => println!("Invalid choice. Please try again."),
        }
    }
}

fn report(result: Result<(), IsoKinError>) {
    if let Err(e) = result {
        error!("{}", e);
        println!("\x1b[31m{}\x1b[0m", e);
    }
}

fn show_main_menu() {
    println!("\x1b[34m\n IsoKin: isotopologue models of metabolic networks \n\x1b[0m");
    println!("\x1b[33m1. Build C code of a task\x1b[0m");
    println!("\x1b[33m2. Show array layout of a task\x1b[0m");
    println!("\x1b[33m3. Help\x1b[0m");
    println!("\x1b[33m0. Exit\x1b[0m");
    print!("\x1b[36mEnter your choice: \x1b[0m");
    let _ = io::stdout().flush();
}

fn ask(prompt: &str) -> String {
    print!("\x1b[36m{}\x1b[0m", prompt);
    let _ = io::stdout().flush();
    get_user_input().trim().to_string()
}

/// end of input reads as "0" so the menu exits
fn get_user_input() -> String {
    let mut input = String::new();
    match io::stdin().read_line(&mut input) {
        Ok(0) => "0".to_string(),
        Ok(_) => input,
        Err(e) => {
            error!("Failed to read input: {}", e);
            "0".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn parse(items: &[&str]) -> Result<CliArgs, clap::Error> {
        CliArgs::try_parse_from(std::iter::once("isokin").chain(items.iter().copied()))
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse(&[]).unwrap().command, None);
        assert_eq!(parse(&["menu"]).unwrap().command, Some(Command::Menu));
        let cli = parse(&["build", "task.json", "--output", "m.c", "--verbose"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(
            cli.command,
            Some(Command::Build {
                task: PathBuf::from("task.json"),
                output: Some(PathBuf::from("m.c"))
            })
        );
        let cli = parse(&["-v", "batch", "a.json", "b.json", "--out-dir", "gen"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(
            cli.command,
            Some(Command::Batch {
                tasks: vec![PathBuf::from("a.json"), PathBuf::from("b.json")],
                out_dir: PathBuf::from("gen")
            })
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse(&["build"]).is_err());
        assert!(parse(&["batch", "a.json"]).is_err());
        assert!(parse(&["batch", "--out-dir", "gen"]).is_err());
        assert!(parse(&["build", "t.json", "--output"]).is_err());
        assert!(parse(&["build", "t.json", "--fast"]).is_err());
        assert!(parse(&["compile", "t.json"]).is_err());
    }

    #[test]
    fn test_build_and_batch_commands() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("single.json"),
            r#"{"name": "single", "system": "A + B | {1:1}\nA_B : A <=> B",
                "labeled_species": {"A": {"0": 0.0, "1": 1.0}}}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("chain.json"),
            r#"{"name": "chain", "system": "A + B | {1:1}\nB + C | {1:1}\nA => B\nB => C"}"#,
        )
        .unwrap();

        let task = dir.path().join("single.json");
        run(&CliArgs {
            command: Some(Command::Build {
                task: task.clone(),
                output: None,
            }),
            verbose: false,
        })
        .unwrap();
        let code = fs::read_to_string(dir.path().join("single.c")).unwrap();
        assert!(code.contains("/*dB1/dt=*/ out[1] = ( +fA_B*(A1)-rA_B*(B1) )/ pool_B ;"));

        let out_dir = dir.path().join("gen");
        fs::create_dir(&out_dir).unwrap();
        run(&CliArgs {
            command: Some(Command::Batch {
                tasks: vec![task, dir.path().join("chain.json")],
                out_dir: out_dir.clone(),
            }),
            verbose: false,
        })
        .unwrap();
        assert!(out_dir.join("single.c").exists());
        assert!(out_dir.join("chain.c").exists());
    }

    #[test]
    fn test_missing_task_file() {
        let result = run(&CliArgs {
            command: Some(Command::Layout {
                task: PathBuf::from("no_such_task.json"),
            }),
            verbose: false,
        });
        assert!(matches!(result, Err(IsoKinError::Io(_))));
    }
}
