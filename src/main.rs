use std::env;
use std::path::{Path, PathBuf};

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use cmdlang::{EngineError, Shell, ShellConfig};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let mut shell = Shell::with_config(ShellConfig::from_env());
    if let Err(e) = shell.run_init_commands().await {
        eprintln!("cmdlang: Error in init commands: {}", e);
    }

    // Startup script from the home directory, else the current one
    let startup_script_name = ".cmdlangrc";
    let home_startup = env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(startup_script_name))
        .filter(|p| p.exists());
    let startup_path = home_startup.unwrap_or_else(|| PathBuf::from(startup_script_name));
    if startup_path.exists() {
        if let Err(e) = shell.execute_script_from_path(&startup_path).await {
            eprintln!(
                "cmdlang: Error in startup script '{}': {}",
                startup_path.display(),
                e
            );
        }
    }

    let args: Vec<String> = env::args().collect();
    if let Some(script_path) = args.get(1) {
        if let Err(e) = shell.execute_script_from_path(Path::new(script_path)).await {
            eprintln!("cmdlang: Error executing script '{}': {}", script_path, e);
            std::process::exit(1);
        }
    } else if let Err(e) = run_interactive_shell(shell).await {
        eprintln!("cmdlang: A critical error occurred: {}", e);
    }
}

async fn run_interactive_shell(mut shell: Shell) -> Result<(), EngineError> {
    let mut rl = DefaultEditor::new().map_err(|e| EngineError::Init(e.to_string()))?;
    let history_path = env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".cmdlang_history"));

    if let Some(ref path) = history_path {
        if path.exists() {
            let _ = rl.load_history(path);
        }
    }

    loop {
        match rl.readline("cmdlang> ") {
            Ok(line) => {
                let _ = rl.add_history_entry(&line);
                if !line.trim().is_empty() {
                    // Commands print their own output and the shell reports failures
                    let _ = shell.execute(&line).await;
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
            }
            Err(ReadlineError::Eof) => {
                println!("exit");
                break;
            }
            Err(err) => {
                eprintln!("cmdlang: Readline error: {}", err);
                break;
            }
        }

        if shell.should_exit() {
            break;
        }
    }

    if let Some(ref path) = history_path {
        let _ = rl.save_history(path);
    }

    Ok(())
}
