use std::path::PathBuf;

use clap::{Parser, Subcommand};
use docquery::Result;
use docquery::commands::{ask, chat, load_config, show_status};
use docquery::config::{resolve_config_dir, run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "docquery")]
#[command(about = "Ask questions about your documents using retrieval-augmented generation")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml (defaults to ~/.docquery)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the embedding and generation services
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Index documents and answer one question about them
    Ask {
        /// PDF, text or markdown file to index (repeatable)
        #[arg(short, long = "file", required = true)]
        files: Vec<PathBuf>,
        /// Question to answer from the documents
        question: String,
    },
    /// Index documents and answer questions read from stdin
    Chat {
        /// PDF, text or markdown file to index (repeatable)
        #[arg(short, long = "file")]
        files: Vec<PathBuf>,
    },
    /// Show configuration and upstream service reachability
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&load_config(cli.config_dir)?);
            } else {
                let config_dir = resolve_config_dir(cli.config_dir)
                    .map_err(|e| docquery::DocQueryError::Config(e.to_string()))?;
                run_interactive_config(&config_dir)?;
            }
        }
        Commands::Ask { files, question } => {
            ask(&load_config(cli.config_dir)?, &files, question).await?;
        }
        Commands::Chat { files } => {
            chat(&load_config(cli.config_dir)?, &files).await?;
        }
        Commands::Status => {
            show_status(&load_config(cli.config_dir)?).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn status_command() {
        let cli = Cli::try_parse_from(["docquery", "status"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert!(matches!(parsed.command, Commands::Status));
            assert_eq!(parsed.config_dir, None);
        }
    }

    #[test]
    fn ask_command_with_files() {
        let cli = Cli::try_parse_from([
            "docquery",
            "ask",
            "--file",
            "report.pdf",
            "-f",
            "notes.md",
            "What changed in Q3?",
        ]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Ask { files, question } = parsed.command {
                assert_eq!(
                    files,
                    vec![PathBuf::from("report.pdf"), PathBuf::from("notes.md")]
                );
                assert_eq!(question, "What changed in Q3?");
            } else {
                panic!("expected ask command");
            }
        }
    }

    #[test]
    fn ask_requires_a_file() {
        let cli = Cli::try_parse_from(["docquery", "ask", "Why?"]);
        assert!(cli.is_err());

        if let Err(e) = cli {
            assert_eq!(e.kind(), ErrorKind::MissingRequiredArgument);
        }
    }

    #[test]
    fn ask_requires_a_question() {
        let cli = Cli::try_parse_from(["docquery", "ask", "--file", "a.pdf"]);
        assert!(cli.is_err());
    }

    #[test]
    fn chat_files_are_optional() {
        let cli = Cli::try_parse_from(["docquery", "chat"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Chat { files } = parsed.command {
                assert!(files.is_empty());
            } else {
                panic!("expected chat command");
            }
        }
    }

    #[test]
    fn config_command() {
        let cli = Cli::try_parse_from(["docquery", "config", "--show"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert!(matches!(parsed.command, Commands::Config { show: true }));
        }
    }

    #[test]
    fn global_config_dir() {
        let cli = Cli::try_parse_from(["docquery", "status", "--config-dir", "/tmp/dq"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert_eq!(parsed.config_dir, Some(PathBuf::from("/tmp/dq")));
        }
    }

    #[test]
    fn invalid_subcommand() {
        let cli = Cli::try_parse_from(["docquery", "serve"]);
        assert!(cli.is_err());

        if let Err(e) = cli {
            assert_eq!(e.kind(), ErrorKind::InvalidSubcommand);
        }
    }
}
