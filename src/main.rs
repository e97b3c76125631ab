//! vita CLI: streamed health answers as a knowledge graph.

use std::io::{Read, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use vitagraph::client::{CancelToken, ChatClient, ChatMessage, ClientConfig, StreamEvent};
use vitagraph::graph::layout::{Direction, Viewport};
use vitagraph::session::{Role, Session, SessionConfig};

#[derive(Parser)]
#[command(name = "vita", version, about = "Health Q&A with a live knowledge graph")]
struct Cli {
    /// Chat-completions endpoint URL.
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Model name.
    #[arg(long, global = true, default_value = "gpt-4o")]
    model: String,

    /// Layout direction ("tb" or "lr").
    #[arg(long, global = true, default_value = "tb")]
    direction: Direction,

    /// Viewport width in pixels.
    #[arg(long, global = true, default_value = "1280")]
    width: f32,

    /// Viewport height in pixels.
    #[arg(long, global = true, default_value = "800")]
    height: f32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a question and stream the answer into a graph.
    Ask {
        /// The question to ask.
        question: String,

        /// API key (falls back to VITA_API_KEY).
        #[arg(long, env = "VITA_API_KEY", hide_env_values = true)]
        api_key: String,

        /// Print the final graph as JSON instead of a summary.
        #[arg(long)]
        json: bool,
    },

    /// Extract annotated triples from text (file or stdin) as JSON.
    Extract {
        /// Path to an annotated text file; stdin if omitted.
        file: Option<PathBuf>,
    },

    /// Build and lay out a graph from annotated text (file or stdin) as JSON.
    Graph {
        /// Path to an annotated text file; stdin if omitted.
        file: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let session_config = SessionConfig {
        direction: cli.direction,
        viewport: Viewport {
            width: cli.width,
            height: cli.height,
        },
        ..Default::default()
    };

    match cli.command {
        Commands::Ask {
            question,
            api_key,
            json,
        } => {
            let client = ChatClient::new(ClientConfig {
                endpoint: cli
                    .endpoint
                    .unwrap_or_else(|| ClientConfig::default().endpoint),
                model: cli.model,
                api_key,
                ..Default::default()
            });

            let mut session = Session::new(session_config);
            session.push_user(question);
            let history: Vec<ChatMessage> = session
                .messages()
                .iter()
                .map(|m| ChatMessage {
                    role: match m.role {
                        Role::User => "user",
                        Role::Assistant => "assistant",
                    },
                    content: m.content.clone(),
                })
                .collect();
            session.begin_answer();

            let cancel = CancelToken::new();
            let result = client.stream_chat(&history, &cancel, |event| match event {
                StreamEvent::FirstToken => session.first_token(),
                StreamEvent::Delta(text) => {
                    print!("{text}");
                    std::io::stdout().flush().ok();
                    if let Err(e) = session.apply_delta(&text) {
                        tracing::warn!(error = %e, "dropping delta");
                    }
                }
            });
            println!();

            match result {
                Ok(()) => session.finish_answer()?,
                Err(e) => {
                    session.abort_answer();
                    return Err(e.into());
                }
            }

            if json {
                print_graph_json(&session)?;
            } else {
                println!(
                    "graph: {} nodes, {} edges, step {}",
                    session.graph().node_count(),
                    session.graph().edge_count(),
                    session.active_step()
                );
            }
        }

        Commands::Extract { file } => {
            let text = read_input(file)?;
            let (body, _) = vitagraph::annotate::split_answer(&text);
            let extraction = vitagraph::annotate::extract(body);
            let json = serde_json::to_string_pretty(&extraction.triples).into_diagnostic()?;
            println!("{json}");
        }

        Commands::Graph { file } => {
            let text = read_input(file)?;
            let mut session = Session::new(session_config);
            session.push_user(String::new());
            session.begin_answer();
            session.first_token();
            session.apply_delta(&text)?;
            session.finish_answer()?;
            print_graph_json(&session)?;
        }
    }

    Ok(())
}

fn read_input(file: Option<PathBuf>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(&path).into_diagnostic(),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .into_diagnostic()?;
            Ok(buf)
        }
    }
}

fn print_graph_json(session: &Session) -> Result<()> {
    let out = serde_json::json!({
        "nodes": session.visible_nodes(),
        "edges": session.visible_edges(),
        "active_step": session.active_step(),
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&out).into_diagnostic()?
    );
    Ok(())
}
