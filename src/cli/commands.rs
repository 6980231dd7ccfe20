//! CLI command implementations.
//!
//! Contains the business logic for each CLI command.

use crate::cli::output::{OutputFormat, format_filter_output, format_payloads, format_replay};
use crate::cli::parser::{Cli, Commands};
use crate::dispatch::{NullPhotoResolver, PayloadDispatcher};
use crate::error::Result;
use crate::filter::{FilterOutput, StreamFilter, filter_text};
use crate::marker::{MarkerRegistry, scan_text};
use crate::session::registry::SessionHandle;
use crate::session::{SessionRegistry, SourceError, StreamSession, TransportSink, TurnEvent};
use crate::store::{FieldStore, MemoryStore, SqliteStore};
use async_trait::async_trait;
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

/// Executes the CLI command.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);

    match &cli.command {
        Commands::Filter { file, chunk_size } => cmd_filter(file.as_deref(), *chunk_size, format),
        Commands::Scan { file } => cmd_scan(file.as_deref(), format),
        Commands::Replay {
            file,
            subject,
            create_subject,
        } => cmd_replay(
            file.as_deref(),
            subject,
            *create_subject,
            cli.db_path.as_deref(),
            format,
        ),
    }
}

/// Reads command input from a file, or stdin when no file is given.
fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            Ok(text)
        }
    }
}

fn cmd_filter(file: Option<&Path>, chunk_size: usize, format: OutputFormat) -> Result<String> {
    let text = read_input(file)?;
    let registry = Arc::new(MarkerRegistry::default());

    let out = if chunk_size == 0 {
        filter_text(&registry, &text)
    } else {
        // Feed the text in character fragments; the result must match the
        // one-pass output for any fragment size.
        let mut filter = StreamFilter::new(Arc::clone(&registry));
        let mut out = FilterOutput::default();
        let chars: Vec<char> = text.chars().collect();
        for fragment in chars.chunks(chunk_size) {
            let fragment: String = fragment.iter().collect();
            let step = filter.push(&fragment);
            out.clean.push_str(&step.clean);
            out.payloads.extend(step.payloads);
        }
        let tail = filter.finish();
        out.clean.push_str(&tail.clean);
        out.payloads.extend(tail.payloads);
        out
    };

    Ok(format_filter_output(&out, format))
}

fn cmd_scan(file: Option<&Path>, format: OutputFormat) -> Result<String> {
    let text = read_input(file)?;
    let registry = MarkerRegistry::default();
    let payloads = scan_text(&registry, &text)?;
    Ok(format_payloads(&payloads, format))
}

/// Sink that collects the turn's events for printing after the replay.
#[derive(Default)]
struct CollectingSink {
    events: Mutex<Vec<TurnEvent>>,
}

impl CollectingSink {
    fn into_events(self) -> Vec<TurnEvent> {
        self.events
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl TransportSink for CollectingSink {
    async fn send(&self, event: TurnEvent) -> Result<()> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
        Ok(())
    }
}

fn cmd_replay(
    file: Option<&Path>,
    subject: &str,
    create_subject: bool,
    db_path: Option<&Path>,
    format: OutputFormat,
) -> Result<String> {
    let text = read_input(file)?;

    let store: Arc<dyn FieldStore> = match db_path {
        Some(path) => Arc::new(SqliteStore::open(path)?),
        None => Arc::new(MemoryStore::new()),
    };
    if create_subject {
        store.insert_subject(subject)?;
    }

    let dispatcher = Arc::new(PayloadDispatcher::new(store, Arc::new(NullPhotoResolver)));
    let registry = Arc::new(MarkerRegistry::default());
    let sessions = SessionRegistry::new();

    // One fragment per input line, replayed as the model-output source.
    let fragments: Vec<std::result::Result<String, SourceError>> =
        text.lines().map(|line| Ok(line.to_string())).collect();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let mut session = StreamSession::new("replay", subject, registry, dispatcher);
    sessions.insert(
        "replay",
        SessionHandle::new(subject, session.cancellation_token()),
    )?;

    let sink = CollectingSink::default();
    let result = runtime.block_on(session.run(tokio_stream::iter(fragments), &sink));
    sessions.remove("replay");
    let summary = result?;

    Ok(format_replay(&sink.into_events(), &summary, format))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn cli_for(command: Commands) -> Cli {
        Cli {
            db_path: None,
            verbose: false,
            format: "text".to_string(),
            command,
        }
    }

    #[test]
    fn test_filter_file_one_pass() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"Hi <trip_update>{{"field":"a","value":1}}</trip_update> there"#
        )
        .unwrap();

        let cli = cli_for(Commands::Filter {
            file: Some(file.path().to_path_buf()),
            chunk_size: 0,
        });
        let output = execute(&cli).unwrap();
        assert!(output.starts_with("Hi  there\n"));
        assert!(output.contains("trip_update"));
    }

    #[test]
    fn test_filter_chunked_matches_one_pass() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"a<photo>{{"query":"Louvre"}}</photo>b"#
        )
        .unwrap();

        let one_pass = execute(&cli_for(Commands::Filter {
            file: Some(file.path().to_path_buf()),
            chunk_size: 0,
        }))
        .unwrap();
        let chunked = execute(&cli_for(Commands::Filter {
            file: Some(file.path().to_path_buf()),
            chunk_size: 1,
        }))
        .unwrap();
        assert_eq!(one_pass, chunked);
    }

    #[test]
    fn test_scan_reports_payloads() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"x<trip_update>{{"field":"b","value":2}}</trip_update>y"#
        )
        .unwrap();

        let cli = cli_for(Commands::Scan {
            file: Some(file.path().to_path_buf()),
        });
        let output = execute(&cli).unwrap();
        assert!(output.contains("1 payload(s):"));
    }

    #[test]
    fn test_replay_runs_full_turn() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Hello ").unwrap();
        writeln!(
            file,
            r#"<trip_update>{{"field":"optimal_season","value":"spring"}}</trip_update>"#
        )
        .unwrap();
        writeln!(file, "world").unwrap();

        let cli = cli_for(Commands::Replay {
            file: Some(file.path().to_path_buf()),
            subject: "rec-1".to_string(),
            create_subject: true,
        });
        let output = execute(&cli).unwrap();
        assert!(output.contains(r#""type":"thinking""#));
        assert!(output.contains(r#""type":"complete""#));
        assert!(output.contains("Applied: 1"));
    }
}
