//! `planlens comprehensive`: The full multi-section analysis.

use crate::runtime::{self, Runtime};
use planlens_analysis::PipelineEvent;
use planlens_core::request::JobDetails;
use std::path::Path;
use tokio::sync::broadcast::error::RecvError;

pub async fn run(
    config_path: Option<&Path>,
    user_id: &str,
    docs: Vec<String>,
    job: JobDetails,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = runtime::load_config(config_path)?;
    let runtime = Runtime::from_config(&config).await?;

    eprintln!("  Comprehensive analysis: {} ({} document(s))", job.project_name, docs.len());
    let mut events = runtime.progress.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(PipelineEvent::Finished { .. }) | Err(RecvError::Closed) => break,
                Ok(event) => print_progress(&event),
                Err(RecvError::Lagged(_)) => {}
            }
        }
    });

    let result = runtime.orchestrator.start_full_analysis(user_id, &docs, &job).await;
    if result.is_ok() {
        let _ = printer.await;
    } else {
        printer.abort();
        eprintln!();
    }

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            if let Some(id) = e.created_conversation() {
                eprintln!("  Partial results are kept in conversation {id}");
            }
            return Err(e.into());
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.full_text());
        eprintln!();
        eprintln!("  Conversation: {}", report.conversation_id);
        if report.short_circuited {
            eprintln!("  ⚠️  The documents could not be analyzed; sections were skipped.");
        }
    }
    Ok(())
}

fn print_progress(event: &PipelineEvent) {
    match event {
        PipelineEvent::Seeded {
            conversation_id,
            corrected,
            ..
        } => {
            let note = if *corrected { " (corrected)" } else { "" };
            eprintln!("  ✅ Initial review done{note}: conversation {conversation_id}");
        }
        PipelineEvent::SectionStarted {
            index,
            total,
            title,
            ..
        } => eprint!("  [{index:>2}/{total}] {title}..."),
        PipelineEvent::SectionCompleted { corrected, .. } => {
            eprintln!("{}", if *corrected { " corrected" } else { " done" });
        }
        PipelineEvent::Finished { .. } => {}
    }
}
