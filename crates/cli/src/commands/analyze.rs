//! `planlens analyze`: Single-shot document analysis.

use crate::runtime::{self, Runtime};
use planlens_core::request::{AnalysisRequest, AnalysisType};
use std::path::Path;

pub struct AnalyzeArgs {
    pub keys: Vec<String>,
    pub docs: Vec<String>,
    pub analysis_type: AnalysisType,
    pub context: Option<String>,
    pub scope: Option<String>,
    pub persona: Option<String>,
}

pub async fn run(
    config_path: Option<&Path>,
    args: AnalyzeArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let request = AnalysisRequest {
        analysis_type: args.analysis_type,
        prompt_keys: args.keys,
        document_refs: args.docs,
        user_context: args.context,
        user_type_scope: args.scope,
    };
    // Fail on a malformed request before touching config or the network
    request.validate()?;

    let config = runtime::load_config(config_path)?;
    let runtime = Runtime::from_config(&config).await?;

    eprint!("  Analyzing...");
    let report = runtime
        .engine
        .analyze_with_persona(&request, args.persona.as_deref())
        .await;
    eprint!("\r              \r");

    println!("{}", report?);
    Ok(())
}
