use std::fs;
use std::io::Write;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::json;
use tracing::{info, warn};

use rechain_core::clipboard::{copy_all_matches, copy_transformed};
use rechain_core::{apply, apply_traced, SavedRule, Stage, Workbench, Workspace};
use rechain_engine::process::{ProcessBackend, ProcessBackendConfig};
use rechain_engine::{ControllerHandle, EngineConfig, EngineStatus};
use rechain_nl::Translator;
use rechain_store::{KeyValueStore, RuleLibrary, WorkspaceLibrary};

use crate::cli::{
    ApplyArgs, CopyArg, EngineArgs, GenerateArgs, RulesCommand, TextArgs, WorkspaceCommand,
};
use crate::clipboard::FileSink;

// ============================================================================
// Pipeline
// ============================================================================

pub fn run_apply<S: KeyValueStore>(args: &ApplyArgs, store: &S, out: &mut impl Write) -> Result<()> {
    let base = match &args.workspace {
        Some(name) => Some(
            WorkspaceLibrary::new(store)
                .get(name)?
                .ok_or_else(|| anyhow!("no workspace named {name:?}"))?,
        ),
        None => None,
    };
    let text = match read_text(&args.input)? {
        Some(text) => text,
        None => match &base {
            Some(workspace) => workspace.text.clone(),
            None => bail!("no input text: pass --text, --file or --workspace"),
        },
    };
    let mut stages = base.map(|w| w.stages).unwrap_or_default();
    stages.extend(collect_stages(&args.stages, &args.rules, store)?);

    let (output, reports) = if args.trace {
        apply_traced(&text, &stages)?
    } else {
        (apply(&text, &stages)?, Vec::new())
    };

    if let (Some(copy), Some(path)) = (args.copy, &args.copy_to) {
        let sink = FileSink::new(path);
        match copy {
            CopyArg::Matches => copy_all_matches(&sink, &output)?,
            CopyArg::Transformed => copy_transformed(&sink, &output)?,
        }
        info!(path = %path.display(), "copied");
    }

    if args.json {
        let mut value = json!(output);
        if args.trace {
            value["stages"] = json!(reports);
        }
        writeln!(out, "{}", serde_json::to_string_pretty(&value)?)?;
        return Ok(());
    }

    writeln!(out, "matches ({}):", output.matches.len())?;
    for m in &output.matches {
        writeln!(out, "  {m}")?;
    }
    writeln!(out, "transformed:")?;
    writeln!(out, "{}", output.transformed_text)?;
    if args.trace {
        writeln!(out, "stages:")?;
        for (index, report) in reports.iter().enumerate() {
            writeln!(
                out,
                "  {} {} matches={} {} -> {}",
                index + 1,
                report.stage,
                report.matches,
                report.in_hash,
                report.out_hash
            )?;
        }
    }
    Ok(())
}

fn read_text(input: &TextArgs) -> Result<Option<String>> {
    if let Some(text) = &input.text {
        return Ok(Some(text.clone()));
    }
    match &input.file {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("read {}", path.display()))
            .map(Some),
        None => Ok(None),
    }
}

/// `--stage` specs first, then `--rule` names looked up in the library.
fn collect_stages<S: KeyValueStore>(specs: &[String], rules: &[String], store: &S) -> Result<Vec<Stage>> {
    let mut stages: Vec<Stage> = specs.iter().map(|s| Stage::parse_spec(s)).collect();
    if rules.is_empty() {
        return Ok(stages);
    }
    let library = RuleLibrary::new(store);
    for name in rules {
        let rule = library
            .get(name)?
            .ok_or_else(|| anyhow!("no saved rule named {name:?}"))?;
        stages.push(rule.to_stage());
    }
    Ok(stages)
}

// ============================================================================
// Libraries
// ============================================================================

pub fn run_rules<S: KeyValueStore>(command: &RulesCommand, store: &S, out: &mut impl Write) -> Result<()> {
    let library = RuleLibrary::new(store);
    match command {
        RulesCommand::List => {
            for rule in library.list()? {
                writeln!(
                    out,
                    "{}\t/{}/{}\t{:?}",
                    rule.name, rule.pattern, rule.flags, rule.replacement
                )?;
            }
        }
        RulesCommand::Save {
            name,
            pattern,
            flags,
            replacement,
        } => {
            library.save(SavedRule {
                name: name.clone(),
                pattern: pattern.clone(),
                flags: flags.clone(),
                replacement: replacement.clone(),
            })?;
            writeln!(out, "saved rule {}", name.trim())?;
        }
        RulesCommand::Delete { name } => {
            if !library.delete(name)? {
                bail!("no saved rule named {name:?}");
            }
            writeln!(out, "deleted rule {name}")?;
        }
        RulesCommand::Clear => {
            library.clear()?;
            writeln!(out, "cleared saved rules")?;
        }
    }
    Ok(())
}

pub fn run_workspace<S: KeyValueStore>(
    command: &WorkspaceCommand,
    store: &S,
    out: &mut impl Write,
) -> Result<()> {
    let library = WorkspaceLibrary::new(store);
    match command {
        WorkspaceCommand::List => {
            for workspace in library.list()? {
                let saved_at = workspace
                    .saved_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "-".to_string());
                writeln!(
                    out,
                    "{}\t{} stages\t{}",
                    workspace.name,
                    workspace.stages.len(),
                    saved_at
                )?;
            }
        }
        WorkspaceCommand::Save {
            name,
            input,
            stages,
            rules,
        } => {
            let text = read_text(input)?.unwrap_or_default();
            let stages = collect_stages(stages, rules, store)?;
            library.save(Workspace::new(name.clone(), text, stages))?;
            writeln!(out, "saved workspace {}", name.trim())?;
        }
        WorkspaceCommand::Show { name } => {
            let workspace = library
                .get(name)?
                .ok_or_else(|| anyhow!("no workspace named {name:?}"))?;
            writeln!(out, "{}", serde_json::to_string_pretty(&workspace)?)?;
        }
        WorkspaceCommand::Delete { name } => {
            if !library.delete(name)? {
                bail!("no workspace named {name:?}");
            }
            writeln!(out, "deleted workspace {name}")?;
        }
    }
    Ok(())
}

// ============================================================================
// Engine
// ============================================================================

/// Start a controller over the local process backend.
pub fn start_engine(args: &EngineArgs) -> Result<(ControllerHandle, EngineConfig)> {
    let config = match &args.config {
        Some(path) => EngineConfig::from_yaml_file(path)
            .with_context(|| format!("load engine config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let backend = ProcessBackend::new(ProcessBackendConfig {
        executable: args.executable.clone(),
        model_dir: args.model_dir.clone(),
        extra_args: args.engine_args.clone(),
        ..ProcessBackendConfig::default()
    });
    let controller = ControllerHandle::start(Arc::new(backend), config.clone())
        .map_err(|e| anyhow!("start engine controller: {e}"))?;
    Ok((controller, config))
}

pub async fn run_generate<S: KeyValueStore>(
    args: &GenerateArgs,
    store: &S,
    out: &mut impl Write,
) -> Result<()> {
    let (controller, config) = start_engine(&args.engine)?;
    let result = generate(
        &controller,
        &config,
        &args.description,
        args.append_to.as_deref(),
        store,
        out,
    )
    .await;
    controller.shutdown().await?;
    result
}

/// Wait for the engine to settle, translate, and optionally install the
/// pattern as a new workspace stage.
pub async fn generate<S: KeyValueStore>(
    controller: &ControllerHandle,
    config: &EngineConfig,
    description: &str,
    append_to: Option<&str>,
    store: &S,
    out: &mut impl Write,
) -> Result<()> {
    let state = controller.wait_settled().await?;
    if state.status != EngineStatus::Ready {
        warn!(status = %state.status, "engine not ready");
    }

    let translator = Translator::new(controller.clone(), config.completion.clone());
    let pattern = translator.translate(description).await?;
    writeln!(out, "{pattern}")?;

    if let Some(name) = append_to {
        let library = WorkspaceLibrary::new(store);
        let workspace = library
            .get(name)?
            .ok_or_else(|| anyhow!("no workspace named {name:?}"))?;
        let mut workbench = Workbench::new();
        workbench.load_workspace(&workspace);
        workbench.insert_generated(pattern);
        if let Some(err) = workbench.error() {
            warn!(workspace = %name, error = %err, "generated stage does not compile");
        }
        library.save(workbench.snapshot(name))?;
        info!(workspace = %name, stages = workbench.stages().len(), "stage appended");
    }
    Ok(())
}

pub async fn run_status(args: &EngineArgs, out: &mut impl Write) -> Result<()> {
    let (controller, _) = start_engine(args)?;
    let state = controller.wait_settled().await?;
    writeln!(out, "{}", serde_json::to_string_pretty(&state)?)?;
    let metrics = controller
        .metrics()
        .encode()
        .map_err(|e| anyhow!("encode metrics: {e}"))?;
    write!(out, "{metrics}")?;
    controller.shutdown().await?;
    Ok(())
}
