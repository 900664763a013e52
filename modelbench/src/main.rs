//! Benchmark and route prompts across local and cloud AI tools.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use serde_json::json;

use modelbench::adapters::{Adapter, RunOptions, registry::Registry};
use modelbench::bench::Orchestrator;
use modelbench::core::redaction::redact_secrets;
use modelbench::core::router::{Constraints, Router};
use modelbench::exit_codes;
use modelbench::io::config::{self, BenchConfig, load_config};
use modelbench::io::storage::Storage;
use modelbench::io::suite::Suite;
use modelbench::logging;

#[derive(Parser)]
#[command(
    name = "modelbench",
    version,
    about = "Benchmark and route prompts across local and cloud AI tools"
)]
struct Cli {
    /// Config file path (default: ~/.config/modelbench/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a single prompt against one provider.
    Run {
        /// Provider name (e.g. "ollama", "claude", "anthropic").
        #[arg(short, long)]
        provider: String,
        /// Model name; defaults to the provider's first listed model.
        #[arg(short, long)]
        model: Option<String>,
        /// Prompt file path, or `-` to read stdin.
        #[arg(long)]
        prompt: String,
        /// Stream output chunks as they arrive.
        #[arg(short, long)]
        stream: bool,
        /// Emit the result as JSON.
        #[arg(short, long)]
        json: bool,
        /// Per-call timeout in seconds.
        #[arg(short, long)]
        timeout: Option<u64>,
    },
    /// Run a benchmark suite across providers.
    Bench {
        /// Suite file (TOML).
        suite: PathBuf,
        /// Restrict to these providers (default: all available).
        #[arg(short, long)]
        provider: Vec<String>,
        /// Database path (default: ~/.local/share/modelbench/modelbench.db).
        #[arg(long)]
        db: Option<PathBuf>,
        #[arg(short, long)]
        json: bool,
    },
    /// Detect which providers are installed and usable.
    Detect {
        #[arg(short, long)]
        json: bool,
        /// Persist detection results and model lists to the database.
        #[arg(long)]
        save: bool,
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// List models for one provider.
    Models {
        provider: String,
        #[arg(short, long)]
        json: bool,
    },
    /// Pick a provider and model for the given constraints.
    Route {
        /// Only fully local providers.
        #[arg(long)]
        offline: bool,
        /// Require streaming support.
        #[arg(long)]
        streaming: bool,
        /// Require tool-calling support.
        #[arg(long)]
        tools: bool,
        /// Minimum context window, in tokens.
        #[arg(long)]
        min_context: Option<u32>,
        #[arg(short, long)]
        json: bool,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(config::default_config_path);
    let config = load_config(&config_path)?;
    let registry = Registry::with_builtin_adapters(&config);

    match cli.command {
        Command::Run {
            provider,
            model,
            prompt,
            stream,
            json,
            timeout,
        } => cmd_run(
            &registry, &config, &provider, model, &prompt, stream, json, timeout,
        ),
        Command::Bench {
            suite,
            provider,
            db,
            json,
        } => cmd_bench(&registry, &config, &suite, &provider, db, json),
        Command::Detect { json, save, db } => cmd_detect(&registry, json, save, db),
        Command::Models { provider, json } => cmd_models(&registry, &provider, json),
        Command::Route {
            offline,
            streaming,
            tools,
            min_context,
            json,
        } => cmd_route(&registry, &config, offline, streaming, tools, min_context, json),
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_run(
    registry: &Registry,
    config: &BenchConfig,
    provider: &str,
    model: Option<String>,
    prompt: &str,
    stream: bool,
    json: bool,
    timeout_secs: Option<u64>,
) -> Result<i32> {
    let adapter = registry.get(provider).ok_or_else(|| {
        anyhow!(
            "unknown provider {provider} (available: {})",
            registry.names().join(", ")
        )
    })?;
    if !adapter.is_available() {
        eprintln!("provider {provider} is not available; run `modelbench detect` for details");
        return Ok(exit_codes::UNAVAILABLE);
    }

    let prompt_text = read_prompt(prompt)?;
    let model = model
        .or_else(|| adapter.list_models().into_iter().next())
        .unwrap_or_else(|| "default".to_string());
    let timeout = timeout_secs
        .map(std::time::Duration::from_secs)
        .unwrap_or_else(|| config.timeout());

    let mut print_chunk = |chunk: &str| {
        if !json {
            print!("{chunk}");
            let _ = std::io::stdout().flush();
        }
    };
    let mut options = RunOptions::new(model.clone()).with_timeout(timeout);
    if stream {
        options = options.streaming(&mut print_chunk);
    }

    let result = adapter.run(&prompt_text, &mut options);

    if json {
        let payload = json!({
            "provider": provider,
            "model": model,
            "exit_code": result.exit_code,
            "wall_time_ms": result.wall_time_ms,
            "ttft_ms": result.ttft_ms,
            "output": result.output,
            "error": result.error.as_deref().map(redact_secrets),
            "input_tokens": result.input_tokens,
            "output_tokens": result.output_tokens,
            "tokens_estimated": result.tokens_estimated,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        if !stream && !result.output.is_empty() {
            // Streaming already printed as chunks arrived.
            println!("{}", result.output.trim_end());
        }
        if let Some(error) = &result.error {
            eprintln!("{}", redact_secrets(error));
        }
    }

    Ok(result.exit_code)
}

fn cmd_bench(
    registry: &Registry,
    config: &BenchConfig,
    suite_path: &Path,
    providers: &[String],
    db: Option<PathBuf>,
    json: bool,
) -> Result<i32> {
    let suite = Suite::load(suite_path)?;
    let storage = open_storage(db)?;
    let orchestrator = Orchestrator::new(registry, &storage, config);

    let provider_filter = (!providers.is_empty()).then_some(providers);
    let run = orchestrator.run_suite(&suite, provider_filter, |result| {
        if !json {
            let status = if result.success { "ok" } else { "failed" };
            println!(
                "{} × {} [{}] {} in {} ms",
                result.prompt_id, result.provider, result.model, status, result.wall_time_ms
            );
        }
    })?;

    let failures = run.results.iter().filter(|result| !result.success).count();
    if json {
        let jobs: Vec<_> = run
            .results
            .iter()
            .map(|result| {
                json!({
                    "prompt_id": result.prompt_id,
                    "provider": result.provider,
                    "model": result.model,
                    "success": result.success,
                    "wall_time_ms": result.wall_time_ms,
                    "ttft_ms": result.ttft_ms,
                    "fallback_used": result.fallback_used,
                    "error": result.error.as_deref().map(redact_secrets),
                })
            })
            .collect();
        let payload = json!({
            "run_id": run.run_id,
            "suite": run.suite_name,
            "jobs": jobs,
            "failures": failures,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!(
            "run {}: {} jobs, {} failed",
            run.run_id,
            run.results.len(),
            failures
        );
    }

    if run.results.is_empty() {
        return Ok(exit_codes::UNAVAILABLE);
    }
    Ok(if failures == 0 {
        exit_codes::OK
    } else {
        exit_codes::INVALID
    })
}

fn cmd_detect(
    registry: &Registry,
    json: bool,
    save: bool,
    db: Option<PathBuf>,
) -> Result<i32> {
    let detections = registry.detect_all();

    if save {
        let storage = open_storage(db)?;
        for (name, detection) in &detections {
            if !detection.detected {
                continue;
            }
            let models = registry
                .get(name)
                .map(|adapter| adapter.list_models())
                .unwrap_or_default();
            storage.save_capabilities(
                name,
                &detection
                    .binary_path
                    .as_ref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_default(),
                detection.version.as_deref(),
                detection.auth_status.map(|status| status.as_str()),
                &models,
            )?;
        }
    }

    if json {
        let payload: Vec<_> = detections
            .iter()
            .map(|(name, detection)| {
                let capabilities = registry.get(name).map(|adapter| adapter.capabilities());
                json!({
                    "provider": name,
                    "detected": detection.detected,
                    "binary_path": detection.binary_path,
                    "version": detection.version,
                    "auth_status": detection.auth_status.map(|status| status.as_str()),
                    "trusted": detection.trusted,
                    "error": detection.error,
                    "capabilities": capabilities,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        for (name, detection) in &detections {
            if detection.detected {
                let version = detection.version.as_deref().unwrap_or("unknown version");
                let trust = if detection.trusted {
                    ""
                } else {
                    " [untrusted path]"
                };
                println!("{name}: detected ({version}){trust}");
            } else {
                let reason = detection.error.as_deref().unwrap_or("not found");
                println!("{name}: not detected ({reason})");
            }
        }
    }

    let any = detections.iter().any(|(_, detection)| detection.detected);
    Ok(if any {
        exit_codes::OK
    } else {
        exit_codes::UNAVAILABLE
    })
}

fn cmd_models(registry: &Registry, provider: &str, json: bool) -> Result<i32> {
    let adapter = registry.get(provider).ok_or_else(|| {
        anyhow!(
            "unknown provider {provider} (available: {})",
            registry.names().join(", ")
        )
    })?;
    let models = adapter.list_models();
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({"provider": provider, "models": models}))?
        );
    } else if models.is_empty() {
        println!("{provider}: no listable models");
    } else {
        for model in &models {
            println!("{model}");
        }
    }
    Ok(exit_codes::OK)
}

fn cmd_route(
    registry: &Registry,
    config: &BenchConfig,
    offline: bool,
    streaming: bool,
    tools: bool,
    min_context: Option<u32>,
    json: bool,
) -> Result<i32> {
    let constraints = Constraints {
        offline_only: offline || config.routing.constraints.offline_only,
        streaming_required: streaming || config.routing.constraints.streaming_required,
        tool_calling_required: tools,
        min_context,
    };
    let router = Router::new(config.routing.preference_order.clone());
    let available = registry.available();
    let defaults: BTreeMap<String, String> = config.default_models();

    match router.route(&available, &constraints, &defaults) {
        Some(decision) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&decision)?);
            } else {
                println!("{} / {}", decision.provider, decision.model);
                for reason in &decision.reasons {
                    println!("  - {reason}");
                }
                if !decision.alternatives.is_empty() {
                    println!("  alternatives: {}", decision.alternatives.join(", "));
                }
            }
            Ok(exit_codes::OK)
        }
        None => {
            if json {
                println!("{}", serde_json::to_string_pretty(&json!({"provider": null}))?);
            } else {
                println!("no provider satisfies the constraints");
            }
            Ok(exit_codes::UNAVAILABLE)
        }
    }
}

fn read_prompt(source: &str) -> Result<String> {
    let text = if source == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("read prompt from stdin")?;
        buffer
    } else {
        let path = PathBuf::from(source);
        std::fs::read_to_string(&path)
            .with_context(|| format!("read prompt file {}", path.display()))?
    };
    if text.trim().is_empty() {
        return Err(anyhow!("empty prompt"));
    }
    Ok(text)
}

fn open_storage(db: Option<PathBuf>) -> Result<Storage> {
    let path = db.unwrap_or_else(config::default_db_path);
    Storage::open(&path)
}
