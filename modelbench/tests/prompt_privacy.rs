//! Argv privacy invariant across all subprocess adapters.
//!
//! Prompt text must never appear in a constructed argv element — argv is
//! visible to other local users via the process table. Every subprocess
//! adapter must deliver the prompt over stdin, for any prompt content,
//! including text that resembles flags.

use std::fs;
use std::time::Duration;

use modelbench::adapters::{Adapter, RunOptions};
use modelbench::adapters::claude::ClaudeAdapter;
use modelbench::adapters::codex::CodexAdapter;
use modelbench::adapters::gemini::GeminiAdapter;
use modelbench::adapters::goose::GooseAdapter;
use modelbench::adapters::llamacpp::LlamaCppAdapter;
use modelbench::adapters::ollama::OllamaAdapter;
use modelbench::adapters::opencode::OpenCodeAdapter;
use modelbench::adapters::vllm::VllmAdapter;
use modelbench::io::discovery::Discovery;
use modelbench::test_support::SpyRunner;

const PROMPTS: &[&str] = &[
    "TOP-SECRET: this prompt must never appear in argv",
    "--help; rm -rf / # flag-shaped prompt",
    "-p injected positional",
    "multi\nline\nprompt with sk-abcdefghijklmnopqrstuvwx inside",
];

fn assert_prompt_private(adapter: &dyn Adapter, spy: &SpyRunner, model: &str) {
    for prompt in PROMPTS {
        let mut options =
            RunOptions::new(model).with_timeout(Duration::from_secs_f64(42.5));
        let result = adapter.run(prompt, &mut options);
        assert_eq!(result.exit_code, 0, "{} run failed", adapter.name());

        let call = spy.last_call().expect("executor call recorded");
        assert!(
            call.args.iter().all(|arg| !arg.contains(prompt)),
            "{}: prompt leaked into argv: {:?}",
            adapter.name(),
            call.args
        );
        assert_eq!(
            call.stdin.as_deref(),
            Some(*prompt),
            "{}: prompt did not arrive over stdin",
            adapter.name()
        );
        assert_eq!(
            call.timeout,
            Duration::from_secs_f64(42.5),
            "{}: per-call timeout not honored",
            adapter.name()
        );
    }
}

#[test]
fn claude_keeps_prompt_out_of_argv() {
    let spy = SpyRunner::ok("ok");
    let adapter = ClaudeAdapter::new(Discovery::new())
        .with_binary("/bin/claude")
        .with_runner(Box::new(spy.clone()));
    assert_prompt_private(&adapter, &spy, "claude-3-5-sonnet");
}

#[test]
fn codex_keeps_prompt_out_of_argv() {
    let spy = SpyRunner::ok("ok");
    let adapter = CodexAdapter::new(Discovery::new())
        .with_binary("/bin/codex")
        .with_runner(Box::new(spy.clone()));
    assert_prompt_private(&adapter, &spy, "o4-mini");
}

#[test]
fn gemini_keeps_prompt_out_of_argv() {
    let spy = SpyRunner::ok("ok");
    let adapter = GeminiAdapter::new(Discovery::new())
        .with_binary("/bin/gemini")
        .with_runner(Box::new(spy.clone()));
    assert_prompt_private(&adapter, &spy, "gemini-2.5-pro");
}

#[test]
fn goose_keeps_prompt_out_of_argv() {
    let spy = SpyRunner::ok("ok");
    let adapter = GooseAdapter::new(Discovery::new())
        .with_binary("/bin/goose")
        .with_runner(Box::new(spy.clone()));
    assert_prompt_private(&adapter, &spy, "default");
}

#[test]
fn ollama_keeps_prompt_out_of_argv() {
    let spy = SpyRunner::ok("ok");
    let adapter = OllamaAdapter::new(Discovery::new())
        .with_binary("/bin/ollama")
        .with_runner(Box::new(spy.clone()));
    assert_prompt_private(&adapter, &spy, "llama3.2");
}

#[test]
fn opencode_keeps_prompt_out_of_argv() {
    let spy = SpyRunner::ok("ok");
    let adapter = OpenCodeAdapter::new(Discovery::new())
        .with_binary("/bin/opencode")
        .with_runner(Box::new(spy.clone()));
    assert_prompt_private(&adapter, &spy, "default");
}

#[test]
fn vllm_keeps_prompt_out_of_argv() {
    let spy = SpyRunner::ok("ok");
    let adapter = VllmAdapter::new(Discovery::new())
        .with_binary("/bin/vllm")
        .with_runner(Box::new(spy.clone()));
    assert_prompt_private(&adapter, &spy, "meta-llama/Llama-2-7b-chat-hf");
}

#[test]
fn llamacpp_keeps_prompt_out_of_argv() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(temp.path().join("llama-3.gguf"), b"stub").expect("write model");

    let spy = SpyRunner::ok("ok");
    let adapter = LlamaCppAdapter::new(Discovery::new())
        .with_binary("/bin/llama-cli")
        .with_models_dir(temp.path())
        .with_runner(Box::new(spy.clone()));
    assert_prompt_private(&adapter, &spy, "llama-3");
}
