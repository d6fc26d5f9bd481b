//! Doctor command - verify configuration and credentials.

use crate::cli::{mask_secret, preflight, Output};
use crate::config::{ChatProvider, Settings};
use crate::search::AzureSearchClient;
use console::style;
use std::path::Path;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub fn run_doctor(settings: &Settings, config_path: &Path) -> anyhow::Result<()> {
    Output::header("SearchGPT Doctor");
    println!();
    println!("Checking configuration and credentials...\n");

    let mut checks = Vec::new();

    let sections = [
        ("Chat Provider", check_chat_provider(settings)),
        ("Search Index", check_search(settings)),
        ("Conversations", vec![check_conversation_store(settings)]),
        ("Configuration", vec![check_config_file(config_path)]),
    ];

    for (title, results) in sections {
        println!("{}", style(title).bold());
        for check in &results {
            check.print();
        }
        println!();
        checks.extend(results);
    }

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using SearchGPT.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! SearchGPT is ready to use.");
    }

    Ok(())
}

fn check_chat_provider(settings: &Settings) -> Vec<CheckResult> {
    let openai = &settings.openai;
    let mut results = vec![CheckResult::ok(
        "Provider",
        &format!("{} ({})", openai.provider, openai.model),
    )];

    match openai.provider {
        ChatProvider::OpenAI => results.push(check_secret("OPENAI_API_KEY")),
        ChatProvider::Azure => {
            match (&openai.azure_api_base, &openai.azure_deployment) {
                (Some(base), Some(deployment)) => results.push(CheckResult::ok(
                    "Deployment",
                    &format!("{} @ {}", deployment, base),
                )),
                _ => results.push(CheckResult::error(
                    "Deployment",
                    "not configured",
                    "Set openai.azure_api_base and openai.azure_deployment",
                )),
            }
            results.push(check_secret("AZURE_OPENAI_API_KEY"));
        }
    }

    results
}

fn check_search(settings: &Settings) -> Vec<CheckResult> {
    let mut results = Vec::new();

    match AzureSearchClient::from_settings(&settings.search) {
        Ok(client) => results.push(CheckResult::ok("Index", client.search_url().as_str())),
        Err(e) => {
            if let Err(missing) = preflight::check_search(settings) {
                results.push(CheckResult::error(
                    "Index",
                    &missing.to_string(),
                    "Set search.service_name and search.index_name",
                ));
            } else {
                results.push(CheckResult::error("Index", &e.to_string(), "Check search.endpoint"));
            }
        }
    }

    results.push(check_secret("AZURE_SEARCH_API_KEY"));
    results
}

fn check_conversation_store(settings: &Settings) -> CheckResult {
    match settings.conversation.provider.as_str() {
        "memory" => CheckResult::warning(
            "Store",
            "memory (history is lost on exit)",
            "Set conversation.provider = \"sqlite\" to keep history",
        ),
        "sqlite" => {
            let path = settings.sqlite_path();
            if path.exists() {
                CheckResult::ok("Store", &format!("sqlite at {}", path.display()))
            } else {
                CheckResult::ok("Store", &format!("sqlite at {} (will be created)", path.display()))
            }
        }
        other => CheckResult::error(
            "Store",
            &format!("unknown provider '{}'", other),
            "Use \"memory\" or \"sqlite\"",
        ),
    }
}

fn check_config_file(config_path: &Path) -> CheckResult {
    if config_path.exists() {
        CheckResult::ok("Config file", &format!("{}", config_path.display()))
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: searchgpt config edit",
        )
    }
}

fn check_secret(name: &str) -> CheckResult {
    match std::env::var(name) {
        Ok(key) if key.is_empty() => {
            CheckResult::error(name, "empty", &format!("Set with: export {}='...'", name))
        }
        Ok(key) => CheckResult::ok(name, &format!("configured ({})", mask_secret(&key))),
        Err(_) => CheckResult::error(name, "not set", &format!("Set with: export {}='...'", name)),
    }
}
