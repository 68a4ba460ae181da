// crates/diting-cli/src/main.rs
// ============================================================================
// Module: Diting CLI Entry Point
// Description: Command dispatcher for the gateway and the exec helper.
// Purpose: Wire configuration into components, run the gateway with signal
//          handling, and gate local commands on /auth/exec.
// Dependencies: clap, diting-config, diting-core, diting-gateway, tokio
// ============================================================================

//! ## Overview
//! Two commands share this binary: `diting serve` loads configuration, wires
//! the policy engine, CHEQ, stores, delivery, and (optionally) the ledger
//! bridge into one gateway, then serves until `SIGINT`/`SIGTERM` with
//! `SIGHUP` reloading the policy ruleset atomically; `diting exec` is the
//! node-agent helper that asks the gateway before running a local command.
//!
//! Exit codes: 0 on clean shutdown or successful `--validate`; 1 on
//! configuration or ruleset failure (and on denied/failed `exec`); 2 on
//! argument errors (clap).

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use clap::Subcommand;
use diting_config::Config;
use diting_core::ApprovalPolicy;
use diting_core::ApprovalRule;
use diting_core::ApprovalRuleMatch;
use diting_core::CheqEngine;
use diting_core::ConfirmationEngine;
use diting_core::ConfirmationStore;
use diting_core::DecisionPipeline;
use diting_core::DeliveryProvider;
use diting_core::EvidenceStore;
use diting_core::InMemoryConfirmationStore;
use diting_core::InMemoryEvidenceStore;
use diting_core::NoopDeliveryProvider;
use diting_core::PipelineConfig;
use diting_core::PolicyEngine;
use diting_core::RuleMatcher;
use diting_core::RulePolicyEngine;
use diting_core::StaticResolver;
use diting_core::StubPolicyEngine;
use diting_delivery::FeishuProvider;
use diting_delivery::FeishuProviderConfig;
use diting_gateway::GatewayState;
use diting_ledger::AuditLedgerBridge;
use diting_ledger::BridgeConfig;
use diting_ledger::Ledger;
use diting_ledger::LedgerImpl;
use diting_ledger::LocalBackend;
use diting_store_fs::JsonConfirmationStore;
use diting_store_fs::JsonlEvidenceStore;
use serde::Deserialize;

// ============================================================================
// SECTION: CLI Definition
// ============================================================================

/// Diting zero-trust gateway.
#[derive(Debug, Parser)]
#[command(name = "diting", version, about = "Zero-trust policy enforcement gateway for agents")]
struct Cli {
    /// Command to run.
    #[command(subcommand)]
    command: Command,
}

/// Top-level commands.
#[derive(Debug, Subcommand)]
enum Command {
    /// Run the gateway.
    Serve(ServeArgs),
    /// Gate a local command on the gateway's exec authorization.
    Exec(ExecArgs),
}

/// Arguments of `diting serve`.
#[derive(Debug, clap::Args)]
struct ServeArgs {
    /// Configuration file path.
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
    /// Env-style file applied over the process environment.
    #[arg(long, default_value = ".env")]
    env_file: PathBuf,
    /// Validate configuration and ruleset, then exit.
    #[arg(long)]
    validate: bool,
}

/// Arguments of `diting exec`.
#[derive(Debug, clap::Args)]
struct ExecArgs {
    /// Gateway base URL (defaults to `DITING_3AF_URL`).
    #[arg(long)]
    url: Option<String>,
    /// Agent token (defaults to `DITING_AGENT_TOKEN`).
    #[arg(long)]
    token: Option<String>,
    /// Subject identity (defaults to `DITING_SUBJECT`, then `USER`).
    #[arg(long)]
    subject: Option<String>,
    /// Command to run after authorization.
    #[arg(required = true, trailing_var_arg = true)]
    command: Vec<String>,
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Exec(args) => exec(args).await,
    }
}

/// Writes a user-facing message to stderr.
fn report(message: &str) {
    let mut stderr = std::io::stderr().lock();
    let _ = writeln!(stderr, "{message}");
}

// ============================================================================
// SECTION: Serve
// ============================================================================

/// Runs `diting serve`.
async fn serve(args: ServeArgs) -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let env_file = match diting_config::load_env_file(&args.env_file) {
        Ok(vars) => vars,
        Err(err) => {
            report(&format!("diting: {err}"));
            return ExitCode::from(1);
        }
    };
    let config = match diting_config::load_with_env(&args.config, &env_file) {
        Ok(config) => config,
        Err(err) => {
            report(&format!("diting: {err}"));
            return ExitCode::from(1);
        }
    };

    // Policy engine: rule file when configured, otherwise the allow-all stub.
    let mut reloadable: Option<Arc<RulePolicyEngine>> = None;
    let policy: Arc<dyn PolicyEngine> = if config.policy.rules_path.is_empty() {
        tracing::warn!("no policy rules configured; stub engine allows everything");
        Arc::new(StubPolicyEngine)
    } else {
        match RulePolicyEngine::from_file(&config.policy.rules_path) {
            Ok(engine) => {
                let engine = Arc::new(engine);
                reloadable = Some(Arc::clone(&engine));
                engine
            }
            Err(err) => {
                report(&format!("diting: policy engine: {err}"));
                return ExitCode::from(1);
            }
        }
    };
    if args.validate {
        report("diting: configuration ok");
        return ExitCode::SUCCESS;
    }

    match build_and_serve(&config, policy, reloadable).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            report(&format!("diting: {message}"));
            ExitCode::from(1)
        }
    }
}

/// Wires components from configuration and serves until shutdown.
async fn build_and_serve(
    config: &Config,
    policy: Arc<dyn PolicyEngine>,
    reloadable: Option<Arc<RulePolicyEngine>>,
) -> Result<(), String> {
    // Confirmation store.
    let confirmations: Arc<dyn ConfirmationStore> = if config.cheq.persistence_path.is_empty() {
        Arc::new(InMemoryConfirmationStore::new())
    } else {
        Arc::new(
            JsonConfirmationStore::open(&config.cheq.persistence_path)
                .map_err(|err| format!("cheq store: {err}"))?,
        )
    };

    // Evidence store, optionally wrapped by the ledger bridge below.
    let evidence: Arc<dyn EvidenceStore> = if config.audit.path.is_empty() {
        Arc::new(InMemoryEvidenceStore::new())
    } else {
        Arc::new(
            JsonlEvidenceStore::open(&config.audit.path, config.audit.redact.clone())
                .map_err(|err| format!("audit store: {err}"))?,
        )
    };

    // Delivery provider.
    let feishu = &config.delivery.feishu;
    let delivery: Arc<dyn DeliveryProvider> =
        if feishu.enabled && !feishu.app_id.is_empty() && !feishu.app_secret.is_empty() {
            tracing::info!("feishu delivery enabled");
            Arc::new(FeishuProvider::new(FeishuProviderConfig {
                app_id: feishu.app_id.clone(),
                app_secret: feishu.app_secret.clone(),
                approval_user_ids: feishu.approval_user_ids.clone(),
                receive_id_type: feishu.receive_id_type.clone(),
                chat_id: feishu.chat_id.clone(),
                gateway_base_url: feishu.gateway_base_url.clone(),
                use_card_delivery: feishu.use_card_delivery,
                retry_max_attempts: feishu.retry_max_attempts,
                retry_initial_backoff_seconds: feishu.retry_initial_backoff_seconds,
                endpoint: String::new(),
            }))
        } else {
            if feishu.enabled {
                tracing::warn!(
                    "feishu enabled without app_id/app_secret; using no-op delivery"
                );
            }
            Arc::new(NoopDeliveryProvider)
        };
    if feishu.use_long_connection {
        tracing::warn!(
            "vendor long-connection transport is not bundled; card actions arrive via POST /feishu/card"
        );
    }

    // Ownership resolution and approval matching.
    let resolver = Arc::new(StaticResolver::new(
        config.ownership.static_map.clone(),
        feishu.approval_user_ids.clone(),
    ));
    let approval_rules: Vec<ApprovalRule> = config
        .ownership
        .approval_rules
        .iter()
        .map(|rule| ApprovalRule {
            path_prefix: rule.path_prefix.clone(),
            risk_level: rule.risk_level.clone(),
            timeout_secs: rule.timeout_seconds,
            approver_ids: rule.approval_user_ids.clone(),
            approval_policy: ApprovalPolicy::parse(&rule.approval_policy),
        })
        .collect();
    let matcher = RuleMatcher::new(
        approval_rules,
        ApprovalRuleMatch {
            timeout_secs: config.cheq.timeout_seconds,
            approver_ids: feishu.approval_user_ids.clone(),
            approval_policy: ApprovalPolicy::parse(&feishu.approval_policy),
        },
    );

    // CHEQ engine.
    let cheq: Arc<dyn ConfirmationEngine> = Arc::new(CheqEngine::new(
        confirmations,
        config.cheq.timeout_seconds,
        ApprovalPolicy::parse(&feishu.approval_policy),
        resolver,
        Arc::clone(&delivery),
    ));

    // Ledger and audit bridge.
    let mut ledger: Option<Arc<dyn Ledger>> = None;
    let mut bridge: Option<Arc<AuditLedgerBridge>> = None;
    let mut pipeline_evidence = Arc::clone(&evidence);
    if config.chain.enabled {
        let backend: Arc<LocalBackend> = if config.chain.storage_path.is_empty() {
            Arc::new(LocalBackend::in_memory())
        } else {
            Arc::new(
                LocalBackend::with_path(&config.chain.storage_path)
                    .map_err(|err| format!("chain backend: {err}"))?,
            )
        };
        let ledger_impl: Arc<dyn Ledger> = Arc::new(LedgerImpl::new(backend));
        if config.chain.audit_batch_enabled {
            let wrapped = Arc::new(AuditLedgerBridge::new(
                Arc::clone(&evidence),
                Arc::clone(&ledger_impl),
                BridgeConfig {
                    batch_size: config.chain.audit_batch_size,
                    interval: Duration::from_secs(config.chain.audit_batch_interval_sec),
                },
            ));
            pipeline_evidence = Arc::clone(&wrapped) as Arc<dyn EvidenceStore>;
            bridge = Some(wrapped);
        }
        ledger = Some(ledger_impl);
    }

    // Pipeline and gateway state.
    let pipeline = Arc::new(DecisionPipeline::new(
        policy,
        cheq,
        pipeline_evidence,
        delivery,
        matcher,
        PipelineConfig {
            allowed_api_keys: config.proxy.allowed_api_keys.clone(),
            cheq_timeout_secs: config.cheq.timeout_seconds,
            reminder_secs_before_timeout: config.cheq.reminder_seconds_before_timeout,
            review_requires_approval: config.cheq.review_requires_approval,
            ..PipelineConfig::default()
        },
    ));
    let state = Arc::new(GatewayState::new(pipeline, ledger, config.proxy.upstream.clone()));

    // SIGHUP reloads the policy ruleset atomically.
    if let Some(engine) = reloadable {
        tokio::spawn(async move {
            let Ok(mut hangup) =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup())
            else {
                return;
            };
            while hangup.recv().await.is_some() {
                match engine.reload() {
                    Ok(count) => tracing::info!(rules = count, "policy rules reloaded"),
                    Err(err) => tracing::error!(error = %err, "policy reload failed; keeping current rules"),
                }
            }
        });
    }

    let addr = parse_listen_addr(&config.proxy.listen_addr)?;
    diting_gateway::serve(state, addr, shutdown_signal())
        .await
        .map_err(|err| format!("serve: {err}"))?;

    // Final flush of any pending audit batch.
    if let Some(bridge) = bridge {
        bridge.shutdown().await;
    }
    tracing::info!("gateway drained");
    Ok(())
}

/// Parses the configured listen address; `:port` binds all interfaces.
fn parse_listen_addr(listen: &str) -> Result<SocketAddr, String> {
    let listen = if listen.is_empty() { ":8080" } else { listen };
    let candidate =
        if listen.starts_with(':') { format!("0.0.0.0{listen}") } else { listen.to_string() };
    candidate.parse().map_err(|_| format!("listen_addr unparseable: {listen}"))
}

/// Resolves when `SIGINT` or `SIGTERM` arrives.
async fn shutdown_signal() {
    let interrupt = tokio::signal::ctrl_c();
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };
    tokio::select! {
        _ = interrupt => {}
        () = terminate => {}
    }
    tracing::info!("shutdown signal received; draining");
}

// ============================================================================
// SECTION: Exec Helper
// ============================================================================

/// Decision payload returned by `POST /auth/exec`.
#[derive(Debug, Deserialize)]
struct ExecDecision {
    /// `allow`, `deny`, or `review`.
    #[serde(default)]
    decision: String,
    /// Rule behind the decision.
    #[serde(default)]
    policy_rule_id: String,
    /// Human-readable reason.
    #[serde(default)]
    reason: String,
}

/// Classifies the exec action from the command head.
fn exec_action(command: &[String]) -> &'static str {
    if command.first().is_some_and(|head| head == "sudo") { "exec:sudo" } else { "exec:run" }
}

/// Runs `diting exec`.
async fn exec(args: ExecArgs) -> ExitCode {
    let base_url = args
        .url
        .or_else(|| std::env::var("DITING_3AF_URL").ok())
        .unwrap_or_else(|| "http://localhost:8080".to_string());
    let token = args.token.or_else(|| std::env::var("DITING_AGENT_TOKEN").ok()).unwrap_or_default();
    let subject = args
        .subject
        .or_else(|| std::env::var("DITING_SUBJECT").ok())
        .or_else(|| std::env::var("USER").ok())
        .unwrap_or_else(|| "default".to_string());
    let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string());

    let mut body = BTreeMap::new();
    body.insert("subject", subject);
    body.insert("action", exec_action(&args.command).to_string());
    body.insert("resource", format!("local://{hostname}"));
    body.insert("command_line", args.command.join(" "));

    let client = reqwest::Client::new();
    let mut request =
        client.post(format!("{}/auth/exec", base_url.trim_end_matches('/'))).json(&body);
    if !token.is_empty() {
        request = request.header("X-Agent-Token", token);
    }
    let response = match request.send().await {
        Ok(response) => response,
        Err(err) => {
            report(&format!("diting exec: gateway request failed: {err}"));
            return ExitCode::from(1);
        }
    };
    let decision: ExecDecision = match response.json().await {
        Ok(decision) => decision,
        Err(err) => {
            report(&format!("diting exec: gateway response unreadable: {err}"));
            return ExitCode::from(1);
        }
    };
    if decision.decision != "allow" {
        report(&format!(
            "diting exec: denied ({}) {}",
            decision.policy_rule_id, decision.reason
        ));
        return ExitCode::from(1);
    }

    let Some((head, rest)) = args.command.split_first() else {
        report("diting exec: missing command");
        return ExitCode::from(2);
    };
    let status = std::process::Command::new(head).args(rest).status();
    match status {
        Ok(status) => {
            let code = status.code().unwrap_or(1);
            ExitCode::from(u8::try_from(code.clamp(0, 255)).unwrap_or(1))
        }
        Err(err) => {
            report(&format!("diting exec: spawn failed: {err}"));
            ExitCode::from(1)
        }
    }
}
