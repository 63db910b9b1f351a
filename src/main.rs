//! Claude Wrapper - credential resolution and inbound API-key protection

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use secrecy::ExposeSecret;
use tracing::{error, info};

use claude_wrapper::{
    Error,
    auth::{AuthManager, ProviderSettings},
    cli::{Cli, Command, ServeArgs},
    config::Config,
    env::EnvSnapshot,
    gateway::WrapperServer,
    security::{ProtectionConfig, ProtectionOptions},
    setup_tracing,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            return ExitCode::from(e.exit_code());
        }
    };

    // Env files must land before the snapshot every provider reads from
    config.load_env_files();
    let env = EnvSnapshot::capture();

    match cli.command {
        Some(Command::Auth { offline, json }) => run_auth(&config, &env, offline, json).await,
        Some(Command::GenerateKey { length }) => run_generate_key(length),
        Some(Command::Serve(args)) => run_server(config, &env, args).await,
        None => run_server(config, &env, ServeArgs::default()).await,
    }
}

/// Resolve once and report
async fn run_auth(config: &Config, env: &EnvSnapshot, offline: bool, json: bool) -> ExitCode {
    let mut settings = ProviderSettings::from_config(&config.auth);
    if offline {
        settings.live_validation = false;
    }
    let manager = AuthManager::from_env(env, &settings);
    let result = manager.detect_auth_method().await;

    if json {
        match serde_json::to_string_pretty(&result) {
            Ok(rendered) => println!("{rendered}"),
            Err(e) => {
                eprintln!("Failed to serialize result: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else if let Some(method) = result.method().filter(|_| result.is_valid()) {
        println!("Authenticated with {}", method.display_name());
        for (key, value) in result.config() {
            println!("  {key}: {value}");
        }
        let forwarded: Vec<String> = manager.claude_code_env_vars().into_keys().collect();
        if !forwarded.is_empty() {
            println!("Forwarded variables: {}", forwarded.join(", "));
        }
    }

    if result.is_valid() {
        ExitCode::SUCCESS
    } else {
        let err = Error::AuthResolution(result.error_summary());
        if !json {
            eprintln!("{err}");
        }
        ExitCode::from(err.exit_code())
    }
}

fn run_generate_key(length: usize) -> ExitCode {
    match secure_token::generate_token(length) {
        Ok(token) => {
            println!("{token}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            let err = Error::from(e);
            eprintln!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}

async fn run_server(mut config: Config, env: &EnvSnapshot, args: ServeArgs) -> ExitCode {
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if args.require_api_key {
        config.security.policy.require_api_key = true;
    }

    let protection = ProtectionConfig::new(config.security.policy.clone(), env);
    let outcome = protection.configure_api_key_protection(ProtectionOptions {
        generate_if_missing: args.generate_api_key,
        key_length: args.api_key_length,
        ..ProtectionOptions::default()
    });
    if !outcome.success {
        error!(message = %outcome.message, "API key protection setup failed");
        return ExitCode::from(78);
    }
    info!(message = %outcome.message, "API key protection configured");
    if let Some(key) = outcome.generated_key {
        // Shown once on stdout, never through the logger
        println!("============================================================");
        println!("Generated API key (shown once, store it now):");
        println!("  {}", key.expose_secret());
        println!("Use: Authorization: Bearer <key>");
        println!("============================================================");
    }

    let settings = ProviderSettings::from_config(&config.auth);
    let auth = Arc::new(AuthManager::from_env(env, &settings));

    match WrapperServer::new(config, auth, Arc::new(protection)).run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::from(e.exit_code())
        }
    }
}
