use sshproxy_charm::{
    charm::Charm, config::Settings, error::CharmError, event::Event, model::JujuHooks, telemetry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if let Some(arg) = args.get(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("sshproxy-charm {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" => {
                print_help();
                return Ok(());
            }
            other if other.starts_with('-') => {
                eprintln!("Unknown option: {}", other);
                print_help();
                std::process::exit(1);
            }
            _ => {}
        }
    }

    dotenv::dotenv().ok();

    let settings = Settings::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        anyhow::anyhow!("Failed to load configuration: {}", e)
    })?;

    telemetry::init_telemetry(&settings);

    let event = resolve_event(&args)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        event = event.name(),
        "Charm dispatch starting"
    );

    let charm = Charm::new(JujuHooks, settings);
    if let Err(e) = charm.dispatch(event).await {
        tracing::error!(event = event.name(), error = %e, "Event handling failed");
        return Err(e.into());
    }

    tracing::info!(event = event.name(), "Event handled");
    Ok(())
}

/// 命令行参数优先，否则从框架环境变量解析
fn resolve_event(args: &[String]) -> Result<Event, CharmError> {
    if let Some(arg) = args.get(1).filter(|a| !a.starts_with('-')) {
        return Event::from_dispatch_path(arg)
            .or_else(|| Event::from_hook_name(arg))
            .ok_or_else(|| CharmError::UnknownEvent(arg.clone()));
    }
    Event::from_env().ok_or_else(|| {
        CharmError::UnknownEvent(
            "none (set JUJU_DISPATCH_PATH or pass an event name)".to_string(),
        )
    })
}

fn print_help() {
    println!("sshproxy-charm {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage: sshproxy-charm [EVENT | OPTION]");
    println!();
    println!("Events:");
    println!("  hooks/<name> | actions/<name> | bare hook/action name");
    println!("  (without an argument the event is taken from JUJU_DISPATCH_PATH)");
    println!();
    println!("Options:");
    println!("  --version     Print version and exit");
    println!("  --help        Print this help and exit");
    println!();
    println!("Agent configuration comes from SSHPROXY_* environment variables;");
    println!("unit configuration (ssh-hostname, ssh-username, ssh-password)");
    println!("comes from the framework config store via config-get.");
}
