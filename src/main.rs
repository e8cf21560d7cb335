//! htmj CLI - inspect and run template bindings of an HTML page

use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;

use htmj::binding::diagnose;
use htmj::engine::scan_document;
use htmj::{Document, FixSuggestion, HandlerRegistry, Htmj, HtmjConfig, HtmjError, HttpTransport};

#[derive(Parser)]
#[command(name = "htmj")]
#[command(about = "Declarative fetch-and-render bindings for HTML templates")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the bindings declared in a page
    Scan {
        /// Path to the HTML page
        file: String,

        /// YAML config file
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Run the page's bindings and print the resulting HTML
    Render {
        /// Path to the HTML page
        file: String,

        /// Base URL for relative endpoints
        #[arg(short, long)]
        base_url: Option<String>,

        /// Event to fire after load, in order (e.g. '#load-btn:click')
        #[arg(short, long = "dispatch", value_name = "SELECTOR:EVENT")]
        dispatch: Vec<String>,

        /// YAML config file
        #[arg(short, long)]
        config: Option<String>,

        /// Print the pipeline event log as JSON to stderr
        #[arg(long)]
        events: bool,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (ignore if not present)
    let _ = dotenvy::dotenv();

    // Logs go to stderr so rendered HTML on stdout stays clean
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Scan { file, config } => scan_page(&file, config.as_deref()),
        Commands::Render {
            file,
            base_url,
            dispatch,
            config,
            events,
        } => render_page(&file, base_url.as_deref(), &dispatch, config.as_deref(), events).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.fix_suggestion() {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

fn load_config(path: Option<&str>) -> Result<HtmjConfig, HtmjError> {
    let config = match path {
        Some(path) => HtmjConfig::from_yaml_file(path)?,
        None => HtmjConfig::default(),
    };
    config.with_env_overrides()
}

/// `SELECTOR:EVENT`, split at the last colon
fn parse_dispatch(spec: &str) -> Result<(&str, &str), HtmjError> {
    match spec.rsplit_once(':') {
        Some((selector, event)) if !selector.trim().is_empty() && !event.trim().is_empty() => {
            Ok((selector.trim(), event.trim()))
        }
        _ => Err(HtmjError::InvalidDispatch {
            spec: spec.to_string(),
        }),
    }
}

fn scan_page(file: &str, config_path: Option<&str>) -> Result<(), HtmjError> {
    let html = std::fs::read_to_string(file)?;
    let config = load_config(config_path)?;
    let doc = Document::parse(&html);
    let names = config.attribute_names();
    let bindings = scan_document(&doc, &config);

    for binding in &bindings {
        let trigger = if binding.event == htmj::binding::DEFAULT_EVENT {
            "load".to_string()
        } else {
            format!("{} @ {}", binding.event, doc.describe(binding.event_target))
        };
        println!(
            "{} template #{} {} {} on {} {} {} ({})",
            "→".cyan(),
            binding.template.index(),
            binding.method.bold(),
            binding.endpoint,
            trigger,
            "→".cyan(),
            doc.describe(binding.target),
            binding.action.as_str()
        );
        if let Some(handler) = &binding.error_handler {
            println!("    errors → {}", handler.yellow());
        }
        for diagnostic in diagnose(&doc, binding.template, &names) {
            println!("    {} {}", "!".yellow().bold(), diagnostic);
        }
    }

    println!("{} bindings", bindings.len());
    Ok(())
}

async fn render_page(
    file: &str,
    base_url: Option<&str>,
    dispatch: &[String],
    config_path: Option<&str>,
    print_events: bool,
) -> Result<(), HtmjError> {
    let html = tokio::fs::read_to_string(file).await?;
    let mut config = load_config(config_path)?;
    if let Some(base) = base_url {
        config = config.with_base_url(base)?;
    }
    let specs = dispatch
        .iter()
        .map(|spec| parse_dispatch(spec))
        .collect::<Result<Vec<_>, _>>()?;

    let doc = Document::parse(&html);
    let handlers = HandlerRegistry::new();
    for binding in scan_document(&doc, &config) {
        if let Some(name) = binding.error_handler {
            let label = name.clone();
            handlers.register(name, move |message| {
                eprintln!("{} {}: {}", "handler".yellow(), label, message);
            });
        }
    }

    let transport = HttpTransport::new(&config)?;
    let htmj = Htmj::new(doc.into_shared(), Arc::new(transport))
        .with_config(config)
        .with_handlers(handlers);

    htmj.start().await;
    for (selector, event) in specs {
        htmj.dispatch_selector(selector, event).await?;
    }

    println!("{}", htmj.document().lock().to_html());
    if print_events {
        eprintln!("{}", htmj.event_log().to_json());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_spec_parsing() {
        assert_eq!(parse_dispatch("#btn:click").unwrap(), ("#btn", "click"));
        assert_eq!(
            parse_dispatch("form > button:submit").unwrap(),
            ("form > button", "submit")
        );
        assert!(parse_dispatch("click").is_err());
        assert!(parse_dispatch("#btn:").is_err());
        assert!(parse_dispatch(":click").is_err());
    }
}
