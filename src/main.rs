mod cli;

use tubeshift::{config, serve, services};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use ts_av::ToolRegistry;
use ts_core::{Origin, OutputFormat};
use ts_pipeline::JobPhase;

async fn start_serve(config_path: Option<&std::path::Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    tracing::info!("Starting tubeshift");
    tracing::info!("Finished files go to {}", config.output.dir.display());

    let queue = services::build_queue(&config)?;

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let result = serve::run(&queue, stdin, tokio::io::stdout()).await;

    tracing::info!("Shutting down...");
    queue.cancel_all();
    result
}

async fn fetch_one(url: &str, mp3: bool, config_path: Option<&std::path::Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let url = serve::checked_url(url)?;
    serve::resolve_host(&url).await?;
    let format = if mp3 {
        OutputFormat::Mp3
    } else {
        OutputFormat::Video
    };

    let queue = services::build_queue(&config)?;
    let mut ticket = queue.submit(Origin::new("cli"), url, format)?;

    let phase = tokio::select! {
        phase = ticket.wait() => phase,
        _ = tokio::signal::ctrl_c() => {
            queue.cancel_all();
            ticket.wait().await
        }
    };

    match phase {
        JobPhase::Completed => {
            println!("Saved to {}", config.output.dir.display());
            Ok(())
        }
        other => anyhow::bail!("job {}", other),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "tubeshift=trace,ts_pipeline=trace,ts_av=debug,ts_core=debug".to_string()
        } else {
            "tubeshift=info,ts_pipeline=info,ts_av=info,ts_core=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Serve => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_serve(cli.config.as_deref()))
        }
        Commands::Fetch { url, mp3 } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(fetch_one(&url, mp3, cli.config.as_deref()))
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("tubeshift {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn check_tools(config_path: Option<&std::path::Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = config::load_config_or_default(config_path)?;
    let tools = ToolRegistry::discover(&config.tools).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install them before running serve or fetch.");
    }

    Ok(())
}

fn validate_config(path: Option<&std::path::Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            config::Config::default()
        }
    };

    let playable = &config.conversion.playable;
    println!("  Playable video: {}", join(&playable.video_codecs));
    println!("  Playable audio: {}", join(&playable.audio_codecs));
    println!("  Playable containers: {}", join(&playable.containers));
    println!("  Format sort: {}", config.fetch.format_sort);
    println!("  Job timeout: {}s", config.queue.job_timeout_secs);
    println!("  Output dir: {}", config.output.dir.display());

    for warning in config.validate() {
        println!("  warning: {}", warning);
    }

    Ok(())
}

fn join<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
