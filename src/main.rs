use anyhow::Result;
use clap::Parser;
use storyline::cli::{Cli, Commands};
use storyline::{utils, CancellationToken, Settings, StoryResponse, StoryService};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::new()?;
    settings.validate()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    if let Commands::Ping = cli.command {
        return handle_ping(&settings);
    }

    let service = StoryService::from_settings(&settings, Settings::api_token()).await?;

    match cli.command {
        Commands::Create { url, json } => handle_create(&service, &settings, url, json).await,
        Commands::Show { session } => handle_show(&service, session).await,
        Commands::List => handle_list(&service).await,
        Commands::Ping => Ok(()),
    }
}

async fn handle_create(
    service: &StoryService,
    settings: &Settings,
    url: String,
    json: bool,
) -> Result<()> {
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling story generation");
            trigger.cancel();
        }
    });

    if !json {
        utils::print_status(
            "Generating",
            &format!(
                "{} parts, about {}s apart",
                settings.pipeline.parts,
                settings.pipeline.part_delay_ms / 1000
            ),
        );
    }

    let response = service.create_story_with_cancel(Some(&url), &cancel).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return if response.is_ok() {
            Ok(())
        } else {
            Err(anyhow::anyhow!("story generation failed"))
        };
    }

    match response {
        StoryResponse::Ok {
            message,
            session_token,
            source_url,
            parts,
        } => {
            utils::print_story(&format!("Story for {}", source_url), &parts);
            utils::print_saved(&message, &session_token);
            Ok(())
        }
        StoryResponse::Error { kind, message } => {
            utils::print_failure(kind, &message);
            Err(anyhow::anyhow!(message))
        }
    }
}

async fn handle_show(service: &StoryService, session: String) -> Result<()> {
    let story = service.load_story(&session).await?;

    utils::print_story(&format!("Session {}", story.session_token), &story.parts);
    Ok(())
}

async fn handle_list(service: &StoryService) -> Result<()> {
    let sessions = service.list_stories().await?;
    utils::print_sessions(&sessions);
    Ok(())
}

fn handle_ping(settings: &Settings) -> Result<()> {
    utils::print_status("Status", "All good here!");
    utils::print_status("Endpoint", &settings.generation.endpoint);
    utils::print_status("Storage root", &settings.storage.root);
    utils::print_status(
        "API token",
        if Settings::api_token().is_some() { "configured" } else { "not set" },
    );
    Ok(())
}
