//! Topic-to-post content pipeline CLI.
//!
//! Reads `postflow.toml` (or `--config`) and credentials from the environment
//! (a `.env` file is loaded first), then runs one pipeline per requested
//! platform, strictly one after another.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use postflow::agents::{AgentSettings, Crew};
use postflow::check::settings_report;
use postflow::core::platform::Platform;
use postflow::core::schedule::parse_schedule;
use postflow::core::types::Topic;
use postflow::exit_codes;
use postflow::io::archive::FsArchive;
use postflow::io::brand::BrandContext;
use postflow::io::config::{Credentials, DEFAULT_CONFIG_FILE, PostflowConfig, load_config};
use postflow::io::init::{InitOptions, init_workspace};
use postflow::io::outputs::list_recent_outputs;
use postflow::io::provider::ConfiguredProvider;
use postflow::io::publisher::PublerPublisher;
use postflow::io::renderer::CommandRenderer;
use postflow::logging;
use postflow::pipeline::{FailureKind, PipelineConfig, PipelineResult, create_post};
use postflow::publish::{PublishOutcome, publish_post};

#[derive(Parser)]
#[command(
    name = "postflow",
    version,
    about = "Turn a topic into a reviewed, publishable social-media post"
)]
struct Cli {
    /// Path to the config file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    /// Log stage transitions and scores to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default config, `.env.example`, brand files and folders.
    Init {
        /// Overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },
    /// Report credentials, brand files and reference templates.
    Check {
        #[arg(long)]
        json: bool,
    },
    /// Generate, review and render a post for a topic.
    Create {
        /// What the post is about (at least 10 characters).
        topic: String,
        #[arg(short, long, value_enum, default_value_t = PlatformArg::Instagram)]
        platform: PlatformArg,
        /// Publish approved posts through Publer.
        #[arg(long)]
        publish: bool,
        /// Schedule instead of posting now, as "YYYY-MM-DD HH:MM" local time.
        #[arg(long, requires = "publish")]
        schedule: Option<String>,
        /// Copy published images into the archive folders.
        #[arg(long, requires = "publish")]
        archive: bool,
        /// Print the full results as JSON.
        #[arg(long)]
        json: bool,
    },
    /// List recently generated images and markup.
    History {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// List the social accounts connected to Publer, with their ids.
    Accounts {
        #[arg(long)]
        json: bool,
    },
    /// List posts waiting in the Publer queue.
    Scheduled {
        #[arg(long)]
        json: bool,
    },
    /// Delete a scheduled post from the Publer queue.
    Unschedule {
        /// Post id as shown by `postflow scheduled`.
        id: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PlatformArg {
    Instagram,
    Linkedin,
    Both,
}

impl PlatformArg {
    fn platforms(self) -> Vec<Platform> {
        match self {
            PlatformArg::Instagram => vec![Platform::Instagram],
            PlatformArg::Linkedin => vec![Platform::LinkedIn],
            PlatformArg::Both => Platform::ALL.to_vec(),
        }
    }
}

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logging::init(cli.verbose);
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Init { force } => cmd_init(&cli.config, force),
        Command::Check { json } => cmd_check(&cli.config, json),
        Command::Create {
            topic,
            platform,
            publish,
            schedule,
            archive,
            json,
        } => cmd_create(
            &cli.config,
            &CreateArgs {
                topic,
                platforms: platform.platforms(),
                publish,
                schedule,
                archive,
                json,
            },
        ),
        Command::History { limit, json } => cmd_history(&cli.config, limit, json),
        Command::Accounts { json } => cmd_accounts(&cli.config, json),
        Command::Scheduled { json } => cmd_scheduled(&cli.config, json),
        Command::Unschedule { id } => cmd_unschedule(&cli.config, &id),
    }
}

fn config_root(config_path: &Path) -> &Path {
    config_path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

fn load_resolved_config(config_path: &Path) -> Result<PostflowConfig> {
    let mut config = load_config(config_path)?;
    config.resolve_paths(config_root(config_path));
    Ok(config)
}

fn cmd_init(config_path: &Path, force: bool) -> Result<i32> {
    let paths = init_workspace(config_root(config_path), &InitOptions { force })?;
    println!("wrote {}", paths.config_path.display());
    println!("brand files in {}", paths.brand_dir.display());
    println!(
        "put reference images in {}/<platform>/",
        paths.templates_dir.display()
    );
    println!(
        "copy {} to .env and fill in your keys",
        paths.env_example_path.display()
    );
    Ok(exit_codes::OK)
}

fn cmd_check(config_path: &Path, json: bool) -> Result<i32> {
    let config = load_resolved_config(config_path)?;
    let report = settings_report(&config, &Credentials::from_env())?;
    if json {
        print_json(&report)?;
    } else {
        println!("provider: {}", report.provider);
        println!("max iterations: {}", report.max_iterations);
        for status in &report.credentials {
            let state = if status.set { "set" } else { "missing" };
            println!("{}: {state}", status.name);
        }
        for file in &report.brand_files {
            match file.bytes {
                Some(bytes) => println!("brand/{}: {bytes} bytes", file.file),
                None => println!("brand/{}: missing (using default)", file.file),
            }
        }
        for template in &report.templates {
            println!(
                "templates/{}: {} reference image(s)",
                template.platform, template.count
            );
        }
    }
    if report.can_create(&config) {
        Ok(exit_codes::OK)
    } else {
        eprintln!("content creation needs ANTHROPIC_API_KEY or a command provider");
        Ok(exit_codes::INVALID)
    }
}

struct CreateArgs {
    topic: String,
    platforms: Vec<Platform>,
    publish: bool,
    schedule: Option<String>,
    archive: bool,
    json: bool,
}

#[derive(Serialize)]
struct PostReport {
    result: PipelineResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    published: Option<PublishOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    publish_error: Option<String>,
}

fn cmd_create(config_path: &Path, args: &CreateArgs) -> Result<i32> {
    let topic = Topic::new(&args.topic)?;
    let when = args
        .schedule
        .as_deref()
        .map(|input| parse_schedule(input, &Local::now()))
        .transpose()?;
    let config = load_resolved_config(config_path)?;
    let credentials = Credentials::from_env();

    // Everything that can fail on configuration is checked before the first
    // provider call.
    let provider = ConfiguredProvider::from_config(&config.provider, &credentials)?;
    let publisher = if args.publish {
        for platform in &args.platforms {
            match platform {
                Platform::Instagram => credentials.instagram_account_id()?,
                Platform::LinkedIn => credentials.linkedin_account_id()?,
            };
        }
        Some(PublerPublisher::from_credentials(&config.publisher, &credentials)?)
    } else {
        None
    };
    let archive = args.archive.then(|| FsArchive::new(&config.archive.dir));

    let brand = BrandContext::load(&config.brand_dir, &config.brand);
    let crew = Crew::new(&brand, &AgentSettings::from_config(&config));
    let renderer = CommandRenderer::from_config(&config.renderer);
    let pipeline = PipelineConfig {
        max_iterations: config.max_iterations,
        output_dir: config.output_dir.clone(),
        write_run_log: true,
    };

    let mut code = exit_codes::OK;
    let mut reports = Vec::new();
    for &platform in &args.platforms {
        let result = create_post(
            &provider,
            &renderer,
            &crew,
            &pipeline,
            &topic,
            platform,
            Utc::now(),
        );
        let mut report = PostReport {
            result,
            published: None,
            publish_error: None,
        };
        code = code.max(result_code(&report.result));

        if let (PipelineResult::Approved(post), Some(publisher)) = (&report.result, &publisher) {
            match publish_post(
                publisher,
                archive.as_ref(),
                post,
                when,
                Local::now().date_naive(),
            ) {
                Ok(outcome) => report.published = Some(outcome),
                Err(err) => {
                    report.publish_error = Some(format!("{err:#}"));
                    code = code.max(exit_codes::FAILED);
                }
            }
        }

        if !args.json {
            print_post(&report);
        }
        reports.push(report);
    }

    if args.json {
        print_json(&reports)?;
    }
    Ok(code)
}

fn result_code(result: &PipelineResult) -> i32 {
    match result {
        PipelineResult::Approved(_) => exit_codes::OK,
        PipelineResult::Failed(post) => match post.kind {
            FailureKind::Exhausted => exit_codes::EXHAUSTED,
            FailureKind::Collaborator => exit_codes::FAILED,
        },
    }
}

fn print_post(report: &PostReport) {
    match &report.result {
        PipelineResult::Approved(post) => {
            println!(
                "{}: approved ({:?}), audit {}/100, manager {}/100, {} revision round(s)",
                post.platform.display_name(),
                post.path,
                post.audit_score,
                post.decision_score,
                post.iterations
            );
            println!("image: {}", post.image.path.display());
            println!();
            println!("{}", post.draft.copy.caption_with_hashtags());
            println!();
        }
        PipelineResult::Failed(post) => {
            println!(
                "{}: failed after {} revision round(s): {}",
                post.platform.display_name(),
                post.iterations,
                post.reason
            );
            if let Some(feedback) = &post.last_feedback {
                println!("last feedback: {}", feedback.reason);
            }
            if let Some(dir) = &post.run_dir {
                println!("run log: {}", dir.display());
            }
        }
    }
    if let Some(published) = &report.published {
        println!(
            "published: id {} ({}, {})",
            published.receipt.id, published.receipt.status, published.receipt.scheduled_at
        );
        if let Some(file) = &published.archived {
            println!("archived: {}", file.path.display());
        }
    }
    if let Some(err) = &report.publish_error {
        println!("publish failed: {err}");
    }
}

fn cmd_history(config_path: &Path, limit: usize, json: bool) -> Result<i32> {
    let config = load_resolved_config(config_path)?;
    let entries = list_recent_outputs(&config.output_dir, limit)?;
    if json {
        print_json(&entries)?;
        return Ok(exit_codes::OK);
    }
    if entries.is_empty() {
        println!("no outputs in {}", config.output_dir.display());
    }
    for entry in &entries {
        let modified = entry
            .modified
            .map(|time| time.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{modified}  {:>9}  {}", entry.bytes, entry.path.display());
    }
    Ok(exit_codes::OK)
}

fn publisher(config_path: &Path) -> Result<PublerPublisher> {
    let config = load_resolved_config(config_path)?;
    PublerPublisher::from_credentials(&config.publisher, &Credentials::from_env())
}

fn cmd_accounts(config_path: &Path, json: bool) -> Result<i32> {
    let accounts = publisher(config_path)?.accounts()?;
    if json {
        print_json(&accounts)?;
        return Ok(exit_codes::OK);
    }
    if accounts.is_empty() {
        println!("no accounts connected");
    }
    for account in &accounts {
        println!("{:<12} {:<20} {}", account.platform, account.id, account.name);
    }
    Ok(exit_codes::OK)
}

fn cmd_scheduled(config_path: &Path, json: bool) -> Result<i32> {
    let posts = publisher(config_path)?.scheduled_posts()?;
    if json {
        print_json(&posts)?;
        return Ok(exit_codes::OK);
    }
    if posts.is_empty() {
        println!("no scheduled posts");
    }
    for post in &posts {
        let first_line = post.text.lines().next().unwrap_or_default();
        println!(
            "{}  {}  {}  {first_line}",
            post.id,
            post.scheduled_at.as_deref().unwrap_or("-"),
            post.status
        );
    }
    Ok(exit_codes::OK)
}

fn cmd_unschedule(config_path: &Path, id: &str) -> Result<i32> {
    publisher(config_path)?.delete_post(id)?;
    println!("deleted {id}");
    Ok(exit_codes::OK)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value).context("serialize json")?;
    println!("{payload}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_create_defaults_to_instagram() {
        let cli = Cli::parse_from(["postflow", "create", "10 tips for better mornings"]);
        let Command::Create {
            platform, publish, ..
        } = cli.command
        else {
            panic!("expected create");
        };
        assert_eq!(platform, PlatformArg::Instagram);
        assert!(!publish);
    }

    #[test]
    fn parse_both_platforms_in_order() {
        let cli = Cli::parse_from(["postflow", "create", "topic here!", "--platform", "both"]);
        let Command::Create { platform, .. } = cli.command else {
            panic!("expected create");
        };
        assert_eq!(
            platform.platforms(),
            vec![Platform::Instagram, Platform::LinkedIn]
        );
    }

    #[test]
    fn schedule_requires_publish() {
        let parsed = Cli::try_parse_from([
            "postflow",
            "create",
            "topic here!",
            "--schedule",
            "2030-01-01 09:00",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn unschedule_takes_a_post_id() {
        let cli = Cli::parse_from(["postflow", "unschedule", "p-42"]);
        let Command::Unschedule { id } = cli.command else {
            panic!("expected unschedule");
        };
        assert_eq!(id, "p-42");
        assert!(Cli::try_parse_from(["postflow", "unschedule"]).is_err());
    }

    #[test]
    fn config_root_of_bare_file_is_cwd() {
        assert_eq!(config_root(Path::new("postflow.toml")), Path::new("."));
        assert_eq!(config_root(Path::new("site/postflow.toml")), Path::new("site"));
    }
}
