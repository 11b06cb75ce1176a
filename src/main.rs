//! twitter-video-dl - CLI entry point.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use twitter_video_dl::{
    api::{CredentialCache, MetadataFetcher, TemplateCache, XClient},
    cli::Args,
    config::{parse_post_url, validate_config, Config},
    download::{DownloadStats, MediaWriter, ResolvedPost, Resolver, SegmentReassembler, WriterOptions},
    error::{exit_codes, Error, Result},
    media::MediaExtractor,
    output::{
        create_resolve_spinner, print_banner, print_config_summary, print_error, print_info,
        print_repost, print_stats, print_warning,
    },
};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(e) => {
            print_error(&format!("{}", e));
            let code = match e {
                Error::Input { .. } | Error::InvalidFilename(_) => exit_codes::INPUT_ERROR,
                Error::Config(_) | Error::ConfigValidation { .. } | Error::TomlParse(_) => {
                    exit_codes::CONFIG_ERROR
                }
                Error::Credential { .. }
                | Error::Metadata { .. }
                | Error::ProtocolShape { .. }
                | Error::Transport { .. }
                | Error::Http(_) => exit_codes::API_ERROR,
                Error::Download(_) | Error::FFmpeg(_) | Error::FFmpegNotFound | Error::Io(_) => {
                    exit_codes::DOWNLOAD_ERROR
                }
                _ => exit_codes::UNEXPECTED_ERROR,
            };
            ExitCode::from(code as u8)
        }
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    fmt().with_env_filter(filter).with_target(false).init();

    print_banner();

    let config_path = args.config.clone();
    let mut config = if config_path.exists() {
        Config::load(&config_path)?
    } else {
        print_warning(&format!(
            "Configuration file not found: {}",
            config_path.display()
        ));
        print_info("Using default configuration with CLI arguments");
        Config::default()
    };

    args.merge_into_config(&mut config);
    validate_config(&config)?;

    let post = parse_post_url(&args.url)?;
    let mode = if args.all {
        "all repost targets"
    } else if args.first {
        "first video"
    } else {
        "single post"
    };
    print_config_summary(
        &post,
        mode,
        &config.options.output_directory.display().to_string(),
    );

    let client = Arc::new(XClient::from_config(&config)?);
    let templates = match &config.api.request_template_cache {
        Some(path) => TemplateCache::load(path)?,
        None => TemplateCache::in_memory(),
    };
    let fetcher = MetadataFetcher::standard(
        client.clone(),
        Arc::new(CredentialCache::new()),
        Arc::new(templates),
        config.api.fallback_query_id.clone(),
    );
    let resolver = Resolver::new(
        Arc::new(fetcher),
        MediaExtractor::new(config.options.save_images),
        config.options.max_repost_depth,
    );

    let spinner = create_resolve_spinner(&post, args.all);
    let resolved = if args.all {
        resolver.resolve_all(&post).await
    } else {
        resolver.resolve(&post).await.map(|r| vec![r])
    };
    spinner.finish_and_clear();
    let resolved: Vec<ResolvedPost> = resolved?;

    let mut stats = DownloadStats {
        posts_resolved: resolved.len() as u64,
        ..Default::default()
    };

    if resolved.iter().all(|r| r.media.is_empty()) {
        print_warning(&format!("No media found in {}", post.url));
        print_stats(&stats);
        return Ok(());
    }

    for r in &resolved {
        if r.post.id != post.id {
            print_repost(&post, &r.post);
        }
    }
    let items: usize = resolved.iter().map(|r| r.media.len()).sum();
    print_info(&format!("Found {} media item(s) in {} post(s)", items, resolved.len()));

    let reassembler = SegmentReassembler::new(client.clone(), config.options.max_concurrent_segments);
    let writer = MediaWriter::new(
        client,
        reassembler,
        WriterOptions::from_config(&config, args.file_name.as_deref(), args.first),
    )?;
    writer.write_all(&resolved, &mut stats).await?;

    print_stats(&stats);

    if stats.total_downloaded() == 0 && stats.failed_count > 0 {
        return Err(Error::Download(format!(
            "{} item(s) failed to download",
            stats.failed_count
        )));
    }

    Ok(())
}
