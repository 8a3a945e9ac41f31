// Entrypoint: post one comic and exit.
// - Configuration is read once here and handed to the clients.
// - Any error aborts the run; `anyhow` turns it into a non-zero exit.

use anyhow::{Context, Result};
use env_logger::Builder;
use log::{info, LevelFilter};
use xkcd_vk_poster::{
    api::VkClient,
    comic::ComicClient,
    config::{Config, RunMode},
    fetcher::ImageFetcher,
    http::build_client,
    poster::{ComicPoster, PostMode},
    ui,
};

fn main() -> Result<()> {
    init_logger();

    let config = Config::from_env().context("Failed to load configuration")?;
    info!("Starting with {:?} mode", config.mode);

    // Only the comic source may skip certificate checks; VK always verifies.
    let source_client = build_client(config.timeout, config.verify_tls)?;
    let vk_client = build_client(config.timeout, true)?;

    let poster = ComicPoster::new(
        ComicClient::new(source_client.clone(), &config.comic_url),
        ImageFetcher::new(source_client),
        VkClient::new(vk_client, &config.vk_api_url, config.vk.clone()),
        config.image_folder.clone(),
    );

    let post = ui::with_spinner("Posting comic...", || {
        let latest = poster
            .comics()
            .get_latest()
            .context("Failed to fetch the latest comic")?;
        let post = match config.mode {
            RunMode::Latest => poster.post(&latest),
            RunMode::Random => poster.post_comic(PostMode::Random(latest.number)),
        };
        post.context("Failed to post comic")
    })?;

    println!("{}", ui::summary(&post));
    Ok(())
}

fn init_logger() {
    Builder::new()
        .filter_level(LevelFilter::Warn)
        .filter_module("xkcd_vk_poster", LevelFilter::Info)
        .parse_default_env()
        .init();
}
