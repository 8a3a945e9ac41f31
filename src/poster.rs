// Orchestrator: choose a comic, download its image, run the VK upload
// sequence, and remove the downloaded file whatever the outcome.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{info, warn};
use rand::Rng;

use crate::api::{VkClient, WallPost};
use crate::comic::{image_file_name, Comic, ComicClient};
use crate::error::Result;
use crate::fetcher::ImageFetcher;

/// Which issue `post_comic` publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostMode {
    Latest,
    /// Uniform draw from `[0, max]`, both ends inclusive. Issue 0 does not
    /// exist on xkcd, so a draw of 0 fails at the comic fetch.
    Random(u32),
}

/// Draw an issue number from `[0, max]`.
pub fn pick_issue<R: Rng>(rng: &mut R, max: u32) -> u32 {
    rng.gen_range(0..=max)
}

/// Deletes the wrapped file when dropped.
struct LocalImage {
    path: PathBuf,
}

impl LocalImage {
    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LocalImage {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => info!("Removed {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {e}", self.path.display()),
        }
    }
}

pub struct ComicPoster {
    comics: ComicClient,
    fetcher: ImageFetcher,
    vk: VkClient,
    image_folder: PathBuf,
}

impl ComicPoster {
    pub fn new(
        comics: ComicClient,
        fetcher: ImageFetcher,
        vk: VkClient,
        image_folder: impl Into<PathBuf>,
    ) -> Self {
        ComicPoster {
            comics,
            fetcher,
            vk,
            image_folder: image_folder.into(),
        }
    }

    pub fn comics(&self) -> &ComicClient {
        &self.comics
    }

    /// Post the comic selected by `mode`, drawing random issues from the
    /// thread RNG.
    pub fn post_comic(&self, mode: PostMode) -> Result<WallPost> {
        self.post_comic_with_rng(mode, &mut rand::thread_rng())
    }

    pub fn post_comic_with_rng<R: Rng>(&self, mode: PostMode, rng: &mut R) -> Result<WallPost> {
        let comic = match mode {
            PostMode::Latest => self.comics.get_latest()?,
            PostMode::Random(max) => {
                let number = pick_issue(rng, max);
                info!("Picked comic #{number} of {max}");
                self.comics.get_by_number(number)?
            }
        };
        self.post(&comic)
    }

    /// Publish an already-fetched comic.
    pub fn post(&self, comic: &Comic) -> Result<WallPost> {
        let file_name = image_file_name(&comic.image_url)?;
        let image = LocalImage {
            path: self.image_folder.join(file_name),
        };
        self.fetcher.fetch(&comic.image_url, image.path())?;
        let post = self.vk.post_photo(image.path(), &comic.caption)?;
        info!("Posted comic #{} as wall post {}", comic.number, post.post_id);
        Ok(post)
    }
}
