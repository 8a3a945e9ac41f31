// Library root
// -----------
// Posts an xkcd comic to a VK community wall. The binary (`main.rs`) builds
// the configuration and clients, then runs the pipeline once.
//
// Module responsibilities:
// - `config`: Reads credentials and settings from `.env`/environment once.
// - `error`: Error taxonomy shared by every outbound call.
// - `http`: Blocking client construction and the HTTP-level checks.
// - `comic`: Comic metadata client and local file name derivation.
// - `fetcher`: Downloads the comic image, reusing a same-named file.
// - `api`: The VK upload sequence (address, upload, save, publish).
// - `poster`: Composes the above and cleans up the downloaded image.
// - `ui`: Spinner and summary output for the terminal.
pub mod api;
pub mod comic;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod http;
pub mod poster;
pub mod ui;
