mod app;
mod danbooru;
mod filter;
mod settings;
mod slideshow;
mod staging;
mod wallpaper;

use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();
    app::run()
}
