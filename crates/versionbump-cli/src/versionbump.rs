#![forbid(unsafe_code)]

mod common;
mod logging;
mod options;
mod verbose;

use clap::Parser;
use color_eyre::eyre;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    let options = options::Options::parse();
    let color_choice = options.color_choice.unwrap_or(termcolor::ColorChoice::Auto);
    let use_color = logging::use_color(color_choice);
    colored::control::set_override(use_color);
    logging::setup(options.log_level, options.log_format, use_color)?;

    common::versionbump(options).await
}
