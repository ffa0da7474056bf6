use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "megacombo-dl")]
#[command(about = "One-level batch downloader for megacombo pages")]
#[command(version)]
pub struct Args {
    /// Log in and persist the session state (login only; no other actions)
    #[arg(long)]
    pub login: bool,

    /// Page to open during login (defaults to the site homepage)
    #[arg(long)]
    pub seed: Option<String>,

    /// Seed pages to auto-discover megacombo roots from (one or more)
    #[arg(long, num_args = 1..)]
    pub discover: Vec<String>,

    /// File containing megacombo URLs, one per line
    #[arg(long)]
    pub roots_file: Option<PathBuf>,

    /// Output directory (flat, no subfolders)
    #[arg(long, default_value = "downloads")]
    pub out: PathBuf,

    /// Write discovered roots to this file
    #[arg(long)]
    pub save_roots: Option<PathBuf>,

    /// Max number of roots to process
    #[arg(long, default_value_t = 500)]
    pub max_roots: usize,

    /// Headless browser for the download phase
    #[arg(long)]
    pub headless: bool,

    /// Session state file (overrides the config file)
    #[arg(long)]
    pub state: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// WebDriver server URL (overrides WEBDRIVER_URL and the config file)
    #[arg(long)]
    pub webdriver: Option<String>,
}
