use clap::Parser;
use megacombo_dl::{DownloaderConfig, Error, Job, Result, RootSource};
use url::Url;

mod args;
use args::Args;

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init();

    // Parse command-line arguments
    let args = Args::parse();

    if let Err(e) = run(args).await {
        ::log::error!("{}", e);
        eprintln!("Error: {}", e);
        if let Error::NotLoggedIn(_) | Error::AuthRequired(_) = e {
            eprintln!(
                "   megacombo-dl --login --seed \"https://online-academy.fishhuang.com/learning/megacombo\""
            );
        }
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => DownloaderConfig::from_file(path)?,
        None => DownloaderConfig::default(),
    };
    if let Some(state) = &args.state {
        config.state_file = state.clone();
    }

    let job = Job::new(config).with_webdriver_url(args.webdriver.clone());

    if args.login {
        ::log::info!("Starting interactive login");
        job.login(args.seed.as_deref()).await?;
        return Ok(());
    }

    // Roots file wins when both sources are given
    let source = if let Some(path) = args.roots_file {
        RootSource::File(path)
    } else if !args.discover.is_empty() {
        let seeds = args
            .discover
            .iter()
            .map(|s| Url::parse(s))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        RootSource::Discover(seeds)
    } else {
        return Err(Error::NoRootSource);
    };

    let job = job
        .with_out_dir(&args.out)
        .with_max_roots(args.max_roots)
        .with_headless(args.headless)
        .with_save_roots(args.save_roots);

    let start_time = std::time::Instant::now();
    let Some(summary) = job.download(source).await? else {
        return Ok(());
    };

    let out_dir = std::fs::canonicalize(&summary.out_dir).unwrap_or(summary.out_dir.clone());
    println!(
        "\nDone! Total files downloaded: {}; Output directory: {}",
        summary.total_files(),
        out_dir.display()
    );
    ::log::info!(
        "Processed {} pages ({} skipped) in {:.2} seconds",
        summary.pages.len(),
        summary.skipped_pages(),
        start_time.elapsed().as_secs_f64()
    );
    Ok(())
}
