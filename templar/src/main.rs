use clap::{Parser, crate_version};
use miette::Result;
use templar::cli::Cli;
use templar::log;
use templar::{Templar, TemplarOptions};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.global_options.version {
        println!("templar {}", crate_version!());
        return Ok(());
    }

    let level = if cli.global_options.verbose {
        log::Level::Debug
    } else if cli.global_options.quiet {
        log::Level::Silent
    } else {
        log::Level::default()
    };
    log::init_tracing(level, cli.global_options.log_format);

    let request = cli.to_request()?;
    let templar = Templar::new(TemplarOptions::default());

    let cancel = templar.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    templar.run(request, std::io::stdout()).await
}
