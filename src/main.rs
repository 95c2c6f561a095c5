use linkscout::cli::{Cli, OutputFormat};
use linkscout::{CrawlEvent, LinkChecker, LinkState};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    if let Err(e) = linkscout::logging::init(cli.log_dir.as_deref()) {
        eprintln!("failed to initialize logging: {}", e);
        std::process::exit(2);
    }

    let format = cli.format;
    let checker = LinkChecker::new(cli.to_options());

    // Stream per-link lines as results arrive; the final summary comes
    // after the run
    let events = checker.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv_async().await {
            match event {
                CrawlEvent::Link(link) => {
                    if format == OutputFormat::Text {
                        let marker = match link.state {
                            LinkState::Ok => "ok",
                            LinkState::Broken => "BROKEN",
                            LinkState::Skipped => "skipped",
                        };
                        println!("[{:>3}] {} {}", link.status, marker, link.url);
                    }
                }
                CrawlEvent::PageStart(url) => {
                    tracing::info!(page = %url, "scanning");
                }
            }
        }
    });

    let summary = match checker.check().await {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!("configuration error: {}", e);
            std::process::exit(2);
        }
    };

    // Dropping the checker closes the event channel and ends the printer
    drop(checker);
    let _ = printer.await;

    match format {
        OutputFormat::Json => match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                tracing::error!("failed to serialize results: {}", e);
                std::process::exit(2);
            }
        },
        OutputFormat::Text => {
            println!(
                "{} links checked: {} ok, {} broken, {} skipped",
                summary.links.len(),
                summary.count(LinkState::Ok),
                summary.count(LinkState::Broken),
                summary.count(LinkState::Skipped),
            );
        }
    }

    std::process::exit(if summary.passed { 0 } else { 1 });
}
