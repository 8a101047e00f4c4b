//! HTTP API command.

use console::style;

use resdex_scrape::Settings;

use crate::cli::helpers::arrow;

/// Start the HTTP API.
pub async fn cmd_serve(settings: Settings, host: &str, port: u16) -> anyhow::Result<()> {
    println!(
        "{} Starting resdex API at http://{}:{} ({} concurrent jobs, {} when full)",
        arrow(),
        host,
        port,
        settings.engine.max_jobs,
        match settings.engine.overload {
            resdex_scrape::OverloadPolicy::Queue => "queue",
            resdex_scrape::OverloadPolicy::Reject => "reject",
        }
    );
    println!("  {}", style("Press Ctrl+C to stop").dim());

    resdex_scrape::server::serve(settings, host, port).await
}
