//! Terminal rendering of links, insights and statistics.

use crate::form::{format_date, StatsView};
use crate::models::{Method, ShortenedLink, Stats};
use colored::*;
use std::fmt::Display;

fn line(out: &mut String, text: impl Display) {
    out.push_str(&text.to_string());
    out.push('\n');
}

fn field(out: &mut String, label: &str, value: impl Display) {
    line(out, format!("  {:<16} {}", format!("{}:", label).bright_white(), value));
}

/// Details of a single link.
pub fn link(link: &ShortenedLink) -> String {
    let mut out = String::new();

    line(&mut out, "🔗 Short URL".bright_blue().bold());
    line(&mut out, format!("  {}", link.short_url.bright_yellow().bold()));
    out.push('\n');

    field(&mut out, "Original URL", &link.original_url);
    field(&mut out, "Short code", &link.short_code);
    field(&mut out, "Method", link.method.as_str().cyan());
    field(&mut out, "Visits", link.redirect_count.to_string().bright_green().bold());
    field(&mut out, "Last accessed", format_date(Some(link.last_accessed)));
    field(&mut out, "Last modified", format_date(Some(link.last_modified)));

    let expiration = match link.expiration {
        Some(_) if link.is_expired() => format!("{} (expired)", format_date(link.expiration))
            .red()
            .to_string(),
        other => format_date(other),
    };
    field(&mut out, "Expires", expiration);

    for (name, value) in link.utm.pairs() {
        field(&mut out, name, value);
    }

    out
}

/// Link snapshot followed by its visit insights.
pub fn insights(view: &StatsView) -> String {
    let Some(current) = &view.link else {
        return String::new();
    };

    let mut out = link(current);
    out.push('\n');
    line(&mut out, "📊 Insights".bright_blue().bold());

    let last = match &view.last_access {
        Some(access) => format!(
            "{} from {} ({})",
            format_date(Some(access.accessed_at)),
            access.ip_address,
            if access.user_agent.is_empty() { "unknown agent" } else { access.user_agent.as_str() }
        ),
        None => format_date(None),
    };
    field(&mut out, "Last visit", last);

    line(&mut out, format!("  {}", "Top user agents:".bright_white()));
    if view.top_agents.is_empty() {
        line(&mut out, format!("    {}", "none".dimmed()));
    }
    for (rank, agent) in view.top_agents.iter().enumerate() {
        line(&mut out, format!("    {}. {}", rank + 1, agent));
    }

    line(
        &mut out,
        format!(
            "  {} {}",
            "Unique IPs:".bright_white(),
            view.unique_ips.len().to_string().bright_green().bold()
        ),
    );
    for ip in &view.unique_ips {
        line(&mut out, format!("    {}", ip));
    }

    out
}

/// Aggregate statistics for the admin command.
pub fn stats(stats: &Stats) -> String {
    let mut out = String::new();

    line(&mut out, "📊 Statistics".bright_blue().bold());
    field(&mut out, "Total links", stats.total_links.to_string().bright_green().bold());
    field(&mut out, "Total visits", stats.total_visits.to_string().bright_green().bold());
    field(&mut out, "Active links", stats.active_links);
    field(&mut out, "Expired links", stats.expired_links);

    out
}

/// Shortening methods and what they do.
pub fn methods() -> String {
    let mut out = String::new();
    for method in Method::ALL {
        line(&mut out, format!("  {:<8} {}", method.as_str().cyan(), method.description()));
    }
    out
}

pub fn error(message: &str) -> String {
    format!("{} {}", "✗".red().bold(), message.red())
}

pub fn success(message: &str) -> String {
    format!("{} {}", "✓".green().bold(), message.green())
}
