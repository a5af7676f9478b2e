//! Command handlers. Each one talks to the session manager or the analysis
//! generator and prints a human-readable result.

use std::io::{self, Write};

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use tracing::{debug, warn};

use chartlens_core::analysis::{filter_history, generate_analysis, group_by_day, recent_analyses};
use chartlens_core::auth::validate_credentials;
use chartlens_core::models::{Analysis, AnalysisRequest, ChartType};
use chartlens_core::utils::{format_analysis_date, format_remaining, truncate_string};
use chartlens_core::{Config, SessionManager};

/// Column width for titles in history listings
const TITLE_WIDTH: usize = 40;

pub fn print_usage() {
    eprintln!(
        "Usage: chartlens <command> [args]

Session:
  login [email]           Sign in with email and password
  register [email]        Create an account
  google                  Sign in with Google
  logout                  Sign out and forget the stored session
  status                  Show who is signed in and when the token expires
  token                   Print a valid id token
  refresh                 Refresh the id token now

Analysis:
  analyze <title> [--type <chart type>] [--context <text>] [--image <uri>] [--json]
  history [search] [--type <chart type>]

Chart types: {}",
        ChartType::ALL.map(|t| t.label()).join(", ")
    );
}

// ============================================================================
// Argument helpers
// ============================================================================

/// Remove `--name value` from `args` and return the value
fn take_flag(args: &mut Vec<String>, name: &str) -> Result<Option<String>> {
    let Some(pos) = args.iter().position(|a| a == name) else {
        return Ok(None);
    };
    if pos + 1 >= args.len() {
        bail!("{} needs a value", name);
    }
    let value = args.remove(pos + 1);
    args.remove(pos);
    Ok(Some(value))
}

/// Remove a bare `--name` switch from `args`
fn take_switch(args: &mut Vec<String>, name: &str) -> bool {
    match args.iter().position(|a| a == name) {
        Some(pos) => {
            args.remove(pos);
            true
        }
        None => false,
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    Ok(line.trim().to_string())
}

fn read_email(config: &Config, args: &[String]) -> Result<String> {
    if let Some(email) = args.first() {
        return Ok(email.trim().to_string());
    }
    match config.last_email {
        Some(ref last) => {
            let entered = prompt(&format!("Email [{}]: ", last))?;
            Ok(if entered.is_empty() { last.clone() } else { entered })
        }
        None => prompt("Email: "),
    }
}

fn remember_email(config: &mut Config, email: &str) {
    if config.last_email.as_deref() == Some(email) {
        return;
    }
    config.last_email = Some(email.to_string());
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }
}

// ============================================================================
// Session commands
// ============================================================================

pub async fn login(session: &SessionManager, config: &mut Config, args: &[String]) -> Result<()> {
    let email = read_email(config, args)?;
    let password = rpassword::prompt_password("Password: ").context("Failed to read password")?;
    validate_credentials(&email, &password, None)?;

    let signed_in = session.sign_in(&email, &password).await?;
    remember_email(config, &signed_in.user.email);
    println!("Signed in as {}", signed_in.user.display_label());
    Ok(())
}

pub async fn register(session: &SessionManager, config: &mut Config, args: &[String]) -> Result<()> {
    let email = read_email(config, args)?;
    let password = rpassword::prompt_password("Password: ").context("Failed to read password")?;
    let confirm = rpassword::prompt_password("Confirm password: ").context("Failed to read password")?;
    validate_credentials(&email, &password, Some(&confirm))?;

    let created = session.sign_up(&email, &password).await?;
    remember_email(config, &created.user.email);
    println!("Account created. Signed in as {}", created.user.display_label());
    Ok(())
}

pub async fn google(session: &SessionManager) -> Result<()> {
    let signed_in = session.sign_in_with_google().await?;
    println!("Signed in as {}", signed_in.user.display_label());
    Ok(())
}

pub async fn logout(session: &SessionManager) -> Result<()> {
    session.logout().await;
    println!("Signed out");
    Ok(())
}

pub async fn status(session: &SessionManager) -> Result<()> {
    let Some(current) = session.stored_session().await else {
        println!("Not signed in");
        return Ok(());
    };

    let now = Utc::now().timestamp_millis();
    let user = &current.user;
    println!("Signed in as {} <{}>", user.display_label(), user.email);
    println!("User ID:        {}", user.local_id);
    println!("Email verified: {}", if user.email_verified { "yes" } else { "no" });
    println!(
        "Token expires:  in {}",
        format_remaining(current.seconds_until_expiry(now))
    );
    Ok(())
}

pub async fn token(session: &SessionManager) -> Result<()> {
    let token = session
        .valid_id_token()
        .await
        .ok_or_else(|| anyhow!("Not signed in"))?;
    println!("{}", token);
    Ok(())
}

pub async fn refresh(session: &SessionManager) -> Result<()> {
    match session.refresh().await {
        Some(_) => {
            println!("Token refreshed");
            Ok(())
        }
        None => bail!("Could not refresh the session. Please sign in again."),
    }
}

// ============================================================================
// Analysis commands
// ============================================================================

pub fn analyze(mut args: Vec<String>) -> Result<()> {
    let chart_type = take_flag(&mut args, "--type")?
        .map(|t| t.parse::<ChartType>())
        .transpose()?;
    let context = take_flag(&mut args, "--context")?;
    let image = take_flag(&mut args, "--image")?;
    let as_json = take_switch(&mut args, "--json");

    let mut request = AnalysisRequest::new(&args.join(" "))?;
    if let Some(chart_type) = chart_type {
        request = request.with_chart_type(chart_type);
    }
    if let Some(ref context) = context {
        request = request.with_context(context);
    }
    if let Some(image) = image {
        request = request.with_image_uri(image);
    }
    debug!(title = %request.title, chart_type = ?request.chart_type, "Generating analysis");

    let analysis = generate_analysis(&request, Utc::now());
    if as_json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    } else {
        print_analysis(&analysis);
    }
    Ok(())
}

fn print_analysis(analysis: &Analysis) {
    println!("{} ({})", analysis.title, analysis.chart_type);
    println!("{}", format_analysis_date(&analysis.date));
    if let Some(ref summary) = analysis.summary {
        println!("\nSummary\n  {}", summary);
    }
    if !analysis.insights.is_empty() {
        println!("\nKey insights");
        for insight in &analysis.insights {
            let figures = match (&insight.value, &insight.change) {
                (Some(value), Some(change)) => format!(" [{} {}]", value, change),
                (Some(value), None) => format!(" [{}]", value),
                _ => String::new(),
            };
            println!("  - {}{}: {}", insight.title, figures, insight.description);
        }
    }
    if !analysis.trends.is_empty() {
        println!("\nTrends");
        for trend in &analysis.trends {
            println!("  - {} ({}): {}", trend.title, trend.timeframe, trend.description);
        }
    }
    if let Some(ref forecast) = analysis.forecast {
        println!("\nForecast\n  {}", forecast);
    }
}

pub fn history(mut args: Vec<String>) -> Result<()> {
    let chart_type = take_flag(&mut args, "--type")?
        .map(|t| t.parse::<ChartType>())
        .transpose()?;
    let query = args.join(" ");

    let matches = filter_history(&recent_analyses(), &query, chart_type);
    if matches.is_empty() {
        println!("No analyses found");
        return Ok(());
    }

    let groups = group_by_day(&matches, Utc::now().date_naive());
    for (heading, entries) in [
        ("Today", &groups.today),
        ("Yesterday", &groups.yesterday),
        ("Older", &groups.older),
    ] {
        if entries.is_empty() {
            continue;
        }
        println!("{}", heading);
        for analysis in entries {
            println!(
                "  {:<width$}  {:<12}  {}",
                truncate_string(&analysis.title, TITLE_WIDTH),
                analysis.chart_type.label(),
                format_analysis_date(&analysis.date),
                width = TITLE_WIDTH
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_take_flag() {
        let mut a = args(&["Sales", "--type", "line", "2024"]);
        assert_eq!(take_flag(&mut a, "--type").unwrap().as_deref(), Some("line"));
        assert_eq!(a, args(&["Sales", "2024"]));
        assert_eq!(take_flag(&mut a, "--context").unwrap(), None);

        let mut dangling = args(&["Sales", "--type"]);
        assert!(take_flag(&mut dangling, "--type").is_err());
    }

    #[test]
    fn test_take_switch() {
        let mut a = args(&["Sales", "--json"]);
        assert!(take_switch(&mut a, "--json"));
        assert!(!take_switch(&mut a, "--json"));
        assert_eq!(a, args(&["Sales"]));
    }
}
