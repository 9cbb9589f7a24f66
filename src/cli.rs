use clap::{Parser, Subcommand};
use colored::*;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Datelike, Utc};

use crate::assembler::assemble;
use crate::logo::{procedural_variants, LogoRequest};
use crate::plan::{locked_fields, FormField, Plan};
use crate::site::SiteData;
use crate::BoxError;

// ============================================================================
// TERMINAL DESIGN
// ============================================================================

const SITECRAFT_LOGO: &str = r#"
       _ _                       __ _
  ___ (_) |_ ___  ___ _ __ __ _ / _| |_
 / __|| | __/ _ \/ __| '__/ _` | |_| __|
 \__ \| | ||  __/ (__| | | (_| |  _| |_
 |___/|_|\__\___|\___|_|  \__,_|_|  \__|
"#;

const TAGLINE: &str = "Single-file websites for small businesses";
const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// CLI STRUCTURE
// ============================================================================

#[derive(Parser)]
#[command(name = "sitecraft")]
#[command(version = VERSION)]
#[command(about = "Assemble business websites and logos from the command line", long_about = None)]
#[command(disable_help_flag = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Show help information
    #[arg(short = 'h', long = "help")]
    help: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble a site from a JSON description
    Build {
        /// Site description (camelCase JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Output HTML file
        #[arg(short, long, default_value = "site.html")]
        output: PathBuf,

        /// Copyright year for the footer (defaults to the current year)
        #[arg(long)]
        year: Option<i32>,
    },

    /// Generate procedural SVG logo variants
    Logo {
        /// Brand name
        #[arg(short, long)]
        brand: String,

        #[arg(long, default_value = "")]
        slogan: String,

        /// Industry keyword used to pick a symbol
        #[arg(long, default_value = "")]
        industry: String,

        /// Palette (minimal, bold, playful, elegant, modern)
        #[arg(long, default_value = "minimal")]
        style: String,

        /// Up to two hex colors overriding the palette
        #[arg(long, default_value = "")]
        colors: String,

        /// Directory the SVG files are written to
        #[arg(short, long, default_value = "logos")]
        output_dir: PathBuf,
    },

    /// Show the controls a plan locks
    Plan {
        #[arg(short, long, default_value = "basic")]
        plan: String,
    },

    /// Show version information
    Version,
}

// ============================================================================
// TERMINAL UI
// ============================================================================

struct TerminalUI;

impl TerminalUI {
    fn show_intro() {
        println!("{}", SITECRAFT_LOGO.bright_cyan().bold());
        println!("{}", "═".repeat(60).bright_black());
        println!("{:^60}", TAGLINE.bright_white().bold());
        println!("{:^60}", format!("v{}", VERSION).bright_black());
        println!("{}", "═".repeat(60).bright_black());
        println!();
    }

    fn show_help() {
        Self::show_intro();

        println!("{}", "USAGE:".bright_white().bold());
        println!("  sitecraft <COMMAND> [OPTIONS]");
        println!();

        println!("{}", "COMMANDS:".bright_white().bold());
        Self::print_command("build", "Assemble site.html from a JSON description");
        Self::print_command("logo", "Write procedural SVG logo variants");
        Self::print_command("plan", "List the controls a plan locks");
        Self::print_command("version", "Show version information");
        println!();

        println!("{}", "EXAMPLES:".bright_white().bold());
        println!("  {} Build a site", "→".bright_green());
        println!(
            "    {}",
            "sitecraft build --input bloom.json --output site.html".bright_yellow()
        );
        println!("  {} Sketch some logos", "→".bright_green());
        println!(
            "    {}",
            "sitecraft logo --brand \"Bloom Studio\" --industry florist --style elegant"
                .bright_yellow()
        );
        println!();
        println!(
            "The HTTP builder runs as {}.",
            "sitecraft-server".bright_cyan()
        );
        println!();
    }

    fn print_command(name: &str, description: &str) {
        println!("  {:<20} {}", name.bright_cyan().bold(), description);
    }

    fn print_section(title: &str) {
        println!();
        println!("{}", format!("┌─ {} ", title).bright_white().bold());
        println!("{}", "│".bright_black());
    }

    fn print_section_end() {
        println!("{}", "└─".bright_black());
    }

    fn print_success(message: &str) {
        println!("  {} {}", "✓".bright_green().bold(), message.bright_white());
    }

    fn print_locked(message: &str) {
        println!("  {} {}", "✗".bright_red().bold(), message.bright_black());
    }

    fn print_info(message: &str) {
        println!("  {} {}", "ℹ".bright_blue(), message);
    }
}

// ============================================================================
// MAIN CLI LOGIC
// ============================================================================

pub struct SitecraftCLI;

impl SitecraftCLI {
    pub async fn run() -> Result<(), BoxError> {
        let cli = Cli::parse();

        if cli.help {
            TerminalUI::show_help();
            return Ok(());
        }

        match cli.command {
            None => TerminalUI::show_help(),
            Some(Commands::Build {
                input,
                output,
                year,
            }) => Self::cmd_build(&input, &output, year)?,
            Some(Commands::Logo {
                brand,
                slogan,
                industry,
                style,
                colors,
                output_dir,
            }) => {
                let request = LogoRequest {
                    brand,
                    slogan,
                    industry,
                    style,
                    colors,
                };
                Self::cmd_logo(&request, &output_dir)?;
            }
            Some(Commands::Plan { plan }) => Self::cmd_plan(&plan),
            Some(Commands::Version) => {
                TerminalUI::show_intro();
                println!("  sitecraft {}", VERSION.bright_cyan());
            }
        }

        Ok(())
    }

    fn cmd_build(input: &Path, output: &Path, year: Option<i32>) -> Result<(), BoxError> {
        TerminalUI::print_section("BUILD SITE");
        TerminalUI::print_info(&format!("Input: {}", input.display()));

        let year = year.unwrap_or_else(|| Utc::now().year());
        let site = build_site_file(input, output, year)?;

        TerminalUI::print_info(&format!("Plan: {}", site.plan.label()));
        TerminalUI::print_success(&format!("Site written: {}", output.display()));
        TerminalUI::print_section_end();
        Ok(())
    }

    fn cmd_logo(request: &LogoRequest, output_dir: &Path) -> Result<(), BoxError> {
        TerminalUI::print_section("LOGO VARIANTS");
        TerminalUI::print_info(&format!("Brand: {}", request.brand_or_default()));

        for path in write_logo_files(request, output_dir)? {
            TerminalUI::print_success(&format!("{}", path.display()));
        }

        TerminalUI::print_section_end();
        Ok(())
    }

    fn cmd_plan(raw: &str) {
        let plan = Plan::parse_or_basic(raw);
        let locked = locked_fields(plan);

        TerminalUI::print_section(&format!("{} PLAN", plan.label().to_uppercase()));
        TerminalUI::print_info(&format!(
            "Gallery: up to {} images",
            plan.features().gallery_limit
        ));
        for field in FormField::ALL {
            if locked.contains(&field) {
                TerminalUI::print_locked(field.id());
            } else {
                TerminalUI::print_success(field.id());
            }
        }
        TerminalUI::print_section_end();
    }
}

/// Reads a JSON site description and writes the assembled document.
pub fn build_site_file(input: &Path, output: &Path, year: i32) -> Result<SiteData, BoxError> {
    let raw = fs::read_to_string(input)?;
    let site: SiteData = serde_json::from_str(&raw)?;
    if site.business_name.trim().is_empty() {
        return Err("businessName is required".into());
    }
    write_file(output, &assemble(&site, year))?;
    Ok(site)
}

/// Writes one `<slug>.svg` per layout and returns the paths written.
pub fn write_logo_files(request: &LogoRequest, output_dir: &Path) -> Result<Vec<PathBuf>, BoxError> {
    fs::create_dir_all(output_dir)?;
    procedural_variants(request)
        .into_iter()
        .map(|variant| {
            let path = output_dir.join(format!("{}.svg", variant.layout.slug()));
            write_file(&path, &variant.svg)?;
            Ok(path)
        })
        .collect()
}

fn write_file(path: &Path, contents: &str) -> Result<(), BoxError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, contents)?;
    Ok(())
}
