mod output;

use std::io::Read;
use std::path::Path;

use clap::{Parser, Subcommand};

use movehist::config;
use movehist::config::settings::{self, Settings};
use movehist::history::{self, Action, EventKey};
use movehist::lookup::LookupTables;
use movehist::rows;
use movehist::template::RenderEnv;
use movehist::template::details::Renderers;

#[derive(Parser)]
#[command(
    name = "movehist",
    about = "Resolve move audit-history records to display templates"
)]
struct Cli {
    /// Show template discovery and resolution details
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render history records as display rows
    Render {
        /// JSON file with history records, or `-` for stdin
        input: String,
        /// Print rows as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show which template resolves an event
    Which {
        /// INSERT, UPDATE or DELETE
        action: String,
        /// Audited table name
        table: String,
        /// Application event name (omit for records without one)
        event: Option<String>,
    },
    /// Validate a template TOML file
    Check {
        /// Path to the template file
        template_path: String,
    },
    /// List discovered templates in registration order
    Ls,
    /// Print a lookup table, or one entry of it
    Lookup {
        /// Table name, e.g. `orders_type`
        table: String,
        /// Code to translate
        code: Option<String>,
    },
    /// Print rank options for a branch
    Ranks {
        /// Branch code, e.g. `ARMY`
        branch: String,
    },
}

fn load_settings() -> Settings {
    let root = std::env::current_dir()
        .ok()
        .map(|cwd| settings::project_root_for(&cwd));
    Settings::load(root.as_deref())
}

fn read_input(input: &str) -> anyhow::Result<String> {
    if input == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| anyhow::anyhow!("failed to read stdin: {e}"))?;
        return Ok(buf);
    }
    std::fs::read_to_string(input).map_err(|e| anyhow::anyhow!("failed to read {input}: {e}"))
}

fn cmd_render(input: &str, json: bool, verbose: bool) -> anyhow::Result<i32> {
    let records = history::parse_records(&read_input(input)?)?;
    let settings = load_settings();
    let registry = config::load_registry(&settings, verbose);
    let lookups = LookupTables::builtin()?;
    let renderers = Renderers::builtin();
    let env = RenderEnv {
        lookups: &lookups,
        renderers: &renderers,
    };

    let rows = rows::build_rows(&registry, &records, env, &settings.fallback_label, verbose);
    if json {
        output::print_json(&rows);
    } else {
        for row in &rows {
            println!("{}", row.to_line());
        }
    }
    Ok(0)
}

fn cmd_which(
    action: &str,
    table: &str,
    event: Option<&str>,
    verbose: bool,
) -> anyhow::Result<i32> {
    let action: Action = action.parse()?;
    let registry = config::load_registry(&load_settings(), verbose);
    let key = EventKey {
        action: &action,
        event_name: event,
        table_name: table,
    };
    let template = registry.resolve_key(&key)?;
    println!(
        "{key}  \u{2192}  \"{}\"  ({} {} {}, specificity {})",
        template.event_name_display,
        template.action,
        template.event_name,
        template.table_name,
        template.specificity()
    );
    println!("source: {}", template.origin);
    Ok(0)
}

fn cmd_check(template_path: &Path) -> i32 {
    match config::try_load_template_file(template_path) {
        Ok(Some(templates)) => {
            let renderers = Renderers::builtin();
            let mut problems = 0;
            for t in &templates {
                for problem in t.problems(&renderers) {
                    eprintln!("[movehist] {}: {problem}", t.origin);
                    problems += 1;
                }
            }
            if problems > 0 {
                return 1;
            }
            eprintln!(
                "[movehist] {} is valid ({} template(s))",
                template_path.display(),
                templates.len()
            );
            0
        }
        Ok(None) => {
            eprintln!("[movehist] file not found: {}", template_path.display());
            1
        }
        Err(e) => {
            eprintln!("[movehist] error: {e:#}");
            1
        }
    }
}

fn cmd_ls(verbose: bool) -> i32 {
    let registry = config::load_registry(&load_settings(), verbose);
    for t in registry.templates() {
        println!(
            "{} {} {}  \u{2192}  {}  [{}]",
            t.action,
            t.event_name,
            t.table_name,
            t.event_name_display,
            t.specificity()
        );
        if verbose {
            eprintln!("[movehist]   source: {}", t.origin);
        }
    }
    0
}

fn cmd_lookup(table: &str, code: Option<&str>) -> anyhow::Result<i32> {
    let lookups = LookupTables::builtin()?;
    let Some(entries) = lookups.table(table) else {
        let known: Vec<&str> = lookups.table_names().collect();
        anyhow::bail!("unknown lookup table {table} (known: {})", known.join(", "));
    };
    match code {
        Some(code) => {
            let Some(label) = entries.get(code) else {
                anyhow::bail!("{table} has no entry for {code}");
            };
            println!("{label}");
        }
        None => {
            for (code, label) in entries {
                println!("{code}  {label}");
            }
        }
    }
    Ok(0)
}

fn cmd_ranks(branch: &str) -> anyhow::Result<i32> {
    let lookups = LookupTables::builtin()?;
    let options = lookups.rank_options(branch);
    if options.is_empty() {
        anyhow::bail!("no ranks for branch {branch}");
    }
    for option in options {
        println!("{}  {}", option.value, option.name);
    }
    Ok(0)
}

fn or_report(result: anyhow::Result<i32>) -> i32 {
    result.unwrap_or_else(|e| {
        eprintln!("[movehist] error: {e:#}");
        1
    })
}

fn main() {
    let cli = Cli::parse();
    let exit_code = match &cli.command {
        Commands::Render { input, json } => or_report(cmd_render(input, *json, cli.verbose)),
        Commands::Which {
            action,
            table,
            event,
        } => or_report(cmd_which(action, table, event.as_deref(), cli.verbose)),
        Commands::Check { template_path } => cmd_check(Path::new(template_path)),
        Commands::Ls => cmd_ls(cli.verbose),
        Commands::Lookup { table, code } => or_report(cmd_lookup(table, code.as_deref())),
        Commands::Ranks { branch } => or_report(cmd_ranks(branch)),
    };
    std::process::exit(exit_code);
}
