use crate::commands::{describe_table, execute_query, show_tables, show_templates};
use crate::config::{Config, OutputFormat};
use anyhow::{Context, Result};
use blockq_engine::{find_template, QueryEngine};
use colored::Colorize;
use comfy_table::{Cell, Color, Table as ComfyTable};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use std::sync::Arc;

pub struct Repl {
    config: Config,
    engine: Arc<QueryEngine>,
    owner: String,
    editor: DefaultEditor,
    history_file: PathBuf,
}

enum Flow {
    Continue,
    Quit,
}

impl Repl {
    pub fn new(config: Config, engine: Arc<QueryEngine>, owner: String) -> Result<Self> {
        let history_file = Self::get_history_file()?;
        let mut editor = DefaultEditor::new()?;

        // Missing on first run
        let _ = editor.load_history(&history_file);

        Ok(Self {
            config,
            engine,
            owner,
            editor,
            history_file,
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        println!("{}", "Interactive blockq REPL".bright_green().bold());
        println!(
            "Type {} for commands, {} to exit",
            ".help".bright_cyan(),
            ".quit".bright_cyan()
        );
        println!();

        loop {
            let prompt = format!("{} ", "blockq>".bright_green().bold());
            match self.editor.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }

                    self.editor.add_history_entry(line)?;

                    match self.handle_input(line).await {
                        Ok(Flow::Quit) => break,
                        Ok(Flow::Continue) => {}
                        Err(e) => eprintln!("{} {}", "Error:".bright_red().bold(), e),
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("{}", "^C".bright_yellow());
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!("{}", "exit".bright_yellow());
                    break;
                }
                Err(err) => {
                    eprintln!("{} {:?}", "Error:".bright_red().bold(), err);
                    break;
                }
            }
        }

        self.editor.save_history(&self.history_file)?;

        println!("{}", "Goodbye!".bright_cyan());
        Ok(())
    }

    async fn handle_input(&mut self, input: &str) -> Result<Flow> {
        if input.starts_with('.') {
            self.handle_command(input).await
        } else {
            self.run_query(input).await?;
            Ok(Flow::Continue)
        }
    }

    async fn run_query(&self, sql: &str) -> Result<()> {
        execute_query(
            &self.engine,
            sql,
            &self.owner,
            self.config.output_format,
            self.config.max_rows,
            self.config.show_timing,
        )
        .await
    }

    async fn handle_command(&mut self, cmd: &str) -> Result<Flow> {
        let (command, rest) = match cmd.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (cmd, ""),
        };

        match command {
            ".help" | ".h" => self.show_help(),
            ".quit" | ".q" | ".exit" => return Ok(Flow::Quit),
            ".tables" => show_tables(),
            ".describe" | ".desc" => {
                if rest.is_empty() {
                    anyhow::bail!("Usage: .describe <table>");
                }
                describe_table(rest)?;
            }
            ".templates" => show_templates(),
            ".template" => {
                let template = find_template(rest)
                    .with_context(|| format!("No template named '{}'", rest))?;
                println!("{}", template.query.bright_black());
                self.run_query(template.query).await?;
            }
            ".history" => self.show_history(),
            ".save" => {
                let (name, query) = rest
                    .split_once(char::is_whitespace)
                    .context("Usage: .save <name> <query>")?;
                let saved = self.engine.save_query(&self.owner, name, query.trim());
                println!("{} Saved '{}'", "✓".bright_green(), saved.name.bright_cyan());
            }
            ".saved" => self.show_saved(),
            ".run" => {
                if rest.is_empty() {
                    anyhow::bail!("Usage: .run <name>");
                }
                let saved = self
                    .engine
                    .get_saved_query(&self.owner, rest)
                    .with_context(|| format!("No saved query named '{}'", rest))?;
                println!("{}", saved.query.bright_black());
                self.run_query(&saved.query).await?;
            }
            ".delete" => {
                if self.engine.delete_saved_query(&self.owner, rest) {
                    println!("{} Deleted '{}'", "✓".bright_green(), rest);
                } else {
                    println!("{}", format!("No saved query named '{}'", rest).bright_yellow());
                }
            }
            ".format" => {
                self.config.output_format = rest.parse()?;
                println!("Output format set to {}", self.config.output_format.to_string().bright_cyan());
            }
            ".timing" => {
                self.config.show_timing = !self.config.show_timing;
                println!(
                    "Timing is now {}",
                    if self.config.show_timing {
                        "ON".bright_green()
                    } else {
                        "OFF".bright_red()
                    }
                );
            }
            ".stats" => self.show_cache_stats(),
            ".clear" => print!("\x1B[2J\x1B[1;1H"),
            other => anyhow::bail!("Unknown command '{}'. Type .help for commands", other),
        }

        Ok(Flow::Continue)
    }

    fn show_help(&self) {
        let mut table = ComfyTable::new();
        table.set_header(vec![
            Cell::new("Command").fg(Color::Cyan),
            Cell::new("Description").fg(Color::Yellow),
        ]);

        let commands = vec![
            (".help, .h", "Show this help message"),
            (".quit, .q, .exit", "Exit the REPL"),
            (".tables", "List virtual tables"),
            (".describe <table>", "Show table schema"),
            (".templates", "List query templates"),
            (".template <name>", "Run a template"),
            (".history", "Show your query history"),
            (".save <name> <query>", "Save a query under a name"),
            (".saved", "List saved queries"),
            (".run <name>", "Run a saved query"),
            (".delete <name>", "Delete a saved query"),
            (".format <type>", "Set output format (table|json|csv)"),
            (".timing", "Toggle timing display"),
            (".stats", "Show cache statistics"),
            (".clear", "Clear the screen"),
        ];

        for (cmd, desc) in commands {
            table.add_row(vec![cmd, desc]);
        }

        println!("{}", table);
        println!();
        println!("{}", "Query syntax:".bright_yellow().bold());
        println!("  SELECT <cols|*> FROM <table> [WHERE <predicate>] [ORDER BY <col> [ASC|DESC]] [LIMIT <n>]");
        println!("  Operators: = != < <= > >=, combined with AND / OR and parentheses");
        println!();
    }

    fn show_history(&self) {
        let history = self.engine.get_history(&self.owner);
        if history.is_empty() {
            println!("{}", "No queries yet".bright_yellow());
            return;
        }

        let mut table = ComfyTable::new();
        table.set_header(vec![
            Cell::new("Executed").fg(Color::Cyan),
            Cell::new("Query").fg(Color::Yellow),
            Cell::new("Status").fg(Color::Green),
            Cell::new("Rows").fg(Color::Magenta),
            Cell::new("ms").fg(Color::Blue),
        ]);

        for entry in history {
            let status = match (entry.succeeded, entry.cache_hit, entry.error_kind) {
                (true, true, _) => Cell::new("cached").fg(Color::Blue),
                (true, false, _) => Cell::new("ok").fg(Color::Green),
                (false, _, Some(kind)) => Cell::new(kind).fg(Color::Red),
                (false, _, None) => Cell::new("failed").fg(Color::Red),
            };
            table.add_row(vec![
                Cell::new(entry.executed_at.format("%H:%M:%S")),
                Cell::new(&entry.query),
                status,
                Cell::new(entry.row_count),
                Cell::new(entry.duration_ms),
            ]);
        }

        println!("{}", table);
    }

    fn show_saved(&self) {
        let saved = self.engine.list_saved_queries(&self.owner);
        if saved.is_empty() {
            println!("{}", "No saved queries".bright_yellow());
            println!("Use {} to save one", ".save <name> <query>".bright_cyan());
            return;
        }

        let mut table = ComfyTable::new();
        table.set_header(vec![
            Cell::new("Name").fg(Color::Cyan),
            Cell::new("Query").fg(Color::Yellow),
            Cell::new("Created").fg(Color::Green),
        ]);

        for query in saved {
            table.add_row(vec![
                query.name,
                query.query,
                query.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ]);
        }

        println!("{}", table);
    }

    fn show_cache_stats(&self) {
        let stats = self.engine.cache_stats();
        let cache = self.engine.cache();

        println!();
        println!("{}", "Cache Statistics".bright_yellow().bold());
        println!();

        let mut table = ComfyTable::new();
        table.set_header(vec![
            Cell::new("Metric").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Green),
        ]);

        table.add_row(vec![
            "Enabled",
            if cache.is_enabled() { "Yes" } else { "No" },
        ]);
        table.add_row(vec!["Entries", &cache.len().to_string()]);
        table.add_row(vec!["Hits", &stats.hits.to_string()]);
        table.add_row(vec!["Misses", &stats.misses.to_string()]);
        table.add_row(vec!["Hit Rate", &format!("{:.1}%", stats.hit_rate * 100.0)]);
        table.add_row(vec!["Evictions", &stats.evictions.to_string()]);
        table.add_row(vec!["Expirations", &stats.expirations.to_string()]);

        println!("{}", table);
    }

    fn get_history_file() -> Result<PathBuf> {
        let home = home::home_dir().context("Could not find home directory")?;
        let history_dir = home.join(".blockq");
        std::fs::create_dir_all(&history_dir)?;
        Ok(history_dir.join("history.txt"))
    }
}
