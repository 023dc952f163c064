use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use owo_colors::OwoColorize;
use pantry_core::logging::{self, LogFormat, LogGuard, LogSettings};
use pantry_core::{Config, FileLoggingConfig, Recipe, RecipeDraft, RecipeId, SearchFilters};
use pantry_store::{ErrorKind, RecipeService, RecipeStore, StoreStats};
use std::path::{Path, PathBuf};

/// Pantry - recipe storage with ingredient and instruction search
#[derive(Parser, Debug)]
#[command(name = "pantry")]
#[command(about = "Store recipes and search them by diet, servings, ingredients and instructions", long_about = None)]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to pantry.toml
    #[arg(short, long, value_name = "PATH", default_value = "pantry.toml")]
    config: PathBuf,

    /// Database file (overrides [store] path)
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Stderr log format (overrides [logging] format)
    #[arg(long, value_name = "FORMAT", value_parser = parse_log_format)]
    log_format: Option<LogFormat>,

    /// Also write JSON logs to the log directory
    #[arg(long)]
    log_file: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a recipe
    Add(RecipeArgs),
    /// Show one recipe
    Get { id: RecipeId },
    /// Replace every field of a recipe
    Update {
        id: RecipeId,

        #[command(flatten)]
        recipe: RecipeArgs,
    },
    /// Delete a recipe
    Delete { id: RecipeId },
    /// List all recipes
    List,
    /// Search recipes; all given filters must hold
    Search(SearchArgs),
    /// Show store statistics
    Stats,
    /// Write an example pantry.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Generate shell completions
    Completions { shell: Shell },
}

#[derive(Args, Debug)]
struct RecipeArgs {
    /// Read the recipe from a JSON file instead of flags
    #[arg(
        long,
        value_name = "FILE",
        conflicts_with_all = ["name", "vegetarian", "servings", "ingredients", "no_ingredients", "instructions"]
    )]
    from: Option<PathBuf>,

    #[arg(long, required_unless_present = "from")]
    name: Option<String>,

    #[arg(long, value_name = "BOOL", required_unless_present = "from")]
    vegetarian: Option<bool>,

    #[arg(long, required_unless_present = "from")]
    servings: Option<u32>,

    /// Repeat for each ingredient
    #[arg(long = "ingredient", value_name = "INGREDIENT", required_unless_present_any = ["from", "no_ingredients"])]
    ingredients: Vec<String>,

    /// The recipe has no ingredients
    #[arg(long, conflicts_with = "ingredients")]
    no_ingredients: bool,

    /// May be empty (`--instructions ""`) but must be given
    #[arg(long, value_name = "TEXT", required_unless_present = "from")]
    instructions: Option<String>,
}

impl RecipeArgs {
    fn into_draft(self) -> Result<RecipeDraft> {
        if let Some(path) = self.from {
            let json =
                std::fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
            return Ok(RecipeDraft::from_json(&json)?);
        }

        Ok(RecipeDraft {
            name: self.name.context("--name is required")?,
            is_vegetarian: self.vegetarian.context("--vegetarian is required")?,
            servings: self.servings.context("--servings is required")?,
            ingredients: self.ingredients,
            instructions: self.instructions.context("--instructions is required")?,
        })
    }
}

#[derive(Args, Debug, Default)]
struct SearchArgs {
    /// Read filters from a JSON file ({"isVegetarian", "servings", "includeIngredients", ...})
    #[arg(long, value_name = "FILE", conflicts_with_all = ["vegetarian", "servings", "include", "exclude", "text"])]
    from: Option<PathBuf>,

    #[arg(long, value_name = "BOOL")]
    vegetarian: Option<bool>,

    #[arg(long)]
    servings: Option<u32>,

    /// Ingredient that must be present (repeatable)
    #[arg(long, value_name = "INGREDIENT")]
    include: Vec<String>,

    /// Ingredient that must be absent (repeatable)
    #[arg(long, value_name = "INGREDIENT")]
    exclude: Vec<String>,

    /// Text the instructions must contain, ignoring case
    #[arg(long, value_name = "TEXT")]
    text: Option<String>,
}

impl SearchArgs {
    fn into_filters(self) -> Result<SearchFilters> {
        if let Some(path) = self.from {
            let json =
                std::fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
            return serde_json::from_str(&json).map_err(|e| pantry_core::Error::from(e).into());
        }

        Ok(SearchFilters {
            is_vegetarian: self.vegetarian,
            servings: self.servings,
            include_ingredients: (!self.include.is_empty()).then_some(self.include),
            exclude_ingredients: (!self.exclude.is_empty()).then_some(self.exclude),
            instruction_text: self.text,
        })
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(exit_code(&e));
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init { force } => return cmd_init(&cli.config, force),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "pantry", &mut std::io::stdout());
            return Ok(());
        }
        _ => {}
    }

    let config = Config::load_or_default(&cli.config).context("Failed to load config")?;
    let _guard = init_logging(&config, &cli)?;

    let db_path = config.store_path(cli.db.as_deref());
    if cli.verbose {
        eprintln!("{} Using database: {}", "Info:".blue().bold(), db_path.display());
    }

    let store = RecipeStore::open(&db_path)
        .await
        .with_context(|| format!("Failed to open store at {}", db_path.display()))?;

    if let Commands::Stats = cli.command {
        return cmd_stats(&store, &db_path, cli.json).await;
    }

    let service = RecipeService::new(store);
    let json = cli.json;

    match cli.command {
        Commands::Add(args) => {
            let recipe = service.create(args.into_draft()?).await?;
            print_created(&recipe, "Created", json)?;
        }
        Commands::Get { id } => print_recipe(&service.get(id).await?, json)?,
        Commands::Update { id, recipe } => {
            let recipe = service.update(id, recipe.into_draft()?).await?;
            print_created(&recipe, "Updated", json)?;
        }
        Commands::Delete { id } => cmd_delete(&service, id, json).await?,
        Commands::List => print_recipes(&service.list().await?, json)?,
        Commands::Search(args) => print_recipes(&service.search(&args.into_filters()?).await?, json)?,
        Commands::Stats | Commands::Init { .. } | Commands::Completions { .. } => {}
    }

    Ok(())
}

fn log_settings(config: &Config, cli: &Cli) -> LogSettings {
    let mut settings = LogSettings::from(config.logging.clone());
    if cli.verbose {
        settings = settings.with_level("pantry_core=debug,pantry_store=debug");
    }
    if let Some(format) = cli.log_format {
        settings = settings.with_format(format);
    }
    if cli.log_file {
        settings = settings.with_file_logging(FileLoggingConfig { enabled: true, ..config.logging.file.clone() });
    }
    settings
}

fn init_logging(config: &Config, cli: &Cli) -> Result<LogGuard> {
    logging::init_logging(Some(log_settings(config, cli))).context("Failed to initialise logging")
}

fn parse_log_format(value: &str) -> std::result::Result<LogFormat, String> {
    LogFormat::parse_str(value).ok_or_else(|| {
        let known: Vec<&str> = LogFormat::VALUES.iter().map(LogFormat::as_str).collect();
        format!("unknown log format '{}' (expected one of: {})", value, known.join(", "))
    })
}

/// Map the first store or core error in the chain to a process exit status
fn exit_code(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(store_err) = cause.downcast_ref::<pantry_store::Error>() {
            return match store_err.kind() {
                ErrorKind::Validation => 2,
                ErrorKind::NotFound => 3,
                ErrorKind::Conflict => 4,
                ErrorKind::Storage => 1,
            };
        }
        if let Some(core_err) = cause.downcast_ref::<pantry_core::Error>() {
            return match core_err {
                pantry_core::Error::Validation(_) | pantry_core::Error::Parse(_) => 2,
                _ => 1,
            };
        }
    }
    1
}

/// Write the example config, refusing to clobber an existing file
fn cmd_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }

    std::fs::write(path, Config::example()).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("{} Created config at {}", "Success:".green().bold(), path.display());
    Ok(())
}

async fn cmd_delete(service: &RecipeService<RecipeStore>, id: RecipeId, json: bool) -> Result<()> {
    let deleted = service.delete(id).await?;

    if json {
        println!("{}", serde_json::json!({ "id": id, "deleted": deleted }));
    } else if deleted {
        println!("{} Deleted recipe {}", "Success:".green().bold(), id.cyan());
    } else {
        println!("{} No recipe with id {}", "Warning:".yellow().bold(), id);
    }
    Ok(())
}

async fn cmd_stats(store: &RecipeStore, db_path: &Path, json: bool) -> Result<()> {
    let stats = store.stats().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("{}", "Pantry Status".green().bold().underline());
        println!();
        print!("{}", format_stats(&stats, db_path));
    }
    Ok(())
}

fn format_stats(stats: &StoreStats, db_path: &Path) -> String {
    let last_updated = stats
        .last_updated
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "never".to_string());

    format!(
        "  Database: {}\n  Recipes: {}\n  Vegetarian: {}\n  Last updated: {}\n",
        db_path.display(),
        stats.recipe_count,
        stats.vegetarian_count,
        last_updated
    )
}

fn print_created(recipe: &Recipe, verb: &str, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(recipe)?);
    } else {
        println!(
            "{} {} recipe {} ({})",
            "Success:".green().bold(),
            verb,
            recipe.id.cyan(),
            recipe.name
        );
    }
    Ok(())
}

fn print_recipe(recipe: &Recipe, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(recipe)?);
    } else {
        print!("{}", format_recipe(recipe));
    }
    Ok(())
}

fn print_recipes(recipes: &[Recipe], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(recipes)?);
        return Ok(());
    }

    if recipes.is_empty() {
        println!("{} No recipes found", "Info:".yellow().bold());
        return Ok(());
    }

    for recipe in recipes {
        println!("{}", format_summary(recipe));
    }
    println!();
    println!("{} recipe(s)", recipes.len().to_string().cyan());
    Ok(())
}

fn format_summary(recipe: &Recipe) -> String {
    let diet = if recipe.is_vegetarian { "veg" } else { "non-veg" };
    format!(
        "{:>5}  {}  [{}, serves {}]",
        recipe.id.to_string().cyan(),
        recipe.name.bold(),
        diet,
        recipe.servings
    )
}

fn format_recipe(recipe: &Recipe) -> String {
    let mut out = format!("{}\n", recipe.name.green().bold().underline());
    out.push_str(&format!("  Id: {}\n", recipe.id));
    out.push_str(&format!("  Vegetarian: {}\n", if recipe.is_vegetarian { "yes" } else { "no" }));
    out.push_str(&format!("  Servings: {}\n", recipe.servings));
    out.push_str("  Ingredients:\n");
    for ingredient in &recipe.ingredients {
        out.push_str(&format!("    - {}\n", ingredient));
    }
    if !recipe.instructions.is_empty() {
        out.push_str(&format!("  Instructions:\n    {}\n", recipe.instructions));
    }
    out
}
