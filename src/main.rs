use anyhow::{bail, Result};
use std::env;
use std::path::Path;
use tracing_subscriber::{fmt, EnvFilter};

use customer_api::{
    import_customers, import_interactions, open_database, register_user, Config, PermissionSet,
    SqliteStore,
};

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_target(false).init();

    let args: Vec<String> = env::args().collect();
    let config = Config::load()?;

    match args.get(1).map(String::as_str) {
        Some("init") => run_init(&config),
        Some("create-admin") => match (args.get(2), args.get(3)) {
            (Some(username), Some(password)) => run_create_admin(&config, username, password),
            _ => bail!("usage: customer-api create-admin <username> <password>"),
        },
        Some("import-customers") => match args.get(2) {
            Some(path) => run_import_customers(&config, Path::new(path)),
            None => bail!("usage: customer-api import-customers <csv>"),
        },
        Some("import-interactions") => match args.get(2) {
            Some(path) => run_import_interactions(&config, Path::new(path)),
            None => bail!("usage: customer-api import-interactions <csv>"),
        },
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn print_usage() {
    println!("customer-api {}", customer_api::VERSION);
    println!();
    println!("Commands:");
    println!("  init                                   create the database schema");
    println!("  create-admin <username> <password>     add a user with every permission");
    println!("  import-customers <csv>                 customer_name,occupation_name,type_name");
    println!("  import-interactions <csv>              customer_id,channel[,occurred_at]");
    println!();
    println!("Database: DATABASE_PATH (default customers.db)");
}

fn run_init(config: &Config) -> Result<()> {
    open_database(&config.database_path)?;
    println!("✓ Database initialized at {}", config.database_path);
    Ok(())
}

fn run_create_admin(config: &Config, username: &str, password: &str) -> Result<()> {
    let conn = open_database(&config.database_path)?;
    let id = register_user(
        &SqliteStore::new(&conn),
        username,
        password,
        &PermissionSet::superuser(),
    )?;

    println!("✓ Admin user {} created (id {})", username, id);
    Ok(())
}

fn run_import_customers(config: &Config, csv_path: &Path) -> Result<()> {
    println!("📂 Importing customers from {}", csv_path.display());

    let mut conn = open_database(&config.database_path)?;
    let report = import_customers(&mut conn, csv_path)?;

    println!("✓ Inserted: {} customers", report.inserted);
    println!("✓ Skipped invalid rows: {}", report.rejected);
    Ok(())
}

fn run_import_interactions(config: &Config, csv_path: &Path) -> Result<()> {
    println!("📂 Importing interactions from {}", csv_path.display());

    let mut conn = open_database(&config.database_path)?;
    let report = import_interactions(&mut conn, csv_path)?;

    println!("✓ Inserted: {} interactions", report.inserted);
    Ok(())
}
