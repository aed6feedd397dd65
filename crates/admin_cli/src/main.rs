use std::{error::Error, io::Write};

use clap::{Args, Parser, Subcommand};
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    style::Print,
    terminal,
    terminal::ClearType,
};
use engine::{AccountKind, Engine, NewAccountCmd};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection, EntityTrait, Set};
use uuid::Uuid;

mod users {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
    #[sea_orm(table_name = "users")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub username: String,
        pub password: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

#[derive(Parser, Debug)]
#[command(name = "hearth_admin")]
#[command(about = "Admin utilities for Hearth (bootstrap users, accounts, household links)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./hearth.db?mode=rwc"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    User(User),
    Account(Account),
    Household(Household),
    /// Compare an account's stored balance with its history.
    Audit(AuditArgs),
}

#[derive(Args, Debug)]
struct User {
    #[command(subcommand)]
    command: UserCommand,
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    Create(UserCreateArgs),
}

#[derive(Args, Debug)]
struct UserCreateArgs {
    #[arg(long)]
    username: String,
}

#[derive(Args, Debug)]
struct Account {
    #[command(subcommand)]
    command: AccountCommand,
}

#[derive(Subcommand, Debug)]
enum AccountCommand {
    Create(AccountCreateArgs),
}

#[derive(Args, Debug)]
struct AccountCreateArgs {
    #[arg(long)]
    owner: String,
    #[arg(long)]
    name: String,
    #[arg(long, default_value = "expense")]
    kind: String,
    /// Opening balance in minor units.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    opening_balance: i64,
}

#[derive(Args, Debug)]
struct Household {
    #[command(subcommand)]
    command: HouseholdCommand,
}

#[derive(Subcommand, Debug)]
enum HouseholdCommand {
    Link(HouseholdArgs),
    Unlink(HouseholdUnlinkArgs),
}

#[derive(Args, Debug)]
struct HouseholdArgs {
    #[arg(long)]
    owner: String,
    #[arg(long)]
    partner: String,
}

#[derive(Args, Debug)]
struct HouseholdUnlinkArgs {
    #[arg(long)]
    user: String,
}

#[derive(Args, Debug)]
struct AuditArgs {
    #[arg(long)]
    owner: String,
    #[arg(long)]
    account: Uuid,
}

fn parse_kind(raw: &str) -> Result<AccountKind, String> {
    match raw {
        "income" => Ok(AccountKind::Income),
        "expense" => Ok(AccountKind::Expense),
        other => Err(format!("unsupported account kind: {other}")),
    }
}

struct RawModeGuard;

impl RawModeGuard {
    fn enter() -> Result<Self, Box<dyn Error + Send + Sync>> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

fn prompt_password(prompt: &str) -> Result<String, Box<dyn Error + Send + Sync>> {
    let _raw = RawModeGuard::enter()?;

    let mut out = std::io::stderr();
    execute!(
        out,
        cursor::MoveToColumn(0),
        terminal::Clear(ClearType::CurrentLine),
        Print(prompt)
    )?;
    out.flush()?;

    let mut buf = String::new();
    loop {
        let Event::Key(KeyEvent {
            code, modifiers, ..
        }) = event::read()?
        else {
            continue;
        };

        match code {
            KeyCode::Enter => {
                execute!(out, Print("\r\n"))?;
                out.flush()?;
                break;
            }
            KeyCode::Backspace => {
                if buf.pop().is_some() {
                    execute!(out, cursor::MoveLeft(1), Print(" "), cursor::MoveLeft(1))?;
                    out.flush()?;
                }
            }
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                execute!(out, Print("\r\n"))?;
                out.flush()?;
                return Err("interrupted".into());
            }
            KeyCode::Char(ch) if !modifiers.contains(KeyModifiers::CONTROL) => {
                buf.push(ch);
                execute!(out, Print("*"))?;
                out.flush()?;
            }
            _ => {}
        }
    }

    Ok(buf)
}

fn prompt_password_twice() -> Result<String, Box<dyn Error + Send + Sync>> {
    let mut out = std::io::stderr();
    for _ in 0..3 {
        let p1 = prompt_password("Password: ")?;
        if p1.is_empty() {
            execute!(
                out,
                cursor::MoveToColumn(0),
                terminal::Clear(ClearType::CurrentLine),
                Print("Password must not be empty.\r\n")
            )?;
            continue;
        }

        let p2 = prompt_password("Confirm password: ")?;
        if p1 == p2 {
            return Ok(p1);
        }

        execute!(
            out,
            cursor::MoveToColumn(0),
            terminal::Clear(ClearType::CurrentLine),
            Print("Passwords do not match. Try again.\r\n")
        )?;
    }

    Err("too many attempts".into())
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter("hearth_admin=warn,engine=warn")
        .with_writer(std::io::stderr)
        .init();

    let db = connect_db(&cli.database_url).await?;

    match cli.command {
        Command::User(User {
            command: UserCommand::Create(args),
        }) => {
            let password = prompt_password_twice()?;

            if users::Entity::find_by_id(args.username.clone())
                .one(&db)
                .await?
                .is_some()
            {
                eprintln!("user already exists: {}", args.username);
                std::process::exit(1);
            }

            let user = users::ActiveModel {
                username: Set(args.username.clone()),
                password: Set(password),
            };
            users::Entity::insert(user).exec(&db).await?;

            println!("created user: {}", args.username);
        }
        Command::Account(Account {
            command: AccountCommand::Create(args),
        }) => {
            let kind = match parse_kind(&args.kind) {
                Ok(v) => v,
                Err(err) => {
                    eprintln!("{err}");
                    std::process::exit(2);
                }
            };

            let engine = Engine::builder().database(db.clone()).build().await?;
            let account = engine
                .create_account(
                    NewAccountCmd::new(&args.owner, &args.name)
                        .kind(kind)
                        .opening_balance(args.opening_balance),
                )
                .await?;
            println!("created account: {} ({})", account.name, account.id);
        }
        Command::Household(Household { command }) => {
            let engine = Engine::builder().database(db.clone()).build().await?;
            match command {
                HouseholdCommand::Link(args) => {
                    let link = engine.link_household(&args.owner, &args.partner).await?;
                    println!(
                        "linked {} with {} ({})",
                        link.owner_user_id, link.partner_user_id, link.id
                    );
                }
                HouseholdCommand::Unlink(args) => {
                    engine.unlink_household(&args.user).await?;
                    println!("unlinked {}", args.user);
                }
            }
        }
        Command::Audit(args) => {
            let engine = Engine::builder().database(db.clone()).build().await?;
            let audit = engine.audit_account(args.account, &args.owner).await?;
            println!("stored balance:   {}", audit.stored_balance);
            println!("history net:      {}", audit.history_net);
            println!("unlogged expense: {}", audit.unlogged_expense_net);
            println!("expected balance: {}", audit.expected_balance);
            println!("drift:            {}", audit.drift);
            for entry in &audit.broken_entries {
                println!(
                    "broken entry #{}: {} + {} != {} ({})",
                    entry.id,
                    entry.previous_balance,
                    entry.change_amount,
                    entry.new_balance,
                    entry.change_type
                );
            }
            if !audit.is_consistent() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
