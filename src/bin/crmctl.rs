//! `crmctl` - command-line front end for the travel CRM API.
//!
//! The session of the last `crmctl login` is kept in `CRM_SESSION_FILE`
//! (default `~/.travel_crm/session.json`) and sent with every command.

use clap::{Args, Parser, Subcommand};
use dotenvy::dotenv;
use serde::{Serialize, de::DeserializeOwned};
use std::{path::PathBuf, process::ExitCode};
use tracing_subscriber::EnvFilter;
use travel_crm::{
    client::{ApiClient, SessionStore, api::describe},
    core::{
        auth::RegisterInput,
        bank_account::BankAccountInput,
        order::{OrderInput, PaymentPart},
        user::UserUpdate,
    },
    entities::{OrderStatus, PaymentStatus, Role},
    errors::{Error, Result},
};

#[derive(Parser, Debug)]
#[command(name = "crmctl", version, about = "Travel CRM command-line client")]
struct Cli {
    /// Server base URL, overriding `CRM_API_URL`
    #[arg(long)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and store the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "CRM_PASSWORD")]
        password: String,
    },
    /// End the stored session
    Logout,
    /// Show the stored user
    Whoami,
    /// Show the dashboard of your role
    Dashboard,
    /// Create an account from an invitation token
    Register {
        #[arg(long)]
        token: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "CRM_PASSWORD")]
        password: String,
        #[arg(long)]
        full_name: String,
        #[arg(long)]
        phone: Option<String>,
    },
    /// Change your password
    Passwd {
        #[arg(long)]
        current: String,
        #[arg(long)]
        new: String,
    },
    #[command(subcommand)]
    Invitations(InvitationCommand),
    #[command(subcommand)]
    Users(UserCommand),
    #[command(subcommand)]
    Agents(AgentCommand),
    #[command(subcommand)]
    BankAccounts(BankAccountCommand),
    #[command(subcommand)]
    Orders(OrderCommand),
}

/// Paging and search shared by list commands.
#[derive(Args, Debug, Clone, Default)]
struct ListArgs {
    #[arg(long)]
    page: Option<u64>,
    #[arg(long)]
    limit: Option<u64>,
    #[arg(long)]
    search: Option<String>,
}

impl ListArgs {
    fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        push(&mut query, "page", self.page);
        push(&mut query, "limit", self.limit);
        push(&mut query, "search", self.search.clone());
        query
    }
}

fn push<T: ToString>(query: &mut Vec<(&'static str, String)>, key: &'static str, value: Option<T>) {
    if let Some(value) = value {
        query.push((key, value.to_string()));
    }
}

#[derive(Subcommand, Debug)]
enum InvitationCommand {
    /// List invitations you can see
    List {
        #[command(flatten)]
        list: ListArgs,
        #[arg(long, value_parser = parse_wire::<Role>)]
        role: Option<Role>,
        #[arg(long)]
        used: Option<bool>,
    },
    /// Invite someone as manager or agent
    Create {
        #[arg(long)]
        email: String,
        #[arg(long, value_parser = parse_wire::<Role>)]
        role: Role,
    },
    /// Show the email and role behind a token
    Show { token: String },
    /// Cancel an unused invitation
    Cancel { id: i64 },
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    List {
        #[command(flatten)]
        list: ListArgs,
        #[arg(long, value_parser = parse_wire::<Role>)]
        role: Option<Role>,
        #[arg(long)]
        active: Option<bool>,
    },
    /// Change name, phone or active flag
    Update {
        id: i64,
        #[arg(long)]
        full_name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        active: Option<bool>,
    },
    Delete { id: i64 },
}

#[derive(Subcommand, Debug)]
enum AgentCommand {
    List {
        #[command(flatten)]
        list: ListArgs,
        #[arg(long)]
        active: Option<bool>,
    },
    Activate { id: i64 },
    Deactivate { id: i64 },
}

#[derive(Subcommand, Debug)]
enum BankAccountCommand {
    List {
        #[command(flatten)]
        list: ListArgs,
    },
    /// Create an account from a JSON file
    Create { file: PathBuf },
    /// Replace an account from a JSON file
    Update { id: i64, file: PathBuf },
    Delete { id: i64 },
}

#[derive(Subcommand, Debug)]
enum OrderCommand {
    List {
        #[command(flatten)]
        list: ListArgs,
        #[arg(long, value_parser = parse_wire::<OrderStatus>)]
        status: Option<OrderStatus>,
        #[arg(long, value_parser = parse_wire::<PaymentStatus>)]
        deposit_status: Option<PaymentStatus>,
        #[arg(long, value_parser = parse_wire::<PaymentStatus>)]
        balance_status: Option<PaymentStatus>,
        /// Earliest check-in, YYYY-MM-DD
        #[arg(long)]
        from: Option<String>,
        /// Latest check-in, YYYY-MM-DD
        #[arg(long)]
        to: Option<String>,
        #[arg(long)]
        agent_id: Option<i64>,
    },
    Show { id: i64 },
    /// Book an order from a JSON draft
    Create { file: PathBuf },
    /// Replace an order from a JSON draft
    Update { id: i64, file: PathBuf },
    /// Show derived fields of a JSON draft without saving it
    Preview { file: PathBuf },
    /// Approve, reject or reopen an order
    Status {
        id: i64,
        #[arg(value_parser = parse_wire::<OrderStatus>)]
        status: OrderStatus,
    },
    /// Mark the deposit or balance as paid or unpaid
    Payment {
        id: i64,
        #[arg(value_parser = parse_wire::<PaymentPart>)]
        part: PaymentPart,
        #[arg(value_parser = parse_wire::<PaymentStatus>)]
        status: PaymentStatus,
    },
    Delete { id: i64 },
}

/// Parses a lowercase wire name (`agent`, `approved`, `paid`, ...).
fn parse_wire<T: DeserializeOwned>(value: &str) -> std::result::Result<T, String> {
    serde_json::from_value(serde_json::Value::String(value.to_lowercase()))
        .map_err(|_| format!("unknown value {value:?}"))
}

fn read_json<T: DeserializeOwned>(path: &PathBuf) -> Result<T> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn print<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let client = match cli.api_url {
        Some(url) => ApiClient::new(url, SessionStore::from_env())?,
        None => ApiClient::from_env()?,
    };

    match cli.command {
        Command::Login { email, password } => {
            let user = client.login(&email, &password).await?;
            println!("Logged in as {} ({})", user.email, user.role);
        }
        Command::Logout => {
            client.logout().await?;
            println!("Logged out");
        }
        Command::Whoami => match client.current()? {
            Some(session) => print(&session.user)?,
            None => return Err(Error::Unauthorized),
        },
        Command::Dashboard => print(&client.dashboard().await?)?,
        Command::Register {
            token,
            email,
            password,
            full_name,
            phone,
        } => {
            let input = RegisterInput {
                token,
                email,
                password,
                full_name,
                phone,
            };
            let user = client.register(&input).await?;
            println!("Registered and logged in as {} ({})", user.email, user.role);
        }
        Command::Passwd { current, new } => {
            client.change_password(&current, &new).await?;
            println!("Password changed");
        }
        Command::Invitations(command) => invitations(&client, command).await?,
        Command::Users(command) => users(&client, command).await?,
        Command::Agents(command) => agents(&client, command).await?,
        Command::BankAccounts(command) => bank_accounts(&client, command).await?,
        Command::Orders(command) => orders(&client, command).await?,
    }
    Ok(())
}

async fn invitations(client: &ApiClient, command: InvitationCommand) -> Result<()> {
    match command {
        InvitationCommand::List { list, role, used } => {
            let mut query = list.query();
            push(&mut query, "role", role);
            push(&mut query, "used", used);
            print(&client.list_invitations(&query).await?)
        }
        InvitationCommand::Create { email, role } => {
            print(&client.create_invitation(&email, role).await?)
        }
        InvitationCommand::Show { token } => print(&client.invitation(&token).await?),
        InvitationCommand::Cancel { id } => {
            client.cancel_invitation(id).await?;
            println!("Invitation {id} cancelled");
            Ok(())
        }
    }
}

async fn users(client: &ApiClient, command: UserCommand) -> Result<()> {
    match command {
        UserCommand::List { list, role, active } => {
            let mut query = list.query();
            push(&mut query, "role", role);
            push(&mut query, "active", active);
            print(&client.list_users(&query).await?)
        }
        UserCommand::Update {
            id,
            full_name,
            phone,
            active,
        } => {
            let update = UserUpdate {
                full_name,
                phone,
                is_active: active,
            };
            print(&client.update_user(id, &update).await?)
        }
        UserCommand::Delete { id } => {
            client.delete_user(id).await?;
            println!("User {id} deleted");
            Ok(())
        }
    }
}

async fn agents(client: &ApiClient, command: AgentCommand) -> Result<()> {
    match command {
        AgentCommand::List { list, active } => {
            let mut query = list.query();
            push(&mut query, "active", active);
            print(&client.list_agents(&query).await?)
        }
        AgentCommand::Activate { id } => print(&client.set_agent_active(id, true).await?),
        AgentCommand::Deactivate { id } => print(&client.set_agent_active(id, false).await?),
    }
}

async fn bank_accounts(client: &ApiClient, command: BankAccountCommand) -> Result<()> {
    match command {
        BankAccountCommand::List { list } => {
            print(&client.list_bank_accounts(&list.query()).await?)
        }
        BankAccountCommand::Create { file } => {
            let input: BankAccountInput = read_json(&file)?;
            print(&client.create_bank_account(&input).await?)
        }
        BankAccountCommand::Update { id, file } => {
            let input: BankAccountInput = read_json(&file)?;
            print(&client.update_bank_account(id, &input).await?)
        }
        BankAccountCommand::Delete { id } => {
            client.delete_bank_account(id).await?;
            println!("Bank account {id} deleted");
            Ok(())
        }
    }
}

async fn orders(client: &ApiClient, command: OrderCommand) -> Result<()> {
    match command {
        OrderCommand::List {
            list,
            status,
            deposit_status,
            balance_status,
            from,
            to,
            agent_id,
        } => {
            let mut query = list.query();
            push(&mut query, "status", status);
            push(&mut query, "depositStatus", deposit_status);
            push(&mut query, "balanceStatus", balance_status);
            push(&mut query, "from", from);
            push(&mut query, "to", to);
            push(&mut query, "agentId", agent_id);
            print(&client.list_orders(&query).await?)
        }
        OrderCommand::Show { id } => print(&client.get_order(id).await?),
        OrderCommand::Create { file } => {
            let input: OrderInput = read_json(&file)?;
            print(&client.create_order(&input).await?)
        }
        OrderCommand::Update { id, file } => {
            let input: OrderInput = read_json(&file)?;
            print(&client.update_order(id, &input).await?)
        }
        OrderCommand::Preview { file } => {
            let input: OrderInput = read_json(&file)?;
            print(&client.preview_order(&input).await?)
        }
        OrderCommand::Status { id, status } => {
            print(&client.set_order_status(id, status).await?)
        }
        OrderCommand::Payment { id, part, status } => {
            print(&client.set_payment_status(id, part, status).await?)
        }
        OrderCommand::Delete { id } => {
            client.delete_order(id).await?;
            println!("Order {id} deleted");
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();
    dotenv().ok();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", describe(&e));
            ExitCode::FAILURE
        }
    }
}
