use crate::commands::{run_customer_delete, run_intake_import, CustomerDeleteArgs, IntakeImportArgs};
use crate::demo::{run_demo, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use protest_desk::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Protest Desk",
    about = "Run the property tax protest desk service and its admin tooling",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Customer intake tooling
    Intake {
        #[command(subcommand)]
        command: IntakeCommand,
    },
    /// Customer record administration
    Customer {
        #[command(subcommand)]
        command: CustomerCommand,
    },
    /// Walk through intake, protest review and deletion against an in-memory store
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum IntakeCommand {
    /// Run every row of a CSV export through the intake workflow
    Import(IntakeImportArgs),
}

#[derive(Subcommand, Debug)]
enum CustomerCommand {
    /// Delete a customer and every record that references them
    Delete(CustomerDeleteArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Intake {
            command: IntakeCommand::Import(args),
        } => run_intake_import(args),
        Command::Customer {
            command: CustomerCommand::Delete(args),
        } => run_customer_delete(args),
        Command::Demo(args) => run_demo(args),
    }
}
