use crate::inspect::{run_inspect, run_policies, InspectArgs, PoliciesArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use listing_moderation::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "moderation-worker",
    about = "Run the delayed listing moderation worker or inspect its decisions locally",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service and the periodic review sweep (default command)
    Serve(ServeArgs),
    /// Run the moderation pipeline against local image files and print the breakdown
    Inspect(InspectArgs),
    /// Print the resolved category policy table
    Policies(PoliciesArgs),
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
        Command::Inspect(args) => run_inspect(args),
        Command::Policies(args) => run_policies(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_invocation_defaults_to_serve() {
        let cli = Cli::try_parse_from(["moderation-worker"]).expect("parses");
        assert!(cli.command.is_none());
    }

    #[test]
    fn inspect_requires_at_least_one_image() {
        assert!(Cli::try_parse_from(["moderation-worker", "inspect"]).is_err());

        let cli = Cli::try_parse_from([
            "moderation-worker",
            "inspect",
            "front.jpg",
            "back.jpg",
            "--price",
            "450000",
            "--category",
            "Tecnología",
        ])
        .expect("parses");
        match cli.command {
            Some(Command::Inspect(args)) => {
                assert_eq!(args.images.len(), 2);
                assert_eq!(args.price.to_string(), "450000");
                assert_eq!(args.category.as_deref(), Some("Tecnología"));
            }
            other => panic!("expected inspect command, got {other:?}"),
        }
    }

    #[test]
    fn serve_accepts_binding_overrides() {
        let cli = Cli::try_parse_from(["moderation-worker", "serve", "--port", "8081"])
            .expect("parses");
        match cli.command {
            Some(Command::Serve(args)) => {
                assert_eq!(args.port, Some(8081));
                assert!(args.host.is_none());
            }
            other => panic!("expected serve command, got {other:?}"),
        }
    }
}
