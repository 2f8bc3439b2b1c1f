use crate::demo::{run_demo, run_score, DemoArgs, ScoreArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use mindcheck::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "MindCheck",
    about = "Run the self-assessment questionnaire service or score answers from the command line",
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
    /// Score a JSON answer file with the local scorer and print the breakdown
    Score(ScoreArgs),
    /// Walk a scripted session through answering, saving, resuming, and submitting
    Demo(DemoArgs),
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
        Command::Score(args) => run_score(args),
        Command::Demo(args) => run_demo(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mindcheck::config::CatalogChoice;

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["mindcheck"]).expect("parse");
        assert!(cli.command.is_none());
    }

    #[test]
    fn score_accepts_catalog_override() {
        let cli = Cli::try_parse_from([
            "mindcheck",
            "score",
            "--answers",
            "answers.json",
            "--catalog",
            "student",
        ])
        .expect("parse");

        let Some(Command::Score(args)) = cli.command else {
            panic!("expected score command");
        };
        assert_eq!(args.catalog, CatalogChoice::Student);
        assert_eq!(args.answers.to_str(), Some("answers.json"));
    }

    #[test]
    fn unknown_catalog_is_rejected() {
        let err = Cli::try_parse_from([
            "mindcheck",
            "score",
            "--answers",
            "answers.json",
            "--catalog",
            "gad7",
        ])
        .expect_err("unknown catalog");
        assert!(err.to_string().contains("gad7"));
    }
}
