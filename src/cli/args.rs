use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "huddle")]
#[command(about = "AI meeting session coordinator", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Join, leave, and inspect meeting sessions
    Session(SessionCliArgs),
    /// Print version information
    Version,
}

#[derive(ClapArgs, Debug)]
pub struct SessionCliArgs {
    #[command(subcommand)]
    pub command: SessionCommand,
}

#[derive(Subcommand, Debug)]
pub enum SessionCommand {
    /// Join a meeting (creates the session on first contact)
    Join {
        /// Meeting identifier
        id: String,
        /// Display name for the meeting
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Leave a meeting
    Leave {
        /// Meeting identifier
        id: String,
    },
    /// Show the status of one session
    Status {
        /// Meeting identifier
        id: String,
    },
    /// List live sessions
    List,
}
