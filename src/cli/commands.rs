use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "storyline")]
#[command(author, version, long_about = None)]
#[command(about = "Turn a web URL into a short three-part story")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate and store a story about a URL
    Create {
        /// Target URL, plain or percent-encoded
        url: String,

        /// Print the raw JSON response instead of formatted output
        #[arg(long)]
        json: bool,
    },

    /// Print the parts of a stored story
    Show {
        session: String,
    },

    /// List stored story sessions
    List,

    /// Check that the tool is configured and print the effective settings
    Ping,
}
