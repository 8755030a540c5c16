//! Warden CLI - sign in to a GoTrue identity provider from the terminal.

mod commands;
mod output;

use clap::{Args, Parser, Subcommand};
use commands::{Identity, OtpKind, UpdateRequest};
use gotrue_types::Provider;
use tracing::debug;
use url::Url;
use warden_config::{init_logging, normalize_level, Config, Paths};

/// Warden CLI - Manage a GoTrue session from the terminal.
#[derive(Parser)]
#[command(name = "warden")]
#[command(about = "Warden CLI for signing in to GoTrue and Supabase projects")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
#[group(multiple = false)]
struct IdentityArgs {
    /// Email address
    #[arg(long)]
    email: Option<String>,
    /// Phone number
    #[arg(long)]
    phone: Option<String>,
}

impl From<IdentityArgs> for Identity {
    fn from(args: IdentityArgs) -> Self {
        Identity {
            email: args.email,
            phone: args.phone,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account with a password
    SignUp {
        #[command(flatten)]
        identity: IdentityArgs,
        /// Where the confirmation email links to
        #[arg(long)]
        redirect_to: Option<Url>,
    },

    /// Sign in with a password
    SignIn {
        #[command(flatten)]
        identity: IdentityArgs,
    },

    /// Sign out and clear the stored session
    SignOut,

    /// Refresh the stored session now
    Refresh,

    /// Show authentication status
    Status,

    /// Print the URL that starts a third-party sign-in
    Authorize {
        /// OAuth provider (github, google, ...)
        #[arg(short, long)]
        provider: Provider,
        /// Where the provider sends you back to
        #[arg(long)]
        redirect_to: Option<Url>,
        /// Extra OAuth scopes, comma separated
        #[arg(long, value_delimiter = ',')]
        scopes: Vec<String>,
    },

    /// Sign in with the URL a provider or email link redirected to
    Redirect {
        /// The full redirect URL, including its fragment
        url: String,
    },

    /// Email a passwordless sign-in link
    MagicLink {
        /// Email address
        #[arg(long)]
        email: String,
        /// Where the link sends you back to
        #[arg(long)]
        redirect_to: Option<Url>,
    },

    /// Text a one-time sign-in code
    SendOtp {
        /// Phone number
        #[arg(long)]
        phone: String,
    },

    /// Sign in with a one-time code
    Verify {
        #[command(flatten)]
        identity: IdentityArgs,
        /// The code that was sent
        #[arg(long)]
        token: String,
        /// What the code was issued for
        #[arg(long, value_enum, default_value = "magiclink")]
        kind: OtpKind,
    },

    /// Update the signed-in user
    Update {
        /// New email address
        #[arg(long)]
        email: Option<String>,
        /// New phone number
        #[arg(long, conflicts_with = "clear_phone")]
        phone: Option<String>,
        /// Remove the phone number
        #[arg(long)]
        clear_phone: bool,
        /// Prompt for a new password
        #[arg(long)]
        password: bool,
    },

    /// Print auth events until Ctrl-C, refreshing the session as needed
    Watch,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let format = cli.format;

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e), &format);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let paths = Paths::new()?;
    let mut config = Config::load(&paths)?;
    if let Some(level) = &cli.log_level {
        config.log_level = normalize_level(level)?;
    }

    // Logging is best effort.
    if let Err(e) = init_logging(&paths, &config.log_level, false) {
        eprintln!("Warning: file logging disabled: {}", e);
    }
    debug!(gotrue_url = %config.gotrue_url, "Starting warden CLI");

    let engine = commands::open_engine(&paths, &config)?;
    let format = &cli.format;

    let result = match cli.command {
        Commands::SignUp {
            identity,
            redirect_to,
        } => commands::sign_up(&engine, identity.into(), redirect_to, format).await,
        Commands::SignIn { identity } => commands::sign_in(&engine, identity.into(), format).await,
        Commands::SignOut => commands::sign_out(&engine, format).await,
        Commands::Refresh => commands::refresh(&engine, format).await,
        Commands::Status => commands::status(&engine, format).await,
        Commands::Authorize {
            provider,
            redirect_to,
            scopes,
        } => commands::authorize(&engine, provider, redirect_to, scopes, format).await,
        Commands::Redirect { url } => commands::redirect(&engine, &url, format).await,
        Commands::MagicLink { email, redirect_to } => {
            commands::magic_link(&engine, &email, redirect_to, format).await
        }
        Commands::SendOtp { phone } => commands::send_otp(&engine, &phone, format).await,
        Commands::Verify {
            identity,
            token,
            kind,
        } => commands::verify(&engine, identity.into(), token, kind, format).await,
        Commands::Update {
            email,
            phone,
            clear_phone,
            password,
        } => {
            let request = UpdateRequest {
                email,
                phone,
                clear_phone,
                password,
            };
            commands::update(&engine, request, format).await
        }
        Commands::Watch => commands::watch(&engine, format).await,
    };

    engine.shutdown();
    result
}
