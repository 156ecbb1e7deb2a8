use clap::{Parser, Subcommand};
use colored::Colorize;
use m365ctl::cmd::{self, Context};
use m365ctl::error::{self, hint_for};
use m365ctl::output::OutputFormat;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "m365ctl",
    about = "Manage Microsoft 365 from the command line",
    version,
    long_about = "Command-line client for Microsoft Graph and SharePoint Online\n\n\
                  Work with Teams chats, Planner tasks, Entra ID users, To Do tasks\n\
                  and SharePoint fields, lists, folders and search."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (defaults to the configured format, else json)
    #[arg(short, long, global = true, value_enum)]
    output: Option<OutputFormat>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug logging, including every request
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage stored access tokens and the SharePoint URL
    #[command(subcommand)]
    Session(SessionCommands),

    /// Microsoft Teams teams, chats and reports
    #[command(subcommand)]
    Teams(TeamsCommands),

    /// Microsoft Planner tasks
    #[command(subcommand)]
    Planner(PlannerCommands),

    /// Entra ID users and Microsoft 365 groups
    #[command(subcommand)]
    Aad(AadCommands),

    /// Microsoft To Do tasks
    #[command(subcommand)]
    Todo(TodoCommands),

    /// SharePoint Online
    #[command(subcommand)]
    Spo(SpoCommands),
}

#[derive(Subcommand, Debug)]
enum SessionCommands {
    /// Store access tokens and/or the SharePoint URL
    Set(cmd::session::SessionSetArgs),

    /// Show who is signed in and when the tokens expire
    Show,

    /// Remove stored access tokens
    Clear(cmd::session::SessionClearArgs),
}

#[derive(Subcommand, Debug)]
enum TeamsCommands {
    /// Get a team by ID or name
    #[command(name = "team-get")]
    TeamGet(cmd::teams::TeamGetArgs),

    /// List the messages of a chat
    #[command(name = "chat-message-list")]
    ChatMessageList(cmd::teams::ChatMessageListArgs),

    /// Send a message to a chat, creating the chat when needed
    #[command(name = "chat-message-send")]
    ChatMessageSend(cmd::teams::ChatMessageSendArgs),

    /// Daily unique Teams users by device type
    #[command(name = "report-deviceusageusercounts")]
    ReportDeviceUsageUserCounts(cmd::teams::ReportDeviceUsageUserCountsArgs),
}

#[derive(Subcommand, Debug)]
enum PlannerCommands {
    /// Add a task to a plan
    #[command(name = "task-add")]
    TaskAdd(cmd::planner::TaskAddArgs),
}

#[derive(Subcommand, Debug)]
enum AadCommands {
    /// Update user properties
    #[command(name = "user-set")]
    UserSet(cmd::aad::UserSetArgs),

    /// List the posts of a group conversation thread
    #[command(name = "o365group-conversation-post-list")]
    ConversationPostList(cmd::aad::ConversationPostListArgs),
}

#[derive(Subcommand, Debug)]
enum TodoCommands {
    /// Update a task
    #[command(name = "task-set")]
    TaskSet(cmd::todo::TaskSetArgs),
}

#[derive(Subcommand, Debug)]
enum SpoCommands {
    /// Add a site or list column from CAML
    #[command(name = "field-add")]
    FieldAdd(cmd::spo::FieldAddArgs),

    /// Remove a site or list column, or all columns of a group
    #[command(name = "field-remove")]
    FieldRemove(cmd::spo::FieldRemoveArgs),

    /// Run a search query
    Search(cmd::spo::SearchArgs),

    /// Get the retention label of a list
    #[command(name = "list-label-get")]
    ListLabelGet(cmd::spo::ListLabelGetArgs),

    /// Apply a site design to a site
    #[command(name = "sitedesign-apply")]
    SiteDesignApply(cmd::spo::SiteDesignApplyArgs),

    /// List the folders under a folder
    #[command(name = "folder-list")]
    FolderList(cmd::spo::FolderListArgs),

    /// Unregister an organization assets library
    #[command(name = "orgassetslibrary-remove")]
    OrgAssetsLibraryRemove(cmd::spo::OrgAssetsLibraryRemoveArgs),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(hint) = hint_for(&e) {
            eprintln!("{} {}", "Hint:".yellow(), hint);
        }
        std::process::exit(1);
    }
}

fn init_logging(cli: &Cli) {
    let filter = if cli.debug {
        EnvFilter::new("m365ctl=debug")
    } else if cli.verbose {
        EnvFilter::new("m365ctl=info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("m365ctl=warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run() -> error::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let ctx = Context::load(cli.output)?;

    match cli.command {
        Commands::Session(session_cmd) => match session_cmd {
            SessionCommands::Set(args) => cmd::session::set(args, &ctx).await?,
            SessionCommands::Show => cmd::session::show(&ctx).await?,
            SessionCommands::Clear(args) => cmd::session::clear(args, &ctx).await?,
        },
        Commands::Teams(teams_cmd) => match teams_cmd {
            TeamsCommands::TeamGet(args) => cmd::teams::team_get(args, &ctx).await?,
            TeamsCommands::ChatMessageList(args) => {
                cmd::teams::chat_message_list(args, &ctx).await?
            }
            TeamsCommands::ChatMessageSend(args) => {
                cmd::teams::chat_message_send(args, &ctx).await?
            }
            TeamsCommands::ReportDeviceUsageUserCounts(args) => {
                cmd::teams::report_device_usage_user_counts(args, &ctx).await?
            }
        },
        Commands::Planner(planner_cmd) => match planner_cmd {
            PlannerCommands::TaskAdd(args) => cmd::planner::task_add(args, &ctx).await?,
        },
        Commands::Aad(aad_cmd) => match aad_cmd {
            AadCommands::UserSet(args) => cmd::aad::user_set(args, &ctx).await?,
            AadCommands::ConversationPostList(args) => {
                cmd::aad::conversation_post_list(args, &ctx).await?
            }
        },
        Commands::Todo(todo_cmd) => match todo_cmd {
            TodoCommands::TaskSet(args) => cmd::todo::task_set(args, &ctx).await?,
        },
        Commands::Spo(spo_cmd) => match spo_cmd {
            SpoCommands::FieldAdd(args) => cmd::spo::field_add(args, &ctx).await?,
            SpoCommands::FieldRemove(args) => cmd::spo::field_remove(args, &ctx).await?,
            SpoCommands::Search(args) => cmd::spo::search(args, &ctx).await?,
            SpoCommands::ListLabelGet(args) => cmd::spo::list_label_get(args, &ctx).await?,
            SpoCommands::SiteDesignApply(args) => cmd::spo::site_design_apply(args, &ctx).await?,
            SpoCommands::FolderList(args) => cmd::spo::folder_list(args, &ctx).await?,
            SpoCommands::OrgAssetsLibraryRemove(args) => {
                cmd::spo::org_assets_library_remove(args, &ctx).await?
            }
        },
    }

    Ok(())
}
