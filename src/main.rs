use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde_json::{Value, json};

use guesthouse_client::api::{self, NewBooking, RoomFilter};
use guesthouse_client::{
    ApiClient, ApiError, ClientConfig, ConfigError, FileStore, Navigation, RouteTable, StorageError,
};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("login required to open {0}; run `guesthouse login` first")]
    LoginRequired(String),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("session storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("{0}")]
    Api(#[from] ApiError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "guesthouse", about = "Guesthouse booking API client")]
struct Cli {
    /// Overrides `GUESTHOUSE_API_URL`.
    #[arg(long)]
    base_url: Option<String>,

    /// Overrides `GUESTHOUSE_SESSION_FILE`.
    #[arg(long)]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long, env = "GUESTHOUSE_USERNAME")]
        username: String,
        #[arg(long, env = "GUESTHOUSE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "GUESTHOUSE_PASSWORD", hide_env_values = true)]
        password: String,
        /// Defaults to `--password`.
        #[arg(long)]
        password_confirmation: Option<String>,
    },
    Logout,
    Status,
    Rooms(RoomsCommand),
    Bookings(BookingsCommand),
    /// Show where a navigation to `path` would land.
    Route { path: String },
}

#[derive(Args, Debug)]
struct RoomsCommand {
    #[command(subcommand)]
    command: RoomsSubcommand,
}

#[derive(Subcommand, Debug)]
enum RoomsSubcommand {
    List(RoomFilterArgs),
    Show { room_id: i64 },
}

#[derive(Args, Debug)]
struct RoomFilterArgs {
    #[arg(long)]
    min_price: Option<f64>,
    #[arg(long)]
    max_price: Option<f64>,
    #[arg(long)]
    room_type: Option<String>,
    #[arg(long)]
    min_occupancy: Option<u32>,
    /// Comma-separated amenity names.
    #[arg(long)]
    amenities: Option<String>,
    #[arg(long)]
    available: Option<bool>,
}

impl From<RoomFilterArgs> for RoomFilter {
    fn from(args: RoomFilterArgs) -> Self {
        Self {
            min_price: args.min_price,
            max_price: args.max_price,
            room_type: args.room_type,
            min_occupancy: args.min_occupancy,
            amenities: args.amenities,
            is_available: args.available,
        }
    }
}

#[derive(Args, Debug)]
struct BookingsCommand {
    #[command(subcommand)]
    command: BookingsSubcommand,
}

#[derive(Subcommand, Debug)]
enum BookingsSubcommand {
    List,
    Create {
        #[arg(long)]
        room: i64,
        /// `YYYY-MM-DD`.
        #[arg(long)]
        check_in: String,
        /// `YYYY-MM-DD`.
        #[arg(long)]
        check_out: String,
        #[arg(long, default_value_t = 1)]
        guests: u32,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env()?;
    if let Some(base_url) = cli.base_url.as_deref() {
        config = config.with_base_url(base_url);
    }
    if let Some(session_file) = cli.session_file {
        config.session_file = session_file;
    }

    let storage = Arc::new(FileStore::open(&config.session_file)?);
    let client = ApiClient::from_config(&config, storage)?;
    let routes = RouteTable::default();

    match cli.command {
        Command::Login { username, password } => {
            navigate(&routes, &client, "/login")?;
            client.session().login(&username, &password).await?;
            print_json(&status_json(&client))
        }
        Command::Register { username, email, password, password_confirmation } => {
            navigate(&routes, &client, "/register")?;
            let confirmation = password_confirmation.unwrap_or_else(|| password.clone());
            let created = client.session().register(&username, &email, &password, &confirmation).await?;
            print_json(&serde_json::to_value(created)?)
        }
        Command::Logout => {
            client.session().logout()?;
            print_json(&status_json(&client))
        }
        Command::Status => print_json(&status_json(&client)),
        Command::Rooms(rooms) => run_rooms(&routes, &client, rooms).await,
        Command::Bookings(bookings) => run_bookings(&routes, &client, bookings).await,
        Command::Route { path } => {
            let navigation = routes.before_each(&path, client.session());
            let (outcome, target) = match &navigation {
                Navigation::Proceed(target) => ("proceed", target),
                Navigation::Redirect(target) => ("redirect", target),
            };
            print_json(&json!({ "path": path, "outcome": outcome, "target": target }))
        }
    }
}

async fn run_rooms(routes: &RouteTable, client: &ApiClient, rooms: RoomsCommand) -> Result<(), CliError> {
    navigate(routes, client, "/rooms")?;
    match rooms.command {
        RoomsSubcommand::List(filter) => {
            let rooms = api::list_rooms(client, &filter.into()).await?;
            print_json(&serde_json::to_value(rooms)?)
        }
        RoomsSubcommand::Show { room_id } => {
            let room = api::get_room(client, room_id).await?;
            print_json(&serde_json::to_value(room)?)
        }
    }
}

async fn run_bookings(routes: &RouteTable, client: &ApiClient, bookings: BookingsCommand) -> Result<(), CliError> {
    navigate(routes, client, "/bookings")?;
    match bookings.command {
        BookingsSubcommand::List => {
            let bookings = api::list_bookings(client).await?;
            print_json(&serde_json::to_value(bookings)?)
        }
        BookingsSubcommand::Create { room, check_in, check_out, guests } => {
            let booking = NewBooking { room, check_in, check_out, guests_count: guests };
            let created = api::create_booking(client, &booking).await?;
            print_json(&serde_json::to_value(created)?)
        }
    }
}

/// Run the route guard for `path`; a redirect aborts the command.
fn navigate(routes: &RouteTable, client: &ApiClient, path: &str) -> Result<(), CliError> {
    match routes.before_each(path, client.session()) {
        Navigation::Proceed(_) => Ok(()),
        Navigation::Redirect(_) => Err(CliError::LoginRequired(path.to_owned())),
    }
}

fn status_json(client: &ApiClient) -> Value {
    let session = client.session().snapshot();
    json!({
        "authenticated": session.is_authenticated(),
        "user": session.user,
    })
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
