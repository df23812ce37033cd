use clap::Parser;
use client::input::AnswerSheet;
use client::network::Client;
use log::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Display name shown to the other players
    #[arg(short = 'n', long, default_value = "player")]
    name: String,

    /// Maximum number of answers accepted in one submission
    #[arg(short = 'm', long)]
    max_answers: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {}", args.server);

    let client = Client::connect(&args.server, &args.name).await?;
    let form = match args.max_answers {
        Some(max) => AnswerSheet::with_max_answers(max),
        None => AnswerSheet::new(),
    };
    client.run(form).await?;

    Ok(())
}
