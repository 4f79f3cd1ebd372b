mod commands;
mod config;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use commands::Studio;
use providers::{BodyType, OutfitPreferences, Pose};
use shared::gallery_types::{GalleryQuery, SortKey};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "outfit-studio", version, about = "AI clothing editor and wardrobe library")]
struct Cli {
    /// Directory holding the library database and image blobs
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Change the clothing in a photo
    Edit(EditArgs),
    /// List the clothing items visible in a photo
    Analyze { image: PathBuf },
    /// Render a garment photo on a generated model
    TryOn(TryOnArgs),
    /// Suggest outfits from the saved wardrobe
    Suggest(SuggestArgs),
    /// Add images to the gallery
    Import {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// List gallery images
    Gallery(GalleryArgs),
    /// Add or remove tags on an image
    Tag {
        id: String,
        #[arg(long = "add")]
        add: Vec<String>,
        #[arg(long = "remove")]
        remove: Vec<String>,
    },
    /// Set or clear an image description
    Describe { id: String, text: Option<String> },
    /// Toggle the favorite flag
    Favorite { id: String },
    /// Delete an image and its stored file
    Delete { id: String },
    #[command(subcommand)]
    Collection(CollectionCommand),
    #[command(subcommand)]
    Prompt(PromptCommand),
    /// Create a share link for an image
    Share {
        id: String,
        /// never, 1, 7 or 30 (days)
        #[arg(long, default_value = "7")]
        expires: String,
    },
    /// Look up the image behind a share token or URL
    OpenShare { token: String },
    /// Usage statistics
    Stats,
}

#[derive(Debug, Args)]
struct EditArgs {
    image: PathBuf,
    /// Description of the new clothing
    #[arg(long, conflicts_with = "saved")]
    prompt: Option<String>,
    /// Use a saved prompt by id
    #[arg(long)]
    saved: Option<String>,
    #[arg(long)]
    out: Option<PathBuf>,
    /// Also add the photo to the gallery
    #[arg(long)]
    save: bool,
}

#[derive(Debug, Args)]
struct TryOnArgs {
    image: PathBuf,
    /// athletic, slim, average, plus or petite
    #[arg(long, default_value = "average")]
    body: String,
    /// standing, casual, fashion, sitting or walking
    #[arg(long, default_value = "standing")]
    pose: String,
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct SuggestArgs {
    #[arg(long, default_value = "any")]
    season: String,
    #[arg(long, default_value = "casual")]
    occasion: String,
    #[arg(long, default_value = "versatile")]
    style: String,
}

#[derive(Debug, Args)]
struct GalleryArgs {
    #[arg(long, default_value = "")]
    search: String,
    /// Only images carrying every given tag
    #[arg(long = "tag")]
    tags: Vec<String>,
    #[arg(long)]
    favorites: bool,
    /// newest, oldest or favorites
    #[arg(long, default_value = "newest")]
    sort: SortKey,
}

#[derive(Debug, Subcommand)]
enum CollectionCommand {
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    List,
    Add {
        collection: String,
        #[arg(required = true)]
        images: Vec<String>,
    },
    Show { collection: String },
    Delete { collection: String },
}

#[derive(Debug, Subcommand)]
enum PromptCommand {
    Save {
        name: String,
        prompt: String,
        #[arg(long)]
        category: Option<String>,
    },
    List,
    /// Print a saved prompt and count the use
    Use { id: String },
    Delete { id: String },
}

async fn run(cli: Cli) -> Result<()> {
    let settings = config::load(cli.data_dir)?;
    let studio = Studio::open(settings)?;

    match cli.command {
        Command::Edit(args) => {
            studio
                .edit(
                    &args.image,
                    args.prompt,
                    args.saved.as_deref(),
                    args.out.as_deref(),
                    args.save,
                )
                .await
        }
        Command::Analyze { image } => studio.analyze(&image).await,
        Command::TryOn(args) => {
            studio
                .try_on(
                    &args.image,
                    BodyType::parse(&args.body),
                    Pose::parse(&args.pose),
                    args.out.as_deref(),
                )
                .await
        }
        Command::Suggest(args) => {
            studio
                .suggest(OutfitPreferences {
                    season: args.season,
                    occasion: args.occasion,
                    style: args.style,
                })
                .await
        }
        Command::Import { files } => studio.import(&files),
        Command::Gallery(args) => studio.gallery(&GalleryQuery {
            search: args.search,
            tags: args.tags,
            favorites_only: args.favorites,
            sort: args.sort,
        }),
        Command::Tag { id, add, remove } => studio.tag(&id, &add, &remove),
        Command::Describe { id, text } => studio.describe(&id, text.as_deref()),
        Command::Favorite { id } => studio.favorite(&id),
        Command::Delete { id } => studio.delete(&id),
        Command::Collection(cmd) => match cmd {
            CollectionCommand::Create { name, description } => {
                studio.collection_create(&name, description.as_deref())
            }
            CollectionCommand::List => studio.collection_list(),
            CollectionCommand::Add { collection, images } => {
                studio.collection_add(&collection, &images)
            }
            CollectionCommand::Show { collection } => studio.collection_show(&collection),
            CollectionCommand::Delete { collection } => studio.collection_delete(&collection),
        },
        Command::Prompt(cmd) => match cmd {
            PromptCommand::Save {
                name,
                prompt,
                category,
            } => studio.prompt_save(&name, &prompt, category.as_deref()),
            PromptCommand::List => studio.prompt_list(),
            PromptCommand::Use { id } => studio.prompt_use(&id),
            PromptCommand::Delete { id } => studio.prompt_delete(&id),
        },
        Command::Share { id, expires } => studio.share(&id, &expires),
        Command::OpenShare { token } => studio.open_share(&token),
        Command::Stats => studio.stats(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("outfit-studio error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
