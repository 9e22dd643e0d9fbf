use std::sync::Arc;

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use itertools::Itertools;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;
use walkdir::{DirEntry, WalkDir};

use posing_library::filter::{Choice, FilterMessage};
use posing_library::gallery::{Gallery, MAX_BATCH_SIZE};
use posing_library::identity::SessionBootstrap;
use posing_library::photo::{ChildCount, Grandparents, Parents, PhotoRecord, TagSet};
use posing_library::store::DatabaseStore;
use posing_library::telemetry::{get_subscriber_json, get_subscriber_terminal, init_subscriber};
use posing_library::Config;

const APP_NAME: &str = "posing-library";

#[derive(Debug, Parser)]
#[command(name = APP_NAME, version, about = "A reference library of family portrait poses")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Upload images, every image gets the same tags
    Import {
        #[command(flatten)]
        tags: TagArgs,
        /// Image files, directories are searched for images
        #[arg(required = true)]
        files: Vec<Utf8PathBuf>,
    },
    /// Print the photos matching the filters
    List(FilterArgs),
    /// Toggle the favorite flag of a photo
    Favorite { id: Uuid },
    /// Delete a photo
    Delete { id: Uuid },
}

#[derive(Debug, Args)]
struct TagArgs {
    /// Total number of people in the photo
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
    head_count: u32,
    #[arg(long, default_value_t = Grandparents::None)]
    grandparents: Grandparents,
    #[arg(long, default_value_t = Parents::Both)]
    parents: Parents,
    /// Children of an age group, as `kid` or `kid=2`
    #[arg(long = "child")]
    children: Vec<ChildCount>,
    #[arg(long, default_value_t = 0)]
    pets: u32,
    #[arg(long, default_value = "")]
    memo: String,
}

impl From<TagArgs> for TagSet {
    fn from(args: TagArgs) -> Self {
        TagSet {
            head_count: args.head_count,
            grandparents: args.grandparents,
            parents: args.parents,
            children: args.children.into_iter().collect(),
            pet_count: args.pets,
            memo: args.memo,
        }
    }
}

#[derive(Debug, Args)]
struct FilterArgs {
    #[arg(long)]
    head_count: Option<u32>,
    #[arg(long)]
    grandparents: Option<Grandparents>,
    #[arg(long)]
    parents: Option<Parents>,
    /// Required children, as `kid` or `kid=2`
    #[arg(long = "child")]
    children: Vec<ChildCount>,
    /// Only photos with pets
    #[arg(long)]
    pets: bool,
    /// Only favorite photos
    #[arg(long)]
    favorites: bool,
}

impl FilterArgs {
    fn messages(self) -> Vec<FilterMessage> {
        let mut messages = vec![
            FilterMessage::SetHeadCount(Choice::from(self.head_count)),
            FilterMessage::SetGrandparents(Choice::from(self.grandparents)),
            FilterMessage::SetParents(Choice::from(self.parents)),
            FilterMessage::SetIncludePets(self.pets),
            FilterMessage::SetOnlyFavorites(self.favorites),
        ];
        for child in self.children.into_iter().unique_by(|c| c.id) {
            messages.push(FilterMessage::ToggleChild(child.id));
            let delta = i32::try_from(child.count).unwrap_or(i32::MAX) - 1;
            messages.push(FilterMessage::ChangeChildCount(child.id, delta));
        }
        messages
    }
}

fn is_image(entry: &DirEntry) -> bool {
    match entry.path().extension().and_then(|s| s.to_str()) {
        Some(ext) => matches!(
            ext.to_ascii_lowercase().as_str(),
            "jpg" | "jpeg" | "png" | "gif" | "webp" | "bmp" | "tif" | "tiff"
        ),
        None => false,
    }
}

/// Expand directories into the images they contain.
fn find_images(paths: Vec<Utf8PathBuf>) -> Result<Vec<Utf8PathBuf>> {
    let mut images = Vec::new();
    for path in paths {
        if !path.is_dir() {
            images.push(path);
            continue;
        }
        for entry in WalkDir::new(&path)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(is_image)
        {
            let image = Utf8PathBuf::from_path_buf(entry.into_path())
                .map_err(|p| anyhow::anyhow!("Invalid UTF-8 path: {}", p.display()))?;
            images.push(image);
        }
    }
    Ok(images)
}

fn describe(photo: &PhotoRecord) -> Result<String> {
    let children = photo
        .child_tags()
        .map(|tag| match tag.count() {
            Some(count) => format!("{}x{count}", tag.id()),
            None => tag.id().to_string(),
        })
        .join(", ");
    let mut line = format!(
        "{id}  {created}  {star}  {heads} people, grandparents: {grandparents}, parents: {parents}",
        id = photo.id,
        created = photo.created_at.format(&Rfc3339)?,
        star = if photo.is_favorite { "*" } else { " " },
        heads = photo.head_count,
        grandparents = photo.grandparents,
        parents = photo.parents,
    );
    if !children.is_empty() {
        line.push_str(&format!(", children: {children}"));
    }
    if photo.has_pets() {
        line.push_str(&format!(", pets: {}", photo.pet_count));
    }
    if let Some(memo) = photo.memo() {
        line.push_str(&format!("  \"{memo}\""));
    }
    Ok(line)
}

async fn import(gallery: &mut Gallery, tags: TagSet, files: Vec<Utf8PathBuf>) -> Result<()> {
    let files = find_images(files)?;
    if files.is_empty() {
        println!("No images found.");
        return Ok(());
    }

    let (mut created, mut failed) = (0, 0);
    for chunk in &files.into_iter().chunks(MAX_BATCH_SIZE) {
        let chunk: Vec<_> = chunk.collect();
        if let Err(e) = gallery.select_files(&chunk).await {
            eprintln!("Skipping {} images: {e}", chunk.len());
            failed += chunk.len();
            continue;
        }
        *gallery.upload_tags_mut() = tags.clone();
        let report = gallery.confirm_upload().await;
        for id in &report.created {
            println!("{id}");
        }
        for failure in &report.failed {
            eprintln!("Unable to save {}: {}", chunk[failure.index], failure.error);
        }
        created += report.created.len();
        failed += report.failed.len();
        gallery.cancel_upload();
    }
    println!("Uploaded {created} images, {failed} failed.");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    if config.log_json {
        let subscriber =
            get_subscriber_json(APP_NAME.into(), config.log_filter.clone(), std::io::stderr);
        init_subscriber(subscriber)?;
    } else {
        let subscriber = get_subscriber_terminal(config.log_filter.clone(), std::io::stderr);
        init_subscriber(subscriber)?;
    }

    tokio::fs::create_dir_all(&config.data_dir)
        .await
        .with_context(|| format!("Unable to create data directory {}", config.data_dir))?;
    let store = DatabaseStore::connect(&config.database_url).await?;
    let identity = SessionBootstrap::from_config(&config);
    let mut gallery =
        Gallery::sign_in(Arc::new(store), &identity, &config.app_id, config.normalizer).await?;

    match cli.command {
        Command::Import { tags, files } => import(&mut gallery, tags.into(), files).await?,
        Command::List(filters) => {
            gallery.refresh().await;
            for message in filters.messages() {
                gallery.update(message.into());
            }
            for photo in gallery.visible() {
                println!("{}", describe(photo)?);
            }
            println!(
                "{} of {} photos, {} active filters",
                gallery.visible().len(),
                gallery.photos().len(),
                gallery.active_filter_count()
            );
        }
        Command::Favorite { id } => {
            gallery.refresh().await;
            let favorite = gallery.toggle_favorite(id).await?;
            println!("{id} {}", if favorite { "is a favorite" } else { "is no longer a favorite" });
        }
        Command::Delete { id } => {
            gallery.delete(id).await?;
            println!("Deleted {id}");
        }
    }
    Ok(())
}
