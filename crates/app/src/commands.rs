//! Subcommand handlers.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use providers::edit::request_edit;
use providers::wire::decode_data_uri;
use providers::{
    analyze_clothing, suggest_outfits, virtual_try_on, BodyType, HttpGateway, OutfitPreferences,
    Pose,
};
use services::gallery::{add_tag, available_tags, derive_view, remove_tag};
use services::validation::{validate_batch, validate_prompt, validate_upload};
use services::Library;
use shared::edit::{EditRequest, SourceImage};
use shared::gallery_types::GalleryQuery;
use shared::records::{ImageRecord, ShareExpiry};
use shared::settings::AppSettings;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};

/// Settings plus the opened library, shared by every subcommand.
pub struct Studio {
    pub settings: AppSettings,
    pub library: Library,
}

/// Run `fut` until it finishes or the user presses Ctrl-C. Dropping the
/// future aborts the in-flight request.
async fn cancellable<T>(fut: impl Future<Output = T>) -> Result<T> {
    tokio::select! {
        value = fut => Ok(value),
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("request cancelled");
            bail!("Cancelled")
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string())
}

/// Read and validate an image from disk.
fn load_source(path: &Path) -> Result<(String, Vec<u8>, SourceImage)> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let name = file_name(path);
    let valid = validate_upload(&name, &bytes)?;
    let source = SourceImage::Bytes {
        mime: valid.mime.to_string(),
        data: bytes.clone(),
    };
    Ok((name, bytes, source))
}

fn extension_for(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "png",
    }
}

/// `<stem>-<suffix>.<ext>` next to the input.
pub fn derived_output_path(input: &Path, suffix: &str, mime: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    input.with_file_name(format!("{}-{}.{}", stem, suffix, extension_for(mime)))
}

/// Write a generated image to disk when it came back inline. Returns where it
/// can be found: the written file, or the remote URL as is.
pub fn store_generated(
    uri: &str,
    input: &Path,
    suffix: &str,
    out: Option<&Path>,
) -> Result<String> {
    match decode_data_uri(uri) {
        Some((mime, bytes)) => {
            let path = out
                .map(Path::to_path_buf)
                .unwrap_or_else(|| derived_output_path(input, suffix, &mime));
            fs::write(&path, &bytes)
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::debug!(path = %path.display(), size = bytes.len(), "generated image written");
            Ok(path.display().to_string())
        }
        None => Ok(uri.to_string()),
    }
}

fn print_record(record: &ImageRecord, now: chrono::DateTime<Utc>) {
    let star = if record.is_favorite { " *" } else { "" };
    let tags = if record.tags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", record.tags.join(", "))
    };
    println!(
        "{}  {:>8}  {}{}{}",
        record.id,
        record.relative_time(now),
        record.filename,
        tags,
        star
    );
    if let Some(desc) = &record.description {
        println!("    {}", desc);
    }
    if let Some(edited) = &record.edited_url {
        println!("    edited: {}", edited);
    }
}

impl Studio {
    pub fn open(settings: AppSettings) -> Result<Self> {
        let library = Library::open(
            &settings.storage.data_dir,
            &settings.storage.public_base_url,
        )
        .with_context(|| {
            format!(
                "failed to open library at {}",
                settings.storage.data_dir.display()
            )
        })?;
        Ok(Self { settings, library })
    }

    fn gateway(&self) -> Result<HttpGateway> {
        Ok(HttpGateway::from_settings(&self.settings.gateway)?)
    }

    // ── AI features ──────────────────────────────────────────────────

    pub async fn edit(
        &self,
        image: &Path,
        prompt: Option<String>,
        saved_prompt: Option<&str>,
        out: Option<&Path>,
        save: bool,
    ) -> Result<()> {
        let prompt = match (prompt, saved_prompt) {
            (Some(p), _) => p,
            (None, Some(id)) => self.library.use_prompt(id)?.prompt,
            (None, None) => String::new(),
        };
        validate_prompt(&prompt)?;
        let (name, bytes, source) = load_source(image)?;
        let gateway = self.gateway()?;

        let request = EditRequest::new(source, prompt.clone());
        let outcome =
            cancellable(request_edit(&gateway, &self.settings.gateway, &request)).await?;

        println!("{}", outcome.user_message());
        let Some(uri) = outcome.edited_image_uri() else {
            bail!("edit failed");
        };
        let location = store_generated(uri, image, "edited", out)?;
        println!("Edited image: {}", location);

        let image_id = if save {
            let record = self.library.save_image(&name, &bytes, Some(&location))?;
            println!("Saved to gallery as {}", record.id);
            Some(record.id)
        } else {
            None
        };
        self.library.record_edit(image_id.as_deref(), &prompt)?;
        Ok(())
    }

    pub async fn analyze(&self, image: &Path) -> Result<()> {
        let (_, _, source) = load_source(image)?;
        let gateway = self.gateway()?;
        let items =
            cancellable(analyze_clothing(&gateway, &self.settings.gateway, &source)).await??;
        if items.is_empty() {
            println!("No clothing detected");
        }
        for item in items {
            println!("{}", item);
        }
        Ok(())
    }

    pub async fn try_on(
        &self,
        image: &Path,
        body: BodyType,
        pose: Pose,
        out: Option<&Path>,
    ) -> Result<()> {
        let (_, _, source) = load_source(image)?;
        let gateway = self.gateway()?;
        let uri = cancellable(virtual_try_on(
            &gateway,
            &self.settings.gateway,
            &source,
            body,
            pose,
        ))
        .await??;
        println!("Try-on image: {}", store_generated(&uri, image, "try-on", out)?);
        Ok(())
    }

    pub async fn suggest(&self, prefs: OutfitPreferences) -> Result<()> {
        let images = self.library.list_images()?;
        let gateway = self.gateway()?;
        let suggestions = cancellable(suggest_outfits(
            &gateway,
            &self.settings.gateway,
            &images,
            &prefs,
        ))
        .await??;
        for (idx, s) in suggestions.iter().enumerate() {
            println!("{}. {}", idx + 1, s.name);
            if !s.pieces.is_empty() {
                println!("   Pieces: {}", s.pieces.join(", "));
            }
            let details = [
                ("Why", &s.description),
                ("Tips", &s.tips),
                ("Colors", &s.colors),
            ];
            for (label, text) in details {
                if !text.is_empty() {
                    println!("   {}: {}", label, text);
                }
            }
        }
        Ok(())
    }

    // ── Library ──────────────────────────────────────────────────────

    pub fn import(&self, paths: &[PathBuf]) -> Result<()> {
        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            let bytes =
                fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
            files.push((path.display().to_string(), bytes));
        }
        let report = validate_batch(files.iter().map(|(n, b)| (n.as_str(), b.as_slice())));
        if report.rejected_not_image > 0 {
            println!("Skipped {} non-image file(s)", report.rejected_not_image);
        }
        if report.rejected_too_large > 0 {
            println!("Skipped {} file(s) larger than 10MB", report.rejected_too_large);
        }

        // accepted entries are keyed by the full path they were read from
        for (path, bytes) in &files {
            if !report.accepted.iter().any(|v| v.filename == *path) {
                continue;
            }
            let record = self
                .library
                .save_image(&file_name(Path::new(path)), bytes, None)?;
            println!("{}  {}", record.id, record.filename);
        }
        println!("Imported {} image(s)", report.accepted.len());
        Ok(())
    }

    pub fn gallery(&self, query: &GalleryQuery) -> Result<()> {
        let records = self.library.list_images()?;
        let view = derive_view(&records, query);
        let now = Utc::now();
        for record in &view {
            print_record(record, now);
        }
        println!("{} of {} image(s)", view.len(), records.len());
        let tags = available_tags(&records);
        if !tags.is_empty() {
            println!("Tags: {}", tags.join(", "));
        }
        Ok(())
    }

    pub fn tag(&self, id: &str, add: &[String], remove: &[String]) -> Result<()> {
        let mut tags = self.library.get_image(id)?.tags;
        for tag in add {
            add_tag(&mut tags, tag)?;
        }
        for tag in remove {
            remove_tag(&mut tags, tag);
        }
        self.library.set_tags(id, &tags)?;
        println!("Tags: {}", tags.join(", "));
        Ok(())
    }

    pub fn describe(&self, id: &str, text: Option<&str>) -> Result<()> {
        self.library.set_description(id, text)?;
        println!("Description updated");
        Ok(())
    }

    pub fn favorite(&self, id: &str) -> Result<()> {
        let now_favorite = self.library.toggle_favorite(id)?;
        println!(
            "{}",
            if now_favorite {
                "Added to favorites"
            } else {
                "Removed from favorites"
            }
        );
        Ok(())
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        self.library.delete_image(id)?;
        println!("Image deleted");
        Ok(())
    }

    pub fn collection_create(&self, name: &str, description: Option<&str>) -> Result<()> {
        let collection = self.library.create_collection(name, description)?;
        println!("{}  {}", collection.id, collection.name);
        Ok(())
    }

    pub fn collection_list(&self) -> Result<()> {
        for c in self.library.list_collections()? {
            println!("{}  {} ({} image(s))", c.id, c.name, c.image_count);
            if let Some(desc) = &c.description {
                println!("    {}", desc);
            }
        }
        Ok(())
    }

    pub fn collection_add(&self, collection_id: &str, image_ids: &[String]) -> Result<()> {
        let added = self.library.add_to_collection(collection_id, image_ids)?;
        println!("Added {} image(s) to collection", added);
        Ok(())
    }

    pub fn collection_show(&self, collection_id: &str) -> Result<()> {
        let now = Utc::now();
        for record in self.library.collection_images(collection_id)? {
            print_record(&record, now);
        }
        Ok(())
    }

    pub fn collection_delete(&self, collection_id: &str) -> Result<()> {
        self.library.delete_collection(collection_id)?;
        println!("Collection deleted");
        Ok(())
    }

    pub fn prompt_save(&self, name: &str, prompt: &str, category: Option<&str>) -> Result<()> {
        let saved = self.library.save_prompt(name, prompt, category)?;
        println!("{}  {}", saved.id, saved.name);
        Ok(())
    }

    pub fn prompt_list(&self) -> Result<()> {
        for p in self.library.list_prompts()? {
            let category = p.category.as_deref().unwrap_or("general");
            println!("{}  {} [{}] used {}x", p.id, p.name, category, p.used_count);
            println!("    {}", p.prompt);
        }
        Ok(())
    }

    /// Print a saved prompt and count the use.
    pub fn prompt_use(&self, id: &str) -> Result<()> {
        println!("{}", self.library.use_prompt(id)?.prompt);
        Ok(())
    }

    pub fn prompt_delete(&self, id: &str) -> Result<()> {
        self.library.delete_prompt(id)?;
        println!("Prompt deleted");
        Ok(())
    }

    pub fn share(&self, image_id: &str, expires: &str) -> Result<()> {
        let Some(expiry) = ShareExpiry::parse(expires) else {
            bail!("expiry must be one of: never, 1, 7, 30");
        };
        let link = self.library.create_share_link(image_id, expiry, Utc::now())?;
        println!("{}", link.url(&self.settings.storage.public_base_url));
        match link.expires_at {
            Some(at) => println!("Expires {}", at.format("%Y-%m-%d %H:%M UTC")),
            None => println!("Never expires"),
        }
        Ok(())
    }

    pub fn open_share(&self, token: &str) -> Result<()> {
        // accept either the bare token or a full share URL
        let token = token.rsplit('/').next().unwrap_or(token);
        let record = self.library.resolve_share_link(token, Utc::now())?;
        print_record(&record, Utc::now());
        println!("    {}", record.display_url());
        Ok(())
    }

    pub fn stats(&self) -> Result<()> {
        let stats = self.library.statistics(Utc::now())?;
        println!("Images: {}", stats.total_images);
        println!("Edits:  {}", stats.total_edits);
        if !stats.top_tags.is_empty() {
            println!("\nTop tags:");
            for t in &stats.top_tags {
                println!("  {:<20} {}", t.tag, t.count);
            }
        }
        if !stats.top_prompts.is_empty() {
            println!("\nTop prompts:");
            for p in &stats.top_prompts {
                println!("  {:<52} {}", p.prompt, p.count);
            }
        }
        println!("\nLast 7 days:");
        for day in &stats.recent_activity {
            println!("  {}  {}", day.date.format("%a %d"), day.count);
        }
        let recent = self.library.recent_edits(5)?;
        if !recent.is_empty() {
            println!("\nRecent edits:");
            for edit in &recent {
                println!("  {}  {}", edit.created_at.format("%Y-%m-%d %H:%M"), edit.prompt);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_path_sits_next_to_input() {
        let path = derived_output_path(Path::new("/photos/me.jpeg"), "edited", "image/png");
        assert_eq!(path, PathBuf::from("/photos/me-edited.png"));
        let path = derived_output_path(Path::new("shirt.png"), "try-on", "image/jpeg");
        assert_eq!(path, PathBuf::from("shirt-try-on.jpg"));
    }

    #[test]
    fn inline_images_are_written_and_urls_passed_through() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("me.png");

        let location =
            store_generated("data:image/png;base64,AQID", &input, "edited", None).unwrap();
        let written = dir.path().join("me-edited.png");
        assert_eq!(location, written.display().to_string());
        assert_eq!(fs::read(&written).unwrap(), vec![1, 2, 3]);

        let out = dir.path().join("custom.png");
        store_generated("data:image/png;base64,AQID", &input, "edited", Some(&out)).unwrap();
        assert!(out.exists());

        let remote = store_generated("https://cdn.test/x.png", &input, "edited", None).unwrap();
        assert_eq!(remote, "https://cdn.test/x.png");
    }

    #[test]
    fn studio_opens_a_library_under_the_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = AppSettings::default();
        settings.storage.data_dir = dir.path().join("data");
        let studio = Studio::open(settings).unwrap();
        assert!(studio.library.list_images().unwrap().is_empty());
        assert!(dir.path().join("data").join("library.db").exists());
        assert!(studio.gateway().is_err());
    }
}
