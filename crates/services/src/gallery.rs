//! Gallery query engine: search, tag and favorite filters plus sorting over
//! an in-memory set of image records.

use shared::gallery_types::{GalleryQuery, SortKey};
use shared::records::ImageRecord;
use shared::StudioError;
use std::cmp::Ordering;
use std::collections::BTreeSet;

fn matches_search(record: &ImageRecord, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    record.filename.to_lowercase().contains(needle)
        || record
            .description
            .as_deref()
            .unwrap_or("")
            .to_lowercase()
            .contains(needle)
}

fn matches_tags(record: &ImageRecord, tags: &[String]) -> bool {
    tags.iter().all(|tag| record.has_tag(tag))
}

fn newest_first(a: &ImageRecord, b: &ImageRecord) -> Ordering {
    b.uploaded_at.cmp(&a.uploaded_at)
}

/// Derive the visible gallery from `records`.
///
/// All filters are conjunctive. The input is left untouched and a fresh
/// vector is returned on every call.
pub fn derive_view(records: &[ImageRecord], query: &GalleryQuery) -> Vec<ImageRecord> {
    let needle = query.search.to_lowercase();

    let mut view: Vec<ImageRecord> = records
        .iter()
        .filter(|r| !query.favorites_only || r.is_favorite)
        .filter(|r| matches_tags(r, &query.tags))
        .filter(|r| matches_search(r, &needle))
        .cloned()
        .collect();

    match query.sort {
        SortKey::Newest => view.sort_by(newest_first),
        SortKey::Oldest => view.sort_by(|a, b| a.uploaded_at.cmp(&b.uploaded_at)),
        SortKey::Favorites => view.sort_by(|a, b| {
            b.is_favorite
                .cmp(&a.is_favorite)
                .then_with(|| newest_first(a, b))
        }),
    }

    view
}

/// Sorted union of every tag in use, for the tag filter menu.
pub fn available_tags(records: &[ImageRecord]) -> Vec<String> {
    records
        .iter()
        .flat_map(|r| r.tags.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Tags are stored trimmed and lowercase.
pub fn normalize_tag(tag: &str) -> Result<String, StudioError> {
    let tag = tag.trim().to_lowercase();
    if tag.is_empty() {
        return Err(StudioError::validation("Tag cannot be empty"));
    }
    Ok(tag)
}

/// Add a tag unless it is already present. Returns whether the list changed.
pub fn add_tag(tags: &mut Vec<String>, tag: &str) -> Result<bool, StudioError> {
    let tag = normalize_tag(tag)?;
    if tags.contains(&tag) {
        return Ok(false);
    }
    tags.push(tag);
    Ok(true)
}

pub fn remove_tag(tags: &mut Vec<String>, tag: &str) -> bool {
    let before = tags.len();
    tags.retain(|t| t != tag);
    tags.len() != before
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, 12, 0, 0).unwrap()
    }

    fn record(id: &str, d: u32) -> ImageRecord {
        let mut r = ImageRecord::new(format!("{}.png", id), "url", format!("{}/p", id), day(d));
        r.id = id.to_string();
        r
    }

    fn ids(view: &[ImageRecord]) -> Vec<&str> {
        view.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn default_query_returns_everything_newest_first() {
        let records = vec![record("a", 1), record("b", 3), record("c", 2)];
        let view = derive_view(&records, &GalleryQuery::default());
        assert_eq!(ids(&view), vec!["b", "c", "a"]);
        // input untouched
        assert_eq!(ids(&records), vec!["a", "b", "c"]);
    }

    #[test]
    fn oldest_sort_is_ascending() {
        let records = vec![record("a", 2), record("b", 1), record("c", 3)];
        let query = GalleryQuery {
            sort: SortKey::Oldest,
            ..Default::default()
        };
        assert_eq!(ids(&derive_view(&records, &query)), vec!["b", "a", "c"]);
    }

    #[test]
    fn tag_filter_requires_every_tag() {
        let records = vec![record("x", 1).with_tags(["a", "b"])];
        let with = |tags: &[&str]| GalleryQuery {
            tags: tags.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        };
        assert!(derive_view(&records, &with(&["a", "c"])).is_empty());
        assert_eq!(derive_view(&records, &with(&["a", "b"])).len(), 1);
        assert_eq!(derive_view(&records, &with(&["a"])).len(), 1);
    }

    #[test]
    fn favorites_sort_groups_favorites_first() {
        let records = vec![record("1", 2), record("2", 1).favorite()];
        let query = GalleryQuery {
            sort: SortKey::Favorites,
            ..Default::default()
        };
        assert_eq!(ids(&derive_view(&records, &query)), vec!["2", "1"]);

        let records = vec![
            record("old-fav", 1).favorite(),
            record("new", 5),
            record("new-fav", 4).favorite(),
            record("old", 2),
        ];
        assert_eq!(
            ids(&derive_view(&records, &query)),
            vec!["new-fav", "old-fav", "new", "old"]
        );
    }

    #[test]
    fn search_matches_filename_or_description_case_insensitively() {
        let mut described = record("d", 1);
        described.description = Some("Summer Picnic outfit".into());
        let mut named = record("n", 2);
        named.filename = "PICNIC-blanket.jpg".into();
        let records = vec![described, named, record("other", 3)];

        let query = GalleryQuery {
            search: "picnic".into(),
            ..Default::default()
        };
        assert_eq!(ids(&derive_view(&records, &query)), vec!["n", "d"]);
    }

    #[test]
    fn search_whitespace_is_part_of_the_needle() {
        let mut described = record("d", 1);
        described.description = Some("Summer Picnic outfit".into());
        let records = vec![described, record("picnic", 2)];

        let query = GalleryQuery {
            search: " picnic".into(),
            ..Default::default()
        };
        // "picnic.png" has no leading space before the match
        assert_eq!(ids(&derive_view(&records, &query)), vec!["d"]);
    }

    #[test]
    fn filters_compose_by_conjunction() {
        let mut target = record("t", 2).with_tags(["summer"]).favorite();
        target.description = Some("linen shirt".into());
        let records = vec![
            target,
            record("no-fav", 3).with_tags(["summer"]),
            record("no-tag", 4).favorite(),
        ];
        let query = GalleryQuery {
            search: "LINEN".into(),
            tags: vec!["summer".into()],
            favorites_only: true,
            sort: SortKey::Newest,
        };
        assert_eq!(ids(&derive_view(&records, &query)), vec!["t"]);

        let only_favorites = GalleryQuery {
            favorites_only: true,
            ..Default::default()
        };
        assert_eq!(ids(&derive_view(&records, &only_favorites)), vec!["no-tag", "t"]);
    }

    #[test]
    fn available_tags_are_sorted_and_unique() {
        let records = vec![
            record("a", 1).with_tags(["summer", "red"]),
            record("b", 2).with_tags(["red", "casual"]),
        ];
        assert_eq!(available_tags(&records), vec!["casual", "red", "summer"]);
    }

    #[test]
    fn tag_manager_semantics() {
        let mut tags = vec![];
        assert!(add_tag(&mut tags, "  Summer ").unwrap());
        assert!(!add_tag(&mut tags, "summer").unwrap());
        assert!(add_tag(&mut tags, "   ").is_err());
        assert!(remove_tag(&mut tags, "summer"));
        assert!(!remove_tag(&mut tags, "summer"));
        assert!(tags.is_empty());
    }
}
