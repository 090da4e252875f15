use std::collections::{HashMap, HashSet};
use std::path::Path;

use log::debug;
use rand::{rngs::StdRng, RngExt, SeedableRng};
use uuid::Uuid;

use crate::filter::Filter;
use crate::metadata;

/// One track in the library. Identity is the generated `id`; every container
/// in [`Playlist`] references songs by id so that edits never leave a stale
/// copy behind.
#[derive(Debug, Clone, PartialEq)]
pub struct Song {
    pub id: String,
    /// Absolute path with forward slashes.
    pub path: String,
    /// Display title, unique within a playlist.
    pub name: String,
    /// Ordered; the first tag is the artist.
    pub tags: Vec<String>,
    /// Relative probability for weighted-random selection, always >= 1.
    pub weight: u32,
    pub length_secs: f64,
}

impl Song {
    /// Builds a song from a file on disk, probing title and duration.
    /// A missing or unreadable file fails this song only.
    pub fn from_file(
        path: &str,
        name: Option<String>,
        weight: u32,
        tags: Vec<String>,
    ) -> Result<Song, String> {
        let normalized = normalize_path(path);
        let probed = metadata::probe_file(Path::new(&normalized))?;
        let name = name
            .filter(|name| !name.is_empty())
            .or(probed.title)
            .unwrap_or_else(|| file_stem(&normalized));
        Ok(Song {
            id: Uuid::new_v4().to_string(),
            path: normalized,
            name,
            tags,
            weight: weight.max(1),
            length_secs: probed.duration_secs,
        })
    }

    /// Builds a song from already-known fields, skipping the metadata probe.
    pub fn with_metadata(
        path: &str,
        name: &str,
        weight: u32,
        tags: Vec<String>,
        length_secs: f64,
    ) -> Song {
        Song {
            id: Uuid::new_v4().to_string(),
            path: normalize_path(path),
            name: name.to_string(),
            tags,
            weight: weight.max(1),
            length_secs,
        }
    }

    pub fn artist(&self) -> &str {
        self.tags.first().map(String::as_str).unwrap_or("/")
    }
}

fn normalize_path(path: &str) -> String {
    let forward = path.replace('\\', "/");
    if Path::new(&forward).is_absolute() {
        return forward;
    }
    match std::env::current_dir() {
        Ok(cwd) => format!(
            "{}/{}",
            cwd.display().to_string().replace('\\', "/"),
            forward.trim_start_matches("./")
        ),
        Err(_) => forward,
    }
}

fn file_stem(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

/// The forms a song reference can take at the API boundary, resolved to an
/// absolute list index by [`Playlist::get_index`] before use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SongSelector {
    /// Absolute index into the canonical list.
    ByIndex(usize),
    /// Display-name lookup.
    ByName(String),
    /// Stable identity lookup.
    ById(String),
}

impl SongSelector {
    /// Free-form user input: anything numeric is an absolute index
    /// (fractions round), everything else is a name.
    pub fn parse(text: &str) -> SongSelector {
        let trimmed = text.trim();
        match trimmed.parse::<f64>() {
            Ok(number) if number >= 0.0 => SongSelector::ByIndex(number.round() as usize),
            _ => SongSelector::ByName(trimmed.to_string()),
        }
    }
}

/// The ordered song collection plus every structure derived from it: the
/// filtered view, the selection, and the tag catalog. All public operations
/// leave the following invariants intact:
/// - `filtered` is exactly the ids of `list` entries passing `filter`, in
///   list order (except after an explicit reorder while filtered, which
///   splices the view directly).
/// - `selected` only contains members of `filtered`.
/// - `tag_catalog[tag]` is exactly the ids of songs bearing `tag`; a tag with
///   no songs has no entry, and `tags` mirrors the catalog keys in first-use
///   order.
/// - No two songs share a name.
pub struct Playlist {
    list: Vec<Song>,
    filtered: Vec<String>,
    selected: Vec<String>,
    tags: Vec<String>,
    tag_catalog: HashMap<String, HashSet<String>>,
    filter: Filter,
    rng: StdRng,
}

impl Playlist {
    pub fn new() -> Playlist {
        let mut seed = [0u8; 32];
        getrandom::fill(&mut seed).expect("Failed to generate random seed");
        Playlist::from_seed(seed)
    }

    pub fn from_seed(seed: [u8; 32]) -> Playlist {
        Playlist {
            list: Vec::new(),
            filtered: Vec::new(),
            selected: Vec::new(),
            tags: Vec::new(),
            tag_catalog: HashMap::new(),
            filter: Filter::match_all(),
            rng: StdRng::from_seed(seed),
        }
    }

    /// Number of songs in the filtered view.
    pub fn len(&self) -> usize {
        self.filtered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filtered.is_empty()
    }

    /// Number of songs in the canonical list.
    pub fn total_len(&self) -> usize {
        self.list.len()
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn known_tags(&self) -> &[String] {
        &self.tags
    }

    /// Ids of songs bearing `tag`, if any do.
    pub fn songs_with_tag(&self, tag: &str) -> Option<&HashSet<String>> {
        self.tag_catalog.get(tag)
    }

    fn index_of_id(&self, id: &str) -> Option<usize> {
        self.list.iter().position(|song| song.id == id)
    }

    pub fn song_by_id(&self, id: &str) -> Option<&Song> {
        self.list.iter().find(|song| song.id == id)
    }

    /// Resolves a selector to an absolute list index.
    pub fn get_index(&self, selector: &SongSelector) -> Option<usize> {
        match selector {
            SongSelector::ByIndex(index) => (*index < self.list.len()).then_some(*index),
            SongSelector::ByName(name) => self.list.iter().position(|song| song.name == *name),
            SongSelector::ById(id) => self.index_of_id(id),
        }
    }

    pub fn get(&self, selector: &SongSelector) -> Option<&Song> {
        self.get_index(selector).map(|index| &self.list[index])
    }

    pub fn filtered_get(&self, row: usize) -> Option<&Song> {
        self.filtered.get(row).and_then(|id| self.song_by_id(id))
    }

    /// Filtered-view row of a song id, if the song currently passes the
    /// filter.
    pub fn filtered_row_of(&self, id: &str) -> Option<usize> {
        self.filtered.iter().position(|entry| entry == id)
    }

    /// Songs in filtered-view order.
    pub fn iter_filtered(&self) -> impl Iterator<Item = &Song> {
        self.filtered.iter().filter_map(|id| self.song_by_id(id))
    }

    /// Songs in canonical order.
    pub fn iter_all(&self) -> impl Iterator<Item = &Song> {
        self.list.iter()
    }

    /// Inserts a song at `position` (append when `None`). A song whose name
    /// is already taken is dropped silently; duplicate names are prevented
    /// structurally rather than reported.
    pub fn add(&mut self, song: Song, position: Option<usize>) {
        if self.get_index(&SongSelector::ByName(song.name.clone())).is_some() {
            debug!("Playlist: ignoring duplicate song name: {}", song.name);
            return;
        }
        let position = position.unwrap_or(self.list.len()).min(self.list.len());
        let id = song.id.clone();
        let passes = self.filter.check(&song.name, &song.tags);
        for tag in &song.tags {
            if !self.tag_catalog.contains_key(tag) {
                self.tags.push(tag.clone());
            }
            self.tag_catalog
                .entry(tag.clone())
                .or_default()
                .insert(id.clone());
        }
        self.list.insert(position, song);
        if passes {
            let filtered_position = self.get_filtered_position(position);
            self.filtered.insert(filtered_position, id);
        }
    }

    /// Maps an absolute insertion index to the filtered-view index keeping
    /// relative order: the number of filtered members before `position`.
    pub fn get_filtered_position(&self, position: usize) -> usize {
        if position >= self.list.len() {
            return self.filtered.len();
        }
        let filtered_ids: HashSet<&str> = self.filtered.iter().map(String::as_str).collect();
        self.list[..position]
            .iter()
            .filter(|song| filtered_ids.contains(song.id.as_str()))
            .count()
    }

    /// Maps a filtered-view index back to the absolute list index, clamping
    /// to the last filtered entry when `row` runs past the view.
    pub fn get_unfiltered_position(&self, row: usize) -> Option<usize> {
        if self.filtered.is_empty() {
            return None;
        }
        let row = row.min(self.filtered.len() - 1);
        self.index_of_id(&self.filtered[row])
    }

    /// Removes the song a selector resolves to; unresolved selectors are
    /// no-ops.
    pub fn delete(&mut self, selector: &SongSelector) {
        if let Some(index) = self.get_index(selector) {
            self.remove_at(index);
        }
    }

    /// Element-wise delete. Selectors are resolved to identities up front so
    /// earlier removals cannot shift what later ones mean.
    pub fn delete_many(&mut self, selectors: &[SongSelector]) {
        let ids: Vec<String> = selectors
            .iter()
            .filter_map(|selector| self.get_index(selector).map(|index| self.list[index].id.clone()))
            .collect();
        for id in ids {
            if let Some(index) = self.index_of_id(&id) {
                self.remove_at(index);
            }
        }
    }

    fn remove_at(&mut self, index: usize) -> Song {
        let song = self.list.remove(index);
        self.filtered.retain(|id| *id != song.id);
        self.selected.retain(|id| *id != song.id);
        for tag in &song.tags {
            if let Some(ids) = self.tag_catalog.get_mut(tag) {
                ids.remove(&song.id);
                if ids.is_empty() {
                    self.tag_catalog.remove(tag);
                    self.tags.retain(|known| known != tag);
                }
            }
        }
        song
    }

    /// Applies field overrides by deleting and re-inserting at the captured
    /// index, so every derived structure is rebuilt rather than patched.
    /// Renaming onto another song's name is refused with nothing mutated;
    /// an unresolved selector is a no-op.
    pub fn update(
        &mut self,
        selector: &SongSelector,
        name: Option<String>,
        tags: Option<Vec<String>>,
        weight: Option<u32>,
    ) -> Result<(), String> {
        let Some(index) = self.get_index(selector) else {
            return Ok(());
        };
        if let Some(new_name) = &name {
            let taken = self
                .list
                .iter()
                .enumerate()
                .any(|(other, song)| other != index && song.name == *new_name);
            if taken {
                return Err(format!("another song is already named \"{}\"", new_name));
            }
        }
        let mut song = self.remove_at(index);
        if let Some(name) = name {
            song.name = name;
        }
        if let Some(tags) = tags {
            song.tags = tags;
        }
        if let Some(weight) = weight {
            song.weight = weight.max(1);
        }
        self.add(song, Some(index));
        Ok(())
    }

    /// Replaces the active filter, recomputes the view from the canonical
    /// list, and drops now-excluded songs from the selection.
    pub fn set_filter(&mut self, filter: Filter) {
        self.filter = filter;
        self.filtered = self
            .list
            .iter()
            .filter(|song| self.filter.check(&song.name, &song.tags))
            .map(|song| song.id.clone())
            .collect();
        let filtered_ids: HashSet<&String> = self.filtered.iter().collect();
        self.selected.retain(|id| filtered_ids.contains(id));
    }

    /// Adds a song to the selection if it is visible; idempotent.
    pub fn select(&mut self, selector: &SongSelector) {
        let Some(song) = self.get(selector) else {
            return;
        };
        let id = song.id.clone();
        if self.filtered.contains(&id) && !self.selected.contains(&id) {
            self.selected.push(id);
        }
    }

    pub fn clear_select(&mut self) {
        self.selected.clear();
    }

    /// Replaces the selection with one visible row.
    pub fn reselect_row(&mut self, row: usize) {
        self.clear_select();
        if let Some(id) = self.filtered.get(row).cloned() {
            self.selected.push(id);
        }
    }

    pub fn toggle_select_row(&mut self, row: usize) {
        let Some(id) = self.filtered.get(row).cloned() else {
            return;
        };
        if let Some(position) = self.selected.iter().position(|entry| *entry == id) {
            self.selected.remove(position);
        } else {
            self.selected.push(id);
        }
    }

    pub fn is_empty_selection(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn count_selected(&self) -> usize {
        self.selected.len()
    }

    /// Selected song ids in selection order.
    pub fn selected_ids(&self) -> &[String] {
        &self.selected
    }

    /// Selected rows as filtered-view indices, in view order.
    pub fn selected_rows(&self) -> Vec<usize> {
        self.filtered
            .iter()
            .enumerate()
            .filter(|(_, id)| self.selected.contains(id))
            .map(|(row, _)| row)
            .collect()
    }

    /// Splices a song to absolute index `to` in the canonical list. When the
    /// song is visible it is also spliced to index `to` in the filtered view
    /// directly: `move_up`/`move_down` already compute `to` in the space they
    /// intend to reorder, so no translation happens here. With a filter
    /// active the relative view order is therefore best-effort.
    pub fn change_position(&mut self, id: &str, to: usize) {
        let Some(index) = self.index_of_id(id) else {
            return;
        };
        let song = self.list.remove(index);
        let list_target = to.min(self.list.len());
        self.list.insert(list_target, song);
        if let Some(row) = self.filtered.iter().position(|entry| entry == id) {
            self.filtered.remove(row);
            let view_target = to.min(self.filtered.len());
            self.filtered.insert(view_target, id.to_string());
        }
    }

    /// Moves the song at `index` up by `k` positions, or to the top. A
    /// filtered-view index is translated to the absolute list first.
    pub fn move_up(&mut self, index: usize, k: usize, to_top: bool, is_filtered: bool) {
        let Some(index) = self.resolve_reorder_index(index, is_filtered) else {
            return;
        };
        let id = self.list[index].id.clone();
        let target = if to_top { 0 } else { index.saturating_sub(k) };
        self.change_position(&id, target);
    }

    /// Moves the song at `index` down by `k` positions, or to the bottom.
    pub fn move_down(&mut self, index: usize, k: usize, to_bottom: bool, is_filtered: bool) {
        let Some(index) = self.resolve_reorder_index(index, is_filtered) else {
            return;
        };
        let id = self.list[index].id.clone();
        let target = if to_bottom {
            self.list.len()
        } else {
            index + (self.list.len() - index).min(k) + 1
        };
        self.change_position(&id, target);
    }

    fn resolve_reorder_index(&self, index: usize, is_filtered: bool) -> Option<usize> {
        if is_filtered {
            self.get_unfiltered_position(index)
        } else {
            (index < self.list.len()).then_some(index)
        }
    }

    /// Weighted-random pick over the filtered view. The entry at `exclude`
    /// contributes nothing to the weight sum and is never returned; songs
    /// with zero weight are tolerated and never selected. Returns the
    /// filtered-view row and the song, or `None` when no candidate carries
    /// weight.
    pub fn random(&mut self, exclude: Option<usize>) -> Option<(usize, &Song)> {
        let weights: Vec<u64> = self
            .filtered
            .iter()
            .enumerate()
            .map(|(row, id)| {
                if Some(row) == exclude {
                    0
                } else {
                    self.song_by_id(id).map(|song| song.weight as u64).unwrap_or(0)
                }
            })
            .collect();
        let total: u64 = weights.iter().sum();
        if total == 0 {
            return None;
        }
        let mut remainder = self.rng.random_range(0..total);
        for (row, weight) in weights.iter().enumerate() {
            if *weight == 0 {
                continue;
            }
            if remainder < *weight {
                return self.filtered_get(row).map(|song| (row, song));
            }
            remainder -= *weight;
        }
        None
    }

    /// Drops every song and derived structure; the filter is reset too.
    pub fn clear(&mut self) {
        self.list.clear();
        self.filtered.clear();
        self.selected.clear();
        self.tags.clear();
        self.tag_catalog.clear();
        self.filter = Filter::match_all();
    }
}
