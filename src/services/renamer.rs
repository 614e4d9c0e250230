//! Media renamer
//!
//! Classifies a media file as TV or movie and renders its library-relative
//! destination:
//! - TV: `<Series>/Season <N>/<Series> - S##E##.mkv`
//! - Movie: `<Genre>/<Title> (<Year>).mkv`, or `<Title> (<Year>).mkv` when the
//!   lookup finds nothing
//!
//! Lookup failures never fail a file; the cleaned filename is used instead.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use super::filename_parser::{
    clean_name, find_episode, find_year, leaf_name, media_extension, sanitize_title, title_before,
    title_case,
};
use super::metadata::MetadataLookup;

/// Ordered (provider genre, library bucket) rules. The first rule matching
/// any of a movie's genres wins.
pub const GENRE_RULES: &[(&str, &str)] = &[
    ("Romance", "Chick Flick"),
    ("Animation", "Animation"),
    ("Horror", "Horror"),
    ("Family", "Family"),
    ("Science Fiction", "Science Fiction"),
    ("Fantasy", "Science Fiction"),
    ("Comedy", "Comedy"),
    ("Documentary", "Documentary"),
    ("History", "Documentary"),
    ("Drama", "Drama"),
    ("Adventure", "Adventure"),
];

pub const DEFAULT_GENRE: &str = "Action";

fn normalize_genre(genre: &str) -> String {
    genre
        .chars()
        .filter(|c| *c != '-' && *c != ' ')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Library bucket for a movie's genre list
pub fn genre_bucket(genres: &[String]) -> &'static str {
    let normalized: Vec<String> = genres.iter().map(|g| normalize_genre(g)).collect();
    GENRE_RULES
        .iter()
        .find(|(genre, _)| normalized.contains(&normalize_genre(genre)))
        .map(|(_, bucket)| *bucket)
        .unwrap_or(DEFAULT_GENRE)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Tv { season: u32, episode: u32 },
    Movie { year: Option<u16> },
}

impl MediaKind {
    pub fn is_tv(&self) -> bool {
        matches!(self, MediaKind::Tv { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedFile {
    pub source_path: PathBuf,
    pub kind: MediaKind,
}

/// Classify a media file from its path alone
pub fn classify(path: &Path) -> ClassifiedFile {
    let cleaned = clean_name(&path.to_string_lossy());
    let kind = match find_episode(&cleaned) {
        Some(anchor) => MediaKind::Tv {
            season: anchor.season,
            episode: anchor.episode,
        },
        None => MediaKind::Movie {
            year: find_year(&cleaned).map(|a| a.year),
        },
    };
    ClassifiedFile {
        source_path: path.to_path_buf(),
        kind,
    }
}

pub struct MediaRenamer {
    lookup: Arc<dyn MetadataLookup>,
}

impl MediaRenamer {
    pub fn new(lookup: Arc<dyn MetadataLookup>) -> Self {
        Self { lookup }
    }

    /// Library-relative destination for a classified file
    pub async fn destination(&self, file: &ClassifiedFile) -> PathBuf {
        match file.kind {
            MediaKind::Tv { .. } => self.render_tv(&file.source_path).await,
            MediaKind::Movie { .. } => self.render_movie(&file.source_path).await,
        }
    }

    /// `<Series>/Season <N>/<Series> - S##E##.<ext>`
    pub async fn render_tv(&self, source: &Path) -> PathBuf {
        let path = source.to_string_lossy();
        let cleaned = clean_name(&path);
        let Some(anchor) = find_episode(&cleaned) else {
            return PathBuf::from(sanitize_title(&cleaned));
        };

        let candidate = title_before(&cleaned, anchor.start);
        let series = match self.lookup.search_tv(&candidate).await {
            Ok(result) => match result.into_first() {
                Some(hit) => hit.title,
                None => {
                    debug!(title = %candidate, "No series match, using cleaned title");
                    candidate.clone()
                }
            },
            Err(e) => {
                warn!(title = %candidate, error = %e, "Series lookup failed, using cleaned title");
                candidate.clone()
            }
        };

        let mut series = sanitize_title(&series);
        if series.is_empty() {
            series = sanitize_title(&candidate);
        }
        if series.is_empty() {
            return PathBuf::from(sanitize_title(&cleaned));
        }

        PathBuf::from(&series)
            .join(format!("Season {}", anchor.season))
            .join(format!(
                "{} - {}.{}",
                series,
                anchor.tag(),
                media_extension(&path)
            ))
    }

    /// `<Genre>/<Title> (<Year>).<ext>`; `<Title> (<Year>).<ext>` without a
    /// match; the sanitized file name without a year
    pub async fn render_movie(&self, source: &Path) -> PathBuf {
        let path = source.to_string_lossy();
        let cleaned = clean_name(&path);
        let Some(anchor) = find_year(&cleaned) else {
            return PathBuf::from(sanitize_title(leaf_name(&path)));
        };

        let extension = media_extension(&path);
        let candidate = title_before(&cleaned, anchor.start);

        match self.lookup.search_movie(&candidate, anchor.year).await {
            Ok(result) => {
                if let Some(hit) = result.into_first() {
                    let bucket = genre_bucket(&hit.genres);
                    debug!(title = %hit.title, genres = ?hit.genres, bucket, "Movie matched");
                    return PathBuf::from(bucket).join(format!(
                        "{} ({}).{}",
                        sanitize_title(&hit.title),
                        anchor.year,
                        extension
                    ));
                }
                debug!(title = %candidate, year = anchor.year, "No movie match, using cleaned title");
            }
            Err(e) => {
                warn!(title = %candidate, error = %e, "Movie lookup failed, using cleaned title");
            }
        }

        PathBuf::from(format!(
            "{} ({}).{}",
            sanitize_title(&title_case(&candidate)),
            anchor.year,
            extension
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::metadata::{LookupResult, MovieMatch, NoLookup, TvMatch};
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records queries and answers with canned hits
    #[derive(Default)]
    struct StubLookup {
        tv: Option<TvMatch>,
        movie: Option<MovieMatch>,
        fail: bool,
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MetadataLookup for StubLookup {
        async fn search_tv(&self, title: &str) -> Result<LookupResult<TvMatch>> {
            self.queries.lock().unwrap().push(title.to_string());
            if self.fail {
                anyhow::bail!("lookup down");
            }
            Ok(match &self.tv {
                Some(hit) => LookupResult::found(1, hit.clone()),
                None => LookupResult::empty(),
            })
        }

        async fn search_movie(&self, title: &str, year: u16) -> Result<LookupResult<MovieMatch>> {
            self.queries.lock().unwrap().push(format!("{} {}", title, year));
            if self.fail {
                anyhow::bail!("lookup down");
            }
            Ok(match &self.movie {
                Some(hit) => LookupResult::found(1, hit.clone()),
                None => LookupResult::empty(),
            })
        }
    }

    fn genres(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_genre_bucket_rules() {
        assert_eq!(genre_bucket(&genres(&["Comedy", "Romance"])), "Chick Flick");
        assert_eq!(genre_bucket(&genres(&["Drama", "Fantasy"])), "Science Fiction");
        assert_eq!(genre_bucket(&genres(&["Science-Fiction"])), "Science Fiction");
        assert_eq!(genre_bucket(&genres(&["history"])), "Documentary");
        assert_eq!(genre_bucket(&genres(&["Thriller", "Crime"])), "Action");
        assert_eq!(genre_bucket(&[]), "Action");
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            classify(Path::new("/dl/Show.Name.S03E07.HDTV.x264.mkv")).kind,
            MediaKind::Tv {
                season: 3,
                episode: 7
            }
        );
        assert_eq!(
            classify(Path::new("/dl/Movie.Title.2015.1080p.mkv")).kind,
            MediaKind::Movie { year: Some(2015) }
        );
        assert_eq!(
            classify(Path::new("/dl/home_video.mkv")).kind,
            MediaKind::Movie { year: None }
        );
    }

    #[tokio::test]
    async fn test_tv_uses_lookup_title() {
        let lookup = Arc::new(StubLookup {
            tv: Some(TvMatch {
                title: "Show Name".to_string(),
            }),
            ..Default::default()
        });
        let renamer = MediaRenamer::new(lookup.clone());
        let dest = renamer
            .render_tv(Path::new("/dl/Show.Name.S01E02.720p.HDTV.mkv"))
            .await;
        assert_eq!(dest, PathBuf::from("Show Name/Season 1/Show Name - S01E02.mkv"));
        assert_eq!(lookup.queries.lock().unwrap().as_slice(), ["Show Name"]);
    }

    #[tokio::test]
    async fn test_tv_sanitizes_lookup_title() {
        let renamer = MediaRenamer::new(Arc::new(StubLookup {
            tv: Some(TvMatch {
                title: "Marvel's Agents: S.H.I.E.L.D.?".to_string(),
            }),
            ..Default::default()
        }));
        let dest = renamer
            .render_tv(Path::new("/dl/Agents.of.SHIELD.S05E10.mkv"))
            .await;
        assert_eq!(
            dest,
            PathBuf::from(
                "Marvel's Agents S.H.I.E.L.D./Season 5/Marvel's Agents S.H.I.E.L.D. - S05E10.mkv"
            )
        );
    }

    #[tokio::test]
    async fn test_tv_falls_back_on_failure() {
        let renamer = MediaRenamer::new(Arc::new(StubLookup {
            fail: true,
            ..Default::default()
        }));
        let dest = renamer
            .render_tv(Path::new("/dl/some.show.s10e03.webrip.mkv"))
            .await;
        assert_eq!(dest, PathBuf::from("Some Show/Season 10/Some Show - S10E03.mkv"));
    }

    #[tokio::test]
    async fn test_movie_with_genre_match() {
        let lookup = Arc::new(StubLookup {
            movie: Some(MovieMatch {
                title: "Some Movie".to_string(),
                genres: genres(&["Comedy", "Romance"]),
            }),
            ..Default::default()
        });
        let renamer = MediaRenamer::new(lookup.clone());
        let dest = renamer
            .render_movie(Path::new("/dl/Some.Movie.2019.1080p.BluRay.x264.mkv"))
            .await;
        assert_eq!(dest, PathBuf::from("Chick Flick/Some Movie (2019).mkv"));
        assert_eq!(lookup.queries.lock().unwrap().as_slice(), ["Some Movie 2019"]);
    }

    #[tokio::test]
    async fn test_movie_without_match() {
        let renamer = MediaRenamer::new(Arc::new(NoLookup));
        let dest = renamer
            .render_movie(Path::new("/dl/Some.Movie.2019.1080p.BluRay.x264.mkv"))
            .await;
        assert_eq!(dest, PathBuf::from("Some Movie (2019).mkv"));
    }

    #[tokio::test]
    async fn test_movie_without_year_keeps_file_name() {
        let renamer = MediaRenamer::new(Arc::new(NoLookup));
        let dest = renamer.render_movie(Path::new("/dl/home: video?.mkv")).await;
        assert_eq!(dest, PathBuf::from("home video.mkv"));
    }

    #[tokio::test]
    async fn test_destination_dispatches_on_kind() {
        let renamer = MediaRenamer::new(Arc::new(NoLookup));
        let file = classify(Path::new("/dl/Show.S01E01.mkv"));
        assert_eq!(
            renamer.destination(&file).await,
            PathBuf::from("Show/Season 1/Show - S01E01.mkv")
        );
    }
}
