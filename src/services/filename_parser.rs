//! Filename parser for scene-style release names
//!
//! Turns noisy release paths into a cleaned, title-cased working name and
//! finds the anchor that splits title from metadata:
//! - TV: `S##E##` ("Show Name S01e02.mkv")
//! - Movies: a year between 1960 and 2029 ("Some Movie 2019.mkv")
//!
//! Everything here is pure; callers clean once and reuse the result.

use once_cell::sync::Lazy;
use regex::Regex;

/// Release tags removed from the lowercased working name, in order
/// (`blurayrip` before `bluray`).
pub const RELEASE_TAGS: &[&str] = &[
    "1080p", "720p", "x264", "h264", "ac3", "dts", "blurayrip", "bluray", "dvdrip", "hdtv",
    "webrip",
];

/// Markers that identify a descriptive release folder
const RESOLUTION_MARKERS: &[&str] = &["720p", "1080p"];

/// Characters that never make it into a library path component
pub const UNSAFE_TITLE_CHARS: &[char] = &[':', '*', '?', '/', '"', '<', '>', '|'];

pub const FIRST_MOVIE_YEAR: u16 = 1960;
pub const LAST_MOVIE_YEAR: u16 = 2029;

/// Container extensions the renamer understands
pub const MEDIA_EXTENSIONS: &[&str] = &["mkv", "mp4"];

static EPISODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)s(\d{2})e(\d{2})").expect("episode pattern is valid"));

/// `S##E##` position within a string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpisodeAnchor {
    pub season: u32,
    pub episode: u32,
    /// Byte offset of the `S`
    pub start: usize,
}

impl EpisodeAnchor {
    pub fn tag(&self) -> String {
        format!("S{:02}E{:02}", self.season, self.episode)
    }
}

/// Year position within a string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearAnchor {
    pub year: u16,
    pub start: usize,
}

/// Find the episode anchor: the lowest season, then the lowest episode, among
/// every `S##E##` that is preceded by at least one character. Ties on the same
/// tag go to the leftmost occurrence.
pub fn find_episode(s: &str) -> Option<EpisodeAnchor> {
    EPISODE_RE
        .captures_iter(s)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            if whole.start() == 0 {
                return None;
            }
            Some(EpisodeAnchor {
                season: caps.get(1)?.as_str().parse().ok()?,
                episode: caps.get(2)?.as_str().parse().ok()?,
                start: whole.start(),
            })
        })
        .min_by_key(|a| (a.season, a.episode, a.start))
}

/// Find the movie year: years are tried in ascending order and the first one
/// that appears (not at position 0) wins, wherever it sits in the string.
pub fn find_year(s: &str) -> Option<YearAnchor> {
    (FIRST_MOVIE_YEAR..=LAST_MOVIE_YEAR).find_map(|year| {
        s.find(&year.to_string())
            .filter(|&idx| idx > 0)
            .map(|start| YearAnchor { year, start })
    })
}

fn path_segments(path: &str) -> Vec<&str> {
    path.split(['/', '\\']).filter(|s| !s.is_empty()).collect()
}

/// Last path component
pub fn leaf_name(path: &str) -> &str {
    path_segments(path).last().copied().unwrap_or(path)
}

fn has_resolution_marker(segment: &str) -> bool {
    let lower = segment.to_lowercase();
    RESOLUTION_MARKERS.iter().any(|m| lower.contains(m))
}

/// Lowercased extension if it is a known media container, else `mkv`
pub fn media_extension(path: &str) -> String {
    std::path::Path::new(leaf_name(path))
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .filter(|e| MEDIA_EXTENSIONS.contains(&e.as_str()))
        .unwrap_or_else(|| "mkv".to_string())
}

/// Uppercase the first letter of every space separated token
pub fn title_case(s: &str) -> String {
    s.split(' ')
        .filter(|t| !t.is_empty())
        .map(|token| {
            let mut chars = token.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Produce the working name for a media path.
///
/// When the parent folder carries a resolution marker the folder is usually the
/// descriptive release name, unless the path holds an episode tag (a season
/// pack folder), in which case the file name is used.
pub fn clean_name(path: &str) -> String {
    let segments = path_segments(path);
    let leaf = segments.last().copied().unwrap_or(path);
    let parent = segments.len().checked_sub(2).map(|i| segments[i]);

    let working = match parent {
        Some(dir) if has_resolution_marker(dir) => {
            if find_episode(path).is_some() {
                leaf.to_string()
            } else {
                format!("{}.{}", dir, media_extension(path))
            }
        }
        _ => leaf.to_string(),
    };

    let mut cleaned = working.to_lowercase();
    for tag in RELEASE_TAGS {
        cleaned = cleaned.replace(tag, "");
    }
    let cleaned = cleaned
        .replace('.', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let mut cleaned = title_case(&cleaned);

    for ext in MEDIA_EXTENSIONS {
        let spaced = format!(" {}", title_case(ext));
        if let Some(stripped) = cleaned.strip_suffix(&spaced) {
            cleaned = format!("{}.{}", stripped, ext);
            break;
        }
    }
    cleaned
}

/// TV if the cleaned name carries an episode anchor
pub fn is_tv(path: &str) -> bool {
    find_episode(&clean_name(path)).is_some()
}

/// Text before an anchor: trimmed, trailing dash removed, directory prefix dropped
pub fn title_before(cleaned: &str, anchor_start: usize) -> String {
    let before = cleaned[..anchor_start].trim();
    let before = before.strip_suffix('-').unwrap_or(before).trim();
    leaf_name(before).trim().to_string()
}

/// Remove characters that are unsafe in library paths
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| !UNSAFE_TITLE_CHARS.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_leaf_tv() {
        assert_eq!(clean_name("Show.Name.S01E02.720p.HDTV.mkv"), "Show Name S01e02.mkv");
        assert_eq!(
            clean_name("/downloads/Show.Name.S01E02.720p.HDTV.mkv"),
            "Show Name S01e02.mkv"
        );
    }

    #[test]
    fn test_clean_movie_leaf() {
        assert_eq!(
            clean_name("Some.Movie.2019.1080p.BluRay.x264.mkv"),
            "Some Movie 2019.mkv"
        );
    }

    #[test]
    fn test_clean_prefers_release_folder_for_movies() {
        assert_eq!(
            clean_name("/dl/The.Movie.2011.1080p.BluRay.x264-GRP/_unrar/grp-themovie.mkv"),
            "Grp-themovie.mkv"
        );
        assert_eq!(
            clean_name("/dl/The.Movie.2011.1080p.BluRay.x264-GRP/grp-themovie.mkv"),
            "The Movie 2011 -grp.mkv"
        );
    }

    #[test]
    fn test_clean_prefers_leaf_for_season_packs() {
        assert_eq!(
            clean_name("/dl/Show.S02.720p.HDTV/show.s02e05.720p.hdtv.mkv"),
            "Show S02e05.mkv"
        );
        // Episode tag only in the folder still counts as a pack
        assert_eq!(
            clean_name("/dl/Show.S02E05.720p.HDTV/abc-show.mkv"),
            "Abc-show.mkv"
        );
    }

    #[test]
    fn test_clean_keeps_mp4_extension() {
        assert_eq!(clean_name("Some.Movie.2019.mp4"), "Some Movie 2019.mp4");
        assert_eq!(media_extension("/x/Some.Movie.2019.MP4"), "mp4");
        assert_eq!(media_extension("/x/Some.Movie.2019.avi"), "mkv");
    }

    #[test]
    fn test_is_tv() {
        assert!(is_tv("Show.Name.S03E07.HDTV.x264.mkv"));
        assert!(is_tv("/dl/show.name.s03e07.webrip.mkv"));
        assert!(!is_tv("Movie.Title.2015.1080p.mkv"));
        // Tag at the very start has no title in front of it
        assert!(!is_tv("S01E01.mkv"));
    }

    #[test]
    fn test_find_episode_prefers_lowest_season_then_episode() {
        let anchor = find_episode("Show S02E01 S01E09 S01E03").unwrap();
        assert_eq!((anchor.season, anchor.episode), (1, 3));
        assert_eq!(anchor.tag(), "S01E03");
        assert_eq!(anchor.start, "Show S02E01 S01E09 ".len());
    }

    #[test]
    fn test_find_episode_accepts_wide_range() {
        let anchor = find_episode("Long Runner S45E88.mkv").unwrap();
        assert_eq!((anchor.season, anchor.episode), (45, 88));
        let special = find_episode("Show S00E00.mkv").unwrap();
        assert_eq!((special.season, special.episode), (0, 0));
    }

    #[test]
    fn test_find_year_ascending() {
        let anchor = find_year("Nineteen 2011 Remake Of 1984.mkv").unwrap();
        assert_eq!(anchor.year, 1984);
        assert_eq!(anchor.start, "Nineteen 2011 Remake Of ".len());
        assert!(find_year("No Year Here.mkv").is_none());
        assert!(find_year("1999.mkv").is_none());
        assert!(find_year("Old 1959 Film.mkv").is_none());
    }

    #[test]
    fn test_title_case_preserves_rest() {
        assert_eq!(title_case("the mcDonald  show"), "The McDonald Show");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn test_title_before() {
        let cleaned = "Show Name - S01e02.mkv";
        let anchor = find_episode(cleaned).unwrap();
        assert_eq!(title_before(cleaned, anchor.start), "Show Name");
    }

    #[test]
    fn test_sanitize_title() {
        assert_eq!(sanitize_title("Mission: Impossible?"), "Mission Impossible");
        assert_eq!(sanitize_title("a:b*c?d/e\"f<g>h|i"), "abcdefghi");
        let sanitized = sanitize_title("What/If: \"Who\" <Is> Here|*?");
        assert!(!sanitized.chars().any(|c| UNSAFE_TITLE_CHARS.contains(&c)));
    }
}
