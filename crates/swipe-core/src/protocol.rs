use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque session token handed out by the backend on registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// External track identifier (also the deep-link key).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct TrackId(pub String);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UserProfile {
    pub name: String,
    pub email: String,
}

impl UserProfile {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into().trim().to_string(),
            email: email.into().trim().to_string(),
        }
    }

    /// First thing wrong with this profile, if anything.
    pub fn problem(&self) -> Option<&'static str> {
        if self.name.trim().is_empty() {
            return Some("name is required");
        }
        let email = self.email.trim();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => None,
            _ => Some("a valid email is required"),
        }
    }
}

/// A song offered for a like/dislike decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CandidateSong {
    pub track_id: TrackId,
    #[serde(alias = "track_name", default)]
    pub name: String,
    #[serde(default)]
    pub artists: String,
    #[serde(alias = "track_genre", default)]
    pub genre: String,
}

/// A recommended song with display-only feature scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ScoredSong {
    #[serde(flatten)]
    pub song: CandidateSong,
    #[serde(default)]
    pub energy: f64,
    #[serde(default)]
    pub popularity: f64,
    #[serde(default)]
    pub danceability: f64,
}

impl ScoredSong {
    /// Scores arrive either as 0..1 or 0..100; normalise to 0..1 for bars.
    pub fn unit_score(value: f64) -> f64 {
        if value > 1.0 {
            (value / 100.0).clamp(0.0, 1.0)
        } else {
            value.clamp(0.0, 1.0)
        }
    }
}

/// Lazily fetched art + preview for one candidate. Either part may be absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CardMedia {
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub artists: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
}

impl CardMedia {
    pub fn has_preview(&self) -> bool {
        self.preview_url.as_deref().is_some_and(|u| !u.is_empty())
    }

    pub fn has_art(&self) -> bool {
        self.image.as_deref().is_some_and(|u| !u.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    Like,
    Dislike,
}

impl Decision {
    pub fn liked(self) -> bool {
        matches!(self, Decision::Like)
    }

    /// Positive offsets are likes, negative are dislikes.
    pub fn from_offset(offset: f32) -> Self {
        if offset >= 0.0 {
            Decision::Like
        } else {
            Decision::Dislike
        }
    }

    /// Unit direction the card leaves the screen in.
    pub fn direction(self) -> f32 {
        match self {
            Decision::Like => 1.0,
            Decision::Dislike => -1.0,
        }
    }
}

/// A committed like/dislike. Never mutated after creation; retries re-send an
/// equal value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwipeDecision {
    pub session_id: SessionId,
    pub track_id: TrackId,
    pub decision: Decision,
}

impl SwipeDecision {
    pub fn to_request(&self) -> SwipeRequest {
        SwipeRequest {
            session_id: self.session_id.clone(),
            song_index: self.track_id.clone(),
            liked: self.decision.liked(),
        }
    }
}

// ── request / response bodies ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenresResponse {
    #[serde(default)]
    pub genres: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub session_id: SessionId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartSessionRequest {
    pub genres: Vec<String>,
    pub session_id: SessionId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSessionResponse {
    #[serde(default)]
    pub songs: Vec<CandidateSong>,
    #[serde(default)]
    pub total_songs: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardMediaRequest {
    pub track_id: TrackId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwipeRequest {
    pub session_id: SessionId,
    /// The backend names this field `song_index` but expects the track id.
    pub song_index: TrackId,
    pub liked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationsRequest {
    pub session_id: SessionId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationsResponse {
    #[serde(default)]
    pub recommendations: Vec<ScoredSong>,
}

/// Body of a non-success response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub retry_after: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_accepts_backend_column_names() {
        let json = r#"{"track_id":"abc123","track_name":"Song","artists":"A;B","track_genre":"pop, rock","popularity":71}"#;
        let song: CandidateSong = serde_json::from_str(json).unwrap();
        assert_eq!(song.track_id, TrackId::from("abc123"));
        assert_eq!(song.name, "Song");
        assert_eq!(song.genre, "pop, rock");
    }

    #[test]
    fn scored_song_keeps_scores_and_ignores_extra_columns() {
        let json = r#"{"track_id":"t1","track_name":"X","artists":"Y","track_genre":"jazz",
            "energy":0.8,"popularity":55,"danceability":0.4,"loudness":-5.2,"index":"t1"}"#;
        let s: ScoredSong = serde_json::from_str(json).unwrap();
        assert_eq!(s.song.track_id.0, "t1");
        assert_eq!(s.energy, 0.8);
        assert_eq!(ScoredSong::unit_score(s.popularity), 0.55);
        assert_eq!(ScoredSong::unit_score(s.danceability), 0.4);
    }

    #[test]
    fn card_media_nulls_mean_absent() {
        let media: CardMedia =
            serde_json::from_str(r#"{"image":null,"preview_url":null}"#).unwrap();
        assert!(!media.has_art());
        assert!(!media.has_preview());
    }

    #[test]
    fn swipe_request_carries_track_id_as_song_index() {
        let decision = SwipeDecision {
            session_id: SessionId("s-1".into()),
            track_id: TrackId::from("abc123"),
            decision: Decision::Dislike,
        };
        let body = serde_json::to_value(decision.to_request()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"session_id":"s-1","song_index":"abc123","liked":false})
        );
    }

    #[test]
    fn profile_validation() {
        assert_eq!(UserProfile::new("", "a@b.c").problem(), Some("name is required"));
        assert_eq!(
            UserProfile::new("Ana", "nope").problem(),
            Some("a valid email is required")
        );
        assert_eq!(UserProfile::new(" Ana ", "ana@example.com").problem(), None);
        assert_eq!(UserProfile::new(" Ana ", "x").name, "Ana");
    }

    #[test]
    fn decision_direction_follows_offset_sign() {
        assert_eq!(Decision::from_offset(3.0), Decision::Like);
        assert_eq!(Decision::from_offset(-0.5), Decision::Dislike);
        assert!(Decision::Like.liked());
        assert_eq!(Decision::Dislike.direction(), -1.0);
    }
}
