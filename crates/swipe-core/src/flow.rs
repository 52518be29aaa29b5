use serde::Serialize;
use tracing::{info, warn};

use crate::client::ApiError;
use crate::protocol::{
    CandidateSong, Decision, ScoredSong, SessionId, StartSessionRequest, SwipeDecision,
    UserProfile,
};

/// The five application steps, in normal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Step {
    Registration,
    GenreSelection,
    Swiping,
    Loading,
    Recommendations,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FlowError {
    #[error("not available on the {0:?} step")]
    WrongStep(Step),
    #[error("still waiting for the previous request")]
    Busy,
    #[error("pick at least one genre")]
    NoGenres,
    #[error("pick at most {max} genres")]
    TooManyGenres { max: usize },
    #[error("{0}")]
    InvalidProfile(&'static str),
    #[error("not registered")]
    NoSession,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: SessionId,
    pub profile: UserProfile,
}

/// Songs fetched for one swipe run. Only the cursor moves, and only forward.
#[derive(Debug, Clone, PartialEq)]
pub struct SongQueue {
    songs: Vec<CandidateSong>,
    cursor: usize,
}

impl SongQueue {
    pub fn new(songs: Vec<CandidateSong>) -> Self {
        Self { songs, cursor: 0 }
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current(&self) -> Option<&CandidateSong> {
        self.songs.get(self.cursor)
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.songs.len()
    }

    fn advance(&mut self) {
        if !self.is_exhausted() {
            self.cursor += 1;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// The card at this queue position is now active.
    Next(usize),
    Exhausted,
}

/// Top-level step machine. Step-changing backend calls are split into a
/// `begin_*` that validates and marks the call in flight, and an `on_*` that
/// applies the outcome.
#[derive(Debug)]
pub struct FlowController {
    step: Step,
    session: Option<Session>,
    queue: Option<SongQueue>,
    recommendations: Vec<ScoredSong>,
    pending: bool,
    pending_profile: Option<UserProfile>,
    liked: usize,
    max_genres: usize,
}

impl FlowController {
    pub fn new(max_genres: usize) -> Self {
        Self {
            step: Step::Registration,
            session: None,
            queue: None,
            recommendations: Vec::new(),
            pending: false,
            pending_profile: None,
            liked: 0,
            max_genres: max_genres.max(1),
        }
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn queue(&self) -> Option<&SongQueue> {
        self.queue.as_ref()
    }

    pub fn recommendations(&self) -> &[ScoredSong] {
        &self.recommendations
    }

    pub fn is_busy(&self) -> bool {
        self.pending
    }

    pub fn liked(&self) -> usize {
        self.liked
    }

    pub fn max_genres(&self) -> usize {
        self.max_genres
    }

    /// Queue position of the active card and the queue length.
    pub fn position(&self) -> Option<(usize, usize)> {
        self.queue.as_ref().map(|q| (q.cursor(), q.len()))
    }

    pub fn current(&self) -> Option<(usize, &CandidateSong)> {
        if self.step != Step::Swiping {
            return None;
        }
        let queue = self.queue.as_ref()?;
        queue.current().map(|song| (queue.cursor(), song))
    }

    fn expect_step(&self, step: Step) -> Result<(), FlowError> {
        if self.step != step {
            return Err(FlowError::WrongStep(self.step));
        }
        if self.pending {
            return Err(FlowError::Busy);
        }
        Ok(())
    }

    pub fn begin_register(&mut self, profile: UserProfile) -> Result<UserProfile, FlowError> {
        self.expect_step(Step::Registration)?;
        if let Some(problem) = profile.problem() {
            return Err(FlowError::InvalidProfile(problem));
        }
        self.pending = true;
        self.pending_profile = Some(profile.clone());
        Ok(profile)
    }

    pub fn on_registered(&mut self, result: Result<SessionId, ApiError>) -> Result<(), ApiError> {
        self.pending = false;
        let profile = self.pending_profile.take();
        if self.step != Step::Registration {
            return Ok(());
        }
        let id = result?;
        info!("flow: registered, session {}", id);
        self.session = Some(Session {
            id,
            profile: profile.unwrap_or_default(),
        });
        self.step = Step::GenreSelection;
        Ok(())
    }

    pub fn begin_genres(&mut self, genres: &[String]) -> Result<StartSessionRequest, FlowError> {
        self.expect_step(Step::GenreSelection)?;
        if genres.is_empty() {
            return Err(FlowError::NoGenres);
        }
        if genres.len() > self.max_genres {
            return Err(FlowError::TooManyGenres {
                max: self.max_genres,
            });
        }
        let session = self.session.as_ref().ok_or(FlowError::NoSession)?;
        self.pending = true;
        Ok(StartSessionRequest {
            genres: genres.to_vec(),
            session_id: session.id.clone(),
        })
    }

    pub fn on_session_started(
        &mut self,
        result: Result<Vec<CandidateSong>, ApiError>,
    ) -> Result<(), ApiError> {
        self.pending = false;
        if self.step != Step::GenreSelection {
            return Ok(());
        }
        let songs = result?;
        if songs.is_empty() {
            return Err(ApiError::Empty { what: "songs" });
        }
        info!("flow: swiping through {} songs", songs.len());
        self.queue = Some(SongQueue::new(songs));
        self.recommendations.clear();
        self.liked = 0;
        self.step = Step::Swiping;
        Ok(())
    }

    /// Build the decision record for the active card.
    pub fn decision_for(&self, decision: Decision) -> Result<SwipeDecision, FlowError> {
        if self.step != Step::Swiping {
            return Err(FlowError::WrongStep(self.step));
        }
        let session = self.session.as_ref().ok_or(FlowError::NoSession)?;
        let (_, song) = self.current().ok_or(FlowError::WrongStep(self.step))?;
        Ok(SwipeDecision {
            session_id: session.id.clone(),
            track_id: song.track_id.clone(),
            decision,
        })
    }

    /// Record a committed decision and move the cursor by one. Entering
    /// Loading happens here and only here.
    pub fn advance(&mut self, decision: &SwipeDecision) -> Result<Advance, FlowError> {
        if self.step != Step::Swiping {
            return Err(FlowError::WrongStep(self.step));
        }
        let queue = self.queue.as_mut().ok_or(FlowError::WrongStep(self.step))?;
        if decision.decision.liked() {
            self.liked += 1;
        }
        queue.advance();
        if queue.is_exhausted() {
            info!("flow: queue exhausted, {} liked", self.liked);
            self.step = Step::Loading;
            Ok(Advance::Exhausted)
        } else {
            Ok(Advance::Next(queue.cursor()))
        }
    }

    pub fn begin_recommendations(&mut self) -> Result<SessionId, FlowError> {
        self.expect_step(Step::Loading)?;
        let session = self.session.as_ref().ok_or(FlowError::NoSession)?;
        self.pending = true;
        Ok(session.id.clone())
    }

    /// An empty list is a failure. Any failure forces a return to genre
    /// selection with the session kept.
    pub fn on_recommendations(
        &mut self,
        result: Result<Vec<ScoredSong>, ApiError>,
    ) -> Result<(), ApiError> {
        self.pending = false;
        if self.step != Step::Loading {
            return Ok(());
        }
        let outcome = result.and_then(|list| {
            if list.is_empty() {
                Err(ApiError::Empty {
                    what: "recommendations",
                })
            } else {
                Ok(list)
            }
        });
        match outcome {
            Ok(list) => {
                info!("flow: {} recommendations", list.len());
                self.recommendations = list;
                self.step = Step::Recommendations;
                Ok(())
            }
            Err(e) => {
                warn!("flow: recommendations failed ({}), back to genres", e);
                self.clear_run();
                Err(e)
            }
        }
    }

    pub fn restart(&mut self) -> Result<(), FlowError> {
        self.expect_step(Step::Recommendations)?;
        info!("flow: restart");
        self.clear_run();
        Ok(())
    }

    fn clear_run(&mut self) {
        self.queue = None;
        self.recommendations.clear();
        self.liked = 0;
        self.step = Step::GenreSelection;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::TrackId;

    fn songs(n: usize) -> Vec<CandidateSong> {
        (0..n)
            .map(|i| CandidateSong {
                track_id: TrackId(format!("t{}", i)),
                name: format!("Song {}", i),
                artists: "Artist".into(),
                genre: "pop".into(),
            })
            .collect()
    }

    fn scored(n: usize) -> Vec<ScoredSong> {
        songs(n)
            .into_iter()
            .map(|song| ScoredSong {
                song,
                energy: 0.5,
                popularity: 60.0,
                danceability: 0.7,
            })
            .collect()
    }

    fn registered() -> FlowController {
        let mut flow = FlowController::new(5);
        flow.begin_register(UserProfile::new("Ana", "ana@example.com"))
            .unwrap();
        flow.on_registered(Ok(SessionId("s-1".into()))).unwrap();
        flow
    }

    fn swiping(n: usize) -> FlowController {
        let mut flow = registered();
        flow.begin_genres(&["pop".into(), "rock".into()]).unwrap();
        flow.on_session_started(Ok(songs(n))).unwrap();
        flow
    }

    fn commit(flow: &mut FlowController, decision: Decision) -> Advance {
        let d = flow.decision_for(decision).unwrap();
        flow.advance(&d).unwrap()
    }

    #[test]
    fn registration_failure_keeps_step() {
        let mut flow = FlowController::new(5);
        assert_eq!(
            flow.begin_register(UserProfile::new("", "x@y")),
            Err(FlowError::InvalidProfile("name is required"))
        );
        flow.begin_register(UserProfile::new("Ana", "ana@example.com"))
            .unwrap();
        assert_eq!(
            flow.begin_register(UserProfile::new("Ana", "ana@example.com")),
            Err(FlowError::Busy)
        );
        let err = flow
            .on_registered(Err(ApiError::Transport("refused".into())))
            .unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
        assert_eq!(flow.step(), Step::Registration);
        assert!(!flow.is_busy());
        assert!(flow.session().is_none());
    }

    #[test]
    fn genre_submission_bounds() {
        let mut flow = registered();
        assert_eq!(flow.step(), Step::GenreSelection);
        assert_eq!(flow.begin_genres(&[]), Err(FlowError::NoGenres));
        let six: Vec<String> = (0..6).map(|i| format!("g{}", i)).collect();
        assert_eq!(
            flow.begin_genres(&six),
            Err(FlowError::TooManyGenres { max: 5 })
        );
        let req = flow.begin_genres(&six[..5]).unwrap();
        assert_eq!(req.session_id, SessionId("s-1".into()));
        assert_eq!(req.genres.len(), 5);
    }

    #[test]
    fn empty_song_list_keeps_genre_selection() {
        let mut flow = registered();
        flow.begin_genres(&["pop".into()]).unwrap();
        let err = flow.on_session_started(Ok(vec![])).unwrap_err();
        assert_eq!(err, ApiError::Empty { what: "songs" });
        assert_eq!(flow.step(), Step::GenreSelection);
        assert!(flow.queue().is_none());
    }

    #[test]
    fn loading_entered_exactly_once_after_last_commit() {
        for pattern in [0u32, 0b1010, 0b1111, 0b0110] {
            let mut flow = swiping(4);
            let mut entered = 0;
            for i in 0..4 {
                assert_eq!(flow.step(), Step::Swiping);
                let decision = if pattern & (1 << i) != 0 {
                    Decision::Like
                } else {
                    Decision::Dislike
                };
                if commit(&mut flow, decision) == Advance::Exhausted {
                    entered += 1;
                }
            }
            assert_eq!(entered, 1);
            assert_eq!(flow.step(), Step::Loading);
            assert_eq!(flow.liked(), pattern.count_ones() as usize);
            assert_eq!(flow.position(), Some((4, 4)));
            assert!(flow.decision_for(Decision::Like).is_err());
        }
    }

    #[test]
    fn next_card_is_active_immediately() {
        let mut flow = swiping(3);
        assert_eq!(commit(&mut flow, Decision::Like), Advance::Next(1));
        let (pos, song) = flow.current().unwrap();
        assert_eq!(pos, 1);
        assert_eq!(song.track_id.0, "t1");
    }

    #[test]
    fn empty_recommendations_equal_failure() {
        let run = |result: Result<Vec<ScoredSong>, ApiError>| {
            let mut flow = swiping(1);
            commit(&mut flow, Decision::Like);
            flow.begin_recommendations().unwrap();
            assert!(flow.on_recommendations(result).is_err());
            flow
        };
        let empty = run(Ok(vec![]));
        let failed = run(Err(ApiError::Status {
            status: 500,
            message: "boom".into(),
        }));
        for flow in [empty, failed] {
            assert_eq!(flow.step(), Step::GenreSelection);
            assert!(flow.queue().is_none());
            assert!(flow.recommendations().is_empty());
            assert_eq!(flow.session().unwrap().id, SessionId("s-1".into()));
        }
    }

    #[test]
    fn restart_keeps_session_and_clears_run() {
        let mut flow = swiping(2);
        commit(&mut flow, Decision::Like);
        commit(&mut flow, Decision::Dislike);
        assert_eq!(flow.restart(), Err(FlowError::WrongStep(Step::Loading)));
        flow.begin_recommendations().unwrap();
        flow.on_recommendations(Ok(scored(3))).unwrap();
        assert_eq!(flow.step(), Step::Recommendations);
        assert_eq!(flow.recommendations()[2].song.track_id.0, "t2");

        flow.restart().unwrap();
        assert_eq!(flow.step(), Step::GenreSelection);
        assert_eq!(flow.session().unwrap().profile.name, "Ana");
        assert!(flow.queue().is_none());
        assert!(flow.position().is_none());
        assert!(flow.recommendations().is_empty());
    }
}
