//! Playback scheduler
//!
//! Owns the session: the segment on air, the lookahead queue, the clock and
//! the notification outbox. It advances only when the host calls into it and
//! never blocks.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::catalog::{ Catalog, CatalogError };
use crate::clock::PlaybackClock;
use crate::config::{ ConfigError, RotationConfig };
use crate::rotation::RotationPolicy;
use crate::segment::{ Category, Segment, SegmentId };
use crate::session::SessionState;


/// Errors returned by scheduler operations.
#[derive( Debug, Error )]
pub enum SchedulerError {
    #[error( transparent )]
    Catalog( #[from] CatalogError ),

    #[error( transparent )]
    Config( #[from] ConfigError ),

    #[error( "Cannot {operation} while {state:?}" )]
    InvalidState { operation: &'static str, state: SchedulerState },
}


/// Lifecycle of a scheduler.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum SchedulerState {
    /// No station selected yet.
    Idle,
    Playing,
    /// The current segment has ended; the next one starts on the next tick.
    Transitioning,
    /// Terminal. Ticks are ignored.
    Stopped,
}


/// A segment committed to the schedule.
#[derive( Debug, Clone, PartialEq )]
pub struct QueueEntry {
    pub segment: Segment,
    /// Offset on the session clock at which the entry starts.
    pub start: Duration,
    /// Position inside the segment where playback begins.
    pub seek: Duration,
}


impl QueueEntry {
    /// Time this entry occupies on air.
    pub fn air_time( &self ) -> Duration {
        self.segment.duration.saturating_sub( self.seek )
    }
}


/// Why a segment left the air.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum EndReason {
    Finished,
    Skipped,
    Failed,
    Stopped,
}


/// Notifications for the audio deck and displays, in emission order.
#[derive( Debug, Clone, PartialEq )]
pub enum ScheduleEvent {
    SegmentStarted( QueueEntry ),
    SegmentEnded { id: SegmentId, reason: EndReason },
    PauseChanged { paused: bool },
}


/// Snapshot of what is on air, for display layers.
#[derive( Debug, Clone )]
pub struct NowPlaying {
    pub station: String,
    pub segment: Segment,
    pub elapsed: Duration,
    pub remaining: Duration,
    pub ratio: f64,
    pub paused: bool,
    pub transitioning: bool,
    pub upcoming: Vec<Segment>,
    pub played: u64,
}


/// The playback scheduling engine.
pub struct Scheduler {
    catalog: Arc<Catalog>,
    policy: RotationPolicy,
    rng: fastrand::Rng,
    state: SchedulerState,
    session: Option<SessionState>,
    current: Option<QueueEntry>,
    queue: VecDeque<QueueEntry>,
    clock: PlaybackClock,
    paused: bool,
    /// Unpaused time since the session started.
    session_time: Duration,
    events: Vec<ScheduleEvent>,
}


impl Scheduler {
    /// Creates an idle scheduler over a catalog.
    pub fn new( catalog: Arc<Catalog>, config: RotationConfig ) -> Result<Self, SchedulerError> {
        config.validate()?;

        let rng = match config.seed {
            Some( seed ) => fastrand::Rng::with_seed( seed ),
            None => fastrand::Rng::new(),
        };

        Ok( Self {
            catalog,
            policy: RotationPolicy::new( config ),
            rng,
            state: SchedulerState::Idle,
            session: None,
            current: None,
            queue: VecDeque::new(),
            clock: PlaybackClock::new( Duration::ZERO, Duration::ZERO ),
            paused: false,
            session_time: Duration::ZERO,
            events: Vec::new(),
        })
    }


    /// Starts a session on `station`.
    pub fn select( &mut self, station: &str ) -> Result<(), SchedulerError> {
        if self.state != SchedulerState::Idle {
            return Err( SchedulerError::InvalidState { operation: "select", state: self.state } );
        }

        self.catalog.validate( station )?;

        let session = SessionState::new( station, self.policy.config() );
        let opening = self.opening_entry( &session ).ok_or_else( || {
            CatalogError::MissingCategory { station: station.to_string(), category: Category::Song }
        })?;

        tracing::info!( "Tuned to {}", station );

        self.session = Some( session );
        self.session_time = Duration::ZERO;
        self.start_entry( opening );
        self.fill_queue();
        self.state = SchedulerState::Playing;
        self.emit_started();
        Ok(())
    }


    /// Advances the session by `delta` of host time.
    pub fn tick( &mut self, delta: Duration ) {
        match self.state {
            SchedulerState::Idle | SchedulerState::Stopped => return,
            SchedulerState::Transitioning => self.resolve(),
            SchedulerState::Playing => {}
        }

        if self.paused || self.state != SchedulerState::Playing {
            return;
        }

        let mut pending = delta;
        loop {
            let carry = self.clock.advance( pending );
            self.session_time += pending - carry;

            if !self.clock.is_expired() {
                break;
            }
            self.end_current( EndReason::Finished );
            self.resolve();
            if self.state != SchedulerState::Playing {
                break;
            }
            pending = carry;
        }
    }


    /// Ends the current segment early. The next one starts on the next tick.
    pub fn skip( &mut self ) {
        if self.state == SchedulerState::Playing {
            tracing::debug!( "Skip requested" );
            self.end_current( EndReason::Skipped );
        }
    }


    /// Ends the session. Later ticks do nothing.
    pub fn stop( &mut self ) {
        if self.state == SchedulerState::Stopped {
            return;
        }

        if self.state == SchedulerState::Playing {
            if let Some( entry ) = &self.current {
                self.events.push( ScheduleEvent::SegmentEnded {
                    id: entry.segment.id.clone(),
                    reason: EndReason::Stopped,
                });
            }
        }

        tracing::info!( "Scheduler stopped" );
        self.current = None;
        self.queue.clear();
        self.paused = false;
        self.state = SchedulerState::Stopped;
    }


    /// Freezes the clock.
    pub fn pause( &mut self ) {
        if self.state == SchedulerState::Playing && !self.paused {
            self.paused = true;
            self.events.push( ScheduleEvent::PauseChanged { paused: true } );
        }
    }


    /// Unfreezes the clock.
    pub fn resume( &mut self ) {
        if self.state == SchedulerState::Playing && self.paused {
            self.paused = false;
            self.events.push( ScheduleEvent::PauseChanged { paused: false } );
        }
    }


    pub fn toggle_pause( &mut self ) {
        if self.paused {
            self.resume();
        } else {
            self.pause();
        }
    }


    /// Called when the audio driver could not play a segment.
    ///
    /// The segment is never picked again this session. If it is on air its
    /// clock expires now and the next tick moves on.
    pub fn report_playback_error( &mut self, id: &SegmentId ) {
        if let Some( session ) = &mut self.session {
            session.mark_failed( id.clone() );
        }

        let queued = self.queue.len();
        self.queue.retain( |e| &e.segment.id != id );
        if self.queue.len() != queued {
            self.fill_queue();
        }

        let on_air = self.current.as_ref().map( |e| &e.segment.id == id ).unwrap_or( false );
        if self.state != SchedulerState::Playing || !on_air {
            tracing::debug!( "Ignoring stale playback error for '{}'", id );
            return;
        }

        tracing::warn!( "Playback failed for '{}', moving on", id );
        self.clock.force_expire();
        self.end_current( EndReason::Failed );
    }


    /// Swaps in a new rotation configuration.
    ///
    /// The next queued entry is kept; later ones are re-picked under the new
    /// rules. The session history grows or shrinks to the new windows.
    pub fn reconfigure( &mut self, config: RotationConfig ) -> Result<(), SchedulerError> {
        config.validate()?;

        if let Some( seed ) = config.seed.filter( |s| Some( *s ) != self.policy.config().seed ) {
            self.rng = fastrand::Rng::with_seed( seed );
        }
        if let Some( session ) = &mut self.session {
            session.resize_history( &config );
        }
        self.policy = RotationPolicy::new( config );

        if matches!( self.state, SchedulerState::Playing | SchedulerState::Transitioning ) {
            self.queue.truncate( 1 );
            self.fill_queue();
            tracing::info!( "Rotation reconfigured, {} entries re-queued", self.queue.len().saturating_sub( 1 ) );
        }
        Ok(())
    }


    pub fn state( &self ) -> SchedulerState {
        self.state
    }


    pub fn config( &self ) -> &RotationConfig {
        self.policy.config()
    }


    pub fn catalog( &self ) -> &Arc<Catalog> {
        &self.catalog
    }


    /// Entry on air (or just ended, while transitioning).
    pub fn current( &self ) -> Option<&QueueEntry> {
        self.current.as_ref()
    }


    /// Entries queued after the current one, in play order.
    pub fn upcoming( &self ) -> impl Iterator<Item = &QueueEntry> {
        self.queue.iter()
    }


    pub fn remaining( &self ) -> Duration {
        self.clock.remaining()
    }


    pub fn elapsed( &self ) -> Duration {
        self.clock.elapsed()
    }


    pub fn elapsed_ratio( &self ) -> f64 {
        self.clock.elapsed_ratio()
    }


    pub fn is_paused( &self ) -> bool {
        self.paused
    }


    pub fn session( &self ) -> Option<&SessionState> {
        self.session.as_ref()
    }


    /// Unpaused time since the session started.
    pub fn session_time( &self ) -> Duration {
        self.session_time
    }


    /// Snapshot for displays. `None` unless a segment is on air.
    pub fn now_playing( &self ) -> Option<NowPlaying> {
        let entry = self.current.as_ref()?;
        let session = self.session.as_ref()?;

        Some( NowPlaying {
            station: session.station().to_string(),
            segment: entry.segment.clone(),
            elapsed: self.clock.elapsed(),
            remaining: self.clock.remaining(),
            ratio: self.clock.elapsed_ratio(),
            paused: self.paused,
            transitioning: self.state == SchedulerState::Transitioning,
            upcoming: self.queue.iter().map( |e| e.segment.clone() ).collect(),
            played: session.played(),
        })
    }


    /// Takes all pending notifications.
    pub fn drain_events( &mut self ) -> Vec<ScheduleEvent> {
        std::mem::take( &mut self.events )
    }


    fn end_current( &mut self, reason: EndReason ) {
        if let Some( entry ) = &self.current {
            self.events.push( ScheduleEvent::SegmentEnded {
                id: entry.segment.id.clone(),
                reason,
            });
        }
        self.state = SchedulerState::Transitioning;
    }


    /// Transitioning → Playing.
    fn resolve( &mut self ) {
        if let ( Some( finished ), Some( session ) ) = ( self.current.take(), self.session.as_mut() ) {
            session.record( &finished.segment );
        }

        if self.paused {
            self.paused = false;
            self.events.push( ScheduleEvent::PauseChanged { paused: false } );
        }

        if self.queue.is_empty() {
            self.fill_queue();
        }

        let Some( next ) = self.queue.pop_front() else {
            tracing::error!( "Nothing left to schedule" );
            self.stop();
            return;
        };

        self.start_entry( next );
        self.fill_queue();
        self.state = SchedulerState::Playing;
        self.emit_started();
    }


    fn start_entry( &mut self, mut entry: QueueEntry ) {
        entry.start = self.session_time;
        self.clock = PlaybackClock::new( entry.segment.duration, entry.seek );
        tracing::info!( "On air: [{}] {}", entry.segment.category.label(), entry.segment.display_name() );
        self.current = Some( entry );
    }


    fn emit_started( &mut self ) {
        if let Some( entry ) = &self.current {
            self.events.push( ScheduleEvent::SegmentStarted( entry.clone() ) );
        }
    }


    /// Tops the queue up to the lookahead depth and refreshes start offsets.
    fn fill_queue( &mut self ) {
        let lookahead = self.policy.config().lookahead;

        while self.queue.len() < lookahead {
            let Some( projected ) = self.projected_session() else {
                break;
            };
            let Some( segment ) = self.pick( &projected, None ) else {
                break;
            };
            self.queue.push_back( QueueEntry { segment, start: Duration::ZERO, seek: Duration::ZERO } );
        }

        let mut next_start = match &self.current {
            Some( entry ) => entry.start + entry.air_time(),
            None => self.session_time,
        };
        for entry in self.queue.iter_mut() {
            entry.start = next_start;
            next_start += entry.air_time();
        }
    }


    /// Session state as it will be once everything already scheduled has aired.
    fn projected_session( &self ) -> Option<SessionState> {
        let mut projected = self.session.clone()?;
        if let Some( entry ) = &self.current {
            projected.record( &entry.segment );
        }
        for entry in &self.queue {
            projected.record( &entry.segment );
        }
        Some( projected )
    }


    /// Runs the policy, falling back to a relaxed pick on any rotation error.
    fn pick( &mut self, state: &SessionState, forced: Option<Category> ) -> Option<Segment> {
        let picked = match forced {
            Some( category ) => self.policy.pick_from( category, &self.catalog, state, &mut self.rng ),
            None => self.policy.pick( &self.catalog, state, &mut self.rng ),
        };

        match picked {
            Ok( segment ) => Some( segment ),
            Err( e ) => {
                tracing::warn!( "Rotation pick failed ({}), using a relaxed pick", e );
                match self.policy.pick_relaxed( &self.catalog, state, &mut self.rng ) {
                    Ok( segment ) => Some( segment ),
                    Err( e ) => {
                        tracing::error!( "Relaxed pick failed: {}", e );
                        None
                    }
                }
            }
        }
    }


    /// First entry of a session: a jingle, a song entered part-way, or a
    /// regular pick.
    fn opening_entry( &mut self, session: &SessionState ) -> Option<QueueEntry> {
        let carried = self.catalog.all_categories( session.station() );
        let config = self.policy.config();

        let ( forced, tune_in ) = if config.start_with_jingle && carried.contains( &Category::Jingle ) {
            ( Some( Category::Jingle ), false )
        } else if config.tune_in {
            ( Some( Category::Song ), true )
        } else {
            ( None, false )
        };

        let segment = self.pick( session, forced )?;
        let seek = if tune_in && segment.category == Category::Song {
            segment.duration.mul_f64( tune_in_fraction( &mut self.rng ) )
        } else {
            Duration::ZERO
        };

        Some( QueueEntry { segment, start: Duration::ZERO, seek } )
    }
}


/// Where to enter a song at tune-in: the start, or roughly a third, two thirds
/// or nine tenths of the way through.
fn tune_in_fraction( rng: &mut fastrand::Rng ) -> f64 {
    let percent = match rng.usize( ..4 ) {
        0 => 0,
        1 => rng.u32( 25..=35 ),
        2 => rng.u32( 55..=66 ),
        _ => rng.u32( 85..=90 ),
    };
    f64::from( percent ) / 100.0
}


#[cfg( test )]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::catalog::StationProfile;
    use crate::config::CategoryRule;


    const STATION: &str = "92.9 Night FM";


    fn catalog_with( jingles: usize ) -> Arc<Catalog> {
        let mut builder = Catalog::builder();
        builder.add_station( StationProfile::new( STATION ) );
        for i in 0..10 {
            let id = format!( "s{}", i );
            builder.add_segment( Segment::new( id.as_str(), Category::Song, Duration::from_secs( 60 ), STATION, id.as_str() ) ).unwrap();
        }
        for i in 0..jingles {
            let id = format!( "j{}", i );
            builder.add_segment( Segment::new( id.as_str(), Category::Jingle, Duration::from_secs( 10 ), STATION, id.as_str() ) ).unwrap();
        }
        for i in 0..3 {
            let id = format!( "a{}", i );
            builder.add_shared_advert( Segment::new( id.as_str(), Category::Advert, Duration::from_secs( 30 ), "", id.as_str() ) ).unwrap();
        }
        Arc::new( builder.build() )
    }


    fn config() -> RotationConfig {
        RotationConfig { seed: Some( 2077 ), tune_in: false, ..Default::default() }
    }


    fn playing() -> Scheduler {
        let mut scheduler = Scheduler::new( catalog_with( 3 ), config() ).unwrap();
        scheduler.select( STATION ).unwrap();
        scheduler.drain_events();
        scheduler
    }


    fn started( events: &[ScheduleEvent] ) -> usize {
        events.iter().filter( |e| matches!( e, ScheduleEvent::SegmentStarted( _ ) ) ).count()
    }


    #[test]
    fn test_select_starts_playing() {
        let mut scheduler = Scheduler::new( catalog_with( 3 ), config() ).unwrap();
        assert_eq!( scheduler.state(), SchedulerState::Idle );

        scheduler.select( STATION ).unwrap();
        assert_eq!( scheduler.state(), SchedulerState::Playing );
        assert_eq!( scheduler.upcoming().count(), 2 );

        let events = scheduler.drain_events();
        assert_eq!( events.len(), 1 );
        assert!( matches!( &events[ 0 ], ScheduleEvent::SegmentStarted( entry ) if entry.start == Duration::ZERO ) );
    }


    #[test]
    fn test_select_twice_is_invalid() {
        let mut scheduler = playing();
        assert!( matches!(
            scheduler.select( STATION ),
            Err( SchedulerError::InvalidState { operation: "select", state: SchedulerState::Playing } )
        ));
    }


    #[test]
    fn test_missing_jingles_keeps_idle() {
        let mut scheduler = Scheduler::new( catalog_with( 0 ), config() ).unwrap();
        let err = scheduler.select( STATION ).unwrap_err();
        assert!( matches!( err, SchedulerError::Catalog( CatalogError::MissingCategory { category: Category::Jingle, .. } ) ) );
        assert_eq!( scheduler.state(), SchedulerState::Idle );
        assert!( scheduler.drain_events().is_empty() );
    }


    #[test]
    fn test_invalid_config_rejected() {
        let bad = RotationConfig { lookahead: 0, ..config() };
        assert!( matches!( Scheduler::new( catalog_with( 3 ), bad ), Err( SchedulerError::Config( ConfigError::ZeroLookahead ) ) ) );

        let mut scheduler = playing();
        let bad = RotationConfig { lookahead: 0, ..config() };
        assert!( scheduler.reconfigure( bad ).is_err() );
        assert_eq!( scheduler.config().lookahead, 2 );
    }


    #[test]
    fn test_natural_expiry_carries_overshoot() {
        let mut scheduler = playing();
        let first = scheduler.current().unwrap().segment.clone();
        let overshoot = Duration::from_millis( 1500 );

        scheduler.tick( first.duration + overshoot );

        let events = scheduler.drain_events();
        assert!( matches!(
            &events[ 0 ],
            ScheduleEvent::SegmentEnded { id, reason: EndReason::Finished } if *id == first.id
        ));
        assert!( started( &events ) >= 1 );
        assert_eq!( scheduler.state(), SchedulerState::Playing );
        assert_eq!( scheduler.elapsed(), overshoot );
        assert_eq!( scheduler.current().unwrap().start, first.duration );
    }


    #[test]
    fn test_skip_twice_advances_once() {
        let mut scheduler = playing();
        let first = scheduler.current().unwrap().segment.id.clone();
        let next = scheduler.upcoming().next().unwrap().segment.id.clone();

        scheduler.skip();
        scheduler.skip();
        assert_eq!( scheduler.state(), SchedulerState::Transitioning );

        scheduler.tick( Duration::ZERO );
        let events = scheduler.drain_events();
        assert_eq!( events.len(), 2 );
        assert!( matches!( &events[ 0 ], ScheduleEvent::SegmentEnded { id, reason: EndReason::Skipped } if *id == first ) );
        assert!( matches!( &events[ 1 ], ScheduleEvent::SegmentStarted( entry ) if entry.segment.id == next ) );
        assert_eq!( scheduler.session().unwrap().played(), 1 );
    }


    #[test]
    fn test_skip_resolves_before_time_advance() {
        let mut scheduler = playing();
        scheduler.skip();
        scheduler.tick( Duration::from_secs( 5 ) );
        assert_eq!( scheduler.state(), SchedulerState::Playing );
        assert_eq!( scheduler.elapsed(), Duration::from_secs( 5 ) );
    }


    #[test]
    fn test_stop_then_tick_is_silent() {
        let mut scheduler = playing();
        scheduler.stop();
        assert_eq!( scheduler.state(), SchedulerState::Stopped );

        let events = scheduler.drain_events();
        assert!( matches!( &events[ .. ], [ ScheduleEvent::SegmentEnded { reason: EndReason::Stopped, .. } ] ) );

        scheduler.tick( Duration::from_secs( 600 ) );
        scheduler.skip();
        assert!( scheduler.drain_events().is_empty() );
        assert!( scheduler.now_playing().is_none() );
    }


    #[test]
    fn test_idle_tick_is_noop() {
        let mut scheduler = Scheduler::new( catalog_with( 3 ), config() ).unwrap();
        scheduler.tick( Duration::from_secs( 1 ) );
        scheduler.skip();
        assert_eq!( scheduler.state(), SchedulerState::Idle );
        assert!( scheduler.drain_events().is_empty() );
    }


    #[test]
    fn test_lookahead_never_drains() {
        let mut scheduler = playing();
        let mut rng = fastrand::Rng::with_seed( 1 );
        for _ in 0..500 {
            if rng.usize( ..5 ) == 0 {
                scheduler.skip();
                assert!( scheduler.upcoming().count() >= 1 );
            }
            scheduler.tick( Duration::from_secs( rng.u64( 1..40 ) ) );
            assert!( scheduler.upcoming().count() >= 1 );
        }
    }


    #[test]
    fn test_queued_picks_keep_spacing() {
        let rotation = RotationConfig {
            jingle: CategoryRule::new( 3, 0.3 ),
            advert: CategoryRule::new( 4, 0.3 ),
            lookahead: 4,
            ..config()
        };
        let mut scheduler = Scheduler::new( catalog_with( 3 ), rotation.clone() ).unwrap();
        scheduler.select( STATION ).unwrap();

        let mut aired = Vec::new();
        for _ in 0..400 {
            scheduler.tick( Duration::from_secs( 20 ) );
            for event in scheduler.drain_events() {
                if let ScheduleEvent::SegmentStarted( entry ) = event {
                    aired.push( entry.segment.category );
                }
            }
        }

        let mut last: HashMap<Category, usize> = HashMap::new();
        for ( pos, category ) in aired.iter().enumerate() {
            if let Some( prev ) = last.insert( *category, pos ) {
                assert!( pos - prev > rotation.rule( *category ).min_spacing as usize );
            }
        }
    }


    #[test]
    fn test_pause_freezes_clock() {
        let mut scheduler = playing();
        scheduler.tick( Duration::from_secs( 2 ) );
        scheduler.pause();
        scheduler.tick( Duration::from_secs( 30 ) );
        assert_eq!( scheduler.elapsed(), Duration::from_secs( 2 ) );

        scheduler.resume();
        scheduler.tick( Duration::from_secs( 1 ) );
        assert_eq!( scheduler.elapsed(), Duration::from_secs( 3 ) );

        let events = scheduler.drain_events();
        assert_eq!( events, vec![
            ScheduleEvent::PauseChanged { paused: true },
            ScheduleEvent::PauseChanged { paused: false },
        ]);
    }


    #[test]
    fn test_playback_error_marks_failed() {
        let mut scheduler = playing();
        let bad = scheduler.current().unwrap().segment.id.clone();

        scheduler.report_playback_error( &bad );
        assert_eq!( scheduler.state(), SchedulerState::Transitioning );
        assert_eq!( scheduler.remaining(), Duration::ZERO );
        assert!( scheduler.session().unwrap().is_failed( &bad ) );

        let events = scheduler.drain_events();
        assert!( matches!( &events[ .. ], [ ScheduleEvent::SegmentEnded { reason: EndReason::Failed, .. } ] ) );

        for _ in 0..300 {
            scheduler.tick( Duration::from_secs( 15 ) );
        }
        let replayed = scheduler.drain_events().into_iter().any( |e| {
            matches!( e, ScheduleEvent::SegmentStarted( entry ) if entry.segment.id == bad )
        });
        assert!( !replayed );
    }


    #[test]
    fn test_stale_playback_error_is_ignored() {
        let mut scheduler = playing();
        scheduler.report_playback_error( &SegmentId::from( "not-on-air" ) );
        assert_eq!( scheduler.state(), SchedulerState::Playing );
        assert!( scheduler.drain_events().is_empty() );
    }


    #[test]
    fn test_reconfigure_keeps_head() {
        let mut scheduler = playing();
        let head = scheduler.upcoming().next().unwrap().segment.id.clone();

        let wider = RotationConfig { lookahead: 5, ..config() };
        scheduler.reconfigure( wider ).unwrap();

        assert_eq!( scheduler.upcoming().count(), 5 );
        assert_eq!( scheduler.upcoming().next().unwrap().segment.id, head );

        let narrower = RotationConfig { lookahead: 1, ..config() };
        scheduler.reconfigure( narrower ).unwrap();
        assert_eq!( scheduler.upcoming().count(), 1 );
        assert_eq!( scheduler.upcoming().next().unwrap().segment.id, head );
    }


    #[test]
    fn test_widened_window_holds_after_reconfigure() {
        let mut builder = Catalog::builder();
        builder.add_station( StationProfile::new( STATION ).without_ads().without_jingles() );
        for i in 0..50 {
            let id = format!( "s{}", i );
            builder.add_segment( Segment::new( id.as_str(), Category::Song, Duration::from_secs( 10 ), STATION, id.as_str() ) ).unwrap();
        }
        let catalog = Arc::new( builder.build() );

        let narrow = RotationConfig { no_repeat_window: 4, history_window: 4, ..config() };
        let mut scheduler = Scheduler::new( catalog, narrow ).unwrap();
        scheduler.select( STATION ).unwrap();

        let wide = RotationConfig { no_repeat_window: 40, history_window: 40, ..config() };
        scheduler.reconfigure( wide ).unwrap();
        assert_eq!( scheduler.session().unwrap().history().capacity(), 40 );
        scheduler.drain_events();

        let mut aired = Vec::new();
        for _ in 0..300 {
            scheduler.tick( Duration::from_secs( 10 ) );
            for event in scheduler.drain_events() {
                if let ScheduleEvent::SegmentStarted( entry ) = event {
                    aired.push( entry.segment.id );
                }
            }
        }

        // Picks made under the old window are the queue head only
        let settled = &aired[ 2.. ];
        assert!( settled.len() > 250 );
        let repeats = settled.windows( 40 )
            .filter( |w| w.iter().collect::<std::collections::HashSet<_>>().len() != w.len() )
            .count();
        assert_eq!( repeats, 0 );
    }


    #[test]
    fn test_queue_start_offsets_follow_air_time() {
        let scheduler = playing();
        let current = scheduler.current().unwrap();
        let mut expected = current.start + current.air_time();
        for entry in scheduler.upcoming() {
            assert_eq!( entry.start, expected );
            expected += entry.air_time();
        }
    }


    #[test]
    fn test_start_with_jingle() {
        let rotation = RotationConfig { start_with_jingle: true, ..config() };
        let mut scheduler = Scheduler::new( catalog_with( 3 ), rotation ).unwrap();
        scheduler.select( STATION ).unwrap();
        assert_eq!( scheduler.current().unwrap().segment.category, Category::Jingle );
        assert_eq!( scheduler.current().unwrap().seek, Duration::ZERO );
    }


    #[test]
    fn test_tune_in_enters_song_part_way() {
        for seed in 0..20 {
            let rotation = RotationConfig { tune_in: true, seed: Some( seed ), ..Default::default() };
            let mut scheduler = Scheduler::new( catalog_with( 3 ), rotation ).unwrap();
            scheduler.select( STATION ).unwrap();

            let entry = scheduler.current().unwrap();
            assert_eq!( entry.segment.category, Category::Song );
            assert!( entry.seek <= entry.segment.duration.mul_f64( 0.9 ) );
            assert_eq!( scheduler.elapsed(), entry.seek );
        }
    }


    #[test]
    fn test_now_playing_snapshot() {
        let mut scheduler = playing();
        scheduler.tick( Duration::from_secs( 6 ) );
        let now = scheduler.now_playing().unwrap();
        assert_eq!( now.station, STATION );
        assert_eq!( now.elapsed, Duration::from_secs( 6 ) );
        assert_eq!( now.upcoming.len(), 2 );
        assert!( !now.paused );
        assert!( now.ratio > 0.0 && now.ratio < 1.0 );
    }
}
