//! Session state
//!
//! Everything the rotation policy needs to know about what has already gone
//! out on air in the current session.

use std::collections::{ HashSet, VecDeque };

use crate::config::RotationConfig;
use crate::segment::{ Category, Segment, SegmentId };


/// Sliding window of the most recently played segment ids, oldest first.
#[derive( Debug, Clone )]
pub struct PlayHistory {
    entries: VecDeque<SegmentId>,
    capacity: usize,
}


impl PlayHistory {
    /// Creates an empty history holding at most `capacity` entries.
    pub fn new( capacity: usize ) -> Self {
        Self {
            entries: VecDeque::with_capacity( capacity ),
            capacity,
        }
    }


    /// Appends an id, dropping the oldest entries past capacity.
    pub fn push( &mut self, id: SegmentId ) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back( id );
    }


    /// True if `id` is among the `window` most recent entries.
    pub fn contains_recent( &self, id: &SegmentId, window: usize ) -> bool {
        self.entries.iter().rev().take( window ).any( |e| e == id )
    }


    /// Most recent entries, newest first.
    pub fn recent( &self ) -> impl Iterator<Item = &SegmentId> {
        self.entries.iter().rev()
    }


    pub fn len( &self ) -> usize {
        self.entries.len()
    }


    pub fn is_empty( &self ) -> bool {
        self.entries.is_empty()
    }


    pub fn capacity( &self ) -> usize {
        self.capacity
    }


    /// Changes the capacity, keeping the newest entries.
    pub fn set_capacity( &mut self, capacity: usize ) {
        while self.entries.len() > capacity {
            self.entries.pop_front();
        }
        self.capacity = capacity;
    }
}


/// Per-session rotation state. Mutated only by the scheduler.
#[derive( Debug, Clone )]
pub struct SessionState {
    station: String,
    history: PlayHistory,
    /// Segments played since each category last played, indexed by priority.
    since_last: [u32; 4],
    failed: HashSet<SegmentId>,
    played: u64,
}


impl SessionState {
    /// Creates the state for a fresh session.
    ///
    /// Counters start at each category's minimum spacing, so nothing is held
    /// back at tune-in.
    pub fn new( station: impl Into<String>, config: &RotationConfig ) -> Self {
        let mut since_last = [0; 4];
        for category in Category::ALL {
            since_last[ category.priority() ] = config.rule( category ).min_spacing;
        }

        Self {
            station: station.into(),
            history: PlayHistory::new( config.history_window.max( config.no_repeat_window ) ),
            since_last,
            failed: HashSet::new(),
            played: 0,
        }
    }


    pub fn station( &self ) -> &str {
        &self.station
    }


    pub fn history( &self ) -> &PlayHistory {
        &self.history
    }


    /// Segments played since `category` last played.
    pub fn since_last( &self, category: Category ) -> u32 {
        self.since_last[ category.priority() ]
    }


    /// Total segments played this session.
    pub fn played( &self ) -> u64 {
        self.played
    }


    /// Resizes the history to cover `config`'s windows.
    pub fn resize_history( &mut self, config: &RotationConfig ) {
        self.history.set_capacity( config.history_window.max( config.no_repeat_window ) );
    }


    /// Records a segment going out on air.
    pub fn record( &mut self, segment: &Segment ) {
        self.history.push( segment.id.clone() );
        for category in Category::ALL {
            let counter = &mut self.since_last[ category.priority() ];
            if category == segment.category {
                *counter = 0;
            } else {
                *counter = counter.saturating_add( 1 );
            }
        }
        self.played += 1;
    }


    /// Marks a segment the audio driver could not play.
    pub fn mark_failed( &mut self, id: SegmentId ) {
        self.failed.insert( id );
    }


    pub fn is_failed( &self, id: &SegmentId ) -> bool {
        self.failed.contains( id )
    }


    pub fn failed_count( &self ) -> usize {
        self.failed.len()
    }
}


#[cfg( test )]
mod tests {
    use std::time::Duration;

    use super::*;


    fn seg( id: &str, category: Category ) -> Segment {
        Segment::new( id, category, Duration::from_secs( 10 ), "Night FM", id )
    }


    #[test]
    fn test_history_is_bounded() {
        let mut history = PlayHistory::new( 3 );
        for id in [ "a", "b", "c", "d", "e" ] {
            history.push( SegmentId::from( id ) );
        }
        assert_eq!( history.len(), 3 );
        let recent: Vec<_> = history.recent().map( |id| id.as_str() ).collect();
        assert_eq!( recent, vec![ "e", "d", "c" ] );
    }


    #[test]
    fn test_contains_recent_respects_window() {
        let mut history = PlayHistory::new( 10 );
        for id in [ "a", "b", "c" ] {
            history.push( SegmentId::from( id ) );
        }
        assert!( history.contains_recent( &"c".into(), 1 ) );
        assert!( !history.contains_recent( &"a".into(), 2 ) );
        assert!( history.contains_recent( &"a".into(), 3 ) );
    }


    #[test]
    fn test_counters_start_eligible() {
        let config = RotationConfig::default();
        let state = SessionState::new( "Night FM", &config );
        for category in Category::ALL {
            assert_eq!( state.since_last( category ), config.rule( category ).min_spacing );
        }
    }


    #[test]
    fn test_record_resets_and_increments() {
        let mut state = SessionState::new( "Night FM", &RotationConfig::default() );
        state.record( &seg( "j1", Category::Jingle ) );
        assert_eq!( state.since_last( Category::Jingle ), 0 );

        state.record( &seg( "s1", Category::Song ) );
        state.record( &seg( "s2", Category::Song ) );
        assert_eq!( state.since_last( Category::Jingle ), 2 );
        assert_eq!( state.since_last( Category::Song ), 0 );
        assert_eq!( state.played(), 3 );
        assert_eq!( state.history().len(), 3 );
    }


    #[test]
    fn test_history_covers_no_repeat_window() {
        let config = RotationConfig { no_repeat_window: 12, history_window: 4, ..Default::default() };
        let state = SessionState::new( "Night FM", &config );
        assert_eq!( state.history().capacity(), 12 );
    }


    #[test]
    fn test_set_capacity_keeps_newest() {
        let mut history = PlayHistory::new( 5 );
        for id in [ "a", "b", "c", "d", "e" ] {
            history.push( SegmentId::from( id ) );
        }

        history.set_capacity( 2 );
        let recent: Vec<_> = history.recent().map( |id| id.as_str() ).collect();
        assert_eq!( recent, vec![ "e", "d" ] );

        history.set_capacity( 6 );
        for id in [ "f", "g", "h", "i" ] {
            history.push( SegmentId::from( id ) );
        }
        assert_eq!( history.len(), 6 );
        assert!( history.contains_recent( &"d".into(), 6 ) );
    }


    #[test]
    fn test_resize_history_covers_new_window() {
        let small = RotationConfig { no_repeat_window: 4, history_window: 4, ..Default::default() };
        let mut state = SessionState::new( "Night FM", &small );

        let wide = RotationConfig { no_repeat_window: 40, history_window: 10, ..Default::default() };
        state.resize_history( &wide );
        assert_eq!( state.history().capacity(), 40 );
    }


    #[test]
    fn test_failed_segments() {
        let mut state = SessionState::new( "Night FM", &RotationConfig::default() );
        state.mark_failed( "s1".into() );
        assert!( state.is_failed( &"s1".into() ) );
        assert!( !state.is_failed( &"s2".into() ) );
        assert_eq!( state.failed_count(), 1 );
    }
}
