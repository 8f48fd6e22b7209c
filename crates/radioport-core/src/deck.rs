//! Audio deck
//!
//! The contract an audio driver fulfils, and the adapter that turns scheduler
//! notifications into driver calls. Driver failures flow back as segment ids
//! for [`Scheduler::report_playback_error`](crate::scheduler::Scheduler::report_playback_error).

use std::time::Duration;

use thiserror::Error;

use crate::scheduler::ScheduleEvent;
use crate::segment::{ Segment, SegmentId };


/// Errors a driver can raise when starting a segment.
#[derive( Debug, Error )]
pub enum SinkError {
    #[error( "Segment '{0}' has no audio file" )]
    NoSource( SegmentId ),

    #[error( "Failed to open file: {0}" )]
    Open( String ),

    #[error( "Decode error: {0}" )]
    Decode( String ),

    #[error( "Audio output error: {0}" )]
    Output( String ),
}


/// Opaque id of one playback started by a sink.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Hash )]
pub struct PlaybackHandle( pub u64 );


/// Terminal status of a playback, as seen by the driver.
#[derive( Debug, Clone, PartialEq, Eq )]
pub enum SinkStatus {
    /// The audio ran out.
    Finished,
    /// Decoding or output broke part-way.
    Failed( String ),
}


/// An audio driver.
pub trait SegmentSink {
    /// Starts playing `segment` from `seek`.
    fn play( &mut self, segment: &Segment, seek: Duration ) -> Result<PlaybackHandle, SinkError>;

    /// Stops a playback. Unknown handles are ignored.
    fn stop( &mut self, handle: PlaybackHandle );

    fn set_paused( &mut self, handle: PlaybackHandle, paused: bool );

    /// Returns the final status once a playback has ended on its own.
    fn poll_finished( &mut self, handle: PlaybackHandle ) -> Option<SinkStatus>;
}


/// Routes scheduler events to a [`SegmentSink`].
pub struct Deck<S: SegmentSink> {
    sink: S,
    active: Option<( SegmentId, PlaybackHandle )>,
}


impl<S: SegmentSink> Deck<S> {
    pub fn new( sink: S ) -> Self {
        Self { sink, active: None }
    }


    pub fn sink( &self ) -> &S {
        &self.sink
    }


    pub fn sink_mut( &mut self ) -> &mut S {
        &mut self.sink
    }


    /// Id of the segment the sink is currently playing.
    pub fn active( &self ) -> Option<&SegmentId> {
        self.active.as_ref().map( |( id, _ )| id )
    }


    /// Applies events in order. Returns ids of segments the sink refused.
    pub fn apply( &mut self, events: &[ScheduleEvent] ) -> Vec<SegmentId> {
        let mut failed = Vec::new();

        for event in events {
            match event {
                ScheduleEvent::SegmentStarted( entry ) => {
                    self.halt();
                    match self.sink.play( &entry.segment, entry.seek ) {
                        Ok( handle ) => {
                            self.active = Some( ( entry.segment.id.clone(), handle ) );
                        }
                        Err( e ) => {
                            tracing::warn!( "Cannot play '{}': {}", entry.segment.id, e );
                            failed.push( entry.segment.id.clone() );
                        }
                    }
                }
                ScheduleEvent::SegmentEnded { id, .. } => {
                    if self.active().map( |a| a == id ).unwrap_or( false ) {
                        self.halt();
                    }
                }
                ScheduleEvent::PauseChanged { paused } => {
                    if let Some( ( _, handle ) ) = self.active {
                        self.sink.set_paused( handle, *paused );
                    }
                }
            }
        }

        failed
    }


    /// Checks the active playback. Returns its id if the sink failed mid-way.
    pub fn poll( &mut self ) -> Option<SegmentId> {
        let ( id, handle ) = self.active.clone()?;

        match self.sink.poll_finished( handle )? {
            SinkStatus::Finished => {
                // The scheduler clock decides when the segment ends
                tracing::debug!( "Audio for '{}' ran out", id );
                self.active = None;
                None
            }
            SinkStatus::Failed( reason ) => {
                tracing::warn!( "Playback of '{}' failed: {}", id, reason );
                self.active = None;
                Some( id )
            }
        }
    }


    /// Stops whatever is playing.
    pub fn halt( &mut self ) {
        if let Some( ( _, handle ) ) = self.active.take() {
            self.sink.stop( handle );
        }
    }
}


#[cfg( test )]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use super::*;
    use crate::catalog::{ Catalog, StationProfile };
    use crate::config::RotationConfig;
    use crate::scheduler::{ QueueEntry, Scheduler, SchedulerState };
    use crate::segment::Category;


    #[derive( Debug, Clone, PartialEq )]
    enum Call {
        Play( String, Duration ),
        Stop( u64 ),
        Pause( u64, bool ),
    }


    #[derive( Default )]
    struct MockSink {
        calls: Vec<Call>,
        next: u64,
        refuse: Vec<String>,
        statuses: HashMap<u64, SinkStatus>,
    }


    impl SegmentSink for MockSink {
        fn play( &mut self, segment: &Segment, seek: Duration ) -> Result<PlaybackHandle, SinkError> {
            self.calls.push( Call::Play( segment.id.to_string(), seek ) );
            if self.refuse.iter().any( |r| r == segment.id.as_str() ) {
                return Err( SinkError::Decode( "corrupt frame".into() ) );
            }
            self.next += 1;
            Ok( PlaybackHandle( self.next ) )
        }


        fn stop( &mut self, handle: PlaybackHandle ) {
            self.calls.push( Call::Stop( handle.0 ) );
        }


        fn set_paused( &mut self, handle: PlaybackHandle, paused: bool ) {
            self.calls.push( Call::Pause( handle.0, paused ) );
        }


        fn poll_finished( &mut self, handle: PlaybackHandle ) -> Option<SinkStatus> {
            self.statuses.remove( &handle.0 )
        }
    }


    fn entry( id: &str ) -> QueueEntry {
        QueueEntry {
            segment: Segment::new( id, Category::Song, Duration::from_secs( 120 ), "Ritual FM", id ),
            start: Duration::ZERO,
            seek: Duration::from_secs( 40 ),
        }
    }


    #[test]
    fn test_started_plays_and_ended_stops() {
        let mut deck = Deck::new( MockSink::default() );
        let failed = deck.apply( &[
            ScheduleEvent::SegmentStarted( entry( "s1" ) ),
            ScheduleEvent::PauseChanged { paused: true },
            ScheduleEvent::SegmentEnded { id: "s1".into(), reason: crate::scheduler::EndReason::Skipped },
        ]);

        assert!( failed.is_empty() );
        assert_eq!( deck.sink().calls, vec![
            Call::Play( "s1".into(), Duration::from_secs( 40 ) ),
            Call::Pause( 1, true ),
            Call::Stop( 1 ),
        ]);
        assert!( deck.active().is_none() );
    }


    #[test]
    fn test_refused_segment_is_reported() {
        let sink = MockSink { refuse: vec![ "s2".into() ], ..Default::default() };
        let mut deck = Deck::new( sink );
        let failed = deck.apply( &[ ScheduleEvent::SegmentStarted( entry( "s2" ) ) ] );
        assert_eq!( failed, vec![ SegmentId::from( "s2" ) ] );
        assert!( deck.active().is_none() );
    }


    #[test]
    fn test_poll_reports_mid_play_failure() {
        let mut deck = Deck::new( MockSink::default() );
        deck.apply( &[ ScheduleEvent::SegmentStarted( entry( "s1" ) ) ] );
        assert_eq!( deck.poll(), None );

        deck.sink_mut().statuses.insert( 1, SinkStatus::Failed( "device lost".into() ) );
        assert_eq!( deck.poll(), Some( SegmentId::from( "s1" ) ) );
        assert!( deck.active().is_none() );
    }


    #[test]
    fn test_deck_drives_scheduler_past_failures() {
        let station = "95.2 Samizdat Radio";
        let mut builder = Catalog::builder();
        builder.add_station( StationProfile::new( station ).without_ads().without_jingles() );
        for id in [ "good1", "bad", "good2" ] {
            builder.add_segment( Segment::new( id, Category::Song, Duration::from_secs( 30 ), station, id ) ).unwrap();
        }
        let config = RotationConfig { seed: Some( 9 ), tune_in: false, ..Default::default() };
        let mut scheduler = Scheduler::new( Arc::new( builder.build() ), config ).unwrap();
        scheduler.select( station ).unwrap();

        let mut deck = Deck::new( MockSink { refuse: vec![ "bad".into() ], ..Default::default() } );
        for _ in 0..40 {
            let events = scheduler.drain_events();
            for id in deck.apply( &events ) {
                scheduler.report_playback_error( &id );
            }
            scheduler.tick( Duration::from_secs( 10 ) );
        }

        assert_eq!( scheduler.state(), SchedulerState::Playing );
        let bad_plays = deck.sink().calls.iter().filter( |c| matches!( c, Call::Play( id, _ ) if id == "bad" ) ).count();
        assert!( bad_plays <= 1 );
        assert!( scheduler.session().unwrap().played() > 8 );
    }
}
