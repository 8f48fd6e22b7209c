//! Playback clock
//!
//! Tracks how far into the active segment we are, driven by host ticks rather
//! than the audio driver's own position.

use std::time::Duration;


/// Elapsed/remaining time of one segment.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub struct PlaybackClock {
    duration: Duration,
    elapsed: Duration,
}


impl PlaybackClock {
    /// Starts a clock for a segment of `duration`, optionally part-way in.
    pub fn new( duration: Duration, seek: Duration ) -> Self {
        Self {
            duration,
            elapsed: seek.min( duration ),
        }
    }


    /// Moves the clock forward, returning how far it ran past the end.
    pub fn advance( &mut self, delta: Duration ) -> Duration {
        let target = self.elapsed.saturating_add( delta );
        if target >= self.duration {
            self.elapsed = self.duration;
            target - self.duration
        } else {
            self.elapsed = target;
            Duration::ZERO
        }
    }


    pub fn duration( &self ) -> Duration {
        self.duration
    }


    pub fn elapsed( &self ) -> Duration {
        self.elapsed
    }


    pub fn remaining( &self ) -> Duration {
        self.duration.saturating_sub( self.elapsed )
    }


    /// Progress in `[0, 1]`. A zero-length clock reports 1.0.
    pub fn elapsed_ratio( &self ) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        ( self.elapsed.as_secs_f64() / self.duration.as_secs_f64() ).clamp( 0.0, 1.0 )
    }


    /// Ends the segment immediately.
    pub fn force_expire( &mut self ) {
        self.elapsed = self.duration;
    }


    pub fn is_expired( &self ) -> bool {
        self.elapsed >= self.duration
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_advance_and_overshoot() {
        let mut clock = PlaybackClock::new( Duration::from_secs( 10 ), Duration::ZERO );
        assert_eq!( clock.advance( Duration::from_secs( 4 ) ), Duration::ZERO );
        assert_eq!( clock.remaining(), Duration::from_secs( 6 ) );
        assert!( !clock.is_expired() );

        assert_eq!( clock.advance( Duration::from_secs( 7 ) ), Duration::from_secs( 1 ) );
        assert!( clock.is_expired() );
        assert_eq!( clock.remaining(), Duration::ZERO );
    }


    #[test]
    fn test_seek_start() {
        let clock = PlaybackClock::new( Duration::from_secs( 200 ), Duration::from_secs( 50 ) );
        assert_eq!( clock.elapsed(), Duration::from_secs( 50 ) );
        assert!( ( clock.elapsed_ratio() - 0.25 ).abs() < 1e-9 );

        let past_end = PlaybackClock::new( Duration::from_secs( 5 ), Duration::from_secs( 9 ) );
        assert!( past_end.is_expired() );
    }


    #[test]
    fn test_zero_length_ratio() {
        let clock = PlaybackClock::new( Duration::ZERO, Duration::ZERO );
        assert_eq!( clock.elapsed_ratio(), 1.0 );
        assert!( clock.is_expired() );
    }


    #[test]
    fn test_force_expire() {
        let mut clock = PlaybackClock::new( Duration::from_secs( 30 ), Duration::ZERO );
        clock.force_expire();
        assert!( clock.is_expired() );
        assert_eq!( clock.elapsed_ratio(), 1.0 );
    }
}
