//! Segment playback driver
//!
//! Plays one segment at a time: a decode thread feeds a cpal stream, with
//! rubato resampling when the device runs at a different rate.

use std::collections::HashMap;
use std::sync::atomic::{ AtomicBool, Ordering };
use std::sync::{ Arc, Mutex, PoisonError };
use std::thread;
use std::time::Duration;

use rubato::{ FastFixedOut, PolynomialDegree, Resampler };

use radioport_core::{ PlaybackHandle, Segment, SegmentSink, SinkError, SinkStatus };

use super::decoder::{ Decoder, DecoderError };
use super::output::{ AudioOutput, OutputError, SampleBuffer };


/// Highest volume the driver accepts.
pub const MAX_VOLUME: f32 = 1.5;


impl From<DecoderError> for SinkError {
    fn from( e: DecoderError ) -> Self {
        match e {
            DecoderError::FileOpen( io ) => SinkError::Open( io.to_string() ),
            other => SinkError::Decode( other.to_string() ),
        }
    }
}


impl From<OutputError> for SinkError {
    fn from( e: OutputError ) -> Self {
        SinkError::Output( e.to_string() )
    }
}


/// Converts planar samples back to interleaved format.
/// [[L0, L1, ...], [R0, R1, ...]] → [L0, R0, L1, R1, ...]
fn interleave( channels: &[Vec<f32>] ) -> Vec<f32> {
    if channels.is_empty() || channels[ 0 ].is_empty() {
        return Vec::new();
    }
    let frames = channels[ 0 ].len();
    let mut out = Vec::with_capacity( frames * channels.len() );
    for f in 0..frames {
        for ch in channels {
            out.push( ch[ f ] );
        }
    }
    out
}


/// Appends interleaved samples to per-channel buffers.
fn deinterleave_into( samples: &[f32], planar: &mut [Vec<f32>] ) {
    let channels = planar.len();
    for frame in samples.chunks( channels ) {
        for ( ch, sample ) in frame.iter().enumerate() {
            planar[ ch ].push( *sample );
        }
    }
}


/// Pushes everything into the buffer, waiting for room. Gives up on stop.
fn push_all( buffer: &SampleBuffer, samples: &[f32], stop: &AtomicBool ) {
    let mut offset = 0;
    while offset < samples.len() && !stop.load( Ordering::Relaxed ) {
        let pushed = buffer.push( &samples[ offset.. ] );
        offset += pushed;
        if pushed == 0 {
            thread::sleep( Duration::from_millis( 5 ) );
        }
    }
}


/// One segment being played.
struct Playback {
    stop_flag: Arc<AtomicBool>,
    sample_buffer: Arc<SampleBuffer>,
    // Dropping the output stops the cpal stream
    _output: AudioOutput,
    thread: Option<thread::JoinHandle<()>>,
    status: Arc<Mutex<Option<SinkStatus>>>,
}


impl Playback {
    fn status( &self ) -> Option<SinkStatus> {
        self.status.lock().unwrap_or_else( PoisonError::into_inner ).clone()
    }


    fn halt( &mut self ) {
        self.stop_flag.store( true, Ordering::Relaxed );
        self.sample_buffer.clear();
        if let Some( thread ) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!( "Decode thread panicked" );
            }
        }
    }
}


impl Drop for Playback {
    fn drop( &mut self ) {
        self.halt();
    }
}


/// Audio driver for the scheduler's deck.
pub struct AudioDriver {
    playbacks: HashMap<u64, Playback>,
    next_handle: u64,
    volume: f32,
    muted: bool,
}


impl AudioDriver {
    pub fn new( volume: f32 ) -> Self {
        Self {
            playbacks: HashMap::new(),
            next_handle: 0,
            volume: volume.clamp( 0.0, MAX_VOLUME ),
            muted: false,
        }
    }


    pub fn volume( &self ) -> f32 {
        self.volume
    }


    pub fn is_muted( &self ) -> bool {
        self.muted
    }


    /// Sets the volume level (0.0 to 1.5) for current and future segments.
    pub fn set_volume( &mut self, volume: f32 ) {
        self.volume = volume.clamp( 0.0, MAX_VOLUME );
        self.apply_volume();
    }


    pub fn toggle_mute( &mut self ) -> bool {
        self.muted = !self.muted;
        self.apply_volume();
        self.muted
    }


    fn effective_volume( &self ) -> f32 {
        if self.muted { 0.0 } else { self.volume }
    }


    fn apply_volume( &self ) {
        let volume = self.effective_volume();
        for playback in self.playbacks.values() {
            playback.sample_buffer.set_volume( volume );
        }
    }


    /// Runs in the decode thread until EOF, error or stop.
    fn decode_loop(
        mut decoder: Decoder,
        sample_buffer: Arc<SampleBuffer>,
        stop_flag: Arc<AtomicBool>,
        mut resampler: Option<FastFixedOut<f32>>,
        status: Arc<Mutex<Option<SinkStatus>>>,
    ) {
        let channels = decoder.channels();
        let mut planar: Vec<Vec<f32>> = ( 0..channels ).map( |_| Vec::new() ).collect();
        // Keep about 50ms decoded ahead
        let target_buffer = ( decoder.sample_rate() as usize * channels ) / 20;

        let finish = |outcome: SinkStatus| {
            *status.lock().unwrap_or_else( PoisonError::into_inner ) = Some( outcome );
        };

        loop {
            if stop_flag.load( Ordering::Relaxed ) {
                break;
            }

            if sample_buffer.is_paused() || sample_buffer.len() > target_buffer {
                thread::sleep( Duration::from_millis( 5 ) );
                continue;
            }

            match decoder.decode_next() {
                Ok( Some( samples ) ) => {
                    let Some( resampler ) = resampler.as_mut() else {
                        push_all( &sample_buffer, &samples, &stop_flag );
                        continue;
                    };

                    deinterleave_into( &samples, &mut planar );
                    while planar[ 0 ].len() >= resampler.input_frames_next() {
                        let needed = resampler.input_frames_next();
                        let chunk: Vec<Vec<f32>> = planar.iter_mut().map( |ch| ch.drain( ..needed ).collect() ).collect();
                        match resampler.process( &chunk, None ) {
                            Ok( resampled ) => push_all( &sample_buffer, &interleave( &resampled ), &stop_flag ),
                            Err( e ) => {
                                finish( SinkStatus::Failed( format!( "Resample error: {}", e ) ) );
                                return;
                            }
                        }
                    }
                }
                Ok( None ) => {
                    if let Some( resampler ) = resampler.as_mut() {
                        if !planar[ 0 ].is_empty() {
                            match resampler.process_partial( Some( &planar ), None ) {
                                Ok( resampled ) => push_all( &sample_buffer, &interleave( &resampled ), &stop_flag ),
                                Err( e ) => tracing::warn!( "Final resample error: {}", e ),
                            }
                        }
                    }

                    while !sample_buffer.is_empty() && !stop_flag.load( Ordering::Relaxed ) {
                        thread::sleep( Duration::from_millis( 10 ) );
                    }
                    finish( SinkStatus::Finished );
                    break;
                }
                Err( e ) => {
                    tracing::error!( "Decode error: {}", e );
                    finish( SinkStatus::Failed( e.to_string() ) );
                    break;
                }
            }
        }

        tracing::debug!( "Decode loop: exiting" );
    }
}


impl Default for AudioDriver {
    fn default() -> Self {
        Self::new( 1.0 )
    }
}


impl SegmentSink for AudioDriver {
    fn play( &mut self, segment: &Segment, seek: Duration ) -> Result<PlaybackHandle, SinkError> {
        let path = segment.path.as_deref().ok_or_else( || SinkError::NoSource( segment.id.clone() ) )?;

        let mut decoder = Decoder::open( path )?;
        if !seek.is_zero() {
            decoder.seek( seek )?;
        }

        let source_rate = decoder.sample_rate();
        let channels = decoder.channels();
        let ( output, sample_buffer ) = AudioOutput::new( source_rate, channels as u16 )?;
        sample_buffer.set_volume( self.effective_volume() );

        let target_rate = output.sample_rate();
        let resampler = if source_rate != target_rate {
            tracing::debug!( "Resampling: {} Hz → {} Hz", source_rate, target_rate );
            let resampler = FastFixedOut::<f32>::new(
                target_rate as f64 / source_rate as f64,
                2.0,
                PolynomialDegree::Cubic,
                1024,
                channels,
            ).map_err( |e| SinkError::Output( format!( "Failed to create resampler: {}", e ) ) )?;
            Some( resampler )
        } else {
            None
        };

        output.play()?;

        let stop_flag = Arc::new( AtomicBool::new( false ) );
        let status = Arc::new( Mutex::new( None ) );

        let thread = {
            let sample_buffer = Arc::clone( &sample_buffer );
            let stop_flag = Arc::clone( &stop_flag );
            let status = Arc::clone( &status );
            thread::spawn( move || {
                Self::decode_loop( decoder, sample_buffer, stop_flag, resampler, status );
            })
        };

        self.next_handle += 1;
        let handle = PlaybackHandle( self.next_handle );
        self.playbacks.insert( handle.0, Playback {
            stop_flag,
            sample_buffer,
            _output: output,
            thread: Some( thread ),
            status,
        });

        tracing::debug!( "Playing {:?} from {:?}", path, seek );
        Ok( handle )
    }


    fn stop( &mut self, handle: PlaybackHandle ) {
        // Dropping the playback halts it
        self.playbacks.remove( &handle.0 );
    }


    fn set_paused( &mut self, handle: PlaybackHandle, paused: bool ) {
        if let Some( playback ) = self.playbacks.get( &handle.0 ) {
            playback.sample_buffer.set_paused( paused );
        }
    }


    fn poll_finished( &mut self, handle: PlaybackHandle ) -> Option<SinkStatus> {
        let status = self.playbacks.get( &handle.0 )?.status()?;
        self.playbacks.remove( &handle.0 );
        Some( status )
    }
}


#[cfg( test )]
mod tests {
    use radioport_core::Category;

    use super::*;


    #[test]
    fn test_interleave_roundtrip_layout() {
        let mut planar = vec![ Vec::new(), Vec::new() ];
        deinterleave_into( &[ 1.0, 2.0, 3.0, 4.0 ], &mut planar );
        assert_eq!( planar, vec![ vec![ 1.0, 3.0 ], vec![ 2.0, 4.0 ] ] );
        assert_eq!( interleave( &planar ), vec![ 1.0, 2.0, 3.0, 4.0 ] );
        assert!( interleave( &[] ).is_empty() );
    }


    #[test]
    fn test_segment_without_file_is_refused() {
        let mut driver = AudioDriver::default();
        let segment = Segment::new( "j1", Category::Jingle, Duration::from_secs( 5 ), "96.1 Ritual FM", "Jingle" );
        assert!( matches!( driver.play( &segment, Duration::ZERO ), Err( SinkError::NoSource( _ ) ) ) );
    }


    #[test]
    fn test_missing_file_is_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut driver = AudioDriver::default();
        let segment = Segment::new( "s1", Category::Song, Duration::from_secs( 5 ), "96.1 Ritual FM", "Gone" )
            .with_path( dir.path().join( "gone.mp3" ) );
        assert!( matches!( driver.play( &segment, Duration::ZERO ), Err( SinkError::Open( _ ) ) ) );
    }


    #[test]
    fn test_volume_and_mute() {
        let mut driver = AudioDriver::new( 3.0 );
        assert_eq!( driver.volume(), MAX_VOLUME );

        driver.set_volume( 0.4 );
        assert!( driver.toggle_mute() );
        assert_eq!( driver.effective_volume(), 0.0 );
        assert!( !driver.toggle_mute() );
        assert_eq!( driver.effective_volume(), 0.4 );
    }


    #[test]
    fn test_unknown_handles_are_ignored() {
        let mut driver = AudioDriver::default();
        driver.stop( PlaybackHandle( 42 ) );
        driver.set_paused( PlaybackHandle( 42 ), true );
        assert_eq!( driver.poll_finished( PlaybackHandle( 42 ) ), None );
    }
}
